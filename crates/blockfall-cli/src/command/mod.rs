use clap::{ArgAction, Parser, Subcommand};
use tracing_subscriber::{filter::LevelFilter, prelude::*};

use self::{config::ConfigArg, shapes::ShapesArg, simulate::SimulateArg};

mod config;
mod shapes;
mod simulate;

#[derive(Debug, Clone, Parser)]
#[command(author, version, about, long_about = None)]
pub struct CommandArgs {
    /// Increase log verbosity (-v = INFO, -vv = DEBUG, -vvv = TRACE)
    #[arg(short = 'v', long, global = true, action = ArgAction::Count)]
    verbose: u8,
    #[command(subcommand)]
    mode: Mode,
}

#[derive(Debug, Clone, Subcommand)]
enum Mode {
    /// List the shape catalog
    Shapes(#[clap(flatten)] ShapesArg),
    /// Run a simulation driven by random input
    Simulate(#[clap(flatten)] SimulateArg),
    /// Print the default simulation configuration
    Config(#[clap(flatten)] ConfigArg),
}

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => LevelFilter::WARN,
        1 => LevelFilter::INFO,
        2 => LevelFilter::DEBUG,
        _ => LevelFilter::TRACE,
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .with(level)
        .init();
}

pub fn run() -> anyhow::Result<()> {
    let args = CommandArgs::parse();
    init_tracing(args.verbose);
    match args.mode {
        Mode::Shapes(arg) => shapes::run(&arg)?,
        Mode::Simulate(arg) => simulate::run(&arg)?,
        Mode::Config(arg) => config::run(&arg)?,
    }
    Ok(())
}
