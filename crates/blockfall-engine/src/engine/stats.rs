use serde::Serialize;

/// Score values for line clears, indexed by lines cleared at once.
const SCORE_TABLE: [usize; 5] = [0, 100, 300, 500, 800];

/// Counters of a simulation run.
///
/// - **Score**: points earned from line clears
/// - **Level**: one level per 10 cleared lines
/// - **Completed pieces**: pieces locked into the board
/// - **Discarded pieces**: pieces thrown away before locking
/// - **Line clear distribution**: locks by number of cleared lines
///
/// Big and malicious shapes can clear more than four lines at once; those
/// score 200 points per line and are counted in the last histogram bucket.
///
/// # Example
///
/// ```
/// use blockfall_engine::SimulationStats;
///
/// let mut stats = SimulationStats::new();
/// stats.complete_piece_drop(4);
/// stats.discard_piece();
///
/// assert_eq!(stats.score(), 800);
/// assert_eq!(stats.total_cleared_lines(), 4);
/// assert_eq!(stats.line_cleared_counter()[4], 1);
/// assert_eq!(stats.discarded_pieces(), 1);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SimulationStats {
    score: usize,
    completed_pieces: usize,
    discarded_pieces: usize,
    total_cleared_lines: usize,
    line_cleared_counter: [usize; 5],
}

impl Default for SimulationStats {
    fn default() -> Self {
        Self::new()
    }
}

impl SimulationStats {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            score: 0,
            completed_pieces: 0,
            discarded_pieces: 0,
            total_cleared_lines: 0,
            line_cleared_counter: [0; 5],
        }
    }

    #[must_use]
    pub const fn score(&self) -> usize {
        self.score
    }

    #[must_use]
    pub const fn level(&self) -> usize {
        self.total_cleared_lines / 10
    }

    #[must_use]
    pub const fn completed_pieces(&self) -> usize {
        self.completed_pieces
    }

    #[must_use]
    pub const fn discarded_pieces(&self) -> usize {
        self.discarded_pieces
    }

    #[must_use]
    pub const fn total_cleared_lines(&self) -> usize {
        self.total_cleared_lines
    }

    /// Histogram of locks by cleared lines; the last bucket counts four or more.
    #[must_use]
    pub const fn line_cleared_counter(&self) -> &[usize; 5] {
        &self.line_cleared_counter
    }

    /// Records a piece locking into the board.
    pub fn complete_piece_drop(&mut self, cleared_lines: usize) {
        self.completed_pieces += 1;
        self.total_cleared_lines += cleared_lines;
        let bucket = cleared_lines.min(self.line_cleared_counter.len() - 1);
        self.line_cleared_counter[bucket] += 1;
        self.score += SCORE_TABLE
            .get(cleared_lines)
            .copied()
            .unwrap_or(cleared_lines * 200);
    }

    pub fn discard_piece(&mut self) {
        self.discarded_pieces += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_score_table() {
        let mut stats = SimulationStats::new();
        for lines in 0..=4 {
            stats.complete_piece_drop(lines);
        }
        assert_eq!(stats.score(), 1700);
        assert_eq!(stats.completed_pieces(), 5);
        assert_eq!(stats.total_cleared_lines(), 10);
        assert_eq!(stats.level(), 1);
        assert_eq!(stats.line_cleared_counter(), &[1, 1, 1, 1, 1]);
    }

    #[test]
    fn test_more_than_four_lines() {
        let mut stats = SimulationStats::new();
        stats.complete_piece_drop(5);
        assert_eq!(stats.score(), 1000);
        assert_eq!(stats.line_cleared_counter()[4], 1);
    }

    #[test]
    fn test_serializes_counters() {
        let mut stats = SimulationStats::new();
        stats.complete_piece_drop(1);
        let json = serde_json::to_value(&stats).unwrap();
        assert_eq!(json["score"], 100);
        assert_eq!(json["line_cleared_counter"][1], 1);
    }
}
