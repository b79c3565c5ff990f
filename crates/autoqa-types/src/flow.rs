//! Priority enum shared between `Execution` and the flow controller, kept
//! here (mirroring `riptide_types::reliability`) so `autoqa-types` and
//! `autoqa-flow` don't form a dependency cycle.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Priority {
    Low,
    Normal,
    High,
}

impl Priority {
    /// 0-3 -> low, 4-7 -> normal, 8-10 -> high (spec.md §4.10).
    pub fn from_numeric(priority: u8) -> Self {
        match priority {
            0..=3 => Priority::Low,
            4..=7 => Priority::Normal,
            _ => Priority::High,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn buckets_match_spec_boundaries() {
        assert_eq!(Priority::from_numeric(0), Priority::Low);
        assert_eq!(Priority::from_numeric(3), Priority::Low);
        assert_eq!(Priority::from_numeric(4), Priority::Normal);
        assert_eq!(Priority::from_numeric(7), Priority::Normal);
        assert_eq!(Priority::from_numeric(8), Priority::High);
        assert_eq!(Priority::from_numeric(10), Priority::High);
    }
}
