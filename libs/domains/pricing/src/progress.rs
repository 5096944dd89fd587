//! Progress curves.
//!
//! The engine never decides how much "work" lies between two levels; it asks
//! an injected [`ProgressCurve`]. Costs of per-unit methods scale with it.

use rust_decimal::Decimal;
use std::sync::LazyLock;

/// Monotonic amount of progress between two points of the level domain
pub trait ProgressCurve: Send + Sync {
    /// Progress needed to go from `start` to `end`; zero when `end <= start`
    fn progress_between(&self, start: u32, end: u32) -> Decimal;
}

/// Classic 1..=126 level experience curve (level 99 is 13,034,431 xp)
#[derive(Debug, Clone)]
pub struct ExperienceTable {
    // index = level; index 0 is unused
    experience: Vec<u64>,
}

static SHARED_TABLE: LazyLock<ExperienceTable> = LazyLock::new(ExperienceTable::new);

impl ExperienceTable {
    pub const MAX_LEVEL: u32 = 126;

    pub fn new() -> Self {
        let mut experience = Vec::with_capacity(Self::MAX_LEVEL as usize + 1);
        experience.extend([0, 0]);

        let mut points = 0f64;
        for level in 1..Self::MAX_LEVEL {
            let level = f64::from(level);
            points += (level + 300.0 * 2f64.powf(level / 7.0)).floor();
            experience.push((points / 4.0).floor() as u64);
        }

        Self { experience }
    }

    /// Process-wide table, built on first use
    pub fn shared() -> &'static Self {
        &SHARED_TABLE
    }

    /// Total experience required to reach `level` (clamped to the table)
    pub fn experience_at(&self, level: u32) -> u64 {
        self.experience[level.clamp(1, Self::MAX_LEVEL) as usize]
    }
}

impl Default for ExperienceTable {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressCurve for ExperienceTable {
    fn progress_between(&self, start: u32, end: u32) -> Decimal {
        Decimal::from(
            self.experience_at(end)
                .saturating_sub(self.experience_at(start)),
        )
    }
}

/// One unit of progress per level
#[derive(Debug, Clone, Copy, Default)]
pub struct LinearProgress;

impl ProgressCurve for LinearProgress {
    fn progress_between(&self, start: u32, end: u32) -> Decimal {
        Decimal::from(end.saturating_sub(start))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_experience_values() {
        let table = ExperienceTable::shared();
        assert_eq!(table.experience_at(1), 0);
        assert_eq!(table.experience_at(2), 83);
        assert_eq!(table.experience_at(10), 1_154);
        assert_eq!(table.experience_at(50), 101_333);
        assert_eq!(table.experience_at(92), 6_517_253);
        assert_eq!(table.experience_at(99), 13_034_431);
    }

    #[test]
    fn test_full_domain_progress() {
        assert_eq!(
            ExperienceTable::shared().progress_between(1, 99),
            Decimal::from(13_034_431)
        );
    }

    #[test]
    fn test_progress_is_additive_and_never_negative() {
        let table = ExperienceTable::new();
        assert_eq!(
            table.progress_between(1, 50) + table.progress_between(50, 99),
            table.progress_between(1, 99)
        );
        assert_eq!(table.progress_between(60, 40), Decimal::ZERO);
    }

    #[test]
    fn test_levels_beyond_table_are_clamped() {
        let table = ExperienceTable::new();
        assert_eq!(table.experience_at(0), 0);
        assert_eq!(table.experience_at(500), table.experience_at(126));
    }

    #[test]
    fn test_linear_progress() {
        assert_eq!(LinearProgress.progress_between(1, 99), Decimal::from(98));
        assert_eq!(LinearProgress.progress_between(10, 5), Decimal::ZERO);
    }
}
