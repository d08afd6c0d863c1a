use std::fmt;

use chrono::{DateTime, Utc};

use crate::filter::is_overdue;
use crate::task::Task;

/// Counters over the whole collection, recomputed on every call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Stats {
    pub total: usize,
    pub completed: usize,
    pub overdue: usize,
}

impl Stats {
    pub fn compute(tasks: &[Task], now: DateTime<Utc>) -> Self {
        tasks.iter().fold(Self::default(), |mut acc, task| {
            acc.total += 1;
            if task.completed {
                acc.completed += 1;
            }
            if is_overdue(task, now) {
                acc.overdue += 1;
            }
            acc
        })
    }
}

impl fmt::Display for Stats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Total: {}  Completed: {}  Overdue: {}",
            self.total, self.completed, self.overdue
        )
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone, Utc};

    use super::Stats;
    use crate::task::Task;

    #[test]
    fn counts_from_full_collection() {
        let now = Utc
            .with_ymd_and_hms(2026, 10, 18, 12, 0, 0)
            .single()
            .expect("valid now");

        let mut done_late = Task::new(1, "a".into(), Some(now - Duration::days(2)), now);
        done_late.completed = true;
        let late = Task::new(2, "b".into(), Some(now - Duration::minutes(1)), now);
        let future = Task::new(3, "c".into(), Some(now + Duration::days(1)), now);
        let loose = Task::new(4, "d".into(), None, now);

        let stats = Stats::compute(&[done_late, late, future, loose], now);
        assert_eq!(
            stats,
            Stats {
                total: 4,
                completed: 1,
                overdue: 1,
            }
        );
        assert_eq!(stats.to_string(), "Total: 4  Completed: 1  Overdue: 1");
    }

    #[test]
    fn empty_collection_is_all_zero() {
        let now = Utc::now();
        assert_eq!(Stats::compute(&[], now), Stats::default());
    }
}
