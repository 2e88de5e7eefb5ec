//! Search statistics.
//!
//! Each worker collects its own [`SearchStats`] without synchronisation; the
//! engine merges them when the workers are joined.

use serde::Serialize;
use std::fmt;
use std::time::{Duration, Instant};

/// Accumulated wall time and call count of one pipeline stage.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct TimedStat {
    pub count: u64,
    pub total: Duration,
}

impl TimedStat {
    #[inline]
    pub fn record(&mut self, elapsed: Duration) {
        self.count += 1;
        self.total += elapsed;
    }

    /// Record the time since `start`.
    #[inline]
    pub fn record_since(&mut self, start: Instant) {
        self.record(start.elapsed());
    }

    pub fn average(&self) -> Duration {
        if self.count == 0 {
            Duration::ZERO
        } else {
            self.total / self.count as u32
        }
    }

    pub fn merge(&mut self, other: &TimedStat) {
        self.count += other.count;
        self.total += other.total;
    }
}

impl fmt::Display for TimedStat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "total {:.3}ms, count {}, avg {:.1}us",
            self.total.as_secs_f64() * 1e3,
            self.count,
            self.average().as_secs_f64() * 1e6
        )
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct SearchStats {
    pub select: TimedStat,
    pub solve: TimedStat,
    pub schedule: TimedStat,
    pub evaluate: TimedStat,
    pub generate: TimedStat,
    pub expand: TimedStat,
    pub backup: TimedStat,

    /// Tasks dropped because another task in the batch reached the same leaf.
    pub nb_duplicate_nodes: u64,
    pub nb_information_leaks: u64,
    /// Expansions that found the position already in the cache.
    pub nb_wasted_expansions: u64,
    /// Selections that stopped at an already proven edge.
    pub nb_proven_states: u64,
    pub nb_network_evaluations: u64,
    /// Tasks backed up into the tree.
    pub nb_node_count: u64,
    pub nb_batch_rounds: u64,
    pub nb_cancelled_tasks: u64,
}

impl SearchStats {
    pub fn merge(&mut self, other: &SearchStats) {
        self.select.merge(&other.select);
        self.solve.merge(&other.solve);
        self.schedule.merge(&other.schedule);
        self.evaluate.merge(&other.evaluate);
        self.generate.merge(&other.generate);
        self.expand.merge(&other.expand);
        self.backup.merge(&other.backup);
        self.nb_duplicate_nodes += other.nb_duplicate_nodes;
        self.nb_information_leaks += other.nb_information_leaks;
        self.nb_wasted_expansions += other.nb_wasted_expansions;
        self.nb_proven_states += other.nb_proven_states;
        self.nb_network_evaluations += other.nb_network_evaluations;
        self.nb_node_count += other.nb_node_count;
        self.nb_batch_rounds += other.nb_batch_rounds;
        self.nb_cancelled_tasks += other.nb_cancelled_tasks;
    }

    /// Mean number of tasks backed up per round.
    pub fn average_batch_size(&self) -> f64 {
        if self.nb_batch_rounds == 0 {
            0.0
        } else {
            self.nb_node_count as f64 / self.nb_batch_rounds as f64
        }
    }
}

impl fmt::Display for SearchStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "----SearchStats----")?;
        writeln!(f, "select   : {}", self.select)?;
        writeln!(f, "solve    : {}", self.solve)?;
        writeln!(f, "schedule : {}", self.schedule)?;
        writeln!(f, "evaluate : {}", self.evaluate)?;
        writeln!(f, "generate : {}", self.generate)?;
        writeln!(f, "expand   : {}", self.expand)?;
        writeln!(f, "backup   : {}", self.backup)?;
        writeln!(f, "nodes           = {}", self.nb_node_count)?;
        writeln!(f, "batch rounds    = {}", self.nb_batch_rounds)?;
        writeln!(f, "avg batch size  = {:.2}", self.average_batch_size())?;
        writeln!(f, "duplicates      = {}", self.nb_duplicate_nodes)?;
        writeln!(f, "info leaks      = {}", self.nb_information_leaks)?;
        writeln!(f, "wasted expands  = {}", self.nb_wasted_expansions)?;
        writeln!(f, "proven states   = {}", self.nb_proven_states)?;
        writeln!(f, "network evals   = {}", self.nb_network_evaluations)?;
        write!(f, "cancelled tasks = {}", self.nb_cancelled_tasks)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timed_stat_average() {
        let mut stat = TimedStat::default();
        assert_eq!(stat.average(), Duration::ZERO);
        stat.record(Duration::from_micros(10));
        stat.record(Duration::from_micros(30));
        assert_eq!(stat.count, 2);
        assert_eq!(stat.average(), Duration::from_micros(20));
    }

    #[test]
    fn test_merge() {
        let mut a = SearchStats {
            nb_node_count: 10,
            nb_batch_rounds: 2,
            ..Default::default()
        };
        a.select.record(Duration::from_millis(1));
        let mut b = SearchStats {
            nb_node_count: 6,
            nb_batch_rounds: 2,
            nb_information_leaks: 1,
            ..Default::default()
        };
        b.select.record(Duration::from_millis(3));

        a.merge(&b);
        assert_eq!(a.nb_node_count, 16);
        assert_eq!(a.nb_information_leaks, 1);
        assert_eq!(a.select.count, 2);
        assert!((a.average_batch_size() - 4.0).abs() < 1e-9);
    }

    #[test]
    fn test_display_lists_counters() {
        let stats = SearchStats::default();
        let text = stats.to_string();
        assert!(text.contains("info leaks"));
        assert!(text.contains("backup"));
    }
}
