use crate::search::SearchStats;
use memory_stats::memory_stats;
use std::time::{Duration, Instant};
use tracing::info;

/// How often (in expansions) the memory ceiling is re-checked; the probe
/// is a syscall.
const MEMORY_CHECK_PERIOD: u64 = 4096;

/// Wall-clock / expansion-count / memory ceiling polled at the top of
/// every expansion loop. Hitting a limit is not an error: the engine
/// keeps any incumbent it has and the trailer is still emitted.
#[derive(Debug, Clone)]
pub struct Limit {
    time: Option<Duration>,
    expansions: Option<u64>,
    memory_mb: Option<usize>,
    started: Instant,
    next_memory_check: u64,
    tripped: bool,
}

impl Limit {
    pub fn new(time: Option<Duration>, expansions: Option<u64>, memory_mb: Option<usize>) -> Self {
        if time.is_some() || expansions.is_some() || memory_mb.is_some() {
            info!(
                time_limit = time.map(|d| d.as_secs_f64()),
                expansion_limit = expansions,
                memory_limit_mb = memory_mb,
            );
        }
        Self {
            time,
            expansions,
            memory_mb,
            started: Instant::now(),
            next_memory_check: MEMORY_CHECK_PERIOD,
            tripped: false,
        }
    }

    pub fn none() -> Self {
        Self::new(None, None, None)
    }

    /// Re-arm for a fresh search.
    pub fn restart(&mut self) {
        self.started = Instant::now();
        self.next_memory_check = MEMORY_CHECK_PERIOD;
        self.tripped = false;
    }

    /// True once any configured limit has been hit. Latches: after the
    /// first trip every later call answers true without re-probing.
    pub fn reached(&mut self, stats: &SearchStats) -> bool {
        if self.tripped {
            return true;
        }
        if let Some(cap) = self.expansions {
            if stats.expanded >= cap {
                info!(expanded = stats.expanded, "expansion limit reached");
                self.tripped = true;
            }
        }
        if let Some(cap) = self.time {
            if self.started.elapsed() > cap {
                info!("time limit reached");
                self.tripped = true;
            }
        }
        if let Some(cap_mb) = self.memory_mb {
            if stats.expanded >= self.next_memory_check {
                self.next_memory_check = stats.expanded + MEMORY_CHECK_PERIOD;
                let used_mb = memory_stats().map(|usage| usage.physical_mem / 1024 / 1024);
                if used_mb.is_some_and(|used| used > cap_mb) {
                    info!(used_mb, "memory limit reached");
                    self.tripped = true;
                }
            }
        }
        self.tripped
    }

    /// Whether a limit (rather than frontier exhaustion) ended the search.
    pub fn was_tripped(&self) -> bool {
        self.tripped
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expansion_limit_trips_and_latches() {
        let mut limit = Limit::new(None, Some(3), None);
        let mut stats = SearchStats::start();
        assert!(!limit.reached(&stats));
        stats.expanded = 3;
        assert!(limit.reached(&stats));
        stats.expanded = 0;
        assert!(limit.reached(&stats), "limit must latch");
        assert!(limit.was_tripped());
    }

    #[test]
    fn unlimited_never_trips() {
        let mut limit = Limit::none();
        let mut stats = SearchStats::start();
        stats.expanded = u64::MAX / 2;
        assert!(!limit.reached(&stats));
    }

    #[test]
    fn restart_clears_the_latch() {
        let mut limit = Limit::new(None, Some(1), None);
        let mut stats = SearchStats::start();
        stats.expanded = 5;
        assert!(limit.reached(&stats));
        limit.restart();
        stats.expanded = 0;
        assert!(!limit.reached(&stats));
    }
}
