use std::time::Instant;
use tracing::info;

/// Counters shared by every engine, with periodic progress logging.
#[derive(Debug, Clone)]
pub struct SearchStats {
    /// Nodes whose successors were generated.
    pub expanded: u64,
    /// Successor records created, pre-dedup.
    pub generated: u64,
    /// Generated states already present in the closed table.
    pub duplicates: u64,
    /// Closed nodes returned to an open list for a cheaper `g`.
    pub reopened: u64,
    search_start: Instant,
    last_log: Instant,
}

impl SearchStats {
    pub fn start() -> Self {
        info!("starting search");
        Self {
            expanded: 0,
            generated: 0,
            duplicates: 0,
            reopened: 0,
            search_start: Instant::now(),
            last_log: Instant::now(),
        }
    }

    pub fn expansion(&mut self) {
        self.expanded += 1;
        self.log_if_needed();
    }

    pub fn generation(&mut self) {
        self.generated += 1;
    }

    pub fn duplicate(&mut self) {
        self.duplicates += 1;
    }

    pub fn reopening(&mut self) {
        self.reopened += 1;
    }

    /// Seconds since the search started; incumbent rows carry this.
    pub fn elapsed_seconds(&self) -> f64 {
        self.search_start.elapsed().as_secs_f64()
    }

    fn log_if_needed(&mut self) {
        if self.last_log.elapsed().as_secs() > 10 {
            self.last_log = Instant::now();
            self.log();
        }
    }

    fn log(&self) {
        info!(
            expanded = self.expanded,
            generated = self.generated,
            duplicates = self.duplicates,
            reopened = self.reopened,
        );
    }

    pub fn finalise(&self) {
        self.log();
        info!(search_duration = self.elapsed_seconds());
    }
}

impl Default for SearchStats {
    fn default() -> Self {
        Self::start()
    }
}
