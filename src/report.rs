//! Per-synchronizer run summaries.

use std::fmt;

/// Outcome of one synchronizer run.
///
/// `considered - written == skipped` always holds; skipped rows are the
/// orphans whose dimension references could not be resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncReport {
    pub table: &'static str,
    pub considered: usize,
    pub written: usize,
    pub skipped: usize,
}

impl SyncReport {
    pub fn new(table: &'static str, considered: usize, written: usize) -> Self {
        debug_assert!(written <= considered);
        Self {
            table,
            considered,
            written,
            skipped: considered.saturating_sub(written),
        }
    }

    /// Report of a synchronizer that had nothing to do.
    pub fn empty(table: &'static str) -> Self {
        Self::new(table, 0, 0)
    }
}

impl fmt::Display for SyncReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {} rows written (considered {}, skipped {})",
            self.table, self.written, self.considered, self.skipped
        )
    }
}

/// Reports of every synchronizer in one pipeline run, in execution order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub reports: Vec<SyncReport>,
}

impl RunSummary {
    pub fn push(&mut self, report: SyncReport) {
        self.reports.push(report);
    }

    pub fn get(&self, table: &str) -> Option<&SyncReport> {
        self.reports.iter().find(|r| r.table == table)
    }

    pub fn written(&self) -> usize {
        self.reports.iter().map(|r| r.written).sum()
    }

    pub fn skipped(&self) -> usize {
        self.reports.iter().map(|r| r.skipped).sum()
    }
}
