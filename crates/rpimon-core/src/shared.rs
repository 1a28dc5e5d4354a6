//! Latest cycle report, shared between the sampling loop and command sessions.

use crate::model::CycleReport;
use std::sync::{Arc, RwLock};

/// Single-writer, many-reader slot holding the latest [`CycleReport`].
///
/// The lock only guards an `Arc` swap or clone; nobody holds it while
/// rendering or evaluating a report.
#[derive(Debug, Clone, Default)]
pub struct SnapshotCell {
    inner: Arc<RwLock<Option<Arc<CycleReport>>>>,
}

impl SnapshotCell {
    pub fn new() -> Self {
        Self::default()
    }

    /// Publishes a report, replacing the previous one.
    pub fn publish(&self, report: Arc<CycleReport>) {
        let mut slot = self.inner.write().unwrap_or_else(|e| e.into_inner());
        *slot = Some(report);
    }

    /// Latest report, if any cycle has completed.
    pub fn latest(&self) -> Option<Arc<CycleReport>> {
        self.inner
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Name of `pid` in the latest report.
    pub fn process_name(&self, pid: u32) -> Option<String> {
        self.latest()
            .and_then(|r| r.process(pid).map(|p| p.name.clone()))
    }
}
