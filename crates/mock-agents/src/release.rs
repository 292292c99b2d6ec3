//! Counting release hook.

use std::sync::{Arc, Mutex};

use agent_core::{async_trait, PipelineStage, ReleaseHook, ReleaseReason};

/// A release hook that records every request.
#[derive(Debug, Clone, Default)]
pub struct CountingRelease {
    reasons: Arc<Mutex<Vec<ReleaseReason>>>,
}

impl CountingRelease {
    /// Create an empty recorder.
    pub fn new() -> Self {
        Self::default()
    }

    /// All release reasons received so far, in order.
    pub fn reasons(&self) -> Vec<ReleaseReason> {
        self.reasons.lock().map(|r| r.clone()).unwrap_or_default()
    }

    /// Number of releases after `stage` completed.
    pub fn stage_count(&self, stage: PipelineStage) -> usize {
        self.reasons()
            .into_iter()
            .filter(|reason| *reason == ReleaseReason::StageComplete(stage))
            .count()
    }

    /// Number of releases caused by memory pressure.
    pub fn pressure_count(&self) -> usize {
        self.reasons()
            .into_iter()
            .filter(|reason| *reason == ReleaseReason::MemoryPressure)
            .count()
    }
}

#[async_trait]
impl ReleaseHook for CountingRelease {
    async fn release(&self, reason: ReleaseReason) {
        if let Ok(mut reasons) = self.reasons.lock() {
            reasons.push(reason);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_counts_by_reason() {
        let hook = CountingRelease::new();
        hook.release(ReleaseReason::StageComplete(PipelineStage::Scoring)).await;
        hook.release(ReleaseReason::StageComplete(PipelineStage::Scoring)).await;
        hook.release(ReleaseReason::MemoryPressure).await;

        assert_eq!(hook.stage_count(PipelineStage::Scoring), 2);
        assert_eq!(hook.stage_count(PipelineStage::Synthesis), 0);
        assert_eq!(hook.pressure_count(), 1);
    }
}
