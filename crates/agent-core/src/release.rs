//! Stage-boundary resource release.
//!
//! Every pipeline stage that calls the LLM backend calls the release hook as
//! soon as its call returns, so at most one stage's inference context is
//! resident at a time. The memory guard calls it too when the process is
//! under memory pressure.

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Pipeline stages that talk to the LLM backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStage {
    Reasoning,
    Scoring,
    Refinement,
    Synthesis,
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Reasoning => "reasoning",
            Self::Scoring => "scoring",
            Self::Refinement => "refinement",
            Self::Synthesis => "synthesis",
        };
        f.write_str(name)
    }
}

/// Why a release was requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReleaseReason {
    /// A stage finished its backend call.
    StageComplete(PipelineStage),
    /// Process memory crossed the configured threshold.
    MemoryPressure,
}

/// Hook that frees inference resources (e.g. unloads a model).
///
/// Implementations must not fail; problems are logged and swallowed.
#[async_trait]
pub trait ReleaseHook: Send + Sync {
    /// Release resources held on behalf of the pipeline.
    async fn release(&self, reason: ReleaseReason);
}

/// A release hook that does nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopRelease;

#[async_trait]
impl ReleaseHook for NoopRelease {
    async fn release(&self, _reason: ReleaseReason) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_display() {
        assert_eq!(PipelineStage::Reasoning.to_string(), "reasoning");
        assert_eq!(PipelineStage::Synthesis.to_string(), "synthesis");
    }

    #[tokio::test]
    async fn test_noop_release() {
        NoopRelease.release(ReleaseReason::MemoryPressure).await;
    }
}
