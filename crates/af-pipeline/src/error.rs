use af_core::Stage;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, PipelineError>;

/// Error taxonomy for the generation pipeline.
///
/// Cache failures never appear here: the stage cache degrades to a miss and
/// logs. Remote and timeout errors abort the current stage and surface to
/// the caller wrapped in `Stage`.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("invalid request: {0}")]
    Validation(String),

    #[error("remote service error: {0}")]
    Remote(String),

    #[error("timed out after {waited_ms} ms waiting for remote task")]
    Timeout { waited_ms: u64 },

    #[error("not found: {0}")]
    NotFound(String),

    #[error("stage {stage} failed: {source}")]
    Stage {
        stage: Stage,
        #[source]
        source: Box<PipelineError>,
    },

    #[error("generation cancelled")]
    Cancelled,
}

impl PipelineError {
    /// Wrap an underlying error with the stage it occurred in.
    pub fn in_stage(stage: Stage, source: PipelineError) -> Self {
        Self::Stage {
            stage,
            source: Box::new(source),
        }
    }

    /// The failing stage, when this error came out of a stage executor.
    pub fn stage(&self) -> Option<Stage> {
        match self {
            Self::Stage { stage, .. } => Some(*stage),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for PipelineError {
    fn from(err: reqwest::Error) -> Self {
        Self::Remote(err.to_string())
    }
}
