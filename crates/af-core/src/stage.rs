use serde::{Deserialize, Serialize};

/// One named step of the fixed generation pipeline, in execution order.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Stage {
    Image,
    Model,
    Remesh,
    Analysis,
    Final,
}

impl Stage {
    /// Fixed execution order: image -> model -> remesh -> analysis -> final
    pub const ORDER: [Stage; 5] = [
        Self::Image,
        Self::Model,
        Self::Remesh,
        Self::Analysis,
        Self::Final,
    ];

    /// Position in the pipeline order
    pub fn index(&self) -> usize {
        match self {
            Self::Image => 0,
            Self::Model => 1,
            Self::Remesh => 2,
            Self::Analysis => 3,
            Self::Final => 4,
        }
    }

    /// Stage name used in cache keys
    pub fn name(&self) -> &'static str {
        match self {
            Self::Image => "image",
            Self::Model => "model",
            Self::Remesh => "remesh",
            Self::Analysis => "analysis",
            Self::Final => "final",
        }
    }

    pub fn from_name(name: &str) -> Option<Stage> {
        Self::ORDER.iter().copied().find(|s| s.name() == name)
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Lifecycle state of one attempted stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StageStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl StageStatus {
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Pending | Self::Processing)
    }

    pub fn is_complete(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}
