use serde::{Deserialize, Serialize};

/// Unified asset category shared across the pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssetCategory {
    Weapon,
    Armor,
    Consumable,
    Tool,
    Decoration,
    Character,
    Building,
    Resource,
    Misc,
}

impl AssetCategory {
    /// Category name for display and prompts
    pub fn name(&self) -> &'static str {
        match self {
            Self::Weapon => "weapon",
            Self::Armor => "armor",
            Self::Consumable => "consumable",
            Self::Tool => "tool",
            Self::Decoration => "decoration",
            Self::Character => "character",
            Self::Building => "building",
            Self::Resource => "resource",
            Self::Misc => "misc",
        }
    }

    /// All known categories
    pub fn all() -> [AssetCategory; 9] {
        [
            Self::Weapon,
            Self::Armor,
            Self::Consumable,
            Self::Tool,
            Self::Decoration,
            Self::Character,
            Self::Building,
            Self::Resource,
            Self::Misc,
        ]
    }
}

impl Default for AssetCategory {
    fn default() -> Self {
        Self::Misc
    }
}

impl std::fmt::Display for AssetCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}
