//! Structural analysis payloads produced by the analysis stage.

use serde::{Deserialize, Serialize};

/// Building subtype, inferred from the request when not supplied explicitly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BuildingType {
    Bank,
    Store,
    House,
    Temple,
    Castle,
    Inn,
}

impl BuildingType {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Bank => "bank",
            Self::Store => "store",
            Self::House => "house",
            Self::Temple => "temple",
            Self::Castle => "castle",
            Self::Inn => "inn",
        }
    }

    /// Resolve the building type: an explicit subtype wins, otherwise the
    /// description is scanned for keywords in priority order, falling back
    /// to a plain house.
    pub fn infer(subtype: Option<&str>, description: &str) -> BuildingType {
        if let Some(subtype) = subtype {
            return Self::from_keyword(&subtype.to_lowercase()).unwrap_or(Self::House);
        }

        let text = description.to_lowercase();
        if text.contains("bank") {
            Self::Bank
        } else if text.contains("store") || text.contains("shop") {
            Self::Store
        } else if text.contains("house") || text.contains("home") {
            Self::House
        } else if text.contains("temple") || text.contains("church") {
            Self::Temple
        } else if text.contains("castle") {
            Self::Castle
        } else if text.contains("inn") || text.contains("tavern") {
            Self::Inn
        } else {
            Self::House
        }
    }

    fn from_keyword(word: &str) -> Option<BuildingType> {
        match word {
            "bank" => Some(Self::Bank),
            "store" | "shop" => Some(Self::Store),
            "house" | "home" => Some(Self::House),
            "temple" | "church" => Some(Self::Temple),
            "castle" => Some(Self::Castle),
            "inn" | "tavern" => Some(Self::Inn),
            _ => None,
        }
    }
}

/// A point where an entity enters a building.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntryPoint {
    pub position: [f32; 3],
    pub facing: [f32; 3],
    pub is_main: bool,
}

/// A named interior region of a building.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionalArea {
    pub kind: String,
    pub position: [f32; 3],
    pub size: [f32; 3],
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuildingLayout {
    pub building_type: BuildingType,
    pub entry_points: Vec<EntryPoint>,
    pub areas: Vec<FunctionalArea>,
}

/// An attachment location on a weapon mesh.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Hardpoint {
    pub name: String,
    pub position: [f32; 3],
    pub primary: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeaponHardpoints {
    pub hardpoints: Vec<Hardpoint>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArmorPlacement {
    pub slot: String,
    pub coverage: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bone {
    pub name: String,
    #[serde(default)]
    pub parent: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RigSkeleton {
    pub bones: Vec<Bone>,
}

/// Closed union of every analyzer's output, tagged by kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AnalysisOutput {
    Weapon(WeaponHardpoints),
    Armor(ArmorPlacement),
    Rig(RigSkeleton),
    Building(BuildingLayout),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_infer_priority_order() {
        // "bank" outranks "store" even when both appear
        assert_eq!(
            BuildingType::infer(None, "a bank next to a store"),
            BuildingType::Bank
        );
        assert_eq!(
            BuildingType::infer(None, "a shop with a house behind it"),
            BuildingType::Store
        );
        assert_eq!(
            BuildingType::infer(None, "stone bank with vault"),
            BuildingType::Bank
        );
    }

    #[test]
    fn test_infer_default_is_house() {
        assert_eq!(
            BuildingType::infer(None, "a tall mysterious structure"),
            BuildingType::House
        );
    }

    #[test]
    fn test_explicit_subtype_wins() {
        assert_eq!(
            BuildingType::infer(Some("temple"), "stone bank with vault"),
            BuildingType::Temple
        );
        // Unknown explicit subtype maps to the default
        assert_eq!(
            BuildingType::infer(Some("ziggurat"), "stone bank with vault"),
            BuildingType::House
        );
    }

    #[test]
    fn test_analysis_output_tagging() {
        let output = AnalysisOutput::Building(BuildingLayout {
            building_type: BuildingType::Bank,
            entry_points: vec![],
            areas: vec![],
        });
        let value = serde_json::to_value(&output).unwrap();
        assert_eq!(value["kind"], "building");
        assert_eq!(value["building_type"], "bank");
    }
}
