//! Structural analysis stage: a closed dispatch over the asset category to
//! a set of stateless geometric calculators. Categories without an analyzer
//! complete the stage with no output.

use af_core::analysis::{
    AnalysisOutput, ArmorPlacement, Bone, BuildingLayout, BuildingType, EntryPoint,
    FunctionalArea, Hardpoint, RigSkeleton, WeaponHardpoints,
};
use af_core::{AssetCategory, GenerationRequest};

/// Run the analyzer for the request's category, if one exists.
pub fn analyze(request: &GenerationRequest) -> Option<AnalysisOutput> {
    match request.category {
        AssetCategory::Weapon => Some(AnalysisOutput::Weapon(weapon_hardpoints(request))),
        AssetCategory::Armor => Some(AnalysisOutput::Armor(armor_placement(request))),
        AssetCategory::Character => Some(AnalysisOutput::Rig(humanoid_skeleton())),
        AssetCategory::Building => Some(AnalysisOutput::Building(building_layout(request))),
        AssetCategory::Tool
        | AssetCategory::Consumable
        | AssetCategory::Resource
        | AssetCategory::Decoration
        | AssetCategory::Misc => None,
    }
}

fn weapon_hardpoints(request: &GenerationRequest) -> WeaponHardpoints {
    let text = request.description.to_lowercase();
    let mut hardpoints = vec![
        Hardpoint {
            name: "grip".into(),
            position: [0.0, 0.1, 0.0],
            primary: true,
        },
        Hardpoint {
            name: "tip".into(),
            position: [0.0, 1.0, 0.0],
            primary: false,
        },
    ];
    if text.contains("bow") || text.contains("rifle") || text.contains("crossbow") {
        hardpoints.push(Hardpoint {
            name: "sight_mount".into(),
            position: [0.0, 0.4, 0.05],
            primary: false,
        });
    }
    if text.contains("two-handed") || text.contains("greatsword") || text.contains("polearm") {
        hardpoints.push(Hardpoint {
            name: "off_grip".into(),
            position: [0.0, 0.35, 0.0],
            primary: false,
        });
    }
    WeaponHardpoints { hardpoints }
}

fn armor_placement(request: &GenerationRequest) -> ArmorPlacement {
    let hint = request
        .subtype
        .clone()
        .unwrap_or_else(|| request.description.clone())
        .to_lowercase();

    let (slot, coverage) = if hint.contains("helm") || hint.contains("head") {
        ("head", vec!["skull", "face"])
    } else if hint.contains("boot") || hint.contains("greave") || hint.contains("feet") {
        ("feet", vec!["foot", "ankle", "shin"])
    } else if hint.contains("gauntlet") || hint.contains("glove") || hint.contains("hand") {
        ("hands", vec!["hand", "wrist"])
    } else if hint.contains("legging") || hint.contains("pants") || hint.contains("leg") {
        ("legs", vec!["thigh", "knee"])
    } else {
        ("chest", vec!["torso", "shoulder"])
    };

    ArmorPlacement {
        slot: slot.into(),
        coverage: coverage.into_iter().map(String::from).collect(),
    }
}

fn humanoid_skeleton() -> RigSkeleton {
    let chain = |name: &str, parent: Option<&str>| Bone {
        name: name.into(),
        parent: parent.map(String::from),
    };
    RigSkeleton {
        bones: vec![
            chain("root", None),
            chain("spine", Some("root")),
            chain("chest", Some("spine")),
            chain("neck", Some("chest")),
            chain("head", Some("neck")),
            chain("upper_arm_l", Some("chest")),
            chain("lower_arm_l", Some("upper_arm_l")),
            chain("hand_l", Some("lower_arm_l")),
            chain("upper_arm_r", Some("chest")),
            chain("lower_arm_r", Some("upper_arm_r")),
            chain("hand_r", Some("lower_arm_r")),
            chain("upper_leg_l", Some("root")),
            chain("lower_leg_l", Some("upper_leg_l")),
            chain("foot_l", Some("lower_leg_l")),
            chain("upper_leg_r", Some("root")),
            chain("lower_leg_r", Some("upper_leg_r")),
            chain("foot_r", Some("lower_leg_r")),
        ],
    }
}

fn building_layout(request: &GenerationRequest) -> BuildingLayout {
    let building_type = BuildingType::infer(request.subtype.as_deref(), &request.description);

    let mut entry_points = vec![EntryPoint {
        position: [0.0, 0.0, -5.0],
        facing: [0.0, 0.0, -1.0],
        is_main: true,
    }];
    // Larger public buildings get a service entrance
    if matches!(
        building_type,
        BuildingType::Bank | BuildingType::Castle | BuildingType::Temple
    ) {
        entry_points.push(EntryPoint {
            position: [5.0, 0.0, 0.0],
            facing: [1.0, 0.0, 0.0],
            is_main: false,
        });
    }

    let area_kinds: &[&str] = match building_type {
        BuildingType::Bank => &["lobby", "vault", "office"],
        BuildingType::Store => &["showroom", "counter", "storage"],
        BuildingType::House => &["living_room", "kitchen", "bedroom"],
        BuildingType::Temple => &["hall", "altar", "sanctum"],
        BuildingType::Castle => &["great_hall", "keep", "armory"],
        BuildingType::Inn => &["common_room", "kitchen", "guest_room"],
    };
    let areas = area_kinds
        .iter()
        .enumerate()
        .map(|(i, kind)| FunctionalArea {
            kind: kind.to_string(),
            position: [0.0, 0.0, i as f32 * 4.0],
            size: [4.0, 3.0, 4.0],
        })
        .collect();

    BuildingLayout {
        building_type,
        entry_points,
        areas,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(category: AssetCategory, description: &str) -> GenerationRequest {
        GenerationRequest::with_id("a1", "Asset", description, category)
    }

    #[test]
    fn test_dispatch_covers_categories_with_analyzers() {
        assert!(matches!(
            analyze(&request(AssetCategory::Weapon, "an iron sword")),
            Some(AnalysisOutput::Weapon(_))
        ));
        assert!(matches!(
            analyze(&request(AssetCategory::Armor, "a steel helm")),
            Some(AnalysisOutput::Armor(_))
        ));
        assert!(matches!(
            analyze(&request(AssetCategory::Character, "a knight")),
            Some(AnalysisOutput::Rig(_))
        ));
        assert!(matches!(
            analyze(&request(AssetCategory::Building, "a stone bank")),
            Some(AnalysisOutput::Building(_))
        ));
    }

    #[test]
    fn test_categories_without_analyzer_yield_none() {
        for category in [
            AssetCategory::Tool,
            AssetCategory::Consumable,
            AssetCategory::Resource,
            AssetCategory::Decoration,
            AssetCategory::Misc,
        ] {
            assert!(analyze(&request(category, "something")).is_none());
        }
    }

    #[test]
    fn test_weapon_grip_is_primary() {
        let output = weapon_hardpoints(&request(AssetCategory::Weapon, "a greatsword"));
        let grip = output.hardpoints.iter().find(|h| h.name == "grip").unwrap();
        assert!(grip.primary);
        assert!(output.hardpoints.iter().any(|h| h.name == "off_grip"));
    }

    #[test]
    fn test_armor_slot_from_subtype() {
        let req = request(AssetCategory::Armor, "shiny armor").subtype("helmet");
        let placement = armor_placement(&req);
        assert_eq!(placement.slot, "head");
    }

    #[test]
    fn test_rig_bones_reference_existing_parents() {
        let skeleton = humanoid_skeleton();
        for bone in &skeleton.bones {
            if let Some(parent) = &bone.parent {
                assert!(
                    skeleton.bones.iter().any(|b| &b.name == parent),
                    "missing parent {parent}"
                );
            }
        }
    }

    #[test]
    fn test_bank_layout_has_vault_and_main_entry() {
        let req = request(AssetCategory::Building, "stone bank with vault");
        let layout = building_layout(&req);
        assert_eq!(layout.building_type, BuildingType::Bank);
        assert!(layout.entry_points.iter().any(|e| e.is_main));
        assert!(layout.areas.iter().any(|a| a.kind == "vault"));
    }
}
