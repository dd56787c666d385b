use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::category::AssetCategory;
use crate::request::GenerationRequest;
use crate::stage::{Stage, StageStatus};

/// Texture map URLs returned by the mesh service.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TextureMaps {
    #[serde(default)]
    pub diffuse: Option<String>,
    #[serde(default)]
    pub normal: Option<String>,
    #[serde(default)]
    pub metallic: Option<String>,
    #[serde(default)]
    pub roughness: Option<String>,
}

/// Output of the image synthesis stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageOutput {
    pub url: String,
    pub provider_model: String,
    pub resolution: String,
    pub generated_at: DateTime<Utc>,
}

/// Output of the model and remesh stages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeshOutput {
    pub model_url: String,
    #[serde(default)]
    pub textures: TextureMaps,
    pub polycount: u32,
    #[serde(default)]
    pub processing_ms: u64,
}

/// Descriptor of the packaged asset produced by the final stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinalAsset {
    pub request_id: String,
    pub name: String,
    pub category: AssetCategory,
    pub model_url: String,
    pub textures: TextureMaps,
    #[serde(default)]
    pub analysis: Option<Value>,
    pub packaged_at: DateTime<Utc>,
}

/// One entry per attempted stage of one request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageRecord {
    pub stage: Stage,
    pub status: StageStatus,
    #[serde(default)]
    pub output: Option<Value>,
    #[serde(default)]
    pub error: Option<String>,
    pub started_at: DateTime<Utc>,
    #[serde(default)]
    pub finished_at: Option<DateTime<Utc>>,
}

/// Mutable aggregate owned by the orchestrator for the lifetime of one run.
///
/// The record list is append-only during a forward run; `truncate_from`
/// drops everything at or after the resume target so the list always
/// reflects exactly the stages attempted in the current logical run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationResult {
    pub request: GenerationRequest,
    pub records: Vec<StageRecord>,
    #[serde(default)]
    pub image_result: Option<ImageOutput>,
    #[serde(default)]
    pub model_result: Option<MeshOutput>,
    #[serde(default)]
    pub remesh_result: Option<MeshOutput>,
    #[serde(default)]
    pub analysis_result: Option<Value>,
    #[serde(default)]
    pub final_asset: Option<FinalAsset>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl GenerationResult {
    pub fn new(request: GenerationRequest) -> Self {
        let now = Utc::now();
        Self {
            request,
            records: Vec::new(),
            image_result: None,
            model_result: None,
            remesh_result: None,
            analysis_result: None,
            final_asset: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }

    /// Append a processing record for a stage that is about to execute.
    pub fn begin_stage(&mut self, stage: Stage) {
        self.records.push(StageRecord {
            stage,
            status: StageStatus::Processing,
            output: None,
            error: None,
            started_at: Utc::now(),
            finished_at: None,
        });
        self.touch();
    }

    /// Mark the most recent record for `stage` completed.
    pub fn complete_stage(&mut self, stage: Stage, output: Option<Value>) {
        if let Some(record) = self.records.iter_mut().rev().find(|r| r.stage == stage) {
            record.status = StageStatus::Completed;
            record.output = output;
            record.finished_at = Some(Utc::now());
        }
        self.touch();
    }

    /// Mark the most recent record for `stage` failed.
    pub fn fail_stage(&mut self, stage: Stage, error: impl Into<String>) {
        if let Some(record) = self.records.iter_mut().rev().find(|r| r.stage == stage) {
            record.status = StageStatus::Failed;
            record.error = Some(error.into());
            record.finished_at = Some(Utc::now());
        }
        self.touch();
    }

    pub fn stage_record(&self, stage: Stage) -> Option<&StageRecord> {
        self.records.iter().rev().find(|r| r.stage == stage)
    }

    /// Drop records and outputs at or after `stage` ahead of a resume.
    pub fn truncate_from(&mut self, stage: Stage) {
        self.records.retain(|r| r.stage < stage);
        if stage <= Stage::Image {
            self.image_result = None;
        }
        if stage <= Stage::Model {
            self.model_result = None;
        }
        if stage <= Stage::Remesh {
            self.remesh_result = None;
        }
        if stage <= Stage::Analysis {
            self.analysis_result = None;
        }
        self.final_asset = None;
        self.touch();
    }

    /// Remesh output when present, else the raw model output.
    pub fn best_mesh(&self) -> Option<&MeshOutput> {
        self.remesh_result.as_ref().or(self.model_result.as_ref())
    }
}
