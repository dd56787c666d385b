//! The pipeline orchestrator: runs one request through the fixed stage
//! sequence, consulting and populating the stage cache, emitting lifecycle
//! events, and persisting the result snapshot after every mutation.

use std::collections::HashMap;
use std::sync::Arc;

use af_core::{
    AssetCategory, FinalAsset, GenerationRequest, GenerationResult, ImageOutput, MeshOutput,
    Stage,
};
use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use serde::Serialize;
use serde_json::Value;
use tokio::sync::RwLock;

use crate::analysis;
use crate::cache::StageCache;
use crate::cancel::CancelFlag;
use crate::config::PipelineConfig;
use crate::error::{PipelineError, Result};
use crate::events::{EventSink, PipelineEvent};
use crate::remote::image::{ImageClient, ImageService};
use crate::remote::mesh::{MeshClient, MeshOptions, MeshService};
use crate::remote::poller::{HttpTaskTransport, TaskPoller};

/// Remesh target complexity by asset category. Total: every category maps
/// to a value.
pub fn target_polycount(category: AssetCategory) -> u32 {
    match category {
        AssetCategory::Weapon | AssetCategory::Tool => 2_000,
        AssetCategory::Armor | AssetCategory::Consumable => 5_000,
        AssetCategory::Character => 15_000,
        AssetCategory::Building => 30_000,
        AssetCategory::Resource => 1_000,
        AssetCategory::Decoration | AssetCategory::Misc => 8_000,
    }
}

fn stage_key(request_id: &str, stage: Stage) -> String {
    format!("{}:{}", request_id, stage.name())
}

fn snapshot_key(request_id: &str) -> String {
    format!("result:{request_id}")
}

/// Introspection entry for one in-flight run.
#[derive(Debug, Clone)]
pub struct ActiveGeneration {
    pub request_id: String,
    pub name: String,
    pub stage: Stage,
    pub started_at: DateTime<Utc>,
}

pub struct Orchestrator {
    config: PipelineConfig,
    cache: StageCache,
    image: Arc<dyn ImageService>,
    mesh: Arc<dyn MeshService>,
    events: EventSink,
    active: RwLock<HashMap<String, ActiveGeneration>>,
}

impl Orchestrator {
    pub fn new(
        config: PipelineConfig,
        image: Arc<dyn ImageService>,
        mesh: Arc<dyn MeshService>,
        events: EventSink,
    ) -> Self {
        let cache = StageCache::from_config(&config);
        Self {
            config,
            cache,
            image,
            mesh,
            events,
            active: RwLock::new(HashMap::new()),
        }
    }

    /// Wire up the real HTTP clients from configuration.
    pub fn from_config(config: PipelineConfig, events: EventSink) -> Self {
        let image = Arc::new(ImageClient::new(&config));
        let transport = Arc::new(HttpTaskTransport::new(&config));
        let poller = TaskPoller::new(transport, &config);
        let mesh = Arc::new(MeshClient::new(poller, config.max_wait));
        Self::new(config, image, mesh, events)
    }

    pub fn cache(&self) -> &StageCache {
        &self.cache
    }

    pub(crate) fn events(&self) -> &EventSink {
        &self.events
    }

    pub(crate) fn batch_window(&self) -> usize {
        self.config.batch_window
    }

    /// Run a request through the full stage sequence.
    pub async fn run(&self, request: GenerationRequest) -> Result<GenerationResult> {
        self.run_cancellable(request, &CancelFlag::new()).await
    }

    pub async fn run_cancellable(
        &self,
        request: GenerationRequest,
        cancel: &CancelFlag,
    ) -> Result<GenerationResult> {
        request.validate().map_err(PipelineError::Validation)?;
        info!("starting generation `{}` ({})", request.id, request.name);

        let mut result = GenerationResult::new(request);
        self.register(&result).await;
        let outcome = self.drive(&mut result, Stage::Image, cancel).await;
        self.deregister(&result.request.id).await;

        match outcome {
            Ok(()) => {
                self.events.emit(PipelineEvent::Complete {
                    request_id: result.request.id.clone(),
                });
                info!("generation `{}` complete", result.request.id);
                Ok(result)
            }
            Err(err) => {
                warn!("generation `{}` failed: {err}", result.request.id);
                Err(err)
            }
        }
    }

    /// Re-run a persisted result starting at `stage`, discarding every
    /// record at or after it. Earlier outputs are reused from the loaded
    /// snapshot, which is authoritative.
    pub async fn resume_from(&self, result_id: &str, stage: Stage) -> Result<GenerationResult> {
        let mut result = self.load_snapshot(result_id).await?;
        info!("resuming `{result_id}` from stage {stage}");
        result.truncate_from(stage);

        self.register(&result).await;
        let outcome = self.drive(&mut result, stage, &CancelFlag::new()).await;
        self.deregister(&result.request.id).await;

        match outcome {
            Ok(()) => {
                self.events.emit(PipelineEvent::Complete {
                    request_id: result.request.id.clone(),
                });
                Ok(result)
            }
            Err(err) => Err(err),
        }
    }

    /// The last persisted snapshot for a request, including partial
    /// progress of a failed run.
    pub async fn get_generation(&self, result_id: &str) -> Result<GenerationResult> {
        self.load_snapshot(result_id).await
    }

    /// Snapshot of every in-flight run.
    pub async fn active_generations(&self) -> Vec<ActiveGeneration> {
        self.active.read().await.values().cloned().collect()
    }

    async fn load_snapshot(&self, result_id: &str) -> Result<GenerationResult> {
        let value = self
            .cache
            .get(&snapshot_key(result_id))
            .await
            .ok_or_else(|| {
                PipelineError::NotFound(format!("no persisted result for `{result_id}`"))
            })?;
        serde_json::from_value(value).map_err(|e| {
            PipelineError::NotFound(format!("persisted result for `{result_id}` is unreadable: {e}"))
        })
    }

    async fn register(&self, result: &GenerationResult) {
        let mut active = self.active.write().await;
        active.insert(
            result.request.id.clone(),
            ActiveGeneration {
                request_id: result.request.id.clone(),
                name: result.request.name.clone(),
                stage: Stage::Image,
                started_at: Utc::now(),
            },
        );
    }

    async fn deregister(&self, request_id: &str) {
        self.active.write().await.remove(request_id);
    }

    async fn set_active_stage(&self, request_id: &str, stage: Stage) {
        let mut active = self.active.write().await;
        if let Some(entry) = active.get_mut(request_id) {
            entry.stage = stage;
        }
    }

    /// Execute stages from `from` onward, strictly in order.
    async fn drive(
        &self,
        result: &mut GenerationResult,
        from: Stage,
        cancel: &CancelFlag,
    ) -> Result<()> {
        let request_id = result.request.id.clone();
        for stage in Stage::ORDER.iter().copied().skip(from.index()) {
            if cancel.is_cancelled() {
                self.events.emit(PipelineEvent::Cancelled {
                    request_id: request_id.clone(),
                });
                return Err(PipelineError::Cancelled);
            }
            self.set_active_stage(&request_id, stage).await;
            self.events.emit(PipelineEvent::StageStart {
                request_id: request_id.clone(),
                stage,
            });

            let key = stage_key(&request_id, stage);
            if let Some(cached) = self.cache.get(&key).await {
                if self.apply_cached(result, stage, &cached) {
                    debug!("cache hit for `{key}`, skipping remote work");
                    result.begin_stage(stage);
                    result.complete_stage(stage, Some(cached));
                    self.persist(result).await;
                    self.events.emit(PipelineEvent::StageComplete {
                        request_id: request_id.clone(),
                        stage,
                    });
                    continue;
                }
            }

            result.begin_stage(stage);
            self.persist(result).await;

            match self.execute_stage(result, stage, cancel).await {
                Ok(output) => {
                    result.complete_stage(stage, output.clone());
                    if let Some(value) = output {
                        self.cache.set(&key, value, None).await;
                    }
                    self.persist(result).await;
                    self.events.emit(PipelineEvent::StageComplete {
                        request_id: request_id.clone(),
                        stage,
                    });
                }
                Err(err) => {
                    result.fail_stage(stage, err.to_string());
                    self.persist(result).await;
                    self.events.emit(PipelineEvent::StageError {
                        request_id: request_id.clone(),
                        stage,
                        error: err.to_string(),
                    });
                    return Err(PipelineError::in_stage(stage, err));
                }
            }
        }
        Ok(())
    }

    /// Run one stage's executor, storing its typed output on the result and
    /// returning the opaque payload for the record and the cache.
    async fn execute_stage(
        &self,
        result: &mut GenerationResult,
        stage: Stage,
        cancel: &CancelFlag,
    ) -> Result<Option<Value>> {
        let request = result.request.clone();
        match stage {
            Stage::Image => {
                let prompt = build_image_prompt(&request);
                let output = self.image.generate(&prompt).await?;
                result.image_result = Some(output.clone());
                Ok(to_payload(&output))
            }
            Stage::Model => {
                let image = result.image_result.as_ref().ok_or_else(|| {
                    PipelineError::Validation(format!(
                        "model stage for `{}` has no completed image output",
                        request.id
                    ))
                })?;
                let options = MeshOptions {
                    style: request.style.clone(),
                    ..MeshOptions::default()
                };
                let output = self
                    .mesh
                    .create_model(&request.description, Some(&image.url), &options, cancel)
                    .await?;
                result.model_result = Some(output.clone());
                Ok(to_payload(&output))
            }
            Stage::Remesh => {
                let model = result.model_result.as_ref().ok_or_else(|| {
                    PipelineError::Validation(format!(
                        "remesh stage for `{}` has no completed model output",
                        request.id
                    ))
                })?;
                let target = target_polycount(request.category);
                let output = self
                    .mesh
                    .remesh(&model.model_url, target, cancel)
                    .await?;
                result.remesh_result = Some(output.clone());
                Ok(to_payload(&output))
            }
            Stage::Analysis => {
                if result.best_mesh().is_none() {
                    return Err(PipelineError::Validation(format!(
                        "analysis stage for `{}` has no completed mesh output",
                        request.id
                    )));
                }
                match analysis::analyze(&request) {
                    Some(output) => {
                        let value = to_payload(&output);
                        result.analysis_result = value.clone();
                        Ok(value)
                    }
                    None => {
                        debug!("no analyzer for category {}", request.category);
                        result.analysis_result = None;
                        Ok(None)
                    }
                }
            }
            Stage::Final => {
                let mesh = result.best_mesh().ok_or_else(|| {
                    PipelineError::Validation(format!(
                        "final stage for `{}` has no completed mesh output",
                        request.id
                    ))
                })?;
                let asset = FinalAsset {
                    request_id: request.id.clone(),
                    name: request.name.clone(),
                    category: request.category,
                    model_url: mesh.model_url.clone(),
                    textures: mesh.textures.clone(),
                    analysis: result.analysis_result.clone(),
                    packaged_at: Utc::now(),
                };
                result.final_asset = Some(asset.clone());
                Ok(to_payload(&asset))
            }
        }
    }

    /// Restore a stage's typed output from a cached payload. Returns false
    /// when the payload does not decode, which downgrades the hit to a miss.
    fn apply_cached(&self, result: &mut GenerationResult, stage: Stage, value: &Value) -> bool {
        match stage {
            Stage::Image => match serde_json::from_value::<ImageOutput>(value.clone()) {
                Ok(output) => {
                    result.image_result = Some(output);
                    true
                }
                Err(err) => stale_entry(stage, err),
            },
            Stage::Model => match serde_json::from_value::<MeshOutput>(value.clone()) {
                Ok(output) => {
                    result.model_result = Some(output);
                    true
                }
                Err(err) => stale_entry(stage, err),
            },
            Stage::Remesh => match serde_json::from_value::<MeshOutput>(value.clone()) {
                Ok(output) => {
                    result.remesh_result = Some(output);
                    true
                }
                Err(err) => stale_entry(stage, err),
            },
            Stage::Analysis => {
                result.analysis_result = Some(value.clone());
                true
            }
            Stage::Final => match serde_json::from_value::<FinalAsset>(value.clone()) {
                Ok(asset) => {
                    result.final_asset = Some(asset);
                    true
                }
                Err(err) => stale_entry(stage, err),
            },
        }
    }

    /// Persist the whole result snapshot. Cache failures degrade silently.
    async fn persist(&self, result: &GenerationResult) {
        if let Some(value) = to_payload(result) {
            self.cache
                .set(&snapshot_key(&result.request.id), value, None)
                .await;
        }
    }
}

fn stale_entry(stage: Stage, err: serde_json::Error) -> bool {
    warn!("cached {stage} output is unreadable, treating as miss: {err}");
    false
}

fn to_payload<T: Serialize>(value: &T) -> Option<Value> {
    match serde_json::to_value(value) {
        Ok(value) => Some(value),
        Err(err) => {
            warn!("payload not serializable: {err}");
            None
        }
    }
}

fn build_image_prompt(request: &GenerationRequest) -> String {
    let mut prompt = format!(
        "game asset concept art of {}, {}, {} on a neutral background",
        request.name, request.description, request.category
    );
    if let Some(style) = &request.style {
        prompt.push_str(", ");
        prompt.push_str(style);
    }
    prompt
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use af_core::{StageStatus, TextureMaps};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    pub(crate) struct MockImage {
        pub calls: AtomicUsize,
    }

    impl MockImage {
        pub fn new() -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl ImageService for MockImage {
        async fn generate(&self, _prompt: &str) -> Result<ImageOutput> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(ImageOutput {
                url: "https://cdn/concept.png".into(),
                provider_model: "test-diffusion".into(),
                resolution: "1024x1024".into(),
                generated_at: Utc::now(),
            })
        }
    }

    pub(crate) struct MockMesh {
        pub create_calls: AtomicUsize,
        pub remesh_calls: AtomicUsize,
        pub fail_create: AtomicBool,
    }

    impl MockMesh {
        pub fn new() -> Arc<Self> {
            Arc::new(Self {
                create_calls: AtomicUsize::new(0),
                remesh_calls: AtomicUsize::new(0),
                fail_create: AtomicBool::new(false),
            })
        }

        fn output(&self, url: &str, polycount: u32) -> MeshOutput {
            MeshOutput {
                model_url: url.into(),
                textures: TextureMaps {
                    diffuse: Some("https://cdn/diffuse.png".into()),
                    ..TextureMaps::default()
                },
                polycount,
                processing_ms: 1,
            }
        }
    }

    #[async_trait]
    impl MeshService for MockMesh {
        async fn create_model(
            &self,
            _prompt: &str,
            _image_url: Option<&str>,
            options: &MeshOptions,
            _cancel: &CancelFlag,
        ) -> Result<MeshOutput> {
            self.create_calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_create.load(Ordering::SeqCst) {
                return Err(PipelineError::Remote("mesh service unavailable".into()));
            }
            Ok(self.output("https://cdn/full.glb", options.target_polycount))
        }

        async fn remesh(
            &self,
            _model_url: &str,
            target_polycount: u32,
            _cancel: &CancelFlag,
        ) -> Result<MeshOutput> {
            self.remesh_calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.output("https://cdn/low.glb", target_polycount))
        }

        async fn retexture(
            &self,
            model_url: &str,
            _texture_prompt: &str,
            _cancel: &CancelFlag,
        ) -> Result<MeshOutput> {
            Ok(self.output(model_url, 2_000))
        }
    }

    pub(crate) fn orchestrator(
        image: Arc<MockImage>,
        mesh: Arc<MockMesh>,
        events: EventSink,
    ) -> Orchestrator {
        let config = PipelineConfig {
            cache_max_bytes: 1024 * 1024,
            ..PipelineConfig::default()
        };
        Orchestrator::new(config, image, mesh, events)
    }

    fn weapon_request(id: &str) -> GenerationRequest {
        GenerationRequest::with_id(id, "Iron Sword", "a worn iron sword", AssetCategory::Weapon)
    }

    #[tokio::test]
    async fn test_full_run_completes_all_stages() {
        let _ = env_logger::builder().is_test(true).try_init();
        let orch = orchestrator(MockImage::new(), MockMesh::new(), EventSink::disabled());

        let result = orch.run(weapon_request("w1")).await.unwrap();

        assert_eq!(result.records.len(), 5);
        for (record, stage) in result.records.iter().zip(Stage::ORDER) {
            assert_eq!(record.stage, stage);
            assert_eq!(record.status, StageStatus::Completed);
        }
        assert!(result.image_result.is_some());
        assert!(result.model_result.is_some());
        // Weapon remesh target comes from the category table
        assert_eq!(result.remesh_result.as_ref().unwrap().polycount, 2_000);
        let asset = result.final_asset.unwrap();
        assert_eq!(asset.model_url, "https://cdn/low.glb");
        assert!(asset.textures.diffuse.is_some());
    }

    #[tokio::test]
    async fn test_stage_timestamps_are_sequential() {
        let orch = orchestrator(MockImage::new(), MockMesh::new(), EventSink::disabled());
        let result = orch.run(weapon_request("w2")).await.unwrap();

        for pair in result.records.windows(2) {
            let finished = pair[0].finished_at.unwrap();
            assert!(
                pair[1].started_at >= finished,
                "stage {} started before {} completed",
                pair[1].stage,
                pair[0].stage
            );
        }
    }

    #[tokio::test]
    async fn test_second_run_hits_cache_and_skips_remote() {
        let image = MockImage::new();
        let mesh = MockMesh::new();
        let orch = orchestrator(image.clone(), mesh.clone(), EventSink::disabled());

        let first = orch.run(weapon_request("w3")).await.unwrap();
        assert_eq!(image.calls.load(Ordering::SeqCst), 1);
        assert_eq!(mesh.create_calls.load(Ordering::SeqCst), 1);

        let second = orch.run(weapon_request("w3")).await.unwrap();
        // No additional remote calls for any cached stage
        assert_eq!(image.calls.load(Ordering::SeqCst), 1);
        assert_eq!(mesh.create_calls.load(Ordering::SeqCst), 1);
        assert_eq!(mesh.remesh_calls.load(Ordering::SeqCst), 1);
        assert_eq!(second.image_result, first.image_result);
        assert_eq!(second.remesh_result, first.remesh_result);
    }

    #[tokio::test]
    async fn test_failure_aborts_and_persists_partial_progress() {
        let image = MockImage::new();
        let mesh = MockMesh::new();
        mesh.fail_create.store(true, Ordering::SeqCst);
        let (events, mut rx) = EventSink::channel();
        let orch = orchestrator(image, mesh, events);

        let err = orch.run(weapon_request("w4")).await.unwrap_err();
        assert_eq!(err.stage(), Some(Stage::Model));

        // Partial progress is queryable after the failure
        let partial = orch.get_generation("w4").await.unwrap();
        assert_eq!(partial.records.len(), 2);
        assert_eq!(partial.records[0].status, StageStatus::Completed);
        assert_eq!(partial.records[1].status, StageStatus::Failed);
        assert!(partial.records[1].error.as_deref().unwrap().contains("unavailable"));

        let mut saw_stage_error = false;
        while let Ok(event) = rx.try_recv() {
            if matches!(event, PipelineEvent::StageError { stage: Stage::Model, .. }) {
                saw_stage_error = true;
            }
            assert!(!matches!(event, PipelineEvent::Complete { .. }));
        }
        assert!(saw_stage_error);
    }

    #[tokio::test]
    async fn test_active_registry_empties_after_run() {
        let orch = orchestrator(MockImage::new(), MockMesh::new(), EventSink::disabled());
        assert!(orch.active_generations().await.is_empty());
        orch.run(weapon_request("w5")).await.unwrap();
        assert!(orch.active_generations().await.is_empty());
    }

    #[tokio::test]
    async fn test_resume_truncates_and_reruns_tail() {
        let image = MockImage::new();
        let mesh = MockMesh::new();
        let orch = orchestrator(image.clone(), mesh.clone(), EventSink::disabled());

        let first = orch.run(weapon_request("w6")).await.unwrap();
        let image_record = first.records[0].clone();

        // Force the tail stages to re-execute rather than hit their caches
        for stage in [Stage::Remesh, Stage::Analysis, Stage::Final] {
            orch.cache().delete(&stage_key("w6", stage)).await;
        }

        let resumed = orch.resume_from("w6", Stage::Remesh).await.unwrap();

        assert_eq!(resumed.records.len(), 5);
        // Earlier records survive untouched
        assert_eq!(resumed.records[0].stage, Stage::Image);
        assert_eq!(resumed.records[0].started_at, image_record.started_at);
        assert_eq!(resumed.records[2].stage, Stage::Remesh);
        // Image and model stages were not re-run
        assert_eq!(image.calls.load(Ordering::SeqCst), 1);
        assert_eq!(mesh.create_calls.load(Ordering::SeqCst), 1);
        assert_eq!(mesh.remesh_calls.load(Ordering::SeqCst), 2);
        assert!(resumed.final_asset.is_some());
    }

    #[tokio::test]
    async fn test_resume_cannot_skip_failed_model_stage() {
        let image = MockImage::new();
        let mesh = MockMesh::new();
        mesh.fail_create.store(true, Ordering::SeqCst);
        let orch = orchestrator(image, mesh, EventSink::disabled());

        orch.run(weapon_request("w7")).await.unwrap_err();

        // Jumping past the failed model stage must not let analysis run
        // without a mesh output
        let err = orch.resume_from("w7", Stage::Analysis).await.unwrap_err();
        assert_eq!(err.stage(), Some(Stage::Analysis));

        let snapshot = orch.get_generation("w7").await.unwrap();
        let record = snapshot.stage_record(Stage::Analysis).unwrap();
        assert_eq!(record.status, StageStatus::Failed);
        assert!(record.error.as_deref().unwrap().contains("mesh"));
        assert!(snapshot.analysis_result.is_none());
        assert!(snapshot.final_asset.is_none());
    }

    #[tokio::test]
    async fn test_resume_unknown_id_is_not_found() {
        let orch = orchestrator(MockImage::new(), MockMesh::new(), EventSink::disabled());
        let err = orch.resume_from("ghost", Stage::Remesh).await.unwrap_err();
        assert!(matches!(err, PipelineError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_validation_fails_fast() {
        let image = MockImage::new();
        let orch = orchestrator(image.clone(), MockMesh::new(), EventSink::disabled());
        let request = GenerationRequest::with_id("v1", "", "desc", AssetCategory::Weapon);
        let err = orch.run(request).await.unwrap_err();
        assert!(matches!(err, PipelineError::Validation(_)));
        assert_eq!(image.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_cancel_before_run_starts_no_stage() {
        let image = MockImage::new();
        let orch = orchestrator(image.clone(), MockMesh::new(), EventSink::disabled());
        let cancel = CancelFlag::new();
        cancel.cancel();
        let err = orch
            .run_cancellable(weapon_request("c1"), &cancel)
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::Cancelled));
        assert_eq!(image.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_cancel_notifies_event_consumers() {
        let (events, mut rx) = EventSink::channel();
        let orch = orchestrator(MockImage::new(), MockMesh::new(), events);
        let cancel = CancelFlag::new();
        cancel.cancel();

        let err = orch
            .run_cancellable(weapon_request("c2"), &cancel)
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::Cancelled));

        let mut cancelled = false;
        while let Ok(event) = rx.try_recv() {
            match event {
                PipelineEvent::Cancelled { request_id } => {
                    assert_eq!(request_id, "c2");
                    cancelled = true;
                }
                PipelineEvent::Complete { .. } => panic!("cancelled run must not complete"),
                _ => {}
            }
        }
        assert!(cancelled, "consumers must learn the run was cancelled");
    }

    #[tokio::test]
    async fn test_building_request_yields_bank_layout() {
        let orch = orchestrator(MockImage::new(), MockMesh::new(), EventSink::disabled());
        let request = GenerationRequest::with_id(
            "bank-1",
            "Town Bank",
            "stone bank with vault",
            AssetCategory::Building,
        )
        .subtype("bank");

        let result = orch.run(request).await.unwrap();
        let analysis = result.analysis_result.unwrap();
        assert_eq!(analysis["building_type"], "bank");
        let entries = analysis["entry_points"].as_array().unwrap();
        assert!(entries.iter().any(|e| e["is_main"] == true));
        let areas = analysis["areas"].as_array().unwrap();
        assert!(areas.iter().any(|a| a["kind"] == "vault"));
        // Building remesh target comes from the category table
        assert_eq!(result.remesh_result.unwrap().polycount, 30_000);
    }

    #[tokio::test]
    async fn test_analysis_null_for_plain_categories() {
        let orch = orchestrator(MockImage::new(), MockMesh::new(), EventSink::disabled());
        let request =
            GenerationRequest::with_id("t1", "Hammer", "a simple hammer", AssetCategory::Tool);
        let result = orch.run(request).await.unwrap();
        assert!(result.analysis_result.is_none());
        let record = result.stage_record(Stage::Analysis).unwrap();
        assert_eq!(record.status, StageStatus::Completed);
        assert!(record.output.is_none());
    }

    #[tokio::test]
    async fn test_events_emitted_around_stages() {
        let (events, mut rx) = EventSink::channel();
        let orch = orchestrator(MockImage::new(), MockMesh::new(), events);
        orch.run(weapon_request("e1")).await.unwrap();

        let mut starts = 0;
        let mut completes = 0;
        let mut finished = false;
        while let Ok(event) = rx.try_recv() {
            match event {
                PipelineEvent::StageStart { .. } => starts += 1,
                PipelineEvent::StageComplete { .. } => completes += 1,
                PipelineEvent::Complete { request_id } => {
                    assert_eq!(request_id, "e1");
                    finished = true;
                }
                other => panic!("unexpected event {other:?}"),
            }
        }
        assert_eq!(starts, 5);
        assert_eq!(completes, 5);
        assert!(finished);
    }

    #[test]
    fn test_polycount_table_is_total() {
        for category in AssetCategory::all() {
            assert!(target_polycount(category) > 0);
        }
        assert_eq!(target_polycount(AssetCategory::Resource), 1_000);
        assert_eq!(target_polycount(AssetCategory::Building), 30_000);
        assert_eq!(target_polycount(AssetCategory::Misc), 8_000);
    }

    #[test]
    fn test_image_prompt_includes_style() {
        let request = weapon_request("p1").style("low poly");
        let prompt = build_image_prompt(&request);
        assert!(prompt.contains("Iron Sword"));
        assert!(prompt.contains("low poly"));
    }
}
