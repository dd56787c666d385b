//! Batch driver: runs many requests through the orchestrator in fixed-size
//! concurrent windows. A window settles completely before the next one
//! starts, so at most `batch_window` generations are in flight at once.

use af_core::{GenerationRequest, GenerationResult};
use futures::future::join_all;
use log::{info, warn};

use crate::cancel::CancelFlag;
use crate::events::PipelineEvent;
use crate::orchestrator::Orchestrator;

impl Orchestrator {
    /// Run every request, at most `batch_window` concurrently. Failed
    /// requests are reported through the event sink and dropped; the
    /// returned results are the successes, in settle order.
    pub async fn run_batch(&self, requests: Vec<GenerationRequest>) -> Vec<GenerationResult> {
        self.run_batch_cancellable(requests, &CancelFlag::new())
            .await
    }

    pub async fn run_batch_cancellable(
        &self,
        requests: Vec<GenerationRequest>,
        cancel: &CancelFlag,
    ) -> Vec<GenerationResult> {
        let total = requests.len();
        let window = self.batch_window().max(1);
        info!("batch of {total} requests, window size {window}");

        let mut results = Vec::with_capacity(total);
        for chunk in requests.chunks(window) {
            if cancel.is_cancelled() {
                warn!("batch cancelled with {} of {total} settled", results.len());
                break;
            }
            let outcomes = join_all(chunk.iter().map(|request| {
                let request = request.clone();
                async move {
                    let id = request.id.clone();
                    (id, self.run_cancellable(request, cancel).await)
                }
            }))
            .await;

            for (request_id, outcome) in outcomes {
                match outcome {
                    Ok(result) => results.push(result),
                    Err(err) => {
                        warn!("batch request `{request_id}` failed: {err}");
                        self.events().emit(PipelineEvent::BatchError {
                            request_id,
                            error: err.to_string(),
                        });
                    }
                }
            }
        }

        info!("batch finished, {} of {total} succeeded", results.len());
        results
    }
}
