pub mod analysis;
mod batch;
pub mod cache;
mod cancel;
pub mod config;
pub mod error;
pub mod events;
pub mod orchestrator;
pub mod remote;
pub mod retry;

pub use cancel::CancelFlag;
pub use config::PipelineConfig;
pub use error::{PipelineError, Result};
pub use events::{EventSink, PipelineEvent};
pub use orchestrator::{ActiveGeneration, Orchestrator};
