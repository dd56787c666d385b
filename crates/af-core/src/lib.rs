pub mod analysis;
mod category;
mod request;
mod result;
mod stage;

pub use category::AssetCategory;
pub use request::GenerationRequest;
pub use result::{
    FinalAsset, GenerationResult, ImageOutput, MeshOutput, StageRecord, TextureMaps,
};
pub use stage::{Stage, StageStatus};
