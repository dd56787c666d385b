pub mod image;
pub mod mesh;
pub mod poller;

pub use image::{ImageClient, ImageService};
pub use mesh::{MeshClient, MeshOptions, MeshService};
pub use poller::{HttpTaskTransport, RemoteTaskStatus, TaskPoller, TaskState, TaskTransport};
