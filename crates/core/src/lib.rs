//! Domain types shared by the Prism crates: render requests, scene
//! descriptors and their builder, job status, progress and image results.

pub mod builder;
pub mod color;
pub mod error;
pub mod image;
pub mod job;
pub mod presets;
pub mod progress;
pub mod request;
pub mod scene;
pub mod types;
