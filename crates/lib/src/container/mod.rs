//! Container identity, lifecycle policy and the runtime collaborator.

pub mod engine;
pub mod policy;
pub mod profile;
pub mod tag;

pub use engine::{CliEngine, ContainerEngine, Mount, RunSpec};
pub use policy::{Action, ImageState, PolicyDecision, PolicyError, PolicyInputs, PolicyMode, decide};
pub use tag::{BuildContextDescriptor, ContentDigest, ImageTag, TagError, TagScheme};
