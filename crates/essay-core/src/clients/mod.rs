//! Clients for external collaborators
//!
//! Each collaborator is consumed through a trait so the engine can be wired
//! with test doubles; the shipped implementations talk HTTP via reqwest.

pub mod extraction;
pub mod generation;
pub mod render;

pub use extraction::{DocumentExtractor, PlainTextExtractor};
pub use generation::{GenerationClient, OpenAiClient};
pub use render::{EssayRenderer, RenderMetadata, RenderServiceClient, RenderedDocument};
