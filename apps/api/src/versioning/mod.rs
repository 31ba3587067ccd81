// Versioned entity families: prompt templates, output schemas, system
// instructions and model configs. Exactly one active version per key.

pub mod handlers;
pub mod models;
pub mod store;

pub use models::{
    EntityFamily, ModelConfig, ModelParameters, PromptTemplate, SchemaTemplate, SystemInstruction,
    VersionRef,
};
pub use store::{PgVersionStore, VersionStore};
