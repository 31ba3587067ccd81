// Generation engine: template rendering, resolution of versioned prompt /
// schema / instruction / model config, the generator call and its audit trail.
// The generator is reached only through the `Generator` trait.

pub mod artifacts;
pub mod generator;
pub mod handlers;
pub mod request;
pub mod resolver;
pub mod service;
pub mod template;
