// Taxonomy ingestion: turns a model-proposed `proposed_taxonomy` tree into
// path-addressed nodes linked to their source document.

pub mod handlers;
pub mod ingest;
pub mod model;
pub mod parse;
pub mod store;

pub use store::PgTaxonomyStore;
