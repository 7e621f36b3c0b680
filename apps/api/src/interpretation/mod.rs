// Interpretation pipeline: model call, parsing, and staging of reviewable items.
// All model calls go through llm_client.

pub mod handlers;
pub mod interpreter;
pub mod models;
pub mod prompts;
pub mod store;
