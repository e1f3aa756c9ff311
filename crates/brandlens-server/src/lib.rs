//! BrandLens HTTP API, tracker scheduler and the shared mention check pipeline.

pub mod api;
pub mod checks;
pub mod middleware;
pub mod scheduler;
