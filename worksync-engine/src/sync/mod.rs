pub mod cache;
pub mod engine;
pub mod paths;
pub mod planner;
pub mod scheduler;
pub mod session;
#[cfg(test)]
pub(crate) mod testutil;

/// Project identifier assigned by the embedding persistence layer.
pub type ProjectId = i64;
