//! In-memory implementations of the pipeline's ports for tests and demos.

pub mod ids;
pub mod opener;
pub mod remote;

pub use ids::SequentialIds;
pub use opener::MockOpener;
pub use remote::MockCounterService;
