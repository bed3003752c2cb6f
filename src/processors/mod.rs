pub mod run_coordinator;
pub mod transformer;

pub use run_coordinator::{PartitionFailure, RunCoordinator, RunOptions, RunSummary};
pub use transformer::RecordTransformer;
