pub mod partition_index;
pub mod raw_reader;

pub use partition_index::PartitionIndex;
pub use raw_reader::{RawBatch, RawRecordReader, RawUnit};
