pub mod partitioned_writer;

pub use partitioned_writer::{ParquetFileInfo, PartitionedWriter, SampleRow, WriteResult};
