// Domain models: raw samples in, summary records out

mod record;
mod sample;

pub use record::{CONTAINER_NAME_TAG, FieldValue, Payload, SummaryRecord};
pub use sample::{
    CpuCounters, DiskIo, DiskIoCounters, DiskIoEntry, NetworkCounters, Sample, SampleSeries,
};

/// A running container as reported by a stats source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerTarget {
    pub id: String,
    /// Names with the leading `/` stripped.
    pub aliases: Vec<String>,
}
