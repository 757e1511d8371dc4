// Per-second raw observations and the ordered series a sampler builds from them.

use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::error::SampleError;

/// Cumulative CPU counters (nanoseconds of CPU time).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CpuCounters {
    pub total_usage: u64,
    /// Host-wide CPU time; only the Docker source reports it.
    pub system_usage: Option<u64>,
}

/// Cumulative network counters, summed over all interfaces of the container.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct NetworkCounters {
    pub rx_bytes: u64,
    pub tx_bytes: u64,
    pub rx_packets: u64,
    pub tx_packets: u64,
    pub rx_errors: u64,
    pub tx_errors: u64,
    pub rx_dropped: u64,
    pub tx_dropped: u64,
}

/// Per-operation block I/O counters for one device.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DiskIoCounters {
    pub sync: u64,
    pub r#async: u64,
    pub read: u64,
    pub write: u64,
}

impl DiskIoCounters {
    pub fn add(&mut self, other: &DiskIoCounters) {
        self.sync += other.sync;
        self.r#async += other.r#async;
        self.read += other.read;
        self.write += other.write;
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiskIoEntry {
    /// `major:minor` or a device path, depending on the source.
    pub device: String,
    pub stats: DiskIoCounters,
}

/// Block I/O for one sample. Only `io_service_bytes` feeds the rollup.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiskIo {
    pub io_service_bytes: Vec<DiskIoEntry>,
    pub io_serviced: Vec<DiskIoEntry>,
}

/// One observation of a container. Never mutated after capture.
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    pub timestamp: DateTime<Utc>,
    pub cpu: CpuCounters,
    pub memory_usage_bytes: u64,
    pub network: NetworkCounters,
    pub disk_io: Option<DiskIo>,
}

/// Samples of one container over a window, in non-decreasing timestamp order.
///
/// Construction goes through [`SampleSeries::push`], so a series that exists
/// is ordered. Emptiness is checked by the aggregator, not here.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SampleSeries {
    samples: Vec<Sample>,
}

impl SampleSeries {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            samples: Vec::with_capacity(capacity),
        }
    }

    /// Appends a sample; rejects one that is older than the current last sample.
    pub fn push(&mut self, sample: Sample) -> Result<(), SampleError> {
        if let Some(last) = self.samples.last()
            && sample.timestamp < last.timestamp
        {
            return Err(SampleError::OutOfOrder {
                previous: last.timestamp,
                next: sample.timestamp,
            });
        }
        self.samples.push(sample);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn first(&self) -> Option<&Sample> {
        self.samples.first()
    }

    pub fn last(&self) -> Option<&Sample> {
        self.samples.last()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Sample> {
        self.samples.iter()
    }
}

impl TryFrom<Vec<Sample>> for SampleSeries {
    type Error = SampleError;

    fn try_from(samples: Vec<Sample>) -> Result<Self, Self::Error> {
        let mut series = SampleSeries::with_capacity(samples.len());
        for s in samples {
            series.push(s)?;
        }
        Ok(series)
    }
}
