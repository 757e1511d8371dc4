// Convert a raw Docker stats API response into a Sample.

use std::collections::BTreeMap;

use crate::error::SampleError;
use crate::models::{CpuCounters, DiskIo, DiskIoCounters, DiskIoEntry, NetworkCounters, Sample};
use bollard::models::{ContainerBlkioStatEntry, ContainerStatsResponse};
use chrono::{DateTime, Utc};

/// Maps one stats frame to a Sample. Missing counters read as zero; a frame
/// without a `read` timestamp is an error.
pub fn to_sample(s: &ContainerStatsResponse) -> Result<Sample, SampleError> {
    let timestamp = read_timestamp(s)?;

    let cpu = s
        .cpu_stats
        .as_ref()
        .map(|c| CpuCounters {
            total_usage: c
                .cpu_usage
                .as_ref()
                .and_then(|u| u.total_usage)
                .unwrap_or(0),
            system_usage: c.system_cpu_usage,
        })
        .unwrap_or_default();

    let memory_usage_bytes = s.memory_stats.as_ref().and_then(|m| m.usage).unwrap_or(0);

    let network = s.networks.as_ref().map_or(NetworkCounters::default(), |n| {
        let mut total = NetworkCounters::default();
        for v in n.values() {
            total.rx_bytes += v.rx_bytes.unwrap_or(0);
            total.tx_bytes += v.tx_bytes.unwrap_or(0);
            total.rx_packets += v.rx_packets.unwrap_or(0);
            total.tx_packets += v.tx_packets.unwrap_or(0);
            total.rx_errors += v.rx_errors.unwrap_or(0);
            total.tx_errors += v.tx_errors.unwrap_or(0);
            total.rx_dropped += v.rx_dropped.unwrap_or(0);
            total.tx_dropped += v.tx_dropped.unwrap_or(0);
        }
        total
    });

    let disk_io = s.blkio_stats.as_ref().and_then(|b| {
        let service_bytes = b.io_service_bytes_recursive.as_deref()?;
        Some(DiskIo {
            io_service_bytes: by_device(service_bytes),
            io_serviced: b
                .io_serviced_recursive
                .as_deref()
                .map(by_device)
                .unwrap_or_default(),
        })
    });

    Ok(Sample {
        timestamp,
        cpu,
        memory_usage_bytes,
        network,
        disk_io,
    })
}

// `read` is typed per bollard's date feature; its serialized form is RFC 3339 either way.
fn read_timestamp(s: &ContainerStatsResponse) -> Result<DateTime<Utc>, SampleError> {
    let raw = serde_json::to_value(&s.read)
        .map_err(|e| SampleError::Timestamp(e.to_string()))?;
    let text = raw
        .as_str()
        .ok_or_else(|| SampleError::Timestamp("missing read field".to_string()))?;
    DateTime::parse_from_rfc3339(text)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| SampleError::Timestamp(format!("{}: {}", text, e)))
}

/// Groups `{major, minor, op, value}` rows into one entry per device.
fn by_device(entries: &[ContainerBlkioStatEntry]) -> Vec<DiskIoEntry> {
    let mut devices: BTreeMap<(u64, u64), DiskIoCounters> = BTreeMap::new();
    for e in entries {
        let key = (e.major.unwrap_or(0), e.minor.unwrap_or(0));
        let value = e.value.unwrap_or(0);
        let counters = devices.entry(key).or_default();
        match e.op.as_deref().map(str::to_ascii_lowercase).as_deref() {
            Some("read") => counters.read += value,
            Some("write") => counters.write += value,
            Some("sync") => counters.sync += value,
            Some("async") => counters.r#async += value,
            _ => {}
        }
    }
    devices
        .into_iter()
        .map(|((major, minor), stats)| DiskIoEntry {
            device: format!("{}:{}", major, minor),
            stats,
        })
        .collect()
}
