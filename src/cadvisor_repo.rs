// Alternate stats source: a cAdvisor instance already holding the last minute of
// per-second stats for every Docker container.

use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::instrument;

use crate::error::SampleError;
use crate::models::{
    ContainerTarget, CpuCounters, DiskIo, DiskIoCounters, DiskIoEntry, NetworkCounters, Sample,
    SampleSeries,
};
use crate::sampler::SampledContainer;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Deserialize)]
struct ContainerInfo {
    #[serde(default)]
    aliases: Vec<String>,
    #[serde(default)]
    stats: Vec<StatsEntry>,
}

#[derive(Debug, Deserialize)]
struct StatsEntry {
    timestamp: DateTime<Utc>,
    #[serde(default)]
    cpu: CpuEntry,
    #[serde(default)]
    memory: MemoryEntry,
    #[serde(default)]
    network: NetworkCounters,
    diskio: Option<DiskIoEntryRaw>,
}

#[derive(Debug, Default, Deserialize)]
struct CpuEntry {
    #[serde(default)]
    usage: CpuUsage,
}

#[derive(Debug, Default, Deserialize)]
struct CpuUsage {
    #[serde(default)]
    total: u64,
}

#[derive(Debug, Default, Deserialize)]
struct MemoryEntry {
    #[serde(default)]
    usage: u64,
}

#[derive(Debug, Deserialize)]
struct DiskIoEntryRaw {
    #[serde(default)]
    io_service_bytes: Vec<PerDiskStats>,
    #[serde(default)]
    io_serviced: Vec<PerDiskStats>,
}

#[derive(Debug, Deserialize)]
struct PerDiskStats {
    #[serde(default)]
    device: String,
    #[serde(default)]
    major: u64,
    #[serde(default)]
    minor: u64,
    #[serde(default)]
    stats: HashMap<String, u64>,
}

impl From<&PerDiskStats> for DiskIoEntry {
    fn from(p: &PerDiskStats) -> Self {
        let get = |k: &str| p.stats.get(k).copied().unwrap_or(0);
        let device = if p.device.is_empty() {
            format!("{}:{}", p.major, p.minor)
        } else {
            p.device.clone()
        };
        DiskIoEntry {
            device,
            stats: DiskIoCounters {
                sync: get("Sync"),
                r#async: get("Async"),
                read: get("Read"),
                write: get("Write"),
            },
        }
    }
}

impl From<&StatsEntry> for Sample {
    fn from(e: &StatsEntry) -> Self {
        Sample {
            timestamp: e.timestamp,
            cpu: CpuCounters {
                total_usage: e.cpu.usage.total,
                system_usage: None,
            },
            memory_usage_bytes: e.memory.usage,
            network: e.network,
            disk_io: e.diskio.as_ref().map(|d| DiskIo {
                io_service_bytes: d.io_service_bytes.iter().map(DiskIoEntry::from).collect(),
                io_serviced: d.io_serviced.iter().map(DiskIoEntry::from).collect(),
            }),
        }
    }
}

pub struct CadvisorRepo {
    base_url: String,
    client: reqwest::Client,
}

impl CadvisorRepo {
    pub fn new(base_url: &str) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(crate::version::user_agent())
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        })
    }

    /// One request returns every container's window. A container whose stats
    /// are out of order or empty comes back with an `Err` series.
    #[instrument(skip(self), fields(source = "cadvisor", base_url = %self.base_url))]
    pub async fn fetch(&self) -> Result<Vec<SampledContainer>, SampleError> {
        let url = format!("{}/docker", self.base_url);
        let body: HashMap<String, ContainerInfo> = self
            .client
            .get(&url)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(body
            .into_iter()
            .map(|(key, info)| SampledContainer {
                target: ContainerTarget {
                    id: key,
                    aliases: info.aliases.clone(),
                },
                series: to_series(&info.stats),
            })
            .collect())
    }
}

fn to_series(stats: &[StatsEntry]) -> Result<SampleSeries, SampleError> {
    if stats.is_empty() {
        return Err(SampleError::Empty);
    }
    SampleSeries::try_from(stats.iter().map(Sample::from).collect::<Vec<_>>())
}

#[cfg(test)]
mod tests {
    use super::*;

    const BODY: &str = r#"{
        "/docker/abc": {
            "aliases": ["web", "abc"],
            "stats": [
                {
                    "timestamp": "2024-05-01T12:00:00.5Z",
                    "cpu": {"usage": {"total": 100}, "load_average": 0},
                    "memory": {"usage": 2048},
                    "network": {"rx_bytes": 10, "tx_bytes": 20, "rx_packets": 1, "tx_packets": 2,
                                "rx_errors": 0, "tx_errors": 0, "rx_dropped": 0, "tx_dropped": 0},
                    "diskio": {
                        "io_service_bytes": [
                            {"device": "/dev/sda", "major": 8, "minor": 0,
                             "stats": {"Async": 1, "Read": 2, "Sync": 3, "Total": 6, "Write": 4}}
                        ],
                        "io_serviced": []
                    }
                },
                {
                    "timestamp": "2024-05-01T12:00:01.5Z",
                    "cpu": {"usage": {"total": 250}},
                    "memory": {"usage": 4096},
                    "network": {"rx_bytes": 30, "tx_bytes": 20}
                }
            ]
        },
        "/docker/empty": {"aliases": ["idle"], "stats": []}
    }"#;

    #[test]
    fn converts_cadvisor_json_into_series() {
        let body: HashMap<String, ContainerInfo> = serde_json::from_str(BODY).unwrap();
        let info = &body["/docker/abc"];
        let series = to_series(&info.stats).unwrap();
        assert_eq!(series.len(), 2);
        let first = series.first().unwrap();
        assert_eq!(first.timestamp.timestamp(), 1_714_564_800);
        assert_eq!(first.cpu.total_usage, 100);
        assert_eq!(first.memory_usage_bytes, 2048);
        assert_eq!(first.network.tx_packets, 2);
        let disk = first.disk_io.as_ref().unwrap();
        assert_eq!(disk.io_service_bytes[0].device, "/dev/sda");
        assert_eq!(disk.io_service_bytes[0].stats.write, 4);
        assert_eq!(series.last().unwrap().network.rx_bytes, 30);
    }

    #[test]
    fn empty_stats_are_invalid() {
        let body: HashMap<String, ContainerInfo> = serde_json::from_str(BODY).unwrap();
        assert!(matches!(
            to_series(&body["/docker/empty"].stats),
            Err(SampleError::Empty)
        ));
    }
}
