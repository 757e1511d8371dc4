// Rolls one container's window of samples into summary records.
// Gauges (memory) get total/avg/min/max; cumulative counters (cpu, network, disk) get last - first.

use std::collections::BTreeMap;

use crate::models::{DiskIo, DiskIoCounters, FieldValue, Sample, SampleSeries, SummaryRecord};

pub const CPU_MEASUREMENT: &str = "cpu.usage";
pub const MEMORY_MEASUREMENT: &str = "memory.usage";
pub const NETWORK_MEASUREMENT: &str = "network.usage";
pub const DISKIO_MEASUREMENT: &str = "diskio.usage";

const BYTES_PER_KB: f64 = 1024.0;

/// total / average / min / max over a gauge.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Summary {
    pub total: f64,
    pub ave: f64,
    pub min: f64,
    pub max: f64,
}

impl Summary {
    /// `None` for an empty input. Bounds start at the first value, so zero or
    /// negative readings compare like any other.
    pub fn from_values(values: &[f64]) -> Option<Summary> {
        let (&first, rest) = values.split_first()?;
        let mut total = first;
        let mut min = first;
        let mut max = first;
        for &v in rest {
            total += v;
            if v < min {
                min = v;
            }
            if v > max {
                max = v;
            }
        }
        Some(Summary {
            total,
            ave: total / values.len() as f64,
            min,
            max,
        })
    }
}

/// Signed `last - first` of a u64 counter. A counter that went backwards
/// (runtime restart) yields a negative value, passed through as-is.
pub fn counter_delta(first: u64, last: u64) -> i64 {
    last.wrapping_sub(first) as i64
}

/// Per-field sum over `io_service_bytes`; `io_serviced` is not counted.
pub fn sum_disk_io(disk_io: &DiskIo) -> DiskIoCounters {
    let mut total = DiskIoCounters::default();
    for entry in &disk_io.io_service_bytes {
        total.add(&entry.stats);
    }
    total
}

/// Builds the records for one container. `None` when the series is empty.
///
/// memory.usage is always present. cpu.usage and network.usage need at least
/// two samples; diskio.usage additionally needs disk stats on both ends.
pub fn aggregate_series(container: &str, series: &SampleSeries) -> Option<Vec<SummaryRecord>> {
    let first = series.first()?;
    let last = series.last()?;
    // Records carry the first sample's time, whole seconds.
    let ts = first.timestamp.timestamp();

    let memory_kb: Vec<f64> = series
        .iter()
        .map(|s| s.memory_usage_bytes as f64 / BYTES_PER_KB)
        .collect();
    let memory = Summary::from_values(&memory_kb)?;

    let mut records = Vec::with_capacity(4);
    if series.len() >= 2 {
        records.push(SummaryRecord::new(
            CPU_MEASUREMENT,
            container,
            ts,
            cpu_fields(first, last),
        ));
    }
    records.push(SummaryRecord::new(
        MEMORY_MEASUREMENT,
        container,
        ts,
        memory_fields(&memory),
    ));
    if series.len() >= 2 {
        records.push(SummaryRecord::new(
            NETWORK_MEASUREMENT,
            container,
            ts,
            network_fields(first, last),
        ));
        if let Some(fields) = disk_io_fields(first, last) {
            records.push(SummaryRecord::new(DISKIO_MEASUREMENT, container, ts, fields));
        }
    }
    Some(records)
}

fn cpu_fields(first: &Sample, last: &Sample) -> BTreeMap<String, FieldValue> {
    let mut f = BTreeMap::new();
    f.insert(
        "total".to_string(),
        counter_delta(first.cpu.total_usage, last.cpu.total_usage).into(),
    );
    f
}

fn memory_fields(m: &Summary) -> BTreeMap<String, FieldValue> {
    let mut f = BTreeMap::new();
    f.insert("total".to_string(), m.total.into());
    f.insert("ave".to_string(), m.ave.into());
    f.insert("max".to_string(), m.max.into());
    f.insert("min".to_string(), m.min.into());
    f
}

fn network_fields(first: &Sample, last: &Sample) -> BTreeMap<String, FieldValue> {
    let (a, b) = (&first.network, &last.network);
    let mut f = BTreeMap::new();
    f.insert(
        "tx_kb".to_string(),
        (counter_delta(a.tx_bytes, b.tx_bytes) as f64 / BYTES_PER_KB).into(),
    );
    f.insert(
        "rx_kb".to_string(),
        (counter_delta(a.rx_bytes, b.rx_bytes) as f64 / BYTES_PER_KB).into(),
    );
    f.insert(
        "tx_packets".to_string(),
        counter_delta(a.tx_packets, b.tx_packets).into(),
    );
    f.insert(
        "rx_packets".to_string(),
        counter_delta(a.rx_packets, b.rx_packets).into(),
    );
    f.insert(
        "tx_errors".to_string(),
        counter_delta(a.tx_errors, b.tx_errors).into(),
    );
    f.insert(
        "rx_errors".to_string(),
        counter_delta(a.rx_errors, b.rx_errors).into(),
    );
    f.insert(
        "tx_dropped".to_string(),
        counter_delta(a.tx_dropped, b.tx_dropped).into(),
    );
    f.insert(
        "rx_dropped".to_string(),
        counter_delta(a.rx_dropped, b.rx_dropped).into(),
    );
    f
}

fn disk_io_fields(first: &Sample, last: &Sample) -> Option<BTreeMap<String, FieldValue>> {
    let a = sum_disk_io(first.disk_io.as_ref()?);
    let b = sum_disk_io(last.disk_io.as_ref()?);
    let mut f = BTreeMap::new();
    f.insert("sync".to_string(), counter_delta(a.sync, b.sync).into());
    f.insert("async".to_string(), counter_delta(a.r#async, b.r#async).into());
    f.insert("read".to_string(), counter_delta(a.read, b.read).into());
    f.insert("write".to_string(), counter_delta(a.write, b.write).into());
    Some(f)
}
