// Shared test helpers
#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use dockstats::error::StoreWriteError;
use dockstats::models::*;
use dockstats::store::{Store, StoreConnector, WritePoint};
use dockstats::writer::{DirectWrite, MetadataEnricher};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

pub fn sample(secs: i64, cpu_total: u64, memory_bytes: u64) -> Sample {
    Sample {
        timestamp: Utc.timestamp_opt(secs, 0).unwrap(),
        cpu: CpuCounters {
            total_usage: cpu_total,
            system_usage: None,
        },
        memory_usage_bytes: memory_bytes,
        network: NetworkCounters::default(),
        disk_io: None,
    }
}

pub fn series(samples: Vec<Sample>) -> SampleSeries {
    SampleSeries::try_from(samples).expect("ordered fixture")
}

pub fn record(measurement: &str, container: &str, ts: i64) -> SummaryRecord {
    let mut fields = std::collections::BTreeMap::new();
    fields.insert("total".to_string(), FieldValue::Integer(1));
    SummaryRecord::new(measurement, container, ts, fields)
}

/// Connector whose stores append every batch to a shared log.
#[derive(Clone, Default)]
pub struct RecordingConnector {
    pub batches: Arc<Mutex<Vec<Vec<WritePoint>>>>,
    pub connects: Arc<AtomicUsize>,
    pub fail: bool,
}

impl RecordingConnector {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Default::default()
        }
    }

    pub fn batches(&self) -> Vec<Vec<WritePoint>> {
        self.batches.lock().unwrap().clone()
    }

    pub fn connects(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }
}

pub struct RecordingStore {
    batches: Arc<Mutex<Vec<Vec<WritePoint>>>>,
    fail: bool,
}

#[async_trait]
impl Store for RecordingStore {
    async fn write_points(&self, points: &[WritePoint]) -> Result<(), StoreWriteError> {
        if self.fail {
            return Err(StoreWriteError::Encode("store offline".to_string()));
        }
        self.batches.lock().unwrap().push(points.to_vec());
        Ok(())
    }
}

impl StoreConnector for RecordingConnector {
    fn connect(&self) -> Result<Box<dyn Store>, StoreWriteError> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(RecordingStore {
            batches: self.batches.clone(),
            fail: self.fail,
        }))
    }
}

/// Enricher that counts its calls and then writes like [`DirectWrite`].
#[derive(Clone, Default)]
pub struct CountingEnricher {
    pub calls: Arc<AtomicUsize>,
    pub containers_seen: Arc<Mutex<Vec<usize>>>,
}

impl CountingEnricher {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn containers_seen(&self) -> Vec<usize> {
        self.containers_seen.lock().unwrap().clone()
    }
}

#[async_trait]
impl MetadataEnricher for CountingEnricher {
    async fn enrich(
        &self,
        entry: &Payload,
        origin_ip: &str,
        store: &dyn Store,
    ) -> Result<bool, StoreWriteError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.containers_seen.lock().unwrap().push(entry.len());
        DirectWrite::default().enrich(entry, origin_ip, store).await
    }
}
