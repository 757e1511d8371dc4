// Time-series store side: points, InfluxDB line protocol, and the HTTP write client.

use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::time::Duration;

use async_trait::async_trait;
use tracing::instrument;

use crate::config::StoreConfig;
use crate::error::StoreWriteError;
use crate::models::{FieldValue, SummaryRecord};

/// Tag added to every point with the address the payload came from.
pub const REMOTE_IP_TAG: &str = "remote_ip";

/// One point as written to the store. Built from a record right before the write.
#[derive(Debug, Clone, PartialEq)]
pub struct WritePoint {
    pub measurement: String,
    pub tags: BTreeMap<String, String>,
    pub fields: BTreeMap<String, FieldValue>,
    /// UNIX seconds.
    pub timestamp: i64,
}

impl WritePoint {
    pub fn from_record(record: &SummaryRecord, origin_ip: &str) -> Self {
        let mut tags = record.tags.clone();
        tags.insert(REMOTE_IP_TAG.to_string(), origin_ip.to_string());
        Self {
            measurement: record.measurement.clone(),
            tags,
            fields: record.fields.clone(),
            timestamp: record.timestamp,
        }
    }

    /// Renders the point as one line of InfluxDB line protocol (second precision).
    pub fn to_line(&self) -> Result<String, StoreWriteError> {
        if self.fields.is_empty() {
            return Err(StoreWriteError::Encode(format!(
                "{}: point has no fields",
                self.measurement
            )));
        }
        let mut line = escape(&self.measurement, &[',', ' ']);
        for (k, v) in &self.tags {
            if v.is_empty() {
                continue;
            }
            let _ = write!(
                line,
                ",{}={}",
                escape(k, &[',', '=', ' ']),
                escape(v, &[',', '=', ' '])
            );
        }
        let mut sep = ' ';
        for (k, v) in &self.fields {
            let value = match v {
                FieldValue::Integer(i) => format!("{}i", i),
                FieldValue::Float(f) if f.is_finite() => format!("{}", f),
                FieldValue::Float(f) => {
                    return Err(StoreWriteError::Encode(format!(
                        "{}.{}: non-finite value {}",
                        self.measurement, k, f
                    )));
                }
                FieldValue::Boolean(b) => b.to_string(),
                FieldValue::Text(s) => format!("\"{}\"", escape(s, &['"', '\\'])),
            };
            let _ = write!(line, "{}{}={}", sep, escape(k, &[',', '=', ' ']), value);
            sep = ',';
        }
        let _ = write!(line, " {}", self.timestamp);
        Ok(line)
    }
}

/// Backslash-escapes `special`. Line breaks are always escaped so one point
/// can never span two lines of the batch.
fn escape(s: &str, special: &[char]) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            c => {
                if special.contains(&c) {
                    out.push('\\');
                }
                out.push(c);
            }
        }
    }
    out
}

/// A store connection. One `write_points` call is one batch: it lands or fails as a whole.
#[async_trait]
pub trait Store: Send + Sync {
    async fn write_points(&self, points: &[WritePoint]) -> Result<(), StoreWriteError>;
}

/// Hands out a fresh store connection for each writer invocation.
pub trait StoreConnector: Send + Sync {
    fn connect(&self) -> Result<Box<dyn Store>, StoreWriteError>;
}

/// InfluxDB 1.x over HTTP (`POST /write?db=..&precision=s`).
pub struct InfluxStore {
    write_url: String,
    database: String,
    username: String,
    password: String,
    client: reqwest::Client,
}

impl InfluxStore {
    pub fn connect(config: &StoreConfig) -> Result<Self, StoreWriteError> {
        let client = reqwest::Client::builder()
            .user_agent(crate::version::user_agent())
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            write_url: format!("http://{}:{}/write", config.host, config.port),
            database: config.database.clone(),
            username: config.username.clone(),
            password: config.password.clone(),
            client,
        })
    }
}

#[async_trait]
impl Store for InfluxStore {
    #[instrument(skip(self, points), fields(repo = "influx", operation = "write_points", points_count = points.len()))]
    async fn write_points(&self, points: &[WritePoint]) -> Result<(), StoreWriteError> {
        if points.is_empty() {
            return Ok(());
        }
        let mut body = String::new();
        for p in points {
            body.push_str(&p.to_line()?);
            body.push('\n');
        }
        let resp = self
            .client
            .post(&self.write_url)
            .query(&[
                ("db", self.database.as_str()),
                ("precision", "s"),
                ("u", self.username.as_str()),
                ("p", self.password.as_str()),
            ])
            .body(body)
            .send()
            .await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(StoreWriteError::Status { status, body });
        }
        Ok(())
    }
}

/// Builds an [`InfluxStore`] per invocation from the store config.
pub struct InfluxConnector {
    config: StoreConfig,
}

impl InfluxConnector {
    pub fn new(config: StoreConfig) -> Self {
        Self { config }
    }
}

impl StoreConnector for InfluxConnector {
    fn connect(&self) -> Result<Box<dyn Store>, StoreWriteError> {
        Ok(Box::new(InfluxStore::connect(&self.config)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn point() -> WritePoint {
        let mut fields = BTreeMap::new();
        fields.insert("tx_kb".to_string(), FieldValue::Float(1.5));
        fields.insert("tx_packets".to_string(), FieldValue::Integer(-3));
        let rec = SummaryRecord::new("network.usage", "web app", 1_700_000_000, fields);
        WritePoint::from_record(&rec, "10.0.0.5")
    }

    #[test]
    fn from_record_adds_remote_ip() {
        let p = point();
        assert_eq!(p.tags.get(REMOTE_IP_TAG).map(String::as_str), Some("10.0.0.5"));
        assert_eq!(p.tags.get("container_name").map(String::as_str), Some("web app"));
    }

    #[test]
    fn to_line_escapes_and_types_fields() {
        let line = point().to_line().unwrap();
        assert_eq!(
            line,
            "network.usage,container_name=web\\ app,remote_ip=10.0.0.5 tx_kb=1.5,tx_packets=-3i 1700000000"
        );
    }

    #[test]
    fn to_line_rejects_nan_and_empty_fields() {
        let mut p = point();
        p.fields
            .insert("bad".to_string(), FieldValue::Float(f64::NAN));
        assert!(matches!(p.to_line(), Err(StoreWriteError::Encode(_))));
        p.fields.clear();
        assert!(matches!(p.to_line(), Err(StoreWriteError::Encode(_))));
    }

    #[test]
    fn to_line_keeps_line_breaks_inside_one_line() {
        let mut fields = BTreeMap::new();
        fields.insert("total\r\nx".to_string(), FieldValue::Integer(1));
        fields.insert("note".to_string(), FieldValue::Text("a\nb".into()));
        let rec = SummaryRecord::new("cpu\nusage", "web\nevil,host=x value=666i 1", 5, fields);
        let line = WritePoint::from_record(&rec, "10.0.0.5").to_line().unwrap();
        assert_eq!(line.lines().count(), 1);
        assert!(!line.contains('\r'));
        assert_eq!(
            line,
            "cpu\\nusage,container_name=web\\nevil\\,host\\=x\\ value\\=666i\\ 1,remote_ip=10.0.0.5 note=\"a\\nb\",total\\r\\nx=1i 5"
        );
    }

    #[test]
    fn to_line_quotes_text_fields() {
        let mut fields = BTreeMap::new();
        fields.insert("note".to_string(), FieldValue::Text("say \"hi\"".into()));
        let rec = SummaryRecord::new("m", "c", 1, fields);
        let line = WritePoint::from_record(&rec, "ip").to_line().unwrap();
        assert_eq!(line, "m,container_name=c,remote_ip=ip note=\"say \\\"hi\\\"\" 1");
    }
}
