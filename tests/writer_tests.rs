// Writer tests: direct write semantics, ignore_fail, and the InfluxDB HTTP client

mod common;

use common::{RecordingConnector, record};
use dockstats::config::StoreConfig;
use dockstats::error::StoreWriteError;
use dockstats::models::Payload;
use dockstats::store::{InfluxStore, REMOTE_IP_TAG, Store, StoreConnector, WritePoint};
use dockstats::writer::{DirectWrite, MetadataEnricher, WriteJob, write_job};
use mockito::Matcher;

fn payload_c1() -> Payload {
    let mut p = Payload::new();
    p.insert(
        "c1".to_string(),
        vec![
            record("cpu.usage", "c1", 100),
            record("memory.usage", "c1", 100),
            record("network.usage", "c1", 100),
        ],
    );
    p
}

#[tokio::test]
async fn test_direct_write_tags_every_point_with_origin_ip() {
    let connector = RecordingConnector::default();
    let store = connector.connect().unwrap();
    let ok = DirectWrite::default()
        .enrich(&payload_c1(), "10.0.0.5", store.as_ref())
        .await
        .unwrap();
    assert!(ok);

    let batches = connector.batches();
    assert_eq!(batches.len(), 1);
    assert_eq!(batches[0].len(), 3);
    for p in &batches[0] {
        assert_eq!(p.tags.get(REMOTE_IP_TAG).map(String::as_str), Some("10.0.0.5"));
        assert_eq!(p.tags.get("container_name").map(String::as_str), Some("c1"));
        assert_eq!(p.timestamp, 100);
    }
}

#[tokio::test]
async fn test_direct_write_surfaces_store_failure_by_default() {
    let connector = RecordingConnector::failing();
    let store = connector.connect().unwrap();
    let err = DirectWrite::default()
        .enrich(&payload_c1(), "10.0.0.5", store.as_ref())
        .await
        .unwrap_err();
    assert!(matches!(err, StoreWriteError::Encode(_)));
}

#[tokio::test]
async fn test_direct_write_ignore_fail_suppresses_store_failure() {
    let connector = RecordingConnector::failing();
    let store = connector.connect().unwrap();
    let ok = DirectWrite::new(true)
        .enrich(&payload_c1(), "10.0.0.5", store.as_ref())
        .await
        .unwrap();
    assert!(ok);
}

#[tokio::test]
async fn test_write_job_opens_a_fresh_connection_each_time() {
    let connector = RecordingConnector::default();
    let job = WriteJob {
        payload: payload_c1(),
        origin_ip: "10.0.0.5".to_string(),
    };
    let enricher = DirectWrite::default();
    write_job(&job, &connector, &enricher).await.unwrap();
    write_job(&job, &connector, &enricher).await.unwrap();
    assert_eq!(connector.connects(), 2);
    assert_eq!(connector.batches().len(), 2);
}

fn store_config(server: &mockito::ServerGuard) -> StoreConfig {
    let addr = server.socket_address();
    StoreConfig {
        host: addr.ip().to_string(),
        port: addr.port(),
        database: "metrics".to_string(),
        username: "root".to_string(),
        password: "pw".to_string(),
        timeout_secs: 5,
        ignore_fail: false,
    }
}

fn points() -> Vec<WritePoint> {
    payload_c1()["c1"]
        .iter()
        .map(|r| WritePoint::from_record(r, "10.0.0.5"))
        .collect()
}

#[tokio::test]
async fn test_influx_store_posts_line_protocol_batch() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/write")
        .match_query(Matcher::AllOf(vec![
            Matcher::UrlEncoded("db".into(), "metrics".into()),
            Matcher::UrlEncoded("precision".into(), "s".into()),
            Matcher::UrlEncoded("u".into(), "root".into()),
        ]))
        .match_body(Matcher::Regex(
            "^cpu.usage,container_name=c1,remote_ip=10.0.0.5 total=1i 100\n".into(),
        ))
        .with_status(204)
        .expect(1)
        .create_async()
        .await;

    let store = InfluxStore::connect(&store_config(&server)).unwrap();
    store.write_points(&points()).await.unwrap();
    mock.assert_async().await;
}

#[tokio::test]
async fn test_influx_store_reports_rejected_batch() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("POST", "/write")
        .match_query(Matcher::Any)
        .with_status(400)
        .with_body("{\"error\":\"partial write\"}")
        .create_async()
        .await;

    let store = InfluxStore::connect(&store_config(&server)).unwrap();
    let err = store.write_points(&points()).await.unwrap_err();
    match err {
        StoreWriteError::Status { status, body } => {
            assert_eq!(status.as_u16(), 400);
            assert!(body.contains("partial write"));
        }
        other => panic!("unexpected error: {other}"),
    }
}
