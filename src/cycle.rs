// One sender cycle: sample every container, keep the ones the policy wants,
// roll them up and POST the lot to the collector.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, instrument, warn};

use crate::aggregation::aggregate_series;
use crate::cadvisor_repo::CadvisorRepo;
use crate::config::SenderConfig;
use crate::docker_repo::DockerRepo;
use crate::filter::MatchPolicy;
use crate::models::Payload;
use crate::sampler::{SampleWindow, SampledContainer, StatsSource, sample_all};
use crate::transport::Transport;

/// What happened to the containers of one cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub sampled: usize,
    pub reported: usize,
    /// Matched, but the series was broken or empty.
    pub invalid: usize,
    /// No alias accepted by the match policy.
    pub skipped: usize,
}

/// Filters and aggregates sampled containers into the payload for one cycle.
pub fn build_payload(sampled: Vec<SampledContainer>, policy: &MatchPolicy) -> (Payload, CycleReport) {
    let mut report = CycleReport {
        sampled: sampled.len(),
        ..Default::default()
    };
    let mut payload = Payload::new();

    for SampledContainer { target, series } in sampled {
        let Some(name) = policy.select_name(&target.aliases) else {
            debug!(container = %target.id, "no alias matched; skipping");
            report.skipped += 1;
            continue;
        };
        let series = match series {
            Ok(s) => s,
            Err(e) => {
                warn!(container = %name, error = %e, "series invalid; left out of this cycle");
                report.invalid += 1;
                continue;
            }
        };
        match aggregate_series(&name, &series) {
            Some(records) => {
                payload.insert(name, records);
                report.reported += 1;
            }
            None => report.invalid += 1,
        }
    }
    (payload, report)
}

/// Runs one cycle against the configured source and sends the result.
/// A failed send is returned as an error wrapping [`crate::error::TransportError`].
pub async fn run_once(config: &SenderConfig) -> anyhow::Result<CycleReport> {
    let cadvisor_url = match &config.cadvisor_url {
        Some(url) => Some(url.clone()),
        None if config.discover_cadvisor => match DockerRepo::connect(config.docker_api_version.as_deref()) {
            Ok(docker) => docker.discover_cadvisor().await.unwrap_or_else(|e| {
                warn!(error = %e, "cAdvisor discovery failed");
                None
            }),
            Err(_) => None,
        },
        None => None,
    };

    match cadvisor_url {
        Some(url) => {
            info!(url = %url, "using cAdvisor stats source");
            let sampled = CadvisorRepo::new(&url)?.fetch().await?;
            finish(sampled, config).await
        }
        None => {
            info!("using Docker stats source");
            let docker: Arc<dyn StatsSource> = Arc::new(DockerRepo::connect(config.docker_api_version.as_deref())?);
            run_with_source(docker, config).await
        }
    }
}

/// Samples every running container of `source` for one window, then sends.
#[instrument(skip(source, config), fields(interval_secs = config.interval_secs))]
pub async fn run_with_source(
    source: Arc<dyn StatsSource>,
    config: &SenderConfig,
) -> anyhow::Result<CycleReport> {
    let targets = source.list_running().await?;
    let window = SampleWindow::per_second(config.interval_secs);
    let sampled = sample_all(source, targets, window, config.max_concurrent_samplers).await;
    finish(sampled, config).await
}

async fn finish(sampled: Vec<SampledContainer>, config: &SenderConfig) -> anyhow::Result<CycleReport> {
    let (payload, report) = build_payload(sampled, &config.match_policy());
    let transport = Transport::new(
        &config.collector_url,
        Duration::from_secs(config.send_timeout_secs),
    )?;
    if let Err(e) = transport.send(&payload).await {
        if e.is_timeout() {
            warn!(
                endpoint = %transport.endpoint(),
                send_timeout_secs = config.send_timeout_secs,
                "collector did not answer in time; cycle data dropped"
            );
        } else {
            warn!(endpoint = %transport.endpoint(), error = %e, "send failed; cycle data dropped");
        }
        return Err(e.into());
    }
    info!(
        reported = report.reported,
        invalid = report.invalid,
        skipped = report.skipped,
        "cycle complete"
    );
    Ok(report)
}
