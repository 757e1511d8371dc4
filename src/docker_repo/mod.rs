// Docker container stats via bollard

mod stats;

pub use stats::to_sample;

use crate::error::SampleError;
use crate::models::{ContainerTarget, Sample};
use crate::sampler::StatsSource;
use async_trait::async_trait;
use bollard::{ClientVersion, Docker};
use bollard::query_parameters::{
    InspectContainerOptions, ListContainersOptions, StatsOptions,
};
use bollard::models::ContainerSummary;
use futures_util::StreamExt;
use futures_util::stream::BoxStream;
use std::collections::HashMap;
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// Container names containing this are taken for a cAdvisor instance.
const CADVISOR_NAME_HINT: &str = "cadvisor";

const DOCKER_SOCKET: &str = "/var/run/docker.sock";
const DOCKER_TIMEOUT_SECS: u64 = 120;

/// Parses `major.minor` (e.g. `1.41`) into a bollard client version.
pub fn parse_api_version(s: &str) -> anyhow::Result<ClientVersion> {
    let (major, minor) = s
        .trim()
        .split_once('.')
        .ok_or_else(|| anyhow::anyhow!("expected MAJOR.MINOR, got {:?}", s))?;
    Ok(ClientVersion {
        major_version: major.parse()?,
        minor_version: minor.parse()?,
    })
}

pub struct DockerRepo {
    docker: Docker,
}

impl DockerRepo {
    /// Connects over the local socket. `api_version` pins the Docker API
    /// version instead of bollard's default.
    pub fn connect(api_version: Option<&str>) -> anyhow::Result<Self> {
        let docker = match api_version {
            Some(v) => {
                let version = parse_api_version(v)?;
                Docker::connect_with_unix(DOCKER_SOCKET, DOCKER_TIMEOUT_SECS, &version)?
            }
            None => Docker::connect_with_unix_defaults()?,
        };
        Ok(Self { docker })
    }

    async fn running_containers(&self) -> anyhow::Result<Vec<ContainerSummary>> {
        let mut filters = HashMap::new();
        filters.insert("status".to_string(), vec!["running".to_string()]);

        let filter = ListContainersOptions {
            all: false,
            filters: Some(filters),
            ..Default::default()
        };
        Ok(self.docker.list_containers(Some(filter)).await?)
    }

    /// Finds a running cAdvisor container and returns its API base URL
    /// (`http://<gateway>:<public port>/api/v1.2`).
    pub async fn discover_cadvisor(&self) -> anyhow::Result<Option<String>> {
        let containers = self.running_containers().await?;
        let Some(c) = containers.iter().find(|c| {
            c.names
                .as_ref()
                .is_some_and(|n| n.iter().any(|n| n.contains(CADVISOR_NAME_HINT)))
        }) else {
            return Ok(None);
        };

        let Some(port) = c
            .ports
            .as_ref()
            .and_then(|p| p.iter().find_map(|p| p.public_port))
        else {
            warn!("cAdvisor container found but it publishes no port");
            return Ok(None);
        };
        let id = c.id.clone().unwrap_or_default();
        let inspect = self
            .docker
            .inspect_container(&id, None::<InspectContainerOptions>)
            .await?;
        let gateway = inspect
            .network_settings
            .and_then(|n| n.networks)
            .and_then(|nets| {
                nets.into_values()
                    .filter_map(|ep| ep.gateway)
                    .find(|gw| !gw.is_empty())
            });

        Ok(gateway.map(|gw| {
            let url = format!("http://{}:{}/api/v1.2", gw, port);
            debug!(url = %url, "discovered cAdvisor");
            url
        }))
    }
}

#[async_trait]
impl StatsSource for DockerRepo {
    async fn list_running(&self) -> anyhow::Result<Vec<ContainerTarget>> {
        let containers = self.running_containers().await?;
        Ok(containers
            .iter()
            .filter_map(|c| {
                let id = c.id.clone()?;
                let aliases = c
                    .names
                    .as_ref()
                    .map(|n| {
                        n.iter()
                            .map(|n| n.trim_start_matches('/').to_string())
                            .collect()
                    })
                    .unwrap_or_default();
                Some(ContainerTarget { id, aliases })
            })
            .collect())
    }

    /// Streams samples from the daemon's stats endpoint. The stream is pumped
    /// by its own task and stops when the consumer drops the returned stream.
    fn stats_stream(&self, id: &str) -> BoxStream<'static, Result<Sample, SampleError>> {
        let docker = self.docker.clone();
        let id = id.to_string();
        let (tx, rx) = mpsc::channel::<Result<Sample, SampleError>>(1);

        tokio::spawn(async move {
            let options = StatsOptions {
                stream: true,
                ..Default::default()
            };
            let mut stream = docker.stats(&id, Some(options));

            while let Some(result) = stream.next().await {
                let item = match result {
                    Ok(s) => stats::to_sample(&s),
                    Err(e) => Err(SampleError::Stream(e)),
                };
                let failed = item.is_err();
                if tx.send(item).await.is_err() || failed {
                    break;
                }
            }
            debug!(container = %id, "stats stream closed");
        });

        futures_util::stream::unfold(rx, |mut rx| async move {
            rx.recv().await.map(|item| (item, rx))
        })
        .boxed()
    }
}
