// Windowed per-container sampling. One task per container, all joined before
// anything is aggregated.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::StreamExt;
use futures_util::stream::{BoxStream, Stream};
use tokio::sync::Semaphore;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::error::SampleError;
use crate::models::{ContainerTarget, Sample, SampleSeries};

/// Anything that can list running containers and stream per-second samples for one.
#[async_trait]
pub trait StatsSource: Send + Sync {
    async fn list_running(&self) -> anyhow::Result<Vec<ContainerTarget>>;

    fn stats_stream(&self, id: &str) -> BoxStream<'static, Result<Sample, SampleError>>;
}

/// Stop after `max_samples` samples or once `duration` has elapsed, whichever comes first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SampleWindow {
    pub max_samples: usize,
    pub duration: Duration,
}

impl SampleWindow {
    /// One sample per second for `secs` seconds.
    pub fn per_second(secs: u64) -> Self {
        Self {
            max_samples: secs as usize,
            duration: Duration::from_secs(secs),
        }
    }
}

/// Outcome of sampling one container. An `Err` series is left out of the payload.
#[derive(Debug)]
pub struct SampledContainer {
    pub target: ContainerTarget,
    pub series: Result<SampleSeries, SampleError>,
}

/// Drains `stream` into a series for one window.
///
/// A stream that ends early yields what it produced so far. A stream error
/// discards everything collected: the run is invalid, not short.
pub async fn collect_window<S>(stream: S, window: SampleWindow) -> Result<SampleSeries, SampleError>
where
    S: Stream<Item = Result<Sample, SampleError>>,
{
    tokio::pin!(stream);
    let deadline = Instant::now() + window.duration;
    let mut series = SampleSeries::with_capacity(window.max_samples);

    while series.len() < window.max_samples {
        let next = match tokio::time::timeout_at(deadline, stream.next()).await {
            Ok(next) => next,
            Err(_) => break,
        };
        match next {
            Some(Ok(sample)) => series.push(sample)?,
            Some(Err(e)) => return Err(e),
            None => break,
        }
    }

    if series.is_empty() {
        return Err(SampleError::Empty);
    }
    Ok(series)
}

/// Samples every target concurrently and waits for all of them.
///
/// `max_concurrent == 0` means no cap. A failing container never affects the others.
pub async fn sample_all(
    source: Arc<dyn StatsSource>,
    targets: Vec<ContainerTarget>,
    window: SampleWindow,
    max_concurrent: usize,
) -> Vec<SampledContainer> {
    let limit = (max_concurrent > 0).then(|| Arc::new(Semaphore::new(max_concurrent)));

    let handles: Vec<_> = targets
        .into_iter()
        .map(|target| {
            let source = source.clone();
            let limit = limit.clone();
            let id = target.id.clone();
            let handle = tokio::spawn(async move {
                let _permit = match limit {
                    Some(sem) => match sem.acquire_owned().await {
                        Ok(p) => Some(p),
                        Err(e) => return Err(SampleError::Task(e.to_string())),
                    },
                    None => None,
                };
                collect_window(source.stats_stream(&id), window).await
            });
            (target, handle)
        })
        .collect();

    let mut out = Vec::with_capacity(handles.len());
    for (target, handle) in handles {
        let series = match handle.await {
            Ok(r) => r,
            Err(e) => Err(SampleError::Task(e.to_string())),
        };
        match &series {
            Ok(s) => debug!(container = %target.id, samples = s.len(), "sampled container"),
            Err(e) => warn!(container = %target.id, error = %e, "discarding invalid series"),
        }
        out.push(SampledContainer { target, series });
    }
    out
}
