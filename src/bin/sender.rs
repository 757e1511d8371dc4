// Runs one collection cycle and exits; schedule it externally (e.g. cron, every minute).

use anyhow::Result;
use dockstats::*;

#[tokio::main]
async fn main() -> Result<()> {
    logging::init();

    let app_config = config::AppConfig::load()?;
    let sender = &app_config.sender;
    tracing::info!(
        version = version::VERSION,
        collector_url = %sender.collector_url,
        match_policy = ?sender.match_policy,
        "starting collection cycle"
    );

    match cycle::run_once(sender).await {
        Ok(report) => {
            tracing::debug!(?report, "collection cycle finished");
            Ok(())
        }
        Err(e) => {
            tracing::error!(error = %e, "collection cycle failed; this cycle's data is lost");
            Err(e)
        }
    }
}
