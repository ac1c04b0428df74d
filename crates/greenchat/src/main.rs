use std::sync::Arc;

use greenchat_core::{config::Config, gateway::Gateway};
use greenchat_http::GreenApiClient;
use tracing::info;

mod console;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    greenchat_core::logging::init("greenchat")?;

    let cfg = Config::load()?;
    info!(
        "gateway {} (poll every {:?}, history {})",
        cfg.api_url, cfg.poll_interval, cfg.history_count
    );

    let gateway: Arc<dyn Gateway> =
        Arc::new(GreenApiClient::new(cfg.api_url.clone(), cfg.request_timeout)?);

    console::run(&cfg, gateway).await
}
