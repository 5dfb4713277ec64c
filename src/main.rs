use std::sync::Arc;

use ravennakit::config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Arc::new(Config::load()?);
    simple_logger::init_with_level(config.log.level.as_level())?;

    let _node = ravennakit::node_main(config).await?;
    tokio::signal::ctrl_c().await?;

    log::info!("shutting down");
    Ok(())
}
