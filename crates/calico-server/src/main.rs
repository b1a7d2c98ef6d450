use calico_proto::config::Config;
use calico_server::{http, store::RatingStore};
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info,calico_server=debug")),
        )
        .init();

    let config = Config::load()?;
    info!("Config loaded from: {:?}", Config::config_path());

    let store = RatingStore::open(&config.server.database)?;
    let app = http::router(store, config.server.static_dir.clone());

    let server = http::start_server(config.server.bind_address.clone(), config.server.port, app);
    server.await??;

    info!("Server stopped");
    Ok(())
}
