use anyhow::Context;
use plaza_server::config::ServerConfig;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = ServerConfig::from_env()?;

    // Validate configuration before starting
    config.validate()?;

    tracing::info!(
        "Starting plaza server on {} (public dir {}, broadcast {:?})",
        config.listen_addr,
        config.public_dir.display(),
        config.broadcast
    );

    let listener = tokio::net::TcpListener::bind(&config.listen_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.listen_addr))?;
    println!("Server is running on {}", listener.local_addr()?);

    plaza_server::serve(listener, config)
        .await
        .context("server error")
}
