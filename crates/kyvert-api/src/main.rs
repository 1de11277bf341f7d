//! kyvert-server — serve the policy conversion API.

use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("kyvert=info,tower_http=info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let addr = std::env::var("KYVERT_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".to_string());
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(%addr, "kyvert api listening");

    axum::serve(listener, kyvert_api::app()).await?;
    Ok(())
}
