use mock_server::{AppState, BoardConfig};
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), std::io::Error> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let port = std::env::var("PORT").unwrap_or_else(|_| "3000".to_string());
    let addr = format!("127.0.0.1:{port}");
    let config = BoardConfig::from_env();
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!(addr = %addr, slug = %config.slug, "Mock board listening");
    mock_server::serve(listener, AppState::seeded(config)).await
}
