use mock_server::{AppState, DEFAULT_CSRF_TOKEN};
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), std::io::Error> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let port = std::env::var("PORT").unwrap_or_else(|_| "3000".to_string());
    let csrf_token =
        std::env::var("MOCK_CSRF_TOKEN").unwrap_or_else(|_| DEFAULT_CSRF_TOKEN.to_string());
    let addr = format!("127.0.0.1:{port}");
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!(%addr, "mock reporting backend listening");
    mock_server::run(listener, AppState::seeded(&csrf_token)).await
}
