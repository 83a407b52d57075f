use ledgerly_infra::LedgerConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = LedgerConfig::from_env()?;
    ledgerly_observability::init(&config.log);

    let app = ledgerly_api::app::build_app(&config).await?;

    let listener = tokio::net::TcpListener::bind(config.http_addr).await?;

    tracing::info!("listening on {}", listener.local_addr()?);

    axum::serve(listener, app).await?;
    Ok(())
}
