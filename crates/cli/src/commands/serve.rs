//! `parley serve`: Start the HTTP gateway.

use super::runtime;
use parley_config::AppConfig;

pub async fn run(
    host_override: Option<String>,
    port_override: Option<u16>,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;
    if let Some(host) = host_override {
        config.gateway.host = host;
    }
    if let Some(port) = port_override {
        config.gateway.port = port;
    }
    config.validate()?;

    let runtime = runtime::build(config).await?;
    let gateway = runtime.config.gateway.clone();

    println!("Parley Gateway");
    println!("   Listening: http://{}:{}", gateway.host, gateway.port);
    println!("   Provider:  {} ({})", runtime.config.generation.provider, runtime.config.generation.model);
    println!("   Chunks:    {}", runtime.engine.retriever().index().len());

    parley_gateway::start(gateway, runtime.engine).await
}
