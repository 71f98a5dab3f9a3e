//! `hrdesk serve`: Start the web UI and HTTP API.

use std::path::Path;

use hrdesk_gateway::GatewayState;

pub async fn run(config_path: Option<&Path>, port_override: Option<u16>) -> anyhow::Result<()> {
    let mut config = super::load_config(config_path)?;
    if let Some(port) = port_override {
        config.gateway.port = port;
    }

    let runtime = super::bootstrap(config)?;
    let gateway = &runtime.config.gateway;

    println!("🤖 HRDesk");
    println!("   Listening: http://{}:{}", gateway.host, gateway.port);
    println!("   Model:     {}", runtime.config.provider.model);
    println!("   Knowledge: {}", runtime.config.knowledge.path.display());

    let state = GatewayState::new(runtime.config, runtime.engine, runtime.diagnostics);
    hrdesk_gateway::start(state).await?;

    Ok(())
}
