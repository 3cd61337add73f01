use anyhow::Result;
use axum::Router;
use solar_fleet_monitor::{api, config, controller, telemetry};
use config::Config;
use telemetry::init_tracing;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();
    init_tracing();

    let cfg = Config::load()?;

    if cfg.auth.token.trim().is_empty() {
        anyhow::bail!(
            "auth token is not set: export SOLAR__AUTH__TOKEN with a random secret (e.g. openssl rand -base64 32)"
        );
    }

    let app_state = controller::AppState::new(&cfg).await?;

    #[allow(unused_mut)]
    let mut app: Router = api::router(app_state.clone(), &cfg);

    #[cfg(feature = "metrics")]
    {
        app = api::with_metrics(app, &app_state);
    }

    let addr = cfg.server.socket_addr()?;
    if cfg.server.host == "0.0.0.0" {
        warn!("binding to 0.0.0.0, the API is reachable from the network");
    }

    info!(%addr, "starting solar fleet monitor");

    controller::spawn_controller_tasks(app_state.clone(), &cfg);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(telemetry::shutdown_signal())
        .await?;

    info!("shutdown complete");
    Ok(())
}
