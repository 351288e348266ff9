//! airtouch - Airtouch2+ controller daemon
//!
//! Connects to the touchpad controller, keeps the connection alive and logs
//! every AC and zone status report it receives.

use airtouch_client::{Client, Config, StatusEvent};
use tokio::sync::broadcast::error::RecvError;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // Load configuration (from file if AIRTOUCH_CONFIG is set, then env overrides)
    let config = match Config::load() {
        Ok(c) => c,
        Err(e) => {
            tracing::error!("Failed to load config: {}", e);
            return Err(e.into());
        }
    };

    tracing::info!("Starting airtouch");
    tracing::info!(
        "  Controller: {}:{}",
        config.controller.host,
        config.controller.port
    );
    tracing::info!(
        "  Group poll interval: {}s",
        config.polling.group_poll_interval_secs
    );
    tracing::info!("  Reconnect cooldown: {}s", config.reconnect.cooldown_secs);

    let client = Client::new(config.connection_config());
    let mut events = client.subscribe();
    client.start().await;

    loop {
        tokio::select! {
            event = events.recv() => match event {
                Ok(event) => log_event(&event),
                Err(RecvError::Lagged(n)) => {
                    tracing::warn!("Status subscriber lagged, {} events dropped", n);
                }
                Err(RecvError::Closed) => break,
            },
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Received shutdown signal, closing connection...");
                break;
            }
        }
    }

    client.close().await?;
    tracing::info!("Stopped");
    Ok(())
}

fn log_event(event: &StatusEvent) {
    match event {
        StatusEvent::Ac(units) => {
            for ac in units {
                tracing::info!(
                    "AC {}: {:?} {:?} fan={:?} target={:.1} current={:.1} error={}",
                    ac.unit,
                    ac.power,
                    ac.mode,
                    ac.fan_speed,
                    ac.target_temperature,
                    ac.current_temperature,
                    ac.error_code
                );
            }
        }
        StatusEvent::Groups(groups) => {
            for group in groups {
                tracing::info!(
                    "Zone {}: {:?} damper={}%{}{}",
                    group.group,
                    group.power,
                    group.damper_percent,
                    if group.has_turbo { " turbo" } else { "" },
                    if group.has_spill { " spill" } else { "" }
                );
            }
        }
    }
}
