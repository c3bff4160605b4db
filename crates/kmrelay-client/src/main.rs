//! kmrelay demo binary: connect to a relay box, enable monitor mode, and
//! log every composite report until Enter is pressed.
//!
//! Usage:
//! ```bash
//! kmrelay [path/to/kmrelay.toml]
//! ```
//! A missing config file falls back to defaults; `RUST_LOG` overrides the
//! configured log level.

use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use tracing::info;
use tracing_subscriber::EnvFilter;

use kmrelay_client::{CompletionSignal, ControlChannel, DeviceConfig, ReportListener};

fn main() -> anyhow::Result<()> {
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "kmrelay.toml".to_string());
    let config = if Path::new(&config_path).exists() {
        DeviceConfig::load(Path::new(&config_path))
            .with_context(|| format!("loading {config_path}"))?
    } else {
        DeviceConfig::default()
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config.log_level.clone())),
        )
        .init();

    let device_addr = config.device_addr()?;
    info!(%device_addr, "connecting to relay box");
    let control =
        Arc::new(ControlChannel::connect(device_addr).context("opening control channel")?);

    let listener = ReportListener::new(control);
    listener.set_handler(|report| {
        info!(
            x = report.x,
            y = report.y,
            wheel = report.wheel,
            buttons = report.buttons.0,
            modifiers = report.modifiers.0,
            keys = ?report.keys,
            "report"
        );
    });

    let done = Arc::new(CompletionSignal::new());
    listener.start(Some(Arc::clone(&done)))?;
    info!("monitoring; press Enter to stop");

    let mut line = String::new();
    let _ = std::io::stdin().read_line(&mut line);

    listener.stop();
    done.wait();
    info!("listener stopped");
    Ok(())
}
