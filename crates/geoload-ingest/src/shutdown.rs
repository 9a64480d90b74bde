//! Interrupt handling for the post-completion wait
//!
//! Handlers are registered when [`ShutdownSignal::install`] is called, so a
//! signal delivered while the pipeline is still running is held and only
//! observed by [`ShutdownSignal::recv`] once the run is over. Without
//! registered handlers the default disposition applies and an interrupt ends
//! the process.

use geoload_common::{GeoloadError, Result};

#[cfg(unix)]
use tokio::signal::unix::{signal, Signal, SignalKind};

/// Registered SIGINT/SIGTERM listeners
pub struct ShutdownSignal {
    #[cfg(unix)]
    interrupt: Signal,
    #[cfg(unix)]
    terminate: Signal,
}

impl ShutdownSignal {
    /// Register the handlers. Must be called from within a tokio runtime.
    #[cfg(unix)]
    pub fn install() -> Result<Self> {
        let register = |kind: SignalKind, name: &str| {
            signal(kind).map_err(|e| {
                GeoloadError::startup(format!("failed to install {name} handler: {e}"))
            })
        };

        Ok(Self {
            interrupt: register(SignalKind::interrupt(), "SIGINT")?,
            terminate: register(SignalKind::terminate(), "SIGTERM")?,
        })
    }

    #[cfg(not(unix))]
    pub fn install() -> Result<Self> {
        Ok(Self {})
    }

    /// Register the handlers only when `enabled`.
    pub fn install_if(enabled: bool) -> Result<Option<Self>> {
        if enabled {
            Self::install().map(Some)
        } else {
            Ok(None)
        }
    }

    /// Wait for the first interrupt or termination request.
    #[cfg(unix)]
    pub async fn recv(&mut self) {
        tokio::select! {
            _ = self.interrupt.recv() => {
                tracing::info!("Received SIGINT");
            },
            _ = self.terminate.recv() => {
                tracing::info!("Received SIGTERM");
            },
        }
    }

    #[cfg(not(unix))]
    pub async fn recv(&mut self) {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", e);
            return;
        }
        tracing::info!("Received Ctrl+C");
    }
}
