//! OS signal handling for the scheduler process.

use std::sync::Arc;

use jobsync_core::CancellationToken;
use tokio::sync::Notify;
use tracing::info;

/// Routes process signals to the scheduler.
///
/// SIGTERM and SIGINT cancel `shutdown`. SIGHUP forces an immediate poll.
#[derive(Clone)]
pub(crate) struct SignalHandler {
    shutdown: CancellationToken,
    poll_trigger: Arc<Notify>,
}

impl SignalHandler {
    pub(crate) fn new(shutdown: CancellationToken, poll_trigger: Arc<Notify>) -> Self {
        Self {
            shutdown,
            poll_trigger,
        }
    }

    pub(crate) fn request_shutdown(&self) {
        self.shutdown.cancel();
    }

    pub(crate) fn request_poll(&self) {
        self.poll_trigger.notify_one();
    }

    /// Set up OS signal handlers (Unix only).
    #[cfg(unix)]
    pub(crate) fn install(&self) -> anyhow::Result<()> {
        use tokio::signal::unix::{SignalKind, signal};

        let mut sigterm = signal(SignalKind::terminate())?;
        let handler = self.clone();
        tokio::spawn(async move {
            while sigterm.recv().await.is_some() {
                info!("Received SIGTERM");
                handler.request_shutdown();
            }
        });

        let mut sigint = signal(SignalKind::interrupt())?;
        let handler = self.clone();
        tokio::spawn(async move {
            while sigint.recv().await.is_some() {
                info!("Received SIGINT");
                handler.request_shutdown();
            }
        });

        let mut sighup = signal(SignalKind::hangup())?;
        let handler = self.clone();
        tokio::spawn(async move {
            while sighup.recv().await.is_some() {
                info!("Received SIGHUP - polling definitions now");
                handler.request_poll();
            }
        });

        info!("OS signal handlers installed (SIGTERM, SIGINT, SIGHUP)");
        Ok(())
    }

    /// Set up OS signal handlers (non-Unix fallback).
    #[cfg(not(unix))]
    pub(crate) fn install(&self) -> anyhow::Result<()> {
        let handler = self.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("Received Ctrl+C");
                handler.request_shutdown();
            }
        });

        info!("Ctrl+C handler installed");
        Ok(())
    }
}
