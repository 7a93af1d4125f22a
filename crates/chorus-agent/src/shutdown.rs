// SPDX-FileCopyrightText: 2026 Chorus Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Process signal handling.
//!
//! SIGTERM and SIGINT (Ctrl+C) cancel a [`CancellationToken`] that the entry
//! point waits on before stopping every session.

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Install handlers for SIGTERM and SIGINT.
///
/// Returns a token cancelled when either signal arrives. If SIGTERM cannot be
/// hooked, only Ctrl+C triggers shutdown.
pub fn install_signal_handler() -> CancellationToken {
    let token = CancellationToken::new();
    let trigger = token.clone();

    tokio::spawn(async move {
        let ctrl_c = tokio::signal::ctrl_c();

        #[cfg(unix)]
        {
            use tokio::signal::unix::{SignalKind, signal};

            match signal(SignalKind::terminate()) {
                Ok(mut sigterm) => {
                    tokio::select! {
                        _ = ctrl_c => info!("received SIGINT, shutting down"),
                        _ = sigterm.recv() => info!("received SIGTERM, shutting down"),
                        _ = trigger.cancelled() => return,
                    }
                }
                Err(e) => {
                    warn!(error = %e, "cannot install SIGTERM handler, only Ctrl+C stops the service");
                    tokio::select! {
                        _ = ctrl_c => info!("received SIGINT, shutting down"),
                        _ = trigger.cancelled() => return,
                    }
                }
            }
        }

        #[cfg(not(unix))]
        {
            tokio::select! {
                _ = ctrl_c => info!("received Ctrl+C, shutting down"),
                _ = trigger.cancelled() => return,
            }
        }

        trigger.cancel();
        debug!("signal handler finished");
    });

    token
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn token_starts_uncancelled() {
        let token = install_signal_handler();
        assert!(!token.is_cancelled());
        token.cancel();
    }
}
