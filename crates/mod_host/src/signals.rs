//! Ending a session: wait for the user to quit, then tell the extensions.

use mod_hooks::{names, HookTable};
use serde_json::json;
use std::fmt;
use tracing::info;

/// The OS signal that ended the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuitSignal {
    Interrupt,
    Terminate,
}

impl fmt::Display for QuitSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QuitSignal::Interrupt => f.write_str("interrupt"),
            QuitSignal::Terminate => f.write_str("terminate"),
        }
    }
}

#[cfg(unix)]
async fn next_signal() -> anyhow::Result<QuitSignal> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut interrupt = signal(SignalKind::interrupt())?;
    let mut terminate = signal(SignalKind::terminate())?;
    let received = tokio::select! {
        _ = interrupt.recv() => QuitSignal::Interrupt,
        _ = terminate.recv() => QuitSignal::Terminate,
    };
    Ok(received)
}

#[cfg(not(unix))]
async fn next_signal() -> anyhow::Result<QuitSignal> {
    tokio::signal::ctrl_c().await?;
    Ok(QuitSignal::Interrupt)
}

/// Waits for an interrupt or terminate signal, then broadcasts
/// [`names::APPLICATION_QUIT`] with the signal as the reason.
///
/// # Arguments
///
/// * `hooks` - Table the quit broadcast goes through
///
/// # Returns
///
/// The signal that was received, or an error if the signal handlers could
/// not be installed.
pub async fn quit_on_signal(hooks: &HookTable) -> anyhow::Result<QuitSignal> {
    let received = next_signal().await?;
    info!("🛑 Received {} signal, quitting", received);
    announce_quit(hooks, &received.to_string())?;
    Ok(received)
}

/// Broadcasts [`names::APPLICATION_QUIT`] with `{"reason": reason}`.
pub fn announce_quit(hooks: &HookTable, reason: &str) -> anyhow::Result<()> {
    hooks.dispatch_broadcast(names::APPLICATION_QUIT, &json!({ "reason": reason }))?;
    Ok(())
}
