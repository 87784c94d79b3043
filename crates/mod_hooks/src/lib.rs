//! # Mod Hooks
//!
//! The steady-state interface between a host application and the extensions
//! attached to it. The host declares named extension points ("hooks") and
//! calls into them synchronously; extensions subscribe callbacks that observe
//! or rewrite what flows through.
//!
//! ## Dispatch strategies
//!
//! Every hook has exactly one [`Strategy`], fixed the first time the hook is
//! registered or subscribed to:
//!
//! - **Broadcast**: every subscriber sees the same arguments, nothing is returned.
//! - **Chain**: a running value is threaded through the subscribers, each one
//!   receiving the previous subscriber's output.
//! - **Override**: the host computes a baseline; the first subscriber whose
//!   answer differs from that baseline decides the result.
//!
//! A failing or panicking subscriber is logged and skipped. It never aborts
//! the dispatch and never reaches the host.
//!
//! ```rust
//! use mod_hooks::{HookCallback, HookTable};
//! use serde_json::json;
//!
//! let hooks = HookTable::new();
//! hooks
//!     .subscribe(
//!         "take_damage",
//!         HookCallback::chain(|_args, amount| Ok(json!(amount.as_i64().unwrap_or(0) * 2))),
//!         Some("double_damage"),
//!     )
//!     .unwrap();
//!
//! let dealt = hooks.dispatch_chain("take_damage", &json!({}), json!(3)).unwrap();
//! assert_eq!(dealt, json!(6));
//! ```

pub mod callback;
pub mod dispatch;
pub mod fields;
pub mod stats;
pub mod table;

pub use callback::{panic_message, HookCallback, Strategy, SubscriptionId};
pub use fields::{FieldCatalog, FieldKind, FieldStore, HookedFields, MapFieldStore};
pub use stats::HookStats;
pub use table::HookTable;

/// Hook names the runtime and the field capability dispatch on.
pub mod names {
    /// Broadcast, latched once every extension has been initialized.
    pub const FINISHED_LOADING: &str = "finished_loading";
    /// Override hook consulted on every field read.
    pub const GET_FIELD: &str = "get_field";
    /// Chain hook consulted on every field write.
    pub const SET_FIELD: &str = "set_field";
    /// Broadcast fired by the host right before it exits.
    pub const APPLICATION_QUIT: &str = "application_quit";
}

/// Errors raised by hook subscribers and by misuse of the hook table.
#[derive(Debug, thiserror::Error)]
pub enum HookError {
    #[error("Subscriber error: {0}")]
    Subscriber(String),
    #[error("Subscriber panicked: {0}")]
    Panicked(String),
    #[error("Hook '{hook}' dispatches as {expected}, not {requested}")]
    StrategyMismatch {
        hook: String,
        expected: Strategy,
        requested: Strategy,
    },
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl HookError {
    /// Shorthand for subscriber-authored failures.
    pub fn subscriber(message: impl Into<String>) -> Self {
        Self::Subscriber(message.into())
    }
}
