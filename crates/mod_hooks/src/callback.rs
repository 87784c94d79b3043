/// Subscriber callbacks, strategy tags and the panic guard they run under.
use crate::HookError;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::any::Any;
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use uuid::Uuid;

/// How a hook resolves the answers of its subscribers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Strategy {
    Broadcast,
    Chain,
    Override,
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Strategy::Broadcast => "broadcast",
            Strategy::Chain => "chain",
            Strategy::Override => "override",
        };
        f.write_str(label)
    }
}

pub type BroadcastFn = dyn Fn(&Value) -> Result<(), HookError> + Send + Sync;
pub type ChainFn = dyn Fn(&Value, Value) -> Result<Value, HookError> + Send + Sync;
pub type OverrideFn = dyn Fn(&Value, &Value) -> Result<Value, HookError> + Send + Sync;

/// A subscriber callback. The variant doubles as the strategy hint when the
/// hook does not exist yet.
#[derive(Clone)]
pub enum HookCallback {
    /// Receives the dispatch arguments.
    Broadcast(Arc<BroadcastFn>),
    /// Receives the arguments and the running value, returns the next value.
    Chain(Arc<ChainFn>),
    /// Receives the arguments and the host baseline, returns its answer.
    Override(Arc<OverrideFn>),
}

impl HookCallback {
    pub fn broadcast<F>(f: F) -> Self
    where
        F: Fn(&Value) -> Result<(), HookError> + Send + Sync + 'static,
    {
        Self::Broadcast(Arc::new(f))
    }

    pub fn chain<F>(f: F) -> Self
    where
        F: Fn(&Value, Value) -> Result<Value, HookError> + Send + Sync + 'static,
    {
        Self::Chain(Arc::new(f))
    }

    pub fn overriding<F>(f: F) -> Self
    where
        F: Fn(&Value, &Value) -> Result<Value, HookError> + Send + Sync + 'static,
    {
        Self::Override(Arc::new(f))
    }

    /// Broadcast subscriber that deserializes the arguments into `A` first.
    pub fn on_broadcast_typed<A, F>(f: F) -> Self
    where
        A: DeserializeOwned + 'static,
        F: Fn(A) -> Result<(), HookError> + Send + Sync + 'static,
    {
        Self::broadcast(move |args| {
            let typed: A = serde_json::from_value(args.clone())?;
            f(typed)
        })
    }

    /// Chain subscriber working on a typed running value.
    pub fn on_chain_typed<T, F>(f: F) -> Self
    where
        T: Serialize + DeserializeOwned + 'static,
        F: Fn(&Value, T) -> Result<T, HookError> + Send + Sync + 'static,
    {
        Self::chain(move |args, current| {
            let typed: T = serde_json::from_value(current)?;
            Ok(serde_json::to_value(f(args, typed)?)?)
        })
    }

    /// Override subscriber working on a typed baseline.
    pub fn on_override_typed<T, F>(f: F) -> Self
    where
        T: Serialize + DeserializeOwned + 'static,
        F: Fn(&Value, T) -> Result<T, HookError> + Send + Sync + 'static,
    {
        Self::overriding(move |args, baseline| {
            let typed: T = serde_json::from_value(baseline.clone())?;
            Ok(serde_json::to_value(f(args, typed)?)?)
        })
    }

    pub fn strategy(&self) -> Strategy {
        match self {
            HookCallback::Broadcast(_) => Strategy::Broadcast,
            HookCallback::Chain(_) => Strategy::Chain,
            HookCallback::Override(_) => Strategy::Override,
        }
    }
}

impl fmt::Debug for HookCallback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("HookCallback").field(&self.strategy()).finish()
    }
}

/// Handle returned by a subscription, used to unsubscribe later.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(pub Uuid);

impl SubscriptionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SubscriptionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug)]
pub(crate) struct Subscriber {
    pub id: SubscriptionId,
    pub owner: Option<String>,
    pub callback: HookCallback,
}

impl Subscriber {
    pub fn label(&self) -> &str {
        self.owner.as_deref().unwrap_or("anonymous")
    }
}

/// Runs subscriber code, turning a panic into [`HookError::Panicked`].
pub(crate) fn guarded<T>(f: impl FnOnce() -> Result<T, HookError>) -> Result<T, HookError> {
    match catch_unwind(AssertUnwindSafe(f)) {
        Ok(result) => result,
        Err(payload) => Err(HookError::Panicked(panic_message(payload.as_ref()))),
    }
}

/// Extracts a readable message from a panic payload.
pub fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_guard_converts_panics() {
        let result: Result<(), HookError> = guarded(|| panic!("boom"));
        match result {
            Err(HookError::Panicked(message)) => assert_eq!(message, "boom"),
            other => panic!("unexpected result: {:?}", other),
        }

        let formatted: Result<(), HookError> = guarded(|| panic!("code {}", 7));
        assert!(matches!(formatted, Err(HookError::Panicked(m)) if m == "code 7"));
    }

    #[test]
    fn test_typed_chain_rejects_wrong_shape() {
        let callback = HookCallback::on_chain_typed(|_args, n: i64| Ok(n + 1));
        let HookCallback::Chain(f) = callback else {
            panic!("expected a chain callback");
        };

        assert_eq!(f(&json!(null), json!(4)).unwrap(), json!(5));
        assert!(matches!(
            f(&json!(null), json!("four")),
            Err(HookError::Serialization(_))
        ));
    }

    #[test]
    fn test_strategy_hint() {
        assert_eq!(HookCallback::broadcast(|_| Ok(())).strategy(), Strategy::Broadcast);
        assert_eq!(
            HookCallback::overriding(|_, b| Ok(b.clone())).strategy(),
            Strategy::Override
        );
        assert_eq!(Strategy::Chain.to_string(), "chain");
    }
}
