/// Hook dispatch: broadcast, chain, override and the latched broadcast
use crate::callback::{guarded, HookCallback, Strategy, Subscriber};
use crate::table::HookTable;
use crate::HookError;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use tracing::{error, trace};

impl HookTable {
    /// Invokes every subscriber with the same arguments.
    ///
    /// Failures are logged and skipped. An unknown hook is a no-op.
    pub fn dispatch_broadcast(&self, hook: &str, args: &Value) -> Result<(), HookError> {
        let Some(subscribers) = self.snapshot(hook, Strategy::Broadcast)? else {
            return Ok(());
        };
        self.stats.record_dispatch();
        trace!("Broadcasting '{}' to {} subscribers", hook, subscribers.len());

        for subscriber in &subscribers {
            self.invoke_broadcast(hook, subscriber, args);
        }
        Ok(())
    }

    /// Threads `seed` through every subscriber in order and returns the
    /// final value. A failing subscriber leaves the running value unchanged.
    pub fn dispatch_chain(&self, hook: &str, args: &Value, seed: Value) -> Result<Value, HookError> {
        let Some(subscribers) = self.snapshot(hook, Strategy::Chain)? else {
            return Ok(seed);
        };
        self.stats.record_dispatch();
        trace!("Chaining '{}' through {} subscribers", hook, subscribers.len());

        let mut current = seed;
        for subscriber in &subscribers {
            let HookCallback::Chain(callback) = &subscriber.callback else {
                continue;
            };
            let input = current.clone();
            match guarded(|| callback(args, input)) {
                Ok(next) => current = next,
                Err(e) => self.report_failure(hook, subscriber, &e),
            }
        }
        Ok(current)
    }

    /// Resolves an override hook against a host-computed `baseline`.
    ///
    /// Every subscriber runs, in subscription order, and receives the
    /// baseline rather than an earlier answer. The first answer that differs
    /// from the baseline wins; answers after it are discarded. A subscriber
    /// that fails or panics is logged and skipped.
    ///
    /// # Arguments
    ///
    /// * `hook` - Name of an override hook
    /// * `args` - Arguments handed to every subscriber
    /// * `baseline` - The value the host would use without any subscriber
    ///
    /// # Returns
    ///
    /// The first divergent answer, or `baseline` when there is none or the
    /// hook does not exist. [`HookError::StrategyMismatch`] if the hook was
    /// registered with another strategy.
    ///
    /// # Example
    ///
    /// ```
    /// use mod_hooks::{HookCallback, HookTable};
    /// use serde_json::json;
    ///
    /// let hooks = HookTable::new();
    /// hooks
    ///     .subscribe("can_dash", HookCallback::overriding(|_, base| Ok(base.clone())), None)
    ///     .unwrap();
    /// hooks
    ///     .subscribe("can_dash", HookCallback::overriding(|_, _| Ok(json!(true))), None)
    ///     .unwrap();
    ///
    /// let answer = hooks.dispatch_override("can_dash", &json!({}), json!(false)).unwrap();
    /// assert_eq!(answer, json!(true));
    /// ```
    pub fn dispatch_override(
        &self,
        hook: &str,
        args: &Value,
        baseline: Value,
    ) -> Result<Value, HookError> {
        let Some(subscribers) = self.snapshot(hook, Strategy::Override)? else {
            return Ok(baseline);
        };
        self.stats.record_dispatch();
        trace!("Resolving override '{}' over {} subscribers", hook, subscribers.len());

        let mut overridden: Option<Value> = None;
        for subscriber in &subscribers {
            let HookCallback::Override(callback) = &subscriber.callback else {
                continue;
            };
            match guarded(|| callback(args, &baseline)) {
                Ok(answer) => {
                    if overridden.is_none() && answer != baseline {
                        trace!("Hook '{}' overridden by {}", hook, subscriber.label());
                        overridden = Some(answer);
                    }
                }
                Err(e) => self.report_failure(hook, subscriber, &e),
            }
        }
        Ok(overridden.unwrap_or(baseline))
    }

    /// Typed wrapper around [`HookTable::dispatch_chain`].
    pub fn chain_typed<T>(&self, hook: &str, args: &Value, seed: T) -> Result<T, HookError>
    where
        T: Serialize + DeserializeOwned,
    {
        let value = self.dispatch_chain(hook, args, serde_json::to_value(&seed)?)?;
        Ok(serde_json::from_value(value)?)
    }

    /// Typed wrapper around [`HookTable::dispatch_override`].
    pub fn override_typed<T>(&self, hook: &str, args: &Value, baseline: T) -> Result<T, HookError>
    where
        T: Serialize + DeserializeOwned,
    {
        let value = self.dispatch_override(hook, args, serde_json::to_value(&baseline)?)?;
        Ok(serde_json::from_value(value)?)
    }

    /// Broadcasts once and remembers the arguments, so that every later
    /// subscriber of the hook is invoked immediately on subscription.
    ///
    /// Latching again replaces the remembered arguments and broadcasts again.
    pub fn latch(&self, hook: &str, args: Value) -> Result<(), HookError> {
        self.register(hook, Strategy::Broadcast)?;

        // Latching and snapshotting under one guard: a concurrent subscriber
        // lands either in the snapshot or in the replay, never both.
        let subscribers = match self.hooks.get_mut(hook) {
            Some(mut entry) => {
                entry.latched = Some(args.clone());
                entry.subscribers.clone()
            }
            None => Vec::new(),
        };
        self.stats.record_dispatch();
        trace!("Latching '{}' for {} subscribers", hook, subscribers.len());

        for subscriber in &subscribers {
            self.invoke_broadcast(hook, subscriber, &args);
        }
        Ok(())
    }

    pub(crate) fn invoke_broadcast(&self, hook: &str, subscriber: &Arc<Subscriber>, args: &Value) {
        let HookCallback::Broadcast(callback) = &subscriber.callback else {
            return;
        };
        if let Err(e) = guarded(|| callback(args)) {
            self.report_failure(hook, subscriber, &e);
        }
    }

    fn report_failure(&self, hook: &str, subscriber: &Subscriber, error: &HookError) {
        self.stats.record_failure();
        error!(
            hook,
            subscriber = subscriber.label(),
            "❌ Hook subscriber failed: {}",
            error
        );
    }
}

#[cfg(test)]
mod tests {
    use crate::{HookCallback, HookError, HookTable, Strategy};
    use serde_json::{json, Value};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    fn constant(value: Value) -> HookCallback {
        HookCallback::overriding(move |_, _| Ok(value.clone()))
    }

    #[test]
    fn test_override_first_divergence_wins() {
        let hooks = HookTable::new();
        let calls = Arc::new(AtomicUsize::new(0));
        for answer in ["b", "x", "y", "b"] {
            let calls = calls.clone();
            hooks
                .subscribe(
                    "can_dash",
                    HookCallback::overriding(move |_, _| {
                        calls.fetch_add(1, Ordering::SeqCst);
                        Ok(json!(answer))
                    }),
                    None,
                )
                .unwrap();
        }

        let result = hooks.dispatch_override("can_dash", &json!({}), json!("b")).unwrap();
        assert_eq!(result, json!("x"));
        // Later subscribers still run even though their answers are discarded.
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[test]
    fn test_override_sees_baseline_not_previous_answer() {
        let hooks = HookTable::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        hooks.subscribe("speed", constant(json!(9)), None).unwrap();
        let seen_clone = seen.clone();
        hooks
            .subscribe(
                "speed",
                HookCallback::overriding(move |_, baseline| {
                    seen_clone.lock().unwrap().push(baseline.clone());
                    Ok(baseline.clone())
                }),
                None,
            )
            .unwrap();

        assert_eq!(hooks.dispatch_override("speed", &json!({}), json!(1)).unwrap(), json!(9));
        assert_eq!(*seen.lock().unwrap(), vec![json!(1)]);
    }

    #[test]
    fn test_override_without_divergence_returns_baseline() {
        let hooks = HookTable::new();
        hooks.subscribe("speed", constant(json!(3)), None).unwrap();
        hooks
            .subscribe(
                "speed",
                HookCallback::overriding(|_, _| Err(HookError::subscriber("broken"))),
                None,
            )
            .unwrap();

        assert_eq!(hooks.dispatch_override("speed", &json!({}), json!(3)).unwrap(), json!(3));
        assert_eq!(hooks.dispatch_override("unknown", &json!({}), json!(3)).unwrap(), json!(3));
    }

    #[test]
    fn test_chain_composes_and_skips_failures() {
        let hooks = HookTable::new();
        hooks
            .subscribe(
                "damage",
                HookCallback::on_chain_typed(|_, n: i64| Ok(n + 1)),
                Some("plus_one"),
            )
            .unwrap();
        hooks
            .subscribe(
                "damage",
                HookCallback::chain(|_, _| panic!("subscriber exploded")),
                Some("broken"),
            )
            .unwrap();
        hooks
            .subscribe(
                "damage",
                HookCallback::on_chain_typed(|_, n: i64| Ok(n * 10)),
                Some("times_ten"),
            )
            .unwrap();

        let result: i64 = hooks.chain_typed("damage", &json!({}), 2).unwrap();
        assert_eq!(result, 30);
        assert_eq!(hooks.stats().subscriber_failures, 1);
    }

    #[test]
    fn test_chain_unknown_hook_returns_seed() {
        let hooks = HookTable::new();
        assert_eq!(hooks.dispatch_chain("nobody", &json!({}), json!([1])).unwrap(), json!([1]));
    }

    #[test]
    fn test_broadcast_continues_after_failure() {
        let hooks = HookTable::new();
        let hits = Arc::new(AtomicUsize::new(0));
        hooks
            .subscribe("quit", HookCallback::broadcast(|_| panic!("no")), None)
            .unwrap();
        let counter = hits.clone();
        hooks
            .subscribe(
                "quit",
                HookCallback::broadcast(move |_| {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                }),
                None,
            )
            .unwrap();

        hooks.dispatch_broadcast("quit", &json!(null)).unwrap();
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_wrong_strategy_dispatch_is_rejected() {
        let hooks = HookTable::new();
        hooks.register("value", Strategy::Chain).unwrap();
        let err = hooks.dispatch_override("value", &json!({}), json!(0)).unwrap_err();
        assert!(matches!(err, HookError::StrategyMismatch { .. }));
    }

    #[test]
    fn test_subscribe_during_dispatch_uses_snapshot() {
        let hooks = Arc::new(HookTable::new());
        let late_calls = Arc::new(AtomicUsize::new(0));

        let table = hooks.clone();
        let late = late_calls.clone();
        hooks
            .subscribe(
                "frame",
                HookCallback::broadcast(move |_| {
                    let late = late.clone();
                    table.subscribe(
                        "frame",
                        HookCallback::broadcast(move |_| {
                            late.fetch_add(1, Ordering::SeqCst);
                            Ok(())
                        }),
                        Some("late"),
                    )?;
                    Ok(())
                }),
                Some("spawner"),
            )
            .unwrap();

        hooks.dispatch_broadcast("frame", &json!(null)).unwrap();
        assert_eq!(late_calls.load(Ordering::SeqCst), 0);
        assert_eq!(hooks.subscriber_count("frame"), 2);

        hooks.dispatch_broadcast("frame", &json!(null)).unwrap();
        assert_eq!(late_calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_unsubscribe_during_dispatch() {
        let hooks = Arc::new(HookTable::new());
        let id_slot = Arc::new(Mutex::new(None));

        let table = hooks.clone();
        let slot = id_slot.clone();
        let id = hooks
            .subscribe(
                "once",
                HookCallback::broadcast(move |_| {
                    if let Some(id) = slot.lock().unwrap().take() {
                        table.unsubscribe("once", id);
                    }
                    Ok(())
                }),
                None,
            )
            .unwrap();
        *id_slot.lock().unwrap() = Some(id);

        hooks.dispatch_broadcast("once", &json!(null)).unwrap();
        assert_eq!(hooks.subscriber_count("once"), 0);
    }

    #[test]
    fn test_latch_replays_to_late_subscribers() {
        let hooks = HookTable::new();
        let early = Arc::new(AtomicUsize::new(0));
        let counter = early.clone();
        hooks
            .subscribe(
                "ready",
                HookCallback::broadcast(move |_| {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                }),
                None,
            )
            .unwrap();

        hooks.latch("ready", json!({ "count": 2 })).unwrap();
        assert_eq!(early.load(Ordering::SeqCst), 1);
        assert!(hooks.is_latched("ready"));

        let seen = Arc::new(Mutex::new(None));
        let sink = seen.clone();
        hooks
            .subscribe(
                "ready",
                HookCallback::broadcast(move |args| {
                    *sink.lock().unwrap() = Some(args.clone());
                    Ok(())
                }),
                None,
            )
            .unwrap();
        assert_eq!(*seen.lock().unwrap(), Some(json!({ "count": 2 })));
        assert_eq!(early.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_latch_reaches_concurrent_subscribers_exactly_once() {
        for _ in 0..50 {
            let hooks = HookTable::new();
            let counters: Vec<Arc<AtomicUsize>> =
                (0..16).map(|_| Arc::new(AtomicUsize::new(0))).collect();

            std::thread::scope(|scope| {
                scope.spawn(|| {
                    for counter in &counters {
                        let counter = counter.clone();
                        hooks
                            .subscribe(
                                "loaded",
                                HookCallback::broadcast(move |_| {
                                    counter.fetch_add(1, Ordering::SeqCst);
                                    Ok(())
                                }),
                                None,
                            )
                            .unwrap();
                    }
                });
                hooks.latch("loaded", json!(null)).unwrap();
            });

            for counter in &counters {
                assert_eq!(counter.load(Ordering::SeqCst), 1);
            }
        }
    }

    #[test]
    fn test_typed_override() {
        let hooks = HookTable::new();
        hooks
            .subscribe(
                "max_health",
                HookCallback::on_override_typed(|_, base: u32| Ok(base + 2)),
                None,
            )
            .unwrap();

        let value: u32 = hooks.override_typed("max_health", &json!({}), 5).unwrap();
        assert_eq!(value, 7);
    }
}
