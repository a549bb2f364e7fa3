//! Type-keyed, in-process message dispatch (component A).
//!
//! Two router flavors share the same dispatch contract: [`MutableRouter`] allows
//! `add_route` at runtime and is meant for test harnesses and bootstrap; [`SealedRouter`]
//! is built once from a fixed set of registrations and validates at construction time
//! that every variant of a sealed key type has at least one handler, per property S6 in
//! the Testable Properties.
//!
//! Neither router cares what `M` is; it is the embedding component's message/event type.
//! `K` is a small, cheaply-cloned discriminant (usually a fieldless enum mirroring `M`'s
//! variants) used purely for routing.

use dashmap::DashMap;
use std::collections::HashMap;
use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tracing::{error, warn};

/// A routing key: small, hashable, comparable, and printable so a missing-handler
/// diagnostic can name it.
pub trait RouteKey: Clone + Eq + std::hash::Hash + fmt::Debug + Send + Sync + 'static {}

/// A sealed key type additionally knows its own complete variant set, which is what lets
/// [`SealedRouter::build`] validate exhaustiveness.
pub trait SealedVariants: RouteKey {
    fn all_variants() -> Vec<Self>;
}

pub type Handler<M> = Box<dyn Fn(&M) + Send + Sync>;

fn dispatch<M>(handlers: &[Handler<M>], message: &M) {
    for handler in handlers {
        let result = std::panic::catch_unwind(AssertUnwindSafe(|| handler(message)));
        if result.is_err() {
            error!("message router handler panicked; continuing with remaining handlers");
        }
    }
}

/// `add_route`-at-runtime router. Concurrent `route`/`add_route` is safe: the handler
/// table is a `dashmap::DashMap`, mirroring the concurrent subscriber-map idiom used for
/// leadership notifications elsewhere in this workspace.
pub struct MutableRouter<K: RouteKey, M> {
    handlers: DashMap<K, Vec<Handler<M>>>,
}

impl<K: RouteKey, M> Default for MutableRouter<K, M> {
    fn default() -> Self {
        Self {
            handlers: DashMap::new(),
        }
    }
}

impl<K: RouteKey, M: Send + Sync + 'static> MutableRouter<K, M> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `handler` for `key`. Handlers for the same key run in registration
    /// order.
    pub fn add_route(&self, key: K, handler: Handler<M>) {
        self.handlers.entry(key).or_default().push(handler);
    }

    /// Dispatches `message` synchronously to every handler registered for `key`, in
    /// registration order. Logs a warning and drops the message if no handler is
    /// registered.
    pub fn route(&self, key: &K, message: &M) {
        match self.handlers.get(key) {
            Some(handlers) => dispatch(&handlers, message),
            None => warn!(?key, "no handler registered for message; dropping"),
        }
    }
}

impl<K: RouteKey, M: Send + Sync + 'static> MutableRouter<K, M> {
    /// Schedules delivery on the shared executor: `supplier` is evaluated on the spawned
    /// task, then routed there. Requires `Self: Send + Sync + 'static`, satisfied when
    /// the router is held behind an `Arc`.
    pub fn route_async(
        self: &Arc<Self>,
        key: K,
        supplier: impl FnOnce() -> M + Send + 'static,
    ) where
        K: Send + 'static,
    {
        let router = Arc::clone(self);
        tokio::spawn(async move {
            let message = supplier();
            router.route(&key, &message);
        });
    }
}

/// Diagnostic returned by [`SealedRouter::build`] when a variant of the sealed key type
/// has no registered handler.
#[derive(Debug, thiserror::Error)]
#[error("router is missing handler(s) for variant(s): {}", format_missing(missing))]
pub struct RouterBuildError<K: fmt::Debug> {
    pub missing: Vec<K>,
}

fn format_missing<K: fmt::Debug>(missing: &[K]) -> String {
    missing
        .iter()
        .map(|k| format!("{:?}", k))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Router built once from a fixed registration list; `route` is a lock-free lookup in a
/// frozen map thereafter. Building fails unless every variant of `K` has at least one
/// handler.
pub struct SealedRouter<K: SealedVariants, M> {
    handlers: HashMap<K, Vec<Handler<M>>>,
}

impl<K: SealedVariants, M> SealedRouter<K, M> {
    pub fn build(registrations: Vec<(K, Handler<M>)>) -> Result<Self, RouterBuildError<K>> {
        let mut handlers: HashMap<K, Vec<Handler<M>>> = HashMap::new();
        for (key, handler) in registrations {
            handlers.entry(key).or_default().push(handler);
        }

        let missing: Vec<K> = K::all_variants()
            .into_iter()
            .filter(|variant| !handlers.contains_key(variant))
            .collect();

        if !missing.is_empty() {
            return Err(RouterBuildError { missing });
        }

        Ok(Self { handlers })
    }

    pub fn route(&self, key: &K, message: &M) {
        match self.handlers.get(key) {
            Some(handlers) => dispatch(handlers, message),
            None => warn!(?key, "no handler registered for message; dropping"),
        }
    }
}
