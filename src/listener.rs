//! # Feature: Temporary Listeners
//!
//! One-shot, self-expiring subscriptions to gateway events. A listener fires
//! its callback on the first event its predicate accepts, or its timeout
//! callback once its ttl elapses, whichever claims the entry first. Uses
//! DashMap so matching and expiry race on an atomic remove.
//!
//! - **Version**: 1.0.0
//! - **Since**: 0.1.0
//! - **Toggleable**: false
//!
//! ## Changelog
//! - 1.0.0: Typed builder, per-listener expiry tasks, panic isolation

use anyhow::{Context, Result};
use dashmap::DashMap;
use log::{debug, error};
use std::any::{type_name, Any, TypeId};
use std::marker::PhantomData;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::time::sleep;
use ulid::Ulid;

use crate::error::BuildError;

type Predicate = dyn Fn(&dyn Any) -> bool + Send + Sync;
type Callback = Box<dyn FnOnce(&dyn Any) -> Result<()> + Send + Sync>;
type Timeout = Box<dyn FnOnce() + Send + Sync>;

/// A built listener, ready to hand to [`TemporaryListenerExecutor::register`].
pub struct TemporaryListener {
    event_type: TypeId,
    event_name: &'static str,
    predicate: Arc<Predicate>,
    callback: Callback,
    on_timeout: Timeout,
    ttl: Duration,
}

impl TemporaryListener {
    pub fn builder<E: Any>() -> ListenerBuilder<E> {
        ListenerBuilder {
            predicate: None,
            callback: None,
            on_timeout: None,
            ttl: None,
            _event: PhantomData,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn event_name(&self) -> &'static str {
        self.event_name
    }
}

pub struct ListenerBuilder<E> {
    predicate: Option<Box<dyn Fn(&E) -> bool + Send + Sync>>,
    callback: Option<Box<dyn FnOnce(&E) -> Result<()> + Send + Sync>>,
    on_timeout: Option<Timeout>,
    ttl: Option<Duration>,
    _event: PhantomData<fn(&E)>,
}

impl<E: Any> ListenerBuilder<E> {
    /// Events failing `predicate` are ignored. Defaults to accepting everything.
    pub fn predicate(mut self, predicate: impl Fn(&E) -> bool + Send + Sync + 'static) -> Self {
        self.predicate = Some(Box::new(predicate));
        self
    }

    pub fn callback(mut self, callback: impl FnOnce(&E) -> Result<()> + Send + Sync + 'static) -> Self {
        self.callback = Some(Box::new(callback));
        self
    }

    pub fn on_timeout(mut self, on_timeout: impl FnOnce() + Send + Sync + 'static) -> Self {
        self.on_timeout = Some(Box::new(on_timeout));
        self
    }

    pub fn ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }

    pub fn build(self) -> Result<TemporaryListener, BuildError> {
        let callback = self.callback.ok_or(BuildError::InvalidListener("a callback is required"))?;
        let ttl = self.ttl.ok_or(BuildError::InvalidListener("a ttl is required"))?;
        if ttl.is_zero() {
            return Err(BuildError::InvalidListener("ttl must be greater than zero"));
        }

        let predicate: Arc<Predicate> = match self.predicate {
            Some(predicate) => Arc::new(move |event: &dyn Any| {
                event.downcast_ref::<E>().map_or(false, |event| predicate(event))
            }),
            None => Arc::new(|event: &dyn Any| event.is::<E>()),
        };

        Ok(TemporaryListener {
            event_type: TypeId::of::<E>(),
            event_name: type_name::<E>(),
            predicate,
            callback: Box::new(move |event: &dyn Any| match event.downcast_ref::<E>() {
                Some(event) => callback(event),
                None => Err(anyhow::anyhow!("event is not a {}", type_name::<E>())),
            }),
            on_timeout: self.on_timeout.unwrap_or_else(|| Box::new(|| {})),
            ttl,
        })
    }
}

struct Entry {
    event_type: TypeId,
    predicate: Arc<Predicate>,
    callback: Callback,
    on_timeout: Timeout,
}

/// Active set of temporary listeners. Cloning shares the set.
#[derive(Clone, Default)]
pub struct TemporaryListenerExecutor {
    listeners: Arc<DashMap<Ulid, Entry>>,
}

impl TemporaryListenerExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Activates `listener` and schedules its expiry. Must be called from
    /// within a tokio runtime.
    pub fn register(&self, listener: TemporaryListener) -> Result<Ulid> {
        let runtime = Handle::try_current().context("temporary listeners need a running tokio runtime")?;
        let id = Ulid::new();
        let ttl = listener.ttl;
        debug!("👂 Listening for {} as {} for {:?}", listener.event_name, id, ttl);

        self.listeners.insert(
            id,
            Entry {
                event_type: listener.event_type,
                predicate: listener.predicate,
                callback: listener.callback,
                on_timeout: listener.on_timeout,
            },
        );

        let listeners = self.listeners.clone();
        runtime.spawn(async move {
            sleep(ttl).await;
            let Some((_, entry)) = listeners.remove(&id) else {
                return;
            };
            debug!("⏳ Listener {} expired", id);
            let on_timeout = entry.on_timeout;
            if let Err(e) = tokio::task::spawn_blocking(on_timeout).await {
                error!("❌ Timeout callback of listener {} panicked: {}", id, e);
            }
        });

        Ok(id)
    }

    /// Offers `event` to every listener of its type. Returns how many fired.
    pub fn on_event<E: Any>(&self, event: &E) -> usize {
        let event_type = TypeId::of::<E>();
        let event: &dyn Any = event;
        let candidates: Vec<(Ulid, Arc<Predicate>)> = self
            .listeners
            .iter()
            .filter(|entry| entry.event_type == event_type)
            .map(|entry| (*entry.key(), entry.predicate.clone()))
            .collect();

        let mut fired = 0;
        for (id, predicate) in candidates {
            match catch_unwind(AssertUnwindSafe(|| predicate(event))) {
                Ok(true) => {}
                Ok(false) => continue,
                Err(_) => {
                    error!("❌ Predicate of listener {} panicked", id);
                    continue;
                }
            }

            // Whoever removes the entry owns it; expiry or another event may have won.
            let Some((_, entry)) = self.listeners.remove(&id) else {
                continue;
            };
            fired += 1;
            let callback = entry.callback;
            match catch_unwind(AssertUnwindSafe(|| callback(event))) {
                Ok(Ok(())) => debug!("Listener {} fired", id),
                Ok(Err(e)) => error!("❌ Listener {} failed: {:?}", id, e),
                Err(_) => error!("❌ Listener {} panicked", id),
            }
        }
        fired
    }

    pub fn contains(&self, id: &Ulid) -> bool {
        self.listeners.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.listeners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counter() -> Arc<AtomicUsize> {
        Arc::new(AtomicUsize::new(0))
    }

    fn counting(
        predicate: impl Fn(&String) -> bool + Send + Sync + 'static,
        fired: &Arc<AtomicUsize>,
        expired: &Arc<AtomicUsize>,
        ttl: Duration,
    ) -> TemporaryListener {
        let fired = fired.clone();
        let expired = expired.clone();
        TemporaryListener::builder::<String>()
            .predicate(predicate)
            .callback(move |_| {
                fired.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })
            .on_timeout(move || {
                expired.fetch_add(1, Ordering::SeqCst);
            })
            .ttl(ttl)
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn test_unmatched_listener_times_out_once() {
        let executor = TemporaryListenerExecutor::new();
        let (fired, expired) = (counter(), counter());
        let id = executor
            .register(counting(|_| false, &fired, &expired, Duration::from_millis(100)))
            .unwrap();

        assert_eq!(executor.on_event(&"hello".to_string()), 0);
        assert!(executor.contains(&id));

        sleep(Duration::from_millis(50)).await;
        assert_eq!(expired.load(Ordering::SeqCst), 0);
        assert!(executor.contains(&id));

        sleep(Duration::from_millis(250)).await;
        assert_eq!(expired.load(Ordering::SeqCst), 1);
        assert_eq!(fired.load(Ordering::SeqCst), 0);
        assert!(executor.is_empty());
    }

    #[tokio::test]
    async fn test_match_fires_once_and_cancels_timeout() {
        let executor = TemporaryListenerExecutor::new();
        let (fired, expired) = (counter(), counter());
        let id = executor
            .register(counting(|event| event == "yes", &fired, &expired, Duration::from_millis(50)))
            .unwrap();

        assert_eq!(executor.on_event(&"no".to_string()), 0);
        assert_eq!(executor.on_event(&"yes".to_string()), 1);
        assert!(!executor.contains(&id));
        assert_eq!(executor.on_event(&"yes".to_string()), 0);

        sleep(Duration::from_millis(150)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);
        assert_eq!(expired.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_events_of_other_types_are_ignored() {
        let executor = TemporaryListenerExecutor::new();
        let (fired, expired) = (counter(), counter());
        executor
            .register(counting(|_| true, &fired, &expired, Duration::from_secs(5)))
            .unwrap();

        assert_eq!(executor.on_event(&42u32), 0);
        assert_eq!(executor.len(), 1);
        assert_eq!(executor.on_event(&"anything".to_string()), 1);
    }

    #[tokio::test]
    async fn test_predicate_panic_is_isolated() {
        let executor = TemporaryListenerExecutor::new();
        let (fired, expired) = (counter(), counter());
        let broken = executor
            .register(counting(|_| panic!("bad predicate"), &fired, &expired, Duration::from_secs(5)))
            .unwrap();
        executor
            .register(counting(|_| true, &fired, &expired, Duration::from_secs(5)))
            .unwrap();

        assert_eq!(executor.on_event(&"event".to_string()), 1);
        assert_eq!(fired.load(Ordering::SeqCst), 1);
        assert!(executor.contains(&broken));
    }

    #[tokio::test]
    async fn test_failing_callback_is_still_consumed() {
        let executor = TemporaryListenerExecutor::new();
        let failing = TemporaryListener::builder::<String>()
            .callback(|_| Err(anyhow::anyhow!("no luck")))
            .ttl(Duration::from_secs(5))
            .build()
            .unwrap();
        let id = executor.register(failing).unwrap();

        assert_eq!(executor.on_event(&"event".to_string()), 1);
        assert!(!executor.contains(&id));
    }

    #[test]
    fn test_builder_requires_callback_and_ttl() {
        let missing_callback = TemporaryListener::builder::<String>()
            .ttl(Duration::from_secs(1))
            .build();
        assert!(matches!(missing_callback, Err(BuildError::InvalidListener(_))));

        let missing_ttl = TemporaryListener::builder::<String>().callback(|_| Ok(())).build();
        assert!(matches!(missing_ttl, Err(BuildError::InvalidListener(_))));

        let zero_ttl = TemporaryListener::builder::<String>()
            .callback(|_| Ok(()))
            .ttl(Duration::ZERO)
            .build();
        assert!(matches!(zero_ttl, Err(BuildError::InvalidListener(_))));
    }

    #[test]
    fn test_register_outside_runtime_fails() {
        let executor = TemporaryListenerExecutor::new();
        let listener = TemporaryListener::builder::<String>()
            .callback(|_| Ok(()))
            .ttl(Duration::from_secs(1))
            .build()
            .unwrap();
        assert!(executor.register(listener).is_err());
        assert!(executor.is_empty());
    }
}
