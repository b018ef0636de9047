//! Synchronous change-notification events.
//!
//! An [`Event`] is a shared handle over a list of handlers. Handlers run inline
//! on the thread that triggered the event, in subscription order, and receive
//! the sending [`PropertyObject`] plus mutable event arguments (write and read
//! handlers may replace the value).
//!
//! # Recursion guard
//!
//! A handler that writes the property it is listening to would otherwise
//! recurse forever. Every subscription carries a dispatching flag: while a
//! handler is running, a nested trigger skips that same subscription. The
//! guard can be disabled per object through
//! `CoreObjectsConfig::guard_recursive_handlers` or per handler with
//! [`Event::subscribe_reentrant`]. Manual [`Event::mute`]/[`Event::unmute`]
//! silences the whole event.
//!
//! Handler errors are not swallowed: the first failing handler aborts the
//! dispatch and its error is returned to the caller of the write.

use parking_lot::RwLock;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use crate::error::CoreResult;
use crate::object::PropertyObject;
use crate::property::Property;
use crate::value::Value;

/// Handler callback type.
pub type EventHandler<A> = dyn Fn(&PropertyObject, &mut A) -> CoreResult<()> + Send + Sync;

/// Token returned by [`Event::subscribe`], used to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

struct Subscription<A> {
    id: u64,
    handler: Arc<EventHandler<A>>,
    guarded: bool,
    dispatching: AtomicBool,
}

/// Clears the dispatching flag even when the handler fails.
struct DispatchGuard<'a>(&'a AtomicBool);

impl Drop for DispatchGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

struct EventInner<A> {
    subscriptions: RwLock<Vec<Arc<Subscription<A>>>>,
    muted: AtomicBool,
    next_id: AtomicU64,
}

/// Shared event handle. Cloning shares the handler list.
pub struct Event<A> {
    inner: Arc<EventInner<A>>,
}

impl<A> Clone for Event<A> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<A> Default for Event<A> {
    fn default() -> Self {
        Self {
            inner: Arc::new(EventInner {
                subscriptions: RwLock::new(Vec::new()),
                muted: AtomicBool::new(false),
                next_id: AtomicU64::new(1),
            }),
        }
    }
}

impl<A> fmt::Debug for Event<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Event")
            .field("subscribers", &self.subscriber_count())
            .field("muted", &self.is_muted())
            .finish()
    }
}

impl<A> Event<A> {
    /// Event with no subscribers.
    pub fn new() -> Self {
        Self::default()
    }

    fn add(&self, handler: Arc<EventHandler<A>>, guarded: bool) -> SubscriptionId {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        self.inner.subscriptions.write().push(Arc::new(Subscription {
            id,
            handler,
            guarded,
            dispatching: AtomicBool::new(false),
        }));
        SubscriptionId(id)
    }

    /// Add a handler protected by the recursion guard.
    pub fn subscribe<F>(&self, handler: F) -> SubscriptionId
    where
        F: Fn(&PropertyObject, &mut A) -> CoreResult<()> + Send + Sync + 'static,
    {
        self.add(Arc::new(handler), true)
    }

    /// Add a handler that is re-invoked by nested triggers.
    pub fn subscribe_reentrant<F>(&self, handler: F) -> SubscriptionId
    where
        F: Fn(&PropertyObject, &mut A) -> CoreResult<()> + Send + Sync + 'static,
    {
        self.add(Arc::new(handler), false)
    }

    /// Remove a handler. Returns false if it was not subscribed.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut subscriptions = self.inner.subscriptions.write();
        let before = subscriptions.len();
        subscriptions.retain(|s| s.id != id.0);
        subscriptions.len() != before
    }

    /// Suppress dispatch until [`unmute`](Self::unmute).
    pub fn mute(&self) {
        self.inner.muted.store(true, Ordering::Release);
    }

    /// Unmute.
    pub fn unmute(&self) {
        self.inner.muted.store(false, Ordering::Release);
    }

    /// True if muted.
    pub fn is_muted(&self) -> bool {
        self.inner.muted.load(Ordering::Acquire)
    }

    /// Subscriber count.
    pub fn subscriber_count(&self) -> usize {
        self.inner.subscriptions.read().len()
    }

    /// True if at least one handler is subscribed.
    pub fn has_subscribers(&self) -> bool {
        self.subscriber_count() > 0
    }

    /// A new independent event carrying the same handlers (fresh guard state).
    pub fn duplicate(&self) -> Self {
        let copy = Self::new();
        for s in self.inner.subscriptions.read().iter() {
            copy.add(s.handler.clone(), s.guarded);
        }
        copy
    }

    /// Dispatch with the recursion guard enabled.
    pub fn trigger(&self, sender: &PropertyObject, args: &mut A) -> CoreResult<()> {
        self.trigger_with(sender, args, true)
    }

    /// Dispatch to every handler; `guard_recursive` toggles the recursion guard.
    pub fn trigger_with(
        &self,
        sender: &PropertyObject,
        args: &mut A,
        guard_recursive: bool,
    ) -> CoreResult<()> {
        if self.is_muted() {
            return Ok(());
        }
        // Handlers may subscribe/unsubscribe while running.
        let snapshot: Vec<Arc<Subscription<A>>> = self.inner.subscriptions.read().clone();
        for subscription in snapshot {
            if guard_recursive && subscription.guarded {
                if subscription.dispatching.swap(true, Ordering::AcqRel) {
                    tracing::trace!(subscription = subscription.id, "Skipping recursive dispatch");
                    continue;
                }
                let _reset = DispatchGuard(&subscription.dispatching);
                (subscription.handler)(sender, args)?;
            } else {
                (subscription.handler)(sender, args)?;
            }
        }
        Ok(())
    }
}

// =============================================================================
// Event arguments
// =============================================================================

/// What caused a property value event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PropertyEventType {
    /// Value written.
    Update,
    /// Stored value removed; the event carries the default.
    Clear,
    /// Value read.
    Read,
}

/// Arguments of value write and read events.
#[derive(Debug, Clone)]
pub struct PropertyValueEventArgs {
    property: Property,
    value: Value,
    event_type: PropertyEventType,
    is_updating: bool,
    overridden: bool,
}

impl PropertyValueEventArgs {
    /// Arguments for `property` carrying `value`.
    pub fn new(
        property: Property,
        value: Value,
        event_type: PropertyEventType,
        is_updating: bool,
    ) -> Self {
        Self {
            property,
            value,
            event_type,
            is_updating,
            overridden: false,
        }
    }

    /// The property whose value changed (a reference target, never the alias).
    pub fn property(&self) -> &Property {
        &self.property
    }

    /// Value being written or returned.
    pub fn value(&self) -> &Value {
        &self.value
    }

    /// Replace the value; writes store it, reads return it.
    pub fn set_value(&mut self, value: impl Into<Value>) {
        self.value = value.into();
        self.overridden = true;
    }

    /// Event type.
    pub fn event_type(&self) -> PropertyEventType {
        self.event_type
    }

    /// True when dispatched while committing a begin/end update batch.
    pub fn is_updating(&self) -> bool {
        self.is_updating
    }

    /// True once a handler called [`set_value`](Self::set_value).
    pub fn is_overridden(&self) -> bool {
        self.overridden
    }

    pub(crate) fn into_value(self) -> Value {
        self.value
    }
}

/// Arguments of the end-update event.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EndUpdateEventArgs {
    properties: Vec<String>,
}

impl EndUpdateEventArgs {
    /// New instance.
    pub fn new(properties: Vec<String>) -> Self {
        Self { properties }
    }

    /// Names of the properties written by the batch, in first-touch order.
    pub fn properties(&self) -> &[String] {
        &self.properties
    }
}
