//! Fetch/decorate telemetry events and the listener bus that multicasts them.
//!
//! Dispatch is synchronous: listeners run on the publishing task, in registration order, and a
//! slow listener stalls the call that triggered the event. Each layer only holds the
//! [`Publish`] capability for the event type it emits.

// std
use std::sync::{
	Weak,
	atomic::{AtomicU64, Ordering},
};
// self
use crate::{_prelude::*, error::FetchError};

/// Credential strategy that produced an event.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CredentialKind {
	/// Static HTTP Basic credentials.
	Basic,
	/// OAuth 2.0 bearer token.
	OAuth2,
	/// No strategy; used for chain-level outcomes.
	None,
}
impl CredentialKind {
	/// Returns a stable label suitable for events, span, or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			CredentialKind::Basic => "basic",
			CredentialKind::OAuth2 => "oauth2",
			CredentialKind::None => "none",
		}
	}
}
impl Display for CredentialKind {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Snapshot of one token acquisition attempt.
#[derive(Clone, Debug)]
pub struct FetchEvent {
	/// Instant the fetch started.
	pub at: OffsetDateTime,
	/// Time spent waiting on the token endpoint.
	pub duration: Duration,
	/// Kind of token fetched.
	pub kind: CredentialKind,
	/// Expiry served to callers after any safety-margin adjustment.
	pub expiration: Option<OffsetDateTime>,
	/// Expiry implied by the token lifetime before adjustment.
	pub original_expiration: Option<OffsetDateTime>,
	/// Failure reported by the exchange, if any.
	pub error: Option<FetchError>,
}
impl FetchEvent {
	pub(crate) fn started(kind: CredentialKind, at: OffsetDateTime) -> Self {
		Self {
			at,
			duration: Duration::ZERO,
			kind,
			expiration: None,
			original_expiration: None,
			error: None,
		}
	}
}

/// Snapshot of one decoration attempt.
#[derive(Clone, Debug)]
pub struct DecorateEvent {
	/// Instant the decoration started.
	pub at: OffsetDateTime,
	/// Time spent acquiring the credential.
	pub duration: Duration,
	/// Strategy that handled the attempt, or [`CredentialKind::None`] for chain outcomes.
	pub kind: CredentialKind,
	/// Expiry of the attached credential, when it has one.
	pub expiration: Option<OffsetDateTime>,
	/// Failure reported by the attempt, if any.
	pub error: Option<Error>,
}
impl DecorateEvent {
	pub(crate) fn started(kind: CredentialKind, at: OffsetDateTime) -> Self {
		Self { at, duration: Duration::ZERO, kind, expiration: None, error: None }
	}
}

/// Receives [`FetchEvent`] notifications.
pub trait FetchListener
where
	Self: Send + Sync,
{
	/// Handles one fetch event.
	fn on_fetch(&self, event: &FetchEvent);
}
impl<F> FetchListener for F
where
	F: Fn(&FetchEvent) + Send + Sync,
{
	fn on_fetch(&self, event: &FetchEvent) {
		self(event)
	}
}

/// Receives [`DecorateEvent`] notifications.
pub trait DecorateListener
where
	Self: Send + Sync,
{
	/// Handles one decorate event.
	fn on_decorate(&self, event: &DecorateEvent);
}
impl<F> DecorateListener for F
where
	F: Fn(&DecorateEvent) + Send + Sync,
{
	fn on_decorate(&self, event: &DecorateEvent) {
		self(event)
	}
}

/// Typed publishing capability injected into the layers that emit events.
pub trait Publish<E>
where
	Self: Send + Sync,
{
	/// Delivers `event` to every interested listener.
	fn publish(&self, event: E);
}

/// Multicast bus for fetch and decorate events.
///
/// Cloning the bus is cheap and every clone shares the same listener lists.
#[derive(Clone, Default)]
pub struct EventBus {
	fetch: Arc<Listeners<dyn FetchListener>>,
	decorate: Arc<Listeners<dyn DecorateListener>>,
}
impl EventBus {
	/// Registers a fetch listener; cancel the returned [`Registration`] to remove it.
	pub fn add_fetch_listener(&self, listener: impl FetchListener + 'static) -> Registration {
		let listener: Arc<dyn FetchListener> = Arc::new(listener);

		Listeners::add(&self.fetch, listener)
	}

	/// Registers a decorate listener; cancel the returned [`Registration`] to remove it.
	pub fn add_decorate_listener(&self, listener: impl DecorateListener + 'static) -> Registration {
		let listener: Arc<dyn DecorateListener> = Arc::new(listener);

		Listeners::add(&self.decorate, listener)
	}

	/// Number of live fetch listeners.
	pub fn fetch_listener_count(&self) -> usize {
		self.fetch.entries.read().len()
	}

	/// Number of live decorate listeners.
	pub fn decorate_listener_count(&self) -> usize {
		self.decorate.entries.read().len()
	}
}
impl Publish<FetchEvent> for EventBus {
	fn publish(&self, event: FetchEvent) {
		for listener in self.fetch.snapshot() {
			listener.on_fetch(&event);
		}
	}
}
impl Publish<DecorateEvent> for EventBus {
	fn publish(&self, event: DecorateEvent) {
		for listener in self.decorate.snapshot() {
			listener.on_decorate(&event);
		}
	}
}
impl Debug for EventBus {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("EventBus")
			.field("fetch_listeners", &self.fetch_listener_count())
			.field("decorate_listeners", &self.decorate_listener_count())
			.finish()
	}
}

/// Live listener subscription.
///
/// [`cancel`](Registration::cancel) is idempotent. Dropping the handle without cancelling keeps
/// the listener registered for the lifetime of the bus.
pub struct Registration {
	cancel: Mutex<Option<Box<dyn FnOnce() + Send>>>,
}
impl Registration {
	/// Removes the listener; later calls do nothing.
	pub fn cancel(&self) {
		let cancel = self.cancel.lock().take();

		if let Some(cancel) = cancel {
			cancel();
		}
	}

	/// Returns `true` until [`cancel`](Registration::cancel) has been called.
	pub fn is_active(&self) -> bool {
		self.cancel.lock().is_some()
	}
}
impl Debug for Registration {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("Registration").field("active", &self.is_active()).finish()
	}
}

struct Listeners<L>
where
	L: ?Sized,
{
	next_id: AtomicU64,
	entries: RwLock<Vec<(u64, Arc<L>)>>,
}
impl<L> Listeners<L>
where
	L: ?Sized + Send + Sync + 'static,
{
	fn add(this: &Arc<Self>, listener: Arc<L>) -> Registration {
		let id = this.next_id.fetch_add(1, Ordering::Relaxed);

		this.entries.write().push((id, listener));

		let registry: Weak<Self> = Arc::downgrade(this);

		Registration {
			cancel: Mutex::new(Some(Box::new(move || {
				if let Some(registry) = registry.upgrade() {
					registry.entries.write().retain(|(entry, _)| *entry != id);
				}
			}))),
		}
	}

	// Listeners run outside the lock so they may register or cancel during dispatch.
	fn snapshot(&self) -> Vec<Arc<L>> {
		self.entries.read().iter().map(|(_, listener)| listener.clone()).collect()
	}
}
impl<L> Default for Listeners<L>
where
	L: ?Sized,
{
	fn default() -> Self {
		Self { next_id: AtomicU64::new(0), entries: RwLock::new(Vec::new()) }
	}
}
