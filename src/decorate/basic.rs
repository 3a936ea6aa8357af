//! Static HTTP Basic credentials.

// crates.io
use base64::{Engine, engine::general_purpose::STANDARD};
use oauth2::http::{HeaderValue, header::AUTHORIZATION};
// self
use crate::{
	_prelude::*,
	config::BasicConfig,
	decorate::RequestHeaders,
	events::{CredentialKind, DecorateEvent, EventBus, Publish},
	obs::{self, OpOutcome},
};

/// Attaches a fixed `Authorization: Basic …` header.
pub struct BasicDecorator {
	credentials: String,
	priority: i32,
	events: Arc<dyn Publish<DecorateEvent>>,
}
impl BasicDecorator {
	/// Priority used when the configuration leaves it unset.
	pub const DEFAULT_PRIORITY: i32 = 300;

	/// Encodes the credentials once; decorate events go to `events`.
	///
	/// A priority of `0` selects [`Self::DEFAULT_PRIORITY`].
	pub fn new(config: &BasicConfig, events: &EventBus) -> Self {
		let encoded = STANDARD.encode(format!("{}:{}", config.username, config.password));

		Self {
			credentials: format!("Basic {encoded}"),
			priority: config
				.priority
				.filter(|priority| *priority != 0)
				.unwrap_or(Self::DEFAULT_PRIORITY),
			events: Arc::new(events.clone()),
		}
	}

	/// Priority fixed at construction.
	pub fn priority(&self) -> i32 {
		self.priority
	}

	/// Sets the header and publishes one decorate event.
	pub fn decorate<R>(&self, request: &mut R) -> Result<()>
	where
		R: ?Sized + RequestHeaders,
	{
		const KIND: CredentialKind = CredentialKind::Basic;

		let at = OffsetDateTime::now_utc();
		let mut event = DecorateEvent::started(KIND, at);

		obs::record_op_outcome(KIND, "decorate", OpOutcome::Attempt);

		let result = HeaderValue::from_str(&self.credentials)
			.map(|mut header| {
				header.set_sensitive(true);
				request.headers_mut().insert(AUTHORIZATION, header);
			})
			.map_err(|_| Error::InvalidHeaderValue { kind: KIND });

		event.duration = OffsetDateTime::now_utc() - at;
		event.error = result.as_ref().err().cloned();

		obs::record_op_outcome(KIND, "decorate", OpOutcome::of(&result));
		self.events.publish(event);

		result
	}
}
impl Debug for BasicDecorator {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("BasicDecorator").field("priority", &self.priority).finish_non_exhaustive()
	}
}
