//! Token sources and the safety-margin layer that shortens token lifetimes.

// self
use crate::{
	_prelude::*,
	error::{ConfigError, FetchError},
	events::{CredentialKind, FetchEvent, Publish},
	exchange::TokenExchanger,
	obs::{self, OpOutcome, OpSpan},
	token::Token,
};

/// Boxed future returned by token sources and exchangers.
pub type TokenFuture<'a> = Pin<Box<dyn Future<Output = Result<Token, FetchError>> + 'a + Send>>;

/// Anything that can hand out an access token.
pub trait TokenSource
where
	Self: Send + Sync,
{
	/// Returns a token, fetching one if the implementation decides it must.
	fn token(&self) -> TokenFuture<'_>;
}
impl<T> TokenSource for Arc<T>
where
	T: ?Sized + TokenSource,
{
	fn token(&self) -> TokenFuture<'_> {
		(**self).token()
	}
}

/// Fraction of a token's nominal lifetime that callers may rely on.
///
/// A margin of `0.8` treats a one-hour token as expired after 48 minutes; `1.0` trusts the
/// full lifetime and `0.0` expires tokens as soon as they are issued.
#[derive(Clone, Copy, Debug, PartialEq, PartialOrd)]
pub struct SafetyMargin(f64);
impl SafetyMargin {
	/// Validates that `margin` lies within `[0, 1]`.
	pub fn new(margin: f64) -> Result<Self, ConfigError> {
		if (0.0..=1.0).contains(&margin) {
			Ok(Self(margin))
		} else {
			Err(ConfigError::InvalidSafetyMargin { margin })
		}
	}

	/// Returns the raw fraction.
	pub fn get(self) -> f64 {
		self.0
	}

	/// Shortens `lifetime` by the margin; the result never exceeds `lifetime`.
	pub fn apply(self, lifetime: Duration) -> Duration {
		(lifetime * self.0).min(lifetime)
	}
}
impl TryFrom<f64> for SafetyMargin {
	type Error = ConfigError;

	fn try_from(margin: f64) -> Result<Self, Self::Error> {
		Self::new(margin)
	}
}

/// Wraps an exchanger and rewrites each fresh token's expiry to `fetched_at + lifetime × margin`.
///
/// The lifetime is the exchanger's `expires_in` when positive, otherwise the configured default;
/// when neither is positive the token keeps whatever expiry it arrived with. Every call performs
/// one exchange and publishes exactly one [`FetchEvent`]. Freshness checks belong to
/// [`ReusingTokenCache`](crate::cache::ReusingTokenCache).
pub struct SafetyMarginSource<E> {
	exchanger: E,
	margin: SafetyMargin,
	default_lifetime: Duration,
	events: Arc<dyn Publish<FetchEvent>>,
	last: AsyncMutex<Option<Token>>,
}
impl<E> SafetyMarginSource<E>
where
	E: TokenExchanger,
{
	/// Creates a source publishing its fetch telemetry to `events`.
	pub fn new(
		exchanger: E,
		margin: SafetyMargin,
		default_lifetime: Duration,
		events: Arc<dyn Publish<FetchEvent>>,
	) -> Self {
		Self { exchanger, margin, default_lifetime, events, last: AsyncMutex::new(None) }
	}

	/// Returns the wrapped exchanger.
	pub fn exchanger(&self) -> &E {
		&self.exchanger
	}

	async fn fetch(&self) -> Result<Token, FetchError> {
		const KIND: CredentialKind = CredentialKind::OAuth2;

		let mut last = self.last.lock().await;
		let at = OffsetDateTime::now_utc();
		let mut event = FetchEvent::started(KIND, at);

		obs::record_op_outcome(KIND, "fetch", OpOutcome::Attempt);

		let exchanged = self.exchanger.exchange().await;

		event.duration = OffsetDateTime::now_utc() - at;

		let result = exchanged.and_then(|token| self.adjust(token, (*last).as_ref(), &mut event));

		match &result {
			Ok(token) => {
				event.expiration = token.expires_at;
				*last = Some(token.clone());
			},
			Err(err) => event.error = Some(err.clone()),
		}

		obs::record_op_outcome(KIND, "fetch", OpOutcome::of(&result));
		self.events.publish(event);

		result
	}

	fn adjust(
		&self,
		mut token: Token,
		last: Option<&Token>,
		event: &mut FetchEvent,
	) -> Result<Token, FetchError> {
		if token.is_adjusted() && last == Some(&token) {
			return Ok(token);
		}

		let issued_at = OffsetDateTime::now_utc();
		let lifetime = token
			.expires_in
			.filter(|lifetime| lifetime.is_positive())
			.or_else(|| Some(self.default_lifetime).filter(|lifetime| lifetime.is_positive()));

		if let Some(lifetime) = lifetime {
			let original = issued_at.checked_add(lifetime).ok_or(FetchError::ExpiresInOutOfRange)?;
			let adjusted = issued_at
				.checked_add(self.margin.apply(lifetime))
				.ok_or(FetchError::ExpiresInOutOfRange)?;

			event.original_expiration = Some(original);
			token.expires_at = Some(adjusted);
		}

		token.mark_adjusted();

		Ok(token)
	}
}
impl<E> TokenSource for SafetyMarginSource<E>
where
	E: TokenExchanger,
{
	fn token(&self) -> TokenFuture<'_> {
		let span = OpSpan::new(CredentialKind::OAuth2, "fetch");

		Box::pin(span.instrument(self.fetch()))
	}
}
impl<E> Debug for SafetyMarginSource<E> {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("SafetyMarginSource")
			.field("margin", &self.margin)
			.field("default_lifetime", &self.default_lifetime)
			.finish()
	}
}
