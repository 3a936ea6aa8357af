//! OAuth 2.0 client-credentials bearer decoration.
//!
//! [`OAuthDecorator`] stacks a [`ReusingTokenCache`] over a [`SafetyMarginSource`] over a
//! [`TokenExchanger`], so a decorated request costs a token round trip only when the adjusted
//! expiry has passed.

// crates.io
use oauth2::http::{HeaderValue, header::AUTHORIZATION};
// self
use crate::{
	_prelude::*,
	cache::ReusingTokenCache,
	config::OAuthConfig,
	decorate::RequestHeaders,
	error::{ConfigError, FetchError},
	events::{CredentialKind, DecorateEvent, EventBus, Publish},
	exchange::{ClientCredentialsExchanger, TokenExchanger, TransportErrorMapper},
	http::TokenHttpClient,
	obs::{self, OpOutcome, OpSpan},
	source::{SafetyMargin, SafetyMarginSource, TokenSource},
	token::Token,
};

type TokenPipeline = ReusingTokenCache<SafetyMarginSource<Arc<dyn TokenExchanger>>>;

const KIND: CredentialKind = CredentialKind::OAuth2;

/// Attaches `Authorization: Bearer …` using a cached client-credentials token.
///
/// Each decorator owns its token pipeline: exchanger, safety-margin source, and reusing cache.
/// Fetch events from the pipeline and decorate events from this type go to the same bus.
pub struct OAuthDecorator {
	tokens: TokenPipeline,
	priority: i32,
	events: Arc<dyn Publish<DecorateEvent>>,
}
impl OAuthDecorator {
	/// Priority used when the configuration leaves it unset.
	pub const DEFAULT_PRIORITY: i32 = 1000;

	/// Builds a decorator that talks to the token endpoint through a default reqwest client.
	#[cfg(feature = "reqwest")]
	pub fn new(config: &OAuthConfig, events: &EventBus) -> Result<Self, ConfigError> {
		let exchanger = ClientCredentialsExchanger::new(config)?;

		Self::with_exchanger(config, Arc::new(exchanger), events)
	}

	/// Builds a decorator over a caller-provided transport and error mapper.
	pub fn with_http_client<C, M>(
		config: &OAuthConfig,
		http_client: impl Into<Arc<C>>,
		error_mapper: impl Into<Arc<M>>,
		events: &EventBus,
	) -> Result<Self, ConfigError>
	where
		C: ?Sized + TokenHttpClient,
		M: ?Sized + TransportErrorMapper<C::TransportError>,
	{
		let exchanger =
			ClientCredentialsExchanger::<C, M>::from_config(config, http_client, error_mapper)?;

		Self::with_exchanger(config, Arc::new(exchanger), events)
	}

	/// Builds a decorator over any [`TokenExchanger`].
	///
	/// The token URL and client settings in `config` are ignored; the auth style and safety
	/// margin are still validated. A priority of `0` selects [`Self::DEFAULT_PRIORITY`].
	pub fn with_exchanger(
		config: &OAuthConfig,
		exchanger: Arc<dyn TokenExchanger>,
		events: &EventBus,
	) -> Result<Self, ConfigError> {
		config.validate()?;

		let margin = SafetyMargin::new(config.safety_margin)?;
		let source = SafetyMarginSource::new(
			exchanger,
			margin,
			config.default_token_duration,
			Arc::new(events.clone()),
		);

		Ok(Self {
			tokens: ReusingTokenCache::new(source),
			priority: config
				.priority
				.filter(|priority| *priority != 0)
				.unwrap_or(Self::DEFAULT_PRIORITY),
			events: Arc::new(events.clone()),
		})
	}

	/// Priority fixed at construction.
	pub fn priority(&self) -> i32 {
		self.priority
	}

	/// Returns a valid token, fetching one only when the cached token has expired.
	pub async fn token(&self) -> Result<Token, FetchError> {
		self.tokens.token().await
	}

	/// Sets the bearer header; on failure the request is left untouched.
	pub async fn decorate<R>(&self, request: &mut R) -> Result<()>
	where
		R: ?Sized + RequestHeaders,
	{
		let span = OpSpan::new(KIND, "decorate");

		span.instrument(self.decorate_with_event(request)).await
	}

	async fn decorate_with_event<R>(&self, request: &mut R) -> Result<()>
	where
		R: ?Sized + RequestHeaders,
	{
		let at = OffsetDateTime::now_utc();
		let mut event = DecorateEvent::started(KIND, at);

		obs::record_op_outcome(KIND, "decorate", OpOutcome::Attempt);

		let result = self.authorize(request).await;

		event.duration = OffsetDateTime::now_utc() - at;

		match &result {
			Ok(expiration) => event.expiration = *expiration,
			Err(err) => event.error = Some(err.clone()),
		}

		obs::record_op_outcome(KIND, "decorate", OpOutcome::of(&result));
		self.events.publish(event);

		result.map(|_| ())
	}

	async fn authorize<R>(&self, request: &mut R) -> Result<Option<OffsetDateTime>>
	where
		R: ?Sized + RequestHeaders,
	{
		let token = self.tokens.token().await?;
		let mut header = HeaderValue::from_str(&format!("Bearer {}", token.access_token.expose()))
			.map_err(|_| Error::InvalidHeaderValue { kind: KIND })?;

		header.set_sensitive(true);
		request.headers_mut().insert(AUTHORIZATION, header);

		Ok(token.expires_at)
	}
}
impl Debug for OAuthDecorator {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("OAuthDecorator")
			.field("tokens", &self.tokens)
			.field("priority", &self.priority)
			.finish_non_exhaustive()
	}
}
