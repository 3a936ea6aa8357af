//! Priority-ordered strategy chain.

// std
use std::cmp::Reverse;
// self
use crate::{
	_prelude::*,
	config::Config,
	decorate::{BasicDecorator, OAuthDecorator, RequestHeaders, Strategy},
	error::{ConfigError, DecorationError, StrategyFailure},
	events::{
		CredentialKind, DecorateEvent, DecorateListener, EventBus, FetchListener, Publish,
		Registration,
	},
	exchange::TransportErrorMapper,
	http::TokenHttpClient,
	obs::{self, OpOutcome, OpSpan},
};
#[cfg(feature = "reqwest")]
use crate::{exchange::ReqwestTransportErrorMapper, http::ReqwestHttpClient};

/// Tries every active strategy, highest priority first, until one decorates the request.
///
/// The order is fixed at construction; strategies with equal priority keep the order they were
/// supplied in.
pub struct DecoratorChain {
	strategies: Vec<Strategy>,
	events: EventBus,
}
impl DecoratorChain {
	/// Builds the chain from `config` with a fresh [`EventBus`].
	#[cfg(feature = "reqwest")]
	pub fn new(config: &Config) -> Result<Self, ConfigError> {
		Self::with_events(config, EventBus::default())
	}

	/// Builds the chain from `config`, publishing every event to `events`.
	///
	/// The token endpoint is reached through a default reqwest client; use
	/// [`Self::with_http_client`] to supply timeouts or custom TLS settings.
	#[cfg(feature = "reqwest")]
	pub fn with_events(config: &Config, events: EventBus) -> Result<Self, ConfigError> {
		Self::with_http_client::<ReqwestHttpClient, ReqwestTransportErrorMapper>(
			config,
			events,
			ReqwestHttpClient::default(),
			ReqwestTransportErrorMapper,
		)
	}

	/// Builds the chain from `config` over a caller-provided token transport.
	///
	/// Basic is included when a username is set and OAuth when both a client identifier and a
	/// token URL are set. OAuth settings are validated even when OAuth is inactive.
	pub fn with_http_client<C, M>(
		config: &Config,
		events: EventBus,
		http_client: impl Into<Arc<C>>,
		error_mapper: impl Into<Arc<M>>,
	) -> Result<Self, ConfigError>
	where
		C: ?Sized + TokenHttpClient,
		M: ?Sized + TransportErrorMapper<C::TransportError>,
	{
		config.oauth.validate()?;

		let mut strategies: Vec<Strategy> = Vec::with_capacity(2);

		if config.basic.is_active() {
			strategies.push(BasicDecorator::new(&config.basic, &events).into());
		}
		if config.oauth.is_active() {
			let decorator = OAuthDecorator::with_http_client::<C, M>(
				&config.oauth,
				http_client,
				error_mapper,
				&events,
			)?;

			strategies.push(decorator.into());
		}

		Ok(Self::from_strategies(strategies, events))
	}

	/// Builds the chain from prepared strategies.
	///
	/// The strategies should publish to `events` so chain-level and strategy-level events reach
	/// the same listeners.
	pub fn from_strategies(strategies: impl IntoIterator<Item = Strategy>, events: EventBus) -> Self {
		let mut strategies = strategies.into_iter().collect::<Vec<_>>();

		strategies.sort_by_key(|strategy| Reverse(strategy.priority()));

		Self { strategies, events }
	}

	/// Strategies in the order they are tried.
	pub fn strategies(&self) -> &[Strategy] {
		&self.strategies
	}

	/// Bus receiving every fetch and decorate event produced by this chain.
	pub fn events(&self) -> &EventBus {
		&self.events
	}

	/// Registers a fetch listener on the chain's bus.
	pub fn add_fetch_listener(&self, listener: impl FetchListener + 'static) -> Registration {
		self.events.add_fetch_listener(listener)
	}

	/// Registers a decorate listener on the chain's bus.
	pub fn add_decorate_listener(&self, listener: impl DecorateListener + 'static) -> Registration {
		self.events.add_decorate_listener(listener)
	}

	/// Decorates `request` with the first strategy that succeeds.
	///
	/// When every strategy fails the request is left untouched, one [`CredentialKind::None`]
	/// event carrying the combined error is published after the strategies' own events, and the
	/// [`DecorationError`] is returned. A chain without strategies succeeds without attaching a
	/// credential.
	pub async fn decorate<R>(&self, request: &mut R) -> Result<()>
	where
		R: ?Sized + RequestHeaders,
	{
		let span = OpSpan::new(CredentialKind::None, "chain");

		span.instrument(self.decorate_in_order(request)).await
	}

	async fn decorate_in_order<R>(&self, request: &mut R) -> Result<()>
	where
		R: ?Sized + RequestHeaders,
	{
		const KIND: CredentialKind = CredentialKind::None;

		let at = OffsetDateTime::now_utc();
		let mut failures = Vec::with_capacity(self.strategies.len());

		obs::record_op_outcome(KIND, "chain", OpOutcome::Attempt);

		for strategy in &self.strategies {
			match strategy.decorate(request).await {
				Ok(()) => {
					obs::record_op_outcome(KIND, "chain", OpOutcome::Success);

					return Ok(());
				},
				Err(error) => failures.push(StrategyFailure {
					kind: strategy.kind(),
					priority: strategy.priority(),
					error,
				}),
			}
		}

		let mut event = DecorateEvent::started(KIND, at);
		let result = if failures.is_empty() {
			#[cfg(feature = "tracing")]
			tracing::warn!(
				"No credential strategy is configured; the request is sent unauthenticated."
			);

			Ok(())
		} else {
			Err(Error::from(DecorationError { failures }))
		};

		event.duration = OffsetDateTime::now_utc() - at;
		event.error = result.as_ref().err().cloned();

		obs::record_op_outcome(KIND, "chain", OpOutcome::of(&result));
		self.events.publish(event);

		result
	}
}
impl Debug for DecoratorChain {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("DecoratorChain")
			.field("strategies", &self.strategies)
			.field("events", &self.events)
			.finish()
	}
}
