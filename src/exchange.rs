//! Client-credentials token exchange over the `oauth2` crate.
//!
//! [`TokenExchanger`] is the network-facing leaf of the token pipeline: every call performs one
//! round trip and returns the raw token plus its `expires_in` hint. Expiry adjustment and reuse
//! are layered on top by [`SafetyMarginSource`](crate::source::SafetyMarginSource) and
//! [`ReusingTokenCache`](crate::cache::ReusingTokenCache).

// crates.io
use oauth2::{
	AccessToken, AuthType, ClientId, ClientSecret, EndpointNotSet, EndpointSet, HttpClientError,
	RefreshToken, RequestTokenError, Scope, StandardRevocableToken, TokenResponse, TokenUrl,
	basic::{
		BasicErrorResponse, BasicRevocationErrorResponse, BasicTokenIntrospectionResponse,
		BasicTokenType,
	},
};
use serde::{
	Deserializer,
	de::{Error as _, Unexpected},
};
// self
use crate::{
	_prelude::*,
	config::{AuthStyle, OAuthConfig},
	error::{ConfigError, FetchError},
	http::{ResponseMetadata, ResponseMetadataSlot, TokenHttpClient},
	source::TokenFuture,
	token::Token,
};
#[cfg(feature = "reqwest")] use crate::http::ReqwestHttpClient;

type ExchangeClient<HasTokenUrl = EndpointSet> = oauth2::Client<
	BasicErrorResponse,
	ClientCredentialsResponse,
	BasicTokenIntrospectionResponse,
	StandardRevocableToken,
	BasicRevocationErrorResponse,
	EndpointNotSet,
	EndpointNotSet,
	EndpointNotSet,
	EndpointNotSet,
	HasTokenUrl,
>;
type ExchangeError<E> = RequestTokenError<HttpClientError<E>, BasicErrorResponse>;

/// Performs the network round trip of a client-credentials grant.
pub trait TokenExchanger
where
	Self: Send + Sync,
{
	/// Requests a fresh token from the authorization server.
	fn exchange(&self) -> TokenFuture<'_>;
}
impl<T> TokenExchanger for Arc<T>
where
	T: ?Sized + TokenExchanger,
{
	fn exchange(&self) -> TokenFuture<'_> {
		(**self).exchange()
	}
}

/// Maps HTTP transport failures into [`FetchError`] values.
pub trait TransportErrorMapper<E>
where
	Self: 'static + Send + Sync,
	E: 'static + Send + Sync + StdError,
{
	/// Converts an [`HttpClientError`] emitted by the transport into a fetch error.
	fn map_transport_error(
		&self,
		metadata: Option<&ResponseMetadata>,
		error: HttpClientError<E>,
	) -> FetchError;
}

/// Default mapper for reqwest-backed transports.
#[cfg(feature = "reqwest")]
#[derive(Clone, Debug, Default)]
pub struct ReqwestTransportErrorMapper;
#[cfg(feature = "reqwest")]
impl TransportErrorMapper<ReqwestError> for ReqwestTransportErrorMapper {
	fn map_transport_error(
		&self,
		meta: Option<&ResponseMetadata>,
		err: HttpClientError<ReqwestError>,
	) -> FetchError {
		match err {
			HttpClientError::Reqwest(inner) if inner.is_timeout() => FetchError::TokenEndpoint {
				message: "Request timed out while calling the token endpoint".into(),
				status: meta_status(meta).or_else(|| inner.status().map(|code| code.as_u16())),
				retry_after: meta_retry_after(meta),
			},
			HttpClientError::Reqwest(inner) => FetchError::from(*inner),
			HttpClientError::Http(inner) => FetchError::from(inner),
			HttpClientError::Io(inner) => FetchError::from(inner),
			HttpClientError::Other(message) => map_generic_transport_error(meta, message),
			_ => map_generic_transport_error(meta, "unknown transport failure"),
		}
	}
}

/// Token exchanger issuing client-credentials grants against one token endpoint.
///
/// With [`AuthStyle::AutoDetect`] the first exchange tries HTTP Basic client authentication and
/// falls back to form parameters; whichever style succeeds is used for every later exchange.
pub struct ClientCredentialsExchanger<C, M>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	oauth_client: ExchangeClient,
	token_url: String,
	scopes: Vec<Scope>,
	endpoint_params: Vec<(String, String)>,
	style: AuthStyle,
	detected_style: Mutex<Option<AuthStyle>>,
	http_client: Arc<C>,
	error_mapper: Arc<M>,
}
impl<C, M> ClientCredentialsExchanger<C, M>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	/// Builds an exchanger from validated OAuth settings and a caller-provided transport.
	pub fn from_config(
		config: &OAuthConfig,
		http_client: impl Into<Arc<C>>,
		error_mapper: impl Into<Arc<M>>,
	) -> Result<Self, ConfigError> {
		let style = config.auth_style.parse::<AuthStyle>()?;
		let token_url = TokenUrl::new(config.token_url.clone())
			.map_err(|source| ConfigError::InvalidTokenUrl { source })?;
		let mut oauth_client = <ExchangeClient<EndpointNotSet>>::new(ClientId::new(
			config.client_id.clone(),
		))
		.set_token_uri(token_url);

		if !config.client_secret.is_empty() {
			oauth_client =
				oauth_client.set_client_secret(ClientSecret::new(config.client_secret.clone()));
		}

		let endpoint_params = config
			.endpoint_params
			.iter()
			.flat_map(|(key, values)| values.iter().map(move |value| (key.clone(), value.clone())))
			.collect();

		Ok(Self {
			oauth_client,
			token_url: config.token_url.clone(),
			scopes: config.scopes.iter().cloned().map(Scope::new).collect(),
			endpoint_params,
			style,
			detected_style: Mutex::new(None),
			http_client: http_client.into(),
			error_mapper: error_mapper.into(),
		})
	}

	/// Style used for the next exchange; `AutoDetect` until a probe has succeeded.
	pub fn effective_style(&self) -> AuthStyle {
		match self.style {
			AuthStyle::AutoDetect => (*self.detected_style.lock()).unwrap_or(AuthStyle::AutoDetect),
			style => style,
		}
	}

	async fn probe(&self) -> Result<Token, FetchError> {
		match self.request_token(AuthStyle::InHeader).await {
			Ok(token) => {
				*self.detected_style.lock() = Some(AuthStyle::InHeader);

				Ok(token)
			},
			Err(_header_err) => {
				#[cfg(feature = "tracing")]
				tracing::warn!(
					error = %_header_err,
					"Header client authentication failed; retrying with form parameters."
				);

				let token = self.request_token(AuthStyle::InParams).await?;

				*self.detected_style.lock() = Some(AuthStyle::InParams);

				Ok(token)
			},
		}
	}

	async fn request_token(&self, style: AuthStyle) -> Result<Token, FetchError> {
		let meta = ResponseMetadataSlot::default();
		let instrumented = self.http_client.with_metadata(meta.clone());
		let auth_type =
			if style == AuthStyle::InParams { AuthType::RequestBody } else { AuthType::BasicAuth };
		let oauth_client = self.oauth_client.clone().set_auth_type(auth_type);
		let mut request = oauth_client.exchange_client_credentials();

		for scope in &self.scopes {
			request = request.add_scope(scope.clone());
		}
		for (key, value) in &self.endpoint_params {
			request = request.add_extra_param(key, value);
		}

		let response = request
			.request_async(&instrumented)
			.await
			.map_err(|err| map_request_error(meta.take(), err, self.error_mapper.as_ref()))?;
		let token = Token::new(response.access_token().secret().to_owned());

		match response.expires_in() {
			Some(expires_in) => Ok(token.with_expires_in(
				Duration::try_from(expires_in).map_err(|_| FetchError::ExpiresInOutOfRange)?,
			)),
			None => Ok(token),
		}
	}
}
#[cfg(feature = "reqwest")]
impl ClientCredentialsExchanger<ReqwestHttpClient, ReqwestTransportErrorMapper> {
	/// Builds an exchanger backed by a default reqwest client.
	pub fn new(config: &OAuthConfig) -> Result<Self, ConfigError> {
		Self::from_config(config, ReqwestHttpClient::default(), ReqwestTransportErrorMapper)
	}
}
impl<C, M> TokenExchanger for ClientCredentialsExchanger<C, M>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	fn exchange(&self) -> TokenFuture<'_> {
		Box::pin(async move {
			match self.effective_style() {
				AuthStyle::AutoDetect => self.probe().await,
				style => self.request_token(style).await,
			}
		})
	}
}
impl<C, M> Debug for ClientCredentialsExchanger<C, M>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("ClientCredentialsExchanger")
			.field("token_url", &self.token_url)
			.field("scopes", &self.scopes)
			.field("style", &self.style)
			.field("effective_style", &self.effective_style())
			.finish()
	}
}

/// Token endpoint response; `token_type` is optional and assumed to be `bearer`.
///
/// `expires_in` may be a number or a numeric string; non-positive values count as absent.
#[derive(Clone, Debug, Deserialize, Serialize)]
struct ClientCredentialsResponse {
	access_token: AccessToken,
	#[serde(skip, default = "bearer")]
	token_type: BasicTokenType,
	#[serde(
		default,
		deserialize_with = "deserialize_expires_in",
		skip_serializing_if = "Option::is_none"
	)]
	expires_in: Option<u64>,
}
impl TokenResponse for ClientCredentialsResponse {
	type TokenType = BasicTokenType;

	fn access_token(&self) -> &AccessToken {
		&self.access_token
	}

	fn token_type(&self) -> &Self::TokenType {
		&self.token_type
	}

	fn expires_in(&self) -> Option<std::time::Duration> {
		self.expires_in.map(std::time::Duration::from_secs)
	}

	fn refresh_token(&self) -> Option<&RefreshToken> {
		None
	}

	fn scopes(&self) -> Option<&Vec<Scope>> {
		None
	}
}

fn bearer() -> BasicTokenType {
	BasicTokenType::Bearer
}

fn deserialize_expires_in<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
where
	D: Deserializer<'de>,
{
	#[derive(Deserialize)]
	#[serde(untagged)]
	enum Lifetime {
		Seconds(i64),
		Text(String),
	}

	let seconds = match Option::<Lifetime>::deserialize(deserializer)? {
		None => return Ok(None),
		Some(Lifetime::Seconds(seconds)) => seconds,
		Some(Lifetime::Text(text)) => text.trim().parse::<i64>().map_err(|_| {
			D::Error::invalid_value(Unexpected::Str(&text), &"a number of seconds")
		})?,
	};

	Ok(u64::try_from(seconds).ok().filter(|seconds| *seconds > 0))
}

fn map_request_error<E, M>(
	meta: Option<ResponseMetadata>,
	err: ExchangeError<E>,
	mapper: &M,
) -> FetchError
where
	E: 'static + Send + Sync + StdError,
	M: ?Sized + TransportErrorMapper<E>,
{
	let meta = meta.as_ref();

	match err {
		RequestTokenError::ServerResponse(response) => FetchError::Rejected {
			error: response.error().as_ref().to_owned(),
			description: response.error_description().cloned(),
			status: meta_status(meta),
		},
		RequestTokenError::Request(error) => mapper.map_transport_error(meta, error),
		RequestTokenError::Parse(source, _body) =>
			FetchError::TokenResponseParse { source: Arc::new(source), status: meta_status(meta) },
		RequestTokenError::Other(message) => FetchError::TokenEndpoint {
			message,
			status: meta_status(meta),
			retry_after: meta_retry_after(meta),
		},
	}
}

fn map_generic_transport_error(meta: Option<&ResponseMetadata>, message: impl Display) -> FetchError {
	FetchError::TokenEndpoint {
		message: format!("HTTP client error occurred while calling the token endpoint: {message}"),
		status: meta_status(meta),
		retry_after: meta_retry_after(meta),
	}
}

fn meta_status(meta: Option<&ResponseMetadata>) -> Option<u16> {
	meta.and_then(|value| value.status)
}

fn meta_retry_after(meta: Option<&ResponseMetadata>) -> Option<Duration> {
	meta.and_then(|value| value.retry_after)
}

#[cfg(all(test, feature = "reqwest"))]
mod tests {
	// self
	use super::*;

	fn config(style: &str) -> OAuthConfig {
		OAuthConfig {
			client_id: "client-id".into(),
			client_secret: "secret".into(),
			token_url: "https://example.com/oauth2/token".into(),
			auth_style: style.into(),
			..Default::default()
		}
	}

	#[test]
	fn builds_for_every_known_style() {
		for style in ["", "auto_detect", "in_params", "in_header"] {
			assert!(ClientCredentialsExchanger::new(&config(style)).is_ok(), "style `{style}`");
		}
	}

	#[test]
	fn fixed_styles_skip_detection() {
		let exchanger = ClientCredentialsExchanger::new(&config("in_params"))
			.expect("Params style should build.");

		assert_eq!(exchanger.effective_style(), AuthStyle::InParams);

		let exchanger =
			ClientCredentialsExchanger::new(&config("")).expect("Auto-detect style should build.");

		assert_eq!(exchanger.effective_style(), AuthStyle::AutoDetect);
	}

	#[test]
	fn rejects_unparseable_token_url() {
		let mut config = config("in_header");

		config.token_url = "not a url".into();

		let err = ClientCredentialsExchanger::new(&config)
			.expect_err("Relative token URLs must be rejected.");

		assert!(matches!(err, ConfigError::InvalidTokenUrl { .. }));
	}

	#[test]
	fn response_without_token_type_deserializes() {
		let response: ClientCredentialsResponse =
			serde_json::from_str(r#"{"access_token":"mock-token","expires_in":3600}"#)
				.expect("Responses without token_type should parse.");

		assert_eq!(response.access_token().secret(), "mock-token");
		assert_eq!(response.expires_in(), Some(std::time::Duration::from_secs(3600)));
		assert_eq!(response.token_type(), &BasicTokenType::Bearer);
	}

	#[test]
	fn expires_in_accepts_numeric_strings() {
		let response: ClientCredentialsResponse =
			serde_json::from_str(r#"{"access_token":"mock-token","expires_in":"3600"}"#)
				.expect("Quoted lifetimes should parse.");

		assert_eq!(response.expires_in(), Some(std::time::Duration::from_secs(3600)));
	}

	#[test]
	fn non_positive_expires_in_counts_as_absent() {
		for body in [
			r#"{"access_token":"mock-token","expires_in":0}"#,
			r#"{"access_token":"mock-token","expires_in":-1}"#,
			r#"{"access_token":"mock-token","expires_in":"-30"}"#,
			r#"{"access_token":"mock-token","expires_in":null}"#,
		] {
			let response: ClientCredentialsResponse =
				serde_json::from_str(body).expect("Non-positive lifetimes should parse.");

			assert_eq!(response.expires_in(), None, "body `{body}`");
		}
	}

	#[test]
	fn non_numeric_expires_in_is_rejected() {
		let err = serde_json::from_str::<ClientCredentialsResponse>(
			r#"{"access_token":"mock-token","expires_in":"soon"}"#,
		)
		.expect_err("Non-numeric lifetimes must fail.");

		assert!(err.to_string().contains("soon"));
	}

	#[test]
	fn server_response_maps_to_rejection() {
		let response = BasicErrorResponse::new(
			oauth2::basic::BasicErrorResponseType::InvalidRequest,
			Some("missing grant".into()),
			None,
		);
		let err = map_request_error::<ReqwestError, _>(
			Some(ResponseMetadata { status: Some(400), retry_after: None }),
			RequestTokenError::ServerResponse(response),
			&ReqwestTransportErrorMapper,
		);

		assert!(matches!(
			err,
			FetchError::Rejected { ref error, status: Some(400), .. } if error == "invalid_request"
		));
	}
}
