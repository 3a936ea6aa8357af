mod common;

// std
use std::sync::Arc;
// crates.io
use httpmock::prelude::*;
// self
use vouch::{
	AuthStyle, EventBus, FetchError, OAuthConfig, ReusingTokenCache, SafetyMargin,
	SafetyMarginSource, TokenSource,
	exchange::{ClientCredentialsExchanger, ReqwestTransportErrorMapper, TokenExchanger},
	http::ReqwestHttpClient,
};

const CLIENT_ID: &str = "client-id";
const CLIENT_SECRET: &str = "secret";
// base64("client-id:secret")
const CLIENT_BASIC: &str = "Basic Y2xpZW50LWlkOnNlY3JldA==";

type TestExchanger = ClientCredentialsExchanger<ReqwestHttpClient, ReqwestTransportErrorMapper>;

fn config(server: &MockServer, style: &str) -> OAuthConfig {
	OAuthConfig {
		client_id: CLIENT_ID.into(),
		client_secret: CLIENT_SECRET.into(),
		token_url: server.url("/token"),
		scopes: vec!["api.read".into(), "api.write".into()],
		endpoint_params: [("audience".to_owned(), vec!["svc".to_owned()])].into_iter().collect(),
		auth_style: style.into(),
		..Default::default()
	}
}

fn exchanger(server: &MockServer, style: &str) -> TestExchanger {
	ClientCredentialsExchanger::from_config(
		&config(server, style),
		common::test_http_client(),
		ReqwestTransportErrorMapper,
	)
	.expect("Exchanger should build against the mock server.")
}

#[tokio::test]
async fn header_style_sends_basic_client_authentication() {
	let server = MockServer::start_async().await;
	let mock = server
		.mock_async(|when, then| {
			when.method(POST)
				.path("/token")
				.header("authorization", CLIENT_BASIC)
				.body_includes("grant_type=client_credentials")
				.body_includes("scope=api.read+api.write")
				.body_includes("audience=svc");
			then.status(200)
				.header("content-type", "application/json")
				.body("{\"access_token\":\"header-token\",\"token_type\":\"bearer\",\"expires_in\":1800}");
		})
		.await;
	let exchanger = exchanger(&server, "in_header");
	let token = exchanger.exchange().await.expect("Header style exchange should succeed.");

	assert_eq!(token.access_token.expose(), "header-token");
	assert_eq!(token.expires_in, Some(time::Duration::seconds(1800)));
	assert_eq!(token.expires_at, None);

	mock.assert_calls_async(1).await;
}

#[tokio::test]
async fn params_style_sends_form_credentials() {
	let server = MockServer::start_async().await;
	let mock = server
		.mock_async(|when, then| {
			when.method(POST)
				.path("/token")
				.body_includes("client_id=client-id")
				.body_includes("client_secret=secret");
			then.status(200)
				.header("content-type", "application/json")
				.body("{\"access_token\":\"params-token\"}");
		})
		.await;
	let exchanger = exchanger(&server, "in_params");
	let token = exchanger.exchange().await.expect("Params style exchange should succeed.");

	assert_eq!(token.access_token.expose(), "params-token");
	assert_eq!(token.expires_in, None);

	mock.assert_calls_async(1).await;
}

#[tokio::test]
async fn auto_detect_falls_back_to_params_and_remembers_it() {
	let server = MockServer::start_async().await;
	let header_mock = server
		.mock_async(|when, then| {
			when.method(POST).path("/token").header("authorization", CLIENT_BASIC);
			then.status(401)
				.header("content-type", "application/json")
				.body("{\"error\":\"invalid_client\"}");
		})
		.await;
	let params_mock = server
		.mock_async(|when, then| {
			when.method(POST).path("/token").body_includes("client_secret=secret");
			then.status(200)
				.header("content-type", "application/json")
				.body("{\"access_token\":\"detected-token\",\"expires_in\":3600}");
		})
		.await;
	let exchanger = exchanger(&server, "");

	assert_eq!(exchanger.effective_style(), AuthStyle::AutoDetect);

	for _ in 0..2 {
		let token = exchanger.exchange().await.expect("Auto-detected exchange should succeed.");

		assert_eq!(token.access_token.expose(), "detected-token");
	}

	assert_eq!(exchanger.effective_style(), AuthStyle::InParams);

	header_mock.assert_calls_async(1).await;
	params_mock.assert_calls_async(2).await;
}

#[tokio::test]
async fn oauth_error_responses_map_to_rejections() {
	let server = MockServer::start_async().await;
	let mock = server
		.mock_async(|when, then| {
			when.method(POST).path("/token");
			then.status(400)
				.header("content-type", "application/json")
				.body("{\"error\":\"invalid_request\",\"error_description\":\"missing scope\"}");
		})
		.await;
	let exchanger = exchanger(&server, "in_params");
	let err = exchanger.exchange().await.expect_err("HTTP 400 responses must fail.");

	match err {
		FetchError::Rejected { error, description, status } => {
			assert_eq!(error, "invalid_request");
			assert_eq!(description.as_deref(), Some("missing scope"));
			assert_eq!(status, Some(400));
		},
		other => panic!("Unexpected error: {other:?}"),
	}

	mock.assert_calls_async(1).await;
}

#[tokio::test]
async fn malformed_success_bodies_map_to_parse_errors() {
	let server = MockServer::start_async().await;
	let _mock = server
		.mock_async(|when, then| {
			when.method(POST).path("/token");
			then.status(200).header("content-type", "application/json").body("{\"token\":1}");
		})
		.await;
	let exchanger = exchanger(&server, "in_header");
	let err = exchanger.exchange().await.expect_err("Bodies without access_token must fail.");

	assert!(matches!(err, FetchError::TokenResponseParse { status: Some(200), .. }));
}

#[tokio::test]
async fn exchangers_plug_into_token_sources() {
	let server = MockServer::start_async().await;
	let mock = server
		.mock_async(|when, then| {
			when.method(POST).path("/token");
			then.status(200)
				.header("content-type", "application/json")
				.body("{\"access_token\":\"source-token\",\"expires_in\":3600}");
		})
		.await;
	let exchanger: Arc<dyn TokenExchanger> = Arc::new(exchanger(&server, "in_header"));
	let source = SafetyMarginSource::new(
		exchanger,
		SafetyMargin::new(0.5).expect("Margin should be valid."),
		time::Duration::ZERO,
		Arc::new(EventBus::default()),
	);
	let cache = ReusingTokenCache::new(source);
	let first = cache.token().await.expect("First token should be fetched.");
	let second = cache.token().await.expect("Second token should be cached.");

	assert_eq!(first, second);
	assert!(first.expires_at.is_some());

	mock.assert_calls_async(1).await;
}

#[tokio::test]
async fn quoted_and_negative_lifetimes_are_tolerated() {
	let server = MockServer::start_async().await;
	let quoted = server
		.mock_async(|when, then| {
			when.method(POST).path("/token").body_includes("client_secret=secret");
			then.status(200)
				.header("content-type", "application/json")
				.body("{\"access_token\":\"quoted-token\",\"expires_in\":\"3600\"}");
		})
		.await;
	let negative = server
		.mock_async(|when, then| {
			when.method(POST).path("/token").header("authorization", CLIENT_BASIC);
			then.status(200)
				.header("content-type", "application/json")
				.body("{\"access_token\":\"negative-token\",\"expires_in\":-1}");
		})
		.await;
	let token = exchanger(&server, "in_params")
		.exchange()
		.await
		.expect("Quoted lifetimes should be accepted.");

	assert_eq!(token.expires_in, Some(time::Duration::seconds(3600)));

	let default_lifetime = time::Duration::seconds(600);
	let source = SafetyMarginSource::new(
		exchanger(&server, "in_header"),
		SafetyMargin::new(0.5).expect("Margin should be valid."),
		default_lifetime,
		Arc::new(EventBus::default()),
	);
	let before = time::OffsetDateTime::now_utc();
	let token = source.token().await.expect("Negative lifetimes should fall back to the default.");
	let expiry = token.expires_at.expect("Default lifetime should set an expiry.");

	assert_eq!(token.access_token.expose(), "negative-token");
	assert!(expiry >= before + time::Duration::seconds(300));
	assert!(expiry <= time::OffsetDateTime::now_utc() + time::Duration::seconds(300));

	quoted.assert_calls_async(1).await;
	negative.assert_calls_async(1).await;
}
