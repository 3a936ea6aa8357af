//! Decorates a request with a client-credentials bearer token and prints the emitted events.
//!
//! Set `OAUTH_URL`, `OAUTH_CLIENT_ID`, `OAUTH_CLIENT_SECRET`, and optionally `OAUTH_SCOPES`
//! (comma separated) to talk to a real authorization server; otherwise a local mock is used.

// std
use std::{env, time::Duration};
// crates.io
use color_eyre::Result;
use httpmock::prelude::*;
// self
use vouch::{
	Config, DecorateEvent, DecoratorChain, EventBus, FetchEvent, OAuthConfig,
	exchange::ReqwestTransportErrorMapper, http::ReqwestHttpClient, reqwest::Client,
};

fn env_var(key: &str) -> Option<String> {
	env::var(key).ok().map(|value| value.trim().to_owned()).filter(|value| !value.is_empty())
}

fn print_fetch(event: &FetchEvent) {
	println!("Fetch event:");
	println!("  at:         {}", event.at);
	println!("  kind:       {}", event.kind);
	println!("  duration:   {}", event.duration);
	println!("  expiration: {:?}", event.expiration);
	println!("  original:   {:?}", event.original_expiration);
	println!("  error:      {:?}", event.error);
}

fn print_decorate(event: &DecorateEvent) {
	println!("Decorate event:");
	println!("  at:         {}", event.at);
	println!("  kind:       {}", event.kind);
	println!("  duration:   {}", event.duration);
	println!("  expiration: {:?}", event.expiration);
	println!("  error:      {:?}", event.error);
}

#[tokio::main]
async fn main() -> Result<()> {
	color_eyre::install()?;

	let server = MockServer::start_async().await;
	let _token_mock = server
		.mock_async(|when, then| {
			when.method(POST).path("/token");
			then.status(200)
				.header("content-type", "application/json")
				.body("{\"access_token\":\"demo-access\",\"expires_in\":900}");
		})
		.await;
	let token_url = env_var("OAUTH_URL");
	// The local mock serves a self-signed certificate.
	let client = Client::builder()
		.timeout(Duration::from_secs(10))
		.danger_accept_invalid_certs(token_url.is_none())
		.build()?;
	let config = Config {
		oauth: OAuthConfig {
			token_url: token_url.unwrap_or_else(|| server.url("/token")),
			client_id: env_var("OAUTH_CLIENT_ID").unwrap_or_else(|| "demo-client".into()),
			client_secret: env_var("OAUTH_CLIENT_SECRET").unwrap_or_else(|| "super-secret".into()),
			scopes: env_var("OAUTH_SCOPES")
				.map(|scopes| scopes.split(',').map(|scope| scope.trim().to_owned()).collect())
				.unwrap_or_default(),
			..Default::default()
		},
		..Default::default()
	};
	let chain = DecoratorChain::with_http_client::<ReqwestHttpClient, ReqwestTransportErrorMapper>(
		&config,
		EventBus::default(),
		ReqwestHttpClient::with_client(client),
		ReqwestTransportErrorMapper,
	)?;
	let _fetches = chain.add_fetch_listener(print_fetch);
	let _decorates = chain.add_decorate_listener(print_decorate);
	let mut request = Client::new().get("https://example.com").build()?;

	chain.decorate(&mut request).await?;

	println!("Request headers: {:?}", request.headers());

	Ok(())
}
