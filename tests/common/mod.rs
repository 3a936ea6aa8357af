//! Transport shared by the integration tests.

// self
use vouch::{http::ReqwestHttpClient, reqwest::Client};

/// Builds a reqwest transport that accepts the self-signed certificates served by `httpmock`.
pub fn test_http_client() -> ReqwestHttpClient {
	let client = Client::builder()
		.danger_accept_invalid_certs(true)
		.danger_accept_invalid_hostnames(true)
		.build()
		.expect("Insecure reqwest client for tests should build.");

	ReqwestHttpClient::with_client(client)
}
