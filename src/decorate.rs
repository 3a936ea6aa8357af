//! Credential strategies that attach an `Authorization` header to outgoing requests.

mod basic;
mod chain;
mod oauth;

pub use basic::*;
pub use chain::*;
pub use oauth::*;

// crates.io
use oauth2::http::{HeaderMap, Request};
// self
use crate::{_prelude::*, events::CredentialKind};

/// Requests whose headers a strategy can write.
pub trait RequestHeaders {
	/// Mutable access to the request's header map.
	fn headers_mut(&mut self) -> &mut HeaderMap;
}
impl RequestHeaders for HeaderMap {
	fn headers_mut(&mut self) -> &mut HeaderMap {
		self
	}
}
impl<B> RequestHeaders for Request<B> {
	fn headers_mut(&mut self) -> &mut HeaderMap {
		Request::headers_mut(self)
	}
}
#[cfg(feature = "reqwest")]
impl RequestHeaders for reqwest::Request {
	fn headers_mut(&mut self) -> &mut HeaderMap {
		reqwest::Request::headers_mut(self)
	}
}

/// One configured way of authenticating a request.
#[derive(Debug)]
pub enum Strategy {
	/// Static HTTP Basic credentials.
	Basic(BasicDecorator),
	/// OAuth 2.0 client-credentials bearer tokens.
	OAuth(OAuthDecorator),
}
impl Strategy {
	/// Higher priorities are tried first.
	pub fn priority(&self) -> i32 {
		match self {
			Strategy::Basic(decorator) => decorator.priority(),
			Strategy::OAuth(decorator) => decorator.priority(),
		}
	}

	/// Credential kind attached by this strategy.
	pub fn kind(&self) -> CredentialKind {
		match self {
			Strategy::Basic(_) => CredentialKind::Basic,
			Strategy::OAuth(_) => CredentialKind::OAuth2,
		}
	}

	/// Attaches the credential to `request`; a failure leaves the request untouched.
	pub async fn decorate<R>(&self, request: &mut R) -> Result<()>
	where
		R: ?Sized + RequestHeaders,
	{
		match self {
			Strategy::Basic(decorator) => decorator.decorate(request),
			Strategy::OAuth(decorator) => decorator.decorate(request).await,
		}
	}
}
impl From<BasicDecorator> for Strategy {
	fn from(decorator: BasicDecorator) -> Self {
		Strategy::Basic(decorator)
	}
}
impl From<OAuthDecorator> for Strategy {
	fn from(decorator: OAuthDecorator) -> Self {
		Strategy::OAuth(decorator)
	}
}
