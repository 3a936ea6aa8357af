//! Single-flight reuse of tokens produced by an upstream [`TokenSource`].

// self
use crate::{
	_prelude::*,
	error::FetchError,
	source::{TokenFuture, TokenSource},
	token::Token,
};

/// Hands out the cached token while it is valid and refetches it otherwise.
///
/// The cache lock is held across the upstream fetch, so concurrent callers that find the cache
/// stale wait for one in-flight fetch instead of issuing their own. A failed fetch leaves the
/// previous token in place; it is already expired, so the next call retries.
pub struct ReusingTokenCache<S> {
	source: S,
	cached: AsyncMutex<Option<Token>>,
}
impl<S> ReusingTokenCache<S>
where
	S: TokenSource,
{
	/// Wraps `source` with an empty cache.
	pub fn new(source: S) -> Self {
		Self { source, cached: AsyncMutex::new(None) }
	}

	/// Seeds the cache with `token`; it is served until it expires.
	pub fn with_token(source: S, token: Token) -> Self {
		Self { source, cached: AsyncMutex::new(Some(token)) }
	}

	/// Returns the upstream source.
	pub fn source(&self) -> &S {
		&self.source
	}

	/// Returns a copy of the cached token without fetching.
	pub async fn peek(&self) -> Option<Token> {
		self.cached.lock().await.clone()
	}

	async fn get(&self) -> Result<Token, FetchError> {
		let mut cached = self.cached.lock().await;

		if let Some(token) = (*cached).as_ref().filter(|token| token.is_valid()) {
			return Ok(token.clone());
		}

		let token = self.source.token().await?;

		*cached = Some(token.clone());

		Ok(token)
	}
}
impl<S> TokenSource for ReusingTokenCache<S>
where
	S: TokenSource,
{
	fn token(&self) -> TokenFuture<'_> {
		Box::pin(self.get())
	}
}
impl<S> Debug for ReusingTokenCache<S>
where
	S: Debug,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("ReusingTokenCache").field("source", &self.source).finish_non_exhaustive()
	}
}
