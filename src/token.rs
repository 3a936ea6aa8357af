//! Access token model and the redacted secret wrapper.

// self
use crate::_prelude::*;

/// Redacted token secret wrapper keeping sensitive material out of logs.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenSecret(String);
impl TokenSecret {
	/// Wraps a new secret string.
	pub fn new(value: impl Into<String>) -> Self {
		Self(value.into())
	}

	/// Returns the inner token value. Callers must avoid logging this string.
	pub fn expose(&self) -> &str {
		&self.0
	}
}
impl AsRef<str> for TokenSecret {
	fn as_ref(&self) -> &str {
		self.expose()
	}
}
impl Debug for TokenSecret {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_tuple("TokenSecret").field(&"<redacted>").finish()
	}
}
impl Display for TokenSecret {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str("<redacted>")
	}
}

/// Access token issued by a client-credentials exchange.
///
/// Exchangers produce tokens carrying only the raw `expires_in` hint; the
/// [`SafetyMarginSource`](crate::source::SafetyMarginSource) then stamps the adjusted
/// [`expires_at`](Token::expires_at) and marks the token as adjusted. A token without an
/// expiry never expires.
#[derive(Clone, PartialEq, Eq)]
pub struct Token {
	/// Access token secret; callers must avoid logging it.
	pub access_token: TokenSecret,
	/// Instant after which the token must not be served.
	pub expires_at: Option<OffsetDateTime>,
	/// Lifetime reported by the token endpoint, if any.
	pub expires_in: Option<Duration>,
	adjusted: bool,
}
impl Token {
	/// Creates a non-expiring token with no lifetime hint.
	pub fn new(access_token: impl Into<String>) -> Self {
		Self {
			access_token: TokenSecret::new(access_token),
			expires_at: None,
			expires_in: None,
			adjusted: false,
		}
	}

	/// Sets the lifetime reported by the token endpoint.
	pub fn with_expires_in(mut self, expires_in: Duration) -> Self {
		self.expires_in = Some(expires_in);

		self
	}

	/// Sets an absolute expiry instant.
	pub fn with_expires_at(mut self, instant: OffsetDateTime) -> Self {
		self.expires_at = Some(instant);

		self
	}

	/// Returns `true` once the safety margin has been applied to this token.
	pub fn is_adjusted(&self) -> bool {
		self.adjusted
	}

	pub(crate) fn mark_adjusted(&mut self) {
		self.adjusted = true;
	}

	/// Returns `true` if the token may still be served at `instant`.
	pub fn is_valid_at(&self, instant: OffsetDateTime) -> bool {
		self.expires_at.is_none_or(|expiry| instant < expiry)
	}

	/// Convenience helper that checks validity against the current UTC instant.
	pub fn is_valid(&self) -> bool {
		self.is_valid_at(OffsetDateTime::now_utc())
	}
}
impl Debug for Token {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("Token")
			.field("access_token", &"<redacted>")
			.field("expires_at", &self.expires_at)
			.field("expires_in", &self.expires_in)
			.field("adjusted", &self.adjusted)
			.finish()
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn secret_formatters_redact() {
		let secret = TokenSecret::new("super-secret");

		assert_eq!(format!("{secret:?}"), "TokenSecret(\"<redacted>\")");
		assert_eq!(format!("{secret}"), "<redacted>");
		assert!(!format!("{:?}", Token::new("super-secret")).contains("super-secret"));
	}

	#[test]
	fn validity_honors_expiry() {
		let now = OffsetDateTime::now_utc();
		let token = Token::new("abc").with_expires_at(now + Duration::seconds(10));

		assert!(token.is_valid_at(now));
		assert!(!token.is_valid_at(now + Duration::seconds(10)));
		assert!(Token::new("forever").is_valid_at(now + Duration::days(3650)));
	}
}
