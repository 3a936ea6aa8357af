//! Crate-level error types shared across exchangers, token sources, and decorators.

// self
use crate::{_prelude::*, events::CredentialKind};

/// Crate-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

type SharedError = Arc<dyn StdError + Send + Sync>;

/// Canonical error exposed by public APIs.
///
/// Every variant is cheap to clone so telemetry events can carry an owned copy of the failure
/// that is also returned to the caller.
#[derive(Clone, Debug, ThisError)]
pub enum Error {
	/// Local configuration problem.
	#[error(transparent)]
	Config(#[from] ConfigError),
	/// Token acquisition failed.
	#[error(transparent)]
	Fetch(#[from] FetchError),
	/// Every active strategy failed to decorate the request.
	#[error(transparent)]
	Decoration(#[from] DecorationError),

	/// Acquired credential contains bytes that are not valid in an HTTP header.
	#[error("The {kind} credential cannot be encoded as an Authorization header value.")]
	InvalidHeaderValue {
		/// Strategy that produced the credential.
		kind: CredentialKind,
	},
}

/// Configuration and validation failures raised while constructing decorators.
#[derive(Clone, Debug, ThisError)]
pub enum ConfigError {
	/// Safety margin is outside `[0, 1]`.
	#[error("Expiration safety margin must be between 0 and 1, got {margin}.")]
	InvalidSafetyMargin {
		/// Rejected margin.
		margin: f64,
	},
	/// Credential transmission style is not one of the recognized labels.
	#[error("Unrecognized client authentication style `{style}`.")]
	UnknownAuthStyle {
		/// Rejected style label.
		style: String,
	},
	/// Token endpoint URL cannot be parsed.
	#[error("Token endpoint URL is invalid.")]
	InvalidTokenUrl {
		/// Underlying parsing failure.
		#[source]
		source: url::ParseError,
	},
}

/// Token acquisition failures raised by exchangers and token sources.
///
/// Fetch errors are never retried internally; they are published through a
/// [`FetchEvent`](crate::events::FetchEvent) and then returned unchanged.
#[derive(Clone, Debug, ThisError)]
pub enum FetchError {
	/// Token endpoint answered with an OAuth error response (e.g., HTTP 400 `invalid_request`).
	#[error("Token endpoint rejected the client credentials grant: {error}.")]
	Rejected {
		/// OAuth `error` code.
		error: String,
		/// OAuth `error_description`, when supplied.
		description: Option<String>,
		/// HTTP status code, when available.
		status: Option<u16>,
	},
	/// Token endpoint returned an unexpected but well-formed failure.
	#[error("Token endpoint returned an unexpected response: {message}.")]
	TokenEndpoint {
		/// Summary of the failure.
		message: String,
		/// HTTP status code, when available.
		status: Option<u16>,
		/// Retry-After hint from upstream, if supplied.
		retry_after: Option<Duration>,
	},
	/// Token endpoint responded with malformed JSON that could not be parsed.
	#[error("Token endpoint returned malformed JSON.")]
	TokenResponseParse {
		/// Structured parsing failure.
		#[source]
		source: Arc<serde_path_to_error::Error<serde_json::Error>>,
		/// HTTP status code, when available.
		status: Option<u16>,
	},
	/// Underlying HTTP client reported a network failure.
	#[error("Network error occurred while calling the token endpoint.")]
	Network {
		/// Transport-specific network error.
		#[source]
		source: SharedError,
	},
	/// Underlying IO failure surfaced during transport.
	#[error("I/O error occurred while calling the token endpoint.")]
	Io(#[source] Arc<std::io::Error>),
	/// Token request could not be assembled.
	#[error("Token request could not be constructed.")]
	HttpRequest(#[source] Arc<oauth2::http::Error>),
	/// Token lifetime does not fit the supported timestamp range.
	#[error("The expires_in value exceeds the supported range.")]
	ExpiresInOutOfRange,
}
impl FetchError {
	/// Wraps a transport-specific network error.
	pub fn network(src: impl 'static + Send + Sync + StdError) -> Self {
		Self::Network { source: Arc::new(src) }
	}

	/// HTTP status associated with the failure, when one was observed.
	pub fn status(&self) -> Option<u16> {
		match self {
			Self::Rejected { status, .. }
			| Self::TokenEndpoint { status, .. }
			| Self::TokenResponseParse { status, .. } => *status,
			_ => None,
		}
	}
}
impl From<std::io::Error> for FetchError {
	fn from(e: std::io::Error) -> Self {
		Self::Io(Arc::new(e))
	}
}
impl From<oauth2::http::Error> for FetchError {
	fn from(e: oauth2::http::Error) -> Self {
		Self::HttpRequest(Arc::new(e))
	}
}
#[cfg(feature = "reqwest")]
impl From<ReqwestError> for FetchError {
	fn from(e: ReqwestError) -> Self {
		Self::network(e)
	}
}

/// Aggregate failure returned when no strategy could decorate a request.
#[derive(Clone, Debug, ThisError)]
#[error("No credential strategy succeeded: {}.", render_failures(.failures))]
pub struct DecorationError {
	/// One entry per attempted strategy, in attempt order.
	pub failures: Vec<StrategyFailure>,
}
impl DecorationError {
	/// Returns `true` if a strategy of the provided kind contributed a failure.
	pub fn failed(&self, kind: CredentialKind) -> bool {
		self.failures.iter().any(|failure| failure.kind == kind)
	}
}

/// A single strategy's contribution to a [`DecorationError`].
#[derive(Clone, Debug)]
pub struct StrategyFailure {
	/// Strategy that failed.
	pub kind: CredentialKind,
	/// Priority the strategy was attempted with.
	pub priority: i32,
	/// Failure reported by the strategy.
	pub error: Error,
}
impl Display for StrategyFailure {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		write!(f, "{} (priority {}): {}", self.kind, self.priority, self.error)
	}
}

fn render_failures(failures: &[StrategyFailure]) -> String {
	failures.iter().map(ToString::to_string).collect::<Vec<_>>().join("; ")
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn decoration_error_names_every_failed_strategy() {
		let err = DecorationError {
			failures: vec![
				StrategyFailure {
					kind: CredentialKind::OAuth2,
					priority: 1000,
					error: FetchError::Rejected {
						error: "invalid_client".into(),
						description: None,
						status: Some(401),
					}
					.into(),
				},
				StrategyFailure {
					kind: CredentialKind::Basic,
					priority: 300,
					error: Error::InvalidHeaderValue { kind: CredentialKind::Basic },
				},
			],
		};
		let message = err.to_string();

		assert!(message.contains("oauth2 (priority 1000)"));
		assert!(message.contains("invalid_client"));
		assert!(message.contains("basic (priority 300)"));
		assert!(err.failed(CredentialKind::OAuth2));
		assert!(!err.failed(CredentialKind::None));
	}

	#[test]
	fn fetch_error_exposes_status() {
		let err = FetchError::TokenEndpoint {
			message: "gateway timeout".into(),
			status: Some(504),
			retry_after: Some(Duration::seconds(3)),
		};

		assert_eq!(err.status(), Some(504));
		assert_eq!(FetchError::ExpiresInOutOfRange.status(), None);
	}

	#[test]
	fn io_errors_keep_their_source() {
		let err = FetchError::from(std::io::Error::other("socket closed"));
		let source = StdError::source(&err).expect("I/O errors should expose their source.");

		assert_eq!(source.to_string(), "socket closed");
	}
}
