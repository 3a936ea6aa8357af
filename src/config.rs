//! Deserializable configuration for the Basic and OAuth 2.0 strategies.
//!
//! Empty sub-structures are valid and disable the corresponding strategy: Basic is active
//! only when a username is configured, OAuth only when both a client identifier and a token
//! endpoint are configured. When neither is active no credential is attached.

// self
use crate::{_prelude::*, error::ConfigError, source::SafetyMargin};

/// Top-level configuration covering every supported strategy.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
	/// Static HTTP Basic credentials.
	pub basic: BasicConfig,
	/// OAuth 2.0 client-credentials settings.
	pub oauth: OAuthConfig,
}

/// Static HTTP Basic credentials.
#[derive(Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct BasicConfig {
	/// Priority relative to other strategies; higher is tried first.
	///
	/// Unset or `0` selects 300.
	pub priority: Option<i32>,
	/// Basic username; an empty username disables the strategy.
	pub username: String,
	/// Basic password.
	pub password: String,
}
impl BasicConfig {
	/// Returns `true` when the configuration enables Basic decoration.
	pub fn is_active(&self) -> bool {
		!self.username.is_empty()
	}
}
impl Debug for BasicConfig {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("BasicConfig")
			.field("priority", &self.priority)
			.field("username", &self.username)
			.field("password", &"<redacted>")
			.finish()
	}
}

/// OAuth 2.0 client-credentials settings.
#[derive(Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct OAuthConfig {
	/// Priority relative to other strategies; higher is tried first.
	///
	/// Unset or `0` selects 1000.
	pub priority: Option<i32>,
	/// Application client identifier.
	pub client_id: String,
	/// Application client secret.
	pub client_secret: String,
	/// Token endpoint URL.
	pub token_url: String,
	/// Optional requested scopes.
	pub scopes: Vec<String>,
	/// Additional form parameters sent to the token endpoint.
	pub endpoint_params: BTreeMap<String, Vec<String>>,
	/// How the client identifier and secret are transmitted; see [`AuthStyle`].
	pub auth_style: String,
	/// Fraction of the token lifetime the cache trusts (`0.8` refreshes after 80% of it).
	pub safety_margin: f64,
	/// Lifetime assumed when the token endpoint omits `expires_in`; zero means non-expiring.
	#[serde(with = "duration_secs")]
	pub default_token_duration: Duration,
}
impl OAuthConfig {
	/// Margin applied when none is configured.
	pub const DEFAULT_SAFETY_MARGIN: f64 = 0.8;

	/// Returns `true` when the configuration enables OAuth decoration.
	pub fn is_active(&self) -> bool {
		!self.client_id.is_empty() && !self.token_url.is_empty()
	}

	/// Checks the auth style and safety margin; both are validated even when OAuth is inactive.
	pub fn validate(&self) -> Result<(), ConfigError> {
		self.auth_style.parse::<AuthStyle>()?;
		SafetyMargin::new(self.safety_margin)?;

		Ok(())
	}
}
impl Default for OAuthConfig {
	fn default() -> Self {
		Self {
			priority: None,
			client_id: String::new(),
			client_secret: String::new(),
			token_url: String::new(),
			scopes: Vec::new(),
			endpoint_params: BTreeMap::new(),
			auth_style: String::new(),
			safety_margin: Self::DEFAULT_SAFETY_MARGIN,
			default_token_duration: Duration::ZERO,
		}
	}
}
impl Debug for OAuthConfig {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("OAuthConfig")
			.field("priority", &self.priority)
			.field("client_id", &self.client_id)
			.field("client_secret_set", &!self.client_secret.is_empty())
			.field("token_url", &self.token_url)
			.field("scopes", &self.scopes)
			.field("endpoint_params", &self.endpoint_params.keys().collect::<Vec<_>>())
			.field("auth_style", &self.auth_style)
			.field("safety_margin", &self.safety_margin)
			.field("default_token_duration", &self.default_token_duration)
			.finish()
	}
}

/// Client authentication style used at the token endpoint.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum AuthStyle {
	/// Try HTTP Basic first and fall back to form parameters, remembering what worked.
	#[default]
	AutoDetect,
	/// Send `client_id`/`client_secret` as form parameters.
	InParams,
	/// Send the client credentials with HTTP Basic authentication.
	InHeader,
}
impl AuthStyle {
	/// Returns the configuration label for the style.
	pub const fn as_str(self) -> &'static str {
		match self {
			Self::AutoDetect => "auto_detect",
			Self::InParams => "in_params",
			Self::InHeader => "in_header",
		}
	}
}
impl FromStr for AuthStyle {
	type Err = ConfigError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s {
			"" | "auto_detect" => Ok(Self::AutoDetect),
			"in_params" => Ok(Self::InParams),
			"in_header" => Ok(Self::InHeader),
			other => Err(ConfigError::UnknownAuthStyle { style: other.to_owned() }),
		}
	}
}
impl Display for AuthStyle {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

mod duration_secs {
	// crates.io
	use serde::{Deserializer, Serializer};
	// self
	use crate::_prelude::*;

	pub fn serialize<S>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error>
	where
		S: Serializer,
	{
		serializer.serialize_i64(value.whole_seconds())
	}

	pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
	where
		D: Deserializer<'de>,
	{
		i64::deserialize(deserializer).map(Duration::seconds)
	}
}
