//! Coordinator configuration and its validating builder.
//!
//! Every endpoint the coordinator special-cases is a path joined onto one base URL. The builder
//! refuses configurations that would let a refresh call be treated as a protected request,
//! because such a refresh could observe its own `401` and start another cycle.

// std
use std::str::FromStr;
// crates.io
use ::http::HeaderName;
// self
use crate::{_prelude::*, error::ConfigError};

/// Immutable coordinator configuration.
///
/// Deserialization goes through [`CoordinatorConfigBuilder`], so a config loaded from disk is
/// validated exactly like one built in code.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "CoordinatorConfigBuilder", into = "CoordinatorConfigBuilder")]
pub struct CoordinatorConfig {
	/// Origin that relative request URLs are resolved against.
	pub base_url: Url,
	/// Path of the session refresh endpoint (`POST`).
	pub refresh_path: String,
	/// Path of the CSRF bootstrap endpoint (`GET`).
	pub csrf_token_path: String,
	/// Path of the sign-in surface used after a failed refresh.
	pub sign_in_path: String,
	/// Substring that marks a URL path as an authentication endpoint.
	pub auth_marker: String,
	/// Header carrying the CSRF token on protected requests.
	pub csrf_header: HeaderName,
	/// Freshness window stamped on every token the coordinator stores.
	pub token_lifetime: Duration,
}
impl CoordinatorConfig {
	/// Default refresh endpoint path.
	pub const DEFAULT_REFRESH_PATH: &'static str = "/api/auth/refresh";
	/// Default CSRF bootstrap endpoint path.
	pub const DEFAULT_CSRF_TOKEN_PATH: &'static str = "/api/auth/csrf-token";
	/// Default sign-in path.
	pub const DEFAULT_SIGN_IN_PATH: &'static str = "/sign-in";
	/// Default auth endpoint marker.
	pub const DEFAULT_AUTH_MARKER: &'static str = "/auth/";
	/// Default CSRF header name.
	pub const DEFAULT_CSRF_HEADER: &'static str = "X-CSRF-Token";
	/// Default token lifetime.
	pub const DEFAULT_TOKEN_LIFETIME: Duration = Duration::minutes(15);

	/// Creates a new builder rooted at `base_url`.
	pub fn builder(base_url: Url) -> CoordinatorConfigBuilder {
		CoordinatorConfigBuilder::new(base_url)
	}

	/// Resolves `url` against the base URL; absolute URLs pass through unchanged.
	pub fn resolve(&self, url: &str) -> Result<Url, ConfigError> {
		let trimmed = url.trim();

		if trimmed.is_empty() {
			return Err(ConfigError::EmptyUrl);
		}

		match Url::parse(trimmed) {
			Ok(absolute) => Ok(absolute),
			Err(url::ParseError::RelativeUrlWithoutBase) => self
				.base_url
				.join(trimmed)
				.map_err(|source| ConfigError::InvalidUrl { url: trimmed.to_owned(), source }),
			Err(source) => Err(ConfigError::InvalidUrl { url: trimmed.to_owned(), source }),
		}
	}

	/// Returns `true` if `url` targets an authentication endpoint.
	///
	/// Only the path is matched against the marker; the query string and fragment are ignored,
	/// so `/api/posts?next=/auth/` is still a protected request.
	pub fn is_auth_endpoint(&self, url: &Url) -> bool {
		url.path().contains(&self.auth_marker)
	}

	/// Absolute URL of the refresh endpoint.
	pub fn refresh_url(&self) -> Result<Url, ConfigError> {
		self.resolve(&self.refresh_path)
	}

	/// Absolute URL of the CSRF bootstrap endpoint.
	pub fn csrf_token_url(&self) -> Result<Url, ConfigError> {
		self.resolve(&self.csrf_token_path)
	}
}

/// Builder for [`CoordinatorConfig`] values; also the serialized form of a config.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CoordinatorConfigBuilder {
	base_url: Url,
	#[serde(default = "default_refresh_path")]
	refresh_path: String,
	#[serde(default = "default_csrf_token_path")]
	csrf_token_path: String,
	#[serde(default = "default_sign_in_path")]
	sign_in_path: String,
	#[serde(default = "default_auth_marker")]
	auth_marker: String,
	#[serde(default = "default_csrf_header")]
	csrf_header: String,
	#[serde(default = "default_token_lifetime")]
	token_lifetime: Duration,
}
impl CoordinatorConfigBuilder {
	/// Creates a new builder seeded with defaults.
	pub fn new(base_url: Url) -> Self {
		Self {
			base_url,
			refresh_path: default_refresh_path(),
			csrf_token_path: default_csrf_token_path(),
			sign_in_path: default_sign_in_path(),
			auth_marker: default_auth_marker(),
			csrf_header: default_csrf_header(),
			token_lifetime: default_token_lifetime(),
		}
	}

	/// Overrides the refresh endpoint path.
	pub fn refresh_path(mut self, path: impl Into<String>) -> Self {
		self.refresh_path = path.into();

		self
	}

	/// Overrides the CSRF bootstrap endpoint path.
	pub fn csrf_token_path(mut self, path: impl Into<String>) -> Self {
		self.csrf_token_path = path.into();

		self
	}

	/// Overrides the sign-in path.
	pub fn sign_in_path(mut self, path: impl Into<String>) -> Self {
		self.sign_in_path = path.into();

		self
	}

	/// Overrides the auth endpoint marker.
	pub fn auth_marker(mut self, marker: impl Into<String>) -> Self {
		self.auth_marker = marker.into();

		self
	}

	/// Overrides the CSRF header name.
	pub fn csrf_header(mut self, name: impl Into<String>) -> Self {
		self.csrf_header = name.into();

		self
	}

	/// Overrides the token lifetime (defaults to 15 minutes).
	pub fn token_lifetime(mut self, lifetime: Duration) -> Self {
		self.token_lifetime = lifetime;

		self
	}

	/// Consumes the builder and validates the resulting configuration.
	pub fn build(self) -> Result<CoordinatorConfig, ConfigError> {
		if self.base_url.cannot_be_a_base() {
			return Err(ConfigError::InvalidBaseUrl { url: self.base_url.to_string() });
		}
		if self.auth_marker.is_empty() {
			return Err(ConfigError::EmptyAuthMarker);
		}
		if !self.token_lifetime.is_positive() {
			return Err(ConfigError::NonPositiveTokenLifetime);
		}

		validate_path("sign_in", &self.sign_in_path)?;
		validate_auth_path("refresh", &self.refresh_path, &self.auth_marker)?;
		validate_auth_path("csrf_token", &self.csrf_token_path, &self.auth_marker)?;

		let csrf_header = HeaderName::from_str(&self.csrf_header)
			.map_err(|_| ConfigError::InvalidHeaderName { name: self.csrf_header.clone() })?;

		Ok(CoordinatorConfig {
			base_url: self.base_url,
			refresh_path: self.refresh_path,
			csrf_token_path: self.csrf_token_path,
			sign_in_path: self.sign_in_path,
			auth_marker: self.auth_marker,
			csrf_header,
			token_lifetime: self.token_lifetime,
		})
	}
}
impl TryFrom<CoordinatorConfigBuilder> for CoordinatorConfig {
	type Error = ConfigError;

	fn try_from(builder: CoordinatorConfigBuilder) -> Result<Self, Self::Error> {
		builder.build()
	}
}
impl From<CoordinatorConfig> for CoordinatorConfigBuilder {
	fn from(config: CoordinatorConfig) -> Self {
		Self {
			base_url: config.base_url,
			refresh_path: config.refresh_path,
			csrf_token_path: config.csrf_token_path,
			sign_in_path: config.sign_in_path,
			auth_marker: config.auth_marker,
			csrf_header: config.csrf_header.as_str().to_owned(),
			token_lifetime: config.token_lifetime,
		}
	}
}

fn default_refresh_path() -> String {
	CoordinatorConfig::DEFAULT_REFRESH_PATH.into()
}

fn default_csrf_token_path() -> String {
	CoordinatorConfig::DEFAULT_CSRF_TOKEN_PATH.into()
}

fn default_sign_in_path() -> String {
	CoordinatorConfig::DEFAULT_SIGN_IN_PATH.into()
}

fn default_auth_marker() -> String {
	CoordinatorConfig::DEFAULT_AUTH_MARKER.into()
}

fn default_csrf_header() -> String {
	CoordinatorConfig::DEFAULT_CSRF_HEADER.into()
}

fn default_token_lifetime() -> Duration {
	CoordinatorConfig::DEFAULT_TOKEN_LIFETIME
}

fn validate_path(field: &'static str, path: &str) -> Result<(), ConfigError> {
	if path.starts_with('/') {
		Ok(())
	} else {
		Err(ConfigError::RelativePath { field, path: path.to_owned() })
	}
}

fn validate_auth_path(field: &'static str, path: &str, marker: &str) -> Result<(), ConfigError> {
	validate_path(field, path)?;

	if path.contains(marker) {
		Ok(())
	} else {
		Err(ConfigError::AuthPathOutsideMarker {
			field,
			path: path.to_owned(),
			marker: marker.to_owned(),
		})
	}
}
