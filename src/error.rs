//! Coordinator-level error types shared across requests, refresh cycles, and stores.

// self
use crate::_prelude::*;

/// Coordinator-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Failure taxonomy shared by errors and classified responses.
///
/// The kind is fixed when a failure is constructed (or a status is classified) and is never
/// inferred from message text afterwards.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
	/// Local configuration or request construction problem.
	Config,
	/// Network-level failure before any HTTP status was received.
	Transport,
	/// Any other non-success status; returned to the caller untouched.
	Business,
	/// `401` on a protected endpoint.
	SessionExpired,
	/// `403` on a protected endpoint.
	TokenInvalid,
	/// The refresh endpoint itself failed; terminal for the current cycle.
	RefreshFailed,
}
impl FailureKind {
	/// Classifies an HTTP status; `auth_endpoint` marks URLs under the auth marker.
	///
	/// Returns `None` for success and redirect statuses. Auth endpoints never produce
	/// [`FailureKind::SessionExpired`] or [`FailureKind::TokenInvalid`], which keeps refresh calls
	/// from recursing into themselves.
	pub fn classify_status(status: u16, auth_endpoint: bool) -> Option<Self> {
		match status {
			0..=399 => None,
			401 if !auth_endpoint => Some(Self::SessionExpired),
			403 if !auth_endpoint => Some(Self::TokenInvalid),
			_ => Some(Self::Business),
		}
	}

	/// Returns `true` for kinds that start (or join) a refresh cycle.
	pub const fn triggers_refresh(self) -> bool {
		matches!(self, Self::SessionExpired | Self::TokenInvalid)
	}

	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			Self::Config => "config",
			Self::Transport => "transport",
			Self::Business => "business",
			Self::SessionExpired => "session_expired",
			Self::TokenInvalid => "token_invalid",
			Self::RefreshFailed => "refresh_failed",
		}
	}
}
impl Display for FailureKind {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Canonical coordinator error exposed by public APIs.
#[derive(Debug, ThisError)]
pub enum Error {
	/// Local configuration problem.
	#[error(transparent)]
	Config(#[from] ConfigError),
	/// Transport failure (DNS, TCP, TLS, timeout).
	#[error("{source}")]
	Transport {
		/// Underlying transport failure.
		#[source]
		source: TransportError,
		/// Whether the failure belongs to the authentication path and must stay out of logs.
		silent: bool,
	},
	/// Credential store failure.
	#[error(transparent)]
	Storage(#[from] crate::store::StoreError),
	/// The session could not be refreshed; the credential store has been cleared.
	#[error("Authentication failed.")]
	AuthenticationFailed(#[source] Arc<RefreshError>),

	/// An auth endpoint answered with a status the coordinator cannot use.
	#[error("The {endpoint} endpoint returned HTTP {status}.")]
	UnexpectedStatus {
		/// Endpoint label.
		endpoint: &'static str,
		/// HTTP status code.
		status: u16,
	},
	/// CSRF endpoint response carried no `csrfToken` field.
	#[error("CSRF endpoint response is missing csrfToken.")]
	MissingCsrfToken,
	/// Auth endpoint responded with JSON that could not be parsed.
	#[error("The {endpoint} endpoint returned malformed JSON.")]
	MalformedResponse {
		/// Endpoint label.
		endpoint: &'static str,
		/// Structured parsing failure.
		#[source]
		source: serde_path_to_error::Error<serde_json::Error>,
	},
}
impl Error {
	/// Wraps a transport failure that must be logged before it reaches the caller.
	pub fn transport(source: TransportError) -> Self {
		Self::Transport { source, silent: false }
	}

	/// Wraps a transport failure from the authentication path; it is never logged.
	pub fn silent_transport(source: TransportError) -> Self {
		Self::Transport { source, silent: true }
	}

	/// Returns the failure kind assigned at construction.
	pub fn kind(&self) -> FailureKind {
		match self {
			Self::Config(_) => FailureKind::Config,
			Self::Transport { .. } => FailureKind::Transport,
			Self::AuthenticationFailed(_) => FailureKind::RefreshFailed,
			Self::Storage(_)
			| Self::UnexpectedStatus { .. }
			| Self::MissingCsrfToken
			| Self::MalformedResponse { .. } => FailureKind::Business,
		}
	}

	/// Returns `true` if the failure must be propagated without diagnostic output.
	pub fn is_silent(&self) -> bool {
		match self {
			Self::Transport { silent, .. } => *silent,
			Self::AuthenticationFailed(_) => true,
			_ => false,
		}
	}

	/// Returns the refresh failure behind [`Error::AuthenticationFailed`], if any.
	pub fn refresh_error(&self) -> Option<&RefreshError> {
		match self {
			Self::AuthenticationFailed(err) => Some(err.as_ref()),
			_ => None,
		}
	}
}

/// Configuration and request construction failures raised by the coordinator.
#[derive(Debug, ThisError)]
pub enum ConfigError {
	/// HTTP client could not be constructed.
	#[error("HTTP client could not be constructed.")]
	HttpClientBuild {
		/// Underlying transport builder failure.
		#[source]
		source: BoxError,
	},
	/// HTTP request construction failed.
	#[error(transparent)]
	HttpRequest(#[from] ::http::Error),
	/// Request URL is empty.
	#[error("Request URL must not be empty.")]
	EmptyUrl,
	/// Request URL cannot be parsed or joined onto the base URL.
	#[error("Request URL `{url}` is invalid.")]
	InvalidUrl {
		/// Offending URL text.
		url: String,
		/// Underlying parsing failure.
		#[source]
		source: url::ParseError,
	},
	/// JSON request body could not be serialized.
	#[error("Request body could not be serialized to JSON.")]
	JsonBody(#[from] serde_json::Error),

	/// Base URL cannot carry paths (e.g. `data:` URLs).
	#[error("Base URL `{url}` cannot be used as a base.")]
	InvalidBaseUrl {
		/// Offending URL text.
		url: String,
	},
	/// A configured path is not absolute.
	#[error("The {field} path must start with `/`: {path}.")]
	RelativePath {
		/// Config field name.
		field: &'static str,
		/// Offending path.
		path: String,
	},
	/// An auth path does not contain the auth marker and would be treated as protected.
	#[error("The {field} path `{path}` does not contain the auth marker `{marker}`.")]
	AuthPathOutsideMarker {
		/// Config field name.
		field: &'static str,
		/// Offending path.
		path: String,
		/// Configured auth marker.
		marker: String,
	},
	/// The auth marker is empty.
	#[error("Auth endpoint marker must not be empty.")]
	EmptyAuthMarker,
	/// The CSRF header name is not a valid HTTP header name.
	#[error("CSRF header name `{name}` is invalid.")]
	InvalidHeaderName {
		/// Offending header name.
		name: String,
	},
	/// Token lifetime must be positive.
	#[error("CSRF token lifetime must be positive.")]
	NonPositiveTokenLifetime,
}
impl ConfigError {
	/// Wraps a transport's builder failure inside [`ConfigError`].
	pub fn http_client_build(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::HttpClientBuild { source: Box::new(src) }
	}
}
#[cfg(feature = "reqwest")]
impl From<ReqwestError> for ConfigError {
	fn from(e: ReqwestError) -> Self {
		Self::http_client_build(e)
	}
}

/// Transport-level failures (network, IO).
#[derive(Debug, ThisError)]
pub enum TransportError {
	/// Underlying HTTP client reported a network failure.
	#[error("Network error occurred while calling {url}.")]
	Network {
		/// Target URL.
		url: String,
		/// Transport-specific network error.
		#[source]
		source: BoxError,
	},
	/// The transport gave up waiting for a response.
	#[error("Request to {url} timed out.")]
	Timeout {
		/// Target URL.
		url: String,
	},
	/// Underlying IO failure surfaced during transport.
	#[error("I/O error occurred during transport.")]
	Io(#[from] std::io::Error),
}
impl TransportError {
	/// Wraps a transport-specific network error.
	pub fn network(
		url: impl Into<String>,
		src: impl 'static + Send + Sync + std::error::Error,
	) -> Self {
		Self::Network { url: url.into(), source: Box::new(src) }
	}
}

/// Reasons a refresh cycle failed; shared by every caller waiting on that cycle.
#[derive(Debug, ThisError)]
pub enum RefreshError {
	/// Refresh endpoint answered with a non-success status.
	#[error("Refresh endpoint rejected the session with HTTP {status}.")]
	Rejected {
		/// HTTP status code.
		status: u16,
	},
	/// Refresh request could not be constructed from the configuration.
	#[error("Refresh request could not be built.")]
	Request(#[source] ConfigError),
	/// Refresh call never produced a response.
	#[error("Refresh call failed in transport.")]
	Transport(#[source] TransportError),
	/// Refresh response body was not the expected JSON shape.
	#[error("Refresh endpoint returned malformed JSON.")]
	MalformedResponse(#[source] serde_path_to_error::Error<serde_json::Error>),
	/// The renewed token could not be written to the credential store.
	#[error("Renewed CSRF token could not be stored.")]
	Storage(#[source] crate::store::StoreError),
	/// The future driving the refresh was dropped before it settled.
	#[error("Refresh cycle was abandoned before it settled.")]
	Abandoned,
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn status_classification_respects_auth_endpoints() {
		assert_eq!(FailureKind::classify_status(200, false), None);
		assert_eq!(FailureKind::classify_status(304, false), None);
		assert_eq!(FailureKind::classify_status(401, false), Some(FailureKind::SessionExpired));
		assert_eq!(FailureKind::classify_status(403, false), Some(FailureKind::TokenInvalid));
		assert_eq!(FailureKind::classify_status(401, true), Some(FailureKind::Business));
		assert_eq!(FailureKind::classify_status(403, true), Some(FailureKind::Business));
		assert_eq!(FailureKind::classify_status(500, false), Some(FailureKind::Business));
		assert!(!FailureKind::Business.triggers_refresh());
		assert!(FailureKind::TokenInvalid.triggers_refresh());
	}

	#[test]
	fn silence_is_a_construction_flag() {
		let loud = Error::transport(TransportError::Timeout { url: "https://x.test/token".into() });
		let quiet =
			Error::silent_transport(TransportError::Timeout { url: "https://x.test/api".into() });

		// Message text mentioning "token" does not make an error silent.
		assert!(!loud.is_silent());
		assert!(quiet.is_silent());
		assert_eq!(loud.kind(), FailureKind::Transport);

		let failed = Error::AuthenticationFailed(Arc::new(RefreshError::Rejected { status: 401 }));

		assert!(failed.is_silent());
		assert_eq!(failed.kind(), FailureKind::RefreshFailed);
		assert_eq!(failed.to_string(), "Authentication failed.");
		assert!(matches!(failed.refresh_error(), Some(RefreshError::Rejected { status: 401 })));
	}

	#[test]
	fn authentication_failure_exposes_refresh_source() {
		let err = Error::AuthenticationFailed(Arc::new(RefreshError::Abandoned));
		let source = StdError::source(&err).expect("Refresh error should be exposed as source.");

		assert_eq!(source.to_string(), RefreshError::Abandoned.to_string());
	}
}
