//! Credential store contract and built-in store implementations for the CSRF token.
//!
//! The coordinator never owns the token lifecycle. It reads a [`TokenSnapshot`] through
//! [`CredentialStore::state`] before each request and writes through
//! [`CredentialStore::dispatch`] after a refresh, mirroring the `getState`/`dispatch` shape of
//! the application state container that usually sits behind it.

pub mod file;
pub mod memory;

pub use file::FileStore;
pub use memory::MemoryStore;

// self
use crate::{
	_prelude::*,
	auth::{CsrfToken, TokenSnapshot},
};

/// Capability the coordinator uses to read and mutate the shared CSRF token.
pub trait CredentialStore
where
	Self: Send + Sync,
{
	/// Returns the current token fields.
	fn state(&self) -> TokenSnapshot;

	/// Applies a token mutation.
	fn dispatch(&self, action: StoreAction) -> Result<(), StoreError>;
}

/// Token mutations dispatched by the coordinator.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload")]
pub enum StoreAction {
	/// Stores a fresh token together with its expiry.
	#[serde(rename = "user/setCsrfToken")]
	SetCsrfToken {
		/// Token value.
		token: CsrfToken,
		/// Instant after which the token must not be sent.
		#[serde(rename = "expiresAt", with = "time::serde::rfc3339")]
		expires_at: OffsetDateTime,
	},
	/// Drops the token and its expiry.
	#[serde(rename = "user/clearCsrfToken")]
	ClearCsrfToken,
}
impl StoreAction {
	/// Returns the action type label.
	pub const fn as_str(&self) -> &'static str {
		match self {
			Self::SetCsrfToken { .. } => "user/setCsrfToken",
			Self::ClearCsrfToken => "user/clearCsrfToken",
		}
	}

	/// Reduces the action into `snapshot`.
	pub fn apply(self, snapshot: &mut TokenSnapshot) {
		match self {
			Self::SetCsrfToken { token, expires_at } => {
				snapshot.token = Some(token);
				snapshot.expires_at = Some(expires_at);
			},
			Self::ClearCsrfToken => {
				snapshot.token = None;
				snapshot.expires_at = None;
			},
		}
	}
}

/// Error type produced by [`CredentialStore`] implementations.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ThisError)]
pub enum StoreError {
	/// Serialization failures surfaced by the backend.
	#[error("Serialization error: {message}.")]
	Serialization {
		/// Human-readable error payload.
		message: String,
	},
	/// Backend-level failure for the storage engine.
	#[error("Backend failure: {message}.")]
	Backend {
		/// Human-readable error payload.
		message: String,
	},
}

#[cfg(test)]
mod tests {
	// crates.io
	use time::macros;
	// self
	use super::*;
	use crate::error::Error;

	#[test]
	fn store_error_converts_into_coordinator_error_with_source() {
		let store_error = StoreError::Backend { message: "disk full".into() };
		let error: Error = store_error.clone().into();

		assert!(matches!(error, Error::Storage(_)));
		assert!(error.to_string().contains("disk full"));
	}

	#[test]
	fn actions_reduce_into_snapshot() {
		let mut snapshot = TokenSnapshot::default();
		let expires_at = macros::datetime!(2025-01-01 00:15 UTC);

		StoreAction::SetCsrfToken { token: CsrfToken::new("t1"), expires_at }.apply(&mut snapshot);

		assert_eq!(snapshot.token.as_ref().map(CsrfToken::expose), Some("t1"));
		assert_eq!(snapshot.expires_at, Some(expires_at));

		StoreAction::ClearCsrfToken.apply(&mut snapshot);

		assert_eq!(snapshot, TokenSnapshot::default());
	}

	#[test]
	fn actions_serialize_with_type_labels() {
		let set = StoreAction::SetCsrfToken {
			token: CsrfToken::new("t1"),
			expires_at: macros::datetime!(2025-01-01 00:15 UTC),
		};
		let json = serde_json::to_value(&set).expect("Set action should serialize.");

		assert_eq!(json["type"], set.as_str());
		assert_eq!(json["payload"]["token"], "t1");

		let clear = serde_json::to_value(StoreAction::ClearCsrfToken)
			.expect("Clear action should serialize.");

		assert_eq!(clear["type"], "user/clearCsrfToken");
	}
}
