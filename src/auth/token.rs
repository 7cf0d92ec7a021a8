//! Read-only view of the CSRF token held by a credential store.

// self
use crate::{_prelude::*, auth::CsrfToken};

/// Current lifecycle status for the stored CSRF token.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum TokenStatus {
	/// No token (or no expiry) is held; requests go out without the header.
	Absent,
	/// Token is usable.
	Active,
	/// Token exceeded its expiry instant and should be cleared.
	Expired,
}

/// Snapshot of the token fields the coordinator reads from a store.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenSnapshot {
	/// Current CSRF token, if any.
	#[serde(rename = "csrfToken")]
	pub token: Option<CsrfToken>,
	/// Instant after which the token must not be sent.
	#[serde(rename = "csrfTokenExpiry", with = "time::serde::rfc3339::option")]
	pub expires_at: Option<OffsetDateTime>,
}
impl TokenSnapshot {
	/// Creates a snapshot holding `token` until `expires_at`.
	pub fn new(token: CsrfToken, expires_at: OffsetDateTime) -> Self {
		Self { token: Some(token), expires_at: Some(expires_at) }
	}

	/// Computes the token status at a given instant.
	pub fn status_at(&self, instant: OffsetDateTime) -> TokenStatus {
		match (&self.token, self.expires_at) {
			(Some(_), Some(expires_at)) if instant < expires_at => TokenStatus::Active,
			(Some(_), Some(_)) => TokenStatus::Expired,
			_ => TokenStatus::Absent,
		}
	}

	/// Returns `true` if the token can be sent at `instant`.
	pub fn is_valid_at(&self, instant: OffsetDateTime) -> bool {
		matches!(self.status_at(instant), TokenStatus::Active)
	}

	/// Returns the token if it is still valid at `instant`.
	pub fn valid_token_at(&self, instant: OffsetDateTime) -> Option<&CsrfToken> {
		if self.is_valid_at(instant) { self.token.as_ref() } else { None }
	}

	/// Whole minutes of validity left at `instant`, rounded up; zero once expired.
	pub fn minutes_remaining_at(&self, instant: OffsetDateTime) -> i64 {
		let Some(expires_at) = self.expires_at else {
			return 0;
		};
		let remaining = expires_at - instant;

		if !remaining.is_positive() {
			return 0;
		}

		let whole = remaining.whole_minutes();

		if remaining > Duration::minutes(whole) { whole + 1 } else { whole }
	}
}

#[cfg(test)]
mod tests {
	// crates.io
	use time::macros;
	// self
	use super::*;

	#[test]
	fn status_transitions_cover_all_states() {
		let expires = macros::datetime!(2025-01-01 00:15 UTC);
		let snapshot = TokenSnapshot::new(CsrfToken::new("t1"), expires);

		assert_eq!(snapshot.status_at(macros::datetime!(2025-01-01 00:00 UTC)), TokenStatus::Active);
		assert_eq!(snapshot.status_at(expires), TokenStatus::Expired);
		assert_eq!(TokenSnapshot::default().status_at(expires), TokenStatus::Absent);

		let without_expiry = TokenSnapshot { token: Some(CsrfToken::new("t1")), expires_at: None };

		assert_eq!(without_expiry.status_at(expires), TokenStatus::Absent);
		assert!(without_expiry.valid_token_at(expires).is_none());
	}

	#[test]
	fn minutes_remaining_rounds_up() {
		let expires = macros::datetime!(2025-01-01 00:15 UTC);
		let snapshot = TokenSnapshot::new(CsrfToken::new("t1"), expires);

		assert_eq!(snapshot.minutes_remaining_at(macros::datetime!(2025-01-01 00:00 UTC)), 15);
		assert_eq!(snapshot.minutes_remaining_at(macros::datetime!(2025-01-01 00:10:30 UTC)), 5);
		assert_eq!(snapshot.minutes_remaining_at(macros::datetime!(2025-01-01 00:20 UTC)), 0);
		assert_eq!(TokenSnapshot::default().minutes_remaining_at(expires), 0);
	}

	#[test]
	fn snapshot_uses_store_field_names() {
		let snapshot = TokenSnapshot::new(
			CsrfToken::new("t1"),
			macros::datetime!(2025-01-01 00:15 UTC),
		);
		let json = serde_json::to_value(&snapshot).expect("Snapshot should serialize.");

		assert_eq!(json["csrfToken"], "t1");
		assert_eq!(json["csrfTokenExpiry"], "2025-01-01T00:15:00Z");
	}
}
