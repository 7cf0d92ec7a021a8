//! Thread-safe in-memory [`CredentialStore`] implementation for embedding and tests.

// self
use crate::{
	_prelude::*,
	auth::TokenSnapshot,
	store::{CredentialStore, StoreAction, StoreError},
};

/// Thread-safe store that keeps the token snapshot in-process.
#[derive(Clone, Debug, Default)]
pub struct MemoryStore(Arc<RwLock<TokenSnapshot>>);
impl MemoryStore {
	/// Creates a store seeded with `snapshot`.
	pub fn seeded(snapshot: TokenSnapshot) -> Self {
		Self(Arc::new(RwLock::new(snapshot)))
	}
}
impl CredentialStore for MemoryStore {
	fn state(&self) -> TokenSnapshot {
		self.0.read().clone()
	}

	fn dispatch(&self, action: StoreAction) -> Result<(), StoreError> {
		action.apply(&mut self.0.write());

		Ok(())
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;
	use crate::auth::CsrfToken;

	#[test]
	fn dispatch_is_visible_to_clones() {
		let store = MemoryStore::default();
		let shared = store.clone();
		let expires_at = OffsetDateTime::now_utc() + Duration::minutes(15);

		store
			.dispatch(StoreAction::SetCsrfToken { token: CsrfToken::new("t1"), expires_at })
			.expect("Memory store dispatch should not fail.");

		assert_eq!(shared.state().token.as_ref().map(CsrfToken::expose), Some("t1"));
	}
}
