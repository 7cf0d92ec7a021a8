//! Navigation capability used to send the user to the sign-in surface after a failed refresh.

// self
use crate::_prelude::*;

/// Capability for inspecting and changing the current location.
pub trait Navigator
where
	Self: Send + Sync,
{
	/// Returns the path of the current location (e.g. `/dashboard`).
	fn current_path(&self) -> String;

	/// Performs a full navigation to `path`.
	fn navigate(&self, path: &str);
}

/// In-process navigator that records every redirect and moves its location accordingly.
#[derive(Debug, Default)]
pub struct MemoryNavigator {
	location: RwLock<String>,
	history: Mutex<Vec<String>>,
}
impl MemoryNavigator {
	/// Creates a navigator parked at `path`.
	pub fn at(path: impl Into<String>) -> Self {
		Self { location: RwLock::new(path.into()), history: Mutex::default() }
	}

	/// Moves the location without recording a navigation (e.g. client-side routing).
	pub fn set_location(&self, path: impl Into<String>) {
		*self.location.write() = path.into();
	}

	/// Returns every path passed to [`Navigator::navigate`], oldest first.
	pub fn navigations(&self) -> Vec<String> {
		self.history.lock().clone()
	}
}
impl Navigator for MemoryNavigator {
	fn current_path(&self) -> String {
		self.location.read().clone()
	}

	fn navigate(&self, path: &str) {
		self.history.lock().push(path.to_owned());
		*self.location.write() = path.to_owned();
	}
}

/// Navigates to `sign_in_path` unless the location is already there.
///
/// Returns `true` when a navigation was issued.
pub fn redirect_to_sign_in(navigator: &dyn Navigator, sign_in_path: &str) -> bool {
	if navigator.current_path() == sign_in_path {
		return false;
	}

	navigator.navigate(sign_in_path);

	true
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn redirect_skips_when_already_on_sign_in() {
		let navigator = MemoryNavigator::at("/dashboard");

		assert!(redirect_to_sign_in(&navigator, "/sign-in"));
		assert!(!redirect_to_sign_in(&navigator, "/sign-in"));
		assert_eq!(navigator.navigations(), vec!["/sign-in".to_owned()]);
		assert_eq!(navigator.current_path(), "/sign-in");

		navigator.set_location("/profile");

		assert!(redirect_to_sign_in(&navigator, "/sign-in"));
		assert_eq!(navigator.navigations().len(), 2);
	}
}
