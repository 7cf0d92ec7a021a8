//! Session-aware HTTP request coordinator for web API clients.
//!
//! The [`Coordinator`](coordinator::Coordinator) wraps an [`HttpTransport`](http::HttpTransport),
//! reads the CSRF token from an injected [`CredentialStore`](store::CredentialStore), and turns
//! `401`/`403` responses into exactly one refresh call no matter how many requests observe the
//! failure at once. Callers that arrive mid-refresh are queued and replayed once the cycle
//! settles; a failed refresh clears the token and sends the user to the sign-in surface through
//! the injected [`Navigator`](nav::Navigator).

#![deny(clippy::all, missing_docs, unused_crate_dependencies)]

pub mod auth;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod http;
pub mod nav;
pub mod obs;
pub mod store;
#[cfg(all(any(test, feature = "test"), feature = "reqwest"))]
pub mod _preludet {
	//! Convenience re-exports and helpers for integration tests; enabled via `cfg(test)` or the
	//! `test` crate feature.

	pub use crate::_prelude::*;

	// self
	use crate::{
		config::CoordinatorConfig,
		coordinator::Coordinator,
		http::ReqwestTransport,
		nav::{MemoryNavigator, Navigator},
		store::{CredentialStore, MemoryStore},
	};

	/// Coordinator type alias used by reqwest-backed integration tests.
	pub type ReqwestTestCoordinator = Coordinator<ReqwestTransport>;

	/// Everything a reqwest-backed test needs to drive and inspect a coordinator.
	pub struct ReqwestFixture {
		/// Coordinator under test.
		pub coordinator: ReqwestTestCoordinator,
		/// Backing credential store shared with the coordinator.
		pub store: Arc<MemoryStore>,
		/// Navigator that records redirects instead of performing them.
		pub navigator: Arc<MemoryNavigator>,
	}

	/// Builds a coordinator against `base_url` with an empty in-memory store and a navigator
	/// parked on `/dashboard`.
	pub fn build_reqwest_test_coordinator(base_url: &str) -> ReqwestFixture {
		let base = Url::parse(base_url).expect("Test base URL should parse.");
		let config =
			CoordinatorConfig::builder(base).build().expect("Default test config should build.");
		let store = Arc::new(MemoryStore::default());
		let navigator = Arc::new(MemoryNavigator::at("/dashboard"));
		let credential_store: Arc<dyn CredentialStore> = store.clone();
		let nav: Arc<dyn Navigator> = navigator.clone();
		let coordinator =
			Coordinator::new(config, ReqwestTransport::default(), credential_store, nav);

		ReqwestFixture { coordinator, store, navigator }
	}
}

mod _prelude {
	pub use std::{
		collections::VecDeque,
		error::Error as StdError,
		fmt::{Debug, Display, Formatter, Result as FmtResult},
		future::Future,
		pin::Pin,
		sync::Arc,
	};

	pub use parking_lot::{Mutex, RwLock};
	#[cfg(feature = "reqwest")]
	pub use reqwest::{Client as ReqwestClient, Error as ReqwestError};
	pub use serde::{Deserialize, Serialize};
	pub use thiserror::Error as ThisError;
	pub use time::{Duration, OffsetDateTime};
	pub use url::Url;

	pub use crate::error::{Error, Result};
}

pub use ::http as http_types;
#[cfg(feature = "reqwest")] pub use reqwest;
pub use url;
#[cfg(test)] use {color_eyre as _, httpmock as _};
