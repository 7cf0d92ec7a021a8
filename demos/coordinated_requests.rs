//! Demonstrates a coordinator recovering from an expired session against a mock backend.
//!
//! Three requests share a stale CSRF token. The first `401` starts the only refresh call, the
//! other two wait for it, and all three replay with the renewed token.

// std
use std::sync::Arc;
// crates.io
use color_eyre::Result;
use httpmock::prelude::*;
use time::{Duration, OffsetDateTime};
use url::Url;
// self
use session_coordinator::{
	auth::{CsrfToken, TokenSnapshot},
	config::CoordinatorConfig,
	coordinator::ReqwestCoordinator,
	nav::{MemoryNavigator, Navigator},
	store::{CredentialStore, MemoryStore},
};

#[tokio::main]
async fn main() -> Result<()> {
	color_eyre::install()?;

	let server = MockServer::start_async().await;
	let stale = server
		.mock_async(|when, then| {
			when.method(GET).path("/api/posts").header("x-csrf-token", "stale");
			then.status(401).body("{}");
		})
		.await;
	let refresh = server
		.mock_async(|when, then| {
			when.method(POST).path("/api/auth/refresh");
			then.status(200)
				.header("content-type", "application/json")
				.body(r#"{"csrfToken":"renewed"}"#);
		})
		.await;
	let renewed = server
		.mock_async(|when, then| {
			when.method(GET).path("/api/posts").header("x-csrf-token", "renewed");
			then.status(200).header("content-type", "application/json").body(r#"{"ok":true}"#);
		})
		.await;
	let config = CoordinatorConfig::builder(Url::parse(&server.base_url())?).build()?;
	let store: Arc<dyn CredentialStore> = Arc::new(MemoryStore::seeded(TokenSnapshot::new(
		CsrfToken::new("stale"),
		OffsetDateTime::now_utc() + Duration::minutes(10),
	)));
	let navigator: Arc<dyn Navigator> = Arc::new(MemoryNavigator::at("/dashboard"));
	let coordinator = ReqwestCoordinator::with_reqwest(config, store, navigator);
	let (first, second, third) = tokio::join!(
		coordinator.get("/api/posts"),
		coordinator.get("/api/posts"),
		coordinator.get("/api/posts"),
	);

	for response in [first?, second?, third?] {
		println!("Replayed request returned HTTP {}.", response.status());
	}

	stale.assert_calls_async(3).await;
	refresh.assert_calls_async(1).await;
	renewed.assert_calls_async(3).await;

	let metrics = coordinator.refresh_metrics();

	println!(
		"Refresh attempts: {}, queued callers: {}, minutes left on token: {}.",
		metrics.attempts(),
		metrics.queued(),
		coordinator.token_minutes_remaining()
	);

	Ok(())
}
