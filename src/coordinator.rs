//! The request coordinator: CSRF injection, single-flight refresh, and queued replay.
//!
//! A [`Coordinator`] owns one transport plus the injected credential store and navigator. Every
//! clone shares the same refresh state, so a burst of `401`/`403` responses across clones still
//! produces a single refresh call. Callers that hit an authentication failure while that call is
//! in flight wait for it to settle and then replay their own request once.

pub mod refresh;
pub mod request;

pub use refresh::RefreshMetrics;
pub use request::*;

// crates.io
use ::http::Method;
// self
use crate::{
	_prelude::*,
	auth::{CsrfToken, TokenStatus},
	config::CoordinatorConfig,
	coordinator::refresh::RefreshState,
	error::FailureKind,
	http::{HttpResponse, HttpTransport},
	nav::Navigator,
	obs::{self, CallKind, CallOutcome, CallSpan},
	store::{CredentialStore, StoreAction, StoreError},
};
#[cfg(feature = "reqwest")] use crate::http::ReqwestTransport;

/// Coordinator specialized for the crate's default reqwest transport.
#[cfg(feature = "reqwest")]
pub type ReqwestCoordinator = Coordinator<ReqwestTransport>;

/// Wraps an [`HttpTransport`] with CSRF injection and session refresh.
pub struct Coordinator<T>
where
	T: ?Sized + HttpTransport,
{
	/// Transport used for business, refresh, and CSRF bootstrap calls.
	pub transport: Arc<T>,
	/// Store that owns the CSRF token.
	pub store: Arc<dyn CredentialStore>,
	/// Navigator used to reach the sign-in surface after a failed refresh.
	pub navigator: Arc<dyn Navigator>,
	/// Validated configuration.
	pub config: CoordinatorConfig,
	/// Shared counters for refresh cycles.
	pub refresh_metrics: Arc<RefreshMetrics>,
	refresh_state: Arc<Mutex<RefreshState>>,
}
impl<T> Coordinator<T>
where
	T: ?Sized + HttpTransport,
{
	/// Creates a coordinator around `transport`.
	pub fn new(
		config: CoordinatorConfig,
		transport: impl Into<Arc<T>>,
		store: Arc<dyn CredentialStore>,
		navigator: Arc<dyn Navigator>,
	) -> Self {
		Self {
			transport: transport.into(),
			store,
			navigator,
			config,
			refresh_metrics: Default::default(),
			refresh_state: Default::default(),
		}
	}

	/// Issues a coordinated request.
	///
	/// `url` may be absolute or relative to the configured base URL. Non-auth requests carry the
	/// stored CSRF token unless the caller set that header. A `401` or `403` from a non-auth
	/// endpoint joins (or starts) the single refresh cycle and the request is replayed once; any
	/// other status, including the replay's own `401`/`403`, is returned as-is.
	pub async fn request(&self, url: &str, options: RequestOptions) -> Result<HttpResponse> {
		const KIND: CallKind = CallKind::Request;

		let span = CallSpan::new(KIND, "request");

		obs::record_call_outcome(KIND, CallOutcome::Attempt);

		let result = span
			.instrument(async move {
				let url = self.config.resolve(url)?;

				self.coordinate(CoordinatedRequest::new(url, options)).await
			})
			.await;

		finish(KIND, result)
	}

	/// Issues a `GET`.
	pub async fn get(&self, url: &str) -> Result<HttpResponse> {
		self.request(url, RequestOptions::default()).await
	}

	/// Issues a `POST` with an optional JSON body.
	pub async fn post<B>(&self, url: &str, payload: Option<&B>) -> Result<HttpResponse>
	where
		B: ?Sized + Serialize + Sync,
	{
		self.send_json(Method::POST, url, payload).await
	}

	/// Issues a `PUT` with an optional JSON body.
	pub async fn put<B>(&self, url: &str, payload: Option<&B>) -> Result<HttpResponse>
	where
		B: ?Sized + Serialize + Sync,
	{
		self.send_json(Method::PUT, url, payload).await
	}

	/// Issues a `PATCH` with an optional JSON body.
	pub async fn patch<B>(&self, url: &str, payload: Option<&B>) -> Result<HttpResponse>
	where
		B: ?Sized + Serialize + Sync,
	{
		self.send_json(Method::PATCH, url, payload).await
	}

	/// Issues a `DELETE`.
	pub async fn delete(&self, url: &str) -> Result<HttpResponse> {
		self.request(url, RequestOptions::default().method(Method::DELETE)).await
	}

	/// Fetches a CSRF token from the bootstrap endpoint and stores it with the configured
	/// lifetime.
	pub async fn fetch_csrf_token(&self) -> Result<CsrfToken> {
		const KIND: CallKind = CallKind::CsrfFetch;
		const ENDPOINT: &str = "csrf_token";

		let span = CallSpan::new(KIND, "fetch_csrf_token");

		obs::record_call_outcome(KIND, CallOutcome::Attempt);

		let result = span
			.instrument(async move {
				let url = self.config.csrf_token_url()?;
				let response =
					self.dispatch(&CoordinatedRequest::new(url, RequestOptions::default())).await?;
				let status = response.status();

				if !status.is_success() {
					return Err(Error::UnexpectedStatus {
						endpoint: ENDPOINT,
						status: status.as_u16(),
					});
				}

				let token = parse_token_body(response.body())
					.map_err(|source| Error::MalformedResponse { endpoint: ENDPOINT, source })?
					.into_token()
					.ok_or(Error::MissingCsrfToken)?;

				self.store_token(token.clone())?;

				Ok(token)
			})
			.await;

		finish(KIND, result)
	}

	/// Clears the stored token if it has expired.
	///
	/// Returns `true` when a token was cleared.
	pub fn check_token_expiry(&self) -> Result<bool> {
		let snapshot = self.store.state();

		match snapshot.status_at(OffsetDateTime::now_utc()) {
			TokenStatus::Expired => {
				self.store.dispatch(StoreAction::ClearCsrfToken)?;

				Ok(true)
			},
			TokenStatus::Active | TokenStatus::Absent => Ok(false),
		}
	}

	/// Whole minutes of validity left on the stored token; zero when there is none.
	pub fn token_minutes_remaining(&self) -> i64 {
		let snapshot = self.store.state();
		let now = OffsetDateTime::now_utc();

		match snapshot.status_at(now) {
			TokenStatus::Active => snapshot.minutes_remaining_at(now),
			TokenStatus::Expired | TokenStatus::Absent => 0,
		}
	}

	/// Returns the refresh counters shared by every clone.
	pub fn refresh_metrics(&self) -> &RefreshMetrics {
		&self.refresh_metrics
	}

	/// Returns `true` while a refresh call is in flight.
	pub fn is_refreshing(&self) -> bool {
		self.refresh_state.lock().in_flight
	}

	/// Number of callers waiting on the in-flight refresh.
	pub fn pending_requests(&self) -> usize {
		self.refresh_state.lock().pending.len()
	}

	async fn send_json<B>(
		&self,
		method: Method,
		url: &str,
		payload: Option<&B>,
	) -> Result<HttpResponse>
	where
		B: ?Sized + Serialize + Sync,
	{
		let mut options = RequestOptions::default().method(method);

		if let Some(payload) = payload {
			options = options.json(payload)?;
		}

		self.request(url, options).await
	}

	async fn coordinate(&self, request: CoordinatedRequest) -> Result<HttpResponse> {
		let observed_cycle = self.refresh_state.lock().cycle;
		let response = self.dispatch(&request).await?;
		let auth_endpoint = self.config.is_auth_endpoint(&request.url);

		match FailureKind::classify_status(response.status().as_u16(), auth_endpoint) {
			Some(kind) if kind.triggers_refresh() => self.recover(request, observed_cycle).await,
			_ => Ok(response),
		}
	}

	/// Sends `request` once, injecting the current token on non-auth endpoints.
	async fn dispatch(&self, request: &CoordinatedRequest) -> Result<HttpResponse> {
		let auth_endpoint = self.config.is_auth_endpoint(&request.url);
		let header = &self.config.csrf_header;
		let token = if auth_endpoint { None } else { self.current_token()? };
		let http_request = request.to_http(token.as_ref().map(|token| (header, token)))?;

		self.transport.send(http_request).await.map_err(|e| {
			if auth_endpoint { Error::silent_transport(e) } else { Error::transport(e) }
		})
	}

	/// Reads the token to inject; an expired token is cleared and treated as absent.
	fn current_token(&self) -> Result<Option<CsrfToken>> {
		let snapshot = self.store.state();

		match snapshot.status_at(OffsetDateTime::now_utc()) {
			TokenStatus::Active => Ok(snapshot.token),
			TokenStatus::Expired => {
				self.store.dispatch(StoreAction::ClearCsrfToken)?;

				Ok(None)
			},
			TokenStatus::Absent => Ok(None),
		}
	}

	fn store_token(&self, token: CsrfToken) -> Result<(), StoreError> {
		let expires_at = OffsetDateTime::now_utc() + self.config.token_lifetime;

		self.store.dispatch(StoreAction::SetCsrfToken { token, expires_at })
	}
}
#[cfg(feature = "reqwest")]
impl Coordinator<ReqwestTransport> {
	/// Creates a coordinator that provisions its own reqwest transport and cookie jar.
	pub fn with_reqwest(
		config: CoordinatorConfig,
		store: Arc<dyn CredentialStore>,
		navigator: Arc<dyn Navigator>,
	) -> Self {
		Self::new(config, ReqwestTransport::default(), store, navigator)
	}
}
impl<T> Clone for Coordinator<T>
where
	T: ?Sized + HttpTransport,
{
	fn clone(&self) -> Self {
		Self {
			transport: self.transport.clone(),
			store: self.store.clone(),
			navigator: self.navigator.clone(),
			config: self.config.clone(),
			refresh_metrics: self.refresh_metrics.clone(),
			refresh_state: self.refresh_state.clone(),
		}
	}
}
impl<T> Debug for Coordinator<T>
where
	T: ?Sized + HttpTransport,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("Coordinator")
			.field("config", &self.config)
			.field("refreshing", &self.is_refreshing())
			.field("pending_requests", &self.pending_requests())
			.finish()
	}
}

/// JSON body shape shared by the refresh and CSRF bootstrap endpoints.
#[derive(Debug, Default, Deserialize)]
struct TokenBody {
	#[serde(rename = "csrfToken", default)]
	csrf_token: Option<CsrfToken>,
}
impl TokenBody {
	fn into_token(self) -> Option<CsrfToken> {
		self.csrf_token.filter(|token| !token.is_empty())
	}
}

/// Parses an auth endpoint body; an empty body carries no token.
fn parse_token_body(body: &[u8]) -> Result<TokenBody, serde_path_to_error::Error<serde_json::Error>> {
	if body.iter().all(u8::is_ascii_whitespace) {
		return Ok(TokenBody::default());
	}

	let mut deserializer = serde_json::Deserializer::from_slice(body);

	serde_path_to_error::deserialize(&mut deserializer)
}

fn finish<R>(kind: CallKind, result: Result<R>) -> Result<R> {
	match &result {
		Ok(_) => obs::record_call_outcome(kind, CallOutcome::Success),
		Err(err) => {
			obs::log_failure(kind, err);
			obs::record_call_outcome(kind, CallOutcome::Failure);
		},
	}

	result
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn token_body_accepts_missing_empty_and_present_tokens() {
		let present = parse_token_body(br#"{"csrfToken":"t2","user":{"id":7}}"#)
			.expect("Body with a token should parse.");

		assert_eq!(present.into_token().map(|token| token.expose().to_owned()), Some("t2".into()));

		let empty = parse_token_body(b"  \n").expect("Blank body should parse.");

		assert!(empty.into_token().is_none());

		let blank_token =
			parse_token_body(br#"{"csrfToken":""}"#).expect("Blank token should parse.");

		assert!(blank_token.into_token().is_none());
	}

	#[cfg(feature = "reqwest")]
	#[tokio::test]
	async fn reqwest_fixture_sends_through_the_transport() {
		let server = httpmock::MockServer::start_async().await;
		let mock = server
			.mock_async(|when, then| {
				when.method(httpmock::Method::GET).path("/api/ping");
				then.status(204);
			})
			.await;
		let fixture = crate::_preludet::build_reqwest_test_coordinator(&server.base_url());
		let response = fixture.coordinator.get("/api/ping").await.expect("Ping should succeed.");

		mock.assert_async().await;

		assert_eq!(response.status(), 204);
		assert_eq!(fixture.store.state(), crate::auth::TokenSnapshot::default());
		assert!(fixture.navigator.navigations().is_empty());
		assert!(!fixture.coordinator.is_refreshing());
	}

	#[test]
	fn token_body_reports_the_failing_path() {
		let err = parse_token_body(br#"{"csrfToken":42}"#)
			.expect_err("Numeric token should be rejected.");

		assert_eq!(err.path().to_string(), "csrfToken");
	}
}
