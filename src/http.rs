//! Transport primitives for coordinated requests.
//!
//! The module exposes [`HttpTransport`], the coordinator's only dependency on an HTTP stack,
//! together with the request/response aliases it speaks. Requests carry their
//! [`CredentialsMode`] as an [`::http::Extensions`] entry so transports that manage cookies can
//! decide per request whether to attach and record them.

// crates.io
#[cfg(feature = "reqwest")]
use reqwest::{
	cookie::{CookieStore, Jar},
	header::{COOKIE, SET_COOKIE},
};
// self
use crate::{_prelude::*, error::TransportError};

/// Outbound request handed to a transport.
pub type HttpRequest = ::http::Request<Vec<u8>>;
/// Response returned by a transport.
pub type HttpResponse = ::http::Response<Vec<u8>>;
/// Boxed future returned by [`HttpTransport::send`].
pub type TransportFuture<'a> =
	Pin<Box<dyn Future<Output = Result<HttpResponse, TransportError>> + 'a + Send>>;

/// Abstraction over HTTP stacks capable of executing coordinated requests.
///
/// Implementations must be `Send + Sync + 'static` so a single transport can be shared by every
/// clone of a coordinator, and the futures they return must be `Send` so coordinated calls can
/// hop executors. A transport reports only network-level failures as errors; every HTTP status,
/// including `401` and `403`, is a successful [`HttpResponse`].
pub trait HttpTransport
where
	Self: 'static + Send + Sync,
{
	/// Executes `request` and returns the full response.
	fn send(&self, request: HttpRequest) -> TransportFuture<'_>;
}

/// Whether a request carries and records ambient credentials (cookies).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CredentialsMode {
	/// Send stored cookies and record `Set-Cookie` headers.
	#[default]
	Include,
	/// Send no cookies and ignore `Set-Cookie` headers.
	Omit,
}
impl CredentialsMode {
	/// Reads the mode attached to `request`, defaulting to [`CredentialsMode::Include`].
	pub fn of(request: &HttpRequest) -> Self {
		request.extensions().get::<Self>().copied().unwrap_or_default()
	}
}

/// Reqwest-backed transport with its own cookie jar.
///
/// The jar is managed here rather than by the client so [`CredentialsMode::Omit`] can be honored
/// per request. Share the jar through [`ReqwestTransport::with_cookie_jar`] to seed a session
/// cookie obtained elsewhere.
#[cfg(feature = "reqwest")]
#[derive(Clone, Debug, Default)]
pub struct ReqwestTransport {
	client: ReqwestClient,
	jar: Arc<Jar>,
	timeout: Option<std::time::Duration>,
}
#[cfg(feature = "reqwest")]
impl ReqwestTransport {
	/// Wraps an existing reqwest [`ReqwestClient`].
	///
	/// The client should not have its own cookie store enabled; the transport attaches cookies
	/// itself.
	pub fn with_client(client: ReqwestClient) -> Self {
		Self { client, jar: Default::default(), timeout: None }
	}

	/// Replaces the cookie jar.
	pub fn with_cookie_jar(mut self, jar: Arc<Jar>) -> Self {
		self.jar = jar;

		self
	}

	/// Bounds every request (including refresh calls) by `timeout`.
	pub fn with_timeout(mut self, timeout: std::time::Duration) -> Self {
		self.timeout = Some(timeout);

		self
	}

	/// Returns the cookie jar shared by every request with [`CredentialsMode::Include`].
	pub fn cookie_jar(&self) -> &Arc<Jar> {
		&self.jar
	}
}
#[cfg(feature = "reqwest")]
impl AsRef<ReqwestClient> for ReqwestTransport {
	fn as_ref(&self) -> &ReqwestClient {
		&self.client
	}
}
#[cfg(feature = "reqwest")]
impl HttpTransport for ReqwestTransport {
	fn send(&self, request: HttpRequest) -> TransportFuture<'_> {
		Box::pin(async move {
			let mode = CredentialsMode::of(&request);
			let (parts, body) = request.into_parts();
			let target = parts.uri.to_string();
			let url =
				Url::parse(&target).map_err(|e| TransportError::network(target.clone(), e))?;
			let mut builder =
				self.client.request(parts.method, url.clone()).headers(parts.headers);
			let cookies =
				(mode == CredentialsMode::Include).then(|| self.jar.cookies(&url)).flatten();

			if let Some(cookies) = cookies {
				builder = builder.header(COOKIE, cookies);
			}
			if let Some(timeout) = self.timeout {
				builder = builder.timeout(timeout);
			}
			if !body.is_empty() {
				builder = builder.body(body);
			}

			let response = builder.send().await.map_err(|e| map_reqwest_error(&target, e))?;

			if mode == CredentialsMode::Include {
				let mut set_cookies = response.headers().get_all(SET_COOKIE).iter().peekable();

				if set_cookies.peek().is_some() {
					self.jar.set_cookies(&mut set_cookies, &url);
				}
			}

			let status = response.status();
			let headers = response.headers().to_owned();
			let bytes = response.bytes().await.map_err(|e| map_reqwest_error(&target, e))?;
			let mut mapped = HttpResponse::new(bytes.to_vec());

			*mapped.status_mut() = status;
			*mapped.headers_mut() = headers;

			Ok(mapped)
		})
	}
}

#[cfg(feature = "reqwest")]
fn map_reqwest_error(url: &str, err: ReqwestError) -> TransportError {
	if err.is_timeout() {
		TransportError::Timeout { url: url.to_owned() }
	} else {
		TransportError::network(url, err)
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn credentials_mode_defaults_to_include() {
		let mut request = HttpRequest::new(Vec::new());

		assert_eq!(CredentialsMode::of(&request), CredentialsMode::Include);

		request.extensions_mut().insert(CredentialsMode::Omit);

		assert_eq!(CredentialsMode::of(&request), CredentialsMode::Omit);
	}
}
