//! Caller-facing request options and the replayable request record built from them.

// crates.io
use ::http::{HeaderMap, HeaderName, HeaderValue, Method, header::CONTENT_TYPE};
// self
use crate::{
	_prelude::*,
	auth::CsrfToken,
	error::ConfigError,
	http::{CredentialsMode, HttpRequest},
};

/// Content type forced onto every request that does not set one.
pub const JSON_CONTENT_TYPE: &str = "application/json";

/// Optional knobs for a coordinated request; defaults to `GET` with credentials included.
#[derive(Clone, Debug, Default)]
pub struct RequestOptions {
	/// HTTP method.
	pub method: Method,
	/// Caller headers; these win over anything the coordinator injects.
	pub headers: HeaderMap,
	/// Raw request body.
	pub body: Option<Vec<u8>>,
	/// Cookie handling for the request.
	pub credentials: CredentialsMode,
}
impl RequestOptions {
	/// Overrides the HTTP method.
	pub fn method(mut self, method: Method) -> Self {
		self.method = method;

		self
	}

	/// Sets (or replaces) a caller header.
	pub fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
		self.headers.insert(name, value);

		self
	}

	/// Sets a raw body.
	pub fn body(mut self, body: impl Into<Vec<u8>>) -> Self {
		self.body = Some(body.into());

		self
	}

	/// Serializes `payload` as the JSON body.
	pub fn json<B>(mut self, payload: &B) -> Result<Self, ConfigError>
	where
		B: ?Sized + Serialize,
	{
		self.body = Some(serde_json::to_vec(payload)?);

		Ok(self)
	}

	/// Overrides the credentials mode.
	pub fn credentials(mut self, mode: CredentialsMode) -> Self {
		self.credentials = mode;

		self
	}
}

/// A resolved request kept intact so it can be replayed after a refresh.
#[derive(Clone, Debug)]
pub struct CoordinatedRequest {
	/// Absolute target URL.
	pub url: Url,
	/// Caller options.
	pub options: RequestOptions,
}
impl CoordinatedRequest {
	/// Creates a request for `url` with `options`.
	pub fn new(url: Url, options: RequestOptions) -> Self {
		Self { url, options }
	}

	/// Builds the transport request, injecting `csrf` unless the caller set that header.
	pub fn to_http(
		&self,
		csrf: Option<(&HeaderName, &CsrfToken)>,
	) -> Result<HttpRequest, ConfigError> {
		let mut headers = self.options.headers.clone();

		if !headers.contains_key(CONTENT_TYPE) {
			headers.insert(CONTENT_TYPE, HeaderValue::from_static(JSON_CONTENT_TYPE));
		}
		if let Some((name, token)) = csrf.filter(|(name, _)| !headers.contains_key(*name)) {
			let value = HeaderValue::from_str(token.expose()).map_err(::http::Error::from)?;

			headers.insert(name.clone(), value);
		}

		let mut request = ::http::Request::builder()
			.method(self.options.method.clone())
			.uri(self.url.as_str())
			.body(self.options.body.clone().unwrap_or_default())?;

		*request.headers_mut() = headers;
		request.extensions_mut().insert(self.options.credentials);

		Ok(request)
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	fn target() -> Url {
		Url::parse("https://blog.example.com/api/posts").expect("Target fixture should parse.")
	}

	fn csrf_header() -> HeaderName {
		HeaderName::from_static("x-csrf-token")
	}

	#[test]
	fn defaults_add_json_content_type_and_token() {
		let header = csrf_header();
		let token = CsrfToken::new("t1");
		let request = CoordinatedRequest::new(target(), RequestOptions::default())
			.to_http(Some((&header, &token)))
			.expect("Request should build.");

		assert_eq!(request.method(), Method::GET);
		assert_eq!(request.uri(), "https://blog.example.com/api/posts");
		assert_eq!(request.headers()[CONTENT_TYPE], JSON_CONTENT_TYPE);
		assert_eq!(request.headers()["x-csrf-token"], "t1");
		assert_eq!(CredentialsMode::of(&request), CredentialsMode::Include);
		assert!(request.body().is_empty());
	}

	#[test]
	fn caller_headers_take_precedence() {
		let header = csrf_header();
		let token = CsrfToken::new("injected");
		let options = RequestOptions::default()
			.method(Method::PUT)
			.header(CONTENT_TYPE, HeaderValue::from_static("text/plain"))
			.header(header.clone(), HeaderValue::from_static("caller"))
			.body("raw")
			.credentials(CredentialsMode::Omit);
		let request = CoordinatedRequest::new(target(), options)
			.to_http(Some((&header, &token)))
			.expect("Request should build.");

		assert_eq!(request.headers()[CONTENT_TYPE], "text/plain");
		assert_eq!(request.headers()["x-csrf-token"], "caller");
		assert_eq!(request.body().as_slice(), b"raw");
		assert_eq!(CredentialsMode::of(&request), CredentialsMode::Omit);
	}

	#[test]
	fn json_body_and_missing_token() {
		let options = RequestOptions::default()
			.method(Method::POST)
			.json(&serde_json::json!({ "title": "Hello" }))
			.expect("JSON payload should serialize.");
		let request =
			CoordinatedRequest::new(target(), options).to_http(None).expect("Request should build.");

		assert!(!request.headers().contains_key("x-csrf-token"));
		assert_eq!(request.body().as_slice(), br#"{"title":"Hello"}"#);
	}

	#[test]
	fn unprintable_token_is_a_request_error() {
		let header = csrf_header();
		let token = CsrfToken::new("bad\ntoken");
		let err = CoordinatedRequest::new(target(), RequestOptions::default())
			.to_http(Some((&header, &token)))
			.expect_err("Control characters cannot be sent in a header.");

		assert!(matches!(err, ConfigError::HttpRequest(_)));
	}
}
