//! Framework-agnostic lifecycle payloads.

use std::net::IpAddr;

use percent_encoding::percent_decode_str;
use serde_json::Value;
use url::form_urlencoded;

use crate::attributes::{decode_path, Attributes, Pairs};
use crate::event::Subject;

use super::ExtractAttributes;

/// Request-started payload: request line, headers, cookies and client address.
///
/// `HttpRequest` is the primary integration point between web frameworks
/// and the gateway's request watch point. It holds simple, owned data so it
/// is not coupled to any framework's request type. Framework-specific code
/// should implement `From<FrameworkRequest>` for `HttpRequest`.
///
/// Query parameters are parsed from the URI at construction and decoded
/// the way HTML forms encode them (`%XX` escapes, `+` as space). The path
/// is percent-decoded; the raw URI is kept untouched. A `Cookie` header is
/// split into percent-decoded cookies and kept out of the header list.
///
/// # Examples
///
/// ```
/// use appsec_gateway::web::{ExtractAttributes, HttpRequest};
///
/// let mut request = HttpRequest::new("req-12345", "GET", "/search?q=rust&page=2");
/// request.add_header("User-Agent", "curl/8.0");
/// request.add_header("Cookie", "session=abc; theme=dark");
///
/// assert_eq!(request.path(), "/search");
/// assert_eq!(request.query().len(), 2);
/// assert_eq!(request.cookies().len(), 2);
/// assert_eq!(request.headers().len(), 1);
///
/// let attrs = request.attributes();
/// assert_eq!(attrs.header("user-agent"), Some("curl/8.0"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    request_id: String,
    method: String,
    uri: String,
    path: String,
    query: Pairs,
    headers: Pairs,
    cookies: Pairs,
    client_ip: Option<IpAddr>,
}

impl HttpRequest {
    /// Creates a request payload. Query parameters are taken from `uri`.
    pub fn new(
        request_id: impl Into<String>,
        method: impl Into<String>,
        uri: impl Into<String>,
    ) -> Self {
        let uri = uri.into();
        let query = uri
            .split_once('?')
            .map(|(_, raw)| parse_query(raw))
            .unwrap_or_default();
        Self {
            request_id: request_id.into(),
            method: method.into(),
            path: decode_path(&uri),
            uri,
            query,
            headers: Vec::new(),
            cookies: Vec::new(),
            client_ip: None,
        }
    }

    /// Adds a header. `Cookie` headers are split into cookies instead.
    pub fn add_header(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        if name.eq_ignore_ascii_case("cookie") {
            self.cookies.extend(parse_cookies(&value));
        } else {
            self.headers.push((name, value));
        }
    }

    /// Adds a query parameter not present in the URI, e.g. from a router.
    pub fn add_query_param(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.query.push((key.into(), value.into()));
    }

    /// Adds a cookie.
    pub fn add_cookie(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.cookies.push((name.into(), value.into()));
    }

    /// Sets the client address.
    pub fn set_client_ip(&mut self, ip: IpAddr) {
        self.client_ip = Some(ip);
    }

    /// Returns the request ID.
    pub fn request_id(&self) -> &str {
        &self.request_id
    }

    /// Returns the request method.
    pub fn method(&self) -> &str {
        &self.method
    }

    /// Returns the raw URI, including any query string.
    pub fn uri(&self) -> &str {
        &self.uri
    }

    /// Returns the percent-decoded URI path, without the query string.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Returns the query parameters in order.
    pub fn query(&self) -> &[(String, String)] {
        &self.query
    }

    /// Returns the headers in order, excluding cookies.
    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }

    /// Returns the first header named `name`, ignoring case.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Returns the cookies in order.
    pub fn cookies(&self) -> &[(String, String)] {
        &self.cookies
    }

    /// Returns the client address, if known.
    pub fn client_ip(&self) -> Option<IpAddr> {
        self.client_ip
    }
}

impl ExtractAttributes for HttpRequest {
    fn attributes(&self) -> Attributes {
        let mut attrs = Attributes::new()
            .with_method(self.method.clone())
            .with_uri(self.uri.clone());
        if !self.query.is_empty() {
            attrs = attrs.with_query(self.query.clone());
        }
        if !self.headers.is_empty() {
            attrs = attrs.with_headers(self.headers.clone());
        }
        if !self.cookies.is_empty() {
            attrs = attrs.with_cookies(self.cookies.clone());
        }
        if let Some(ip) = self.client_ip {
            attrs = attrs.with_client_ip(ip);
        }
        attrs
    }

    fn subject(&self) -> Subject {
        Subject::request(self.request_id.clone())
            .with_method(self.method.clone())
            .with_path(self.path.clone())
    }
}

/// Parsed request body payload.
///
/// Body parsing belongs to the host framework; the gateway only sees the
/// structured result.
///
/// # Examples
///
/// ```
/// use appsec_gateway::web::{ExtractAttributes, RequestBody};
///
/// let body = RequestBody::new("req-1", serde_json::json!({"user": "alice"}));
/// assert_eq!(body.attributes().body(), Some(body.value()));
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct RequestBody {
    request_id: String,
    value: Value,
}

impl RequestBody {
    /// Creates a body payload.
    pub fn new(request_id: impl Into<String>, value: Value) -> Self {
        Self {
            request_id: request_id.into(),
            value,
        }
    }

    /// Returns the request ID.
    pub fn request_id(&self) -> &str {
        &self.request_id
    }

    /// Returns the parsed body.
    pub fn value(&self) -> &Value {
        &self.value
    }

    /// Consumes the payload, returning the parsed body.
    pub fn into_value(self) -> Value {
        self.value
    }
}

impl ExtractAttributes for RequestBody {
    fn attributes(&self) -> Attributes {
        Attributes::new().with_body(self.value.clone())
    }

    fn subject(&self) -> Subject {
        Subject::request(self.request_id.clone())
    }
}

/// Response-started payload: status and headers.
///
/// # Examples
///
/// ```
/// use appsec_gateway::web::{ExtractAttributes, HttpResponse};
///
/// let mut response = HttpResponse::new("req-1", 404);
/// response.add_header("Content-Type", "text/html");
///
/// let attrs = response.attributes();
/// assert_eq!(attrs.status(), Some(404));
/// assert_eq!(response.subject().status(), Some(404));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    request_id: String,
    status: u16,
    headers: Pairs,
}

impl HttpResponse {
    /// Creates a response payload with no headers.
    pub fn new(request_id: impl Into<String>, status: u16) -> Self {
        Self {
            request_id: request_id.into(),
            status,
            headers: Vec::new(),
        }
    }

    /// Adds a header. `Set-Cookie` headers are not published to the engine.
    pub fn add_header(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.headers.push((name.into(), value.into()));
    }

    /// Returns the request ID.
    pub fn request_id(&self) -> &str {
        &self.request_id
    }

    /// Returns the status code.
    pub fn status(&self) -> u16 {
        self.status
    }

    /// Returns all headers in order.
    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }
}

impl ExtractAttributes for HttpResponse {
    fn attributes(&self) -> Attributes {
        let headers: Pairs = self
            .headers
            .iter()
            .filter(|(name, _)| !name.eq_ignore_ascii_case("set-cookie"))
            .cloned()
            .collect();
        Attributes::new()
            .with_status(self.status)
            .with_response_headers(headers)
    }

    fn subject(&self) -> Subject {
        Subject::response(self.request_id.clone()).with_status(self.status)
    }
}

fn parse_query(raw: &str) -> Pairs {
    form_urlencoded::parse(raw.as_bytes())
        .into_owned()
        .collect()
}

fn parse_cookies(raw: &str) -> Pairs {
    raw.split(';')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(|part| match part.split_once('=') {
            Some((k, v)) => (decode_cookie(k.trim()), decode_cookie(v.trim())),
            None => (decode_cookie(part), String::new()),
        })
        .collect()
}

fn decode_cookie(raw: &str) -> String {
    percent_decode_str(raw).decode_utf8_lossy().into_owned()
}
