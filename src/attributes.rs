//! Normalized, engine-facing view of a lifecycle payload.

use std::net::IpAddr;

use percent_encoding::percent_decode_str;
use serde::Serialize;
use serde_json::Value;

use crate::reactive::Topic;

/// Name/value pairs in arrival order. Repeated names are kept.
pub type Pairs = Vec<(String, String)>;

/// Attributes normalized from a request, request body or response.
///
/// Each field corresponds to one [`Topic`]. A field that is `None` was not
/// part of the published payload; a field that is `Some` but empty was
/// present and empty. Serialization produces an address map keyed by
/// [`Topic::address`], the shape detection engines consume.
///
/// # Examples
///
/// ```
/// use appsec_gateway::{Attributes, Topic};
///
/// let attrs = Attributes::new()
///     .with_method("GET")
///     .with_uri("/admin?debug=1")
///     .with_header("User-Agent", "curl/8.0");
///
/// assert_eq!(attrs.path(), Some("/admin"));
/// assert!(attrs.contains(Topic::RequestHeaders));
/// assert!(!attrs.contains(Topic::ResponseStatus));
///
/// let only_uri = attrs.select(&[Topic::RequestUri]);
/// assert!(only_uri.method().is_none());
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Attributes {
    #[serde(rename = "server.request.method", skip_serializing_if = "Option::is_none")]
    method: Option<String>,
    #[serde(rename = "server.request.uri.raw", skip_serializing_if = "Option::is_none")]
    uri: Option<String>,
    #[serde(skip)]
    path: Option<String>,
    #[serde(rename = "server.request.query", skip_serializing_if = "Option::is_none")]
    query: Option<Pairs>,
    #[serde(
        rename = "server.request.headers.no_cookies",
        skip_serializing_if = "Option::is_none"
    )]
    headers: Option<Pairs>,
    #[serde(rename = "server.request.cookies", skip_serializing_if = "Option::is_none")]
    cookies: Option<Pairs>,
    #[serde(rename = "http.client_ip", skip_serializing_if = "Option::is_none")]
    client_ip: Option<IpAddr>,
    #[serde(rename = "server.request.body", skip_serializing_if = "Option::is_none")]
    body: Option<Value>,
    #[serde(rename = "server.response.status", skip_serializing_if = "Option::is_none")]
    status: Option<u16>,
    #[serde(
        rename = "server.response.headers.no_cookies",
        skip_serializing_if = "Option::is_none"
    )]
    response_headers: Option<Pairs>,
}

impl Attributes {
    /// Creates an empty attribute set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the request method.
    pub fn with_method(mut self, method: impl Into<String>) -> Self {
        self.method = Some(method.into());
        self
    }

    /// Sets the raw request URI. The decoded path is derived from it.
    pub fn with_uri(mut self, uri: impl Into<String>) -> Self {
        let uri = uri.into();
        self.path = Some(decode_path(&uri));
        self.uri = Some(uri);
        self
    }

    /// Replaces the query parameters.
    pub fn with_query(mut self, query: Pairs) -> Self {
        self.query = Some(query);
        self
    }

    /// Appends one request header. Names are lower-cased.
    pub fn with_header(mut self, name: impl AsRef<str>, value: impl Into<String>) -> Self {
        self.headers
            .get_or_insert_with(Vec::new)
            .push((name.as_ref().to_ascii_lowercase(), value.into()));
        self
    }

    /// Replaces the request headers. Names are lower-cased.
    pub fn with_headers(mut self, headers: Pairs) -> Self {
        self.headers = Some(lowercase_names(headers));
        self
    }

    /// Replaces the request cookies.
    pub fn with_cookies(mut self, cookies: Pairs) -> Self {
        self.cookies = Some(cookies);
        self
    }

    /// Sets the client address.
    pub fn with_client_ip(mut self, ip: IpAddr) -> Self {
        self.client_ip = Some(ip);
        self
    }

    /// Sets the parsed request body.
    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    /// Sets the response status.
    pub fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }

    /// Replaces the response headers. Names are lower-cased.
    pub fn with_response_headers(mut self, headers: Pairs) -> Self {
        self.response_headers = Some(lowercase_names(headers));
        self
    }

    /// Request method, if present.
    pub fn method(&self) -> Option<&str> {
        self.method.as_deref()
    }

    /// Raw request URI, if present.
    pub fn uri(&self) -> Option<&str> {
        self.uri.as_deref()
    }

    /// Percent-decoded path of the URI (everything before `?`).
    pub fn path(&self) -> Option<&str> {
        self.path.as_deref()
    }

    /// Query parameters, if present.
    pub fn query(&self) -> Option<&[(String, String)]> {
        self.query.as_deref()
    }

    /// Request headers, if present.
    pub fn headers(&self) -> Option<&[(String, String)]> {
        self.headers.as_deref()
    }

    /// First request header value with the given name (case-insensitive).
    pub fn header(&self, name: &str) -> Option<&str> {
        find_pair(self.headers.as_deref(), name)
    }

    /// Request cookies, if present.
    pub fn cookies(&self) -> Option<&[(String, String)]> {
        self.cookies.as_deref()
    }

    /// Client address, if present.
    pub fn client_ip(&self) -> Option<IpAddr> {
        self.client_ip
    }

    /// Parsed request body, if present.
    pub fn body(&self) -> Option<&Value> {
        self.body.as_ref()
    }

    /// Response status, if present.
    pub fn status(&self) -> Option<u16> {
        self.status
    }

    /// Response headers, if present.
    pub fn response_headers(&self) -> Option<&[(String, String)]> {
        self.response_headers.as_deref()
    }

    /// True if the field behind `topic` is present.
    pub fn contains(&self, topic: Topic) -> bool {
        match topic {
            Topic::RequestMethod => self.method.is_some(),
            Topic::RequestUri => self.uri.is_some(),
            Topic::RequestQuery => self.query.is_some(),
            Topic::RequestHeaders => self.headers.is_some(),
            Topic::RequestCookies => self.cookies.is_some(),
            Topic::RequestClientIp => self.client_ip.is_some(),
            Topic::RequestBody => self.body.is_some(),
            Topic::ResponseStatus => self.status.is_some(),
            Topic::ResponseHeaders => self.response_headers.is_some(),
        }
    }

    /// True if any of `topics` is present.
    pub fn contains_any(&self, topics: &[Topic]) -> bool {
        topics.iter().any(|t| self.contains(*t))
    }

    /// Topics present in this attribute set.
    pub fn topics(&self) -> Vec<Topic> {
        Topic::ALL
            .into_iter()
            .filter(|t| self.contains(*t))
            .collect()
    }

    /// Projects this set onto `topics`; every other field becomes `None`.
    pub fn select(&self, topics: &[Topic]) -> Attributes {
        let mut out = Attributes::default();
        for topic in topics {
            match topic {
                Topic::RequestMethod => out.method = self.method.clone(),
                Topic::RequestUri => {
                    out.uri = self.uri.clone();
                    out.path = self.path.clone();
                }
                Topic::RequestQuery => out.query = self.query.clone(),
                Topic::RequestHeaders => out.headers = self.headers.clone(),
                Topic::RequestCookies => out.cookies = self.cookies.clone(),
                Topic::RequestClientIp => out.client_ip = self.client_ip,
                Topic::RequestBody => out.body = self.body.clone(),
                Topic::ResponseStatus => out.status = self.status,
                Topic::ResponseHeaders => out.response_headers = self.response_headers.clone(),
            }
        }
        out
    }

    /// Serializes into an address map for engines that take JSON input.
    pub fn to_address_map(&self) -> Value {
        // Every field is a plain string, number, IP or JSON value.
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

/// Percent-decodes the path part of `uri`. `+` is kept as is.
pub(crate) fn decode_path(uri: &str) -> String {
    let raw = uri.split_once('?').map_or(uri, |(path, _)| path);
    percent_decode_str(raw).decode_utf8_lossy().into_owned()
}

fn lowercase_names(pairs: Pairs) -> Pairs {
    pairs
        .into_iter()
        .map(|(name, value)| (name.to_ascii_lowercase(), value))
        .collect()
}

fn find_pair<'a>(pairs: Option<&'a [(String, String)]>, name: &str) -> Option<&'a str> {
    pairs?
        .iter()
        .find(|(k, _)| k.eq_ignore_ascii_case(name))
        .map(|(_, v)| v.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn empty_attributes_contain_nothing() {
        let attrs = Attributes::new();
        assert!(attrs.topics().is_empty());
        assert_eq!(attrs.to_address_map(), json!({}));
    }

    #[test]
    fn path_strips_query_string() {
        let attrs = Attributes::new().with_uri("/search?q=1&r=2");
        assert_eq!(attrs.path(), Some("/search"));

        let bare = Attributes::new().with_uri("/admin");
        assert_eq!(bare.path(), Some("/admin"));
    }

    #[test]
    fn path_is_decoded_but_uri_stays_raw() {
        let attrs = Attributes::new().with_uri("/%61dmin/a+b%20c?x=%27");
        assert_eq!(attrs.path(), Some("/admin/a+b c"));
        assert_eq!(attrs.uri(), Some("/%61dmin/a+b%20c?x=%27"));
        assert_eq!(
            attrs.to_address_map()["server.request.uri.raw"],
            json!("/%61dmin/a+b%20c?x=%27")
        );

        let selected = attrs.select(&[Topic::RequestUri]);
        assert_eq!(selected.path(), Some("/admin/a+b c"));
    }

    #[test]
    fn header_names_are_lowercased() {
        let attrs = Attributes::new()
            .with_header("X-Forwarded-For", "10.0.0.1")
            .with_response_headers(vec![("Content-Type".into(), "text/html".into())]);

        assert_eq!(attrs.headers().unwrap()[0].0, "x-forwarded-for");
        assert_eq!(attrs.header("x-FORWARDED-for"), Some("10.0.0.1"));
        assert_eq!(attrs.response_headers().unwrap()[0].0, "content-type");
    }

    #[test]
    fn present_but_empty_counts_as_present() {
        let attrs = Attributes::new().with_query(Vec::new());
        assert!(attrs.contains(Topic::RequestQuery));
    }

    #[test]
    fn select_keeps_only_requested_topics() {
        let attrs = Attributes::new()
            .with_method("POST")
            .with_uri("/login")
            .with_body(json!({"user": "admin"}))
            .with_status(200);

        let selected = attrs.select(&[Topic::RequestBody, Topic::ResponseStatus]);
        assert_eq!(
            selected.topics(),
            vec![Topic::RequestBody, Topic::ResponseStatus]
        );
        assert_eq!(selected.status(), Some(200));
        assert!(selected.method().is_none());
    }

    #[test]
    fn address_map_uses_topic_addresses() {
        let attrs = Attributes::new()
            .with_method("GET")
            .with_client_ip("203.0.113.9".parse().unwrap())
            .with_status(403);

        let map = attrs.to_address_map();
        assert_eq!(map["server.request.method"], json!("GET"));
        assert_eq!(map["http.client_ip"], json!("203.0.113.9"));
        assert_eq!(map["server.response.status"], json!(403));
        assert!(map.get("server.request.body").is_none());
    }

    #[test]
    fn contains_any_matches_one_of_many() {
        let attrs = Attributes::new().with_status(500);
        assert!(attrs.contains_any(&Topic::RESPONSE));
        assert!(!attrs.contains_any(&Topic::REQUEST));
    }
}
