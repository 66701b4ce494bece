use std::fmt;

use serde::{Deserialize, Serialize};

/// A typed subscription key.
///
/// Topics form a closed set so a misspelt subscription is a compile error
/// rather than a filter that silently never matches. Each topic maps to one
/// field of [`Attributes`](crate::Attributes) and carries a stable dotted
/// address understood by detection engines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Topic {
    /// HTTP method of the inbound request
    RequestMethod,
    /// Raw request URI, path and query string included
    RequestUri,
    /// Decoded query parameters
    RequestQuery,
    /// Request headers, cookies excluded
    RequestHeaders,
    /// Request cookies
    RequestCookies,
    /// Resolved client address
    RequestClientIp,
    /// Parsed request body
    RequestBody,
    /// Response status code
    ResponseStatus,
    /// Response headers
    ResponseHeaders,
}

impl Topic {
    /// Every topic, in declaration order.
    pub const ALL: [Topic; 9] = [
        Topic::RequestMethod,
        Topic::RequestUri,
        Topic::RequestQuery,
        Topic::RequestHeaders,
        Topic::RequestCookies,
        Topic::RequestClientIp,
        Topic::RequestBody,
        Topic::ResponseStatus,
        Topic::ResponseHeaders,
    ];

    /// Topics describing an inbound request before its body is read.
    pub const REQUEST: [Topic; 6] = [
        Topic::RequestMethod,
        Topic::RequestUri,
        Topic::RequestQuery,
        Topic::RequestHeaders,
        Topic::RequestCookies,
        Topic::RequestClientIp,
    ];

    /// Topics describing a parsed request body.
    pub const REQUEST_BODY: [Topic; 1] = [Topic::RequestBody];

    /// Topics describing an outbound response.
    pub const RESPONSE: [Topic; 2] = [Topic::ResponseStatus, Topic::ResponseHeaders];

    /// Engine-facing address for this topic.
    pub fn address(self) -> &'static str {
        match self {
            Topic::RequestMethod => "server.request.method",
            Topic::RequestUri => "server.request.uri.raw",
            Topic::RequestQuery => "server.request.query",
            Topic::RequestHeaders => "server.request.headers.no_cookies",
            Topic::RequestCookies => "server.request.cookies",
            Topic::RequestClientIp => "http.client_ip",
            Topic::RequestBody => "server.request.body",
            Topic::ResponseStatus => "server.response.status",
            Topic::ResponseHeaders => "server.response.headers.no_cookies",
        }
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.address())
    }
}
