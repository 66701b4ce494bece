//! Extraction boundary trait for web integration.
//!
//! This module defines how framework-specific payloads are mapped onto the
//! engine-facing [`Attributes`] and the [`Subject`] that events reference.

use crate::attributes::Attributes;
use crate::event::Subject;

/// Extracts engine attributes and an event subject from a lifecycle payload.
///
/// This trait is the boundary between web framework types and the gateway.
/// Every payload pushed through a watch point implements it. Framework
/// integrations either implement it on their own request and response
/// types or convert into [`HttpRequest`](super::HttpRequest),
/// [`RequestBody`](super::RequestBody) and
/// [`HttpResponse`](super::HttpResponse).
///
/// # Design Notes
///
/// This trait intentionally does NOT:
/// - Evaluate anything (that's the watcher's job)
/// - Decide whether the request proceeds (that's the gateway's job)
///
/// It ONLY maps framework types to domain types. Both methods may be called
/// once per watcher, so they should be cheap and side-effect free.
///
/// # Examples
///
/// ```
/// use appsec_gateway::web::ExtractAttributes;
/// use appsec_gateway::{Attributes, Subject};
///
/// // Example framework-specific implementation
/// struct MyFrameworkRequest {
///     id: String,
///     verb: String,
///     target: String,
/// }
///
/// impl ExtractAttributes for MyFrameworkRequest {
///     fn attributes(&self) -> Attributes {
///         Attributes::new()
///             .with_method(self.verb.clone())
///             .with_uri(self.target.clone())
///     }
///
///     fn subject(&self) -> Subject {
///         Subject::request(self.id.clone()).with_method(self.verb.clone())
///     }
/// }
/// ```
pub trait ExtractAttributes {
    /// Normalizes the payload for the detection engine.
    fn attributes(&self) -> Attributes;

    /// Identifying reference recorded on events raised for this payload.
    fn subject(&self) -> Subject;
}

impl<T: ExtractAttributes + ?Sized> ExtractAttributes for &T {
    fn attributes(&self) -> Attributes {
        (**self).attributes()
    }

    fn subject(&self) -> Subject {
        (**self).subject()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::SubjectKind;
    use crate::reactive::Topic;

    // Test implementation for documentation
    struct TestRequest {
        id: String,
        uri: String,
    }

    impl ExtractAttributes for TestRequest {
        fn attributes(&self) -> Attributes {
            Attributes::new().with_uri(self.uri.clone())
        }

        fn subject(&self) -> Subject {
            Subject::request(self.id.clone())
        }
    }

    #[test]
    fn extract_attributes_trait_works() {
        let req = TestRequest {
            id: "test-1".to_string(),
            uri: "/search?q=1".to_string(),
        };

        let attrs = req.attributes();
        assert_eq!(attrs.topics(), vec![Topic::RequestUri]);
        assert_eq!(req.subject().kind(), SubjectKind::Request);
        assert_eq!(req.subject().request_id(), "test-1");
    }

    #[test]
    fn references_forward_to_payload() {
        let req = TestRequest {
            id: "test-2".to_string(),
            uri: "/".to_string(),
        };
        let by_ref: &dyn ExtractAttributes = &&req;

        assert_eq!(by_ref.attributes(), req.attributes());
        assert_eq!(by_ref.subject(), req.subject());
    }
}
