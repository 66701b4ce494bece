//! Web framework integration surface.
//!
//! This module provides the boundary between HTTP frameworks and the
//! gateway. It handles:
//! - Mapping HTTP requests, bodies and responses to engine [`Attributes`](crate::Attributes)
//! - Naming the request or response an event refers to
//! - Driving a request through the HTTP watch points
//!
//! # Design Principles
//!
//! 1. **No Framework Dependencies**: This module contains no framework-specific code.
//!    It defines payload types that framework-specific code converts into.
//!
//! 2. **Fail Open**: Nothing in this module can reject a request on its own.
//!    Only a watcher's block verdict stops the pipeline.
//!
//! 3. **Explicit Context**: No global state. The gateway and the request's
//!    security context are passed in by the host.
//!
//! # Integration Model
//!
//! Framework-specific code should:
//! 1. Build an [`HttpRequest`] (and optionally a [`RequestBody`]) from the framework request
//! 2. Create a [`SecurityContext`](crate::SecurityContext) for the request
//! 3. Call [`instrument`] with the handler
//! 4. Send [`InstrumentedResponse::into_response`] and export the context's events

mod adapter;
mod extract;
mod middleware;

pub use adapter::{HttpRequest, HttpResponse, RequestBody};
pub use extract::ExtractAttributes;
pub use middleware::{instrument, Disposition, InstrumentedResponse, BLOCKED_STATUS};
