//! Type-state markers for the gateway registry.
//!
//! ```text
//! Gateway<Configuring> --finalize--> Gateway<Finalized>
//! ```
//!
//! Registration is only available while configuring; dispatch is only
//! available once finalized. The markers are never instantiated.

/// Marker for a gateway that still accepts registrations.
///
/// `Gateway<Configuring>` is owned by startup code and cannot dispatch.
#[derive(Debug, Clone, Copy)]
pub struct Configuring {
    _private: (),
}

/// Marker for a gateway whose registry is frozen.
///
/// `Gateway<Finalized>` is immutable and safe to share across request threads.
#[derive(Debug, Clone, Copy)]
pub struct Finalized {
    _private: (),
}
