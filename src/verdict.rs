use std::fmt;

use serde::{Deserialize, Serialize};

/// Outcome of evaluating one lifecycle event.
///
/// Verdicts are totally ordered by severity: `Ok < Monitor < Block`.
/// Aggregating several verdicts keeps the most severe one.
///
/// # Examples
///
/// ```
/// use appsec_gateway::Verdict;
///
/// let worst = Verdict::aggregate([Verdict::Ok, Verdict::Block, Verdict::Monitor]);
/// assert_eq!(worst, Verdict::Block);
/// assert_eq!(Verdict::aggregate([]), Verdict::Ok);
/// ```
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Verdict {
    /// Nothing matched
    #[default]
    Ok,
    /// Something matched; record it but let the request through
    Monitor,
    /// Something matched; the wrapped work must not run
    Block,
}

impl Verdict {
    /// Returns the most severe verdict in `verdicts`, or `Ok` if empty.
    pub fn aggregate(verdicts: impl IntoIterator<Item = Verdict>) -> Verdict {
        verdicts.into_iter().max().unwrap_or_default()
    }

    /// True for verdicts that produce an event.
    pub fn is_recordable(self) -> bool {
        matches!(self, Verdict::Monitor | Verdict::Block)
    }

    /// True if this verdict blocks.
    pub fn is_block(self) -> bool {
        self == Verdict::Block
    }

    /// Lowercase name, as used in logs.
    pub fn as_str(self) -> &'static str {
        match self {
            Verdict::Ok => "ok",
            Verdict::Monitor => "monitor",
            Verdict::Block => "block",
        }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
