use std::fmt;

use crate::attributes::Attributes;
use crate::error::ProtocolError;
use crate::verdict::Verdict;

use super::Topic;

type Callback<'a> = Box<dyn FnMut(&Attributes) -> Verdict + 'a>;

struct Subscription<'a> {
    topics: Vec<Topic>,
    callback: Callback<'a>,
}

/// Lifecycle of an [`Operation`].
///
/// ```text
/// Open --publish--> Published --callbacks done--> Closed
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationState {
    /// Subscriptions may register
    Open,
    /// Callbacks are firing
    Published,
    /// Result captured; nothing else will fire
    Closed,
}

/// Result of [`Operation::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Subscribed {
    /// Registered at this position in the firing order
    Active(usize),
    /// The operation was already published; the callback will never fire
    Ignored,
}

/// Single-shot publish/subscribe context for one detection dispatch.
///
/// Subscriptions register a topic filter and a callback while the operation
/// is open. A single [`publish`](Operation::publish) then fires, synchronously
/// and in registration order, every subscription whose filter intersects the
/// published attributes. Each callback sees the attributes projected onto its
/// own filter and returns a candidate verdict; the operation's verdict is the
/// most severe of those, or `Ok` when nothing fired.
///
/// Callbacks may borrow from the caller's stack for the lifetime `'a`, which
/// is how watchers thread a [`SecurityContext`](crate::SecurityContext)
/// through detection without shared state.
///
/// # Examples
///
/// ```
/// use appsec_gateway::{Attributes, Operation, Topic, Verdict};
///
/// let mut seen = Vec::new();
/// let verdict = {
///     let mut op = Operation::new("http.request");
///     op.subscribe(&[Topic::RequestUri], |attrs| {
///         seen.push(attrs.path().unwrap_or_default().to_owned());
///         Verdict::Monitor
///     })
///     .unwrap();
///
///     op.publish(&Attributes::new().with_uri("/admin")).unwrap()
/// };
///
/// assert_eq!(verdict, Verdict::Monitor);
/// assert_eq!(seen, vec!["/admin".to_owned()]);
/// ```
pub struct Operation<'a> {
    name: String,
    state: OperationState,
    subscriptions: Vec<Subscription<'a>>,
    result: Option<Verdict>,
}

impl<'a> Operation<'a> {
    /// Opens a new operation.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            state: OperationState::Open,
            subscriptions: Vec::new(),
            result: None,
        }
    }

    /// Operation name, usually the watch point being evaluated.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Current state.
    pub fn state(&self) -> OperationState {
        self.state
    }

    /// Number of live subscriptions.
    pub fn subscription_count(&self) -> usize {
        self.subscriptions.len()
    }

    /// Captured verdict, once published.
    pub fn result(&self) -> Option<Verdict> {
        self.result
    }

    /// Registers `callback` for `topics`.
    ///
    /// Duplicate topics in the filter are collapsed. Subscribing after
    /// publish is accepted but inert and returns [`Subscribed::Ignored`].
    ///
    /// # Errors
    ///
    /// [`ProtocolError::EmptyTopicFilter`] if `topics` is empty.
    pub fn subscribe<F>(&mut self, topics: &[Topic], callback: F) -> Result<Subscribed, ProtocolError>
    where
        F: FnMut(&Attributes) -> Verdict + 'a,
    {
        if topics.is_empty() {
            return Err(ProtocolError::EmptyTopicFilter {
                operation: self.name.clone(),
            });
        }

        if self.state != OperationState::Open {
            tracing::debug!(
                operation = %self.name,
                "subscription after publish ignored"
            );
            return Ok(Subscribed::Ignored);
        }

        let mut filter = topics.to_vec();
        filter.sort_unstable();
        filter.dedup();

        self.subscriptions.push(Subscription {
            topics: filter,
            callback: Box::new(callback),
        });

        Ok(Subscribed::Active(self.subscriptions.len() - 1))
    }

    /// Publishes `attributes`, firing matching subscriptions.
    ///
    /// Returns the aggregated verdict once every matching callback has run.
    /// Subscriptions are released afterwards, so borrows they hold end here.
    ///
    /// # Errors
    ///
    /// [`ProtocolError::AlreadyPublished`] on any call after the first. The
    /// failed call fires nothing and leaves the captured result untouched.
    pub fn publish(&mut self, attributes: &Attributes) -> Result<Verdict, ProtocolError> {
        if self.state != OperationState::Open {
            return Err(ProtocolError::AlreadyPublished {
                operation: self.name.clone(),
            });
        }
        self.state = OperationState::Published;

        let mut verdict = Verdict::Ok;
        let mut fired = 0usize;
        for mut sub in self.subscriptions.drain(..) {
            if !attributes.contains_any(&sub.topics) {
                continue;
            }
            let projected = attributes.select(&sub.topics);
            verdict = verdict.max((sub.callback)(&projected));
            fired += 1;
        }

        tracing::debug!(
            operation = %self.name,
            fired,
            verdict = %verdict,
            "operation published"
        );

        self.result = Some(verdict);
        self.state = OperationState::Closed;
        Ok(verdict)
    }
}

impl fmt::Debug for Operation<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Operation")
            .field("name", &self.name)
            .field("state", &self.state)
            .field("subscriptions", &self.subscriptions.len())
            .field("result", &self.result)
            .finish()
    }
}
