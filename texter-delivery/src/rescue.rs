//! Per-texter error handlers.
//!
//! Handlers are consulted newest first and the first one whose matcher
//! accepts the error gets it. A handler either swallows the error by
//! returning `Ok(())` or fails with an error of its own, which then
//! replaces the original.

use std::{fmt, sync::Arc};

use texter_common::{ErrorKind, Result, TexterError, internal};

/// Handles an error that a matcher accepted.
pub type Handler = Arc<dyn Fn(TexterError) -> Result<()> + Send + Sync>;

type Predicate = Arc<dyn Fn(&TexterError) -> bool + Send + Sync>;

#[derive(Clone)]
enum Matcher {
    Kind(ErrorKind),
    Predicate(Predicate),
}

impl Matcher {
    fn matches(&self, error: &TexterError) -> bool {
        match self {
            Self::Kind(kind) => error.kind() == *kind,
            Self::Predicate(predicate) => predicate(error),
        }
    }
}

impl fmt::Debug for Matcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Kind(kind) => f.debug_tuple("Kind").field(kind).finish(),
            Self::Predicate(_) => f.write_str("Predicate"),
        }
    }
}

#[derive(Clone, Default)]
pub struct RescuePipeline {
    handlers: Vec<(Matcher, Handler)>,
}

impl fmt::Debug for RescuePipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.handlers.iter().map(|(matcher, _)| matcher))
            .finish()
    }
}

impl RescuePipeline {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Handle every error of `kind` with `handler`.
    pub fn rescue_from<F>(&mut self, kind: ErrorKind, handler: F)
    where
        F: Fn(TexterError) -> Result<()> + Send + Sync + 'static,
    {
        self.handlers.push((Matcher::Kind(kind), Arc::new(handler)));
    }

    /// Handle every error `predicate` accepts with `handler`.
    pub fn rescue_if<P, F>(&mut self, predicate: P, handler: F)
    where
        P: Fn(&TexterError) -> bool + Send + Sync + 'static,
        F: Fn(TexterError) -> Result<()> + Send + Sync + 'static,
    {
        self.handlers
            .push((Matcher::Predicate(Arc::new(predicate)), Arc::new(handler)));
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// The most recently registered handler accepting `error`.
    #[must_use]
    pub fn handler_for(&self, error: &TexterError) -> Option<&Handler> {
        self.handlers
            .iter()
            .rev()
            .find(|(matcher, _)| matcher.matches(error))
            .map(|(_, handler)| handler)
    }

    /// Give `error` to its handler.
    ///
    /// # Errors
    /// `error` itself when nothing accepts it, or whatever the handler
    /// failed with.
    pub fn handle_exception(&self, error: TexterError) -> Result<()> {
        match self.handler_for(&error) {
            Some(handler) => {
                internal!(level = DEBUG, "Rescuing {:?}: {error}", error.kind());
                handler(error)
            }
            None => Err(error),
        }
    }

    /// Pass a successful `result` through, or try to rescue its error.
    ///
    /// Returns `Ok(None)` when a handler swallowed the error.
    ///
    /// # Errors
    /// As [`RescuePipeline::handle_exception`].
    pub fn handle_exceptions<T>(&self, result: Result<T>) -> Result<Option<T>> {
        match result {
            Ok(value) => Ok(Some(value)),
            Err(error) => self.handle_exception(error).map(|()| None),
        }
    }
}
