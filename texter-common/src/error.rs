//! Error types shared by every texter crate.
//!
//! [`TexterError`] is the single error returned across the dispatch engine.
//! Its variants fall into a few groups that are treated differently by the
//! delivery path:
//! - Validation ([`TexterError::MissingRecipient`], [`TexterError::MissingBody`])
//!   and configuration errors are always raised
//! - Transport failures may be suppressed when a message is configured not to
//!   raise delivery errors
//! - Everything else is a programming error or an external collaborator
//!   failing, and is raised unless a rescue handler claims it

use std::io;

use thiserror::Error;

/// Specialized `Result` type for texter operations.
pub type Result<T> = std::result::Result<T, TexterError>;

/// Top-level texter error type.
#[derive(Debug, Error)]
pub enum TexterError {
    /// The message has no recipients at all.
    #[error("Recipient is required to send a text message")]
    MissingRecipient,

    /// The message body is absent or blank.
    #[error("Message body is required to send a text message")]
    MissingBody,

    /// A symbolic delivery method was requested that was never registered.
    #[error("Invalid delivery method {0:?}")]
    InvalidDeliveryMethod(String),

    /// No delivery method was requested and the texter has no default.
    #[error("Delivery method cannot be empty")]
    MissingDeliveryMethod,

    /// The message was accessed before asking to deliver it later.
    #[error(
        "The message was accessed before deliver_later; local changes would be silently lost \
         because only the action arguments are passed to the delivery job"
    )]
    PrematureMaterialization,

    /// Unchecked delivery was attempted on a message without a transport.
    #[error("No transport configured for this message")]
    NoTransportConfigured,

    /// A delivery job names a texter that is not known to the catalog.
    #[error("Unresolvable texter {0:?}")]
    UnresolvableTexterClass(String),

    /// The texter has no action registered under this name.
    #[error("{texter} has no action named {action:?}")]
    UnknownAction { texter: String, action: String },

    /// An action argument could not be reconstructed into the expected type.
    #[error("Argument {index} of {action} is invalid: {reason}")]
    Argument {
        action: String,
        index: usize,
        reason: String,
    },

    /// Merged transport settings did not fit the transport's settings type.
    #[error("Invalid settings for transport {transport:?}: {source}")]
    Settings {
        transport: String,
        #[source]
        source: serde_json::Error,
    },

    /// Template lookup or rendering failed.
    #[error("Template error: {0}")]
    Template(#[from] TemplateError),

    /// The transport failed to send the message.
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// A delivery job could not be encoded, decoded or enqueued.
    #[error("Job error: {0}")]
    Job(#[from] JobError),

    /// An action, callback or rescue handler failed with its own error.
    #[error("Action failed: {0}")]
    Action(#[source] anyhow::Error),
}

/// Failures raised by a transport while sending.
#[derive(Debug, Error)]
pub enum TransportError {
    /// I/O error while writing or connecting.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The remote end refused the message.
    #[error("Delivery rejected: {0}")]
    Rejected(String),

    /// Failure reported by an external transport implementation.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Failures from the external template renderer.
#[derive(Debug, Error)]
pub enum TemplateError {
    /// No template matched the requested name in any of the paths.
    #[error("Missing template {name} in {paths:?}")]
    NotFound { name: String, paths: Vec<String> },

    /// A template was found but rendering it failed.
    #[error("Failed to render {template}: {source}")]
    Render {
        template: String,
        #[source]
        source: anyhow::Error,
    },
}

/// Failures while handing a delivery to, or reading it back from, a job queue.
#[derive(Debug, Error)]
pub enum JobError {
    /// The job descriptor could not be serialized.
    #[error("Failed to encode delivery job: {0}")]
    Encode(#[source] serde_json::Error),

    /// The stored payload could not be turned back into a delivery job.
    #[error("Failed to decode delivery job: {0}")]
    Decode(#[source] serde_json::Error),

    /// The requested delay cannot be turned into a point in time.
    #[error("Invalid schedule: {0}")]
    InvalidSchedule(String),

    /// The queue did not acknowledge the job.
    #[error("Queue {queue:?} rejected the job: {reason}")]
    Rejected { queue: String, reason: String },
}

/// Discriminant of [`TexterError`], used to match rescue handlers without
/// inspecting payloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    MissingRecipient,
    MissingBody,
    InvalidDeliveryMethod,
    MissingDeliveryMethod,
    PrematureMaterialization,
    NoTransportConfigured,
    UnresolvableTexterClass,
    UnknownAction,
    Argument,
    Settings,
    Template,
    Transport,
    Job,
    Action,
}

impl TexterError {
    /// Wraps an arbitrary error raised by user code.
    pub fn action<E>(error: E) -> Self
    where
        E: Into<anyhow::Error>,
    {
        Self::Action(error.into())
    }

    /// The kind of this error.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::MissingRecipient => ErrorKind::MissingRecipient,
            Self::MissingBody => ErrorKind::MissingBody,
            Self::InvalidDeliveryMethod(_) => ErrorKind::InvalidDeliveryMethod,
            Self::MissingDeliveryMethod => ErrorKind::MissingDeliveryMethod,
            Self::PrematureMaterialization => ErrorKind::PrematureMaterialization,
            Self::NoTransportConfigured => ErrorKind::NoTransportConfigured,
            Self::UnresolvableTexterClass(_) => ErrorKind::UnresolvableTexterClass,
            Self::UnknownAction { .. } => ErrorKind::UnknownAction,
            Self::Argument { .. } => ErrorKind::Argument,
            Self::Settings { .. } => ErrorKind::Settings,
            Self::Template(_) => ErrorKind::Template,
            Self::Transport(_) => ErrorKind::Transport,
            Self::Job(_) => ErrorKind::Job,
            Self::Action(_) => ErrorKind::Action,
        }
    }

    /// Returns `true` for recipient/body validation failures.
    #[must_use]
    pub const fn is_validation(&self) -> bool {
        matches!(self, Self::MissingRecipient | Self::MissingBody)
    }

    /// Returns `true` for delivery method configuration failures.
    #[must_use]
    pub const fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::InvalidDeliveryMethod(_) | Self::MissingDeliveryMethod | Self::Settings { .. }
        )
    }

    /// Returns `true` if a message configured not to raise delivery errors
    /// may swallow this error. Only send failures qualify.
    #[must_use]
    pub const fn is_suppressible(&self) -> bool {
        matches!(self, Self::Transport(_))
    }
}

impl From<io::Error> for TexterError {
    fn from(error: io::Error) -> Self {
        Self::Transport(TransportError::Io(error))
    }
}
