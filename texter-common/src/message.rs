use std::{
    fmt,
    sync::{Arc, Weak},
};

use async_trait::async_trait;
use futures_util::future::BoxFuture;
use serde::{Deserialize, Deserializer, Serialize};
use texter_tracing::traced;

use crate::{Response, Result, TexterError, Transport, internal};

/// Charset used when neither the action nor the texter defaults pick one.
pub const DEFAULT_CHARSET: &str = "UTF-8";

/// An ordered list of recipients.
///
/// Anything that can be assigned to [`Message::set_to`] converts into this:
/// a single number becomes a one element list, `None` becomes an empty list.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Recipients(Vec<String>);

impl Recipients {
    #[must_use]
    pub fn into_vec(self) -> Vec<String> {
        self.0
    }

    #[must_use]
    pub fn as_slice(&self) -> &[String] {
        &self.0
    }
}

impl From<&str> for Recipients {
    fn from(value: &str) -> Self {
        Self(vec![value.to_string()])
    }
}

impl From<String> for Recipients {
    fn from(value: String) -> Self {
        Self(vec![value])
    }
}

impl From<Vec<String>> for Recipients {
    fn from(value: Vec<String>) -> Self {
        Self(value)
    }
}

impl From<Vec<&str>> for Recipients {
    fn from(value: Vec<&str>) -> Self {
        Self(value.into_iter().map(str::to_string).collect())
    }
}

impl<const N: usize> From<[&str; N]> for Recipients {
    fn from(value: [&str; N]) -> Self {
        Self(value.into_iter().map(str::to_string).collect())
    }
}

impl<T: Into<Self>> From<Option<T>> for Recipients {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or_default()
    }
}

impl<'de> Deserialize<'de> for Recipients {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum OneOrMany {
            One(String),
            Many(Vec<String>),
        }

        Ok(match OneOrMany::deserialize(deserializer)? {
            OneOrMany::One(one) => Self::from(one),
            OneOrMany::Many(many) => Self::from(many),
        })
    }
}

/// Receives control of a checked delivery so it can be observed.
///
/// The owning texter implements this to wrap each delivery in an
/// instrumentation event. Implementations must await `delivery` exactly once
/// and hand back its result untouched.
#[async_trait]
pub trait DeliveryHandler: Send + Sync {
    async fn deliver_text<'a>(
        &'a self,
        message: &'a Message,
        delivery: BoxFuture<'a, Result<()>>,
    ) -> Result<()>;
}

/// What an unchecked delivery hands back.
#[derive(Debug)]
pub enum Delivered<'a> {
    /// The message itself, for chaining.
    Message(&'a Message),
    /// The transport's raw response, when its settings ask for it.
    Response(Response),
}

/// A text message ready to be handed to a transport.
#[derive(Clone)]
pub struct Message {
    to: Vec<String>,
    body: Option<String>,
    charset: String,
    transport: Option<Arc<dyn Transport>>,
    perform_deliveries: bool,
    raise_delivery_errors: bool,
    delivery_handler: Option<Weak<dyn DeliveryHandler>>,
    null: bool,
}

impl Default for Message {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Message")
            .field("to", &self.to)
            .field("body", &self.body)
            .field("charset", &self.charset)
            .field("transport", &self.transport)
            .field("perform_deliveries", &self.perform_deliveries)
            .field("raise_delivery_errors", &self.raise_delivery_errors)
            .field("has_delivery_handler", &self.delivery_handler.is_some())
            .field("null", &self.null)
            .finish()
    }
}

impl Message {
    /// Create an empty message with default policy flags.
    #[must_use]
    pub fn new() -> Self {
        Self {
            to: Vec::new(),
            body: None,
            charset: DEFAULT_CHARSET.to_string(),
            transport: None,
            perform_deliveries: true,
            raise_delivery_errors: true,
            delivery_handler: None,
            null: false,
        }
    }

    /// The message produced by an action that never asked for a text.
    ///
    /// It has no recipients and an empty body, and delivering it does nothing.
    #[must_use]
    pub fn null() -> Self {
        Self {
            body: Some(String::new()),
            null: true,
            ..Self::new()
        }
    }

    #[must_use]
    pub const fn is_null(&self) -> bool {
        self.null
    }

    #[must_use]
    pub fn to(&self) -> &[String] {
        &self.to
    }

    /// Replace the recipients. A single recipient is stored as a one element list.
    pub fn set_to(&mut self, to: impl Into<Recipients>) {
        self.to = to.into().into_vec();
    }

    #[must_use]
    pub fn body(&self) -> Option<&str> {
        self.body.as_deref()
    }

    pub fn set_body(&mut self, body: impl Into<String>) {
        self.body = Some(body.into());
    }

    #[must_use]
    pub fn charset(&self) -> &str {
        &self.charset
    }

    pub fn set_charset(&mut self, charset: impl Into<String>) {
        self.charset = charset.into();
    }

    #[must_use]
    pub fn transport(&self) -> Option<&Arc<dyn Transport>> {
        self.transport.as_ref()
    }

    pub fn set_transport(&mut self, transport: Arc<dyn Transport>) {
        self.transport = Some(transport);
    }

    #[must_use]
    pub const fn perform_deliveries(&self) -> bool {
        self.perform_deliveries
    }

    pub const fn set_perform_deliveries(&mut self, perform: bool) {
        self.perform_deliveries = perform;
    }

    #[must_use]
    pub const fn raise_delivery_errors(&self) -> bool {
        self.raise_delivery_errors
    }

    pub const fn set_raise_delivery_errors(&mut self, raise: bool) {
        self.raise_delivery_errors = raise;
    }

    /// Attach the texter that instruments deliveries of this message.
    ///
    /// Only a weak reference is kept; if the texter has gone away the
    /// delivery simply runs uninstrumented.
    pub fn set_delivery_handler(&mut self, handler: Weak<dyn DeliveryHandler>) {
        self.delivery_handler = Some(handler);
    }

    #[must_use]
    pub fn delivery_handler(&self) -> Option<Arc<dyn DeliveryHandler>> {
        self.delivery_handler.as_ref().and_then(Weak::upgrade)
    }

    /// A copy carrying only content and policy, with no transport or
    /// delivery handler attached.
    #[must_use]
    pub fn detached(&self) -> Self {
        Self {
            transport: None,
            delivery_handler: None,
            ..self.clone()
        }
    }

    /// Deliver the message, honouring `perform_deliveries` and
    /// `raise_delivery_errors`.
    ///
    /// Transport failures are swallowed when `raise_delivery_errors` is off;
    /// validation failures never are. The delivery handler, when attached,
    /// observes the attempt after any swallowing has happened.
    ///
    /// # Errors
    /// Validation errors, and transport errors while `raise_delivery_errors`
    /// is set.
    #[traced(instrument(level = tracing::Level::TRACE, skip_all))]
    pub async fn deliver(&self) -> Result<&Self> {
        match self.delivery_handler() {
            Some(handler) => {
                handler
                    .deliver_text(self, Box::pin(self.perform_delivery()))
                    .await?;
            }
            None => self.perform_delivery().await?,
        }

        Ok(self)
    }

    /// Deliver the message straight through its transport, ignoring
    /// `perform_deliveries` and `raise_delivery_errors`.
    ///
    /// # Errors
    /// [`TexterError::NoTransportConfigured`] without a transport, otherwise
    /// whatever the transport raised.
    #[traced(instrument(level = tracing::Level::TRACE, skip_all))]
    pub async fn deliver_unchecked(&self) -> Result<Delivered<'_>> {
        if self.null {
            return Ok(Delivered::Message(self));
        }

        let transport = self
            .transport
            .as_ref()
            .ok_or(TexterError::NoTransportConfigured)?;
        let response = transport.deliver(self).await?;

        Ok(if transport.return_response() {
            Delivered::Response(response)
        } else {
            Delivered::Message(self)
        })
    }

    async fn perform_delivery(&self) -> Result<()> {
        if self.null || !self.perform_deliveries {
            return Ok(());
        }

        let Some(transport) = &self.transport else {
            return Ok(());
        };

        match transport.deliver(self).await {
            Ok(_) => Ok(()),
            Err(error) if self.raise_delivery_errors || !error.is_suppressible() => Err(error),
            Err(error) => {
                internal!(
                    level = WARN,
                    "Suppressed delivery error for {:?}: {error}",
                    self.to
                );
                Ok(())
            }
        }
    }
}
