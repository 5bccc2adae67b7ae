use std::fmt::Debug;

use async_trait::async_trait;

use crate::{Message, Result};

/// Type-erased transport settings, as registered and overridden by callers.
///
/// Each transport deserializes the merged map into its own typed settings
/// when it is constructed, so this shape never reaches a send.
pub type Settings = serde_json::Map<String, serde_json::Value>;

/// Whatever a transport reports back after sending.
pub type Response = serde_json::Value;

/// A unit that knows how to put a validated message on the wire.
///
/// Implementations are expected to run [`crate::check_delivery_params`]
/// before doing any I/O, so that validation failures surface as
/// [`crate::TexterError::MissingRecipient`] or
/// [`crate::TexterError::MissingBody`] rather than transport errors.
#[async_trait]
pub trait Transport: Debug + Send + Sync {
    ///
    /// Send `message`
    ///
    /// # Errors
    /// Validation errors, or a [`crate::TexterError::Transport`] if sending
    /// failed.
    ///
    async fn deliver(&self, message: &Message) -> Result<Response>;

    /// Whether unchecked deliveries should hand back the raw response
    /// instead of the message.
    fn return_response(&self) -> bool {
        false
    }
}
