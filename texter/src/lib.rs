//! Short-message dispatch.
//!
//! A [`Texter`] is a named set of actions. Calling an action returns a lazy
//! [`MessageDelivery`]; the action only runs once the message is needed,
//! either to deliver it now through the texter's transport or to be replayed
//! later by a job taken off a [`JobQueue`].

pub use texter_common::{
    self as common, DEFAULT_CHARSET, Delivered, ErrorKind, JobError, Message, Recipients,
    Response, Result, Settings, TemplateError, TexterError, Transport, TransportError,
    check_delivery_params, logging,
};
pub use texter_delivery::{
    self as delivery, ActionContext, Assigns, ConfigError, DeliverLaterOptions, DeliveryJob,
    DeliveryMethodName, DeliveryOutcome, EnqueuedJob, Event, JobQueue, LogSubscriber,
    MemoryJobQueue, MessageDelivery, NoTemplates, Notifications, RenderRequest, Renderer,
    StaticTemplates, Subscriber, TestHarness, TextOptions, Texter, TexterBuilder, TexterCatalog,
    TexterConfig, perform_payload,
};
pub use texter_tracing::traced;
pub use texter_transport::{
    self as transport, Deliveries, DeliveryMethod, FileSettings, FileTransport, TestSettings,
    TestTransport, TransportRegistry, TransportType,
};

pub mod prelude {
    pub use crate::{
        ActionContext, DeliverLaterOptions, ErrorKind, Message, MessageDelivery, Recipients,
        Result, TextOptions, Texter, TexterError,
    };
}

/// A builder for `name` with the configuration found by
/// [`TexterConfig::load`] applied.
///
/// # Errors
/// Any [`ConfigError`] from loading the configuration.
pub fn builder(name: impl Into<String>) -> std::result::Result<TexterBuilder, ConfigError> {
    let config = TexterConfig::load()?;
    Ok(Texter::builder(name).with_config(&config))
}
