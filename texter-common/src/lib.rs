pub mod check;
pub mod error;
pub mod logging;
pub mod message;
pub mod transport;

pub use tracing;

pub use self::{
    check::check_delivery_params,
    error::{ErrorKind, JobError, Result, TemplateError, TexterError, TransportError},
    message::{DEFAULT_CHARSET, Delivered, DeliveryHandler, Message, Recipients},
    transport::{Response, Settings, Transport},
};
