//! Delivery and processing notifications.

use std::{fmt, sync::Arc, time::Duration};

use parking_lot::RwLock;
use serde_json::{Value, json};
use texter_common::{internal, outgoing};

/// Something that happened while a texter was working.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// A message went through a delivery attempt.
    Deliver {
        texter: String,
        to: Vec<String>,
        body: Option<String>,
        duration: Duration,
        failed: bool,
    },
    /// An action produced its message.
    Process {
        texter: String,
        action: String,
        duration: Duration,
        failed: bool,
    },
}

impl Event {
    pub const DELIVER: &'static str = "deliver.texter";
    pub const PROCESS: &'static str = "process.texter";

    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Deliver { .. } => Self::DELIVER,
            Self::Process { .. } => Self::PROCESS,
        }
    }

    #[must_use]
    pub const fn duration(&self) -> Duration {
        match self {
            Self::Deliver { duration, .. } | Self::Process { duration, .. } => *duration,
        }
    }

    #[must_use]
    pub const fn failed(&self) -> bool {
        match self {
            Self::Deliver { failed, .. } | Self::Process { failed, .. } => *failed,
        }
    }

    /// The event's fields as a JSON object.
    #[must_use]
    pub fn payload(&self) -> Value {
        match self {
            Self::Deliver { texter, to, body, .. } => {
                json!({ "texter": texter, "to": to, "body": body })
            }
            Self::Process { texter, action, .. } => {
                json!({ "texter": texter, "action": action })
            }
        }
    }
}

/// Receives every published [`Event`].
pub trait Subscriber: Send + Sync {
    fn notify(&self, event: &Event);
}

impl<F> Subscriber for F
where
    F: Fn(&Event) + Send + Sync,
{
    fn notify(&self, event: &Event) {
        self(event);
    }
}

/// Fans events out to subscribers.
#[derive(Default)]
pub struct Notifications {
    subscribers: RwLock<Vec<Arc<dyn Subscriber>>>,
}

impl fmt::Debug for Notifications {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Notifications")
            .field("subscribers", &self.subscribers.read().len())
            .finish()
    }
}

impl Notifications {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A hub with [`LogSubscriber`] already attached.
    #[must_use]
    pub fn with_log_subscriber() -> Self {
        let notifications = Self::new();
        notifications.subscribe(Arc::new(LogSubscriber));
        notifications
    }

    pub fn subscribe(&self, subscriber: Arc<dyn Subscriber>) {
        self.subscribers.write().push(subscriber);
    }

    pub fn publish(&self, event: &Event) {
        let subscribers = self.subscribers.read().clone();
        for subscriber in subscribers {
            subscriber.notify(event);
        }
    }
}

fn millis(duration: Duration) -> String {
    format!("{:.1}ms", duration.as_secs_f64() * 1000.0)
}

/// Logs deliveries at INFO and processing at DEBUG.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogSubscriber;

impl Subscriber for LogSubscriber {
    fn notify(&self, event: &Event) {
        match event {
            Event::Deliver { to, body, duration, .. } => {
                outgoing!(
                    level = INFO,
                    "Sent text message to {} ({})",
                    to.join(", "),
                    millis(*duration)
                );
                if let Some(body) = body {
                    outgoing!(level = DEBUG, "{body}");
                }
            }
            Event::Process {
                texter,
                action,
                duration,
                ..
            } => {
                internal!(
                    level = DEBUG,
                    "{texter}#{action}: processed outbound text message in {}",
                    millis(*duration)
                );
            }
        }
    }
}
