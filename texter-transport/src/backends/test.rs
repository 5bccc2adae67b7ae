use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use texter_common::{Message, Response, Result, Settings, Transport, check_delivery_params};
use tokio::{sync::Notify, time::error::Elapsed};

use crate::registry::typed_settings;

/// Records every message handed to a [`TestTransport`].
///
/// Cloning shares the underlying list, so a test keeps one handle and gives
/// another to the transport.
#[derive(Debug, Clone, Default)]
pub struct Deliveries {
    messages: Arc<RwLock<Vec<Message>>>,
    notify: Arc<Notify>,
}

impl Deliveries {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, message: Message) {
        self.messages.write().push(message);
        self.notify.notify_waiters();
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.messages.read().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// A copy of everything recorded so far, oldest first.
    #[must_use]
    pub fn messages(&self) -> Vec<Message> {
        self.messages.read().clone()
    }

    #[must_use]
    pub fn last(&self) -> Option<Message> {
        self.messages.read().last().cloned()
    }

    pub fn clear(&self) {
        self.messages.write().clear();
    }

    /// Swap the recorded messages for `messages`, returning the old ones.
    pub fn replace(&self, messages: Vec<Message>) -> Vec<Message> {
        std::mem::replace(&mut *self.messages.write(), messages)
    }

    /// Wait until at least `expected` messages have been recorded
    ///
    /// # Errors
    /// If `timeout` passes first
    pub async fn wait_for_count(
        &self,
        expected: usize,
        timeout: Duration,
    ) -> std::result::Result<(), Elapsed> {
        tokio::time::timeout(timeout, async {
            loop {
                let notified = self.notify.notified();
                if self.len() >= expected {
                    return;
                }
                notified.await;
            }
        })
        .await
    }
}

/// Settings for [`TestTransport`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct TestSettings {
    pub return_response: bool,
}

/// Validates messages and records them instead of sending.
#[derive(Debug, Clone)]
pub struct TestTransport {
    deliveries: Deliveries,
    settings: TestSettings,
}

impl TestTransport {
    pub const NAME: &'static str = "test";

    #[must_use]
    pub const fn new(deliveries: Deliveries, settings: TestSettings) -> Self {
        Self {
            deliveries,
            settings,
        }
    }

    #[must_use]
    pub const fn deliveries(&self) -> &Deliveries {
        &self.deliveries
    }

    /// A registry constructor recording into `deliveries`.
    pub fn factory(
        deliveries: Deliveries,
    ) -> impl Fn(&Settings) -> Result<Arc<dyn Transport>> + Send + Sync + 'static {
        move |settings: &Settings| {
            let settings = typed_settings::<TestSettings>(Self::NAME, settings)?;
            Ok(Arc::new(Self::new(deliveries.clone(), settings)) as Arc<dyn Transport>)
        }
    }
}

#[async_trait]
impl Transport for TestTransport {
    async fn deliver(&self, message: &Message) -> Result<Response> {
        check_delivery_params(message)?;
        self.deliveries.push(message.detached());
        Ok(Response::Null)
    }

    fn return_response(&self) -> bool {
        self.settings.return_response
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use texter_common::TexterError;

    use super::*;

    fn message(body: &str) -> Message {
        let mut message = Message::new();
        message.set_to("+1555");
        message.set_body(body);
        message
    }

    #[tokio::test]
    async fn test_records_valid_messages_only() {
        let deliveries = Deliveries::new();
        let transport = TestTransport::new(deliveries.clone(), TestSettings::default());

        transport.deliver(&message("hi")).await.unwrap();
        let error = transport.deliver(&message("")).await.unwrap_err();

        assert!(matches!(error, TexterError::MissingBody));
        assert_eq!(deliveries.len(), 1);
        assert_eq!(deliveries.last().unwrap().body(), Some("hi"));
    }

    #[tokio::test]
    async fn test_recorded_messages_do_not_keep_transport_alive() {
        let deliveries = Deliveries::new();
        let transport: Arc<dyn Transport> =
            Arc::new(TestTransport::new(deliveries.clone(), TestSettings::default()));
        let weak = Arc::downgrade(&transport);

        let mut sent = message("hi");
        sent.set_transport(Arc::clone(&transport));
        sent.deliver().await.unwrap();
        drop(sent);
        drop(transport);

        assert!(weak.upgrade().is_none());
        let recorded = deliveries.last().unwrap();
        assert!(recorded.transport().is_none());
        assert_eq!(recorded.body(), Some("hi"));
        assert_eq!(recorded.to(), ["+1555"]);
    }

    #[test]
    fn test_clear_and_replace() {
        let deliveries = Deliveries::new();
        deliveries.push(message("one"));
        deliveries.push(message("two"));

        let old = deliveries.replace(vec![message("three")]);
        assert_eq!(old.len(), 2);
        assert_eq!(deliveries.messages()[0].body(), Some("three"));

        deliveries.clear();
        assert!(deliveries.is_empty());
    }

    #[tokio::test]
    async fn test_wait_for_count() {
        let deliveries = Deliveries::new();
        let writer = deliveries.clone();

        let handle = tokio::spawn(async move {
            writer.push(message("one"));
            writer.push(message("two"));
        });

        deliveries
            .wait_for_count(2, Duration::from_secs(5))
            .await
            .unwrap();
        handle.await.unwrap();

        assert!(
            deliveries
                .wait_for_count(3, Duration::from_millis(10))
                .await
                .is_err()
        );
    }

    #[test]
    fn test_factory_rejects_bad_settings() {
        let factory = TestTransport::factory(Deliveries::new());
        let mut settings = Settings::new();
        settings.insert("return_response".to_string(), "yes".into());

        assert!(matches!(
            factory(&settings),
            Err(TexterError::Settings { .. })
        ));
    }
}
