use std::{fmt, sync::Arc};

use once_cell::sync::OnceCell;
use serde_json::Value;
use texter_common::{Delivered, Message, Response, Result, TexterError};
use ulid::Ulid;

use crate::{
    job::{DeliverLaterOptions, DeliveryJob, DeliveryMethodName},
    texter::Texter,
};

/// What a `deliver_now` call ended with.
#[derive(Debug, Clone)]
pub enum DeliveryOutcome {
    /// The delivery went through, or was skipped or suppressed by the
    /// message's policy flags.
    Delivered(Arc<Message>),
    /// The transport's raw response, from an unchecked delivery whose
    /// transport asks to return it.
    Response(Response),
    /// A rescue handler swallowed the delivery error.
    Rescued,
}

impl DeliveryOutcome {
    #[must_use]
    pub const fn message(&self) -> Option<&Arc<Message>> {
        match self {
            Self::Delivered(message) => Some(message),
            _ => None,
        }
    }

    #[must_use]
    pub const fn is_rescued(&self) -> bool {
        matches!(self, Self::Rescued)
    }
}

/// The lazy handle returned by [`Texter::call`].
///
/// The action runs at most once, the first time the message is needed.
/// Delivering later is only possible while that has not happened, because
/// the job replays the action from its name and arguments alone.
pub struct MessageDelivery {
    texter: Arc<Texter>,
    action: String,
    args: Vec<Value>,
    message: OnceCell<Arc<Message>>,
}

impl fmt::Debug for MessageDelivery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MessageDelivery")
            .field("texter", &self.texter.name())
            .field("action", &self.action)
            .field("args", &self.args)
            .field("processed", &self.is_processed())
            .finish()
    }
}

impl MessageDelivery {
    pub(crate) fn new(texter: Arc<Texter>, action: &str, args: Vec<Value>) -> Self {
        Self {
            texter,
            action: action.to_string(),
            args,
            message: OnceCell::new(),
        }
    }

    #[must_use]
    pub const fn texter(&self) -> &Arc<Texter> {
        &self.texter
    }

    #[must_use]
    pub fn action(&self) -> &str {
        &self.action
    }

    #[must_use]
    pub fn args(&self) -> &[Value] {
        &self.args
    }

    /// Whether the action has run.
    #[must_use]
    pub fn is_processed(&self) -> bool {
        self.message.get().is_some()
    }

    /// Run the action if it has not run yet, and return its message.
    ///
    /// Concurrent callers wait for a single run. A failed run leaves the
    /// handle unprocessed.
    ///
    /// # Errors
    /// Any processing error the texter's rescue handlers did not swallow.
    pub fn message(&self) -> Result<Arc<Message>> {
        self.message
            .get_or_try_init(|| {
                self.texter
                    .process(&self.action, &self.args)
                    .map(Arc::new)
            })
            .cloned()
    }

    /// # Errors
    /// As [`MessageDelivery::message`].
    pub fn to(&self) -> Result<Vec<String>> {
        Ok(self.message()?.to().to_vec())
    }

    /// # Errors
    /// As [`MessageDelivery::message`].
    pub fn body(&self) -> Result<Option<String>> {
        Ok(self.message()?.body().map(str::to_string))
    }

    /// # Errors
    /// As [`MessageDelivery::message`].
    pub fn charset(&self) -> Result<String> {
        Ok(self.message()?.charset().to_string())
    }

    /// Deliver now, honouring `perform_deliveries` and
    /// `raise_delivery_errors`.
    ///
    /// # Errors
    /// Processing errors, and delivery errors no rescue handler swallowed.
    pub async fn deliver_now(&self) -> Result<DeliveryOutcome> {
        let message = self.message()?;
        let result = message.deliver().await.map(|_| ());

        Ok(match self.texter.handle_exceptions(result)? {
            Some(()) => DeliveryOutcome::Delivered(message),
            None => DeliveryOutcome::Rescued,
        })
    }

    /// Deliver now, ignoring `perform_deliveries` and
    /// `raise_delivery_errors`.
    ///
    /// # Errors
    /// Processing errors, and delivery errors no rescue handler swallowed.
    pub async fn deliver_now_unchecked(&self) -> Result<DeliveryOutcome> {
        let message = self.message()?;
        let result = message.deliver_unchecked().await.map(|delivered| match delivered {
            Delivered::Response(response) => Some(response),
            Delivered::Message(_) => None,
        });

        Ok(match self.texter.handle_exceptions(result)? {
            Some(Some(response)) => DeliveryOutcome::Response(response),
            Some(None) => DeliveryOutcome::Delivered(message),
            None => DeliveryOutcome::Rescued,
        })
    }

    /// Enqueue a job that delivers with [`MessageDelivery::deliver_now`].
    ///
    /// # Errors
    /// [`TexterError::PrematureMaterialization`] if the message was already
    /// accessed, or a [`TexterError::Job`] if the queue refused the job.
    pub async fn deliver_later(&self, options: DeliverLaterOptions) -> Result<Ulid> {
        self.enqueue_delivery(DeliveryMethodName::DeliverNow, options)
            .await
    }

    /// Enqueue a job that delivers with
    /// [`MessageDelivery::deliver_now_unchecked`].
    ///
    /// # Errors
    /// As [`MessageDelivery::deliver_later`].
    pub async fn deliver_later_unchecked(&self, options: DeliverLaterOptions) -> Result<Ulid> {
        self.enqueue_delivery(DeliveryMethodName::DeliverNowUnchecked, options)
            .await
    }

    async fn enqueue_delivery(
        &self,
        delivery_method: DeliveryMethodName,
        options: DeliverLaterOptions,
    ) -> Result<Ulid> {
        if self.is_processed() {
            return Err(TexterError::PrematureMaterialization);
        }

        let job = DeliveryJob {
            texter: self.texter.name().to_string(),
            action: self.action.clone(),
            delivery_method,
            args: self.args.clone(),
        };

        job.enqueue(
            self.texter.job_queue(),
            &options,
            &self.texter.deliver_later_queue_name(),
        )
        .await
    }
}
