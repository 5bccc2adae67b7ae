//! Deferred delivery.
//!
//! `deliver_later` turns a delivery into a [`DeliveryJob`]: plain data naming
//! the texter, the action, the arguments and which delivery to run. The job
//! is encoded as JSON and handed to a [`JobQueue`]. Whatever runs the queue
//! later feeds the payload back through [`perform_payload`], which rebuilds
//! the delivery from scratch through a [`TexterCatalog`].

pub mod memory;

use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use texter_common::{JobError, Result, TexterError, incoming, internal};
use ulid::Ulid;

pub use self::memory::MemoryJobQueue;
use crate::{catalog::TexterCatalog, texter::Texter};

/// Which delivery a job runs once its message has been rebuilt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DeliveryMethodName {
    #[serde(rename = "deliver_now")]
    DeliverNow,
    #[serde(rename = "deliver_now!")]
    DeliverNowUnchecked,
}

/// Scheduling options for `deliver_later`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeliverLaterOptions {
    /// Run no sooner than this long from now.
    pub wait: Option<Duration>,
    /// Run no sooner than this. Wins over `wait`.
    pub wait_until: Option<DateTime<Utc>>,
    /// Queue to use instead of the texter's deliver-later queue.
    pub queue: Option<String>,
}

impl DeliverLaterOptions {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub const fn wait(mut self, wait: Duration) -> Self {
        self.wait = Some(wait);
        self
    }

    #[must_use]
    pub const fn wait_until(mut self, at: DateTime<Utc>) -> Self {
        self.wait_until = Some(at);
        self
    }

    #[must_use]
    pub fn queue(mut self, queue: impl Into<String>) -> Self {
        self.queue = Some(queue.into());
        self
    }
}

/// Where and when a job should run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Schedule {
    pub queue: String,
    /// `None` runs as soon as possible.
    pub run_at: Option<DateTime<Utc>>,
}

impl Schedule {
    /// # Errors
    /// [`JobError::InvalidSchedule`] if `wait` is too large to add to `now`.
    pub fn from_options(
        options: &DeliverLaterOptions,
        default_queue: &str,
        now: DateTime<Utc>,
    ) -> Result<Self> {
        let run_at = match (options.wait_until, options.wait) {
            (Some(at), _) => Some(at),
            (None, Some(wait)) => {
                let wait = TimeDelta::from_std(wait)
                    .map_err(|e| JobError::InvalidSchedule(e.to_string()))?;
                Some(now.checked_add_signed(wait).ok_or_else(|| {
                    JobError::InvalidSchedule(format!("{wait} from {now} is out of range"))
                })?)
            }
            (None, None) => None,
        };

        Ok(Self {
            queue: options
                .queue
                .clone()
                .unwrap_or_else(|| default_queue.to_string()),
            run_at,
        })
    }

    #[must_use]
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.run_at.is_none_or(|at| at <= now)
    }
}

/// A job as a queue stores it.
#[derive(Debug, Clone, PartialEq)]
pub struct EnqueuedJob {
    pub id: Ulid,
    /// The JSON encoding of a [`DeliveryJob`].
    pub payload: Value,
    pub schedule: Schedule,
    pub enqueued_at: DateTime<Utc>,
}

/// Somewhere to put jobs for a background runner.
#[async_trait]
pub trait JobQueue: Send + Sync {
    ///
    /// Store `job` for later execution
    ///
    /// # Errors
    /// [`JobError::Rejected`] if the queue does not accept it.
    ///
    async fn enqueue(&self, job: EnqueuedJob) -> Result<()>;
}

/// Everything needed to replay a delivery in another process.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryJob {
    /// Registered name of the texter, as used by [`TexterCatalog`].
    pub texter: String,
    pub action: String,
    pub delivery_method: DeliveryMethodName,
    pub args: Vec<Value>,
}

impl DeliveryJob {
    /// # Errors
    /// [`JobError::Encode`]
    pub fn to_payload(&self) -> Result<Value> {
        serde_json::to_value(self).map_err(|e| JobError::Encode(e).into())
    }

    /// # Errors
    /// [`JobError::Decode`]
    pub fn from_payload(payload: &Value) -> Result<Self> {
        Self::deserialize(payload).map_err(|e| JobError::Decode(e).into())
    }

    /// Hand the job to `queue` and return its id.
    ///
    /// # Errors
    /// Scheduling and encoding errors, or the queue's refusal.
    pub async fn enqueue(
        &self,
        queue: &dyn JobQueue,
        options: &DeliverLaterOptions,
        default_queue: &str,
    ) -> Result<Ulid> {
        let now = Utc::now();
        let job = EnqueuedJob {
            id: Ulid::new(),
            payload: self.to_payload()?,
            schedule: Schedule::from_options(options, default_queue, now)?,
            enqueued_at: now,
        };
        let id = job.id;
        let queue_name = job.schedule.queue.clone();

        queue.enqueue(job).await?;

        internal!(
            level = DEBUG,
            "Enqueued {}#{} as {id} on {queue_name}",
            self.texter,
            self.action
        );
        Ok(id)
    }

    /// Rebuild the delivery and run it.
    ///
    /// Failures after the texter has been found go to its rescue handlers.
    ///
    /// # Errors
    /// [`TexterError::UnresolvableTexterClass`] if the catalog does not know
    /// the texter, or any error its rescue handlers did not swallow.
    pub async fn perform(&self, catalog: &TexterCatalog) -> Result<()> {
        let texter = catalog
            .get(&self.texter)
            .ok_or_else(|| TexterError::UnresolvableTexterClass(self.texter.clone()))?;

        incoming!(
            level = DEBUG,
            "Performing {}#{} with {:?}",
            self.texter,
            self.action,
            self.delivery_method
        );

        match self.replay(&texter).await {
            Ok(()) => Ok(()),
            Err(error) => texter.handle_exception(error),
        }
    }

    async fn replay(&self, texter: &Arc<Texter>) -> Result<()> {
        let delivery = texter.call(&self.action, self.args.clone())?;
        match self.delivery_method {
            DeliveryMethodName::DeliverNow => delivery.deliver_now().await?,
            DeliveryMethodName::DeliverNowUnchecked => delivery.deliver_now_unchecked().await?,
        };
        Ok(())
    }
}

/// Decode and perform a stored payload.
///
/// If the payload does not decode but still names a known texter, the
/// decoding error goes to that texter's rescue handlers.
///
/// # Errors
/// As [`DeliveryJob::perform`], or the decoding error when no texter can be
/// recovered from the payload.
pub async fn perform_payload(payload: &Value, catalog: &TexterCatalog) -> Result<()> {
    match DeliveryJob::from_payload(payload) {
        Ok(job) => job.perform(catalog).await,
        Err(error) => {
            let texter = payload
                .get("texter")
                .and_then(Value::as_str)
                .and_then(|name| catalog.get(name));

            match texter {
                Some(texter) => texter.handle_exception(error),
                None => Err(error),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;

    fn job() -> DeliveryJob {
        DeliveryJob {
            texter: "NotifierTexter".to_string(),
            action: "welcome".to_string(),
            delivery_method: DeliveryMethodName::DeliverNowUnchecked,
            args: vec![json!("+1555"), json!({ "name": "Ada" })],
        }
    }

    #[test]
    fn test_payload_shape() {
        assert_eq!(
            job().to_payload().unwrap(),
            json!({
                "texter": "NotifierTexter",
                "action": "welcome",
                "delivery_method": "deliver_now!",
                "args": ["+1555", { "name": "Ada" }],
            })
        );
        assert_eq!(
            DeliveryJob::from_payload(&job().to_payload().unwrap()).unwrap(),
            job()
        );
    }

    #[test]
    fn test_undecodable_payload() {
        let error = DeliveryJob::from_payload(&json!({ "texter": "NotifierTexter" })).unwrap_err();
        assert!(matches!(error, TexterError::Job(JobError::Decode(_))));
    }

    #[test]
    fn test_schedule_defaults_to_texter_queue() {
        let now = Utc::now();
        let schedule = Schedule::from_options(&DeliverLaterOptions::new(), "texters", now).unwrap();

        assert_eq!(schedule.queue, "texters");
        assert_eq!(schedule.run_at, None);
        assert!(schedule.is_due(now));
    }

    #[test]
    fn test_schedule_wait_until_wins() {
        let now = Utc::now();
        let at = now + TimeDelta::hours(10);
        let options = DeliverLaterOptions::new()
            .wait(Duration::from_secs(60))
            .wait_until(at)
            .queue("urgent");

        let schedule = Schedule::from_options(&options, "texters", now).unwrap();
        assert_eq!(schedule.queue, "urgent");
        assert_eq!(schedule.run_at, Some(at));
        assert!(!schedule.is_due(now));
        assert!(schedule.is_due(at));
    }

    #[test]
    fn test_schedule_wait() {
        let now = Utc::now();
        let options = DeliverLaterOptions::new().wait(Duration::from_secs(3600));

        let schedule = Schedule::from_options(&options, "texters", now).unwrap();
        assert_eq!(schedule.run_at, Some(now + TimeDelta::hours(1)));
    }

    #[test]
    fn test_schedule_wait_out_of_range() {
        let options = DeliverLaterOptions::new().wait(Duration::MAX);
        let error = Schedule::from_options(&options, "texters", Utc::now()).unwrap_err();
        assert!(matches!(error, TexterError::Job(JobError::InvalidSchedule(_))));
    }
}
