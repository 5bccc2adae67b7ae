//! Assertions for tests of code that sends texts.
//!
//! ```ignore
//! let harness = TestHarness::new();
//! let texter = harness.install(Texter::builder("NotifierTexter")).build()?;
//!
//! harness
//!     .assert_messages_during(1, texter.call("welcome", args)?.deliver_now())
//!     .await?;
//! ```

use std::{future::Future, sync::Arc};

use texter_common::{Message, Result};
use texter_transport::Deliveries;

use crate::{
    catalog::TexterCatalog,
    job::{EnqueuedJob, MemoryJobQueue},
    texter::TexterBuilder,
};

/// Recorded deliveries and an in-memory job queue shared with the texters a
/// test builds.
#[derive(Debug, Clone, Default)]
pub struct TestHarness {
    deliveries: Deliveries,
    queue: MemoryJobQueue,
}

impl TestHarness {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Point `builder` at this harness's test transport and job queue.
    #[must_use]
    pub fn install(&self, builder: TexterBuilder) -> TexterBuilder {
        builder
            .test_transport(&self.deliveries)
            .job_queue(Arc::new(self.queue.clone()))
    }

    #[must_use]
    pub const fn deliveries(&self) -> &Deliveries {
        &self.deliveries
    }

    #[must_use]
    pub const fn queue(&self) -> &MemoryJobQueue {
        &self.queue
    }

    #[must_use]
    pub fn messages(&self) -> Vec<Message> {
        self.deliveries.messages()
    }

    #[must_use]
    pub fn enqueued(&self) -> Vec<EnqueuedJob> {
        self.queue.jobs()
    }

    /// Run every enqueued job against `catalog`.
    ///
    /// # Errors
    /// As [`MemoryJobQueue::perform_enqueued`].
    pub async fn perform_enqueued(&self, catalog: &TexterCatalog) -> Result<usize> {
        self.queue.perform_enqueued(catalog).await
    }

    /// # Panics
    /// Unless exactly `expected` messages have been delivered.
    #[track_caller]
    pub fn assert_messages(&self, expected: usize) {
        let actual = self.deliveries.len();
        assert!(
            actual == expected,
            "{expected} text messages expected, but {actual} were sent"
        );
    }

    /// # Panics
    /// If any message has been delivered.
    #[track_caller]
    pub fn assert_no_messages(&self) {
        self.assert_messages(0);
    }

    /// Await `during` and hand back its output.
    ///
    /// # Panics
    /// Unless it delivered exactly `expected` messages.
    #[track_caller]
    pub fn assert_messages_during<F: Future>(
        &self,
        expected: usize,
        during: F,
    ) -> impl Future<Output = F::Output> {
        let location = std::panic::Location::caller();
        let before = self.deliveries.len();
        async move {
            let output = during.await;
            let actual = self.deliveries.len().saturating_sub(before);
            assert!(
                actual == expected,
                "{expected} text messages expected, but {actual} were sent (at {location})"
            );
            output
        }
    }

    /// # Panics
    /// If `during` delivered anything.
    #[track_caller]
    pub fn assert_no_messages_during<F: Future>(
        &self,
        during: F,
    ) -> impl Future<Output = F::Output> {
        self.assert_messages_during(0, during)
    }

    /// # Panics
    /// Unless exactly `expected` delivery jobs are queued.
    #[track_caller]
    pub fn assert_enqueued_messages(&self, expected: usize) {
        let actual = self.queue.len();
        assert!(
            actual == expected,
            "{expected} text messages expected to be enqueued, but {actual} were"
        );
    }

    /// # Panics
    /// If any delivery job is queued.
    #[track_caller]
    pub fn assert_no_enqueued_messages(&self) {
        self.assert_enqueued_messages(0);
    }

    /// Await `during` and hand back its output.
    ///
    /// # Panics
    /// Unless it enqueued exactly `expected` delivery jobs.
    #[track_caller]
    pub fn assert_enqueued_messages_during<F: Future>(
        &self,
        expected: usize,
        during: F,
    ) -> impl Future<Output = F::Output> {
        let location = std::panic::Location::caller();
        let before = self.queue.len();
        async move {
            let output = during.await;
            let actual = self.queue.len().saturating_sub(before);
            assert!(
                actual == expected,
                "{expected} text messages expected to be enqueued, but {actual} were (at {location})"
            );
            output
        }
    }

    /// # Panics
    /// If `during` enqueued anything.
    #[track_caller]
    pub fn assert_no_enqueued_messages_during<F: Future>(
        &self,
        during: F,
    ) -> impl Future<Output = F::Output> {
        self.assert_enqueued_messages_during(0, during)
    }
}
