#![allow(clippy::expect_used, clippy::unwrap_used)]

use std::{
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use chrono::Utc;
use pretty_assertions::assert_eq;
use serde_json::json;
use texter_common::{ErrorKind, JobError, TexterError};
use texter_delivery::{
    DeliverLaterOptions, DeliveryJob, DeliveryMethodName, TestHarness, TextOptions, Texter,
    TexterCatalog, perform_payload,
};

fn notifier(harness: &TestHarness) -> Arc<Texter> {
    harness
        .install(Texter::builder("NotifierTexter"))
        .action("welcome", |context| {
            let to: String = context.arg(0)?;
            context.text(TextOptions::new().to(to).body("Welcome"))?;
            Ok(())
        })
        .build()
        .unwrap()
}

#[tokio::test]
async fn test_deliver_later_enqueues_one_job() {
    let harness = TestHarness::new();
    let texter = notifier(&harness);

    let delivery = texter.call("welcome", vec![json!("+15550001")]).unwrap();
    let id = harness
        .assert_enqueued_messages_during(1, delivery.deliver_later(DeliverLaterOptions::new()))
        .await
        .unwrap();
    harness.assert_no_messages();
    assert!(!delivery.is_processed());

    let jobs = harness.enqueued();
    assert_eq!(jobs[0].id, id);
    assert_eq!(jobs[0].schedule.queue, "texters");
    assert_eq!(jobs[0].schedule.run_at, None);
    assert_eq!(
        DeliveryJob::from_payload(&jobs[0].payload).unwrap(),
        DeliveryJob {
            texter: "NotifierTexter".to_string(),
            action: "welcome".to_string(),
            delivery_method: DeliveryMethodName::DeliverNow,
            args: vec![json!("+15550001")],
        }
    );
}

#[tokio::test]
async fn test_deliver_later_after_access_is_refused() {
    let harness = TestHarness::new();
    let texter = notifier(&harness);

    let delivery = texter.call("welcome", vec![json!("+15550001")]).unwrap();
    delivery.body().unwrap();

    let error = delivery
        .deliver_later(DeliverLaterOptions::new())
        .await
        .unwrap_err();
    assert_eq!(error.kind(), ErrorKind::PrematureMaterialization);
    harness.assert_no_enqueued_messages();
}

#[tokio::test]
async fn test_queue_and_schedule_options() {
    let harness = TestHarness::new();
    let texter = notifier(&harness);
    texter.set_deliver_later_queue_name("sms");

    let at = Utc::now() + chrono::TimeDelta::days(1);
    texter
        .call("welcome", vec![json!("+1")])
        .unwrap()
        .deliver_later_unchecked(
            DeliverLaterOptions::new()
                .wait(Duration::from_secs(5))
                .wait_until(at),
        )
        .await
        .unwrap();
    texter
        .call("welcome", vec![json!("+2")])
        .unwrap()
        .deliver_later(DeliverLaterOptions::new().queue("urgent"))
        .await
        .unwrap();

    let sms = harness.queue().jobs_on("sms");
    assert_eq!(sms.len(), 1);
    assert_eq!(sms[0].schedule.run_at, Some(at));
    assert_eq!(sms[0].payload["delivery_method"], json!("deliver_now!"));
    assert_eq!(harness.queue().jobs_on("urgent").len(), 1);

    let catalog = TexterCatalog::new();
    catalog.register(Arc::clone(&texter));
    let performed = harness.queue().perform_due(&catalog, Utc::now()).await.unwrap();
    assert_eq!(performed, 1);
    harness.assert_messages(1);
    harness.assert_enqueued_messages(1);
}

#[tokio::test]
async fn test_job_replays_delivery() {
    let harness = TestHarness::new();
    let texter = notifier(&harness);
    let catalog = TexterCatalog::new();
    catalog.register(Arc::clone(&texter));

    texter
        .call("welcome", vec![json!("+15550001")])
        .unwrap()
        .deliver_later(DeliverLaterOptions::new())
        .await
        .unwrap();

    let performed = harness.perform_enqueued(&catalog).await.unwrap();
    assert_eq!(performed, 1);
    harness.assert_no_enqueued_messages();
    harness.assert_messages(1);
    assert_eq!(harness.messages()[0].to(), ["+15550001"]);
}

#[tokio::test]
async fn test_unknown_texter_is_not_rescued() {
    let job = DeliveryJob {
        texter: "GoneTexter".to_string(),
        action: "welcome".to_string(),
        delivery_method: DeliveryMethodName::DeliverNow,
        args: Vec::new(),
    };

    let error = job.perform(&TexterCatalog::new()).await.unwrap_err();
    assert!(matches!(error, TexterError::UnresolvableTexterClass(ref name) if name == "GoneTexter"));
}

#[tokio::test]
async fn test_job_errors_go_to_texter_rescue() {
    let harness = TestHarness::new();
    let rescued = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&rescued);

    let texter = harness
        .install(Texter::builder("NotifierTexter"))
        .action("blank", |context| {
            context.text(TextOptions::new().to("+1").body(""))?;
            Ok(())
        })
        .rescue_if(
            |error| error.is_validation() || error.kind() == ErrorKind::Job,
            move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(())
            },
        )
        .build()
        .unwrap();
    let catalog = TexterCatalog::new();
    catalog.register(Arc::clone(&texter));

    let job = DeliveryJob {
        texter: "NotifierTexter".to_string(),
        action: "blank".to_string(),
        delivery_method: DeliveryMethodName::DeliverNowUnchecked,
        args: Vec::new(),
    };
    job.perform(&catalog).await.unwrap();
    assert_eq!(rescued.load(Ordering::SeqCst), 1);

    // Undecodable, but still names the texter.
    perform_payload(&json!({ "texter": "NotifierTexter", "action": 7 }), &catalog)
        .await
        .unwrap();
    assert_eq!(rescued.load(Ordering::SeqCst), 2);

    let error = perform_payload(&json!({ "texter": "GoneTexter" }), &catalog)
        .await
        .unwrap_err();
    assert!(matches!(error, TexterError::Job(JobError::Decode(_))));
    harness.assert_no_messages();
}

#[tokio::test]
async fn test_unrescued_job_error_propagates() {
    let harness = TestHarness::new();
    let texter = notifier(&harness);
    let catalog = TexterCatalog::new();
    catalog.register(texter);

    let job = DeliveryJob {
        texter: "NotifierTexter".to_string(),
        action: "welcome".to_string(),
        delivery_method: DeliveryMethodName::DeliverNow,
        args: Vec::new(),
    };

    let error = job.perform(&catalog).await.unwrap_err();
    assert_eq!(error.kind(), ErrorKind::Argument);
}
