//! End to end: model publish, prospect generation, orders.

use std::time::Duration;

use motorshop_pipeline::bus::{Event, Publisher};
use motorshop_pipeline::catalog::{CatalogEntry, Prospect};
use motorshop_pipeline::store::{ObjectStore, RecordsExt};
use motorshop_pipeline::worker::WorkerThread;

use crate::support::{pipeline, prospect_event};

#[test]
fn published_model_gets_a_prospect_sheet() {
    let (pipeline, _clock) = pipeline();
    let receipt = pipeline
        .catalog_service()
        .publish_model(Prospect::new("SuperBike", "2022"))
        .unwrap();
    assert_eq!(receipt.message, "Message put in model-design");

    let entry: CatalogEntry = pipeline.table().get_record("SuperBike").unwrap().unwrap();
    assert_eq!(entry.model, "2022");

    let worker = pipeline.prospect_worker().with_poll_timeout(Duration::ZERO);
    assert_eq!(worker.run_once().unwrap().acked, 1);

    let sheet = pipeline
        .objects()
        .get_object("prospect/SuperBike-2022.pdf")
        .unwrap();
    assert!(sheet.starts_with(b"%PDF-"));
}

#[test]
fn republished_model_is_acked_as_duplicate() {
    let (pipeline, _clock) = pipeline();
    let service = pipeline.catalog_service();
    service.publish_model(Prospect::new("SuperBike", "2022")).unwrap();
    service.publish_model(Prospect::new("SuperBike", "2022")).unwrap();

    let worker = pipeline
        .prospect_worker()
        .with_batch_size(10)
        .with_poll_timeout(Duration::ZERO);
    let result = worker.run_once().unwrap();
    assert_eq!(result.acked, 1);
    assert_eq!(result.duplicates, 1);
    assert_eq!(pipeline.objects().list("prospect/").unwrap().len(), 1);
}

#[test]
fn malformed_prospect_ends_up_dead_lettered() {
    let (pipeline, clock) = pipeline();
    pipeline
        .publisher()
        .publish(Event::with_id("bad", "not a prospect"))
        .unwrap();

    let worker = pipeline.prospect_worker().with_poll_timeout(Duration::ZERO);
    for _ in 0..3 {
        assert_eq!(worker.run_once().unwrap().abandoned, 1);
        clock.advance(pipeline.queue().visibility_timeout());
    }
    assert_eq!(worker.run_once().unwrap().received, 0);
    assert!(pipeline.dead_letters().find_event("bad").unwrap().is_some());
    assert!(pipeline.objects().is_empty().unwrap());
}

#[test]
fn dead_letters_expire_after_retention() {
    let (pipeline, clock) = pipeline();
    pipeline
        .publisher()
        .publish(prospect_event("e1", "", "2022"))
        .unwrap();

    let worker = pipeline.prospect_worker().with_poll_timeout(Duration::ZERO);
    for _ in 0..3 {
        worker.run_once().unwrap();
        clock.advance(pipeline.queue().visibility_timeout());
    }
    pipeline.queue().sweep().unwrap();
    assert_eq!(pipeline.dead_letters().len().unwrap(), 1);

    clock.advance(pipeline.dead_letters().retention());
    assert_eq!(pipeline.dead_letters().purge_expired().unwrap(), 1);
    assert!(pipeline.dead_letters().is_empty().unwrap());
}

#[test]
fn background_worker_and_orders() {
    let (pipeline, _clock) = pipeline();
    let worker = WorkerThread::spawn(
        pipeline
            .prospect_worker()
            .with_poll_timeout(Duration::from_millis(10)),
    );

    pipeline
        .catalog_service()
        .publish_model(Prospect::new("SuperBike", "2022"))
        .unwrap();

    let deadline = std::time::Instant::now() + Duration::from_secs(5);
    while pipeline.objects().is_empty().unwrap() && std::time::Instant::now() < deadline {
        std::thread::sleep(Duration::from_millis(5));
    }
    let stats = worker.stop();
    assert_eq!(stats.acked, 1);

    let response = pipeline
        .order_handler()
        .handle_order(br#"{"name":"SuperBike","quantity":3}"#);
    assert_eq!(response.status, 200);
    assert_eq!(response.body["model"], "SUPERBIKE");
}
