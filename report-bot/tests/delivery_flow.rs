//! Command handling and delivery against fake builder and transport.

mod common;

use chrono::{DateTime, Local, TimeZone};
use common::{FakeBuilder, FakeTransport, FAKE_REPORT_BYTES};
use report_bot::delivery::{
    CommandListener, CommandOutcome, ReportCommand, ReportDelivery, ReportScheduler,
};
use report_bot::telegram::{InboundMessage, InboundUpdate, MessageSource, TransportError};
use report_common::ScheduleConfig;
use std::sync::atomic::Ordering;
use std::sync::{Arc, Mutex};
use std::time::Duration;

const CHANNEL: i64 = -1001234;
const USER: i64 = 42;

struct Harness {
    builder: Arc<FakeBuilder>,
    transport: Arc<FakeTransport>,
    delivery: Arc<ReportDelivery>,
    listener: Arc<CommandListener>,
    _dir: tempfile::TempDir,
}

fn harness_with(
    builder: impl FnOnce(&std::path::Path) -> FakeBuilder,
    transport: FakeTransport,
) -> Harness {
    let dir = tempfile::tempdir().unwrap();
    let builder = Arc::new(builder(dir.path()));
    let transport = Arc::new(transport);
    let delivery = Arc::new(ReportDelivery::new(builder.clone(), transport.clone()));
    let listener = Arc::new(CommandListener::new(
        ReportCommand::new("report", "(?i)report").unwrap(),
        vec![CHANNEL, USER],
        "No permissions",
        delivery.clone(),
    ));

    Harness {
        builder,
        transport,
        delivery,
        listener,
        _dir: dir,
    }
}

fn harness() -> Harness {
    harness_with(|dir| FakeBuilder::new(dir), FakeTransport::default())
}

fn message(chat_id: i64, text: &str, source: MessageSource) -> InboundMessage {
    InboundMessage {
        chat_id,
        text: Some(text.to_string()),
        source,
        username: None,
    }
}

#[tokio::test]
async fn test_channel_command_delivers_report() {
    let h = harness();

    let outcome = h
        .listener
        .handle(&message(CHANNEL, "/report", MessageSource::ChannelPost))
        .await;

    assert_eq!(
        outcome,
        CommandOutcome::Delivered("2026-10-16_report.xlsx".into())
    );
    assert_eq!(h.builder.build_count(), 1);
    assert_eq!(h.transport.document_chats(), vec![CHANNEL]);

    let documents = h.transport.documents.lock().unwrap();
    assert_eq!(documents[0].1.file_name, "2026-10-16_report.xlsx");
    assert_eq!(documents[0].1.bytes, FAKE_REPORT_BYTES);
    assert!(h.transport.messages().is_empty());
}

#[tokio::test]
async fn test_user_keyword_delivers_report() {
    let h = harness();

    let outcome = h
        .listener
        .handle(&message(USER, "Send me the REPORT", MessageSource::Message))
        .await;

    assert!(matches!(outcome, CommandOutcome::Delivered(_)));
    assert_eq!(h.transport.document_chats(), vec![USER]);
}

#[tokio::test]
async fn test_unauthorized_chat_rejected_without_build() {
    let h = harness();

    let outcome = h
        .listener
        .handle(&message(7, "/report@equity_bot", MessageSource::Message))
        .await;

    assert_eq!(outcome, CommandOutcome::Rejected);
    assert_eq!(h.builder.build_count(), 0);
    assert_eq!(h.transport.messages(), vec![(7, "No permissions".to_string())]);
    assert!(h.transport.document_chats().is_empty());
}

#[tokio::test]
async fn test_unrelated_messages_ignored() {
    let h = harness();

    let hello = h
        .listener
        .handle(&message(USER, "hello", MessageSource::Message))
        .await;
    let no_text = h
        .listener
        .handle(&InboundMessage {
            chat_id: 7,
            text: None,
            source: MessageSource::Message,
            username: None,
        })
        .await;

    assert_eq!(hello, CommandOutcome::Ignored);
    assert_eq!(no_text, CommandOutcome::Ignored);
    assert_eq!(h.builder.build_count(), 0);
    assert!(h.transport.messages().is_empty());
}

#[tokio::test]
async fn test_build_failure_reported_without_document() {
    let h = harness_with(|dir| FakeBuilder::new(dir).failing(), FakeTransport::default());

    let outcome = h
        .listener
        .handle(&message(USER, "/report", MessageSource::Message))
        .await;

    assert!(matches!(outcome, CommandOutcome::Failed(ref e) if e.contains("Report build failed")));
    assert!(h.transport.document_chats().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_concurrent_deliveries_are_serialized() {
    let h = harness_with(
        |dir| FakeBuilder::new(dir).with_build_time(Duration::from_secs(10)),
        FakeTransport::default(),
    );

    let (scheduled, manual) = tokio::join!(h.delivery.deliver(CHANNEL), h.delivery.deliver(USER));

    assert!(scheduled.is_ok());
    assert!(manual.is_ok());
    assert_eq!(h.builder.build_count(), 2);
    assert_eq!(h.builder.max_in_flight.load(Ordering::SeqCst), 1);

    let mut chats = h.transport.document_chats();
    chats.sort_unstable();
    assert_eq!(chats, vec![CHANNEL, USER]);
}

#[tokio::test(start_paused = true)]
async fn test_listener_polls_and_advances_offset() {
    let updates = vec![
        Err(TransportError::Api {
            method: "getUpdates",
            description: "Bad Gateway".into(),
        }),
        Ok(vec![
            InboundUpdate {
                update_id: 100,
                message: Some(message(7, "report", MessageSource::Message)),
            },
            InboundUpdate {
                update_id: 101,
                message: None,
            },
            InboundUpdate {
                update_id: 102,
                message: Some(message(CHANNEL, "/report", MessageSource::ChannelPost)),
            },
        ]),
    ];
    let h = harness_with(|dir| FakeBuilder::new(dir), FakeTransport::with_updates(updates));

    let task = tokio::spawn(Arc::clone(&h.listener).run());

    for _ in 0..100 {
        if !h.transport.document_chats().is_empty() && !h.transport.messages().is_empty() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
    task.abort();

    assert_eq!(h.transport.document_chats(), vec![CHANNEL]);
    assert_eq!(h.transport.messages(), vec![(7, "No permissions".to_string())]);

    let offsets = h.transport.offsets.lock().unwrap().clone();
    assert_eq!(&offsets[..3], &[0, 0, 103]);
}

fn local(y: i32, m: u32, d: u32, h: u32, min: u32, sec: u32) -> DateTime<Local> {
    Local
        .with_ymd_and_hms(y, m, d, h, min, sec)
        .single()
        .unwrap()
}

async fn wait_for_documents(transport: &FakeTransport, count: usize) {
    for _ in 0..100 {
        if transport.document_chats().len() >= count {
            return;
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
}

#[tokio::test(start_paused = true)]
async fn test_scheduled_delivery_goes_to_channel_once_per_fire() {
    let h = harness();
    // Tuesday, two seconds before the 11:00 fire
    let clock = Arc::new(Mutex::new(local(2026, 10, 20, 10, 59, 58)));
    let scheduler = {
        let clock = Arc::clone(&clock);
        ReportScheduler::new(&ScheduleConfig::default(), CHANNEL, h.delivery.clone())
            .unwrap()
            .with_clock(move || *clock.lock().unwrap())
    };
    let task = tokio::spawn(async move { scheduler.run().await });

    tokio::time::sleep(Duration::from_secs(5)).await;
    assert!(h.transport.document_chats().is_empty());
    assert_eq!(h.builder.build_count(), 0);

    *clock.lock().unwrap() = local(2026, 10, 20, 11, 0, 1);
    wait_for_documents(&h.transport, 1).await;
    assert_eq!(h.transport.document_chats(), vec![CHANNEL]);

    // Wednesday's and Thursday's fires both passed while the clock jumped.
    *clock.lock().unwrap() = local(2026, 10, 22, 11, 30, 0);
    wait_for_documents(&h.transport, 2).await;
    tokio::time::sleep(Duration::from_secs(10)).await;
    assert_eq!(h.transport.document_chats(), vec![CHANNEL, CHANNEL]);

    *clock.lock().unwrap() = local(2026, 10, 23, 11, 0, 0);
    wait_for_documents(&h.transport, 3).await;
    task.abort();

    assert_eq!(h.transport.document_chats(), vec![CHANNEL, CHANNEL, CHANNEL]);
    assert_eq!(h.builder.build_count(), 3);
    assert!(h.transport.messages().is_empty());
}
