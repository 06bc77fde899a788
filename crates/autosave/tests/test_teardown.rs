//! Session teardown: focused-input commit and the best-effort final write.

mod common;

use common::{ms, saver, settle, FakeFocusedInput, RecordingWriter};
use serde_json::json;
use std::sync::Arc;
use tokio::time::sleep;

#[tokio::test(start_paused = true)]
async fn test_dispose_flushes_pending_edits_once() {
    let writer = RecordingWriter::new();
    let saver = saver(2000, &writer);

    saver.save_field("x", json!(5)).unwrap();
    saver.dispose();
    settle().await;

    assert_eq!(writer.patches(), vec![json!({"x": 5})]);
    assert!(saver.is_disposed());

    // the armed timer was cancelled with the teardown
    sleep(ms(10_000)).await;
    assert_eq!(writer.count(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_dispose_swallows_write_failure() {
    let writer = RecordingWriter::failing("connection reset");
    let saver = saver(2000, &writer);

    saver.save_field("x", json!(5)).unwrap();
    saver.dispose();
    settle().await;

    assert_eq!(writer.count(), 1);
    assert_eq!(writer.patches()[0], json!({"x": 5}));
}

#[tokio::test(start_paused = true)]
async fn test_dropping_the_saver_disposes_it() {
    let writer = RecordingWriter::new();
    {
        let saver = saver(2000, &writer);
        saver.save_field("notes", json!("rear bumper scratched")).unwrap();
    }
    settle().await;

    assert_eq!(
        writer.patches(),
        vec![json!({"notes": "rear bumper scratched"})]
    );
}

#[tokio::test(start_paused = true)]
async fn test_dispose_commits_the_focused_input_first() {
    let writer = RecordingWriter::new();
    let saver = saver(2000, &writer);
    let input = FakeFocusedInput::typing("claimantInfo.email", json!("jane@example.com"));
    saver.set_focused_input(Some(input.clone()));

    saver
        .save_field("claimantInfo.firstName", json!("Jane"))
        .unwrap();
    saver.dispose();
    settle().await;

    assert_eq!(
        writer.patches(),
        vec![json!({"claimantInfo": {"email": "jane@example.com", "firstName": "Jane"}})]
    );
    assert!(input.value.lock().is_none());
}

#[tokio::test(start_paused = true)]
async fn test_focused_input_alone_is_flushed_on_dispose() {
    let writer = RecordingWriter::new();
    let saver = saver(2000, &writer);
    saver.set_focused_input(Some(FakeFocusedInput::typing("amount", json!(42))));

    saver.dispose();
    settle().await;

    assert_eq!(writer.patches(), vec![json!({"amount": 42})]);
}

#[tokio::test(start_paused = true)]
async fn test_disabled_saver_ignores_focused_input_on_dispose() {
    let writer = RecordingWriter::new();
    let saver = saver(2000, &writer);
    saver.set_focused_input(Some(FakeFocusedInput::typing("amount", json!(42))));
    saver.set_disabled(true);

    saver.dispose();
    settle().await;

    assert_eq!(writer.count(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_dispose_without_pending_edits_writes_nothing() {
    let writer = RecordingWriter::new();
    let saver = saver(500, &writer);

    saver.dispose();
    saver.dispose();
    settle().await;

    assert_eq!(writer.count(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_edits_after_dispose_are_ignored() {
    let writer = RecordingWriter::new();
    let saver = saver(500, &writer);
    saver.dispose();

    saver.save_field("a", json!(1)).unwrap();
    assert_eq!(saver.pending_len(), 0);
    assert!(!saver.is_timer_armed());

    sleep(ms(2000)).await;
    assert_eq!(writer.count(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_teardown_write_is_not_ordered_after_in_flight_flush() {
    let writer = RecordingWriter::gated();
    let saver = Arc::new(saver(500, &writer));

    saver.save_field("a", json!(1)).unwrap();
    sleep(ms(600)).await; // first write blocked in flight
    saver.save_field("b", json!(2)).unwrap();

    saver.dispose();
    settle().await;

    // both writes were issued without waiting for each other
    assert_eq!(writer.patches(), vec![json!({"a": 1}), json!({"b": 2})]);
    writer.release(2);
    settle().await;
    assert!(!saver.has_unsaved_changes());
}
