mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{red_png, MockClient};
use hand_analyzer::client::{EMPTY_RESPONSE_TEXT, INSTRUCTION, MODEL, THINKING_BUDGET};
use hand_analyzer::{encode, SelectedFile, Status, WorkflowError, WorkflowHandle};
use tokio::sync::Semaphore;

fn png_file() -> Option<SelectedFile> {
    Some(SelectedFile::new("red.png", Some("image/png".to_string()), red_png()))
}

#[tokio::test]
async fn test_upload_then_successful_analysis() {
    let client = Arc::new(MockClient::scripted(vec![Ok(Some("4 fingers"))]));
    let workflow = WorkflowHandle::spawn(client.clone(), None);

    let snapshot = workflow.upload(encode(png_file())).await.unwrap();
    assert_eq!(snapshot.status, Status::Ready);

    let snapshot = workflow.analyze().await.unwrap();
    assert_eq!(snapshot.status, Status::Loading);

    let snapshot = workflow.settled().await.unwrap();
    assert_eq!(snapshot.status, Status::Success);
    assert_eq!(snapshot.result.as_deref(), Some("4 fingers"));

    let requests = client.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].image.mime_type(), "image/png");
    assert_eq!(requests[0].image.decode().unwrap(), red_png());
    assert_eq!(requests[0].model, MODEL);
    assert_eq!(requests[0].instruction, INSTRUCTION);
    assert_eq!(requests[0].thinking_budget, THINKING_BUDGET);
}

#[tokio::test]
async fn test_failure_then_retry_succeeds() {
    let client = Arc::new(MockClient::scripted(vec![
        Err("quota exceeded"),
        Ok(Some("5 fingers, open palm")),
    ]));
    let workflow = WorkflowHandle::spawn(client.clone(), None);

    workflow.upload(encode(png_file())).await.unwrap();
    workflow.analyze().await.unwrap();

    let snapshot = workflow.settled().await.unwrap();
    assert_eq!(snapshot.status, Status::Error);
    assert_eq!(snapshot.error.as_deref(), Some("quota exceeded"));

    let snapshot = workflow.retry().await.unwrap();
    assert_eq!(snapshot.status, Status::Loading);
    assert!(snapshot.error.is_none());

    let snapshot = workflow.settled().await.unwrap();
    assert_eq!(snapshot.status, Status::Success);
    assert_eq!(snapshot.result.as_deref(), Some("5 fingers, open palm"));

    let requests = client.requests();
    assert_eq!(requests.len(), 2);
    assert!(Arc::ptr_eq(&requests[0].image, &requests[1].image));
}

#[tokio::test]
async fn test_empty_response_uses_fallback_text() {
    let client = Arc::new(MockClient::scripted(vec![Ok(None), Ok(Some(""))]));
    let workflow = WorkflowHandle::spawn(client, None);

    workflow.upload(encode(png_file())).await.unwrap();
    workflow.analyze().await.unwrap();
    let snapshot = workflow.settled().await.unwrap();
    assert_eq!(snapshot.status, Status::Success);
    assert_eq!(snapshot.result.as_deref(), Some(EMPTY_RESPONSE_TEXT));

    workflow.analyze().await.unwrap();
    let snapshot = workflow.settled().await.unwrap();
    assert_eq!(snapshot.result.as_deref(), Some("No analysis generated."));
}

#[tokio::test]
async fn test_cancelled_upload_keeps_empty() {
    let workflow = WorkflowHandle::spawn(Arc::new(MockClient::scripted(vec![])), None);

    let snapshot = workflow.upload(encode(None)).await.unwrap();
    assert_eq!(snapshot.status, Status::Empty);
    assert!(snapshot.image.is_none());
}

#[tokio::test]
async fn test_analyze_and_retry_rejected_without_image() {
    let client = Arc::new(MockClient::scripted(vec![]));
    let workflow = WorkflowHandle::spawn(client.clone(), None);

    assert_eq!(workflow.analyze().await.unwrap_err(), WorkflowError::NoImage);
    assert_eq!(workflow.retry().await.unwrap_err(), WorkflowError::NoImage);
    assert_eq!(workflow.snapshot().status, Status::Empty);
    assert!(client.requests().is_empty());
}

#[tokio::test]
async fn test_second_analyze_refused_while_loading() {
    let gate = Arc::new(Semaphore::new(0));
    let client = Arc::new(MockClient::scripted(vec![Ok(Some("3 fingers"))]).gated(gate.clone()));
    let workflow = WorkflowHandle::spawn(client.clone(), None);

    workflow.upload(encode(png_file())).await.unwrap();
    workflow.analyze().await.unwrap();
    assert_eq!(workflow.analyze().await.unwrap_err(), WorkflowError::AnalysisInFlight);
    assert_eq!(workflow.retry().await.unwrap_err(), WorkflowError::AnalysisInFlight);
    assert_eq!(workflow.snapshot().status, Status::Loading);

    gate.add_permits(1);
    let snapshot = workflow.settled().await.unwrap();
    assert_eq!(snapshot.result.as_deref(), Some("3 fingers"));
    assert_eq!(client.requests().len(), 1);
}

#[tokio::test]
async fn test_reset_discards_image_and_result() {
    let client = Arc::new(MockClient::scripted(vec![Ok(Some("2 fingers"))]));
    let workflow = WorkflowHandle::spawn(client, None);

    workflow.upload(encode(png_file())).await.unwrap();
    workflow.analyze().await.unwrap();
    workflow.settled().await.unwrap();

    let snapshot = workflow.reset().await.unwrap();
    assert_eq!(snapshot.status, Status::Empty);
    assert!(snapshot.image.is_none());
    assert!(snapshot.result.is_none());
    assert_eq!(workflow.analyze().await.unwrap_err(), WorkflowError::NoImage);
}

#[tokio::test]
async fn test_late_response_after_reset_is_ignored() {
    let gate = Arc::new(Semaphore::new(0));
    let client = Arc::new(
        MockClient::with_fn(|request| Ok(Some(format!("analyzed {}", request.image.mime_type()))))
            .gated(gate.clone()),
    );
    let workflow = WorkflowHandle::spawn(client, None);

    workflow.upload(encode(png_file())).await.unwrap();
    workflow.analyze().await.unwrap();

    workflow.reset().await.unwrap();
    let jpeg = SelectedFile::new("hand.jpg", Some("image/jpeg".to_string()), vec![0xff, 0xd8]);
    workflow.upload(encode(Some(jpeg))).await.unwrap();
    workflow.analyze().await.unwrap();

    gate.add_permits(2);
    let snapshot = workflow.settled().await.unwrap();
    assert_eq!(snapshot.result.as_deref(), Some("analyzed image/jpeg"));
    assert_eq!(snapshot.image.unwrap().mime_type(), "image/jpeg");
}

#[tokio::test(start_paused = true)]
async fn test_timeout_becomes_error() {
    let gate = Arc::new(Semaphore::new(0));
    let client = Arc::new(MockClient::scripted(vec![Ok(Some("never"))]).gated(gate));
    let workflow = WorkflowHandle::spawn(client, Some(Duration::from_secs(5)));

    workflow.upload(encode(png_file())).await.unwrap();
    workflow.analyze().await.unwrap();

    let snapshot = workflow.settled().await.unwrap();
    assert_eq!(snapshot.status, Status::Error);
    assert_eq!(snapshot.error.as_deref(), Some("Analysis timed out after 5s"));
}

#[tokio::test]
async fn test_subscribers_see_each_transition() {
    let client = Arc::new(MockClient::scripted(vec![Ok(Some("1 finger"))]));
    let workflow = WorkflowHandle::spawn(client, None);
    let mut rx = workflow.subscribe();

    workflow.upload(encode(png_file())).await.unwrap();
    rx.changed().await.unwrap();
    assert_eq!(rx.borrow_and_update().status, Status::Ready);

    workflow.analyze().await.unwrap();
    let snapshot = rx.wait_for(|s| s.status == Status::Success).await.unwrap().clone();
    assert_eq!(snapshot.result.as_deref(), Some("1 finger"));
}

#[tokio::test]
async fn test_whitespace_response_is_kept() {
    let client = Arc::new(MockClient::scripted(vec![Ok(Some(" \n"))]));
    let workflow = WorkflowHandle::spawn(client, None);

    workflow.upload(encode(png_file())).await.unwrap();
    workflow.analyze().await.unwrap();
    let snapshot = workflow.settled().await.unwrap();
    assert_eq!(snapshot.status, Status::Success);
    assert_eq!(snapshot.result.as_deref(), Some(" \n"));
}
