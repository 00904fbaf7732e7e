//! Non-blocking reads and writes on tokio.
#![cfg(feature = "async")]

use std::sync::Arc;
use std::time::Duration;

use ab_plctag::mock::MockPlc;
use ab_plctag::{ControllerConfig, CpuType, Operation, PlcController, PlcTagError, StatusCode};

fn setup(timeout: Duration) -> (Arc<MockPlc>, PlcController) {
    let plc = Arc::new(MockPlc::new());
    let config = ControllerConfig::new("192.168.1.10", "1,0", CpuType::Lgx).with_timeout(timeout);
    let controller = PlcController::new(config, plc.clone()).unwrap();
    (plc, controller)
}

#[tokio::test]
async fn test_read_async_waits_for_pending() {
    let (plc, controller) = setup(Duration::from_secs(1));
    plc.set_memory("Counter", 77i32.to_le_bytes().to_vec());
    plc.set_pending_polls("Counter", 3);
    let tag = controller.create_tag::<i32>("Counter").unwrap();
    tag.connect().unwrap();

    assert_eq!(tag.read_async().await.unwrap(), 77);
    assert!(tag.has_been_read());
}

#[tokio::test]
async fn test_write_async() {
    let (plc, controller) = setup(Duration::from_secs(1));
    plc.set_pending_polls("Setpoint", 2);
    let tag = controller.create_tag::<f32>("Setpoint").unwrap();
    tag.connect().unwrap();

    tag.write_async(42.5).await.unwrap();
    assert_eq!(plc.memory("Setpoint"), Some(42.5f32.to_le_bytes().to_vec()));
    assert!(tag.has_been_written());
}

#[tokio::test]
async fn test_async_timeout_aborts() {
    let (plc, controller) = setup(Duration::from_millis(50));
    plc.set_pending_polls("Slow", u32::MAX);
    let tag = controller.create_tag::<i32>("Slow").unwrap();
    tag.connect().unwrap();

    match tag.read_async().await {
        Err(PlcTagError::Timeout { tag: name, operation }) => {
            assert_eq!(name, "Slow");
            assert_eq!(operation, Operation::Read);
        }
        other => panic!("expected timeout, got {:?}", other),
    }
    assert_eq!(tag.status(), StatusCode::ErrAbort);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_async_failure_carries_result() {
    let (plc, controller) = setup(Duration::from_secs(1));
    let tag = controller.create_tag::<i32>("Counter").unwrap();
    tag.connect().unwrap();
    plc.fail_write("Counter", StatusCode::ErrBadConnection);

    let err = tag.write_async(1).await.unwrap_err();
    assert_eq!(err.status(), Some(StatusCode::ErrBadConnection));
    assert_eq!(err.result().unwrap().operation, Operation::Write);
}
