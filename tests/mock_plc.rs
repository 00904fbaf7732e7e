//! End-to-end tests of the object model against the in-memory engine.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use ab_plctag::mock::MockPlc;
use ab_plctag::{
    AnyTag, ControllerConfig, CpuType, Operation, PlcController, PlcTagError, ScanMode,
    StatusCode, STRING_SIZE,
};

fn setup() -> (Arc<MockPlc>, PlcController) {
    let plc = Arc::new(MockPlc::new());
    let config = ControllerConfig::new("192.168.1.10", "1,0", CpuType::Lgx)
        .with_timeout(Duration::from_millis(500));
    let controller = PlcController::new(config, plc.clone()).unwrap();
    (plc, controller)
}

#[test]
fn test_attribute_string_sent_to_engine() {
    let (plc, controller) = setup();
    let tag = controller.create_tag_array::<i32>("Program:Main.Counts", 10).unwrap();
    tag.connect().unwrap();
    assert_eq!(
        plc.attributes(tag.handle()).unwrap(),
        "protocol=ab_eip&gateway=192.168.1.10&path=1,0&cpu=lgx&elem_size=4&elem_count=10&name=Program:Main.Counts&share_session=1"
    );
    assert_eq!(tag.engine_size(), 40);
}

#[test]
fn test_attribute_string_without_path() {
    let plc = Arc::new(MockPlc::new());
    let config = ControllerConfig::new("10.0.0.9", "", CpuType::Slc).with_share_session(false);
    let controller = PlcController::new(config, plc.clone()).unwrap();
    let tag = controller.create_tag::<i16>("N7:0").unwrap();
    tag.connect().unwrap();
    assert_eq!(
        plc.attributes(tag.handle()).unwrap(),
        "protocol=ab_eip&gateway=10.0.0.9&cpu=slc&elem_size=2&elem_count=1&name=N7:0"
    );
}

#[test]
fn test_every_value_type_round_trips_through_memory() {
    let (plc, controller) = setup();
    let lint = controller.create_tag::<i64>("Lint").unwrap();
    let ulint = controller.create_tag::<u64>("Ulint").unwrap();
    let sint = controller.create_tag::<i8>("Sint").unwrap();
    let lreal = controller.create_tag::<f64>("Lreal").unwrap();
    let flag = controller.create_tag::<bool>("Flag").unwrap();
    controller.connect().unwrap();

    lint.write(i64::MIN + 1).unwrap();
    ulint.write(u64::MAX - 1).unwrap();
    sint.write(-100).unwrap();
    lreal.write(-0.125).unwrap();
    flag.write(true).unwrap();

    assert_eq!(plc.memory("Sint"), Some(vec![0x9c]));
    assert_eq!(plc.memory("Flag"), Some(vec![1]));

    assert_eq!(lint.read().unwrap(), i64::MIN + 1);
    assert_eq!(ulint.read().unwrap(), u64::MAX - 1);
    assert_eq!(sint.read().unwrap(), -100);
    assert_eq!(lreal.read().unwrap(), -0.125);
    assert!(flag.read().unwrap());
}

#[test]
fn test_string_tag() {
    let (plc, controller) = setup();
    let label = controller.create_tag::<String>("Label").unwrap();
    assert_eq!(label.size(), STRING_SIZE);
    label.connect().unwrap();

    label.write("Batch 7".to_string()).unwrap();
    let memory = plc.memory("Label").unwrap();
    assert_eq!(hex::encode(&memory[..4]), "07000000");
    assert_eq!(&memory[4..11], b"Batch 7");
    assert_eq!(label.read().unwrap(), "Batch 7");

    let err = label.write("z".repeat(83)).unwrap_err();
    assert_eq!(err.status(), Some(StatusCode::ErrTooLarge));
    assert_eq!(err.result().unwrap().operation, Operation::WriteValue);
}

#[test]
fn test_string_array() {
    let (_, controller) = setup();
    let names = controller.create_tag_array::<String>("Names", 3).unwrap();
    names.connect().unwrap();
    let values = vec!["a".to_string(), String::new(), "ccc".to_string()];
    names.write_array(&values).unwrap();
    assert_eq!(names.read_array().unwrap(), values);
    assert_eq!(names.get_at(2).unwrap(), "ccc");
}

#[test]
fn test_staged_writes_then_flush() {
    let (plc, controller) = setup();
    let recipe = controller.create_tag_array::<i32>("Recipe", 4).unwrap();
    recipe.connect().unwrap();

    recipe.set_values(&[1, 2]).unwrap();
    recipe.set_at(3, 4).unwrap();
    assert_eq!(plc.memory("Recipe"), None);

    recipe.flush().unwrap();
    assert_eq!(
        plc.memory("Recipe").map(hex::encode),
        Some("01000000020000000000000004000000".to_string())
    );
}

#[test]
fn test_decode_failure_after_successful_read() {
    let (plc, controller) = setup();
    plc.set_memory("Pressure", 7i32.to_le_bytes().to_vec());
    let tag = controller.create_tag::<i32>("Pressure").unwrap();
    tag.connect().unwrap();
    let changes = Arc::new(AtomicUsize::new(0));
    let seen = changes.clone();
    tag.on_changed(move |_| {
        seen.fetch_add(1, Ordering::SeqCst);
    });

    plc.fail_get("Pressure", StatusCode::ErrBadData);
    let err = tag.read().unwrap_err();
    let result = err.result().unwrap();
    assert_eq!(result.operation, Operation::ReadValue);
    assert_eq!(result.status, StatusCode::ErrBadData);
    assert_eq!(plc.read_count("Pressure"), 1);
    assert!(!tag.has_been_read());
    assert_eq!(tag.last_values(), None);
    assert_eq!(tag.last_result().unwrap().operation, Operation::ReadValue);
    assert_eq!(changes.load(Ordering::SeqCst), 0);

    plc.clear_failures();
    assert_eq!(tag.read().unwrap(), 7);
    assert_eq!(changes.load(Ordering::SeqCst), 1);

    plc.set_memory("Pressure", 8i32.to_le_bytes().to_vec());
    plc.fail_get("Pressure", StatusCode::ErrBadData);
    assert!(tag.read().is_err());
    assert_eq!(tag.last_values(), Some(vec![7]));
    assert_eq!(changes.load(Ordering::SeqCst), 1);
}

#[test]
fn test_typed_lookup_returns_same_tag() {
    let (_, controller) = setup();
    let created = controller.create_tag::<u32>("Mask").unwrap();
    let found = controller.typed_tag::<u32>("Mask").unwrap();
    assert!(Arc::ptr_eq(&created, &found));

    let any: Arc<dyn AnyTag> = controller.tag("Mask").unwrap();
    assert_eq!(any.value_type(), "UDINT");
    assert_eq!(any.element_size(), 4);
    assert!(!any.is_array());
}

#[test]
fn test_operation_error_display() {
    let (plc, controller) = setup();
    let tag = controller.create_tag::<i32>("Missing").unwrap();
    plc.fail_create("Missing", StatusCode::ErrNotFound);

    match tag.connect() {
        Err(PlcTagError::Operation { result }) => {
            assert_eq!(result.operation, Operation::Create);
            let block = result.to_string();
            assert!(block.contains("Tag Name:       Missing"));
            assert!(block.contains("StatusCode:     PLCTAG_ERR_NOT_FOUND"));
        }
        other => panic!("expected operation error, got {:?}", other),
    }
}

#[test]
fn test_group_of_mixed_types() {
    let (plc, controller) = setup();
    plc.set_memory("Speed", 1.5f32.to_le_bytes().to_vec());
    let speed = controller.create_tag::<f32>("Speed").unwrap();
    let running = controller.create_tag::<bool>("Running").unwrap();
    let line = controller.create_group("Line").unwrap();
    line.add(speed.clone()).unwrap();
    line.add(running).unwrap();
    line.connect().unwrap();

    let results = line.read(false);
    let names: Vec<&str> = results.iter().map(|r| r.tag_name.as_str()).collect();
    assert_eq!(names, vec!["Running", "Speed"]);
    assert_eq!(speed.last_value(), Some(1.5));

    line.disconnect();
    assert_eq!(plc.live_handles(), 0);
}

#[test]
fn test_scan_notifies_changes() {
    let (plc, controller) = setup();
    plc.set_memory("Level", 10u16.to_le_bytes().to_vec());
    controller.create_tag::<u16>("Level").unwrap();
    let group = Arc::clone(controller.default_group());
    group.connect().unwrap();

    let changes = Arc::new(AtomicUsize::new(0));
    let seen = changes.clone();
    group.on_changed(move |results| {
        seen.fetch_add(results.len(), Ordering::SeqCst);
    });

    let scan = group.scan(Duration::from_millis(2), ScanMode::Read).unwrap();
    while changes.load(Ordering::SeqCst) < 1 {
        std::thread::sleep(Duration::from_millis(1));
    }
    plc.set_memory("Level", 11u16.to_le_bytes().to_vec());
    while changes.load(Ordering::SeqCst) < 2 {
        std::thread::sleep(Duration::from_millis(1));
    }
    drop(scan);
    assert_eq!(changes.load(Ordering::SeqCst), 2);
}

#[test]
fn test_tag_outlives_controller() {
    let (plc, controller) = setup();
    let tag = controller.create_tag::<i32>("Counter").unwrap();
    tag.connect().unwrap();
    drop(controller);

    assert!(matches!(tag.read(), Err(PlcTagError::NotConnected { .. })));
    tag.connect().unwrap();
    assert_eq!(plc.live_handles(), 1);
    drop(tag);
    assert_eq!(plc.live_handles(), 0);
}
