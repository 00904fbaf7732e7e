//! Controller configuration as JSON.
#![cfg(feature = "serde")]

use std::time::Duration;

use ab_plctag::{ControllerConfig, CpuType};

#[test]
fn test_config_from_json() {
    let json = r#"{
        "gateway": "192.168.1.10",
        "path": "1,0",
        "cpu": "lgx",
        "timeout": { "secs": 2, "nanos": 0 },
        "debug_level": 1,
        "share_session": false
    }"#;
    let config: ControllerConfig = serde_json::from_str(json).unwrap();
    assert_eq!(config.cpu, CpuType::Lgx);
    assert_eq!(config.timeout, Duration::from_secs(2));
    assert!(!config.share_session);
    assert!(config.validate().is_ok());
}

#[test]
fn test_cpu_serializes_lowercase() {
    let config = ControllerConfig::new("10.0.0.1", "", CpuType::Micro800);
    let value = serde_json::to_value(&config).unwrap();
    assert_eq!(value["cpu"], "micro800");

    let back: ControllerConfig = serde_json::from_value(value).unwrap();
    assert_eq!(back, config);
}
