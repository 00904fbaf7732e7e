//! Example: Background group scan
//!
//! Run with: cargo run --example group_scan
//!
//! This example demonstrates:
//! - Grouping tags of different types
//! - Change listeners on a tag and on a group
//! - Running and stopping a background scan

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use ab_plctag::mock::MockPlc;
use ab_plctag::{ControllerConfig, CpuType, PlcController, ScanMode};
use tracing_subscriber::EnvFilter;

fn main() -> ab_plctag::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    // The in-memory engine stands in for the PLC so the values can be
    // changed from this program while the scan runs.
    let plc = Arc::new(MockPlc::new());
    let config = ControllerConfig::new("192.168.1.10", "1,0", CpuType::Lgx);
    let controller = PlcController::new(config, plc.clone())?;

    let level = controller.create_tag::<u16>("Tank1.Level")?;
    let alarm = controller.create_tag::<bool>("Tank1.HighAlarm")?;
    let tank = controller.create_group("Tank1")?;
    tank.add(level.clone())?;
    tank.add(alarm)?;
    tank.connect()?;

    level.on_changed(|result| {
        println!("  level changed ({} us)", result.execution_time.as_micros());
    });
    tank.on_changed(|results| {
        let names: Vec<&str> = results.iter().map(|r| r.tag_name.as_str()).collect();
        println!("Changed: {:?}", names);
    });

    let scan = tank.scan(Duration::from_millis(100), ScanMode::Read)?;

    for value in [10u16, 10, 55, 95] {
        plc.set_memory("Tank1.Level", value.to_le_bytes().to_vec());
        plc.set_memory("Tank1.HighAlarm", vec![u8::from(value > 90)]);
        thread::sleep(Duration::from_millis(250));
        println!("Tank1.Level = {:?}", level.last_value());
    }

    scan.stop();
    println!("\nScan stopped, {} reads issued", plc.read_count("Tank1.Level"));
    Ok(())
}
