//! Example: Reading and writing tags
//!
//! Run with: cargo run --example read_write
//!
//! Set `LIBPLCTAG_PATH` to point at libplctag, or run without it to use the
//! in-memory engine. `RUST_LOG=ab_plctag=debug` shows every engine call.
//!
//! This example demonstrates:
//! - Controller configuration
//! - Scalar, array and string tags
//! - Staged writes with a tag lock
//! - Inspecting operation results and errors

use std::sync::Arc;
use std::time::Duration;

use ab_plctag::mock::MockPlc;
use ab_plctag::{
    ControllerConfig, CpuType, NativeLibrary, PlcController, PlcTagApi, PlcTagError,
};
use tracing_subscriber::EnvFilter;

fn main() -> ab_plctag::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    // =========================================================================
    // Connect to PLC
    // =========================================================================
    //
    // ControlLogix at 192.168.1.10, CPU in slot 0 of the backplane ("1,0").

    let config = ControllerConfig::new("192.168.1.10", "1,0", CpuType::Lgx)
        .with_timeout(Duration::from_secs(2));

    let api: Arc<dyn PlcTagApi> = match NativeLibrary::load() {
        Ok(lib) => {
            println!("Using libplctag from {}", lib.source());
            lib
        }
        Err(e) => {
            println!("{} - using the in-memory engine", e);
            let mock = MockPlc::new();
            mock.set_memory("Counter", 41i32.to_le_bytes().to_vec());
            Arc::new(mock)
        }
    };
    let controller = PlcController::new(config, api)?;

    // =========================================================================
    // Scalars
    // =========================================================================

    println!("\n=== Scalars ===\n");

    let counter = controller.create_tag::<i32>("Counter")?;
    let speed = controller.create_tag::<f32>("Speed")?;
    let running = controller.create_tag::<bool>("Running")?;
    controller.connect()?;

    let value = counter.read()?;
    println!("Counter = {}", value);
    counter.write(value + 1)?;
    println!("Counter = {} after write", counter.read()?);

    speed.write(12.5)?;
    running.write(true)?;
    println!("Speed = {:.1}, Running = {}", speed.read()?, running.read()?);

    // =========================================================================
    // Arrays
    // =========================================================================

    println!("\n=== Arrays ===\n");

    let recipe = controller.create_tag_array::<i16>("Recipe", 8)?;
    recipe.connect()?;

    // Stage several elements while holding the tag lock, then send once
    match recipe.lock_guard() {
        Ok(_guard) => {
            recipe.set_at(0, 100)?;
            recipe.set_at(7, 800)?;
            recipe.flush()?;
        }
        Err(e) => println!("Could not lock Recipe: {}", e),
    }
    println!("Recipe = {:?}", recipe.read_array()?);

    // =========================================================================
    // Strings
    // =========================================================================

    println!("\n=== Strings ===\n");

    let label = controller.create_tag::<String>("BatchLabel")?;
    label.connect()?;
    label.write("BATCH-0042".to_string())?;
    println!("BatchLabel = \"{}\"", label.read()?);

    // More than 82 characters do not fit a STRING
    if let Err(e) = label.write("x".repeat(100)) {
        println!("Expected failure: {}", e);
    }

    // =========================================================================
    // Operation Results
    // =========================================================================

    println!("\n=== Last Operation ===\n");

    if let Some(result) = counter.last_result() {
        println!("{}", result);
    }

    match controller.create_tag::<i32>("Counter") {
        Err(PlcTagError::DuplicateTag { name }) => println!("\n'{}' is already registered", name),
        other => println!("\nUnexpected: {:?}", other.map(|t| t.handle())),
    }

    println!("\nRead/write example completed!");
    Ok(())
}
