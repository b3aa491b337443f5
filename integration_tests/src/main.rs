//! Hardware-in-the-loop tests for the NDN-BLE gateway firmware.
//!
//! The host plays both neighbours of the gateway: the NDN forwarder on the
//! face serial port and the BLE peer subscribing to its characteristics.

mod ble_client;
mod device;
mod protocol;
mod tests;

use std::time::Duration;

use clap::Parser;
use colored::Colorize;

use ble_client::BleClient;
use device::FaceClient;
use tests::{print_results, run_all_tests};

#[derive(Parser)]
#[command(name = "bridge-tests")]
#[command(about = "Integration tests for the NDN-BLE gateway firmware")]
struct Args {
    /// Serial port of the gateway's NDN face (first CDC port)
    #[arg(short, long, default_value = "/dev/ttyACM0")]
    port: String,

    /// Baud rate
    #[arg(short, long, default_value = "115200")]
    baud: u32,

    /// Advertised name of the gateway
    #[arg(long, default_value = "GATT-NDN-Gateway")]
    ble_name: String,

    /// BLE scan timeout in seconds
    #[arg(long, default_value = "10")]
    scan_timeout: u64,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    println!("{}", "NDN-BLE Gateway Integration Tests".bold());
    println!("Face: {} @ {}", args.port, args.baud);
    println!("BLE:  \"{}\"", args.ble_name);
    println!();

    println!("Opening face port...");
    let mut face = FaceClient::new(&args.port, args.baud)?;
    face.drain_buffer()?;
    println!("{}", "  Face open!".green());

    println!("Scanning for BLE device \"{}\"...", args.ble_name);
    let ble = BleClient::connect_by_name(&args.ble_name, Duration::from_secs(args.scan_timeout)).await?;
    println!("{}", "  BLE connected!".green());

    println!("\n{}", "Running tests...".bold());
    println!();

    let results = run_all_tests(&ble, &mut face).await;
    print_results(&results);

    ble.disconnect().await.ok();

    // Exit with error code if any tests failed
    let failed = results.iter().filter(|r| !r.passed).count();
    if failed > 0 {
        std::process::exit(1);
    }

    Ok(())
}
