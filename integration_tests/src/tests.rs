//! Integration test cases.
//!
//! Each test starts with both notification channels disabled and leaves
//! them disabled.

use std::time::Duration;

use anyhow::{bail, ensure, Result};
use colored::Colorize;

use crate::ble_client::{BleClient, BATTERY_LEVEL_UUID, BODY_SENSOR_LOCATION_UUID, HRM_UUID, NDN_CHAR_UUID};
use crate::device::FaceClient;
use crate::protocol::build_interest;

/// Interval between periodic Interests (must match firmware)
const UPDATE_INTERVAL: Duration = Duration::from_millis(500);

/// How long to wait for a notification
const NOTIFY_TIMEOUT: Duration = Duration::from_secs(2);

/// Test result.
pub struct TestResult {
    pub name: String,
    pub passed: bool,
    pub message: Option<String>,
}

/// Run a test and print results as it happens.
async fn run_test<Fut>(name: &str, test: Fut) -> TestResult
where
    Fut: std::future::Future<Output = Result<()>>,
{
    print!("  {} ... ", name);
    std::io::Write::flush(&mut std::io::stdout()).ok();

    match test.await {
        Ok(()) => {
            println!("{}", "PASS".green().bold());
            TestResult {
                name: name.to_string(),
                passed: true,
                message: None,
            }
        }
        Err(e) => {
            println!("{}", "FAIL".red().bold());
            println!("    {}", e.to_string().red());
            TestResult {
                name: name.to_string(),
                passed: false,
                message: Some(e.to_string()),
            }
        }
    }
}

/// Run all tests and return results.
pub async fn run_all_tests(ble: &BleClient, face: &mut FaceClient) -> Vec<TestResult> {
    let mut results = Vec::new();

    results.push(run_test("Static characteristics are readable", test_static_reads(ble)).await);
    results.push(run_test("No Interests while unsubscribed", test_idle(face)).await);
    results.push(run_test("Subscribing starts sequential Interests", test_periodic_interests(ble, face)).await);
    results.push(run_test("Unsubscribing stops Interests", test_unsubscribe_stops(ble, face)).await);
    results.push(run_test("Two-byte content becomes a heart rate", test_heart_rate_notification(ble, face)).await);
    results.push(run_test("Other content is forwarded on NDN", test_forward_notification(ble, face)).await);
    results.push(run_test("Unsubscribed channel gets nothing", test_no_notification_unsubscribed(ble, face)).await);
    results.push(run_test("Non-Data packets are dropped", test_interest_dropped(ble, face)).await);

    results
}

/// Print test results summary.
pub fn print_results(results: &[TestResult]) {
    println!("\n{}", "=".repeat(60));
    println!("{}", "Test Results".bold());
    println!("{}", "=".repeat(60));

    let mut passed = 0;
    let mut failed = 0;

    for result in results {
        if result.passed {
            println!("  {} {}", "[PASS]".green().bold(), result.name);
            passed += 1;
        } else {
            println!("  {} {}", "[FAIL]".red().bold(), result.name);
            if let Some(msg) = &result.message {
                println!("         {}", msg.red());
            }
            failed += 1;
        }
    }

    println!("{}", "-".repeat(60));
    println!(
        "  Total: {} passed, {} failed",
        passed.to_string().green(),
        if failed > 0 {
            failed.to_string().red()
        } else {
            failed.to_string().normal()
        }
    );
    println!("{}", "=".repeat(60));
}

// --- Individual Tests ---

async fn test_static_reads(ble: &BleClient) -> Result<()> {
    let location = ble.read(BODY_SENSOR_LOCATION_UUID).await?;
    ensure!(location == [0x02], "Body sensor location {:02x?}", location);

    let battery = ble.read(BATTERY_LEVEL_UUID).await?;
    ensure!(battery == [42], "Battery level {:?}", battery);
    Ok(())
}

async fn test_idle(face: &mut FaceClient) -> Result<()> {
    face.drain_buffer()?;
    let interests = face.collect_interests(UPDATE_INTERVAL * 3)?;
    ensure!(interests.is_empty(), "Got {} Interests while idle", interests.len());
    Ok(())
}

/// Sequence number at the end of an Interest name
fn sequence_of(name: &str) -> Result<u32> {
    let Some(last) = name.strip_prefix("/demo/hrs/") else {
        bail!("Unexpected Interest name {}", name);
    };
    Ok(last.parse()?)
}

async fn test_periodic_interests(ble: &BleClient, face: &mut FaceClient) -> Result<()> {
    face.drain_buffer()?;
    ble.set_heart_rate(true).await?;

    let interests = face.collect_interests(UPDATE_INTERVAL * 5 + UPDATE_INTERVAL / 2);
    ble.set_heart_rate(false).await?;
    let interests = interests?;

    ensure!(
        (4..=6).contains(&interests.len()),
        "Expected about 5 Interests, got {}",
        interests.len()
    );

    let mut previous: Option<u32> = None;
    for (_, interest) in &interests {
        let sequence = sequence_of(&interest.name)?;
        if let Some(previous) = previous {
            ensure!(sequence == previous + 1, "Sequence jumped from {} to {}", previous, sequence);
        }
        previous = Some(sequence);

        ensure!(interest.nonce.is_some(), "Interest {} has no nonce", interest.name);
    }

    for pair in interests.windows(2) {
        let gap = pair[1].0.duration_since(pair[0].0);
        ensure!(
            gap > UPDATE_INTERVAL / 2 && gap < UPDATE_INTERVAL * 2,
            "Interests {:?} apart",
            gap
        );
    }

    Ok(())
}

async fn test_unsubscribe_stops(ble: &BleClient, face: &mut FaceClient) -> Result<()> {
    face.drain_buffer()?;
    ble.set_heart_rate(true).await?;
    let first = face.read_interest(UPDATE_INTERVAL * 3)?;
    ble.set_heart_rate(false).await?;
    ensure!(first.is_some(), "No Interest after subscribing");

    // One Interest may already be in flight
    tokio::time::sleep(UPDATE_INTERVAL).await;
    face.drain_buffer()?;

    let interests = face.collect_interests(UPDATE_INTERVAL * 4)?;
    ensure!(interests.is_empty(), "Got {} Interests after unsubscribing", interests.len());
    Ok(())
}

async fn test_heart_rate_notification(ble: &BleClient, face: &mut FaceClient) -> Result<()> {
    ble.take_notifications().await;
    ble.set_heart_rate(true).await?;

    let result: Result<()> = async {
        let interest = face
            .read_interest(UPDATE_INTERVAL * 3)?
            .ok_or_else(|| anyhow::anyhow!("No Interest to answer"))?;
        face.send_data(&interest.name, &[0x48, 0x00])?;

        let value = ble.wait_for_notification(HRM_UUID, NOTIFY_TIMEOUT).await?;
        ensure!(value == [0x01, 0x48, 0x00], "Heart rate measurement {:02x?}", value);
        Ok(())
    }
    .await;

    ble.set_heart_rate(false).await?;
    result
}

async fn test_forward_notification(ble: &BleClient, face: &mut FaceClient) -> Result<()> {
    ble.take_notifications().await;
    ble.set_ndn(true).await?;

    let result: Result<()> = async {
        face.send_data("/chat/alice/7", b"hello")?;
        let value = ble.wait_for_notification(NDN_CHAR_UUID, NOTIFY_TIMEOUT).await?;
        ensure!(value == b"hello", "Forwarded {:02x?}", value);

        // Three bytes are not a sample
        face.send_data("/demo/hrs/99", &[0x48, 0x00, 0x01])?;
        let value = ble.wait_for_notification(NDN_CHAR_UUID, NOTIFY_TIMEOUT).await?;
        ensure!(value == [0x48, 0x00, 0x01], "Forwarded {:02x?}", value);
        Ok(())
    }
    .await;

    ble.set_ndn(false).await?;
    result
}

async fn test_no_notification_unsubscribed(ble: &BleClient, face: &mut FaceClient) -> Result<()> {
    ble.take_notifications().await;
    ble.set_ndn(true).await?;

    // Sample arrives while only the NDN channel is enabled
    face.send_data("/demo/hrs/1", &[0x48, 0x00])?;
    tokio::time::sleep(NOTIFY_TIMEOUT).await;
    ble.set_ndn(false).await?;

    let received = ble.take_notifications().await;
    ensure!(received.is_empty(), "Got {} notifications", received.len());
    Ok(())
}

async fn test_interest_dropped(ble: &BleClient, face: &mut FaceClient) -> Result<()> {
    ble.take_notifications().await;
    ble.set_ndn(true).await?;

    face.send_packet(&build_interest("/chat/alice/8", 0x01020304))?;
    // Garbage without a valid CRC
    face.send_raw(&[0x03, 0x01, 0x02, 0x00])?;
    tokio::time::sleep(NOTIFY_TIMEOUT).await;

    // The gateway still works afterwards
    face.send_data("/chat/alice/9", b"still here")?;
    let value = ble.wait_for_notification(NDN_CHAR_UUID, NOTIFY_TIMEOUT).await;
    ble.set_ndn(false).await?;

    let value = value?;
    ensure!(value == b"still here", "Forwarded {:02x?}", value);
    let extra = ble.take_notifications().await;
    ensure!(extra.is_empty(), "Got {} unexpected notifications", extra.len());
    Ok(())
}
