//! BLE client playing the peer of the gateway.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Result};
use btleplug::api::{Central, Characteristic, Manager as _, Peripheral as _, ScanFilter};
use btleplug::platform::{Adapter, Manager, Peripheral};
use futures::StreamExt;
use tokio::sync::Mutex;
use uuid::Uuid;

/// NDN characteristic (write, notify)
pub const NDN_CHAR_UUID: Uuid = Uuid::from_u128(0xad52eb36_18f6_55ae_3845_a09c7b8ec094);
/// Heart Rate Measurement characteristic
pub const HRM_UUID: Uuid = Uuid::from_u128(0x00002a37_0000_1000_8000_00805f9b34fb);
/// Body Sensor Location characteristic
pub const BODY_SENSOR_LOCATION_UUID: Uuid = Uuid::from_u128(0x00002a38_0000_1000_8000_00805f9b34fb);
/// Battery Level characteristic
pub const BATTERY_LEVEL_UUID: Uuid = Uuid::from_u128(0x00002a19_0000_1000_8000_00805f9b34fb);

/// Notification received from the gateway.
#[derive(Debug, Clone)]
pub struct Notification {
    pub uuid: Uuid,
    pub value: Vec<u8>,
}

/// BLE client for the gateway.
pub struct BleClient {
    peripheral: Peripheral,
    ndn_char: Characteristic,
    hrm_char: Characteristic,
    /// Notifications in arrival order
    notifications: Arc<Mutex<Vec<Notification>>>,
}

impl BleClient {
    /// Scan for a device by name and connect.
    pub async fn connect_by_name(name: &str, scan_timeout: Duration) -> Result<Self> {
        let manager = Manager::new().await?;
        let adapters = manager.adapters().await?;
        let adapter = adapters
            .into_iter()
            .next()
            .ok_or_else(|| anyhow!("No Bluetooth adapters found"))?;

        adapter.start_scan(ScanFilter::default()).await?;
        let peripheral = Self::find_device_by_name(&adapter, name, scan_timeout).await?;
        adapter.stop_scan().await?;

        peripheral.connect().await?;
        peripheral.discover_services().await?;

        let characteristics = peripheral.characteristics();
        let find = |uuid: Uuid, what: &str| {
            characteristics
                .iter()
                .find(|c| c.uuid == uuid)
                .cloned()
                .ok_or_else(|| anyhow!("{} characteristic not found", what))
        };
        let ndn_char = find(NDN_CHAR_UUID, "NDN")?;
        let hrm_char = find(HRM_UUID, "Heart Rate Measurement")?;

        let notifications = Arc::new(Mutex::new(Vec::new()));

        let sink = notifications.clone();
        let mut stream = peripheral.notifications().await?;
        tokio::spawn(async move {
            while let Some(data) = stream.next().await {
                sink.lock().await.push(Notification {
                    uuid: data.uuid,
                    value: data.value,
                });
            }
        });

        Ok(Self {
            peripheral,
            ndn_char,
            hrm_char,
            notifications,
        })
    }

    /// Find a device by name within the scan timeout.
    async fn find_device_by_name(
        adapter: &Adapter,
        name: &str,
        scan_timeout: Duration,
    ) -> Result<Peripheral> {
        let start = std::time::Instant::now();

        while start.elapsed() < scan_timeout {
            for peripheral in adapter.peripherals().await? {
                if let Some(props) = peripheral.properties().await? {
                    if props.local_name.as_deref() == Some(name) {
                        return Ok(peripheral);
                    }
                }
            }

            tokio::time::sleep(Duration::from_millis(100)).await;
        }

        Err(anyhow!("Device '{}' not found within timeout", name))
    }

    /// Enable or disable heart rate notifications.
    pub async fn set_heart_rate(&self, enabled: bool) -> Result<()> {
        if enabled {
            self.peripheral.subscribe(&self.hrm_char).await?;
        } else {
            self.peripheral.unsubscribe(&self.hrm_char).await?;
        }
        Ok(())
    }

    /// Enable or disable NDN characteristic notifications.
    pub async fn set_ndn(&self, enabled: bool) -> Result<()> {
        if enabled {
            self.peripheral.subscribe(&self.ndn_char).await?;
        } else {
            self.peripheral.unsubscribe(&self.ndn_char).await?;
        }
        Ok(())
    }

    /// Read a characteristic by UUID.
    pub async fn read(&self, uuid: Uuid) -> Result<Vec<u8>> {
        let characteristic = self
            .peripheral
            .characteristics()
            .into_iter()
            .find(|c| c.uuid == uuid)
            .ok_or_else(|| anyhow!("Characteristic {} not found", uuid))?;
        Ok(self.peripheral.read(&characteristic).await?)
    }

    /// Wait for a notification on `uuid`.
    pub async fn wait_for_notification(&self, uuid: Uuid, timeout: Duration) -> Result<Vec<u8>> {
        let start = std::time::Instant::now();

        while start.elapsed() < timeout {
            {
                let mut received = self.notifications.lock().await;
                if let Some(pos) = received.iter().position(|n| n.uuid == uuid) {
                    return Ok(received.remove(pos).value);
                }
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }

        Err(anyhow!("Timeout waiting for notification on {}", uuid))
    }

    /// Take every notification received so far.
    pub async fn take_notifications(&self) -> Vec<Notification> {
        std::mem::take(&mut *self.notifications.lock().await)
    }

    /// Disconnect from the device.
    pub async fn disconnect(&self) -> Result<()> {
        self.peripheral.disconnect().await?;
        Ok(())
    }

    /// Check the connection state.
    pub async fn is_connected(&self) -> Result<bool> {
        Ok(self.peripheral.is_connected().await?)
    }
}
