//! 设备接口契约测试
//!
//! 串口设备（Mock 串口）与测试替身必须满足同一套契约：
//! 1. 状态规则：NotOpen / AlreadyOpen
//! 2. 请求列表返回副本
//! 3. 监听器后注册者生效

use roomba_sdk::driver::RoombaSerial;
use roomba_sdk::prelude::*;
use roomba_sdk::serial::SerialSettings;
use roomba_sdk::serial::mock::MockConnector;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

const PACKETS: [SensorPacket; 3] = [
    SensorPacket::BumpsAndWheelDrops,
    SensorPacket::Distance,
    SensorPacket::Angle,
];

fn fast_config() -> PipelineConfig {
    PipelineConfig {
        read_timeout_ms: 5,
        settle_delay_ms: 1,
        watchdog_period_ms: 50,
        read_chunk_size: 64,
    }
}

/// 两种实现，均未打开
fn devices() -> Vec<Box<dyn RoombaDevice>> {
    let serial = RoombaSerial::with_connector(
        MockConnector::new(),
        SerialSettings::new("mock0"),
        &PACKETS,
        fast_config(),
    );
    let dummy = RoombaDummy::with_writer(&PACKETS, std::io::sink());
    vec![Box::new(serial), Box::new(dummy)]
}

#[test]
fn test_initial_state() {
    for device in devices() {
        assert!(!device.is_opened(), "{}", device.port_name());
        assert_eq!(device.sensor_data(), vec![0, 0, 0]);
        assert!(!device.sensor_data_is_valid());
    }
}

#[test]
fn test_state_law() {
    for device in devices() {
        let name = device.port_name().to_string();

        assert!(matches!(device.close(), Err(DriverError::NotOpen)), "{}", name);
        assert!(matches!(device.drive(100, 0), Err(DriverError::NotOpen)), "{}", name);
        assert!(
            matches!(
                device.motors(true, false, true, false, true),
                Err(DriverError::NotOpen)
            ),
            "{}",
            name
        );

        device.open(true).unwrap();
        assert!(device.is_opened());
        assert!(matches!(device.open(false), Err(DriverError::AlreadyOpen)), "{}", name);
        device.drive(100, 0).unwrap();
        device.motors(false, false, false, false, false).unwrap();

        device.close().unwrap();
        assert!(!device.is_opened());
        assert!(matches!(device.close(), Err(DriverError::NotOpen)), "{}", name);

        // 可以再次打开
        device.open(false).unwrap();
        device.close().unwrap();
    }
}

#[test]
fn test_sensor_packets_requested_is_a_copy() {
    for device in devices() {
        let mut requested = device.sensor_packets_requested();
        assert_eq!(requested, PACKETS.to_vec());
        requested.clear();
        assert_eq!(device.sensor_packets_requested(), PACKETS.to_vec());
    }
}

#[test]
fn test_sensor_data_is_a_copy() {
    let dummy = RoombaDummy::with_writer(&PACKETS, std::io::sink());
    dummy.inject_sensor_data(&[1, 2, 3]);
    let mut data = dummy.sensor_data();
    data[0] = 99;
    assert_eq!(dummy.sensor_data(), vec![1, 2, 3]);
}

#[test]
fn test_last_listener_wins() {
    let dummy = RoombaDummy::with_writer(&PACKETS, std::io::sink());
    let first = Arc::new(AtomicUsize::new(0));
    let second = Arc::new(AtomicUsize::new(0));

    let counter = first.clone();
    dummy.set_sensor_packet_listener(Arc::new(move || {
        counter.fetch_add(1, Ordering::SeqCst);
    }));
    let counter = second.clone();
    dummy.set_sensor_packet_listener(Arc::new(move || {
        counter.fetch_add(1, Ordering::SeqCst);
    }));

    dummy.inject_sensor_data(&[0, 0, 0]);
    dummy.inject_sensor_data(&[0, 0, 0]);

    assert_eq!(first.load(Ordering::SeqCst), 0);
    assert_eq!(second.load(Ordering::SeqCst), 2);
}

#[test]
fn test_dummy_never_writes_to_the_wire() {
    // 测试替身不依赖任何连接；构造、打开、命令都不需要串口
    let dummy = RoombaDummy::with_writer(&PACKETS, std::io::sink());
    dummy.open(true).unwrap();
    dummy.drive(500, 1).unwrap();
    dummy.close().unwrap();
    assert_eq!(dummy.port_name(), "dummy");
    assert!(!dummy.sensor_data_is_valid());
}
