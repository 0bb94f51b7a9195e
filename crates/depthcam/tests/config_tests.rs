use std::time::Duration;

use depthcam::{CameraConfig, Resolution, RetryPolicy};

#[test]
fn test_config_defaults() {
    let config = CameraConfig::default();
    assert_eq!(config.rgb_resolution(), Resolution::Hd);
    assert_eq!(config.depth_resolution(), Resolution::Hd);
    assert_eq!(config.fps(), 30);
    assert_eq!(config.serial_number(), None);
    assert!(!config.depth_in_meters());
    assert_eq!(config.wait_timeout(), Duration::from_secs(5));
    assert_eq!(config.retry().max_attempts(), 6);
    assert_eq!(config.retry().delay(), Duration::from_secs(3));
}

#[test]
fn test_config_builders() {
    let config = CameraConfig::default()
        .with_rgb_resolution(Resolution::FullHd)
        .with_depth_resolution(Resolution::Vga)
        .with_fps(60)
        .with_serial_number("836612".to_string())
        .with_depth_in_meters(true)
        .with_wait_timeout(Duration::from_millis(250))
        .with_retry(RetryPolicy::new(3, Duration::from_millis(50)));

    assert_eq!(config.rgb_resolution(), Resolution::FullHd);
    assert_eq!(config.depth_resolution(), Resolution::Vga);
    assert_eq!(config.fps(), 60);
    assert_eq!(config.serial_number(), Some("836612"));
    assert!(config.depth_in_meters());
    assert_eq!(config.wait_timeout(), Duration::from_millis(250));
    assert_eq!(config.retry().max_attempts(), 3);
}

#[test]
fn test_resolution_dimensions() {
    assert_eq!(Resolution::Vga.dimensions(), (640, 480));
    assert_eq!(Resolution::Hd.dimensions(), (1280, 720));
    assert_eq!(Resolution::FullHd.dimensions(), (1920, 1080));
}

#[test]
fn test_retry_policy_needs_at_least_one_attempt() {
    let policy = RetryPolicy::new(0, Duration::ZERO);
    assert_eq!(policy.max_attempts(), 1);
}
