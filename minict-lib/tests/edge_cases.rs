mod common;
use common::*;

use std::time::Duration;

#[tokio::test]
async fn test_invalid_arguments_send_nothing() {
    let (mut driver, mut device, _links) = started().await;

    assert!(matches!(driver.set_mode(3).await, Err(MiniCtError::InvalidArgument(_))));
    assert!(matches!(driver.set_output_format("XML").await, Err(MiniCtError::InvalidArgument(_))));
    assert!(matches!(driver.set_delimiter("BBBB").await, Err(MiniCtError::InvalidArgument(_))));
    assert!(matches!(driver.set_delimiter("").await, Err(MiniCtError::InvalidArgument(_))));

    device.assert_silent(Duration::from_millis(50)).await;
    assert_eq!(driver.output_format(), OutputFormat::Raw3);
    assert_eq!(driver.delimiter(), "\t");

    driver.stop().await;
}

#[tokio::test]
async fn test_interrupt_times_out_without_notice() {
    let (mut driver, mut device, _links) = started().await;

    driver.continuous(1).await.unwrap();
    device.expect_line().await;

    let result = driver.interrupt().await;
    assert!(matches!(result, Err(MiniCtError::Timeout(_))));
    assert_eq!(device.expect_line().await, "#");
    assert_eq!(driver.mode(), Mode::Continuous);

    driver.stop().await;
}

#[tokio::test]
async fn test_unsolicited_notice_leaves_continuous() {
    let (mut driver, mut device, _links) = started().await;

    driver.continuous(2).await.unwrap();
    device.expect_line().await;
    device.reply(&["> interrupted"]).await;
    wait_for_state(&driver, |s| s.mode == Mode::Interrupted).await;
    assert!(driver.subscribe().borrow().pending.is_none());

    driver.stop().await;
}

#[tokio::test]
async fn test_echo_inside_noise_is_recognised() {
    let (mut driver, mut device, _links) = started().await;

    let device_side = async {
        device.expect_line().await;
        device.reply(&["\u{11}garbage #034"]).await;
    };
    let (result, ()) = tokio::join!(driver.get_serial(), device_side);
    result.unwrap();

    driver.stop().await;
}

#[tokio::test]
async fn test_text_while_streaming_is_dropped() {
    let (mut driver, mut device, _links) = started().await;

    driver.continuous(8).await.unwrap();
    device.expect_line().await;
    device.reply(&["Model: miniCT", "-1.0\t2.0\t3.0", "1.0\t2.0\t3.0"]).await;
    wait_for_state(&driver, |s| s.measurements.is_available()).await;

    assert!(driver.datagram().header.is_empty());
    assert_eq!(driver.get_measurements(), Some(vec![1.0, 2.0, 3.0]));

    driver.stop().await;
}

#[tokio::test]
async fn test_device_hangup_does_not_kill_driver() {
    let (mut driver, device, _links) = started().await;
    drop(device);

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(driver.is_running());
    assert!(matches!(driver.get_version().await, Err(MiniCtError::Io(_))));

    driver.stop().await;
    assert!(!driver.is_running());
}

#[tokio::test]
async fn test_failed_write_leaves_state_untouched() {
    let (mut driver, device, _links) = started().await;
    drop(device);

    assert!(matches!(driver.continuous(4).await, Err(MiniCtError::Io(_))));
    assert_eq!(driver.mode(), Mode::Interrupted);

    assert!(matches!(driver.set_output_format("CSV").await, Err(MiniCtError::Io(_))));
    assert_eq!(driver.output_format(), OutputFormat::Raw3);
    assert_eq!(driver.delimiter(), "\t");

    assert!(matches!(driver.set_delimiter(";").await, Err(MiniCtError::Io(_))));
    assert_eq!(driver.delimiter(), "\t");
    assert!(driver.subscribe().borrow().pending.is_none());

    driver.stop().await;
}

#[tokio::test]
async fn test_non_utf8_line_does_not_stall_reader() {
    // Far longer than the state wait below
    let config = DriverConfig::new("sim").with_read_timeout(Duration::from_secs(30));
    let (mut driver, mut device, _links) = start_driver(driver_with_config(config)).await;

    driver.continuous(1).await.unwrap();
    device.expect_line().await;
    device.send_raw(b"\xff\xfe\x80\r\n7.0\t8.0\t9.0\r\n").await;
    wait_for_state(&driver, |s| s.measurements.is_available()).await;
    assert_eq!(driver.get_measurements(), Some(vec![7.0, 8.0, 9.0]));

    driver.stop().await;
}

#[tokio::test]
async fn test_empty_lines_are_ignored() {
    let (mut driver, mut device, _links) = started().await;

    driver.continuous(1).await.unwrap();
    device.expect_line().await;
    device.reply(&["", "   ", "5.0\t6.0\t7.0"]).await;
    wait_for_state(&driver, |s| s.measurements.is_available()).await;
    assert_eq!(driver.subscribe().borrow().measurements.generation(), 1);

    driver.stop().await;
}

#[tokio::test]
async fn test_drop_without_stop() {
    let (driver, mut device, _links) = started().await;
    drop(driver);
    // Receiver notices the dropped handle and releases the link
    let closed = tokio::time::timeout(STEP, device.next_raw_line()).await.unwrap();
    assert_eq!(closed, None);
}
