mod common;

use std::fs;
use std::sync::{Arc, Mutex};

use common::{fake_context, sysfs_tree};
use peripheral_manager::gpio::{
    ActiveType, EdgeType, GpioDirection, GpioDriver, GpioDriverSysfs, PinDirection,
};
use peripheral_manager::{Error, PinMuxCallbacks};

fn attr(root: &tempfile::TempDir, index: u32, name: &str) -> String {
    fs::read_to_string(root.path().join(format!("gpio{index}")).join(name))
        .unwrap()
}

// ---------------------------------------------------------------------------
// Sysfs driver
// ---------------------------------------------------------------------------

#[test]
fn init_uses_exported_directory() {
    let root = sysfs_tree(&[17]);
    let mut driver = GpioDriverSysfs::new(root.path());
    driver.init(17).unwrap();
    assert_eq!(fs::read_to_string(root.path().join("export")).unwrap(), "");
}

#[test]
fn init_exports_missing_line() {
    let root = sysfs_tree(&[]);
    let mut driver = GpioDriverSysfs::new(root.path());

    // Nothing creates gpio23 here, so init fails after writing the export.
    let err = driver.init(23).unwrap_err();
    assert!(matches!(err, Error::RemoteIo(_)));
    assert_eq!(fs::read_to_string(root.path().join("export")).unwrap(), "23");
}

#[test]
fn value_round_trip() {
    let root = sysfs_tree(&[4]);
    let mut driver = GpioDriverSysfs::new(root.path());
    driver.init(4).unwrap();

    driver.set_value(true).unwrap();
    assert_eq!(attr(&root, 4, "value"), "1");
    assert!(driver.value().unwrap());

    driver.set_value(false).unwrap();
    assert_eq!(attr(&root, 4, "value"), "0");
    assert!(!driver.value().unwrap());
}

#[test]
fn value_other_than_one_reads_low() {
    let root = sysfs_tree(&[4]);
    let mut driver = GpioDriverSysfs::new(root.path());
    driver.init(4).unwrap();
    fs::write(root.path().join("gpio4/value"), "x\n").unwrap();
    assert!(!driver.value().unwrap());
}

#[test]
fn direction_tokens() {
    let root = sysfs_tree(&[5]);
    let mut driver = GpioDriverSysfs::new(root.path());
    driver.init(5).unwrap();

    for (direction, token) in [
        (GpioDirection::In, "in"),
        (GpioDirection::OutInitiallyHigh, "high"),
        (GpioDirection::OutInitiallyLow, "low"),
    ] {
        driver.set_direction(direction).unwrap();
        assert_eq!(attr(&root, 5, "direction"), token);
    }

    fs::write(root.path().join("gpio5/direction"), "out\n").unwrap();
    assert_eq!(driver.direction().unwrap(), PinDirection::Out);
    fs::write(root.path().join("gpio5/direction"), "in\n").unwrap();
    assert_eq!(driver.direction().unwrap(), PinDirection::In);
}

#[test]
fn edge_and_active_level() {
    let root = sysfs_tree(&[6]);
    let mut driver = GpioDriverSysfs::new(root.path());
    driver.init(6).unwrap();

    driver.set_edge_trigger(EdgeType::Both).unwrap();
    assert_eq!(attr(&root, 6, "edge"), "both");
    driver.set_edge_trigger(EdgeType::Rising).unwrap();
    assert_eq!(attr(&root, 6, "edge"), "rising");

    driver.set_active_type(ActiveType::ActiveLow).unwrap();
    assert_eq!(attr(&root, 6, "active_low"), "1");
    driver.set_active_type(ActiveType::ActiveHigh).unwrap();
    assert_eq!(attr(&root, 6, "active_low"), "0");
}

#[test]
fn unbound_driver_reports_not_open() {
    let root = sysfs_tree(&[]);
    let driver = GpioDriverSysfs::new(root.path());
    assert!(matches!(driver.value(), Err(Error::NotOpen(_))));
}

// ---------------------------------------------------------------------------
// Manager and handle
// ---------------------------------------------------------------------------

#[test]
fn open_set_get() {
    let (ctx, _kernel, root) = fake_context(&[18]);
    ctx.gpio().register_sysfs_gpio("LED", 18).unwrap();

    let mut pin = ctx.gpio().open("LED").unwrap();
    pin.set_direction(GpioDirection::OutInitiallyLow).unwrap();
    pin.set_value(true).unwrap();
    assert!(pin.value().unwrap());
    pin.set_value(false).unwrap();
    assert!(!pin.value().unwrap());
    assert_eq!(attr(&root, 18, "direction"), "low");

    let fd = pin.polling_fd().unwrap();
    drop(fd);
}

#[test]
fn second_open_is_busy_until_drop() {
    let (ctx, _kernel, _root) = fake_context(&[18]);
    ctx.gpio().register_sysfs_gpio("LED", 18).unwrap();

    let pin = ctx.gpio().open("LED").unwrap();
    assert!(ctx.gpio().is_open("LED"));
    assert!(matches!(ctx.gpio().open("LED"), Err(Error::Busy(_))));

    drop(pin);
    assert!(!ctx.gpio().is_open("LED"));
    ctx.gpio().open("LED").unwrap();
}

#[test]
fn unknown_name_not_found() {
    let (ctx, _kernel, _root) = fake_context(&[]);
    assert!(matches!(ctx.gpio().open("NOPE"), Err(Error::NotFound(_))));
    assert!(matches!(
        ctx.gpio().set_pin_mux("NOPE", "gpio4"),
        Err(Error::NotFound(_))
    ));
}

#[test]
fn registration_and_listing() {
    let (ctx, _kernel, _root) = fake_context(&[]);
    ctx.gpio().register_sysfs_gpio("B", 2).unwrap();
    ctx.gpio().register_sysfs_gpio("A", 1).unwrap();
    assert!(matches!(
        ctx.gpio().register_sysfs_gpio("A", 3),
        Err(Error::AlreadyRegistered(_))
    ));
    let mut names = ctx.gpio().gpios();
    names.sort();
    assert_eq!(names, vec!["A", "B"]);
    assert!(ctx.gpio().has_gpio("A"));
    assert!(!ctx.gpio().has_gpio("C"));
}

#[test]
fn failed_init_leaves_entry_free() {
    let (ctx, _kernel, _root) = fake_context(&[]);
    ctx.gpio().register_sysfs_gpio("GHOST", 99).unwrap();
    assert!(ctx.gpio().open("GHOST").is_err());
    assert!(!ctx.gpio().is_open("GHOST"));
}

#[test]
fn mux_pin_held_while_open_and_direction_forwarded() {
    let (ctx, _kernel, _root) = fake_context(&[4]);
    let directions = Arc::new(Mutex::new(Vec::new()));
    let record = Arc::clone(&directions);
    ctx.pinmux()
        .register_pin(
            "gpio4",
            true,
            PinMuxCallbacks::new().with_direction(move |_, output| {
                record.lock().unwrap().push(output);
                Ok(())
            }),
        )
        .unwrap();
    ctx.gpio().register_sysfs_gpio("BUTTON", 4).unwrap();
    ctx.gpio().set_pin_mux("BUTTON", "gpio4").unwrap();

    let mut pin = ctx.gpio().open("BUTTON").unwrap();
    assert_eq!(ctx.pinmux().pin_in_use("gpio4"), Some(true));
    assert!(matches!(
        ctx.gpio().set_pin_mux("BUTTON", "gpio4"),
        Err(Error::Busy(_))
    ));

    pin.set_direction(GpioDirection::In).unwrap();
    pin.set_direction(GpioDirection::OutInitiallyHigh).unwrap();
    assert_eq!(*directions.lock().unwrap(), vec![false, true]);

    drop(pin);
    assert_eq!(ctx.pinmux().pin_in_use("gpio4"), Some(false));
}

#[test]
fn pad_direction_reverted_when_line_refuses() {
    let (ctx, _kernel, root) = fake_context(&[4]);
    let directions = Arc::new(Mutex::new(Vec::new()));
    let record = Arc::clone(&directions);
    ctx.pinmux()
        .register_pin(
            "gpio4",
            true,
            PinMuxCallbacks::new().with_direction(move |_, output| {
                record.lock().unwrap().push(output);
                Ok(())
            }),
        )
        .unwrap();
    ctx.gpio().register_sysfs_gpio("BUTTON", 4).unwrap();
    ctx.gpio().set_pin_mux("BUTTON", "gpio4").unwrap();

    let mut pin = ctx.gpio().open("BUTTON").unwrap();
    pin.set_direction(GpioDirection::In).unwrap();

    fs::remove_file(root.path().join("gpio4/direction")).unwrap();
    assert!(pin.set_direction(GpioDirection::OutInitiallyHigh).is_err());

    // switched for the attempt, then back to input
    assert_eq!(*directions.lock().unwrap(), vec![false, true, false]);
}

#[test]
fn mux_conflict_fails_open_cleanly() {
    let (ctx, _kernel, _root) = fake_context(&[2]);
    ctx.pinmux()
        .register_pin("gpio2", true, PinMuxCallbacks::new())
        .unwrap();
    ctx.pinmux().register_simple_source("I2C1", ["gpio2"]).unwrap();
    ctx.gpio().register_sysfs_gpio("SDA", 2).unwrap();
    ctx.gpio().set_pin_mux("SDA", "gpio2").unwrap();

    ctx.pinmux().set_simple_source("I2C1").unwrap();
    assert!(matches!(ctx.gpio().open("SDA"), Err(Error::Busy(_))));
    assert!(!ctx.gpio().is_open("SDA"));

    ctx.pinmux().release_source("I2C1", "I2C1");
    ctx.gpio().open("SDA").unwrap();
}
