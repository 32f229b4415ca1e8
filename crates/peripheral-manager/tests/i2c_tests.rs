mod common;

use std::sync::Arc;

use common::{fake_context, FakeKernel, SmbusCall};
use peripheral_manager::sys::{
    I2C_SLAVE, I2C_SMBUS, I2C_SMBUS_BYTE_DATA, I2C_SMBUS_I2C_BLOCK_DATA,
    I2C_SMBUS_READ, I2C_SMBUS_WORD_DATA, I2C_SMBUS_WRITE,
};
use peripheral_manager::i2c::{I2cDriver, I2cDriverI2cDev, I2cManager};
use peripheral_manager::{Error, PeripheralContext, PinMux, PinMuxCallbacks};

fn with_bus(ctx: &PeripheralContext) {
    ctx.i2c().register_i2c_dev_bus("I2C1", 1).unwrap();
}

// ---------------------------------------------------------------------------
// Open / close
// ---------------------------------------------------------------------------

#[test]
fn open_binds_bus_and_address() {
    let (ctx, kernel, _root) = fake_context(&[]);
    with_bus(&ctx);

    let dev = ctx.i2c().open("I2C1", 0x48).unwrap();
    assert_eq!(dev.address(), 0x48);
    assert_eq!(dev.bus_name(), "I2C1");

    let state = kernel.state();
    assert_eq!(state.opened, vec![std::path::PathBuf::from("/dev/i2c-1")]);
    assert_eq!(state.slave_address, Some(0x48));
    assert_eq!(state.count(I2C_SLAVE), 1);
}

#[test]
fn one_handle_per_address() {
    let (ctx, kernel, _root) = fake_context(&[]);
    with_bus(&ctx);

    let a = ctx.i2c().open("I2C1", 0x48).unwrap();
    let b = ctx.i2c().open("I2C1", 0x49).unwrap();
    assert!(matches!(ctx.i2c().open("I2C1", 0x48), Err(Error::Busy(_))));

    drop(a);
    assert!(ctx.i2c().is_open("I2C1"));
    let _a = ctx.i2c().open("I2C1", 0x48).unwrap();
    drop(b);
    assert_eq!(kernel.state().open_fds(), 1);
}

#[test]
fn drop_closes_descriptor() {
    let (ctx, kernel, _root) = fake_context(&[]);
    with_bus(&ctx);
    let dev = ctx.i2c().open("I2C1", 0x20).unwrap();
    assert_eq!(kernel.state().open_fds(), 1);
    drop(dev);
    assert_eq!(kernel.state().open_fds(), 0);
    assert!(!ctx.i2c().is_open("I2C1"));
}

#[test]
fn address_must_be_seven_bit() {
    let (ctx, kernel, _root) = fake_context(&[]);
    with_bus(&ctx);
    assert!(matches!(
        ctx.i2c().open("I2C1", 0x80),
        Err(Error::InvalidArgument(_))
    ));
    assert!(kernel.state().opened.is_empty());
}

#[test]
fn slave_ioctl_failure_leaves_nothing_open() {
    let (ctx, kernel, _root) = fake_context(&[]);
    with_bus(&ctx);
    kernel.state().fail_request = Some(I2C_SLAVE);

    assert!(matches!(ctx.i2c().open("I2C1", 0x10), Err(Error::RemoteIo(_))));
    assert_eq!(kernel.state().open_fds(), 0);
    assert!(!ctx.i2c().is_open("I2C1"));
}

#[test]
fn unknown_bus() {
    let (ctx, _kernel, _root) = fake_context(&[]);
    assert!(matches!(ctx.i2c().open("I2C9", 0x10), Err(Error::NotFound(_))));
}

// ---------------------------------------------------------------------------
// Mux
// ---------------------------------------------------------------------------

#[test]
fn bus_grant_shared_by_all_addresses() {
    let (ctx, _kernel, _root) = fake_context(&[]);
    for pin in ["gpio2", "gpio3"] {
        ctx.pinmux().register_pin(pin, true, PinMuxCallbacks::new()).unwrap();
    }
    ctx.pinmux()
        .register_simple_source("I2C1", ["gpio2", "gpio3"])
        .unwrap();
    with_bus(&ctx);
    ctx.i2c().set_pin_mux("I2C1", "I2C1").unwrap();

    let a = ctx.i2c().open("I2C1", 0x48).unwrap();
    let b = ctx.i2c().open("I2C1", 0x49).unwrap();
    assert_eq!(ctx.pinmux().pin_in_use("gpio2"), Some(true));

    drop(a);
    assert_eq!(ctx.pinmux().pin_in_use("gpio2"), Some(true));
    drop(b);
    assert_eq!(ctx.pinmux().pin_in_use("gpio2"), Some(false));
    assert_eq!(ctx.pinmux().pin_in_use("gpio3"), Some(false));
}

#[test]
fn bus_grant_outlives_its_manager() {
    let kernel = FakeKernel::default();
    let mux = Arc::new(PinMux::new());
    for pin in ["gpio2", "gpio3"] {
        mux.register_pin(pin, true, PinMuxCallbacks::new()).unwrap();
    }
    mux.register_simple_source("I2C1", ["gpio2", "gpio3"]).unwrap();

    let i2c = I2cManager::new(Arc::clone(&mux));
    let source = kernel.clone();
    i2c.register_driver(I2cDriverI2cDev::COMPAT, move || {
        Box::new(I2cDriverI2cDev::new("/dev", Some(Arc::new(source.clone()))))
            as Box<dyn I2cDriver>
    })
    .unwrap();
    i2c.register_i2c_dev_bus("I2C1", 1).unwrap();
    i2c.set_pin_mux("I2C1", "I2C1").unwrap();

    let a = i2c.open("I2C1", 0x48).unwrap();
    let b = i2c.open("I2C1", 0x49).unwrap();
    drop(i2c);

    drop(a);
    assert_eq!(mux.pin_in_use("gpio2"), Some(true));
    drop(b);
    assert_eq!(mux.pin_in_use("gpio2"), Some(false));
    assert_eq!(kernel.state().open_fds(), 0);
}

#[test]
fn mux_grant_failure_discards_driver() {
    let (ctx, kernel, _root) = fake_context(&[]);
    ctx.pinmux()
        .register_pin("gpio2", true, PinMuxCallbacks::new())
        .unwrap();
    ctx.pinmux().register_simple_source("I2C1", ["gpio2"]).unwrap();
    ctx.pinmux().register_simple_source("OTHER", ["gpio2"]).unwrap();
    with_bus(&ctx);
    ctx.i2c()
        .set_pin_mux_with_group("I2C1", "I2C1", "I2C1")
        .unwrap();

    ctx.pinmux().set_simple_source("OTHER").unwrap();
    assert!(matches!(ctx.i2c().open("I2C1", 0x48), Err(Error::Busy(_))));
    assert_eq!(kernel.state().open_fds(), 0);
    assert!(!ctx.i2c().is_open("I2C1"));
}

// ---------------------------------------------------------------------------
// Transactions
// ---------------------------------------------------------------------------

#[test]
fn register_byte_and_word() {
    let (ctx, kernel, _root) = fake_context(&[]);
    with_bus(&ctx);
    let mut dev = ctx.i2c().open("I2C1", 0x48).unwrap();

    dev.write_reg_byte(0x10, 0xab).unwrap();
    assert_eq!(dev.read_reg_byte(0x10).unwrap(), 0xab);

    dev.write_reg_word(0x20, 0x1234).unwrap();
    assert_eq!(dev.read_reg_word(0x20).unwrap(), 0x1234);

    assert_eq!(
        kernel.state().smbus,
        vec![
            SmbusCall {
                read_write: I2C_SMBUS_WRITE,
                command: 0x10,
                size: I2C_SMBUS_BYTE_DATA
            },
            SmbusCall {
                read_write: I2C_SMBUS_READ,
                command: 0x10,
                size: I2C_SMBUS_BYTE_DATA
            },
            SmbusCall {
                read_write: I2C_SMBUS_WRITE,
                command: 0x20,
                size: I2C_SMBUS_WORD_DATA
            },
            SmbusCall {
                read_write: I2C_SMBUS_READ,
                command: 0x20,
                size: I2C_SMBUS_WORD_DATA
            },
        ]
    );
}

#[test]
fn register_block_round_trip() {
    let (ctx, kernel, _root) = fake_context(&[]);
    with_bus(&ctx);
    let mut dev = ctx.i2c().open("I2C1", 0x50).unwrap();

    let data: Vec<u8> = (1..=32).collect();
    dev.write_reg_buffer(0x00, &data).unwrap();
    let mut back = [0u8; 32];
    dev.read_reg_buffer(0x00, &mut back).unwrap();
    assert_eq!(&back[..], &data[..]);
    assert!(kernel
        .state()
        .smbus
        .iter()
        .all(|call| call.size == I2C_SMBUS_I2C_BLOCK_DATA));
}

#[test]
fn block_above_32_bytes_rejected_without_io() {
    let (ctx, kernel, _root) = fake_context(&[]);
    with_bus(&ctx);
    let mut dev = ctx.i2c().open("I2C1", 0x50).unwrap();

    let mut buf = [0u8; 33];
    assert!(matches!(
        dev.read_reg_buffer(0x00, &mut buf),
        Err(Error::InvalidArgument(_))
    ));
    assert!(matches!(
        dev.write_reg_buffer(0x00, &buf),
        Err(Error::InvalidArgument(_))
    ));
    assert_eq!(kernel.state().count(I2C_SMBUS), 0);
}

#[test]
fn smbus_failure_is_remote_io() {
    let (ctx, kernel, _root) = fake_context(&[]);
    with_bus(&ctx);
    let mut dev = ctx.i2c().open("I2C1", 0x48).unwrap();
    kernel.state().fail_request = Some(I2C_SMBUS);
    let err = dev.read_reg_byte(0).unwrap_err();
    assert!(matches!(err, Error::RemoteIo(_)));
    assert_eq!(err.errno(), libc::EREMOTEIO);
}

#[test]
fn raw_transfers_require_full_count() {
    let (ctx, kernel, _root) = fake_context(&[]);
    with_bus(&ctx);
    let mut dev = ctx.i2c().open("I2C1", 0x48).unwrap();

    kernel.state().rx.extend([1, 2, 3, 4]);
    let mut buf = [0u8; 4];
    dev.read(&mut buf).unwrap();
    assert_eq!(buf, [1, 2, 3, 4]);

    kernel.state().rx.extend([9]);
    let mut buf = [0u8; 2];
    assert!(matches!(dev.read(&mut buf), Err(Error::RemoteIo(_))));

    dev.write(&[5, 6]).unwrap();
    assert_eq!(kernel.state().written, vec![5, 6]);

    kernel.state().short_write = true;
    assert!(matches!(dev.write(&[7, 8]), Err(Error::RemoteIo(_))));
}
