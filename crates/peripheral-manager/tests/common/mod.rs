#![allow(dead_code)]

use std::collections::{BTreeMap, VecDeque};
use std::fs;
use std::io;
use std::os::raw::{c_int, c_void};
use std::os::unix::io::RawFd;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use libc::{termios, Ioctl};
use peripheral_manager::sys::{
    spi_ioc_message, I2cSmbusIoctlData, SpiIocTransfer, I2C_SLAVE, I2C_SMBUS,
    I2C_SMBUS_BYTE_DATA, I2C_SMBUS_I2C_BLOCK_DATA, I2C_SMBUS_READ,
    I2C_SMBUS_WORD_DATA, SPI_IOC_RD_MAX_SPEED_HZ, SPI_IOC_WR_BITS_PER_WORD,
    SPI_IOC_WR_LSB_FIRST, SPI_IOC_WR_MODE,
};
use peripheral_manager::{
    CharDevice, CharDeviceFactory, DriverParams, PeripheralContext,
};
use tempfile::TempDir;

const SPI_IOC_MESSAGE_1: Ioctl = spi_ioc_message(1);

// ---------------------------------------------------------------------------
// Fake kernel
// ---------------------------------------------------------------------------

/// One SMBus transaction as the kernel saw it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SmbusCall {
    pub read_write: u8,
    pub command: u8,
    pub size: u32,
}

/// State shared by every device the fake factory hands out.
pub struct FakeState {
    next_fd: RawFd,
    pub flags: BTreeMap<RawFd, c_int>,
    pub opened: Vec<PathBuf>,
    pub closed: Vec<RawFd>,
    pub requests: Vec<Ioctl>,
    pub fail_open: bool,
    pub fail_request: Option<Ioctl>,

    // i2c-dev
    pub slave_address: Option<usize>,
    pub smbus: Vec<SmbusCall>,
    pub regs: Vec<u8>,

    // spidev
    pub max_speed_hz: u32,
    pub mode: u8,
    pub lsb_first: u8,
    pub bits_per_word: u8,
    pub transfers: Vec<SpiIocTransfer>,
    pub spi_tx: Vec<Vec<u8>>,

    // tty
    pub termios: termios,

    // raw read/write
    pub rx: VecDeque<u8>,
    pub written: Vec<u8>,
    pub short_write: bool,
}

impl Default for FakeState {
    fn default() -> Self {
        Self {
            next_fd: 100,
            flags: BTreeMap::new(),
            opened: Vec::new(),
            closed: Vec::new(),
            requests: Vec::new(),
            fail_open: false,
            fail_request: None,
            slave_address: None,
            smbus: Vec::new(),
            regs: vec![0; 512],
            max_speed_hz: 10_000_000,
            mode: 0,
            lsb_first: 0,
            bits_per_word: 8,
            transfers: Vec::new(),
            spi_tx: Vec::new(),
            // SAFETY: all-zero is a valid termios.
            termios: unsafe { std::mem::zeroed() },
            rx: VecDeque::new(),
            written: Vec::new(),
            short_write: false,
        }
    }
}

impl FakeState {
    pub fn open_fds(&self) -> usize {
        self.flags.len()
    }

    pub fn count(&self, request: Ioctl) -> usize {
        self.requests.iter().filter(|r| **r == request).count()
    }
}

struct FakeCharDevice {
    state: Arc<Mutex<FakeState>>,
}

impl CharDevice for FakeCharDevice {
    fn open(&mut self, path: &Path, flags: c_int) -> io::Result<RawFd> {
        let mut state = self.state.lock().unwrap();
        if state.fail_open {
            return Err(io::Error::from_raw_os_error(libc::ENOENT));
        }
        let fd = state.next_fd;
        state.next_fd += 1;
        state.flags.insert(fd, flags);
        state.opened.push(path.to_path_buf());
        Ok(fd)
    }

    fn close(&mut self, fd: RawFd) -> io::Result<()> {
        let mut state = self.state.lock().unwrap();
        state.flags.remove(&fd);
        state.closed.push(fd);
        Ok(())
    }

    unsafe fn ioctl(
        &mut self,
        fd: RawFd,
        request: Ioctl,
        arg: *mut c_void,
    ) -> io::Result<c_int> {
        let mut state = self.state.lock().unwrap();
        assert!(state.flags.contains_key(&fd), "ioctl on closed fd {fd}");
        state.requests.push(request);
        if state.fail_request == Some(request) {
            return Err(io::Error::from_raw_os_error(libc::EIO));
        }

        match request {
            I2C_SLAVE => state.slave_address = Some(arg as usize),
            I2C_SMBUS => {
                let args = &mut *(arg as *mut I2cSmbusIoctlData);
                let data = &mut *args.data;
                let reg = args.command as usize;
                state.smbus.push(SmbusCall {
                    read_write: args.read_write,
                    command: args.command,
                    size: args.size,
                });
                let read = args.read_write == I2C_SMBUS_READ;
                match args.size {
                    I2C_SMBUS_BYTE_DATA if read => data.byte = state.regs[reg],
                    I2C_SMBUS_BYTE_DATA => state.regs[reg] = data.byte,
                    I2C_SMBUS_WORD_DATA if read => {
                        data.word =
                            u16::from_ne_bytes([state.regs[reg], state.regs[reg + 1]])
                    }
                    I2C_SMBUS_WORD_DATA => {
                        let bytes = data.word.to_ne_bytes();
                        state.regs[reg..reg + 2].copy_from_slice(&bytes);
                    }
                    I2C_SMBUS_I2C_BLOCK_DATA => {
                        let len = data.block[0] as usize;
                        if read {
                            let src = state.regs[reg..reg + len].to_vec();
                            data.block[1..=len].copy_from_slice(&src);
                        } else {
                            let src = data.block[1..=len].to_vec();
                            state.regs[reg..reg + len].copy_from_slice(&src);
                        }
                    }
                    other => panic!("unexpected smbus size {other}"),
                }
            }
            SPI_IOC_RD_MAX_SPEED_HZ => *(arg as *mut u32) = state.max_speed_hz,
            SPI_IOC_WR_MODE => state.mode = *(arg as *const u8),
            SPI_IOC_WR_LSB_FIRST => state.lsb_first = *(arg as *const u8),
            SPI_IOC_WR_BITS_PER_WORD => {
                state.bits_per_word = *(arg as *const u8)
            }
            SPI_IOC_MESSAGE_1 => {
                let msg = *(arg as *const SpiIocTransfer);
                let len = msg.len as usize;
                let tx = if msg.tx_buf != 0 {
                    std::slice::from_raw_parts(msg.tx_buf as *const u8, len)
                        .to_vec()
                } else {
                    vec![0; len]
                };
                if msg.rx_buf != 0 {
                    // Loopback, inverted so a test can tell rx from tx.
                    let rx = std::slice::from_raw_parts_mut(
                        msg.rx_buf as *mut u8,
                        len,
                    );
                    for (r, t) in rx.iter_mut().zip(&tx) {
                        *r = !*t;
                    }
                }
                state.transfers.push(msg);
                state.spi_tx.push(tx);
            }
            libc::TCGETS => *(arg as *mut termios) = state.termios,
            libc::TCSETS | libc::TCSETSF => {
                state.termios = *(arg as *const termios)
            }
            other => panic!("unexpected ioctl {other:#x}"),
        }
        Ok(0)
    }

    fn read(&mut self, fd: RawFd, buf: &mut [u8]) -> io::Result<usize> {
        let mut state = self.state.lock().unwrap();
        let nonblocking = state.flags[&fd] & libc::O_NONBLOCK != 0;
        if state.rx.is_empty() && nonblocking {
            return Err(io::Error::from_raw_os_error(libc::EAGAIN));
        }
        let n = buf.len().min(state.rx.len());
        for (dst, src) in buf.iter_mut().zip(state.rx.drain(..n)) {
            *dst = src;
        }
        Ok(n)
    }

    fn write(&mut self, _fd: RawFd, buf: &[u8]) -> io::Result<usize> {
        let mut state = self.state.lock().unwrap();
        let n = if state.short_write { buf.len() / 2 } else { buf.len() };
        state.written.extend_from_slice(&buf[..n]);
        Ok(n)
    }
}

/// Factory handing out devices that share one [`FakeState`].
#[derive(Clone, Default)]
pub struct FakeKernel {
    state: Arc<Mutex<FakeState>>,
}

impl FakeKernel {
    pub fn state(&self) -> MutexGuard<'_, FakeState> {
        self.state.lock().unwrap()
    }
}

impl CharDeviceFactory for FakeKernel {
    fn new_char_device(&self) -> Box<dyn CharDevice> {
        Box::new(FakeCharDevice { state: Arc::clone(&self.state) })
    }
}

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

/// A `/sys/class/gpio` look-alike with the given lines already exported.
pub fn sysfs_tree(exported: &[u32]) -> TempDir {
    let root = tempfile::tempdir().unwrap();
    fs::write(root.path().join("export"), "").unwrap();
    for index in exported {
        let dir = root.path().join(format!("gpio{index}"));
        fs::create_dir(&dir).unwrap();
        fs::write(dir.join("value"), "0\n").unwrap();
        fs::write(dir.join("direction"), "in\n").unwrap();
        fs::write(dir.join("edge"), "none\n").unwrap();
        fs::write(dir.join("active_low"), "0\n").unwrap();
    }
    root
}

/// A context with the default drivers pointed at a fake kernel and a
/// temporary sysfs tree.
pub fn fake_context(exported: &[u32]) -> (PeripheralContext, FakeKernel, TempDir) {
    let kernel = FakeKernel::default();
    let sysfs = sysfs_tree(exported);
    let params = DriverParams {
        gpio_sysfs_root: sysfs.path().to_path_buf(),
        dev_root: PathBuf::from("/dev"),
        char_devices: Some(Arc::new(kernel.clone())),
    };
    let ctx = PeripheralContext::with_default_drivers(&params).unwrap();
    (ctx, kernel, sysfs)
}
