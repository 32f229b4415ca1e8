use std::io;

use derive_more::{Display, From};

pub type Result<T> = std::result::Result<T, Error>;

/// Errors reported by the arbitration table, the managers, the handles and
/// the drivers.
#[derive(Debug, Display, From)]
pub enum Error {
    /// No resource, pin, group or source is registered under this name.
    #[display("{_0} not found")]
    #[from(skip)]
    NotFound(String),
    /// The resource or one of its pins is already held.
    #[display("{_0} is busy")]
    #[from(skip)]
    Busy(String),
    /// A parameter is out of range. Raised before any kernel I/O.
    #[display("invalid argument: {_0}")]
    #[from(skip)]
    InvalidArgument(String),
    /// The name is registered but has no open handle.
    #[display("{_0} is not open")]
    #[from(skip)]
    NotOpen(String),
    /// A registration used a name that already exists.
    #[display("{_0} is already registered")]
    #[from(skip)]
    AlreadyRegistered(String),
    /// No driver is registered under this compat key.
    #[display("no driver registered for {_0}")]
    #[from(skip)]
    NoDriver(String),
    /// Driver registration attempted after startup.
    #[display("driver registry is sealed, cannot register {_0}")]
    #[from(skip)]
    RegistrySealed(String),
    /// A non-blocking descriptor had nothing to deliver.
    #[display("operation would block")]
    #[from(skip)]
    WouldBlock,
    /// The kernel call failed or transferred fewer bytes than requested.
    #[display("remote I/O error: {_0}")]
    RemoteIo(io::Error),
}

impl Error {
    /// The POSIX error code an IPC layer should report for this error.
    pub fn errno(&self) -> i32 {
        match self {
            Error::NotFound(_) => libc::ENODEV,
            Error::Busy(_) => libc::EBUSY,
            Error::InvalidArgument(_) => libc::EINVAL,
            Error::NotOpen(_) => libc::EPERM,
            Error::AlreadyRegistered(_) => libc::EEXIST,
            Error::NoDriver(_) => libc::ENOENT,
            Error::RegistrySealed(_) => libc::EPERM,
            Error::WouldBlock => libc::EAGAIN,
            Error::RemoteIo(_) => libc::EREMOTEIO,
        }
    }

    /// Short-transfer and generic kernel failures share this constructor.
    pub(crate) fn io_failure(what: &str) -> Self {
        Error::RemoteIo(io::Error::new(io::ErrorKind::Other, what.to_owned()))
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::RemoteIo(e) => Some(e),
            _ => None,
        }
    }
}
