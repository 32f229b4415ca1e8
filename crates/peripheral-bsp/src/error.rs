use std::io;

use derive_more::{Display, From};

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Display, From)]
pub enum Error {
    /// Entries the board could not register, by description.
    #[display("{} board entries failed to register: {}", _0.len(), _0.join(", "))]
    #[from(skip)]
    Register(Vec<String>),

    // External
    #[display("reading board description: {_0}")]
    Io(io::Error),
    #[display("parsing board description: {_0}")]
    Json(serde_json::Error),
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(e) => Some(e),
            Error::Json(e) => Some(e),
            Error::Register(_) => None,
        }
    }
}
