use std::{error::Error, fmt, io, net::SocketAddr};

use model::MlErr;

/// The server's result type.
pub type Result<T> = std::result::Result<T, ServerErr>;

/// Artifact server failures.
///
/// Everything but `Connection` is fatal for the process.
#[derive(Debug)]
pub enum ServerErr {
    Bind {
        addr: String,
        source: io::Error,
    },
    /// A single client could not be served, the listener keeps going.
    Connection {
        peer: SocketAddr,
        source: io::Error,
    },
    Compile(MlErr),
    Config(String),
    Io(io::Error),
}

impl ServerErr {
    pub fn is_fatal(&self) -> bool {
        !matches!(self, ServerErr::Connection { .. })
    }
}

impl fmt::Display for ServerErr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServerErr::Bind { addr, source } => write!(f, "failed to bind {addr}: {source}"),
            ServerErr::Connection { peer, source } => {
                write!(f, "failed to serve client {peer}: {source}")
            }
            ServerErr::Compile(e) => write!(f, "failed to compile the model: {e}"),
            ServerErr::Config(msg) => write!(f, "invalid configuration: {msg}"),
            ServerErr::Io(e) => write!(f, "io error: {e}"),
        }
    }
}

impl Error for ServerErr {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            ServerErr::Bind { source, .. } | ServerErr::Connection { source, .. } => Some(source),
            ServerErr::Compile(e) => Some(e),
            ServerErr::Io(e) => Some(e),
            ServerErr::Config(_) => None,
        }
    }
}

impl From<io::Error> for ServerErr {
    fn from(value: io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<MlErr> for ServerErr {
    fn from(value: MlErr) -> Self {
        Self::Compile(value)
    }
}
