use std::{
    io,
    net::{SocketAddr, TcpStream},
    time::Duration,
};

use super::PortState;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(1);

/// A bounded-time connection attempt against one port. Implementations
/// classify every failure themselves; nothing unwinds past this boundary.
pub trait Probe: Sync {
    fn connect(&self, addr: SocketAddr) -> PortState;
}

/// Plain TCP connect probe.
#[derive(Debug, Clone, Copy)]
pub struct ConnectProbe {
    timeout: Duration,
}

impl ConnectProbe {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    fn classify(attempt: io::Result<TcpStream>) -> PortState {
        match attempt {
            // Dropping the stream closes the socket right away.
            Ok(stream) => {
                drop(stream);
                PortState::Open
            }
            Err(e)
                if matches!(
                    e.kind(),
                    io::ErrorKind::ConnectionRefused | io::ErrorKind::TimedOut
                ) =>
            {
                PortState::Closed
            }
            Err(e) => PortState::Failed(e.to_string()),
        }
    }
}

impl Default for ConnectProbe {
    fn default() -> Self {
        Self::new(DEFAULT_TIMEOUT)
    }
}

impl Probe for ConnectProbe {
    fn connect(&self, addr: SocketAddr) -> PortState {
        Self::classify(TcpStream::connect_timeout(&addr, self.timeout))
    }
}
