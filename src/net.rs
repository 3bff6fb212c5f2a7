//! Address resolution and multi-candidate TCP connect.

use std::io;
use std::net::{TcpStream, ToSocketAddrs};

use tracing::debug;

/// Resolves `host:port` and connects to the first candidate address that
/// accepts. The error of the last failed candidate is reported when none
/// does.
pub fn connect(host: &str, port: u16) -> io::Result<TcpStream> {
    let mut last_err = None;

    for addr in (host, port).to_socket_addrs()? {
        debug!(%addr, "trying candidate address");
        match TcpStream::connect(addr) {
            Ok(stream) => return Ok(stream),
            Err(err) => last_err = Some(err),
        }
    }

    Err(last_err.unwrap_or_else(|| {
        io::Error::new(
            io::ErrorKind::AddrNotAvailable,
            "host resolved to no addresses",
        )
    }))
}
