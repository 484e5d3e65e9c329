//! TCP connection setup.

use sp_core::SpliceError;
use sp_core::SpliceResult;
use std::io::Read;
use std::io::Write;
use std::net::SocketAddr;
use std::net::TcpStream;
use std::time::Duration;

/// Object-safe byte stream the client writes requests to and reads responses from.
pub trait IoStream: Read + Write + Send {}
impl<T> IoStream for T where T: Read + Write + Send {}

pub type BoxedIoStream = Box<dyn IoStream>;

pub trait Transport {
    fn connect(&self, address: SocketAddr, timeout: Duration) -> SpliceResult<TcpStream>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TcpTransport;

impl Transport for TcpTransport {
    fn connect(&self, address: SocketAddr, timeout: Duration) -> SpliceResult<TcpStream> {
        let stream = TcpStream::connect_timeout(&address, timeout).map_err(|error| {
            SpliceError::new(
                "net.transport.connect_failed",
                format!("failed to connect to `{address}`: {error}"),
            )
        })?;

        stream.set_nodelay(true).map_err(|error| {
            SpliceError::new(
                "net.transport.nodelay_failed",
                format!("failed to enable TCP_NODELAY for `{address}`: {error}"),
            )
        })?;

        // Reads are left unbounded: navigation fetches have no request timeout.
        stream.set_write_timeout(Some(timeout)).map_err(|error| {
            SpliceError::new(
                "net.transport.write_timeout_failed",
                format!("failed to set write timeout for `{address}`: {error}"),
            )
        })?;

        Ok(stream)
    }
}

pub(crate) fn connect_first_available<T: Transport>(
    transport: &T,
    addresses: &[SocketAddr],
    timeout: Duration,
) -> SpliceResult<TcpStream> {
    let mut last_error: Option<SpliceError> = None;

    for address in addresses {
        match transport.connect(*address, timeout) {
            Ok(stream) => return Ok(stream),
            Err(error) => last_error = Some(error),
        }
    }

    Err(last_error.unwrap_or_else(|| {
        SpliceError::new(
            "net.transport.no_addresses",
            "no addresses available to open a connection",
        )
    }))
}

#[cfg(test)]
mod tests {
    use super::TcpTransport;
    use super::connect_first_available;
    use std::time::Duration;

    #[test]
    fn empty_address_list_is_an_error() {
        let result = connect_first_available(&TcpTransport, &[], Duration::from_millis(10));
        match result {
            Ok(_) => panic!("expected an error"),
            Err(error) => assert_eq!(error.code, "net.transport.no_addresses"),
        }
    }
}
