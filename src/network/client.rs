use crate::error::{BlockchainError, Result};
use crate::network::message::{read_package, write_package, Package};
use log::debug;
use std::net::{TcpStream, ToSocketAddrs};
use std::time::Duration;

/// Open a TCP connection, bounded by `timeout` when one is configured
pub fn dial(addr: &str, timeout: Option<Duration>) -> Result<TcpStream> {
    let stream = match timeout {
        Some(timeout) => {
            let socket_addr = addr
                .to_socket_addrs()
                .map_err(|e| BlockchainError::Network(format!("Invalid address {addr}: {e}")))?
                .next()
                .ok_or_else(|| BlockchainError::Network(format!("Address {addr} did not resolve")))?;
            let stream = TcpStream::connect_timeout(&socket_addr, timeout)
                .map_err(|e| BlockchainError::Network(format!("Failed to connect to {addr}: {e}")))?;
            stream
                .set_write_timeout(Some(timeout))
                .map_err(|e| BlockchainError::Network(format!("Failed to set write timeout: {e}")))?;
            stream
                .set_read_timeout(Some(timeout))
                .map_err(|e| BlockchainError::Network(format!("Failed to set read timeout: {e}")))?;
            stream
        }
        None => TcpStream::connect(addr)
            .map_err(|e| BlockchainError::Network(format!("Failed to connect to {addr}: {e}")))?,
    };
    Ok(stream)
}

/// Invoke `method` on the node at `addr` and wait for its reply string
pub fn call(addr: &str, method: &str, payload: &str, timeout: Option<Duration>) -> Result<String> {
    let mut stream = dial(addr, timeout)?;
    let request = Package::Call {
        method: method.to_string(),
        payload: payload.to_string(),
    };
    debug!("Calling {method} on {addr}");
    write_package(&mut stream, &request)?;

    loop {
        match read_package(&stream)? {
            Some(Package::Reply { reply }) => return Ok(reply),
            Some(Package::Fault { message }) => {
                return Err(BlockchainError::Network(format!(
                    "{method} failed on {addr}: {message}"
                )))
            }
            // Gossip pushed at us while we wait is not our answer
            Some(other) => debug!("Ignoring {other:?} from {addr} while awaiting reply"),
            None => {
                return Err(BlockchainError::Network(format!(
                    "{addr} closed the connection before replying to {method}"
                )))
            }
        }
    }
}
