use crate::error::{BlockchainError, Result};
use serde::{Deserialize, Serialize};
use serde_json::Deserializer;
use std::io::{Read, Write};

/// Remote-call method carrying a JSON-encoded block
pub const HANDLE_BLOCK: &str = "HandleBlock";
/// Remote-call method carrying a serialized transaction
pub const HANDLE_TRANSACTION: &str = "HandleTransaction";

/// Stream message tags
pub const MSG_BLOCK: &str = "block";
pub const MSG_TRANSACTION: &str = "transaction";

/// Tagged payload pushed over a persistent peer connection
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireMessage {
    #[serde(rename = "Type")]
    msg_type: String,
    #[serde(rename = "Payload")]
    payload: String,
}

impl WireMessage {
    pub fn new(msg_type: &str, payload: &str) -> WireMessage {
        WireMessage {
            msg_type: msg_type.to_string(),
            payload: payload.to_string(),
        }
    }

    pub fn get_type(&self) -> &str {
        self.msg_type.as_str()
    }

    pub fn get_payload(&self) -> &str {
        self.payload.as_str()
    }
}

/// Everything that travels between nodes. Packages are JSON objects written
/// back to back, so each one delimits itself on the byte stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Package {
    Call { method: String, payload: String },
    Reply { reply: String },
    Fault { message: String },
    Message(WireMessage),
}

pub fn write_package<W: Write>(writer: &mut W, pkg: &Package) -> Result<()> {
    serde_json::to_writer(&mut *writer, pkg)
        .map_err(|e| BlockchainError::Network(format!("Failed to send package: {e}")))?;
    writer
        .flush()
        .map_err(|e| BlockchainError::Network(format!("Failed to flush package: {e}")))?;
    Ok(())
}

/// Read exactly one package; `Ok(None)` means the peer closed the stream
pub fn read_package<R: Read>(reader: R) -> Result<Option<Package>> {
    match Deserializer::from_reader(reader).into_iter::<Package>().next() {
        None => Ok(None),
        Some(Ok(pkg)) => Ok(Some(pkg)),
        Some(Err(e)) => Err(BlockchainError::Network(format!(
            "Failed to deserialize package: {e}"
        ))),
    }
}
