//! Wire types for the node agent boundary.
//!
//! The agent expects ports as decimal strings, both in `/start` bodies and
//! in its `/status` map, so [`port_string`] adapts `u16` fields to that form.

use serde::{Deserialize, Serialize};

/// Body of `POST /start` on a node agent.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StartRequest {
    pub id: String,
    pub binary: String,
    #[serde(with = "port_string")]
    pub port: u16,
    #[serde(default)]
    pub args: Vec<String>,
}

/// Serde adapter encoding a port number as a decimal string.
pub mod port_string {
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(port: &u16, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&port.to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u16, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Port {
            Text(String),
            Number(u16),
        }

        match Port::deserialize(deserializer)? {
            Port::Number(port) => Ok(port),
            Port::Text(text) => text
                .trim()
                .parse()
                .map_err(|_| de::Error::custom(format!("invalid port: {:?}", text))),
        }
    }
}
