use std::{fmt, str::FromStr};

use crate::error::{NostreamError, NostreamResult};

/// What a loader is asked to play: either a replaceable stream event
/// coordinate or a plain event id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamReference {
    /// `<kind>:<pubkey>:<identifier>`
    Address {
        kind: u16,
        pubkey: String,
        identifier: String,
    },
    Event { id: String },
}

impl StreamReference {
    /// Tag name used to find file headers pointing at this reference.
    pub fn tag_name(&self) -> &'static str {
        match self {
            Self::Address { .. } => "a",
            Self::Event { .. } => "e",
        }
    }
}

fn parse_hex32(s: &str, what: &str) -> NostreamResult<String> {
    let bytes = hex::decode(s)
        .map_err(|e| NostreamError::Configuration(format!("invalid {what} {s:?}: {e}")))?;
    if bytes.len() != 32 {
        return Err(NostreamError::Configuration(format!(
            "invalid {what} {s:?}: expected 32 bytes, got {}",
            bytes.len()
        )));
    }
    Ok(hex::encode(bytes))
}

impl FromStr for StreamReference {
    type Err = NostreamError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let s = s.strip_prefix("nostr:").unwrap_or(s);
        if s.is_empty() {
            return Err(NostreamError::Configuration(
                "empty stream reference".to_string(),
            ));
        }

        let mut parts = s.splitn(3, ':');
        match (parts.next(), parts.next(), parts.next()) {
            (Some(kind), Some(pubkey), Some(identifier)) => {
                let kind = kind.parse::<u16>().map_err(|e| {
                    NostreamError::Configuration(format!("invalid kind {kind:?}: {e}"))
                })?;
                Ok(Self::Address {
                    kind,
                    pubkey: parse_hex32(pubkey, "pubkey")?,
                    identifier: identifier.to_string(),
                })
            }
            (Some(id), None, None) => Ok(Self::Event {
                id: parse_hex32(id, "event id")?,
            }),
            _ => Err(NostreamError::Configuration(format!(
                "unrecognized stream reference {s:?}"
            ))),
        }
    }
}

impl fmt::Display for StreamReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Address {
                kind,
                pubkey,
                identifier,
            } => write!(f, "{kind}:{pubkey}:{identifier}"),
            Self::Event { id } => f.write_str(id),
        }
    }
}
