use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use std::{fmt, str::FromStr, sync::Arc};
use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum NodeIdParseError {
    #[error("empty node id string")]
    Empty,
    #[error("invalid namespace in node id: {0}")]
    InvalidNamespace(String),
    #[error("invalid identifier in node id: {0}")]
    InvalidIdentifier(String),
}

/// Identifier part of a [`NodeId`]. GUID and opaque identifiers are not used
/// by this subsystem.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Identifier {
    Numeric(u32),
    String(Arc<str>),
}

/// Address-space node identifier, `ns=<u16>;i=<u32>` or `ns=<u16>;s=<str>`.
/// Namespace 0 is omitted from the text form.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NodeId {
    pub namespace: u16,
    pub identifier: Identifier,
}

impl NodeId {
    pub fn numeric(namespace: u16, id: u32) -> Self {
        NodeId {
            namespace,
            identifier: Identifier::Numeric(id),
        }
    }

    pub fn string(namespace: u16, id: impl AsRef<str>) -> Self {
        NodeId {
            namespace,
            identifier: Identifier::String(Arc::<str>::from(id.as_ref())),
        }
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.namespace != 0 {
            write!(f, "ns={};", self.namespace)?;
        }
        match &self.identifier {
            Identifier::Numeric(n) => write!(f, "i={n}"),
            Identifier::String(s) => write!(f, "s={s}"),
        }
    }
}

impl FromStr for NodeId {
    type Err = NodeIdParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err(NodeIdParseError::Empty);
        }

        let (namespace, rest) = match s.strip_prefix("ns=") {
            Some(tail) => {
                let (ns, rest) = tail
                    .split_once(';')
                    .ok_or_else(|| NodeIdParseError::InvalidNamespace(s.to_string()))?;
                let ns = ns
                    .parse::<u16>()
                    .map_err(|_| NodeIdParseError::InvalidNamespace(s.to_string()))?;
                (ns, rest)
            }
            None => (0, s),
        };

        if let Some(num) = rest.strip_prefix("i=") {
            let id = num
                .parse::<u32>()
                .map_err(|_| NodeIdParseError::InvalidIdentifier(s.to_string()))?;
            return Ok(NodeId::numeric(namespace, id));
        }
        if let Some(txt) = rest.strip_prefix("s=") {
            if txt.is_empty() {
                return Err(NodeIdParseError::InvalidIdentifier(s.to_string()));
            }
            return Ok(NodeId::string(namespace, txt));
        }
        Err(NodeIdParseError::InvalidIdentifier(s.to_string()))
    }
}

impl Serialize for NodeId {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for NodeId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::NodeId;

    #[test]
    fn display_and_parse_round_trip() {
        for id in [
            NodeId::numeric(0, 2258),
            NodeId::numeric(2, 100),
            NodeId::string(1, "plant.line1.temp"),
        ] {
            let text = id.to_string();
            let parsed: NodeId = text.parse().expect("parse back");
            assert_eq!(parsed, id, "round trip of {text}");
        }
    }

    #[test]
    fn namespace_zero_is_implicit() {
        assert_eq!(NodeId::numeric(0, 85).to_string(), "i=85");
        assert_eq!("i=85".parse::<NodeId>().unwrap(), NodeId::numeric(0, 85));
    }

    #[test]
    fn rejects_malformed_input() {
        assert!("".parse::<NodeId>().is_err());
        assert!("ns=2;g=abc".parse::<NodeId>().is_err());
        assert!("ns=bad;i=1".parse::<NodeId>().is_err());
        assert!("ns=2;s=".parse::<NodeId>().is_err());
    }
}
