use base64::Engine as _;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use std::sync::Arc;

/// Error returned when converting a `Variant` into a concrete Rust primitive.
///
/// Designed for filter math and driver-facing control logic.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum VariantCastError {
    /// Value is not a number (int/float).
    #[error("expected numeric value, got {actual:?}")]
    NotNumeric { actual: VariantKind },
    /// Numeric value is NaN/Inf and cannot be used for comparisons.
    #[error("numeric value is not finite")]
    NotFinite,
}

/// Built-in data type of a [`Variant`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VariantKind {
    Empty,
    Boolean,
    SByte,
    Byte,
    Int16,
    UInt16,
    Int32,
    UInt32,
    Int64,
    UInt64,
    Float,
    Double,
    String,
    DateTime,
    ByteString,
    Array,
}

/// A strongly-typed runtime value for node attributes and notifications.
///
/// # Performance goals
/// - No `serde_json::Value` on hot paths
/// - Shared string storage (`Arc<str>`) to reduce cloning cost
/// - Zero-copy byte-string payloads (`Bytes`)
///
/// Arrays are homogeneous in practice but not enforced here; array-aware
/// consumers (index ranges, deadband math) operate element-wise.
#[derive(Clone, Debug, PartialEq)]
pub enum Variant {
    Empty,
    Boolean(bool),
    SByte(i8),
    Byte(u8),
    Int16(i16),
    UInt16(u16),
    Int32(i32),
    UInt32(u32),
    Int64(i64),
    UInt64(u64),
    Float(f32),
    Double(f64),
    String(Arc<str>),
    DateTime(DateTime<Utc>),
    ByteString(Bytes),
    Array(Vec<Variant>),
}

impl Variant {
    /// Return the corresponding [`VariantKind`] for this value.
    #[inline]
    pub fn data_type(&self) -> VariantKind {
        match self {
            Variant::Empty => VariantKind::Empty,
            Variant::Boolean(_) => VariantKind::Boolean,
            Variant::SByte(_) => VariantKind::SByte,
            Variant::Byte(_) => VariantKind::Byte,
            Variant::Int16(_) => VariantKind::Int16,
            Variant::UInt16(_) => VariantKind::UInt16,
            Variant::Int32(_) => VariantKind::Int32,
            Variant::UInt32(_) => VariantKind::UInt32,
            Variant::Int64(_) => VariantKind::Int64,
            Variant::UInt64(_) => VariantKind::UInt64,
            Variant::Float(_) => VariantKind::Float,
            Variant::Double(_) => VariantKind::Double,
            Variant::String(_) => VariantKind::String,
            Variant::DateTime(_) => VariantKind::DateTime,
            Variant::ByteString(_) => VariantKind::ByteString,
            Variant::Array(_) => VariantKind::Array,
        }
    }

    /// Whether this is a numeric scalar (deadband math applies).
    #[inline]
    pub fn is_numeric(&self) -> bool {
        matches!(
            self,
            Variant::SByte(_)
                | Variant::Byte(_)
                | Variant::Int16(_)
                | Variant::UInt16(_)
                | Variant::Int32(_)
                | Variant::UInt32(_)
                | Variant::Int64(_)
                | Variant::UInt64(_)
                | Variant::Float(_)
                | Variant::Double(_)
        )
    }

    #[inline]
    pub fn is_array(&self) -> bool {
        matches!(self, Variant::Array(_))
    }

    /// Convert this typed value into a `serde_json::Value`.
    ///
    /// Intended for encoding boundaries (diagnostics, northbound payloads),
    /// not for the sampling hot path.
    pub fn to_json_value(&self) -> serde_json::Value {
        match self {
            Variant::Empty => serde_json::Value::Null,
            Variant::Boolean(v) => serde_json::Value::Bool(*v),
            Variant::SByte(v) => serde_json::Value::Number((*v as i64).into()),
            Variant::Byte(v) => serde_json::Value::Number((*v as u64).into()),
            Variant::Int16(v) => serde_json::Value::Number((*v as i64).into()),
            Variant::UInt16(v) => serde_json::Value::Number((*v as u64).into()),
            Variant::Int32(v) => serde_json::Value::Number((*v as i64).into()),
            Variant::UInt32(v) => serde_json::Value::Number((*v as u64).into()),
            Variant::Int64(v) => serde_json::Value::Number((*v).into()),
            Variant::UInt64(v) => serde_json::Value::Number((*v).into()),
            Variant::Float(v) => {
                serde_json::Number::from_f64(*v as f64).map_or(serde_json::Value::Null, Into::into)
            }
            Variant::Double(v) => {
                serde_json::Number::from_f64(*v).map_or(serde_json::Value::Null, Into::into)
            }
            Variant::String(v) => serde_json::Value::String(v.to_string()),
            Variant::DateTime(v) => serde_json::Value::String(v.to_rfc3339()),
            Variant::ByteString(v) => serde_json::Value::String(
                base64::engine::general_purpose::STANDARD.encode(v.as_ref()),
            ),
            Variant::Array(items) => {
                serde_json::Value::Array(items.iter().map(Variant::to_json_value).collect())
            }
        }
    }
}

impl Default for Variant {
    fn default() -> Self {
        Variant::Empty
    }
}

impl From<&str> for Variant {
    fn from(s: &str) -> Self {
        Variant::String(Arc::<str>::from(s))
    }
}

impl TryFrom<&Variant> for f64 {
    type Error = VariantCastError;

    /// Numeric view used by deadband comparisons. Strict: non-numeric
    /// variants are rejected rather than parsed.
    #[inline]
    fn try_from(v: &Variant) -> Result<Self, Self::Error> {
        let f = match v {
            Variant::SByte(x) => *x as f64,
            Variant::Byte(x) => *x as f64,
            Variant::Int16(x) => *x as f64,
            Variant::UInt16(x) => *x as f64,
            Variant::Int32(x) => *x as f64,
            Variant::UInt32(x) => *x as f64,
            Variant::Int64(x) => *x as f64,
            Variant::UInt64(x) => *x as f64,
            Variant::Float(x) => *x as f64,
            Variant::Double(x) => *x,
            other => {
                return Err(VariantCastError::NotNumeric {
                    actual: other.data_type(),
                })
            }
        };
        if !f.is_finite() {
            return Err(VariantCastError::NotFinite);
        }
        Ok(f)
    }
}

impl Serialize for Variant {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        self.to_json_value().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Variant {
    /// Intended for non-hot-path usages (configs, fixtures, debugging). It
    /// cannot precisely infer integer widths, so numbers decode as
    /// Int64/UInt64/Double.
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let v = serde_json::Value::deserialize(deserializer)?;
        json_to_variant(v).map_err(de::Error::custom)
    }
}

fn json_to_variant(v: serde_json::Value) -> Result<Variant, String> {
    Ok(match v {
        serde_json::Value::Null => Variant::Empty,
        serde_json::Value::Bool(b) => Variant::Boolean(b),
        serde_json::Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Variant::Int64(i)
            } else if let Some(u) = n.as_u64() {
                Variant::UInt64(u)
            } else if let Some(f) = n.as_f64() {
                Variant::Double(f)
            } else {
                return Err("invalid JSON number".to_string());
            }
        }
        serde_json::Value::String(s) => Variant::String(Arc::<str>::from(s)),
        serde_json::Value::Array(items) => Variant::Array(
            items
                .into_iter()
                .map(json_to_variant)
                .collect::<Result<Vec<_>, _>>()?,
        ),
        serde_json::Value::Object(_) => {
            return Err("object cannot be converted to Variant without type information".into())
        }
    })
}
