//! Typed attribute values stored in the node data model.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A single attribute value.
///
/// Each variant maps onto one Matter data type family; writes must keep the
/// variant of the stored value.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum AttrValue {
    Null,
    Bool(bool),
    U8(u8),
    U16(u16),
    U32(u32),
    U64(u64),
    I64(i64),
    Str(String),
    /// Octet string
    Bytes(Vec<u8>),
    /// List of 8-bit enum values (fault lists)
    U8List(Vec<u8>),
    /// Structure fields in context-tag order (command responses)
    Struct(Vec<AttrValue>),
    List(Vec<AttrValue>),
}

impl AttrValue {
    /// Whether `other` may replace `self` without changing the data type.
    ///
    /// `Null` is compatible with everything (nullable attributes).
    pub fn same_type(&self, other: &AttrValue) -> bool {
        matches!(self, AttrValue::Null)
            || matches!(other, AttrValue::Null)
            || std::mem::discriminant(self) == std::mem::discriminant(other)
    }

    pub fn as_u64(&self) -> Option<u64> {
        match *self {
            AttrValue::Bool(b) => Some(b as u64),
            AttrValue::U8(v) => Some(v as u64),
            AttrValue::U16(v) => Some(v as u64),
            AttrValue::U32(v) => Some(v as u64),
            AttrValue::U64(v) => Some(v),
            AttrValue::I64(v) => u64::try_from(v).ok(),
            _ => None,
        }
    }

    /// Whether both values are numbers of the same variant and `self <= other`.
    pub fn le_numeric(&self, other: &AttrValue) -> bool {
        std::mem::discriminant(self) == std::mem::discriminant(other)
            && match (self, other) {
                (AttrValue::I64(a), AttrValue::I64(b)) => a <= b,
                _ => matches!((self.as_u64(), other.as_u64()), (Some(a), Some(b)) if a <= b),
            }
    }

    /// Saturate a numeric value into `[min, max]`.
    ///
    /// `Null` and non-numeric values, or bounds of another variant, leave the
    /// value untouched.
    pub fn clamp(self, min: &AttrValue, max: &AttrValue) -> AttrValue {
        match (self, min, max) {
            (AttrValue::U8(v), AttrValue::U8(lo), AttrValue::U8(hi)) => {
                AttrValue::U8(v.max(*lo).min(*hi))
            }
            (AttrValue::U16(v), AttrValue::U16(lo), AttrValue::U16(hi)) => {
                AttrValue::U16(v.max(*lo).min(*hi))
            }
            (AttrValue::U32(v), AttrValue::U32(lo), AttrValue::U32(hi)) => {
                AttrValue::U32(v.max(*lo).min(*hi))
            }
            (AttrValue::U64(v), AttrValue::U64(lo), AttrValue::U64(hi)) => {
                AttrValue::U64(v.max(*lo).min(*hi))
            }
            (AttrValue::I64(v), AttrValue::I64(lo), AttrValue::I64(hi)) => {
                AttrValue::I64(v.max(*lo).min(*hi))
            }
            (value, _, _) => value,
        }
    }
}

impl fmt::Display for AttrValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttrValue::Null => write!(f, "null"),
            AttrValue::Bool(v) => write!(f, "{}", v),
            AttrValue::U8(v) => write!(f, "{}", v),
            AttrValue::U16(v) => write!(f, "{}", v),
            AttrValue::U32(v) => write!(f, "{}", v),
            AttrValue::U64(v) => write!(f, "{}", v),
            AttrValue::I64(v) => write!(f, "{}", v),
            AttrValue::Str(v) => write!(f, "\"{}\"", v),
            AttrValue::Bytes(v) => {
                write!(f, "0x")?;
                for b in v {
                    write!(f, "{:02x}", b)?;
                }
                Ok(())
            }
            AttrValue::U8List(v) => write!(f, "{:?}", v),
            AttrValue::Struct(fields) => {
                write!(f, "{{")?;
                write_joined(f, fields)?;
                write!(f, "}}")
            }
            AttrValue::List(items) => {
                write!(f, "[")?;
                write_joined(f, items)?;
                write!(f, "]")
            }
        }
    }
}

fn write_joined(f: &mut fmt::Formatter<'_>, values: &[AttrValue]) -> fmt::Result {
    for (i, value) in values.iter().enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        write!(f, "{}", value)?;
    }
    Ok(())
}

macro_rules! attr_value_from {
    ($($t:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$t> for AttrValue {
                fn from(v: $t) -> Self {
                    AttrValue::$variant(v)
                }
            }
        )*
    };
}

attr_value_from!(
    bool => Bool,
    u8 => U8,
    u16 => U16,
    u32 => U32,
    u64 => U64,
    i64 => I64,
    String => Str,
);

impl<T: Into<AttrValue>> From<Option<T>> for AttrValue {
    fn from(v: Option<T>) -> Self {
        v.map_or(AttrValue::Null, Into::into)
    }
}
