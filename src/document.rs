//! Configuration document access.
//!
//! The model builders walk a generic tree through [`ConfigNode`] and
//! never see the surface syntax. On the wire the document is JSON, so
//! the crate implements the trait for `serde_json::Value`.

use crate::error::ConfigError;

/// Read-only view of one node in a tree-structured configuration value.
pub trait ConfigNode: Sized {
    /// Child of an object node.
    fn field(&self, key: &str) -> Option<&Self>;

    /// Integer value.
    fn int(&self) -> Option<i64>;

    /// Boolean value.
    fn flag(&self) -> Option<bool>;

    /// String value.
    fn text(&self) -> Option<&str>;

    /// Elements of an array node.
    fn elements(&self) -> Option<&[Self]>;
}

impl ConfigNode for serde_json::Value {
    fn field(&self, key: &str) -> Option<&Self> {
        self.as_object().and_then(|map| map.get(key))
    }

    fn int(&self) -> Option<i64> {
        self.as_i64()
    }

    fn flag(&self) -> Option<bool> {
        self.as_bool()
    }

    fn text(&self) -> Option<&str> {
        self.as_str()
    }

    fn elements(&self) -> Option<&[Self]> {
        self.as_array().map(|items| items.as_slice())
    }
}

/// Required integer field, range-checked into `T`.
pub fn require_int<N, T>(node: &N, key: &'static str) -> Result<T, ConfigError>
where
    N: ConfigNode,
    T: TryFrom<i64>,
{
    let raw = node
        .field(key)
        .ok_or(ConfigError::MissingField(key))?
        .int()
        .ok_or(ConfigError::InvalidField(key))?;
    T::try_from(raw).map_err(|_| ConfigError::InvalidField(key))
}

/// Optional integer field; `default` when absent.
pub fn int_or<N, T>(node: &N, key: &'static str, default: T) -> Result<T, ConfigError>
where
    N: ConfigNode,
    T: TryFrom<i64>,
{
    match node.field(key) {
        None => Ok(default),
        Some(_) => require_int(node, key),
    }
}

/// Integer field saturated into the `i8` range of a HID report.
pub fn int_saturating_i8<N: ConfigNode>(node: &N, key: &'static str) -> Result<i8, ConfigError> {
    let raw: i64 = int_or(node, key, 0)?;
    Ok(raw.clamp(i64::from(i8::MIN), i64::from(i8::MAX)) as i8)
}

/// Truthy flag: `true`, or any non-zero integer. Absent means `false`.
pub fn truthy<N: ConfigNode>(node: &N, key: &'static str) -> bool {
    node.field(key)
        .map(|v| v.flag().unwrap_or_else(|| v.int().map_or(false, |n| n != 0)))
        .unwrap_or(false)
}
