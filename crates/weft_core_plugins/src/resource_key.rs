//! Keys of host resources.
//!
//! A [`ResourceKey`] names one record in the host's resource database by
//! type, group and instance. Its text form is
//! `TTTTTTTT:GGGGGGGG:IIIIIIIIIIIIIIII` in hexadecimal, which is also how it
//! is serialized.

use core::fmt;
use core::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Opaque handle to a host resource.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ResourceKey {
    /// Resource type.
    pub resource_type: u32,
    /// Resource group.
    pub group: u32,
    /// Instance within type and group.
    pub instance: u64,
}

/// A resource key could not be parsed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResourceKeyError {
    /// The text does not have three `:`-separated parts.
    #[error("resource key '{0}' must have the form TTTTTTTT:GGGGGGGG:IIIIIIIIIIIIIIII")]
    Format(String),
    /// A part is not a hexadecimal number of the right width.
    #[error("resource key {part} '{value}' is not a hexadecimal number of at most {digits} digits")]
    InvalidPart {
        /// Which part: type, group or instance.
        part: &'static str,
        /// The offending text.
        value: String,
        /// Maximum number of digits.
        digits: usize,
    },
}

impl ResourceKey {
    /// Creates a key from its parts.
    #[must_use]
    pub const fn new(resource_type: u32, group: u32, instance: u64) -> Self {
        Self {
            resource_type,
            group,
            instance,
        }
    }
}

impl fmt::Display for ResourceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:08X}:{:08X}:{:016X}",
            self.resource_type, self.group, self.instance
        )
    }
}

fn parse_part(part: &'static str, value: &str, digits: usize) -> Result<u64, ResourceKeyError> {
    let invalid = || ResourceKeyError::InvalidPart {
        part,
        value: value.to_string(),
        digits,
    };
    if value.is_empty() || value.len() > digits || !value.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(invalid());
    }
    u64::from_str_radix(value, 16).map_err(|_| invalid())
}

fn parse_u32(part: &'static str, value: &str) -> Result<u32, ResourceKeyError> {
    let parsed = parse_part(part, value, 8)?;
    u32::try_from(parsed).map_err(|_| ResourceKeyError::InvalidPart {
        part,
        value: value.to_string(),
        digits: 8,
    })
}

impl FromStr for ResourceKey {
    type Err = ResourceKeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.trim().split(':').collect();
        let [resource_type, group, instance] = parts.as_slice() else {
            return Err(ResourceKeyError::Format(s.to_string()));
        };
        Ok(Self {
            resource_type: parse_u32("type", resource_type)?,
            group: parse_u32("group", group)?,
            instance: parse_part("instance", instance, 16)?,
        })
    }
}

impl TryFrom<String> for ResourceKey {
    type Error = ResourceKeyError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ResourceKey> for String {
    fn from(key: ResourceKey) -> Self {
        key.to_string()
    }
}
