//! SerialNumber - Cheap-to-clone, ordered hardware identifier
//!
//! The device-to-slot mapping is the serial sort order, so this type is `Ord`.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::borrow::Borrow;
use std::fmt;
use std::ops::Deref;
use std::sync::Arc;

/// Unique hardware identifier of an image sensor.
///
/// Internally uses `Arc<str>`: every frame carries its sensor's serial, so
/// cloning must not allocate. Ordering and hashing delegate to the string.
///
/// # Examples
/// ```
/// use contracts::SerialNumber;
///
/// let mut serials: Vec<SerialNumber> = vec!["40012345".into(), "22954321".into()];
/// serials.sort();
/// assert_eq!(serials[0], "22954321");
/// ```
#[derive(Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SerialNumber(Arc<str>);

impl SerialNumber {
    /// Create a new serial from a string slice.
    #[inline]
    pub fn new(s: &str) -> Self {
        Self(Arc::from(s))
    }

    /// Get the underlying string slice.
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Deref for SerialNumber {
    type Target = str;

    #[inline]
    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl Borrow<str> for SerialNumber {
    #[inline]
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<&str> for SerialNumber {
    #[inline]
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for SerialNumber {
    #[inline]
    fn from(s: String) -> Self {
        Self(Arc::from(s))
    }
}

impl fmt::Display for SerialNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for SerialNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SN:{}", self.0)
    }
}

impl PartialEq<str> for SerialNumber {
    #[inline]
    fn eq(&self, other: &str) -> bool {
        self.0.as_ref() == other
    }
}

impl PartialEq<&str> for SerialNumber {
    #[inline]
    fn eq(&self, other: &&str) -> bool {
        self.0.as_ref() == *other
    }
}

impl Serialize for SerialNumber {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for SerialNumber {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        String::deserialize(deserializer).map(Self::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sort_is_lexicographic() {
        let mut serials: Vec<SerialNumber> =
            vec!["22954321".into(), "22900001".into(), "40012345".into()];
        serials.sort();
        let ordered: Vec<&str> = serials.iter().map(SerialNumber::as_str).collect();
        assert_eq!(ordered, ["22900001", "22954321", "40012345"]);
    }

    #[test]
    fn test_clone_shares_allocation() {
        let a: SerialNumber = "22954321".into();
        let b = a.clone();
        assert_eq!(a.as_str().as_ptr(), b.as_str().as_ptr());
    }

    #[test]
    fn test_serde_as_plain_string() {
        let sn: SerialNumber = "22954321".into();
        let json = serde_json::to_string(&sn).unwrap();
        assert_eq!(json, "\"22954321\"");
        let back: SerialNumber = serde_json::from_str(&json).unwrap();
        assert_eq!(back, sn);
    }
}
