//! Resource keys identify which logical resource a cache entry refers to.
//!
//! A key is an ordered tuple of primitives compared by value:
//!
//! ```
//! use verdant_core::{key, ResourceKey};
//!
//! let all = ResourceKey::new("plants");
//! let one = key!("plants", "64f1c0");
//! assert!(one.starts_with(&all));
//! assert_eq!(one.to_string(), "plants/64f1c0");
//! ```

use std::fmt;

/// One primitive component of a [`ResourceKey`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum KeySegment {
    Str(String),
    Int(i64),
    Bool(bool),
}

impl fmt::Display for KeySegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeySegment::Str(s) => f.write_str(s),
            KeySegment::Int(i) => write!(f, "{i}"),
            KeySegment::Bool(b) => write!(f, "{b}"),
        }
    }
}

impl From<&str> for KeySegment {
    fn from(s: &str) -> Self {
        KeySegment::Str(s.to_string())
    }
}

impl From<String> for KeySegment {
    fn from(s: String) -> Self {
        KeySegment::Str(s)
    }
}

impl From<&String> for KeySegment {
    fn from(s: &String) -> Self {
        KeySegment::Str(s.clone())
    }
}

impl From<i64> for KeySegment {
    fn from(i: i64) -> Self {
        KeySegment::Int(i)
    }
}

impl From<u32> for KeySegment {
    fn from(i: u32) -> Self {
        KeySegment::Int(i64::from(i))
    }
}

impl From<bool> for KeySegment {
    fn from(b: bool) -> Self {
        KeySegment::Bool(b)
    }
}

/// Identity of a cached resource: `("plants",)`, `("plants", id)`, `("role", email)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResourceKey(Vec<KeySegment>);

impl ResourceKey {
    /// A single-segment key naming a resource type.
    pub fn new(resource: impl Into<KeySegment>) -> Self {
        ResourceKey(vec![resource.into()])
    }

    /// Append a segment (identifier or dependent parameter).
    pub fn with(mut self, segment: impl Into<KeySegment>) -> Self {
        self.0.push(segment.into());
        self
    }

    pub fn segments(&self) -> &[KeySegment] {
        &self.0
    }

    /// First segment: the resource type.
    pub fn resource(&self) -> Option<&KeySegment> {
        self.0.first()
    }

    /// Whether `prefix`'s segments lead this key's segments.
    pub fn starts_with(&self, prefix: &ResourceKey) -> bool {
        self.0.starts_with(&prefix.0)
    }
}

impl fmt::Display for ResourceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, segment) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str("/")?;
            }
            write!(f, "{segment}")?;
        }
        Ok(())
    }
}

impl<S: Into<KeySegment>> FromIterator<S> for ResourceKey {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        ResourceKey(iter.into_iter().map(Into::into).collect())
    }
}

/// Build a [`ResourceKey`] from a list of primitives.
#[macro_export]
macro_rules! key {
    ($first:expr $(, $rest:expr)* $(,)?) => {
        $crate::ResourceKey::new($first)$(.with($rest))*
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equal_segments_are_equal_keys() {
        assert_eq!(key!("plants", "A"), ResourceKey::new("plants").with("A"));
        assert_ne!(key!("plants", "A"), key!("plants", "B"));
    }

    #[test]
    fn segment_types_are_distinct() {
        assert_ne!(key!("plants", 1i64), key!("plants", "1"));
    }

    #[test]
    fn prefix_matching() {
        let group = ResourceKey::new("plants");
        assert!(key!("plants", "A").starts_with(&group));
        assert!(group.starts_with(&group));
        assert!(!key!("role", "a@x.com").starts_with(&group));
        assert!(!group.starts_with(&key!("plants", "A")));
    }

    #[test]
    fn display_joins_segments() {
        assert_eq!(key!("role", "a@x.com").to_string(), "role/a@x.com");
        assert_eq!(key!("page", 2u32, true).to_string(), "page/2/true");
    }

    #[test]
    fn collects_from_iterator() {
        let key: ResourceKey = ["plants", "A"].into_iter().collect();
        assert_eq!(key, key!("plants", "A"));
    }
}
