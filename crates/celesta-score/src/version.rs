//! Comparable grain version strings.
//!
//! A version string is a comma-separated list of `tag version` pairs, where
//! `tag` is an identifier and `version` is a dotted sequence of integers:
//! `"app 1.2, ext 2.0.1"`. Comparing two version strings yields one of four
//! outcomes: some tags may have moved forward while others moved back, in
//! which case the versions are [`VersionOrdering::Inconsistent`] and no
//! upgrade decision can be made.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use celesta_error::{CelestaError, CelestaResult};

use crate::ident::validate_identifier;

/// Outcome of comparing two [`VersionString`]s.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum VersionOrdering {
    Lower,
    Equals,
    Greater,
    Inconsistent,
}

impl VersionOrdering {
    /// Combine a per-tag outcome into the running result.
    ///
    /// The lattice: `Equals` is the identity, equal directions absorb, and
    /// opposite directions meet in `Inconsistent`.
    const fn and(self, other: Self) -> Self {
        match (self, other) {
            (Self::Equals, x) | (x, Self::Equals) => x,
            (Self::Lower, Self::Lower) => Self::Lower,
            (Self::Greater, Self::Greater) => Self::Greater,
            _ => Self::Inconsistent,
        }
    }
}

/// A parsed, canonicalized grain version.
///
/// Tags are kept sorted, so `to_string` renders a canonical form and
/// `parse ∘ to_string` is the identity.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct VersionString {
    versions: BTreeMap<String, Vec<u32>>,
}

impl VersionString {
    /// Parse a version string such as `"app 1.2, ext 2.0.1"`.
    pub fn new(text: &str) -> CelestaResult<Self> {
        let mut versions = BTreeMap::new();
        for part in text.split(',') {
            let part = part.trim();
            if part.is_empty() {
                return Err(CelestaError::parse(format!(
                    "empty component in version string '{text}'"
                )));
            }
            let (tag, ver) = part.split_once(' ').ok_or_else(|| {
                CelestaError::parse(format!(
                    "component '{part}' of version string '{text}' has no version"
                ))
            })?;
            validate_identifier(tag).map_err(|_| {
                CelestaError::parse(format!(
                    "illegal tag '{tag}' in version string '{text}'"
                ))
            })?;
            let numbers = parse_dotted(ver.trim()).ok_or_else(|| {
                CelestaError::parse(format!(
                    "illegal version '{}' for tag '{tag}' in version string '{text}'",
                    ver.trim()
                ))
            })?;
            if versions.insert(tag.to_owned(), numbers).is_some() {
                return Err(CelestaError::parse(format!(
                    "duplicate tag '{tag}' in version string '{text}'"
                )));
            }
        }
        Ok(Self { versions })
    }

    /// The dotted-integer version recorded under `tag`, if any.
    #[must_use]
    pub fn version_of(&self, tag: &str) -> Option<&[u32]> {
        self.versions.get(tag).map(Vec::as_slice)
    }

    /// Compare against another version string.
    ///
    /// Shared tags are compared lexicographically by integer components. A
    /// tag present on one side only counts as that side being ahead on that
    /// tag. All per-tag outcomes are folded through the accumulation
    /// lattice, so opposite movements yield
    /// [`VersionOrdering::Inconsistent`] and `Equals` requires coinciding
    /// tag sets with equal versions.
    #[must_use]
    pub fn compare(&self, other: &Self) -> VersionOrdering {
        let mut state = VersionOrdering::Equals;
        for (tag, mine) in &self.versions {
            let step = match other.versions.get(tag) {
                Some(theirs) => compare_components(mine, theirs),
                None => VersionOrdering::Greater,
            };
            state = state.and(step);
            if state == VersionOrdering::Inconsistent {
                return state;
            }
        }
        for tag in other.versions.keys() {
            if !self.versions.contains_key(tag) {
                state = state.and(VersionOrdering::Lower);
                if state == VersionOrdering::Inconsistent {
                    return state;
                }
            }
        }
        state
    }
}

impl FromStr for VersionString {
    type Err = CelestaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl fmt::Display for VersionString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, (tag, numbers)) in self.versions.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{tag} ")?;
            for (j, n) in numbers.iter().enumerate() {
                if j > 0 {
                    f.write_str(".")?;
                }
                write!(f, "{n}")?;
            }
        }
        Ok(())
    }
}

fn parse_dotted(text: &str) -> Option<Vec<u32>> {
    if text.is_empty() {
        return None;
    }
    text.split('.')
        .map(|c| c.parse::<u32>().ok())
        .collect::<Option<Vec<u32>>>()
}

/// Lexicographic comparison by integer components; a missing component is
/// treated as zero, so `1.2` equals `1.2.0`.
fn compare_components(a: &[u32], b: &[u32]) -> VersionOrdering {
    let len = a.len().max(b.len());
    for i in 0..len {
        let x = a.get(i).copied().unwrap_or(0);
        let y = b.get(i).copied().unwrap_or(0);
        if x < y {
            return VersionOrdering::Lower;
        }
        if x > y {
            return VersionOrdering::Greater;
        }
    }
    VersionOrdering::Equals
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn v(s: &str) -> VersionString {
        VersionString::new(s).unwrap()
    }

    #[test]
    fn test_parse_rejects_malformed() {
        for bad in ["", "1.2", "app", "app x.y", "app 1.2,", "app 1.2, app 1.3"] {
            assert!(VersionString::new(bad).is_err(), "{bad}");
        }
    }

    #[test]
    fn test_single_tag_ordering() {
        assert_eq!(v("app 1.2").compare(&v("app 1.1")), VersionOrdering::Greater);
        assert_eq!(v("app 1.1").compare(&v("app 1.2")), VersionOrdering::Lower);
        assert_eq!(v("app 1.2").compare(&v("app 1.2")), VersionOrdering::Equals);
        assert_eq!(v("app 1.2").compare(&v("app 1.2.0")), VersionOrdering::Equals);
        assert_eq!(v("app 1.10").compare(&v("app 1.9")), VersionOrdering::Greater);
    }

    #[test]
    fn test_disagreeing_tags_are_inconsistent() {
        assert_eq!(
            v("a 1.1, b 2.0").compare(&v("a 1.2, b 1.0")),
            VersionOrdering::Inconsistent
        );
    }

    #[test]
    fn test_one_sided_tags_give_direction() {
        assert_eq!(
            v("a 1.0, b 1.0").compare(&v("a 1.0")),
            VersionOrdering::Greater
        );
        assert_eq!(
            v("a 1.0").compare(&v("a 1.0, b 1.0")),
            VersionOrdering::Lower
        );
        // Both sides carry an exclusive tag: directions meet in the lattice.
        assert_eq!(
            v("a 1.0, b 1.0").compare(&v("a 1.0, c 1.0")),
            VersionOrdering::Inconsistent
        );
    }

    #[test]
    fn test_agreeing_direction_with_extra_tag() {
        assert_eq!(
            v("a 2.0, b 1.0").compare(&v("a 1.0")),
            VersionOrdering::Greater
        );
        assert_eq!(
            v("a 2.0").compare(&v("a 1.0, b 1.0")),
            VersionOrdering::Inconsistent
        );
    }

    proptest! {
        #[test]
        fn test_roundtrip(tags in proptest::collection::btree_map(
            "[a-z][a-z0-9]{0,5}",
            proptest::collection::vec(0u32..100, 1..4),
            1..4,
        )) {
            let vs = VersionString { versions: tags };
            let printed = vs.to_string();
            prop_assert_eq!(VersionString::new(&printed).unwrap(), vs);
        }

        #[test]
        fn test_compare_antisymmetric(a in "[a-c] [0-9]{1,2}\\.[0-9]{1,2}", b in "[a-c] [0-9]{1,2}\\.[0-9]{1,2}") {
            let (x, y) = (v(&a), v(&b));
            let forward = x.compare(&y);
            let backward = y.compare(&x);
            let expected = match forward {
                VersionOrdering::Lower => VersionOrdering::Greater,
                VersionOrdering::Greater => VersionOrdering::Lower,
                other => other,
            };
            prop_assert_eq!(backward, expected);
        }
    }
}
