//! Sequences.

use celesta_error::{CelestaError, CelestaResult};

use crate::ident::validate_identifier;

/// A database sequence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sequence {
    grain_name: String,
    name: String,
    start_with: i64,
    increment_by: i64,
    min_value: i64,
    max_value: i64,
    is_cycle: bool,
}

impl Sequence {
    /// A sequence with the CelestaSQL defaults: `START WITH 1 INCREMENT BY 1`,
    /// the widest value range, no cycling.
    pub fn new(grain_name: &str, name: &str) -> CelestaResult<Self> {
        validate_identifier(grain_name)?;
        validate_identifier(name)?;
        Ok(Self {
            grain_name: grain_name.to_owned(),
            name: name.to_owned(),
            start_with: 1,
            increment_by: 1,
            min_value: 1,
            max_value: i64::MAX,
            is_cycle: false,
        })
    }

    #[must_use]
    pub fn grain_name(&self) -> &str {
        &self.grain_name
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn start_with(&self) -> i64 {
        self.start_with
    }

    #[must_use]
    pub fn increment_by(&self) -> i64 {
        self.increment_by
    }

    #[must_use]
    pub fn min_value(&self) -> i64 {
        self.min_value
    }

    #[must_use]
    pub fn max_value(&self) -> i64 {
        self.max_value
    }

    #[must_use]
    pub fn is_cycle(&self) -> bool {
        self.is_cycle
    }

    pub fn set_start_with(&mut self, v: i64) -> &mut Self {
        self.start_with = v;
        self
    }

    /// Zero increments are rejected: the sequence would never advance.
    pub fn set_increment_by(&mut self, v: i64) -> CelestaResult<&mut Self> {
        if v == 0 {
            return Err(CelestaError::parse(format!(
                "sequence '{}' has a zero increment",
                self.name
            )));
        }
        self.increment_by = v;
        Ok(self)
    }

    pub fn set_min_value(&mut self, v: i64) -> &mut Self {
        self.min_value = v;
        self
    }

    pub fn set_max_value(&mut self, v: i64) -> &mut Self {
        self.max_value = v;
        self
    }

    pub fn set_is_cycle(&mut self, v: bool) -> &mut Self {
        self.is_cycle = v;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let s = Sequence::new("g", "s1").unwrap();
        assert_eq!(s.start_with(), 1);
        assert_eq!(s.increment_by(), 1);
        assert!(!s.is_cycle());
    }

    #[test]
    fn test_zero_increment_rejected() {
        let mut s = Sequence::new("g", "s1").unwrap();
        assert!(s.set_increment_by(0).is_err());
        s.set_increment_by(-2).unwrap();
        assert_eq!(s.increment_by(), -2);
    }
}
