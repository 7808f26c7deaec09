//! Store references
//!
//! A `StoreReference` names one record by (repository, bucket, id). Its
//! text form is `repository/bucket/id`; repository and bucket names can
//! never contain `/`, so the encoding round-trips for every valid triple.
//!
//! A reference is only ever resolved at use time; it never caches the
//! record it points at.

mod errors;

pub use errors::{ReferenceError, ReferenceResult};

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::record::Record;
use crate::store::{Store, StoreResult};

/// Separator between the three parts of an encoded reference.
pub const SEPARATOR: char = '/';

/// A resolvable handle to a record held in some bucket of some repository.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StoreReference {
    repository: String,
    bucket: String,
    id: u64,
}

impl StoreReference {
    /// Creates a reference, rejecting names that could not round-trip.
    pub fn new(
        repository: impl Into<String>,
        bucket: impl Into<String>,
        id: u64,
    ) -> ReferenceResult<Self> {
        let repository = repository.into();
        let bucket = bucket.into();
        check_part(&repository, "repository")?;
        check_part(&bucket, "bucket")?;
        Ok(Self {
            repository,
            bucket,
            id,
        })
    }

    /// For names the store has already validated.
    pub(crate) fn from_parts(repository: &str, bucket: &str, id: u64) -> Self {
        Self {
            repository: repository.to_string(),
            bucket: bucket.to_string(),
            id,
        }
    }

    /// Repository name
    pub fn repository(&self) -> &str {
        &self.repository
    }

    /// Bucket name
    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    /// Record id
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Canonical text encoding.
    pub fn encode(&self) -> String {
        format!(
            "{}{}{}{}{}",
            self.repository, SEPARATOR, self.bucket, SEPARATOR, self.id
        )
    }

    /// Parses the canonical text encoding.
    ///
    /// A malformed string is a `ReferenceError`; whether the referend
    /// exists is only known at `resolve` time.
    pub fn parse(encoded: &str) -> ReferenceResult<Self> {
        let mut parts = encoded.split(SEPARATOR);
        let (repository, bucket, id) = match (parts.next(), parts.next(), parts.next(), parts.next())
        {
            (Some(r), Some(b), Some(i), None) => (r, b, i),
            _ => {
                return Err(ReferenceError::malformed(
                    encoded,
                    "expected repository/bucket/id",
                ))
            }
        };

        if id.is_empty() || !id.bytes().all(|b| b.is_ascii_digit()) {
            return Err(ReferenceError::malformed(encoded, "id is not a decimal number"));
        }
        let id = id
            .parse::<u64>()
            .map_err(|e| ReferenceError::malformed(encoded, e.to_string()))?;

        Self::new(repository, bucket, id)
            .map_err(|e| ReferenceError::malformed(encoded, e.to_string()))
    }

    /// Looks the referend up through `store`.
    ///
    /// Fails if the repository or bucket does not exist or if no record
    /// with this id is stored there.
    pub fn resolve(&self, store: &Store) -> StoreResult<Record> {
        store.resolve(self)
    }
}

fn check_part(part: &str, what: &'static str) -> ReferenceResult<()> {
    if part.is_empty() {
        return Err(ReferenceError::InvalidName {
            what,
            name: part.to_string(),
        });
    }
    if part.contains(SEPARATOR) || part.contains('\\') || part.contains('\0') {
        return Err(ReferenceError::InvalidName {
            what,
            name: part.to_string(),
        });
    }
    Ok(())
}

impl fmt::Display for StoreReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.encode())
    }
}

impl FromStr for StoreReference {
    type Err = ReferenceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for StoreReference {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.encode())
    }
}

impl<'de> Deserialize<'de> for StoreReference {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        Self::parse(&encoded).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode() {
        let r = StoreReference::new("people", "births", 42).unwrap();
        assert_eq!(r.encode(), "people/births/42");
        assert_eq!(r.to_string(), "people/births/42");
    }

    #[test]
    fn test_parse_round_trip() {
        let r = StoreReference::new("repo one", "bucket.2", u64::MAX).unwrap();
        assert_eq!(StoreReference::parse(&r.encode()).unwrap(), r);
    }

    #[test]
    fn test_parse_rejects_wrong_arity() {
        assert!(StoreReference::parse("a/b").is_err());
        assert!(StoreReference::parse("a/b/1/2").is_err());
        assert!(StoreReference::parse("").is_err());
    }

    #[test]
    fn test_parse_rejects_bad_id() {
        assert!(StoreReference::parse("a/b/x").is_err());
        assert!(StoreReference::parse("a/b/-1").is_err());
        assert!(StoreReference::parse("a/b/+1").is_err());
        assert!(StoreReference::parse("a/b/").is_err());
        assert!(StoreReference::parse("a/b/99999999999999999999999").is_err());
    }

    #[test]
    fn test_parse_rejects_empty_names() {
        assert!(StoreReference::parse("/b/1").is_err());
        assert!(StoreReference::parse("a//1").is_err());
    }

    #[test]
    fn test_new_rejects_separator_in_name() {
        assert!(StoreReference::new("a/b", "c", 1).is_err());
        assert!(StoreReference::new("a", "c\\d", 1).is_err());
    }

    #[test]
    fn test_parse_error_is_malformed() {
        let err = StoreReference::parse("nope").unwrap_err();
        assert!(matches!(err, ReferenceError::Malformed { .. }));
        assert_eq!(err.code(), "STORR_REFERENCE_MALFORMED");
    }

    #[test]
    fn test_serde_as_string() {
        let r = StoreReference::new("r", "b", 7).unwrap();
        let json = serde_json::to_string(&r).unwrap();
        assert_eq!(json, "\"r/b/7\"");
        let back: StoreReference = serde_json::from_str(&json).unwrap();
        assert_eq!(back, r);
    }
}
