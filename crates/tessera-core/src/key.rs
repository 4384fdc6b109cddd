//! Primary keys: key values, key descriptors and key discovery.

use crate::{Record, TesseraError, TesseraResult, Value};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// An ordered primary key value: one component for simple keys, several for
/// composite keys.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Key(Vec<Value>);

impl Key {
    /// Creates a single-component key.
    #[must_use]
    pub fn single(value: impl Into<Value>) -> Self {
        Self(vec![value.into()])
    }

    /// Creates a key from its components, in key field order.
    #[must_use]
    pub fn composite<I, V>(parts: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        Self(parts.into_iter().map(Into::into).collect())
    }

    /// Returns the key components.
    #[must_use]
    pub fn parts(&self) -> &[Value] {
        &self.0
    }

    /// Returns the number of components.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns true if the key has no components.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns true if any component is unset (null or zero value).
    #[must_use]
    pub fn is_unset(&self) -> bool {
        self.0.iter().any(Value::is_unset)
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0.as_slice() {
            [single] => write!(f, "{single}"),
            parts => {
                f.write_str("(")?;
                for (i, part) in parts.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{part}")?;
                }
                f.write_str(")")
            }
        }
    }
}

macro_rules! scalar_key {
    ($($ty:ty),+) => {
        $(
            impl From<$ty> for Key {
                fn from(value: $ty) -> Self {
                    Self::single(value)
                }
            }
        )+
    };
}

scalar_key!(i16, i32, i64, u32, &str, String, Uuid, Value);

impl<A: Into<Value>, B: Into<Value>> From<(A, B)> for Key {
    fn from((a, b): (A, B)) -> Self {
        Self(vec![a.into(), b.into()])
    }
}

impl<A: Into<Value>, B: Into<Value>, C: Into<Value>> From<(A, B, C)> for Key {
    fn from((a, b, c): (A, B, C)) -> Self {
        Self(vec![a.into(), b.into(), c.into()])
    }
}

/// How the key fields of a DTO are discovered.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyStrategy {
    /// Intersect DTO fields with the backend's declared primary key.
    #[default]
    Metadata,
    /// Use the fields the DTO marks as key.
    Declared,
}

/// Decides whether an incoming key is looked up before writing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyPolicy {
    /// Keys are supplied by the caller. Every key, zero included, is looked
    /// up and inserted as given when absent.
    #[default]
    Assigned,
    /// Keys are assigned by the backend. A key with an unset component is
    /// inserted without a lookup and the backend fills it in.
    Generated,
}

/// Finds the ordered key fields of a DTO shape.
pub struct KeyExtractor;

impl KeyExtractor {
    /// Returns the fields carrying the declared-key marker.
    pub fn declared<D: Record>() -> TesseraResult<Vec<&'static str>> {
        Self::non_empty::<D>(D::declared_key().to_vec())
    }

    /// Returns the DTO fields that appear in the backend's primary key, in
    /// the backend's declared column order.
    pub fn from_metadata<D: Record>(primary_key: &[String]) -> TesseraResult<Vec<&'static str>> {
        let fields = primary_key
            .iter()
            .filter_map(|column| {
                D::field_names()
                    .iter()
                    .copied()
                    .find(|field| *field == column.as_str())
            })
            .collect();
        Self::non_empty::<D>(fields)
    }

    /// Resolves key fields with the given strategy.
    pub fn extract<D: Record>(
        strategy: KeyStrategy,
        primary_key: &[String],
    ) -> TesseraResult<Vec<&'static str>> {
        match strategy {
            KeyStrategy::Metadata => Self::from_metadata::<D>(primary_key),
            KeyStrategy::Declared => Self::declared::<D>(),
        }
    }

    fn non_empty<D: Record>(fields: Vec<&'static str>) -> TesseraResult<Vec<&'static str>> {
        if fields.is_empty() {
            return Err(TesseraError::MissingKey {
                shape: D::shapes().first().copied().unwrap_or("unknown").to_string(),
            });
        }
        Ok(fields)
    }
}

/// The key fields of a DAO and its insert policy. Built once per DAO.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyDescriptor {
    fields: Vec<&'static str>,
    policy: KeyPolicy,
}

impl KeyDescriptor {
    /// Creates a descriptor. Fails if `fields` is empty.
    pub fn new(fields: Vec<&'static str>, policy: KeyPolicy) -> TesseraResult<Self> {
        if fields.is_empty() {
            return Err(TesseraError::configuration("key descriptor has no fields"));
        }
        Ok(Self { fields, policy })
    }

    /// Returns the key fields in order.
    #[must_use]
    pub fn fields(&self) -> &[&'static str] {
        &self.fields
    }

    /// Returns the insert policy.
    #[must_use]
    pub const fn policy(&self) -> KeyPolicy {
        self.policy
    }

    /// Returns true for multi-column keys.
    #[must_use]
    pub fn is_composite(&self) -> bool {
        self.fields.len() > 1
    }

    /// Reads the key of a record in descriptor order.
    pub fn extract<R: Record>(&self, record: &R) -> TesseraResult<Key> {
        self.fields
            .iter()
            .map(|field| {
                record
                    .get(field)
                    .ok_or_else(|| TesseraError::unknown_field(record.shape(), *field))
            })
            .collect::<TesseraResult<Vec<_>>>()
            .map(Key)
    }

    /// Verifies that a caller-supplied key has one component per key field.
    pub fn check(&self, key: &Key) -> TesseraResult<()> {
        if key.len() == self.fields.len() {
            Ok(())
        } else {
            Err(TesseraError::KeyArity {
                expected: self.fields.len(),
                actual: key.len(),
            })
        }
    }

    /// Returns true if the key should be inserted without looking it up.
    #[must_use]
    pub fn skips_lookup(&self, key: &Key) -> bool {
        self.policy == KeyPolicy::Generated && key.is_unset()
    }
}
