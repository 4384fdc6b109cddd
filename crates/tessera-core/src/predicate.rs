//! Filter predicates over record fields.
//!
//! A [`Predicate<R>`] is a small expression tree ([`Condition`]) written
//! against the fields of record shape `R`. Because DTOs and entities share
//! field names, moving a predicate from a DTO shape to an entity shape is a
//! re-parameterisation: [`Predicate::rewrite`] checks every referenced field
//! exists on both shapes and keeps the tree as is.

use crate::{Record, TesseraError, TesseraResult, Value};
use std::cmp::Ordering;
use std::fmt;
use std::marker::PhantomData;

/// Comparison operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CompareOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl CompareOp {
    /// Returns the SQL spelling of the operator.
    #[must_use]
    pub const fn as_sql(self) -> &'static str {
        match self {
            Self::Eq => "=",
            Self::Ne => "<>",
            Self::Lt => "<",
            Self::Le => "<=",
            Self::Gt => ">",
            Self::Ge => ">=",
        }
    }

    fn holds(self, ordering: Ordering) -> bool {
        match self {
            Self::Eq => ordering == Ordering::Equal,
            Self::Ne => ordering != Ordering::Equal,
            Self::Lt => ordering == Ordering::Less,
            Self::Le => ordering != Ordering::Greater,
            Self::Gt => ordering == Ordering::Greater,
            Self::Ge => ordering != Ordering::Less,
        }
    }
}

/// Untyped predicate expression tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Condition {
    /// `field <op> value`
    Compare {
        field: &'static str,
        op: CompareOp,
        value: Value,
    },
    /// `field IN (values...)`
    In {
        field: &'static str,
        values: Vec<Value>,
    },
    /// `field IS NULL`
    IsNull(&'static str),
    /// Conjunction; empty is true.
    And(Vec<Condition>),
    /// Disjunction; empty is false.
    Or(Vec<Condition>),
    /// Negation.
    Not(Box<Condition>),
}

impl Condition {
    /// Evaluates with SQL three-valued logic. `None` is "unknown".
    ///
    /// Fields the lookup cannot resolve read as `NULL`.
    pub fn evaluate<F>(&self, lookup: &F) -> Option<bool>
    where
        F: Fn(&str) -> Option<Value>,
    {
        match self {
            Self::Compare { field, op, value } => {
                let current = lookup(field).unwrap_or(Value::Null);
                current.compare(value).map(|ordering| op.holds(ordering))
            }
            Self::In { field, values } => {
                let current = lookup(field).unwrap_or(Value::Null);
                let mut unknown = current.is_null();
                for candidate in values {
                    match current.compare(candidate) {
                        Some(Ordering::Equal) => return Some(true),
                        Some(_) => {}
                        None => unknown = true,
                    }
                }
                if unknown {
                    None
                } else {
                    Some(false)
                }
            }
            Self::IsNull(field) => Some(lookup(field).map_or(true, |v| v.is_null())),
            Self::And(conditions) => {
                let mut result = Some(true);
                for condition in conditions {
                    match condition.evaluate(lookup) {
                        Some(false) => return Some(false),
                        None => result = None,
                        Some(true) => {}
                    }
                }
                result
            }
            Self::Or(conditions) => {
                let mut result = Some(false);
                for condition in conditions {
                    match condition.evaluate(lookup) {
                        Some(true) => return Some(true),
                        None => result = None,
                        Some(false) => {}
                    }
                }
                result
            }
            Self::Not(condition) => condition.evaluate(lookup).map(|b| !b),
        }
    }

    /// Collects every field the tree references, in first-seen order.
    #[must_use]
    pub fn fields(&self) -> Vec<&'static str> {
        let mut fields = Vec::new();
        self.collect_fields(&mut fields);
        fields
    }

    fn collect_fields(&self, fields: &mut Vec<&'static str>) {
        match self {
            Self::Compare { field, .. } | Self::In { field, .. } | Self::IsNull(field) => {
                if !fields.contains(field) {
                    fields.push(field);
                }
            }
            Self::And(conditions) | Self::Or(conditions) => {
                for condition in conditions {
                    condition.collect_fields(fields);
                }
            }
            Self::Not(condition) => condition.collect_fields(fields),
        }
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn join(f: &mut fmt::Formatter<'_>, items: &[Condition], sep: &str) -> fmt::Result {
            f.write_str("(")?;
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    f.write_str(sep)?;
                }
                write!(f, "{item}")?;
            }
            f.write_str(")")
        }

        match self {
            Self::Compare { field, op, value } => write!(f, "{field} {} {value}", op.as_sql()),
            Self::In { field, values } => {
                write!(f, "{field} IN [")?;
                for (i, value) in values.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{value}")?;
                }
                f.write_str("]")
            }
            Self::IsNull(field) => write!(f, "{field} IS NULL"),
            Self::And(items) => join(f, items, " AND "),
            Self::Or(items) => join(f, items, " OR "),
            Self::Not(inner) => write!(f, "NOT {inner}"),
        }
    }
}

/// A predicate over the fields of record shape `R`.
pub struct Predicate<R> {
    condition: Condition,
    shape: PhantomData<fn(&R)>,
}

impl<R> Predicate<R> {
    /// Wraps an untyped condition.
    #[must_use]
    pub fn from_condition(condition: Condition) -> Self {
        Self {
            condition,
            shape: PhantomData,
        }
    }

    fn compare(field: &'static str, op: CompareOp, value: impl Into<Value>) -> Self {
        Self::from_condition(Condition::Compare {
            field,
            op,
            value: value.into(),
        })
    }

    /// `field = value`
    #[must_use]
    pub fn eq(field: &'static str, value: impl Into<Value>) -> Self {
        Self::compare(field, CompareOp::Eq, value)
    }

    /// `field <> value`
    #[must_use]
    pub fn ne(field: &'static str, value: impl Into<Value>) -> Self {
        Self::compare(field, CompareOp::Ne, value)
    }

    /// `field < value`
    #[must_use]
    pub fn lt(field: &'static str, value: impl Into<Value>) -> Self {
        Self::compare(field, CompareOp::Lt, value)
    }

    /// `field <= value`
    #[must_use]
    pub fn le(field: &'static str, value: impl Into<Value>) -> Self {
        Self::compare(field, CompareOp::Le, value)
    }

    /// `field > value`
    #[must_use]
    pub fn gt(field: &'static str, value: impl Into<Value>) -> Self {
        Self::compare(field, CompareOp::Gt, value)
    }

    /// `field >= value`
    #[must_use]
    pub fn ge(field: &'static str, value: impl Into<Value>) -> Self {
        Self::compare(field, CompareOp::Ge, value)
    }

    /// `field IN (values...)`
    #[must_use]
    pub fn is_in<I, V>(field: &'static str, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        Self::from_condition(Condition::In {
            field,
            values: values.into_iter().map(Into::into).collect(),
        })
    }

    /// `field IS NULL`
    #[must_use]
    pub fn is_null(field: &'static str) -> Self {
        Self::from_condition(Condition::IsNull(field))
    }

    /// Conjunction of every predicate.
    #[must_use]
    pub fn all(predicates: impl IntoIterator<Item = Self>) -> Self {
        Self::from_condition(Condition::And(
            predicates.into_iter().map(|p| p.condition).collect(),
        ))
    }

    /// Disjunction of every predicate.
    #[must_use]
    pub fn any(predicates: impl IntoIterator<Item = Self>) -> Self {
        Self::from_condition(Condition::Or(
            predicates.into_iter().map(|p| p.condition).collect(),
        ))
    }

    /// `self AND other`
    #[must_use]
    pub fn and(self, other: Self) -> Self {
        Self::all([self, other])
    }

    /// `self OR other`
    #[must_use]
    pub fn or(self, other: Self) -> Self {
        Self::any([self, other])
    }

    /// `NOT self`
    #[must_use]
    #[allow(clippy::should_implement_trait)]
    pub fn not(self) -> Self {
        Self::from_condition(Condition::Not(Box::new(self.condition)))
    }

    /// Returns the expression tree.
    #[must_use]
    pub fn condition(&self) -> &Condition {
        &self.condition
    }

    /// Consumes the predicate, returning the expression tree.
    #[must_use]
    pub fn into_condition(self) -> Condition {
        self.condition
    }
}

impl<R: Record> Predicate<R> {
    /// Re-targets the predicate at record shape `T`.
    ///
    /// Every referenced field must exist by the same name on both shapes.
    pub fn rewrite<T: Record>(self) -> TesseraResult<Predicate<T>> {
        for field in self.condition.fields() {
            if !R::has_field(field) {
                return Err(TesseraError::unknown_field(shape_name::<R>(), field));
            }
            if !T::has_field(field) {
                return Err(TesseraError::unknown_field(shape_name::<T>(), field));
            }
        }
        Ok(Predicate::from_condition(self.condition))
    }

    /// Returns true if the record satisfies the predicate. Unknown is false.
    #[must_use]
    pub fn matches(&self, record: &R) -> bool {
        self.condition
            .evaluate(&|field: &str| record.get(field))
            .unwrap_or(false)
    }
}

fn shape_name<R: Record>() -> &'static str {
    R::shapes().first().copied().unwrap_or("unknown")
}

impl<R> Clone for Predicate<R> {
    fn clone(&self) -> Self {
        Self::from_condition(self.condition.clone())
    }
}

impl<R> fmt::Debug for Predicate<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Predicate").field(&self.condition).finish()
    }
}

impl<R> fmt::Display for Predicate<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.condition)
    }
}
