//! Record shapes: statically generated field tables for entities and DTOs.
//!
//! A [`Record`] exposes its fields by name so the DAO can read keys, copy
//! same-named fields between shapes and build predicates without knowing the
//! concrete type. Field tables are produced at compile time by [`record!`]
//! for single structs and by [`hierarchy!`] for closed sum types whose
//! variants share one table.
//!
//! [`record!`]: crate::record!
//! [`hierarchy!`]: crate::hierarchy!

use crate::{TesseraError, TesseraResult};

/// A value shape with named fields.
pub trait Record: Clone + Send + Sync + 'static {
    /// Every concrete shape this type can hold. The first entry is the base shape.
    fn shapes() -> &'static [&'static str];

    /// Field names shared by every concrete shape, in declaration order.
    fn field_names() -> &'static [&'static str];

    /// Fields carrying the declared-key marker, in declaration order.
    fn declared_key() -> &'static [&'static str] {
        &[]
    }

    /// Column that stores the concrete shape name, for hierarchies.
    fn discriminator() -> Option<&'static str> {
        None
    }

    /// Creates a default value of the given concrete shape.
    fn blank(shape: &str) -> Option<Self>;

    /// Name of the concrete shape held by this value.
    fn shape(&self) -> &'static str;

    /// Field names of this value's concrete shape.
    fn fields(&self) -> &'static [&'static str];

    /// Reads a field. `None` if the concrete shape has no such field.
    fn get(&self, field: &str) -> Option<crate::Value>;

    /// Writes a field.
    fn set(&mut self, field: &str, value: crate::Value) -> TesseraResult<()>;

    /// Returns true if every concrete shape declares `field`.
    fn has_field(field: &str) -> bool {
        Self::field_names().contains(&field)
    }
}

/// A record with exactly one concrete shape.
pub trait ConcreteRecord: Record {
    /// Shape name (the type name).
    const SHAPE: &'static str;
    /// Field names in declaration order.
    const FIELDS: &'static [&'static str];
    /// Fields marked as key.
    const KEY: &'static [&'static str];
}

/// Projects `source` onto a fresh value of `target_shape`, copying every
/// field both shapes declare by the same name.
///
/// Fields the source does not have keep the target's default.
pub fn project<S: Record, T: Record>(source: &S, target_shape: &str) -> TesseraResult<T> {
    let mut target = T::blank(target_shape).ok_or_else(|| {
        TesseraError::mapping(format!(
            "cannot project {} onto unknown shape {target_shape}",
            source.shape()
        ))
    })?;
    for field in target.fields() {
        if let Some(value) = source.get(field) {
            target.set(field, value)?;
        }
    }
    Ok(target)
}

/// Copies every field of `incoming` that `existing` declares onto `existing`.
///
/// The concrete shape of `existing` is preserved.
pub fn overwrite<R: Record>(existing: &mut R, incoming: &R) -> TesseraResult<()> {
    for field in existing.fields() {
        if let Some(value) = incoming.get(field) {
            existing.set(field, value)?;
        }
    }
    Ok(())
}

/// Implements [`Record`] and [`ConcreteRecord`] for a struct.
///
/// The struct must implement `Clone` and `Default`, and every listed field
/// must implement [`FieldValue`](crate::FieldValue). An optional `key(...)`
/// clause marks the declared key fields.
///
/// ```ignore
/// #[derive(Debug, Clone, Default)]
/// pub struct SimpleDto {
///     pub key: i32,
///     pub value: Option<String>,
/// }
///
/// tessera_core::record!(SimpleDto key(key) { key, value });
/// ```
#[macro_export]
macro_rules! record {
    ($ty:ident $(key($($key:ident),+ $(,)?))? { $($field:ident),+ $(,)? }) => {
        impl $crate::ConcreteRecord for $ty {
            const SHAPE: &'static str = stringify!($ty);
            const FIELDS: &'static [&'static str] = &[$(stringify!($field)),+];
            const KEY: &'static [&'static str] = &[$($(stringify!($key)),+)?];
        }

        impl $crate::Record for $ty {
            fn shapes() -> &'static [&'static str] {
                const SHAPES: &[&str] = &[<$ty as $crate::ConcreteRecord>::SHAPE];
                SHAPES
            }

            fn field_names() -> &'static [&'static str] {
                <$ty as $crate::ConcreteRecord>::FIELDS
            }

            fn declared_key() -> &'static [&'static str] {
                <$ty as $crate::ConcreteRecord>::KEY
            }

            fn blank(shape: &str) -> Option<Self> {
                (shape == <$ty as $crate::ConcreteRecord>::SHAPE)
                    .then(<$ty as ::core::default::Default>::default)
            }

            fn shape(&self) -> &'static str {
                <$ty as $crate::ConcreteRecord>::SHAPE
            }

            fn fields(&self) -> &'static [&'static str] {
                <$ty as $crate::ConcreteRecord>::FIELDS
            }

            fn get(&self, field: &str) -> Option<$crate::Value> {
                match field {
                    $(stringify!($field) => Some($crate::FieldValue::to_value(&self.$field)),)+
                    _ => None,
                }
            }

            fn set(&mut self, field: &str, value: $crate::Value) -> $crate::TesseraResult<()> {
                match field {
                    $(
                        stringify!($field) => {
                            self.$field = $crate::FieldValue::from_value(value).map_err(|e| {
                                $crate::TesseraError::mapping(format!(
                                    "{}.{}: {}",
                                    <$ty as $crate::ConcreteRecord>::SHAPE,
                                    field,
                                    e
                                ))
                            })?;
                            Ok(())
                        }
                    )+
                    _ => Err($crate::TesseraError::unknown_field(
                        <$ty as $crate::ConcreteRecord>::SHAPE,
                        field,
                    )),
                }
            }
        }
    };
}

/// Implements [`Record`] for a closed sum type of concrete records stored in
/// one table (table-per-hierarchy).
///
/// The first variant is the base shape: its fields are the fields every
/// variant shares and its key is the hierarchy key. The discriminator column
/// stores the concrete shape name.
///
/// ```ignore
/// #[derive(Debug, Clone)]
/// pub enum TphEntity {
///     Base(TphBaseEntity),
///     Tph1(Tph1Entity),
/// }
///
/// tessera_core::hierarchy!(TphEntity, discriminator = "discriminator" {
///     Base(TphBaseEntity),
///     Tph1(Tph1Entity),
/// });
/// ```
#[macro_export]
macro_rules! hierarchy {
    (
        $name:ident, discriminator = $disc:literal {
            $base_variant:ident($base_ty:ty) $(, $variant:ident($ty:ty))* $(,)?
        }
    ) => {
        impl $crate::Record for $name {
            fn shapes() -> &'static [&'static str] {
                const SHAPES: &[&str] = &[
                    <$base_ty as $crate::ConcreteRecord>::SHAPE,
                    $(<$ty as $crate::ConcreteRecord>::SHAPE,)*
                ];
                SHAPES
            }

            fn field_names() -> &'static [&'static str] {
                <$base_ty as $crate::ConcreteRecord>::FIELDS
            }

            fn declared_key() -> &'static [&'static str] {
                <$base_ty as $crate::ConcreteRecord>::KEY
            }

            fn discriminator() -> Option<&'static str> {
                Some($disc)
            }

            fn blank(shape: &str) -> Option<Self> {
                if let Some(record) = <$base_ty as $crate::Record>::blank(shape) {
                    return Some(Self::$base_variant(record));
                }
                $(
                    if let Some(record) = <$ty as $crate::Record>::blank(shape) {
                        return Some(Self::$variant(record));
                    }
                )*
                None
            }

            fn shape(&self) -> &'static str {
                match self {
                    Self::$base_variant(record) => $crate::Record::shape(record),
                    $(Self::$variant(record) => $crate::Record::shape(record),)*
                }
            }

            fn fields(&self) -> &'static [&'static str] {
                match self {
                    Self::$base_variant(record) => $crate::Record::fields(record),
                    $(Self::$variant(record) => $crate::Record::fields(record),)*
                }
            }

            fn get(&self, field: &str) -> Option<$crate::Value> {
                match self {
                    Self::$base_variant(record) => $crate::Record::get(record, field),
                    $(Self::$variant(record) => $crate::Record::get(record, field),)*
                }
            }

            fn set(&mut self, field: &str, value: $crate::Value) -> $crate::TesseraResult<()> {
                match self {
                    Self::$base_variant(record) => $crate::Record::set(record, field, value),
                    $(Self::$variant(record) => $crate::Record::set(record, field, value),)*
                }
            }
        }
    };
}
