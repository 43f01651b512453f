//! Conversions between Rust types and typed values.
//!
//! [`Describe`] associates a Rust type with a [`Ty`] descriptor, while [`FromTyped`] and [`ToTyped`] convert
//! between the Rust type and [`TypedValue`]s. Together, they power [`from_plain()`](crate::from_plain())
//! and [`to_plain()`](crate::to_plain()). For structs and enums, these traits are usually derived
//! with [`DescribeRecord`](macro@crate::DescribeRecord) and [`DescribeEnum`](macro@crate::DescribeEnum).

use std::{
    collections::{BTreeMap, HashMap},
    hash::{BuildHasher, Hash},
    path::PathBuf,
    sync::Arc,
};

use crate::{
    de::untyped_to_plain,
    error::{ErrorKind, ValidationError},
    metadata::{EnumMetadata, RecordMetadata, Ty},
    value::{Plain, Record, TypedValue},
};

/// Rust type with a known type descriptor.
pub trait Describe {
    /// Returns the type descriptor.
    fn ty() -> Ty;
}

/// Rust type that can be converted from a [`TypedValue`].
pub trait FromTyped: Sized {
    /// Performs the conversion.
    ///
    /// # Errors
    ///
    /// Should return an error if the value has an unexpected shape.
    fn from_typed(value: TypedValue) -> Result<Self, ValidationError>;
}

/// Rust type that can be converted to a [`TypedValue`].
pub trait ToTyped {
    /// Performs the conversion.
    ///
    /// # Errors
    ///
    /// Should return an error if the value cannot be represented (e.g., an integer doesn't fit into `i64`).
    fn to_typed(&self) -> Result<TypedValue, ValidationError>;
}

/// Struct described as a record.
pub trait DescribeRecord: Describe {
    /// Returns record metadata. The returned metadata must be the same on each call.
    fn metadata() -> Arc<RecordMetadata>;
}

/// Enum described as an enumeration.
pub trait DescribeEnum: Describe {
    /// Returns enum metadata.
    fn metadata() -> Arc<EnumMetadata>;
}

fn mismatch(expected: &str, value: &TypedValue) -> ValidationError {
    ValidationError::type_mismatch(expected, value.kind_name())
}

impl Describe for bool {
    fn ty() -> Ty {
        Ty::bool()
    }
}

impl FromTyped for bool {
    fn from_typed(value: TypedValue) -> Result<Self, ValidationError> {
        match value {
            TypedValue::Bool(val) => Ok(val),
            _ => Err(mismatch("bool", &value)),
        }
    }
}

impl ToTyped for bool {
    fn to_typed(&self) -> Result<TypedValue, ValidationError> {
        Ok(TypedValue::Bool(*self))
    }
}

macro_rules! impl_for_int {
    ($($int:ty),+) => {
        $(
        impl Describe for $int {
            fn ty() -> Ty {
                Ty::int()
            }
        }

        impl FromTyped for $int {
            fn from_typed(value: TypedValue) -> Result<Self, ValidationError> {
                let TypedValue::Int(val) = value else {
                    return Err(mismatch("int", &value));
                };
                <$int>::try_from(val).map_err(|_| {
                    ValidationError::new(
                        ErrorKind::ImplicitCast,
                        format!("integer {val} does not fit into {}", stringify!($int)),
                    )
                })
            }
        }

        impl ToTyped for $int {
            fn to_typed(&self) -> Result<TypedValue, ValidationError> {
                let val = i64::try_from(*self).map_err(|_| {
                    ValidationError::new(
                        ErrorKind::ImplicitCast,
                        format!("integer {self} does not fit into int"),
                    )
                })?;
                Ok(TypedValue::Int(val))
            }
        }
        )+
    };
}

impl_for_int!(i8, i16, i32, i64, isize, u8, u16, u32, u64, usize);

impl Describe for f64 {
    fn ty() -> Ty {
        Ty::float()
    }
}

impl FromTyped for f64 {
    #[allow(clippy::cast_precision_loss)] // acceptable
    fn from_typed(value: TypedValue) -> Result<Self, ValidationError> {
        match value {
            TypedValue::Float(val) => Ok(val),
            TypedValue::Int(val) => Ok(val as f64),
            _ => Err(mismatch("float", &value)),
        }
    }
}

impl ToTyped for f64 {
    fn to_typed(&self) -> Result<TypedValue, ValidationError> {
        Ok(TypedValue::Float(*self))
    }
}

impl Describe for f32 {
    fn ty() -> Ty {
        Ty::float()
    }
}

impl FromTyped for f32 {
    #[allow(clippy::cast_possible_truncation)] // acceptable
    fn from_typed(value: TypedValue) -> Result<Self, ValidationError> {
        f64::from_typed(value).map(|val| val as f32)
    }
}

impl ToTyped for f32 {
    fn to_typed(&self) -> Result<TypedValue, ValidationError> {
        Ok(TypedValue::Float(f64::from(*self)))
    }
}

impl Describe for String {
    fn ty() -> Ty {
        Ty::str()
    }
}

impl FromTyped for String {
    fn from_typed(value: TypedValue) -> Result<Self, ValidationError> {
        match value {
            TypedValue::Str(val) => Ok(val),
            _ => Err(mismatch("str", &value)),
        }
    }
}

impl ToTyped for String {
    fn to_typed(&self) -> Result<TypedValue, ValidationError> {
        Ok(TypedValue::Str(self.clone()))
    }
}

impl Describe for PathBuf {
    fn ty() -> Ty {
        Ty::Path
    }
}

impl FromTyped for PathBuf {
    fn from_typed(value: TypedValue) -> Result<Self, ValidationError> {
        match value {
            TypedValue::Path(val) => Ok(val),
            _ => Err(mismatch("path", &value)),
        }
    }
}

impl ToTyped for PathBuf {
    fn to_typed(&self) -> Result<TypedValue, ValidationError> {
        Ok(TypedValue::Path(self.clone()))
    }
}

impl<T: Describe> Describe for Option<T> {
    fn ty() -> Ty {
        Ty::optional(T::ty())
    }
}

impl<T: FromTyped> FromTyped for Option<T> {
    fn from_typed(value: TypedValue) -> Result<Self, ValidationError> {
        match value {
            TypedValue::Null => Ok(None),
            _ => T::from_typed(value).map(Some),
        }
    }
}

impl<T: ToTyped> ToTyped for Option<T> {
    fn to_typed(&self) -> Result<TypedValue, ValidationError> {
        match self {
            Some(val) => val.to_typed(),
            None => Ok(TypedValue::Null),
        }
    }
}

impl<T: Describe> Describe for Vec<T> {
    fn ty() -> Ty {
        Ty::list(T::ty())
    }
}

impl<T: FromTyped> FromTyped for Vec<T> {
    fn from_typed(value: TypedValue) -> Result<Self, ValidationError> {
        match value {
            TypedValue::List(items) => items.into_iter().map(T::from_typed).collect(),
            _ => Err(mismatch("list", &value)),
        }
    }
}

impl<T: ToTyped> ToTyped for Vec<T> {
    fn to_typed(&self) -> Result<TypedValue, ValidationError> {
        let items = self.iter().map(T::to_typed).collect::<Result<_, _>>()?;
        Ok(TypedValue::List(items))
    }
}

fn dict_entries(value: TypedValue) -> Result<Vec<(TypedValue, TypedValue)>, ValidationError> {
    match value {
        TypedValue::Dict(entries) => Ok(entries),
        _ => Err(mismatch("dict", &value)),
    }
}

fn to_dict<'a, K, V>(entries: impl Iterator<Item = (&'a K, &'a V)>) -> Result<TypedValue, ValidationError>
where
    K: ToTyped + 'a,
    V: ToTyped + 'a,
{
    let entries = entries
        .map(|(key, value)| -> Result<_, ValidationError> {
            Ok((key.to_typed()?, value.to_typed()?))
        })
        .collect::<Result<_, ValidationError>>()?;
    Ok(TypedValue::Dict(entries))
}

impl<K: Describe, V: Describe, S> Describe for HashMap<K, V, S> {
    fn ty() -> Ty {
        Ty::dict(K::ty(), V::ty())
    }
}

impl<K, V, S> FromTyped for HashMap<K, V, S>
where
    K: FromTyped + Eq + Hash,
    V: FromTyped,
    S: BuildHasher + Default,
{
    fn from_typed(value: TypedValue) -> Result<Self, ValidationError> {
        dict_entries(value)?
            .into_iter()
            .map(|(key, value)| -> Result<_, ValidationError> {
                Ok((K::from_typed(key)?, V::from_typed(value)?))
            })
            .collect()
    }
}

impl<K: ToTyped, V: ToTyped, S> ToTyped for HashMap<K, V, S> {
    fn to_typed(&self) -> Result<TypedValue, ValidationError> {
        to_dict(self.iter())
    }
}

impl<K: Describe, V: Describe> Describe for BTreeMap<K, V> {
    fn ty() -> Ty {
        Ty::dict(K::ty(), V::ty())
    }
}

impl<K: FromTyped + Ord, V: FromTyped> FromTyped for BTreeMap<K, V> {
    fn from_typed(value: TypedValue) -> Result<Self, ValidationError> {
        dict_entries(value)?
            .into_iter()
            .map(|(key, value)| -> Result<_, ValidationError> {
                Ok((K::from_typed(key)?, V::from_typed(value)?))
            })
            .collect()
    }
}

impl<K: ToTyped, V: ToTyped> ToTyped for BTreeMap<K, V> {
    fn to_typed(&self) -> Result<TypedValue, ValidationError> {
        to_dict(self.iter())
    }
}

macro_rules! impl_for_tuple {
    ($len:literal: $($t:ident),+) => {
        impl<$($t: Describe,)+> Describe for ($($t,)+) {
            fn ty() -> Ty {
                Ty::tuple([$($t::ty(),)+])
            }
        }

        impl<$($t: FromTyped,)+> FromTyped for ($($t,)+) {
            fn from_typed(value: TypedValue) -> Result<Self, ValidationError> {
                let items = match value {
                    TypedValue::Tuple(items) if items.len() == $len => items,
                    _ => return Err(mismatch(concat!("tuple of length ", $len), &value)),
                };
                let mut items = items.into_iter();
                Ok(($($t::from_typed(items.next().unwrap_or_default())?,)+))
            }
        }

        impl<$($t: ToTyped,)+> ToTyped for ($($t,)+) {
            #[allow(non_snake_case)]
            fn to_typed(&self) -> Result<TypedValue, ValidationError> {
                let ($($t,)+) = self;
                Ok(TypedValue::Tuple(vec![$($t.to_typed()?,)+]))
            }
        }
    };
}

impl_for_tuple!(2: A, B);
impl_for_tuple!(3: A, B, C);

impl Describe for Plain {
    fn ty() -> Ty {
        Ty::Any
    }
}

impl FromTyped for Plain {
    fn from_typed(value: TypedValue) -> Result<Self, ValidationError> {
        match value {
            TypedValue::Any(val) => Ok(val),
            other => untyped_to_plain(&other),
        }
    }
}

impl ToTyped for Plain {
    fn to_typed(&self) -> Result<TypedValue, ValidationError> {
        Ok(TypedValue::Any(self.clone()))
    }
}

impl FromTyped for Record {
    fn from_typed(value: TypedValue) -> Result<Self, ValidationError> {
        match value {
            TypedValue::Record(record) => Ok(record),
            _ => Err(mismatch("record", &value)),
        }
    }
}

impl ToTyped for Record {
    fn to_typed(&self) -> Result<TypedValue, ValidationError> {
        Ok(TypedValue::Record(self.clone()))
    }
}

impl FromTyped for TypedValue {
    fn from_typed(value: TypedValue) -> Result<Self, ValidationError> {
        Ok(value)
    }
}

impl ToTyped for TypedValue {
    fn to_typed(&self) -> Result<TypedValue, ValidationError> {
        Ok(self.clone())
    }
}
