//! Small helpers shared by mods.

use core::hash::Hash;

use hashbrown::HashSet;
use thiserror::Error;

/// Returns true if `a` and `b` share at least one element.
///
/// ```
/// use weft_core_plugins::util::has_intersection;
///
/// assert!(has_intersection([1, 2, 3], [2]));
/// assert!(!has_intersection([1, 2, 3], [4, 8]));
/// ```
pub fn has_intersection<T, A, B>(a: A, b: B) -> bool
where
    T: Eq + Hash,
    A: IntoIterator<Item = T>,
    B: IntoIterator<Item = T>,
{
    let b: HashSet<T> = b.into_iter().collect();
    !b.is_empty() && a.into_iter().any(|item| b.contains(&item))
}

/// Every `k`-element combination of `items`, in lexicographic index order.
///
/// ```
/// use weft_core_plugins::util::combinations;
///
/// assert_eq!(combinations(&[1, 2, 3], 2), vec![vec![1, 2], vec![1, 3], vec![2, 3]]);
/// ```
#[must_use]
pub fn combinations<T: Clone>(items: &[T], k: usize) -> Vec<Vec<T>> {
    if k > items.len() {
        return Vec::new();
    }
    let mut result = Vec::new();
    let mut indices: Vec<usize> = (0..k).collect();
    loop {
        result.push(indices.iter().map(|&i| items[i].clone()).collect());

        // Rightmost index that can still advance.
        let Some(pos) = (0..k).rev().find(|&i| indices[i] != i + items.len() - k) else {
            return result;
        };
        indices[pos] += 1;
        for i in pos + 1..k {
            indices[i] = indices[i - 1] + 1;
        }
    }
}

/// A value does not correspond to any variant of a [`weft_enum!`](crate::weft_enum) enum.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{value} is not a valid {enum_name}")]
pub struct UnknownEnumValue {
    /// Enum type name.
    pub enum_name: &'static str,
    /// The rejected value.
    pub value: String,
}

/// Declares an enum whose variants map to fixed integer or string values.
///
/// Integer-valued enums convert to and from their representation type;
/// string-valued enums expose `as_str`, `Display` and `FromStr`.
///
/// ```
/// use weft_core_plugins::weft_enum;
///
/// weft_enum! {
///     pub enum Number: i32 {
///         One = 1,
///         Two = 2,
///         Three = 3,
///     }
/// }
///
/// weft_enum! {
///     pub enum Word: str {
///         One = "One",
///         Two = "Two",
///         Three = "Three",
///     }
/// }
///
/// assert_eq!(i32::from(Number::Two), 2);
/// assert_eq!(Number::try_from(3), Ok(Number::Three));
/// assert_eq!(Word::Three.as_str(), "Three");
/// assert_eq!("One".parse::<Word>(), Ok(Word::One));
/// ```
#[macro_export]
macro_rules! weft_enum {
    (
        $(#[$meta:meta])*
        $vis:vis enum $name:ident : str {
            $($(#[$vmeta:meta])* $variant:ident = $value:literal),* $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
        $vis enum $name {
            $($(#[$vmeta])* $variant),*
        }

        impl $name {
            /// Every variant in declaration order.
            pub const ALL: &'static [$name] = &[$($name::$variant),*];

            /// The variant's string value.
            #[must_use]
            pub fn as_str(self) -> &'static str {
                match self {
                    $($name::$variant => $value),*
                }
            }
        }

        impl ::core::fmt::Display for $name {
            fn fmt(&self, f: &mut ::core::fmt::Formatter<'_>) -> ::core::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl ::core::str::FromStr for $name {
            type Err = $crate::util::UnknownEnumValue;

            fn from_str(s: &str) -> ::core::result::Result<Self, Self::Err> {
                match s {
                    $($value => ::core::result::Result::Ok($name::$variant),)*
                    _ => ::core::result::Result::Err($crate::util::UnknownEnumValue {
                        enum_name: ::core::stringify!($name),
                        value: s.into(),
                    }),
                }
            }
        }

        impl ::core::convert::From<$name> for &'static str {
            fn from(value: $name) -> Self {
                value.as_str()
            }
        }
    };
    (
        $(#[$meta:meta])*
        $vis:vis enum $name:ident : $repr:ty {
            $($(#[$vmeta:meta])* $variant:ident = $value:literal),* $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
        $vis enum $name {
            $($(#[$vmeta])* $variant),*
        }

        impl $name {
            /// Every variant in declaration order.
            pub const ALL: &'static [$name] = &[$($name::$variant),*];

            /// The variant's integer value.
            #[must_use]
            pub fn value(self) -> $repr {
                match self {
                    $($name::$variant => $value),*
                }
            }
        }

        impl ::core::convert::From<$name> for $repr {
            fn from(value: $name) -> Self {
                value.value()
            }
        }

        impl ::core::convert::TryFrom<$repr> for $name {
            type Error = $crate::util::UnknownEnumValue;

            fn try_from(value: $repr) -> ::core::result::Result<Self, Self::Error> {
                $(if value == $value {
                    return ::core::result::Result::Ok($name::$variant);
                })*
                ::core::result::Result::Err($crate::util::UnknownEnumValue {
                    enum_name: ::core::stringify!($name),
                    value: ::std::string::ToString::to_string(&value),
                })
            }
        }
    };
}
