//! Errors raised while defining, calling or injecting into host members.

use core::fmt;

use thiserror::Error;

/// How a host member is dispatched.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MemberKind {
    /// Called on an instance.
    Method,
    /// Called on the class; receives the [`HostClass`](crate::HostClass).
    ClassMethod,
    /// Called with no receiver.
    StaticMethod,
    /// Read from an instance.
    Property,
}

impl fmt::Display for MemberKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Method => "method",
            Self::ClassMethod => "class method",
            Self::StaticMethod => "static method",
            Self::Property => "property",
        })
    }
}

/// A member could not be defined or resolved.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MemberError {
    /// The class has no member of that name.
    #[error("class '{class}' has no member '{member}'")]
    NotFound {
        /// Class name.
        class: String,
        /// Member name.
        member: String,
    },
    /// The member exists but is dispatched differently.
    #[error("'{class}.{member}' is a {actual}, not a {expected}")]
    WrongKind {
        /// Class name.
        class: String,
        /// Member name.
        member: String,
        /// Kind the caller asked for.
        expected: MemberKind,
        /// Kind the member was defined with.
        actual: MemberKind,
    },
    /// The member exists but its callable has other parameter or return types.
    #[error("'{class}.{member}' has signature {actual}, not {expected}")]
    SignatureMismatch {
        /// Class name.
        class: String,
        /// Member name.
        member: String,
        /// Signature the caller asked for.
        expected: String,
        /// Signature the member was defined with.
        actual: String,
    },
    /// A member of that name was already defined.
    #[error("'{class}.{member}' is already defined")]
    AlreadyDefined {
        /// Class name.
        class: String,
        /// Member name.
        member: String,
    },
}

/// An injection was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InjectionError {
    /// The target class exists but lacks the member.
    #[error("cannot inject into '{class}.{member}': no such member")]
    MemberNotFound {
        /// Class name.
        class: String,
        /// Member name.
        member: String,
    },
    /// The member's kind or signature does not fit the injected callable.
    #[error(transparent)]
    Incompatible(#[from] MemberError),
}
