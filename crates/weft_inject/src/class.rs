//! Host classes and their members.
//!
//! The host publishes each gameplay class as a [`HostClass`]: a name plus a
//! table of typed members. Every member stores a [`Callable`] whose types
//! encode its kind:
//!
//! | Kind | Callable |
//! |------|----------|
//! | [`MemberKind::Method`] | `Callable<Instance, Args, R>` |
//! | [`MemberKind::ClassMethod`] | `Callable<HostClass, Args, R>` |
//! | [`MemberKind::StaticMethod`] | `Callable<(), Args, R>` |
//! | [`MemberKind::Property`] | `Callable<Instance, (), R>` |
//!
//! Callers go through the kind-specific accessors, which check both kind
//! and signature, so a lookup can fail but never panics.

use core::any::{Any, type_name};
use core::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use parking_lot::RwLock;
use weft_log::Fault;
use weft_system::service::{Service, Services};

use crate::error::{MemberError, MemberKind};

/// A member implementation: receiver, arguments, result.
pub type Callable<S, A, R> = Arc<dyn Fn(&S, A) -> Result<R, Fault> + Send + Sync>;

/// One injection applied to a member.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InjectionRecord {
    /// Name of the injecting mod.
    pub owner: String,
    /// Whether the injection swallows its own failures.
    pub catch_exceptions: bool,
}

struct MemberSlot {
    kind: MemberKind,
    signature: String,
    current: Box<dyn Any + Send + Sync>,
    original: Box<dyn Any + Send + Sync>,
    injections: Vec<InjectionRecord>,
}

fn signature<S: 'static, A: 'static, R: 'static>() -> String {
    format!(
        "fn(&{}, {}) -> {}",
        type_name::<S>(),
        type_name::<A>(),
        type_name::<R>()
    )
}

/// A class published by the host.
pub struct HostClass {
    name: String,
    members: RwLock<IndexMap<String, MemberSlot>>,
}

impl fmt::Debug for HostClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HostClass")
            .field("name", &self.name)
            .field("members", &self.members())
            .finish()
    }
}

impl HostClass {
    /// Creates a class with no members.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            members: RwLock::new(IndexMap::new()),
        }
    }

    /// Class name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Member names and kinds in definition order.
    #[must_use]
    pub fn members(&self) -> Vec<(String, MemberKind)> {
        self.members
            .read()
            .iter()
            .map(|(name, slot)| (name.clone(), slot.kind))
            .collect()
    }

    /// Kind of `member`, if defined.
    #[must_use]
    pub fn kind(&self, member: &str) -> Option<MemberKind> {
        self.members.read().get(member).map(|slot| slot.kind)
    }

    /// Injections applied to `member`, innermost first.
    #[must_use]
    pub fn injections(&self, member: &str) -> Vec<InjectionRecord> {
        self.members
            .read()
            .get(member)
            .map(|slot| slot.injections.clone())
            .unwrap_or_default()
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Definition
    // ─────────────────────────────────────────────────────────────────────────

    /// Defines an instance method.
    pub fn define_method<S, A, R>(
        &self,
        member: &str,
        method: impl Fn(&S, A) -> Result<R, Fault> + Send + Sync + 'static,
    ) -> Result<(), MemberError>
    where
        S: 'static,
        A: 'static,
        R: 'static,
    {
        self.define::<S, A, R>(member, MemberKind::Method, Arc::new(method))
    }

    /// Defines a class method. It receives this class as its receiver.
    pub fn define_class_method<A, R>(
        &self,
        member: &str,
        method: impl Fn(&HostClass, A) -> Result<R, Fault> + Send + Sync + 'static,
    ) -> Result<(), MemberError>
    where
        A: 'static,
        R: 'static,
    {
        self.define::<HostClass, A, R>(member, MemberKind::ClassMethod, Arc::new(method))
    }

    /// Defines a static method.
    pub fn define_static_method<A, R>(
        &self,
        member: &str,
        method: impl Fn(A) -> Result<R, Fault> + Send + Sync + 'static,
    ) -> Result<(), MemberError>
    where
        A: 'static,
        R: 'static,
    {
        self.define::<(), A, R>(
            member,
            MemberKind::StaticMethod,
            Arc::new(move |_: &(), args: A| method(args)),
        )
    }

    /// Defines a read-only property.
    pub fn define_property<S, R>(
        &self,
        member: &str,
        getter: impl Fn(&S) -> Result<R, Fault> + Send + Sync + 'static,
    ) -> Result<(), MemberError>
    where
        S: 'static,
        R: 'static,
    {
        self.define::<S, (), R>(
            member,
            MemberKind::Property,
            Arc::new(move |receiver: &S, ()| getter(receiver)),
        )
    }

    fn define<S: 'static, A: 'static, R: 'static>(
        &self,
        member: &str,
        kind: MemberKind,
        callable: Callable<S, A, R>,
    ) -> Result<(), MemberError> {
        let mut members = self.members.write();
        if members.contains_key(member) {
            return Err(MemberError::AlreadyDefined {
                class: self.name.clone(),
                member: member.to_string(),
            });
        }
        members.insert(
            member.to_string(),
            MemberSlot {
                kind,
                signature: signature::<S, A, R>(),
                current: Box::new(Arc::clone(&callable)),
                original: Box::new(callable),
                injections: Vec::new(),
            },
        );
        Ok(())
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Invocation
    // ─────────────────────────────────────────────────────────────────────────

    /// Calls an instance method on `receiver`.
    ///
    /// Lookup failures surface as a [`Fault`] wrapping a [`MemberError`].
    pub fn call_method<S, A, R>(&self, receiver: &S, member: &str, args: A) -> Result<R, Fault>
    where
        S: 'static,
        A: 'static,
        R: 'static,
    {
        let method = self.resolve::<S, A, R>(member, Some(MemberKind::Method))?;
        method(receiver, args)
    }

    /// Calls a class method.
    pub fn call_class_method<A, R>(&self, member: &str, args: A) -> Result<R, Fault>
    where
        A: 'static,
        R: 'static,
    {
        let method = self.resolve::<HostClass, A, R>(member, Some(MemberKind::ClassMethod))?;
        method(self, args)
    }

    /// Calls a static method.
    pub fn call_static<A, R>(&self, member: &str, args: A) -> Result<R, Fault>
    where
        A: 'static,
        R: 'static,
    {
        let method = self.resolve::<(), A, R>(member, Some(MemberKind::StaticMethod))?;
        method(&(), args)
    }

    /// Reads a property of `receiver`.
    pub fn get_property<S, R>(&self, receiver: &S, member: &str) -> Result<R, Fault>
    where
        S: 'static,
        R: 'static,
    {
        let getter = self.resolve::<S, (), R>(member, Some(MemberKind::Property))?;
        getter(receiver, ())
    }

    /// The member's implementation as it was before any injection.
    pub fn original<S, A, R>(&self, member: &str) -> Result<Callable<S, A, R>, MemberError>
    where
        S: 'static,
        A: 'static,
        R: 'static,
    {
        let members = self.members.read();
        let slot = self.slot(&members, member)?;
        self.downcast(member, slot, &*slot.original)
    }

    /// Current implementation of `member`, checking `kind` when given.
    ///
    /// The callable is cloned out of the table, so running it never holds
    /// the member lock.
    pub fn resolve<S, A, R>(
        &self,
        member: &str,
        kind: Option<MemberKind>,
    ) -> Result<Callable<S, A, R>, MemberError>
    where
        S: 'static,
        A: 'static,
        R: 'static,
    {
        let members = self.members.read();
        let slot = self.slot(&members, member)?;
        if let Some(expected) = kind
            && expected != slot.kind
        {
            return Err(MemberError::WrongKind {
                class: self.name.clone(),
                member: member.to_string(),
                expected,
                actual: slot.kind,
            });
        }
        self.downcast(member, slot, &*slot.current)
    }

    /// Replaces the current implementation of `member` with `wrap(current)`
    /// and records `record`. Returns the injections that were already in place.
    pub(crate) fn replace<S, A, R>(
        &self,
        member: &str,
        record: InjectionRecord,
        wrap: impl FnOnce(Callable<S, A, R>) -> Callable<S, A, R>,
    ) -> Result<Vec<InjectionRecord>, MemberError>
    where
        S: 'static,
        A: 'static,
        R: 'static,
    {
        let mut members = self.members.write();
        let slot = members
            .get_mut(member)
            .ok_or_else(|| MemberError::NotFound {
                class: self.name.clone(),
                member: member.to_string(),
            })?;
        let current = match slot.current.downcast_ref::<Callable<S, A, R>>() {
            Some(current) => Arc::clone(current),
            None => {
                return Err(MemberError::SignatureMismatch {
                    class: self.name.clone(),
                    member: member.to_string(),
                    expected: signature::<S, A, R>(),
                    actual: slot.signature.clone(),
                });
            }
        };
        let previous = slot.injections.clone();
        slot.current = Box::new(wrap(current));
        slot.injections.push(record);
        Ok(previous)
    }

    fn slot<'a>(
        &self,
        members: &'a IndexMap<String, MemberSlot>,
        member: &str,
    ) -> Result<&'a MemberSlot, MemberError> {
        members.get(member).ok_or_else(|| MemberError::NotFound {
            class: self.name.clone(),
            member: member.to_string(),
        })
    }

    fn downcast<S: 'static, A: 'static, R: 'static>(
        &self,
        member: &str,
        slot: &MemberSlot,
        callable: &(dyn Any + Send + Sync),
    ) -> Result<Callable<S, A, R>, MemberError> {
        callable
            .downcast_ref::<Callable<S, A, R>>()
            .cloned()
            .ok_or_else(|| MemberError::SignatureMismatch {
                class: self.name.clone(),
                member: member.to_string(),
                expected: signature::<S, A, R>(),
                actual: slot.signature.clone(),
            })
    }
}

/// Classes the host has published, by name.
#[derive(Default)]
pub struct ClassRegistry {
    classes: RwLock<IndexMap<String, Arc<HostClass>>>,
}

impl Service for ClassRegistry {
    fn create(_: &Services) -> Self {
        Self::default()
    }
}

impl fmt::Debug for ClassRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.classes.read().keys()).finish()
    }
}

impl ClassRegistry {
    /// Publishes a class named `name`, or returns the one already published.
    pub fn publish(&self, name: &str) -> Arc<HostClass> {
        if let Some(class) = self.classes.read().get(name) {
            return Arc::clone(class);
        }
        let mut classes = self.classes.write();
        let class = classes
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(HostClass::new(name)));
        tracing::debug!(class = name, "host class published");
        Arc::clone(class)
    }

    /// Looks up a published class.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<Arc<HostClass>> {
        self.classes.read().get(name).cloned()
    }

    /// Names of every published class in publication order.
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        self.classes.read().keys().cloned().collect()
    }
}
