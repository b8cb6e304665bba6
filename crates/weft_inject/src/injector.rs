//! Installing injections.
//!
//! An injection wraps the current implementation of a host member. The
//! injected function receives the wrapped implementation as an
//! [`Original`] and decides whether, when and how often to call it.
//! Later injections wrap earlier ones, so the most recent is outermost and
//! every level reaches the host implementation through its `original`.
//!
//! # Exception Catching
//!
//! With [`InjectOptions::catch_exceptions`] set (the default), a failure of
//! the injected function is recorded against the injecting mod and the
//! wrapped implementation runs instead, with the same arguments. A fault
//! raised by the wrapped implementation and handed back unchanged (or with
//! added context) passes through untouched, so an injection never hides an
//! error the host would have raised without it. Faults are told apart by
//! [`Fault::id`]: an injection that recovers from a failing original and then
//! fails on its own is still recorded and falls back.
//!
//! A panic in the wrapped implementation reaches the injected function as an
//! `Err` fault. If that fault comes back out of the injection, the panic
//! resumes with its original payload.
//!
//! # Deferral
//!
//! Injecting into a class the host has not published yet queues the
//! injection. [`Injector::install_pending`] replays the queue; the
//! [`InjectPlugin`](crate::InjectPlugin) calls it when the host raises
//! [`HostReady`](weft_events::HostReady).

use core::cell::RefCell;
use core::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use weft_log::{Fault, Logs, isolate};
use weft_system::identity::ModIdentity;
use weft_system::service::{Service, Services};

use crate::class::{Callable, ClassRegistry, HostClass, InjectionRecord};
use crate::error::{InjectionError, MemberError};

/// Per-injection settings.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct InjectOptions {
    /// Record failures of the injected function and fall back to the
    /// wrapped implementation instead of propagating them.
    pub catch_exceptions: bool,
}

impl Default for InjectOptions {
    fn default() -> Self {
        Self {
            catch_exceptions: true,
        }
    }
}

impl InjectOptions {
    /// Options that let failures of the injected function propagate.
    #[must_use]
    pub fn propagate() -> Self {
        Self {
            catch_exceptions: false,
        }
    }
}

/// Outcome of a successful [`Injector::inject`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InjectionStatus {
    /// The wrapper replaced the member.
    Installed,
    /// The class is not published yet; the injection is queued.
    Deferred,
}

/// The implementation an injection wraps.
pub struct Original<S: 'static, A: 'static, R: 'static> {
    callable: Callable<S, A, R>,
    raised: RefCell<Vec<u64>>,
}

impl<S: 'static, A: 'static, R: 'static> Original<S, A, R> {
    fn new(callable: Callable<S, A, R>) -> Self {
        Self {
            callable,
            raised: RefCell::new(Vec::new()),
        }
    }

    /// Runs the wrapped implementation.
    ///
    /// # Errors
    ///
    /// Returns the wrapped implementation's fault. A panic comes back as a
    /// fault that resumes unwinding if the injection returns it.
    pub fn call(&self, receiver: &S, args: A) -> Result<R, Fault> {
        let result = isolate(|| (self.callable)(receiver, args));
        if let Err(fault) = &result {
            self.raised.borrow_mut().push(fault.id());
        }
        result
    }

    /// Returns true if `fault` came out of this wrapped implementation.
    fn raised(&self, fault: &Fault) -> bool {
        self.raised.borrow().contains(&fault.id())
    }
}

impl<A: 'static, R: 'static> Original<(), A, R> {
    /// Runs a wrapped static method.
    pub fn call_static(&self, args: A) -> Result<R, Fault> {
        self.call(&(), args)
    }
}

impl<S: 'static, R: 'static> Original<S, (), R> {
    /// Reads a wrapped property.
    pub fn get(&self, receiver: &S) -> Result<R, Fault> {
        self.call(receiver, ())
    }
}

type PendingInstall = Box<dyn FnOnce(&HostClass) -> Result<(), InjectionError> + Send>;

struct PendingInjection {
    owner: Arc<ModIdentity>,
    class: String,
    member: String,
    install: PendingInstall,
}

/// Applies injections to host classes.
pub struct Injector {
    classes: Arc<ClassRegistry>,
    logs: Arc<Logs>,
    pending: Mutex<Vec<PendingInjection>>,
}

impl Service for Injector {
    fn create(services: &Services) -> Self {
        Self::new(services.get::<ClassRegistry>(), services.get::<Logs>())
    }
}

impl fmt::Debug for Injector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Injector")
            .field("classes", &self.classes)
            .field("pending", &self.pending_count())
            .finish()
    }
}

impl Injector {
    /// Creates an injector over `classes`, recording failures in `logs`.
    #[must_use]
    pub fn new(classes: Arc<ClassRegistry>, logs: Arc<Logs>) -> Self {
        Self {
            classes,
            logs,
            pending: Mutex::new(Vec::new()),
        }
    }

    /// The registry injections resolve classes in.
    #[must_use]
    pub fn classes(&self) -> &Arc<ClassRegistry> {
        &self.classes
    }

    /// Wraps `class_name.member_name` with `f`.
    ///
    /// The receiver and argument types select the member kind; see
    /// [`HostClass`]. `f` gets the wrapped implementation, the receiver and
    /// the arguments.
    ///
    /// # Errors
    ///
    /// Fails, and records the failure in the owner's exceptions file, if the
    /// class lacks the member or the member's kind and types do not match.
    ///
    /// # Example
    ///
    /// ```
    /// use std::sync::Arc;
    /// use weft_inject::{ClassRegistry, InjectOptions, Injector, InjectionStatus, Original};
    /// use weft_log::{LogConfig, Logs};
    /// use weft_system::identity::ModIdentity;
    ///
    /// struct Sim { hunger: u32 }
    ///
    /// let classes = Arc::new(ClassRegistry::default());
    /// let logs = Arc::new(Logs::new(LogConfig {
    ///     directory: std::env::temp_dir().join("weft-doc-inject"),
    ///     ..LogConfig::default()
    /// }));
    /// let injector = Injector::new(Arc::clone(&classes), logs);
    ///
    /// let sim_class = classes.publish("Sim");
    /// sim_class.define_property("is_hungry", |sim: &Sim| Ok(sim.hunger > 50)).unwrap();
    ///
    /// let owner = ModIdentity::framework();
    /// let status = injector
    ///     .inject(&owner, "Sim", "is_hungry", InjectOptions::default(),
    ///         |original: &Original<Sim, (), bool>, sim: &Sim, ()| {
    ///             Ok(sim.hunger > 90 && original.get(sim)?)
    ///         })
    ///     .unwrap();
    ///
    /// assert_eq!(status, InjectionStatus::Installed);
    /// assert!(!sim_class.get_property::<Sim, bool>(&Sim { hunger: 70 }, "is_hungry").unwrap());
    /// ```
    pub fn inject<S, A, R, F>(
        &self,
        owner: &Arc<ModIdentity>,
        class_name: &str,
        member_name: &str,
        options: InjectOptions,
        f: F,
    ) -> Result<InjectionStatus, InjectionError>
    where
        S: 'static,
        A: Clone + 'static,
        R: 'static,
        F: Fn(&Original<S, A, R>, &S, A) -> Result<R, Fault> + Send + Sync + 'static,
    {
        let Some(class) = self.classes.get(class_name) else {
            tracing::debug!(
                mod_name = owner.name(),
                class = class_name,
                member = member_name,
                "target class not published, deferring injection"
            );
            let logs = Arc::clone(&self.logs);
            let install_owner = Arc::clone(owner);
            let member = member_name.to_string();
            self.pending.lock().push(PendingInjection {
                owner: Arc::clone(owner),
                class: class_name.to_string(),
                member: member_name.to_string(),
                install: Box::new(move |class: &HostClass| {
                    install(&logs, &install_owner, class, &member, options, f)
                }),
            });
            return Ok(InjectionStatus::Deferred);
        };

        install(&self.logs, owner, &class, member_name, options, f)?;
        Ok(InjectionStatus::Installed)
    }

    /// Number of injections waiting for their class.
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.pending.lock().len()
    }

    /// Installs every queued injection whose class is now published.
    ///
    /// Injections whose class is still missing are dropped with an
    /// advisory in the owner's messages file. Returns how many were installed.
    pub fn install_pending(&self) -> usize {
        let pending = core::mem::take(&mut *self.pending.lock());
        let mut installed = 0;
        for injection in pending {
            let Some(class) = self.classes.get(&injection.class) else {
                tracing::warn!(
                    mod_name = injection.owner.name(),
                    class = %injection.class,
                    member = %injection.member,
                    "injection target class never published"
                );
                self.logs.advisory(
                    &injection.owner,
                    "Skipping injection; target class is not available",
                    &[
                        ("class", injection.class.clone()),
                        ("member", injection.member.clone()),
                    ],
                );
                continue;
            };
            if (injection.install)(&class).is_ok() {
                installed += 1;
            }
        }
        installed
    }
}

/// Wraps `class.member` with `f`, logging any rejection.
fn install<S, A, R, F>(
    logs: &Arc<Logs>,
    owner: &Arc<ModIdentity>,
    class: &HostClass,
    member: &str,
    options: InjectOptions,
    f: F,
) -> Result<(), InjectionError>
where
    S: 'static,
    A: Clone + 'static,
    R: 'static,
    F: Fn(&Original<S, A, R>, &S, A) -> Result<R, Fault> + Send + Sync + 'static,
{
    let record = InjectionRecord {
        owner: owner.name().to_string(),
        catch_exceptions: options.catch_exceptions,
    };
    let wrap_logs = Arc::clone(logs);
    let wrap_owner = Arc::clone(owner);
    let label = format!("{}.{member}", class.name());

    let replaced = class.replace::<S, A, R>(member, record, move |previous| {
        if options.catch_exceptions {
            catching(previous, f, wrap_logs, wrap_owner, label)
        } else {
            let wrapped: Callable<S, A, R> = Arc::new(move |receiver: &S, args: A| {
                let original = Original::new(Arc::clone(&previous));
                match f(&original, receiver, args) {
                    Err(fault) if original.raised(&fault) => fault.rethrow(),
                    result => result,
                }
            });
            wrapped
        }
    });

    let previous = match replaced {
        Ok(previous) => previous,
        Err(error) => {
            let error = match error {
                MemberError::NotFound { class, member } => {
                    InjectionError::MemberNotFound { class, member }
                }
                other => InjectionError::Incompatible(other),
            };
            logs.error(
                owner,
                "Failed to inject",
                &[
                    ("class", class.name().to_string()),
                    ("member", member.to_string()),
                    ("reason", error.to_string()),
                ],
            );
            return Err(error);
        }
    };

    if !options.catch_exceptions {
        let racing: Vec<&str> = previous
            .iter()
            .filter(|record| !record.catch_exceptions)
            .map(|record| record.owner.as_str())
            .collect();
        if !racing.is_empty() {
            tracing::warn!(
                mod_name = owner.name(),
                class = class.name(),
                member,
                "multiple injections without exception catching"
            );
            logs.advisory(
                owner,
                "Multiple injections without exception catching on the same member; \
                 their failures propagate in load order",
                &[
                    ("class", class.name().to_string()),
                    ("member", member.to_string()),
                    ("previous", racing.join(", ")),
                ],
            );
        }
    }

    tracing::debug!(
        mod_name = owner.name(),
        class = class.name(),
        member,
        catch_exceptions = options.catch_exceptions,
        "injection installed"
    );
    Ok(())
}

fn catching<S, A, R, F>(
    previous: Callable<S, A, R>,
    f: F,
    logs: Arc<Logs>,
    owner: Arc<ModIdentity>,
    label: String,
) -> Callable<S, A, R>
where
    S: 'static,
    A: Clone + 'static,
    R: 'static,
    F: Fn(&Original<S, A, R>, &S, A) -> Result<R, Fault> + Send + Sync + 'static,
{
    Arc::new(move |receiver: &S, args: A| {
        let original = Original::new(Arc::clone(&previous));
        let retry = args.clone();
        match isolate(|| f(&original, receiver, args)) {
            Ok(value) => Ok(value),
            Err(fault) if original.raised(&fault) => fault.rethrow(),
            Err(fault) => {
                logs.log_exception_with(
                    &owner,
                    &format!("Exception in injection for '{label}'"),
                    &fault,
                    &[("member", label.clone())],
                );
                previous(receiver, retry)
            }
        }
    })
}
