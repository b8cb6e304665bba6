//! Console commands.
//!
//! Mods register commands under dotted names starting with their namespace
//! (`mymod.do_thing`). A command declares its arguments with a coercion
//! hint; the registry tokenizes the console line, coerces each argument and
//! calls the handler with a line-oriented [`CommandOutput`]. Handler
//! failures are isolated: they are recorded in the owner's exceptions file
//! and reported to the console as a single line.
//!
//! [`CommandsPlugin`] registers the built-in `weft.*` commands.

use core::fmt;
use std::sync::{Arc, Weak};

use indexmap::IndexMap;
use parking_lot::RwLock;
use thiserror::Error;
use weft_events::{ObjectId, SimId};
use weft_log::{Fault, Logs, isolate};
use weft_system::identity::ModIdentity;
use weft_system::plugin::Plugin;
use weft_system::server::Server;
use weft_system::service::{Service, Services};
use weft_testing::{Outcome, TestHarness};

/// How a console token is coerced.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ArgKind {
    /// Taken verbatim.
    String,
    /// Signed decimal, or hexadecimal with `0x`.
    Int,
    /// A sim id.
    SimRef,
    /// An object id.
    ObjectRef,
}

impl fmt::Display for ArgKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::String => "string",
            Self::Int => "int",
            Self::SimRef => "sim",
            Self::ObjectRef => "object",
        })
    }
}

/// A declared command argument.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ArgSpec {
    name: String,
    kind: ArgKind,
    optional: bool,
}

impl ArgSpec {
    /// An argument that must be given.
    #[must_use]
    pub fn required(name: impl Into<String>, kind: ArgKind) -> Self {
        Self {
            name: name.into(),
            kind,
            optional: false,
        }
    }

    /// An argument that may be left off the end of the line.
    #[must_use]
    pub fn optional(name: impl Into<String>, kind: ArgKind) -> Self {
        Self {
            name: name.into(),
            kind,
            optional: true,
        }
    }
}

impl fmt::Display for ArgSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.optional {
            write!(f, "[{}:{}]", self.name, self.kind)
        } else {
            write!(f, "<{}:{}>", self.name, self.kind)
        }
    }
}

/// A coerced argument value.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ArgValue {
    #[expect(missing_docs, reason = "variant per ArgKind")]
    String(String),
    #[expect(missing_docs, reason = "variant per ArgKind")]
    Int(i64),
    #[expect(missing_docs, reason = "variant per ArgKind")]
    Sim(SimId),
    #[expect(missing_docs, reason = "variant per ArgKind")]
    Object(ObjectId),
}

/// Arguments passed to a command handler.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CommandArgs {
    values: IndexMap<String, ArgValue>,
}

impl CommandArgs {
    /// The raw value of `name`, if given.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&ArgValue> {
        self.values.get(name)
    }

    /// String argument `name`.
    #[must_use]
    pub fn string(&self, name: &str) -> Option<&str> {
        match self.values.get(name) {
            Some(ArgValue::String(value)) => Some(value),
            _ => None,
        }
    }

    /// Integer argument `name`.
    #[must_use]
    pub fn int(&self, name: &str) -> Option<i64> {
        match self.values.get(name) {
            Some(ArgValue::Int(value)) => Some(*value),
            _ => None,
        }
    }

    /// Sim argument `name`.
    #[must_use]
    pub fn sim(&self, name: &str) -> Option<SimId> {
        match self.values.get(name) {
            Some(ArgValue::Sim(value)) => Some(*value),
            _ => None,
        }
    }

    /// Object argument `name`.
    #[must_use]
    pub fn object(&self, name: &str) -> Option<ObjectId> {
        match self.values.get(name) {
            Some(ArgValue::Object(value)) => Some(*value),
            _ => None,
        }
    }

    /// Number of arguments given.
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Returns true if no arguments were given.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Line-oriented writer bound to the invoking console.
pub trait CommandOutput {
    /// Writes one line.
    fn write_line(&mut self, line: &str);
}

/// A [`CommandOutput`] that keeps every line in memory.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BufferedOutput {
    lines: Vec<String>,
}

impl BufferedOutput {
    /// Lines written so far.
    #[must_use]
    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    /// Consumes the buffer, returning its lines.
    #[must_use]
    pub fn into_lines(self) -> Vec<String> {
        self.lines
    }
}

impl CommandOutput for BufferedOutput {
    fn write_line(&mut self, line: &str) {
        self.lines.push(line.to_string());
    }
}

/// Error type for command registration and parsing.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommandError {
    /// The name is not a dotted name under the owner's namespace.
    #[error("command name '{name}' must be a dotted name starting with '{namespace}.'")]
    InvalidName {
        /// Rejected name.
        name: String,
        /// Namespace of the registering mod.
        namespace: String,
    },
    /// A required argument follows an optional one.
    #[error("command '{command}': required argument '{argument}' follows an optional one")]
    InvalidSpec {
        /// Command name.
        command: String,
        /// Offending argument.
        argument: String,
    },
    /// A command of that name already exists.
    #[error("command '{0}' is already registered")]
    Duplicate(String),
    /// No command of that name exists.
    #[error("unknown command '{0}'")]
    NotFound(String),
    /// The line was empty.
    #[error("no command given")]
    Empty,
    /// A required argument was not given.
    #[error("command '{command}' is missing argument '{argument}'")]
    MissingArgument {
        /// Command name.
        command: String,
        /// Missing argument.
        argument: String,
    },
    /// An argument could not be coerced.
    #[error("command '{command}': argument '{argument}' expects {expected}, got '{value}'")]
    InvalidArgument {
        /// Command name.
        command: String,
        /// Argument name.
        argument: String,
        /// Declared kind.
        expected: ArgKind,
        /// Given text.
        value: String,
    },
    /// More arguments were given than declared.
    #[error("command '{command}' takes at most {max} arguments, got {given}")]
    TooManyArguments {
        /// Command name.
        command: String,
        /// Declared argument count.
        max: usize,
        /// Given argument count.
        given: usize,
    },
}

type CommandHandler =
    Arc<dyn Fn(&CommandArgs, &mut dyn CommandOutput) -> Result<(), Fault> + Send + Sync>;

struct Command {
    owner: Arc<ModIdentity>,
    name: String,
    description: String,
    args: Vec<ArgSpec>,
    handler: CommandHandler,
}

impl Command {
    fn usage(&self) -> String {
        let mut usage = self.name.clone();
        for arg in &self.args {
            usage.push(' ');
            usage.push_str(&arg.to_string());
        }
        usage
    }
}

/// Registry of console commands.
pub struct CommandRegistry {
    commands: RwLock<IndexMap<String, Arc<Command>>>,
    logs: Arc<Logs>,
}

impl Service for CommandRegistry {
    fn create(services: &Services) -> Self {
        Self::new(services.get::<Logs>())
    }
}

impl fmt::Debug for CommandRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandRegistry")
            .field("commands", &self.names())
            .finish()
    }
}

impl CommandRegistry {
    /// Creates an empty registry recording handler failures in `logs`.
    #[must_use]
    pub fn new(logs: Arc<Logs>) -> Self {
        Self {
            commands: RwLock::new(IndexMap::new()),
            logs,
        }
    }

    /// Registers a command.
    ///
    /// # Errors
    ///
    /// Fails, and records the failure in the owner's exceptions file, if the
    /// name is not under the owner's namespace, is taken, or a required
    /// argument follows an optional one.
    pub fn register<F>(
        &self,
        owner: &Arc<ModIdentity>,
        name: &str,
        description: &str,
        args: Vec<ArgSpec>,
        handler: F,
    ) -> Result<(), CommandError>
    where
        F: Fn(&CommandArgs, &mut dyn CommandOutput) -> Result<(), Fault> + Send + Sync + 'static,
    {
        let result = self.insert(Command {
            owner: Arc::clone(owner),
            name: name.to_string(),
            description: description.to_string(),
            args,
            handler: Arc::new(handler),
        });
        if let Err(error) = &result {
            self.logs.error(
                owner,
                "Failed to register console command",
                &[("command", name.to_string()), ("reason", error.to_string())],
            );
        }
        result
    }

    fn insert(&self, command: Command) -> Result<(), CommandError> {
        let namespace = command.owner.namespace();
        let valid_segments = command.name.split('.').all(|segment| {
            !segment.is_empty()
                && segment
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
        });
        let under_namespace = command
            .name
            .strip_prefix(namespace)
            .is_some_and(|rest| rest.starts_with('.'));
        if !valid_segments || !under_namespace {
            return Err(CommandError::InvalidName {
                name: command.name,
                namespace: namespace.to_string(),
            });
        }

        if let Some(window) = command
            .args
            .windows(2)
            .find(|pair| pair[0].optional && !pair[1].optional)
        {
            return Err(CommandError::InvalidSpec {
                command: command.name.clone(),
                argument: window[1].name.clone(),
            });
        }

        let mut commands = self.commands.write();
        if commands.contains_key(&command.name) {
            return Err(CommandError::Duplicate(command.name));
        }
        tracing::debug!(
            mod_name = command.owner.name(),
            command = %command.name,
            "console command registered"
        );
        commands.insert(command.name.clone(), Arc::new(command));
        Ok(())
    }

    /// Removes a command. Returns false if it did not exist.
    pub fn unregister(&self, name: &str) -> bool {
        self.commands.write().shift_remove(name).is_some()
    }

    /// Names of every command in registration order.
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        self.commands.read().keys().cloned().collect()
    }

    /// `usage - description` line of every command.
    #[must_use]
    pub fn help(&self) -> Vec<String> {
        self.commands
            .read()
            .values()
            .map(|command| format!("{} - {}", command.usage(), command.description))
            .collect()
    }

    /// Parses and runs a console line.
    ///
    /// Parse errors are written to `out` and returned. A failing handler is
    /// recorded and reported to `out`; that still counts as executed.
    pub fn execute(&self, line: &str, out: &mut dyn CommandOutput) -> Result<(), CommandError> {
        let result = self.parse(line);
        let (command, args) = match result {
            Ok(parsed) => parsed,
            Err(error) => {
                out.write_line(&error.to_string());
                return Err(error);
            }
        };

        if let Err(fault) = isolate(|| (command.handler)(&args, &mut *out)) {
            self.logs.log_exception_with(
                &command.owner,
                "Error occurred in console command",
                &fault,
                &[("command", command.name.clone()), ("line", line.to_string())],
            );
            out.write_line(&format!("Command '{}' failed: {fault}", command.name));
        }
        Ok(())
    }

    fn parse(&self, line: &str) -> Result<(Arc<Command>, CommandArgs), CommandError> {
        let tokens = tokenize(line);
        let Some((name, rest)) = tokens.split_first() else {
            return Err(CommandError::Empty);
        };
        let command = self
            .commands
            .read()
            .get(name.as_str())
            .cloned()
            .ok_or_else(|| CommandError::NotFound(name.clone()))?;

        if rest.len() > command.args.len() {
            return Err(CommandError::TooManyArguments {
                command: command.name.clone(),
                max: command.args.len(),
                given: rest.len(),
            });
        }

        let mut args = CommandArgs::default();
        for (index, spec) in command.args.iter().enumerate() {
            let Some(token) = rest.get(index) else {
                if spec.optional {
                    break;
                }
                return Err(CommandError::MissingArgument {
                    command: command.name.clone(),
                    argument: spec.name.clone(),
                });
            };
            let value = coerce(spec.kind, token).ok_or_else(|| CommandError::InvalidArgument {
                command: command.name.clone(),
                argument: spec.name.clone(),
                expected: spec.kind,
                value: token.clone(),
            })?;
            args.values.insert(spec.name.clone(), value);
        }
        Ok((command, args))
    }
}

/// Splits on whitespace; double quotes group a token.
fn tokenize(line: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut quoted = false;
    let mut pending = false;
    for c in line.chars() {
        match c {
            '"' => {
                quoted = !quoted;
                pending = true;
            }
            c if c.is_whitespace() && !quoted => {
                if pending {
                    tokens.push(core::mem::take(&mut current));
                    pending = false;
                }
            }
            c => {
                current.push(c);
                pending = true;
            }
        }
    }
    if pending {
        tokens.push(current);
    }
    tokens
}

fn parse_id(token: &str) -> Option<u64> {
    match token.strip_prefix("0x").or_else(|| token.strip_prefix("0X")) {
        Some(hex) => u64::from_str_radix(hex, 16).ok(),
        None => token.parse().ok(),
    }
}

fn coerce(kind: ArgKind, token: &str) -> Option<ArgValue> {
    match kind {
        ArgKind::String => Some(ArgValue::String(token.to_string())),
        ArgKind::Int => match token.strip_prefix("0x").or_else(|| token.strip_prefix("0X")) {
            Some(hex) => i64::from_str_radix(hex, 16).ok().map(ArgValue::Int),
            None => token.parse().ok().map(ArgValue::Int),
        },
        ArgKind::SimRef => parse_id(token).map(|id| ArgValue::Sim(SimId(id))),
        ArgKind::ObjectRef => parse_id(token).map(|id| ArgValue::Object(ObjectId(id))),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Built-in commands
// ─────────────────────────────────────────────────────────────────────────────

/// Plugin registering the built-in `weft.*` console commands.
///
/// | Command | Effect |
/// |---------|--------|
/// | `weft.log.enable <mod> <channel>` | turns a log channel on |
/// | `weft.log.disable <mod> <channel>` | turns a log channel off |
/// | `weft.log.channels` | lists channels and their state |
/// | `weft.tests.run [mod]` | runs registered tests |
/// | `weft.help` | lists commands |
#[derive(Debug, Default, Clone, Copy)]
pub struct CommandsPlugin;

impl Plugin for CommandsPlugin {
    fn build(&self, server: &mut Server) {
        let registry = server.service::<CommandRegistry>();
        let logs = server.service::<Logs>();
        let harness = server.service::<TestHarness>();
        if let Err(error) = register_builtins(&registry, &logs, &harness) {
            tracing::error!(%error, "failed to register built-in console commands");
        }
    }

    fn cleanup(&self, server: &mut Server) {
        let registry = server.service::<CommandRegistry>();
        for name in registry.names() {
            if name.starts_with("weft.") {
                registry.unregister(&name);
            }
        }
    }
}

fn register_builtins(
    registry: &Arc<CommandRegistry>,
    logs: &Arc<Logs>,
    harness: &Arc<TestHarness>,
) -> Result<(), CommandError> {
    let owner = ModIdentity::framework();
    let channel_args = || {
        vec![
            ArgSpec::required("mod", ArgKind::String),
            ArgSpec::required("channel", ArgKind::String),
        ]
    };

    for (name, enabled) in [("weft.log.enable", true), ("weft.log.disable", false)] {
        let logs = Arc::clone(logs);
        let description = if enabled {
            "Turns a log channel on"
        } else {
            "Turns a log channel off"
        };
        registry.register(&owner, name, description, channel_args(), move |args, out| {
            let mod_name = args.string("mod").unwrap_or_default();
            let channel = args.string("channel").unwrap_or_default();
            let state = if enabled { "enabled" } else { "disabled" };
            if logs.set_enabled(mod_name, channel, enabled) {
                out.write_line(&format!("{mod_name}/{channel} {state}"));
            } else {
                out.write_line(&format!("{mod_name}/{channel} {state} when created"));
            }
            Ok(())
        })?;
    }

    let channel_logs = Arc::clone(logs);
    registry.register(&owner, "weft.log.channels", "Lists log channels", Vec::new(), move |_, out| {
        let channels = channel_logs.channels();
        if channels.is_empty() {
            out.write_line("No log channels");
        }
        for channel in channels {
            let state = if channel.is_enabled() { "on" } else { "off" };
            out.write_line(&format!("{}/{}: {state}", channel.owner().name(), channel.name()));
        }
        Ok(())
    })?;

    let harness = Arc::clone(harness);
    registry.register(
        &owner,
        "weft.tests.run",
        "Runs registered tests, optionally only those of one mod",
        vec![ArgSpec::optional("mod", ArgKind::String)],
        move |args, out| {
            let report = match args.string("mod") {
                Some(mod_name) => harness.run_mod(mod_name),
                None => harness.run_all(),
            };
            for result in report.results.iter().filter(|r| !r.outcome.is_success()) {
                let detail = match &result.outcome {
                    Outcome::Fail { message, .. } => message.as_str(),
                    _ => "passed but was expected to fail",
                };
                out.write_line(&format!(
                    "{} {}.{}: {detail}",
                    result.mod_name, result.class, result.test
                ));
            }
            out.write_line(&report.summary());
            Ok(())
        },
    )?;

    let weak: Weak<CommandRegistry> = Arc::downgrade(registry);
    registry.register(&owner, "weft.help", "Lists console commands", Vec::new(), move |_, out| {
        if let Some(registry) = weak.upgrade() {
            for line in registry.help() {
                out.write_line(&line);
            }
        }
        Ok(())
    })?;

    Ok(())
}
