//! Console command registration, parsing and the built-in commands.

use std::fs;
use std::sync::Arc;

use weft_core_plugins::commands::{
    ArgKind, ArgSpec, ArgValue, BufferedOutput, CommandArgs, CommandError, CommandOutput,
    CommandRegistry, CommandsPlugin,
};
use weft_events::SimId;
use weft_log::{Fault, LogConfig, LogPlugin, Logs, SinkKind};
use weft_system::identity::ModIdentity;
use weft_system::server::Server;
use weft_testing::{Test, TestHarness, assert_true};

fn mod_identity(name: &str, namespace: &str) -> Arc<ModIdentity> {
    Arc::new(
        ModIdentity::builder(name)
            .author("tests")
            .namespace(namespace)
            .file_path(format!("Mods/{name}"))
            .version("1.0")
            .build()
            .unwrap(),
    )
}

fn registry() -> (tempfile::TempDir, Arc<Logs>, CommandRegistry) {
    let dir = tempfile::tempdir().unwrap();
    let logs = Arc::new(Logs::new(LogConfig {
        directory: dir.path().to_path_buf(),
        ..LogConfig::default()
    }));
    let registry = CommandRegistry::new(Arc::clone(&logs));
    (dir, logs, registry)
}

fn run(registry: &CommandRegistry, line: &str) -> (Result<(), CommandError>, Vec<String>) {
    let mut out = BufferedOutput::default();
    let result = registry.execute(line, &mut out);
    (result, out.into_lines())
}

fn noop(_: &CommandArgs, _: &mut dyn CommandOutput) -> Result<(), Fault> {
    Ok(())
}

#[test]
fn names_must_be_under_the_owner_namespace() {
    let (_dir, logs, registry) = registry();
    let owner = mod_identity("Romance", "romance");

    for bad in ["flirt", "other.flirt", "romance.", "romance..flirt", "romancer.flirt"] {
        let error = registry
            .register(&owner, bad, "", Vec::new(), noop)
            .unwrap_err();
        assert!(matches!(error, CommandError::InvalidName { .. }), "{bad}");
    }
    registry
        .register(&owner, "romance.flirt", "", Vec::new(), noop)
        .unwrap();
    assert_eq!(
        registry.register(&owner, "romance.flirt", "", Vec::new(), noop),
        Err(CommandError::Duplicate("romance.flirt".into()))
    );

    let exceptions = fs::read_to_string(logs.sink_path("Romance", SinkKind::Exceptions)).unwrap();
    assert!(exceptions.contains("Failed to register console command"));
    assert_eq!(registry.names(), vec!["romance.flirt".to_string()]);
}

#[test]
fn required_argument_after_optional_is_rejected() {
    let (_dir, _logs, registry) = registry();
    let owner = mod_identity("Romance", "romance");
    let error = registry
        .register(
            &owner,
            "romance.date",
            "",
            vec![
                ArgSpec::optional("venue", ArgKind::String),
                ArgSpec::required("partner", ArgKind::SimRef),
            ],
            |_, _| Ok(()),
        )
        .unwrap_err();
    assert_eq!(
        error,
        CommandError::InvalidSpec {
            command: "romance.date".into(),
            argument: "partner".into(),
        }
    );
}

#[test]
fn arguments_are_coerced_and_passed_to_the_handler() {
    let (_dir, _logs, registry) = registry();
    let owner = mod_identity("Romance", "romance");
    registry
        .register(
            &owner,
            "romance.gift",
            "Gives flowers",
            vec![
                ArgSpec::required("to", ArgKind::SimRef),
                ArgSpec::required("note", ArgKind::String),
                ArgSpec::optional("count", ArgKind::Int),
            ],
            |args, out| {
                let to = args.sim("to").ok_or_else(|| Fault::new("no sim"))?;
                let count = args.int("count").unwrap_or(1);
                out.write_line(&format!(
                    "{count} flowers to {to}: {}",
                    args.string("note").unwrap_or_default()
                ));
                Ok(())
            },
        )
        .unwrap();

    let (result, lines) = run(&registry, r#"romance.gift 0x2A "with love" 12"#);
    result.unwrap();
    assert_eq!(lines, vec!["12 flowers to 42: with love"]);

    let (result, lines) = run(&registry, "romance.gift 7 hi");
    result.unwrap();
    assert_eq!(lines, vec!["1 flowers to 7: hi"]);
}

#[test]
fn parse_errors_are_written_and_returned() {
    let (_dir, _logs, registry) = registry();
    let owner = mod_identity("Romance", "romance");
    registry
        .register(
            &owner,
            "romance.age",
            "",
            vec![ArgSpec::required("years", ArgKind::Int)],
            |_, _| Ok(()),
        )
        .unwrap();

    let (result, lines) = run(&registry, "romance.age");
    assert!(matches!(result, Err(CommandError::MissingArgument { .. })));
    assert_eq!(lines, vec!["command 'romance.age' is missing argument 'years'"]);

    let (result, _) = run(&registry, "romance.age old");
    assert!(matches!(
        result,
        Err(CommandError::InvalidArgument { expected: ArgKind::Int, .. })
    ));

    let (result, _) = run(&registry, "romance.age 1 2");
    assert!(matches!(
        result,
        Err(CommandError::TooManyArguments { max: 1, given: 2, .. })
    ));

    let (result, lines) = run(&registry, "romance.unknown");
    assert_eq!(result, Err(CommandError::NotFound("romance.unknown".into())));
    assert_eq!(lines, vec!["unknown command 'romance.unknown'"]);

    assert_eq!(run(&registry, "   ").0, Err(CommandError::Empty));
}

#[test]
fn failing_handlers_are_isolated_and_reported() {
    let (_dir, logs, registry) = registry();
    let owner = mod_identity("Romance", "romance");
    registry
        .register(&owner, "romance.breakup", "", Vec::new(), |_, out| {
            out.write_line("starting");
            Err(Fault::new("heartbroken"))
        })
        .unwrap();
    registry
        .register(&owner, "romance.panic", "", Vec::new(), |_, _| {
            panic!("too dramatic")
        })
        .unwrap();

    let (result, lines) = run(&registry, "romance.breakup");
    assert!(result.is_ok());
    assert_eq!(
        lines,
        vec!["starting", "Command 'romance.breakup' failed: Fault: heartbroken"]
    );

    let (result, lines) = run(&registry, "romance.panic");
    assert!(result.is_ok());
    assert!(lines[0].contains("too dramatic"));

    let exceptions = fs::read_to_string(logs.sink_path("Romance", SinkKind::Exceptions)).unwrap();
    assert_eq!(exceptions.matches("Error occurred in console command").count(), 2);
    assert!(exceptions.contains("command=romance.breakup"));
}

#[test]
fn arg_lookup_by_kind() {
    let (_dir, _logs, registry) = registry();
    let owner = mod_identity("Romance", "romance");
    registry
        .register(
            &owner,
            "romance.inspect",
            "",
            vec![ArgSpec::required("who", ArgKind::SimRef)],
            |args, out| {
                assert_eq!(args.get("who"), Some(&ArgValue::Sim(SimId(9))));
                assert_eq!(args.int("who"), None);
                assert_eq!(args.len(), 1);
                out.write_line("ok");
                Ok(())
            },
        )
        .unwrap();
    assert_eq!(run(&registry, "romance.inspect 9").1, vec!["ok"]);
}

fn server(dir: &tempfile::TempDir) -> Server {
    let mut server = Server::new();
    server.add_plugins(LogPlugin::default().with_directory(dir.path()));
    server.add_plugins(CommandsPlugin);
    server.finish();
    server
}

#[test]
fn builtin_log_commands_toggle_channels() {
    let dir = tempfile::tempdir().unwrap();
    let server = server(&dir);
    let registry = server.service::<CommandRegistry>();
    let logs = server.service::<Logs>();
    let owner = mod_identity("Romance", "romance");
    let channel = logs.channel(&owner, "dates");

    let (_, lines) = run(&registry, "weft.log.enable Romance dates");
    assert_eq!(lines, vec!["Romance/dates enabled"]);
    assert!(channel.is_enabled());

    let (_, lines) = run(&registry, "weft.log.channels");
    assert_eq!(lines, vec!["Romance/dates: on"]);

    let (_, lines) = run(&registry, "weft.log.disable Romance dates");
    assert_eq!(lines, vec!["Romance/dates disabled"]);
    assert!(!channel.is_enabled());

    let (_, lines) = run(&registry, "weft.log.enable Romance flirts");
    assert_eq!(lines, vec!["Romance/flirts enabled when created"]);
    assert!(logs.channel(&owner, "flirts").is_enabled());
}

#[test]
fn builtin_test_runner_reports_failures_and_summary() {
    let dir = tempfile::tempdir().unwrap();
    let server = server(&dir);
    let registry = server.service::<CommandRegistry>();
    let harness = server.service::<TestHarness>();

    let romance = mod_identity("Romance", "romance");
    harness
        .test_class(&romance, "Chemistry")
        .add(Test::simple("sparks", || Ok(assert_true(true)?)))
        .unwrap()
        .add(Test::simple("fizzles", || Ok(assert_true(false)?)))
        .unwrap();
    let careers = mod_identity("Careers", "careers");
    harness
        .test_class(&careers, "Promotion")
        .add(Test::simple("raise", || Ok(())))
        .unwrap();

    let (result, lines) = run(&registry, "weft.tests.run");
    result.unwrap();
    assert_eq!(lines.len(), 2);
    assert!(lines[0].starts_with("Romance Chemistry.fizzles: "));
    assert_eq!(lines[1], "3 cases: 2 passed, 1 failed");

    let (_, lines) = run(&registry, "weft.tests.run Careers");
    assert_eq!(lines, vec!["1 cases: 1 passed, 0 failed"]);
}

#[test]
fn builtin_help_lists_usage() {
    let dir = tempfile::tempdir().unwrap();
    let server = server(&dir);
    let registry = server.service::<CommandRegistry>();

    let (_, lines) = run(&registry, "weft.help");
    assert_eq!(lines.len(), 5);
    assert_eq!(
        lines[0],
        "weft.log.enable <mod:string> <channel:string> - Turns a log channel on"
    );
    assert_eq!(
        lines[3],
        "weft.tests.run [mod:string] - Runs registered tests, optionally only those of one mod"
    );
}
