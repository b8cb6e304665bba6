//! Dispatch behavior of the event bus.

use std::fs;
use std::sync::Arc;

use parking_lot::Mutex;
use weft_events::{
    EventBus, EventRegistrationError, GameLoaded, SaveEvent, SimDied, SimEvent, SimId, SimSpawned,
    ZoneEvent, ZoneId, ZonePostLoad, impl_event,
};
use weft_log::{Fault, LogConfig, Logs, SinkKind};
use weft_system::identity::ModIdentity;

struct Fixture {
    _dir: tempfile::TempDir,
    logs: Arc<Logs>,
    bus: Arc<EventBus>,
    owner: Arc<ModIdentity>,
}

fn fixture() -> Fixture {
    let dir = tempfile::tempdir().unwrap();
    let logs = Arc::new(Logs::new(LogConfig {
        directory: dir.path().to_path_buf(),
        ..LogConfig::default()
    }));
    let bus = Arc::new(EventBus::new(Arc::clone(&logs)));
    let owner = Arc::new(
        ModIdentity::builder("Lifecycle")
            .author("tests")
            .namespace("lifecycle")
            .file_path("Mods/Lifecycle")
            .version("1.0")
            .build()
            .unwrap(),
    );
    Fixture {
        _dir: dir,
        logs,
        bus,
        owner,
    }
}

fn exceptions(fx: &Fixture) -> String {
    fs::read_to_string(fx.logs.sink_path("Lifecycle", SinkKind::Exceptions)).unwrap_or_default()
}

fn died(id: u64) -> SimDied {
    SimDied {
        sim: SimEvent { sim_id: SimId(id) },
        death_type: 0,
    }
}

#[test]
fn general_handler_receives_specific_events() {
    let fx = fixture();
    let calls = Arc::new(Mutex::new(Vec::new()));

    let sink = Arc::clone(&calls);
    fx.bus
        .register(&fx.owner, "any_sim", move |event: &SimEvent| {
            sink.lock().push(format!("sim {}", event.sim_id));
            Ok(())
        })
        .unwrap();
    let sink = Arc::clone(&calls);
    fx.bus
        .register(&fx.owner, "deaths", move |event: &SimDied| {
            sink.lock().push(format!("died {}", event.sim.sim_id));
            Ok(())
        })
        .unwrap();

    assert!(fx.bus.dispatch(&died(3)));
    assert!(fx.bus.dispatch(&SimSpawned {
        sim: SimEvent { sim_id: SimId(4) }
    }));

    assert_eq!(*calls.lock(), vec!["sim 3", "died 3", "sim 4"]);
}

#[test]
fn unrelated_events_do_not_reach_handler() {
    let fx = fixture();
    let calls = Arc::new(Mutex::new(0));
    let sink = Arc::clone(&calls);
    fx.bus
        .register(&fx.owner, "zones", move |_: &ZoneEvent| {
            *sink.lock() += 1;
            Ok(())
        })
        .unwrap();

    fx.bus.dispatch(&GameLoaded {
        save: SaveEvent { slot_id: 1 },
    });
    assert_eq!(*calls.lock(), 0);

    fx.bus.dispatch(&ZonePostLoad {
        zone: ZoneEvent {
            zone_id: ZoneId(9),
            household_id: None,
        },
        first_load: true,
    });
    assert_eq!(*calls.lock(), 1);
}

#[test]
fn failing_handler_is_isolated_and_recorded() {
    let fx = fixture();
    let calls = Arc::new(Mutex::new(Vec::new()));

    fx.bus
        .register(&fx.owner, "explodes", |_: &SimDied| -> Result<(), Fault> {
            panic!("tombstone missing")
        })
        .unwrap();
    fx.bus
        .register(&fx.owner, "errors", |_: &SimDied| {
            Err(Fault::new("no grave plot"))
        })
        .unwrap();
    let sink = Arc::clone(&calls);
    fx.bus
        .register(&fx.owner, "survivor", move |event: &SimDied| {
            sink.lock().push(event.sim.sim_id);
            Ok(())
        })
        .unwrap();

    assert!(fx.bus.dispatch(&died(11)));

    assert_eq!(*calls.lock(), vec![SimId(11)]);
    let text = exceptions(&fx);
    assert!(text.contains("Error occurred in event handler 'explodes'"));
    assert!(text.contains("panic: tombstone missing"));
    assert!(text.contains("Error occurred in event handler 'errors'"));
    assert!(text.contains("no grave plot"));
    assert!(text.contains("SimDied"));
}

#[derive(Debug)]
struct Harvest {
    crop: &'static str,
}
impl_event!(Harvest);

#[test]
fn undeclared_event_type_is_rejected() {
    let fx = fixture();

    let result = fx.bus.register(&fx.owner, "harvest", |_: &Harvest| Ok(()));
    assert!(matches!(
        result,
        Err(EventRegistrationError::UnknownEventType { ref handler, .. }) if handler == "harvest"
    ));
    assert_eq!(fx.bus.handler_count(), 0);
    assert!(exceptions(&fx).contains("Failed to register event handler"));

    // Other events keep flowing.
    let calls = Arc::new(Mutex::new(0));
    let sink = Arc::clone(&calls);
    fx.bus
        .register(&fx.owner, "deaths", move |_: &SimDied| {
            *sink.lock() += 1;
            Ok(())
        })
        .unwrap();
    fx.bus.dispatch(&died(1));
    assert_eq!(*calls.lock(), 1);
}

#[test]
fn declared_custom_events_dispatch() {
    let fx = fixture();
    fx.bus.declare::<Harvest>();
    let crops = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&crops);
    fx.bus
        .register(&fx.owner, "harvest", move |event: &Harvest| {
            sink.lock().push(event.crop);
            Ok(())
        })
        .unwrap();

    assert!(fx.bus.dispatch(&Harvest { crop: "pumpkin" }));
    assert_eq!(*crops.lock(), vec!["pumpkin"]);
}

#[test]
fn registration_is_additive() {
    let fx = fixture();
    let calls = Arc::new(Mutex::new(0));
    for _ in 0..2 {
        let sink = Arc::clone(&calls);
        fx.bus
            .register(&fx.owner, "twice", move |_: &SimEvent| {
                *sink.lock() += 1;
                Ok(())
            })
            .unwrap();
    }
    fx.bus.dispatch(&died(2));
    assert_eq!(*calls.lock(), 2);
}

#[test]
fn registering_during_dispatch_applies_to_next_dispatch() {
    let fx = fixture();
    let calls = Arc::new(Mutex::new(Vec::new()));

    let bus = Arc::clone(&fx.bus);
    let owner = Arc::clone(&fx.owner);
    let sink = Arc::clone(&calls);
    fx.bus
        .register(&fx.owner, "spawner", move |_: &SimDied| {
            sink.lock().push("spawner");
            let inner = Arc::clone(&sink);
            bus.register(&owner, "late", move |_: &SimDied| {
                inner.lock().push("late");
                Ok(())
            })
            .map(|_| ())
            .map_err(Fault::from)
        })
        .unwrap();

    fx.bus.dispatch(&died(1));
    assert_eq!(*calls.lock(), vec!["spawner"]);

    fx.bus.dispatch(&died(1));
    assert_eq!(*calls.lock(), vec!["spawner", "spawner", "late"]);
}

#[test]
fn handlers_may_dispatch_nested_events() {
    let fx = fixture();
    let calls = Arc::new(Mutex::new(Vec::new()));

    let bus = Arc::clone(&fx.bus);
    let sink = Arc::clone(&calls);
    fx.bus
        .register(&fx.owner, "relay", move |event: &SimDied| {
            sink.lock().push("died");
            bus.dispatch(&SimSpawned {
                sim: SimEvent {
                    sim_id: event.sim.sim_id,
                },
            });
            Ok(())
        })
        .unwrap();
    let sink = Arc::clone(&calls);
    fx.bus
        .register(&fx.owner, "spawned", move |_: &SimSpawned| {
            sink.lock().push("spawned");
            Ok(())
        })
        .unwrap();

    fx.bus.dispatch(&died(5));
    assert_eq!(*calls.lock(), vec!["died", "spawned"]);
}
