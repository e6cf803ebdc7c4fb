use std::cell::RefCell;
use std::rc::Rc;

use sn_core::events::{
    DIALOGUE_CLOSED, REQUEST_AI_DIALOGUE, REQUEST_WORLD_STATE_UPDATE, SCRIPT_FINISHED,
    SCRIPT_STEP,
};

use super::*;
use crate::source::MemorySource;

fn json(text: &str) -> Value {
    let raw: serde_json::Value = serde_json::from_str(text).expect("json should parse");
    Value::from(raw)
}

type Log = Rc<RefCell<Vec<String>>>;

fn record<F>(bus: &mut EventBus, event: &str, log: &Log, describe: F)
where
    F: Fn(&Value) -> String + 'static,
{
    let log = Rc::clone(log);
    bus.subscribe(event, move |data: &Value| log.borrow_mut().push(describe(data)));
}

fn step_ids(bus: &mut EventBus) -> Log {
    let log = Log::default();
    record(bus, SCRIPT_STEP, &log, |data| {
        format!(
            "{}:{}",
            data.get("scriptId").map(Value::to_text).unwrap_or_default(),
            data.get("stepId").map(Value::to_text).unwrap_or_default()
        )
    });
    log
}

const INTRO: &str = r#"{"steps":[
    {"stepId":1,"type":"dialogue","text":"Hello ${player.name}","nextStep":2},
    {"stepId":2,"type":"dialogue","text":"Bye","endScript":true}
]}"#;

#[test]
fn dialogue_script_flows_through_the_deferred_queue() {
    let mut bus = EventBus::new();
    let steps = step_ids(&mut bus);
    let finished = Log::default();
    record(&mut bus, SCRIPT_FINISHED, &finished, |data| data.to_text());

    let outcome = bus
        .activate("intro", Some(&json(INTRO)), None)
        .expect("activation should pass");
    assert_eq!(outcome, ActivationOutcome::Activated);
    assert!(steps.borrow().is_empty());

    bus.run_until_idle();
    assert_eq!(*steps.borrow(), vec!["intro:1"]);

    bus.publish(DIALOGUE_CLOSED, &Value::empty_map());
    assert_eq!(steps.borrow().len(), 1);
    assert_eq!(bus.pending(), 1);
    let drained = bus.run_until_idle();
    assert!(drained.idle);
    assert_eq!(*steps.borrow(), vec!["intro:1", "intro:2"]);

    bus.publish(DIALOGUE_CLOSED, &Value::empty_map());
    bus.run_until_idle();
    assert_eq!(finished.borrow().len(), 1);
    assert!(finished.borrow()[0].contains("intro"));
    assert!(bus.active_script_ids().is_empty());

    bus.publish(DIALOGUE_CLOSED, &Value::empty_map());
    bus.run_until_idle();
    assert_eq!(finished.borrow().len(), 1);
}

#[test]
fn subscribers_run_before_engines_in_registration_order() {
    let mut bus = EventBus::new();
    let log = Log::default();
    record(&mut bus, "ping", &log, |_| "subscriber".to_string());
    record(&mut bus, REQUEST_WORLD_STATE_UPDATE, &log, |data| {
        data.get("payload")
            .and_then(|payload| payload.get("clueId"))
            .map(Value::to_text)
            .unwrap_or_default()
    });

    for name in ["first", "second"] {
        let definition = format!(
            r#"{{"steps":[{{"stepId":1,"type":"UNLOCK_CLUE","clueId":"{}","nextStep":2}},{{"stepId":2,"type":"dialogue","text":"x"}}]}}"#,
            name
        );
        bus.activate(name, Some(&json(&definition)), None)
            .expect("activation should pass");
    }

    bus.publish("ping", &Value::empty_map());
    assert_eq!(*log.borrow(), vec!["subscriber", "first", "second"]);
}

#[test]
fn duplicate_activation_keeps_the_existing_engine() {
    let mut bus = EventBus::new();
    bus.activate("intro", Some(&json(INTRO)), None)
        .expect("activation should pass");
    bus.run_until_idle();
    bus.publish(DIALOGUE_CLOSED, &Value::empty_map());
    bus.run_until_idle();

    let outcome = bus
        .activate("intro", Some(&json(INTRO)), None)
        .expect("activation should pass");
    assert_eq!(outcome, ActivationOutcome::AlreadyActive);
    assert_eq!(bus.active_script_ids(), vec!["intro".to_string()]);
    assert_eq!(
        bus.current_step("intro").map(|step| step.step_id.clone()),
        Some(StepId::new("2"))
    );
}

#[test]
fn unknown_and_empty_scripts_are_not_registered() {
    let mut bus = EventBus::new();
    let error = bus
        .activate("ghost", None, None)
        .expect_err("unknown script should fail");
    assert_eq!(error.code, "BUS_SCRIPT_NOT_FOUND");

    let outcome = bus
        .activate("empty", Some(&json(r#"{"steps":[]}"#)), None)
        .expect("empty definition still compiles");
    assert_eq!(outcome, ActivationOutcome::NotExecutable);
    assert!(bus.active_script_ids().is_empty());
    assert_eq!(bus.pending(), 0);
}

#[test]
fn feedback_events_reach_subscribers_but_not_engines() {
    let mut bus = EventBus::new();
    let updates = Log::default();
    record(&mut bus, REQUEST_WORLD_STATE_UPDATE, &updates, |data| data.to_text());

    bus.activate(
        "listener",
        Some(&json(
            r#"{"steps":[
                {"stepId":1,"type":"waitForEvent","eventName":"requestWorldStateUpdate","nextStep":2},
                {"stepId":2,"type":"end"}
            ]}"#,
        )),
        None,
    )
    .expect("activation should pass");
    bus.activate(
        "writer",
        Some(&json(
            r#"{"steps":[
                {"stepId":1,"type":"updateWorldState","target":"flags","property":"seen","value":true,"nextStep":2},
                {"stepId":2,"type":"dialogue","text":"done"}
            ]}"#,
        )),
        None,
    )
    .expect("activation should pass");
    bus.run_until_idle();

    assert_eq!(updates.borrow().len(), 1);
    assert_eq!(
        bus.current_step("listener").map(|step| step.step_id.clone()),
        Some(StepId::new("1"))
    );
}

#[test]
fn emitted_requests_are_queued_for_engines_after_subscribers_see_them() {
    let mut bus = EventBus::new();
    let requests = Log::default();
    record(&mut bus, REQUEST_AI_DIALOGUE, &requests, |data| {
        data.get("persona").map(Value::to_text).unwrap_or_default()
    });
    bus.activate(
        "narrator",
        Some(&json(
            r#"{"steps":[{"stepId":1,"type":"aiDialogue","prompt":"Talk","persona":"Guide","nextStep":2},
                         {"stepId":2,"type":"dialogue","text":"after"}]}"#,
        )),
        None,
    )
    .expect("activation should pass");

    assert_eq!(bus.tick(), 1);
    assert_eq!(*requests.borrow(), vec!["Guide"]);
    assert_eq!(bus.pending(), 1);

    let report = bus.run_until_idle();
    assert_eq!(report.events, 1);
    assert_eq!(requests.borrow().len(), 1);
    assert_eq!(
        bus.current_step("narrator").map(|step| step.step_id.clone()),
        Some(StepId::new("1"))
    );
}

#[test]
fn presented_steps_resolve_the_carried_event_payload() {
    let mut bus = EventBus::new();
    let presented = Log::default();
    record(&mut bus, SCRIPT_STEP, &presented, |data| {
        data.get("step")
            .and_then(|step| step.get("text"))
            .map(Value::to_text)
            .unwrap_or_default()
    });
    bus.activate(
        "door",
        Some(&json(
            r#"{"steps":[{"stepId":1,"type":"waitForEvent","eventName":"door_opened","nextStep":2},
                         {"stepId":2,"type":"dialogue","text":"The ${eventData.side} door creaks"}]}"#,
        )),
        None,
    )
    .expect("activation should pass");
    bus.run_until_idle();

    bus.publish("door_opened", &json(r#"{"side":"north"}"#));
    bus.run_until_idle();
    assert_eq!(presented.borrow().last().map(String::as_str), Some("The north door creaks"));
}

#[test]
fn subscribers_publish_through_the_handle() {
    let mut bus = EventBus::new();
    let handle = bus.handle();
    bus.subscribe(REQUEST_AI_DIALOGUE, move |request: &Value| {
        let script_id = request.get("scriptId").map(Value::to_text).unwrap_or_default();
        handle.notify_script(script_id, DIALOGUE_CLOSED, Value::empty_map());
    });
    let steps = step_ids(&mut bus);

    bus.activate(
        "chat",
        Some(&json(
            r#"{"steps":[{"stepId":1,"type":"aiDialogue","prompt":"Hi","nextStep":2},
                         {"stepId":2,"type":"dialogue","text":"after"}]}"#,
        )),
        None,
    )
    .expect("activation should pass");
    let drained = bus.run_until_idle();
    assert!(drained.idle);
    assert_eq!(*steps.borrow(), vec!["chat:1", "chat:2"]);
}

#[test]
fn notify_script_addresses_one_engine_and_skips_subscribers() {
    let mut bus = EventBus::new();
    let closed = Log::default();
    record(&mut bus, DIALOGUE_CLOSED, &closed, |_| "closed".to_string());
    bus.activate("a", Some(&json(INTRO)), None)
        .expect("activation should pass");
    bus.activate("b", Some(&json(INTRO)), None)
        .expect("activation should pass");
    bus.run_until_idle();

    assert!(bus.notify_script("a", DIALOGUE_CLOSED, &Value::empty_map()));
    assert!(!bus.notify_script("c", DIALOGUE_CLOSED, &Value::empty_map()));
    assert!(closed.borrow().is_empty());

    let progress = bus.progress();
    assert_eq!(progress.get("a"), Some(&StepId::new("2")));
    assert_eq!(progress.get("b"), Some(&StepId::new("1")));
}

#[test]
fn world_state_accessor_feeds_branches_and_presentation() {
    let mut bus = EventBus::new();
    assert_eq!(bus.world_state(), Value::empty_map());

    let state = Rc::new(RefCell::new(json(r#"{"player":{"name":"Mara","credits":150}}"#)));
    let reader = Rc::clone(&state);
    bus.register_world_state_accessor(move || reader.borrow().clone());

    bus.activate(
        "shop",
        Some(&json(
            r#"{"steps":[
                {"stepId":1,"type":"branch","condition":{"target":"player","property":"credits","operator":">=","value":100},
                 "nextStepOnTrue":2,"nextStepOnFalse":3},
                {"stepId":2,"type":"dialogue","text":"Welcome back, ${player.name}"},
                {"stepId":3,"type":"dialogue","text":"Come back later"}
            ]}"#,
        )),
        None,
    )
    .expect("activation should pass");
    bus.run_until_idle();

    let presented = bus.present_current("shop").expect("shop should be active");
    assert_eq!(presented.get("text"), Some(&Value::from("Welcome back, Mara")));
    assert_eq!(
        bus.current_step("shop").and_then(|step| step.text_field("text")),
        Some("Welcome back, ${player.name}")
    );
}

#[test]
fn state_owner_applies_updates_before_the_next_automatic_step() {
    let mut bus = EventBus::new();
    let state = Rc::new(RefCell::new(json(r#"{"player":{"credits":0}}"#)));
    let reader = Rc::clone(&state);
    bus.register_world_state_accessor(move || reader.borrow().clone());
    let writer = Rc::clone(&state);
    bus.subscribe(REQUEST_WORLD_STATE_UPDATE, move |request: &Value| {
        if let Some(value) = request.get("value") {
            let mut state = writer.borrow_mut();
            if let Some(player) = state.as_map_mut().and_then(|state| state.get_mut("player")) {
                if let Some(entries) = player.as_map_mut() {
                    entries.insert("credits".to_string(), value.clone());
                }
            }
        }
    });

    bus.activate(
        "reward",
        Some(&json(
            r#"{"steps":[
                {"stepId":1,"type":"updateWorldState","target":"player","property":"credits","value":500,"nextStep":2},
                {"stepId":2,"type":"branch","condition":{"target":"player","property":"credits","operator":">","value":100},
                 "nextStepOnTrue":3,"nextStepOnFalse":4},
                {"stepId":3,"type":"dialogue","text":"rich"},
                {"stepId":4,"type":"dialogue","text":"poor"}
            ]}"#,
        )),
        None,
    )
    .expect("activation should pass");
    bus.run_until_idle();
    assert_eq!(
        bus.current_step("reward").map(|step| step.step_id.clone()),
        Some(StepId::new("3"))
    );
}

#[test]
fn restart_resets_live_engines_and_reactivates_finished_ones() {
    let mut bus = EventBus::new();
    bus.activate("intro", Some(&json(INTRO)), None)
        .expect("activation should pass");
    bus.run_until_idle();
    bus.publish(DIALOGUE_CLOSED, &Value::empty_map());
    bus.run_until_idle();

    assert_eq!(bus.restart("intro"), Ok(ActivationOutcome::Activated));
    assert_eq!(bus.progress().get("intro"), Some(&StepId::new("1")));

    bus.publish(DIALOGUE_CLOSED, &Value::empty_map());
    bus.publish(DIALOGUE_CLOSED, &Value::empty_map());
    bus.run_until_idle();
    assert!(!bus.is_active("intro"));

    assert_eq!(bus.restart("intro"), Ok(ActivationOutcome::Activated));
    assert!(bus.is_active("intro"));
}

#[test]
fn progress_restores_into_a_fresh_bus() {
    let source: MemorySource = [("intro".to_string(), json(INTRO))].into_iter().collect();

    let mut bus = EventBus::new();
    bus.register_source(Box::new(source.clone()));
    bus.activate("intro", None, None).expect("source should supply intro");
    bus.run_until_idle();
    bus.publish(DIALOGUE_CLOSED, &Value::empty_map());
    bus.run_until_idle();
    let saved = bus.progress();

    let mut restored = EventBus::new();
    restored.register_source(Box::new(source));
    let steps = step_ids(&mut restored);
    assert_eq!(restored.restore(&saved), Ok(1));
    restored.run_until_idle();
    assert_eq!(restored.progress(), saved);
    assert_eq!(*steps.borrow(), vec!["intro:2"]);
}

#[test]
fn trigger_events_activate_scripts_after_the_engine_pass() {
    let source: MemorySource = [(
        "lab".to_string(),
        json(
            r#"{"trigger":"arrived_at_lab","steps":[
                {"stepId":1,"type":"waitForEvent","eventName":"arrived_at_lab","nextStep":2},
                {"stepId":2,"type":"end"}
            ]}"#,
        ),
    )]
    .into_iter()
    .collect();
    let mut bus = EventBus::new();
    bus.register_source(Box::new(source));

    bus.publish("arrived_at_lab", &Value::empty_map());
    assert!(bus.is_active("lab"));
    bus.run_until_idle();
    assert_eq!(
        bus.current_step("lab").map(|step| step.step_id.clone()),
        Some(StepId::new("1"))
    );

    bus.publish("arrived_at_lab", &Value::empty_map());
    bus.run_until_idle();
    assert!(!bus.is_active("lab"));

    bus.publish("arrived_at_lab", &Value::empty_map());
    assert!(!bus.is_active("lab"));
}

#[test]
fn unsubscribe_stops_delivery() {
    let mut bus = EventBus::new();
    let log = Log::default();
    let counter = Rc::clone(&log);
    let id = bus.subscribe("ping", move |_: &Value| counter.borrow_mut().push("ping".to_string()));

    bus.publish("ping", &Value::Null);
    assert!(bus.unsubscribe(id));
    assert!(!bus.unsubscribe(id));
    bus.publish("ping", &Value::Null);
    assert_eq!(log.borrow().len(), 1);
}

#[test]
fn run_until_idle_stops_at_the_tick_cap() {
    let mut bus = EventBus::with_options(BusOptions {
        max_drain_ticks: 5,
        ..BusOptions::default()
    });
    let handle = bus.handle();
    bus.subscribe("echo", move |_: &Value| handle.publish("echo", Value::Null));

    bus.publish("echo", &Value::Null);
    let report = bus.run_until_idle();
    assert!(!report.idle);
    assert_eq!(report.ticks, 5);
    assert_eq!(bus.pending(), 1);
}

#[test]
fn cyclic_scripts_are_force_finished_once() {
    let mut bus = EventBus::with_options(BusOptions {
        engine: EngineOptions { max_iterations: 4 },
        ..BusOptions::default()
    });
    let finished = Log::default();
    record(&mut bus, SCRIPT_FINISHED, &finished, |data| data.to_text());

    bus.activate(
        "loop",
        Some(&json(
            r#"{"steps":[
                {"stepId":1,"type":"UNLOCK_CLUE","clueId":"a","nextStep":2},
                {"stepId":2,"type":"UNLOCK_CLUE","clueId":"b","nextStep":1}
            ]}"#,
        )),
        None,
    )
    .expect("activation should pass");
    let report = bus.run_until_idle();
    assert!(report.idle);
    assert_eq!(finished.borrow().len(), 1);
    assert!(!bus.is_active("loop"));
}
