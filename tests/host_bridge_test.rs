use std::cell::RefCell;
use std::rc::Rc;

use script_bridge::binding::{call_methods, host_methods};
use script_bridge::event::{CloseEventInit, RawEventDetail};
use script_bridge::shape::{PropertyLookup, SetItemOutcome};
use script_bridge::{
    BridgeConfig, CommandKind, CommandPayload, EventTarget, ExecutingContext, ListenerRef,
    NativeValue, RawEvent, ScriptError, TargetId,
};
use serde_json::{json, Value as JsonValue};

fn dispatch_args(event_type: &str, raw: RawEvent, capture: bool) -> Vec<NativeValue> {
    vec![event_type.into(), raw.into(), capture.into()]
}

fn raw_for(target: &EventTarget) -> RawEvent {
    RawEvent {
        target: target.id(),
        cancelable: true,
        ..RawEvent::default()
    }
}

#[test]
fn host_dispatch_reports_cancel_and_stop() {
    let context = ExecutingContext::detached(BridgeConfig::default());
    let target = EventTarget::create(&context, "button");
    target.add_event_listener(
        "click",
        &ListenerRef::new(|_, event| {
            event.prevent_default();
            event.stop_propagation();
            Ok(())
        }),
        false,
    );

    let result = context
        .handle_call_from_host(
            target.id(),
            call_methods::DISPATCH_EVENT,
            &dispatch_args("click", raw_for(&target), false),
        )
        .into_dispatch_result()
        .expect("dispatch result");
    assert!(result.canceled);
    assert!(result.propagation_stopped);
}

#[test]
fn host_dispatch_fires_only_requested_phase() {
    let context = ExecutingContext::detached(BridgeConfig::default());
    let target = EventTarget::create(&context, "div");
    let log = Rc::new(RefCell::new(Vec::new()));
    for (name, capture) in [("capture", true), ("bubble", false)] {
        let log = Rc::clone(&log);
        target.add_event_listener(
            "x",
            &ListenerRef::new(move |_, _| {
                log.borrow_mut().push(name);
                Ok(())
            }),
            capture,
        );
    }

    let args = dispatch_args("x", raw_for(&target), true);
    let result = context.handle_call_from_host(target.id(), call_methods::DISPATCH_EVENT, &args);
    let result = result.into_dispatch_result().expect("dispatch result");
    assert!(!result.canceled);
    assert_eq!(*log.borrow(), vec!["capture"]);
}

#[test]
fn host_event_is_wired_until_host_releases_it() {
    let context = ExecutingContext::detached(BridgeConfig::default());
    let target = EventTarget::create(&context, "socket");
    let raw = RawEvent {
        detail: RawEventDetail::Close(CloseEventInit {
            code: 1000,
            reason: "bye".into(),
            was_clean: true,
        }),
        ..raw_for(&target)
    };

    let result = context
        .handle_call_from_host(
            target.id(),
            call_methods::DISPATCH_EVENT,
            &dispatch_args("close", raw, false),
        )
        .into_dispatch_result()
        .expect("dispatch result");

    let wire_id = result.event.id();
    let event = context.wired_event(wire_id).expect("event kept alive");
    assert_eq!(event.as_close_event().map(|close| close.code), Some(1000));
    assert!(!event.is_trusted());
    drop(event);

    let table = context.wire_table();
    std::thread::spawn(move || drop(result)).join().expect("host thread");
    assert!(!table.is_alive(wire_id));
    assert!(!table.delete(wire_id));

    context.flush_commands();
    assert_eq!(context.wired_event_count(), 0);
}

#[test]
#[should_panic(expected = "dispatchEvent expects")]
fn host_dispatch_with_missing_arguments_is_fatal() {
    let context = ExecutingContext::detached(BridgeConfig::default());
    let target = EventTarget::create(&context, "div");
    let args: Vec<NativeValue> = vec!["x".into(), raw_for(&target).into()];
    context.handle_call_from_host(target.id(), call_methods::DISPATCH_EVENT, &args);
}

#[test]
fn unknown_target_returns_null() {
    let context = ExecutingContext::detached(BridgeConfig::default());
    let result = context.handle_call_from_host(TargetId(999), call_methods::DISPATCH_EVENT, &[]);
    assert!(result.is_null());
}

#[test]
fn shape_sync_drives_item_lookup() {
    let context = ExecutingContext::detached(BridgeConfig::default());
    let target = EventTarget::create(&context, "input");
    assert_eq!(target.item("value"), PropertyLookup::Undefined);
    assert_eq!(context.pending_command_count(), 0, "item flushed the create command");

    let lists: Vec<NativeValue> = vec![
        vec!["value"].into(),
        vec!["focus"].into(),
        vec!["toBlob"].into(),
    ];
    let synced =
        context.handle_call_from_host(target.id(), call_methods::SYNC_PROPERTIES_AND_METHODS, &lists);
    assert_eq!(synced.as_bool(), Some(true));

    assert_eq!(target.item("value"), PropertyLookup::BuiltInProperty);
    assert_eq!(target.item("focus"), PropertyLookup::SyncMethod);
    assert_eq!(target.item("toBlob"), PropertyLookup::AsyncMethod);
    assert_eq!(
        target.item("Symbol.toStringTag"),
        PropertyLookup::ToStringTag("input".into())
    );

    assert_eq!(target.set_item("value", json!("hi")), SetItemOutcome::Forwarded);
    let pending = context.pending_commands();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].kind, CommandKind::SetProperty);
    assert_eq!(pending[0].payload, CommandPayload::Value { value: json!("hi") });

    assert_eq!(target.set_item("custom", json!(3)), SetItemOutcome::Stored);
    assert_eq!(target.item("custom"), PropertyLookup::Unimplemented(json!(3)));
    assert!(target.delete_item("custom"));
    assert_eq!(target.item("custom"), PropertyLookup::Undefined);
    assert!(target.delete_item("never-set"));
}

#[test]
#[should_panic(expected = "already synced")]
fn shape_sync_twice_is_fatal() {
    let context = ExecutingContext::detached(BridgeConfig::default());
    let target = EventTarget::create(&context, "input");
    let args: Vec<NativeValue> = vec![
        Vec::<&str>::new().into(),
        Vec::<&str>::new().into(),
        Vec::<&str>::new().into(),
    ];
    context.handle_call_from_host(target.id(), call_methods::SYNC_PROPERTIES_AND_METHODS, &args);
    context.handle_call_from_host(target.id(), call_methods::SYNC_PROPERTIES_AND_METHODS, &args);
}

#[test]
fn module_response_runs_parked_callback_once() {
    let context = ExecutingContext::detached(BridgeConfig::default());
    let seen: Rc<RefCell<Vec<Result<JsonValue, String>>>> = Rc::default();
    let seen_in = Rc::clone(&seen);

    let id = context.invoke_module(
        "Clipboard",
        "readText",
        json!({}),
        Rc::new(
            move |_: &ExecutingContext, result: Result<JsonValue, String>| -> Result<(), ScriptError> {
                seen_in.borrow_mut().push(result);
                Ok(())
            },
        ),
    );

    let pending = context.pending_commands();
    assert_eq!(pending[0].kind, CommandKind::CallMethod);
    assert_eq!(pending[0].key, host_methods::INVOKE_MODULE);
    assert_eq!(pending[0].target, TargetId::GLOBAL);
    assert_eq!(
        pending[0].payload,
        CommandPayload::Arguments {
            args: vec![json!(id), json!("Clipboard"), json!("readText"), json!({})]
        }
    );

    assert!(context.handle_module_response(id, Ok(json!("copied"))));
    assert!(!context.handle_module_response(id, Ok(json!("again"))));
    assert_eq!(*seen.borrow(), vec![Ok(json!("copied"))]);
    assert_eq!(context.pending_module_callbacks(), 0);
}

#[test]
fn module_callback_error_goes_to_error_channel() {
    let context = ExecutingContext::detached(BridgeConfig::default());
    let id = context.invoke_module(
        "Storage",
        "get",
        json!(["k"]),
        Rc::new(
            |_: &ExecutingContext, result: Result<JsonValue, String>| -> Result<(), ScriptError> {
                Err(ScriptError::new(result.err().unwrap_or_default()))
            },
        ),
    );
    assert!(context.handle_module_response(id, Err("denied".into())));
    let errors = context.take_errors();
    assert_eq!(errors[0].message, "denied");
}
