use std::rc::Rc;

use script_bridge::command::ListenerFlags;
use script_bridge::event::AddEventListenerOptions;
use script_bridge::{
    BridgeConfig, ChannelTransport, CommandKind, CommandPayload, EventTarget, ExecutingContext,
    ListenerRef, TargetId,
};
use serde_json::json;

fn kinds(batch: &[script_bridge::Command]) -> Vec<CommandKind> {
    batch.iter().map(|command| command.kind).collect()
}

#[tokio::test]
async fn flush_delivers_batch_in_append_order() {
    let (transport, mut receiver) = ChannelTransport::new();
    let context = ExecutingContext::new(BridgeConfig::default(), transport);

    let target = EventTarget::create(&context, "div");
    let listener = ListenerRef::new(|_, _| Ok(()));
    target.add_event_listener("click", &listener, AddEventListenerOptions::once());
    target.call_method("focus", vec![json!(true)]);

    assert_eq!(context.pending_command_count(), 3);
    assert!(receiver.try_recv().is_err(), "nothing is visible before flush");

    assert_eq!(context.flush_commands(), 3);
    let batch = receiver.try_recv().expect("one batch");
    assert_eq!(
        kinds(&batch),
        vec![
            CommandKind::CreateEventTarget,
            CommandKind::AddEvent,
            CommandKind::CallMethod
        ]
    );
    assert_eq!(batch[0].key, "div");
    assert_eq!(batch[1].target, target.id());
    assert_eq!(
        batch[1].payload,
        CommandPayload::Listener(ListenerFlags {
            capture: false,
            passive: false,
            once: true,
        })
    );
    assert_eq!(
        batch[2].payload,
        CommandPayload::Arguments {
            args: vec![json!(true)]
        }
    );

    assert_eq!(context.flush_commands(), 0);
    assert!(receiver.try_recv().is_err(), "second flush sends nothing");
}

#[test]
fn only_first_add_and_last_remove_reach_the_host() {
    let context = ExecutingContext::detached(BridgeConfig::default());
    let target = EventTarget::create(&context, "div");
    context.flush_commands();

    let first = ListenerRef::new(|_, _| Ok(()));
    let second = ListenerRef::new(|_, _| Ok(()));
    target.add_event_listener("x", &first, false);
    target.add_event_listener("x", &second, false);
    target.add_event_listener("x", &first, true);

    let pending = context.pending_commands();
    assert_eq!(kinds(&pending), vec![CommandKind::AddEvent, CommandKind::AddEvent]);
    assert_eq!(
        pending[1].payload,
        CommandPayload::Listener(ListenerFlags {
            capture: true,
            ..ListenerFlags::default()
        })
    );
    context.flush_commands();

    target.remove_event_listener("x", &first, false);
    assert_eq!(context.pending_command_count(), 0);
    target.remove_event_listener("x", &second, false);
    target.remove_event_listener("x", &first, true);

    let pending = context.pending_commands();
    assert_eq!(kinds(&pending), vec![CommandKind::RemoveEvent, CommandKind::RemoveEvent]);
    assert_eq!(pending[0].payload, CommandPayload::Capture { capture: false });
    assert_eq!(pending[1].payload, CommandPayload::Capture { capture: true });
}

#[test]
fn once_listener_emits_remove_after_firing() {
    let context = ExecutingContext::detached(BridgeConfig::default());
    let target = EventTarget::create(&context, "div");
    target.add_event_listener(
        "load",
        &ListenerRef::new(|_, _| Ok(())),
        AddEventListenerOptions::once(),
    );
    context.flush_commands();

    target
        .dispatch_event(&script_bridge::Event::new("load", Default::default()))
        .expect("dispatch");
    let pending = context.pending_commands();
    assert_eq!(kinds(&pending), vec![CommandKind::RemoveEvent]);
    assert_eq!(pending[0].key, "load");
}

#[test]
fn host_objects_do_not_announce_themselves() {
    let context = ExecutingContext::detached(BridgeConfig::default());
    let target = EventTarget::from_host_object(&context, TargetId(40), "Window");
    assert_eq!(context.pending_command_count(), 0);
    assert!(Rc::ptr_eq(&context.target(TargetId(40)).expect("registered"), &target));
}

#[tokio::test]
async fn transport_failure_still_drains_buffer() {
    let (transport, receiver) = ChannelTransport::new();
    drop(receiver);
    let context = ExecutingContext::new(BridgeConfig::default(), transport);
    let _target = EventTarget::create(&context, "div");

    assert_eq!(context.flush_commands(), 1);
    assert_eq!(context.pending_command_count(), 0);
}
