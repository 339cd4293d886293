use super::*;
use crate::mailbox::{mailbox, MailboxError, MailboxSender};
use crate::messages::{MessageCommand, MessageQuery, MessageType, Priority, ToastLevel, UserMessage};
use crate::render_host::fake::{FakeBehavior, FakeRenderHost, HostCall};
use crate::render_host::ForegroundOutcome;
use crate::reply::AwaitOutcome;
use crate::request::UIRequest;
use parking_lot::Mutex;
use serde_json::json;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

const WAIT: Duration = Duration::from_secs(5);

struct Harness {
    tx: MailboxSender,
    calls: Arc<Mutex<Vec<HostCall>>>,
    behavior: Arc<Mutex<FakeBehavior>>,
    handle: JoinHandle<()>,
}

impl Harness {
    fn start(behavior: FakeBehavior) -> Self {
        Self::start_with(FakeRenderHost::new, behavior)
    }

    fn start_with(
        make_host: impl FnOnce(crate::mailbox::EventSink, FakeBehavior) -> FakeRenderHost,
        behavior: FakeBehavior,
    ) -> Self {
        let (tx, rx) = mailbox();
        let host = make_host(tx.event_sink(), behavior);
        let calls = host.calls();
        let behavior = host.behavior();
        let handle =
            thread::spawn(move || DispatchLoop::new(rx, host, DispatchSettings::default()).run());

        wait_until(|| tx.has_consumer());
        Self {
            tx,
            calls,
            behavior,
            handle,
        }
    }

    fn stop(self) {
        self.tx.shutdown().unwrap();
        self.handle.join().unwrap();
    }

    fn calls(&self) -> Vec<HostCall> {
        self.calls.lock().clone()
    }
}

fn wait_until(mut condition: impl FnMut() -> bool) {
    let start = Instant::now();
    while !condition() {
        assert!(start.elapsed() < WAIT, "condition not met in time");
        thread::sleep(Duration::from_millis(5));
    }
}

fn window_request(timeout: Duration, hints: WindowHints) -> UIRequest {
    UIRequest::window(
        OperationKind::Dialog,
        ContentSource::Html("<p>hi</p>".to_string()),
        "Test",
        hints,
        timeout,
    )
}

fn quiet_hints() -> WindowHints {
    WindowHints {
        bring_to_front: false,
        ..WindowHints::default()
    }
}

fn opened_ids(calls: &[HostCall]) -> Vec<RequestId> {
    calls
        .iter()
        .filter_map(|call| match call {
            HostCall::Open(spec) => Some(spec.window.clone()),
            _ => None,
        })
        .collect()
}

#[test]
fn test_queue_test_is_answered_without_render_host() {
    let harness = Harness::start(FakeBehavior::Silent);

    let reply = harness.tx.enqueue(UIRequest::probe("ping")).unwrap();
    match reply.wait(WAIT) {
        AwaitOutcome::Reply(UiOutcome::Success { data }) => {
            assert_eq!(data["echo"], "ping");
            assert!(data["queue_latency_ms"].as_f64().unwrap() >= 0.0);
            assert!(data["received_at"].is_string());
            assert!(data["dispatched_at"].is_string());
        }
        other => panic!("expected queue test success, got {:?}", other),
    }

    assert!(harness.calls().is_empty());
    harness.stop();
}

#[test]
fn test_window_success_response() {
    let harness = Harness::start(FakeBehavior::Respond(Some(json!({
        "status": "success",
        "data": {"confirmed": true}
    }))));

    let reply = harness
        .tx
        .enqueue(window_request(Duration::from_secs(60), quiet_hints()))
        .unwrap();
    assert_eq!(
        reply.wait(WAIT),
        AwaitOutcome::Reply(UiOutcome::Success {
            data: json!({"confirmed": true})
        })
    );
    harness.stop();
}

#[test]
fn test_close_without_response_is_cancelled() {
    let harness = Harness::start(FakeBehavior::Respond(None));

    let reply = harness
        .tx
        .enqueue(window_request(Duration::from_secs(60), quiet_hints()))
        .unwrap();
    assert!(matches!(
        reply.wait(WAIT),
        AwaitOutcome::Reply(UiOutcome::Cancelled { .. })
    ));
    harness.stop();
}

#[test]
fn test_unanswered_window_times_out_and_closes() {
    let harness = Harness::start(FakeBehavior::Silent);

    let request = window_request(Duration::from_millis(100), quiet_hints());
    let id = request.id.clone();
    let start = Instant::now();
    let reply = harness.tx.enqueue(request).unwrap();

    assert_eq!(reply.wait(WAIT), AwaitOutcome::Reply(UiOutcome::Timeout));
    assert!(start.elapsed() >= Duration::from_millis(100));
    assert!(start.elapsed() < Duration::from_secs(2));
    assert!(harness.calls().contains(&HostCall::Close(id)));
    harness.stop();
}

#[test]
fn test_requests_open_in_enqueue_order() {
    let harness = Harness::start(FakeBehavior::Respond(None));

    let a = window_request(Duration::from_secs(60), quiet_hints());
    let b = window_request(Duration::from_secs(60), quiet_hints());
    let (a_id, b_id) = (a.id.clone(), b.id.clone());
    let reply_a = harness.tx.enqueue(a).unwrap();
    let reply_b = harness.tx.enqueue(b).unwrap();

    assert!(matches!(reply_a.wait(WAIT), AwaitOutcome::Reply(_)));
    assert!(matches!(reply_b.wait(WAIT), AwaitOutcome::Reply(_)));
    assert_eq!(opened_ids(&harness.calls()), vec![a_id, b_id]);
    harness.stop();
}

#[test]
fn test_loop_survives_render_host_failure() {
    let harness = Harness::start(FakeBehavior::FailOpen("no display".to_string()));

    let reply = harness
        .tx
        .enqueue(window_request(Duration::from_secs(60), quiet_hints()))
        .unwrap();
    match reply.wait(WAIT) {
        AwaitOutcome::Reply(UiOutcome::Error { detail }) => assert!(detail.contains("no display")),
        other => panic!("expected error, got {:?}", other),
    }

    *harness.behavior.lock() = FakeBehavior::Respond(None);
    let reply = harness
        .tx
        .enqueue(window_request(Duration::from_secs(60), quiet_hints()))
        .unwrap();
    assert!(matches!(
        reply.wait(WAIT),
        AwaitOutcome::Reply(UiOutcome::Cancelled { .. })
    ));
    harness.stop();
}

#[test]
fn test_failed_event_becomes_error() {
    let harness = Harness::start(FakeBehavior::Silent);

    let request = window_request(Duration::from_secs(60), quiet_hints());
    let id = request.id.clone();
    let reply = harness.tx.enqueue(request).unwrap();
    wait_until(|| !opened_ids(&harness.calls()).is_empty());

    harness.tx.event_sink().send(WindowEvent::Failed {
        window: id,
        error: "renderer crashed".to_string(),
    });
    match reply.wait(WAIT) {
        AwaitOutcome::Reply(UiOutcome::Error { detail }) => {
            assert!(detail.contains("renderer crashed"))
        }
        other => panic!("expected error, got {:?}", other),
    }
    harness.stop();
}

#[test]
fn test_auto_resize_negotiation() {
    let harness = Harness::start(FakeBehavior::Measure(Geometry::new(380, 290)));

    let hints = WindowHints {
        width: 500,
        height: 300,
        auto_resize: true,
        ..quiet_hints()
    };
    let request = window_request(Duration::ZERO, hints);
    let id = request.id.clone();
    let reply = harness.tx.enqueue(request).unwrap();
    assert_eq!(reply.wait(Duration::ZERO), AwaitOutcome::NotAwaited);

    wait_until(|| {
        harness
            .calls()
            .iter()
            .any(|c| matches!(c, HostCall::SetGeometry(..)))
    });

    let calls = harness.calls();
    match &calls[0] {
        HostCall::Open(spec) => assert_eq!(spec.geometry, Geometry::new(500, 600)),
        other => panic!("expected open first, got {:?}", other),
    }
    match &calls[1] {
        HostCall::Eval(window, script) => {
            assert_eq!(window, &id);
            assert!(script.contains("+ 20"));
        }
        other => panic!("expected eval second, got {:?}", other),
    }
    assert_eq!(
        calls[2],
        HostCall::SetGeometry(id.clone(), Geometry::new(396, 329), true)
    );

    // A second measurement is ignored
    harness.tx.event_sink().send(WindowEvent::Measured {
        window: id,
        width: 10,
        height: 10,
    });
    let probe = harness.tx.enqueue(UIRequest::probe("sync")).unwrap();
    assert!(matches!(probe.wait(WAIT), AwaitOutcome::Reply(_)));
    let resizes = harness
        .calls()
        .iter()
        .filter(|c| matches!(c, HostCall::SetGeometry(..)))
        .count();
    assert_eq!(resizes, 1);

    harness.stop();
}

#[test]
fn test_no_measurement_without_auto_resize() {
    let harness = Harness::start(FakeBehavior::Measure(Geometry::new(380, 290)));

    let hints = WindowHints {
        width: 500,
        height: 300,
        ..quiet_hints()
    };
    let reply = harness
        .tx
        .enqueue(window_request(Duration::ZERO, hints))
        .unwrap();
    drop(reply);

    let probe = harness.tx.enqueue(UIRequest::probe("sync")).unwrap();
    assert!(matches!(probe.wait(WAIT), AwaitOutcome::Reply(_)));

    let calls = harness.calls();
    assert_eq!(calls.len(), 1);
    match &calls[0] {
        HostCall::Open(spec) => assert_eq!(spec.geometry, Geometry::new(500, 300)),
        other => panic!("expected open, got {:?}", other),
    }
    harness.stop();
}

#[test]
fn test_events_for_unknown_windows_are_ignored() {
    let harness = Harness::start(FakeBehavior::Silent);
    let sink = harness.tx.event_sink();
    let stranger = RequestId::from("not-a-window");

    sink.send(WindowEvent::Loaded {
        window: stranger.clone(),
    });
    sink.send(WindowEvent::Measured {
        window: stranger.clone(),
        width: 1,
        height: 1,
    });
    sink.send(WindowEvent::Closed {
        window: stranger.clone(),
        response: None,
    });
    sink.send(WindowEvent::Failed {
        window: stranger,
        error: "x".to_string(),
    });

    let probe = harness.tx.enqueue(UIRequest::probe("still here")).unwrap();
    assert!(matches!(probe.wait(WAIT), AwaitOutcome::Reply(_)));
    assert!(harness.calls().is_empty());
    harness.stop();
}

#[test]
fn test_loop_survives_timeout_past_end_of_clock() {
    let harness = Harness::start(FakeBehavior::Silent);

    let request = window_request(Duration::from_secs(u64::MAX), quiet_hints());
    let id = request.id.clone();
    let reply = harness.tx.enqueue(request).unwrap();
    assert_eq!(reply.wait(Duration::ZERO), AwaitOutcome::NotAwaited);

    let probe = harness.tx.enqueue(UIRequest::probe("after")).unwrap();
    assert!(matches!(
        probe.wait(WAIT),
        AwaitOutcome::Reply(UiOutcome::Success { .. })
    ));
    assert!(harness.tx.has_consumer());
    assert_eq!(opened_ids(&harness.calls()), vec![id]);
    harness.stop();
}

#[test]
fn test_request_expired_in_queue_is_not_opened() {
    let harness = Harness::start(FakeBehavior::Respond(None));

    let request = window_request(Duration::from_millis(10), quiet_hints());
    thread::sleep(Duration::from_millis(30));
    let reply = harness.tx.enqueue(request).unwrap();

    assert_eq!(reply.wait(WAIT), AwaitOutcome::Reply(UiOutcome::Timeout));
    assert!(opened_ids(&harness.calls()).is_empty());
    harness.stop();
}

#[test]
fn test_bring_to_front_is_requested_and_never_fatal() {
    let harness = Harness::start_with(
        |sink, behavior| {
            FakeRenderHost::new(sink, behavior).with_foreground(ForegroundOutcome::NotHonored)
        },
        FakeBehavior::Respond(None),
    );

    let request = window_request(Duration::from_secs(60), WindowHints::default());
    let id = request.id.clone();
    let reply = harness.tx.enqueue(request).unwrap();

    assert!(matches!(
        reply.wait(WAIT),
        AwaitOutcome::Reply(UiOutcome::Cancelled { .. })
    ));
    assert!(harness.calls().contains(&HostCall::Focus(id)));
    harness.stop();
}

#[test]
fn test_host_exit_fails_open_windows() {
    let harness = Harness::start(FakeBehavior::Silent);

    let reply = harness
        .tx
        .enqueue(window_request(Duration::from_secs(60), quiet_hints()))
        .unwrap();
    wait_until(|| !opened_ids(&harness.calls()).is_empty());

    harness.tx.event_sink().send(WindowEvent::HostExited {
        reason: "renderer process exited".to_string(),
    });
    match reply.wait(WAIT) {
        AwaitOutcome::Reply(UiOutcome::Error { detail }) => {
            assert!(detail.contains("Render host exited"))
        }
        other => panic!("expected error, got {:?}", other),
    }
    harness.stop();
}

#[test]
fn test_shutdown_closes_open_sessions() {
    let harness = Harness::start(FakeBehavior::Silent);
    let tx = harness.tx.clone();

    let request = window_request(Duration::ZERO, quiet_hints());
    let id = request.id.clone();
    let reply = tx.enqueue(request).unwrap();
    wait_until(|| !opened_ids(&harness.calls()).is_empty());

    let calls = harness.calls.clone();
    harness.stop();

    assert_eq!(
        reply.wait(WAIT),
        AwaitOutcome::Reply(UiOutcome::error(SHUTDOWN_DETAIL))
    );
    assert!(calls.lock().contains(&HostCall::Close(id)));
    assert!(!tx.has_consumer());
    assert_eq!(
        tx.enqueue(UIRequest::probe("late")).unwrap_err(),
        MailboxError::NoConsumer
    );
}

#[test]
fn test_concurrent_callers_each_get_their_own_reply() {
    let harness = Harness::start(FakeBehavior::Silent);

    let callers: Vec<_> = (0..2)
        .map(|i| {
            let tx = harness.tx.clone();
            thread::spawn(move || {
                let request = UIRequest::window(
                    OperationKind::Popup,
                    ContentSource::Html(format!("<p>{i}</p>")),
                    format!("caller {i}"),
                    quiet_hints(),
                    Duration::from_secs(60),
                );
                let id = request.id.clone();
                let reply = tx.enqueue(request).unwrap();
                (id, reply.wait(WAIT))
            })
        })
        .collect();

    wait_until(|| opened_ids(&harness.calls()).len() == 2);
    // Answer in reverse order of opening
    let mut ids = opened_ids(&harness.calls());
    ids.reverse();
    let sink = harness.tx.event_sink();
    for id in &ids {
        sink.send(WindowEvent::Closed {
            window: id.clone(),
            response: Some(json!({"status": "success", "data": {"window": id.as_str()}})),
        });
    }

    for caller in callers {
        let (id, outcome) = caller.join().unwrap();
        assert_eq!(
            outcome,
            AwaitOutcome::Reply(UiOutcome::Success {
                data: json!({"window": id.as_str()})
            })
        );
    }
    harness.stop();
}

fn success_data(reply: crate::reply::ReplyReceiver<UiOutcome>) -> serde_json::Value {
    match reply.wait(WAIT) {
        AwaitOutcome::Reply(UiOutcome::Success { data }) => data,
        other => panic!("expected success, got {:?}", other),
    }
}

fn run(harness: &Harness, command: MessageCommand) -> serde_json::Value {
    success_data(harness.tx.enqueue(UIRequest::messages(command)).unwrap())
}

fn status_message(content: &str, show_dashboard: bool) -> MessageCommand {
    MessageCommand::Send {
        message: UserMessage::outgoing(content, MessageType::Status, Priority::Normal, false),
        show_dashboard,
    }
}

#[test]
fn test_toast_goes_to_render_host() {
    let harness = Harness::start(FakeBehavior::Silent);

    let reply = harness
        .tx
        .enqueue(UIRequest::toast(ToastLevel::Warning, "Disk almost full"))
        .unwrap();
    let data = success_data(reply);
    assert_eq!(data["message"], "Toast notification sent successfully");
    assert_eq!(data["level"], "warning");
    assert_eq!(data["text"], "Disk almost full");
    assert_eq!(
        harness.calls(),
        vec![HostCall::Notify(ToastLevel::Warning, "Disk almost full".to_string())]
    );
    harness.stop();
}

#[test]
fn test_toast_failure_is_an_error_and_loop_continues() {
    let harness = Harness::start(FakeBehavior::FailOpen("no display".to_string()));

    let reply = harness
        .tx
        .enqueue(UIRequest::toast(ToastLevel::Info, "hello"))
        .unwrap();
    match reply.wait(WAIT) {
        AwaitOutcome::Reply(UiOutcome::Error { detail }) => {
            assert!(detail.starts_with("Toast notification failed"));
            assert!(detail.contains("no display"));
        }
        other => panic!("expected error, got {:?}", other),
    }

    let probe = harness.tx.enqueue(UIRequest::probe("after")).unwrap();
    assert!(matches!(probe.wait(WAIT), AwaitOutcome::Reply(_)));
    harness.stop();
}

#[test]
fn test_send_message_opens_dashboard_once() {
    let harness = Harness::start(FakeBehavior::Silent);

    let data = run(&harness, status_message("Starting setup", true));
    assert_eq!(data["status"], "queued");
    assert!(uuid::Uuid::parse_str(data["message_id"].as_str().unwrap()).is_ok());
    assert!(data["timestamp"].as_f64().is_some());

    run(&harness, status_message("Step 1 done", true));

    assert_eq!(
        harness.calls(),
        vec![
            HostCall::ShowDashboard(vec!["Starting setup".to_string()]),
            HostCall::PostMessage("Step 1 done".to_string()),
        ]
    );
    harness.stop();
}

#[test]
fn test_send_message_without_dashboard_only_records() {
    let harness = Harness::start(FakeBehavior::Silent);

    run(&harness, status_message("quiet", false));
    assert!(harness.calls().is_empty());

    let history = run(&harness, MessageCommand::History);
    assert_eq!(history["count"], 1);
    assert_eq!(history["history"][0]["content"], "quiet");
    assert_eq!(history["history"][0]["direction"], "ai_to_user");
    harness.stop();
}

#[test]
fn test_user_replies_are_checked_once() {
    let harness = Harness::start(FakeBehavior::Silent);
    let sink = harness.tx.event_sink();

    run(&harness, status_message("Which port?", false));
    sink.send(WindowEvent::MessageFromUser {
        content: "Use 8080".to_string(),
        msg_type: None,
    });
    sink.send(WindowEvent::MessageFromUser {
        content: "Actually, why?".to_string(),
        msg_type: Some(MessageType::Question),
    });

    let peek = run(
        &harness,
        MessageCommand::Check(MessageQuery {
            mark_as_read: false,
            ..MessageQuery::default()
        }),
    );
    assert_eq!(peek["count"], 2);

    let questions = run(
        &harness,
        MessageCommand::Check(MessageQuery {
            filter_type: Some("question".to_string()),
            ..MessageQuery::default()
        }),
    );
    assert_eq!(questions["count"], 1);
    assert_eq!(questions["messages"][0]["content"], "Actually, why?");
    assert_eq!(questions["messages"][0]["direction"], "user_to_ai");

    let rest = run(&harness, MessageCommand::Check(MessageQuery::default()));
    assert_eq!(rest["count"], 1);
    assert_eq!(rest["messages"][0]["content"], "Use 8080");
    assert_eq!(rest["messages"][0]["type"], "response");

    let none = run(&harness, MessageCommand::Check(MessageQuery::default()));
    assert_eq!(none["count"], 0);

    let history = run(&harness, MessageCommand::History);
    assert_eq!(history["count"], 3);
    assert_eq!(history["history"][1]["status"], "read");
    harness.stop();
}

#[test]
fn test_clear_messages_empties_history_and_visible_dashboard() {
    let harness = Harness::start(FakeBehavior::Silent);

    run(&harness, status_message("one", true));
    run(&harness, status_message("two", true));
    let cleared = run(&harness, MessageCommand::Clear);
    assert_eq!(cleared["message"], "Message queues cleared");
    assert_eq!(cleared["cleared"], 2);

    assert_eq!(run(&harness, MessageCommand::History)["count"], 0);
    assert_eq!(
        harness.calls().last(),
        Some(&HostCall::ShowDashboard(Vec::new()))
    );
    harness.stop();
}

#[test]
fn test_dashboard_show_and_hide() {
    let harness = Harness::start(FakeBehavior::Silent);

    run(&harness, status_message("kept", false));
    assert_eq!(
        run(&harness, MessageCommand::ShowDashboard)["message"],
        "Dashboard shown"
    );
    assert_eq!(
        run(&harness, MessageCommand::HideDashboard)["message"],
        "Dashboard hidden"
    );

    // Hidden again, so the next message reopens it with the full history
    run(&harness, status_message("next", true));
    assert_eq!(
        harness.calls(),
        vec![
            HostCall::ShowDashboard(vec!["kept".to_string()]),
            HostCall::HideDashboard,
            HostCall::ShowDashboard(vec!["kept".to_string(), "next".to_string()]),
        ]
    );
    harness.stop();
}

#[test]
fn test_dashboard_closed_by_user_is_reopened_on_next_message() {
    let harness = Harness::start(FakeBehavior::Silent);

    run(&harness, status_message("first", true));
    harness.tx.event_sink().send(WindowEvent::DashboardHidden);
    run(&harness, status_message("second", true));

    let shows = harness
        .calls()
        .iter()
        .filter(|c| matches!(c, HostCall::ShowDashboard(_)))
        .count();
    assert_eq!(shows, 2);
    assert!(!harness
        .calls()
        .iter()
        .any(|c| matches!(c, HostCall::PostMessage(_))));
    harness.stop();
}

#[test]
fn test_show_dashboard_failure_is_an_error() {
    let harness = Harness::start(FakeBehavior::FailOpen("no display".to_string()));

    let reply = harness
        .tx
        .enqueue(UIRequest::messages(MessageCommand::ShowDashboard))
        .unwrap();
    match reply.wait(WAIT) {
        AwaitOutcome::Reply(UiOutcome::Error { detail }) => {
            assert!(detail.starts_with("Error showing dashboard"))
        }
        other => panic!("expected error, got {:?}", other),
    }

    // Still hidden, so a send tries to open it again
    run(&harness, status_message("hello", true));
    assert!(!harness
        .calls()
        .iter()
        .any(|c| matches!(c, HostCall::PostMessage(_))));
    harness.stop();
}
