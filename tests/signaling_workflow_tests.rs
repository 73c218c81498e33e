use serde_json::json;
use std::time::Duration;
use tokio::sync::broadcast;

use carelink::protocol::{
    CallEndedPayload, CallRejectedPayload, IncomingCallPayload, MuteStatusPayload, SignalPayload,
};
use carelink::{CallState, InboundEvent, RealtimeError, SessionUpdate, SignalingError};

mod utils;

use utils::*;

async fn next_update(updates: &mut broadcast::Receiver<SessionUpdate>) -> SessionUpdate {
    tokio::time::timeout(Duration::from_secs(5), updates.recv())
        .await
        .expect("no session update arrived")
        .expect("update channel closed")
}

fn incoming_call(appointment_id: &str, caller_id: &str) -> InboundEvent {
    InboundEvent::IncomingCall(IncomingCallPayload {
        appointment_id: appointment_id.to_string(),
        caller_id: caller_id.to_string(),
        caller_role: "patient".to_string(),
    })
}

#[tokio::test(start_paused = true)]
async fn test_incoming_call_accepted_and_negotiated() {
    let setup = TestSetupBuilder::new().build();
    let channel = setup.connected_as("doc-1").await;
    let sessions = setup.signaling_for("doc-1").await;
    let mut updates = sessions.subscribe();

    channel.push_event(&incoming_call("A1", "pat-1"));
    assert_eq!(
        next_update(&mut updates).await,
        SessionUpdate::Ringing {
            appointment_id: "A1".to_string(),
            caller_id: "pat-1".to_string(),
            caller_role: "patient".to_string(),
        }
    );

    assert_eq!(sessions.accept("A1").await.unwrap(), CallState::Accepted);
    let frames = SentFrames::on(&channel).count(1).last_from("doc-1");
    assert_eq!(frames.last().event, "acceptCall");
    assert_eq!(
        frames.last().payload,
        json!({ "appointmentId": "A1", "receiverId": "pat-1" })
    );

    channel.push_event(&InboundEvent::Signal(SignalPayload {
        appointment_id: "A1".to_string(),
        sender_id: "pat-1".to_string(),
        signal: json!({ "type": "offer", "sdp": "v=0" }),
    }));
    assert_eq!(
        next_update(&mut updates).await,
        SessionUpdate::SignalReceived {
            appointment_id: "A1".to_string(),
            sender_id: "pat-1".to_string(),
            signal: json!({ "type": "offer", "sdp": "v=0" }),
        }
    );
    assert_eq!(sessions.state("A1").await, Some(CallState::Active));

    sessions
        .send_signal("A1", json!({ "type": "answer", "sdp": "v=0" }))
        .await
        .unwrap();
    assert_eq!(sessions.end("A1").await.unwrap(), CallState::Ended);
    assert_eq!(sessions.state("A1").await, None);

    let frames = SentFrames::on(&channel).count(3);
    assert_eq!(frames.events(), vec!["acceptCall", "signal", "endCall"]);
}

#[tokio::test(start_paused = true)]
async fn test_outgoing_call_rejected_by_callee() {
    let setup = TestSetupBuilder::new().build();
    let channel = setup.connected_as("doc-1").await;
    let sessions = setup.signaling_for("doc-1").await;
    let mut updates = sessions.subscribe();

    assert_eq!(
        sessions.initiate("A2", "pat-2", "doctor").await.unwrap(),
        CallState::Ringing
    );
    let frames = SentFrames::on(&channel).count(1);
    assert_eq!(frames.last().event, "initiateCall");
    assert_eq!(frames.last().payload["callerRole"], "doctor");
    assert_eq!(frames.last().payload["receiverId"], "pat-2");

    channel.push_event(&InboundEvent::CallRejected(CallRejectedPayload {
        appointment_id: "A2".to_string(),
        rejector_id: "pat-2".to_string(),
    }));

    assert_eq!(
        next_update(&mut updates).await,
        SessionUpdate::StateChanged {
            appointment_id: "A2".to_string(),
            state: CallState::Ended,
        }
    );
    assert_eq!(sessions.state("A2").await, None);
}

#[tokio::test(start_paused = true)]
async fn test_remote_hangup_ends_active_call() {
    let setup = TestSetupBuilder::new().build();
    let channel = setup.connected_as("doc-1").await;
    let sessions = setup.signaling_for("doc-1").await;
    let mut updates = sessions.subscribe();

    channel.push_event(&incoming_call("A3", "pat-3"));
    next_update(&mut updates).await;
    sessions.accept("A3").await.unwrap();

    channel.push_event(&InboundEvent::CallEnded(CallEndedPayload {
        appointment_id: "A3".to_string(),
        ender_id: "pat-3".to_string(),
    }));

    assert_eq!(
        next_update(&mut updates).await,
        SessionUpdate::StateChanged {
            appointment_id: "A3".to_string(),
            state: CallState::Ended,
        }
    );
    assert!(matches!(
        sessions.end("A3").await,
        Err(SignalingError::NoSession(_))
    ));
}

#[tokio::test(start_paused = true)]
async fn test_mute_flags_flow_both_ways() {
    let setup = TestSetupBuilder::new().build();
    let channel = setup.connected_as("doc-1").await;
    let sessions = setup.signaling_for("doc-1").await;
    let mut updates = sessions.subscribe();

    channel.push_event(&incoming_call("A4", "pat-4"));
    next_update(&mut updates).await;
    sessions.accept("A4").await.unwrap();

    sessions.set_muted("A4", true).await.unwrap();
    sessions.set_hand_raised("A4", true).await.unwrap();
    channel.push_event(&InboundEvent::MuteStatus(MuteStatusPayload {
        appointment_id: "A4".to_string(),
        user_id: "pat-4".to_string(),
        is_muted: true,
    }));
    next_update(&mut updates).await;

    let session = sessions.session("A4").await.unwrap();
    assert!(session.is_muted("doc-1"));
    assert!(session.is_muted("pat-4"));
    assert!(session.is_hand_raised("doc-1"));

    let frames = SentFrames::on(&channel).count(3);
    assert_eq!(
        frames.events(),
        vec!["acceptCall", "toggleMute", "toggleHandRaise"]
    );
    assert_eq!(frames.last().payload["isRaised"], true);
}

#[tokio::test(start_paused = true)]
async fn test_call_actions_need_an_identity() {
    let setup = TestSetupBuilder::new().build();
    let sessions = setup.signaling_for("doc-1").await;

    let result = sessions.initiate("A5", "pat-5", "doctor").await;

    assert!(matches!(
        result,
        Err(SignalingError::Emit(RealtimeError::Unauthenticated))
    ));
    assert_eq!(sessions.state("A5").await, None);
    assert_eq!(setup.transport.open_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_events_for_unknown_appointments_are_ignored() {
    let setup = TestSetupBuilder::new().build();
    let channel = setup.connected_as("doc-1").await;
    let sessions = setup.signaling_for("doc-1").await;
    let mut updates = sessions.subscribe();

    channel.push_event(&InboundEvent::CallEnded(CallEndedPayload {
        appointment_id: "nope".to_string(),
        ender_id: "pat-1".to_string(),
    }));
    channel.push_event(&incoming_call("A6", "pat-6"));

    // the ignored event produces no update, so the first one seen is the ring
    assert!(matches!(
        next_update(&mut updates).await,
        SessionUpdate::Ringing { .. }
    ));
    assert_eq!(sessions.active_count().await, 1);
}
