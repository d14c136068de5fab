//! Protocol handler tests over an in-memory link.

use alloc::vec::Vec;
use serde_json::json;

use super::framer::{encode, split_int_to_bytes};
use super::protocol::{ProtocolHandler, PumpSummary, RequestIds};
use super::{MessageType, SerialMessage};
use crate::deck::Deck;
use crate::dispatch::InputEvent;
use crate::error::LinkError;
use crate::mock::{FakeLink, FakePins};

type TestDeck = Deck;

struct Rig {
    handler: ProtocolHandler,
    link: FakeLink,
    deck: TestDeck,
    pins: FakePins,
    passthrough: heapless::Vec<u8, 8>,
}

impl Rig {
    fn new() -> Self {
        Self {
            handler: ProtocolHandler::new(),
            link: FakeLink::connected(),
            deck: TestDeck::empty(),
            pins: FakePins::default(),
            passthrough: heapless::Vec::new(),
        }
    }

    fn request(&mut self, kind: u8, id: u8, data: &[u8]) -> PumpSummary {
        self.link.feed(&encode(kind, id, data).unwrap());
        self.pump()
    }

    fn pump(&mut self) -> PumpSummary {
        self.handler.pump(
            &mut self.link,
            &mut self.deck,
            &mut self.pins,
            &mut self.passthrough,
        )
    }

    fn reply(&mut self) -> SerialMessage {
        let mut frames = self.link.take_frames();
        assert_eq!(frames.len(), 1, "expected exactly one reply");
        frames.remove(0)
    }
}

fn config_bytes() -> Vec<u8> {
    serde_json::to_vec(&json!({
        "components": [
            {"type": "button", "id": 2, "pin": 5},
            {"type": "led", "id": 4, "pin": 13},
        ],
        "profiles": [
            {"name": "main", "bindings": [{"id": 2, "action1": {"type": 3, "key": 4}}]}
        ]
    }))
    .unwrap()
}

// Request ids

#[test]
fn request_ids_skip_zero_on_wrap() {
    let mut ids = RequestIds::new();
    assert_eq!(ids.allocate(), 1);
    for _ in 2..=255 {
        ids.allocate();
    }
    assert_eq!(ids.allocate(), 1, "wraps past 255 without yielding 0");
    ids.allocate();
    ids.reset();
    assert_eq!(ids.allocate(), 1);
}

// Requests

#[test]
fn identify_reports_device_metadata() {
    let mut rig = Rig::new();
    rig.request(MessageType::RequestIdentify as u8, 3, &[]);

    let reply = rig.reply();
    assert_eq!(reply.kind, MessageType::RespondIdentify as u8);
    assert_eq!(reply.id, 3);
    let identity: serde_json::Value = serde_json::from_slice(&reply.data).unwrap();
    assert_eq!(identity["name"], "Macro Deck");
    assert_eq!(identity["configured"], false);
    assert_eq!(identity["profiles"], 1);
    assert_eq!(identity["components"]["buttons"], 0);
}

#[test]
fn request_config_without_config_is_empty() {
    let mut rig = Rig::new();
    rig.request(MessageType::RequestConfig as u8, 9, &[]);

    let reply = rig.reply();
    assert_eq!(reply.kind, MessageType::RespondEmpty as u8);
    assert_eq!(reply.id, 9);
    assert!(reply.data.is_empty());
}

#[test]
fn change_then_request_config_returns_document() {
    let mut rig = Rig::new();
    let doc = config_bytes();

    let summary = rig.request(MessageType::ChangeConfig as u8, 4, &doc);
    assert!(summary.config_changed);
    let ok = rig.reply();
    assert_eq!((ok.kind, ok.id), (MessageType::RespondOk as u8, 4));
    assert_eq!(rig.deck.hardware().counts().buttons, 1);

    rig.request(MessageType::RequestConfig as u8, 9, &[]);
    let reply = rig.reply();
    assert_eq!(reply.kind, MessageType::RespondConfig as u8);
    assert_eq!(reply.id, 9);
    assert_eq!(reply.data, doc);
}

#[test]
fn rejected_config_reports_error_and_keeps_old() {
    let mut rig = Rig::new();
    rig.request(MessageType::ChangeConfig as u8, 1, &config_bytes());
    rig.link.take_frames();

    let summary = rig.request(MessageType::ChangeConfig as u8, 2, br#"{"profiles": []}"#);
    assert!(!summary.config_changed);
    let reply = rig.reply();
    assert_eq!((reply.kind, reply.id), (MessageType::RespondError as u8, 2));
    assert_eq!(reply.data, b"config declares no profiles");
    assert_eq!(rig.deck.active_profile().name, "main");
}

#[test]
fn unknown_type_answers_error_with_request_id() {
    let mut rig = Rig::new();
    rig.request(200, 17, &[]);

    let reply = rig.reply();
    assert_eq!(reply.kind, MessageType::RespondError as u8);
    assert_eq!(reply.id, 17);
    assert_eq!(reply.data, b"unknown message type 200");
}

#[test]
fn responses_echo_request_id_zero() {
    let mut rig = Rig::new();
    rig.request(200, 0, &[]);
    let reply = rig.reply();
    assert_eq!((reply.kind, reply.id), (MessageType::RespondError as u8, 0));

    rig.request(MessageType::RequestConfig as u8, 0, &[]);
    let reply = rig.reply();
    assert_eq!((reply.kind, reply.id), (MessageType::RespondEmpty as u8, 0));

    let event = InputEvent::Button { id: 2, pressed: true };
    assert_eq!(rig.handler.notify_input(&mut rig.link, &event), Ok(1));
}

#[test]
fn reset_stops_pump_without_reply() {
    let mut rig = Rig::new();
    rig.link.feed(&encode(MessageType::RequestReset as u8, 1, &[]).unwrap());
    rig.link.feed(&encode(MessageType::RequestIdentify as u8, 2, &[]).unwrap());

    let summary = rig.pump();
    assert!(summary.reset_requested);
    assert_eq!(summary.frames, 1);
    assert!(rig.link.take_frames().is_empty());
}

#[test]
fn host_responses_are_ignored() {
    let mut rig = Rig::new();
    let summary = rig.request(MessageType::RespondOk as u8, 1, &[]);
    assert_eq!(summary.frames, 1);
    assert!(rig.link.take_frames().is_empty());
}

#[test]
fn ident_led_flashes_known_led() {
    let mut rig = Rig::new();
    rig.request(MessageType::ChangeConfig as u8, 1, &config_bytes());
    rig.link.take_frames();

    rig.request(MessageType::IdentLed as u8, 5, &split_int_to_bytes(4));
    assert_eq!(rig.reply().kind, MessageType::RespondOk as u8);
    assert!(rig.deck.dispatcher().is_identifying());

    rig.request(MessageType::IdentLed as u8, 6, &split_int_to_bytes(2));
    let reply = rig.reply();
    assert_eq!((reply.kind, reply.id), (MessageType::RespondError as u8, 6));

    rig.request(MessageType::IdentLed as u8, 7, &[1, 2]);
    assert_eq!(rig.reply().kind, MessageType::RespondError as u8);
}

#[test]
fn several_frames_in_one_pump() {
    let mut rig = Rig::new();
    rig.link.feed(&encode(0, 1, &[]).unwrap());
    rig.link.feed(&encode(2, 2, &[]).unwrap());
    let summary = rig.pump();
    assert_eq!(summary.frames, 2);
    let ids: Vec<u8> = rig.link.take_frames().iter().map(|m| m.id).collect();
    assert_eq!(ids, [1, 2]);
}

// Incidental bytes

#[test]
fn incidental_bytes_reach_passthrough() {
    let mut rig = Rig::new();
    rig.link.feed(b"log ");
    rig.request(MessageType::RequestConfig as u8, 1, &[]);
    assert_eq!(rig.passthrough.as_slice(), b"log ");
    assert_eq!(rig.reply().kind, MessageType::RespondEmpty as u8);
}

#[test]
fn full_passthrough_stops_draining() {
    let mut rig = Rig::new();
    rig.link.feed(b"0123456789");
    rig.pump();
    assert_eq!(rig.passthrough.len(), 8);
    assert_eq!(rig.link.rx.len(), 2, "remaining bytes wait for the next pump");

    rig.passthrough.clear();
    rig.pump();
    assert_eq!(rig.passthrough.as_slice(), b"89");
}

#[test]
fn frames_still_decode_when_passthrough_full() {
    let mut rig = Rig::new();
    rig.link.feed(b"01234567");
    let summary = rig.request(MessageType::RequestConfig as u8, 3, &[]);
    assert_eq!(summary.frames, 1);
    assert_eq!(rig.reply().id, 3);
}

#[test]
fn malformed_header_counts_error_and_resyncs() {
    let mut rig = Rig::new();
    rig.link.feed(&[0xFF, 2, 1, 0xFF, 0xFF, 0xFF, 0xFF]);
    rig.link.feed(&encode(2, 8, &[]).unwrap());
    let summary = rig.pump();
    assert_eq!(summary.errors, 1);
    assert_eq!(summary.frames, 1);
    assert_eq!(rig.reply().id, 8);
}

// Link state and sending

#[test]
fn disconnected_link_is_not_read_or_written() {
    let mut rig = Rig::new();
    rig.link.connected = false;
    rig.link.feed(&encode(0, 1, &[]).unwrap());
    assert_eq!(rig.pump(), PumpSummary::default());
    assert!(!rig.link.rx.is_empty());

    let sent = rig
        .handler
        .send(&mut rig.link, MessageType::RespondOk, 1, &[]);
    assert_eq!(sent, Err(LinkError::NotConnected.into()));
}

#[test]
fn auto_ids_start_at_one_and_reset_on_reconnect() {
    let mut rig = Rig::new();
    rig.pump();
    let event = InputEvent::Button { id: 2, pressed: true };
    assert_eq!(rig.handler.notify_input(&mut rig.link, &event), Ok(1));
    assert_eq!(rig.handler.notify_input(&mut rig.link, &event), Ok(2));
    assert_eq!(
        rig.handler.send(&mut rig.link, MessageType::RespondOk, 40, &[]),
        Ok(())
    );
    assert_eq!(
        rig.handler.send_auto(&mut rig.link, MessageType::IdentButton, &[]),
        Ok(3),
        "explicit ids do not consume the counter"
    );

    rig.link.connected = false;
    rig.pump();
    rig.link.connected = true;
    rig.pump();
    assert!(rig.handler.is_connected());
    assert_eq!(rig.handler.notify_input(&mut rig.link, &event), Ok(1));
}

#[test]
fn input_notifications_payloads() {
    let mut rig = Rig::new();
    rig.handler
        .notify_input(&mut rig.link, &InputEvent::Button { id: 2, pressed: false })
        .unwrap();
    rig.handler
        .notify_input(&mut rig.link, &InputEvent::Encoder { id: 3, delta: -4 })
        .unwrap();

    let frames = rig.link.take_frames();
    assert_eq!(frames[0].kind, MessageType::IdentButton as u8);
    assert_eq!(frames[0].data, [0, 0, 0, 2, 0]);
    assert_eq!(frames[1].kind, MessageType::IdentEncoder as u8);
    assert_eq!(frames[1].data, [0, 0, 0, 3, 0xFF, 0xFF, 0xFF, 0xFC]);
    assert_ne!(frames[0].id, 0);
}

#[test]
fn transmit_overflow_is_reported() {
    let mut rig = Rig::new();
    rig.link.tx_limit = 4;
    let event = InputEvent::Encoder { id: 1, delta: 5 };
    assert_eq!(
        rig.handler.notify_input(&mut rig.link, &event),
        Err(LinkError::Overflow.into())
    );
}
