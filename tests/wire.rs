//! Server frames as they arrive on the socket, decoded all the way to
//! session state.

use tokenbag::bag::Bag;
use tokenbag::config::Config;
use tokenbag::net::{send_all, RecordingOutbox};
use tokenbag::protocol::frame::{self, Frame};
use tokenbag::protocol::{ServerEvent, TokenKind};
use tokenbag::session::{Action, Session};

fn event(text: &str) -> ServerEvent {
    match frame::decode(text).unwrap() {
        Frame::Event { name, data } => ServerEvent::decode(&name, data).unwrap(),
        other => panic!("not an event frame: {:?}", other),
    }
}

const ROOM_JOINED: &str = r#"42["room_joined",{"room_id":"ab12cd34","player_name":"Mira","room_data":{"players":["Tom","Mira"],"bag":{"successi":4,"complicazioni":2},"history":[{"player":"Tom","drawn":["successo","complicazione"],"successi":1,"complicazioni":1,"timestamp":"2024-05-01T20:10:00.000001","adrenaline":false,"confusion":false}]}}]"#;

#[test]
fn test_room_joined_snapshot() {
    match event(ROOM_JOINED) {
        ServerEvent::RoomJoined { room_id, room, .. } => {
            assert_eq!(room_id, "ab12cd34");
            assert_eq!(room.players, vec!["Tom".to_string(), "Mira".to_string()]);
            assert_eq!(room.bag, Bag::new(4, 2));
            assert_eq!(room.history[0].drawn, vec![TokenKind::Success, TokenKind::Complication]);
            assert_eq!(room.history[0].time_label(), "20:10:00");
        }
        other => panic!("unexpected {:?}", other),
    }
}

#[test]
fn test_risk_all_result_totals() {
    let ev = event(
        r#"42["risk_all_result",{"player":"Mira","drawn":["successo","successo","complicazione"],"successi":2,"complicazioni":1,"total_successi":3,"total_complicazioni":2,"bag_remaining":{"successi":1,"complicazioni":0},"history":{"player":"Mira","drawn":["successo","successo","complicazione"],"successi":2,"complicazioni":1,"timestamp":"2024-05-01T20:11:00","risk_all":true,"total_successi":3,"total_complicazioni":2}}]"#,
    );
    match ev {
        ServerEvent::RiskAllResult(o) => {
            assert_eq!((o.total_success, o.total_complication), (3, 2));
            assert_eq!(o.bag_remaining, Bag::new(1, 0));
            assert!(o.history.risk_all);
            assert_eq!(o.history.total_success, Some(3));
        }
        other => panic!("unexpected {:?}", other),
    }
}

#[test]
fn test_status_weather_and_errors() {
    assert_eq!(
        event(r#"42["adrenaline_updated",{"player":"Tom","adrenaline":3}]"#),
        ServerEvent::AdrenalineUpdated { player: "Tom".into(), value: 3 }
    );
    assert_eq!(
        event(r#"42["confusion_updated",{"player":"Tom","confusion":-1}]"#),
        ServerEvent::ConfusionUpdated { player: "Tom".into(), value: -1 }
    );
    match event(r#"42["weather_generated",{"stagione":"inverno","zona":"montagna","meteo":"Bufera di neve","player":"Mira"}]"#) {
        ServerEvent::WeatherGenerated(w) => {
            assert_eq!(w.season, "inverno");
            assert_eq!(w.weather, "Bufera di neve");
        }
        other => panic!("unexpected {:?}", other),
    }
    assert_eq!(
        event(r#"42["error",{"message":"Stanza non trovata"}]"#),
        ServerEvent::Error { message: "Stanza non trovata".into() }
    );
    assert_eq!(event(r#"42["something_new",{}]"#), ServerEvent::Unknown { name: "something_new".into() });
}

#[test]
fn test_characters_loaded_master_view() {
    let ev = event(
        r#"42["characters_loaded",{"characters":{"Tom":{"name":"Brann","archetype":"Smith","traits":[],"misfortunes":null},"Mira":{"name":"Aria"}},"is_master":true}]"#,
    );
    match ev {
        ServerEvent::CharactersLoaded { characters, is_master } => {
            assert!(is_master);
            assert_eq!(characters["Tom"].archetype, "Smith");
            assert!(characters["Tom"].misfortunes.is_empty());
            assert_eq!(characters["Mira"].name, "Aria");
        }
        other => panic!("unexpected {:?}", other),
    }
}

#[tokio::test]
async fn test_frames_drive_a_session() {
    let mut s = Session::new("Mira", Config::default());
    let outbox = RecordingOutbox::new();

    let out = s.apply(Action::JoinRoom("ab12cd34".into()), 0).unwrap();
    send_all(&outbox, &out).await.unwrap();
    s.on_server_event(event(ROOM_JOINED), 10);
    assert_eq!(s.room().unwrap().history().len(), 1);
    assert_eq!(s.room().unwrap().bag(), Bag::new(4, 2));

    s.on_server_event(event(r#"42["player_joined",{"player_name":"Lia","players":["Tom","Mira","Lia"]}]"#), 20);
    assert_eq!(s.room().unwrap().board().players().len(), 3);

    let out = s.apply(Action::ConfigureBag { success: 5, complication: 3 }, 30).unwrap();
    send_all(&outbox, &out).await.unwrap();
    s.on_server_event(event(r#"42["bag_configured",{"successi":5,"complicazioni":3}]"#), 40);

    let out = s.apply(Action::AddHelp, 50).unwrap();
    send_all(&outbox, &out).await.unwrap();
    s.on_server_event(event(r#"42["help_added",{"helper":"Mira","bag":{"successi":6,"complicazioni":3}}]"#), 60);
    assert_eq!(s.room().unwrap().bag(), Bag::new(6, 3));
    assert!(!s.room().unwrap().help_available());

    s.on_server_event(event(r#"42["bag_reset",{}]"#), 70);
    assert_eq!(s.room().unwrap().bag(), Bag::default());

    let sent = outbox.sent();
    let names: Vec<&str> = sent.iter().map(|e| e.name).collect();
    assert_eq!(names, vec!["join_room", "configure_bag", "add_help"]);
    assert!(sent[1].encode().starts_with(r#"42["configure_bag",{"#));
}
