use bson::oid::ObjectId;
use huddle_services::video::build_ice_servers;

use crate::fixtures::engine::{TestEngine, identity, turn_settings};

#[tokio::test]
async fn bootstrap_creates_one_session_per_room() {
    let engine = TestEngine::new();
    let room_id = ObjectId::new();
    let host = identity("host");
    let guest = identity("guest");

    let first = engine.video.bootstrap(&room_id, &host).await.unwrap();
    let second = engine.video.bootstrap(&room_id, &guest).await.unwrap();

    // Second caller gets the existing session; the meeting outlives
    // who asked first.
    assert_eq!(first.session.meeting_code, second.session.meeting_code);
    assert_eq!(first.session.id, second.session.id);
    assert_eq!(first.session.created_by, host.user_id);

    assert_eq!(first.session.max_participants, 16);
    assert!(
        first
            .session
            .join_url
            .starts_with("https://huddle.test/join/")
    );
    assert!(first.session.join_url.ends_with(&first.session.meeting_code));
}

#[tokio::test]
async fn bootstrap_includes_a_join_qr() {
    let engine = TestEngine::new();
    let room_id = ObjectId::new();
    let host = identity("host");

    let bootstrap = engine.video.bootstrap(&room_id, &host).await.unwrap();
    assert!(bootstrap.qr_svg.contains("<svg"));
}

#[test]
fn ice_servers_carry_ephemeral_turn_credentials() {
    let turn = turn_settings();
    let user_id = ObjectId::new();

    let servers = build_ice_servers(&turn, &user_id);
    assert_eq!(servers.len(), 1);

    let urls = servers[0]["urls"].as_array().unwrap();
    let urls: Vec<&str> = urls.iter().map(|u| u.as_str().unwrap()).collect();
    assert!(urls.contains(&"turn:turn.huddle.test:3478"));
    assert!(urls.contains(&"turn:turn.huddle.test:3478?transport=tcp"));
    assert!(urls.contains(&"turns:turn.huddle.test:5349?transport=tcp"));

    // coturn REST scheme: username is "expiry:user", credential is an
    // HMAC over it, not the static password.
    let username = servers[0]["username"].as_str().unwrap();
    let (expiry, user) = username.split_once(':').unwrap();
    assert!(expiry.parse::<u64>().is_ok());
    assert_eq!(user, user_id.to_hex());
    assert_ne!(servers[0]["credential"].as_str().unwrap(), "static-pass");
}

#[test]
fn ice_servers_fall_back_to_static_credentials() {
    let mut turn = turn_settings();
    turn.shared_secret = None;

    let servers = build_ice_servers(&turn, &ObjectId::new());
    assert_eq!(servers[0]["username"], "static-user");
    assert_eq!(servers[0]["credential"], "static-pass");
}

#[test]
fn no_turn_configured_means_no_ice_servers() {
    let mut turn = turn_settings();
    turn.url = None;

    assert!(build_ice_servers(&turn, &ObjectId::new()).is_empty());
}
