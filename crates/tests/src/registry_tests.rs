use bson::oid::ObjectId;
use huddle_api::ws::registry::ConnectionRegistry;

// Senders are plain strings here; the registry is generic over the
// sink type precisely so its bookkeeping can be tested without
// sockets.

#[test]
fn second_tab_joins_without_reannouncing() {
    let registry: ConnectionRegistry<String> = ConnectionRegistry::new();
    let user = ObjectId::new();
    let room = ObjectId::new();

    registry.add(user, "c1".to_string(), "tab-1".to_string());
    registry.add(user, "c2".to_string(), "tab-2".to_string());

    let first = registry.join_room("c1", room).unwrap();
    assert!(first.first_for_user);
    assert!(!first.rejoined);

    // Same user, second connection: present in the room, but not a
    // new participant.
    let second = registry.join_room("c2", room).unwrap();
    assert!(!second.first_for_user);
    assert!(!second.rejoined);

    // Same connection joining again is a rejoin.
    let again = registry.join_room("c1", room).unwrap();
    assert!(again.rejoined);

    assert_eq!(registry.room_user_count(&room), 1);
}

#[test]
fn only_last_connection_leaving_reports_last() {
    let registry: ConnectionRegistry<String> = ConnectionRegistry::new();
    let user = ObjectId::new();
    let room = ObjectId::new();

    registry.add(user, "c1".to_string(), "tab-1".to_string());
    registry.add(user, "c2".to_string(), "tab-2".to_string());
    registry.join_room("c1", room).unwrap();
    registry.join_room("c2", room).unwrap();

    let first_leave = registry.leave_room("c1", room);
    assert!(first_leave.was_joined);
    assert!(!first_leave.last_for_user);

    let second_leave = registry.leave_room("c2", room);
    assert!(second_leave.was_joined);
    assert!(second_leave.last_for_user);

    // A connection that never joined reports nothing to act on.
    registry.add(user, "c3".to_string(), "tab-3".to_string());
    let noop = registry.leave_room("c3", room);
    assert!(!noop.was_joined);
}

#[test]
fn dropping_a_connection_reports_which_rooms_lost_the_user() {
    let registry: ConnectionRegistry<String> = ConnectionRegistry::new();
    let alice = ObjectId::new();
    let bob = ObjectId::new();
    let shared = ObjectId::new();
    let solo = ObjectId::new();

    registry.add(alice, "a1".to_string(), "alice-1".to_string());
    registry.add(alice, "a2".to_string(), "alice-2".to_string());
    registry.add(bob, "b1".to_string(), "bob-1".to_string());

    registry.join_room("a1", shared).unwrap();
    registry.join_room("a2", shared).unwrap();
    registry.join_room("a1", solo).unwrap();
    registry.join_room("b1", shared).unwrap();

    let dropped = registry.drop_connection("a1").unwrap();
    assert_eq!(dropped.user_id, alice);

    let shared_last = dropped.rooms.iter().find(|(r, _)| *r == shared).unwrap().1;
    let solo_last = dropped.rooms.iter().find(|(r, _)| *r == solo).unwrap().1;
    // a2 still holds the shared room open for alice.
    assert!(!shared_last);
    assert!(solo_last);

    assert_eq!(registry.connection_count(), 2);
    assert!(registry.sender_of("a1").is_none());
}

#[test]
fn room_senders_can_exclude_the_origin() {
    let registry: ConnectionRegistry<String> = ConnectionRegistry::new();
    let alice = ObjectId::new();
    let bob = ObjectId::new();
    let room = ObjectId::new();

    registry.add(alice, "a1".to_string(), "alice".to_string());
    registry.add(bob, "b1".to_string(), "bob".to_string());
    registry.join_room("a1", room).unwrap();
    registry.join_room("b1", room).unwrap();

    let everyone = registry.room_senders(&room, None);
    assert_eq!(everyone.len(), 2);

    let others = registry.room_senders(&room, Some("a1"));
    assert_eq!(others, vec!["bob".to_string()]);
}

#[test]
fn targeted_delivery_sees_only_users_in_the_room() {
    let registry: ConnectionRegistry<String> = ConnectionRegistry::new();
    let alice = ObjectId::new();
    let bob = ObjectId::new();
    let video_room = ObjectId::new();
    let other_room = ObjectId::new();

    registry.add(alice, "a1".to_string(), "alice".to_string());
    registry.add(bob, "b1".to_string(), "bob".to_string());
    registry.join_room("a1", video_room).unwrap();
    registry.join_room("b1", other_room).unwrap();

    // Bob is connected and reachable through the identity index, but
    // is not a participant of the video room.
    assert!(registry.user_in_room(&video_room, &alice));
    assert!(!registry.user_in_room(&video_room, &bob));
    assert!(!registry.user_in_room(&other_room, &alice));

    // Leaving the room closes the gate even while connected.
    registry.leave_room("a1", video_room);
    assert!(!registry.user_in_room(&video_room, &alice));
}

#[test]
fn membership_gate_tracks_joins_per_connection() {
    let registry: ConnectionRegistry<String> = ConnectionRegistry::new();
    let user = ObjectId::new();
    let room = ObjectId::new();

    registry.add(user, "c1".to_string(), "tab".to_string());
    assert!(!registry.is_joined("c1", &room));

    registry.join_room("c1", room).unwrap();
    assert!(registry.is_joined("c1", &room));

    registry.leave_room("c1", room);
    assert!(!registry.is_joined("c1", &room));
}
