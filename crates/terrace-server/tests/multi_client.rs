#[allow(dead_code)]
mod common;

use terrace_core::message::ChatMessage;
use terrace_core::net::messages::ServerEvent;

use common::{TestServer, ws_connect, ws_join, ws_login, ws_read, ws_send_message, ws_try_read};

async fn read_message(stream: &mut common::WsStream) -> ChatMessage {
    match ws_read(stream).await {
        ServerEvent::MessageReceived(m) => m.message,
        other => panic!("Expected MessageReceived, got: {other:?}"),
    }
}

/// Join a room and drain the join status, leaving the stream quiet.
async fn join_quietly(stream: &mut common::WsStream, room_id: &str) {
    match ws_join(stream, room_id).await {
        ServerEvent::Status(_) => {},
        other => panic!("Expected join status, got: {other:?}"),
    }
}

#[tokio::test]
async fn goal_reaches_every_member_exactly_once() {
    let server = TestServer::new().await;

    let mut alice = ws_connect(&server.ws_url()).await;
    ws_login(&mut alice, 1, "Alice").await;
    join_quietly(&mut alice, "liverpool-fans").await;

    let mut bob = ws_connect(&server.ws_url()).await;
    ws_login(&mut bob, 2, "Bob").await;
    join_quietly(&mut bob, "liverpool-fans").await;
    let _ = ws_read(&mut alice).await; // Bob's join status

    // An earlier message establishes the room's current sequence
    ws_send_message(&mut alice, "kickoff").await;
    let first_alice = read_message(&mut alice).await;
    let first_bob = read_message(&mut bob).await;
    assert_eq!(first_alice.sequence, first_bob.sequence);

    ws_send_message(&mut alice, "GOAL!!").await;
    let goal_bob = read_message(&mut bob).await;
    assert_eq!(goal_bob.body, "GOAL!!");
    assert_eq!(goal_bob.display_name, "Alice");
    assert_eq!(goal_bob.user_id, 1);
    assert_eq!(goal_bob.sequence, first_bob.sequence + 1);

    // The sender observes the same ordered copy
    let goal_alice = read_message(&mut alice).await;
    assert_eq!(goal_alice.sequence, goal_bob.sequence);
    assert_eq!(goal_alice.id, goal_bob.id);

    // Exactly one delivery per member
    assert!(ws_try_read(&mut bob, 200).await.is_none());
}

#[tokio::test]
async fn messages_arrive_in_append_order() {
    let server = TestServer::new().await;

    let mut alice = ws_connect(&server.ws_url()).await;
    ws_login(&mut alice, 1, "Alice").await;
    join_quietly(&mut alice, "liverpool-fans").await;

    let mut bob = ws_connect(&server.ws_url()).await;
    ws_login(&mut bob, 2, "Bob").await;
    join_quietly(&mut bob, "liverpool-fans").await;
    let _ = ws_read(&mut alice).await; // Bob's join status

    for body in ["one", "two", "three"] {
        ws_send_message(&mut alice, body).await;
    }

    let mut previous = 0;
    for expected in ["one", "two", "three"] {
        let a = read_message(&mut alice).await;
        let b = read_message(&mut bob).await;
        assert_eq!(a.body, expected);
        assert_eq!(b.body, expected);
        assert_eq!(a.sequence, b.sequence);
        assert!(a.sequence > previous);
        previous = a.sequence;
    }
}

#[tokio::test]
async fn interleaved_senders_agree_on_one_order() {
    let server = TestServer::new().await;

    let mut alice = ws_connect(&server.ws_url()).await;
    ws_login(&mut alice, 1, "Alice").await;
    join_quietly(&mut alice, "liverpool-fans").await;

    let mut bob = ws_connect(&server.ws_url()).await;
    ws_login(&mut bob, 2, "Bob").await;
    join_quietly(&mut bob, "liverpool-fans").await;
    let _ = ws_read(&mut alice).await; // Bob's join status

    ws_send_message(&mut alice, "was that in?").await;
    ws_send_message(&mut bob, "VAR check").await;
    ws_send_message(&mut alice, "it's given!").await;

    let alice_view: Vec<(u64, String)> = {
        let mut v = Vec::new();
        for _ in 0..3 {
            let m = read_message(&mut alice).await;
            v.push((m.sequence, m.body));
        }
        v
    };
    let bob_view: Vec<(u64, String)> = {
        let mut v = Vec::new();
        for _ in 0..3 {
            let m = read_message(&mut bob).await;
            v.push((m.sequence, m.body));
        }
        v
    };

    // Every member observes the same totally ordered stream
    assert_eq!(alice_view, bob_view);
    let sequences: Vec<u64> = alice_view.iter().map(|(s, _)| *s).collect();
    let mut sorted = sequences.clone();
    sorted.sort_unstable();
    assert_eq!(sequences, sorted, "delivery order must match sequence order");
}

#[tokio::test]
async fn no_delivery_after_leave() {
    let server = TestServer::new().await;

    let mut alice = ws_connect(&server.ws_url()).await;
    ws_login(&mut alice, 1, "Alice").await;
    join_quietly(&mut alice, "liverpool-fans").await;

    let mut bob = ws_connect(&server.ws_url()).await;
    ws_login(&mut bob, 2, "Bob").await;
    join_quietly(&mut bob, "liverpool-fans").await;
    let _ = ws_read(&mut alice).await; // Bob's join status

    // Bob leaves; Alice is told
    match common::ws_leave(&mut bob, "liverpool-fans").await {
        ServerEvent::Status(s) => assert!(s.text.contains("Bob left")),
        other => panic!("Expected leave status, got: {other:?}"),
    }
    match ws_read(&mut alice).await {
        ServerEvent::Status(s) => assert!(s.text.contains("Bob left")),
        other => panic!("Expected leave status, got: {other:?}"),
    }

    ws_send_message(&mut alice, "anyone?").await;
    let echo = read_message(&mut alice).await;
    assert_eq!(echo.body, "anyone?");
    assert!(ws_try_read(&mut bob, 200).await.is_none());
}

#[tokio::test]
async fn disconnect_cleans_up_membership() {
    let server = TestServer::new().await;

    let mut alice = ws_connect(&server.ws_url()).await;
    ws_login(&mut alice, 1, "Alice").await;
    join_quietly(&mut alice, "liverpool-fans").await;

    let mut bob = ws_connect(&server.ws_url()).await;
    ws_login(&mut bob, 2, "Bob").await;
    join_quietly(&mut bob, "liverpool-fans").await;
    let _ = ws_read(&mut alice).await; // Bob's join status

    drop(bob);

    // Alice hears the departure once the server processes the disconnect
    match ws_read(&mut alice).await {
        ServerEvent::Status(s) => assert!(s.text.contains("Bob left liverpool-fans")),
        other => panic!("Expected departure status, got: {other:?}"),
    }

    // Fan-out continues for the remaining member
    ws_send_message(&mut alice, "still here").await;
    let echo = read_message(&mut alice).await;
    assert_eq!(echo.body, "still here");
}

#[tokio::test]
async fn rooms_are_isolated() {
    let server = TestServer::new().await;

    let mut kopite = ws_connect(&server.ws_url()).await;
    ws_login(&mut kopite, 1, "Alice").await;
    join_quietly(&mut kopite, "liverpool-fans").await;

    let mut gunner = ws_connect(&server.ws_url()).await;
    ws_login(&mut gunner, 9, "Gunner").await;
    join_quietly(&mut gunner, "arsenal-fans").await;

    ws_send_message(&mut kopite, "GOAL!!").await;
    let echo = read_message(&mut kopite).await;
    assert_eq!(echo.body, "GOAL!!");

    assert!(ws_try_read(&mut gunner, 200).await.is_none());
}
