//! End-to-end signaling over real WebSockets
//!
//! Drives the axum front end with two tungstenite clients through the
//! full flow: register, snapshot fan-out, call, answer, one candidate
//! each way, hang up, disconnect.

use std::net::SocketAddr;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use tokio::net::TcpListener;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};

use rtcall_relay_core::{AppState, app};
use rtcall_signal_core::{
    CandidateInit, ClientMessage, ConnectionId, ServerMessage, SessionDescription,
};

const RECV_TIMEOUT: Duration = Duration::from_secs(5);

struct TestClient {
    ws: WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>,
    id: ConnectionId,
}

impl TestClient {
    /// Connect and consume the `welcome` message.
    async fn connect(addr: SocketAddr) -> Self {
        let (mut ws, _) = connect_async(format!("ws://{addr}/ws")).await.expect("connect");
        let id = match recv(&mut ws).await {
            ServerMessage::Welcome { id } => id,
            other => panic!("expected welcome, got {other:?}"),
        };
        Self { ws, id }
    }

    async fn send(&mut self, message: ClientMessage) {
        let text = serde_json::to_string(&message).unwrap();
        self.ws.send(Message::Text(text)).await.expect("send");
    }

    async fn recv(&mut self) -> ServerMessage {
        recv(&mut self.ws).await
    }

    async fn expect_user_list(&mut self) -> Vec<String> {
        match self.recv().await {
            ServerMessage::UserList { users } => {
                users.into_iter().map(|user| user.name).collect()
            }
            other => panic!("expected user-list, got {other:?}"),
        }
    }
}

async fn recv(ws: &mut WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>) -> ServerMessage {
    loop {
        let message = timeout(RECV_TIMEOUT, ws.next())
            .await
            .expect("timed out waiting for server message")
            .expect("stream ended")
            .expect("stream error");
        match message {
            Message::Text(text) => return serde_json::from_str(&text).expect("decode"),
            Message::Ping(_) | Message::Pong(_) => continue,
            other => panic!("unexpected frame {other:?}"),
        }
    }
}

async fn spawn_server() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app(AppState::new())).await.unwrap();
    });
    addr
}

#[tokio::test]
async fn two_party_call_flow() {
    let addr = spawn_server().await;

    let mut alice = TestClient::connect(addr).await;
    let mut bob = TestClient::connect(addr).await;
    assert_ne!(alice.id, bob.id);

    // Registration fans a snapshot out to everyone, registrant included.
    alice.send(ClientMessage::RegisterUser { name: "Alice".into() }).await;
    assert_eq!(alice.expect_user_list().await, vec!["Alice"]);
    assert_eq!(bob.expect_user_list().await, vec!["Alice"]);

    bob.send(ClientMessage::RegisterUser { name: "Bob".into() }).await;
    assert_eq!(alice.expect_user_list().await, vec!["Alice", "Bob"]);
    assert_eq!(bob.expect_user_list().await, vec!["Alice", "Bob"]);

    // Call request reaches Bob with the relay-recorded caller identity.
    alice
        .send(ClientMessage::CallUser {
            to: bob.id.clone(),
            offer: SessionDescription::offer("v=0 alice"),
        })
        .await;
    match bob.recv().await {
        ServerMessage::CallMade { from, from_name, offer } => {
            assert_eq!(from, alice.id);
            assert_eq!(from_name, "Alice");
            assert_eq!(offer.sdp, "v=0 alice");
        }
        other => panic!("expected call-made, got {other:?}"),
    }

    bob.send(ClientMessage::MakeAnswer {
        to: alice.id.clone(),
        answer: SessionDescription::answer("v=0 bob"),
    })
    .await;
    match alice.recv().await {
        ServerMessage::AnswerMade { from, answer } => {
            assert_eq!(from, bob.id);
            assert_eq!(answer.sdp, "v=0 bob");
        }
        other => panic!("expected answer-made, got {other:?}"),
    }

    // One candidate each way.
    alice
        .send(ClientMessage::IceCandidate {
            to: bob.id.clone(),
            candidate: CandidateInit::new("candidate:alice"),
        })
        .await;
    match bob.recv().await {
        ServerMessage::IceCandidate { from, candidate } => {
            assert_eq!(from, alice.id);
            assert_eq!(candidate.candidate, "candidate:alice");
        }
        other => panic!("expected ice-candidate, got {other:?}"),
    }
    bob.send(ClientMessage::IceCandidate {
        to: alice.id.clone(),
        candidate: CandidateInit::new("candidate:bob"),
    })
    .await;
    match alice.recv().await {
        ServerMessage::IceCandidate { from, .. } => assert_eq!(from, bob.id),
        other => panic!("expected ice-candidate, got {other:?}"),
    }

    // Alice hangs up; Bob hears about it.
    alice.send(ClientMessage::CallEnded { to: bob.id.clone() }).await;
    match bob.recv().await {
        ServerMessage::CallEnded { from } => assert_eq!(from, alice.id),
        other => panic!("expected call-ended, got {other:?}"),
    }

    // Disconnect is an implicit remove: Bob sees a one-entry snapshot.
    drop(alice);
    assert_eq!(bob.expect_user_list().await, vec!["Bob"]);
}

#[tokio::test]
async fn envelope_to_unknown_target_is_dropped_without_breaking_the_stream() {
    let addr = spawn_server().await;

    let mut alice = TestClient::connect(addr).await;
    let mut bob = TestClient::connect(addr).await;

    alice.send(ClientMessage::RegisterUser { name: "Alice".into() }).await;
    alice.expect_user_list().await;
    bob.expect_user_list().await;
    bob.send(ClientMessage::RegisterUser { name: "Bob".into() }).await;
    alice.expect_user_list().await;
    bob.expect_user_list().await;

    // Nobody has this id; the relay drops it with no error to Alice.
    alice
        .send(ClientMessage::CallEnded { to: ConnectionId::from("no-such-party") })
        .await;

    // The connection still relays normally afterwards.
    alice.send(ClientMessage::CallEnded { to: bob.id.clone() }).await;
    match bob.recv().await {
        ServerMessage::CallEnded { from } => assert_eq!(from, alice.id),
        other => panic!("expected call-ended, got {other:?}"),
    }
}

#[tokio::test]
async fn signaling_before_registration_is_dropped() {
    let addr = spawn_server().await;

    let mut alice = TestClient::connect(addr).await;
    let mut bob = TestClient::connect(addr).await;

    bob.send(ClientMessage::RegisterUser { name: "Bob".into() }).await;
    alice.expect_user_list().await;
    bob.expect_user_list().await;

    // Alice never registered; her envelope must not reach Bob.
    alice.send(ClientMessage::CallEnded { to: bob.id.clone() }).await;

    alice.send(ClientMessage::RegisterUser { name: "Alice".into() }).await;
    assert_eq!(bob.expect_user_list().await, vec!["Bob", "Alice"]);
    alice.expect_user_list().await;

    alice.send(ClientMessage::CallEnded { to: bob.id.clone() }).await;
    match bob.recv().await {
        ServerMessage::CallEnded { from } => assert_eq!(from, alice.id),
        other => panic!("expected only the post-registration call-ended, got {other:?}"),
    }
}
