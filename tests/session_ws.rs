use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use futures::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};
use tower::ServiceExt;
use uuid::Uuid;

use flappy_arena::app::AppState;
use flappy_arena::config::ServerConfig;
use flappy_arena::http::build_router;
use flappy_arena::ws::protocol::{ClientMsg, ServerMsg};

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

fn config() -> ServerConfig {
    ServerConfig::from_lookup(|key| match key {
        "SERVER_ADDR" => Some("127.0.0.1:0".to_string()),
        _ => None,
    })
    .unwrap()
}

async fn boot() -> String {
    let (state, coordinator) = AppState::new(config());
    tokio::spawn(coordinator.run());

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, build_router(state)).await.unwrap();
    });
    format!("ws://{}/ws", addr)
}

struct Player {
    id: Uuid,
    socket: Socket,
}

impl Player {
    async fn connect(url: &str) -> Self {
        let (mut socket, _) = connect_async(url).await.unwrap();
        let id = match recv(&mut socket).await {
            Some(ServerMsg::Welcome { id, .. }) => id,
            other => panic!("expected welcome, got {other:?}"),
        };
        Self { id, socket }
    }

    async fn send(&mut self, msg: ClientMsg) {
        let json = serde_json::to_string(&msg).unwrap();
        self.socket.send(Message::Text(json)).await.unwrap();
    }

    /// Everything received until the line goes quiet for a moment
    async fn drain(&mut self) -> Vec<ServerMsg> {
        let mut out = Vec::new();
        while let Some(msg) = recv(&mut self.socket).await {
            out.push(msg);
        }
        out
    }
}

async fn recv(socket: &mut Socket) -> Option<ServerMsg> {
    loop {
        let frame = tokio::time::timeout(Duration::from_millis(300), socket.next())
            .await
            .ok()??
            .ok()?;
        if let Message::Text(text) = frame {
            return Some(serde_json::from_str(&text).unwrap());
        }
    }
}

fn count_starts(msgs: &[ServerMsg]) -> usize {
    msgs.iter().filter(|m| matches!(m, ServerMsg::GameStart)).count()
}

async fn lobby_of_three(url: &str) -> Vec<Player> {
    let mut players = Vec::new();
    for name in ["A", "B", "C"] {
        let mut player = Player::connect(url).await;
        player
            .send(ClientMsg::JoinGame {
                name: name.to_string(),
            })
            .await;
        players.push(player);
    }
    for player in &mut players {
        player.drain().await;
    }
    players
}

#[tokio::test]
async fn three_readies_start_the_session_once() {
    let url = boot().await;
    let mut players = lobby_of_three(&url).await;

    for player in &mut players {
        player.send(ClientMsg::PlayerReady).await;
    }

    for player in &mut players {
        let msgs = player.drain().await;
        assert_eq!(count_starts(&msgs), 1, "{msgs:?}");

        let Some(ServerMsg::Players { players: last }) = msgs
            .iter()
            .rev()
            .find(|m| matches!(m, ServerMsg::Players { .. }))
        else {
            panic!("no players snapshot in {msgs:?}");
        };
        assert_eq!(last.len(), 3);
        assert!(last.iter().all(|p| p.ready));
    }
}

#[tokio::test]
async fn session_ends_once_everyone_is_finished() {
    let url = boot().await;
    let mut players = lobby_of_three(&url).await;
    for player in &mut players {
        player.send(ClientMsg::PlayerReady).await;
    }
    players[0].drain().await;

    for (score, player) in players.iter_mut().enumerate() {
        player
            .send(ClientMsg::UpdateScore {
                score: score as u32 * 4,
            })
            .await;
        player.send(ClientMsg::GameOver).await;
    }

    let msgs = players[0].drain().await;
    let ends: Vec<_> = msgs
        .iter()
        .filter_map(|m| match m {
            ServerMsg::GameEnd { players } => Some(players),
            _ => None,
        })
        .collect();
    assert_eq!(ends.len(), 1, "{msgs:?}");
    assert!(ends[0].iter().all(|p| p.finished));
    let best = ends[0].iter().max_by_key(|p| p.score).unwrap();
    assert_eq!(best.name, "C");
    assert_eq!(best.score, 8);

    // Ready flags are cleared for the next cycle
    let Some(ServerMsg::Players { players: after }) = msgs.last() else {
        panic!("expected a players snapshot last, got {msgs:?}");
    };
    assert!(after.iter().all(|p| !p.ready));
}

#[tokio::test]
async fn disconnect_is_an_implicit_leave() {
    let url = boot().await;
    let mut players = lobby_of_three(&url).await;

    let gone = players.remove(1);
    let gone_id = gone.id;
    drop(gone);

    let msgs = players[0].drain().await;
    let Some(ServerMsg::Players { players: remaining }) = msgs.last() else {
        panic!("expected a players snapshot, got {msgs:?}");
    };
    assert_eq!(remaining.len(), 2);
    assert!(remaining.iter().all(|p| p.id != gone_id));
}

#[tokio::test]
async fn blank_names_are_ignored() {
    let url = boot().await;
    let mut player = Player::connect(&url).await;
    player
        .send(ClientMsg::JoinGame {
            name: "  ".to_string(),
        })
        .await;
    assert!(player.drain().await.is_empty());
}

#[tokio::test]
async fn health_and_session_endpoints_respond() {
    let (state, coordinator) = AppState::new(config());
    tokio::spawn(coordinator.run());
    let router = build_router(state);

    let response = router
        .clone()
        .oneshot(Request::get("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let health: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(health["status"], "ok");
    assert_eq!(health["participants"], 0);
    assert_eq!(health["started"], false);

    let response = router
        .clone()
        .oneshot(Request::get("/session").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = router
        .oneshot(Request::get("/nowhere").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
