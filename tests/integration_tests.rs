//! Integration tests for the networked game components
//!
//! These tests run a real server on an ephemeral port and drive it with bot
//! clients and hand-written protocol exchanges.

use client::bot::{BotConfig, BotReport};
use client::network::{Client, ClientError};
use server::network::{Server, ServerConfig, ServerHandle};
use shared::framing::{read_packet, write_packet, MAX_FRAME_SIZE};
use shared::{LinkKind, Packet, PlayerInfo, SubmittedLink};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;
use tokio::time::{sleep, timeout};

const TEST_TIMEOUT: Duration = Duration::from_secs(10);

async fn start_server(config: ServerConfig) -> (SocketAddr, ServerHandle, JoinHandle<()>) {
    let mut server = Server::bind(ServerConfig { port: 0, ..config })
        .await
        .expect("Failed to bind server");
    let addr = server.local_addr();
    let handle = server.handle();
    let task = tokio::spawn(async move {
        if let Err(e) = server.run().await {
            eprintln!("Server stopped with error: {}", e);
        }
    });
    (addr, handle, task)
}

fn dev_config() -> ServerConfig {
    ServerConfig {
        dev_mode: true,
        ..ServerConfig::default()
    }
}

fn bot_config(addr: SocketAddr, name: &str) -> BotConfig {
    BotConfig {
        server: addr.to_string(),
        name: name.to_string(),
        code: Some("ffff".to_string()),
        ..BotConfig::default()
    }
}

async fn run_bot(config: BotConfig) -> Result<BotReport, ClientError> {
    Client::connect(config).await?.run().await
}

async fn finish(bot: JoinHandle<Result<BotReport, ClientError>>) -> BotReport {
    timeout(TEST_TIMEOUT, bot)
        .await
        .expect("bot did not finish in time")
        .expect("bot task panicked")
        .expect("bot failed")
}

async fn send(stream: &mut TcpStream, packet: Packet) {
    write_packet(stream, &packet).await.expect("write failed");
}

async fn recv(stream: &mut TcpStream) -> Packet {
    timeout(TEST_TIMEOUT, read_packet(stream))
        .await
        .expect("timed out waiting for a packet")
        .expect("read failed")
        .expect("connection closed")
}

/// Reads until `pick` accepts a packet, skipping everything else.
async fn recv_until<T>(stream: &mut TcpStream, mut pick: impl FnMut(Packet) -> Option<T>) -> T {
    loop {
        if let Some(found) = pick(recv(stream).await) {
            return found;
        }
    }
}

async fn join(stream: &mut TcpStream, code: &str, name: &str) -> PlayerInfo {
    send(
        stream,
        Packet::JoinGame {
            code: code.to_string(),
            name: name.to_string(),
        },
    )
    .await;
    recv_until(stream, |p| match p {
        Packet::Joined { you, .. } => Some(you),
        _ => None,
    })
    .await
}

/// FRAMING TESTS
mod protocol_tests {
    use super::*;

    /// Tests frames crossing a real TCP connection in order
    #[tokio::test]
    async fn framing_over_tcp() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let echo = tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            while let Ok(Some(packet)) = read_packet(&mut stream).await {
                write_packet(&mut stream, &packet).await.unwrap();
            }
        });

        let mut stream = TcpStream::connect(addr).await.unwrap();
        let packets = vec![
            Packet::StartRound,
            Packet::FinishedLink {
                link: SubmittedLink::new(LinkKind::Drawing, "x".repeat(100_000)),
            },
            Packet::DoneViewingResults,
        ];
        for packet in &packets {
            send(&mut stream, packet.clone()).await;
        }
        for packet in packets {
            assert_eq!(recv(&mut stream).await, packet);
        }

        drop(stream);
        echo.await.unwrap();
    }

    /// Tests that a garbage frame costs the sender its connection and nothing else
    #[tokio::test]
    async fn malformed_frame_closes_connection() {
        let (addr, handle, task) = start_server(dev_config()).await;

        let mut bad = TcpStream::connect(addr).await.unwrap();
        bad.write_all(&4u32.to_be_bytes()).await.unwrap();
        bad.write_all(&[0xff, 0xff, 0xff, 0xff]).await.unwrap();
        let result = timeout(TEST_TIMEOUT, read_packet(&mut bad)).await.unwrap();
        assert!(!matches!(result, Ok(Some(_))));

        let mut oversized = TcpStream::connect(addr).await.unwrap();
        oversized
            .write_all(&(MAX_FRAME_SIZE + 1).to_be_bytes())
            .await
            .unwrap();
        let result = timeout(TEST_TIMEOUT, read_packet(&mut oversized))
            .await
            .unwrap();
        assert!(!matches!(result, Ok(Some(_))));

        let mut good = TcpStream::connect(addr).await.unwrap();
        let you = join(&mut good, "ffff", "Fine").await;
        assert!(you.is_admin);

        handle.shutdown();
        task.await.unwrap();
    }
}

/// FULL GAME TESTS
mod game_tests {
    use super::*;

    /// Tests three bots playing a whole round through the server
    #[tokio::test]
    async fn three_bots_play_a_round() {
        let (addr, handle, task) = start_server(dev_config()).await;

        let bots: Vec<_> = ["Ann", "Ben", "Cat"]
            .iter()
            .map(|name| tokio::spawn(run_bot(bot_config(addr, name))))
            .collect();

        let mut ids = Vec::new();
        for bot in bots {
            let report = finish(bot).await;
            assert_eq!(report.rounds_played, 1);
            assert_eq!(report.chains_seen, 3);
            ids.push(report.player.expect("bot never joined").id);
        }
        ids.sort_unstable();
        assert_eq!(ids, vec![1, 2, 3]);

        handle.shutdown();
        task.await.unwrap();
    }

    /// Tests that the admin restarts the game for further rounds
    #[tokio::test]
    async fn bots_play_several_rounds() {
        let (addr, handle, task) = start_server(dev_config()).await;

        let bots: Vec<_> = ["Ann", "Ben", "Cat", "Dan"]
            .iter()
            .map(|name| {
                tokio::spawn(run_bot(BotConfig {
                    min_players: 4,
                    rounds: 2,
                    ..bot_config(addr, name)
                }))
            })
            .collect();

        for bot in bots {
            let report = finish(bot).await;
            assert_eq!(report.rounds_played, 2);
            assert_eq!(report.chains_seen, 8);
        }

        handle.shutdown();
        task.await.unwrap();
    }

    /// Tests a newcomer taking over a disconnected player's slot mid-round
    #[tokio::test]
    async fn replacement_finishes_abandoned_round() {
        let (addr, handle, task) = start_server(dev_config()).await;

        let mut quitter = TcpStream::connect(addr).await.unwrap();
        let quitter_info = join(&mut quitter, "ffff", "Quitter").await;
        assert!(quitter_info.is_admin);

        let stayers: Vec<_> = ["Ann", "Ben"]
            .iter()
            .map(|name| tokio::spawn(run_bot(bot_config(addr, name))))
            .collect();

        recv_until(&mut quitter, |p| match p {
            Packet::UpdatePlayerList { players } if players.len() == 3 => Some(()),
            _ => None,
        })
        .await;
        send(&mut quitter, Packet::StartRound).await;
        recv_until(&mut quitter, |p| match p {
            Packet::NextLink { .. } => Some(()),
            _ => None,
        })
        .await;
        drop(quitter);

        // Wait until the server has parked the quitter's slot.
        loop {
            let mut newcomer = TcpStream::connect(addr).await.unwrap();
            send(
                &mut newcomer,
                Packet::JoinGame {
                    code: "ffff".to_string(),
                    name: "Newcomer".to_string(),
                },
            )
            .await;
            match recv(&mut newcomer).await {
                Packet::ReplacementNeeded { disconnected, .. } if !disconnected.is_empty() => {
                    assert_eq!(disconnected[0].id, quitter_info.id);
                    break;
                }
                Packet::ReplacementNeeded { .. } => sleep(Duration::from_millis(20)).await,
                other => panic!("expected ReplacementNeeded, got {:?}", other),
            }
        }

        let substitute = tokio::spawn(run_bot(BotConfig {
            replace: true,
            ..bot_config(addr, "Sub")
        }));

        let report = finish(substitute).await;
        assert_eq!(report.player.unwrap().id, quitter_info.id);
        assert_eq!(report.rounds_played, 1);
        assert_eq!(report.chains_seen, 3);

        for bot in stayers {
            let report = finish(bot).await;
            assert_eq!(report.rounds_played, 1);
        }

        handle.shutdown();
        task.await.unwrap();
    }

    /// Tests that leaving mid-round closes the socket and parks the slot
    #[tokio::test]
    async fn leaving_mid_round_closes_connection() {
        let (addr, handle, task) = start_server(dev_config()).await;

        let mut admin = TcpStream::connect(addr).await.unwrap();
        join(&mut admin, "ffff", "Ann").await;
        let mut leaver = TcpStream::connect(addr).await.unwrap();
        let leaver_info = join(&mut leaver, "ffff", "Ben").await;
        let mut third = TcpStream::connect(addr).await.unwrap();
        join(&mut third, "ffff", "Cat").await;

        recv_until(&mut admin, |p| match p {
            Packet::UpdatePlayerList { players } if players.len() == 3 => Some(()),
            _ => None,
        })
        .await;
        send(&mut admin, Packet::StartRound).await;
        recv_until(&mut leaver, |p| match p {
            Packet::NextLink { .. } => Some(()),
            _ => None,
        })
        .await;

        send(&mut leaver, Packet::Leave).await;
        send(
            &mut admin,
            Packet::FinishedLink {
                link: SubmittedLink::new(LinkKind::Drawing, "sketch"),
            },
        )
        .await;

        // Whatever was queued before the leave may still arrive, then EOF.
        let closed = timeout(TEST_TIMEOUT, async {
            loop {
                match read_packet(&mut leaver).await {
                    Ok(Some(_)) => continue,
                    other => return other,
                }
            }
        })
        .await
        .expect("socket stayed open after leaving");
        assert!(matches!(closed, Ok(None) | Err(_)));

        let parked = recv_until(&mut third, |p| match p {
            Packet::UpdateWaitingList { disconnected, .. } if !disconnected.is_empty() => {
                Some(disconnected)
            }
            _ => None,
        })
        .await;
        assert_eq!(parked[0].id, leaver_info.id);

        handle.shutdown();
        task.await.unwrap();
    }

    /// Tests that a player sitting on a request is kicked and their slot parked
    #[tokio::test]
    async fn unresponsive_player_is_kicked() {
        let (addr, handle, task) = start_server(ServerConfig {
            request_timeout: Some(Duration::from_millis(300)),
            sweep_interval: Duration::from_millis(50),
            ..ServerConfig::default()
        })
        .await;

        let mut idler = TcpStream::connect(addr).await.unwrap();
        send(
            &mut idler,
            Packet::CreateGame {
                name: "Idler".to_string(),
            },
        )
        .await;
        let code = recv_until(&mut idler, |p| match p {
            Packet::Joined { code, .. } => Some(code),
            _ => None,
        })
        .await;

        let mut worker = TcpStream::connect(addr).await.unwrap();
        join(&mut worker, &code, "Worker").await;

        recv_until(&mut idler, |p| match p {
            Packet::UpdatePlayerList { players } if players.len() == 2 => Some(()),
            _ => None,
        })
        .await;
        send(&mut idler, Packet::StartRound).await;

        recv_until(&mut worker, |p| match p {
            Packet::NextLink { .. } => Some(()),
            _ => None,
        })
        .await;
        send(
            &mut worker,
            Packet::FinishedLink {
                link: SubmittedLink::new(LinkKind::Drawing, "sketch"),
            },
        )
        .await;

        recv_until(&mut idler, |p| match p {
            Packet::Kicked { .. } => Some(()),
            _ => None,
        })
        .await;
        let after_kick = timeout(TEST_TIMEOUT, read_packet(&mut idler)).await.unwrap();
        assert!(matches!(after_kick, Ok(None) | Err(_)));

        let parked = recv_until(&mut worker, |p| match p {
            Packet::UpdateWaitingList { disconnected, .. } if !disconnected.is_empty() => {
                Some(disconnected)
            }
            _ => None,
        })
        .await;
        assert_eq!(parked[0].name, "Idler");

        handle.shutdown();
        task.await.unwrap();
    }

    /// Tests that a bot gives up on a game that does not exist
    #[tokio::test]
    async fn joining_unknown_game_gives_up() {
        let (addr, handle, task) = start_server(ServerConfig::default()).await;

        let report = finish(tokio::spawn(run_bot(BotConfig {
            code: Some("zzzz".to_string()),
            ..bot_config(addr, "Lost")
        })))
        .await;
        assert!(report.player.is_none());
        assert_eq!(report.rounds_played, 0);

        handle.shutdown();
        task.await.unwrap();
    }
}
