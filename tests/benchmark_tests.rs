//! Performance benchmarks for the game engine

use rand::rngs::StdRng;
use rand::SeedableRng;
use server::player::{Ack, Connection};
use server::registry::Registry;
use server::session::{Phase, Session};
use server::words::FixedWords;
use shared::{LinkKind, PlayerId, SubmittedLink};
use std::time::Instant;

/// Builds a lobby of `players` whose outbound channels are already closed,
/// so the benchmark measures the engine rather than queued packets.
fn lobby(players: usize) -> (Session, Vec<PlayerId>) {
    let words = FixedWords::new(["anchor", "bicycle", "cactus", "dragon"]);
    let mut session = Session::with_sources("bench", Box::new(words), StdRng::seed_from_u64(5));
    let ids = (0..players)
        .map(|i| {
            let (connection, _) = Connection::channel(i as u64 + 1);
            session.add_player(format!("p{}", i), connection).unwrap().id
        })
        .collect();
    (session, ids)
}

fn play_round(session: &mut Session, ids: &[PlayerId]) -> usize {
    let admin = ids[0];
    session.start_round(admin, Instant::now()).unwrap();

    let mut submissions = 0;
    while session.phase() == Phase::RoundInProgress {
        for &id in ids {
            let link = SubmittedLink::new(LinkKind::Drawing, "scribble");
            session
                .acknowledge(id, Ack::FinishedLink(link), Instant::now())
                .unwrap();
            submissions += 1;
        }
    }
    for &id in ids {
        session
            .acknowledge(id, Ack::DoneViewingResults, Instant::now())
            .unwrap();
    }
    assert_eq!(session.phase(), Phase::Lobby);
    submissions
}

/// Benchmarks a full round with a large table
#[test]
fn benchmark_large_round() {
    let players = 24;
    let (mut session, ids) = lobby(players);

    let start = Instant::now();
    let submissions = play_round(&mut session, &ids);
    let duration = start.elapsed();

    println!(
        "Round with {} players: {} links in {:?} ({:.2} μs/link)",
        players,
        submissions,
        duration,
        duration.as_micros() as f64 / submissions as f64
    );

    assert_eq!(submissions, players * players);
    // Should complete in under 2 seconds
    assert!(duration.as_millis() < 2000);
}

/// Benchmarks many short rounds in a row
#[test]
fn benchmark_repeated_rounds() {
    let rounds = 200;
    let (mut session, ids) = lobby(6);

    let start = Instant::now();
    for _ in 0..rounds {
        play_round(&mut session, &ids);
    }
    let duration = start.elapsed();

    println!(
        "{} rounds of 6 players in {:?} ({:.2} μs/round)",
        rounds,
        duration,
        duration.as_micros() as f64 / rounds as f64
    );

    assert!(session.round().is_none());
    // Should complete in under 2 seconds
    assert!(duration.as_millis() < 2000);
}

/// Benchmarks game code allocation as the code space fills up
#[test]
fn benchmark_code_generation() {
    let games = 20_000;
    let mut registry = Registry::with_rng(StdRng::seed_from_u64(17));

    let start = Instant::now();
    for _ in 0..games {
        registry.create_session(None);
    }
    let duration = start.elapsed();

    println!(
        "Created {} games in {:?} ({:.2} μs/game)",
        games,
        duration,
        duration.as_micros() as f64 / games as f64
    );

    assert_eq!(registry.len(), games);
    // Should complete in under 2 seconds
    assert!(duration.as_millis() < 2000);
}
