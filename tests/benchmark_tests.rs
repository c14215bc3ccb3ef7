//! Performance benchmarks for critical server paths

use server::client_manager::ConnectionHandle;
use server::game::{check_winner, Game, TicTacToe};
use server::registry::{Matchmade, SessionRegistry};
use server::SessionPolicy;
use shared::{decode, encode, BoardView, Cell, Outcome, Role, ServerMessage};
use std::time::Instant;

/// Benchmarks win detection over a mixed set of boards
#[test]
fn benchmark_win_detection() {
    let boards = [
        [Cell::Empty; 9],
        [
            Cell::First, Cell::First, Cell::First,
            Cell::Second, Cell::Second, Cell::Empty,
            Cell::Empty, Cell::Empty, Cell::Empty,
        ],
        [
            Cell::First, Cell::Second, Cell::First,
            Cell::First, Cell::Second, Cell::Second,
            Cell::Second, Cell::First, Cell::First,
        ],
    ];

    let iterations = 100_000;
    let start = Instant::now();

    let mut wins = 0;
    for i in 0..iterations {
        if check_winner(&boards[i % boards.len()]).is_some() {
            wins += 1;
        }
    }

    let duration = start.elapsed();
    println!(
        "Win detection: {} iterations in {:?} ({:.2} ns/iter)",
        iterations,
        duration,
        duration.as_nanos() as f64 / iterations as f64
    );

    assert_eq!(wins, (iterations + 1) / 3);
    // Should complete in under 100ms for 100k iterations
    assert!(duration.as_millis() < 100);
}

/// Benchmarks complete games through the game trait
#[test]
fn benchmark_full_games() {
    let moves = [4, 0, 8, 2, 1, 7, 6, 3, 5];
    let iterations = 10_000;
    let start = Instant::now();

    for _ in 0..iterations {
        let mut game = TicTacToe::new();
        for (turn, position) in moves.iter().enumerate() {
            let role = if turn % 2 == 0 { Role::First } else { Role::Second };
            game.apply_move(role, *position).unwrap();
        }
        assert_eq!(game.outcome(), Outcome::Draw);
    }

    let duration = start.elapsed();
    println!(
        "Full games: {} iterations in {:?} ({:.2} μs/iter)",
        iterations,
        duration,
        duration.as_micros() as f64 / iterations as f64
    );

    // Should complete in under 1 second
    assert!(duration.as_millis() < 1000);
}

/// Benchmarks encoding and decoding of the largest broadcast message
#[test]
fn benchmark_snapshot_codec() {
    let message = ServerMessage::MoveApplied {
        role: Role::First,
        position: 4,
        board: BoardView {
            size: 3,
            cells: vec![Cell::First; 9],
            turn: Role::Second,
            outcome: Outcome::FirstWins,
        },
    };

    let iterations = 50_000;
    let start = Instant::now();

    for _ in 0..iterations {
        let bytes = encode(&message).unwrap();
        let decoded: ServerMessage = decode(&bytes).unwrap();
        assert!(matches!(decoded, ServerMessage::MoveApplied { .. }));
    }

    let duration = start.elapsed();
    println!(
        "Snapshot codec: {} iterations in {:?} ({:.2} μs/iter)",
        iterations,
        duration,
        duration.as_micros() as f64 / iterations as f64
    );

    assert!(duration.as_millis() < 1000);
}

/// Benchmarks named session creation and joining
#[tokio::test]
async fn benchmark_session_pairing() {
    let registry = SessionRegistry::new(SessionPolicy::default());
    let mut receivers = Vec::new();

    let pairs = 2_000;
    let start = Instant::now();

    for i in 0..pairs {
        let name = format!("game-{}", i);
        let (alice, alice_rx) = ConnectionHandle::new(i * 2 + 1);
        let (bob, bob_rx) = ConnectionHandle::new(i * 2 + 2);
        receivers.push((alice_rx, bob_rx));

        registry.create_session(&name, "alice", None, alice).await.unwrap();
        registry.join_session(&name, "bob", None, bob).await.unwrap();
    }

    let duration = start.elapsed();
    println!(
        "Session pairing: {} pairs in {:?} ({:.2} μs/pair)",
        pairs,
        duration,
        duration.as_micros() as f64 / pairs as f64
    );

    assert_eq!(registry.session_count().await, pairs as usize);
    assert!(duration.as_millis() < 2000);
}

/// Benchmarks matchmaking throughput
#[tokio::test]
async fn benchmark_matchmaking() {
    let registry = SessionRegistry::new(SessionPolicy::default());
    let mut receivers = Vec::new();
    let mut pending = Vec::new();

    let players = 2_000;
    let start = Instant::now();

    for i in 0..players {
        let (handle, rx) = ConnectionHandle::new(i + 1);
        receivers.push(rx);
        match registry
            .enqueue_matchmaking(&format!("player-{}", i), handle)
            .await
            .unwrap()
        {
            Matchmade::Pending(seat) => pending.push(seat),
            Matchmade::Paired(_) => {}
        }
    }

    let duration = start.elapsed();
    println!(
        "Matchmaking: {} players in {:?} ({:.2} μs/player)",
        players,
        duration,
        duration.as_micros() as f64 / players as f64
    );

    assert_eq!(registry.session_count().await, (players / 2) as usize);
    assert_eq!(registry.queue_len().await, 0);
    for seat in pending {
        assert_eq!(seat.await.unwrap().role, Role::First);
    }
    assert!(duration.as_millis() < 2000);
}
