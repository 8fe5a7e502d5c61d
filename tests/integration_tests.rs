//! Integration tests for the networked tic-tac-toe game
//!
//! These tests run a real server on a loopback port and drive it through the
//! client library, validating the full request/response path.

use client::consumer::Presenter;
use client::controller::GameController;
use client::network::{ClientError, GameClient};
use server::network::{Server, ServerConfig, SharedSession};
use server::session::Phase;
use shared::codec::{encode, read_message, write_message};
use shared::{
    ClientId, Command, CommandKind, GameError, Mark, ModelChangeEvent, Payload, Request, Response,
};
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio::time::{sleep, timeout};

const ALICE: ClientId = 1;
const BOB: ClientId = 2;
const CAROL: ClientId = 3;

async fn start_server() -> (String, SharedSession) {
    let server = Server::bind("127.0.0.1:0", ServerConfig::default())
        .await
        .unwrap();
    let addr = server.local_addr().unwrap().to_string();
    let session = server.session();

    tokio::spawn(async move {
        let _ = server.run().await;
    });

    (addr, session)
}

async fn connect(addr: &str, id: ClientId) -> GameClient {
    GameClient::connect_with_id(addr, id, Duration::from_secs(2))
        .await
        .unwrap()
}

/// Two registered clients, Alice playing X and Bob playing O
async fn two_players(addr: &str) -> (GameClient, GameClient) {
    let alice = connect(addr, ALICE).await;
    let bob = connect(addr, BOB).await;
    assert_eq!(alice.register_user("Alice").await.unwrap(), Some(Mark::X));
    assert_eq!(bob.register_user("Bob").await.unwrap(), Some(Mark::O));
    (alice, bob)
}

/// SESSION FLOW TESTS
mod session_flow_tests {
    use super::*;

    /// Two registrations make the session ready for everyone
    #[tokio::test]
    async fn registration_and_readiness() {
        let (addr, _session) = start_server().await;
        let alice = connect(&addr, ALICE).await;
        let bob = connect(&addr, BOB).await;

        assert_eq!(alice.register_user("Alice").await.unwrap(), Some(Mark::X));
        assert!(!alice.check_for_ready().await.unwrap());

        assert_eq!(bob.register_user("Bob").await.unwrap(), Some(Mark::O));
        assert!(alice.check_for_ready().await.unwrap());
        assert!(bob.check_for_ready().await.unwrap());
    }

    /// A move is visible to the opponent and turns alternate
    #[tokio::test]
    async fn move_propagates_and_turns_alternate() {
        let (addr, session) = start_server().await;
        let (alice, bob) = two_players(&addr).await;

        alice.update_model(Some(Mark::X), 0, 0).await.unwrap();
        assert_eq!(
            bob.get_model().await.unwrap(),
            Some(ModelChangeEvent::new(0, 0, Mark::X))
        );

        let err = alice.update_model(Some(Mark::X), 1, 1).await.unwrap_err();
        assert_eq!(
            err.rejection(),
            Some(&GameError::NotYourTurn { client_id: ALICE })
        );

        bob.update_model(Some(Mark::O), 1, 1).await.unwrap();
        assert_eq!(session.lock().await.phase(), Phase::InProgress);
    }

    /// Three in a row ends the game and names the winner
    #[tokio::test]
    async fn top_row_wins() {
        let (addr, session) = start_server().await;
        let (alice, bob) = two_players(&addr).await;

        assert!(!alice.check_for_win().await.unwrap().is_winner());

        alice.update_model(Some(Mark::X), 0, 0).await.unwrap();
        bob.update_model(Some(Mark::O), 1, 0).await.unwrap();
        alice.update_model(Some(Mark::X), 0, 1).await.unwrap();
        bob.update_model(Some(Mark::O), 1, 1).await.unwrap();
        alice.update_model(Some(Mark::X), 0, 2).await.unwrap();

        let record = bob.check_for_win().await.unwrap();
        assert!(record.is_winner());
        assert_eq!(record.id, ALICE.to_string());
        assert_eq!(record.name, "Alice");
        assert_eq!(record.mark, "X");
        assert_eq!(record.is_registered, "True");
        assert_eq!(session.lock().await.phase(), Phase::GameOver);

        let err = bob.update_model(Some(Mark::O), 2, 2).await.unwrap_err();
        assert!(matches!(err.rejection(), Some(GameError::InvalidState(_))));
    }

    /// A third client gets no seat and the game carries on
    #[tokio::test]
    async fn third_player_refused() {
        let (addr, session) = start_server().await;
        let (_alice, _bob) = two_players(&addr).await;
        let carol = connect(&addr, CAROL).await;

        assert_eq!(carol.register_user("Carol").await.unwrap(), None);
        assert!(carol.check_for_ready().await.unwrap());

        let err = carol.update_model(None, 2, 2).await.unwrap_err();
        assert_eq!(
            err.rejection(),
            Some(&GameError::UnknownPlayer { client_id: CAROL })
        );
        assert_eq!(session.lock().await.registry().len(), 2);
    }

    /// Reset returns the session to its initial state
    #[tokio::test]
    async fn reset_starts_over() {
        let (addr, _session) = start_server().await;
        let (alice, bob) = two_players(&addr).await;
        alice.update_model(Some(Mark::X), 2, 2).await.unwrap();

        bob.reset().await.unwrap();

        assert!(!alice.check_for_ready().await.unwrap());
        assert_eq!(alice.get_model().await.unwrap(), None);
        assert!(!alice.check_for_win().await.unwrap().is_winner());

        // Seats are free again, first come gets X
        assert_eq!(bob.register_user("Bob").await.unwrap(), Some(Mark::X));
    }

    /// Moves before the second player arrives are refused
    #[tokio::test]
    async fn move_while_waiting_rejected() {
        let (addr, _session) = start_server().await;
        let alice = connect(&addr, ALICE).await;
        alice.register_user("Alice").await.unwrap();

        let err = alice.update_model(Some(Mark::X), 0, 0).await.unwrap_err();
        match err.rejection() {
            Some(GameError::InvalidState(reason)) => {
                assert_eq!(reason, "Not enough players 1 waiting for others to join")
            }
            other => panic!("Expected invalid state, got {:?}", other),
        }
    }

    /// Occupied and off-board cells are refused without using up the turn
    #[tokio::test]
    async fn invalid_cells_rejected() {
        let (addr, _session) = start_server().await;
        let (alice, bob) = two_players(&addr).await;
        alice.update_model(Some(Mark::X), 1, 1).await.unwrap();

        let err = bob.update_model(Some(Mark::O), 1, 1).await.unwrap_err();
        assert_eq!(
            err.rejection(),
            Some(&GameError::CellOccupied { row: 1, column: 1 })
        );

        let err = bob.update_model(Some(Mark::O), 0, 3).await.unwrap_err();
        assert_eq!(
            err.rejection(),
            Some(&GameError::OutOfBounds { row: 0, column: 3 })
        );

        bob.update_model(Some(Mark::O), 0, 0).await.unwrap();
    }

    /// Announcing a turn echoes the caller once the game is ready
    #[tokio::test]
    async fn next_turn_echoes_caller() {
        let (addr, _session) = start_server().await;
        let alice = connect(&addr, ALICE).await;
        alice.register_user("Alice").await.unwrap();

        assert!(alice.next_turn("Alice").await.is_err());

        let bob = connect(&addr, BOB).await;
        bob.register_user("Bob").await.unwrap();
        assert_eq!(bob.next_turn("Bob").await.unwrap(), BOB);
    }

    /// Leaving frees the seat and pauses the game
    #[tokio::test]
    async fn unregister_frees_seat() {
        let (addr, session) = start_server().await;
        let (alice, bob) = two_players(&addr).await;

        alice.un_register_user("Alice", Some(Mark::X)).await.unwrap();

        // Readiness holds until a reset, but the empty seat blocks moves
        assert!(bob.check_for_ready().await.unwrap());
        let err = bob.update_model(Some(Mark::O), 1, 1).await.unwrap_err();
        match err.rejection() {
            Some(GameError::InvalidState(reason)) => {
                assert_eq!(reason, "Not enough players 1 waiting for others to join")
            }
            other => panic!("Expected invalid state, got {:?}", other),
        }

        let carol = connect(&addr, CAROL).await;
        assert_eq!(carol.register_user("Carol").await.unwrap(), Some(Mark::X));
        assert!(bob.check_for_ready().await.unwrap());
        assert_eq!(session.lock().await.phase(), Phase::Ready);
    }
}

/// CLIENT-SERVER INTEGRATION TESTS
mod client_server_tests {
    use super::*;

    #[derive(Default)]
    struct RecordingPresenter {
        cells: Vec<ModelChangeEvent>,
        winners: Vec<String>,
        resets: usize,
    }

    impl Presenter for RecordingPresenter {
        fn cell_changed(&mut self, change: &ModelChangeEvent) {
            self.cells.push(*change);
        }

        fn game_over(&mut self, winner: &str) {
            self.winners.push(winner.to_string());
        }

        fn session_reset(&mut self) {
            self.resets += 1;
        }
    }

    async fn wait_until(mut condition: impl FnMut() -> bool) {
        timeout(Duration::from_secs(3), async {
            while !condition() {
                sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("condition not reached in time");
    }

    /// Polling picks up the game start, the moves and the winner
    #[tokio::test]
    async fn polling_reports_game_to_presenter() {
        let (addr, session) = start_server().await;

        let alice_client = connect(&addr, ALICE).await;
        let mut alice =
            GameController::start(std::sync::Arc::new(alice_client), Duration::from_millis(20));
        let bob = connect(&addr, BOB).await;

        // Moves are held back until the game has started
        assert!(matches!(
            alice.submit_move(0, 0).await,
            Err(ClientError::NotStarted)
        ));

        assert_eq!(alice.register("Alice").await.unwrap(), Some(Mark::X));
        assert_eq!(bob.register_user("Bob").await.unwrap(), Some(Mark::O));

        wait_until(|| alice.flags().is_in_progress()).await;

        alice.submit_move(0, 0).await.unwrap();
        bob.update_model(Some(Mark::O), 1, 0).await.unwrap();
        alice.submit_move(0, 1).await.unwrap();
        bob.update_model(Some(Mark::O), 1, 1).await.unwrap();
        alice.submit_move(0, 2).await.unwrap();

        let mut presenter = RecordingPresenter::default();
        let winner = timeout(Duration::from_secs(3), async {
            loop {
                let report = alice.tick(&mut presenter).await.unwrap();
                if let Some(winner) = report.winner {
                    return winner;
                }
                sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .unwrap();

        assert_eq!(winner, "Alice");
        assert_eq!(presenter.winners, vec!["Alice".to_string()]);
        assert!(presenter
            .cells
            .contains(&ModelChangeEvent::new(0, 2, Mark::X)));

        // The controller resets the session after the game ends
        assert!(!alice.is_registered());
        assert_eq!(session.lock().await.phase(), Phase::WaitingForPlayers);
        assert!(alice.board().board().is_empty());

        alice.shutdown().await;
    }

    /// A reset by the opponent sends the polling client back to the lobby
    #[tokio::test]
    async fn opponent_reset_clears_polling_client() {
        let (addr, session) = start_server().await;

        let alice_client = connect(&addr, ALICE).await;
        let mut alice =
            GameController::start(std::sync::Arc::new(alice_client), Duration::from_millis(20));
        let bob = connect(&addr, BOB).await;

        assert_eq!(alice.register("Alice").await.unwrap(), Some(Mark::X));
        assert_eq!(bob.register_user("Bob").await.unwrap(), Some(Mark::O));
        wait_until(|| alice.flags().is_in_progress()).await;

        alice.submit_move(0, 0).await.unwrap();
        bob.update_model(Some(Mark::O), 1, 1).await.unwrap();

        let mut presenter = RecordingPresenter::default();
        let bob_move = ModelChangeEvent::new(1, 1, Mark::O);
        timeout(Duration::from_secs(3), async {
            while !presenter.cells.contains(&bob_move) {
                alice.tick(&mut presenter).await.unwrap();
                sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .unwrap();

        // Bob starts over and takes the first seat again
        bob.reset().await.unwrap();
        assert_eq!(bob.register_user("Bob").await.unwrap(), Some(Mark::X));

        timeout(Duration::from_secs(3), async {
            while !alice.tick(&mut presenter).await.unwrap().reset {
                sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .unwrap();

        assert_eq!(presenter.resets, 1);
        assert!(presenter.winners.is_empty());
        assert!(!alice.is_registered());
        assert!(!alice.flags().is_in_progress());
        assert!(alice.board().board().is_empty());

        // Joining again is a real registration on the server
        assert_eq!(alice.register("Alice").await.unwrap(), Some(Mark::O));
        assert_eq!(session.lock().await.registry().len(), 2);

        wait_until(|| alice.flags().is_in_progress()).await;
        alice.submit_move(2, 2).await.unwrap();
        assert_eq!(
            bob.get_model().await.unwrap(),
            Some(ModelChangeEvent::new(2, 2, Mark::O))
        );

        alice.shutdown().await;
    }

    /// A client that drops its connection leaves the game intact
    #[tokio::test]
    async fn disconnect_keeps_registration() {
        let (addr, session) = start_server().await;
        let (alice, bob) = two_players(&addr).await;

        drop(alice);
        sleep(Duration::from_millis(50)).await;

        assert!(bob.check_for_ready().await.unwrap());
        assert_eq!(session.lock().await.registry().len(), 2);
    }

    /// Reconnecting under the same identity resumes play
    #[tokio::test]
    async fn reconnect_with_same_identity() {
        let (addr, _session) = start_server().await;
        let (alice, bob) = two_players(&addr).await;
        drop(alice);

        let alice = connect(&addr, ALICE).await;
        alice.update_model(Some(Mark::X), 2, 0).await.unwrap();
        assert_eq!(
            bob.get_model().await.unwrap(),
            Some(ModelChangeEvent::new(2, 0, Mark::X))
        );
    }
}

/// STRESS AND ERROR HANDLING TESTS
mod stress_tests {
    use super::*;

    /// Many clients racing to register end up with exactly two seats taken
    #[tokio::test]
    async fn concurrent_registration() {
        let (addr, session) = start_server().await;

        let handles: Vec<_> = (0..16u32)
            .map(|i| {
                let addr = addr.clone();
                tokio::spawn(async move {
                    let client = connect(&addr, 100 + i).await;
                    client.register_user(&format!("Player {}", i)).await.unwrap()
                })
            })
            .collect();

        let mut marks = Vec::new();
        for handle in handles {
            if let Some(mark) = handle.await.unwrap() {
                marks.push(mark);
            }
        }

        marks.sort_by_key(|m| m.as_str());
        assert_eq!(marks, vec![Mark::O, Mark::X]);
        assert_eq!(session.lock().await.phase(), Phase::Ready);
    }

    /// Many clients polling at once each get their own answers
    #[tokio::test]
    async fn concurrent_polling() {
        let (addr, _session) = start_server().await;
        let (alice, _bob) = two_players(&addr).await;
        alice.update_model(Some(Mark::X), 1, 2).await.unwrap();

        let handles: Vec<_> = (0..8u32)
            .map(|i| {
                let addr = addr.clone();
                tokio::spawn(async move {
                    let client = connect(&addr, 200 + i).await;
                    for _ in 0..20 {
                        assert!(client.check_for_ready().await.unwrap());
                        assert_eq!(
                            client.get_model().await.unwrap(),
                            Some(ModelChangeEvent::new(1, 2, Mark::X))
                        );
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.await.unwrap();
        }
    }

    /// An undecodable frame is skipped and the connection keeps working
    #[tokio::test]
    async fn malformed_frame_handling() {
        let (addr, _session) = start_server().await;
        let mut stream = TcpStream::connect(&addr).await.unwrap();

        let garbage = [0xFFu8, 0xFE, 0xFD, 0xFC, 0xFB];
        let mut frame = (garbage.len() as u32).to_be_bytes().to_vec();
        frame.extend_from_slice(&garbage);
        stream.write_all(&frame).await.unwrap();

        write_message(&mut stream, &Request::new(ALICE, Command::CheckForReady))
            .await
            .unwrap();
        let response: Response = read_message(&mut stream).await.unwrap();

        assert_eq!(response.command, CommandKind::CheckForReady);
        assert_eq!(response.payload, Payload::Ready(false));
    }

    /// Requests split into tiny writes still decode as one message
    #[tokio::test]
    async fn fragmented_request() {
        let (addr, _session) = start_server().await;
        let mut stream = TcpStream::connect(&addr).await.unwrap();
        stream.set_nodelay(true).unwrap();

        let frame = encode(&Request::new(
            ALICE,
            Command::RegisterUser {
                player_name: "Alice".to_string(),
            },
        ))
        .unwrap();

        for byte in &frame {
            stream.write_all(&[*byte]).await.unwrap();
            stream.flush().await.unwrap();
        }

        let response: Response = read_message(&mut stream).await.unwrap();
        assert_eq!(response.payload, Payload::Mark(Some(Mark::X)));
    }

    /// Two requests written back to back get two responses in order
    #[tokio::test]
    async fn pipelined_requests() {
        let (addr, _session) = start_server().await;
        let mut stream = TcpStream::connect(&addr).await.unwrap();

        let mut batch = encode(&Request::new(ALICE, Command::GetModel)).unwrap();
        batch.extend(encode(&Request::new(ALICE, Command::CheckForWin)).unwrap());
        stream.write_all(&batch).await.unwrap();

        let first: Response = read_message(&mut stream).await.unwrap();
        let second: Response = read_message(&mut stream).await.unwrap();
        assert_eq!(first.command, CommandKind::GetModel);
        assert_eq!(second.command, CommandKind::CheckForWin);
    }
}
