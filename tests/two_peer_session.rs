use orbito::peer::PeerRoster;
use orbito::session::Session;
use orbito::settings::Settings;
use orbito::sync::{Outbox, PeerMessage};
use orbito::types::{Cell, Color, Outcome, Position, TurnPhase};
use web_time::Instant;

const HOST: &str = "peer-a";
const GUEST: &str = "peer-b";

/// Black places, then white, alternating; black completes row 2 on the last rotation.
const WINNING_LINE: [(u8, u8); 7] = [(0, 0), (0, 0), (0, 3), (0, 0), (1, 2), (0, 1), (1, 1)];

fn session(local: &str) -> Session<Outbox> {
    let settings = Settings {
        rotation_settle_ms: 0,
        ..Settings::default()
    };
    let mut session = Session::new(&settings, Outbox::default()).unwrap();
    session.update_roster(PeerRoster {
        room: Some("room-1".to_string()),
        peers: vec![HOST.to_string(), GUEST.to_string()],
        local: Some(local.to_string()),
        connected: true,
    });
    session
}

fn pump(
    from: &mut Session<Outbox>,
    from_id: &str,
    to: &mut Session<Outbox>,
    now: Instant,
) -> usize {
    let sent = from.transport_mut().drain();
    for (_, text) in &sent {
        to.handle_message(from_id, text, now);
    }
    sent.len()
}

fn assert_converged(host: &Session<Outbox>, guest: &Session<Outbox>) {
    let (h, g) = (host.game().state(), guest.game().state());
    assert_eq!(h.board, g.board);
    assert_eq!(h.current_player, g.current_player);
    assert_eq!(h.turn_phase, g.turn_phase);
    assert_eq!(h.outcome, g.outcome);
    assert_eq!(h.stats, g.stats);
    assert_eq!(h.sequence, g.sequence);
    assert_eq!(h.digest(), g.digest());
}

fn play_turn(
    active: &mut Session<Outbox>,
    active_id: &str,
    other: &mut Session<Outbox>,
    at: (u8, u8),
    now: Instant,
) {
    assert!(active.click_cell(at.0, at.1, now), "place at {at:?}");
    assert!(active.rotate(now));
    assert_eq!(pump(active, active_id, other, now), 2);
}

#[test]
fn config_and_start_reach_the_guest() {
    let mut host = session(HOST);
    let mut guest = session(GUEST);
    let now = Instant::now();

    host.select_config("Mixed (Outer CCW, Inner CW)").unwrap();
    assert!(host.start_game());
    assert_eq!(pump(&mut host, HOST, &mut guest, now), 2);

    assert!(guest.game_started());
    assert_eq!(guest.game().state().config.name, "Mixed (Outer CCW, Inner CW)");
    assert_eq!(guest.local_color(), Some(Color::White));
    assert!(!guest.start_game());
}

#[test]
fn full_game_converges_and_rematch_keeps_stats() {
    let mut host = session(HOST);
    let mut guest = session(GUEST);
    let now = Instant::now();
    assert!(host.start_game());
    pump(&mut host, HOST, &mut guest, now);

    for (turn, &at) in WINNING_LINE.iter().enumerate() {
        if turn % 2 == 0 {
            play_turn(&mut host, HOST, &mut guest, at, now);
        } else {
            play_turn(&mut guest, GUEST, &mut host, at, now);
        }
        assert_converged(&host, &guest);
    }

    let state = guest.game().state();
    assert_eq!(state.outcome, Outcome::Winner(Color::Black));
    assert_eq!(state.stats.black.wins, 1);
    for col in 0..4 {
        assert_eq!(state.board.cell(Position::new(2, col)), Cell::Black);
    }
    assert!(!guest.click_cell(3, 0, now));

    assert!(guest.rematch(now));
    pump(&mut guest, GUEST, &mut host, now);
    assert_converged(&host, &guest);

    let state = host.game().state();
    assert_eq!(state.outcome, Outcome::Undecided);
    assert_eq!(state.stats.black.wins, 1);
    assert_eq!(state.starting_player, Color::White);
    assert_eq!(state.current_player, Color::White);
    assert_eq!(state.turn_phase, TurnPhase::PlacePiece);

    // White opens the rematch, so the host (black) has to wait.
    assert!(!host.click_cell(0, 0, now));
    assert!(guest.click_cell(0, 0, now));
}

#[test]
fn reordered_and_duplicated_patches_are_dropped() {
    let mut host = session(HOST);
    let mut guest = session(GUEST);
    let now = Instant::now();

    assert!(host.click_cell(1, 1, now));
    assert!(host.rotate(now));
    let sent = host.transport_mut().drain();
    assert_eq!(sent.len(), 2);

    // The rotation arrives first; the older placement is stale afterwards.
    guest.handle_message(HOST, &sent[1].1, now);
    guest.handle_message(HOST, &sent[0].1, now);
    guest.handle_message(HOST, &sent[1].1, now);
    assert_converged(&host, &guest);

    let state = guest.game().state();
    assert_eq!(state.board.cell(Position::new(2, 1)), Cell::Black);
    assert_eq!(state.current_player, Color::White);
    assert_eq!(state.turn_phase, TurnPhase::MoveOpponent);
    assert_eq!(state.sequence, 2);
}

#[test]
fn guest_moves_host_marble_and_host_follows() {
    let mut host = session(HOST);
    let mut guest = session(GUEST);
    let now = Instant::now();

    play_turn(&mut host, HOST, &mut guest, (1, 1), now);
    // Black now sits on 2,1. White selects it, moves it up, then places.
    assert!(guest.click_cell(2, 1, now));
    assert!(guest.transport_mut().is_empty());
    assert!(guest.click_cell(1, 1, now));
    assert!(guest.click_cell(3, 3, now));
    assert!(guest.rotate(now));
    assert_eq!(pump(&mut guest, GUEST, &mut host, now), 3);
    assert_converged(&host, &guest);

    let state = host.game().state();
    assert_eq!(state.current_player, Color::Black);
    assert_eq!(state.board.count(), (1, 1));
}

#[test]
fn unknown_message_does_not_disturb_the_session() {
    let mut guest = session(GUEST);
    let unknown = r#"{"type":"emote","payload":{"icon":"wave"}}"#;
    let before = guest.game().state().clone();

    guest.handle_message(HOST, unknown, Instant::now());
    assert_eq!(guest.game().state(), &before);
    assert!(matches!(
        PeerMessage::decode(unknown),
        Ok(PeerMessage::Unknown { .. })
    ));
}
