use log::{debug, info, warn};
use serde::Serialize;
use web_time::Instant;

use crate::error::{ConfigError, MoveError, SyncError, TransportError};
use crate::game::{Action, Game, Update};
use crate::orbit::{self, OrbitConfig};
use crate::peer::{Assignment, PeerId, PeerRoster, Role, RoleLock, RoomInfo, RoomService};
use crate::settings::Settings;
use crate::sync::{PeerMessage, SyncChannel, Transport, receive_state};
use crate::types::{Color, GameView, Position};

/// Everything the page renders, in one serializable value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionView {
    pub game: GameView,
    pub is_multiplayer: bool,
    pub is_host: bool,
    pub local_player: Option<Color>,
    pub opponent: Option<PeerId>,
    pub is_connected: bool,
    pub game_started: bool,
    pub room: Option<String>,
    pub available_rooms: Vec<RoomInfo>,
    pub error: Option<String>,
}

/// One client: owns the game and is the only place it is mutated. Local
/// input and inbound peer messages both enter through `&mut self`, so they
/// are applied strictly one after another.
#[derive(Debug)]
pub struct Session<T> {
    game: Game,
    channel: SyncChannel<T>,
    roster: PeerRoster,
    roles: RoleLock,
    game_started: bool,
    available_rooms: Vec<RoomInfo>,
    error: Option<String>,
}

impl<T: Transport> Session<T> {
    /// Validates the built-in orbit table and starts on the standard config.
    /// A broken built-in config is fatal.
    pub fn new(settings: &Settings, transport: T) -> Result<Self, ConfigError> {
        orbit::check_builtin_configs()?;
        Ok(Self {
            game: Game::new(orbit::standard().clone(), settings)?,
            channel: SyncChannel::new(transport, settings.attach_digest),
            roster: PeerRoster::default(),
            roles: RoleLock::default(),
            game_started: false,
            available_rooms: Vec::new(),
            error: None,
        })
    }

    pub fn game(&self) -> &Game {
        &self.game
    }

    pub fn roster(&self) -> &PeerRoster {
        &self.roster
    }

    pub fn transport_mut(&mut self) -> &mut T {
        self.channel.transport_mut()
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn game_started(&self) -> bool {
        self.game_started
    }

    pub fn assignment(&self) -> Option<Assignment> {
        self.roles.current(&self.roster)
    }

    pub fn local_color(&self) -> Option<Color> {
        self.assignment().map(|a| a.color)
    }

    pub fn is_host(&self) -> bool {
        self.assignment().is_some_and(|a| a.role == Role::Host)
    }

    /// Replaces the connection metadata. Moving to another room releases the
    /// pinned role and the started flag.
    pub fn update_roster(&mut self, roster: PeerRoster) {
        if roster.room != self.roster.room {
            self.roles.release();
            self.game_started = false;
        }
        self.roster = roster;
        if let Some(live) = self.roles.reassignment(&self.roster) {
            warn!(
                "peer list would reassign the local peer to {:?} {}; keeping pinned role",
                live.role, live.color
            );
        }
        if let Some(assignment) = self.assignment() {
            debug!("local peer is {:?} playing {}", assignment.role, assignment.color);
        }
    }

    pub fn click_cell(&mut self, row: u8, col: u8, now: Instant) -> bool {
        let Some(pos) = Position::try_new(row, col) else {
            debug!("click on {row},{col} ignored: off the board");
            return false;
        };
        let result = self
            .ensure_local_turn()
            .and_then(|()| self.game.click_cell(pos, now));
        match result {
            Ok(Some(update)) => {
                self.broadcast(&update);
                true
            }
            Ok(None) => true,
            Err(err) => {
                debug!("click on {pos} ignored: {err}");
                false
            }
        }
    }

    pub fn rotate(&mut self, now: Instant) -> bool {
        let result = self
            .ensure_local_turn()
            .and_then(|()| self.game.rotate(now));
        self.finish(result, "rotate")
    }

    pub fn rematch(&mut self, now: Instant) -> bool {
        let result = self.game.perform(Action::Rematch, now);
        self.finish(result, "rematch")
    }

    pub fn reset(&mut self, now: Instant) -> bool {
        let result = self.game.perform(Action::Reset, now);
        self.finish(result, "reset")
    }

    /// Host-only, before the game starts: switches to a built-in config and
    /// tells the guest.
    pub fn select_config(&mut self, name: &str) -> Result<(), ConfigError> {
        if self.roster.is_multiplayer() && !self.is_host() {
            debug!("only the host can change the orbit config");
            return Ok(());
        }
        if self.game_started || self.game.is_underway() {
            debug!("{}", MoveError::GameUnderway);
            return Ok(());
        }

        let config = orbit::find_config(name)?.clone();
        self.game.set_config(config.clone())?;
        if let Some(opponent) = self.paired_opponent() {
            let sent = self.channel.send_config(&opponent, &config);
            self.note_send(sent);
        }
        Ok(())
    }

    /// Host-only: tells the guest to start and pins both roles.
    pub fn start_game(&mut self) -> bool {
        if !self.is_host() {
            return false;
        }
        let Some(opponent) = self.paired_opponent() else {
            return false;
        };

        let sent = self.channel.send_start(&opponent);
        self.note_send(sent);
        self.begin();
        true
    }

    /// Entry point for every message the transport delivers.
    pub fn handle_message(&mut self, from: &str, text: &str, now: Instant) {
        let message = match PeerMessage::decode(text) {
            Ok(message) => message,
            Err(err) => {
                warn!("dropping message from {from}: {err}");
                return;
            }
        };

        match message {
            PeerMessage::GameState {
                state,
                sequence,
                digest,
            } => {
                receive_state(&mut self.game, &state, sequence, digest, now);
            }
            PeerMessage::ConfigChange { config } => self.adopt_remote_config(from, config),
            PeerMessage::StartGame => {
                info!("{from} started the game");
                self.begin();
            }
            PeerMessage::Unknown { kind } => {
                warn!("ignoring unknown message type {kind:?} from {from}");
            }
        }
    }

    pub fn create_room(&mut self, rooms: &mut impl RoomService) {
        let result = rooms.create_room();
        self.enter_room(result);
    }

    pub fn join_room(&mut self, rooms: &mut impl RoomService, room_id: &str) {
        let result = rooms.join_room(room_id);
        self.enter_room(result);
    }

    pub fn list_rooms(&mut self, rooms: &mut impl RoomService) {
        match rooms.list_rooms() {
            Ok(list) => {
                self.available_rooms = list;
                self.error = None;
            }
            Err(err) => self.record_error(err),
        }
    }

    pub fn set_available_rooms(&mut self, rooms: Vec<RoomInfo>) {
        self.available_rooms = rooms;
    }

    /// Surfaces a transport failure on the session. Game state is untouched.
    pub fn record_error(&mut self, err: TransportError) {
        warn!("{err}");
        self.error = Some(err.to_string());
    }

    pub fn to_view(&self, now: Instant) -> SessionView {
        SessionView {
            game: self.game.to_view(self.local_color(), now),
            is_multiplayer: self.roster.is_multiplayer(),
            is_host: self.is_host(),
            local_player: self.local_color(),
            opponent: self.roster.opponent().map(str::to_string),
            is_connected: self.roster.is_paired(),
            game_started: self.game_started,
            room: self.roster.room.clone(),
            available_rooms: self.available_rooms.clone(),
            error: self.error.clone(),
        }
    }

    fn enter_room(&mut self, result: Result<RoomInfo, TransportError>) {
        match result {
            Ok(room) => {
                info!("entered room {}", room.room_id);
                self.update_roster(PeerRoster {
                    room: Some(room.room_id),
                    peers: room.peer_ids,
                    local: self.roster.local.clone(),
                    connected: true,
                });
                self.error = None;
            }
            Err(err) => self.record_error(err),
        }
    }

    fn begin(&mut self) {
        self.game_started = true;
        self.roles.pin(self.roster.assignment());
    }

    fn adopt_remote_config(&mut self, from: &str, config: OrbitConfig) {
        if self.is_host() {
            warn!("ignoring config change from guest {from}");
            return;
        }
        if self.game_started || self.game.is_underway() {
            warn!("ignoring config change from {from}: game already underway");
            return;
        }
        if let Err(err) = self.game.set_config(config) {
            warn!("refusing config from {from}: {err}");
        }
    }

    fn ensure_local_turn(&self) -> Result<(), MoveError> {
        if !self.roster.is_multiplayer() {
            return Ok(());
        }
        match self.local_color() {
            Some(color) if color == self.game.state().current_player => Ok(()),
            _ => Err(MoveError::NotYourTurn),
        }
    }

    fn finish(&mut self, result: Result<Update, MoveError>, what: &str) -> bool {
        match result {
            Ok(update) => {
                self.broadcast(&update);
                true
            }
            Err(err) => {
                debug!("{what} ignored: {err}");
                false
            }
        }
    }

    /// Sends the patch just applied locally. No-op outside a two-peer session.
    fn broadcast(&mut self, update: &Update) {
        let Some(opponent) = self.paired_opponent() else {
            return;
        };
        let digest = self.game.state().digest();
        let sent = self.channel.send_state(&opponent, update, digest);
        self.note_send(sent);
    }

    fn paired_opponent(&self) -> Option<PeerId> {
        if !self.roster.is_paired() {
            return None;
        }
        self.roster.opponent().map(str::to_string)
    }

    fn note_send(&mut self, sent: Result<(), SyncError>) {
        match sent {
            Ok(()) => {}
            Err(SyncError::Transport(err)) => self.record_error(err),
            Err(err) => warn!("failed to send: {err}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sync::Outbox;
    use crate::types::{Cell, TurnPhase};

    struct FailingRooms;

    /// Transport whose data channel is closed.
    struct ClosedChannel;

    impl Transport for ClosedChannel {
        fn send(&mut self, peer: &str, _text: String) -> Result<(), TransportError> {
            Err(TransportError::Send {
                peer: peer.to_string(),
                reason: "data channel closed".to_string(),
            })
        }
    }

    impl RoomService for FailingRooms {
        fn create_room(&mut self) -> Result<RoomInfo, TransportError> {
            Err(TransportError::Room {
                operation: "create room",
                reason: "signaling server unreachable".to_string(),
            })
        }

        fn join_room(&mut self, room_id: &str) -> Result<RoomInfo, TransportError> {
            Ok(RoomInfo {
                room_id: room_id.to_string(),
                peer_ids: vec!["a".to_string(), "b".to_string()],
                created_at: 0,
            })
        }

        fn list_rooms(&mut self) -> Result<Vec<RoomInfo>, TransportError> {
            Err(TransportError::Room {
                operation: "list rooms",
                reason: "timeout".to_string(),
            })
        }
    }

    fn local_session() -> Session<Outbox> {
        let settings = Settings {
            rotation_settle_ms: 0,
            ..Settings::default()
        };
        Session::new(&settings, Outbox::default()).unwrap()
    }

    fn paired_session(local: &str) -> Session<Outbox> {
        let mut session = local_session();
        session.update_roster(PeerRoster {
            room: Some("room".to_string()),
            peers: vec!["a".to_string(), "b".to_string()],
            local: Some(local.to_string()),
            connected: true,
        });
        session
    }

    #[test]
    fn local_play_sends_nothing() {
        let mut session = local_session();
        let now = Instant::now();

        assert!(session.click_cell(1, 1, now));
        assert!(session.rotate(now));
        assert!(session.transport_mut().is_empty());
        assert_eq!(session.game().state().current_player, Color::White);
    }

    #[test]
    fn invalid_click_is_silent_no_op() {
        let mut session = local_session();
        let now = Instant::now();
        session.click_cell(0, 0, now);
        let before = session.game().state().clone();

        assert!(!session.click_cell(0, 0, now));
        assert!(!session.click_cell(9, 9, now));
        assert_eq!(session.game().state(), &before);
        assert_eq!(session.error(), None);
    }

    #[test]
    fn guest_cannot_move_on_hosts_turn() {
        let mut guest = paired_session("b");
        assert_eq!(guest.local_color(), Some(Color::White));

        assert!(!guest.click_cell(0, 0, Instant::now()));
        assert_eq!(guest.game().state().board.cell(Position::new(0, 0)), Cell::Empty);
        assert!(guest.transport_mut().is_empty());
    }

    #[test]
    fn host_move_is_sent_to_guest() {
        let mut host = paired_session("a");
        assert!(host.is_host());

        assert!(host.click_cell(0, 0, Instant::now()));
        let sent = host.transport_mut().drain();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, "b");
        match PeerMessage::decode(&sent[0].1).unwrap() {
            PeerMessage::GameState { state, sequence, digest } => {
                assert_eq!(sequence, 1);
                assert_eq!(state.turn_phase, Some(TurnPhase::MustRotate));
                assert_eq!(digest, Some(host.game().state().digest()));
            }
            other => panic!("unexpected message {other:?}"),
        }
    }

    #[test]
    fn only_host_selects_config_before_start() {
        let mut guest = paired_session("b");
        guest.select_config("Pacman").unwrap();
        assert_eq!(guest.game().state().config.name, orbit::standard().name);

        let mut host = paired_session("a");
        host.select_config("Pacman").unwrap();
        assert_eq!(host.game().state().config.name, "Pacman");
        assert!(matches!(
            PeerMessage::decode(&host.transport_mut().drain()[0].1).unwrap(),
            PeerMessage::ConfigChange { .. }
        ));

        assert!(matches!(host.select_config("Spiral"), Err(ConfigError::Unknown(_))));

        assert!(host.start_game());
        host.select_config("Mixed (Outer CCW, Inner CW)").unwrap();
        assert_eq!(host.game().state().config.name, "Pacman");
    }

    #[test]
    fn guest_refuses_broken_remote_config() {
        let mut guest = paired_session("b");
        let mut broken = orbit::mixed().clone();
        broken.paths.truncate(3);
        let text = PeerMessage::ConfigChange { config: broken }.encode().unwrap();

        guest.handle_message("a", &text, Instant::now());
        assert_eq!(guest.game().state().config.name, orbit::standard().name);
    }

    #[test]
    fn unknown_and_malformed_messages_are_ignored() {
        let mut session = paired_session("b");
        let before = session.game().state().clone();
        let now = Instant::now();

        session.handle_message("a", r#"{"type":"emote","payload":{}}"#, now);
        session.handle_message("a", "{", now);
        session.handle_message("a", r#"{"type":"game-state","payload":[]}"#, now);

        assert_eq!(session.game().state(), &before);
        assert_eq!(session.error(), None);
    }

    #[test]
    fn start_game_pins_roles_against_roster_churn() {
        let mut guest = paired_session("b");
        guest.handle_message("a", r#"{"type":"start-game"}"#, Instant::now());
        assert!(guest.game_started());

        guest.update_roster(PeerRoster {
            room: Some("room".to_string()),
            peers: vec!["b".to_string(), "c".to_string()],
            local: Some("b".to_string()),
            connected: true,
        });
        assert_eq!(guest.local_color(), Some(Color::White));
        assert!(!guest.is_host());
    }

    #[test]
    fn failed_send_keeps_the_move_and_surfaces_the_error() {
        let settings = Settings {
            rotation_settle_ms: 0,
            ..Settings::default()
        };
        let mut host = Session::new(&settings, ClosedChannel).unwrap();
        host.update_roster(PeerRoster {
            room: Some("room".to_string()),
            peers: vec!["a".to_string(), "b".to_string()],
            local: Some("a".to_string()),
            connected: true,
        });

        assert!(host.click_cell(0, 0, Instant::now()));
        assert_eq!(host.game().state().board.cell(Position::new(0, 0)), Cell::Black);
        assert_eq!(
            host.error(),
            Some("failed to send to peer b: data channel closed")
        );
    }

    #[test]
    fn clicks_off_the_board_are_refused_before_the_game_sees_them() {
        let mut session = local_session();
        assert!(!session.click_cell(4, 0, Instant::now()));
        assert!(!session.click_cell(0, 200, Instant::now()));
        assert_eq!(session.game().state().sequence, 0);
    }

    #[test]
    fn roster_churn_after_start_keeps_pinned_role_without_repinning() {
        let mut host = paired_session("a");
        assert!(host.start_game());

        let churned = PeerRoster {
            room: Some("room".to_string()),
            peers: vec!["c".to_string(), "a".to_string()],
            local: Some("a".to_string()),
            connected: true,
        };
        host.update_roster(churned.clone());
        host.update_roster(churned);
        assert!(host.is_host());
        assert_eq!(host.local_color(), Some(Color::Black));
        assert_eq!(host.to_view(Instant::now()).local_player, Some(Color::Black));
    }

    #[test]
    fn room_failures_surface_as_error_string() {
        let mut session = local_session();
        let mut rooms = FailingRooms;

        session.create_room(&mut rooms);
        assert_eq!(
            session.error(),
            Some("failed to create room: signaling server unreachable")
        );
        assert_eq!(session.game().state().sequence, 0);

        session.join_room(&mut rooms, "room-9");
        assert_eq!(session.error(), None);
        assert_eq!(session.roster().room.as_deref(), Some("room-9"));

        session.list_rooms(&mut rooms);
        assert_eq!(session.error(), Some("failed to list rooms: timeout"));
    }
}
