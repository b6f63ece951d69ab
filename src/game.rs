use log::{debug, info};
use serde::{Deserialize, Serialize};
use web_time::Instant;

use crate::board::Board;
use crate::error::{ConfigError, MoveError};
use crate::motion::Motion;
use crate::orbit::OrbitConfig;
use crate::settings::Settings;
use crate::types::{BOARD_SIZE, Color, GameView, Outcome, Position, Stats, TurnPhase};

/// Authoritative game truth of one client.
///
/// Only `selected_piece` is local cursor state: it is never synced and is
/// left out of the digest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameState {
    pub board: Board,
    pub current_player: Color,
    pub turn_phase: TurnPhase,
    pub selected_piece: Option<Position>,
    pub outcome: Outcome,
    pub config: OrbitConfig,
    /// Logical clock: bumped by every locally produced patch, adopted from
    /// every merged remote patch.
    pub sequence: u64,
    pub stats: Stats,
    pub starting_player: Color,
}

/// Sparse set of authoritative fields changed by one transition. The same
/// patch is applied locally and sent to the peer.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatePatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub board: Option<Board>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_player: Option<Color>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub turn_phase: Option<TurnPhase>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub winner: Option<Outcome>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stats: Option<Stats>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub starting_player: Option<Color>,
}

/// Transitions that change shared game truth.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    MovePiece { from: Position, to: Position },
    PlacePiece(Position),
    Rotate,
    Rematch,
    Reset,
}

/// A locally applied transition, ready to be sent to the peer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Update {
    pub patch: StatePatch,
    pub sequence: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeOutcome {
    /// The patch was newer and has been merged. `rotated` is set when it
    /// completed a rotation, so the receiver can play the animation.
    Applied { rotated: bool },
    /// The patch was not newer than local state and was dropped.
    Stale { local: u64, remote: u64 },
}

impl GameState {
    pub fn new(config: OrbitConfig) -> Self {
        Self {
            board: Board::new(),
            current_player: Color::Black,
            turn_phase: TurnPhase::PlacePiece,
            selected_piece: None,
            outcome: Outcome::Undecided,
            config,
            sequence: 0,
            stats: Stats::default(),
            starting_player: Color::Black,
        }
    }

    /// Shallow field overwrite. A changed board invalidates the selection.
    pub fn apply(&mut self, patch: &StatePatch) {
        if let Some(board) = patch.board {
            self.board = board;
            self.selected_piece = None;
        }
        if let Some(player) = patch.current_player {
            self.current_player = player;
        }
        if let Some(phase) = patch.turn_phase {
            self.turn_phase = phase;
        }
        if let Some(outcome) = patch.winner {
            self.outcome = outcome;
        }
        if let Some(stats) = patch.stats {
            self.stats = stats;
        }
        if let Some(player) = patch.starting_player {
            self.starting_player = player;
        }
    }

    /// Last-writer-wins by logical clock: a patch is merged only when its
    /// sequence is strictly newer than the local one.
    pub fn merge(&mut self, patch: &StatePatch, sequence: u64) -> MergeOutcome {
        if sequence <= self.sequence {
            return MergeOutcome::Stale {
                local: self.sequence,
                remote: sequence,
            };
        }

        let rotated = self.turn_phase == TurnPhase::MustRotate
            && patch.turn_phase == Some(TurnPhase::MoveOpponent);
        self.apply(patch);
        self.sequence = sequence;
        MergeOutcome::Applied { rotated }
    }

    /// CRC32 over every synced field. Two converged peers have equal digests.
    pub fn digest(&self) -> u32 {
        let mut hasher = crc32fast::Hasher::new();
        hasher.update(&self.board.to_bytes());
        hasher.update(&[
            color_code(self.current_player),
            phase_code(self.turn_phase),
            outcome_code(self.outcome),
            color_code(self.starting_player),
        ]);
        for count in [
            self.stats.black.wins,
            self.stats.black.draws,
            self.stats.white.wins,
            self.stats.white.draws,
        ] {
            hasher.update(&count.to_le_bytes());
        }
        hasher.update(&self.sequence.to_le_bytes());
        hasher.finalize()
    }

    pub fn valid_moves(&self, pos: Position) -> Vec<Position> {
        self.board.valid_moves(pos)
    }

    /// Whether `pos` is a legal destination for the selected marble.
    pub fn is_valid_move(&self, pos: Position) -> bool {
        self.selected_piece
            .is_some_and(|from| self.board.valid_moves(from).contains(&pos))
    }

    /// Status line shown above the board. `local` is the local player's
    /// color in a two-peer session.
    pub fn status_message(&self, local: Option<Color>) -> String {
        match self.outcome {
            Outcome::Draw => return "Game Over - It's a Draw!".to_string(),
            Outcome::Winner(color) => return format!("{color} Wins!"),
            Outcome::Undecided => {}
        }
        if local.is_some_and(|color| color != self.current_player) {
            return format!("Waiting for {}", self.current_player);
        }
        match self.turn_phase {
            TurnPhase::MoveOpponent => "Optionally move an opponent's piece",
            TurnPhase::PlacePiece => "Place your piece",
            TurnPhase::MustRotate => "Press rotate to end turn",
        }
        .to_string()
    }
}

/// The transition function. Pure: computes the patch an action produces
/// without touching `state`.
pub fn reduce(state: &GameState, action: &Action) -> Result<StatePatch, MoveError> {
    match *action {
        Action::MovePiece { from, to } => {
            ensure_in_play(state)?;
            ensure_phase(state, TurnPhase::MoveOpponent)?;
            ensure_on_board(from)?;
            ensure_on_board(to)?;
            if state.board.cell(from).color() != Some(state.current_player.opponent()) {
                return Err(MoveError::NotOpponentMarble(from));
            }
            if !state.board.valid_moves(from).contains(&to) {
                return Err(MoveError::NotAdjacent { from, to });
            }

            let mut board = state.board;
            board.move_marble(from, to);
            Ok(StatePatch {
                board: Some(board),
                turn_phase: Some(TurnPhase::PlacePiece),
                ..StatePatch::default()
            })
        }
        Action::PlacePiece(pos) => {
            ensure_in_play(state)?;
            ensure_on_board(pos)?;
            match state.turn_phase {
                TurnPhase::PlacePiece => {}
                TurnPhase::MoveOpponent if state.selected_piece.is_none() => {}
                TurnPhase::MoveOpponent => return Err(MoveError::SelectionPending),
                TurnPhase::MustRotate => return Err(MoveError::WrongPhase(state.turn_phase)),
            }

            let mut board = state.board;
            if !board.place(pos, state.current_player) {
                return Err(MoveError::Occupied(pos));
            }
            Ok(StatePatch {
                board: Some(board),
                turn_phase: Some(TurnPhase::MustRotate),
                ..StatePatch::default()
            })
        }
        Action::Rotate => {
            ensure_in_play(state)?;
            ensure_phase(state, TurnPhase::MustRotate)?;

            let board = state.board.rotate(&state.config.paths);
            let outcome = board.outcome();
            let mut patch = StatePatch {
                board: Some(board),
                current_player: Some(state.current_player.opponent()),
                turn_phase: Some(TurnPhase::MoveOpponent),
                winner: Some(outcome),
                ..StatePatch::default()
            };
            if outcome.is_decided() {
                let mut stats = state.stats;
                stats.record(outcome);
                patch.stats = Some(stats);
            }
            Ok(patch)
        }
        Action::Rematch => {
            if !state.outcome.is_decided() {
                return Err(MoveError::GameNotOver);
            }
            let starting_player = state.starting_player.opponent();
            Ok(StatePatch {
                board: Some(Board::new()),
                current_player: Some(starting_player),
                turn_phase: Some(TurnPhase::PlacePiece),
                winner: Some(Outcome::Undecided),
                stats: None,
                starting_player: Some(starting_player),
            })
        }
        Action::Reset => Ok(StatePatch {
            board: Some(Board::new()),
            current_player: Some(Color::Black),
            turn_phase: Some(TurnPhase::PlacePiece),
            winner: Some(Outcome::Undecided),
            stats: Some(Stats::default()),
            starting_player: Some(Color::Black),
        }),
    }
}

fn ensure_in_play(state: &GameState) -> Result<(), MoveError> {
    if state.outcome.is_decided() {
        Err(MoveError::GameOver)
    } else {
        Ok(())
    }
}

fn ensure_phase(state: &GameState, phase: TurnPhase) -> Result<(), MoveError> {
    if state.turn_phase == phase {
        Ok(())
    } else {
        Err(MoveError::WrongPhase(state.turn_phase))
    }
}

fn ensure_on_board(pos: Position) -> Result<(), MoveError> {
    if pos.in_bounds(BOARD_SIZE) {
        Ok(())
    } else {
        Err(MoveError::OutOfRange(pos))
    }
}

fn color_code(color: Color) -> u8 {
    match color {
        Color::Black => 1,
        Color::White => 2,
    }
}

fn phase_code(phase: TurnPhase) -> u8 {
    match phase {
        TurnPhase::MoveOpponent => 0,
        TurnPhase::PlacePiece => 1,
        TurnPhase::MustRotate => 2,
    }
}

fn outcome_code(outcome: Outcome) -> u8 {
    match outcome {
        Outcome::Undecided => 0,
        Outcome::Winner(color) => color_code(color),
        Outcome::Draw => 3,
    }
}

/// Single owner of one client's game: authoritative state plus the
/// unsynced rotation animation.
#[derive(Debug, Clone)]
pub struct Game {
    state: GameState,
    motion: Motion,
}

impl Game {
    /// Starts a game on `config`. The config must pass validation.
    pub fn new(config: OrbitConfig, settings: &Settings) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            state: GameState::new(config),
            motion: Motion::new(settings.rotation_settle()),
        })
    }

    pub fn state(&self) -> &GameState {
        &self.state
    }

    pub fn is_rotating(&self, now: Instant) -> bool {
        self.motion.is_rotating(now)
    }

    /// Whether any marble has been placed since the last reset or rematch.
    pub fn is_underway(&self) -> bool {
        self.state.board != Board::new() || self.state.turn_phase != TurnPhase::PlacePiece
    }

    /// Applies a local action, bumps the sequence and returns the patch to
    /// send. Refused actions leave the state untouched.
    pub fn perform(&mut self, action: Action, now: Instant) -> Result<Update, MoveError> {
        let gameplay = matches!(
            action,
            Action::MovePiece { .. } | Action::PlacePiece(_) | Action::Rotate
        );
        if gameplay && self.motion.is_rotating(now) {
            return Err(MoveError::Rotating);
        }

        let patch = reduce(&self.state, &action)?;
        self.state.apply(&patch);
        self.state.sequence += 1;

        match action {
            Action::Rotate => {
                self.motion.start(now);
                if self.state.outcome.is_decided() {
                    info!("game decided: {:?}", self.state.outcome);
                }
            }
            Action::Rematch => {
                self.motion.clear();
                info!("rematch, {} starts", self.state.starting_player);
            }
            Action::Reset => {
                self.motion.clear();
                info!("game reset");
            }
            Action::MovePiece { .. } | Action::PlacePiece(_) => {}
        }

        Ok(Update {
            patch,
            sequence: self.state.sequence,
        })
    }

    /// Toggles the selection of an opponent marble. Local only: no patch,
    /// no sequence bump.
    pub fn select(&mut self, pos: Position) -> Result<(), MoveError> {
        ensure_in_play(&self.state)?;
        ensure_phase(&self.state, TurnPhase::MoveOpponent)?;
        ensure_on_board(pos)?;
        if self.state.board.cell(pos).color() != Some(self.state.current_player.opponent()) {
            return Err(MoveError::NotOpponentMarble(pos));
        }

        self.state.selected_piece = if self.state.selected_piece == Some(pos) {
            None
        } else {
            Some(pos)
        };
        Ok(())
    }

    /// Interprets a click on a square the way the board UI does: select or
    /// deselect an opponent marble, move the selected marble, or place.
    /// Returns `None` when the click only changed the selection.
    pub fn click_cell(&mut self, pos: Position, now: Instant) -> Result<Option<Update>, MoveError> {
        ensure_in_play(&self.state)?;
        ensure_on_board(pos)?;
        if self.state.turn_phase == TurnPhase::MustRotate {
            return Err(MoveError::WrongPhase(TurnPhase::MustRotate));
        }
        if self.motion.is_rotating(now) {
            return Err(MoveError::Rotating);
        }

        let cell = self.state.board.cell(pos);
        match self.state.turn_phase {
            TurnPhase::MoveOpponent => {
                if cell.color() == Some(self.state.current_player.opponent()) {
                    self.select(pos)?;
                    return Ok(None);
                }
                match self.state.selected_piece {
                    Some(from) if self.state.is_valid_move(pos) => self
                        .perform(Action::MovePiece { from, to: pos }, now)
                        .map(Some),
                    Some(from) => Err(MoveError::NotAdjacent { from, to: pos }),
                    None => self.perform(Action::PlacePiece(pos), now).map(Some),
                }
            }
            TurnPhase::PlacePiece => self.perform(Action::PlacePiece(pos), now).map(Some),
            TurnPhase::MustRotate => Err(MoveError::WrongPhase(TurnPhase::MustRotate)),
        }
    }

    pub fn rotate(&mut self, now: Instant) -> Result<Update, MoveError> {
        self.perform(Action::Rotate, now)
    }

    /// Merges a patch received from the peer.
    pub fn merge(&mut self, patch: &StatePatch, sequence: u64, now: Instant) -> MergeOutcome {
        let merged = self.state.merge(patch, sequence);
        if let MergeOutcome::Applied { rotated } = merged {
            debug!("merged remote patch #{sequence}");
            if patch.board == Some(Board::new()) {
                // Rematch or reset: nothing is left to animate.
                self.motion.clear();
            } else if rotated {
                self.motion.start(now);
            }
        }
        merged
    }

    /// Swaps the orbit config after validating it. Callers decide whether a
    /// swap is still allowed.
    pub fn set_config(&mut self, config: OrbitConfig) -> Result<(), ConfigError> {
        config.validate()?;
        info!("orbit config set to {:?}", config.name);
        self.state.config = config;
        Ok(())
    }

    pub fn to_view(&self, local: Option<Color>, now: Instant) -> GameView {
        let state = &self.state;
        GameView {
            board: state.board.into(),
            current_player: state.current_player,
            turn_phase: state.turn_phase,
            selected_piece: state.selected_piece,
            valid_moves: state
                .selected_piece
                .map(|pos| state.valid_moves(pos))
                .unwrap_or_default(),
            winner: state.outcome,
            config_name: state.config.name.clone(),
            sequence: state.sequence,
            stats: state.stats,
            starting_player: state.starting_player,
            is_rotating: self.motion.is_rotating(now),
            status: state.status_message(local),
        }
    }

    #[cfg(test)]
    pub(crate) fn set_board_for_test(
        &mut self,
        board: Board,
        current_player: Color,
        phase: TurnPhase,
    ) {
        self.state.board = board;
        self.state.current_player = current_player;
        self.state.turn_phase = phase;
        self.state.selected_piece = None;
        self.state.outcome = Outcome::Undecided;
    }
}
