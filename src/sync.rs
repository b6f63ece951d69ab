use std::collections::VecDeque;

use log::{debug, warn};
use serde::{Deserialize, Serialize};
use web_time::Instant;

use crate::error::{SyncError, TransportError};
use crate::game::{Game, MergeOutcome, StatePatch, Update};
use crate::orbit::OrbitConfig;
use crate::peer::PeerId;

/// Messages exchanged between the two peers.
///
/// On the wire: `{"type": "game-state", "payload": {...}}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", content = "payload", rename_all = "kebab-case")]
pub enum PeerMessage {
    GameState {
        state: StatePatch,
        sequence: u64,
        #[serde(skip_serializing_if = "Option::is_none")]
        digest: Option<u32>,
    },
    ConfigChange {
        config: OrbitConfig,
    },
    StartGame,
    /// A type this client does not understand. Never sent.
    #[serde(skip)]
    Unknown { kind: String },
}

#[derive(Deserialize)]
struct Envelope {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    payload: serde_json::Value,
}

#[derive(Deserialize)]
struct GameStatePayload {
    state: StatePatch,
    sequence: u64,
    #[serde(default)]
    digest: Option<u32>,
}

#[derive(Deserialize)]
struct ConfigChangePayload {
    config: OrbitConfig,
}

impl PeerMessage {
    pub fn encode(&self) -> Result<String, SyncError> {
        serde_json::to_string(self).map_err(SyncError::Encode)
    }

    /// Parses a message. Unknown types decode to [`PeerMessage::Unknown`];
    /// a known type with a broken payload is an error.
    pub fn decode(text: &str) -> Result<Self, SyncError> {
        let envelope: Envelope = serde_json::from_str(text).map_err(SyncError::Malformed)?;
        match envelope.kind.as_str() {
            "game-state" => {
                let payload: GameStatePayload =
                    serde_json::from_value(envelope.payload).map_err(SyncError::Malformed)?;
                Ok(Self::GameState {
                    state: payload.state,
                    sequence: payload.sequence,
                    digest: payload.digest,
                })
            }
            "config-change" => {
                let payload: ConfigChangePayload =
                    serde_json::from_value(envelope.payload).map_err(SyncError::Malformed)?;
                Ok(Self::ConfigChange {
                    config: payload.config,
                })
            }
            "start-game" => Ok(Self::StartGame),
            _ => Ok(Self::Unknown {
                kind: envelope.kind,
            }),
        }
    }
}

/// Outbound half of the peer channel. Delivery is assumed in order and at
/// least once; this layer never retries.
pub trait Transport {
    fn send(&mut self, peer: &str, text: String) -> Result<(), TransportError>;
}

/// Transport that queues encoded messages for the embedder to deliver.
#[derive(Debug, Default)]
pub struct Outbox {
    queue: VecDeque<(PeerId, String)>,
}

impl Outbox {
    pub fn drain(&mut self) -> Vec<(PeerId, String)> {
        self.queue.drain(..).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}

impl Transport for Outbox {
    fn send(&mut self, peer: &str, text: String) -> Result<(), TransportError> {
        self.queue.push_back((peer.to_string(), text));
        Ok(())
    }
}

/// Sends state patches and control messages over a [`Transport`].
#[derive(Debug)]
pub struct SyncChannel<T> {
    transport: T,
    attach_digest: bool,
}

impl<T: Transport> SyncChannel<T> {
    pub fn new(transport: T, attach_digest: bool) -> Self {
        Self {
            transport,
            attach_digest,
        }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// Sends the patch a local transition produced, tagged with its sequence.
    /// `digest` is the sender's state digest after applying the patch.
    pub fn send_state(&mut self, to: &str, update: &Update, digest: u32) -> Result<(), SyncError> {
        let message = PeerMessage::GameState {
            state: update.patch.clone(),
            sequence: update.sequence,
            digest: self.attach_digest.then_some(digest),
        };
        self.send(to, &message)
    }

    pub fn send_config(&mut self, to: &str, config: &OrbitConfig) -> Result<(), SyncError> {
        self.send(
            to,
            &PeerMessage::ConfigChange {
                config: config.clone(),
            },
        )
    }

    pub fn send_start(&mut self, to: &str) -> Result<(), SyncError> {
        self.send(to, &PeerMessage::StartGame)
    }

    fn send(&mut self, to: &str, message: &PeerMessage) -> Result<(), SyncError> {
        let text = message.encode()?;
        self.transport.send(to, text)?;
        Ok(())
    }
}

/// Merges a received game-state patch into `game`. Stale patches are
/// dropped; a digest that disagrees after merging is reported as divergence.
pub fn receive_state(
    game: &mut Game,
    patch: &StatePatch,
    sequence: u64,
    digest: Option<u32>,
    now: Instant,
) -> MergeOutcome {
    let outcome = game.merge(patch, sequence, now);
    match outcome {
        MergeOutcome::Stale { local, remote } => {
            warn!("ignoring stale game-state #{remote} (local sequence is {local})");
        }
        MergeOutcome::Applied { .. } => {
            let local = game.state().digest();
            match digest {
                Some(remote) if remote != local => warn!(
                    "state diverged from peer at sequence {sequence}: digest {remote:#010x} != {local:#010x}"
                ),
                _ => debug!("game-state #{sequence} merged"),
            }
        }
    }
    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::Board;
    use crate::orbit::pacman;
    use crate::settings::Settings;
    use crate::types::{Color, TurnPhase};

    #[test]
    fn game_state_message_uses_tagged_wire_format() {
        let message = PeerMessage::GameState {
            state: StatePatch {
                current_player: Some(Color::White),
                turn_phase: Some(TurnPhase::MoveOpponent),
                ..StatePatch::default()
            },
            sequence: 7,
            digest: None,
        };

        let value: serde_json::Value = serde_json::from_str(&message.encode().unwrap()).unwrap();
        assert_eq!(value["type"], "game-state");
        assert_eq!(value["payload"]["sequence"], 7);
        assert_eq!(value["payload"]["state"]["currentPlayer"], "WHITE");
        assert_eq!(value["payload"]["state"]["turnPhase"], "MOVE_OPPONENT");
        assert!(value["payload"]["state"].get("board").is_none());
        assert!(value["payload"].get("digest").is_none());
    }

    #[test]
    fn decode_recovers_each_known_message() {
        let state = PeerMessage::GameState {
            state: StatePatch {
                board: Some(Board::new()),
                ..StatePatch::default()
            },
            sequence: 3,
            digest: Some(0xDEAD_BEEF),
        };
        let config = PeerMessage::ConfigChange {
            config: pacman().clone(),
        };

        for message in [state, config, PeerMessage::StartGame] {
            let text = message.encode().unwrap();
            assert_eq!(PeerMessage::decode(&text).unwrap(), message);
        }
        assert_eq!(
            PeerMessage::decode(r#"{"type":"start-game","payload":null}"#).unwrap(),
            PeerMessage::StartGame
        );
    }

    #[test]
    fn unknown_type_is_reported_not_rejected() {
        let decoded = PeerMessage::decode(r#"{"type":"chat","payload":{"text":"hi"}}"#).unwrap();
        assert_eq!(
            decoded,
            PeerMessage::Unknown {
                kind: "chat".to_string()
            }
        );
        assert!(decoded.encode().is_err());
    }

    #[test]
    fn malformed_payload_is_an_error() {
        assert!(matches!(
            PeerMessage::decode(r#"{"type":"game-state","payload":{"sequence":"x"}}"#),
            Err(SyncError::Malformed(_))
        ));
        assert!(matches!(PeerMessage::decode("not json"), Err(SyncError::Malformed(_))));
    }

    #[test]
    fn channel_queues_encoded_state_on_outbox() {
        let mut channel = SyncChannel::new(Outbox::default(), true);
        let update = Update {
            patch: StatePatch::default(),
            sequence: 1,
        };

        channel.send_state("peer-b", &update, 42).unwrap();
        channel.send_start("peer-b").unwrap();

        let sent = channel.transport_mut().drain();
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[0].0, "peer-b");
        assert_eq!(
            PeerMessage::decode(&sent[0].1).unwrap(),
            PeerMessage::GameState {
                state: StatePatch::default(),
                sequence: 1,
                digest: Some(42),
            }
        );
        assert!(channel.transport().is_empty());
    }

    #[test]
    fn receive_state_drops_duplicates() {
        let settings = Settings::default();
        let mut game = Game::new(pacman().clone(), &settings).unwrap();
        let now = Instant::now();
        let patch = StatePatch {
            current_player: Some(Color::White),
            ..StatePatch::default()
        };

        let first = receive_state(&mut game, &patch, 1, None, now);
        let before = game.state().clone();
        let second = receive_state(&mut game, &patch, 1, None, now);

        assert_eq!(first, MergeOutcome::Applied { rotated: false });
        assert_eq!(
            second,
            MergeOutcome::Stale {
                local: 1,
                remote: 1,
            }
        );
        assert_eq!(game.state(), &before);
    }
}
