use serde::{Deserialize, Serialize};

use crate::error::TransportError;
use crate::types::Color;

pub type PeerId = String;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    /// First peer of the room: picks the orbit config and starts the game.
    Host,
    Guest,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Assignment {
    pub role: Role,
    pub color: Color,
}

/// Derives the local role from connection order: index 0 hosts and plays
/// black, everyone else is a white guest. `None` when the local id is not
/// (yet) part of the list.
pub fn assign_role(peers: &[PeerId], local: &str) -> Option<Assignment> {
    let index = peers.iter().position(|id| id == local)?;
    Some(if index == 0 {
        Assignment {
            role: Role::Host,
            color: Color::Black,
        }
    } else {
        Assignment {
            role: Role::Guest,
            color: Color::White,
        }
    })
}

/// Connection metadata consumed from the room service.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PeerRoster {
    pub room: Option<String>,
    /// Ordered by join time, including the local peer.
    pub peers: Vec<PeerId>,
    pub local: Option<PeerId>,
    pub connected: bool,
}

impl PeerRoster {
    pub fn is_multiplayer(&self) -> bool {
        self.room.is_some() && !self.peers.is_empty()
    }

    /// Whether there is another peer to send to.
    pub fn is_paired(&self) -> bool {
        self.is_multiplayer() && self.peers.len() > 1
    }

    pub fn opponent(&self) -> Option<&str> {
        self.peers
            .iter()
            .find(|id| Some(*id) != self.local.as_ref())
            .map(String::as_str)
    }

    /// Live role derived from the current peer list.
    pub fn assignment(&self) -> Option<Assignment> {
        if !self.is_multiplayer() {
            return None;
        }
        assign_role(&self.peers, self.local.as_deref()?)
    }

    /// Peers this client must call. Of each pair only the peer whose id sorts
    /// after the other one dials, so no connection is opened twice.
    pub fn peers_to_dial(&self) -> Vec<&str> {
        let Some(local) = self.local.as_deref() else {
            return Vec::new();
        };
        if self.room.is_none() {
            return Vec::new();
        }
        self.peers
            .iter()
            .map(String::as_str)
            .filter(|id| *id < local)
            .collect()
    }
}

/// Role pinned when the game starts. Before that the role follows the live
/// peer list; afterwards a changed peer list cannot reassign colors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RoleLock {
    pinned: Option<Assignment>,
}

impl RoleLock {
    pub fn pin(&mut self, assignment: Option<Assignment>) {
        self.pinned = assignment;
    }

    pub fn release(&mut self) {
        self.pinned = None;
    }

    pub fn current(&self, roster: &PeerRoster) -> Option<Assignment> {
        self.pinned.or_else(|| roster.assignment())
    }

    /// The live assignment, when a pin is held and the peer list disagrees
    /// with it.
    pub fn reassignment(&self, roster: &PeerRoster) -> Option<Assignment> {
        let pinned = self.pinned?;
        roster.assignment().filter(|live| *live != pinned)
    }
}

/// A room as listed by the signaling service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomInfo {
    pub room_id: String,
    pub peer_ids: Vec<PeerId>,
    /// Milliseconds since the Unix epoch.
    pub created_at: u64,
}

/// The room/matchmaking collaborator.
pub trait RoomService {
    fn create_room(&mut self) -> Result<RoomInfo, TransportError>;
    fn join_room(&mut self, room_id: &str) -> Result<RoomInfo, TransportError>;
    fn list_rooms(&mut self) -> Result<Vec<RoomInfo>, TransportError>;
}
