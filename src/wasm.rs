use serde::Serialize;
use serde_wasm_bindgen::{from_value, to_value};
use wasm_bindgen::prelude::*;
use web_time::Instant;

use crate::error::TransportError;
use crate::orbit::{self, MoveOffset};
use crate::peer::{PeerId, PeerRoster, RoomInfo};
use crate::session::Session;
use crate::settings::Settings;
use crate::sync::Outbox;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ConfigSummary {
    name: &'static str,
    offsets: Vec<MoveOffset>,
}

#[derive(Serialize)]
struct OutboundMessage {
    peer: PeerId,
    message: String,
}

/// Browser-facing client. The page forwards transport traffic both ways:
/// inbound messages go to `receive`, outbound ones are collected with
/// `drainOutbox` after every call.
#[wasm_bindgen]
pub struct OrbitoClient {
    session: Session<Outbox>,
}

#[wasm_bindgen]
impl OrbitoClient {
    #[wasm_bindgen(constructor)]
    pub fn new(settings: JsValue) -> Result<OrbitoClient, JsValue> {
        let settings: Settings = from_value(settings).unwrap_or_default();
        let session = Session::new(&settings, Outbox::default())
            .map_err(|e| JsValue::from_str(&e.to_string()))?;
        Ok(Self { session })
    }

    #[wasm_bindgen(js_name = clickCell)]
    pub fn click_cell(&mut self, row: u8, col: u8) -> bool {
        self.session.click_cell(row, col, Instant::now())
    }

    pub fn rotate(&mut self) -> bool {
        self.session.rotate(Instant::now())
    }

    pub fn rematch(&mut self) -> bool {
        self.session.rematch(Instant::now())
    }

    pub fn reset(&mut self) -> bool {
        self.session.reset(Instant::now())
    }

    #[wasm_bindgen(js_name = selectConfig)]
    pub fn select_config(&mut self, name: &str) -> Result<(), JsValue> {
        self.session
            .select_config(name)
            .map_err(|e| JsValue::from_str(&e.to_string()))
    }

    #[wasm_bindgen(js_name = startGame)]
    pub fn start_game(&mut self) -> bool {
        self.session.start_game()
    }

    #[wasm_bindgen(js_name = updatePeers)]
    pub fn update_peers(
        &mut self,
        room: Option<String>,
        peers: JsValue,
        local: Option<String>,
        connected: bool,
    ) -> Result<(), JsValue> {
        let peers: Vec<PeerId> = from_value(peers)?;
        self.session.update_roster(PeerRoster {
            room,
            peers,
            local,
            connected,
        });
        Ok(())
    }

    #[wasm_bindgen(js_name = setRooms)]
    pub fn set_rooms(&mut self, rooms: JsValue) -> Result<(), JsValue> {
        let rooms: Vec<RoomInfo> = from_value(rooms)?;
        self.session.set_available_rooms(rooms);
        Ok(())
    }

    /// Records a failed room operation (`create`, `join` or `list`).
    #[wasm_bindgen(js_name = reportRoomError)]
    pub fn report_room_error(&mut self, operation: &str, reason: &str) {
        let operation = match operation {
            "create" => "create room",
            "join" => "join room",
            "list" => "list rooms",
            _ => "reach the signaling service",
        };
        self.session.record_error(TransportError::Room {
            operation,
            reason: reason.to_string(),
        });
    }

    /// Records a message the page could not hand to the peer's data channel.
    #[wasm_bindgen(js_name = reportSendError)]
    pub fn report_send_error(&mut self, peer: &str, reason: &str) {
        self.session.record_error(TransportError::Send {
            peer: peer.to_string(),
            reason: reason.to_string(),
        });
    }

    pub fn receive(&mut self, peer: &str, message: &str) {
        self.session.handle_message(peer, message, Instant::now());
    }

    #[wasm_bindgen(js_name = drainOutbox)]
    pub fn drain_outbox(&mut self) -> Result<JsValue, JsValue> {
        let outbound: Vec<OutboundMessage> = self
            .session
            .transport_mut()
            .drain()
            .into_iter()
            .map(|(peer, message)| OutboundMessage { peer, message })
            .collect();
        to_value(&outbound).map_err(|e| e.into())
    }

    #[wasm_bindgen(js_name = peersToDial)]
    pub fn peers_to_dial(&self) -> Result<JsValue, JsValue> {
        to_value(&self.session.roster().peers_to_dial()).map_err(|e| e.into())
    }

    pub fn state(&self) -> Result<JsValue, JsValue> {
        to_value(&self.session.to_view(Instant::now())).map_err(|e| e.into())
    }

    /// Built-in configs with the per-square displacement of one rotation.
    pub fn configs() -> Result<JsValue, JsValue> {
        let summaries: Vec<ConfigSummary> = orbit::builtin_configs()
            .iter()
            .map(|config| ConfigSummary {
                name: config.name.as_str(),
                offsets: config.offsets(),
            })
            .collect();
        to_value(&summaries).map_err(|e| e.into())
    }
}
