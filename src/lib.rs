use wasm_bindgen::prelude::*;

pub mod board;
pub mod error;
pub mod game;
pub mod motion;
pub mod orbit;
pub mod peer;
pub mod session;
pub mod settings;
pub mod sync;
pub mod types;
pub mod wasm;

#[wasm_bindgen]
pub fn wasm_ready() -> bool {
    true
}
