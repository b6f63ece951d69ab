use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::types::{BOARD_SIZE, Position};

mod validator;

pub use validator::{ValidationReport, validate_config, validate_orbit_cycles};

/// One edge of an orbit: the marble at `position` moves to `next_position`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrbitPath {
    pub position: Position,
    pub next_position: Position,
}

impl OrbitPath {
    pub const fn new(position: Position, next_position: Position) -> Self {
        Self {
            position,
            next_position,
        }
    }
}

/// Named set of orbit edges describing how the board rotates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrbitConfig {
    pub name: String,
    pub paths: Vec<OrbitPath>,
    pub size: usize,
}

/// Per-square displacement of one rotation, for animating marbles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MoveOffset {
    pub position: Position,
    pub d_row: i8,
    pub d_col: i8,
}

impl OrbitConfig {
    /// Runs both validators. A config must pass this before it is adopted by
    /// a game: rotating along a broken cycle corrupts the board.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.size != BOARD_SIZE {
            return Err(ConfigError::SizeMismatch {
                name: self.name.clone(),
                size: self.size,
                expected: BOARD_SIZE,
            });
        }

        let mut errors = validate_config(self).errors;
        errors.extend(validate_orbit_cycles(self).errors);
        if errors.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Invalid {
                name: self.name.clone(),
                errors,
            })
        }
    }

    /// The config with every edge reversed.
    pub fn inverse(&self) -> Self {
        Self {
            name: format!("{} (inverse)", self.name),
            paths: self
                .paths
                .iter()
                .map(|path| OrbitPath::new(path.next_position, path.position))
                .collect(),
            size: self.size,
        }
    }

    pub fn offsets(&self) -> Vec<MoveOffset> {
        self.paths
            .iter()
            .map(|path| MoveOffset {
                position: path.position,
                d_row: path.next_position.row as i8 - path.position.row as i8,
                d_col: path.next_position.col as i8 - path.position.col as i8,
            })
            .collect()
    }
}

/// Outer ring, counter-clockwise. Shared by every built-in config.
const OUTER_CCW: [((u8, u8), (u8, u8)); 12] = [
    ((0, 0), (1, 0)),
    ((0, 1), (0, 0)),
    ((0, 2), (0, 1)),
    ((0, 3), (0, 2)),
    ((1, 0), (2, 0)),
    ((1, 3), (0, 3)),
    ((2, 0), (3, 0)),
    ((2, 3), (1, 3)),
    ((3, 0), (3, 1)),
    ((3, 1), (3, 2)),
    ((3, 2), (3, 3)),
    ((3, 3), (2, 3)),
];

const INNER_CCW: [((u8, u8), (u8, u8)); 4] = [
    ((1, 1), (2, 1)),
    ((1, 2), (1, 1)),
    ((2, 2), (1, 2)),
    ((2, 1), (2, 2)),
];

const INNER_CW: [((u8, u8), (u8, u8)); 4] = [
    ((1, 1), (1, 2)),
    ((1, 2), (2, 2)),
    ((2, 2), (2, 1)),
    ((2, 1), (1, 1)),
];

static BUILTIN_CONFIGS: Lazy<[OrbitConfig; 3]> = Lazy::new(|| {
    [
        build("Standard (Both Counter-Clockwise)", OUTER_CCW.iter().chain(&INNER_CCW)),
        build("Mixed (Outer CCW, Inner CW)", OUTER_CCW.iter().chain(&INNER_CW)),
        build("Pacman", pacman_edges().iter()),
    ]
});

/// Pacman: the outer ring dips into the inner squares on the right-hand side,
/// forming one sixteen-square orbit.
fn pacman_edges() -> Vec<((u8, u8), (u8, u8))> {
    OUTER_CCW
        .iter()
        .map(|&edge| match edge {
            ((2, 3), _) => ((2, 3), (2, 2)),
            other => other,
        })
        .chain([
            ((1, 1), (1, 2)),
            ((1, 2), (1, 3)),
            ((2, 2), (2, 1)),
            ((2, 1), (1, 1)),
        ])
        .collect()
}

fn build<'a>(name: &str, edges: impl Iterator<Item = &'a ((u8, u8), (u8, u8))>) -> OrbitConfig {
    OrbitConfig {
        name: name.to_string(),
        size: BOARD_SIZE,
        paths: edges
            .map(|&((r, c), (nr, nc))| OrbitPath::new(Position::new(r, c), Position::new(nr, nc)))
            .collect(),
    }
}

pub fn builtin_configs() -> &'static [OrbitConfig] {
    BUILTIN_CONFIGS.as_slice()
}

/// Both orbits counter-clockwise; the default for new games.
pub fn standard() -> &'static OrbitConfig {
    &BUILTIN_CONFIGS[0]
}

pub fn mixed() -> &'static OrbitConfig {
    &BUILTIN_CONFIGS[1]
}

pub fn pacman() -> &'static OrbitConfig {
    &BUILTIN_CONFIGS[2]
}

pub fn find_config(name: &str) -> Result<&'static OrbitConfig, ConfigError> {
    builtin_configs()
        .iter()
        .find(|config| config.name == name)
        .ok_or_else(|| ConfigError::Unknown(name.to_string()))
}

/// Startup check of the built-in table. Any failure is fatal to the caller.
pub fn check_builtin_configs() -> Result<(), ConfigError> {
    builtin_configs().iter().try_for_each(OrbitConfig::validate)
}
