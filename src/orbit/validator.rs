use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;

use super::OrbitConfig;
use crate::types::Position;

/// Outcome of a validation pass: human-readable errors, empty when valid.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationReport {
    pub is_valid: bool,
    pub errors: Vec<String>,
}

impl ValidationReport {
    fn from_errors(errors: Vec<String>) -> Self {
        Self {
            is_valid: errors.is_empty(),
            errors,
        }
    }
}

/// Checks bounds and that the paths form a permutation of the orbit squares.
pub fn validate_config(config: &OrbitConfig) -> ValidationReport {
    let mut errors = Vec::new();
    let mut outgoing: BTreeMap<Position, usize> = BTreeMap::new();
    let mut incoming: BTreeMap<Position, usize> = BTreeMap::new();

    for path in &config.paths {
        if !path.position.in_bounds(config.size) {
            errors.push(format!("Position {} is out of bounds", path.position));
        }
        if !path.next_position.in_bounds(config.size) {
            errors.push(format!("Next position {} is out of bounds", path.next_position));
        }
        *outgoing.entry(path.position).or_default() += 1;
        *incoming.entry(path.next_position).or_default() += 1;
    }

    let multi_target = joined(incoming.iter().filter(|(_, n)| **n > 1).map(|(p, _)| p));
    if !multi_target.is_empty() {
        errors.push(format!("Positions {multi_target} are targeted by multiple paths"));
    }
    let multi_source = joined(outgoing.iter().filter(|(_, n)| **n > 1).map(|(p, _)| p));
    if !multi_source.is_empty() {
        errors.push(format!("Positions {multi_source} have multiple outgoing paths"));
    }

    for pos in outgoing.keys().filter(|p| !incoming.contains_key(p)) {
        errors.push(format!("Position {pos} has no incoming path"));
    }
    for pos in incoming.keys().filter(|p| !outgoing.contains_key(p)) {
        errors.push(format!("Position {pos} has no outgoing path"));
    }

    ValidationReport::from_errors(errors)
}

/// Walks every orbit from each unvisited square and checks that it closes.
///
/// A walk fails when it reaches a square without an outgoing path, or when it
/// takes more than `size * size` steps without returning to its start.
pub fn validate_orbit_cycles(config: &OrbitConfig) -> ValidationReport {
    let mut errors = Vec::new();
    let successors: BTreeMap<Position, Position> = config
        .paths
        .iter()
        .map(|path| (path.position, path.next_position))
        .collect();
    let max_len = config.size * config.size;
    let mut visited: BTreeSet<Position> = BTreeSet::new();

    for &start in successors.keys() {
        if visited.contains(&start) {
            continue;
        }

        let mut cycle = vec![start];
        let mut current = start;
        loop {
            let Some(&next) = successors.get(&current) else {
                errors.push(format!("Broken cycle detected starting from {start}"));
                break;
            };
            if next == start {
                visited.extend(cycle);
                break;
            }
            if !successors.contains_key(&next) {
                errors.push(format!("Broken cycle detected starting from {start}"));
                break;
            }
            if cycle.len() >= max_len {
                errors.push(format!("Invalid cycle length detected starting from {start}"));
                break;
            }
            cycle.push(next);
            current = next;
        }
    }

    ValidationReport::from_errors(errors)
}

fn joined<'a>(positions: impl Iterator<Item = &'a Position>) -> String {
    positions
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(" ")
}
