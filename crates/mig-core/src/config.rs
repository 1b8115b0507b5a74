// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Session configuration.
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Whether repeated structurally identical add-operations share one node.
///
/// Callers on either side of the boundary must not rely on the other side's
/// choice; this only governs the arenas built by this crate.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DedupPolicy {
    /// Constants, identical NOTs and MAJs over the same operand multiset are
    /// returned as the previously issued reference.
    #[default]
    Structural,
    /// Every add-operation issues a fresh reference.
    None,
}

/// Tunables for a session arena.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BridgeConfig {
    /// Structural hashing policy.
    pub dedup: DedupPolicy,
    /// `add_not` on the output of a previous NOT returns that NOT's operand.
    pub cancel_double_negation: bool,
    /// Upper bound on nodes held by one arena; exceeding it is an engine failure.
    pub max_nodes: Option<usize>,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            dedup: DedupPolicy::Structural,
            cancel_double_negation: false,
            max_nodes: None,
        }
    }
}

impl BridgeConfig {
    /// Parses a JSON document. Missing fields take their defaults.
    pub fn from_json_slice(bytes: &[u8]) -> Result<Self, ConfigError> {
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(Self::default());
        }
        Ok(serde_json::from_slice(bytes)?)
    }

    /// Reads and parses a JSON config file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let bytes = std::fs::read(path)?;
        Self::from_json_slice(&bytes)
    }

    /// Serializes this config as pretty JSON.
    pub fn to_json(&self) -> Result<String, ConfigError> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}
