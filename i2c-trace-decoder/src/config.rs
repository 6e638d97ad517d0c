//! Decoder configuration types
//!
//! A decoder needs only two things from its caller: the device address to
//! surface and the cutoff time after which new transactions are ignored.

use serde::{Deserialize, Serialize};
use std::num::ParseIntError;

/// What a repeated start does after closing the transaction it interrupts
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RepeatedStartPolicy {
    /// Emit the closed transaction; the next one carries no timestamp
    EmitOnly,
    /// Emit the closed transaction and stamp the next one with the repeated start time
    #[default]
    EmitAndRestamp,
}

/// Configuration for one decoder instance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecoderConfig {
    /// Only transactions addressed to this device are surfaced
    pub match_address: u32,

    /// Cutoff time in seconds: once passed, no new transaction is opened
    #[serde(default = "default_timeout")]
    pub timeout: f64,

    /// Behavior of a repeated start inside an open transaction
    #[serde(default)]
    pub repeated_start: RepeatedStartPolicy,
}

fn default_timeout() -> f64 {
    f64::INFINITY
}

impl DecoderConfig {
    /// Create a configuration for `match_address` with no cutoff
    pub fn new(match_address: u32) -> Self {
        Self {
            match_address,
            timeout: default_timeout(),
            repeated_start: RepeatedStartPolicy::default(),
        }
    }

    /// Builder method: set the cutoff time in seconds
    pub fn with_timeout(mut self, timeout: f64) -> Self {
        self.timeout = timeout;
        self
    }

    /// Builder method: set the repeated start policy
    pub fn with_repeated_start(mut self, policy: RepeatedStartPolicy) -> Self {
        self.repeated_start = policy;
        self
    }

    /// Check if a transaction to `address` should be surfaced
    pub fn matches(&self, address: u32) -> bool {
        address == self.match_address
    }
}

/// Parse a device address given as `0x`-prefixed hex or as decimal
pub fn parse_address(text: &str) -> Result<u32, ParseIntError> {
    let text = text.trim();
    match text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        Some(hex) => u32::from_str_radix(hex, 16),
        None => text.parse::<u32>(),
    }
}
