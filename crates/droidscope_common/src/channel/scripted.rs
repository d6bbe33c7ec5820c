//! In-memory device for tests.

use super::{Channel, MARKER};
use crate::error::{Result, TelemetryError};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Channel that replays canned replies, one per command line.
///
/// Behaves like a tiny shell: `echo` lines of the batch protocol are echoed,
/// every other line is looked up verbatim. An unknown command produces no
/// output and a failing status, like `sh` reporting `not found`.
#[derive(Debug, Default)]
pub struct ScriptedChannel {
    replies: HashMap<String, String>,
    devices: Option<String>,
    offline: bool,
    calls: AtomicUsize,
}

impl ScriptedChannel {
    pub fn new() -> Self {
        Self::default()
    }

    /// A channel whose every invocation fails.
    pub fn offline() -> Self {
        Self {
            offline: true,
            ..Self::default()
        }
    }

    pub fn reply(mut self, command: &str, output: &str) -> Self {
        self.replies.insert(command.to_string(), output.to_string());
        self
    }

    pub fn devices(mut self, listing: &str) -> Self {
        self.devices = Some(listing.to_string());
        self
    }

    /// Number of `execute` round-trips so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Channel for ScriptedChannel {
    fn execute(&self, command: &str, require_success: bool) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.offline {
            return Err(TelemetryError::Channel("device offline".to_string()));
        }

        let mut output = Vec::new();
        let mut failed = false;
        for line in command.lines().map(str::trim).filter(|l| !l.is_empty()) {
            if let Some(marker) = line.strip_prefix("echo ").filter(|m| m.starts_with(MARKER)) {
                output.push(marker.to_string());
            } else if let Some(reply) = self.replies.get(line) {
                output.push(reply.clone());
            } else {
                failed = true;
            }
        }

        if require_success && failed {
            return Err(TelemetryError::Channel(format!("command failed: {}", command)));
        }
        Ok(output.join("\n").trim_end().to_string())
    }

    fn list_connected(&self) -> Option<String> {
        if self.offline {
            return None;
        }
        self.devices.clone()
    }
}
