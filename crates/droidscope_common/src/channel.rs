//! Remote command channel.
//!
//! Every read goes through `adb shell`, which costs a process spawn and a USB or
//! TCP round-trip per call. [`Channel::execute_batch`] multiplexes several
//! commands into one session using marker lines:
//!
//! ```text
//! echo __ADB_MULTI__0
//! getprop ro.product.model
//! echo __ADB_MULTI__1
//! getprop ro.build.version.sdk
//! ```

use crate::error::{Result, TelemetryError};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::{Mutex, PoisonError};
use tempfile::{Builder, NamedTempFile};
use tracing::{debug, warn};

#[cfg(any(test, feature = "test-util"))]
mod scripted;
#[cfg(any(test, feature = "test-util"))]
pub use scripted::ScriptedChannel;

/// Prefix of the lines that separate batched command outputs.
pub const MARKER: &str = "__ADB_MULTI__";

/// A line-oriented remote shell.
pub trait Channel: Send + Sync {
    /// Run one script body and return its stdout with trailing newlines,
    /// carriage returns and spaces removed.
    ///
    /// With `require_success`, a non-zero completion status is an error.
    fn execute(&self, command: &str, require_success: bool) -> Result<String>;

    /// Raw device enumeration output (`adb devices`), or `None` if it failed.
    fn list_connected(&self) -> Option<String>;

    /// Run several commands in one round-trip.
    ///
    /// Always returns exactly `commands.len()` entries. A command whose output
    /// never showed up, or a batch that could not be invoked, yields `""`.
    fn execute_batch(&self, commands: &[&str]) -> Vec<String> {
        if commands.is_empty() {
            return Vec::new();
        }

        let script = build_batch_script(commands);
        match self.execute(&script, false) {
            Ok(output) => demultiplex(&output, commands.len()),
            Err(e) => {
                warn!("  Batch of {} commands failed: {}", commands.len(), e);
                vec![String::new(); commands.len()]
            }
        }
    }
}

/// One script with a marker line before each command.
pub fn build_batch_script(commands: &[&str]) -> String {
    let mut script = String::new();
    for (i, command) in commands.iter().enumerate() {
        script.push_str(&format!("echo {}{}\n{}\n", MARKER, i, command));
    }
    script
}

/// Split batched output back into `count` per-command outputs.
///
/// A marker whose index does not parse continues from the previous marker.
/// Text before the first marker and segments with out-of-range indices are
/// discarded. A repeated index replaces the earlier segment.
pub fn demultiplex(output: &str, count: usize) -> Vec<String> {
    let mut results = vec![String::new(); count];
    let mut current: Option<usize> = None;
    let mut buffer: Vec<&str> = Vec::new();

    for line in output.lines() {
        if let Some(rest) = line.strip_prefix(MARKER) {
            store_segment(&mut results, current, &mut buffer);
            let next = rest
                .trim()
                .parse::<usize>()
                .unwrap_or_else(|_| current.map_or(0, |prev| prev + 1));
            current = Some(next);
        } else if current.is_some() {
            buffer.push(line);
        }
    }
    store_segment(&mut results, current, &mut buffer);

    results
}

fn store_segment(results: &mut [String], index: Option<usize>, buffer: &mut Vec<&str>) {
    if let Some(slot) = index.and_then(|i| results.get_mut(i)) {
        *slot = buffer.join("\n").trim_end_matches(['\n', '\r']).to_string();
    }
    buffer.clear();
}

/// Channel backed by a local program that reads a script on stdin.
#[derive(Debug, Clone)]
pub struct ShellChannel {
    program: String,
    shell_args: Vec<String>,
    list_args: Vec<String>,
    script_dir: Option<PathBuf>,
}

impl ShellChannel {
    /// `adb [-s serial] shell`, enumerating with `adb devices`.
    pub fn adb(adb_path: impl Into<String>, serial: Option<&str>) -> Self {
        let mut shell_args = Vec::new();
        if let Some(serial) = serial {
            shell_args.push("-s".to_string());
            shell_args.push(serial.to_string());
        }
        shell_args.push("shell".to_string());

        Self {
            program: adb_path.into(),
            shell_args,
            list_args: vec!["devices".to_string()],
            script_dir: None,
        }
    }

    /// `sh` on the local host, which always reports itself as one attached device.
    pub fn local() -> Self {
        Self {
            program: "sh".to_string(),
            shell_args: Vec::new(),
            list_args: vec![
                "-c".to_string(),
                "printf 'List of devices attached\\nlocalhost\\tdevice\\n'".to_string(),
            ],
            script_dir: None,
        }
    }

    /// Write script files into `dir` instead of the system temp directory.
    pub fn with_script_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.script_dir = Some(dir.as_ref().to_path_buf());
        self
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    fn write_script(&self, command: &str) -> std::io::Result<NamedTempFile> {
        let mut builder = Builder::new();
        builder.prefix("droidscope-").suffix(".sh");
        let mut script = match &self.script_dir {
            Some(dir) => builder.tempfile_in(dir)?,
            None => builder.tempfile()?,
        };
        writeln!(script, "{}", command)?;
        writeln!(script, "exit")?;
        script.flush()?;
        Ok(script)
    }
}

impl Channel for ShellChannel {
    fn execute(&self, command: &str, require_success: bool) -> Result<String> {
        // Dropping `script` removes the file on every return path.
        let script = self.write_script(command)
            .map_err(|e| TelemetryError::Channel(format!("failed to write script file: {}", e)))?;
        let stdin = script
            .reopen()
            .map_err(|e| TelemetryError::Channel(format!("failed to open script file: {}", e)))?;

        debug!("  Executing: {} {:?} <<< {:?}", self.program, self.shell_args, command);

        let output = Command::new(&self.program)
            .args(&self.shell_args)
            .stdin(Stdio::from(stdin))
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .map_err(|e| TelemetryError::Channel(format!("failed to run {}: {}", self.program, e)))?;

        if require_success && !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(TelemetryError::Channel(format!(
                "{} exited with {}: {}",
                self.program,
                output.status,
                stderr.trim()
            )));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        Ok(stdout.trim_end().to_string())
    }

    fn list_connected(&self) -> Option<String> {
        let output = match Command::new(&self.program).args(&self.list_args).output() {
            Ok(output) => output,
            Err(e) => {
                warn!("  Device enumeration failed to start: {}", e);
                return None;
            }
        };

        if !output.status.success() {
            warn!(
                "  Device enumeration failed: {}",
                String::from_utf8_lossy(&output.stderr).trim()
            );
            return None;
        }

        Some(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }
}

/// Wraps a channel so at most one command or batch is in flight at a time.
#[derive(Debug)]
pub struct SerializedChannel<C> {
    inner: C,
    gate: Mutex<()>,
}

impl<C: Channel> SerializedChannel<C> {
    pub fn new(inner: C) -> Self {
        Self {
            inner,
            gate: Mutex::new(()),
        }
    }

    pub fn inner(&self) -> &C {
        &self.inner
    }
}

impl<C: Channel> Channel for SerializedChannel<C> {
    fn execute(&self, command: &str, require_success: bool) -> Result<String> {
        let _guard = self.gate.lock().unwrap_or_else(PoisonError::into_inner);
        self.inner.execute(command, require_success)
    }

    fn list_connected(&self) -> Option<String> {
        let _guard = self.gate.lock().unwrap_or_else(PoisonError::into_inner);
        self.inner.list_connected()
    }

    fn execute_batch(&self, commands: &[&str]) -> Vec<String> {
        let _guard = self.gate.lock().unwrap_or_else(PoisonError::into_inner);
        self.inner.execute_batch(commands)
    }
}
