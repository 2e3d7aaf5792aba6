// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Local trust store of server certificate fingerprints.
//!
//! The store is a single JSON object on disk mapping a server address to the
//! fingerprint the user trusted for it:
//!
//! ```json
//! { "10.0.0.1": "6A:1B:...:F0" }
//! ```

use std::collections::BTreeMap;
use std::fs;
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

use crate::error::{Result, SdkError};
use crate::tls::fingerprints_match;

/// Outcome of a fingerprint check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrustDecision {
    Trusted,
    Untrusted,
}

impl TrustDecision {
    pub fn is_trusted(&self) -> bool {
        matches!(self, TrustDecision::Trusted)
    }
}

/// Why the user is being asked about a fingerprint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrustPromptReason {
    /// Nothing is recorded for this server.
    Unknown,
    /// The recorded fingerprint differs from the presented one.
    Changed,
}

/// Certificate trust flags from the client configuration.
#[derive(Debug, Clone, Copy, Default)]
pub struct TrustPolicy {
    /// Skip all checks.
    pub ignore_server_certificate: bool,
    /// Accept a changed fingerprint without asking.
    pub accept_server_certificate: bool,
}

/// Decides whether an unrecognized fingerprint should be trusted.
pub trait TrustPrompt: Send + Sync {
    fn confirm(&self, server: &str, fingerprint: &str, reason: TrustPromptReason) -> bool;
}

impl<F> TrustPrompt for F
where
    F: Fn(&str, &str, TrustPromptReason) -> bool + Send + Sync,
{
    fn confirm(&self, server: &str, fingerprint: &str, reason: TrustPromptReason) -> bool {
        self(server, fingerprint, reason)
    }
}

/// Asks on the terminal: the question goes to stderr, the answer comes from stdin.
#[derive(Debug, Default, Clone, Copy)]
pub struct InteractivePrompt;

impl TrustPrompt for InteractivePrompt {
    fn confirm(&self, _server: &str, fingerprint: &str, reason: TrustPromptReason) -> bool {
        let mut stderr = io::stderr().lock();
        let notice = match reason {
            TrustPromptReason::Unknown => {
                "You currently do not have a record of this server's fingerprint.\n"
            }
            TrustPromptReason::Changed => {
                "The server's fingerprint is different from your local record of this server's fingerprint.\n\
                 You may be a victim of a Man-in-the-Middle attack, please beware.\n"
            }
        };
        let _ = write!(stderr, "{}", notice);
        let _ = writeln!(stderr, "Server's fingerprint: {}", fingerprint);
        let _ = writeln!(stderr, "Do you accept this fingerprint? [y/N]");
        let _ = stderr.flush();

        let mut answer = String::new();
        if io::stdin().lock().read_line(&mut answer).is_err() {
            return false;
        }
        matches!(answer.trim().to_lowercase().as_str(), "y" | "yes")
    }
}

/// Trusts every fingerprint it is asked about.
#[derive(Debug, Default, Clone, Copy)]
pub struct AcceptAll;

impl TrustPrompt for AcceptAll {
    fn confirm(&self, _: &str, _: &str, _: TrustPromptReason) -> bool {
        true
    }
}

/// Refuses every fingerprint it is asked about.
#[derive(Debug, Default, Clone, Copy)]
pub struct RejectAll;

impl TrustPrompt for RejectAll {
    fn confirm(&self, _: &str, _: &str, _: TrustPromptReason) -> bool {
        false
    }
}

/// JSON file of trusted fingerprints.
#[derive(Debug)]
pub struct FingerprintStore {
    path: PathBuf,
    // Serializes read-modify-write cycles within this process.
    lock: Mutex<()>,
}

impl FingerprintStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the whole store, creating an empty `{}` file when it is missing.
    pub fn load(&self) -> Result<BTreeMap<String, String>> {
        let _guard = self.lock.lock();
        self.read_locked()
    }

    /// Fingerprint recorded for `server`.
    pub fn get(&self, server: &str) -> Result<Option<String>> {
        Ok(self.load()?.remove(server))
    }

    /// Record `fingerprint` for `server`.
    ///
    /// Returns false when the same value was already stored and the file was
    /// left untouched.
    pub fn record(&self, server: &str, fingerprint: &str) -> Result<bool> {
        let _guard = self.lock.lock();
        let mut entries = self.read_locked()?;

        if entries.get(server).map(String::as_str) == Some(fingerprint) {
            return Ok(false);
        }
        entries.insert(server.to_string(), fingerprint.to_string());

        self.write_locked(&entries)?;
        debug!(server = %server, path = %self.path.display(), "fingerprint recorded");
        Ok(true)
    }

    /// Decide whether `presented` (probed from the live server) is trusted.
    ///
    /// `pinned` is the fingerprint the client currently holds in memory. When
    /// nothing is recorded for the server yet, `pinned` (or `presented` when
    /// nothing is pinned) becomes the record.
    pub fn verify(
        &self,
        server: &str,
        presented: &str,
        pinned: Option<&str>,
        policy: &TrustPolicy,
        prompt: &dyn TrustPrompt,
    ) -> Result<TrustDecision> {
        if policy.ignore_server_certificate {
            return Ok(TrustDecision::Trusted);
        }

        if let Some(pinned) = pinned.filter(|p| !p.is_empty())
            && fingerprints_match(pinned, presented)
        {
            return Ok(TrustDecision::Trusted);
        }

        let local = match self.get(server)? {
            Some(local) => local,
            None => {
                let bootstrap = pinned.filter(|p| !p.is_empty()).unwrap_or(presented);
                if !bootstrap.is_empty() {
                    info!(server = %server, "recording fingerprint on first use");
                    self.record(server, bootstrap)?;
                }
                bootstrap.to_string()
            }
        };

        if !local.is_empty() && fingerprints_match(&local, presented) {
            return Ok(TrustDecision::Trusted);
        }

        if presented.is_empty() {
            return Ok(TrustDecision::Untrusted);
        }

        if policy.accept_server_certificate {
            self.record(server, presented)?;
            return Ok(TrustDecision::Trusted);
        }

        let reason = if local.is_empty() {
            TrustPromptReason::Unknown
        } else {
            TrustPromptReason::Changed
        };
        if !prompt.confirm(server, presented, reason) {
            warn!(server = %server, "server fingerprint refused");
            return Ok(TrustDecision::Untrusted);
        }

        match self.record(server, presented) {
            Ok(_) => eprintln!("Fingerprint saved."),
            Err(e) => {
                warn!(error = %e, "could not save fingerprint");
                eprintln!("Could not save fingerprint to file. Continuing anyway.");
            }
        }
        Ok(TrustDecision::Trusted)
    }

    fn read_locked(&self) -> Result<BTreeMap<String, String>> {
        let data = match fs::read_to_string(&self.path) {
            Ok(data) => data,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                let entries = BTreeMap::new();
                self.write_locked(&entries)?;
                return Ok(entries);
            }
            Err(e) => return Err(self.io_error("read", e)),
        };

        serde_json::from_str(&data).map_err(|e| {
            SdkError::TrustStore(format!("{} is not a fingerprint map: {}", self.path.display(), e))
        })
    }

    /// Replace the file atomically: write a sibling temp file, then rename it
    /// over the store so readers never see a partial document.
    fn write_locked(&self, entries: &BTreeMap<String, String>) -> Result<()> {
        let dir = match self.path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir,
            _ => Path::new("."),
        };

        let mut file = NamedTempFile::new_in(dir).map_err(|e| self.io_error("write", e))?;
        serde_json::to_writer(&mut file, entries)?;
        file.as_file()
            .sync_all()
            .map_err(|e| self.io_error("write", e))?;
        file.persist(&self.path)
            .map_err(|e| self.io_error("replace", e.error))?;
        Ok(())
    }

    fn io_error(&self, action: &str, err: io::Error) -> SdkError {
        SdkError::TrustStore(format!("could not {} {}: {}", action, self.path.display(), err))
    }
}
