//! Append-only log of chat messages received by the daemon.

use std::collections::VecDeque;
use std::fs::{File, OpenOptions};
use std::io::{self, BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use tracing::warn;

use crate::error::StoreError;
use crate::files::ensure_private_dir;
use crate::session::SteamId;

const MESSAGES_TARGET: &str = "steam_state::messages";
const TAIL_PREALLOC: usize = 256;

/// One received chat message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IncomingMessage {
    /// Sender's account identity.
    pub sender: SteamId,
    /// Message text.
    pub message: String,
    /// When the message was observed locally.
    #[serde(with = "time::serde::rfc3339")]
    pub received_at: OffsetDateTime,
}

impl IncomingMessage {
    /// Captures a message received now.
    #[must_use]
    pub fn now(sender: SteamId, message: impl Into<String>) -> Self {
        Self {
            sender,
            message: message.into(),
            received_at: OffsetDateTime::now_utc(),
        }
    }
}

/// Newline-delimited JSON file of [`IncomingMessage`] records.
#[derive(Debug, Clone)]
pub struct MessageLog {
    path: PathBuf,
}

impl MessageLog {
    /// Binds the log to `path`.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Returns the file backing the log.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Appends one message as a single JSON line.
    pub fn append(&self, message: &IncomingMessage) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            ensure_private_dir(parent).map_err(|source| StoreError::Directory {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        let mut line = serde_json::to_vec(message).map_err(|source| StoreError::Serialise {
            path: self.path.clone(),
            source,
        })?;
        line.push(b'\n');

        let mut options = OpenOptions::new();
        options.create(true).append(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(0o600);
        }
        let write_err = |source: io::Error| StoreError::Write {
            path: self.path.clone(),
            source,
        };
        let mut file = options.open(&self.path).map_err(write_err)?;
        file.write_all(&line).map_err(write_err)
    }

    /// Reads every well-formed message, oldest first.
    ///
    /// A missing log is empty. Malformed lines are skipped with a warning so
    /// a torn trailing write does not hide earlier messages.
    pub fn read_all(&self) -> Result<Vec<IncomingMessage>, StoreError> {
        let mut messages = Vec::new();
        self.scan(|message| messages.push(message))?;
        Ok(messages)
    }

    /// Reads the most recent `limit` messages, oldest first.
    ///
    /// The log is streamed; at most `limit` records are held at once.
    pub fn tail(&self, limit: usize) -> Result<Vec<IncomingMessage>, StoreError> {
        if limit == 0 {
            return Ok(Vec::new());
        }
        let mut recent = VecDeque::with_capacity(limit.min(TAIL_PREALLOC));
        self.scan(|message| {
            if recent.len() == limit {
                recent.pop_front();
            }
            recent.push_back(message);
        })?;
        Ok(recent.into())
    }

    /// Feeds each well-formed record to `visit`, one line at a time.
    ///
    /// Lines are decoded lossily so a stray invalid byte only affects the
    /// record it sits in.
    fn scan(&self, mut visit: impl FnMut(IncomingMessage)) -> Result<(), StoreError> {
        let read_err = |source: io::Error| StoreError::Read {
            path: self.path.clone(),
            source,
        };
        let file = match File::open(&self.path) {
            Ok(file) => file,
            Err(error) if error.kind() == io::ErrorKind::NotFound => return Ok(()),
            Err(source) => return Err(read_err(source)),
        };
        let mut reader = BufReader::new(file);
        let mut buffer = Vec::new();
        let mut line_number = 0_usize;
        loop {
            buffer.clear();
            if reader.read_until(b'\n', &mut buffer).map_err(read_err)? == 0 {
                return Ok(());
            }
            line_number += 1;
            let line = String::from_utf8_lossy(&buffer);
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str(&line) {
                Ok(message) => visit(message),
                Err(error) => warn!(
                    target: MESSAGES_TARGET,
                    path = %self.path.display(),
                    line = line_number,
                    %error,
                    "skipping malformed message record"
                ),
            }
        }
    }
}
