//! Message hooks backed by a line file
//!
//! The router reads the file one line at a time and starts over after the
//! last line. Every routed and every worked line is counted in the store.

use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::fs::File;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::Mutex;

use coordinator::{CoordinatorResult, MessageHooks, StoreKeys};
use shared::CoordinationStore;

pub struct LineFileHooks<S: CoordinationStore> {
    store: Arc<S>,
    routed: String,
    worked: String,
    input_file: PathBuf,
    reader: Mutex<Option<BufReader<File>>>,
}

impl<S: CoordinationStore> LineFileHooks<S> {
    pub fn new(store: Arc<S>, keys: &StoreKeys, input_file: PathBuf) -> Self {
        Self {
            store,
            routed: keys.custom("routed"),
            worked: keys.custom("worked"),
            input_file,
            reader: Mutex::new(None),
        }
    }

    /// Hash counting routed lines
    pub fn routed_key(&self) -> &str {
        &self.routed
    }

    /// Hash counting worked lines
    pub fn worked_key(&self) -> &str {
        &self.worked
    }
}

#[async_trait]
impl<S: CoordinationStore> MessageHooks for LineFileHooks<S> {
    async fn next_message(&self) -> CoordinatorResult<Option<String>> {
        let mut reader = self.reader.lock().await;
        if reader.is_none() {
            let file = File::open(&self.input_file).await?;
            *reader = Some(BufReader::new(file));
        }
        let Some(lines) = reader.as_mut() else {
            return Ok(None);
        };

        let mut line = String::new();
        if lines.read_line(&mut line).await? == 0 {
            // Start over on the next call
            *reader = None;
            return Ok(None);
        }
        let message = line.trim_end_matches(&['\n', '\r'][..]).to_string();
        self.store.hincrby(&self.routed, &message, 1).await?;
        Ok(Some(message))
    }

    fn affinity_key(&self, message: &str) -> Option<String> {
        message.chars().next().map(String::from)
    }

    async fn process(&self, message: &str) -> CoordinatorResult<()> {
        self.store.hincrby(&self.worked, message, 1).await?;
        Ok(())
    }
}
