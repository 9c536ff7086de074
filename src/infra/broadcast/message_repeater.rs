// Rotating channel broadcaster. Holds an operator-managed message list and
// posts the next entry on a fixed interval while enabled.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tokio::time;

use crate::core::chat::Transport;
use crate::core::commands::PeriodicBroadcaster;

const DEFAULT_FREQUENCY_SECS: u64 = 300;

pub struct MessageRepeater {
    channel: String,
    transport: Arc<dyn Transport>,
    messages: Mutex<Vec<String>>,
    cursor: AtomicU64,
    started: AtomicBool,
    enabled: AtomicBool,
    frequency_secs: AtomicU64,
}

impl MessageRepeater {
    /// Creates the repeater and spawns its posting loop. The loop idles
    /// until `start` is called and exits once every handle is dropped.
    pub fn new(channel: impl Into<String>, transport: Arc<dyn Transport>) -> Arc<Self> {
        let repeater = Arc::new(Self {
            channel: channel.into(),
            transport,
            messages: Mutex::new(Vec::new()),
            cursor: AtomicU64::new(0),
            started: AtomicBool::new(false),
            enabled: AtomicBool::new(true),
            frequency_secs: AtomicU64::new(DEFAULT_FREQUENCY_SECS),
        });
        let weak = Arc::downgrade(&repeater);
        tokio::spawn(run_loop(weak));
        repeater
    }

    /// Posts the next message in rotation, if running and non-empty.
    async fn tick(&self) {
        if !self.started.load(Ordering::Relaxed) || !self.enabled.load(Ordering::Relaxed) {
            return;
        }
        let text = {
            let messages = self.messages.lock().await;
            if messages.is_empty() {
                return;
            }
            let index = self.cursor.fetch_add(1, Ordering::Relaxed) as usize % messages.len();
            messages[index].clone()
        };
        self.transport
            .send_channel_message(&text, &self.channel)
            .await;
    }
}

async fn run_loop(weak: Weak<MessageRepeater>) {
    loop {
        let frequency = match weak.upgrade() {
            Some(repeater) => repeater.frequency_secs.load(Ordering::Relaxed),
            None => break,
        };
        time::sleep(Duration::from_secs(frequency)).await;
        match weak.upgrade() {
            Some(repeater) => repeater.tick().await,
            None => break,
        }
    }
}

#[async_trait]
impl PeriodicBroadcaster for MessageRepeater {
    async fn start(&self) {
        self.started.store(true, Ordering::Relaxed);
    }

    async fn set_frequency(&self, seconds: u32) {
        self.frequency_secs.store(seconds as u64, Ordering::Relaxed);
    }

    async fn toggle_enabled(&self) {
        self.enabled.fetch_xor(true, Ordering::Relaxed);
    }

    async fn add_message(&self, text: &str) -> String {
        self.messages.lock().await.push(text.to_string());
        format!("Added message: {text}")
    }

    async fn clear_last(&self) -> String {
        match self.messages.lock().await.pop() {
            Some(_) => "Last message removed.".to_string(),
            None => "No messages to remove.".to_string(),
        }
    }

    async fn clear_all(&self) -> String {
        self.messages.lock().await.clear();
        "All messages removed.".to_string()
    }
}
