// Console transport for the demo host: outbound actions print to stdout in
// the shape a chat connection would deliver them.

use std::time::Duration;

use async_trait::async_trait;

use crate::core::chat::{ChatUser, Transport};

pub struct ConsoleTransport;

#[async_trait]
impl Transport for ConsoleTransport {
    async fn send_channel_message(&self, text: &str, channel: &str) {
        println!("[#{channel}] {text}");
    }

    async fn send_user_whisper(&self, text: &str, user: &ChatUser) {
        println!("[whisper -> {user}] {text}");
    }

    async fn send_timeout(&self, channel: &str, user: &ChatUser, duration: Duration) {
        println!("[#{channel}] {user} timed out for {}s", duration.as_secs());
    }
}
