// In-memory settings store. Good enough for the demo host and tests; a
// deployment swaps in a database-backed implementation of the same trait.

use async_trait::async_trait;
use dashmap::DashMap;

use crate::core::bootstrap::SettingsStore;

#[derive(Default)]
pub struct MemorySettings {
    values: DashMap<(String, String), String>,
}

impl MemorySettings {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SettingsStore for MemorySettings {
    async fn get(&self, channel: &str, key: &str) -> anyhow::Result<Option<String>> {
        Ok(self
            .values
            .get(&(channel.to_string(), key.to_string()))
            .map(|entry| entry.value().clone()))
    }

    async fn set(&self, channel: &str, key: &str, value: &str) -> anyhow::Result<()> {
        self.values
            .insert((channel.to_string(), key.to_string()), value.to_string());
        Ok(())
    }
}
