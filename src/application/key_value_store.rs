// Persistence trait for JSON blobs under fixed keys
use async_trait::async_trait;

pub const HISTORY_KEY: &str = "history";
pub const SETTINGS_KEY: &str = "settings";

#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, key: &str) -> anyhow::Result<Option<String>>;

    async fn put(&self, key: &str, value: &str) -> anyhow::Result<()>;
}
