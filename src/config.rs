use serde::{Deserialize, Serialize};
use std::time::Duration;
use typed_builder::TypedBuilder;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, TypedBuilder)]
#[serde(default)]
pub struct SessionConfig {
    /// capacity of the local task queue feeding the session
    #[builder(default = 32)]
    pub task_buffer: usize,
    /// how many candidate names may be fetched at the same time
    #[builder(default = 8)]
    pub read_concurrency: usize,
    /// total attempts of a read family before the session settles in an error
    #[builder(default = 3)]
    pub read_attempts: u32,
    #[builder(default = 200)]
    pub retry_backoff_ms: u64,
    /// a larger candidate count is treated as a broken read
    #[builder(default = 1024)]
    pub max_candidates: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl SessionConfig {
    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }

    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }
}
