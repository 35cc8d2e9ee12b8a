//! Client configuration.
//!
//! ```ignore
//! let config = ClientConfig::default().with_database("shop").with_batch_size(500);
//! let config = ClientConfig::from_json(r#"{"database": "shop", "cursor_ttl": 60}"#)?;
//! ```

use serde::{Deserialize, Serialize};

use crate::error::ArangoResult;

/// Settings shared by every request a [`Database`](crate::database::Database) issues.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct ClientConfig {
    /// Database every request path is prefixed with.
    pub database: String,
    /// Rows per cursor batch; the server default when unset.
    pub batch_size: Option<u32>,
    /// Seconds an idle server cursor stays alive; the server default when unset.
    pub cursor_ttl: Option<u32>,
    /// Ask the server for the total number of result rows.
    pub count: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            database: "_system".to_string(),
            batch_size: None,
            cursor_ttl: None,
            count: false,
        }
    }
}

impl ClientConfig {
    pub fn from_json(json: &str) -> ArangoResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn with_database(mut self, database: impl Into<String>) -> Self {
        self.database = database.into();
        self
    }

    pub fn with_batch_size(mut self, batch_size: u32) -> Self {
        self.batch_size = Some(batch_size);
        self
    }

    pub fn with_cursor_ttl(mut self, seconds: u32) -> Self {
        self.cursor_ttl = Some(seconds);
        self
    }

    pub fn with_count(mut self, count: bool) -> Self {
        self.count = count;
        self
    }
}
