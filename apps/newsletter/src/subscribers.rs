//! Subscriber list kept in a JSON file.
//!
//! ```json
//! [
//!   {"email": "ada@example.com", "tags": ["rust"], "confirmed": true},
//!   {"email": "bob@example.com", "confirmed": false}
//! ]
//! ```

use async_trait::async_trait;
use email::{DirectoryError, SubscriberDirectory};
use serde::Deserialize;
use std::path::PathBuf;
use tracing::debug;

#[derive(Debug, Clone, Deserialize)]
struct Subscriber {
    email: String,
    #[serde(default)]
    tags: Vec<String>,
    #[serde(default)]
    confirmed: bool,
}

impl Subscriber {
    fn matches(&self, tags: &[String]) -> bool {
        self.confirmed && (tags.is_empty() || self.tags.iter().any(|t| tags.contains(t)))
    }
}

/// Reads the file on every lookup so edits apply without a restart
pub struct JsonFileDirectory {
    path: PathBuf,
}

impl JsonFileDirectory {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl SubscriberDirectory for JsonFileDirectory {
    async fn resolve(&self, tags: &[String]) -> Result<Vec<String>, DirectoryError> {
        let raw = tokio::fs::read(&self.path).await.map_err(|e| {
            DirectoryError::Unavailable(format!("{}: {}", self.path.display(), e))
        })?;

        let subscribers: Vec<Subscriber> = serde_json::from_slice(&raw).map_err(|e| {
            DirectoryError::Malformed(format!("{}: {}", self.path.display(), e))
        })?;

        let emails: Vec<String> = subscribers
            .into_iter()
            .filter(|s| s.matches(tags))
            .map(|s| s.email)
            .collect();

        debug!(tags = ?tags, count = emails.len(), "Resolved subscribers");

        Ok(emails)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_fixture(name: &str, contents: &str) -> PathBuf {
        let path = std::env::temp_dir().join(format!(
            "newsletter-{}-{}.json",
            name,
            std::process::id()
        ));
        std::fs::write(&path, contents).unwrap();
        path
    }

    const SUBSCRIBERS: &str = r#"[
        {"email": "ada@example.com", "tags": ["rust", "web"], "confirmed": true},
        {"email": "bob@example.com", "tags": ["go"], "confirmed": true},
        {"email": "eve@example.com", "tags": ["rust"], "confirmed": false},
        {"email": "cyd@example.com", "confirmed": true}
    ]"#;

    #[tokio::test]
    async fn test_empty_tags_mean_every_confirmed_subscriber() {
        let path = write_fixture("all", SUBSCRIBERS);

        let emails = JsonFileDirectory::new(&path).resolve(&[]).await.unwrap();

        assert_eq!(emails, vec!["ada@example.com", "bob@example.com", "cyd@example.com"]);
        std::fs::remove_file(path).ok();
    }

    #[tokio::test]
    async fn test_tags_filter_confirmed_subscribers() {
        let path = write_fixture("tags", SUBSCRIBERS);

        let emails = JsonFileDirectory::new(&path)
            .resolve(&["rust".to_string(), "go".to_string()])
            .await
            .unwrap();

        assert_eq!(emails, vec!["ada@example.com", "bob@example.com"]);
        std::fs::remove_file(path).ok();
    }

    #[tokio::test]
    async fn test_missing_file_is_unavailable() {
        let err = JsonFileDirectory::new("/nonexistent/subscribers.json")
            .resolve(&[])
            .await
            .unwrap_err();

        assert!(matches!(err, DirectoryError::Unavailable(_)));
    }

    #[tokio::test]
    async fn test_invalid_json_is_malformed() {
        let path = write_fixture("malformed", "{not json");

        let err = JsonFileDirectory::new(&path).resolve(&[]).await.unwrap_err();

        assert!(matches!(err, DirectoryError::Malformed(_)));
        std::fs::remove_file(path).ok();
    }
}
