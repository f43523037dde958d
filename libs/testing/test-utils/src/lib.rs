//! Shared test utilities
//!
//! - `TestHttpServer`: local HTTP server with scripted responses that records
//!   every request it receives. Point a provider's base URL at it to test wire
//!   formats, retries and error mapping without leaving the machine.
//! - `TestDataBuilder`: deterministic addresses and names derived from the test name.
//!
//! # Usage
//!
//! ```rust,ignore
//! use test_utils::{MockResponse, TestHttpServer};
//!
//! #[tokio::test]
//! async fn retries_on_503() {
//!     let server = TestHttpServer::start(vec![
//!         MockResponse::status(503),
//!         MockResponse::status(202).with_header("x-message-id", "abc"),
//!     ])
//!     .await;
//!
//!     // ... configure the client with server.base_url() ...
//!     assert_eq!(server.request_count(), 2);
//! }
//! ```

mod http;

pub use http::{MockResponse, RecordedRequest, TestHttpServer};

/// Builder for test data with deterministic values
pub struct TestDataBuilder {
    seed: u64,
}

impl TestDataBuilder {
    pub fn new(seed: u64) -> Self {
        Self { seed }
    }

    /// Create from test name (seed is the hash of the name)
    pub fn from_test_name(name: &str) -> Self {
        use std::collections::hash_map::DefaultHasher;
        use std::hash::{Hash, Hasher};

        let mut hasher = DefaultHasher::new();
        name.hash(&mut hasher);
        Self::new(hasher.finish())
    }

    /// A unique, deterministic email address
    ///
    /// ```
    /// use test_utils::TestDataBuilder;
    ///
    /// let builder = TestDataBuilder::new(7);
    /// assert_eq!(builder.email("subscriber", 1), "subscriber-7-1@example.com");
    /// ```
    pub fn email(&self, prefix: &str, index: usize) -> String {
        format!("{}-{}-{}@example.com", prefix, self.seed, index)
    }

    /// `count` distinct addresses sharing a prefix
    pub fn emails(&self, prefix: &str, count: usize) -> Vec<String> {
        (0..count).map(|i| self.email(prefix, i)).collect()
    }

    /// A unique name for subjects, tags and similar labels
    pub fn name(&self, prefix: &str, suffix: &str) -> String {
        format!("test-{}-{}-{}", prefix, self.seed, suffix)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_data_builder_deterministic() {
        let builder1 = TestDataBuilder::from_test_name("my_test");
        let builder2 = TestDataBuilder::from_test_name("my_test");

        assert_eq!(builder1.emails("user", 3), builder2.emails("user", 3));
        assert_eq!(builder1.name("subject", "a"), builder2.name("subject", "a"));
    }

    #[test]
    fn test_data_builder_different_names() {
        let builder1 = TestDataBuilder::from_test_name("test1");
        let builder2 = TestDataBuilder::from_test_name("test2");

        assert_ne!(builder1.email("user", 0), builder2.email("user", 0));
    }

    #[test]
    fn test_emails_are_distinct() {
        let emails = TestDataBuilder::new(1).emails("user", 5);
        let mut deduped = emails.clone();
        deduped.dedup();
        assert_eq!(emails.len(), 5);
        assert_eq!(deduped, emails);
    }
}
