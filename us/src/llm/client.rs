//! LlmClient trait definition

use async_trait::async_trait;

use super::{CompletionRequest, CompletionResponse, LlmError};

/// Stateless text-generation client - each call is independent
///
/// The credential travels with each call rather than living in the client,
/// since the user can supply or replace it at any point in a session.
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Send a single completion request and wait for the full reply
    async fn complete(&self, credential: &str, request: CompletionRequest) -> Result<CompletionResponse, LlmError>;

    /// Model identifier, for logs and display
    fn model(&self) -> &str;
}

#[cfg(test)]
pub mod mock {
    use super::*;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tracing::debug;

    /// Scripted reply for the mock client
    #[derive(Debug, Clone)]
    pub enum MockReply {
        /// Successful response with this candidate text
        Text(String),
        /// HTTP error status with a message
        Status(u16, String),
        /// Response that could not be understood
        Invalid(String),
    }

    /// Mock LLM client for unit tests
    pub struct MockLlmClient {
        replies: Vec<MockReply>,
        call_count: AtomicUsize,
        requests: Mutex<Vec<(String, CompletionRequest)>>,
    }

    impl MockLlmClient {
        pub fn new(replies: Vec<MockReply>) -> Self {
            debug!(reply_count = %replies.len(), "MockLlmClient::new: called");
            Self {
                replies,
                call_count: AtomicUsize::new(0),
                requests: Mutex::new(Vec::new()),
            }
        }

        pub fn text(reply: impl Into<String>) -> Self {
            Self::new(vec![MockReply::Text(reply.into())])
        }

        pub fn call_count(&self) -> usize {
            self.call_count.load(Ordering::SeqCst)
        }

        /// Credentials and requests seen so far
        pub fn requests(&self) -> Vec<(String, CompletionRequest)> {
            self.requests.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl LlmClient for MockLlmClient {
        async fn complete(&self, credential: &str, request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
            debug!("MockLlmClient::complete: called");
            self.requests.lock().unwrap().push((credential.to_string(), request));
            let idx = self.call_count.fetch_add(1, Ordering::SeqCst);
            match self.replies.get(idx).cloned() {
                Some(MockReply::Text(text)) => Ok(CompletionResponse::text(text)),
                Some(MockReply::Status(429, _)) => Err(LlmError::RateLimited),
                Some(MockReply::Status(status, message)) => Err(LlmError::ApiError { status, message }),
                Some(MockReply::Invalid(message)) => Err(LlmError::InvalidResponse(message)),
                None => Err(LlmError::InvalidResponse("No more mock responses".to_string())),
            }
        }

        fn model(&self) -> &str {
            "mock"
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[tokio::test]
        async fn test_mock_client_returns_replies_in_order() {
            let client = MockLlmClient::new(vec![
                MockReply::Text("Response 1".to_string()),
                MockReply::Status(401, "bad key".to_string()),
            ]);

            let req = CompletionRequest::new("Test", 1000);
            let resp = client.complete("key", req.clone()).await.unwrap();
            assert_eq!(resp.content, Some("Response 1".to_string()));

            let err = client.complete("key", req).await.unwrap_err();
            assert_eq!(err.status(), Some(401));

            assert_eq!(client.call_count(), 2);
            assert_eq!(client.requests()[0].0, "key");
        }

        #[tokio::test]
        async fn test_mock_client_errors_when_exhausted() {
            let client = MockLlmClient::new(vec![]);
            let result = client.complete("key", CompletionRequest::new("Test", 10)).await;
            assert!(result.is_err());
        }
    }
}
