//! 单次补全超时包装
//!
//! 试验循环内部不做重试；超时策略是显式参数：未包装即无超时（挂起的调用会阻塞整个运行），
//! 包装后每次 complete 超过时限即返回错误，由编排器按上游错误终止运行。

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::timeout;

use crate::llm::{CompletionOptions, LlmClient, Message};

/// 为任意 LlmClient 施加每次调用的超时
pub struct TimeoutLlmClient {
    inner: Arc<dyn LlmClient>,
    timeout: Duration,
}

impl TimeoutLlmClient {
    pub fn new(inner: Arc<dyn LlmClient>, timeout: Duration) -> Self {
        Self { inner, timeout }
    }

    /// timeout_secs 为 0 时不包装，直接返回原客户端
    pub fn wrap(inner: Arc<dyn LlmClient>, timeout_secs: u64) -> Arc<dyn LlmClient> {
        if timeout_secs == 0 {
            return inner;
        }
        Arc::new(Self::new(inner, Duration::from_secs(timeout_secs)))
    }
}

#[async_trait]
impl LlmClient for TimeoutLlmClient {
    async fn complete(
        &self,
        messages: &[Message],
        options: &CompletionOptions,
    ) -> Result<String, String> {
        match timeout(self.timeout, self.inner.complete(messages, options)).await {
            Ok(result) => result,
            Err(_) => {
                tracing::warn!(timeout_ms = self.timeout.as_millis() as u64, "LLM call timed out");
                Err(format!(
                    "completion timed out after {}ms",
                    self.timeout.as_millis()
                ))
            }
        }
    }

    fn token_usage(&self) -> (u64, u64, u64) {
        self.inner.token_usage()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::MockLlmClient;

    struct SlowClient;

    #[async_trait]
    impl LlmClient for SlowClient {
        async fn complete(
            &self,
            _messages: &[Message],
            _options: &CompletionOptions,
        ) -> Result<String, String> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok("late".to_string())
        }
    }

    #[tokio::test]
    async fn test_times_out_slow_call() {
        let client = TimeoutLlmClient::new(Arc::new(SlowClient), Duration::from_millis(20));
        let err = client
            .complete(&[Message::user("x")], &CompletionOptions::default())
            .await
            .unwrap_err();
        assert!(err.contains("timed out"));
    }

    #[tokio::test]
    async fn test_passes_through_fast_call() {
        let inner: Arc<dyn LlmClient> = Arc::new(MockLlmClient::with_responses(["ok"]));
        let client = TimeoutLlmClient::wrap(inner, 5);
        let out = client
            .complete(&[Message::user("x")], &CompletionOptions::default())
            .await
            .unwrap();
        assert_eq!(out, "ok");
    }
}
