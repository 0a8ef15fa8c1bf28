//! Mock LLM 客户端（用于测试，无需 API）
//!
//! 按脚本顺序返回预设回复（Ok / Err），并记录每次调用的消息与参数，便于断言温度、Prompt 内容。
//! 脚本耗尽后返回一段不含任何标记的普通文本，触发各解析器的降级路径。

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::llm::{CompletionOptions, LlmClient, Message};

/// 脚本耗尽时的回复
pub const MOCK_FALLBACK_RESPONSE: &str = "Mock LLM: no scripted response left.";

/// 一次被记录的调用
#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub messages: Vec<Message>,
    pub options: CompletionOptions,
}

impl RecordedCall {
    /// system 消息内容（不存在时为空串）
    pub fn system(&self) -> &str {
        self.find(crate::llm::Role::System)
    }

    /// 最后一条 user 消息内容
    pub fn user(&self) -> &str {
        self.find(crate::llm::Role::User)
    }

    fn find(&self, role: crate::llm::Role) -> &str {
        self.messages
            .iter()
            .rev()
            .find(|m| m.role == role)
            .map(|m| m.content.as_str())
            .unwrap_or("")
    }
}

/// Mock 客户端：脚本化回复 + 调用记录
#[derive(Debug, Default)]
pub struct MockLlmClient {
    script: Mutex<VecDeque<Result<String, String>>>,
    calls: Mutex<Vec<RecordedCall>>,
}

impl MockLlmClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// 以一组成功回复初始化脚本
    pub fn with_responses<I, S>(responses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mock = Self::new();
        for r in responses {
            mock.push_response(r);
        }
        mock
    }

    pub fn push_response(&self, response: impl Into<String>) {
        if let Ok(mut script) = self.script.lock() {
            script.push_back(Ok(response.into()));
        }
    }

    /// 追加一次失败（模拟上游错误）
    pub fn push_error(&self, error: impl Into<String>) {
        if let Ok(mut script) = self.script.lock() {
            script.push_back(Err(error.into()));
        }
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().map(|c| c.len()).unwrap_or(0)
    }
}

#[async_trait]
impl LlmClient for MockLlmClient {
    async fn complete(
        &self,
        messages: &[Message],
        options: &CompletionOptions,
    ) -> Result<String, String> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(RecordedCall {
                messages: messages.to_vec(),
                options: options.clone(),
            });
        }
        let next = self.script.lock().ok().and_then(|mut s| s.pop_front());
        next.unwrap_or_else(|| Ok(MOCK_FALLBACK_RESPONSE.to_string()))
    }
}
