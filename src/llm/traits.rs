//! LLM 客户端抽象
//!
//! 所有后端（OpenAI 兼容 / DeepSeek / Mock / 超时包装）实现 LlmClient::complete（非流式）。
//! Reflexion 循环即使向调用方流式推送进度，也只需要一次请求 / 一次响应。

use async_trait::async_trait;

use crate::llm::Message;

/// 单次补全的生成参数
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionOptions {
    pub temperature: f32,
    pub max_tokens: u32,
    /// 覆盖后端默认模型；None 时使用客户端自身配置的模型
    pub model_name: Option<String>,
}

impl Default for CompletionOptions {
    fn default() -> Self {
        Self {
            temperature: 0.7,
            max_tokens: 2000,
            model_name: None,
        }
    }
}

impl CompletionOptions {
    /// 同一组参数但替换温度（Evaluator 使用固定低温）
    pub fn with_temperature(&self, temperature: f32) -> Self {
        Self {
            temperature,
            ..self.clone()
        }
    }
}

/// LLM 客户端 trait：给定消息与生成参数，返回补全文本
#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn complete(
        &self,
        messages: &[Message],
        options: &CompletionOptions,
    ) -> Result<String, String>;

    /// 获取累计 token 使用统计：(prompt_tokens, completion_tokens, total_tokens)
    /// 默认返回 (0, 0, 0)，具体实现可覆盖
    fn token_usage(&self) -> (u64, u64, u64) {
        (0, 0, 0)
    }
}
