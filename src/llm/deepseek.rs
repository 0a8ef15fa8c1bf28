//! DeepSeek 后端：复用 OpenAiClient，只固定 base_url 与默认模型
//!
//! Actor / Evaluator / Reflector 共用同一个客户端；Evaluator 的低温与请求的 model_name 覆盖都通过 CompletionOptions 传入。

use crate::llm::OpenAiClient;

pub const DEEPSEEK_BASE_URL: &str = "https://api.deepseek.com";
pub const DEEPSEEK_CHAT: &str = "deepseek-chat";

/// Key 取 `DEEPSEEK_API_KEY`，缺省时退回 `OPENAI_API_KEY`
///
/// 模型：参数（来自 [llm.deepseek].model 或 [llm].model）> `DEEPSEEK_MODEL` > deepseek-chat
pub fn create_deepseek_client(model: Option<&str>) -> OpenAiClient {
    let api_key = std::env::var("DEEPSEEK_API_KEY")
        .or_else(|_| std::env::var("OPENAI_API_KEY"))
        .unwrap_or_else(|_| "sk-placeholder".to_string());
    let model = match model {
        Some(m) => m.to_string(),
        None => std::env::var("DEEPSEEK_MODEL").unwrap_or_else(|_| DEEPSEEK_CHAT.to_string()),
    };
    tracing::debug!(model = %model, "creating DeepSeek client");
    OpenAiClient::new(Some(DEEPSEEK_BASE_URL), &model, Some(&api_key))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::LlmClient;

    #[test]
    fn test_fresh_client_reports_no_usage() {
        let client = create_deepseek_client(Some(DEEPSEEK_CHAT));
        assert_eq!(client.token_usage(), (0, 0, 0));
    }
}
