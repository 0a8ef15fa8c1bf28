//! LLM 层：补全服务抽象与实现（OpenAI 兼容 / DeepSeek / Mock / 超时包装）

pub mod deepseek;
pub mod message;
pub mod mock;
pub mod openai;
pub mod timeout;
pub mod traits;

pub use deepseek::{create_deepseek_client, DEEPSEEK_CHAT};
pub use message::{Message, Role};
pub use mock::{MockLlmClient, RecordedCall, MOCK_FALLBACK_RESPONSE};
pub use openai::{OpenAiClient, TokenUsage};
pub use timeout::TimeoutLlmClient;
pub use traits::{CompletionOptions, LlmClient};
