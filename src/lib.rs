//! Bee Reflexion - Rust Reflexion 试验循环
//!
//! 模块划分：
//! - **agent**: 无头运行时（从配置构建 LLM 与编排器，运行 TaskRequest）
//! - **config**: 应用配置加载（TOML + 环境变量）
//! - **core**: 错误类型
//! - **llm**: 补全服务抽象与实现（OpenAI 兼容 / DeepSeek / Mock / 超时包装）
//! - **observability**: 日志初始化
//! - **reflexion**: Actor、Evaluator、Reflector、有界记忆、响应解析、试验主循环与进度事件

pub mod agent;
pub mod config;
pub mod core;
pub mod llm;
pub mod observability;
pub mod reflexion;

pub use reflexion::{ReflexionEvent, TaskRequest, TaskResult, TrialOrchestrator};
