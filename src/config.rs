//! 应用配置：从 config/default.toml 与环境变量加载
//!
//! 加载顺序：先读 TOML 文件，再用环境变量 `BEE__*` 覆盖（双下划线表示嵌套，如 `BEE__REFLEXION__MAX_TRIALS=5`）。

use std::path::PathBuf;

use serde::Deserialize;

use crate::core::ReflexionError;
use crate::reflexion::TaskDefaults;

/// 应用配置根（对应 config/default.toml 的顶层）
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    #[serde(default)]
    pub llm: LlmSection,
    #[serde(default)]
    pub reflexion: ReflexionSection,
}

/// [llm] 段：后端选择与超时
#[derive(Debug, Clone, Deserialize)]
pub struct LlmSection {
    /// 后端：deepseek / openai / mock；优先级由 API Key 与 provider 共同决定
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default = "default_model")]
    pub model: String,
    pub base_url: Option<String>,
    #[serde(default)]
    pub deepseek: LlmDeepSeekSection,
    #[serde(default)]
    pub openai: LlmOpenAiSection,
    #[serde(default)]
    pub timeouts: LlmTimeoutsSection,
}

impl Default for LlmSection {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: default_model(),
            base_url: None,
            deepseek: LlmDeepSeekSection::default(),
            openai: LlmOpenAiSection::default(),
            timeouts: LlmTimeoutsSection::default(),
        }
    }
}

fn default_provider() -> String {
    "deepseek".to_string()
}

fn default_model() -> String {
    "deepseek-chat".to_string()
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct LlmDeepSeekSection {
    pub model: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct LlmOpenAiSection {
    pub model: Option<String>,
}

/// [llm.timeouts] 段：单次补全超时（秒），0 表示不设超时
#[derive(Debug, Clone, Deserialize)]
pub struct LlmTimeoutsSection {
    #[serde(default = "default_request_timeout")]
    pub request: u64,
}

impl Default for LlmTimeoutsSection {
    fn default() -> Self {
        Self {
            request: default_request_timeout(),
        }
    }
}

fn default_request_timeout() -> u64 {
    60
}

/// [reflexion] 段：请求未指定时的默认值，以及评估温度
#[derive(Debug, Clone, Deserialize)]
pub struct ReflexionSection {
    #[serde(default = "default_max_trials")]
    pub max_trials: u32,
    #[serde(default = "default_memory_window")]
    pub memory_window: usize,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    /// Evaluator 固定使用的温度，与请求温度无关
    #[serde(default = "default_evaluation_temperature")]
    pub evaluation_temperature: f32,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    pub model_name: Option<String>,
}

impl Default for ReflexionSection {
    fn default() -> Self {
        Self {
            max_trials: default_max_trials(),
            memory_window: default_memory_window(),
            temperature: default_temperature(),
            evaluation_temperature: default_evaluation_temperature(),
            max_tokens: default_max_tokens(),
            model_name: None,
        }
    }
}

fn default_max_trials() -> u32 {
    3
}

fn default_memory_window() -> usize {
    3
}

fn default_temperature() -> f32 {
    0.7
}

fn default_evaluation_temperature() -> f32 {
    crate::reflexion::DEFAULT_EVALUATION_TEMPERATURE
}

fn default_max_tokens() -> u32 {
    2000
}

impl From<&ReflexionSection> for TaskDefaults {
    fn from(s: &ReflexionSection) -> Self {
        TaskDefaults {
            max_trials: s.max_trials,
            memory_window: s.memory_window,
            temperature: s.temperature,
            max_tokens: s.max_tokens,
            model_name: s.model_name.clone(),
        }
    }
}

/// 从 config 目录加载配置，环境变量 BEE__* 可覆盖
///
/// 1. 按顺序查找 config/default.toml、../config/default.toml、default.toml，找到则作为第一源
/// 2. 若传入 config_path 且文件存在，则追加该文件（可覆盖前面的键）
/// 3. 最后叠加环境变量 BEE__*（双下划线表示嵌套键）
///
/// 文件无法解析或字段类型不符时返回 ReflexionError::Config
pub fn load_config(config_path: Option<PathBuf>) -> Result<AppConfig, ReflexionError> {
    let mut builder = config::Config::builder();

    let default_names = ["config/default", "../config/default", "default"];
    for name in default_names {
        let path = format!("{}.toml", name);
        if std::path::Path::new(&path).exists() {
            builder = builder.add_source(config::File::with_name(name).required(false));
            break;
        }
    }

    if let Some(ref path) = config_path {
        if path.exists() {
            builder = builder.add_source(config::File::from(path.clone()).required(false));
        }
    }

    builder = builder.add_source(
        config::Environment::with_prefix("BEE")
            .separator("__")
            .try_parsing(true),
    );

    builder
        .build()
        .and_then(|c| c.try_deserialize())
        .map_err(|e| ReflexionError::Config(e.to_string()))
}
