//! Reflexion 运行错误
//!
//! 三类：请求校验失败（任何试验开始前）、上游补全服务失败（立即终止，不重试）、取消。
//! 解析降级不是错误，由各解析器以默认值替代。

use std::fmt;

use serde::Serialize;
use thiserror::Error;

/// 上游调用所处阶段
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Actor,
    Evaluator,
    Reflector,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Actor => write!(f, "actor"),
            Stage::Evaluator => write!(f, "evaluator"),
            Stage::Reflector => write!(f, "reflector"),
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ReflexionError {
    /// TaskRequest 不合法：缺少任务描述、评估标准为空、max_trials < 1 等
    #[error("Validation error: {0}")]
    Validation(String),

    /// 补全服务调用失败（含超时），附带失败阶段与试验序号
    #[error("Upstream error in {stage} (trial {trial}): {message}")]
    Upstream {
        stage: Stage,
        trial: u32,
        message: String,
    },

    #[error("Cancelled")]
    Cancelled,

    #[error("Config error: {0}")]
    Config(String),
}

impl ReflexionError {
    pub fn upstream(stage: Stage, trial: u32, message: impl Into<String>) -> Self {
        Self::Upstream {
            stage,
            trial,
            message: message.into(),
        }
    }
}
