//! Reflexion 数据模型：任务、动作、轨迹、评估、反思、试验记录与最终结果
//!
//! 对外形状（TaskRequest / TaskResult 及其内嵌记录）使用 camelCase 序列化。

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::core::ReflexionError;
use crate::llm::CompletionOptions;
use crate::reflexion::memory::Memory;

/// 评估满分
pub const MAX_SCORE: u32 = 100;
/// 成功阈值（仅供参考；成功与否以 Evaluation.success 为准）
pub const SUCCESS_THRESHOLD: u32 = 80;

/// 任务类型：决定动作种类与观察反馈表
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskType {
    Decision,
    Reasoning,
    Programming,
    #[default]
    General,
}

impl fmt::Display for TaskType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskType::Decision => write!(f, "decision"),
            TaskType::Reasoning => write!(f, "reasoning"),
            TaskType::Programming => write!(f, "programming"),
            TaskType::General => write!(f, "general"),
        }
    }
}

impl std::str::FromStr for TaskType {
    type Err = ReflexionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "decision" => Ok(TaskType::Decision),
            "reasoning" => Ok(TaskType::Reasoning),
            "programming" => Ok(TaskType::Programming),
            "general" => Ok(TaskType::General),
            other => Err(ReflexionError::Validation(format!(
                "unknown task type: {}",
                other
            ))),
        }
    }
}

/// 请求未提供时使用的默认参数（来自配置 [reflexion] 段）
#[derive(Debug, Clone, PartialEq)]
pub struct TaskDefaults {
    pub max_trials: u32,
    pub memory_window: usize,
    pub temperature: f32,
    pub max_tokens: u32,
    pub model_name: Option<String>,
}

impl Default for TaskDefaults {
    fn default() -> Self {
        Self {
            max_trials: 3,
            memory_window: 3,
            temperature: 0.7,
            max_tokens: 2000,
            model_name: None,
        }
    }
}

/// 调用方输入
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskRequest {
    #[serde(default)]
    pub task: String,
    #[serde(default)]
    pub task_type: TaskType,
    /// 有符号以便把负数作为校验错误而不是反序列化错误报告
    pub max_trials: Option<i64>,
    #[serde(default)]
    pub evaluation_criteria: Vec<String>,
    pub memory_window: Option<i64>,
    pub temperature: Option<f32>,
    pub model_name: Option<String>,
    pub stream: Option<bool>,
}

impl TaskRequest {
    pub fn new(task: impl Into<String>, task_type: TaskType, criteria: Vec<String>) -> Self {
        Self {
            task: task.into(),
            task_type,
            evaluation_criteria: criteria,
            ..Default::default()
        }
    }

    pub fn with_max_trials(mut self, max_trials: i64) -> Self {
        self.max_trials = Some(max_trials);
        self
    }

    pub fn with_memory_window(mut self, memory_window: i64) -> Self {
        self.memory_window = Some(memory_window);
        self
    }

    pub fn streaming(&self) -> bool {
        self.stream.unwrap_or(false)
    }

    /// 校验请求并合并默认参数，得到本次运行不可变的 Task
    pub fn validate(&self, defaults: &TaskDefaults) -> Result<Task, ReflexionError> {
        let description = self.task.trim();
        if description.is_empty() {
            return Err(ReflexionError::Validation("task is required".to_string()));
        }

        let criteria: Vec<String> = self
            .evaluation_criteria
            .iter()
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty())
            .collect();
        if criteria.is_empty() {
            return Err(ReflexionError::Validation(
                "evaluationCriteria must contain at least one criterion".to_string(),
            ));
        }

        let max_trials = self.max_trials.unwrap_or(defaults.max_trials as i64);
        if max_trials < 1 {
            return Err(ReflexionError::Validation(format!(
                "maxTrials must be >= 1, got {}",
                max_trials
            )));
        }
        let max_trials = u32::try_from(max_trials).map_err(|_| {
            ReflexionError::Validation(format!("maxTrials too large: {}", max_trials))
        })?;

        let memory_window = self.memory_window.unwrap_or(defaults.memory_window as i64);
        if memory_window < 0 {
            return Err(ReflexionError::Validation(format!(
                "memoryWindow must be >= 0, got {}",
                memory_window
            )));
        }

        let temperature = self.temperature.unwrap_or(defaults.temperature);
        if !(0.0..=2.0).contains(&temperature) {
            return Err(ReflexionError::Validation(format!(
                "temperature must be within [0, 2], got {}",
                temperature
            )));
        }

        Ok(Task {
            description: description.to_string(),
            task_type: self.task_type,
            evaluation_criteria: criteria,
            max_trials,
            memory_window: memory_window as usize,
            temperature,
            max_tokens: defaults.max_tokens,
            model_name: self
                .model_name
                .clone()
                .filter(|m| !m.trim().is_empty())
                .or_else(|| defaults.model_name.clone()),
        })
    }
}

/// 一次运行的任务（校验后不可变）
#[derive(Debug, Clone, PartialEq)]
pub struct Task {
    pub description: String,
    pub task_type: TaskType,
    /// 顺序有意义：Evaluator 按此顺序输出 criteria_scores
    pub evaluation_criteria: Vec<String>,
    pub max_trials: u32,
    pub memory_window: usize,
    pub temperature: f32,
    pub max_tokens: u32,
    pub model_name: Option<String>,
}

impl Task {
    /// 本次运行配置的生成参数
    pub fn completion_options(&self) -> CompletionOptions {
        CompletionOptions {
            temperature: self.temperature,
            max_tokens: self.max_tokens,
            model_name: self.model_name.clone(),
        }
    }
}

/// 动作种类，由任务类型决定
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    Decide,
    Reason,
    Code,
    Act,
}

impl From<TaskType> for ActionKind {
    fn from(t: TaskType) -> Self {
        match t {
            TaskType::Decision => ActionKind::Decide,
            TaskType::Reasoning => ActionKind::Reason,
            TaskType::Programming => ActionKind::Code,
            TaskType::General => ActionKind::Act,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Action {
    pub kind: ActionKind,
    pub content: String,
    pub reasoning: String,
    pub timestamp: DateTime<Utc>,
}

/// 一次试验中 Actor 产生的动作 / 观察序列
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Trajectory {
    pub trial_number: u32,
    pub actions: Vec<Action>,
    pub observations: Vec<String>,
    pub final_output: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CriterionScore {
    pub criterion: String,
    pub score: u32,
    pub feedback: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Evaluation {
    pub trial_number: u32,
    pub reward_score: u32,
    pub max_score: u32,
    pub success_threshold: u32,
    /// 与 Task.evaluation_criteria 一一对应、顺序一致
    pub criteria_scores: Vec<CriterionScore>,
    pub overall_feedback: String,
    pub success: bool,
    /// 任一字段使用了默认值
    pub degraded: bool,
}

/// 失败试验后的结构化自我反思，作为下一次试验 Actor 的上下文
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reflection {
    pub trial_number: u32,
    pub source_trajectory: Trajectory,
    pub source_evaluation: Evaluation,
    pub insights: Vec<String>,
    pub improvements: Vec<String>,
    pub action_plan: String,
    pub learning_points: Vec<String>,
    pub degraded: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrialRecord {
    pub trajectory: Trajectory,
    pub evaluation: Evaluation,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reflection: Option<Reflection>,
}

/// 最终聚合结果（批量模式的返回值，流式模式 final_result 事件的载荷）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskResult {
    pub task: String,
    pub task_type: TaskType,
    pub trials: Vec<TrialRecord>,
    pub memory: Memory,
    pub final_result: String,
    pub success: bool,
    pub best_trial: u32,
    pub improvement_rate: f64,
    pub improved_over_time: bool,
    /// 毫秒
    pub total_time: u64,
    pub learning_curve: Vec<u32>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> TaskRequest {
        TaskRequest::new("Sort a list", TaskType::Programming, vec!["correctness".into()])
    }

    #[test]
    fn test_validate_applies_defaults() {
        let task = request().validate(&TaskDefaults::default()).unwrap();
        assert_eq!(task.max_trials, 3);
        assert_eq!(task.memory_window, 3);
        assert_eq!(task.evaluation_criteria, vec!["correctness".to_string()]);
    }

    #[test]
    fn test_validate_rejects_missing_task() {
        let mut req = request();
        req.task = "   ".into();
        assert!(matches!(
            req.validate(&TaskDefaults::default()),
            Err(ReflexionError::Validation(_))
        ));
    }

    #[test]
    fn test_validate_rejects_empty_criteria() {
        let mut req = request();
        req.evaluation_criteria = vec!["".into()];
        assert!(req.validate(&TaskDefaults::default()).is_err());
    }

    #[test]
    fn test_validate_rejects_zero_trials_and_negative_window() {
        let defaults = TaskDefaults::default();
        assert!(request().with_max_trials(0).validate(&defaults).is_err());
        assert!(request().with_memory_window(-1).validate(&defaults).is_err());
        assert!(request().with_memory_window(0).validate(&defaults).is_ok());
    }

    #[test]
    fn test_request_deserializes_camel_case() {
        let json = r#"{"task":"t","taskType":"reasoning","maxTrials":4,
            "evaluationCriteria":["a","b"],"memoryWindow":2,"stream":true}"#;
        let req: TaskRequest = serde_json::from_str(json).unwrap();
        assert_eq!(req.task_type, TaskType::Reasoning);
        assert_eq!(req.max_trials, Some(4));
        assert!(req.streaming());
    }
}
