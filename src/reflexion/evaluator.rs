//! Evaluator：按命名标准为轨迹打分
//!
//! 一次 LLM 调用，使用固定低温（与本次运行配置的温度无关，降低评估方差）。
//! 输出解析失败时不报错，缺失字段用默认值补齐（总分 50、未成功、每条标准 floor(50/n)），并标记 degraded。

use std::sync::Arc;

use crate::core::{ReflexionError, Stage};
use crate::llm::{LlmClient, Message};
use crate::reflexion::parser::parse_evaluation;
use crate::reflexion::prompts::{evaluator_prompt, EVALUATOR_SYSTEM};
use crate::reflexion::types::{
    CriterionScore, Evaluation, Task, Trajectory, MAX_SCORE, SUCCESS_THRESHOLD,
};

/// 默认评估温度
pub const DEFAULT_EVALUATION_TEMPERATURE: f32 = 0.3;

pub struct Evaluator {
    llm: Arc<dyn LlmClient>,
    system_prompt: String,
    temperature: f32,
}

impl Evaluator {
    pub fn new(llm: Arc<dyn LlmClient>) -> Self {
        Self {
            llm,
            system_prompt: EVALUATOR_SYSTEM.to_string(),
            temperature: DEFAULT_EVALUATION_TEMPERATURE,
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = prompt.into();
        self
    }

    pub async fn score(
        &self,
        trajectory: &Trajectory,
        task: &Task,
        criteria: &[String],
    ) -> Result<Evaluation, ReflexionError> {
        let trial_number = trajectory.trial_number;
        let messages = [
            Message::system(self.system_prompt.clone()),
            Message::user(evaluator_prompt(trajectory, task, criteria)),
        ];
        let options = task.completion_options().with_temperature(self.temperature);
        let output = self
            .llm
            .complete(&messages, &options)
            .await
            .map_err(|e| ReflexionError::upstream(Stage::Evaluator, trial_number, e))?;

        let parsed = parse_evaluation(&output, criteria);
        if parsed.degraded {
            tracing::warn!(
                trial = trial_number,
                "evaluation output incomplete, defaults substituted"
            );
        }

        Ok(Evaluation {
            trial_number,
            reward_score: parsed.reward_score,
            max_score: MAX_SCORE,
            success_threshold: SUCCESS_THRESHOLD,
            criteria_scores: parsed
                .criteria_scores
                .into_iter()
                .map(|c| CriterionScore {
                    criterion: c.criterion,
                    score: c.score,
                    feedback: c.feedback,
                })
                .collect(),
            overall_feedback: parsed.overall_feedback,
            success: parsed.success,
            degraded: parsed.degraded,
        })
    }
}
