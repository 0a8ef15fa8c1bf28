//! Reflector：失败试验后的自我反思
//!
//! 只在 trial_number < max_trials 且评估未成功时调用。Prompt 中包含轨迹、评估与至多 memory_window 条历史 action plan；
//! 输出按 INSIGHTS / IMPROVEMENTS / ACTION_PLAN / LEARNING_POINTS 四段解析。

use std::sync::Arc;

use crate::core::{ReflexionError, Stage};
use crate::llm::{LlmClient, Message};
use crate::reflexion::memory::Memory;
use crate::reflexion::parser::parse_reflection;
use crate::reflexion::prompts::{reflector_prompt, REFLECTOR_SYSTEM};
use crate::reflexion::types::{Evaluation, Reflection, Task, Trajectory};

pub struct Reflector {
    llm: Arc<dyn LlmClient>,
    system_prompt: String,
}

impl Reflector {
    pub fn new(llm: Arc<dyn LlmClient>) -> Self {
        Self::with_system_prompt(llm, REFLECTOR_SYSTEM)
    }

    pub fn with_system_prompt(llm: Arc<dyn LlmClient>, system_prompt: impl Into<String>) -> Self {
        Self {
            llm,
            system_prompt: system_prompt.into(),
        }
    }

    pub async fn reflect(
        &self,
        trajectory: &Trajectory,
        evaluation: &Evaluation,
        memory: &Memory,
        task: &Task,
    ) -> Result<Reflection, ReflexionError> {
        let trial_number = trajectory.trial_number;
        let messages = [
            Message::system(self.system_prompt.clone()),
            Message::user(reflector_prompt(trajectory, evaluation, memory, task)),
        ];
        let output = self
            .llm
            .complete(&messages, &task.completion_options())
            .await
            .map_err(|e| ReflexionError::upstream(Stage::Reflector, trial_number, e))?;

        let parsed = parse_reflection(&output);
        if parsed.degraded {
            tracing::warn!(trial = trial_number, "reflection output incomplete, defaults substituted");
        }

        Ok(Reflection {
            trial_number,
            source_trajectory: trajectory.clone(),
            source_evaluation: evaluation.clone(),
            insights: parsed.insights,
            improvements: parsed.improvements,
            action_plan: parsed.action_plan,
            learning_points: parsed.learning_points,
            degraded: parsed.degraded,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::MockLlmClient;
    use crate::reflexion::parser::DEFAULT_ACTION_PLAN;
    use crate::reflexion::types::{TaskDefaults, TaskRequest, TaskType};
    use chrono::Utc;

    fn fixtures(trial_number: u32) -> (Task, Trajectory, Evaluation) {
        let task = TaskRequest::new("Write fizzbuzz", TaskType::Programming, vec!["correctness".into()])
            .with_memory_window(1)
            .validate(&TaskDefaults::default())
            .unwrap();
        let now = Utc::now();
        let traj = Trajectory {
            trial_number,
            actions: vec![],
            observations: vec![],
            final_output: "print(1)".into(),
            start_time: now,
            end_time: now,
        };
        let eval = Evaluation {
            trial_number,
            reward_score: 30,
            max_score: 100,
            success_threshold: 80,
            criteria_scores: vec![],
            overall_feedback: "incomplete".into(),
            success: false,
            degraded: false,
        };
        (task, traj, eval)
    }

    #[tokio::test]
    async fn test_reflect_parses_sections() {
        let llm = Arc::new(MockLlmClient::with_responses([
            "INSIGHTS:\n- only printed one number\nIMPROVEMENTS:\n- loop 1..=100\nACTION_PLAN:\nWrite a loop with modulo checks.\nLEARNING_POINTS:\n- read the whole task statement",
        ]));
        let (task, traj, eval) = fixtures(1);
        let r = Reflector::new(llm)
            .reflect(&traj, &eval, &Memory::new(1), &task)
            .await
            .unwrap();
        assert_eq!(r.trial_number, 1);
        assert_eq!(r.insights, vec!["only printed one number"]);
        assert_eq!(r.improvements, vec!["loop 1..=100"]);
        assert_eq!(r.action_plan, "Write a loop with modulo checks.");
        assert_eq!(r.source_evaluation.reward_score, 30);
        assert!(!r.degraded);
    }

    #[tokio::test]
    async fn test_reflect_prompt_limits_previous_plans_to_window() {
        let llm = Arc::new(MockLlmClient::new());
        let reflector = Reflector::new(llm.clone());
        let (task, traj1, eval1) = fixtures(1);
        let mut memory = Memory::new(task.memory_window);

        let first = reflector.reflect(&traj1, &eval1, &memory, &task).await.unwrap();
        assert_eq!(first.action_plan, DEFAULT_ACTION_PLAN);
        assert!(first.degraded);
        memory.push_reflection(first);

        let (_, traj2, eval2) = fixtures(2);
        reflector.reflect(&traj2, &eval2, &memory, &task).await.unwrap();
        let prompt = llm.calls()[1].user().to_string();
        assert!(prompt.contains("Previous action plans"));
        assert!(prompt.contains("Trial 1:"));
    }
}
