//! Actor：为一次试验生成轨迹
//!
//! 拼接任务、最近反思与当前最佳输出，调用一次 LLM，按 ACTION_n / REASONING_n 文法解析动作；
//! 观察由任务类型对应的固定反馈表按动作序号循环给出。

use std::sync::Arc;

use crate::core::{ReflexionError, Stage};
use crate::llm::{LlmClient, Message};
use crate::reflexion::clock::Clock;
use crate::reflexion::memory::Memory;
use crate::reflexion::parser::parse_actions;
use crate::reflexion::prompts::{actor_prompt, ACTOR_SYSTEM};
use crate::reflexion::types::{Action, ActionKind, Task, TaskType, Trajectory};

/// 一个动作都没解析出来时的 final_output
pub const NO_VALID_OUTPUT: &str = "No valid output produced";

const DECISION_OBSERVATIONS: &[&str] = &[
    "Option noted; consequences are not yet fully weighed.",
    "Trade-offs identified between the candidate choices.",
    "Decision recorded; supporting evidence is partial.",
];
const REASONING_OBSERVATIONS: &[&str] = &[
    "Premise accepted; the next inference step is required.",
    "Intermediate conclusion reached; verify it against the premises.",
    "Reasoning chain extended; check for gaps before concluding.",
];
const PROGRAMMING_OBSERVATIONS: &[&str] = &[
    "Code compiled without errors.",
    "Some test cases passed; edge cases remain unchecked.",
    "Implementation runs; performance and error handling need review.",
];
const GENERAL_OBSERVATIONS: &[&str] = &[
    "Step completed.",
    "Progress made towards the goal.",
    "Partial result available; further refinement possible.",
];

fn observation_table(task_type: TaskType) -> &'static [&'static str] {
    match task_type {
        TaskType::Decision => DECISION_OBSERVATIONS,
        TaskType::Reasoning => REASONING_OBSERVATIONS,
        TaskType::Programming => PROGRAMMING_OBSERVATIONS,
        TaskType::General => GENERAL_OBSERVATIONS,
    }
}

/// 第 index 个动作的观察（超出表长时循环）
pub fn observation_for(task_type: TaskType, index: usize) -> &'static str {
    let table = observation_table(task_type);
    table[index % table.len()]
}

/// 由动作序列得到 final_output：动作数 + 最后一个动作的内容
pub fn summarize_actions(actions: &[Action]) -> String {
    match actions.last() {
        Some(last) => format!(
            "Completed {} action(s). Final action: {}",
            actions.len(),
            last.content
        ),
        None => NO_VALID_OUTPUT.to_string(),
    }
}

pub struct Actor {
    llm: Arc<dyn LlmClient>,
    system_prompt: String,
    clock: Arc<dyn Clock>,
}

impl Actor {
    pub fn new(llm: Arc<dyn LlmClient>, clock: Arc<dyn Clock>) -> Self {
        Self::with_system_prompt(llm, clock, ACTOR_SYSTEM)
    }

    pub fn with_system_prompt(
        llm: Arc<dyn LlmClient>,
        clock: Arc<dyn Clock>,
        system_prompt: impl Into<String>,
    ) -> Self {
        Self {
            llm,
            system_prompt: system_prompt.into(),
            clock,
        }
    }

    pub async fn generate(
        &self,
        task: &Task,
        trial_number: u32,
        memory: &Memory,
    ) -> Result<Trajectory, ReflexionError> {
        let start_time = self.clock.now();
        let prompt = actor_prompt(task, trial_number, memory);
        tracing::debug!(trial = trial_number, prompt_chars = prompt.len(), "actor prompt built");

        let messages = [
            Message::system(self.system_prompt.clone()),
            Message::user(prompt),
        ];
        let output = self
            .llm
            .complete(&messages, &task.completion_options())
            .await
            .map_err(|e| ReflexionError::upstream(Stage::Actor, trial_number, e))?;

        let parsed = parse_actions(&output);
        if parsed.is_empty() {
            tracing::warn!(trial = trial_number, "actor output has no ACTION/REASONING pairs");
        }

        let kind = ActionKind::from(task.task_type);
        let timestamp = self.clock.now();
        let actions: Vec<Action> = parsed
            .into_iter()
            .map(|p| Action {
                kind,
                content: p.content,
                reasoning: p.reasoning,
                timestamp,
            })
            .collect();
        let observations = (0..actions.len())
            .map(|i| observation_for(task.task_type, i).to_string())
            .collect();
        let final_output = summarize_actions(&actions);

        Ok(Trajectory {
            trial_number,
            actions,
            observations,
            final_output,
            start_time,
            end_time: self.clock.now(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::MockLlmClient;
    use crate::reflexion::clock::SystemClock;
    use crate::reflexion::types::{TaskDefaults, TaskRequest};

    fn task(task_type: TaskType) -> Task {
        TaskRequest::new("Plan a trip", task_type, vec!["feasibility".into()])
            .validate(&TaskDefaults::default())
            .unwrap()
    }

    #[test]
    fn test_observations_cycle() {
        assert_eq!(
            observation_for(TaskType::General, 0),
            observation_for(TaskType::General, GENERAL_OBSERVATIONS.len())
        );
        assert_ne!(
            observation_for(TaskType::Programming, 0),
            observation_for(TaskType::Programming, 1)
        );
    }

    #[tokio::test]
    async fn test_generate_parses_actions() {
        let llm = Arc::new(MockLlmClient::with_responses([
            "ACTION_1: Pick dates\nREASONING_1: Need a window\nACTION_2: Book hotel\nREASONING_2: Secure lodging",
        ]));
        let actor = Actor::new(llm.clone(), Arc::new(SystemClock));
        let t = task(TaskType::Decision);
        let traj = actor.generate(&t, 1, &Memory::new(3)).await.unwrap();

        assert_eq!(traj.trial_number, 1);
        assert_eq!(traj.actions.len(), 2);
        assert_eq!(traj.actions[0].content, "Pick dates");
        assert_eq!(traj.actions[1].kind, ActionKind::Decide);
        assert_eq!(traj.observations.len(), 2);
        assert_eq!(traj.final_output, "Completed 2 action(s). Final action: Book hotel");
        assert_eq!(llm.calls()[0].options.temperature, t.temperature);
    }

    #[tokio::test]
    async fn test_generate_without_actions_falls_back() {
        let llm = Arc::new(MockLlmClient::with_responses(["Just go to Paris."]));
        let actor = Actor::new(llm, Arc::new(SystemClock));
        let traj = actor
            .generate(&task(TaskType::General), 1, &Memory::new(3))
            .await
            .unwrap();
        assert!(traj.actions.is_empty());
        assert!(traj.observations.is_empty());
        assert_eq!(traj.final_output, NO_VALID_OUTPUT);
    }

    #[tokio::test]
    async fn test_generate_maps_upstream_error() {
        let llm = MockLlmClient::new();
        llm.push_error("connection reset");
        let actor = Actor::new(Arc::new(llm), Arc::new(SystemClock));
        let err = actor
            .generate(&task(TaskType::General), 2, &Memory::new(3))
            .await
            .unwrap_err();
        assert_eq!(
            err,
            ReflexionError::upstream(Stage::Actor, 2, "connection reset")
        );
    }
}
