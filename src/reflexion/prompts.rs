//! Actor / Evaluator / Reflector 的默认 Prompt
//!
//! 解析只依赖输出文法（见 parser），不依赖这里的措辞；可通过 config/prompts/*.txt 覆盖 system prompt。

use std::fmt::Write as _;

use crate::reflexion::memory::Memory;
use crate::reflexion::types::{Evaluation, Task, TaskType, Trajectory};

pub const ACTOR_SYSTEM: &str = "You are an agent solving a task through a sequence of explicit actions. \
Learn from the reflections on previous attempts and improve on the best previous output.\n\
Respond ONLY in this format, numbering actions from 1:\n\
ACTION_1: <what you do>\n\
REASONING_1: <why>\n\
ACTION_2: <what you do>\n\
REASONING_2: <why>\n\
...";

pub const EVALUATOR_SYSTEM: &str = "You are a strict evaluator. Score the attempt from 0 to 100 and \
judge each criterion from 0 to 10.\n\
Respond ONLY in this format:\n\
SCORE: <0-100>\n\
SUCCESS: <true|false> (true only if the task is fully solved, score >= 80)\n\
- <criterion>: <0-10> - <one sentence feedback>\n\
FEEDBACK: <overall feedback>";

pub const REFLECTOR_SYSTEM: &str = "You analyse a failed attempt and write a self-reflection that \
will guide the next attempt.\n\
Respond ONLY with these four sections:\n\
INSIGHTS:\n- <what went wrong>\n\
IMPROVEMENTS:\n- <concrete change>\n\
ACTION_PLAN:\n<step by step plan for the next attempt>\n\
LEARNING_POINTS:\n- <general lesson>";

/// 任务类型对应的一句话指引
fn task_type_hint(task_type: TaskType) -> &'static str {
    match task_type {
        TaskType::Decision => "Weigh the options and commit to a decision.",
        TaskType::Reasoning => "Reason step by step and state the conclusion.",
        TaskType::Programming => "Design, implement and check the code.",
        TaskType::General => "Work towards a complete answer.",
    }
}

/// Actor 的 user prompt：任务 + 最近反思（action plan / improvements）+ 当前最佳输出
pub fn actor_prompt(task: &Task, trial_number: u32, memory: &Memory) -> String {
    let mut s = String::new();
    let _ = writeln!(s, "## Task ({})\n{}", task.task_type, task.description);
    let _ = writeln!(s, "{}", task_type_hint(task.task_type));
    let _ = writeln!(s, "\n## Trial\n{} of {}", trial_number, task.max_trials);

    let reflections: Vec<_> = memory.recent_reflections(task.memory_window).collect();
    if !reflections.is_empty() {
        s.push_str("\n## Lessons from previous trials\n");
        for r in reflections {
            let _ = writeln!(s, "Trial {} plan: {}", r.trial_number, r.action_plan);
            for imp in &r.improvements {
                let _ = writeln!(s, "- {}", imp);
            }
        }
    }

    if let Some(best) = &memory.best_trajectory {
        let _ = writeln!(
            s,
            "\n## Best output so far (trial {}, score {})\n{}",
            best.trial_number, memory.best_score, best.final_output
        );
    }
    s
}

/// Evaluator 的 user prompt：任务、标准（按顺序）、轨迹
pub fn evaluator_prompt(trajectory: &Trajectory, task: &Task, criteria: &[String]) -> String {
    let mut s = String::new();
    let _ = writeln!(s, "## Task\n{}\n\n## Criteria", task.description);
    for c in criteria {
        let _ = writeln!(s, "- {}", c);
    }
    let _ = writeln!(s, "\n## Attempt (trial {})", trajectory.trial_number);
    push_trajectory(&mut s, trajectory);
    s
}

/// Reflector 的 user prompt：轨迹、评估与至多 memory_window 条历史 action plan
pub fn reflector_prompt(
    trajectory: &Trajectory,
    evaluation: &Evaluation,
    memory: &Memory,
    task: &Task,
) -> String {
    let mut s = String::new();
    let _ = writeln!(s, "## Task\n{}", task.description);
    let _ = writeln!(s, "\n## Attempt (trial {})", trajectory.trial_number);
    push_trajectory(&mut s, trajectory);

    let _ = writeln!(
        s,
        "\n## Evaluation\nScore: {}/{} (success: {})",
        evaluation.reward_score, evaluation.max_score, evaluation.success
    );
    for c in &evaluation.criteria_scores {
        let _ = writeln!(s, "- {}: {} - {}", c.criterion, c.score, c.feedback);
    }
    let _ = writeln!(s, "Feedback: {}", evaluation.overall_feedback);

    let previous: Vec<_> = memory.recent_reflections(task.memory_window).collect();
    if !previous.is_empty() {
        s.push_str("\n## Previous action plans\n");
        for r in previous {
            let _ = writeln!(s, "Trial {}: {}", r.trial_number, r.action_plan);
        }
    }
    s
}

fn push_trajectory(s: &mut String, trajectory: &Trajectory) {
    for (i, a) in trajectory.actions.iter().enumerate() {
        let _ = writeln!(s, "{}. {}\n   Reasoning: {}", i + 1, a.content, a.reasoning);
        if let Some(obs) = trajectory.observations.get(i) {
            let _ = writeln!(s, "   Observation: {}", obs);
        }
    }
    let _ = writeln!(s, "Final output: {}", trajectory.final_output);
}

/// 从 config/prompts/<name>.txt 读取 system prompt，不存在时使用默认值
pub fn load_system_prompt(name: &str, default: &str) -> String {
    [
        format!("config/prompts/{}.txt", name),
        format!("../config/prompts/{}.txt", name),
    ]
    .into_iter()
    .find_map(|p| std::fs::read_to_string(p).ok())
    .map(|s| s.trim().to_string())
    .filter(|s| !s.is_empty())
    .unwrap_or_else(|| default.to_string())
}
