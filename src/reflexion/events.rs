//! Reflexion 过程事件：流式模式下按执行顺序推送给调用方（SSE / WebSocket 等由传输层负责分帧）
//!
//! 顺序：start, (trial_start, trajectory_generated, evaluation_complete, reflection_generated?, task_success?)*, final_result, done；
//! 任意时刻出错则推送 error 并结束。

use serde::Serialize;

use crate::reflexion::types::{Evaluation, Reflection, TaskResult, TaskType, Trajectory};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ReflexionEvent {
    Start {
        task: String,
        task_type: TaskType,
        max_trials: u32,
        memory_window: usize,
    },
    TrialStart {
        trial_number: u32,
        max_trials: u32,
    },
    TrajectoryGenerated {
        trial_number: u32,
        trajectory: Trajectory,
    },
    EvaluationComplete {
        trial_number: u32,
        evaluation: Evaluation,
    },
    ReflectionGenerated {
        trial_number: u32,
        reflection: Reflection,
    },
    /// 提前成功，剩余试验不再执行
    TaskSuccess {
        trial_number: u32,
        reward_score: u32,
    },
    FinalResult {
        result: TaskResult,
    },
    Done,
    Error {
        text: String,
    },
}

impl ReflexionEvent {
    /// 事件类型标签（与序列化的 type 字段一致）
    pub fn kind(&self) -> &'static str {
        match self {
            ReflexionEvent::Start { .. } => "start",
            ReflexionEvent::TrialStart { .. } => "trial_start",
            ReflexionEvent::TrajectoryGenerated { .. } => "trajectory_generated",
            ReflexionEvent::EvaluationComplete { .. } => "evaluation_complete",
            ReflexionEvent::ReflectionGenerated { .. } => "reflection_generated",
            ReflexionEvent::TaskSuccess { .. } => "task_success",
            ReflexionEvent::FinalResult { .. } => "final_result",
            ReflexionEvent::Done => "done",
            ReflexionEvent::Error { .. } => "error",
        }
    }

    /// 是否为终止事件（done / error）
    pub fn is_terminal(&self) -> bool {
        matches!(self, ReflexionEvent::Done | ReflexionEvent::Error { .. })
    }
}
