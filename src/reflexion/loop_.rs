//! Reflexion 主循环（TrialOrchestrator）
//!
//! 对 trial = 1..=max_trials：Actor 生成轨迹 -> Evaluator 打分 -> 更新最佳（严格大于）->
//! 未成功且还有剩余试验时 Reflector 反思并写入长期记忆 -> 轨迹写入短期记忆 -> 成功则提前结束。
//! 循环结束后计算最佳试验、提升率与学习曲线。
//!
//! 同一套算法服务两种传输：批量（event_tx 为 None，只返回 TaskResult）与流式（每一步推送 ReflexionEvent）。
//! 试验严格串行：第 N+1 次的 Actor 读取第 N 次修改后的记忆。

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use futures_util::{stream, Stream};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::core::ReflexionError;
use crate::llm::LlmClient;
use crate::reflexion::actor::Actor;
use crate::reflexion::clock::{Clock, SystemClock};
use crate::reflexion::evaluator::Evaluator;
use crate::reflexion::events::ReflexionEvent;
use crate::reflexion::memory::Memory;
use crate::reflexion::reflector::Reflector;
use crate::reflexion::types::{Task, TaskResult, TrialRecord};

pub type EventSender = mpsc::UnboundedSender<ReflexionEvent>;

fn send_event(tx: Option<&EventSender>, ev: ReflexionEvent) {
    if let Some(t) = tx {
        let _ = t.send(ev);
    }
}

/// 提升率（百分比）：(best - first) / first * 100；first 为 0 时定义为 0
pub fn improvement_rate(first: u32, best: u32) -> f64 {
    if first == 0 {
        return 0.0;
    }
    (f64::from(best) - f64::from(first)) / f64::from(first) * 100.0
}

/// 奖励最高的试验（平分取最早）
pub fn best_trial(trials: &[TrialRecord]) -> Option<&TrialRecord> {
    let mut best: Option<&TrialRecord> = None;
    for t in trials {
        if best.map_or(true, |b| t.evaluation.reward_score > b.evaluation.reward_score) {
            best = Some(t);
        }
    }
    best
}

/// 由试验列表与最终记忆计算聚合结果
pub fn aggregate(
    task: &Task,
    trials: Vec<TrialRecord>,
    memory: Memory,
    improved_over_time: bool,
    total_time: u64,
) -> TaskResult {
    let learning_curve: Vec<u32> = trials.iter().map(|t| t.evaluation.reward_score).collect();
    let first = learning_curve.first().copied().unwrap_or(0);
    let (best_number, best_score) = best_trial(&trials)
        .map(|t| (t.trajectory.trial_number, t.evaluation.reward_score))
        .unwrap_or((0, 0));
    let rate = improvement_rate(first, best_score);
    let solved_on = trials
        .iter()
        .find(|t| t.evaluation.success)
        .map(|t| (t.trajectory.trial_number, t.evaluation.reward_score));

    let final_result = match solved_on {
        Some((n, score)) => format!(
            "Task solved on trial {}/{} with score {}/100.",
            n, task.max_trials, score
        ),
        None => format!(
            "Best result on trial {} with score {}/100 after {} trials (improvement {:.1}%).",
            best_number,
            best_score,
            trials.len(),
            rate
        ),
    };

    TaskResult {
        task: task.description.clone(),
        task_type: task.task_type,
        success: solved_on.is_some(),
        trials,
        memory,
        final_result,
        best_trial: best_number,
        improvement_rate: rate,
        improved_over_time,
        total_time,
        learning_curve,
    }
}

/// 在取消令牌下执行一次下游调用：已取消则不发起；进行中被取消则放弃等待（不保证上游请求真正中止）
async fn guarded<T>(
    cancel: &CancellationToken,
    fut: impl Future<Output = Result<T, ReflexionError>>,
) -> Result<T, ReflexionError> {
    if cancel.is_cancelled() {
        return Err(ReflexionError::Cancelled);
    }
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(ReflexionError::Cancelled),
        r = fut => r,
    }
}

/// 流式运行句柄：事件流 + 后台任务（返回与批量模式相同的 TaskResult）
pub struct ReflexionStream {
    pub events: Pin<Box<dyn Stream<Item = ReflexionEvent> + Send>>,
    pub handle: JoinHandle<Result<TaskResult, ReflexionError>>,
}

/// 试验编排器：持有 Actor / Evaluator / Reflector 与时钟；记忆每次运行新建，不跨运行共享
pub struct TrialOrchestrator {
    actor: Actor,
    evaluator: Evaluator,
    reflector: Reflector,
    clock: Arc<dyn Clock>,
}

impl TrialOrchestrator {
    pub fn new(llm: Arc<dyn LlmClient>) -> Self {
        Self::with_clock(llm, Arc::new(SystemClock))
    }

    pub fn with_clock(llm: Arc<dyn LlmClient>, clock: Arc<dyn Clock>) -> Self {
        Self {
            actor: Actor::new(llm.clone(), clock.clone()),
            evaluator: Evaluator::new(llm.clone()),
            reflector: Reflector::new(llm),
            clock,
        }
    }

    pub fn from_parts(
        actor: Actor,
        evaluator: Evaluator,
        reflector: Reflector,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            actor,
            evaluator,
            reflector,
            clock,
        }
    }

    /// 批量模式：不推送中间事件，只返回聚合结果
    pub async fn run_batch(&self, task: &Task) -> Result<TaskResult, ReflexionError> {
        self.run(task, None, &CancellationToken::new()).await
    }

    /// 流式模式：在后台任务中运行，事件以 Stream 形式交给调用方
    ///
    /// 调用方丢弃事件流视同取消：不再发起新的补全调用，进行中的调用被放弃。
    pub fn spawn_stream(self: Arc<Self>, task: Task, cancel: CancellationToken) -> ReflexionStream {
        let (tx, rx) = mpsc::unbounded_channel();
        let handle = tokio::spawn(async move {
            tokio::select! {
                biased;
                _ = tx.closed() => {
                    tracing::warn!("event stream dropped, aborting reflexion run");
                    Err(ReflexionError::Cancelled)
                }
                r = self.run(&task, Some(&tx), &cancel) => r,
            }
        });
        let events = stream::unfold(rx, |mut rx| async move {
            rx.recv().await.map(|ev| (ev, rx))
        });
        ReflexionStream {
            events: Box::pin(events),
            handle,
        }
    }

    /// 执行完整试验循环；event_tx 为 Some 时按执行顺序推送事件，结束时推送 final_result + done 或 error
    pub async fn run(
        &self,
        task: &Task,
        event_tx: Option<&EventSender>,
        cancel: &CancellationToken,
    ) -> Result<TaskResult, ReflexionError> {
        match self.run_trials(task, event_tx, cancel).await {
            Ok(result) => {
                tracing::info!(
                    trials = result.trials.len(),
                    best_trial = result.best_trial,
                    success = result.success,
                    total_ms = result.total_time,
                    "reflexion run finished"
                );
                send_event(event_tx, ReflexionEvent::FinalResult {
                    result: result.clone(),
                });
                send_event(event_tx, ReflexionEvent::Done);
                Ok(result)
            }
            Err(e) => {
                tracing::error!(error = %e, "reflexion run failed");
                send_event(event_tx, ReflexionEvent::Error { text: e.to_string() });
                Err(e)
            }
        }
    }

    async fn run_trials(
        &self,
        task: &Task,
        event_tx: Option<&EventSender>,
        cancel: &CancellationToken,
    ) -> Result<TaskResult, ReflexionError> {
        let started = self.clock.now();
        let mut memory = Memory::new(task.memory_window);
        let mut trials: Vec<TrialRecord> = Vec::new();
        let mut improved_over_time = false;

        send_event(event_tx, ReflexionEvent::Start {
            task: task.description.clone(),
            task_type: task.task_type,
            max_trials: task.max_trials,
            memory_window: task.memory_window,
        });

        for trial_number in 1..=task.max_trials {
            tracing::info!(trial = trial_number, max_trials = task.max_trials, "trial started");
            send_event(event_tx, ReflexionEvent::TrialStart {
                trial_number,
                max_trials: task.max_trials,
            });

            let trajectory = guarded(cancel, self.actor.generate(task, trial_number, &memory)).await?;
            send_event(event_tx, ReflexionEvent::TrajectoryGenerated {
                trial_number,
                trajectory: trajectory.clone(),
            });

            let evaluation = guarded(
                cancel,
                self.evaluator
                    .score(&trajectory, task, &task.evaluation_criteria),
            )
            .await?;
            tracing::info!(
                trial = trial_number,
                score = evaluation.reward_score,
                success = evaluation.success,
                degraded = evaluation.degraded,
                "trial evaluated"
            );
            send_event(event_tx, ReflexionEvent::EvaluationComplete {
                trial_number,
                evaluation: evaluation.clone(),
            });

            if memory.update_best(evaluation.reward_score, &trajectory) && trial_number > 1 {
                improved_over_time = true;
            }

            let reflection = if trial_number < task.max_trials && !evaluation.success {
                let reflection = guarded(
                    cancel,
                    self.reflector.reflect(&trajectory, &evaluation, &memory, task),
                )
                .await?;
                memory.push_reflection(reflection.clone());
                send_event(event_tx, ReflexionEvent::ReflectionGenerated {
                    trial_number,
                    reflection: reflection.clone(),
                });
                Some(reflection)
            } else {
                None
            };

            memory.push_trajectory(trajectory.clone());

            let success = evaluation.success;
            let reward_score = evaluation.reward_score;
            trials.push(TrialRecord {
                trajectory,
                evaluation,
                reflection,
            });

            if success {
                tracing::info!(trial = trial_number, score = reward_score, "task solved, stopping early");
                send_event(event_tx, ReflexionEvent::TaskSuccess {
                    trial_number,
                    reward_score,
                });
                break;
            }
        }

        let total_time = (self.clock.now() - started).num_milliseconds().max(0) as u64;
        Ok(aggregate(task, trials, memory, improved_over_time, total_time))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_improvement_rate() {
        assert_eq!(improvement_rate(40, 70), 75.0);
        assert_eq!(improvement_rate(0, 70), 0.0);
        assert_eq!(improvement_rate(50, 50), 0.0);
    }
}
