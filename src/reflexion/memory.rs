//! 有界记忆：短期（轨迹）与长期（反思）FIFO，以及最佳轨迹追踪
//!
//! 每次运行创建一份，由编排器独占；运行结束时作为快照放入 TaskResult，不持久化。

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use crate::reflexion::types::{Reflection, Trajectory};

/// 追加后按插入顺序丢弃最旧的元素，直到 len <= cap（cap 为 0 时列表始终为空）
pub fn push_bounded<T>(list: &mut VecDeque<T>, item: T, cap: usize) {
    list.push_back(item);
    while list.len() > cap {
        list.pop_front();
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Memory {
    pub short_term: VecDeque<Trajectory>,
    pub long_term: VecDeque<Reflection>,
    pub best_trajectory: Option<Trajectory>,
    /// 尚无完成的试验时为 -1
    pub best_score: i32,
    #[serde(skip)]
    window: usize,
}

impl Memory {
    pub fn new(window: usize) -> Self {
        Self {
            short_term: VecDeque::new(),
            long_term: VecDeque::new(),
            best_trajectory: None,
            best_score: -1,
            window,
        }
    }

    pub fn push_trajectory(&mut self, trajectory: Trajectory) {
        push_bounded(&mut self.short_term, trajectory, self.window);
    }

    pub fn push_reflection(&mut self, reflection: Reflection) {
        push_bounded(&mut self.long_term, reflection, self.window);
    }

    /// 严格大于才更新（平分保留最早的赢家）；返回是否更新
    pub fn update_best(&mut self, score: u32, trajectory: &Trajectory) -> bool {
        if i64::from(score) > i64::from(self.best_score) {
            self.best_score = score.min(i32::MAX as u32) as i32;
            self.best_trajectory = Some(trajectory.clone());
            true
        } else {
            false
        }
    }

    /// 最近的至多 n 条反思，按时间顺序（旧 → 新）
    pub fn recent_reflections(&self, n: usize) -> impl Iterator<Item = &Reflection> {
        let skip = self.long_term.len().saturating_sub(n);
        self.long_term.iter().skip(skip)
    }
}

/// 窗口只约束运行期的淘汰，不属于快照内容，比较时忽略
impl PartialEq for Memory {
    fn eq(&self, other: &Self) -> bool {
        self.short_term == other.short_term
            && self.long_term == other.long_term
            && self.best_trajectory == other.best_trajectory
            && self.best_score == other.best_score
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn trajectory(n: u32) -> Trajectory {
        let now = Utc::now();
        Trajectory {
            trial_number: n,
            actions: vec![],
            observations: vec![],
            final_output: format!("output {}", n),
            start_time: now,
            end_time: now,
        }
    }

    #[test]
    fn test_push_bounded_evicts_oldest_first() {
        let mut list = VecDeque::new();
        for i in 1..=4 {
            push_bounded(&mut list, i, 2);
        }
        assert_eq!(list, VecDeque::from(vec![3, 4]));
    }

    #[test]
    fn test_push_bounded_zero_cap() {
        let mut list = VecDeque::new();
        push_bounded(&mut list, 1, 0);
        assert!(list.is_empty());
    }

    #[test]
    fn test_update_best_strictly_greater() {
        let mut mem = Memory::new(3);
        assert!(mem.update_best(40, &trajectory(1)));
        assert!(mem.update_best(70, &trajectory(2)));
        assert!(!mem.update_best(55, &trajectory(3)));
        assert!(!mem.update_best(70, &trajectory(4)));
        assert_eq!(mem.best_score, 70);
        assert_eq!(mem.best_trajectory.unwrap().trial_number, 2);
    }

    #[test]
    fn test_first_zero_score_still_becomes_best() {
        let mut mem = Memory::new(1);
        assert!(mem.update_best(0, &trajectory(1)));
        assert_eq!(mem.best_score, 0);
    }

    #[test]
    fn test_short_term_window() {
        let mut mem = Memory::new(2);
        for i in 1..=4 {
            mem.push_trajectory(trajectory(i));
        }
        let kept: Vec<u32> = mem.short_term.iter().map(|t| t.trial_number).collect();
        assert_eq!(kept, vec![3, 4]);
    }

    #[test]
    fn test_huge_window_allocates_lazily() {
        let mut mem = Memory::new(usize::MAX);
        mem.push_trajectory(trajectory(1));
        assert_eq!(mem.short_term.len(), 1);
    }

    #[test]
    fn test_snapshot_equal_after_json() {
        let mut mem = Memory::new(2);
        mem.push_trajectory(trajectory(1));
        mem.update_best(60, &trajectory(1));
        let json = serde_json::to_string(&mem).unwrap();
        let back: Memory = serde_json::from_str(&json).unwrap();
        assert_eq!(back, mem);
    }
}
