use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::models::command::{is_valid_pid, Priority, TargetOutcome, TargetStatus};
use crate::models::error::SupervisorError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchAction {
    Kill,
    SetPriority(i32),
    AutoRespawn,
}

impl BatchAction {
    pub fn label(&self) -> &'static str {
        match self {
            BatchAction::Kill => "kill",
            BatchAction::SetPriority(_) => "set_priority",
            BatchAction::AutoRespawn => "auto_respawn",
        }
    }
}

/// 一次批量操作，选择去重且非空，nice 值已校验；非法 PID 单独放在 rejected 中，不会派发
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchJob {
    targets: BTreeSet<u32>,
    rejected: BTreeSet<u32>,
    pub action: BatchAction,
}

impl BatchJob {
    pub fn new<I>(pids: I, action: BatchAction) -> Result<Self, SupervisorError>
    where
        I: IntoIterator<Item = u32>,
    {
        let selected: BTreeSet<u32> = pids.into_iter().collect();
        if selected.is_empty() {
            return Err(SupervisorError::NoTargets);
        }
        if let BatchAction::SetPriority(value) = action {
            Priority::new(value)?;
        }
        let (targets, rejected) = selected.into_iter().partition(|&pid| is_valid_pid(pid));
        Ok(Self {
            targets,
            rejected,
            action,
        })
    }

    pub fn targets(&self) -> Vec<u32> {
        self.targets.iter().copied().collect()
    }

    /// 被拒绝的目标，按跳过计入结果
    pub fn rejected_outcomes(&self) -> Vec<TargetOutcome> {
        self.rejected
            .iter()
            .map(|&pid| TargetOutcome::skipped(pid, &SupervisorError::NotFound(pid)))
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BatchResult {
    pub action: &'static str,
    pub succeeded: usize,
    pub failed: usize,
    pub skipped: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority: Option<i32>,
    pub outcomes: Vec<TargetOutcome>,
}

impl BatchResult {
    pub fn from_outcomes(action: BatchAction, outcomes: Vec<TargetOutcome>) -> Self {
        let count = |status: TargetStatus| outcomes.iter().filter(|o| o.status == status).count();
        Self {
            action: action.label(),
            succeeded: count(TargetStatus::Succeeded),
            failed: count(TargetStatus::Failed),
            skipped: count(TargetStatus::Skipped),
            priority: match action {
                BatchAction::SetPriority(value) => Some(value),
                _ => None,
            },
            outcomes,
        }
    }

    pub fn is_clean(&self) -> bool {
        self.failed == 0 && self.skipped == 0
    }

    /// 面向用户的一行汇总
    pub fn summary(&self) -> String {
        let mut text = match self.priority {
            Some(p) => format!("{}({}): {} succeeded", self.action, p, self.succeeded),
            None => format!("{}: {} succeeded", self.action, self.succeeded),
        };
        if self.failed > 0 {
            text.push_str(&format!(", {} failed", self.failed));
        }
        if self.skipped > 0 {
            text.push_str(&format!(", {} skipped", self.skipped));
        }
        text
    }
}
