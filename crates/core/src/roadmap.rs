use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet};

use crate::model::TaskId;

//
// ─── ROADMAP TREE ──────────────────────────────────────────────────────────────
//

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub task_id: TaskId,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub completed: bool,
}

impl Task {
    #[must_use]
    pub fn new(task_id: impl Into<TaskId>, title: impl Into<String>) -> Self {
        Self {
            task_id: task_id.into(),
            title: title.into(),
            completed: false,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Day {
    #[serde(default)]
    pub day: u32,
    #[serde(default)]
    pub tasks: Vec<Task>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Phase {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub daily_tasks: Vec<Day>,
}

impl Phase {
    pub fn tasks(&self) -> impl Iterator<Item = &Task> {
        self.daily_tasks.iter().flat_map(|d| d.tasks.iter())
    }

    fn tasks_mut(&mut self) -> impl Iterator<Item = &mut Task> {
        self.daily_tasks.iter_mut().flat_map(|d| d.tasks.iter_mut())
    }
}

/// A phased learning plan: phases, then days, then tasks.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Roadmap {
    #[serde(default)]
    pub phases: Vec<Phase>,
}

impl Roadmap {
    pub fn tasks(&self) -> impl Iterator<Item = &Task> {
        self.phases.iter().flat_map(Phase::tasks)
    }

    #[must_use]
    pub fn contains_task(&self, id: &TaskId) -> bool {
        self.tasks().any(|t| &t.task_id == id)
    }

    #[must_use]
    pub fn task_count(&self) -> usize {
        self.tasks().count()
    }
}

//
// ─── PROGRESS ──────────────────────────────────────────────────────────────────
//

/// Completed/total tasks under one phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PhaseProgress {
    pub completed: usize,
    pub total: usize,
}

impl PhaseProgress {
    /// A phase without tasks is never complete.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.total > 0 && self.completed == self.total
    }
}

/// Completion state over a roadmap, keyed by task id.
///
/// The completion set is the source of truth; task `completed` flags in the
/// tree are kept in step with it. Ids in the set that no longer exist in the
/// roadmap are retained but ignored by every percentage.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoadmapProgress {
    roadmap: Roadmap,
    completed: BTreeSet<TaskId>,
}

impl RoadmapProgress {
    /// Seed the completion set from the tasks already flagged as completed.
    #[must_use]
    pub fn new(roadmap: Roadmap) -> Self {
        let completed = roadmap
            .tasks()
            .filter(|t| t.completed)
            .map(|t| t.task_id.clone())
            .collect();
        Self { roadmap, completed }
    }

    /// Rebuild from a roadmap plus an externally stored completion set.
    #[must_use]
    pub fn with_completed(roadmap: Roadmap, completed: impl IntoIterator<Item = TaskId>) -> Self {
        let mut progress = Self {
            roadmap,
            completed: completed.into_iter().collect(),
        };
        progress.sync_flags();
        progress
    }

    #[must_use]
    pub fn roadmap(&self) -> &Roadmap {
        &self.roadmap
    }

    pub fn completed_ids(&self) -> impl Iterator<Item = &TaskId> {
        self.completed.iter()
    }

    #[must_use]
    pub fn is_completed(&self, id: &TaskId) -> bool {
        self.completed.contains(id)
    }

    /// Flip a task's completion. Returns the new state.
    ///
    /// Toggling twice restores the previous state.
    pub fn toggle_task(&mut self, id: &TaskId) -> bool {
        let now_completed = if self.completed.remove(id) {
            false
        } else {
            self.completed.insert(id.clone());
            true
        };
        self.set_flag(id, now_completed);
        now_completed
    }

    /// Force a task into a given state, e.g. when applying server data.
    pub fn set_completed(&mut self, id: &TaskId, completed: bool) {
        if completed {
            self.completed.insert(id.clone());
        } else {
            self.completed.remove(id);
        }
        self.set_flag(id, completed);
    }

    fn set_flag(&mut self, id: &TaskId, completed: bool) {
        for phase in &mut self.roadmap.phases {
            for task in phase.tasks_mut().filter(|t| &t.task_id == id) {
                task.completed = completed;
            }
        }
    }

    fn sync_flags(&mut self) {
        let completed = &self.completed;
        for phase in &mut self.roadmap.phases {
            for task in phase.tasks_mut() {
                task.completed = completed.contains(&task.task_id);
            }
        }
    }

    #[must_use]
    pub fn total_tasks(&self) -> usize {
        self.roadmap.task_count()
    }

    /// Distinct roadmap tasks that are in the completion set.
    #[must_use]
    pub fn completed_count(&self) -> usize {
        let ids: HashSet<&TaskId> = self
            .roadmap
            .tasks()
            .map(|t| &t.task_id)
            .filter(|id| self.completed.contains(*id))
            .collect();
        ids.len()
    }

    /// Share of roadmap tasks completed, 0–100. An empty roadmap is 0.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn completion_percentage(&self) -> f64 {
        let total: HashSet<&TaskId> = self.roadmap.tasks().map(|t| &t.task_id).collect();
        if total.is_empty() {
            return 0.0;
        }
        self.completed_count() as f64 / total.len() as f64 * 100.0
    }

    #[must_use]
    pub fn phase_progress(&self, index: usize) -> Option<PhaseProgress> {
        let phase = self.roadmap.phases.get(index)?;
        let total = phase.tasks().count();
        let completed = phase
            .tasks()
            .filter(|t| self.completed.contains(&t.task_id))
            .count();
        Some(PhaseProgress { completed, total })
    }

    #[must_use]
    pub fn is_phase_complete(&self, index: usize) -> bool {
        self.phase_progress(index)
            .is_some_and(|p| p.is_complete())
    }

    #[must_use]
    pub fn completed_phases(&self) -> usize {
        (0..self.roadmap.phases.len())
            .filter(|i| self.is_phase_complete(*i))
            .count()
    }
}
