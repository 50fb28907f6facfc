// Copyright 2025 Crrow
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//      http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use relay_types::{MergeStrategy, Task, TaskId, TaskMetrics, TaskResult};

const DECOMPOSABLE_KEYWORDS: &[&str] = &["refactor", "analyze", "implement", "create multiple", "batch"];

/// Whether `task` should be split into child tasks rather than dispatched
/// directly: its title mentions a decomposable keyword and the caller hasn't
/// opted out via `context.allow_decomposition`.
#[must_use]
pub fn should_decompose(task: &Task) -> bool {
    if !task.context.allow_decomposition {
        return false;
    }
    let title = task.title.to_lowercase();
    DECOMPOSABLE_KEYWORDS.iter().any(|kw| title.contains(kw))
}

/// Splits a task into its child tasks: `refactor` work gets an extra
/// `analyze` step up front, everything else goes straight to `plan` then
/// `execute`. Children inherit the parent's category, priority and context,
/// and are wired so `execute` depends on `plan` (and `plan` on `analyze`,
/// when present).
#[must_use]
pub fn decompose(task: &Task) -> Vec<Task> {
    let steps: &[&str] = if task.title.to_lowercase().contains("refactor") {
        &["analyze", "plan", "execute"]
    } else {
        &["plan", "execute"]
    };

    let mut children = Vec::with_capacity(steps.len());
    let mut previous: Option<TaskId> = None;
    for step in steps {
        let child_id = TaskId::from(format!("{}-{step}", task.id));
        let mut child = Task::new(child_id.clone(), format!("{} ({step})", task.title), task.category, task.priority)
            .with_context(task.context.clone());
        if let Some(prev) = previous.take() {
            child = child.with_dependencies([prev]);
        }
        previous = Some(child_id);
        children.push(child);
    }
    children
}

/// Synthesizes the parent's result once every child in a [`relay_types::PendingMerge`]
/// has reported a terminal [`TaskResult`], per `merge_strategy`. `children`
/// must be supplied in the same order the child tasks were created.
#[must_use]
pub fn merge_results(parent_id: TaskId, strategy: MergeStrategy, children: &[TaskResult]) -> TaskResult {
    let start = children.iter().map(|c| c.metrics.start_time).min().unwrap_or_else(chrono::Utc::now);
    let end = children.iter().map(|c| c.metrics.end_time).max().unwrap_or(start);
    let metrics = TaskMetrics::new(start, end);

    if let Some(failure) = children.iter().find(|c| c.status == relay_types::TaskStatus::Failed) {
        return TaskResult::failed(
            parent_id,
            failure.error_kind.clone().unwrap_or_else(|| "internal".to_string()),
            failure.error_message.clone().unwrap_or_default(),
            metrics,
        );
    }

    let separator = match strategy {
        MergeStrategy::Concat => "\n\n",
        MergeStrategy::Merge | MergeStrategy::Reduce | MergeStrategy::Custom => "\n",
    };
    let output = children.iter().map(|c| c.output.as_str()).collect::<Vec<_>>().join(separator);
    let artifacts = children.iter().flat_map(|c| c.artifacts.clone()).collect();
    TaskResult::completed(parent_id, output, metrics).with_artifacts(artifacts)
}

#[cfg(test)]
mod tests {
    use relay_types::{TaskCategory, TaskContext, TaskPriority};

    use super::*;

    fn task(title: &str) -> Task { Task::new(TaskId::from("p1"), title, TaskCategory::Coding, TaskPriority::Normal) }

    #[test]
    fn matches_known_keywords_case_insensitively() {
        assert!(should_decompose(&task("Refactor the auth module")));
        assert!(should_decompose(&task("Analyze the failing tests")));
        assert!(!should_decompose(&task("Fix typo in README")));
    }

    #[test]
    fn allow_decomposition_false_overrides_keyword_match() {
        let mut t = task("refactor everything");
        t.context = TaskContext { allow_decomposition: false, ..TaskContext::new() };
        assert!(!should_decompose(&t));
    }

    #[test]
    fn refactor_gets_three_chained_steps() {
        let children = decompose(&task("refactor the scheduler"));
        assert_eq!(children.len(), 3);
        assert_eq!(children[0].id, TaskId::from("p1-analyze"));
        assert!(children[1].dependencies.contains(&TaskId::from("p1-analyze")));
        assert!(children[2].dependencies.contains(&TaskId::from("p1-plan")));
    }

    #[test]
    fn other_keywords_get_two_chained_steps() {
        let children = decompose(&task("implement the new endpoint"));
        assert_eq!(children.len(), 2);
        assert_eq!(children[0].id, TaskId::from("p1-plan"));
        assert_eq!(children[1].id, TaskId::from("p1-execute"));
    }

    #[test]
    fn concat_merge_joins_outputs_with_blank_line() {
        let metrics = TaskMetrics::new(chrono::Utc::now(), chrono::Utc::now());
        let children = vec![
            TaskResult::completed(TaskId::from("c1"), "first", metrics),
            TaskResult::completed(TaskId::from("c2"), "second", metrics),
        ];
        let merged = merge_results(TaskId::from("p1"), MergeStrategy::Concat, &children);
        assert_eq!(merged.output, "first\n\nsecond");
    }

    #[test]
    fn any_failed_child_fails_the_parent() {
        let metrics = TaskMetrics::new(chrono::Utc::now(), chrono::Utc::now());
        let children = vec![
            TaskResult::completed(TaskId::from("c1"), "ok", metrics),
            TaskResult::failed(TaskId::from("c2"), "timed-out", "boom", metrics),
        ];
        let merged = merge_results(TaskId::from("p1"), MergeStrategy::Concat, &children);
        assert_eq!(merged.status, relay_types::TaskStatus::Failed);
        assert_eq!(merged.error_kind.as_deref(), Some("timed-out"));
    }
}
