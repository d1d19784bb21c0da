//! Task declarations and the pipeline orchestrator.
//!
//! Tasks form an explicit DAG: every task declares the ids it depends on,
//! the orchestrator validates the graph up front and then executes ready
//! tasks eagerly, running mutually independent tasks concurrently. A task
//! whose dependency did not succeed is marked skipped - a distinct outcome
//! from failure - and never executed. Task-local errors are captured and
//! attributed, never crash the orchestrator.

use crate::pipeline::error::{Error, Result};
use crate::pipeline::utils;
use petgraph::algo::toposort;
use petgraph::graph::{DiGraph, NodeIndex};
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::path::Path;
use std::pin::Pin;
use tokio::task::JoinSet;

type BoxedTaskFuture = Pin<Box<dyn Future<Output = Result<()>> + Send>>;
type TaskAction = Box<dyn FnOnce() -> BoxedTaskFuture + Send>;

/// One unit of pipeline work with declared dependencies.
///
/// A task executes at most once per run.
pub struct PipelineTask {
    id: String,
    depends_on: Vec<String>,
    action: TaskAction,
}

impl PipelineTask {
    /// Creates a task from an id, dependency ids, and an async action.
    pub fn new<F, Fut>(id: impl Into<String>, depends_on: &[&str], action: F) -> Self
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        Self {
            id: id.into(),
            depends_on: depends_on.iter().map(|d| d.to_string()).collect(),
            action: Box::new(move || -> BoxedTaskFuture { Box::pin(action()) }),
        }
    }

    /// Returns the task id.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Returns the ids this task depends on.
    pub fn depends_on(&self) -> &[String] {
        &self.depends_on
    }
}

impl std::fmt::Debug for PipelineTask {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PipelineTask")
            .field("id", &self.id)
            .field("depends_on", &self.depends_on)
            .finish()
    }
}

/// Final state of one task after a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum TaskOutcome {
    /// The task executed and succeeded.
    Success,
    /// The task executed and failed.
    Failed {
        /// Captured error detail.
        detail: String,
    },
    /// The task was never executed because a dependency did not succeed.
    Skipped {
        /// Id of the direct dependency that failed or was itself skipped.
        dependency: String,
    },
}

impl TaskOutcome {
    /// Returns true for [`TaskOutcome::Success`].
    pub fn is_success(&self) -> bool {
        matches!(self, TaskOutcome::Success)
    }
}

/// Per-task outcome row of a run summary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TaskReport {
    /// Task id.
    pub id: String,
    /// Final outcome.
    #[serde(flatten)]
    pub outcome: TaskOutcome,
}

/// Outcome of one orchestrator run, ordered by task declaration.
#[derive(Debug)]
pub struct RunSummary {
    reports: Vec<TaskReport>,
}

impl RunSummary {
    /// Returns every task's report, in declaration order.
    pub fn reports(&self) -> &[TaskReport] {
        &self.reports
    }

    /// Returns true iff every task succeeded.
    pub fn success(&self) -> bool {
        self.reports.iter().all(|report| report.outcome.is_success())
    }

    /// Returns the first failed task, falling back to the first
    /// non-successful one.
    pub fn first_failure(&self) -> Option<&TaskReport> {
        self.reports
            .iter()
            .find(|report| matches!(report.outcome, TaskOutcome::Failed { .. }))
            .or_else(|| {
                self.reports
                    .iter()
                    .find(|report| !report.outcome.is_success())
            })
    }

    /// Writes the machine-readable run report.
    pub async fn write_json(&self, path: &Path) -> Result<()> {
        #[derive(Serialize)]
        struct ReportDocument<'a> {
            success: bool,
            tasks: &'a [TaskReport],
        }

        let document = ReportDocument {
            success: self.success(),
            tasks: &self.reports,
        };
        let bytes = serde_json::to_vec_pretty(&document)?;
        utils::fs::atomic_write(path, bytes).await
    }
}

/// Executes a declared task DAG.
#[derive(Debug, Default)]
pub struct Orchestrator {
    tasks: Vec<PipelineTask>,
}

impl Orchestrator {
    /// Creates an empty orchestrator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a task to the run.
    pub fn add(&mut self, task: PipelineTask) {
        self.tasks.push(task);
    }

    /// Runs every task, respecting dependencies.
    ///
    /// Graph-shape problems (duplicate ids, unknown dependency ids, cycles)
    /// are configuration errors that abort the run before any task starts.
    /// Task-local failures do not: they are captured per task, their
    /// not-yet-started transitive dependents are marked skipped, and
    /// already-running independent tasks complete. The returned summary
    /// reports success only if every task succeeded.
    pub async fn run(self) -> Result<RunSummary> {
        let ids: Vec<String> = self.tasks.iter().map(|task| task.id.clone()).collect();
        self.validate(&ids)?;

        let mut actions: HashMap<String, TaskAction> = HashMap::new();
        let mut remaining: HashMap<String, usize> = HashMap::new();
        let mut dependents: HashMap<String, Vec<String>> = HashMap::new();
        for task in self.tasks {
            remaining.insert(task.id.clone(), task.depends_on.len());
            for dependency in &task.depends_on {
                dependents
                    .entry(dependency.clone())
                    .or_default()
                    .push(task.id.clone());
            }
            actions.insert(task.id.clone(), task.action);
        }

        let mut outcomes: HashMap<String, TaskOutcome> = HashMap::new();
        let mut spawned: HashSet<String> = HashSet::new();
        let mut running: HashMap<tokio::task::Id, String> = HashMap::new();
        let mut set: JoinSet<(String, Result<()>)> = JoinSet::new();

        let mut ready: Vec<String> = ids
            .iter()
            .filter(|id| remaining[id.as_str()] == 0)
            .cloned()
            .collect();

        loop {
            for id in ready.drain(..) {
                if outcomes.contains_key(&id) || spawned.contains(&id) {
                    continue;
                }
                let Some(action) = actions.remove(&id) else {
                    continue;
                };
                log::debug!("Starting task `{}`", id);
                spawned.insert(id.clone());
                let future = action();
                let label = id.clone();
                let handle = set.spawn(async move { (label, future.await) });
                running.insert(handle.id(), id);
            }

            let Some(joined) = set.join_next().await else {
                break;
            };

            let (id, result) = match joined {
                Ok((id, result)) => (id, result),
                Err(join_err) => {
                    let id = running
                        .get(&join_err.id())
                        .cloned()
                        .unwrap_or_else(|| "unknown-task".to_string());
                    (
                        id,
                        Err(Error::GenericError(format!("task panicked: {}", join_err))),
                    )
                }
            };

            match result {
                Ok(()) => {
                    log::debug!("Task `{}` succeeded", id);
                    outcomes.insert(id.clone(), TaskOutcome::Success);
                    for dependent in dependents.get(&id).cloned().unwrap_or_default() {
                        if let Some(count) = remaining.get_mut(&dependent) {
                            *count -= 1;
                            if *count == 0 && !outcomes.contains_key(&dependent) {
                                ready.push(dependent);
                            }
                        }
                    }
                }
                Err(e) => {
                    log::error!("✗ Task `{}` failed: {}", id, e);
                    outcomes.insert(
                        id.clone(),
                        TaskOutcome::Failed {
                            detail: e.to_string(),
                        },
                    );
                    cascade_skip(&id, &dependents, &mut outcomes, &spawned);
                }
            }
        }

        let reports = ids
            .into_iter()
            .map(|id| {
                let outcome = outcomes.remove(&id).unwrap_or_else(|| TaskOutcome::Failed {
                    detail: "task was never scheduled".to_string(),
                });
                TaskReport { id, outcome }
            })
            .collect();

        Ok(RunSummary { reports })
    }

    /// Rejects duplicate ids, unknown dependency ids and cycles.
    fn validate(&self, ids: &[String]) -> Result<()> {
        let mut seen = HashSet::new();
        for id in ids {
            if !seen.insert(id.as_str()) {
                return Err(Error::Config(format!("duplicate task id `{}`", id)));
            }
        }

        let mut graph = DiGraph::<&str, ()>::new();
        let mut index: HashMap<&str, NodeIndex> = HashMap::new();
        for task in &self.tasks {
            let node = graph.add_node(task.id.as_str());
            index.insert(task.id.as_str(), node);
        }
        for task in &self.tasks {
            for dependency in &task.depends_on {
                let Some(&from) = index.get(dependency.as_str()) else {
                    return Err(Error::Config(format!(
                        "task `{}` depends on unknown task `{}`",
                        task.id, dependency
                    )));
                };
                graph.add_edge(from, index[task.id.as_str()], ());
            }
        }

        toposort(&graph, None).map_err(|cycle| {
            Error::Config(format!(
                "task dependency cycle involving `{}`",
                graph[cycle.node_id()]
            ))
        })?;

        Ok(())
    }
}

/// Marks every not-yet-started transitive dependent of `failed` as skipped,
/// attributing each skip to its direct dependency.
fn cascade_skip(
    failed: &str,
    dependents: &HashMap<String, Vec<String>>,
    outcomes: &mut HashMap<String, TaskOutcome>,
    spawned: &HashSet<String>,
) {
    let mut stack = vec![failed.to_string()];
    while let Some(cause) = stack.pop() {
        for dependent in dependents.get(&cause).cloned().unwrap_or_default() {
            if outcomes.contains_key(&dependent) || spawned.contains(&dependent) {
                continue;
            }
            log::debug!("Skipping task `{}` (dependency `{}`)", dependent, cause);
            outcomes.insert(
                dependent.clone(),
                TaskOutcome::Skipped {
                    dependency: cause.clone(),
                },
            );
            stack.push(dependent);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    fn recording_task(
        id: &str,
        depends_on: &[&str],
        order: &Arc<Mutex<Vec<String>>>,
    ) -> PipelineTask {
        let order = Arc::clone(order);
        let label = id.to_string();
        PipelineTask::new(id, depends_on, move || async move {
            order.lock().unwrap().push(label);
            Ok(())
        })
    }

    fn failing_task(id: &str, depends_on: &[&str]) -> PipelineTask {
        PipelineTask::new(id, depends_on, || async {
            Err(Error::GenericError("boom".to_string()))
        })
    }

    fn outcome<'a>(summary: &'a RunSummary, id: &str) -> &'a TaskOutcome {
        &summary
            .reports()
            .iter()
            .find(|report| report.id == id)
            .unwrap()
            .outcome
    }

    #[tokio::test]
    async fn dependencies_execute_before_dependents() {
        let order = Arc::new(Mutex::new(Vec::new()));
        let mut orchestrator = Orchestrator::new();
        orchestrator.add(recording_task("resolve", &[], &order));
        orchestrator.add(recording_task("filter", &["resolve"], &order));
        orchestrator.add(recording_task("bundle", &["resolve"], &order));
        orchestrator.add(recording_task("publish", &["filter", "bundle"], &order));

        let summary = orchestrator.run().await.unwrap();

        assert!(summary.success());
        let order = order.lock().unwrap();
        assert_eq!(order[0], "resolve");
        assert_eq!(order[3], "publish");
    }

    #[tokio::test]
    async fn failure_is_isolated_to_dependents() {
        let order = Arc::new(Mutex::new(Vec::new()));
        let mut orchestrator = Orchestrator::new();
        orchestrator.add(recording_task("resolve", &[], &order));
        orchestrator.add(failing_task("broken", &["resolve"]));
        orchestrator.add(recording_task("sibling", &["resolve"], &order));
        orchestrator.add(recording_task("downstream", &["broken"], &order));

        let summary = orchestrator.run().await.unwrap();

        assert!(!summary.success());
        assert!(outcome(&summary, "sibling").is_success());
        assert!(matches!(
            outcome(&summary, "broken"),
            TaskOutcome::Failed { .. }
        ));
        assert_eq!(
            outcome(&summary, "downstream"),
            &TaskOutcome::Skipped {
                dependency: "broken".to_string()
            }
        );
        assert_eq!(summary.first_failure().unwrap().id, "broken");
        assert!(!order.lock().unwrap().contains(&"downstream".to_string()));
    }

    #[tokio::test]
    async fn skips_cascade_transitively_with_direct_causes() {
        let order = Arc::new(Mutex::new(Vec::new()));
        let mut orchestrator = Orchestrator::new();
        orchestrator.add(failing_task("resolve", &[]));
        orchestrator.add(recording_task("filter", &["resolve"], &order));
        orchestrator.add(recording_task("bundle", &["filter"], &order));

        let summary = orchestrator.run().await.unwrap();

        assert!(!summary.success());
        assert_eq!(
            outcome(&summary, "filter"),
            &TaskOutcome::Skipped {
                dependency: "resolve".to_string()
            }
        );
        assert_eq!(
            outcome(&summary, "bundle"),
            &TaskOutcome::Skipped {
                dependency: "filter".to_string()
            }
        );
        assert!(order.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn independent_tasks_all_complete() {
        let order = Arc::new(Mutex::new(Vec::new()));
        let mut orchestrator = Orchestrator::new();
        for id in ["a", "b", "c", "d"] {
            orchestrator.add(recording_task(id, &[], &order));
        }

        let summary = orchestrator.run().await.unwrap();

        assert!(summary.success());
        assert_eq!(order.lock().unwrap().len(), 4);
    }

    #[tokio::test]
    async fn cycles_are_configuration_errors() {
        let mut orchestrator = Orchestrator::new();
        orchestrator.add(PipelineTask::new("a", &["b"], || async { Ok(()) }));
        orchestrator.add(PipelineTask::new("b", &["a"], || async { Ok(()) }));

        let err = orchestrator.run().await.unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[tokio::test]
    async fn unknown_dependencies_are_configuration_errors() {
        let mut orchestrator = Orchestrator::new();
        orchestrator.add(PipelineTask::new("a", &["ghost"], || async { Ok(()) }));

        let err = orchestrator.run().await.unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[tokio::test]
    async fn duplicate_ids_are_configuration_errors() {
        let mut orchestrator = Orchestrator::new();
        orchestrator.add(PipelineTask::new("a", &[], || async { Ok(()) }));
        orchestrator.add(PipelineTask::new("a", &[], || async { Ok(()) }));

        let err = orchestrator.run().await.unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[tokio::test]
    async fn reports_follow_declaration_order() {
        let order = Arc::new(Mutex::new(Vec::new()));
        let mut orchestrator = Orchestrator::new();
        orchestrator.add(recording_task("z-last", &[], &order));
        orchestrator.add(recording_task("a-first", &["z-last"], &order));

        let summary = orchestrator.run().await.unwrap();
        let ids: Vec<&str> = summary.reports().iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["z-last", "a-first"]);
    }

    #[tokio::test]
    async fn report_serializes_distinct_outcomes() {
        let mut orchestrator = Orchestrator::new();
        orchestrator.add(failing_task("broken", &[]));
        orchestrator.add(PipelineTask::new("after", &["broken"], || async { Ok(()) }));

        let summary = orchestrator.run().await.unwrap();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pipeline-report.json");
        summary.write_json(&path).await.unwrap();

        let json = std::fs::read_to_string(&path).unwrap();
        assert!(json.contains("\"success\": false"));
        assert!(json.contains("\"outcome\": \"failed\""));
        assert!(json.contains("\"outcome\": \"skipped\""));
        assert!(json.contains("\"dependency\": \"broken\""));
    }
}
