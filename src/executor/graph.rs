use hashbrown::HashMap;
use rayon::prelude::*;

use crate::core::StageContext;
use crate::error::{PipelineError, PipelineResult};
use crate::store::FileHandle;

pub type TaskId = usize;

type TaskFn = Box<dyn FnOnce(&TaskContext<'_>) -> PipelineResult<Vec<FileHandle>> + Send>;

const ROOT: TaskId = 0;

/// Reference to the `index`-th handle returned by a task that may not have
/// run yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Promise {
    task: TaskId,
    index: usize,
}

impl Promise {
    pub fn task(&self) -> TaskId {
        self.task
    }

    pub fn index(&self) -> usize {
        self.index
    }
}

/// Stage input known either now (imported file) or once a task finishes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HandleRef {
    Ready(FileHandle),
    Promised(Promise),
}

impl From<FileHandle> for HandleRef {
    fn from(handle: FileHandle) -> Self {
        HandleRef::Ready(handle)
    }
}

impl From<Promise> for HandleRef {
    fn from(promise: Promise) -> Self {
        HandleRef::Promised(promise)
    }
}

struct Task {
    name: String,
    func: Option<TaskFn>,
    parent: Option<TaskId>,
    children: Vec<TaskId>,
}

/// Parent/child task graph.
///
/// A child runs only after its parent finished; tasks that become ready in
/// the same wave run in parallel. Every task has at most one parent, so the
/// graph is a tree rooted at [`TaskGraph::root`].
///
/// # Example
///
/// ```rust, no_run
/// use gatkpipe::executor::graph::TaskGraph;
///
/// let mut graph = TaskGraph::new();
/// let first = graph.add_job("first", |_| Ok(vec![]));
/// let second = graph.add_job("second", |_| Ok(vec![]));
///
/// graph.add_child(graph.root(), first).unwrap();
/// graph.add_child(first, second).unwrap();
/// ```
pub struct TaskGraph {
    tasks: Vec<Task>,
}

impl TaskGraph {
    pub fn new() -> Self {
        Self {
            tasks: vec![Task {
                name: String::from("root"),
                func: Some(Box::new(|_: &TaskContext<'_>| Ok(Vec::new()))),
                parent: None,
                children: Vec::new(),
            }],
        }
    }

    /// The no-op task every other task hangs from
    pub fn root(&self) -> TaskId {
        ROOT
    }

    /// Register a task; it is only scheduled once attached with
    /// [`TaskGraph::add_child`].
    pub fn add_job<F>(&mut self, name: &str, func: F) -> TaskId
    where
        F: FnOnce(&TaskContext<'_>) -> PipelineResult<Vec<FileHandle>> + Send + 'static,
    {
        self.tasks.push(Task {
            name: name.to_string(),
            func: Some(Box::new(func)),
            parent: None,
            children: Vec::new(),
        });

        self.tasks.len() - 1
    }

    /// Declare that `child` runs after `parent`
    pub fn add_child(&mut self, parent: TaskId, child: TaskId) -> PipelineResult<()> {
        if parent >= self.tasks.len() || child >= self.tasks.len() {
            return Err(PipelineError::Graph(format!(
                "unknown task in edge {} -> {}",
                parent, child
            )));
        }

        if child == ROOT {
            return Err(PipelineError::Graph("root cannot be a child".into()));
        }

        if let Some(existing) = self.tasks[child].parent {
            return Err(PipelineError::Graph(format!(
                "{} already has parent {}",
                self.tasks[child].name, self.tasks[existing].name
            )));
        }

        if self.is_ancestor(child, parent) {
            return Err(PipelineError::Graph(format!(
                "edge {} -> {} would create a cycle",
                self.tasks[parent].name, self.tasks[child].name
            )));
        }

        self.tasks[child].parent = Some(parent);
        self.tasks[parent].children.push(child);

        Ok(())
    }

    /// Promise for the `index`-th handle returned by `task`
    pub fn rv(&self, task: TaskId, index: usize) -> Promise {
        Promise { task, index }
    }

    pub fn name(&self, task: TaskId) -> &str {
        &self.tasks[task].name
    }

    pub fn parent(&self, task: TaskId) -> Option<TaskId> {
        self.tasks.get(task).and_then(|t| t.parent)
    }

    /// Number of registered tasks, the root excluded
    pub fn len(&self) -> usize {
        self.tasks.len() - 1
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Parent/child edges by name, breadth-first from the root
    pub fn edges(&self) -> Vec<(String, String)> {
        let mut edges = Vec::new();
        let mut queue = std::collections::VecDeque::from([ROOT]);

        while let Some(id) = queue.pop_front() {
            for &child in &self.tasks[id].children {
                edges.push((self.tasks[id].name.clone(), self.tasks[child].name.clone()));
                queue.push_back(child);
            }
        }

        edges
    }

    fn is_ancestor(&self, ancestor: TaskId, task: TaskId) -> bool {
        let mut current = Some(task);
        while let Some(id) = current {
            if id == ancestor {
                return true;
            }
            current = self.tasks[id].parent;
        }
        false
    }

    /// Run every task reachable from the root and collect their outputs.
    ///
    /// The first failing task aborts the run after its wave completes.
    pub fn execute(mut self, stage: &StageContext<'_>) -> PipelineResult<GraphOutputs> {
        let names: Vec<String> = self.tasks.iter().map(|t| t.name.clone()).collect();
        let parents: Vec<Option<TaskId>> = self.tasks.iter().map(|t| t.parent).collect();

        let mut results: HashMap<TaskId, Vec<FileHandle>> = HashMap::new();
        let mut wave = vec![ROOT];
        let mut depth = 0;

        while !wave.is_empty() {
            let jobs = wave
                .iter()
                .map(|&id| {
                    self.tasks[id]
                        .func
                        .take()
                        .map(|func| (id, func))
                        .ok_or_else(|| {
                            PipelineError::Graph(format!("{} scheduled twice", names[id]))
                        })
                })
                .collect::<PipelineResult<Vec<_>>>()?;

            log::info!(
                "INFO [GRAPH]: wave {} -> {:?}",
                depth,
                wave.iter().map(|&id| names[id].as_str()).collect::<Vec<_>>()
            );

            let done = jobs
                .into_par_iter()
                .map(|(id, func)| {
                    let ctx = TaskContext {
                        task: id,
                        stage,
                        results: &results,
                        names: &names,
                        parents: &parents,
                    };
                    (id, func(&ctx))
                })
                .collect::<Vec<_>>();

            let mut next = Vec::new();
            for (id, result) in done {
                let handles = result.inspect_err(|e| {
                    log::error!("ERROR: task {} failed -> {}", names[id], e);
                })?;

                results.insert(id, handles);
                next.extend(self.tasks[id].children.iter().copied());
            }

            wave = next;
            depth += 1;
        }

        Ok(GraphOutputs { results, names })
    }
}

impl Default for TaskGraph {
    fn default() -> Self {
        Self::new()
    }
}

/// What a running task sees: the stage collaborators plus the outputs of
/// its ancestors.
pub struct TaskContext<'a> {
    task: TaskId,
    pub stage: &'a StageContext<'a>,
    results: &'a HashMap<TaskId, Vec<FileHandle>>,
    names: &'a [String],
    parents: &'a [Option<TaskId>],
}

impl TaskContext<'_> {
    /// Turn a stage input into a concrete handle.
    ///
    /// Promises may only point at ancestors of the running task.
    pub fn resolve(&self, handle: &HandleRef) -> PipelineResult<FileHandle> {
        match handle {
            HandleRef::Ready(handle) => Ok(handle.clone()),
            HandleRef::Promised(promise) => {
                let unresolved = || PipelineError::UnresolvedPromise {
                    task: self
                        .names
                        .get(promise.task)
                        .cloned()
                        .unwrap_or_else(|| promise.task.to_string()),
                    index: promise.index,
                };

                if !self.is_ancestor(promise.task) {
                    return Err(unresolved());
                }

                self.results
                    .get(&promise.task)
                    .and_then(|handles| handles.get(promise.index))
                    .cloned()
                    .ok_or_else(unresolved)
            }
        }
    }

    /// Name of the running task
    pub fn name(&self) -> &str {
        &self.names[self.task]
    }

    fn is_ancestor(&self, ancestor: TaskId) -> bool {
        let mut current = self.parents.get(self.task).copied().flatten();
        while let Some(id) = current {
            if id == ancestor {
                return true;
            }
            current = self.parents.get(id).copied().flatten();
        }
        false
    }
}

/// Outputs of every task after a successful run
#[derive(Debug)]
pub struct GraphOutputs {
    results: HashMap<TaskId, Vec<FileHandle>>,
    names: Vec<String>,
}

impl GraphOutputs {
    pub fn resolve(&self, promise: &Promise) -> PipelineResult<FileHandle> {
        self.results
            .get(&promise.task)
            .and_then(|handles| handles.get(promise.index))
            .cloned()
            .ok_or_else(|| PipelineError::UnresolvedPromise {
                task: self
                    .names
                    .get(promise.task)
                    .cloned()
                    .unwrap_or_else(|| promise.task.to_string()),
                index: promise.index,
            })
    }

    pub fn get(&self, task: TaskId) -> Option<&[FileHandle]> {
        self.results.get(&task).map(|handles| handles.as_slice())
    }

    /// Number of tasks that ran, root included
    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }
}
