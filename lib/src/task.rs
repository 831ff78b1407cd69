//! Named tasks and the runner that executes them.
//!
//! A task is either an _action_, a function run against a shared context, or
//! a _series_ of other tasks' names, run in order. Series may nest; a series
//! that reaches itself is rejected when run.

use std::fmt;
use std::time::Instant;

use rustc_hash::FxHashMap;

use crate::error::{Chainable, Result};

pub type Action<C> = fn(&C) -> Result<()>;

pub enum Task<C> {
    Action(Action<C>),
    Series(Vec<String>),
}

/// An ordered set of named tasks over a context `C`.
pub struct Registry<C> {
    tasks: Vec<(String, Task<C>)>,
    index: FxHashMap<String, usize>,
}

impl<C> Registry<C> {
    pub fn new() -> Self {
        Registry { tasks: vec![], index: FxHashMap::default() }
    }

    /// Registers `task` as `name`, replacing any task with the same name.
    pub fn register<N: Into<String>>(&mut self, name: N, task: Task<C>) -> &mut Self {
        let name = name.into();
        match self.index.get(&name) {
            Some(&i) => self.tasks[i].1 = task,
            None => {
                self.index.insert(name.clone(), self.tasks.len());
                self.tasks.push((name, task));
            }
        }

        self
    }

    pub fn action<N: Into<String>>(&mut self, name: N, action: Action<C>) -> &mut Self {
        self.register(name, Task::Action(action))
    }

    pub fn series<N, I, S>(&mut self, name: N, tasks: I) -> &mut Self
        where N: Into<String>, I: IntoIterator<Item = S>, S: Into<String>
    {
        self.register(name, Task::Series(tasks.into_iter().map(Into::into).collect()))
    }

    pub fn get(&self, name: &str) -> Option<&Task<C>> {
        self.index.get(name).map(|&i| &self.tasks[i].1)
    }

    /// Task names, in registration order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.tasks.iter().map(|(name, _)| name.as_str())
    }

    /// A one-line description of the task `name`.
    pub fn describe(&self, name: &str) -> Option<String> {
        match self.get(name)? {
            Task::Action(_) => Some("action".into()),
            Task::Series(tasks) => Some(format!("series: {}", tasks.join(", "))),
        }
    }

    /// Runs the task `name`, expanding series depth-first. The first failure
    /// stops the run.
    pub fn run(&self, name: &str, context: &C) -> Result<()> {
        self.run_in(name, context, &mut vec![])
    }

    fn run_in(&self, name: &str, context: &C, stack: &mut Vec<String>) -> Result<()> {
        let Some(task) = self.get(name) else {
            return err! {
                "unknown task",
                "task" => name,
                "known tasks" => self.names().collect::<Vec<_>>().join(", "),
            };
        };

        if stack.iter().any(|t| t == name) {
            return err! {
                "task series contains a cycle",
                "cycle" => format!("{} -> {name}", stack.join(" -> ")),
            };
        }

        tracing::info!(task = name, "starting");
        let start = Instant::now();
        stack.push(name.to_string());
        let result = match task {
            Task::Action(action) => action(context),
            Task::Series(tasks) => tasks.iter().try_for_each(|t| self.run_in(t, context, stack)),
        };

        stack.pop();
        result.chain_with(|| error!("task failed", "task" => name))?;

        let elapsed = start.elapsed();
        tracing::info!(task = name, elapsed_ms = elapsed.as_millis() as u64, "finished");
        Ok(())
    }
}

impl<C> Default for Registry<C> {
    fn default() -> Self {
        Registry::new()
    }
}

impl<C> fmt::Debug for Task<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Task::Action(_) => f.write_str("Action"),
            Task::Series(tasks) => f.debug_tuple("Series").field(tasks).finish(),
        }
    }
}

impl<C> fmt::Debug for Registry<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.tasks.iter().map(|(n, t)| (n, t))).finish()
    }
}
