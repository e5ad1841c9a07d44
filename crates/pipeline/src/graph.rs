//! Stage graph compiler and executor.
//!
//! A pipeline is a fixed set of named [`Stage`]s joined by edges. An edge is
//! either direct or conditional; a conditional edge is a pure routing
//! function returning a closed [`Route`] enum whose variants name the
//! declared successors. [`GraphBuilder::compile`] validates the whole graph
//! up front (unknown targets, missing or duplicate edges, unreachable stages,
//! cycles), so a [`CompiledGraph`] can only fail at run time through its
//! stages.
//!
//! ## Execution
//!
//! [`CompiledGraph::invoke`] starts at the entry stage and repeats:
//!
//! 1. run the stage against an immutable snapshot of the state,
//! 2. merge the returned patch into a fresh copy of the state,
//! 3. follow the outgoing edge, evaluating routers against the post-merge
//!    state, until [`END`] is reached.
//!
//! A stage that returns `Err` or panics is converted into an error patch
//! naming the stage. The run then continues along its normal edges if an
//! error-handling stage (see [`Stage::handles_errors`]) is reachable from the
//! failed stage; otherwise it stops immediately.

use std::collections::{HashMap, HashSet, VecDeque};
use std::fmt::Debug;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use async_trait::async_trait;
use futures::FutureExt;
use tracing::{debug, error, info, instrument, warn};

use crate::fanout::panic_message;
use crate::{PipelineState, PitchError};

/// Terminal marker. Edges pointing here end the run.
pub const END: &str = "__end__";

/// One unit of pipeline work.
#[async_trait]
pub trait Stage<S: PipelineState>: Send + Sync {
    /// Reads the current state and returns a patch to merge into it.
    async fn run(&self, state: Arc<S>) -> Result<S::Patch, PitchError>;

    /// Returns `true` for stages that turn an upstream error into a result.
    fn handles_errors(&self) -> bool {
        false
    }
}

/// Closed set of successors for a conditional edge.
pub trait Route: Copy + Eq + Debug + Send + Sync + 'static {
    /// Every variant. The compiler checks each one's target exists.
    fn variants() -> &'static [Self];

    /// Stage name (or [`END`]) this variant routes to.
    fn target(self) -> &'static str;
}

type Router<S> = Arc<dyn Fn(&S) -> &'static str + Send + Sync>;

enum EdgeSpec<S> {
    Direct(&'static str),
    Conditional {
        targets: Vec<&'static str>,
        router: Router<S>,
    },
}

impl<S> EdgeSpec<S> {
    fn targets(&self) -> Vec<&'static str> {
        match self {
            Self::Direct(to) => vec![*to],
            Self::Conditional { targets, .. } => targets.clone(),
        }
    }
}

/// Collects stages and edges, then [`compile`](Self::compile)s them.
pub struct GraphBuilder<S: PipelineState> {
    name: &'static str,
    stages: Vec<(&'static str, Arc<dyn Stage<S>>)>,
    edges: Vec<(&'static str, EdgeSpec<S>)>,
    entry: Option<&'static str>,
}

impl<S: PipelineState> GraphBuilder<S> {
    /// Starts an empty graph. `name` is used in logs and error messages.
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            stages: Vec::new(),
            edges: Vec::new(),
            entry: None,
        }
    }

    pub fn add_stage(mut self, name: &'static str, stage: impl Stage<S> + 'static) -> Self {
        self.stages.push((name, Arc::new(stage)));
        self
    }

    pub fn add_edge(mut self, from: &'static str, to: &'static str) -> Self {
        self.edges.push((from, EdgeSpec::Direct(to)));
        self
    }

    /// Adds a conditional edge routed by `router` over the post-merge state.
    pub fn add_conditional_edge<R: Route>(mut self, from: &'static str, router: fn(&S) -> R) -> Self {
        let targets = R::variants().iter().map(|r| r.target()).collect();
        let router: Router<S> = Arc::new(move |state: &S| router(state).target());
        self.edges
            .push((from, EdgeSpec::Conditional { targets, router }));
        self
    }

    pub fn set_entry(mut self, name: &'static str) -> Self {
        self.entry = Some(name);
        self
    }

    /// Validates the graph and produces an executable [`CompiledGraph`].
    pub fn compile(self) -> Result<CompiledGraph<S>, PitchError> {
        let graph = self.name;
        let fail = |message: String| PitchError::configuration(format!("graph '{graph}': {message}"));

        let mut index = HashMap::with_capacity(self.stages.len());
        for (i, (name, _)) in self.stages.iter().enumerate() {
            if *name == END {
                return Err(fail(format!("'{END}' is reserved")));
            }
            if index.insert(*name, i).is_some() {
                return Err(fail(format!("stage '{name}' is declared twice")));
            }
        }

        let entry = self.entry.ok_or_else(|| fail("no entry stage".to_string()))?;
        let entry = *index
            .get(entry)
            .ok_or_else(|| fail(format!("entry stage '{entry}' is not declared")))?;

        let mut outgoing: Vec<Option<EdgeSpec<S>>> = self.stages.iter().map(|_| None).collect();
        for (from, edge) in self.edges {
            let &i = index
                .get(from)
                .ok_or_else(|| fail(format!("edge from undeclared stage '{from}'")))?;
            let targets = edge.targets();
            if targets.is_empty() {
                return Err(fail(format!("conditional edge from '{from}' has no routes")));
            }
            if let Some(to) = targets.iter().find(|t| **t != END && !index.contains_key(*t)) {
                return Err(fail(format!("edge '{from}' -> '{to}' targets an undeclared stage")));
            }
            if outgoing[i].replace(edge).is_some() {
                return Err(fail(format!("stage '{from}' has more than one outgoing edge")));
            }
        }

        let mut edges = Vec::with_capacity(outgoing.len());
        let mut successors = Vec::with_capacity(outgoing.len());
        for (i, edge) in outgoing.into_iter().enumerate() {
            let name = self.stages[i].0;
            let edge = edge.ok_or_else(|| fail(format!("stage '{name}' has no outgoing edge")))?;
            successors.push(
                edge.targets()
                    .iter()
                    .filter_map(|t| index.get(t).copied())
                    .collect::<Vec<usize>>(),
            );
            edges.push(match edge {
                EdgeSpec::Direct(to) => Edge::Direct(resolve(&index, to)),
                EdgeSpec::Conditional { router, .. } => Edge::Conditional(router),
            });
        }

        let order = topological_order(&successors)
            .ok_or_else(|| fail("stage edges form a cycle".to_string()))?;

        let reachable = reachable_from(entry, &successors);
        if let Some((name, _)) = self
            .stages
            .iter()
            .enumerate()
            .find(|(i, _)| !reachable.contains(i))
            .map(|(_, s)| s)
        {
            return Err(fail(format!("stage '{name}' is unreachable from the entry")));
        }

        // Walk in reverse topological order so successors are decided first.
        let mut reaches_handler = vec![false; self.stages.len()];
        for &i in order.iter().rev() {
            reaches_handler[i] = successors[i]
                .iter()
                .any(|&j| self.stages[j].1.handles_errors() || reaches_handler[j]);
        }

        debug!(graph, stages = self.stages.len(), "compiled pipeline graph");
        Ok(CompiledGraph {
            name: graph,
            stages: self.stages,
            edges,
            index,
            entry,
            reaches_handler,
        })
    }
}

fn resolve(index: &HashMap<&'static str, usize>, to: &'static str) -> Target {
    match index.get(to) {
        Some(&i) => Target::Stage(i),
        None => Target::End,
    }
}

/// Kahn's algorithm; `None` if the graph has a cycle.
fn topological_order(successors: &[Vec<usize>]) -> Option<Vec<usize>> {
    let mut in_degree = vec![0usize; successors.len()];
    for targets in successors {
        for &t in targets {
            in_degree[t] += 1;
        }
    }
    let mut ready: VecDeque<usize> = (0..successors.len()).filter(|&i| in_degree[i] == 0).collect();
    let mut order = Vec::with_capacity(successors.len());
    while let Some(i) = ready.pop_front() {
        order.push(i);
        for &t in &successors[i] {
            in_degree[t] -= 1;
            if in_degree[t] == 0 {
                ready.push_back(t);
            }
        }
    }
    (order.len() == successors.len()).then_some(order)
}

fn reachable_from(entry: usize, successors: &[Vec<usize>]) -> HashSet<usize> {
    let mut seen = HashSet::from([entry]);
    let mut queue = VecDeque::from([entry]);
    while let Some(i) = queue.pop_front() {
        for &t in &successors[i] {
            if seen.insert(t) {
                queue.push_back(t);
            }
        }
    }
    seen
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Target {
    Stage(usize),
    End,
}

enum Edge<S> {
    Direct(Target),
    Conditional(Router<S>),
}

/// Final state of a run plus the path it took.
#[derive(Debug, Clone)]
pub struct RunOutcome<S> {
    pub state: S,
    /// Stage names in execution order.
    pub visited: Vec<&'static str>,
    /// Stages whose patch wrote the run's output.
    pub output_writers: Vec<&'static str>,
}

/// A validated, executable stage graph.
pub struct CompiledGraph<S: PipelineState> {
    name: &'static str,
    stages: Vec<(&'static str, Arc<dyn Stage<S>>)>,
    edges: Vec<Edge<S>>,
    index: HashMap<&'static str, usize>,
    entry: usize,
    reaches_handler: Vec<bool>,
}

impl<S: PipelineState> CompiledGraph<S> {
    /// Graph name given to the builder.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Declared stage names in declaration order.
    pub fn stage_names(&self) -> Vec<&'static str> {
        self.stages.iter().map(|(name, _)| *name).collect()
    }

    /// Runs the graph from the entry stage to [`END`].
    #[instrument(skip_all, fields(graph = self.name))]
    pub async fn invoke(&self, initial: S) -> RunOutcome<S> {
        let mut state = Arc::new(initial);
        let mut visited = Vec::new();
        let mut output_writers = Vec::new();
        let mut current = self.entry;

        loop {
            let (name, stage) = &self.stages[current];
            visited.push(*name);
            debug!(stage = *name, "running stage");

            let outcome = AssertUnwindSafe(stage.run(Arc::clone(&state)))
                .catch_unwind()
                .await;
            let (patch, failed) = match outcome {
                Ok(Ok(patch)) => (patch, false),
                Ok(Err(err)) => {
                    warn!(stage = *name, error = %err, "stage failed");
                    (S::error_patch(format!("{name} failed: {err}")), true)
                }
                Err(payload) => {
                    let message = panic_message(payload.as_ref());
                    error!(stage = *name, panic = %message, "stage panicked");
                    (S::error_patch(format!("{name} panicked: {message}")), true)
                }
            };

            if S::writes_output(&patch) {
                output_writers.push(*name);
            }
            let mut next = S::clone(&state);
            next.merge(patch);
            state = Arc::new(next);

            if failed && !self.reaches_handler[current] {
                info!(stage = *name, "no error handler reachable, ending run");
                break;
            }

            let target = match &self.edges[current] {
                Edge::Direct(target) => *target,
                Edge::Conditional(router) => {
                    let to = router(&state);
                    debug!(stage = *name, route = to, "conditional edge resolved");
                    resolve(&self.index, to)
                }
            };
            match target {
                Target::Stage(next) => current = next,
                Target::End => break,
            }
        }

        info!(stages = visited.len(), failed = state.error().is_some(), "run finished");
        let state = Arc::try_unwrap(state).unwrap_or_else(|shared| S::clone(&shared));
        RunOutcome {
            state,
            visited,
            output_writers,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{append_or_replace, merge_error, replace, ListPatch};

    #[derive(Debug, Clone, Default)]
    struct Tally {
        values: Vec<u32>,
        output: Option<String>,
        error: Option<String>,
    }

    #[derive(Default)]
    struct TallyPatch {
        values: Option<ListPatch<u32>>,
        output: Option<String>,
        error: Option<String>,
    }

    impl PipelineState for Tally {
        type Patch = TallyPatch;

        fn merge(&mut self, patch: TallyPatch) {
            append_or_replace(&mut self.values, patch.values);
            replace(&mut self.output, patch.output);
            merge_error(&mut self.error, patch.error);
        }

        fn error(&self) -> Option<&str> {
            self.error.as_deref()
        }

        fn error_patch(message: String) -> TallyPatch {
            TallyPatch {
                error: Some(message),
                ..Default::default()
            }
        }

        fn writes_output(patch: &TallyPatch) -> bool {
            patch.output.is_some()
        }
    }

    struct Push(u32);

    #[async_trait]
    impl Stage<Tally> for Push {
        async fn run(&self, state: Arc<Tally>) -> Result<TallyPatch, PitchError> {
            if state.error.is_some() {
                return Ok(TallyPatch::default());
            }
            Ok(TallyPatch {
                values: Some(ListPatch::Append(self.0)),
                ..Default::default()
            })
        }
    }

    struct Fail;

    #[async_trait]
    impl Stage<Tally> for Fail {
        async fn run(&self, _: Arc<Tally>) -> Result<TallyPatch, PitchError> {
            Err(PitchError::validation("nothing to do"))
        }
    }

    struct Explode;

    #[async_trait]
    impl Stage<Tally> for Explode {
        async fn run(&self, _: Arc<Tally>) -> Result<TallyPatch, PitchError> {
            panic!("kaboom")
        }
    }

    struct Finish;

    #[async_trait]
    impl Stage<Tally> for Finish {
        async fn run(&self, state: Arc<Tally>) -> Result<TallyPatch, PitchError> {
            let output = match &state.error {
                Some(err) => format!("failed: {err}"),
                None => format!("sum={}", state.values.iter().sum::<u32>()),
            };
            Ok(TallyPatch {
                output: Some(output),
                ..Default::default()
            })
        }

        fn handles_errors(&self) -> bool {
            true
        }
    }

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum Parity {
        Even,
        Odd,
    }

    impl Route for Parity {
        fn variants() -> &'static [Self] {
            &[Self::Even, Self::Odd]
        }

        fn target(self) -> &'static str {
            match self {
                Self::Even => "even",
                Self::Odd => "odd",
            }
        }
    }

    fn by_parity(state: &Tally) -> Parity {
        if state.values.iter().sum::<u32>() % 2 == 0 {
            Parity::Even
        } else {
            Parity::Odd
        }
    }

    fn branching(first: u32) -> CompiledGraph<Tally> {
        GraphBuilder::new("branching")
            .add_stage("start", Push(first))
            .add_stage("even", Push(100))
            .add_stage("odd", Push(1000))
            .add_stage("finish", Finish)
            .set_entry("start")
            .add_conditional_edge("start", by_parity)
            .add_edge("even", "finish")
            .add_edge("odd", "finish")
            .add_edge("finish", END)
            .compile()
            .unwrap()
    }

    #[tokio::test]
    async fn runs_stages_in_order_and_merges_patches() {
        let graph = GraphBuilder::new("linear")
            .add_stage("a", Push(1))
            .add_stage("b", Push(2))
            .add_stage("finish", Finish)
            .set_entry("a")
            .add_edge("a", "b")
            .add_edge("b", "finish")
            .add_edge("finish", END)
            .compile()
            .unwrap();

        let outcome = graph.invoke(Tally::default()).await;
        assert_eq!(outcome.visited, vec!["a", "b", "finish"]);
        assert_eq!(outcome.state.values, vec![1, 2]);
        assert_eq!(outcome.state.output.as_deref(), Some("sum=3"));
        assert_eq!(outcome.output_writers, vec!["finish"]);
    }

    #[tokio::test]
    async fn routers_see_the_post_merge_state() {
        let even = branching(2).invoke(Tally::default()).await;
        assert_eq!(even.visited, vec!["start", "even", "finish"]);

        let odd = branching(3).invoke(Tally::default()).await;
        assert_eq!(odd.visited, vec!["start", "odd", "finish"]);
        assert_eq!(odd.state.output.as_deref(), Some("sum=1003"));
    }

    #[tokio::test]
    async fn failure_routes_through_reachable_error_handler() {
        let graph = GraphBuilder::new("recovering")
            .add_stage("fail", Fail)
            .add_stage("push", Push(5))
            .add_stage("finish", Finish)
            .set_entry("fail")
            .add_edge("fail", "push")
            .add_edge("push", "finish")
            .add_edge("finish", END)
            .compile()
            .unwrap();

        let outcome = graph.invoke(Tally::default()).await;
        assert_eq!(outcome.visited, vec!["fail", "push", "finish"]);
        assert!(outcome.state.values.is_empty());
        let error = outcome.state.error.unwrap();
        assert!(error.starts_with("fail failed: Validation error"));
        assert!(outcome.state.output.unwrap().starts_with("failed: fail failed"));
    }

    #[tokio::test]
    async fn failure_without_error_handler_ends_the_run() {
        let graph = GraphBuilder::new("fragile")
            .add_stage("a", Push(1))
            .add_stage("boom", Explode)
            .add_stage("b", Push(2))
            .set_entry("a")
            .add_edge("a", "boom")
            .add_edge("boom", "b")
            .add_edge("b", END)
            .compile()
            .unwrap();

        let outcome = graph.invoke(Tally::default()).await;
        assert_eq!(outcome.visited, vec!["a", "boom"]);
        assert_eq!(outcome.state.values, vec![1]);
        assert_eq!(outcome.state.error.as_deref(), Some("boom panicked: kaboom"));
        assert!(outcome.output_writers.is_empty());
    }

    #[test]
    fn cycles_are_rejected_at_compile_time() {
        let err = GraphBuilder::new("loop")
            .add_stage("a", Push(1))
            .add_stage("b", Push(2))
            .set_entry("a")
            .add_edge("a", "b")
            .add_edge("b", "a")
            .compile()
            .err()
            .unwrap();
        assert!(err.to_string().contains("cycle"), "{err}");
    }

    #[test]
    fn structural_mistakes_are_configuration_errors() {
        let undeclared = GraphBuilder::<Tally>::new("g")
            .add_stage("a", Push(1))
            .set_entry("a")
            .add_edge("a", "missing")
            .compile()
            .err()
            .unwrap();
        assert!(undeclared.to_string().contains("undeclared stage"));

        let dangling = GraphBuilder::<Tally>::new("g")
            .add_stage("a", Push(1))
            .set_entry("a")
            .compile()
            .err()
            .unwrap();
        assert!(dangling.to_string().contains("no outgoing edge"));

        let doubled = GraphBuilder::<Tally>::new("g")
            .add_stage("a", Push(1))
            .set_entry("a")
            .add_edge("a", END)
            .add_edge("a", END)
            .compile()
            .err()
            .unwrap();
        assert!(doubled.to_string().contains("more than one outgoing edge"));

        let orphan = GraphBuilder::<Tally>::new("g")
            .add_stage("a", Push(1))
            .add_stage("b", Push(2))
            .set_entry("a")
            .add_edge("a", END)
            .add_edge("b", END)
            .compile()
            .err()
            .unwrap();
        assert!(orphan.to_string().contains("'b' is unreachable"));

        let no_entry = GraphBuilder::<Tally>::new("g")
            .add_stage("a", Push(1))
            .add_edge("a", END)
            .compile()
            .err()
            .unwrap();
        assert!(matches!(no_entry, PitchError::Configuration { .. }));
    }
}
