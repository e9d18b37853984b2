//! Dependency-graph net: independent operators run in parallel.
//!
//! # Dependencies
//!
//! There is no explicit edge list; edges are inferred from blob names, in
//! definition order. Operator `b` depends on an earlier operator `a` when:
//!
//! - `b` reads a blob whose last writer before `b` is `a` (read after write),
//! - `b` writes a blob whose last writer before `b` is `a` (write after write),
//! - `b` writes a blob that `a` read since that blob was last written
//!   (write after read).
//!
//! The first rule carries data; the other two keep concurrent operators on
//! disjoint blobs. Only the partial order these edges imply is guaranteed.
//!
//! # Chains
//!
//! Operators are grouped into chains: maximal runs where each operator's only
//! child is the next one and that child's only parent is the previous one. A
//! chain runs as a single task, in order, on one worker.
//!
//! # Scheduling
//!
//! Chains whose parents have all completed are spawned onto a `rayon` pool of
//! `max(1, num_workers)` threads. Workers never wait on predecessors; a chain
//! is spawned by whichever worker completes its last parent. When an operator
//! fails, its dependents are never spawned and no new chain starts, so the run
//! ends as soon as the in-flight chains drain and reports the first error.

use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use parking_lot::Mutex;
use rayon::{Scope, ThreadPool, ThreadPoolBuilder};
use tracing::info_span;

use super::{instantiate, Net};
use crate::definition::{NetDef, OperatorDef};
use crate::error::{Error, Result};
use crate::operator::Operator;
use crate::registry::OperatorRegistry;
use crate::workspace::Workspace;

/// Parents and children of one operator, by index.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DagNode {
    pub parents: Vec<usize>,
    pub children: Vec<usize>,
}

/// Infers the dependency graph of `ops` from blob reads and writes.
pub fn compute_dependencies(ops: &[OperatorDef]) -> Vec<DagNode> {
    let mut nodes = vec![DagNode::default(); ops.len()];
    let mut last_writer: HashMap<&str, usize> = HashMap::new();
    let mut readers: HashMap<&str, Vec<usize>> = HashMap::new();

    for (idx, op) in ops.iter().enumerate() {
        let mut parents = BTreeSet::new();

        for input in &op.inputs {
            if let Some(&writer) = last_writer.get(input.as_str()) {
                parents.insert(writer);
            }
        }
        for output in &op.outputs {
            if let Some(&writer) = last_writer.get(output.as_str()) {
                parents.insert(writer);
            }
            if let Some(rs) = readers.get(output.as_str()) {
                parents.extend(rs.iter().copied());
            }
        }
        parents.remove(&idx);

        for input in &op.inputs {
            readers.entry(input.as_str()).or_default().push(idx);
        }
        for output in &op.outputs {
            last_writer.insert(output.as_str(), idx);
            readers.remove(output.as_str());
        }

        for &parent in &parents {
            nodes[parent].children.push(idx);
        }
        nodes[idx].parents = parents.into_iter().collect();
    }

    nodes
}

/// Groups operators into linear chains (see the module docs).
pub fn compute_chains(nodes: &[DagNode]) -> Vec<Vec<usize>> {
    let mut assigned = vec![false; nodes.len()];
    let mut chains = Vec::new();

    for start in 0..nodes.len() {
        if assigned[start] {
            continue;
        }
        let mut chain = vec![start];
        assigned[start] = true;

        let mut current = start;
        while let [child] = nodes[current].children[..] {
            if nodes[child].parents.len() != 1 || assigned[child] {
                break;
            }
            chain.push(child);
            assigned[child] = true;
            current = child;
        }
        chains.push(chain);
    }

    chains
}

/// Chain-level graph derived from operator nodes.
#[derive(Debug, Default)]
struct ChainGraph {
    chains: Vec<Vec<usize>>,
    parent_counts: Vec<usize>,
    children: Vec<Vec<usize>>,
}

impl ChainGraph {
    fn new(nodes: &[DagNode]) -> Self {
        let chains = compute_chains(nodes);
        let mut chain_of = vec![0; nodes.len()];
        for (c, chain) in chains.iter().enumerate() {
            for &op in chain {
                chain_of[op] = c;
            }
        }

        let mut parent_counts = vec![0; chains.len()];
        let mut children = vec![Vec::new(); chains.len()];
        for (c, chain) in chains.iter().enumerate() {
            let tail = chain[chain.len() - 1];
            let next: BTreeSet<usize> = nodes[tail].children.iter().map(|&op| chain_of[op]).collect();
            for &child in &next {
                parent_counts[child] += 1;
            }
            children[c] = next.into_iter().collect();
        }

        Self {
            chains,
            parent_counts,
            children,
        }
    }
}

/// Per-run bookkeeping shared by the workers.
struct RunState<'a> {
    ops: &'a [Mutex<Box<dyn Operator>>],
    graph: &'a ChainGraph,
    pending: Vec<AtomicUsize>,
    run_async: bool,
    failed: AtomicBool,
    completed: AtomicUsize,
    first_error: Mutex<Option<Error>>,
}

impl<'a> RunState<'a> {
    fn run_chain<'s>(&'s self, chain: usize, scope: &Scope<'s>) {
        for &idx in &self.graph.chains[chain] {
            if self.failed.load(Ordering::Acquire) {
                return;
            }
            let result = {
                let mut op = self.ops[idx].lock();
                if self.run_async {
                    op.execute_async()
                } else {
                    op.execute()
                }
            };
            if let Err(e) = result {
                tracing::error!(op = idx, error = %e, "operator failed, stopping dependents");
                self.failed.store(true, Ordering::Release);
                self.first_error.lock().get_or_insert(e);
                return;
            }
            self.completed.fetch_add(1, Ordering::Relaxed);
        }

        for &child in &self.graph.children[chain] {
            if self.pending[child].fetch_sub(1, Ordering::AcqRel) == 1 {
                scope.spawn(move |s| self.run_chain(child, s));
            }
        }
    }
}

/// Parallel net scheduled by inferred blob dependencies.
pub struct DagNet {
    name: String,
    ops: Vec<Mutex<Box<dyn Operator>>>,
    nodes: Vec<DagNode>,
    graph: ChainGraph,
    num_workers: usize,
    pool: ThreadPool,
}

impl DagNet {
    /// Dispatches every operator of `def` and builds the worker pool.
    ///
    /// # Errors
    /// See [`create_net`](super::create_net); also fails if the pool cannot
    /// be started.
    pub fn new(registry: &OperatorRegistry, def: &NetDef, ws: &Workspace) -> Result<Self> {
        let ops = instantiate(registry, def, ws)?;
        let nodes = compute_dependencies(&def.ops);
        let graph = ChainGraph::new(&nodes);
        let num_workers = def.num_workers.max(1);

        let pool = ThreadPoolBuilder::new()
            .num_threads(num_workers)
            .thread_name({
                let name = def.name.clone();
                move |i| format!("{name}-dag-{i}")
            })
            .build()
            .map_err(|e| Error::msg(format!("cannot start worker pool for net {:?}: {e}", def.name)))?;

        tracing::debug!(
            net = %def.name,
            ops = ops.len(),
            chains = graph.chains.len(),
            num_workers,
            "dag net built"
        );

        Ok(Self {
            name: def.name.clone(),
            ops: ops.into_iter().map(Mutex::new).collect(),
            nodes,
            graph,
            num_workers,
            pool,
        })
    }

    /// Dependency graph, indexed like the definition's operators.
    pub fn dependencies(&self) -> &[DagNode] {
        &self.nodes
    }

    /// Execution chains, as operator indices.
    pub fn chains(&self) -> &[Vec<usize>] {
        &self.graph.chains
    }

    pub fn num_workers(&self) -> usize {
        self.num_workers
    }

    fn run_with(&mut self, run_async: bool) -> Result<()> {
        let span = info_span!("dag_net_run", net = %self.name, ops = self.ops.len(), workers = self.num_workers);
        let _guard = span.enter();

        let state = RunState {
            ops: &self.ops,
            graph: &self.graph,
            pending: self.graph.parent_counts.iter().map(|&n| AtomicUsize::new(n)).collect(),
            run_async,
            failed: AtomicBool::new(false),
            completed: AtomicUsize::new(0),
            first_error: Mutex::new(None),
        };

        let state = &state;
        self.pool.scope(|s| {
            for (chain, &parents) in state.graph.parent_counts.iter().enumerate() {
                if parents == 0 {
                    s.spawn(move |s| state.run_chain(chain, s));
                }
            }
        });

        let completed = state.completed.load(Ordering::Relaxed);
        match state.first_error.lock().take() {
            Some(e) => {
                tracing::error!(completed, total = self.ops.len(), "dag net failed");
                Err(e)
            }
            None => Ok(()),
        }
    }
}

impl Net for DagNet {
    fn name(&self) -> &str {
        &self.name
    }

    fn run(&mut self) -> Result<()> {
        self.run_with(false)
    }

    fn run_async(&mut self) -> Result<()> {
        self.run_with(true)
    }

    fn len(&self) -> usize {
        self.ops.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn op(inputs: &[&str], outputs: &[&str]) -> OperatorDef {
        OperatorDef::new("T", "", inputs.iter().copied(), outputs.iter().copied())
    }

    #[test]
    fn last_prior_writer_is_the_parent() {
        let ops = [
            op(&[], &["x"]),
            op(&[], &["x"]),
            op(&["x"], &["y"]),
        ];
        let nodes = compute_dependencies(&ops);
        assert_eq!(nodes[2].parents, vec![1]);
        // The second writer also waits for the first.
        assert_eq!(nodes[1].parents, vec![0]);
        assert_eq!(nodes[0].children, vec![1]);
    }

    #[test]
    fn writer_waits_for_earlier_readers() {
        let ops = [
            op(&[], &["x"]),
            op(&["x"], &["a"]),
            op(&["x"], &["b"]),
            op(&[], &["x"]),
        ];
        let nodes = compute_dependencies(&ops);
        assert_eq!(nodes[1].parents, vec![0]);
        assert_eq!(nodes[2].parents, vec![0]);
        assert_eq!(nodes[3].parents, vec![0, 1, 2]);
    }

    #[test]
    fn inplace_op_does_not_depend_on_itself() {
        let nodes = compute_dependencies(&[op(&[], &["w"]), op(&["w"], &["w"])]);
        assert_eq!(nodes[1].parents, vec![0]);
        assert!(nodes[1].children.is_empty());
    }

    #[test]
    fn chains_follow_single_parent_single_child_runs() {
        // 0 -> 1 -> 2, 2 -> {3, 4}, {3, 4} -> 5
        let ops = [
            op(&["in"], &["a"]),
            op(&["a"], &["b"]),
            op(&["b"], &["c"]),
            op(&["c"], &["d"]),
            op(&["c"], &["e"]),
            op(&["d", "e"], &["out"]),
        ];
        let chains = compute_chains(&compute_dependencies(&ops));
        assert_eq!(chains, vec![vec![0, 1, 2], vec![3], vec![4], vec![5]]);

        let graph = ChainGraph::new(&compute_dependencies(&ops));
        assert_eq!(graph.parent_counts, vec![0, 1, 1, 2]);
        assert_eq!(graph.children[0], vec![1, 2]);
    }
}
