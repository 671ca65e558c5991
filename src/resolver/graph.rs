//! Dependency graph over target labels.
//!
//! Built once per sync from the ingested target map, then read-only for
//! the rest of resolution. Traversal state is local to each query; the
//! transitive closure is memoized per root in a concurrent map so dense
//! graphs are not re-walked.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;

use dashmap::DashMap;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::Direction;

use crate::core::label::Label;
use crate::core::target_info::{DependencyKind, TargetInfo};

/// Result of a bounded graph expansion: the nodes taken in, plus the
/// boundary nodes recorded as direct dependencies but not expanded.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct TargetsAtDepth {
    pub targets: HashSet<Label>,
    pub direct_dependencies: HashSet<Label>,
}

pub struct DependencyGraph {
    graph: DiGraph<Label, DependencyKind>,
    node_of: HashMap<Label, NodeIndex>,
    closure_cache: DashMap<Label, Arc<HashSet<Label>>>,
}

impl DependencyGraph {
    /// Build the graph from the full target map. Edges whose endpoint has
    /// no [`TargetInfo`] still get a node, so dangling references resolve
    /// to leaves instead of failing.
    pub fn new(targets: &HashMap<Label, TargetInfo>) -> Self {
        let mut graph = DiGraph::new();
        let mut node_of: HashMap<Label, NodeIndex> = HashMap::with_capacity(targets.len());

        let node = |graph: &mut DiGraph<Label, DependencyKind>,
                        node_of: &mut HashMap<Label, NodeIndex>,
                        label: Label| {
            *node_of.entry(label).or_insert_with(|| graph.add_node(label))
        };

        for (label, info) in targets {
            let from = node(&mut graph, &mut node_of, *label);
            for dep in &info.dependencies {
                let to = node(&mut graph, &mut node_of, dep.id);
                graph.add_edge(from, to, dep.kind);
            }
        }

        DependencyGraph {
            graph,
            node_of,
            closure_cache: DashMap::new(),
        }
    }

    pub fn contains(&self, label: &Label) -> bool {
        self.node_of.contains_key(label)
    }

    /// Direct dependencies of a label.
    pub fn dependencies(&self, label: &Label) -> HashSet<Label> {
        self.neighbors(label, Direction::Outgoing)
    }

    /// Direct reverse dependencies of a label.
    pub fn reverse_dependencies(&self, label: &Label) -> HashSet<Label> {
        self.neighbors(label, Direction::Incoming)
    }

    fn neighbors(&self, label: &Label, direction: Direction) -> HashSet<Label> {
        match self.node_of.get(label) {
            Some(&idx) => self
                .graph
                .neighbors_directed(idx, direction)
                .map(|n| self.graph[n])
                .collect(),
            None => HashSet::new(),
        }
    }

    /// Full transitive dependency closure of one root, excluding the root
    /// itself. Memoized per root; cycle-safe.
    pub fn transitive_dependencies(&self, root: &Label) -> Arc<HashSet<Label>> {
        if let Some(cached) = self.closure_cache.get(root) {
            return Arc::clone(&cached);
        }

        let mut closure = HashSet::new();
        let mut queue: VecDeque<Label> = self.dependencies(root).into_iter().collect();
        while let Some(next) = queue.pop_front() {
            if next != *root && closure.insert(next) {
                queue.extend(self.dependencies(&next));
            }
        }

        let closure = Arc::new(closure);
        self.closure_cache
            .entry(*root)
            .or_insert_with(|| Arc::clone(&closure))
            .clone()
    }

    /// Breadth-first expansion from `roots` up to `depth` levels (negative
    /// means unbounded). Nodes failing `predicate` are recorded as boundary
    /// direct dependencies and never expanded; once the depth budget runs
    /// out, the unexplored dependencies of the final layer are recorded the
    /// same way. Cycles terminate via the visited set.
    pub fn all_targets_at_depth(
        &self,
        depth: i32,
        roots: &HashSet<Label>,
        mut predicate: impl FnMut(&Label) -> bool,
    ) -> TargetsAtDepth {
        let mut targets: HashSet<Label> = roots.clone();
        let mut direct_dependencies: HashSet<Label> = HashSet::new();
        let mut frontier: Vec<Label> = roots.iter().copied().collect();
        let mut remaining = depth;

        while !frontier.is_empty() && (depth < 0 || remaining > 0) {
            let mut next_frontier = Vec::new();
            for label in frontier.drain(..) {
                for dep in self.dependencies(&label) {
                    if targets.contains(&dep) || direct_dependencies.contains(&dep) {
                        continue;
                    }
                    if predicate(&dep) {
                        targets.insert(dep);
                        next_frontier.push(dep);
                    } else {
                        direct_dependencies.insert(dep);
                    }
                }
            }
            frontier = next_frontier;
            remaining -= 1;
        }

        // Depth budget exhausted with unexplored nodes left: their deps
        // become the boundary
        for label in &frontier {
            for dep in self.dependencies(label) {
                if !targets.contains(&dep) {
                    direct_dependencies.insert(dep);
                }
            }
        }

        TargetsAtDepth {
            targets,
            direct_dependencies,
        }
    }

    /// Of `candidates`, keep only those transitively reachable from some
    /// imported target (dead-library elimination).
    pub fn filter_used_libraries(
        &self,
        candidates: HashMap<Label, TargetInfo>,
        imported: &HashSet<Label>,
    ) -> HashMap<Label, TargetInfo> {
        let mut used: HashSet<Label> = HashSet::new();
        for root in imported {
            used.extend(self.transitive_dependencies(root).iter().copied());
        }
        candidates
            .into_iter()
            .filter(|(label, _)| used.contains(label))
            .collect()
    }
}
