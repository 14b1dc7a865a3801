//! The structural control-dependence graph over branch targets (§4.1).

use std::collections::{HashMap, HashSet};

use indexmap::{IndexMap, IndexSet};

use crate::domain::target::{BranchMeta, Target, TargetId, TargetKind};

/// Supplies control-dependence information for one branch target, as
/// produced by an external control-flow/bytecode extractor (out of scope
/// for this crate per §1).
///
/// For a given branch target, returns the immediate controlling
/// `(branch_id, expression_value)` pairs found by walking upward from the
/// branch's instruction, skipping blocks with no branch and stopping at
/// the first branching block found on each incoming path. An empty result
/// means the branch is reachable from method entry without crossing any
/// predicate, i.e. it is a root.
pub trait ControlDependenceSource {
    fn controlling_predicates(&self, target: &Target) -> Vec<(i32, bool)>;
}

/// A precomputed table implementing [`ControlDependenceSource`], used by
/// tests and by extractors that resolve control dependence ahead of time.
#[derive(Debug, Clone, Default)]
pub struct StaticControlDependence {
    table: HashMap<TargetId, Vec<(i32, bool)>>,
}

impl StaticControlDependence {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, target: TargetId, predicates: Vec<(i32, bool)>) -> Self {
        self.table.insert(target, predicates);
        self
    }
}

impl ControlDependenceSource for StaticControlDependence {
    fn controlling_predicates(&self, target: &Target) -> Vec<(i32, bool)> {
        self.table.get(&target.id).cloned().unwrap_or_default()
    }
}

/// Directed control-dependence graph over branch targets.
///
/// Vertices are branch (`Branch`/`CBranch`) targets; an edge `a -> b` means
/// `a` is an immediate controlling predicate of `b`. A branch with no
/// controlling predicate on any incoming path is a root.
#[derive(Debug, Clone, Default)]
pub struct StructuralGraph {
    roots: IndexSet<TargetId>,
    children: IndexMap<TargetId, IndexSet<TargetId>>,
    parents: IndexMap<TargetId, IndexSet<TargetId>>,
    /// Vertices synthesized because the control-dependence walk named a
    /// `(branch_id, expression_value)` slot with no matching goal target.
    synthetic: HashSet<TargetId>,
    descendant_cache: std::cell::RefCell<HashMap<TargetId, IndexSet<TargetId>>>,
    next_synthetic_id: std::cell::Cell<u64>,
}

impl StructuralGraph {
    /// Builds the graph from the `Branch`/`CBranch` subset of `goals`,
    /// using `source` to discover each branch's controlling predicates.
    ///
    /// Vertices are added for every branch-like goal. For each, the
    /// (deduplicated) controlling `(branch_id, value)` pairs are resolved
    /// against the branch index built from `goals`; a pair with no
    /// matching goal is synthesized as a new vertex (it still
    /// participates in the graph, but is not itself a covered obligation).
    pub fn new(goals: &[Target], source: &dyn ControlDependenceSource) -> Self {
        let mut graph = Self {
            next_synthetic_id: std::cell::Cell::new(1_000_000_000),
            ..Self::default()
        };

        let branches: Vec<&Target> = goals.iter().filter(|t| t.kind.is_branch_like()).collect();

        // (branch_id, expression_value) -> target id, first-goal-wins,
        // used to resolve synthesized parent slots back to real targets.
        let mut by_slot: HashMap<(i32, bool), TargetId> = HashMap::new();
        for t in &branches {
            graph.children.entry(t.id).or_default();
            graph.parents.entry(t.id).or_default();
            if let Some(meta) = &t.branch {
                by_slot.entry((meta.branch_id, meta.expression_value)).or_insert(t.id);
            }
        }

        for t in &branches {
            let predicates = dedup(source.controlling_predicates(t));
            if predicates.is_empty() {
                graph.roots.insert(t.id);
                continue;
            }
            for (parent_branch_id, parent_value) in predicates {
                let parent_id = graph.resolve_or_synthesize(
                    &mut by_slot,
                    parent_branch_id,
                    parent_value,
                    t,
                );
                graph.children.entry(parent_id).or_default().insert(t.id);
                graph.parents.entry(t.id).or_default().insert(parent_id);
            }
        }

        graph
    }

    fn resolve_or_synthesize(
        &mut self,
        by_slot: &mut HashMap<(i32, bool), TargetId>,
        branch_id: i32,
        value: bool,
        child: &Target,
    ) -> TargetId {
        if let Some(id) = by_slot.get(&(branch_id, value)) {
            return *id;
        }
        let id = TargetId(self.next_synthetic_id.get());
        self.next_synthetic_id.set(self.next_synthetic_id.get() + 1);
        by_slot.insert((branch_id, value), id);
        self.synthetic.insert(id);
        self.children.entry(id).or_default();
        self.parents.entry(id).or_default();
        self.roots.insert(id);

        let meta = child.branch.as_ref().map(|m| BranchMeta {
            branch_id,
            expression_value: value,
            class_name: m.class_name.clone(),
            method_name: m.method_name.clone(),
            context: None,
        });
        let _ = meta; // identity only; synthesized vertices carry no FitnessFunction
        id
    }

    /// Branches with no controlling predicate on any incoming path.
    pub fn roots(&self) -> &IndexSet<TargetId> {
        &self.roots
    }

    /// Immediate structural children of `id`.
    pub fn children(&self, id: TargetId) -> IndexSet<TargetId> {
        self.children.get(&id).cloned().unwrap_or_default()
    }

    /// Immediate structural parents of `id`.
    pub fn parents(&self, id: TargetId) -> IndexSet<TargetId> {
        self.parents.get(&id).cloned().unwrap_or_default()
    }

    /// Whether `id` is a vertex synthesized to fill a parent slot with no
    /// matching goal target (never itself a covered obligation).
    pub fn is_synthetic(&self, id: TargetId) -> bool {
        self.synthetic.contains(&id)
    }

    /// Transitive closure of structural descendants of `id`, memoized.
    pub fn all_descendants(&self, id: TargetId) -> IndexSet<TargetId> {
        if let Some(cached) = self.descendant_cache.borrow().get(&id) {
            return cached.clone();
        }
        let mut visited = IndexSet::new();
        let mut stack: Vec<TargetId> = self.children(id).into_iter().collect();
        while let Some(next) = stack.pop() {
            if visited.insert(next) {
                stack.extend(self.children(next));
            }
        }
        self.descendant_cache.borrow_mut().insert(id, visited.clone());
        visited
    }

    /// Number of distinct root-to-leaf independent paths reaching `id`
    /// from any root, used by goal-adjustment path balancing (§4.4, §4.7).
    /// Counts the number of distinct simple upward paths from `id` to a
    /// root; a branch with a single root parent and no further ancestors
    /// has one path.
    pub fn num_independent_paths(&self, id: TargetId) -> u64 {
        let parents = self.parents(id);
        if parents.is_empty() {
            return 1;
        }
        parents.iter().map(|p| self.num_independent_paths(*p)).sum()
    }
}

fn dedup(pairs: Vec<(i32, bool)>) -> Vec<(i32, bool)> {
    let mut seen = HashSet::new();
    let mut out = Vec::new();
    for p in pairs {
        if seen.insert(p) {
            out.push(p);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::target::Target;

    fn branch(id: u64, branch_id: i32, value: bool) -> Target {
        Target::branch(
            TargetId(id),
            TargetKind::Branch,
            false,
            BranchMeta {
                branch_id,
                expression_value: value,
                class_name: "pkg.Foo".to_string(),
                method_name: "bar()".to_string(),
                context: None,
            },
        )
    }

    #[test]
    fn branch_with_no_predicate_is_a_root() {
        let goals = vec![branch(1, 1, true)];
        let source = StaticControlDependence::new();
        let g = StructuralGraph::new(&goals, &source);
        assert!(g.roots().contains(&TargetId(1)));
    }

    #[test]
    fn child_edge_is_added_from_controlling_parent() {
        let goals = vec![branch(1, 1, true), branch(2, 2, true)];
        let source = StaticControlDependence::new().with(TargetId(2), vec![(1, true)]);
        let g = StructuralGraph::new(&goals, &source);

        assert!(g.roots().contains(&TargetId(1)));
        assert!(!g.roots().contains(&TargetId(2)));
        assert!(g.children(TargetId(1)).contains(&TargetId(2)));
        assert!(g.parents(TargetId(2)).contains(&TargetId(1)));
    }

    #[test]
    fn duplicate_controlling_pairs_are_deduped() {
        let goals = vec![branch(1, 1, true), branch(2, 2, true)];
        let source =
            StaticControlDependence::new().with(TargetId(2), vec![(1, true), (1, true)]);
        let g = StructuralGraph::new(&goals, &source);
        assert_eq!(g.parents(TargetId(2)).len(), 1);
    }

    #[test]
    fn missing_parent_slot_is_synthesized_as_a_root() {
        let goals = vec![branch(2, 2, true)];
        let source = StaticControlDependence::new().with(TargetId(2), vec![(99, false)]);
        let g = StructuralGraph::new(&goals, &source);

        let parents = g.parents(TargetId(2));
        assert_eq!(parents.len(), 1);
        let synth = *parents.iter().next().unwrap();
        assert!(g.is_synthetic(synth));
        assert!(g.roots().contains(&synth));
    }

    #[test]
    fn all_descendants_is_transitive() {
        let goals = vec![branch(1, 1, true), branch(2, 2, true), branch(3, 3, true)];
        let source = StaticControlDependence::new()
            .with(TargetId(2), vec![(1, true)])
            .with(TargetId(3), vec![(2, true)]);
        let g = StructuralGraph::new(&goals, &source);

        let descendants = g.all_descendants(TargetId(1));
        assert!(descendants.contains(&TargetId(2)));
        assert!(descendants.contains(&TargetId(3)));
    }

    #[test]
    fn num_independent_paths_counts_root_parent_chains() {
        let goals = vec![branch(1, 1, true), branch(2, 2, true), branch(3, 3, true)];
        let source = StaticControlDependence::new()
            .with(TargetId(2), vec![(1, true)])
            .with(TargetId(3), vec![(1, true), (2, true)]);
        let g = StructuralGraph::new(&goals, &source);

        assert_eq!(g.num_independent_paths(TargetId(1)), 1);
        assert_eq!(g.num_independent_paths(TargetId(2)), 1);
        // Target 3 is reachable via root 1 directly, and via 1 -> 2 -> 3.
        assert_eq!(g.num_independent_paths(TargetId(3)), 2);
    }
}
