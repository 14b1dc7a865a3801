//! Dependency augmentation (§4.2): attaches non-branch targets to the
//! innermost controlling branch+value, or to a synthesized branchless-method
//! slot when the instruction has no controlling predicate.

use indexmap::{IndexMap, IndexSet};

use crate::domain::target::{Target, TargetId, TargetKind};

/// Identifies where a non-branch target is attached in the dependency map:
/// either the matching `(branch_id, expression_value)` slot, or the
/// enclosing method's branchless slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AttachmentPoint {
    Branch { branch_id: i32, expression_value: bool },
    BranchlessMethod(TargetId),
}

/// Maps an attachment point to the non-branch targets attached there.
///
/// Exception coverage is deliberately never attached here (§4.2): it is
/// handled post-execution directly against the registry (§4.6 step 5).
#[derive(Debug, Clone, Default)]
pub struct DependencyMap {
    by_branch: IndexMap<(i32, bool), IndexSet<TargetId>>,
    by_branchless_method: IndexMap<TargetId, IndexSet<TargetId>>,
}

impl DependencyMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attaches `dependent` at `point`. A no-op for `Exception` targets,
    /// which this map never indexes.
    pub fn attach(&mut self, point: AttachmentPoint, dependent: TargetId) {
        match point {
            AttachmentPoint::Branch { branch_id, expression_value } => {
                self.by_branch
                    .entry((branch_id, expression_value))
                    .or_default()
                    .insert(dependent);
            }
            AttachmentPoint::BranchlessMethod(method_id) => {
                self.by_branchless_method.entry(method_id).or_default().insert(dependent);
            }
        }
    }

    /// Dependents attached to a covered `(branch_id, expression_value)`.
    pub fn dependents_of_branch(&self, branch_id: i32, expression_value: bool) -> IndexSet<TargetId> {
        self.by_branch
            .get(&(branch_id, expression_value))
            .cloned()
            .unwrap_or_default()
    }

    /// Dependents attached to a covered branchless-method slot.
    pub fn dependents_of_branchless_method(&self, method_id: TargetId) -> IndexSet<TargetId> {
        self.by_branchless_method.get(&method_id).cloned().unwrap_or_default()
    }
}

/// Resolves where `target`'s instruction attaches, given the controlling
/// predicates reported by the control-dependence source and, when there is
/// none, the branchless-method slot for its enclosing method.
///
/// CBranch (context-sensitive branch) targets are expanded into one copy
/// per calling context by whatever produces the goal input sequence
/// upstream of this crate (§1: the call-graph extractor is an external
/// collaborator); each resulting copy arrives here as an ordinary branch
/// target and is attached individually through the same rule.
pub fn attachment_point_for(
    controlling: Option<(i32, bool)>,
    branchless_method: TargetId,
) -> AttachmentPoint {
    match controlling {
        Some((branch_id, expression_value)) => AttachmentPoint::Branch { branch_id, expression_value },
        None => AttachmentPoint::BranchlessMethod(branchless_method),
    }
}

/// True for criteria whose targets attach at method entry rather than at
/// their controlling predicate, per §4.2.
pub fn attaches_at_method_entry(kind: TargetKind) -> bool {
    matches!(kind, TargetKind::Method | TargetKind::MethodNoException)
}

/// True for the one criterion never attached into the dependency map.
pub fn is_exempt_from_dependency_attachment(kind: TargetKind) -> bool {
    matches!(kind, TargetKind::Exception)
}

pub fn should_attach(target: &Target) -> bool {
    !is_exempt_from_dependency_attachment(target.kind)
}
