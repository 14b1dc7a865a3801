//! Targets (coverage goals) and the coverage criteria that produce them.

use std::fmt;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

/// Stable integer identity for a [`Target`], used as the arena key
/// throughout the goal manager and structural graph instead of owning
/// pointers or cyclic references.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TargetId(pub u64);

impl fmt::Display for TargetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "t{}", self.0)
    }
}

/// A coverage criterion that can be toggled on or off for a search run.
///
/// This is the enumerable subset of [`TargetKind`] that a search
/// configuration can enable or disable (see `CRITERION` in the external
/// interfaces). `BranchlessMethod` is not itself selectable: it is the
/// synthetic bucket branch coverage falls back to when an instruction has
/// no controlling predicate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum Criterion {
    Branch,
    Exception,
    Line,
    Statement,
    WeakMutation,
    StrongMutation,
    Method,
    MethodNoException,
    Input,
    Output,
    TryCatch,
    CBranch,
}

impl Criterion {
    /// All criteria, for default-enabled-set construction.
    pub const ALL: [Criterion; 12] = [
        Criterion::Branch,
        Criterion::Exception,
        Criterion::Line,
        Criterion::Statement,
        Criterion::WeakMutation,
        Criterion::StrongMutation,
        Criterion::Method,
        Criterion::MethodNoException,
        Criterion::Input,
        Criterion::Output,
        Criterion::TryCatch,
        Criterion::CBranch,
    ];

    /// Parses a criterion name as it would appear in configuration.
    pub fn parse(name: &str) -> Option<Criterion> {
        Some(match name {
            "Branch" => Criterion::Branch,
            "Exception" => Criterion::Exception,
            "Line" => Criterion::Line,
            "Statement" => Criterion::Statement,
            "WeakMutation" => Criterion::WeakMutation,
            "StrongMutation" => Criterion::StrongMutation,
            "Method" => Criterion::Method,
            "MethodNoException" => Criterion::MethodNoException,
            "Input" => Criterion::Input,
            "Output" => Criterion::Output,
            "TryCatch" => Criterion::TryCatch,
            "CBranch" => Criterion::CBranch,
            _ => return None,
        })
    }
}

impl fmt::Display for Criterion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self:?}")
    }
}

/// Discriminant of what a [`Target`] obliges a test suite to do.
///
/// `BranchlessMethod` has no corresponding [`Criterion`]: it is the
/// dependency-attachment slot used for instructions that have no
/// controlling branch (§4.2).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum TargetKind {
    Branch,
    BranchlessMethod,
    Line,
    Statement,
    Method,
    MethodNoException,
    WeakMutation,
    StrongMutation,
    Input,
    Output,
    TryCatch,
    CBranch,
    Exception,
}

impl TargetKind {
    /// Maps a kind back to the criterion that enables it, if any.
    pub fn criterion(self) -> Option<Criterion> {
        Some(match self {
            TargetKind::Branch | TargetKind::CBranch => Criterion::Branch,
            TargetKind::BranchlessMethod => return None,
            TargetKind::Line => Criterion::Line,
            TargetKind::Statement => Criterion::Statement,
            TargetKind::Method => Criterion::Method,
            TargetKind::MethodNoException => Criterion::MethodNoException,
            TargetKind::WeakMutation => Criterion::WeakMutation,
            TargetKind::StrongMutation => Criterion::StrongMutation,
            TargetKind::Input => Criterion::Input,
            TargetKind::Output => Criterion::Output,
            TargetKind::TryCatch => Criterion::TryCatch,
            TargetKind::Exception => Criterion::Exception,
        })
    }

    /// True for the two kinds the structural graph and branch lookup
    /// tables index on.
    pub fn is_branch_like(self) -> bool {
        matches!(self, TargetKind::Branch | TargetKind::CBranch)
    }
}

/// Branch-specific identity, present only on `Branch`/`CBranch` targets.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BranchMeta {
    pub branch_id: i32,
    pub expression_value: bool,
    pub class_name: String,
    pub method_name: String,
    /// Calling-context discriminator for `CBranch` copies; `None` for a
    /// plain `Branch` target.
    pub context: Option<String>,
}

impl BranchMeta {
    /// The `"class.method"` key used by the branchless-method lookup and by
    /// defect-score resolution.
    pub fn qualified_method(&self) -> String {
        format!("{}.{}", self.class_name, self.method_name)
    }
}

/// A single coverage obligation.
///
/// Targets are immutable apart from the caches the goal manager keeps
/// alongside them (independent-path counts, archive pointers); identity,
/// equality and hashing are all keyed on [`TargetId`] so a `Target` can be
/// cloned freely without the aliasing concerns of a graph of owning
/// pointers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Target {
    pub id: TargetId,
    pub kind: TargetKind,
    pub buggy: bool,
    /// Human-readable identity, e.g. `"pkg.Foo.bar():17"` for a line target
    /// or `"pkg.Foo.bar()"` for a method target. Used for logging and for
    /// the exception-coverage key; carries no behavior.
    pub label: String,
    pub branch: Option<BranchMeta>,
}

impl Target {
    /// Constructs a non-branch target.
    pub fn new(id: TargetId, kind: TargetKind, buggy: bool, label: impl Into<String>) -> Self {
        debug_assert!(!kind.is_branch_like(), "use Target::branch for branch kinds");
        Self {
            id,
            kind,
            buggy,
            label: label.into(),
            branch: None,
        }
    }

    /// Constructs a `Branch` or `CBranch` target.
    pub fn branch(id: TargetId, kind: TargetKind, buggy: bool, meta: BranchMeta) -> Self {
        debug_assert!(kind.is_branch_like());
        let label = format!(
            "{}:{}:{}",
            meta.qualified_method(),
            meta.branch_id,
            meta.expression_value
        );
        Self {
            id,
            kind,
            buggy,
            label,
            branch: Some(meta),
        }
    }
}

impl PartialEq for Target {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Target {}

impl Hash for Target {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn criterion_round_trips_through_parse() {
        for c in Criterion::ALL {
            assert_eq!(Criterion::parse(&c.to_string()), Some(c));
        }
    }

    #[test]
    fn unknown_criterion_name_is_none() {
        assert_eq!(Criterion::parse("NotACriterion"), None);
    }

    #[test]
    fn branch_target_label_encodes_identity() {
        let meta = BranchMeta {
            branch_id: 17,
            expression_value: true,
            class_name: "pkg.Foo".to_string(),
            method_name: "bar()".to_string(),
            context: None,
        };
        let t = Target::branch(TargetId(1), TargetKind::Branch, true, meta);
        assert_eq!(t.label, "pkg.Foo.bar():17:true");
    }

    #[test]
    fn equality_and_hash_are_id_only() {
        let a = Target::new(TargetId(5), TargetKind::Line, false, "a");
        let b = Target::new(TargetId(5), TargetKind::Line, true, "different-label");
        assert_eq!(a, b);
    }
}
