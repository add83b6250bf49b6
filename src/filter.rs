//! Predicate for discarding DDL kinds the embedder doesn't want ingested at
//! all, before `Storage` even looks at `job.state`. Kept as a trait rather
//! than a fixed list so an embedder can wire in whatever allow/deny policy
//! its deployment needs (e.g. skip view DDL entirely) without touching the
//! storage core.
use crate::job::DdlKind;

pub trait DdlFilter: Send + Sync {
    fn should_discard_ddl(&self, kind: DdlKind) -> bool;
}

/// Discards nothing; every actionable job is ingested.
#[derive(Debug, Clone, Copy, Default)]
pub struct AllowAllFilter;

impl DdlFilter for AllowAllFilter {
    fn should_discard_ddl(&self, _kind: DdlKind) -> bool {
        false
    }
}

/// Discards every kind in a fixed deny list, supplied at construction.
#[derive(Debug, Clone, Default)]
pub struct DenyListFilter {
    denied: std::collections::HashSet<DdlKindTag>,
}

/// `DdlKind` carries no data, but isn't `Hash`/`Eq` in its own module since
/// nothing there needs set membership. Converting to this tag here keeps
/// that decision local to the one caller that wants it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct DdlKindTag(u8);

impl From<DdlKind> for DdlKindTag {
    fn from(kind: DdlKind) -> Self {
        DdlKindTag(kind as u8)
    }
}

impl DenyListFilter {
    pub fn new(denied: impl IntoIterator<Item = DdlKind>) -> Self {
        Self {
            denied: denied.into_iter().map(DdlKindTag::from).collect(),
        }
    }
}

impl DdlFilter for DenyListFilter {
    fn should_discard_ddl(&self, kind: DdlKind) -> bool {
        self.denied.contains(&DdlKindTag::from(kind))
    }
}
