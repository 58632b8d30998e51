use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EntityKind {
    Season,
    Task,
    Incident,
}

impl EntityKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Season => "season",
            Self::Task => "task",
            Self::Incident => "incident",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Scope {
    Workspace,
    Parent(i64),
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum View {
    Detail(i64),
    List(Scope),
}

// Filters live in a BTreeMap so logically identical queries produce equal
// keys regardless of assembly order.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct QueryKey {
    kind: EntityKind,
    view: View,
    filters: BTreeMap<String, String>,
}

impl QueryKey {
    pub fn detail(kind: EntityKind, id: i64) -> Self {
        Self {
            kind,
            view: View::Detail(id),
            filters: BTreeMap::new(),
        }
    }

    pub fn list(kind: EntityKind, scope: Scope, filters: &[(String, String)]) -> Self {
        Self {
            kind,
            view: View::List(scope),
            filters: filters.iter().cloned().collect(),
        }
    }

    pub fn workspace_list(kind: EntityKind, filters: &[(String, String)]) -> Self {
        Self::list(kind, Scope::Workspace, filters)
    }

    pub fn parent_list(kind: EntityKind, parent_id: i64, filters: &[(String, String)]) -> Self {
        Self::list(kind, Scope::Parent(parent_id), filters)
    }

    pub fn kind(&self) -> EntityKind {
        self.kind
    }

    pub fn view(&self) -> &View {
        &self.view
    }

    pub fn is_list(&self) -> bool {
        matches!(self.view, View::List(_))
    }

    pub fn detail_id(&self) -> Option<i64> {
        match self.view {
            View::Detail(id) => Some(id),
            View::List(_) => None,
        }
    }

    pub fn matches(&self, prefix: &KeyPrefix) -> bool {
        match *prefix {
            KeyPrefix::Kind(kind) => self.kind == kind,
            KeyPrefix::Lists(kind) => self.kind == kind && self.is_list(),
            KeyPrefix::ScopedLists(kind, scope) => {
                self.kind == kind && self.view == View::List(scope)
            }
            KeyPrefix::Detail(kind, id) => self.kind == kind && self.view == View::Detail(id),
        }
    }
}

impl fmt::Display for QueryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.view {
            View::Detail(id) => write!(f, "{}:detail:{}", self.kind.as_str(), id)?,
            View::List(Scope::Workspace) => write!(f, "{}:list:workspace", self.kind.as_str())?,
            View::List(Scope::Parent(parent)) => {
                write!(f, "{}:list:parent:{}", self.kind.as_str(), parent)?
            }
        }
        for (index, (name, value)) in self.filters.iter().enumerate() {
            let separator = if index == 0 { '?' } else { '&' };
            write!(f, "{}{}={}", separator, name, value)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyPrefix {
    Kind(EntityKind),
    Lists(EntityKind),
    ScopedLists(EntityKind, Scope),
    Detail(EntityKind, i64),
}
