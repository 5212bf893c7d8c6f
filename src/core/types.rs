use std::fmt;

use serde::{Deserialize, Serialize};

// ids, edge kinds, contract attributes + shared types

/// Propagated multiplicity of an architecture-level key. Never negative.
pub type Counter = u32;

macro_rules! id_newtype {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub u32);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<u32> for $name {
            fn from(raw: u32) -> Self {
                Self(raw)
            }
        }
    };
}

id_newtype!(
    /// Identifier of a node in the architecture forest.
    ArchNodeId
);
id_newtype!(
    /// Identifier of a declared architecture edge. Lower ids win lifting ties.
    ArchEdgeId
);
id_newtype!(
    /// Identifier of an implementation node (file, class, function, ...).
    ImplNodeId
);
id_newtype!(
    /// Identifier of an implementation edge handed over by an extractor.
    ImplEdgeId
);

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EdgeKind(String);

impl EdgeKind {
    // Predefined edge kinds
    pub const CALLS: &'static str = "calls";
    pub const INHERITS: &'static str = "inherits";
    pub const READS: &'static str = "reads";
    pub const DEPENDS_ON: &'static str = "depends_on";
    pub const CONTAINS: &'static str = "contains";

    pub fn new<S: Into<String>>(s: S) -> Self {
        Self(s.into())
    }

    pub fn calls() -> Self { Self::new(Self::CALLS) }
    pub fn inherits() -> Self { Self::new(Self::INHERITS) }
    pub fn reads() -> Self { Self::new(Self::READS) }
    pub fn depends_on() -> Self { Self::new(Self::DEPENDS_ON) }
    pub fn contains() -> Self { Self::new(Self::CONTAINS) }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for EdgeKind {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for EdgeKind {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl fmt::Display for EdgeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for EdgeKind {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Warning,
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Warning => f.write_str("warning"),
            Severity::Error => f.write_str("error"),
        }
    }
}

/// Contract attributes attached to a declared architecture edge.
///
/// `forbidden` and `optional`/`must_exist` are not meant to be combined; when
/// they are, `forbidden` wins during classification.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct Contract {
    pub optional: bool,
    pub must_exist: bool,
    pub forbidden: bool,
    /// Documentation-only edge: never expected to manifest in the code.
    pub ghost: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub severity: Option<Severity>,
}

impl Contract {
    pub fn optional() -> Self {
        Self { optional: true, ..Self::default() }
    }

    pub fn must_exist() -> Self {
        Self { must_exist: true, ..Self::default() }
    }

    pub fn forbidden() -> Self {
        Self { forbidden: true, ..Self::default() }
    }

    pub fn ghost() -> Self {
        Self { ghost: true, ..Self::default() }
    }

    pub fn with_severity(mut self, severity: Severity) -> Self {
        self.severity = Some(severity);
        self
    }

    /// Severity reported when the declared edge has no propagated support.
    /// Absence is an error unless the declaration lowers it explicitly.
    pub fn absent_severity(&self) -> Severity {
        self.severity.unwrap_or(Severity::Error)
    }

    /// Zero support is acceptable for this contract.
    pub fn tolerates_absence(&self) -> bool {
        self.forbidden || self.optional || self.ghost
    }
}

/// Architecture-level key that implementation edges propagate onto.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PairKey {
    pub from: ArchNodeId,
    pub to: ArchNodeId,
    pub kind: EdgeKind,
}

impl PairKey {
    pub fn new(from: ArchNodeId, to: ArchNodeId, kind: EdgeKind) -> Self {
        Self { from, to, kind }
    }

    pub fn is_internal(&self) -> bool {
        self.from == self.to
    }
}

impl fmt::Display for PairKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -[{}]-> {}", self.from, self.kind, self.to)
    }
}
