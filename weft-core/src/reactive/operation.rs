//! Operation tags.
//!
//! Every tracked read and every triggered mutation is classified by one of
//! these tags. Observer hooks receive them verbatim.

/// The kind of operation that produced a track or trigger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize)]
pub enum OperationKind {
    /// A keyed read.
    Get,
    /// A key-presence test.
    Has,
    /// An observation of the container's shape (enumeration, size).
    Iterate,
    /// An overwrite of an existing entry.
    Set,
    /// An insertion of a new entry.
    Add,
    /// A removal of an existing entry.
    Delete,
    /// A wholesale emptying of the container.
    Clear,
}

impl OperationKind {
    /// Whether this operation changes the set of keys a container holds.
    pub fn changes_shape(&self) -> bool {
        matches!(
            self,
            OperationKind::Add | OperationKind::Delete | OperationKind::Clear
        )
    }
}

impl std::fmt::Display for OperationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            OperationKind::Get => "get",
            OperationKind::Has => "has",
            OperationKind::Iterate => "iterate",
            OperationKind::Set => "set",
            OperationKind::Add => "add",
            OperationKind::Delete => "delete",
            OperationKind::Clear => "clear",
        };
        f.write_str(name)
    }
}
