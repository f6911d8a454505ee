//! In-memory tree data-structure that mirrors the on-disk directory layout.
//!
//! Every [`Node`] owns its children directly.  There is no parent link: the
//! walker passes the parent around only while it builds the tree, and the
//! aggregation pass walks strictly top-down.

use std::fs::Metadata;
use std::path::{Path, PathBuf};

// ───────────────────────────────────────── node metadata ─────

/// The two kinds of entry that become nodes.  Symlinks, devices, sockets and
/// fifos are never represented.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    Dir,
    File,
}

/// Point-in-time snapshot of an entry, captured when it is discovered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntryMeta {
    pub kind: EntryKind,
    /// Length reported by the metadata call.  For directories this is the
    /// size of the directory entry itself, not of its contents.
    pub len: u64,
}

impl EntryMeta {
    /// Classify raw metadata.  Returns `None` for special entries.
    pub fn from_metadata(meta: &Metadata) -> Option<Self> {
        let ft = meta.file_type();
        let kind = if ft.is_dir() {
            EntryKind::Dir
        } else if ft.is_file() {
            EntryKind::File
        } else {
            return None;
        };
        Some(Self {
            kind,
            len: meta.len(),
        })
    }
}

#[cfg(test)]
impl EntryMeta {
    pub fn dir(len: u64) -> Self {
        Self {
            kind: EntryKind::Dir,
            len,
        }
    }

    pub fn file(len: u64) -> Self {
        Self {
            kind: EntryKind::File,
            len,
        }
    }
}

// ───────────────────────────────────────── tree node ─────────

/// A single filesystem entry plus the entries discovered beneath it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Node {
    pub path: PathBuf,
    pub meta: EntryMeta,
    pub children: Vec<Node>,
}

impl Node {
    pub fn new(path: impl Into<PathBuf>, meta: EntryMeta) -> Self {
        Self {
            path: path.into(),
            meta,
            children: Vec::new(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_dir(&self) -> bool {
        self.meta.kind == EntryKind::Dir
    }

    /// Bytes this entry contributes on its own: the file length for files,
    /// zero for directories.
    pub fn own_size(&self) -> u64 {
        match self.meta.kind {
            EntryKind::File => self.meta.len,
            EntryKind::Dir => 0,
        }
    }

    /// Total number of nodes in this subtree.
    pub fn node_count(&self) -> usize {
        1 + self.children.iter().map(Node::node_count).sum::<usize>()
    }
}

#[cfg(test)]
impl Node {
    /// Number of nodes at depth `<= max_depth` below and including this one
    /// (this node is depth 0).  Negative depths count nothing.
    pub fn count_within(&self, max_depth: i64) -> usize {
        if max_depth < 0 {
            return 0;
        }
        1 + self
            .children
            .iter()
            .map(|c| c.count_within(max_depth - 1))
            .sum::<usize>()
    }

    /// Sort children by path at every level.  Sibling order depends on the
    /// filesystem's enumeration order, so comparisons between walks go
    /// through this first.
    pub fn sort_recursive(&mut self) {
        self.children.sort_by(|a, b| a.path.cmp(&b.path));
        for child in &mut self.children {
            child.sort_recursive();
        }
    }
}
