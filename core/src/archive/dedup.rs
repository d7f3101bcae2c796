//! Directory deduplication for one archive run.
//!
//! Every named file implies its ancestor directories. The arena records which
//! of them have already been emitted so each gets exactly one record per run.
//! Nodes link to their next sibling and first child by index; the whole tree
//! is dropped at once by `clear()` when the run ends.

use alloc::string::String;
use alloc::vec::Vec;

struct DirNode {
    name: String,
    next: Option<usize>,
    child: Option<usize>,
}

pub struct DirArena {
    nodes: Vec<DirNode>,
    root: Option<usize>,
}

impl DirArena {
    pub const fn new() -> Self {
        Self {
            nodes: Vec::new(),
            root: None,
        }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn clear(&mut self) {
        self.nodes.clear();
        self.root = None;
    }

    /// Record the ancestor directories of `path`.
    ///
    /// Returns, shallowest first, the byte length of each path prefix naming a
    /// directory not seen before in this run. Empty segments are skipped; the
    /// final segment is the file itself and is never recorded.
    pub fn insert_parents(&mut self, path: &str) -> Vec<usize> {
        let bytes = path.as_bytes();
        let mut created = Vec::new();
        let mut parent: Option<usize> = None;
        let mut pos = 0usize;

        loop {
            while pos < bytes.len() && bytes[pos] == b'/' {
                pos += 1;
            }
            let start = pos;
            while pos < bytes.len() && bytes[pos] != b'/' {
                pos += 1;
            }
            if pos == bytes.len() {
                break;
            }

            let segment = &path[start..pos];
            let idx = match self.find_child(parent, segment) {
                Some(idx) => idx,
                None => {
                    let idx = self.nodes.len();
                    let first = self.first_child(parent);
                    self.nodes.push(DirNode {
                        name: String::from(segment),
                        next: first,
                        child: None,
                    });
                    self.set_first_child(parent, idx);
                    created.push(pos);
                    idx
                }
            };
            parent = Some(idx);
        }

        created
    }

    fn first_child(&self, parent: Option<usize>) -> Option<usize> {
        match parent {
            None => self.root,
            Some(p) => self.nodes[p].child,
        }
    }

    fn set_first_child(&mut self, parent: Option<usize>, child: usize) {
        match parent {
            None => self.root = Some(child),
            Some(p) => self.nodes[p].child = Some(child),
        }
    }

    fn find_child(&self, parent: Option<usize>, segment: &str) -> Option<usize> {
        let mut cur = self.first_child(parent);
        while let Some(idx) = cur {
            if self.nodes[idx].name.as_bytes() == segment.as_bytes() {
                return Some(idx);
            }
            cur = self.nodes[idx].next;
        }
        None
    }
}

impl Default for DirArena {
    fn default() -> Self {
        Self::new()
    }
}
