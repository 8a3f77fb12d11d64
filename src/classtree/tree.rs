use super::arena::Arena;
use super::node::ARITY;
use super::node::Attributes;
use super::node::Entry;
use super::node::Node;

/// Attribute levels handled inside a shard subtree: everything below the
/// first attribute.
pub const SUB: usize = ARITY - 1;

/// The store keyed on the second through last attributes. Each subtree owns
/// its node arena outright, which is what lets ingest workers fill disjoint
/// shards of one store without any coordination.
#[derive(Debug)]
pub struct Subtree {
    nodes: Arena<Node>,
    size: usize,
}

impl Subtree {
    pub(crate) const ROOT: u32 = 0;

    pub fn new() -> Self {
        let mut nodes = Arena::new();
        nodes.alloc(Node::Branch(Vec::new()));
        Self { nodes, size: 0 }
    }

    /// Adopt a restored skeleton. Sizes are not maintained on this path;
    /// the owner recounts once bulk ingest is done.
    pub(crate) fn from_skeleton(nodes: Arena<Node>) -> Self {
        Self { nodes, size: 0 }
    }

    pub(crate) fn node(&self, at: u32) -> &Node {
        &self.nodes[at]
    }

    pub(crate) fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Nodes that did not fit the preallocated region, if any.
    pub fn spilled_nodes(&self) -> usize {
        self.nodes.spilled()
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Insert an entry under the remaining attributes, creating nodes as
    /// needed. An entry equal to one already in place coalesces into it.
    /// Returns whether the entry was new.
    pub fn add(&mut self, entry: Entry, attrs: &[u8]) -> bool {
        debug_assert_eq!(attrs.len(), SUB);
        let mut at = Self::ROOT;
        for (depth, &key) in attrs.iter().enumerate() {
            at = self.child(at, key, depth + 1 == attrs.len());
        }
        let Node::Leaf(entries) = &mut self.nodes[at] else {
            unreachable!("paths terminate at leaves")
        };
        match entries.binary_search_by(|e| e.position.cmp(&entry.position)) {
            Ok(i) => {
                entries[i].meta.combine(entry.meta);
                false
            }
            Err(i) => {
                entries.insert(i, entry);
                self.size += 1;
                true
            }
        }
    }

    /// Find or create the child of `at` keyed by `key`.
    fn child(&mut self, at: u32, key: u8, leaf: bool) -> u32 {
        let found = match &self.nodes[at] {
            Node::Branch(down) => down
                .binary_search_by_key(&key, |&(k, _)| k)
                .map(|i| down[i].1),
            Node::Leaf(_) => unreachable!("branches span every inner level"),
        };
        match found {
            Ok(child) => child,
            Err(i) => {
                let child = self.nodes.alloc(match leaf {
                    true => Node::Leaf(Vec::new()),
                    false => Node::Branch(Vec::new()),
                });
                let Node::Branch(down) = &mut self.nodes[at] else {
                    unreachable!("branches span every inner level")
                };
                down.insert(i, (key, child));
                child
            }
        }
    }

    /// Recount entries by full traversal and cache the result.
    pub fn update_size(&mut self) -> usize {
        fn count(nodes: &Arena<Node>, at: u32) -> usize {
            match &nodes[at] {
                Node::Leaf(entries) => entries.len(),
                Node::Branch(down) => down.iter().map(|&(_, c)| count(nodes, c)).sum(),
            }
        }
        self.size = count(&self.nodes, Self::ROOT);
        self.size
    }

    pub fn clear(&mut self) {
        self.nodes.reset();
        self.nodes.alloc(Node::Branch(Vec::new()));
        self.size = 0;
    }

    /// Move every entry of `other` into this subtree, coalescing where the
    /// positions collide. Returns the number of entries that were new here.
    fn absorb(&mut self, mut other: Subtree) -> usize {
        let mut added = 0;
        let mut path = [0u8; SUB];
        self.absorb_node(&mut other.nodes, Self::ROOT, 0, &mut path, &mut added);
        added
    }

    fn absorb_node(
        &mut self,
        other: &mut Arena<Node>,
        at: u32,
        depth: usize,
        path: &mut [u8; SUB],
        added: &mut usize,
    ) {
        let node = std::mem::replace(&mut other[at], Node::Branch(Vec::new()));
        match node {
            Node::Leaf(entries) => {
                for entry in entries {
                    if self.add(entry, &path[..]) {
                        *added += 1;
                    }
                }
            }
            Node::Branch(down) => {
                for (key, child) in down {
                    path[depth] = key;
                    self.absorb_node(other, child, depth + 1, path, added);
                }
            }
        }
    }
}

impl Default for Subtree {
    fn default() -> Self {
        Self::new()
    }
}

/// The classtree: a fixed-arity ordered index over position attributes.
///
/// The first attribute (white pawn count) keys an ordered list of subtrees;
/// the remaining ten levels live inside each subtree. Leaves hold positions
/// in natural order and coalesce duplicates, so iterating the whole store
/// yields entries in attribute-tuple order, then position order, with no
/// repeats.
#[derive(Debug, Default)]
pub struct Tree {
    down: Vec<(u8, Subtree)>,
    size: usize,
}

impl Tree {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn from_shards(down: Vec<(u8, Subtree)>) -> Self {
        Self { down, size: 0 }
    }

    pub(crate) fn shard_list(&self) -> &[(u8, Subtree)] {
        &self.down
    }

    /// Entries across the whole store. Maintained online by `add` and
    /// `merge`; bulk paths that bypass them must call [`Tree::update_size`].
    pub fn size(&self) -> usize {
        self.size
    }

    pub fn update_size(&mut self) -> usize {
        self.size = self.down.iter_mut().map(|(_, sub)| sub.update_size()).sum();
        self.size
    }

    pub fn clear(&mut self) {
        self.down.clear();
        self.size = 0;
    }

    /// Insert one entry under its attribute tuple. Coalesces with an equal
    /// position already in place. Returns whether the entry was new.
    pub fn add(&mut self, entry: Entry, attrs: Attributes) -> bool {
        let key = attrs.0[0];
        let at = match self.down.binary_search_by_key(&key, |&(k, _)| k) {
            Ok(i) => i,
            Err(i) => {
                self.down.insert(i, (key, Subtree::new()));
                i
            }
        };
        let fresh = self.down[at].1.add(entry, &attrs.0[1..]);
        if fresh {
            self.size += 1;
        }
        fresh
    }

    /// Destructively merge another store of the same shape into this one.
    /// Shards disjoint on the first attribute move over wholesale; colliding
    /// shards coalesce entry by entry.
    pub fn merge(&mut self, other: Tree) {
        for (key, sub) in other.down {
            match self.down.binary_search_by_key(&key, |&(k, _)| k) {
                Err(i) => {
                    self.size += sub.size();
                    self.down.insert(i, (key, sub));
                }
                Ok(i) => {
                    self.size += self.down[i].1.absorb(sub);
                }
            }
        }
    }

    /// The top-level ordered mapping: one `(first attribute, subtree)` pair
    /// per populated white-pawn count.
    pub fn shards(&self) -> impl Iterator<Item = (u8, &Subtree)> {
        self.down.iter().map(|(k, sub)| (*k, sub))
    }

    pub fn shards_mut(&mut self) -> impl Iterator<Item = (u8, &mut Subtree)> {
        self.down.iter_mut().map(|(k, sub)| (*k, sub))
    }
}
