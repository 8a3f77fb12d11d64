use super::arena::Arena;
use super::node::Node;
use super::tree::SUB;
use super::tree::Subtree;
use super::tree::Tree;
use std::io::BufRead;
use std::io::Write;

/// Profile files are whitespace-separated integers: the total number of
/// bytes all index nodes occupy, then the skeleton. The skeleton is a shard
/// count followed by, per shard, its first-attribute key, its node count,
/// and a pre-order dump of each branch (child count, then each child key
/// followed by its subtree).
/// Entries are never recorded; the point of the snapshot is to pre-size the
/// node arenas so a restore-then-reload never allocates node storage.
#[derive(Debug, thiserror::Error)]
pub enum ProfileError {
    #[error("profile file: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed profile near token {at}")]
    Malformed { at: usize },
}

/// Write the shape snapshot of a store.
pub fn output_profile<W: Write>(tree: &Tree, mut sink: W) -> Result<(), ProfileError> {
    let nodes: usize = tree.shards().map(|(_, sub)| sub.node_count()).sum();
    writeln!(sink, "{}", nodes * size_of::<Node>())?;
    writeln!(sink, "{}", tree.shards().count())?;
    for (key, sub) in tree.shards() {
        write!(sink, "{} {}", key, sub.node_count())?;
        output_node(sub, Subtree::ROOT, 0, &mut sink)?;
        writeln!(sink)?;
    }
    Ok(())
}

fn output_node<W: Write>(
    sub: &Subtree,
    at: u32,
    depth: usize,
    sink: &mut W,
) -> Result<(), ProfileError> {
    if depth == SUB {
        return Ok(());
    }
    let Node::Branch(down) = sub.node(at) else {
        unreachable!("branches span every inner level")
    };
    write!(sink, " {}", down.len())?;
    for &(key, child) in down {
        write!(sink, " {}", key)?;
        output_node(sub, child, depth + 1, sink)?;
    }
    Ok(())
}

/// Rebuild the node skeleton described by a profile. Every shard's arena is
/// preallocated to exactly the recorded node count, so loading the same
/// data back fills the skeleton without growing it. The restored store has
/// a suppressed size; call [`Tree::update_size`] after bulk ingest.
pub fn initialize<R: BufRead>(mut source: R) -> Result<Tree, ProfileError> {
    let mut text = String::new();
    source.read_to_string(&mut text)?;
    let mut tokens = Tokens {
        inner: text.split_ascii_whitespace(),
        at: 0,
    };

    let bytes: usize = tokens.next()?;
    log::info!("restoring index skeleton ({} node bytes)", bytes);
    let shards: usize = tokens.next()?;
    let mut down = Vec::with_capacity(shards);
    for _ in 0..shards {
        let key: u8 = tokens.next()?;
        let count: usize = tokens.next()?;
        let mut nodes = Arena::preallocate(count);
        read_node(&mut tokens, &mut nodes, 0)?;
        if nodes.len() != count {
            return Err(ProfileError::Malformed { at: tokens.at });
        }
        down.push((key, Subtree::from_skeleton(nodes)));
    }
    down.sort_by_key(|&(k, _)| k);
    Ok(Tree::from_shards(down))
}

fn read_node(
    tokens: &mut Tokens,
    nodes: &mut Arena<Node>,
    depth: usize,
) -> Result<u32, ProfileError> {
    if depth == SUB {
        return Ok(nodes.alloc(Node::Leaf(Vec::new())));
    }
    let at = nodes.alloc(Node::Branch(Vec::new()));
    let len: usize = tokens.next()?;
    let mut down = Vec::with_capacity(len);
    for _ in 0..len {
        let key: u8 = tokens.next()?;
        let child = read_node(tokens, nodes, depth + 1)?;
        down.push((key, child));
    }
    nodes[at] = Node::Branch(down);
    Ok(at)
}

struct Tokens<'a> {
    inner: std::str::SplitAsciiWhitespace<'a>,
    at: usize,
}

impl Tokens<'_> {
    fn next<N: std::str::FromStr>(&mut self) -> Result<N, ProfileError> {
        self.at += 1;
        self.inner
            .next()
            .and_then(|t| t.parse().ok())
            .ok_or(ProfileError::Malformed { at: self.at })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chess::fen;
    use crate::classtree::Attributes;
    use crate::classtree::Entry;
    use crate::classtree::Lambda;
    use crate::classtree::Metadata;

    const BOARDS: [&str; 4] = [
        "4k3/8/8/8/8/8/8/4K3 w - - 0 1",
        "4k3/8/8/8/8/8/3Q4/4K3 w - - 0 1",
        "4k3/1ppp4/8/8/8/8/4P3/4K3 w - - 0 1",
        "1n2k1n1/8/8/8/8/8/1N1N4/4K3 w - - 0 1",
    ];

    fn build() -> Tree {
        let mut tree = Tree::new();
        for f in BOARDS {
            let (position, info) = fen::parse(f).expect("test fen");
            let attrs = Attributes::from((&position, &info));
            tree.add(
                Entry {
                    position,
                    meta: Metadata { occurrences: 1 },
                },
                attrs,
            );
        }
        tree
    }

    fn contents(tree: &Tree) -> Vec<String> {
        let mut out = Vec::new();
        let mut it = tree.range(Lambda(|_, _| true));
        while let Some(e) = it.next() {
            out.push(fen::render(&e.position));
        }
        out
    }

    #[test]
    fn round_trips_the_skeleton() {
        let original = build();
        let mut profile = Vec::new();
        output_profile(&original, &mut profile).expect("write profile");

        let mut restored = initialize(profile.as_slice()).expect("read profile");
        assert_eq!(restored.size(), 0); // skeleton only, size suppressed

        // the restored skeleton absorbs the same data without spilling
        for f in BOARDS {
            let (position, info) = fen::parse(f).expect("test fen");
            let attrs = Attributes::from((&position, &info));
            restored.add(
                Entry {
                    position,
                    meta: Metadata { occurrences: 1 },
                },
                attrs,
            );
        }
        restored.update_size();
        assert_eq!(restored.size(), original.size());
        assert_eq!(contents(&restored), contents(&original));
        for (_, sub) in restored.shards() {
            assert_eq!(sub.spilled_nodes(), 0);
        }
    }

    #[test]
    fn profile_of_a_profile_is_stable() {
        let original = build();
        let mut first = Vec::new();
        output_profile(&original, &mut first).expect("write profile");
        let restored = initialize(first.as_slice()).expect("read profile");
        let mut second = Vec::new();
        output_profile(&restored, &mut second).expect("write profile");
        assert_eq!(first, second);
    }

    #[test]
    fn header_counts_node_bytes() {
        let original = build();
        let mut profile = Vec::new();
        output_profile(&original, &mut profile).expect("write profile");
        let text = String::from_utf8(profile).expect("utf8");
        let bytes: usize = text.split_ascii_whitespace().next().expect("header").parse().expect("number");
        let nodes: usize = original.shards().map(|(_, s)| s.node_count()).sum();
        assert_eq!(bytes, nodes * size_of::<Node>());
    }

    #[test]
    fn rejects_garbage() {
        assert!(initialize("not a profile".as_bytes()).is_err());
        assert!(initialize("128 1 0".as_bytes()).is_err());
    }
}
