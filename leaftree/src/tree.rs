//! creation and traversal of binary hash trees
use crate::{
    digest::{Digest, HashFunction, Sha256Hasher},
    error::{Error, Result},
};
use std::io::Write;
use tracing::*;

/// A node of a binary hash tree.
///
/// Leaf nodes have no children. Branch nodes own both of their children, and their digest
/// is the hash of the concatenation of the left and the right child digest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Node {
    digest: Digest,
    left: Option<Box<Node>>,
    right: Option<Box<Node>>,
}

impl Node {
    fn leaf(digest: Digest) -> Self {
        Self {
            digest,
            left: None,
            right: None,
        }
    }

    fn branch(hasher: &impl HashFunction, left: Node, right: Node) -> Self {
        Self {
            digest: hasher.hash_pair(&left.digest, &right.digest),
            left: Some(Box::new(left)),
            right: Some(Box::new(right)),
        }
    }

    /// Build a tree from an ordered sequence of leaves, using sha2-256.
    pub fn build<I>(leaves: I) -> Result<Self>
    where
        I: IntoIterator,
        I::Item: AsRef<[u8]>,
    {
        Self::build_with(&Sha256Hasher, leaves)
    }

    /// Build a tree from an ordered sequence of leaves.
    ///
    /// Nodes are combined pairwise from left to right. If a level has an odd number of nodes,
    /// the last node is carried to the next level unchanged.
    pub fn build_with<H, I>(hasher: &H, leaves: I) -> Result<Self>
    where
        H: HashFunction,
        I: IntoIterator,
        I::Item: AsRef<[u8]>,
    {
        let mut nodes: Vec<Node> = leaves
            .into_iter()
            .map(|leaf| Node::leaf(hasher.hash(leaf.as_ref())))
            .collect();
        if nodes.is_empty() {
            return Err(Error::TreeMustNotBeEmpty);
        }
        let leaf_count = nodes.len();
        let mut level = 0;
        while nodes.len() > 1 {
            let mut next = Vec::with_capacity((nodes.len() + 1) / 2);
            let mut iter = nodes.into_iter();
            while let Some(left) = iter.next() {
                match iter.next() {
                    Some(right) => next.push(Node::branch(hasher, left, right)),
                    // carry
                    None => next.push(left),
                }
            }
            nodes = next;
            level += 1;
            trace!("reduced to level {} with {} nodes", level, nodes.len());
        }
        let root = nodes.pop().ok_or(Error::TreeMustNotBeEmpty)?;
        debug!(
            "built hash tree over {} leaves, {} levels, root {}",
            leaf_count, level, root.digest
        );
        Ok(root)
    }

    pub fn digest(&self) -> &Digest {
        &self.digest
    }

    pub fn left(&self) -> Option<&Node> {
        self.left.as_deref()
    }

    pub fn right(&self) -> Option<&Node> {
        self.right.as_deref()
    }

    pub fn is_leaf(&self) -> bool {
        self.left.is_none() && self.right.is_none()
    }

    /// number of leaves below (and including) this node
    pub fn leaf_count(&self) -> usize {
        self.leaves().count()
    }

    /// length of the longest path to a leaf. A single leaf has depth 0.
    pub fn depth(&self) -> usize {
        self.children()
            .map(|child| child.depth() + 1)
            .max()
            .unwrap_or_default()
    }

    /// digests of all leaves, from left to right
    pub fn leaf_digests(&self) -> Vec<Digest> {
        self.leaves().map(|leaf| leaf.digest).collect()
    }

    /// check that every branch digest matches its children, using sha2-256
    pub fn verify(&self) -> Result<()> {
        self.verify_with(&Sha256Hasher)
    }

    /// check that every branch digest matches its children
    pub fn verify_with(&self, hasher: &impl HashFunction) -> Result<()> {
        let mut stack = vec![self];
        while let Some(node) = stack.pop() {
            match (node.left(), node.right()) {
                (None, None) => {}
                (Some(left), Some(right)) => {
                    let expected = hasher.hash_pair(&left.digest, &right.digest);
                    if expected != node.digest {
                        return Err(Error::Invalid(format!(
                            "branch digest {} does not match children, expected {}",
                            node.digest, expected
                        )));
                    }
                    stack.push(right);
                    stack.push(left);
                }
                _ => {
                    return Err(Error::Invalid(format!(
                        "branch {} with a single child",
                        node.digest
                    )))
                }
            }
        }
        Ok(())
    }

    /// Write an indented view of the tree, one node per line
    pub fn dump(&self, writer: &mut impl Write) -> std::io::Result<()> {
        self.dump0(writer, 0)
    }

    fn dump0(&self, writer: &mut impl Write, indent: usize) -> std::io::Result<()> {
        let kind = if self.is_leaf() { "Leaf" } else { "Branch" };
        writeln!(writer, "{}{}({})", " ".repeat(indent), kind, self.digest)?;
        for child in self.children() {
            child.dump0(writer, indent + 2)?;
        }
        Ok(())
    }

    fn children(&self) -> impl Iterator<Item = &Node> {
        self.left().into_iter().chain(self.right())
    }

    fn leaves(&self) -> Leaves<'_> {
        Leaves { stack: vec![self] }
    }
}

/// depth first, left to right iterator over the leaves of a tree
struct Leaves<'a> {
    stack: Vec<&'a Node>,
}

impl<'a> Iterator for Leaves<'a> {
    type Item = &'a Node;

    fn next(&mut self) -> Option<Self::Item> {
        while let Some(node) = self.stack.pop() {
            if node.is_leaf() {
                return Some(node);
            }
            self.stack.extend(node.right());
            self.stack.extend(node.left());
        }
        None
    }
}
