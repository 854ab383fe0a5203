use std::collections::BTreeMap;

use leaftree::{KvStore, LeafStore, Node as TreeNode};

type Node<'a> = &'a NodeDescriptor;
type Edge<'a> = (usize, usize);
struct TreeGraph {
    nodes: BTreeMap<usize, NodeDescriptor>,
    edges: Vec<(usize, usize)>,
}

enum NodeDescriptor {
    Branch {
        id: usize,
        digest: String,
        carried: bool,
    },
    Leaf {
        id: usize,
        index: usize,
        digest: String,
        carried: bool,
    },
}

impl NodeDescriptor {
    fn id(&self) -> usize {
        match self {
            NodeDescriptor::Branch { id, .. } => *id,
            NodeDescriptor::Leaf { id, .. } => *id,
        }
    }

    fn carried(&self) -> bool {
        match self {
            NodeDescriptor::Branch { carried, .. } => *carried,
            NodeDescriptor::Leaf { carried, .. } => *carried,
        }
    }
}

impl<'a> dot::Labeller<'a, Node<'a>, Edge<'a>> for TreeGraph {
    fn graph_id(&'a self) -> dot::Id<'a> {
        dot::Id::new("thetree").unwrap()
    }

    fn node_id(&'a self, n: &&'a NodeDescriptor) -> dot::Id<'a> {
        dot::Id::new(format!("N{}", n.id())).unwrap()
    }

    fn node_label(&'a self, n: &&'a NodeDescriptor) -> dot::LabelText<'a> {
        let text = match n {
            NodeDescriptor::Branch { digest, .. } => digest.clone(),
            NodeDescriptor::Leaf { index, digest, .. } => format!("{}: {}", index, digest),
        };
        dot::LabelText::label(text)
    }

    fn node_shape(&'a self, n: &Node<'a>) -> Option<dot::LabelText<'a>> {
        let shape = match n {
            NodeDescriptor::Branch { .. } => "box",
            NodeDescriptor::Leaf { .. } => "circle",
        };
        Some(dot::LabelText::label(shape))
    }

    fn node_color(&'a self, n: &Node<'a>) -> Option<dot::LabelText<'a>> {
        if n.carried() {
            Some(dot::LabelText::label("grey"))
        } else {
            None
        }
    }

    fn node_style(&'a self, n: &Node<'a>) -> dot::Style {
        if n.carried() {
            dot::Style::Filled
        } else {
            dot::Style::None
        }
    }
}

impl<'a> dot::GraphWalk<'a, Node<'a>, Edge<'a>> for TreeGraph {
    fn nodes(&'a self) -> dot::Nodes<'a, Node<'a>> {
        self.nodes.values().collect()
    }

    fn edges(&'a self) -> dot::Edges<'a, Edge<'a>> {
        self.edges.iter().cloned().collect()
    }

    fn source(&'a self, edge: &Edge<'a>) -> Node<'a> {
        &self.nodes[&edge.0]
    }

    fn target(&'a self, edge: &Edge<'a>) -> Node<'a> {
        &self.nodes[&edge.1]
    }
}

impl TreeGraph {
    fn new(root: &TreeNode) -> Self {
        let mut graph = Self {
            nodes: BTreeMap::new(),
            edges: Vec::new(),
        };
        let mut leaf_index = 0;
        // (node, parent id and parent depth)
        let mut stack: Vec<(&TreeNode, Option<(usize, usize)>)> = vec![(root, None)];
        while let Some((node, parent)) = stack.pop() {
            let id = graph.nodes.len();
            let depth = node.depth();
            // a node was carried up if its parent is more than one level above it
            let carried = parent.map_or(false, |(_, parent_depth)| depth + 1 < parent_depth);
            if let Some((parent, _)) = parent {
                graph.edges.push((parent, id));
            }
            let digest = short_hex(node);
            let descriptor = match (node.left(), node.right()) {
                (Some(left), Some(right)) => {
                    stack.push((right, Some((id, depth))));
                    stack.push((left, Some((id, depth))));
                    NodeDescriptor::Branch {
                        id,
                        digest,
                        carried,
                    }
                }
                _ => {
                    leaf_index += 1;
                    NodeDescriptor::Leaf {
                        id,
                        index: leaf_index - 1,
                        digest,
                        carried,
                    }
                }
            };
            graph.nodes.insert(id, descriptor);
        }
        graph
    }
}

fn short_hex(node: &TreeNode) -> String {
    let mut text = node.digest().to_string();
    text.truncate(8);
    text
}

/// Writes the tree as a dot graph. Branches are boxes, leaves are circles, carried nodes are grey.
pub fn graph(root: &TreeNode, mut out: impl std::io::Write) -> anyhow::Result<()> {
    let graph = TreeGraph::new(root);
    dot::render(&graph, &mut out)?;
    Ok(())
}

/// Writes leaves `0..count` as hex, one per line. Missing leaves are written as `-`.
pub fn dump_leaves<S: KvStore>(
    leaves: &LeafStore<S>,
    count: u64,
    mut writer: impl std::io::Write,
) -> anyhow::Result<()> {
    for index in 0..count {
        match leaves.fetch_leaf_at(index) {
            Ok(leaf) => writeln!(writer, "{} {}", leaftree::leaf_key(index), hex::encode(leaf))?,
            Err(cause) if cause.is_not_found() => {
                writeln!(writer, "{} -", leaftree::leaf_key(index))?
            }
            Err(cause) => return Err(cause.into()),
        }
    }
    Ok(())
}
