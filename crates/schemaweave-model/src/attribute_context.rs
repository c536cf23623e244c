//! Attribute context: the provenance tree built alongside attribute
//! resolution.
//!
//! Nodes are created while attributes are constructed. Once an entity is
//! fully resolved, [`AttributeContextTree::finalize`] rewrites the leaves
//! from the final attribute set, prunes empty subtrees and orders children
//! by the lowest attribute order beneath them.

use std::fmt::Write as _;

use serde::{Deserialize, Serialize};

use crate::arena::ObjectId;
use crate::attributes::{AttributeTarget, ResolvedAttributeSet};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AttributeContextType {
    Entity,
    EntityReferenceExtends,
    AttributeGroup,
    EntityReferenceAsAttribute,
    AttributeDefinition,
    AddedAttributeSupporting,
    AddedAttributeIdentity,
    GeneratedRound,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContextNodeId(u32);

impl ContextNodeId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContextLeaf {
    /// Final resolved name; nested attributes are `group/name`.
    pub name: String,
    pub order: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContextChild {
    Node(ContextNodeId),
    Attribute(ContextLeaf),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ContextNode {
    pub context_type: AttributeContextType,
    pub name: String,
    pub parent: Option<ContextNodeId>,
    /// What produced this node.
    pub definition: Option<ObjectId>,
    pub children: Vec<ContextChild>,
    /// Traits applied at the point of reference, kept apart from the
    /// definition's own.
    pub exhibits_traits: Vec<ObjectId>,
    lowest_order: Option<u32>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct AttributeContextTree {
    nodes: Vec<ContextNode>,
}

impl AttributeContextTree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn create(
        &mut self,
        context_type: AttributeContextType,
        name: impl Into<String>,
        parent: Option<ContextNodeId>,
        definition: Option<ObjectId>,
        exhibits_traits: Vec<ObjectId>,
    ) -> ContextNodeId {
        let id = ContextNodeId(self.nodes.len() as u32);
        self.nodes.push(ContextNode {
            context_type,
            name: name.into(),
            parent,
            definition,
            children: Vec::new(),
            exhibits_traits,
            lowest_order: None,
        });
        if let Some(parent) = parent.and_then(|p| self.nodes.get_mut(p.index())) {
            parent.children.push(ContextChild::Node(id));
        }
        id
    }

    pub fn node(&self, id: ContextNodeId) -> Option<&ContextNode> {
        self.nodes.get(id.index())
    }

    pub fn child_nodes(&self, id: ContextNodeId) -> impl Iterator<Item = &ContextNode> {
        self.node(id)
            .into_iter()
            .flat_map(|n| n.children.iter())
            .filter_map(|c| match c {
                ContextChild::Node(n) => self.node(*n),
                ContextChild::Attribute(_) => None,
            })
    }

    /// Rewrite leaves from `ras`, prune and order the subtree under `root`.
    pub fn finalize(&mut self, root: ContextNodeId, ras: &ResolvedAttributeSet) {
        for node in &mut self.nodes {
            node.children
                .retain(|c| matches!(c, ContextChild::Node(_)));
            node.lowest_order = None;
        }
        let mut order = 0;
        self.attach_leaves(ras, "", &mut order);
        self.prune(root, true);
        self.order(root);
    }

    fn attach_leaves(&mut self, ras: &ResolvedAttributeSet, prefix: &str, order: &mut u32) {
        for ra in ras.iter() {
            let name = format!("{prefix}{}", ra.resolved_name);
            match &ra.target {
                AttributeTarget::Attribute(_) => {
                    if let Some(node) = ra.context.and_then(|c| self.nodes.get_mut(c.index())) {
                        node.children.push(ContextChild::Attribute(ContextLeaf {
                            name,
                            order: *order,
                        }));
                    }
                    *order += 1;
                }
                AttributeTarget::Set(nested) => {
                    let nested = std::rc::Rc::clone(nested);
                    self.attach_leaves(&nested, &format!("{name}/"), order);
                }
            }
        }
    }

    /// Returns whether `id` survives: it keeps leaves, surviving children
    /// or exhibited traits.
    fn prune(&mut self, id: ContextNodeId, is_root: bool) -> bool {
        let children: Vec<ContextChild> = match self.nodes.get(id.index()) {
            Some(node) => node.children.clone(),
            None => return false,
        };
        let mut kept = Vec::with_capacity(children.len());
        for child in children {
            match child {
                ContextChild::Node(n) => {
                    if self.prune(n, false) {
                        kept.push(ContextChild::Node(n));
                    }
                }
                leaf @ ContextChild::Attribute(_) => kept.push(leaf),
            }
        }
        let node = &mut self.nodes[id.index()];
        node.children = kept;
        is_root || !node.children.is_empty() || !node.exhibits_traits.is_empty()
    }

    /// Propagate the minimum leaf order up and sort children by it.
    fn order(&mut self, id: ContextNodeId) -> Option<u32> {
        let children = self.nodes.get(id.index())?.children.clone();
        let mut keyed: Vec<(Option<u32>, ContextChild)> = Vec::with_capacity(children.len());
        for child in children {
            let key = match &child {
                ContextChild::Attribute(leaf) => Some(leaf.order),
                ContextChild::Node(n) => self.order(*n),
            };
            keyed.push((key, child));
        }
        keyed.sort_by_key(|(key, _)| key.unwrap_or(u32::MAX));
        let lowest = keyed.iter().filter_map(|(k, _)| *k).min();
        let node = &mut self.nodes[id.index()];
        node.children = keyed.into_iter().map(|(_, c)| c).collect();
        node.lowest_order = lowest;
        lowest
    }

    /// Leaf names in emission order.
    pub fn leaves_in_order(&self, root: ContextNodeId) -> Vec<String> {
        let mut out = Vec::new();
        self.collect_leaves(root, &mut out);
        out
    }

    fn collect_leaves(&self, id: ContextNodeId, out: &mut Vec<String>) {
        let Some(node) = self.node(id) else {
            return;
        };
        for child in &node.children {
            match child {
                ContextChild::Attribute(leaf) => out.push(leaf.name.clone()),
                ContextChild::Node(n) => self.collect_leaves(*n, out),
            }
        }
    }

    /// Indented outline of the subtree under `root`.
    pub fn render(&self, root: ContextNodeId) -> String {
        let mut out = String::new();
        self.render_node(root, 0, &mut out);
        out
    }

    fn render_node(&self, id: ContextNodeId, depth: usize, out: &mut String) {
        let Some(node) = self.node(id) else {
            return;
        };
        let indent = "  ".repeat(depth);
        let _ = writeln!(out, "{indent}{} ({:?})", node.name, node.context_type);
        for child in &node.children {
            match child {
                ContextChild::Attribute(leaf) => {
                    let _ = writeln!(out, "{indent}  - {}", leaf.name);
                }
                ContextChild::Node(n) => self.render_node(*n, depth + 1, out),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arena::Arena;
    use crate::attributes::ResolvedAttribute;
    use crate::parameter::no_tables;

    #[test]
    fn finalize_prunes_empty_nodes_and_orders_by_lowest_leaf() {
        let mut arena = Arena::new();
        let (a, b) = (arena.insert(()), arena.insert(()));

        let mut tree = AttributeContextTree::new();
        let root = tree.create(AttributeContextType::Entity, "E", None, None, vec![]);
        let late = tree.create(AttributeContextType::AttributeDefinition, "late", Some(root), Some(b), vec![]);
        let early = tree.create(AttributeContextType::AttributeDefinition, "early", Some(root), Some(a), vec![]);
        let _empty = tree.create(AttributeContextType::AttributeGroup, "empty", Some(root), None, vec![]);

        let mut ras = ResolvedAttributeSet::new();
        let mut first = ResolvedAttribute::new("first", AttributeTarget::Attribute(a));
        first.context = Some(early);
        let mut second = ResolvedAttribute::new("second", AttributeTarget::Attribute(b));
        second.context = Some(late);
        ras.merge(first, &mut no_tables);
        ras.merge(second, &mut no_tables);

        tree.finalize(root, &ras);

        let names: Vec<&str> = tree.child_nodes(root).map(|n| n.name.as_str()).collect();
        assert_eq!(names, vec!["early", "late"]);
        assert_eq!(tree.leaves_in_order(root), vec!["first", "second"]);
    }
}
