//! Attribute context: the provenance tree of a resolution.
//!
//! Nodes live in one flat table owned by the [`AttributeContext`]; a node
//! refers to its parent by index only, and owns its children through its
//! ordered `contents`. When serialized the table is rendered as a nested tree
//! in which `parent` is the path of the enclosing node.

use super::resolved::ResolvedTrait;
use serde::ser::{SerializeSeq, SerializeStruct};
use serde::{Serialize, Serializer};
use std::collections::HashSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContextId(usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ContextKind {
    Entity,
    ExtendedEntity,
    AttributeGroup,
    EntityAsAttribute,
    AttributeDefinition,
    GeneratedRound,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContextContent {
    Node(ContextId),
    Attribute(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ContextNode {
    pub kind: ContextKind,
    pub name: String,
    pub parent: Option<ContextId>,
    /// Qualified name of the originating definition.
    pub definition: Option<String>,
    pub traits: Vec<ResolvedTrait>,
    pub contents: Vec<ContextContent>,
    pub removed: bool,
    /// Lineage recorded on an entity that was itself resolved earlier.
    pub lineage: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct AttributeContext {
    nodes: Vec<ContextNode>,
}

impl AttributeContext {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(
        &mut self,
        kind: ContextKind,
        name: &str,
        parent: Option<ContextId>,
        definition: Option<String>,
    ) -> ContextId {
        let id = ContextId(self.nodes.len());
        self.nodes.push(ContextNode {
            kind,
            name: name.to_string(),
            parent,
            definition,
            traits: Vec::new(),
            contents: Vec::new(),
            removed: false,
            lineage: None,
        });
        id
    }

    pub fn add_root(&mut self, kind: ContextKind, name: &str, definition: Option<String>) -> ContextId {
        self.push(kind, name, None, definition)
    }

    pub fn add_child(
        &mut self,
        parent: ContextId,
        kind: ContextKind,
        name: &str,
        definition: Option<String>,
    ) -> ContextId {
        let id = self.push(kind, name, Some(parent), definition);
        self.nodes[parent.0].contents.push(ContextContent::Node(id));
        id
    }

    pub fn add_attribute(&mut self, node: ContextId, name: &str) {
        self.nodes[node.0]
            .contents
            .push(ContextContent::Attribute(name.to_string()));
    }

    pub fn set_traits(&mut self, node: ContextId, traits: Vec<ResolvedTrait>) {
        self.nodes[node.0].traits = traits;
    }

    pub fn mark_removed(&mut self, node: ContextId) {
        self.nodes[node.0].removed = true;
    }

    pub fn set_lineage(&mut self, node: ContextId, lineage: &str) {
        self.nodes[node.0].lineage = Some(lineage.to_string());
    }

    pub fn node(&self, id: ContextId) -> &ContextNode {
        &self.nodes[id.0]
    }

    pub fn root(&self) -> Option<ContextId> {
        (!self.nodes.is_empty()).then_some(ContextId(0))
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (ContextId, &ContextNode)> {
        self.nodes.iter().enumerate().map(|(i, n)| (ContextId(i), n))
    }

    pub fn children(&self, id: ContextId) -> impl Iterator<Item = ContextId> + '_ {
        self.nodes[id.0].contents.iter().filter_map(|c| match c {
            ContextContent::Node(child) => Some(*child),
            ContextContent::Attribute(_) => None,
        })
    }

    /// First direct child with the given kind and name.
    pub fn find_child(&self, id: ContextId, kind: ContextKind, name: &str) -> Option<ContextId> {
        self.children(id).find(|c| {
            let node = self.node(*c);
            node.kind == kind && node.name == name
        })
    }

    /// Slash-separated names from the root down to `id`.
    pub fn path(&self, id: ContextId) -> String {
        let mut names = Vec::new();
        let mut current = Some(id);
        while let Some(node) = current {
            names.push(self.nodes[node.0].name.as_str());
            current = self.nodes[node.0].parent;
        }
        names.reverse();
        names.join("/")
    }

    /// Leaf attribute names under `id`, depth-first in emission order.
    /// Subtrees of removed nodes contribute nothing.
    pub fn leaf_attributes(&self, id: ContextId) -> Vec<&str> {
        let mut out = Vec::new();
        self.collect_leaves(id, &mut out);
        out
    }

    fn collect_leaves<'a>(&'a self, id: ContextId, out: &mut Vec<&'a str>) {
        for content in &self.nodes[id.0].contents {
            match content {
                ContextContent::Node(child) if self.nodes[child.0].removed => {}
                ContextContent::Node(child) => self.collect_leaves(*child, out),
                ContextContent::Attribute(name) => out.push(name),
            }
        }
    }

    /// Drop every leaf under `id` named `name`.
    pub fn drop_leaf(&mut self, id: ContextId, name: &str) {
        self.rewrite_leaves(id, &|leaf| (leaf == name).then_some(None));
    }

    /// Keep only the first leaf of each name under `id`.
    pub fn dedupe_leaves(&mut self, id: ContextId) {
        self.dedupe_under(id, &mut HashSet::new());
    }

    fn dedupe_under(&mut self, id: ContextId, seen: &mut HashSet<String>) {
        let contents = std::mem::take(&mut self.nodes[id.0].contents);
        let mut kept = Vec::with_capacity(contents.len());
        for content in contents {
            let keep = match &content {
                ContextContent::Node(child) => {
                    if !self.nodes[child.0].removed {
                        self.dedupe_under(*child, seen);
                    }
                    true
                }
                ContextContent::Attribute(name) => seen.insert(name.clone()),
            };
            if keep {
                kept.push(content);
            }
        }
        self.nodes[id.0].contents = kept;
    }

    /// Bring the leaves named in `order` into that order.
    ///
    /// Leaves already in order stay where they are; otherwise they are moved
    /// up to `id` itself. Nothing happens unless each name has exactly one leaf.
    pub fn order_leaves(&mut self, id: ContextId, order: &[String]) {
        let present: Vec<&str> = self
            .leaf_attributes(id)
            .into_iter()
            .filter(|leaf| order.iter().any(|o| o == leaf))
            .collect();
        let in_order = present.iter().copied().eq(order.iter().map(String::as_str));
        if present.len() != order.len() || in_order {
            return;
        }
        self.rewrite_leaves(id, &|leaf| order.iter().any(|o| o == leaf).then_some(None));
        for name in order {
            self.add_attribute(id, name);
        }
    }

    /// Rewrite every leaf under `id`: `Some(new)` renames it, `None` drops it,
    /// names `rewrite` does not know are left alone.
    pub fn rewrite_leaves(
        &mut self,
        id: ContextId,
        rewrite: &dyn Fn(&str) -> Option<Option<String>>,
    ) {
        self.rewrite_leaves_from(id, 0, rewrite);
    }

    /// Like [`rewrite_leaves`](Self::rewrite_leaves), skipping the first `from` contents of `id`.
    pub fn rewrite_leaves_from(
        &mut self,
        id: ContextId,
        from: usize,
        rewrite: &dyn Fn(&str) -> Option<Option<String>>,
    ) {
        let mut pending = Vec::new();
        let mut index = 0;
        self.nodes[id.0].contents.retain_mut(|content| {
            index += 1;
            index <= from || rewrite_content(content, rewrite, &mut pending)
        });
        while let Some(node) = pending.pop() {
            self.nodes[node.0]
                .contents
                .retain_mut(|content| rewrite_content(content, rewrite, &mut pending));
        }
    }
}

/// Apply `rewrite` to one content entry; returns whether it stays.
fn rewrite_content(
    content: &mut ContextContent,
    rewrite: &dyn Fn(&str) -> Option<Option<String>>,
    pending: &mut Vec<ContextId>,
) -> bool {
    match content {
        ContextContent::Node(child) => {
            pending.push(*child);
            true
        }
        ContextContent::Attribute(name) => match rewrite(name) {
            Some(Some(new)) => {
                *name = new;
                true
            }
            Some(None) => false,
            None => true,
        },
    }
}

struct NodeView<'a> {
    context: &'a AttributeContext,
    id: ContextId,
}

struct ContentsView<'a> {
    context: &'a AttributeContext,
    id: ContextId,
}

impl Serialize for NodeView<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let node = self.context.node(self.id);
        let mut s = serializer.serialize_struct("ContextNode", 8)?;
        s.serialize_field("type", &node.kind)?;
        s.serialize_field("name", &node.name)?;
        if let Some(parent) = node.parent {
            s.serialize_field("parent", &self.context.path(parent))?;
        }
        if let Some(definition) = &node.definition {
            s.serialize_field("definition", definition)?;
        }
        if !node.traits.is_empty() {
            s.serialize_field("appliedTraits", &node.traits)?;
        }
        if node.removed {
            s.serialize_field("removed", &true)?;
        }
        if let Some(lineage) = &node.lineage {
            s.serialize_field("lineage", lineage)?;
        }
        s.serialize_field(
            "contents",
            &ContentsView {
                context: self.context,
                id: self.id,
            },
        )?;
        s.end()
    }
}

impl Serialize for ContentsView<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let contents = &self.context.node(self.id).contents;
        let mut seq = serializer.serialize_seq(Some(contents.len()))?;
        for content in contents {
            match content {
                ContextContent::Node(child) => seq.serialize_element(&NodeView {
                    context: self.context,
                    id: *child,
                })?,
                ContextContent::Attribute(name) => seq.serialize_element(name)?,
            }
        }
        seq.end()
    }
}

impl Serialize for AttributeContext {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self.root() {
            Some(root) => NodeView { context: self, id: root }.serialize(serializer),
            None => serializer.serialize_none(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> (AttributeContext, ContextId, ContextId) {
        let mut ctx = AttributeContext::new();
        let root = ctx.add_root(ContextKind::Entity, "Customer", Some("main/Customer".into()));
        ctx.add_attribute(root, "id");
        let address = ctx.add_child(root, ContextKind::EntityAsAttribute, "address", None);
        let entity = ctx.add_child(address, ContextKind::Entity, "Address", None);
        ctx.add_attribute(entity, "street");
        ctx.add_attribute(entity, "city");
        (ctx, root, address)
    }

    #[test]
    fn parent_is_a_back_reference_by_path() {
        let (ctx, root, address) = sample();
        let entity = ctx.children(address).next().unwrap();
        assert_eq!(ctx.node(entity).parent, Some(address));
        assert_eq!(ctx.path(entity), "Customer/address/Address");
        assert_eq!(ctx.leaf_attributes(root), vec!["id", "street", "city"]);
    }

    #[test]
    fn rewrite_renames_and_drops() {
        let (mut ctx, root, address) = sample();
        ctx.rewrite_leaves(address, &|name| match name {
            "street" => Some(Some("addressStreet".to_string())),
            "city" => Some(None),
            _ => None,
        });
        assert_eq!(ctx.leaf_attributes(root), vec!["id", "addressStreet"]);
    }

    #[test]
    fn serializes_as_nested_tree() {
        let (ctx, _, _) = sample();
        let value = serde_json::to_value(&ctx).unwrap();
        assert_eq!(
            value,
            json!({
                "type": "entity",
                "name": "Customer",
                "definition": "main/Customer",
                "contents": [
                    "id",
                    {
                        "type": "entityAsAttribute",
                        "name": "address",
                        "parent": "Customer",
                        "contents": [{
                            "type": "entity",
                            "name": "Address",
                            "parent": "Customer/address",
                            "contents": ["street", "city"]
                        }]
                    }
                ]
            })
        );
    }

    #[test]
    fn removed_subtrees_have_no_leaves() {
        let (mut ctx, root, address) = sample();
        ctx.mark_removed(address);
        assert_eq!(ctx.leaf_attributes(root), vec!["id"]);
    }

    #[test]
    fn dedupe_keeps_first_leaf_in_walk_order() {
        let (mut ctx, root, address) = sample();
        let other = ctx.add_child(address, ContextKind::Entity, "Site", None);
        ctx.add_attribute(other, "street");
        ctx.add_attribute(other, "zone");
        ctx.dedupe_leaves(address);
        assert_eq!(ctx.leaf_attributes(root), vec!["id", "street", "city", "zone"]);
        assert_eq!(ctx.leaf_attributes(other), vec!["zone"]);
    }

    #[test]
    fn order_leaves_moves_only_when_out_of_order() {
        let (mut ctx, root, address) = sample();
        ctx.order_leaves(address, &["street".to_string(), "city".to_string()]);
        let entity = ctx.children(address).next().unwrap();
        assert_eq!(ctx.leaf_attributes(entity), vec!["street", "city"]);

        ctx.order_leaves(address, &["city".to_string(), "street".to_string()]);
        assert_eq!(ctx.leaf_attributes(root), vec!["id", "city", "street"]);
        assert!(ctx.leaf_attributes(entity).is_empty());
    }
}
