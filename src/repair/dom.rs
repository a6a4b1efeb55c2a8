//! The tree html5ever builds a repaired fragment into.
//!
//! Nodes live in one vector and refer to each other by index. Each node
//! owns the ordered list of its children, which is all the serializer walks.

use html5ever::{Attribute, QualName};

/// Index of a node in its [`Dom`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(usize);

#[derive(Debug, Clone)]
pub enum NodeData {
    Document,
    Element { name: QualName, attrs: Vec<Attribute> },
    Text(String),
    Comment(String),
}

#[derive(Debug)]
struct Node {
    data: NodeData,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

/// A parsed fragment. The document node is always present.
#[derive(Debug)]
pub struct Dom {
    nodes: Vec<Node>,
}

impl Default for Dom {
    fn default() -> Self {
        Self::new()
    }
}

impl Dom {
    pub fn new() -> Self {
        Self {
            nodes: vec![Node {
                data: NodeData::Document,
                parent: None,
                children: Vec::new(),
            }],
        }
    }

    pub fn document(&self) -> NodeId {
        NodeId(0)
    }

    pub fn data(&self, id: NodeId) -> &NodeData {
        &self.nodes[id.0].data
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes[id.0].parent
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self.nodes[id.0].children
    }

    /// Qualified name of an element node.
    pub fn name(&self, id: NodeId) -> Option<&QualName> {
        match self.data(id) {
            NodeData::Element { name, .. } => Some(name),
            _ => None,
        }
    }

    /// First element named `local`, in document order.
    pub fn find(&self, local: &str) -> Option<NodeId> {
        let mut stack = vec![self.document()];
        while let Some(id) = stack.pop() {
            if self.name(id).is_some_and(|name| &*name.local == local) {
                return Some(id);
            }
            stack.extend(self.children(id).iter().rev());
        }
        None
    }

    /// Add an unattached node.
    pub fn create(&mut self, data: NodeData) -> NodeId {
        self.nodes.push(Node {
            data,
            parent: None,
            children: Vec::new(),
        });
        NodeId(self.nodes.len() - 1)
    }

    /// Move `child` to the end of `parent`'s children.
    pub fn append(&mut self, parent: NodeId, child: NodeId) {
        self.detach(child);
        self.nodes[child.0].parent = Some(parent);
        self.nodes[parent.0].children.push(child);
    }

    /// Append text, extending the last child when it is already text.
    pub fn append_text(&mut self, parent: NodeId, text: &str) {
        if let Some(&last) = self.children(parent).last()
            && let NodeData::Text(existing) = &mut self.nodes[last.0].data
        {
            existing.push_str(text);
            return;
        }
        let node = self.create(NodeData::Text(text.to_string()));
        self.append(parent, node);
    }

    /// Move `node` in front of `sibling`. Does nothing for a detached sibling.
    pub fn insert_before(&mut self, sibling: NodeId, node: NodeId) {
        self.detach(node);
        let Some(parent) = self.parent(sibling) else {
            return;
        };
        let children = &mut self.nodes[parent.0].children;
        let index = children.iter().position(|&c| c == sibling).unwrap_or(children.len());
        children.insert(index, node);
        self.nodes[node.0].parent = Some(parent);
    }

    /// Insert text in front of `sibling`, merging into preceding text.
    pub fn insert_text_before(&mut self, sibling: NodeId, text: &str) {
        let previous = self.parent(sibling).and_then(|parent| {
            let children = self.children(parent);
            let index = children.iter().position(|&c| c == sibling)?;
            index.checked_sub(1).map(|i| children[i])
        });
        if let Some(previous) = previous
            && let NodeData::Text(existing) = &mut self.nodes[previous.0].data
        {
            existing.push_str(text);
            return;
        }
        let node = self.create(NodeData::Text(text.to_string()));
        self.insert_before(sibling, node);
    }

    pub fn detach(&mut self, id: NodeId) {
        if let Some(parent) = self.nodes[id.0].parent.take() {
            self.nodes[parent.0].children.retain(|&c| c != id);
        }
    }

    /// Move every child of `from` to the end of `to`.
    pub fn reparent_children(&mut self, from: NodeId, to: NodeId) {
        let children = std::mem::take(&mut self.nodes[from.0].children);
        for &child in &children {
            self.nodes[child.0].parent = Some(to);
        }
        self.nodes[to.0].children.extend(children);
    }

    /// Add the attributes an element does not carry yet.
    pub fn add_missing_attrs(&mut self, id: NodeId, attrs: Vec<Attribute>) {
        if let NodeData::Element {
            attrs: existing, ..
        } = &mut self.nodes[id.0].data
        {
            for attr in attrs {
                if !existing.iter().any(|a| a.name == attr.name) {
                    existing.push(attr);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use html5ever::{LocalName, ns};

    use super::*;

    fn element(dom: &mut Dom, local: &str) -> NodeId {
        dom.create(NodeData::Element {
            name: QualName::new(None, ns!(html), LocalName::from(local)),
            attrs: Vec::new(),
        })
    }

    fn text(dom: &Dom, id: NodeId) -> &str {
        match dom.data(id) {
            NodeData::Text(text) => text,
            other => panic!("not text: {other:?}"),
        }
    }

    #[test]
    fn test_append_moves_nodes() {
        let mut dom = Dom::new();
        let div = element(&mut dom, "div");
        let p = element(&mut dom, "p");
        let q = element(&mut dom, "q");
        dom.append(dom.document(), div);
        dom.append(div, p);
        dom.append(div, q);
        assert_eq!(dom.children(div), &[p, q]);
        assert_eq!(dom.find("q"), Some(q));

        dom.append(q, p);
        assert_eq!(dom.children(div), &[q]);
        assert_eq!(dom.parent(p), Some(q));
    }

    #[test]
    fn test_insert_before_and_reparent() {
        let mut dom = Dom::new();
        let div = element(&mut dom, "div");
        let a = element(&mut dom, "a");
        let b = element(&mut dom, "b");
        dom.append(div, b);
        dom.insert_before(b, a);
        assert_eq!(dom.children(div), &[a, b]);

        let span = element(&mut dom, "span");
        dom.reparent_children(div, span);
        assert!(dom.children(div).is_empty());
        assert_eq!(dom.children(span), &[a, b]);
        assert_eq!(dom.parent(b), Some(span));
    }

    #[test]
    fn test_adjacent_text_is_merged() {
        let mut dom = Dom::new();
        let p = element(&mut dom, "p");
        let br = element(&mut dom, "br");
        dom.append_text(p, "one ");
        dom.append_text(p, "two");
        dom.append(p, br);
        dom.insert_text_before(br, " three");

        assert_eq!(dom.children(p).len(), 2);
        assert_eq!(text(&dom, dom.children(p)[0]), "one two three");
    }
}
