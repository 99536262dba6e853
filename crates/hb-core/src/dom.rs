//! Document handle
//!
//! Wraps a parsed HTML tree and the query/containment/style primitives the
//! evaluator needs, plus the hide/remove/click bookkeeping. The handle is an
//! explicit parameter threaded through the matcher and arbiter, so tests can
//! evaluate rules against synthetic trees without shared global state.
//!
//! Hiding and removing are idempotent marks: applying one twice leaves the
//! document unchanged and reports `false` the second time. Removed subtrees
//! disappear from subsequent queries; hidden elements stay queryable, like a
//! `display: none` element stays in a live tree.

use std::collections::HashSet;

use ego_tree::NodeId;
use scraper::{ElementRef, Html, Selector};

use crate::error::QueryError;
use crate::path::{PathQuery, PathStep, Predicate};

pub struct Document {
    html: Html,
    hidden: HashSet<NodeId>,
    removed: HashSet<NodeId>,
    clicks: Vec<NodeId>,
}

impl Document {
    pub fn parse(html: &str) -> Self {
        Self {
            html: Html::parse_document(html),
            hidden: HashSet::new(),
            removed: HashSet::new(),
            clicks: Vec::new(),
        }
    }

    // =========================================================================
    // Queries
    // =========================================================================

    /// Compile a CSS selector, mapping syntax failures into the engine's
    /// query-error taxonomy.
    pub fn compile_selector(css: &str) -> Result<Selector, QueryError> {
        Selector::parse(css).map_err(|_| QueryError::InvalidSelector(css.to_string()))
    }

    /// Query the whole document for a CSS selector, in document order.
    pub fn select(&self, css: &str) -> Result<Vec<NodeId>, QueryError> {
        let selector = Self::compile_selector(css)?;
        Ok(self.select_compiled(&selector))
    }

    pub fn select_compiled(&self, selector: &Selector) -> Vec<NodeId> {
        self.html
            .select(selector)
            .map(|el| el.id())
            .filter(|&id| !self.is_detached(id))
            .collect()
    }

    /// Whether a single element matches a CSS selector.
    pub fn element_matches(&self, id: NodeId, selector: &Selector) -> bool {
        if self.is_detached(id) {
            return false;
        }
        self.html.select(selector).any(|el| el.id() == id)
    }

    /// Every element in the document, in document order.
    pub fn all_elements(&self) -> Vec<NodeId> {
        self.html
            .tree
            .root()
            .descendants()
            .filter(|node| node.value().is_element())
            .map(|node| node.id())
            .filter(|&id| !self.is_detached(id))
            .collect()
    }

    /// Concatenated text content of an element's subtree.
    pub fn element_text(&self, id: NodeId) -> String {
        match self.element(id) {
            Some(el) => el.text().collect::<String>(),
            None => String::new(),
        }
    }

    /// Every comment node in the document, in document order.
    pub fn comment_nodes(&self) -> Vec<NodeId> {
        self.html
            .tree
            .root()
            .descendants()
            .filter(|node| node.value().is_comment())
            .map(|node| node.id())
            .filter(|&id| !self.is_detached(id))
            .collect()
    }

    /// Text of a comment node.
    pub fn comment_text(&self, id: NodeId) -> Option<String> {
        let node = self.html.tree.get(id)?;
        let comment = node.value().as_comment()?;
        let text: &str = &comment.comment;
        Some(text.to_string())
    }

    /// DOM containment: an element contains itself and its descendants.
    pub fn contains(&self, outer: NodeId, inner: NodeId) -> bool {
        if outer == inner {
            return true;
        }
        match self.html.tree.get(inner) {
            Some(node) => node.ancestors().any(|a| a.id() == outer),
            None => false,
        }
    }

    /// Attribute value of an element.
    pub fn attr(&self, id: NodeId, name: &str) -> Option<&str> {
        self.element(id).and_then(|el| el.value().attr(name))
    }

    /// Effective inline-style value for one property, normalized. Later
    /// declarations win.
    pub fn style_value(&self, id: NodeId, property: &str) -> Option<String> {
        let style = self.attr(id, "style")?;
        parse_declarations(style)
            .into_iter()
            .rev()
            .find(|(prop, _)| prop == property)
            .map(|(_, value)| value)
    }

    // =========================================================================
    // Path queries
    // =========================================================================

    /// Evaluate a structural path query against the whole document.
    pub fn query_path(&self, query: &PathQuery) -> Vec<NodeId> {
        let mut contexts = vec![self.html.tree.root().id()];

        for step in &query.steps {
            let mut next = Vec::new();
            let mut seen = HashSet::new();

            for &ctx in &contexts {
                let matches = self.step_matches(ctx, step);
                for id in matches {
                    if seen.insert(id) {
                        next.push(id);
                    }
                }
            }

            contexts = next;
            if contexts.is_empty() {
                break;
            }
        }

        contexts
    }

    /// Elements matching one path step under one context node.
    fn step_matches(&self, ctx: NodeId, step: &PathStep) -> Vec<NodeId> {
        let node = match self.html.tree.get(ctx) {
            Some(node) => node,
            None => return Vec::new(),
        };

        let candidates: Vec<NodeId> = if step.descendant {
            node.descendants().skip(1).map(|n| n.id()).collect()
        } else {
            node.children().map(|n| n.id()).collect()
        };

        let filtered: Vec<NodeId> = candidates
            .into_iter()
            .filter(|&id| !self.is_detached(id))
            .filter(|&id| match self.element(id) {
                Some(el) => match &step.tag {
                    Some(tag) => el.value().name() == tag,
                    None => true,
                },
                None => false,
            })
            .filter(|&id| match &step.predicate {
                Some(Predicate::AttrPresent { name }) => self.attr(id, name).is_some(),
                Some(Predicate::AttrEquals { name, value }) => {
                    self.attr(id, name) == Some(value.as_str())
                }
                _ => true,
            })
            .collect();

        if let Some(Predicate::Position(n)) = &step.predicate {
            return filtered.into_iter().nth(n - 1).into_iter().collect();
        }

        filtered
    }

    // =========================================================================
    // Mutation bookkeeping
    // =========================================================================

    /// Mark an element hidden. Returns `false` when it already was.
    pub fn hide_node(&mut self, id: NodeId) -> bool {
        self.hidden.insert(id)
    }

    /// Mark an element (and with it, its subtree) removed. Returns `false`
    /// when it already was.
    pub fn remove_node(&mut self, id: NodeId) -> bool {
        self.removed.insert(id)
    }

    /// Record a click on an element.
    pub fn click_node(&mut self, id: NodeId) {
        self.clicks.push(id);
    }

    pub fn is_hidden(&self, id: NodeId) -> bool {
        self.hidden.contains(&id)
    }

    pub fn hidden_count(&self) -> usize {
        self.hidden.len()
    }

    pub fn clicks(&self) -> &[NodeId] {
        &self.clicks
    }

    /// Whether a node or any of its ancestors has been removed.
    fn is_detached(&self, id: NodeId) -> bool {
        if self.removed.is_empty() {
            return false;
        }
        if self.removed.contains(&id) {
            return true;
        }
        match self.html.tree.get(id) {
            Some(node) => node.ancestors().any(|a| self.removed.contains(&a.id())),
            None => true,
        }
    }

    fn element(&self, id: NodeId) -> Option<ElementRef<'_>> {
        self.html.tree.get(id).and_then(ElementRef::wrap)
    }
}

/// Parse a `key: value; key: value` declaration list. Keys and values are
/// trimmed and lowercased; pairs without a value are dropped.
pub fn parse_declarations(style: &str) -> Vec<(String, String)> {
    style
        .split(';')
        .filter_map(|decl| {
            let (prop, value) = decl.split_once(':')?;
            let prop = prop.trim().to_ascii_lowercase();
            let value = value.trim().to_ascii_lowercase();
            if prop.is_empty() || value.is_empty() {
                return None;
            }
            Some((prop, value))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"
        <html><body>
            <!-- promo slot -->
            <div id="ad1" class="ad" style="position: absolute; z-index: 9999">Sponsored</div>
            <div id="content"><span class="inner">hello</span></div>
        </body></html>
    "#;

    #[test]
    fn select_returns_document_order() {
        let doc = Document::parse(PAGE);
        let divs = doc.select("div").unwrap();
        assert_eq!(divs.len(), 2);
        assert_eq!(doc.attr(divs[0], "id"), Some("ad1"));
        assert_eq!(doc.attr(divs[1], "id"), Some("content"));
    }

    #[test]
    fn invalid_selector_is_a_query_error() {
        let doc = Document::parse(PAGE);
        assert!(matches!(
            doc.select("div[[["),
            Err(QueryError::InvalidSelector(_))
        ));
    }

    #[test]
    fn hide_node_is_idempotent() {
        let mut doc = Document::parse(PAGE);
        let ad = doc.select("#ad1").unwrap()[0];
        assert!(doc.hide_node(ad));
        assert!(!doc.hide_node(ad));
        assert_eq!(doc.hidden_count(), 1);
        assert!(doc.is_hidden(ad));
    }

    #[test]
    fn removed_subtrees_leave_queries() {
        let mut doc = Document::parse(PAGE);
        let content = doc.select("#content").unwrap()[0];
        assert!(doc.remove_node(content));
        assert!(!doc.remove_node(content));
        assert!(doc.select("#content").unwrap().is_empty());
        assert!(doc.select("span.inner").unwrap().is_empty());
        assert_eq!(doc.select("div").unwrap().len(), 1);
    }

    #[test]
    fn containment_includes_self() {
        let doc = Document::parse(PAGE);
        let content = doc.select("#content").unwrap()[0];
        let inner = doc.select("span.inner").unwrap()[0];
        assert!(doc.contains(content, inner));
        assert!(doc.contains(content, content));
        assert!(!doc.contains(inner, content));
    }

    #[test]
    fn comment_nodes_and_text() {
        let doc = Document::parse(PAGE);
        let comments = doc.comment_nodes();
        assert_eq!(comments.len(), 1);
        assert_eq!(doc.comment_text(comments[0]).unwrap().trim(), "promo slot");
    }

    #[test]
    fn style_value_normalizes_and_takes_last() {
        let doc = Document::parse(
            r#"<div id="x" style="color: RED; color: blue ; z-index: 10"></div>"#,
        );
        let div = doc.select("#x").unwrap()[0];
        assert_eq!(doc.style_value(div, "color"), Some("blue".to_string()));
        assert_eq!(doc.style_value(div, "z-index"), Some("10".to_string()));
        assert_eq!(doc.style_value(div, "display"), None);
    }

    #[test]
    fn path_query_descendant_with_predicate() {
        let doc = Document::parse(PAGE);
        let query = PathQuery::parse("//div[@id='ad1']").unwrap();
        let found = doc.query_path(&query);
        assert_eq!(found.len(), 1);
        assert_eq!(doc.attr(found[0], "class"), Some("ad"));
    }

    #[test]
    fn path_query_child_steps_and_position() {
        let doc = Document::parse(PAGE);
        let query = PathQuery::parse("/html/body/div[2]/span").unwrap();
        let found = doc.query_path(&query);
        assert_eq!(found.len(), 1);
        assert_eq!(doc.attr(found[0], "class"), Some("inner"));

        let none = PathQuery::parse("/html/body/div[9]").unwrap();
        assert!(doc.query_path(&none).is_empty());
    }

    #[test]
    fn parse_declarations_drops_malformed_pairs() {
        let decls = parse_declarations("color: red; junk; : x; width:;height: 10px");
        assert_eq!(
            decls,
            vec![
                ("color".to_string(), "red".to_string()),
                ("height".to_string(), "10px".to_string()),
            ]
        );
    }
}
