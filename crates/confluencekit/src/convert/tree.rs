//! Lenient element tree
//!
//! Builds nested elements from the token stream. Void and self-closing
//! elements never take children, a stray end tag is ignored, and an end
//! tag closes every element opened after its match. Elements nested deeper
//! than [`MAX_DEPTH`] are unwrapped: their content is kept in the deepest
//! allowed element.

use super::tokenizer::Token;

/// Deepest element nesting kept in the tree
pub(crate) const MAX_DEPTH: usize = 256;

const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source", "track",
    "wbr",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Node {
    Element(Element),
    Text(String),
    CData(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Element {
    pub name: String,
    pub attrs: Vec<(String, String)>,
    pub children: Vec<Node>,
}

impl Element {
    fn new(name: String, attrs: Vec<(String, String)>) -> Self {
        Self {
            name,
            attrs,
            children: Vec::new(),
        }
    }

    /// Attribute value by (lowercase) name
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    /// Direct child elements
    pub fn child_elements(&self) -> impl Iterator<Item = &Element> {
        self.children.iter().filter_map(|node| match node {
            Node::Element(el) => Some(el),
            _ => None,
        })
    }

    /// First direct child element with the given name
    pub fn child(&self, name: &str) -> Option<&Element> {
        self.child_elements().find(|el| el.name == name)
    }
}

pub(crate) fn build(tokens: Vec<Token>) -> Vec<Node> {
    // stack[0] is the synthetic root, so an element's depth is its index
    let mut stack = vec![Element::new(String::new(), Vec::new())];
    // Names of open elements past MAX_DEPTH that were unwrapped
    let mut unwrapped: Vec<String> = Vec::new();

    for token in tokens {
        match token {
            Token::Start {
                name,
                attrs,
                self_closing,
            } => {
                if unwrapped.is_empty() {
                    close_implied(&mut stack, &name);
                }
                let element = Element::new(name, attrs);
                if self_closing || VOID_ELEMENTS.contains(&element.name.as_str()) {
                    push_node(&mut stack, Node::Element(element));
                } else if stack.len() > MAX_DEPTH {
                    unwrapped.push(element.name);
                } else {
                    stack.push(element);
                }
            }
            Token::End { name } => {
                if let Some(pos) = unwrapped.iter().rposition(|open| *open == name) {
                    unwrapped.truncate(pos);
                    continue;
                }
                // Index 0 is the synthetic root and never matches
                if let Some(pos) = stack.iter().rposition(|el| el.name == name) {
                    if pos > 0 {
                        unwrapped.clear();
                        while stack.len() > pos {
                            close_top(&mut stack);
                        }
                    }
                }
            }
            Token::Text(text) => push_node(&mut stack, Node::Text(text)),
            Token::CData(text) => push_node(&mut stack, Node::CData(text)),
        }
    }

    while stack.len() > 1 {
        close_top(&mut stack);
    }

    stack.pop().map(|root| root.children).unwrap_or_default()
}

fn push_node(stack: &mut [Element], node: Node) {
    if let Some(top) = stack.last_mut() {
        top.children.push(node);
    }
}

fn close_top(stack: &mut Vec<Element>) {
    if let Some(element) = stack.pop() {
        push_node(stack, Node::Element(element));
    }
}

/// Close elements whose end tag is optional when a sibling opens
///
/// The search for an open sibling stops at the nearest scope element, so
/// an `li` never closes the item of an enclosing list. Anything opened
/// inside the closed sibling is closed with it.
fn close_implied(stack: &mut Vec<Element>, opening: &str) {
    let (siblings, scope): (&[&str], &[&str]) = match opening {
        "li" => (&["li"], &["ul", "ol"]),
        "p" => (&["p"], P_SCOPE),
        "td" | "th" => (&["td", "th"], &["tr", "table"]),
        "tr" => (&["tr"], &["table", "thead", "tbody", "tfoot"]),
        _ => return,
    };

    let open = stack
        .iter()
        .enumerate()
        .skip(1)
        .rev()
        .map(|(pos, el)| (pos, el.name.as_str()))
        .find(|(_, name)| siblings.contains(name) || scope.contains(name));

    if let Some((pos, name)) = open {
        if siblings.contains(&name) {
            while stack.len() > pos {
                close_top(stack);
            }
        }
    }
}

/// Containers a new paragraph does not close across
const P_SCOPE: &[&str] = &[
    "div",
    "li",
    "ul",
    "ol",
    "td",
    "th",
    "table",
    "blockquote",
    "section",
    "article",
    "body",
    "ac:rich-text-body",
    "ac:layout-cell",
    "ac:task-body",
];

#[cfg(test)]
mod tests {
    use super::*;
    use crate::convert::tokenizer::tokenize;

    fn parse(html: &str) -> Vec<Node> {
        build(tokenize(html).unwrap())
    }

    fn element(node: &Node) -> &Element {
        match node {
            Node::Element(el) => el,
            other => panic!("expected element, got {other:?}"),
        }
    }

    #[test]
    fn test_nesting() {
        let nodes = parse("<ul><li>a</li><li>b</li></ul>");
        assert_eq!(nodes.len(), 1);
        let list = element(&nodes[0]);
        assert_eq!(list.name, "ul");
        assert_eq!(list.child_elements().count(), 2);
    }

    #[test]
    fn test_void_elements_take_no_children() {
        let nodes = parse("<p>a<br>b<img src=\"x.png\">c</p>");
        let p = element(&nodes[0]);
        assert_eq!(p.children.len(), 5);
    }

    #[test]
    fn test_unclosed_list_items() {
        let nodes = parse("<ul><li>a<li>b</ul>");
        let list = element(&nodes[0]);
        let items: Vec<_> = list.child_elements().map(|el| el.name.as_str()).collect();
        assert_eq!(items, vec!["li", "li"]);
    }

    #[test]
    fn test_list_item_closes_open_paragraph() {
        let nodes = parse("<ul><li><p>a<li>b</ul>");
        let list = element(&nodes[0]);
        let items: Vec<_> = list.child_elements().collect();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].child("p").map(|p| p.children.len()), Some(1));
        assert_eq!(items[1].children, vec![Node::Text("b".to_string())]);
    }

    #[test]
    fn test_list_item_stays_inside_nested_list() {
        let nodes = parse("<ul><li>a<ul><li>b<li>c</ul><li>d</ul>");
        let outer = element(&nodes[0]);
        let items: Vec<_> = outer.child_elements().collect();
        assert_eq!(items.len(), 2);
        let inner = items[0].child("ul").unwrap();
        assert_eq!(inner.child_elements().count(), 2);
    }

    #[test]
    fn test_paragraph_closes_inline_siblings() {
        let nodes = parse("<p><b>a<p>b");
        assert_eq!(nodes.len(), 2);
        assert_eq!(element(&nodes[1]).children, vec![Node::Text("b".to_string())]);
    }

    fn depth(nodes: &[Node]) -> usize {
        nodes
            .iter()
            .filter_map(|node| match node {
                Node::Element(el) => Some(1 + depth(&el.children)),
                _ => None,
            })
            .max()
            .unwrap_or(0)
    }

    #[test]
    fn test_nesting_is_capped() {
        let levels = MAX_DEPTH * 4;
        let html = format!("{}x{}", "<div>".repeat(levels), "</div>".repeat(levels));
        let nodes = parse(&html);
        assert_eq!(depth(&nodes), MAX_DEPTH);
    }

    #[test]
    fn test_content_after_capped_nesting_is_kept() {
        let levels = MAX_DEPTH + 10;
        let html = format!(
            "<section>{}<b>deep</b>{}</section><p>after</p>",
            "<div>".repeat(levels),
            "</div>".repeat(levels)
        );
        let nodes = parse(&html);
        assert_eq!(nodes.len(), 2);
        assert_eq!(element(&nodes[0]).name, "section");
        assert_eq!(element(&nodes[1]).name, "p");
    }

    #[test]
    fn test_unclosed_table_cells() {
        let nodes = parse("<table><tr><td>1<td>2<tr><td>3</table>");
        let table = element(&nodes[0]);
        let rows: Vec<_> = table.child_elements().collect();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].child_elements().count(), 2);
        assert_eq!(rows[1].child_elements().count(), 1);
    }

    #[test]
    fn test_stray_end_tag_is_ignored() {
        let nodes = parse("<p>a</span>b</p>");
        let p = element(&nodes[0]);
        assert_eq!(p.children.len(), 2);
    }

    #[test]
    fn test_mismatched_end_closes_inner() {
        let nodes = parse("<div><b>bold</div>after");
        assert_eq!(nodes.len(), 2);
        let div = element(&nodes[0]);
        assert_eq!(div.child("b").map(|b| b.children.len()), Some(1));
    }

    #[test]
    fn test_unclosed_at_eof() {
        let nodes = parse("<div><p>text");
        let div = element(&nodes[0]);
        assert!(div.child("p").is_some());
    }

    #[test]
    fn test_attr_lookup() {
        let nodes = parse(r#"<ac:structured-macro ac:name="info"></ac:structured-macro>"#);
        assert_eq!(element(&nodes[0]).attr("ac:name"), Some("info"));
        assert_eq!(element(&nodes[0]).attr("missing"), None);
    }
}
