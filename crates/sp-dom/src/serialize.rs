//! HTML serialization of document subtrees.

use crate::Document;
use crate::NodeData;
use crate::NodeId;

enum Step<'a> {
    Visit(NodeId),
    Close(&'a str),
}

/// Serializes the subtree at `id`. Uses an explicit stack, so deep trees cannot exhaust the
/// thread's stack.
pub(crate) fn write_node(document: &Document, id: NodeId, out: &mut String) {
    let mut steps = vec![Step::Visit(id)];
    while let Some(step) = steps.pop() {
        let id = match step {
            Step::Visit(id) => id,
            Step::Close(tag) => {
                out.push_str("</");
                out.push_str(tag);
                out.push('>');
                continue;
            }
        };
        let Some(data) = document.data(id) else {
            continue;
        };

        match data {
            NodeData::Document => push_children(document, id, &mut steps),
            NodeData::Doctype(name) => {
                out.push_str("<!DOCTYPE ");
                out.push_str(name);
                out.push('>');
            }
            NodeData::Comment(text) => {
                out.push_str("<!--");
                out.push_str(text);
                out.push_str("-->");
            }
            NodeData::Text(text) => {
                let raw = document
                    .parent(id)
                    .and_then(|parent| document.tag_name(parent))
                    .is_some_and(is_raw_text_tag);
                if raw {
                    out.push_str(text);
                } else {
                    escape_text(text, out);
                }
            }
            NodeData::Element(element) => {
                out.push('<');
                out.push_str(&element.tag);
                for (name, value) in &element.attrs {
                    out.push(' ');
                    out.push_str(name);
                    out.push_str("=\"");
                    escape_attr(value, out);
                    out.push('"');
                }
                out.push('>');

                if is_void(&element.tag) {
                    continue;
                }
                steps.push(Step::Close(&element.tag));
                push_children(document, id, &mut steps);
            }
        }
    }
}

fn push_children(document: &Document, id: NodeId, steps: &mut Vec<Step<'_>>) {
    steps.extend(document.children(id).iter().rev().map(|child| Step::Visit(*child)));
}

fn escape_text(input: &str, out: &mut String) {
    for ch in input.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '\u{a0}' => out.push_str("&nbsp;"),
            _ => out.push(ch),
        }
    }
}

fn escape_attr(input: &str, out: &mut String) {
    for ch in input.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '"' => out.push_str("&quot;"),
            '\u{a0}' => out.push_str("&nbsp;"),
            _ => out.push(ch),
        }
    }
}

pub fn is_raw_text_tag(tag: &str) -> bool {
    matches!(tag, "script" | "style")
}

pub fn is_void(tag: &str) -> bool {
    matches!(
        tag,
        "area"
            | "base"
            | "br"
            | "col"
            | "embed"
            | "hr"
            | "img"
            | "input"
            | "link"
            | "meta"
            | "source"
            | "track"
            | "wbr"
    )
}

#[cfg(test)]
mod tests {
    use crate::Document;

    #[test]
    fn escapes_text_but_not_script_bodies() {
        let mut doc = Document::new();
        let root = doc.root();
        let div = doc.create_element("div", vec![("title".to_owned(), "a \"b\" & c".to_owned())]);
        let text = doc.create_text("1 < 2 & 3");
        let script = doc.create_element("script", Vec::new());
        let code = doc.create_text("if (a < b) {}");
        let br = doc.create_element("br", Vec::new());
        for (parent, child) in [(root, div), (div, text), (div, script), (script, code), (div, br)] {
            if let Err(error) = doc.append_child(parent, child) {
                panic!("{error}");
            }
        }

        assert_eq!(
            doc.to_html(),
            "<div title=\"a &quot;b&quot; &amp; c\">1 &lt; 2 &amp; 3<script>if (a < b) {}</script><br></div>"
        );
    }
}
