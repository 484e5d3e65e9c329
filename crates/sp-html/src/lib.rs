//! HTML tokenization and tree construction.
//!
//! The parser builds an inert [`Document`]: `<script>` bodies are kept as raw text and never
//! evaluated.

mod decode;
mod tokenizer;

pub use decode::decode_text_response;
pub use decode::detect_response_charset;

use sp_dom::Document;
use sp_dom::NodeId;
use tokenizer::Token;

/// Parses raw HTML into a document tree.
#[derive(Debug, Default, Clone, Copy)]
pub struct HtmlParser;

impl HtmlParser {
    pub fn parse(&self, input: &str) -> Document {
        build_tree(tokenizer::tokenize(input))
    }
}

pub fn parse_document(input: &str) -> Document {
    HtmlParser.parse(input)
}

fn build_tree(tokens: Vec<Token>) -> Document {
    let mut document = Document::new();
    let mut stack: Vec<NodeId> = vec![document.root()];

    for token in tokens {
        let parent = stack.last().copied().unwrap_or_else(|| document.root());
        match token {
            Token::Doctype(name) => {
                let node = document.create_doctype(name);
                attach(&mut document, parent, node);
            }
            Token::Comment(text) => {
                let node = document.create_comment(text);
                attach(&mut document, parent, node);
            }
            Token::Text(text) => {
                let node = document.create_text(text);
                attach(&mut document, parent, node);
            }
            Token::Start {
                name,
                attrs,
                self_closing,
            } => {
                close_implied(&document, &mut stack, &name);
                let parent = stack.last().copied().unwrap_or_else(|| document.root());
                let node = document.create_element(&name, attrs);
                attach(&mut document, parent, node);

                if !self_closing && !sp_dom::is_void(&name) {
                    stack.push(node);
                }
            }
            Token::End { name } => {
                // Stray end tags are dropped instead of unwinding unrelated elements.
                let open_at = stack
                    .iter()
                    .rposition(|id| document.tag_name(*id) == Some(name.as_str()));
                if let Some(index) = open_at
                    && index > 0
                {
                    stack.truncate(index);
                }
            }
        }
    }

    document
}

fn attach(document: &mut Document, parent: NodeId, node: NodeId) {
    // Both ids come from this arena and `node` is fresh, so the hierarchy is always valid.
    let _ = document.append_child(parent, node);
}

/// Pops elements that an incoming start tag implicitly closes (`<li>` after `<li>`, block
/// content after an open `<p>`).
fn close_implied(document: &Document, stack: &mut Vec<NodeId>, incoming: &str) {
    while stack.len() > 1 {
        let Some(open) = stack.last().and_then(|id| document.tag_name(*id)) else {
            break;
        };
        if !implicitly_closes(open, incoming) {
            break;
        }
        stack.pop();
    }
}

fn implicitly_closes(open: &str, incoming: &str) -> bool {
    match open {
        "p" => matches!(
            incoming,
            "p" | "div"
                | "ul"
                | "ol"
                | "table"
                | "form"
                | "section"
                | "article"
                | "header"
                | "footer"
                | "nav"
                | "main"
                | "h1"
                | "h2"
                | "h3"
                | "h4"
                | "h5"
                | "h6"
                | "pre"
                | "blockquote"
                | "hr"
        ),
        "li" => incoming == "li",
        "option" => matches!(incoming, "option" | "optgroup"),
        "td" | "th" => matches!(incoming, "td" | "th" | "tr"),
        "tr" => incoming == "tr",
        "dt" | "dd" => matches!(incoming, "dt" | "dd"),
        _ => false,
    }
}
