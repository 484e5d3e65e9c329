//! Form submission pipeline: action resolution, field collection, interception.

use crate::dispatch::Dispatch;
use crate::filter::Ineligible;
use crate::filter::SameOriginFilter;
use crate::request::NavigationRequest;
use sp_core::SpliceResult;
use sp_dom::Document;
use sp_dom::NodeId;
use sp_net::FilePart;
use sp_net::FormData;
use sp_net::FormEncoding;
use sp_net::HttpMethod;
use sp_net::PageUrl;

const CONTROL_TAGS: [&str; 4] = ["input", "select", "textarea", "button"];

/// A `submit` event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmitEvent {
    /// The submitted form (or a node inside it).
    pub target: NodeId,
    /// Button that triggered the submission; `None` for `requestSubmit()` or synthetic events.
    pub submitter: Option<NodeId>,
    /// Files chosen in file inputs, keyed by input name.
    pub files: Vec<(String, FilePart)>,
}

impl SubmitEvent {
    pub fn new(target: NodeId) -> Self {
        Self {
            target,
            submitter: None,
            files: Vec::new(),
        }
    }

    pub fn with_submitter(mut self, submitter: NodeId) -> Self {
        self.submitter = Some(submitter);
        self
    }

    pub fn with_file(mut self, name: &str, file: FilePart) -> Self {
        self.files.push((name.to_owned(), file));
        self
    }
}

/// Builds navigation requests from eligible form submissions.
#[derive(Debug, Clone)]
pub struct FormPipeline {
    filter: SameOriginFilter,
}

impl FormPipeline {
    pub fn new(filter: SameOriginFilter) -> Self {
        Self { filter }
    }

    pub fn intercept(&self, document: &Document, location: &PageUrl, event: &SubmitEvent) -> Dispatch {
        let Some(form) = document.closest(event.target, &["form"]) else {
            return Dispatch::Ignored;
        };

        let action = match form_action(document, location, form, event.submitter) {
            Ok(action) => action,
            Err(error) => {
                tracing::debug!(%error, "form action is not navigable");
                let action = submitter_or_form_attr(document, form, event.submitter, "formaction", "action");
                return Dispatch::Native(Ineligible::UnsupportedTarget(action.unwrap_or_default().to_owned()));
            }
        };

        let target = submitter_or_form_attr(document, form, event.submitter, "formtarget", "target");
        if let Err(reason) = self.filter.check_form(location, &action, target) {
            return Dispatch::Native(reason);
        }

        let method = form_method(document, form, event.submitter);
        let encoding = form_encoding(document, form, event.submitter);
        let data = collect_form_data(document, form, event.submitter, &event.files);
        Dispatch::Navigate(NavigationRequest::form_submission(
            action, method, data, encoding, form,
        ))
    }
}

/// Resolved submission URL; an absent or empty action means the document URL.
pub fn form_action(
    document: &Document,
    location: &PageUrl,
    form: NodeId,
    submitter: Option<NodeId>,
) -> SpliceResult<PageUrl> {
    let action = submitter_or_form_attr(document, form, submitter, "formaction", "action");
    location.resolve(action.unwrap_or(""))
}

/// Declared method; unrecognized or missing methods submit as POST.
pub fn form_method(document: &Document, form: NodeId, submitter: Option<NodeId>) -> HttpMethod {
    submitter_or_form_attr(document, form, submitter, "formmethod", "method")
        .and_then(HttpMethod::from_token)
        .unwrap_or(HttpMethod::Post)
}

pub fn form_encoding(document: &Document, form: NodeId, submitter: Option<NodeId>) -> FormEncoding {
    FormEncoding::from_enctype(submitter_or_form_attr(
        document,
        form,
        submitter,
        "formenctype",
        "enctype",
    ))
}

fn submitter_or_form_attr<'a>(
    document: &'a Document,
    form: NodeId,
    submitter: Option<NodeId>,
    submitter_attr: &str,
    form_attr: &str,
) -> Option<&'a str> {
    submitter
        .and_then(|button| document.attr(button, submitter_attr))
        .or_else(|| document.attr(form, form_attr))
}

/// Form data set in tree order.
pub fn collect_form_data(
    document: &Document,
    form: NodeId,
    submitter: Option<NodeId>,
    files: &[(String, FilePart)],
) -> FormData {
    let mut data = FormData::new();

    for control in form_controls(document, form) {
        if is_disabled(document, control) {
            continue;
        }
        let name = document.attr(control, "name").unwrap_or("");
        let is_submitter = submitter == Some(control);

        match document.tag_name(control).unwrap_or("") {
            "input" => collect_input(document, control, name, is_submitter, files, &mut data),
            "button" => {
                let kind = document.attr(control, "type").unwrap_or("submit");
                if is_submitter && kind.eq_ignore_ascii_case("submit") && !name.is_empty() {
                    data.push_text(name, document.attr(control, "value").unwrap_or(""));
                }
            }
            "select" if !name.is_empty() => {
                for value in selected_options(document, control) {
                    data.push_text(name, &value);
                }
            }
            "textarea" if !name.is_empty() => {
                data.push_text(name, &document.text_content(control));
            }
            _ => {}
        }
    }

    data
}

fn collect_input(
    document: &Document,
    input: NodeId,
    name: &str,
    is_submitter: bool,
    files: &[(String, FilePart)],
    data: &mut FormData,
) {
    let kind = document
        .attr(input, "type")
        .unwrap_or("text")
        .trim()
        .to_ascii_lowercase();
    let value = document.attr(input, "value");

    match kind.as_str() {
        "image" if is_submitter => {
            let prefix = if name.is_empty() {
                String::new()
            } else {
                format!("{name}.")
            };
            data.push_text(&format!("{prefix}x"), "0");
            data.push_text(&format!("{prefix}y"), "0");
        }
        _ if name.is_empty() => {}
        "submit" if is_submitter => data.push_text(name, value.unwrap_or("Submit")),
        "submit" | "image" | "reset" | "button" => {}
        "checkbox" | "radio" => {
            if document.has_attr(input, "checked") {
                data.push_text(name, value.unwrap_or("on"));
            }
        }
        "file" => {
            let mut chosen = files.iter().filter(|(field, _)| field == name).peekable();
            if chosen.peek().is_none() {
                data.push_file(name, FilePart::new("", "application/octet-stream", Vec::new()));
            }
            for (_, file) in chosen {
                data.push_file(name, file.clone());
            }
        }
        _ => data.push_text(name, value.unwrap_or("")),
    }
}

fn selected_options(document: &Document, select: NodeId) -> Vec<String> {
    let options = document
        .descendants(select)
        .filter(|node| document.tag_name(*node) == Some("option"))
        .filter(|option| !is_disabled(document, *option))
        .collect::<Vec<_>>();

    let mut chosen = options
        .iter()
        .filter(|option| document.has_attr(**option, "selected"))
        .copied()
        .collect::<Vec<_>>();
    if !document.has_attr(select, "multiple") {
        // Single selects show (and submit) the last selected option, else the first one.
        chosen = chosen
            .last()
            .copied()
            .or_else(|| options.first().copied())
            .into_iter()
            .collect();
    }

    chosen
        .into_iter()
        .map(|option| match document.attr(option, "value") {
            Some(value) => value.to_owned(),
            None => sp_dom::collapse_whitespace(&document.text_content(option)),
        })
        .collect()
}

/// Controls owned by `form`: descendants without a `form` attribute plus elements anywhere
/// whose `form` attribute names it.
fn form_controls(document: &Document, form: NodeId) -> Vec<NodeId> {
    let form_id = document.attr(form, "id").filter(|id| !id.is_empty());

    document
        .descendants(document.root())
        .filter(|node| {
            document
                .tag_name(*node)
                .is_some_and(|tag| CONTROL_TAGS.contains(&tag))
        })
        .filter(|node| match document.attr(*node, "form") {
            Some(owner) => form_id == Some(owner),
            None => document
                .parent(*node)
                .and_then(|parent| document.closest(parent, &["form"]))
                == Some(form),
        })
        .collect()
}

fn is_disabled(document: &Document, node: NodeId) -> bool {
    if document.has_attr(node, "disabled") {
        return true;
    }

    let mut current = document.parent(node);
    while let Some(ancestor) = current {
        if matches!(document.tag_name(ancestor), Some("fieldset" | "optgroup"))
            && document.has_attr(ancestor, "disabled")
        {
            return true;
        }
        current = document.parent(ancestor);
    }
    false
}
