//! Line-oriented driver around a headless host.

use sp_core::SpliceError;
use sp_core::SpliceResult;
use sp_dom::Document;
use sp_dom::NodeId;
use sp_nav::BrowserHost;
use sp_nav::ClickEvent;
use sp_nav::HandleOutcome;
use sp_nav::HeadlessHost;
use sp_nav::HostAction;
use sp_nav::HttpPageLoader;
use sp_nav::Interaction;
use sp_nav::NavigationOutcome;
use sp_nav::NavigationRequest;
use sp_nav::Navigator;
use sp_nav::NavigatorConfig;
use sp_nav::PageLoader;
use sp_nav::SubmitEvent;
use sp_nav::ThreadedExecutor;
use sp_nav::forms;
use sp_net::FilePart;
use sp_net::PageUrl;
use std::time::Instant;

const MAX_CONTENT_PREVIEW_CHARS: usize = 600;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Links,
    /// Anchor href or index from `links`.
    Click(String),
    Submit {
        form: String,
        fields: Vec<(String, String)>,
    },
    Back,
    Forward,
    Show,
    History,
    Help,
    Quit,
}

pub fn parse_command(line: &str) -> SpliceResult<Option<Command>> {
    let mut words = line.split_whitespace();
    let Some(verb) = words.next() else {
        return Ok(None);
    };

    let command = match verb {
        "links" => Command::Links,
        "click" => Command::Click(required(words.next(), "click <href|index>")?),
        "submit" => {
            let form = required(words.next(), "submit <form-id> [name=value ...]")?;
            let fields = words
                .map(|pair| {
                    pair.split_once('=')
                        .map(|(name, value)| (name.to_owned(), value.to_owned()))
                        .ok_or_else(|| {
                            SpliceError::new(
                                "shell.command.invalid_field",
                                format!("`{pair}` is not name=value"),
                            )
                        })
                })
                .collect::<SpliceResult<Vec<_>>>()?;
            Command::Submit { form, fields }
        }
        "back" => Command::Back,
        "forward" => Command::Forward,
        "show" => Command::Show,
        "history" => Command::History,
        "help" | "?" => Command::Help,
        "quit" | "exit" => Command::Quit,
        other => {
            return Err(SpliceError::new(
                "shell.command.unknown",
                format!("unknown command `{other}` (try `help`)"),
            ));
        }
    };
    Ok(Some(command))
}

fn required(word: Option<&str>, usage: &str) -> SpliceResult<String> {
    word.map(str::to_owned)
        .ok_or_else(|| SpliceError::new("shell.command.missing_argument", format!("usage: {usage}")))
}

pub struct Shell {
    navigator: Navigator<ThreadedExecutor>,
    host: HeadlessHost,
    loader: HttpPageLoader,
}

impl Shell {
    /// Loads `start` with a full navigation.
    pub fn open(config: NavigatorConfig, loader: HttpPageLoader, start: PageUrl) -> SpliceResult<Self> {
        let page = loader
            .load(&NavigationRequest::programmatic(start.clone(), false))
            .map_err(|failure| SpliceError::new("shell.load.failed", format!("loading {start}: {failure}")))?;
        let host = HeadlessHost::new(page.final_url, sp_html::parse_document(&page.body));
        let navigator = Navigator::new(config, ThreadedExecutor::new(loader.clone()))?;

        Ok(Self {
            navigator,
            host,
            loader,
        })
    }

    /// Runs one input line. Returns false when the shell should exit.
    pub fn execute(&mut self, line: &str) -> SpliceResult<bool> {
        let Some(command) = parse_command(line)? else {
            return Ok(true);
        };

        match command {
            Command::Links => self.print_links(),
            Command::Click(target) => {
                let anchor = find_anchor(self.host.document(), &target).ok_or_else(|| {
                    SpliceError::new("shell.command.no_such_link", format!("no link matches `{target}`"))
                })?;
                self.interact(Interaction::Click(ClickEvent::primary(anchor)))?;
            }
            Command::Submit { form, fields } => {
                let event = self.prepare_submit(&form, &fields)?;
                self.interact(Interaction::Submit(event))?;
            }
            Command::Back => match self.host.back() {
                Some(popstate) => self.interact(popstate)?,
                None => println!("no previous entry"),
            },
            Command::Forward => match self.host.forward() {
                Some(popstate) => self.interact(popstate)?,
                None => println!("no next entry"),
            },
            Command::Show => self.print_summary(),
            Command::History => self.print_history(),
            Command::Help => print_help(),
            Command::Quit => return Ok(false),
        }
        Ok(true)
    }

    pub fn print_summary(&self) {
        let document = self.host.document();
        println!("{} [{}]", self.host.location(), document.title());
        let region = &self.navigator.config().content_region;
        match document.get_element_by_id(region) {
            Some(content) => {
                let text = sp_dom::collapse_whitespace(&document.text_content(content));
                let preview = text.chars().take(MAX_CONTENT_PREVIEW_CHARS).collect::<String>();
                println!("#{region}: {preview}");
            }
            None => println!("(page has no #{region}; links load in full)"),
        }
    }

    fn print_links(&self) {
        let document = self.host.document();
        for (index, anchor) in document.elements_by_tag("a").into_iter().enumerate() {
            let href = document.attr(anchor, "href").unwrap_or("");
            let text = sp_dom::collapse_whitespace(&document.text_content(anchor));
            println!("{index:>3}  {href}  {text}");
        }
    }

    fn print_history(&self) {
        let history = self.host.history();
        for (index, entry) in history.entries().iter().enumerate() {
            let marker = if index == history.cursor() { '>' } else { ' ' };
            println!("{marker} {index:>2} {} [{}]", entry.url, entry.title);
        }
    }

    /// Applies `name=value` overrides to the form's controls. `name=@path` attaches a file.
    fn prepare_submit(&mut self, form_id: &str, fields: &[(String, String)]) -> SpliceResult<SubmitEvent> {
        let document = self.host.document();
        let form = document
            .get_element_by_id(form_id)
            .filter(|node| document.tag_name(*node) == Some("form"))
            .ok_or_else(|| SpliceError::new("shell.command.no_such_form", format!("no form with id `{form_id}`")))?;

        let mut event = SubmitEvent::new(form);
        for (name, value) in fields {
            if let Some(path) = value.strip_prefix('@') {
                let bytes = std::fs::read(path).map_err(|error| {
                    SpliceError::new("shell.command.file_unreadable", format!("{path}: {error}"))
                })?;
                let filename = std::path::Path::new(path)
                    .file_name()
                    .map(|name| name.to_string_lossy().into_owned())
                    .unwrap_or_default();
                event = event.with_file(name, FilePart::new(&filename, "application/octet-stream", bytes));
                continue;
            }

            let control = named_control(self.host.document(), form, name).ok_or_else(|| {
                SpliceError::new("shell.command.no_such_field", format!("form has no field `{name}`"))
            })?;
            let document = self.host.document_mut();
            if document.tag_name(control) == Some("textarea") {
                document.remove_children(control);
                let text = document.create_text(value.as_str());
                document.append_child(control, text)?;
            } else {
                document.set_attr(control, "value", value)?;
            }
        }
        Ok(event)
    }

    fn interact(&mut self, interaction: Interaction) -> SpliceResult<()> {
        match self.navigator.handle(&mut self.host, &interaction, Instant::now())? {
            HandleOutcome::Started(navigation) => {
                tracing::debug!(%navigation, "waiting for navigation");
                while self.navigator.in_flight() > 0 {
                    for report in self.navigator.wait(&mut self.host)? {
                        describe(&report.outcome);
                    }
                }
            }
            HandleOutcome::Native(reason) => {
                println!("browser default: {reason}");
                if let Interaction::Click(event) = &interaction
                    && let Some(url) = self.native_link_target(event.target)
                {
                    self.host.assign_location(&url);
                }
                if let Interaction::Submit(event) = &interaction {
                    self.host.submit_form_natively(event.target);
                }
            }
            HandleOutcome::Ignored => println!("nothing to do"),
        }

        self.perform_host_actions()?;
        self.print_summary();
        Ok(())
    }

    fn native_link_target(&self, anchor: NodeId) -> Option<PageUrl> {
        let href = self.host.document().attr(anchor, "href")?;
        self.host.location().resolve(href).ok()
    }

    /// Carries out full loads the engine asked the host for.
    fn perform_host_actions(&mut self) -> SpliceResult<()> {
        for action in self.host.take_actions() {
            match action {
                HostAction::PushState { .. } => {}
                HostAction::Assign(url) => {
                    let request = NavigationRequest::programmatic(url, true);
                    self.full_load(&request, true)?;
                }
                HostAction::NativeSubmit { form, action, method } => {
                    let document = self.host.document();
                    let data = forms::collect_form_data(document, form, None, &[]);
                    let encoding = forms::form_encoding(document, form, None);
                    let request = NavigationRequest::form_submission(action, method, data, encoding, form);
                    self.full_load(&request, true)?;
                }
                HostAction::Reload(url) => {
                    let request = NavigationRequest::programmatic(url, false);
                    self.full_load(&request, false)?;
                }
            }
        }
        Ok(())
    }

    fn full_load(&mut self, request: &NavigationRequest, new_entry: bool) -> SpliceResult<()> {
        tracing::info!(url = %request.target(), method = request.method().as_str(), "full page load");
        let page = self.loader.load(request).map_err(|failure| {
            SpliceError::new("shell.load.failed", format!("loading {}: {failure}", request.target()))
        })?;
        let document = sp_html::parse_document(&page.body);
        if new_entry {
            self.host.load(page.final_url, document);
        } else {
            self.host.replace_document(document);
        }
        Ok(())
    }
}

fn describe(outcome: &NavigationOutcome) {
    match outcome {
        NavigationOutcome::Patched(report) => {
            println!("patched {} -> {}", report.patched.join(", "), report.url);
        }
        NavigationOutcome::HardNavigation { url, cause } => println!("full navigation to {url} ({cause})"),
        NavigationOutcome::NativeSubmission { cause, .. } => println!("native form submission ({cause})"),
        NavigationOutcome::Reloaded { reason } => println!("reloading ({reason})"),
        NavigationOutcome::Superseded => println!("superseded by a newer navigation"),
    }
}

fn print_help() {
    println!("links                          list anchors");
    println!("click <href|index>             click an anchor");
    println!("submit <form-id> [k=v|k=@file] submit a form");
    println!("back | forward                 traverse history");
    println!("show | history                 current page, session history");
    println!("quit");
}

/// Anchor by index into `links` output, else by exact `href`.
fn find_anchor(document: &Document, target: &str) -> Option<NodeId> {
    let anchors = document.elements_by_tag("a");
    if let Ok(index) = target.parse::<usize>()
        && let Some(anchor) = anchors.get(index)
    {
        return Some(*anchor);
    }
    anchors
        .into_iter()
        .find(|anchor| document.attr(*anchor, "href") == Some(target))
}

fn named_control(document: &Document, form: NodeId, name: &str) -> Option<NodeId> {
    document.descendants(form).find(|node| {
        matches!(document.tag_name(*node), Some("input" | "textarea"))
            && document.attr(*node, "name") == Some(name)
    })
}
