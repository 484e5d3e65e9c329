//! End-to-end engine behavior against a headless host and scripted fetches.

use crate::config::NavigatorConfig;
use crate::config::OverlapPolicy;
use crate::confirm::ConfirmationHandle;
use crate::dispatch::Interaction;
use crate::fetch::FetchFailure;
use crate::filter::Ineligible;
use crate::forms::SubmitEvent;
use crate::history::HistoryDecision;
use crate::host::BrowserHost;
use crate::host::HeadlessHost;
use crate::host::HostAction;
use crate::links::ClickEvent;
use crate::navigator::Navigator;
use crate::outcome::FallbackCause;
use crate::outcome::HandleOutcome;
use crate::outcome::NavigationOutcome;
use crate::outcome::NavigationReport;
use crate::request::NavigationId;
use crate::testing::ScriptedExecutor;
use crate::testing::ok;
use crate::testing::page;
use crate::testing::site_page;
use sp_core::SpliceError;
use sp_dom::NodeId;
use sp_net::FilePart;
use sp_net::HttpMethod;
use std::time::Duration;
use std::time::Instant;

const SKINS_CONTENT: &str = "<h1>All skins</h1>\
    <a id=\"five\" href=\"/skins/5\">Skin 5</a>\
    <a id=\"six\" href=\"/skins/6\">Skin 6</a>\
    <a id=\"external\" href=\"https://external.example/\">Elsewhere</a>\
    <a id=\"logout\" href=\"/logout\">Log out</a>\
    <form id=\"upload\" method=\"post\" enctype=\"multipart/form-data\" action=\"/skins/upload\">\
      <input name=\"title\" value=\"Cape\"><input type=\"file\" name=\"skin\"></form>\
    <form id=\"pay\" method=\"post\" action=\"https://pay.example/checkout\"></form>";

fn ms(millis: u64) -> Duration {
    Duration::from_millis(millis)
}

fn setup(config: NavigatorConfig) -> (Navigator<ScriptedExecutor>, HeadlessHost) {
    let navigator = match Navigator::new(config, ScriptedExecutor::default()) {
        Ok(value) => value,
        Err(error) => panic!("{error}"),
    };
    let host = HeadlessHost::from_html(
        page("http://localhost/skins"),
        &site_page("Skins", "Guest", SKINS_CONTENT),
    );
    (navigator, host)
}

fn node(host: &HeadlessHost, id: &str) -> NodeId {
    match host.document().get_element_by_id(id) {
        Some(node) => node,
        None => panic!("missing #{id}"),
    }
}

fn is_busy(host: &HeadlessHost) -> bool {
    let content = node(host, "pjax-container");
    host.document().has_class(content, "pjax-loading")
}

fn content_text(host: &HeadlessHost) -> String {
    host.document().text_content(node(host, "pjax-container"))
}

fn click(
    navigator: &mut Navigator<ScriptedExecutor>,
    host: &mut HeadlessHost,
    id: &str,
    now: Instant,
) -> NavigationId {
    let event = ClickEvent::primary(node(host, id));
    match navigator.handle(host, &Interaction::Click(event), now) {
        Ok(HandleOutcome::Started(navigation)) => navigation,
        other => panic!("click on #{id} was not intercepted: {other:?}"),
    }
}

fn upload(navigator: &mut Navigator<ScriptedExecutor>, host: &mut HeadlessHost, now: Instant) -> NavigationId {
    let event = SubmitEvent::new(node(host, "upload")).with_file("skin", FilePart::new("cape.png", "image/png", vec![137, 80]));
    match navigator.handle(host, &Interaction::Submit(event), now) {
        Ok(HandleOutcome::Started(navigation)) => navigation,
        other => panic!("upload was not intercepted: {other:?}"),
    }
}

fn poll(navigator: &mut Navigator<ScriptedExecutor>, host: &mut HeadlessHost, now: Instant) -> Vec<NavigationReport> {
    match navigator.poll(host, now) {
        Ok(value) => value,
        Err(error) => panic!("{error}"),
    }
}

fn single(reports: Vec<NavigationReport>) -> NavigationReport {
    match <[NavigationReport; 1]>::try_from(reports) {
        Ok([report]) => report,
        Err(reports) => panic!("expected one report, got {reports:?}"),
    }
}

#[test]
fn clicking_a_skin_patches_content_title_and_history() {
    let (mut navigator, mut host) = setup(NavigatorConfig::default());
    let start = Instant::now();
    let id = click(&mut navigator, &mut host, "five", start);

    let request = navigator.executor().request(id).cloned();
    assert_eq!(request.as_ref().map(|request| request.method()), Some(HttpMethod::Get));
    assert_eq!(request.map(|request| request.target().as_str().to_owned()).unwrap_or_default(), "http://localhost/skins/5");

    navigator
        .executor_mut()
        .respond(id, ok("http://localhost/skins/5", site_page("Skin 5", "Hi, Alex", "<h1>Skin 5</h1>")));
    let report = single(poll(&mut navigator, &mut host, start + ms(50)));

    let NavigationOutcome::Patched(patch) = report.outcome else {
        panic!("expected a patch");
    };
    assert_eq!(patch.history, HistoryDecision::Pushed(page("http://localhost/skins/5")));
    assert!(!report.showed_busy);
    assert_eq!(host.document().title(), "Skin 5");
    assert_eq!(content_text(&host), "Skin 5");
    assert_eq!(host.document().text_content(node(&host, "site-nav")), "Hi, Alex");
    assert_eq!(host.location().path(), "/skins/5");
    assert_eq!(host.history().len(), 2);
    assert_eq!(navigator.in_flight(), 0);
}

#[test]
fn each_link_navigation_adds_exactly_one_entry() {
    let (mut navigator, mut host) = setup(NavigatorConfig::default());
    let start = Instant::now();

    host.replace_document(sp_html::parse_document(&site_page(
        "Skins",
        "Guest",
        "<a id=\"next\" href=\"/skins/5\">next</a>",
    )));

    for (step, number) in [5_u64, 6, 7].into_iter().enumerate() {
        let now = start + ms(10 * step as u64);
        let id = click(&mut navigator, &mut host, "next", now);
        let next = format!("<a id=\"next\" href=\"/skins/{}\">next</a>", number + 1);
        let url = format!("http://localhost/skins/{number}");
        navigator
            .executor_mut()
            .respond(id, ok(&url, site_page(&format!("Skin {number}"), "Guest", &next)));
        let report = single(poll(&mut navigator, &mut host, now));
        assert!(matches!(report.outcome, NavigationOutcome::Patched(_)));
    }

    assert_eq!(host.history().len(), 4);
    assert_eq!(host.location().path(), "/skins/7");
    let pushes = host
        .actions()
        .iter()
        .filter(|action| matches!(action, HostAction::PushState { .. }))
        .count();
    assert_eq!(pushes, 3);
}

#[test]
fn popstate_reloads_regions_without_pushing() {
    let (mut navigator, mut host) = setup(NavigatorConfig::default());
    let start = Instant::now();
    let id = click(&mut navigator, &mut host, "five", start);
    navigator
        .executor_mut()
        .respond(id, ok("http://localhost/skins/5", site_page("Skin 5", "Guest", "<h1>Skin 5</h1>")));
    poll(&mut navigator, &mut host, start);
    host.take_actions();

    let Some(popstate) = host.back() else {
        panic!("history should allow going back");
    };
    let back = match navigator.handle(&mut host, &popstate, start + ms(10)) {
        Ok(HandleOutcome::Started(navigation)) => navigation,
        other => panic!("popstate was not handled: {other:?}"),
    };
    let request = navigator.executor().request(back).cloned();
    assert_eq!(request.as_ref().map(|request| request.push_history()), Some(false));

    navigator
        .executor_mut()
        .respond(back, ok("http://localhost/skins", site_page("Skins", "Guest", "<h1>All skins</h1>")));
    let report = single(poll(&mut navigator, &mut host, start + ms(20)));
    let NavigationOutcome::Patched(patch) = report.outcome else {
        panic!("expected a patch");
    };
    assert_eq!(patch.history, HistoryDecision::NotRequested);
    assert_eq!(host.history().len(), 2);
    assert_eq!(host.history().cursor(), 0);
    assert_eq!(host.document().title(), "Skins");
    assert!(host.actions().is_empty());
}

#[test]
fn multipart_upload_patches_without_history_or_busy_timer() {
    let (mut navigator, mut host) = setup(NavigatorConfig::default());
    let start = Instant::now();
    let id = upload(&mut navigator, &mut host, start);

    let Some(request) = navigator.executor().request(id).cloned() else {
        panic!("upload should be pending");
    };
    assert_eq!(request.method(), HttpMethod::Post);
    assert_eq!(request.target().path(), "/skins/upload");
    let wire = match request.to_http_request() {
        Ok(value) => value,
        Err(error) => panic!("{error}"),
    };
    let content_type = wire.header("Content-Type").unwrap_or_default();
    assert!(content_type.starts_with("multipart/form-data; boundary="));
    let body = String::from_utf8_lossy(&wire.body).into_owned();
    assert!(body.contains("filename=\"cape.png\""));
    assert!(body.contains("name=\"title\"\r\n\r\nCape\r\n"));

    // Forms never arm the loading timer.
    assert!(poll(&mut navigator, &mut host, start + ms(1_000)).is_empty());
    assert!(!is_busy(&host));

    navigator
        .executor_mut()
        .respond(id, ok("http://localhost/skins/upload", site_page("Uploaded", "Guest", "<p>Saved</p>")));
    let report = single(poll(&mut navigator, &mut host, start + ms(1_100)));
    let NavigationOutcome::Patched(patch) = report.outcome else {
        panic!("expected a patch");
    };
    assert_eq!(patch.history, HistoryDecision::NotRequested);
    assert_eq!(content_text(&host), "Saved");
    assert_eq!(host.location().path(), "/skins");
    assert_eq!(host.history().len(), 1);
}

#[test]
fn failed_uploads_fall_back_to_native_submission() {
    let failures = [
        (Err(FetchFailure::HttpStatus(500)), FallbackCause::HttpStatus(500)),
        (
            Err(FetchFailure::Network(SpliceError::new("net.transport.connect_failed", "refused"))),
            FallbackCause::Network("net.transport.connect_failed: refused".to_owned()),
        ),
        (
            ok("http://localhost/skins/upload", "<title>Maintenance</title><p>down</p>".to_owned()),
            FallbackCause::MissingRegion {
                region: "pjax-container".to_owned(),
                live: false,
            },
        ),
    ];

    for (failure, expected) in failures {
        let (mut navigator, mut host) = setup(NavigatorConfig::default());
        let start = Instant::now();
        let form = node(&host, "upload");
        let id = upload(&mut navigator, &mut host, start);
        navigator.executor_mut().respond(id, failure);

        let report = single(poll(&mut navigator, &mut host, start + ms(10)));
        let NavigationOutcome::NativeSubmission { form: submitted, cause } = report.outcome else {
            panic!("expected a native submission");
        };
        assert_eq!(submitted, form);
        assert_eq!(cause, expected);
        assert_eq!(
            host.actions(),
            &[HostAction::NativeSubmit {
                form,
                action: page("http://localhost/skins/upload"),
                method: HttpMethod::Post,
            }]
        );
        assert!(content_text(&host).contains("All skins"));
        assert_eq!(host.history().len(), 1);
    }
}

#[test]
fn form_submissions_never_add_history_entries() {
    const FORMS: &str = "<form id=\"search\" method=\"get\" action=\"/skins/search\">\
          <input name=\"q\" value=\"cape\"></form>\
        <form id=\"rate\" method=\"post\" action=\"/skins/5/rate\">\
          <input name=\"stars\" value=\"4\"></form>\
        <form id=\"again\" action=\"/skins/5/rate\"><input name=\"stars\" value=\"5\"></form>";

    let (mut navigator, mut host) = setup(NavigatorConfig::default());
    host.replace_document(sp_html::parse_document(&site_page("Skins", "Guest", FORMS)));
    let start = Instant::now();

    let submissions = [
        ("search", "http://localhost/skins/search?q=cape", HttpMethod::Get),
        ("rate", "http://localhost/skins/5/rate", HttpMethod::Post),
        ("again", "http://localhost/skins/5/rate", HttpMethod::Post),
        ("search", "http://localhost/skins/search?q=cape", HttpMethod::Get),
    ];
    for (step, (form, target, method)) in submissions.into_iter().enumerate() {
        let now = start + ms(10 * step as u64);
        let event = SubmitEvent::new(node(&host, form));
        let id = match navigator.handle(&mut host, &Interaction::Submit(event), now) {
            Ok(HandleOutcome::Started(navigation)) => navigation,
            other => panic!("#{form} was not intercepted: {other:?}"),
        };
        let request = navigator.executor().request(id).cloned();
        assert_eq!(request.as_ref().map(|request| request.method()), Some(method));
        assert_eq!(request.map(|request| request.target().as_str().to_owned()).unwrap_or_default(), target);

        navigator
            .executor_mut()
            .respond(id, ok(target, site_page(&format!("Result {step}"), "Guest", FORMS)));
        let report = single(poll(&mut navigator, &mut host, now));
        let NavigationOutcome::Patched(patch) = report.outcome else {
            panic!("expected a patch");
        };
        assert_eq!(patch.history, HistoryDecision::NotRequested);
    }

    assert_eq!(host.document().title(), "Result 3");
    assert_eq!(host.history().len(), 1);
    assert_eq!(host.location().path(), "/skins");
    assert!(
        !host
            .actions()
            .iter()
            .any(|action| matches!(action, HostAction::PushState { .. }))
    );
}

#[test]
fn failed_upload_hard_navigates_once_its_form_was_patched_away() {
    let (mut navigator, mut host) = setup(NavigatorConfig::default());
    let start = Instant::now();
    let form = node(&host, "upload");
    let upload_id = upload(&mut navigator, &mut host, start);
    let link_id = click(&mut navigator, &mut host, "five", start + ms(5));

    navigator
        .executor_mut()
        .respond(link_id, ok("http://localhost/skins/5", site_page("Skin 5", "Guest", "<h1>Skin 5</h1>")));
    let patched = single(poll(&mut navigator, &mut host, start + ms(10)));
    assert!(matches!(patched.outcome, NavigationOutcome::Patched(_)));
    assert!(!host.document().is_connected(form));
    host.take_actions();

    navigator.executor_mut().respond(upload_id, Err(FetchFailure::HttpStatus(500)));
    let report = single(poll(&mut navigator, &mut host, start + ms(20)));
    assert_eq!(
        report.outcome,
        NavigationOutcome::HardNavigation {
            url: page("http://localhost/skins/upload"),
            cause: FallbackCause::HttpStatus(500),
        }
    );
    assert_eq!(host.actions(), &[HostAction::Assign(page("http://localhost/skins/upload"))]);
}

#[test]
fn failed_links_hard_navigate_to_the_requested_url() {
    let failures = [
        Err(FetchFailure::HttpStatus(500)),
        Err(FetchFailure::Network(SpliceError::new("net.transport.connect_failed", "refused"))),
        ok("http://localhost/skins/5", "<title>Maintenance</title><p>down</p>".to_owned()),
    ];

    for failure in failures {
        let (mut navigator, mut host) = setup(NavigatorConfig::default());
        let start = Instant::now();
        let id = click(&mut navigator, &mut host, "five", start);
        navigator.executor_mut().respond(id, failure);

        let report = single(poll(&mut navigator, &mut host, start + ms(10)));
        let NavigationOutcome::HardNavigation { url, cause } = report.outcome else {
            panic!("expected a hard navigation");
        };
        assert_eq!(url, page("http://localhost/skins/5"));
        assert!(matches!(
            cause,
            FallbackCause::HttpStatus(500) | FallbackCause::Network(_) | FallbackCause::MissingRegion { live: false, .. }
        ));
        assert_eq!(host.actions(), &[HostAction::Assign(page("http://localhost/skins/5"))]);
        assert_eq!(host.document().title(), "Skins");
        assert_eq!(host.history().len(), 1);
    }
}

#[test]
fn unexpected_failures_reload_the_page() {
    let (mut navigator, mut host) = setup(NavigatorConfig::default());
    let start = Instant::now();
    let id = click(&mut navigator, &mut host, "five", start);
    navigator
        .executor_mut()
        .respond(id, Err(FetchFailure::Unexpected("worker panicked".to_owned())));

    let report = single(poll(&mut navigator, &mut host, start));
    assert_eq!(
        report.outcome,
        NavigationOutcome::Reloaded {
            reason: "worker panicked".to_owned()
        }
    );
    assert_eq!(host.actions(), &[HostAction::Reload(page("http://localhost/skins"))]);
}

#[test]
fn spawn_failure_resolves_as_reload() {
    let (mut navigator, mut host) = setup(NavigatorConfig::default());
    navigator.executor_mut().fail_spawn = true;
    let start = Instant::now();
    click(&mut navigator, &mut host, "five", start);

    let report = single(poll(&mut navigator, &mut host, start));
    assert!(matches!(report.outcome, NavigationOutcome::Reloaded { .. }));
    assert_eq!(navigator.in_flight(), 0);
}

#[test]
fn fast_responses_never_show_the_busy_class() {
    let (mut navigator, mut host) = setup(NavigatorConfig::default());
    let start = Instant::now();
    let id = click(&mut navigator, &mut host, "five", start);

    assert!(poll(&mut navigator, &mut host, start + ms(200)).is_empty());
    assert!(!is_busy(&host));
    navigator
        .executor_mut()
        .respond(id, ok("http://localhost/skins/5", site_page("Skin 5", "Guest", "5")));

    // Completions drain before the timer is checked, even when polled past the deadline.
    let report = single(poll(&mut navigator, &mut host, start + ms(400)));
    assert!(!report.showed_busy);
    assert!(!is_busy(&host));
    assert!(poll(&mut navigator, &mut host, start + ms(1_000)).is_empty());
    assert!(!is_busy(&host));
}

#[test]
fn slow_responses_show_busy_until_patched() {
    let (mut navigator, mut host) = setup(NavigatorConfig::default());
    let start = Instant::now();
    let id = click(&mut navigator, &mut host, "five", start);

    poll(&mut navigator, &mut host, start + ms(299));
    assert!(!is_busy(&host));
    poll(&mut navigator, &mut host, start + ms(300));
    assert!(is_busy(&host));

    navigator
        .executor_mut()
        .respond(id, ok("http://localhost/skins/5", site_page("Skin 5", "Guest", "5")));
    let report = single(poll(&mut navigator, &mut host, start + ms(900)));
    assert!(report.showed_busy);
    assert!(!is_busy(&host));
}

#[test]
fn busy_stays_while_another_navigation_is_timed_out() {
    let (mut navigator, mut host) = setup(NavigatorConfig::default());
    let start = Instant::now();
    let first = click(&mut navigator, &mut host, "five", start);
    poll(&mut navigator, &mut host, start + ms(300));
    assert!(is_busy(&host));

    let second = click(&mut navigator, &mut host, "six", start + ms(350));
    navigator
        .executor_mut()
        .respond(second, ok("http://localhost/skins/6", site_page("Skin 6", "Guest", "6")));
    let report = single(poll(&mut navigator, &mut host, start + ms(400)));
    assert_eq!(report.navigation, second);
    assert!(is_busy(&host));

    navigator
        .executor_mut()
        .respond(first, ok("http://localhost/skins/5", site_page("Skin 5", "Guest", "5")));
    let report = single(poll(&mut navigator, &mut host, start + ms(500)));
    assert_eq!(report.navigation, first);
    assert!(report.showed_busy);
    assert!(!is_busy(&host));
}

#[test]
fn tolerated_overlap_applies_completions_in_arrival_order() {
    let (mut navigator, mut host) = setup(NavigatorConfig::default());
    let start = Instant::now();
    let first = click(&mut navigator, &mut host, "five", start);
    let second = click(&mut navigator, &mut host, "six", start + ms(10));

    navigator
        .executor_mut()
        .respond(second, ok("http://localhost/skins/6", site_page("Skin 6", "Guest", "6")));
    navigator
        .executor_mut()
        .respond(first, ok("http://localhost/skins/5", site_page("Skin 5", "Guest", "5")));
    let reports = poll(&mut navigator, &mut host, start + ms(20));

    assert_eq!(reports.iter().map(|report| report.navigation).collect::<Vec<_>>(), vec![second, first]);
    assert_eq!(host.document().title(), "Skin 5");
    assert_eq!(host.location().path(), "/skins/5");
    assert_eq!(host.history().len(), 3);
}

#[test]
fn latest_wins_reports_stale_completions_as_superseded() {
    let config = NavigatorConfig {
        overlap: OverlapPolicy::LatestWins,
        ..NavigatorConfig::default()
    };
    let (mut navigator, mut host) = setup(config);
    let start = Instant::now();
    let first = click(&mut navigator, &mut host, "five", start);
    let second = click(&mut navigator, &mut host, "six", start + ms(10));

    navigator
        .executor_mut()
        .respond(second, ok("http://localhost/skins/6", site_page("Skin 6", "Guest", "6")));
    navigator
        .executor_mut()
        .respond(first, ok("http://localhost/skins/5", site_page("Skin 5", "Guest", "5")));
    let reports = poll(&mut navigator, &mut host, start + ms(20));

    assert_eq!(reports.len(), 2);
    assert!(matches!(reports[0].outcome, NavigationOutcome::Patched(_)));
    assert_eq!(reports[1].navigation, first);
    assert_eq!(reports[1].outcome, NavigationOutcome::Superseded);
    assert_eq!(host.document().title(), "Skin 6");
    assert_eq!(host.history().len(), 2);
}

#[test]
fn external_and_logout_links_are_never_intercepted() {
    let (mut navigator, mut host) = setup(NavigatorConfig::default());
    let now = Instant::now();

    let external = Interaction::Click(ClickEvent::primary(node(&host, "external")));
    assert_eq!(
        navigator.handle(&mut host, &external, now),
        Ok(HandleOutcome::Native(Ineligible::CrossOrigin {
            origin: "https://external.example".to_owned()
        }))
    );
    let logout = Interaction::Click(ClickEvent::primary(node(&host, "logout")));
    assert_eq!(
        navigator.handle(&mut host, &logout, now),
        Ok(HandleOutcome::Native(Ineligible::HardNavigationPath("/logout".to_owned())))
    );
    assert!(navigator.executor().pending().is_empty());
    assert_eq!(navigator.in_flight(), 0);
}

#[test]
fn confirmed_submission_goes_through_the_pipeline() {
    let (mut navigator, mut host) = setup(NavigatorConfig::default());
    let now = Instant::now();
    let handle = ConfirmationHandle::new(node(&host, "upload"));

    let outcome = handle.confirm(&mut navigator, &mut host, now);
    let Ok(HandleOutcome::Started(id)) = &outcome else {
        panic!("confirmed submit should be intercepted: {outcome:?}");
    };
    let request = navigator.executor().request(*id).cloned();
    assert_eq!(request.map(|request| request.is_form_submission()), Some(true));
    assert!(host.actions().is_empty());
}

#[test]
fn confirmed_cross_origin_form_submits_natively() {
    let (mut navigator, mut host) = setup(NavigatorConfig::default());
    let form = node(&host, "pay");
    let handle = ConfirmationHandle::new(form);

    let outcome = handle.confirm(&mut navigator, &mut host, Instant::now());
    assert!(matches!(outcome, Ok(HandleOutcome::Native(Ineligible::CrossOrigin { .. }))));
    assert_eq!(
        host.actions(),
        &[HostAction::NativeSubmit {
            form,
            action: page("https://pay.example/checkout"),
            method: HttpMethod::Post,
        }]
    );
}

#[test]
fn cancelled_confirmation_does_nothing() {
    let (navigator, host) = setup(NavigatorConfig::default());
    let form = node(&host, "upload");
    assert_eq!(ConfirmationHandle::new(form).cancel(), form);
    assert_eq!(navigator.in_flight(), 0);
    assert!(host.actions().is_empty());
}
