//! Page loading off the document thread.

use crate::request::NavigationId;
use crate::request::NavigationRequest;
use core::fmt;
use sp_core::SpliceError;
use sp_core::SpliceResult;
use sp_net::ClientConfig;
use sp_net::CookieJar;
use sp_net::Http11Client;
use sp_net::PageUrl;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::mpsc::Sender;
use std::thread;

const NAVIGATION_THREAD_STACK_SIZE: usize = 4 * 1024 * 1024;

/// Successful response, already decoded to text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedDocument {
    /// URL after redirects.
    pub final_url: PageUrl,
    pub status: u16,
    pub content_type: String,
    pub body: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchFailure {
    /// The request never produced a response.
    Network(SpliceError),
    /// Non-2xx final status.
    HttpStatus(u16),
    /// The worker itself failed (panic, request construction).
    Unexpected(String),
}

impl fmt::Display for FetchFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Network(error) => write!(f, "network error: {error}"),
            Self::HttpStatus(status) => write!(f, "http status {status}"),
            Self::Unexpected(message) => write!(f, "unexpected failure: {message}"),
        }
    }
}

/// Message a worker sends back to the navigator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchCompletion {
    pub navigation: NavigationId,
    pub result: Result<FetchedDocument, FetchFailure>,
}

/// Performs one request to completion. Called from worker threads.
pub trait PageLoader: Send + Sync {
    fn load(&self, request: &NavigationRequest) -> Result<FetchedDocument, FetchFailure>;
}

/// Starts fetches and reports their completions on the given channel.
pub trait FetchExecutor {
    fn spawn(
        &mut self,
        navigation: NavigationId,
        request: NavigationRequest,
        completions: Sender<FetchCompletion>,
    ) -> SpliceResult<()>;
}

/// Blocking HTTP/1.1 loader sharing one cookie jar across requests.
#[derive(Debug, Clone)]
pub struct HttpPageLoader {
    config: ClientConfig,
    cookies: Arc<Mutex<CookieJar>>,
}

impl HttpPageLoader {
    pub fn new(config: ClientConfig) -> SpliceResult<Self> {
        config.validate()?;
        Ok(Self {
            config,
            cookies: Arc::new(Mutex::new(CookieJar::new())),
        })
    }

    pub fn with_cookie_jar(mut self, cookies: Arc<Mutex<CookieJar>>) -> Self {
        self.cookies = cookies;
        self
    }

    pub fn cookies(&self) -> Arc<Mutex<CookieJar>> {
        Arc::clone(&self.cookies)
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }
}

impl PageLoader for HttpPageLoader {
    fn load(&self, request: &NavigationRequest) -> Result<FetchedDocument, FetchFailure> {
        let wire = request
            .to_http_request()
            .map_err(|error| FetchFailure::Unexpected(error.to_string()))?;
        let client = Http11Client::new(self.config.clone())
            .map_err(FetchFailure::Network)?
            .with_cookie_jar(Arc::clone(&self.cookies));

        let page = client.fetch(wire).map_err(FetchFailure::Network)?;
        let status = page.response.status.as_u16();
        if !page.response.status.is_success() {
            return Err(FetchFailure::HttpStatus(status));
        }

        let content_type = page.response.content_type().to_owned();
        let body = sp_html::decode_text_response(&page.response.body, &content_type);
        Ok(FetchedDocument {
            final_url: page.final_url,
            status,
            content_type,
            body,
        })
    }
}

/// One named worker thread per navigation.
#[derive(Clone)]
pub struct ThreadedExecutor {
    loader: Arc<dyn PageLoader>,
}

impl ThreadedExecutor {
    pub fn new(loader: impl PageLoader + 'static) -> Self {
        Self {
            loader: Arc::new(loader),
        }
    }
}

impl fmt::Debug for ThreadedExecutor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ThreadedExecutor").finish_non_exhaustive()
    }
}

impl FetchExecutor for ThreadedExecutor {
    fn spawn(
        &mut self,
        navigation: NavigationId,
        request: NavigationRequest,
        completions: Sender<FetchCompletion>,
    ) -> SpliceResult<()> {
        let loader = Arc::clone(&self.loader);
        let job = move || {
            let outcome = std::panic::catch_unwind(AssertUnwindSafe(|| loader.load(&request)));
            let result = outcome.unwrap_or_else(|panic| Err(FetchFailure::Unexpected(panic_message(panic.as_ref()))));
            // The navigator may be gone; nobody is left to care.
            let _ = completions.send(FetchCompletion { navigation, result });
        };

        thread::Builder::new()
            .name("splice-nav".to_owned())
            .stack_size(NAVIGATION_THREAD_STACK_SIZE)
            .spawn(job)
            .map(|_| ())
            .map_err(|error| {
                SpliceError::new(
                    "nav.fetch.spawn_failed",
                    format!("failed to spawn navigation worker for {navigation}: {error}"),
                )
            })
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_owned()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "navigation worker panicked".to_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::FetchExecutor;
    use super::FetchFailure;
    use super::FetchedDocument;
    use super::HttpPageLoader;
    use super::PageLoader;
    use super::ThreadedExecutor;
    use super::panic_message;
    use crate::request::NavigationId;
    use crate::request::NavigationRequest;
    use sp_net::ClientConfig;
    use sp_net::PageUrl;
    use std::io::Read;
    use std::io::Write;
    use std::net::TcpListener;
    use std::sync::mpsc;
    use std::thread;
    use std::time::Duration;

    struct PanickingLoader;

    impl PageLoader for PanickingLoader {
        fn load(&self, _request: &NavigationRequest) -> Result<FetchedDocument, FetchFailure> {
            panic!("parser exploded");
        }
    }

    struct EchoLoader;

    impl PageLoader for EchoLoader {
        fn load(&self, request: &NavigationRequest) -> Result<FetchedDocument, FetchFailure> {
            Ok(FetchedDocument {
                final_url: request.target().clone(),
                status: 200,
                content_type: "text/html".to_owned(),
                body: format!("<title>{}</title>", request.target().path()),
            })
        }
    }

    fn page(input: &str) -> PageUrl {
        match PageUrl::parse(input) {
            Ok(value) => value,
            Err(error) => panic!("{error}"),
        }
    }

    fn serve_once(response: &'static str) -> u16 {
        let listener = match TcpListener::bind("127.0.0.1:0") {
            Ok(listener) => listener,
            Err(error) => panic!("{error}"),
        };
        let port = listener.local_addr().map(|addr| addr.port()).unwrap_or_default();
        thread::spawn(move || {
            let Ok((mut stream, _)) = listener.accept() else {
                return;
            };
            let mut head = Vec::new();
            let mut byte = [0_u8; 1];
            while !head.ends_with(b"\r\n\r\n") {
                match stream.read(&mut byte) {
                    Ok(1) => head.push(byte[0]),
                    _ => break,
                }
            }
            let _ = stream.write_all(response.as_bytes());
        });
        port
    }

    fn loader() -> HttpPageLoader {
        match HttpPageLoader::new(ClientConfig::default()) {
            Ok(value) => value,
            Err(error) => panic!("{error}"),
        }
    }

    #[test]
    fn worker_reports_completion_with_its_id() {
        let mut executor = ThreadedExecutor::new(EchoLoader);
        let (sender, receiver) = mpsc::channel();
        let request = NavigationRequest::link(page("http://localhost/skins/5"));
        assert!(executor.spawn(NavigationId(4), request, sender).is_ok());

        let completion = match receiver.recv_timeout(Duration::from_secs(5)) {
            Ok(value) => value,
            Err(error) => panic!("{error}"),
        };
        assert_eq!(completion.navigation, NavigationId(4));
        assert_eq!(completion.result.map(|page| page.body), Ok("<title>/skins/5</title>".to_owned()));
    }

    #[test]
    fn worker_panic_becomes_unexpected_failure() {
        let mut executor = ThreadedExecutor::new(PanickingLoader);
        let (sender, receiver) = mpsc::channel();
        let request = NavigationRequest::link(page("http://localhost/"));
        assert!(executor.spawn(NavigationId(1), request, sender).is_ok());

        let completion = match receiver.recv_timeout(Duration::from_secs(5)) {
            Ok(value) => value,
            Err(error) => panic!("{error}"),
        };
        assert_eq!(
            completion.result,
            Err(FetchFailure::Unexpected("parser exploded".to_owned()))
        );
    }

    #[test]
    fn panic_payloads_keep_their_message() {
        let formatted: Box<dyn std::any::Any + Send> = Box::new(format!("status {}", 7));
        assert_eq!(panic_message(formatted.as_ref()), "status 7");

        let opaque: Box<dyn std::any::Any + Send> = Box::new(7_u8);
        assert_eq!(panic_message(opaque.as_ref()), "navigation worker panicked");
    }

    #[test]
    fn http_loader_decodes_successful_page() {
        let port = serve_once(
            "HTTP/1.1 200 OK\r\nContent-Type: text/html; charset=utf-8\r\nContent-Length: 22\r\n\r\n<title>Skins</title>\r\n",
        );
        let url = page(&format!("http://127.0.0.1:{port}/skins"));
        let fetched = loader().load(&NavigationRequest::link(url.clone()));
        let fetched = match fetched {
            Ok(value) => value,
            Err(error) => panic!("{error}"),
        };
        assert_eq!(fetched.final_url, url);
        assert_eq!(fetched.status, 200);
        assert_eq!(fetched.body, "<title>Skins</title>\r\n");
    }

    #[test]
    fn http_error_status_is_a_failure() {
        let port = serve_once("HTTP/1.1 500 Internal Server Error\r\nContent-Length: 4\r\n\r\noops");
        let url = page(&format!("http://127.0.0.1:{port}/skins/upload"));
        assert_eq!(
            loader().load(&NavigationRequest::link(url)),
            Err(FetchFailure::HttpStatus(500))
        );
    }

    #[test]
    fn refused_connection_is_a_network_failure() {
        let port = {
            let listener = match TcpListener::bind("127.0.0.1:0") {
                Ok(listener) => listener,
                Err(error) => panic!("{error}"),
            };
            listener.local_addr().map(|addr| addr.port()).unwrap_or_default()
        };
        let url = page(&format!("http://127.0.0.1:{port}/"));
        assert!(matches!(
            loader().load(&NavigationRequest::link(url)),
            Err(FetchFailure::Network(_))
        ));
    }
}
