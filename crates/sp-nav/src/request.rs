//! Navigation request descriptors.

use core::fmt;
use sp_core::SpliceResult;
use sp_dom::NodeId;
use sp_net::FormData;
use sp_net::FormEncoding;
use sp_net::HttpMethod;
use sp_net::HttpRequest;
use sp_net::PageUrl;

/// Identifies one navigation attempt for the lifetime of a navigator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NavigationId(pub(crate) u64);

impl NavigationId {
    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for NavigationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "nav-{}", self.0)
    }
}

/// What triggered a navigation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestOrigin {
    Link,
    Form,
    Traversal,
    Programmatic,
}

/// Immutable description of one partial-page request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NavigationRequest {
    target: PageUrl,
    method: HttpMethod,
    body: Option<FormData>,
    encoding: FormEncoding,
    origin: RequestOrigin,
    push_history: bool,
    form: Option<NodeId>,
}

impl NavigationRequest {
    /// GET for an intercepted link; adds a history entry.
    pub fn link(target: PageUrl) -> Self {
        Self::get(target, RequestOrigin::Link, true)
    }

    /// GET replaying an existing history entry.
    pub fn traversal(target: PageUrl) -> Self {
        Self::get(target, RequestOrigin::Traversal, false)
    }

    pub fn programmatic(target: PageUrl, push_history: bool) -> Self {
        Self::get(target, RequestOrigin::Programmatic, push_history)
    }

    /// Form submission. `GET` forms carry their fields in the query string instead of a body.
    pub fn form_submission(
        action: PageUrl,
        method: HttpMethod,
        data: FormData,
        encoding: FormEncoding,
        form: NodeId,
    ) -> Self {
        let (target, body) = if method.allows_body() {
            (action.without_fragment(), Some(data))
        } else {
            (action.with_query(&data.to_urlencoded()), None)
        };

        Self {
            target,
            method,
            body,
            encoding,
            origin: RequestOrigin::Form,
            push_history: false,
            form: Some(form),
        }
    }

    fn get(target: PageUrl, origin: RequestOrigin, push_history: bool) -> Self {
        Self {
            target,
            method: HttpMethod::Get,
            body: None,
            encoding: FormEncoding::UrlEncoded,
            origin,
            push_history,
            form: None,
        }
    }

    pub fn target(&self) -> &PageUrl {
        &self.target
    }

    pub fn method(&self) -> HttpMethod {
        self.method
    }

    pub fn body(&self) -> Option<&FormData> {
        self.body.as_ref()
    }

    pub fn encoding(&self) -> FormEncoding {
        self.encoding
    }

    pub fn origin(&self) -> RequestOrigin {
        self.origin
    }

    pub fn is_form_submission(&self) -> bool {
        self.origin == RequestOrigin::Form
    }

    pub fn push_history(&self) -> bool {
        self.push_history
    }

    /// Form element that produced this request, used for native-submission fallback.
    pub fn form(&self) -> Option<NodeId> {
        self.form
    }

    /// Wire request. The body's `Content-Type` is derived from the encoding; multipart
    /// boundaries are generated together with the header.
    pub fn to_http_request(&self) -> SpliceResult<HttpRequest> {
        let builder = HttpRequest::builder(self.method, self.target.clone());
        match &self.body {
            Some(data) => {
                let encoded = data.encode(self.encoding);
                builder
                    .header("Content-Type", &encoded.content_type)?
                    .body(encoded.bytes)
                    .build()
            }
            None => builder.build(),
        }
    }
}
