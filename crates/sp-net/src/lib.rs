//! Networking for page loads: URL model, HTTP messages, form bodies, cookies, and a
//! blocking HTTP/1.1 client.

pub mod client;
pub mod cookies;
pub mod dns;
pub mod form;
pub mod http;
pub mod tls;
pub mod transport;
pub mod url;

pub use client::ClientConfig;
pub use client::FetchedPage;
pub use client::Http11Client;
pub use cookies::CookieJar;
pub use form::EncodedBody;
pub use form::FilePart;
pub use form::FormData;
pub use form::FormEncoding;
pub use form::FormValue;
pub use http::Header;
pub use http::HttpMethod;
pub use http::HttpRequest;
pub use http::HttpResponse;
pub use http::HttpStatusCode;
pub use tls::TrustStoreMode;
pub use url::PageUrl;
pub use url::Scheme;
