//! TLS upgrade for HTTPS page loads, backed by rustls.

use crate::transport::BoxedIoStream;
use sp_core::SpliceError;
use sp_core::SpliceResult;
use std::net::TcpStream;

#[cfg(feature = "tls-rustls")]
use rustls::ClientConfig;
#[cfg(feature = "tls-rustls")]
use rustls::RootCertStore;
#[cfg(feature = "tls-rustls")]
use rustls::pki_types::ServerName;
#[cfg(feature = "tls-rustls")]
use std::sync::Arc;

/// Controls which trust anchors are used for server certificate verification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TrustStoreMode {
    /// Embedded Mozilla/WebPKI roots only.
    #[default]
    WebPkiOnly,
    /// WebPKI roots merged with operating-system roots (enterprise/local CAs).
    WebPkiAndOs,
}

impl TrustStoreMode {
    pub fn from_token(token: &str) -> Option<Self> {
        match token.trim().to_ascii_lowercase().as_str() {
            "webpki" | "webpki-only" => Some(Self::WebPkiOnly),
            "os" | "webpki-and-os" => Some(Self::WebPkiAndOs),
            _ => None,
        }
    }
}

/// Upgrades a connected TCP stream to TLS.
pub trait TlsConnector {
    fn connect_tls(&self, stream: TcpStream, server_name: &str) -> SpliceResult<BoxedIoStream>;
}

/// rustls connector with a prebuilt client configuration.
#[derive(Debug, Clone)]
pub struct RustlsConnector {
    #[cfg(feature = "tls-rustls")]
    config: Arc<ClientConfig>,
}

#[cfg(feature = "tls-rustls")]
impl RustlsConnector {
    pub fn new(mode: TrustStoreMode) -> SpliceResult<Self> {
        let provider = Arc::new(rustls::crypto::aws_lc_rs::default_provider());
        let mut config = ClientConfig::builder_with_provider(provider)
            .with_safe_default_protocol_versions()
            .map_err(|error| {
                SpliceError::new(
                    "net.tls.config_versions_invalid",
                    format!("failed to configure TLS protocol versions: {error}"),
                )
            })?
            .with_root_certificates(root_store(mode)?)
            .with_no_client_auth();
        config.alpn_protocols = vec![b"http/1.1".to_vec()];

        Ok(Self {
            config: Arc::new(config),
        })
    }
}

#[cfg(feature = "tls-rustls")]
impl TlsConnector for RustlsConnector {
    fn connect_tls(&self, mut stream: TcpStream, server_name: &str) -> SpliceResult<BoxedIoStream> {
        use rustls::ClientConnection;
        use rustls::StreamOwned;

        let name = ServerName::try_from(server_name.to_owned()).map_err(|error| {
            SpliceError::new(
                "net.tls.server_name_invalid",
                format!("invalid TLS server name `{server_name}`: {error}"),
            )
        })?;

        let mut connection = ClientConnection::new(self.config.clone(), name).map_err(|error| {
            SpliceError::new(
                "net.tls.connection_init_failed",
                format!("failed to initialize TLS connection for `{server_name}`: {error}"),
            )
        })?;

        connection.complete_io(&mut stream).map_err(|error| {
            SpliceError::new(
                "net.tls.handshake_failed",
                format!("TLS handshake failed for `{server_name}`: {error}"),
            )
        })?;

        Ok(Box::new(StreamOwned::new(connection, stream)))
    }
}

#[cfg(feature = "tls-rustls")]
fn root_store(mode: TrustStoreMode) -> SpliceResult<RootCertStore> {
    let mut roots = RootCertStore::empty();
    roots.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());

    if mode == TrustStoreMode::WebPkiAndOs {
        let native = rustls_native_certs::load_native_certs();
        if native.certs.is_empty() && !native.errors.is_empty() {
            let details = native
                .errors
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join("; ");
            return Err(SpliceError::new(
                "net.tls.os_roots_load_failed",
                format!("failed to load operating-system roots: {details}"),
            ));
        }

        // Unparseable OS certificates are skipped; the WebPKI set still applies.
        let (added, ignored) = roots.add_parsable_certificates(native.certs);
        tracing::debug!(added, ignored, "merged operating-system trust anchors");
    }

    if roots.is_empty() {
        return Err(SpliceError::new(
            "net.tls.root_store_empty",
            "no trust anchors available for TLS verification",
        ));
    }

    Ok(roots)
}

#[cfg(not(feature = "tls-rustls"))]
impl RustlsConnector {
    pub fn new(_mode: TrustStoreMode) -> SpliceResult<Self> {
        Ok(Self {})
    }
}

#[cfg(not(feature = "tls-rustls"))]
impl TlsConnector for RustlsConnector {
    fn connect_tls(&self, _stream: TcpStream, _server_name: &str) -> SpliceResult<BoxedIoStream> {
        Err(SpliceError::new(
            "net.tls.backend_unavailable",
            "rustls backend is disabled for this build; enable `sp-net/tls-rustls`",
        ))
    }
}
