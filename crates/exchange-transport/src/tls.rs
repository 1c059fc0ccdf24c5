//! TLS configuration: session resumption and the playground's
//! insecure-skip-verify escape hatch.

use std::sync::Arc;

use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::client::Resumption;
use rustls::{ClientConfig, DigitallySignedStruct, SignatureScheme};

/// Accepts any server certificate. Only ever wired up when
/// `EXCHANGE_DSPIO_INSECURE_SKIP_VERIFY=true` — this is a playground talking
/// to a local mock bidder, not a production exchange.
struct NoCertVerification(Arc<rustls::crypto::CryptoProvider>);

impl std::fmt::Debug for NoCertVerification {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NoCertVerification").finish()
    }
}

impl ServerCertVerifier for NoCertVerification {
    fn verify_server_cert(
        &self,
        _end_entity: &rustls::pki_types::CertificateDer<'_>,
        _intermediates: &[rustls::pki_types::CertificateDer<'_>],
        _server_name: &rustls::pki_types::ServerName<'_>,
        _ocsp_response: &[u8],
        _now: rustls::pki_types::UnixTime,
    ) -> Result<ServerCertVerified, rustls::Error> {
        Ok(ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &rustls::pki_types::CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        rustls::crypto::verify_tls12_signature(
            message,
            cert,
            dss,
            &self.0.signature_verification_algorithms,
        )
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &rustls::pki_types::CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        rustls::crypto::verify_tls13_signature(
            message,
            cert,
            dss,
            &self.0.signature_verification_algorithms,
        )
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.0.signature_verification_algorithms.supported_schemes()
    }
}

/// Builds the `rustls::ClientConfig` shared by every dial: a fixed-capacity
/// session cache for TLS resumption, and optionally disabled certificate
/// verification.
pub(crate) fn build_client_config(
    insecure_skip_verify: bool,
    session_cache_capacity: usize,
) -> ClientConfig {
    let provider = Arc::new(rustls::crypto::ring::default_provider());

    let mut config = if insecure_skip_verify {
        ClientConfig::builder_with_provider(provider.clone())
            .with_safe_default_protocol_versions()
            .expect("rustls protocol versions")
            .dangerous()
            .with_custom_certificate_verifier(Arc::new(NoCertVerification(provider)))
            .with_no_client_auth()
    } else {
        let roots = rustls_native_certs_roots();
        ClientConfig::builder_with_provider(provider)
            .with_safe_default_protocol_versions()
            .expect("rustls protocol versions")
            .with_root_certificates(roots)
            .with_no_client_auth()
    };

    config.resumption = Resumption::in_memory_sessions(session_cache_capacity);
    config
}

fn rustls_native_certs_roots() -> rustls::RootCertStore {
    let mut roots = rustls::RootCertStore::empty();
    match rustls_native_certs::load_native_certs().certs.into_iter().try_for_each(|cert| {
        roots.add(cert)
    }) {
        Ok(()) => {}
        Err(err) => {
            tracing::warn!(error = %err, "failed to load native root certificates");
        }
    }
    roots
}
