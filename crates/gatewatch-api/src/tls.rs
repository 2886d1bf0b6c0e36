// Gateway TLS verification
//
// The gateway presents a self-signed certificate with a fixed identity,
// so chain validation is skipped entirely. Handshake signatures are still
// checked against the presented key. Each handshake also inspects the
// subject CN: a relay in front of the gateway announces itself there.

use std::sync::Arc;

use arc_swap::ArcSwapOption;
use rustls::DigitallySignedStruct;
use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::crypto::{CryptoProvider, verify_tls12_signature, verify_tls13_signature};
use rustls_pki_types::{CertificateDer, ServerName, UnixTime};
use tracing::{debug, trace};

/// Accepts any server certificate and records the upstream identity
/// announced in its subject common name.
#[derive(Debug)]
pub(crate) struct GatewayCertVerifier {
    provider: Arc<CryptoProvider>,
    upstream: Arc<ArcSwapOption<String>>,
}

impl GatewayCertVerifier {
    pub(crate) fn new(provider: Arc<CryptoProvider>, upstream: Arc<ArcSwapOption<String>>) -> Self {
        Self { provider, upstream }
    }
}

impl ServerCertVerifier for GatewayCertVerifier {
    fn verify_server_cert(
        &self,
        end_entity: &CertificateDer<'_>,
        _intermediates: &[CertificateDer<'_>],
        server_name: &ServerName<'_>,
        _ocsp_response: &[u8],
        _now: UnixTime,
    ) -> Result<ServerCertVerified, rustls::Error> {
        let common_name = subject_common_name(end_entity.as_ref());
        trace!(?server_name, ?common_name, "accepting gateway certificate");

        let upstream = common_name.as_deref().and_then(upstream_from_common_name);
        if let Some(ref addr) = upstream {
            debug!(upstream = %addr, "gateway certificate announces a relay");
        }
        self.upstream.store(upstream.map(Arc::new));

        Ok(ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        verify_tls12_signature(
            message,
            cert,
            dss,
            &self.provider.signature_verification_algorithms,
        )
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        verify_tls13_signature(
            message,
            cert,
            dss,
            &self.provider.signature_verification_algorithms,
        )
    }

    fn supported_verify_schemes(&self) -> Vec<rustls::SignatureScheme> {
        self.provider
            .signature_verification_algorithms
            .supported_schemes()
    }
}

/// Extract the first subject CN from a DER certificate.
fn subject_common_name(der: &[u8]) -> Option<String> {
    let (_, cert) = x509_parser::parse_x509_certificate(der).ok()?;
    let cn = cert.subject().iter_common_name().next()?;
    cn.as_str().ok().map(str::to_owned)
}

/// Parse a relay directive (`relay:<addr>` or `proxy:<addr>`) from a CN.
///
/// Anything else, including a plain hostname, yields `None`.
pub fn upstream_from_common_name(common_name: &str) -> Option<String> {
    let (directive, address) = common_name.split_once(':')?;
    let directive = directive.trim();
    if !directive.eq_ignore_ascii_case("relay") && !directive.eq_ignore_ascii_case("proxy") {
        return None;
    }
    let address = address.trim();
    (!address.is_empty()).then(|| address.to_owned())
}

#[cfg(test)]
mod tests {
    use super::upstream_from_common_name;

    #[test]
    fn relay_directive_is_recognized() {
        assert_eq!(
            upstream_from_common_name("relay:10.0.0.7"),
            Some("10.0.0.7".into())
        );
        assert_eq!(
            upstream_from_common_name("PROXY: 192.168.1.20"),
            Some("192.168.1.20".into())
        );
    }

    #[test]
    fn plain_names_carry_no_upstream() {
        assert_eq!(upstream_from_common_name("powerwall"), None);
        assert_eq!(upstream_from_common_name("teg:1234"), None);
        assert_eq!(upstream_from_common_name("relay:"), None);
    }
}
