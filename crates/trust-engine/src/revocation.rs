//! Best-effort revocation probing.
//!
//! OCSP first when the leaf names a responder and the issuer certificate is
//! available, then CRL distribution points. Only a positive finding marks a
//! certificate revoked; unreachable responders, parse failures, and unknown
//! statuses are all inconclusive and therefore non-fatal.
//!
//! The OCSP request and response are tiny fixed shapes, encoded and decoded
//! here directly; no crate in the stack ships an OCSP codec.

use std::time::Duration;

use async_trait::async_trait;
use sha1::{Digest, Sha1};
use tracing::{debug, warn};
use x509_parser::certificate::X509Certificate;
use x509_parser::extensions::{DistributionPointName, GeneralName, ParsedExtension};
use x509_parser::prelude::FromDer;
use x509_parser::revocation_list::CertificateRevocationList;

use crate::ports::{RevocationCheck, RevocationOutcome};

const OCSP_TIMEOUT: Duration = Duration::from_secs(3);
const CRL_TIMEOUT: Duration = Duration::from_secs(5);

/// OCSP access method OID inside the Authority Information Access extension.
const OID_AD_OCSP: &str = "1.3.6.1.5.5.7.48.1";

/// OCSP and CRL prober over HTTP.
pub struct RevocationProber {
    http: reqwest::Client,
}

impl RevocationProber {
    pub fn new() -> Self {
        Self {
            http: reqwest::Client::new(),
        }
    }

    /// Probe every advertised OCSP responder and CRL distribution point.
    pub async fn probe(&self, leaf_der: &[u8], issuer_der: Option<&[u8]>) -> RevocationOutcome {
        let Ok((_, leaf)) = X509Certificate::from_der(leaf_der) else {
            return RevocationOutcome::Clear;
        };

        // OCSP needs the issuer certificate for the CertID hashes.
        if let Some(issuer_der) = issuer_der {
            if let Ok((_, issuer)) = X509Certificate::from_der(issuer_der) {
                for url in ocsp_responders(&leaf) {
                    match self.query_ocsp(&url, &leaf, &issuer).await {
                        Some(OcspCertStatus::Revoked) => {
                            return RevocationOutcome::Revoked("OCSP: Revoked".to_string());
                        }
                        Some(OcspCertStatus::Good) => {
                            debug!(url = %url, "OCSP responder reported good");
                        }
                        Some(OcspCertStatus::Unknown) | None => {}
                    }
                }
            }
        }

        for url in crl_distribution_points(&leaf) {
            if self.crl_lists_serial(&url, &leaf).await == Some(true) {
                return RevocationOutcome::Revoked("CRL: Revoked".to_string());
            }
        }

        RevocationOutcome::Clear
    }

    async fn query_ocsp(
        &self,
        url: &str,
        leaf: &X509Certificate<'_>,
        issuer: &X509Certificate<'_>,
    ) -> Option<OcspCertStatus> {
        let request = build_ocsp_request(leaf, issuer);
        let response = self
            .http
            .post(url)
            .header("Content-Type", "application/ocsp-request")
            .body(request)
            .timeout(OCSP_TIMEOUT)
            .send()
            .await;

        let body = match response {
            Ok(resp) if resp.status().is_success() => resp.bytes().await.ok()?,
            Ok(resp) => {
                debug!(url = %url, status = %resp.status(), "OCSP responder rejected request");
                return None;
            }
            Err(e) => {
                warn!(url = %url, error = %e, "OCSP request failed");
                return None;
            }
        };
        parse_ocsp_response(&body)
    }

    async fn crl_lists_serial(&self, url: &str, leaf: &X509Certificate<'_>) -> Option<bool> {
        let response = self.http.get(url).timeout(CRL_TIMEOUT).send().await;
        let body = match response {
            Ok(resp) if resp.status().is_success() => resp.bytes().await.ok()?,
            Ok(resp) => {
                debug!(url = %url, status = %resp.status(), "CRL fetch rejected");
                return None;
            }
            Err(e) => {
                warn!(url = %url, error = %e, "CRL fetch failed");
                return None;
            }
        };

        let Ok((_, crl)) = CertificateRevocationList::from_der(&body) else {
            debug!(url = %url, "CRL parse failed");
            return None;
        };
        let revoked = crl
            .iter_revoked_certificates()
            .any(|rc| rc.user_certificate == leaf.tbs_certificate.serial);
        Some(revoked)
    }
}

impl Default for RevocationProber {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RevocationCheck for RevocationProber {
    async fn probe(&self, leaf_der: &[u8], issuer_der: Option<&[u8]>) -> RevocationOutcome {
        RevocationProber::probe(self, leaf_der, issuer_der).await
    }
}

/// OCSP responder URLs from the Authority Information Access extension.
fn ocsp_responders(cert: &X509Certificate<'_>) -> Vec<String> {
    let mut urls = Vec::new();
    for ext in cert.extensions() {
        if let ParsedExtension::AuthorityInfoAccess(aia) = ext.parsed_extension() {
            for desc in &aia.accessdescs {
                if desc.access_method.to_id_string() == OID_AD_OCSP {
                    if let GeneralName::URI(uri) = &desc.access_location {
                        urls.push(uri.to_string());
                    }
                }
            }
        }
    }
    urls
}

/// HTTP URIs from the CRL distribution points extension.
fn crl_distribution_points(cert: &X509Certificate<'_>) -> Vec<String> {
    let mut urls = Vec::new();
    for ext in cert.extensions() {
        if let ParsedExtension::CRLDistributionPoints(points) = ext.parsed_extension() {
            for point in &points.points {
                if let Some(DistributionPointName::FullName(names)) = &point.distribution_point {
                    for name in names {
                        if let GeneralName::URI(uri) = name {
                            urls.push(uri.to_string());
                        }
                    }
                }
            }
        }
    }
    urls
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OcspCertStatus {
    Good,
    Revoked,
    Unknown,
}

/// Build an unsigned OCSP request for the leaf: a single CertID with SHA-1
/// issuer name/key hashes and the leaf serial.
fn build_ocsp_request(leaf: &X509Certificate<'_>, issuer: &X509Certificate<'_>) -> Vec<u8> {
    let issuer_name_hash = Sha1::digest(issuer.subject().as_raw());
    let issuer_key_hash = Sha1::digest(issuer.public_key().subject_public_key.data.as_ref());

    // AlgorithmIdentifier { sha1, NULL }
    let sha1_oid: &[u8] = &[0x06, 0x05, 0x2b, 0x0e, 0x03, 0x02, 0x1a];
    let algorithm = der_tlv(0x30, [sha1_oid, &[0x05, 0x00]].concat());

    let cert_id = der_tlv(
        0x30,
        [
            algorithm,
            der_tlv(0x04, issuer_name_hash.to_vec()),
            der_tlv(0x04, issuer_key_hash.to_vec()),
            der_tlv(0x02, leaf.tbs_certificate.raw_serial().to_vec()),
        ]
        .concat(),
    );

    let single_request = der_tlv(0x30, cert_id);
    let request_list = der_tlv(0x30, single_request);
    let tbs_request = der_tlv(0x30, request_list);
    der_tlv(0x30, tbs_request)
}

/// Extract the leaf's certificate status from a DER OCSP response.
///
/// Returns `None` when the response is malformed or non-successful.
fn parse_ocsp_response(der: &[u8]) -> Option<OcspCertStatus> {
    // OCSPResponse ::= SEQUENCE { responseStatus ENUMERATED, responseBytes [0] EXPLICIT ... }
    let (tag, body, _) = read_tlv(der)?;
    if tag != 0x30 {
        return None;
    }
    let (tag, status, rest) = read_tlv(body)?;
    if tag != 0x0a || status != [0x00] {
        // Not a successful response.
        return None;
    }

    // responseBytes ::= SEQUENCE { responseType OID, response OCTET STRING }
    let (tag, response_bytes, _) = read_tlv(rest)?;
    if tag != 0xa0 {
        return None;
    }
    let (tag, inner, _) = read_tlv(response_bytes)?;
    if tag != 0x30 {
        return None;
    }
    let (tag, _oid, rest) = read_tlv(inner)?;
    if tag != 0x06 {
        return None;
    }
    let (tag, basic_der, _) = read_tlv(rest)?;
    if tag != 0x04 {
        return None;
    }

    // BasicOCSPResponse ::= SEQUENCE { tbsResponseData SEQUENCE, ... }
    let (tag, basic, _) = read_tlv(basic_der)?;
    if tag != 0x30 {
        return None;
    }
    let (tag, tbs, _) = read_tlv(basic)?;
    if tag != 0x30 {
        return None;
    }

    // ResponseData: skip version/responderID/producedAt; the only SEQUENCE
    // child at this level is the responses list.
    let mut rest = tbs;
    let responses = loop {
        let (tag, content, next) = read_tlv(rest)?;
        if tag == 0x30 {
            break content;
        }
        rest = next;
    };

    // SingleResponse ::= SEQUENCE { certID SEQUENCE, certStatus [0|1|2], ... }
    let (tag, single, _) = read_tlv(responses)?;
    if tag != 0x30 {
        return None;
    }
    let (tag, _cert_id, rest) = read_tlv(single)?;
    if tag != 0x30 {
        return None;
    }
    let (status_tag, _, _) = read_tlv(rest)?;
    match status_tag & 0x1f {
        0 => Some(OcspCertStatus::Good),
        1 => Some(OcspCertStatus::Revoked),
        2 => Some(OcspCertStatus::Unknown),
        _ => None,
    }
}

/// Encode one DER TLV.
fn der_tlv(tag: u8, content: Vec<u8>) -> Vec<u8> {
    let mut out = vec![tag];
    let len = content.len();
    if len < 0x80 {
        out.push(len as u8);
    } else {
        let bytes = len.to_be_bytes();
        let first = bytes.iter().position(|&b| b != 0).unwrap_or(bytes.len() - 1);
        out.push(0x80 | (bytes.len() - first) as u8);
        out.extend_from_slice(&bytes[first..]);
    }
    out.extend_from_slice(&content);
    out
}

/// Read one DER TLV: `(tag, content, remainder)`.
fn read_tlv(input: &[u8]) -> Option<(u8, &[u8], &[u8])> {
    if input.len() < 2 {
        return None;
    }
    let tag = input[0];
    let (len, header) = if input[1] & 0x80 == 0 {
        (input[1] as usize, 2)
    } else {
        let n = (input[1] & 0x7f) as usize;
        if n == 0 || n > 4 || input.len() < 2 + n {
            return None;
        }
        let mut len = 0usize;
        for &b in &input[2..2 + n] {
            len = (len << 8) | b as usize;
        }
        (len, 2 + n)
    };
    if input.len() < header + len {
        return None;
    }
    Some((tag, &input[header..header + len], &input[header + len..]))
}
