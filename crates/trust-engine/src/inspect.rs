//! Leaf-certificate inspection.
//!
//! Pure checks over parsed certificates: hostname matching against SAN and
//! CN entries, validity-window evaluation, and the metadata heuristics the
//! engine turns into score deductions. The string-level matching rules live
//! in standalone functions so they are testable without certificates.

use chrono::{DateTime, TimeZone, Utc};
use x509_parser::certificate::X509Certificate;
use x509_parser::extensions::{GeneralName, ParsedExtension};

/// Validity-window status of a certificate at a given instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidityStatus {
    Valid,
    NotYetValid,
    Expired,
}

impl ValidityStatus {
    /// Failure reason as surfaced in verification logs.
    pub fn reason(&self) -> &'static str {
        match self {
            ValidityStatus::Valid => "Valid",
            ValidityStatus::NotYetValid => "Certificate not yet valid",
            ValidityStatus::Expired => "Certificate expired",
        }
    }
}

/// Metadata heuristics extracted from the leaf.
#[derive(Debug, Clone, Copy)]
pub struct MetadataFindings {
    /// Days since `notBefore`.
    pub cert_age_days: i64,
    /// Days until `notAfter`.
    pub days_until_expiry: i64,
    /// Issuer and subject names are byte-identical.
    pub self_signed: bool,
}

/// Check the certificate against a hostname: every SAN DNS name first, then
/// the subject CN. Case-insensitive; supports a leftmost single wildcard.
pub fn hostname_matches(cert: &X509Certificate<'_>, hostname: &str) -> bool {
    let host = hostname.trim().to_ascii_lowercase();
    if host.is_empty() {
        return false;
    }

    for ext in cert.extensions() {
        if let ParsedExtension::SubjectAlternativeName(san) = ext.parsed_extension() {
            for name in &san.general_names {
                if let GeneralName::DNSName(dns) = name {
                    if pattern_matches(dns, &host) {
                        return true;
                    }
                }
            }
        }
    }

    for attr in cert.subject().iter_common_name() {
        if let Ok(cn) = attr.as_str() {
            if pattern_matches(cn, &host) {
                return true;
            }
        }
    }
    false
}

/// Match a certificate name pattern against an already-lowercased hostname.
///
/// `*.example.com` matches `a.example.com` but neither `example.com` nor
/// `a.b.example.com`; the wildcard must cover exactly one label.
pub fn pattern_matches(pattern: &str, hostname: &str) -> bool {
    let pattern = pattern.trim().to_ascii_lowercase();
    if pattern == hostname {
        return true;
    }
    if let Some(suffix) = pattern.strip_prefix("*.") {
        if let Some(head) = hostname.strip_suffix(suffix) {
            return head.len() > 1 && head.ends_with('.') && head.matches('.').count() == 1;
        }
    }
    false
}

/// Evaluate `notBefore <= now <= notAfter` in UTC.
pub fn check_validity(cert: &X509Certificate<'_>, now: DateTime<Utc>) -> ValidityStatus {
    let not_before = asn1_to_utc(cert.validity().not_before);
    let not_after = asn1_to_utc(cert.validity().not_after);
    if now < not_before {
        ValidityStatus::NotYetValid
    } else if now > not_after {
        ValidityStatus::Expired
    } else {
        ValidityStatus::Valid
    }
}

/// Collect the metadata heuristics the engine scores.
pub fn inspect_metadata(cert: &X509Certificate<'_>, now: DateTime<Utc>) -> MetadataFindings {
    let not_before = asn1_to_utc(cert.validity().not_before);
    let not_after = asn1_to_utc(cert.validity().not_after);
    MetadataFindings {
        cert_age_days: (now - not_before).num_days(),
        days_until_expiry: (not_after - now).num_days(),
        self_signed: cert.issuer().as_raw() == cert.subject().as_raw(),
    }
}

fn asn1_to_utc(t: x509_parser::time::ASN1Time) -> DateTime<Utc> {
    Utc.timestamp_opt(t.timestamp(), 0)
        .single()
        .unwrap_or_default()
}
