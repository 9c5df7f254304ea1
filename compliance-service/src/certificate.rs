//! Phyto-sanitary certificate authority
//!
//! Issues certificates by canonicalizing the payload to a deterministic
//! JSON string (recursively sorted keys) and signing it with SHA-256.
//! Verification recomputes the digest over the stored payload and compares
//! it to the stored signature, so any tampering is detected. Verification
//! never mutates state and needs no privileged access.

use crate::error::{ComplianceError, Result};
use crate::types::{
    CertificatePayload, CertificateStatus, IssueRequest, PhytoCertificate, VerificationOutcome,
};
use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use rust_decimal::Decimal;
use serde_json::Value;
use sha2::{Digest, Sha256};
use tracing::{info, warn};
use uuid::Uuid;

/// Serialize a JSON value with recursively sorted object keys
///
/// Stable across serde_json feature flags (the default map already sorts,
/// `preserve_order` does not).
pub fn canonical_json(value: &Value) -> String {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();

            let fields: Vec<String> = keys
                .into_iter()
                .map(|key| {
                    let encoded_key = serde_json::to_string(key)
                        .expect("string serialization cannot fail");
                    format!("{}:{}", encoded_key, canonical_json(&map[key]))
                })
                .collect();
            format!("{{{}}}", fields.join(","))
        }
        Value::Array(items) => {
            let encoded: Vec<String> = items.iter().map(canonical_json).collect();
            format!("[{}]", encoded.join(","))
        }
        scalar => serde_json::to_string(scalar).expect("scalar serialization cannot fail"),
    }
}

/// Canonical string form of a certificate payload
pub fn canonical_payload(payload: &CertificatePayload) -> Result<String> {
    let value = serde_json::to_value(payload)
        .map_err(|e| ComplianceError::InvalidPayload(e.to_string()))?;
    Ok(canonical_json(&value))
}

/// SHA-256 over the canonical payload, hex-encoded
pub fn sign_payload(payload: &CertificatePayload) -> Result<String> {
    let canonical = canonical_payload(payload)?;
    let digest = Sha256::digest(canonical.as_bytes());
    Ok(digest.iter().map(|b| format!("{:02x}", b)).collect())
}

/// Certificate authority for phyto-sanitary compliance
pub struct CertificateAuthority {
    certificates: DashMap<String, PhytoCertificate>,
    validity_days: i64,
}

impl CertificateAuthority {
    /// Create authority with a certificate validity window
    pub fn new(validity_days: i64) -> Self {
        Self {
            certificates: DashMap::new(),
            validity_days,
        }
    }

    /// Issue and sign a certificate
    pub fn issue(&self, request: IssueRequest, now: DateTime<Utc>) -> Result<PhytoCertificate> {
        Self::validate_request(&request)?;

        let certificate_number = format!("PHYTO-{}", Uuid::new_v4().simple());
        let payload = CertificatePayload {
            certificate_number: certificate_number.clone(),
            route_id: request.route_id,
            batch_id: request.batch_id,
            origin_country: request.origin_country,
            destination_country: request.destination_country,
            commodity: request.commodity,
            declared_quantity_kg: request.declared_quantity_kg,
            issued_at: now,
            valid_until: now + Duration::days(self.validity_days),
        };

        let certificate = PhytoCertificate {
            signature: sign_payload(&payload)?,
            payload,
            status: CertificateStatus::Issued,
        };

        info!(
            certificate_number = %certificate_number,
            route_id = %certificate.payload.route_id,
            "Phyto certificate issued"
        );

        self.certificates
            .insert(certificate_number, certificate.clone());

        Ok(certificate)
    }

    fn validate_request(request: &IssueRequest) -> Result<()> {
        if request.route_id.is_empty() || request.batch_id.is_empty() {
            return Err(ComplianceError::InvalidPayload(
                "route_id and batch_id are required".to_string(),
            ));
        }
        if request.origin_country.len() != 2 || request.destination_country.len() != 2 {
            return Err(ComplianceError::InvalidPayload(
                "countries must be ISO 3166-1 alpha-2 codes".to_string(),
            ));
        }
        if request.declared_quantity_kg <= Decimal::ZERO {
            return Err(ComplianceError::InvalidPayload(
                "declared quantity must be positive".to_string(),
            ));
        }
        Ok(())
    }

    /// Verify a certificate by number
    ///
    /// Recomputes the SHA-256 digest over the stored payload and compares
    /// it to the stored signature, independent of status. Pure read.
    pub fn verify(&self, certificate_number: &str) -> Result<VerificationOutcome> {
        let certificate = self
            .certificates
            .get(certificate_number)
            .ok_or_else(|| ComplianceError::CertificateNotFound(certificate_number.to_string()))?;

        let recomputed = sign_payload(&certificate.payload)?;
        let valid = recomputed == certificate.signature;

        if !valid {
            warn!(
                certificate_number = %certificate_number,
                "Certificate signature mismatch (tampering suspected)"
            );
        }

        Ok(VerificationOutcome {
            valid,
            status: certificate.status,
            certificate_number: certificate_number.to_string(),
            payload: Some(certificate.payload.clone()),
        })
    }

    /// Get a certificate by number
    pub fn get(&self, certificate_number: &str) -> Result<PhytoCertificate> {
        self.certificates
            .get(certificate_number)
            .map(|c| c.clone())
            .ok_or_else(|| ComplianceError::CertificateNotFound(certificate_number.to_string()))
    }

    /// Mark an issued certificate accepted by the destination authority
    pub fn accept(&self, certificate_number: &str) -> Result<PhytoCertificate> {
        self.transition(certificate_number, CertificateStatus::Accepted)
    }

    /// Mark an issued certificate rejected by the destination authority
    pub fn reject(&self, certificate_number: &str) -> Result<PhytoCertificate> {
        self.transition(certificate_number, CertificateStatus::Rejected)
    }

    fn transition(&self, certificate_number: &str, to: CertificateStatus) -> Result<PhytoCertificate> {
        let mut certificate = self
            .certificates
            .get_mut(certificate_number)
            .ok_or_else(|| ComplianceError::CertificateNotFound(certificate_number.to_string()))?;

        if certificate.status != CertificateStatus::Issued {
            return Err(ComplianceError::InvalidTransition(format!(
                "Certificate {} is {:?}, expected Issued",
                certificate_number, certificate.status
            )));
        }

        certificate.status = to;
        Ok(certificate.clone())
    }

    /// Expire issued certificates past their validity window
    ///
    /// Idempotent: re-running when nothing is overdue is a no-op.
    pub fn expire_sweep(&self, now: DateTime<Utc>) -> usize {
        let mut expired = 0;
        for mut item in self.certificates.iter_mut() {
            let certificate = item.value_mut();
            if certificate.status == CertificateStatus::Issued
                && certificate.payload.valid_until < now
            {
                certificate.status = CertificateStatus::Expired;
                expired += 1;
                info!(
                    certificate_number = %certificate.payload.certificate_number,
                    "Certificate expired"
                );
            }
        }
        expired
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_request() -> IssueRequest {
        IssueRequest {
            route_id: "RT-100".to_string(),
            batch_id: "BATCH-7".to_string(),
            origin_country: "KE".to_string(),
            destination_country: "UG".to_string(),
            commodity: "Arabica coffee beans".to_string(),
            declared_quantity_kg: Decimal::from(12_000),
        }
    }

    #[test]
    fn test_canonical_json_sorted_keys() {
        let value = serde_json::json!({
            "zeta": 1,
            "alpha": {"nested_z": true, "nested_a": [1, 2]},
        });
        assert_eq!(
            canonical_json(&value),
            r#"{"alpha":{"nested_a":[1,2],"nested_z":true},"zeta":1}"#
        );
    }

    #[test]
    fn test_issue_then_verify() {
        let authority = CertificateAuthority::new(30);
        let certificate = authority.issue(test_request(), Utc::now()).unwrap();

        let outcome = authority
            .verify(&certificate.payload.certificate_number)
            .unwrap();
        assert!(outcome.valid);
        assert_eq!(outcome.status, CertificateStatus::Issued);
        assert!(outcome.payload.is_some());
    }

    #[test]
    fn test_tamper_detection() {
        let authority = CertificateAuthority::new(30);
        let certificate = authority.issue(test_request(), Utc::now()).unwrap();
        let number = certificate.payload.certificate_number.clone();

        // Single-character mutation of the stored payload
        authority
            .certificates
            .get_mut(&number)
            .unwrap()
            .payload
            .commodity
            .push('x');

        let outcome = authority.verify(&number).unwrap();
        assert!(!outcome.valid);
    }

    #[test]
    fn test_verify_is_read_only() {
        let authority = CertificateAuthority::new(30);
        let certificate = authority.issue(test_request(), Utc::now()).unwrap();
        let number = certificate.payload.certificate_number.clone();

        authority.verify(&number).unwrap();
        authority.verify(&number).unwrap();

        let stored = authority.get(&number).unwrap();
        assert_eq!(stored.status, CertificateStatus::Issued);
        assert_eq!(stored.signature, certificate.signature);
    }

    #[test]
    fn test_verify_unknown_certificate() {
        let authority = CertificateAuthority::new(30);
        let result = authority.verify("PHYTO-missing");
        assert!(matches!(
            result,
            Err(ComplianceError::CertificateNotFound(_))
        ));
    }

    #[test]
    fn test_invalid_request_rejected() {
        let authority = CertificateAuthority::new(30);

        let mut request = test_request();
        request.declared_quantity_kg = Decimal::ZERO;
        assert!(authority.issue(request, Utc::now()).is_err());

        let mut request = test_request();
        request.origin_country = "KEN".to_string();
        assert!(authority.issue(request, Utc::now()).is_err());
    }

    #[test]
    fn test_status_transitions() {
        let authority = CertificateAuthority::new(30);
        let certificate = authority.issue(test_request(), Utc::now()).unwrap();
        let number = certificate.payload.certificate_number.clone();

        let accepted = authority.accept(&number).unwrap();
        assert_eq!(accepted.status, CertificateStatus::Accepted);

        // Second transition from a non-issued state fails
        assert!(authority.reject(&number).is_err());

        // Verification still passes after the status change
        assert!(authority.verify(&number).unwrap().valid);
    }

    #[test]
    fn test_expire_sweep_idempotent() {
        let authority = CertificateAuthority::new(30);
        let now = Utc::now();
        let certificate = authority.issue(test_request(), now).unwrap();

        assert_eq!(authority.expire_sweep(now), 0);

        let later = now + Duration::days(31);
        assert_eq!(authority.expire_sweep(later), 1);
        assert_eq!(authority.expire_sweep(later), 0);

        let stored = authority
            .get(&certificate.payload.certificate_number)
            .unwrap();
        assert_eq!(stored.status, CertificateStatus::Expired);
    }
}
