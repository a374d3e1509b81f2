//! XAdES-EPES signature for DIAN invoices.
//!
//! Builds the `<ds:Signature>` element (SignedInfo, RSA-SHA-256 value,
//! KeyInfo, XAdES qualifying properties bound to the DIAN signature policy)
//! and injects it as the sole child of the **second**
//! `<ext:ExtensionContent>` of the document. UBL extensions are positional,
//! so the slot is located by count, never by attribute.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use chrono::Utc;
use quick_xml::events::Event;
use quick_xml::{Reader, Writer};
use rsa::pkcs1v15::SigningKey;
use rsa::signature::{SignatureEncoding, Signer};
use sha2::{Digest, Sha256};
use thiserror::Error;

use super::c14n::{canonicalize, C14nError};
use super::cert::SigningCert;
use super::xml::{INVOICE_ELEMENT_ID, NS_DS, NS_XADES};

/// DIAN signature policy (v2), mandatory for XAdES-EPES.
pub const SIGNATURE_POLICY_URL: &str =
    "https://facturaelectronica.dian.gov.co/politicadefirma/v2/politicadefirmav2.pdf";

/// SHA-256 digest of the signature-policy PDF, Base64.
pub const SIGNATURE_POLICY_DIGEST: &str = "dMoMvtcG5aIzgYo0tIsSQeVJBDnUnfSOfBpxXrmor0Y=";

/// XML-DSig / XAdES algorithm identifiers.
pub const ALG_C14N: &str = "http://www.w3.org/TR/2001/REC-xml-c14n-20010315";
/// RSA-SHA-256 signature method.
pub const ALG_RSA_SHA256: &str = "http://www.w3.org/2001/04/xmldsig-more#rsa-sha256";
/// SHA-256 digest method.
pub const ALG_SHA256: &str = "http://www.w3.org/2000/09/xmldsig#sha256";
/// Enveloped-signature transform.
pub const TRANSFORM_ENVELOPED: &str = "http://www.w3.org/2000/09/xmldsig#enveloped-signature";

/// Signing errors.
#[derive(Debug, Error)]
pub enum SignError {
    /// Input document is empty.
    #[error("XML vacío")]
    EmptyDocument,
    /// Canonicalization failed; the document is never signed raw.
    #[error("canonicalización fallida: {0}")]
    Canonicalization(#[from] C14nError),
    /// RSA signing failed.
    #[error("firma RSA fallida: {0}")]
    Rsa(String),
    /// The document does not expose the expected signature slot.
    #[error("no se encontró el segundo ext:ExtensionContent para inyectar la firma")]
    MissingSignatureSlot,
    /// Rewriting the document failed.
    #[error("error reescribiendo el XML firmado: {0}")]
    Rewrite(String),
}

/// XAdES-EPES signer.
#[derive(Debug, Clone, Copy, Default)]
pub struct XadesSigner;

impl XadesSigner {
    /// Creates the signer.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Signs the document and returns it with `<ds:Signature>` injected into
    /// the second extension slot.
    ///
    /// # Errors
    ///
    /// Returns [`SignError`] when canonicalization, signing, or injection
    /// fails.
    pub fn sign(&self, xml: &str, cert: &SigningCert) -> Result<String, SignError> {
        self.sign_at(xml, cert, Utc::now())
    }

    /// Same as [`sign`](Self::sign) with an explicit signing instant
    /// (deterministic tests).
    ///
    /// # Errors
    ///
    /// See [`sign`](Self::sign).
    pub fn sign_at(
        &self,
        xml: &str,
        cert: &SigningCert,
        signing_time: chrono::DateTime<Utc>,
    ) -> Result<String, SignError> {
        if xml.is_empty() {
            return Err(SignError::EmptyDocument);
        }

        // 1) Document digest over the canonical form. Reference URI="#invoice-id".
        let canonical_doc = canonicalize(xml)?;
        let doc_digest = BASE64.encode(Sha256::digest(canonical_doc.as_bytes()));

        // 2) SignedInfo, canonicalized and signed with RSA-SHA-256 (PKCS#1 v1.5).
        let signed_info = build_signed_info(&doc_digest);
        let canonical_signed_info = canonicalize(&signed_info)?;
        let signing_key = SigningKey::<Sha256>::new(cert.key.clone());
        let signature = signing_key
            .try_sign(canonical_signed_info.as_bytes())
            .map_err(|e| SignError::Rsa(e.to_string()))?;
        let signature_b64 = BASE64.encode(signature.to_bytes());

        // 3) KeyInfo + XAdES qualifying properties.
        let cert_b64 = BASE64.encode(&cert.cert_der);
        let cert_digest_b64 = BASE64.encode(Sha256::digest(&cert.cert_der));
        let time = signing_time.format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string();
        let signature_xml = build_signature(
            &signed_info,
            &signature_b64,
            &cert_b64,
            &time,
            &cert_digest_b64,
            &cert.issuer,
            &cert.serial_hex,
        );

        // 4) Inject into the second ExtensionContent.
        inject_signature(xml, &signature_xml)
    }
}

fn build_signed_info(doc_digest_b64: &str) -> String {
    let mut s = String::new();
    s.push_str(&format!(r#"<ds:SignedInfo xmlns:ds="{NS_DS}">"#));
    s.push_str(&format!(r#"<ds:CanonicalizationMethod Algorithm="{ALG_C14N}"/>"#));
    s.push_str(&format!(r#"<ds:SignatureMethod Algorithm="{ALG_RSA_SHA256}"/>"#));
    s.push_str(&format!(r##"<ds:Reference URI="#{INVOICE_ELEMENT_ID}">"##));
    s.push_str(&format!(
        r#"<ds:Transforms><ds:Transform Algorithm="{TRANSFORM_ENVELOPED}"/><ds:Transform Algorithm="{ALG_C14N}"/></ds:Transforms>"#
    ));
    s.push_str(&format!(r#"<ds:DigestMethod Algorithm="{ALG_SHA256}"/>"#));
    s.push_str(&format!("<ds:DigestValue>{doc_digest_b64}</ds:DigestValue>"));
    s.push_str("</ds:Reference>");
    s.push_str("</ds:SignedInfo>");
    s
}

#[allow(clippy::too_many_arguments)]
fn build_signature(
    signed_info: &str,
    signature_b64: &str,
    cert_b64: &str,
    signing_time: &str,
    cert_digest_b64: &str,
    issuer: &str,
    serial_hex: &str,
) -> String {
    let mut s = String::new();
    s.push_str(&format!(
        r#"<ds:Signature xmlns:ds="{NS_DS}" xmlns:xades="{NS_XADES}">"#
    ));
    s.push_str(signed_info);
    s.push_str(&format!(
        "<ds:SignatureValue>{signature_b64}</ds:SignatureValue>"
    ));
    s.push_str(&format!(
        "<ds:KeyInfo><ds:X509Data><ds:X509Certificate>{cert_b64}</ds:X509Certificate></ds:X509Data></ds:KeyInfo>"
    ));
    s.push_str("<ds:Object><xades:QualifyingProperties>");
    s.push_str(r#"<xades:SignedProperties Id="signed-props">"#);
    s.push_str("<xades:SignedSignatureProperties>");
    s.push_str(&format!("<xades:SigningTime>{signing_time}</xades:SigningTime>"));
    s.push_str(&format!(
        r#"<xades:SigningCertificate><xades:Cert><xades:CertDigest><ds:DigestMethod Algorithm="{ALG_SHA256}"/><ds:DigestValue>{cert_digest_b64}</ds:DigestValue></xades:CertDigest>"#
    ));
    s.push_str(&format!(
        "<xades:IssuerSerial><ds:X509IssuerName>{}</ds:X509IssuerName><ds:X509SerialNumber>{serial_hex}</ds:X509SerialNumber></xades:IssuerSerial></xades:Cert></xades:SigningCertificate>",
        escape_xml(issuer)
    ));
    s.push_str(&format!(
        "<xades:SignaturePolicyIdentifier><xades:SignaturePolicyId><xades:SigPolicyId><xades:Identifier>{SIGNATURE_POLICY_URL}</xades:Identifier></xades:SigPolicyId>"
    ));
    s.push_str(&format!(
        r#"<xades:SigPolicyHash><ds:DigestMethod Algorithm="{ALG_SHA256}"/><ds:DigestValue>{SIGNATURE_POLICY_DIGEST}</ds:DigestValue></xades:SigPolicyHash>"#
    ));
    s.push_str("</xades:SignaturePolicyId></xades:SignaturePolicyIdentifier>");
    s.push_str("</xades:SignedSignatureProperties></xades:SignedProperties></xades:QualifyingProperties></ds:Object>");
    s.push_str("</ds:Signature>");
    s
}

fn escape_xml(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

/// Streams the document through a writer, piping the signature's events into
/// the second `ext:ExtensionContent`. Errors if the document carries fewer
/// than two slots — the builder must always emit both.
fn inject_signature(xml: &str, signature_xml: &str) -> Result<String, SignError> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(false);
    let mut writer = Writer::new(std::io::Cursor::new(Vec::new()));

    let mut slot_count = 0u32;
    let mut injected = false;

    loop {
        match reader.read_event() {
            Ok(Event::Eof) => break,
            Ok(Event::Start(e)) if local_name(e.name().as_ref()) == b"ExtensionContent" => {
                slot_count += 1;
                let is_target = slot_count == 2;
                writer
                    .write_event(Event::Start(e))
                    .map_err(|e| SignError::Rewrite(e.to_string()))?;
                if is_target {
                    pipe_fragment(&mut writer, signature_xml)?;
                    injected = true;
                }
            }
            Ok(event) => {
                writer
                    .write_event(event)
                    .map_err(|e| SignError::Rewrite(e.to_string()))?;
            }
            Err(e) => return Err(SignError::Rewrite(e.to_string())),
        }
    }

    if !injected {
        return Err(SignError::MissingSignatureSlot);
    }

    let bytes = writer.into_inner().into_inner();
    String::from_utf8(bytes).map_err(|e| SignError::Rewrite(e.to_string()))
}

fn pipe_fragment(
    writer: &mut Writer<std::io::Cursor<Vec<u8>>>,
    fragment: &str,
) -> Result<(), SignError> {
    let mut reader = Reader::from_str(fragment);
    reader.config_mut().trim_text(false);
    loop {
        match reader.read_event() {
            Ok(Event::Eof) => break,
            Ok(event) => writer
                .write_event(event)
                .map_err(|e| SignError::Rewrite(e.to_string()))?,
            Err(e) => return Err(SignError::Rewrite(e.to_string())),
        }
    }
    Ok(())
}

fn local_name(qname: &[u8]) -> &[u8] {
    match qname.iter().rposition(|&b| b == b':') {
        Some(pos) => &qname[pos + 1..],
        None => qname,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dian::cert::from_pem;
    use crate::dian::xml::{InvoiceSnapshot, LineData, PartyData, UblBuilder};
    use chrono::{FixedOffset, TimeZone};
    use rust_decimal_macros::dec;

    const CERT_PEM: &[u8] = include_bytes!("../../testdata/cert.pem");
    const KEY_PEM: &[u8] = include_bytes!("../../testdata/key.pem");

    fn test_cert() -> SigningCert {
        from_pem(CERT_PEM, Some(KEY_PEM)).unwrap()
    }

    fn built_invoice() -> String {
        let snap = InvoiceSnapshot {
            prefix: "SETP".to_string(),
            number: "990000001".to_string(),
            uuid: "cd".repeat(48),
            issue_date: FixedOffset::west_opt(5 * 3600)
                .unwrap()
                .with_ymd_and_hms(2024, 3, 15, 10, 30, 0)
                .unwrap(),
            net_total: dec!(1000000),
            tax_total: dec!(190000),
            grand_total: dec!(1190000),
            supplier: PartyData {
                name: "Andino Pruebas SAS".to_string(),
                tax_id: "900123456".to_string(),
                id_type_code: "31".to_string(),
                address: None,
            },
            customer: PartyData {
                name: "Cliente Ejemplo".to_string(),
                tax_id: "800987654".to_string(),
                id_type_code: "31".to_string(),
                address: None,
            },
            resolution: None,
            payment_form_code: String::new(),
            payment_method_code: String::new(),
            due_date: None,
            lines: vec![LineData {
                description: "Servicio".to_string(),
                seller_code: "SRV-1".to_string(),
                unit_code: String::new(),
                quantity: dec!(1),
                unit_price: dec!(1000000),
                subtotal: dec!(1000000),
            }],
        };
        UblBuilder::new().build(&snap).unwrap()
    }

    #[test]
    fn signature_lands_in_second_slot_only() {
        let xml = built_invoice();
        let signed = XadesSigner::new().sign(&xml, &test_cert()).unwrap();

        // First slot stays empty, second carries exactly one Signature.
        assert_eq!(signed.matches("<ds:Signature").count(), 1);
        let first_slot_end = signed.find("</ext:ExtensionContent>").unwrap();
        let sig_pos = signed.find("<ds:Signature").unwrap();
        assert!(sig_pos > first_slot_end);
        assert_eq!(signed.matches("<ext:UBLExtension>").count(), 2);
    }

    #[test]
    fn signature_carries_xades_properties() {
        let signed = XadesSigner::new()
            .sign(&built_invoice(), &test_cert())
            .unwrap();
        assert!(signed.contains("<xades:SigningTime>"));
        assert!(signed.contains("<xades:SigningCertificate>"));
        assert!(signed.contains(SIGNATURE_POLICY_URL));
        assert!(signed.contains(SIGNATURE_POLICY_DIGEST));
        assert!(signed.contains("<ds:X509Certificate>"));
        assert!(signed.contains(&format!(r##"URI="#{INVOICE_ELEMENT_ID}""##)));
    }

    #[test]
    fn signing_time_is_utc_millis() {
        let at = Utc.with_ymd_and_hms(2024, 3, 15, 15, 30, 0).unwrap();
        let signed = XadesSigner::new()
            .sign_at(&built_invoice(), &test_cert(), at)
            .unwrap();
        assert!(signed.contains("<xades:SigningTime>2024-03-15T15:30:00.000Z</xades:SigningTime>"));
    }

    #[test]
    fn document_without_slots_is_rejected() {
        let xml = "<Invoice Id=\"invoice-id\"><cbc:ID>X1</cbc:ID></Invoice>";
        assert!(matches!(
            XadesSigner::new().sign(xml, &test_cert()),
            Err(SignError::MissingSignatureSlot)
        ));
    }

    #[test]
    fn single_slot_is_rejected() {
        let xml = "<Invoice><ext:UBLExtensions><ext:UBLExtension><ext:ExtensionContent></ext:ExtensionContent></ext:UBLExtension></ext:UBLExtensions></Invoice>";
        assert!(matches!(
            XadesSigner::new().sign(xml, &test_cert()),
            Err(SignError::MissingSignatureSlot)
        ));
    }

    #[test]
    fn empty_document_is_rejected() {
        assert!(matches!(
            XadesSigner::new().sign("", &test_cert()),
            Err(SignError::EmptyDocument)
        ));
    }

    #[test]
    fn signature_value_verifies_against_signed_info() {
        use rsa::pkcs1v15::VerifyingKey;
        use rsa::signature::Verifier;

        let signed = XadesSigner::new()
            .sign(&built_invoice(), &test_cert())
            .unwrap();

        let value_start = signed.find("<ds:SignatureValue>").unwrap() + "<ds:SignatureValue>".len();
        let value_end = signed.find("</ds:SignatureValue>").unwrap();
        let signature = BASE64.decode(&signed[value_start..value_end]).unwrap();

        // The embedded SignedInfo keeps its own xmlns:ds declaration, so the
        // extracted fragment is a standalone document a verifier can
        // canonicalize directly.
        let info_start = signed.find("<ds:SignedInfo").unwrap();
        let info_end = signed.find("</ds:SignedInfo>").unwrap() + "</ds:SignedInfo>".len();
        let canonical = canonicalize(&signed[info_start..info_end]).unwrap();

        let cert = test_cert();
        let verifying_key = VerifyingKey::<Sha256>::new(cert.key.to_public_key());
        let sig = rsa::pkcs1v15::Signature::try_from(signature.as_slice()).unwrap();
        verifying_key.verify(canonical.as_bytes(), &sig).unwrap();
    }
}
