//! SOAP client for the DIAN reception web service.
//!
//! One operation per environment: `SendTestSetAsync` against habilitación,
//! `SendBillAsync` against production. Protocol failures that still produce
//! a SOAP body (faults, unparseable responses) become non-accepted outcomes
//! rather than transport errors, so the orchestrator can persist what DIAN
//! said.

use std::time::Duration;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};
use thiserror::Error;

/// SOAP 1.1 envelope namespace.
pub const SOAP_ENVELOPE_NS: &str = "http://schemas.xmlsoap.org/soap/envelope/";
/// Operation namespace of the DIAN WCF service.
pub const SOAP_TEMPURI_NS: &str = "http://tempuri.org/";
/// Prefix of the `SOAPAction` header values.
pub const SOAP_ACTION_BASE: &str = "http://tempuri.org/IWcfDianCustomerServices/";

/// Habilitación endpoint.
pub const SOAP_URL_TEST: &str = "https://vpfe-hab.dian.gov.co/WcfDianCustomerServices.svc";
/// Production endpoint.
pub const SOAP_URL_PROD: &str = "https://vpfe.dian.gov.co/WcfDianCustomerServices.svc";

/// Which DIAN deployment receives the document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitTarget {
    /// Habilitación (`SendTestSetAsync`).
    Habilitacion,
    /// Production (`SendBillAsync`).
    Produccion,
}

impl SubmitTarget {
    fn url(self) -> &'static str {
        match self {
            Self::Habilitacion => SOAP_URL_TEST,
            Self::Produccion => SOAP_URL_PROD,
        }
    }

    fn operation(self) -> &'static str {
        match self {
            Self::Habilitacion => "SendTestSetAsync",
            Self::Produccion => "SendBillAsync",
        }
    }
}

/// Result of a submission as DIAN reported it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmitOutcome {
    /// `ZipKey` returned by the service; the receipt-retrieval handle.
    pub track_id: String,
    /// True when `HasErrors` was false.
    pub accepted: bool,
    /// Error messages joined with "; "; empty when accepted.
    pub errors: String,
}

/// Transport-level errors (the request never produced a SOAP body).
#[derive(Debug, Error)]
pub enum SoapError {
    /// HTTP client construction failed.
    #[error("no se pudo construir el cliente HTTP: {0}")]
    Client(String),
    /// Envelope serialization failed.
    #[error("error serializando el envelope SOAP: {0}")]
    Serialize(String),
    /// The HTTP call failed (DNS, TLS, timeout).
    #[error("llamada SOAP fallida: {0}")]
    Transport(String),
}

/// SOAP client with its own generous network timeout (the DIAN service can
/// take several seconds); the orchestrator's deadline bounds it from above.
#[derive(Debug, Clone)]
pub struct SoapClient {
    http: reqwest::Client,
}

impl SoapClient {
    /// Builds the client with a 60-second timeout.
    ///
    /// # Errors
    ///
    /// Returns [`SoapError::Client`] if the HTTP client cannot be built.
    pub fn new() -> Result<Self, SoapError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(|e| SoapError::Client(e.to_string()))?;
        Ok(Self { http })
    }

    /// Submits the ZIP to the given target and parses the response.
    ///
    /// # Errors
    ///
    /// Returns [`SoapError`] only for transport failures; service-level
    /// rejections come back as a non-accepted [`SubmitOutcome`].
    pub async fn submit(
        &self,
        zip_bytes: &[u8],
        zip_name: &str,
        target: SubmitTarget,
    ) -> Result<SubmitOutcome, SoapError> {
        let envelope = build_envelope(zip_bytes, zip_name, target)?;
        let action = format!("{SOAP_ACTION_BASE}{}", target.operation());

        let response = self
            .http
            .post(target.url())
            .header("Content-Type", "text/xml; charset=utf-8")
            .header("SOAPAction", action)
            .body(envelope)
            .send()
            .await
            .map_err(|e| SoapError::Transport(e.to_string()))?;

        let body = response
            .text()
            .await
            .map_err(|e| SoapError::Transport(e.to_string()))?;

        Ok(parse_submit_response(&body))
    }
}

/// Serializes the request envelope for the target operation.
fn build_envelope(
    zip_bytes: &[u8],
    zip_name: &str,
    target: SubmitTarget,
) -> Result<String, SoapError> {
    let content = BASE64.encode(zip_bytes);
    let operation = target.operation();

    let mut w = Writer::new(std::io::Cursor::new(Vec::new()));
    let to_err = |e: std::io::Error| SoapError::Serialize(e.to_string());

    let mut envelope = BytesStart::new("s:Envelope");
    envelope.push_attribute(("xmlns:s", SOAP_ENVELOPE_NS));
    w.write_event(Event::Start(envelope)).map_err(to_err)?;
    w.write_event(Event::Start(BytesStart::new("s:Header")))
        .map_err(to_err)?;
    w.write_event(Event::End(BytesEnd::new("s:Header")))
        .map_err(to_err)?;
    w.write_event(Event::Start(BytesStart::new("s:Body")))
        .map_err(to_err)?;

    let mut op = BytesStart::new(operation);
    op.push_attribute(("xmlns", SOAP_TEMPURI_NS));
    w.write_event(Event::Start(op)).map_err(to_err)?;

    text(&mut w, "fileName", zip_name).map_err(to_err)?;
    text(&mut w, "contentFile", &content).map_err(to_err)?;
    if target == SubmitTarget::Habilitacion {
        // Empty testSetId: DIAN assigns one.
        text(&mut w, "testSetId", "").map_err(to_err)?;
    }

    w.write_event(Event::End(BytesEnd::new(operation)))
        .map_err(to_err)?;
    w.write_event(Event::End(BytesEnd::new("s:Body")))
        .map_err(to_err)?;
    w.write_event(Event::End(BytesEnd::new("s:Envelope")))
        .map_err(to_err)?;

    let bytes = w.into_inner().into_inner();
    String::from_utf8(bytes).map_err(|e| SoapError::Serialize(e.to_string()))
}

fn text(
    w: &mut Writer<std::io::Cursor<Vec<u8>>>,
    name: &str,
    value: &str,
) -> Result<(), std::io::Error> {
    w.write_event(Event::Start(BytesStart::new(name)))?;
    w.write_event(Event::Text(BytesText::new(value)))?;
    w.write_event(Event::End(BytesEnd::new(name)))?;
    Ok(())
}

/// Extracts `{ZipKey, HasErrors, ErrorMessageList}` from the response by
/// local element name, so namespace prefixes do not matter. Unparseable
/// bodies and SOAP faults degrade to non-accepted outcomes carrying the raw
/// material as the error text.
#[must_use]
pub fn parse_submit_response(body: &str) -> SubmitOutcome {
    let mut reader = Reader::from_str(body);
    reader.config_mut().trim_text(true);

    let mut track_id = String::new();
    let mut has_errors = false;
    let mut saw_result = false;
    let mut messages: Vec<String> = Vec::new();
    let mut fault_code = String::new();
    let mut fault_string = String::new();
    let mut in_fault = false;
    let mut in_message_list = false;
    let mut current: Vec<u8> = Vec::new();

    loop {
        match reader.read_event() {
            Ok(Event::Eof) => break,
            Ok(Event::Start(e)) => {
                let local = local_name(e.name().as_ref()).to_vec();
                match local.as_slice() {
                    b"Fault" => in_fault = true,
                    b"ErrorMessageList" => in_message_list = true,
                    _ => {}
                }
                current = local;
            }
            Ok(Event::End(e)) => {
                match local_name(e.name().as_ref()) {
                    b"Fault" => in_fault = false,
                    b"ErrorMessageList" => in_message_list = false,
                    _ => {}
                }
                current.clear();
            }
            Ok(Event::Text(t)) => {
                let value = match t.unescape() {
                    Ok(v) => v.into_owned(),
                    Err(_) => continue,
                };
                match current.as_slice() {
                    b"ZipKey" => {
                        saw_result = true;
                        track_id = value;
                    }
                    b"HasErrors" => {
                        saw_result = true;
                        has_errors = value.eq_ignore_ascii_case("true");
                    }
                    b"string" if in_message_list => messages.push(value),
                    b"faultcode" if in_fault => fault_code = value,
                    b"faultstring" if in_fault => fault_string = value,
                    _ => {}
                }
            }
            Ok(_) => {}
            Err(_) => {
                return SubmitOutcome {
                    track_id: String::new(),
                    accepted: false,
                    errors: format!("no se pudo parsear la respuesta SOAP: {body}"),
                };
            }
        }
    }

    if !fault_code.is_empty() || !fault_string.is_empty() {
        return SubmitOutcome {
            track_id: String::new(),
            accepted: false,
            errors: format!("SOAP Fault [{fault_code}]: {fault_string}"),
        };
    }

    if !saw_result {
        return SubmitOutcome {
            track_id: String::new(),
            accepted: false,
            errors: format!("respuesta SOAP vacía o inesperada: {body}"),
        };
    }

    SubmitOutcome {
        track_id,
        accepted: !has_errors,
        errors: messages.join("; "),
    }
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

    #[test]
    fn envelope_carries_operation_and_payload() {
        let envelope = build_envelope(b"zip-bytes", "900123456SETP1.zip", SubmitTarget::Produccion)
            .unwrap();
        assert!(envelope.contains(r#"<s:Envelope xmlns:s="http://schemas.xmlsoap.org/soap/envelope/">"#));
        assert!(envelope.contains(r#"<SendBillAsync xmlns="http://tempuri.org/">"#));
        assert!(envelope.contains("<fileName>900123456SETP1.zip</fileName>"));
        assert!(envelope.contains(&format!("<contentFile>{}</contentFile>", BASE64.encode(b"zip-bytes"))));
        assert!(!envelope.contains("testSetId"));
    }

    #[test]
    fn habilitacion_uses_test_set_with_empty_id() {
        let envelope =
            build_envelope(b"zip", "f.zip", SubmitTarget::Habilitacion).unwrap();
        assert!(envelope.contains(r#"<SendTestSetAsync xmlns="http://tempuri.org/">"#));
        assert!(envelope.contains("<testSetId></testSetId>"));
    }

    #[test]
    fn parses_accepted_response() {
        let body = r#"<s:Envelope xmlns:s="http://schemas.xmlsoap.org/soap/envelope/">
            <s:Body><SendBillAsyncResponse xmlns="http://tempuri.org/">
            <SendBillAsyncResult xmlns:a="http://schemas.datacontract.org/2004/07/">
              <a:ErrorMessageList xmlns:b="http://schemas.microsoft.com/2003/10/Serialization/Arrays"/>
              <a:HasErrors>false</a:HasErrors>
              <a:ZipKey>abc-123-tracking</a:ZipKey>
            </SendBillAsyncResult></SendBillAsyncResponse></s:Body></s:Envelope>"#;
        let outcome = parse_submit_response(body);
        assert!(outcome.accepted);
        assert_eq!(outcome.track_id, "abc-123-tracking");
        assert!(outcome.errors.is_empty());
    }

    #[test]
    fn parses_rejection_with_joined_errors() {
        let body = r#"<s:Envelope xmlns:s="http://schemas.xmlsoap.org/soap/envelope/">
            <s:Body><SendTestSetAsyncResponse xmlns="http://tempuri.org/">
            <SendTestSetAsyncResult xmlns:a="http://schemas.datacontract.org/2004/07/">
              <a:ErrorMessageList xmlns:b="http://schemas.microsoft.com/2003/10/Serialization/Arrays">
                <b:string>Regla FAD06: NIT inválido</b:string>
                <b:string>Regla 90: documento duplicado</b:string>
              </a:ErrorMessageList>
              <a:HasErrors>true</a:HasErrors>
              <a:ZipKey>def-456</a:ZipKey>
            </SendTestSetAsyncResult></SendTestSetAsyncResponse></s:Body></s:Envelope>"#;
        let outcome = parse_submit_response(body);
        assert!(!outcome.accepted);
        assert_eq!(outcome.track_id, "def-456");
        assert_eq!(
            outcome.errors,
            "Regla FAD06: NIT inválido; Regla 90: documento duplicado"
        );
    }

    #[test]
    fn parses_soap_fault() {
        let body = r#"<s:Envelope xmlns:s="http://schemas.xmlsoap.org/soap/envelope/">
            <s:Body><s:Fault>
              <faultcode>s:Client</faultcode>
              <faultstring>Authentication failed</faultstring>
            </s:Fault></s:Body></s:Envelope>"#;
        let outcome = parse_submit_response(body);
        assert!(!outcome.accepted);
        assert_eq!(outcome.errors, "SOAP Fault [s:Client]: Authentication failed");
    }

    #[test]
    fn garbage_body_is_a_non_accepted_outcome() {
        let outcome = parse_submit_response("<html>gateway timeout</html");
        assert!(!outcome.accepted);
        assert!(outcome.errors.contains("no se pudo parsear") || outcome.errors.contains("inesperada"));
    }

    #[test]
    fn empty_envelope_is_unexpected() {
        let outcome = parse_submit_response(
            r#"<s:Envelope xmlns:s="http://schemas.xmlsoap.org/soap/envelope/"><s:Body/></s:Envelope>"#,
        );
        assert!(!outcome.accepted);
        assert!(outcome.errors.contains("inesperada"));
    }
}
