//! Inclusive XML canonicalization (W3C C14N 1.0, comments omitted).
//!
//! Covers the document class this crate's builders emit: UTF-8, namespaces
//! declared on the element that uses them, no DTDs, no processing
//! instructions. Anything outside that class is a hard error; signing a
//! document that could not be canonicalized is never acceptable.

use quick_xml::events::Event;
use quick_xml::Reader;
use thiserror::Error;

/// Canonicalization errors.
#[derive(Debug, Error)]
pub enum C14nError {
    /// The input is not well-formed XML.
    #[error("XML mal formado: {0}")]
    Malformed(String),
    /// The document uses a construct outside the supported class.
    #[error("construcción XML no soportada para canonicalización: {0}")]
    Unsupported(String),
}

/// Canonicalizes a document: drops the XML declaration, expands empty
/// elements, sorts namespace declarations and attributes, and normalizes
/// escaping per the C14N rules.
///
/// # Errors
///
/// Returns [`C14nError`] on malformed input, DTDs or processing
/// instructions. There is no fallback to the raw bytes.
pub fn canonicalize(xml: &str) -> Result<String, C14nError> {
    let mut reader = Reader::from_str(xml);
    let config = reader.config_mut();
    config.trim_text(false);
    config.check_end_names = true;

    let mut out = String::with_capacity(xml.len());
    loop {
        match reader.read_event() {
            Ok(Event::Decl(_)) => {}
            Ok(Event::Comment(_)) => {}
            Ok(Event::DocType(_)) => {
                return Err(C14nError::Unsupported("DTD".into()));
            }
            Ok(Event::PI(_)) => {
                return Err(C14nError::Unsupported("processing instruction".into()));
            }
            Ok(Event::Start(e)) => {
                write_start_tag(&mut out, &e)?;
            }
            Ok(Event::Empty(e)) => {
                // C14N renders empty elements as an explicit start/end pair.
                write_start_tag(&mut out, &e)?;
                let name = qname(&e)?;
                out.push_str("</");
                out.push_str(&name);
                out.push('>');
            }
            Ok(Event::End(e)) => {
                let name = String::from_utf8(e.name().as_ref().to_vec())
                    .map_err(|e| C14nError::Malformed(e.to_string()))?;
                out.push_str("</");
                out.push_str(&name);
                out.push('>');
            }
            Ok(Event::Text(e)) => {
                let value = e
                    .unescape()
                    .map_err(|e| C14nError::Malformed(e.to_string()))?;
                escape_text(&mut out, &value);
            }
            Ok(Event::CData(e)) => {
                let value = String::from_utf8(e.into_inner().to_vec())
                    .map_err(|e| C14nError::Malformed(e.to_string()))?;
                escape_text(&mut out, &value);
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(C14nError::Malformed(e.to_string())),
        }
    }
    Ok(out)
}

fn qname(e: &quick_xml::events::BytesStart<'_>) -> Result<String, C14nError> {
    String::from_utf8(e.name().as_ref().to_vec()).map_err(|e| C14nError::Malformed(e.to_string()))
}

/// Writes a start tag with namespace declarations first (default namespace,
/// then prefixed ones sorted by prefix) followed by attributes sorted by
/// qualified name, with C14N attribute-value escaping.
fn write_start_tag(
    out: &mut String,
    e: &quick_xml::events::BytesStart<'_>,
) -> Result<(), C14nError> {
    let name = qname(e)?;

    let mut ns_decls: Vec<(String, String)> = Vec::new();
    let mut attrs: Vec<(String, String)> = Vec::new();

    for attr in e.attributes() {
        let attr = attr.map_err(|e| C14nError::Malformed(e.to_string()))?;
        let key = String::from_utf8(attr.key.as_ref().to_vec())
            .map_err(|e| C14nError::Malformed(e.to_string()))?;
        let value = attr
            .unescape_value()
            .map_err(|e| C14nError::Malformed(e.to_string()))?
            .into_owned();
        if key == "xmlns" || key.starts_with("xmlns:") {
            ns_decls.push((key, value));
        } else {
            attrs.push((key, value));
        }
    }

    // Default namespace sorts before prefixed declarations; both groups by name.
    ns_decls.sort_by(|a, b| {
        let a_default = a.0 == "xmlns";
        let b_default = b.0 == "xmlns";
        b_default.cmp(&a_default).then_with(|| a.0.cmp(&b.0))
    });
    // Unprefixed attributes (no namespace) sort before prefixed ones.
    attrs.sort_by(|a, b| {
        let a_prefixed = a.0.contains(':');
        let b_prefixed = b.0.contains(':');
        a_prefixed.cmp(&b_prefixed).then_with(|| a.0.cmp(&b.0))
    });

    out.push('<');
    out.push_str(&name);
    for (key, value) in ns_decls.iter().chain(attrs.iter()) {
        out.push(' ');
        out.push_str(key);
        out.push_str("=\"");
        escape_attr(out, value);
        out.push('"');
    }
    out.push('>');
    Ok(())
}

fn escape_text(out: &mut String, value: &str) {
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '\r' => out.push_str("&#xD;"),
            other => out.push(other),
        }
    }
}

fn escape_attr(out: &mut String, value: &str) {
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '"' => out.push_str("&quot;"),
            '\t' => out.push_str("&#x9;"),
            '\n' => out.push_str("&#xA;"),
            '\r' => out.push_str("&#xD;"),
            other => out.push(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drops_declaration_and_expands_empty_elements() {
        let xml = r#"<?xml version="1.0" encoding="UTF-8"?><a><b/></a>"#;
        assert_eq!(canonicalize(xml).unwrap(), "<a><b></b></a>");
    }

    #[test]
    fn sorts_namespace_declarations_and_attributes() {
        let xml = r#"<root xmlns:b="urn:b" xmlns="urn:d" xmlns:a="urn:a" z="1" a="2"><x/></root>"#;
        let canonical = canonicalize(xml).unwrap();
        assert_eq!(
            canonical,
            r#"<root xmlns="urn:d" xmlns:a="urn:a" xmlns:b="urn:b" a="2" z="1"><x></x></root>"#
        );
    }

    #[test]
    fn escapes_text_and_attributes() {
        let xml = "<a v=\"x&amp;y\">1 &lt; 2 &amp; 3 > 0</a>";
        let canonical = canonicalize(xml).unwrap();
        assert_eq!(canonical, "<a v=\"x&amp;y\">1 &lt; 2 &amp; 3 &gt; 0</a>");
    }

    #[test]
    fn is_idempotent() {
        let xml = r#"<a b="1" xmlns:x="urn:x"><x:c>t</x:c><d/></a>"#;
        let once = canonicalize(xml).unwrap();
        let twice = canonicalize(&once).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn rejects_malformed_input() {
        assert!(matches!(
            canonicalize("<a><b></a>"),
            Err(C14nError::Malformed(_))
        ));
    }

    #[test]
    fn rejects_dtd() {
        let xml = "<!DOCTYPE a []><a/>";
        assert!(matches!(
            canonicalize(xml),
            Err(C14nError::Unsupported(_))
        ));
    }
}
