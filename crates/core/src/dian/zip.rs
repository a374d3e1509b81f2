//! ZIP packaging for the DIAN web service.
//!
//! The service expects an archive with a single entry named
//! `{nit_digits}{prefix}{number}.xml`; the archive itself travels under the
//! same base name with `.zip`.

use std::io::Write;

use thiserror::Error;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use super::only_digits;

/// Packaging errors.
#[derive(Debug, Error)]
pub enum ZipError {
    /// Archive serialization failed.
    #[error("error creando el ZIP: {0}")]
    Write(String),
}

/// Names for the XML entry and the archive: `{base}.xml` / `{base}.zip`
/// where base is `{nit_digits}{prefix}{number}`.
#[must_use]
pub fn dian_file_names(company_nit: &str, prefix: &str, number: &str) -> (String, String) {
    let base = format!(
        "{}{}{}",
        only_digits(company_nit),
        prefix.trim(),
        number.trim()
    );
    (format!("{base}.xml"), format!("{base}.zip"))
}

/// Packages the signed XML as the sole entry of an in-memory ZIP archive.
///
/// # Errors
///
/// Returns [`ZipError`] if archive serialization fails.
pub fn package_signed_xml(xml: &[u8], xml_name: &str) -> Result<Vec<u8>, ZipError> {
    let mut writer = ZipWriter::new(std::io::Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

    writer
        .start_file(xml_name, options)
        .map_err(|e| ZipError::Write(e.to_string()))?;
    writer
        .write_all(xml)
        .map_err(|e| ZipError::Write(e.to_string()))?;

    let cursor = writer
        .finish()
        .map_err(|e| ZipError::Write(e.to_string()))?;
    Ok(cursor.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;

    #[test]
    fn names_follow_the_dian_convention() {
        let (xml_name, zip_name) = dian_file_names("900.123.456", "SETP", " 990000001 ");
        assert_eq!(xml_name, "900123456SETP990000001.xml");
        assert_eq!(zip_name, "900123456SETP990000001.zip");
    }

    #[test]
    fn archive_has_exactly_one_entry_with_the_payload() {
        let payload = b"<Invoice>firmada</Invoice>";
        let bytes = package_signed_xml(payload, "900123456SETP1.xml").unwrap();

        let mut archive = zip::ZipArchive::new(std::io::Cursor::new(bytes)).unwrap();
        assert_eq!(archive.len(), 1);

        let mut entry = archive.by_index(0).unwrap();
        assert_eq!(entry.name(), "900123456SETP1.xml");
        let mut content = Vec::new();
        entry.read_to_end(&mut content).unwrap();
        assert_eq!(content, payload);
    }
}
