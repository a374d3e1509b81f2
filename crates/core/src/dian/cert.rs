//! Signing-certificate loading (PEM pairs or PKCS#12 keystores).

use rsa::pkcs1::DecodeRsaPrivateKey;
use rsa::pkcs8::DecodePrivateKey;
use rsa::RsaPrivateKey;
use thiserror::Error;

/// Certificate-loading errors. Key material never appears in messages.
#[derive(Debug, Error)]
pub enum CertError {
    /// `DIAN_CERT_PATH` is empty.
    #[error("DIAN_CERT_PATH no configurado")]
    NotConfigured,
    /// File could not be read.
    #[error("no se pudo leer {path}: {reason}")]
    Read {
        /// Path that failed.
        path: String,
        /// IO error description.
        reason: String,
    },
    /// The keystore or PEM content could not be decoded.
    #[error("no se pudo decodificar el certificado: {0}")]
    Decode(String),
    /// No certificate found in the source.
    #[error("el archivo no contiene un certificado")]
    MissingCertificate,
    /// No usable RSA private key found in the source.
    #[error("el archivo no contiene una llave privada RSA")]
    MissingKey,
}

/// Loaded signing material: leaf certificate plus its RSA key, with the
/// fields XAdES needs pre-extracted.
pub struct SigningCert {
    /// DER bytes of the leaf certificate.
    pub cert_der: Vec<u8>,
    /// RSA private key. Kept in memory only for the signing call.
    pub key: RsaPrivateKey,
    /// Issuer distinguished name.
    pub issuer: String,
    /// Certificate serial number, lowercase hex.
    pub serial_hex: String,
}

impl std::fmt::Debug for SigningCert {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SigningCert")
            .field("issuer", &self.issuer)
            .field("serial_hex", &self.serial_hex)
            .field("key", &"[hidden]")
            .finish()
    }
}

/// Loads the signing certificate from `cert_path`.
///
/// `.p12`/`.pfx` paths are read as PKCS#12 keystores (the password may be
/// empty); anything else is treated as PEM, either one file carrying both
/// certificate and key, or a separate `key_path`.
///
/// # Errors
///
/// Returns [`CertError`] when the files cannot be read or decoded, or when
/// certificate or key are missing.
pub fn load_certificate(
    cert_path: &str,
    key_path: &str,
    password: &str,
) -> Result<SigningCert, CertError> {
    if cert_path.is_empty() {
        return Err(CertError::NotConfigured);
    }
    let lower = cert_path.to_lowercase();
    if lower.ends_with(".p12") || lower.ends_with(".pfx") {
        let data = read_file(cert_path)?;
        from_pkcs12(&data, password)
    } else {
        let cert_pem = read_file(cert_path)?;
        let key_pem = if key_path.is_empty() {
            None
        } else {
            Some(read_file(key_path)?)
        };
        from_pem(&cert_pem, key_pem.as_deref())
    }
}

fn read_file(path: &str) -> Result<Vec<u8>, CertError> {
    std::fs::read(path).map_err(|e| CertError::Read {
        path: path.to_string(),
        reason: e.to_string(),
    })
}

/// Builds a [`SigningCert`] from PEM bytes. When `key_pem` is `None` the
/// certificate file must also carry the private key.
pub fn from_pem(cert_pem: &[u8], key_pem: Option<&[u8]>) -> Result<SigningCert, CertError> {
    let blocks = pem::parse_many(cert_pem).map_err(|e| CertError::Decode(e.to_string()))?;

    let cert_der = blocks
        .iter()
        .find(|b| b.tag() == "CERTIFICATE")
        .map(|b| b.contents().to_vec())
        .ok_or(CertError::MissingCertificate)?;

    let key = match key_pem {
        Some(data) => {
            let key_blocks =
                pem::parse_many(data).map_err(|e| CertError::Decode(e.to_string()))?;
            key_from_blocks(&key_blocks)?
        }
        None => key_from_blocks(&blocks)?,
    };

    finish(cert_der, key)
}

/// Builds a [`SigningCert`] from PKCS#12 keystore bytes.
pub fn from_pkcs12(data: &[u8], password: &str) -> Result<SigningCert, CertError> {
    let pfx = p12::PFX::parse(data).map_err(|e| CertError::Decode(format!("{e:?}")))?;
    if !pfx.verify_mac(password) {
        return Err(CertError::Decode("contraseña del keystore incorrecta".into()));
    }

    let cert_der = pfx
        .cert_x509_bags(password)
        .map_err(|e| CertError::Decode(format!("{e:?}")))?
        .into_iter()
        .next()
        .ok_or(CertError::MissingCertificate)?;

    let key_der = pfx
        .key_bags(password)
        .map_err(|e| CertError::Decode(format!("{e:?}")))?
        .into_iter()
        .next()
        .ok_or(CertError::MissingKey)?;

    let key = RsaPrivateKey::from_pkcs8_der(&key_der)
        .or_else(|_| RsaPrivateKey::from_pkcs1_der(&key_der))
        .map_err(|_| CertError::MissingKey)?;

    finish(cert_der, key)
}

fn key_from_blocks(blocks: &[pem::Pem]) -> Result<RsaPrivateKey, CertError> {
    for block in blocks {
        let key = match block.tag() {
            "PRIVATE KEY" => RsaPrivateKey::from_pkcs8_der(block.contents()).ok(),
            "RSA PRIVATE KEY" => RsaPrivateKey::from_pkcs1_der(block.contents()).ok(),
            _ => None,
        };
        if let Some(key) = key {
            return Ok(key);
        }
    }
    Err(CertError::MissingKey)
}

fn finish(cert_der: Vec<u8>, key: RsaPrivateKey) -> Result<SigningCert, CertError> {
    let (_, parsed) = x509_parser::parse_x509_certificate(&cert_der)
        .map_err(|e| CertError::Decode(e.to_string()))?;
    let issuer = parsed.issuer().to_string();
    let serial_hex = parsed.serial.to_str_radix(16);

    Ok(SigningCert {
        cert_der,
        key,
        issuer,
        serial_hex,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const CERT_PEM: &[u8] = include_bytes!("../../testdata/cert.pem");
    const KEY_PEM: &[u8] = include_bytes!("../../testdata/key.pem");
    const KEYSTORE: &[u8] = include_bytes!("../../testdata/cert.p12");

    #[test]
    fn loads_pem_pair() {
        let cert = from_pem(CERT_PEM, Some(KEY_PEM)).unwrap();
        assert!(cert.issuer.contains("andino-test"));
        assert!(!cert.serial_hex.is_empty());
        assert!(!cert.cert_der.is_empty());
    }

    #[test]
    fn loads_combined_pem() {
        let mut combined = CERT_PEM.to_vec();
        combined.extend_from_slice(KEY_PEM);
        let cert = from_pem(&combined, None).unwrap();
        assert!(cert.issuer.contains("andino-test"));
    }

    #[test]
    fn loads_pkcs12() {
        let cert = from_pkcs12(KEYSTORE, "andino").unwrap();
        assert!(cert.issuer.contains("andino-test"));
    }

    #[test]
    fn pkcs12_wrong_password_fails() {
        assert!(from_pkcs12(KEYSTORE, "wrong").is_err());
    }

    #[test]
    fn pem_without_key_fails() {
        assert!(matches!(
            from_pem(CERT_PEM, None),
            Err(CertError::MissingKey)
        ));
    }

    #[test]
    fn debug_hides_key_material() {
        let cert = from_pem(CERT_PEM, Some(KEY_PEM)).unwrap();
        let rendered = format!("{cert:?}");
        assert!(rendered.contains("[hidden]"));
    }
}
