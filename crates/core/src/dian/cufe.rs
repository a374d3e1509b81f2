//! CUFE (Código Único de Factura Electrónica) fingerprint.
//!
//! SHA-384 over a strictly ordered concatenation of invoice fields, per the
//! DIAN technical annex. The same hex string is stored in both the `cufe`
//! and `uuid` columns and travels in `<cbc:UUID>`.

use rust_decimal::Decimal;
use sha2::{Digest, Sha384};
use thiserror::Error;

use super::{format_amount, only_digits, TAX_CODE_ICA, TAX_CODE_INC, TAX_CODE_IVA};

/// Errors produced when a required CUFE input is missing.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CufeError {
    /// Invoice number (prefix + number) is empty.
    #[error("NumFac es obligatorio para el CUFE")]
    MissingNumber,
    /// Issue date is empty.
    #[error("FecFac es obligatoria para el CUFE (YYYY-MM-DD)")]
    MissingDate,
    /// Supplier NIT has no digits.
    #[error("NitOfe es obligatorio para el CUFE")]
    MissingSupplierNit,
    /// Customer document has no digits.
    #[error("DocAdq es obligatorio para el CUFE")]
    MissingCustomerDoc,
    /// Technical key is empty.
    #[error("ClTec es obligatoria para el CUFE")]
    MissingTechnicalKey,
}

/// Inputs for the CUFE, in the order mandated by the annex.
#[derive(Debug, Clone)]
pub struct CufeInput {
    /// Invoice number: prefix + number, no spaces.
    pub number: String,
    /// Issue date, `YYYY-MM-DD`.
    pub issue_date: String,
    /// Net total (before taxes).
    pub net_total: Decimal,
    /// IVA total (tax code 01).
    pub iva_total: Decimal,
    /// Impoconsumo total (tax code 04).
    pub inc_total: Decimal,
    /// ICA total (tax code 03).
    pub ica_total: Decimal,
    /// Grand total payable.
    pub grand_total: Decimal,
    /// Supplier NIT (digits are extracted).
    pub supplier_nit: String,
    /// Customer identification (digits are extracted).
    pub customer_doc: String,
    /// Technical key of the billing resolution.
    pub technical_key: String,
    /// Environment marker: "1" production, "2" habilitación. Empty reads as "1".
    pub environment: String,
}

/// Computes the CUFE: SHA-384 of the concatenated fields, lowercase hex
/// (96 characters).
///
/// # Errors
///
/// Returns a descriptive [`CufeError`] when a required input is missing;
/// inputs are never silently zero-filled.
pub fn calculate(input: &CufeInput) -> Result<String, CufeError> {
    let number: String = input.number.split_whitespace().collect();
    if number.is_empty() {
        return Err(CufeError::MissingNumber);
    }
    if input.issue_date.is_empty() {
        return Err(CufeError::MissingDate);
    }

    let supplier_nit = only_digits(&input.supplier_nit);
    if supplier_nit.is_empty() {
        return Err(CufeError::MissingSupplierNit);
    }
    let customer_doc = only_digits(&input.customer_doc);
    if customer_doc.is_empty() {
        return Err(CufeError::MissingCustomerDoc);
    }
    if input.technical_key.is_empty() {
        return Err(CufeError::MissingTechnicalKey);
    }

    let environment = if input.environment.is_empty() {
        "1"
    } else {
        input.environment.as_str()
    };

    // Orden estricto del anexo, sin separadores.
    let mut data = String::new();
    data.push_str(&number);
    data.push_str(&input.issue_date);
    data.push_str(&format_amount(input.net_total));
    data.push_str(TAX_CODE_IVA);
    data.push_str(&format_amount(input.iva_total));
    data.push_str(TAX_CODE_INC);
    data.push_str(&format_amount(input.inc_total));
    data.push_str(TAX_CODE_ICA);
    data.push_str(&format_amount(input.ica_total));
    data.push_str(&format_amount(input.grand_total));
    data.push_str(&supplier_nit);
    data.push_str(&customer_doc);
    data.push_str(&input.technical_key);
    data.push_str(environment);

    let digest = Sha384::digest(data.as_bytes());
    Ok(hex_lower(&digest))
}

fn hex_lower(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        out.push_str(&format!("{b:02x}"));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    const EXPECTED: &str = "f5693bff411776a0c3536bba5df32491df2ffc101a8ff4810cdfc04368b8a9286dc0d5c578fa2344e119d118947a0c4c";

    fn reference_input() -> CufeInput {
        CufeInput {
            number: "SETP990000000".to_string(),
            issue_date: "2023-11-29".to_string(),
            net_total: dec!(1000000),
            iva_total: dec!(190000),
            inc_total: Decimal::ZERO,
            ica_total: Decimal::ZERO,
            grand_total: dec!(1190000),
            supplier_nit: "900123456".to_string(),
            customer_doc: "800987654".to_string(),
            technical_key: "fc8eac422eba16e22ffd8c6f94b3f40a6e38162c354673d3a603956897890cd"
                .to_string(),
            environment: "2".to_string(),
        }
    }

    #[test]
    fn matches_reference_vector() {
        assert_eq!(calculate(&reference_input()).unwrap(), EXPECTED);
    }

    #[test]
    fn is_deterministic() {
        let input = reference_input();
        assert_eq!(calculate(&input).unwrap(), calculate(&input).unwrap());
    }

    #[test]
    fn is_96_hex_chars() {
        let cufe = calculate(&reference_input()).unwrap();
        assert_eq!(cufe.len(), 96);
        assert!(cufe.chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(cufe, cufe.to_lowercase());
    }

    #[test]
    fn environment_changes_hash() {
        let mut prod = reference_input();
        prod.environment = "1".to_string();
        assert_ne!(calculate(&prod).unwrap(), calculate(&reference_input()).unwrap());
    }

    #[test]
    fn empty_environment_defaults_to_production() {
        let mut empty = reference_input();
        empty.environment = String::new();
        let mut prod = reference_input();
        prod.environment = "1".to_string();
        assert_eq!(calculate(&empty).unwrap(), calculate(&prod).unwrap());
    }

    #[test]
    fn number_whitespace_is_stripped() {
        let mut spaced = reference_input();
        spaced.number = " SETP 990000000 ".to_string();
        assert_eq!(calculate(&spaced).unwrap(), EXPECTED);
    }

    #[test]
    fn tax_ids_reduce_to_digits() {
        let mut dotted = reference_input();
        dotted.supplier_nit = "900.123.456".to_string();
        dotted.customer_doc = "800-987-654".to_string();
        assert_eq!(calculate(&dotted).unwrap(), EXPECTED);
    }

    #[test]
    fn missing_fields_error_descriptively() {
        let mut input = reference_input();
        input.number = "   ".to_string();
        assert_eq!(calculate(&input), Err(CufeError::MissingNumber));

        let mut input = reference_input();
        input.issue_date = String::new();
        assert_eq!(calculate(&input), Err(CufeError::MissingDate));

        let mut input = reference_input();
        input.supplier_nit = "n/a".to_string();
        assert_eq!(calculate(&input), Err(CufeError::MissingSupplierNit));

        let mut input = reference_input();
        input.customer_doc = String::new();
        assert_eq!(calculate(&input), Err(CufeError::MissingCustomerDoc));

        let mut input = reference_input();
        input.technical_key = String::new();
        assert_eq!(calculate(&input), Err(CufeError::MissingTechnicalKey));
    }
}
