//! DIAN electronic invoicing (Colombia, Anexo Técnico 1.9).
//!
//! Pipeline pieces in build order: [`cufe`] fingerprint, [`xml`] UBL 2.1
//! construction, [`c14n`] canonicalization, [`signer`] XAdES-EPES signing,
//! [`zip`] packaging and [`soap`] submission to the DIAN web service.
//! [`nit`] validates taxpayer ids, [`cert`] loads signing material.

pub mod c14n;
pub mod cert;
pub mod cufe;
pub mod nit;
pub mod signer;
pub mod soap;
pub mod xml;
pub mod zip;

#[cfg(test)]
mod props;

use rust_decimal::{Decimal, RoundingStrategy};

// ── Tabla 11: tipos de impuesto ──────────────────────────────────────────────

/// IVA.
pub const TAX_CODE_IVA: &str = "01";
/// Impuesto Nacional al Consumo.
pub const TAX_CODE_INC: &str = "04";
/// ICA.
pub const TAX_CODE_ICA: &str = "03";

// ── Tabla 6: unidades de medida (@unitCode) ──────────────────────────────────

/// Unidad.
pub const UNIT_UNIT: &str = "94";
/// Kilogramo.
pub const UNIT_KILOGRAM: &str = "KGM";
/// Litro.
pub const UNIT_LITRE: &str = "LTR";
/// Hora.
pub const UNIT_HOUR: &str = "HUR";

// ── Tabla 14: forma de pago ──────────────────────────────────────────────────

/// Contado.
pub const PAYMENT_FORM_CONTADO: &str = "1";
/// Crédito.
pub const PAYMENT_FORM_CREDITO: &str = "2";

// ── Tabla 13: medios de pago ─────────────────────────────────────────────────

/// Efectivo.
pub const PAYMENT_METHOD_EFECTIVO: &str = "10";
/// Transferencia débito bancaria.
pub const PAYMENT_METHOD_TRANSFERENCIA: &str = "47";

// ── Tipos de identificación ──────────────────────────────────────────────────

/// NIT (persona jurídica).
pub const IDENTIFICATION_TYPE_NIT: &str = "31";
/// Cédula de ciudadanía.
pub const IDENTIFICATION_TYPE_CC: &str = "13";

/// Picks the identification scheme for a tax id: 9+ digits reads as a NIT,
/// anything shorter as a cédula.
#[must_use]
pub fn identification_type_for(tax_id: &str) -> &'static str {
    if only_digits(tax_id).len() >= 9 {
        IDENTIFICATION_TYPE_NIT
    } else {
        IDENTIFICATION_TYPE_CC
    }
}

/// Strips every character that is not an ASCII digit.
#[must_use]
pub fn only_digits(s: &str) -> String {
    s.chars().filter(char::is_ascii_digit).collect()
}

/// Formats an amount the way every DIAN string wants it: two decimals,
/// point separator, no thousands separators, half-away-from-zero rounding.
#[must_use]
pub fn format_amount(d: Decimal) -> String {
    format!(
        "{:.2}",
        d.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn format_amount_pads_and_rounds() {
        assert_eq!(format_amount(dec!(1190000)), "1190000.00");
        assert_eq!(format_amount(dec!(1500.5)), "1500.50");
        assert_eq!(format_amount(dec!(0.005)), "0.01");
        assert_eq!(format_amount(dec!(0)), "0.00");
    }

    #[test]
    fn only_digits_strips_separators() {
        assert_eq!(only_digits("900.123.456-1"), "9001234561");
        assert_eq!(only_digits("CC 1030567890"), "1030567890");
    }

    #[test]
    fn identification_type_by_length() {
        assert_eq!(identification_type_for("900123456"), IDENTIFICATION_TYPE_NIT);
        assert_eq!(identification_type_for("12345678"), IDENTIFICATION_TYPE_CC);
    }
}
