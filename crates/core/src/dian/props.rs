//! Property-based tests for the CUFE fingerprint.

use proptest::prelude::*;
use rust_decimal::Decimal;

use super::cufe::{calculate, CufeInput};

fn amount() -> impl Strategy<Value = Decimal> {
    (0i64..1_000_000_000_000i64).prop_map(|v| Decimal::new(v, 2))
}

fn digits(len: std::ops::Range<usize>) -> impl Strategy<Value = String> {
    proptest::collection::vec(0u8..10, len).prop_map(|ds| {
        let mut s: String = ds.into_iter().map(|d| char::from(b'0' + d)).collect();
        if s.chars().all(|c| c == '0') {
            s.push('1');
        }
        s
    })
}

fn input_strategy() -> impl Strategy<Value = CufeInput> {
    (
        "[A-Z]{2,4}[0-9]{6,9}",
        amount(),
        amount(),
        amount(),
        digits(9..11),
        digits(6..11),
        "[a-f0-9]{32,64}",
        prop_oneof![Just("1".to_string()), Just("2".to_string())],
    )
        .prop_map(
            |(number, net, iva, grand, supplier, customer, key, env)| CufeInput {
                number,
                issue_date: "2024-06-01".to_string(),
                net_total: net,
                iva_total: iva,
                inc_total: Decimal::ZERO,
                ica_total: Decimal::ZERO,
                grand_total: grand,
                supplier_nit: supplier,
                customer_doc: customer,
                technical_key: key,
                environment: env,
            },
        )
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// Identical inputs always hash identically.
    #[test]
    fn deterministic(input in input_strategy()) {
        prop_assert_eq!(calculate(&input).unwrap(), calculate(&input).unwrap());
    }

    /// Output is always 96 lowercase hex characters.
    #[test]
    fn output_shape(input in input_strategy()) {
        let cufe = calculate(&input).unwrap();
        prop_assert_eq!(cufe.len(), 96);
        prop_assert!(cufe.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }

    /// Changing the invoice number changes the hash.
    #[test]
    fn sensitive_to_number(input in input_strategy()) {
        let mut other = input.clone();
        other.number = format!("{}X", other.number);
        prop_assert_ne!(calculate(&input).unwrap(), calculate(&other).unwrap());
    }

    /// Changing any monetary total changes the hash.
    #[test]
    fn sensitive_to_totals(input in input_strategy()) {
        let mut other = input.clone();
        other.grand_total += Decimal::new(1, 2);
        prop_assert_ne!(calculate(&input).unwrap(), calculate(&other).unwrap());
    }

    /// Changing the technical key changes the hash.
    #[test]
    fn sensitive_to_technical_key(input in input_strategy()) {
        let mut other = input.clone();
        other.technical_key = format!("{}0", other.technical_key);
        prop_assert_ne!(calculate(&input).unwrap(), calculate(&other).unwrap());
    }
}
