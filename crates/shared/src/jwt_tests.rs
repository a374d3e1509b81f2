//! Tests for JWT generation and validation.

use uuid::Uuid;

use crate::auth::ROLE_ADMIN;
use crate::jwt::{JwtConfig, JwtError, JwtService};

fn test_service() -> JwtService {
    JwtService::new(JwtConfig {
        secret: "test-secret-not-for-production".to_string(),
        expiration_minutes: 60,
        issuer: "andino-test".to_string(),
    })
}

#[test]
fn round_trips_claims() {
    let service = test_service();
    let user_id = Uuid::new_v4();
    let company_id = Uuid::new_v4();

    let token = service.generate(user_id, company_id, ROLE_ADMIN).unwrap();
    let claims = service.validate(&token).unwrap();

    assert_eq!(claims.sub, user_id);
    assert_eq!(claims.user_id, user_id);
    assert_eq!(claims.company_id, company_id);
    assert_eq!(claims.role, ROLE_ADMIN);
    assert_eq!(claims.iss, "andino-test");
}

#[test]
fn rejects_token_signed_with_other_secret() {
    let service = test_service();
    let other = JwtService::new(JwtConfig {
        secret: "a-different-secret".to_string(),
        expiration_minutes: 60,
        issuer: "andino-test".to_string(),
    });

    let token = other
        .generate(Uuid::new_v4(), Uuid::new_v4(), ROLE_ADMIN)
        .unwrap();

    assert!(matches!(service.validate(&token), Err(JwtError::Invalid(_))));
}

#[test]
fn rejects_wrong_issuer() {
    let service = test_service();
    let other = JwtService::new(JwtConfig {
        secret: "test-secret-not-for-production".to_string(),
        expiration_minutes: 60,
        issuer: "someone-else".to_string(),
    });

    let token = other
        .generate(Uuid::new_v4(), Uuid::new_v4(), ROLE_ADMIN)
        .unwrap();

    assert!(service.validate(&token).is_err());
}

#[test]
fn rejects_garbage() {
    let service = test_service();
    assert!(matches!(
        service.validate("not.a.token"),
        Err(JwtError::Invalid(_))
    ));
}
