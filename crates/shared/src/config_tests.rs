//! Tests for configuration helpers.

use crate::config::DianAppEnv;

#[test]
fn parses_known_app_envs() {
    assert_eq!(DianAppEnv::parse("dev"), Some(DianAppEnv::Dev));
    assert_eq!(DianAppEnv::parse("TEST"), Some(DianAppEnv::Test));
    assert_eq!(DianAppEnv::parse(" prod "), Some(DianAppEnv::Prod));
}

#[test]
fn empty_app_env_defaults_to_dev() {
    assert_eq!(DianAppEnv::parse(""), Some(DianAppEnv::Dev));
}

#[test]
fn unknown_app_env_is_rejected() {
    assert_eq!(DianAppEnv::parse("staging"), None);
    assert_eq!(DianAppEnv::parse("production"), None);
}
