//! Property tests for identity-token re-signing.

mod common;

use common::*;
use proptest::prelude::*;
use serde_json::{Map, Value};
use token_relay::jwt::{IdTokenResigner, TokenSigner};
use token_relay::keys::{KeySelector, load_signing_key};

fn resigner() -> IdTokenResigner {
    let config = test_config("http://127.0.0.1:9");
    let key = load_signing_key(&config, KeySelector::Intermediary).unwrap();
    IdTokenResigner::from_config(&config, TokenSigner::new(key))
}

fn arb_claim_value() -> impl Strategy<Value = Value> {
    prop_oneof![
        any::<bool>().prop_map(Value::from),
        any::<i64>().prop_map(Value::from),
        "[ -~]{0,24}".prop_map(Value::from),
        prop::collection::vec("[a-z]{1,8}", 0..4).prop_map(Value::from),
    ]
}

fn arb_claims() -> impl Strategy<Value = Map<String, Value>> {
    (
        prop::collection::btree_map("[a-z_]{1,12}", arb_claim_value(), 0..12),
        prop::option::of("[A-Za-z0-9]{1,32}"),
    )
        .prop_map(|(extra, nonce)| {
            let mut claims: Map<String, Value> = extra.into_iter().collect();
            claims.insert("iss".to_string(), Value::from(IDP_ISSUER));
            claims.insert("aud".to_string(), Value::from(IDP_CLIENT_ID));
            if let Some(nonce) = nonce {
                claims.insert("nonce".to_string(), Value::from(nonce));
            }
            claims
        })
}

const REWRITTEN: &[&str] = &["iss", "aud", "iat", "exp", "jti", "nonce"];

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    /// Re-signed claims never carry a nonce and keep every other claim.
    #[test]
    fn prop_nonce_removed_others_kept(claims in arb_claims(), now in 0i64..4_000_000_000) {
        let out = resigner().resign_claims(claims.clone(), now);

        prop_assert!(!out.contains_key("nonce"));
        for (name, value) in &claims {
            if !REWRITTEN.contains(&name.as_str()) {
                prop_assert_eq!(out.get(name), Some(value));
            }
        }
    }

    /// Issuer, audience and lifetime are always the relay's.
    #[test]
    fn prop_identity_rewritten(claims in arb_claims(), now in 0i64..4_000_000_000) {
        let out = resigner().resign_claims(claims, now);

        prop_assert_eq!(out["iss"].as_str(), Some(RELAY_ISSUER));
        prop_assert_eq!(out["aud"].as_str(), Some(IDP_CLIENT_ID));
        prop_assert_eq!(out["iat"].as_i64(), Some(now));
        prop_assert_eq!(out["exp"].as_i64(), Some(now + 120));
        prop_assert!(out["jti"].as_str().is_some_and(|jti| jti.len() == 36));
    }
}

#[test]
fn test_same_input_different_moments() {
    let resigner = resigner();
    let claims = idp_claims(Some("abc")).as_object().cloned().unwrap();

    let first = resigner.resign_claims(claims.clone(), 1_000);
    let second = resigner.resign_claims(claims, 1_001);
    assert_ne!(first["jti"], second["jti"]);
    assert_ne!(first["iat"], second["iat"]);
}
