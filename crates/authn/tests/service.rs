//! End-to-end behaviour of the authentication service: issuance round
//! trips, key rotation, cache population under concurrency and the
//! built-in authorization rules.
#![allow(clippy::expect_used, clippy::panic)]

mod common;

use std::{sync::Arc, time::Duration};

use asperitas_authn::{
    AuthError, AuthService, Role, UserId,
    policy::{RULE_ADMIN_ONLY, RULE_ANY, RULE_SELF_OR_ADMIN, RULE_USER_ONLY},
};
use asperitas_keystore::{
    KeyPair, MemoryKeyStore,
    testutil::{CountingKeySource, second_test_key_pair, store_with_key, test_key_pair},
};
use common::{PRIMARY_KID, alice, bearer, bob, claims_for, config, service_over, sign_with};
use proptest::prelude::*;
use rstest::rstest;

#[rstest]
#[case::no_roles(&[])]
#[case::user(&[Role::User])]
#[case::admin(&[Role::Admin])]
#[case::both(&[Role::Admin, Role::User])]
#[tokio::test]
async fn test_generate_then_authenticate_round_trips(#[case] roles: &[Role]) {
    let (service, _) = service_over(store_with_key(PRIMARY_KID));
    let claims = claims_for(alice(), roles);

    let token = service.generate_token(&claims).await.expect("generate");
    let authenticated = service.authenticate(&bearer(&token)).await.expect("authenticate");

    assert_eq!(authenticated, claims);
}

#[tokio::test]
async fn test_second_authentication_is_served_from_cache() {
    let (service, source) = service_over(store_with_key(PRIMARY_KID));
    let token = service.generate_token(&claims_for(alice(), &[Role::User])).await.expect("generate");

    service.authenticate(&bearer(&token)).await.expect("first");
    service.authenticate(&bearer(&token)).await.expect("second");

    assert_eq!(source.public_calls(), 1);
    assert_eq!(service.key_cache().len(), 1);
}

#[tokio::test]
async fn test_tokens_signed_before_rotation_stay_valid() {
    let store = MemoryKeyStore::new();
    store.insert("2024-q1", test_key_pair());
    store.insert("2024-q2", second_test_key_pair());
    let source: Arc<MemoryKeyStore> = Arc::new(store);

    let before = AuthService::with_builtin_rules(config("2024-q1"), source.clone());
    let old_token = before.generate_token(&claims_for(alice(), &[Role::User])).await.expect("old");

    let after = AuthService::with_builtin_rules(config("2024-q2"), source);
    let new_token = after.generate_token(&claims_for(bob(), &[Role::User])).await.expect("new");

    assert_eq!(asperitas_authn::token::peek_kid(&new_token).expect("kid"), "2024-q2");
    assert_eq!(after.authenticate(&bearer(&old_token)).await.expect("old").user(), &alice());
    assert_eq!(after.authenticate(&bearer(&new_token)).await.expect("new").user(), &bob());
    assert_eq!(after.key_cache().kids(), vec!["2024-q1".to_owned(), "2024-q2".to_owned()]);
}

#[tokio::test]
async fn test_cached_key_survives_removal_from_source() {
    let store = store_with_key(PRIMARY_KID);
    let (service, _) = service_over(store.clone());
    let token = service.generate_token(&claims_for(alice(), &[Role::User])).await.expect("generate");

    service.authenticate(&bearer(&token)).await.expect("populate cache");
    store.remove(PRIMARY_KID);

    assert!(service.authenticate(&bearer(&token)).await.is_ok());
    assert!(matches!(
        service.generate_token(&claims_for(alice(), &[Role::User])).await,
        Err(AuthError::KeyLookup { .. })
    ));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_first_use_populates_single_entry() {
    let source = CountingKeySource::new(store_with_key(PRIMARY_KID));
    source.set_delay(Some(Duration::from_millis(25)));
    let service = Arc::new(AuthService::with_builtin_rules(config(PRIMARY_KID), source.clone()));
    let token = sign_with(&test_key_pair(), PRIMARY_KID, &claims_for(alice(), &[Role::User]));

    let tasks: Vec<_> = (0..16)
        .map(|_| {
            let service = Arc::clone(&service);
            let header = bearer(&token);
            tokio::spawn(async move { service.authenticate(&header).await })
        })
        .collect();

    for task in tasks {
        let claims = task.await.expect("join").expect("authenticate");
        assert_eq!(claims.user(), &alice());
    }

    let expected = test_key_pair().public_pem().expect("public pem");
    assert_eq!(service.key_cache().len(), 1);
    assert_eq!(&*service.key_cache().get(PRIMARY_KID).expect("cached"), expected);
    assert!((1..=16).contains(&source.public_calls()));
}

#[tokio::test]
async fn test_directory_keystore_end_to_end() {
    let dir = tempfile::tempdir().expect("tempdir");
    let pair: KeyPair = test_key_pair();
    pair.write_to(dir.path(), &format!("{PRIMARY_KID}.pem"), &format!("{PRIMARY_KID}.pub"))
        .expect("write keys");

    let store = MemoryKeyStore::from_dir(dir.path()).expect("load keys");
    assert_eq!(store.kids(), vec![PRIMARY_KID.to_owned()]);

    let (service, _) = service_over(store);
    let token = service.generate_token(&claims_for(alice(), &[Role::Admin])).await.expect("generate");
    let claims = service.authenticate(&bearer(&token)).await.expect("authenticate");
    assert!(claims.is_admin());
}

#[rstest]
#[case::any_with_role(RULE_ANY, &[Role::User], false, true)]
#[case::any_without_role(RULE_ANY, &[], true, false)]
#[case::admin_only_user(RULE_ADMIN_ONLY, &[Role::User], true, false)]
#[case::admin_only_admin(RULE_ADMIN_ONLY, &[Role::Admin], false, true)]
#[case::user_only_user(RULE_USER_ONLY, &[Role::User], false, true)]
#[case::user_only_admin(RULE_USER_ONLY, &[Role::Admin], true, false)]
#[case::self_on_self(RULE_SELF_OR_ADMIN, &[Role::User], true, true)]
#[case::self_on_other(RULE_SELF_OR_ADMIN, &[Role::User], false, false)]
#[case::admin_on_other(RULE_SELF_OR_ADMIN, &[Role::Admin], false, true)]
#[tokio::test]
async fn test_authorize_with_authenticated_claims(
    #[case] rule: &str,
    #[case] roles: &[Role],
    #[case] target_self: bool,
    #[case] allowed: bool,
) {
    let (service, _) = service_over(store_with_key(PRIMARY_KID));
    let token = service.generate_token(&claims_for(alice(), roles)).await.expect("generate");
    let claims = service.authenticate(&bearer(&token)).await.expect("authenticate");
    let target = if target_self { alice().id } else { bob().id };

    let result = service.authorize(&claims, target, rule).await;

    if allowed {
        assert!(result.is_ok(), "{rule} should allow, got {result:?}");
    } else {
        assert!(matches!(result, Err(AuthError::AuthorizationFailed)), "{rule}: {result:?}");
    }
}

fn arb_roles() -> impl Strategy<Value = Vec<Role>> {
    proptest::collection::vec(prop_oneof![Just(Role::Admin), Just(Role::User)], 0..=2)
}

proptest! {
    #[test]
    fn self_or_admin_allows_exactly_owner_or_admin(
        subject in any::<u128>(),
        target in any::<u128>(),
        same in any::<bool>(),
        roles in arb_roles(),
    ) {
        let runtime = tokio::runtime::Builder::new_current_thread().build().expect("runtime");
        let (service, _) = service_over(MemoryKeyStore::new());

        let user = asperitas_authn::User { id: UserId::from_u128(subject), username: "p".into() };
        let claims = claims_for(user, &roles);
        let target = if same { UserId::from_u128(subject) } else { UserId::from_u128(target) };

        let allowed = runtime
            .block_on(service.authorize(&claims, target, RULE_SELF_OR_ADMIN))
            .is_ok();
        let expected = roles.contains(&Role::Admin) || target == claims.subject();
        prop_assert_eq!(allowed, expected);
    }
}
