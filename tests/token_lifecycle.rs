//! Session engine behaviour exercised through the library API with a
//! manually driven clock.

use std::sync::Arc;
use std::thread;

use chrono::Duration;
use uuid::Uuid;

use session_guard::auth::{
    Claims, FamilyState, TokenCodec, TokenPair, TokenService, TokenType,
};
use session_guard::clock::{Clock, ManualClock};
use session_guard::configuration::JwtSettings;
use session_guard::error::{AppError, AuthError};
use session_guard::fingerprint::Fingerprint;

fn jwt_settings() -> JwtSettings {
    JwtSettings {
        access_secret: "lifecycle-access-secret-32-characters".to_string(),
        refresh_secret: "lifecycle-refresh-secret-32-characters".to_string(),
        access_token_expiry: 300,
        refresh_token_expiry: 86400,
        family_max_lifetime: 604800,
        issuer: "test".to_string(),
        bind_access_to_fingerprint: true,
    }
}

fn setup() -> (Arc<TokenService>, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::default());
    let service = TokenService::new(jwt_settings(), clock.clone()).expect("Invalid settings");
    (Arc::new(service), clock)
}

fn browser() -> Fingerprint {
    Fingerprint::from_parts("198.51.100.4", "Mozilla/5.0 (X11; Linux x86_64)")
}

fn kind(result: Result<TokenPair, AppError>) -> Option<AuthError> {
    result.err().and_then(|e| e.auth_kind())
}

#[test]
fn login_rotate_replay_scenario() {
    let (service, _) = setup();

    // login: (A1, R1) in family F
    let first = service.issue_initial_tokens("user-7", browser()).unwrap();
    let family_id = first.family_id;

    // rotate with R1: (A2, R2), generation 2
    let second = service.rotate(&first.refresh_token, &browser()).unwrap();
    assert_eq!(second.family_id, family_id);
    assert_eq!(service.families().get(&family_id).unwrap().generation, 2);

    // attacker replays R1
    assert_eq!(
        kind(service.rotate(&first.refresh_token, &browser())),
        Some(AuthError::FamilyCompromised)
    );

    // legitimate holder's R2 is dead as well
    let legit = kind(service.rotate(&second.refresh_token, &browser()));
    assert!(matches!(
        legit,
        Some(AuthError::InvalidTokenFamily) | Some(AuthError::FamilyCompromised)
    ));
    assert_eq!(service.families().state(&family_id), Some(FamilyState::Compromised));

    // and so is every access token of the family
    assert_eq!(
        service.verify_access(&second.access_token, None),
        Err(AuthError::FamilyCompromised)
    );

    // a fresh login starts an unrelated, healthy family
    let fresh = service.issue_initial_tokens("user-7", browser()).unwrap();
    assert_ne!(fresh.family_id, family_id);
    assert!(service.rotate(&fresh.refresh_token, &browser()).is_ok());
}

#[test]
fn exactly_one_refresh_token_is_valid_at_a_time() {
    let (service, _) = setup();
    let mut pair = service.issue_initial_tokens("user-1", browser()).unwrap();

    for expected_generation in 2..=6 {
        let next = service.rotate(&pair.refresh_token, &browser()).unwrap();
        let record = service.families().get(&pair.family_id).unwrap();
        assert_eq!(record.generation, expected_generation);
        pair = next;
    }
}

#[test]
fn fingerprint_mismatch_rejects_valid_refresh_token() {
    let (service, _) = setup();
    let pair = service.issue_initial_tokens("user-1", browser()).unwrap();
    let elsewhere = Fingerprint::from_parts("203.0.113.50", "Mozilla/5.0 (X11; Linux x86_64)");

    for _ in 0..3 {
        assert_eq!(
            kind(service.rotate(&pair.refresh_token, &elsewhere)),
            Some(AuthError::FingerprintMismatch)
        );
    }
    assert_eq!(service.families().state(&pair.family_id), Some(FamilyState::Active));
}

#[test]
fn access_token_with_refresh_type_is_rejected() {
    let (service, _) = setup();
    let pair = service.issue_initial_tokens("user-1", browser()).unwrap();

    assert_eq!(
        service.verify_access(&pair.refresh_token, Some(&browser())),
        Err(AuthError::WrongTokenType)
    );
}

#[test]
fn invalidation_lasts_until_expiry_then_is_swept() {
    let (service, clock) = setup();
    let baseline = service.invalidations().len();
    let token_id = Uuid::new_v4();
    let expires_at = clock.now() + Duration::minutes(10);

    service.invalidate(token_id, expires_at, None);
    assert!(service.invalidations().is_invalidated(&token_id));

    clock.advance(Duration::minutes(9));
    service.purge_expired();
    assert!(service.invalidations().is_invalidated(&token_id));

    clock.advance(Duration::minutes(1));
    let report = service.purge_expired();
    assert_eq!(report.invalidated_removed, 1);
    assert!(!service.invalidations().is_invalidated(&token_id));
    assert_eq!(service.invalidations().len(), baseline);
}

#[test]
fn codec_round_trip_then_expiry() {
    let clock = ManualClock::default();
    let codec = TokenCodec::new(&jwt_settings()).unwrap();
    let claims = Claims::new(
        "user-9",
        Uuid::new_v4(),
        TokenType::Refresh,
        Uuid::new_v4(),
        browser(),
        clock.now(),
        120,
        "test",
    );

    let token = codec.issue(&claims).unwrap();
    assert_eq!(codec.decode(&token, TokenType::Refresh, clock.now()), Ok(claims));

    clock.advance(Duration::seconds(120));
    assert_eq!(
        codec.decode(&token, TokenType::Refresh, clock.now()),
        Err(AuthError::ExpiredToken)
    );
}

#[test]
fn concurrent_rotation_with_stale_token_never_succeeds() {
    let (service, _) = setup();
    let first = service.issue_initial_tokens("user-1", browser()).unwrap();
    service.rotate(&first.refresh_token, &browser()).unwrap();

    let successes: usize = thread::scope(|scope| {
        let handles: Vec<_> = (0..16)
            .map(|_| {
                let service = &service;
                let stale = first.refresh_token.as_str();
                scope.spawn(move || service.rotate(stale, &browser()).is_ok() as usize)
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).sum()
    });

    assert_eq!(successes, 0);
    assert_eq!(
        service.families().state(&first.family_id),
        Some(FamilyState::Compromised)
    );
}

#[test]
fn concurrent_rotation_with_current_token_succeeds_at_most_once() {
    let (service, _) = setup();
    let pair = service.issue_initial_tokens("user-1", browser()).unwrap();

    let results: Vec<Result<TokenPair, AppError>> = thread::scope(|scope| {
        let handles: Vec<_> = (0..16)
            .map(|_| {
                let service = &service;
                let current = pair.refresh_token.as_str();
                scope.spawn(move || service.rotate(current, &browser()))
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    let successes = results.iter().filter(|r| r.is_ok()).count();
    assert!(successes <= 1);
    assert_eq!(successes, 1);

    // every loser saw the winner's update
    for result in results.into_iter().filter(|r| r.is_err()) {
        let kind = kind(result).unwrap();
        assert!(matches!(
            kind,
            AuthError::FamilyCompromised | AuthError::InvalidTokenFamily | AuthError::TokenRevoked
        ));
    }
}

#[test]
fn missing_secret_is_a_startup_error() {
    let mut settings = jwt_settings();
    settings.access_secret = String::new();

    let clock: Arc<dyn Clock> = Arc::new(ManualClock::default());
    assert!(TokenService::new(settings, clock).is_err());
}
