mod common;

use aniguard::entities::{login_attempts, security_logs, users};
use aniguard::services::tokens::hash_token;
use axum::http::StatusCode;
use common::{TEST_PASSWORD, spawn_app};
use sea_orm::{ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter};
use serde_json::json;

async fn user_row(app: &common::TestApp, email: &str) -> users::Model {
    users::Entity::find()
        .filter(users::Column::Email.eq(email))
        .one(&app.state.store.conn)
        .await
        .unwrap()
        .expect("user row")
}

async fn attempt_count(app: &common::TestApp) -> u64 {
    login_attempts::Entity::find()
        .count(&app.state.store.conn)
        .await
        .unwrap()
}

#[tokio::test]
async fn login_returns_tokens_and_profile() {
    let app = spawn_app().await;
    app.register("Aki@Example.com", TEST_PASSWORD).await;

    let (status, body) = app.login("aki@example.com", TEST_PASSWORD).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);

    let data = &body["data"];
    assert!(data["token"].as_str().is_some_and(|t| !t.is_empty()));
    assert!(data["session_token"].as_str().is_some_and(|t| t.len() >= 43));
    assert_eq!(data["user"]["email"], "aki@example.com");
    assert_eq!(data["user"]["provider"], "email");
    assert!(data["user"].get("password_hash").is_none());

    let token = data["token"].as_str().unwrap();
    let (status, verify) = app
        .request("GET", "/api/auth?action=verify", Some(token), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(verify["data"]["valid"], true);
    assert_eq!(verify["data"]["user_id"], data["user"]["id"]);

    let (status, me) = app.request("GET", "/api/auth?action=me", Some(token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(me["data"]["email"], "aki@example.com");
}

#[tokio::test]
async fn unknown_email_and_wrong_password_look_the_same() {
    let app = spawn_app().await;
    app.register("aki@example.com", TEST_PASSWORD).await;

    let (status_unknown, unknown) = app.login("nobody@example.com", TEST_PASSWORD).await;
    let (status_wrong, wrong) = app.login("aki@example.com", "wrong password").await;

    assert_eq!(status_unknown, StatusCode::UNAUTHORIZED);
    assert_eq!(status_wrong, StatusCode::UNAUTHORIZED);
    assert_eq!(unknown, wrong);
}

#[tokio::test]
async fn every_login_appends_one_attempt_row() {
    let app = spawn_app().await;
    app.register("aki@example.com", TEST_PASSWORD).await;

    let before = attempt_count(&app).await;
    app.login("aki@example.com", TEST_PASSWORD).await;
    assert_eq!(attempt_count(&app).await, before + 1);

    app.login("aki@example.com", "nope nope").await;
    assert_eq!(attempt_count(&app).await, before + 2);

    app.login("ghost@example.com", "nope nope").await;
    assert_eq!(attempt_count(&app).await, before + 3);
}

#[tokio::test]
async fn fifth_failure_locks_the_account() {
    let app = spawn_app().await;
    app.register("aki@example.com", TEST_PASSWORD).await;

    for _ in 0..5 {
        let (status, _) = app.login("aki@example.com", "wrong password").await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    let row = user_row(&app, "aki@example.com").await;
    assert_eq!(row.failed_login_attempts, 5);
    let until = row.locked_until.expect("account should be locked");
    let minutes = (until - chrono::Utc::now()).num_minutes();
    assert!((28..=30).contains(&minutes), "lock lasts {minutes} minutes");

    // Correct password while locked is still refused, counter untouched
    let (status, body) = app.login("aki@example.com", TEST_PASSWORD).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert!(body["error"].as_str().unwrap().contains("locked until"));
    assert_eq!(user_row(&app, "aki@example.com").await.failed_login_attempts, 5);
}

#[tokio::test]
async fn successful_login_resets_failure_counter() {
    let app = spawn_app().await;
    app.register("aki@example.com", TEST_PASSWORD).await;

    app.login("aki@example.com", "wrong password").await;
    app.login("aki@example.com", "wrong password").await;
    assert_eq!(user_row(&app, "aki@example.com").await.failed_login_attempts, 2);

    let (status, _) = app.login("aki@example.com", TEST_PASSWORD).await;
    assert_eq!(status, StatusCode::OK);

    let row = user_row(&app, "aki@example.com").await;
    assert_eq!(row.failed_login_attempts, 0);
    assert!(row.locked_until.is_none());
    assert!(row.last_login.is_some());
}

#[tokio::test]
async fn repeated_failures_from_one_address_are_rate_limited() {
    let app = spawn_app().await;

    for i in 0..10 {
        let (status, _) = app.login(&format!("ghost{i}@example.com"), "x").await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    let (status, body) = app.login("ghost@example.com", "x").await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(body["success"], false);

    let flagged = security_logs::Entity::find()
        .filter(security_logs::Column::EventType.eq("blocked_ip_attempt"))
        .filter(security_logs::Column::IpAddress.eq("203.0.113.10"))
        .filter(security_logs::Column::Severity.eq("high"))
        .count(&app.state.store.conn)
        .await
        .unwrap();
    assert_eq!(flagged, 1);

    let throttled = login_attempts::Entity::find()
        .filter(login_attempts::Column::FailureReason.eq("rate_limited"))
        .count(&app.state.store.conn)
        .await
        .unwrap();
    assert_eq!(throttled, 1);
}

#[tokio::test]
async fn callers_without_peer_address_share_no_rate_limit() {
    let app = spawn_app().await;
    let login = |i: usize| {
        json!({ "action": "login", "email": format!("ghost{i}@example.com"), "password": "x" })
    };

    for i in 0..12 {
        let (status, _) = app
            .request_from(None, "POST", "/api/auth", None, Some(login(i)))
            .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }
}

#[tokio::test]
async fn duplicate_registration_is_rejected() {
    let app = spawn_app().await;
    app.register("aki@example.com", TEST_PASSWORD).await;

    let (status, body) = app
        .post_auth(
            None,
            json!({
                "action": "register",
                "email": "AKI@example.com ",
                "password": "another password",
                "username": "Copycat",
            }),
        )
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "User with this email already exists");

    let count = users::Entity::find()
        .count(&app.state.store.conn)
        .await
        .unwrap();
    assert_eq!(count, 1);
}

#[tokio::test]
async fn registration_validates_input() {
    let app = spawn_app().await;

    let (status, _) = app
        .post_auth(
            None,
            json!({ "action": "register", "email": "not-an-email", "password": TEST_PASSWORD, "username": "x" }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = app
        .post_auth(
            None,
            json!({ "action": "register", "email": "a@example.com", "password": "short", "username": "x" }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("at least 8"));
}

#[tokio::test]
async fn forgot_password_does_not_reveal_accounts() {
    let app = spawn_app().await;
    app.register("aki@example.com", TEST_PASSWORD).await;

    let (status_known, known) = app
        .post_auth(None, json!({ "action": "forgot_password", "email": "aki@example.com" }))
        .await;
    let (status_unknown, unknown) = app
        .post_auth(None, json!({ "action": "forgot_password", "email": "nobody@example.com" }))
        .await;

    assert_eq!(status_known, StatusCode::OK);
    assert_eq!(status_unknown, StatusCode::OK);
    assert_eq!(known.to_string(), unknown.to_string());

    let mails = app.mailer.messages();
    assert_eq!(mails.len(), 1);
    assert_eq!(mails[0].to, "aki@example.com");
    assert!(mails[0].body.contains("https://anime.example/reset-password?token="));
}

fn reset_token_from(body: &str) -> String {
    body.split("token=")
        .nth(1)
        .and_then(|rest| rest.split_whitespace().next())
        .expect("reset link in mail")
        .to_string()
}

#[tokio::test]
async fn reset_token_works_exactly_once() {
    let app = spawn_app().await;
    app.register("aki@example.com", TEST_PASSWORD).await;

    app.post_auth(None, json!({ "action": "forgot_password", "email": "aki@example.com" }))
        .await;
    let token = reset_token_from(&app.mailer.messages()[0].body);

    let (status, _) = app
        .post_auth(
            None,
            json!({ "action": "reset_password", "token": token, "password": "brand new secret" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = app
        .post_auth(
            None,
            json!({ "action": "reset_password", "token": token, "password": "second attempt pw" }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Invalid or expired reset token");

    let (status, _) = app.login("aki@example.com", "second attempt pw").await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    let (status, _) = app.login("aki@example.com", "brand new secret").await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = app.login("aki@example.com", TEST_PASSWORD).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn reset_clears_lock_and_failure_counter() {
    let app = spawn_app().await;
    app.register("aki@example.com", TEST_PASSWORD).await;
    for _ in 0..5 {
        app.login("aki@example.com", "wrong password").await;
    }
    assert!(user_row(&app, "aki@example.com").await.locked_until.is_some());

    app.post_auth(None, json!({ "action": "forgot_password", "email": "aki@example.com" }))
        .await;
    let token = reset_token_from(&app.mailer.messages()[0].body);
    let (status, _) = app
        .post_auth(
            None,
            json!({ "action": "reset_password", "token": token, "new_password": "brand new secret" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let row = user_row(&app, "aki@example.com").await;
    assert_eq!(row.failed_login_attempts, 0);
    assert!(row.locked_until.is_none());

    let (status, _) = app.login("aki@example.com", "brand new secret").await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn expired_reset_token_is_rejected() {
    let app = spawn_app().await;
    let registered = app.register("aki@example.com", TEST_PASSWORD).await;
    let user_id = registered["user"]["id"].as_str().unwrap();

    let raw = "expired-reset-token-value";
    app.state
        .store
        .create_reset_token(
            user_id,
            hash_token(raw),
            chrono::Utc::now() - chrono::Duration::minutes(1),
        )
        .await
        .unwrap();

    let (status, body) = app
        .post_auth(
            None,
            json!({ "action": "reset_password", "token": raw, "password": "brand new secret" }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Invalid or expired reset token");

    let (status, _) = app.login("aki@example.com", TEST_PASSWORD).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn logout_ends_the_session_and_is_audited() {
    let app = spawn_app().await;
    let registered = app.register("aki@example.com", TEST_PASSWORD).await;
    let user_id = registered["user"]["id"].as_str().unwrap();
    let session = registered["session_token"].as_str().unwrap();

    let (status, _) = app
        .post_auth(None, json!({ "action": "logout", "session_token": session }))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert!(
        app.state
            .store
            .find_active_session(&hash_token(session))
            .await
            .unwrap()
            .is_none()
    );

    // A second logout of the same session is a silent no-op
    let (status, _) = app
        .post_auth(None, json!({ "action": "logout", "session_token": session }))
        .await;
    assert_eq!(status, StatusCode::OK);

    let events = app
        .state
        .store
        .security_events_for_user(user_id, 10)
        .await
        .unwrap();
    let logouts = events.iter().filter(|e| e.event_type == "logout").count();
    assert_eq!(logouts, 1);
}

#[tokio::test]
async fn logout_all_ends_every_session() {
    let app = spawn_app().await;
    let registered = app.register("aki@example.com", TEST_PASSWORD).await;
    let (_, login) = app.login("aki@example.com", TEST_PASSWORD).await;
    let token = login["data"]["token"].as_str().unwrap();

    let (status, body) = app
        .post_auth(Some(token), json!({ "action": "logout_all" }))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["sessions_ended"], 2);

    // Already expired sessions are not counted twice
    let (_, body) = app
        .post_auth(Some(token), json!({ "action": "logout_all" }))
        .await;
    assert_eq!(body["data"]["sessions_ended"], 0);

    let session = registered["session_token"].as_str().unwrap();
    let (status, _) = app
        .post_auth(None, json!({ "action": "logout", "session_token": session }))
        .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn token_is_required_for_account_commands() {
    let app = spawn_app().await;

    let (status, _) = app.request("GET", "/api/auth?action=me", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = app
        .request("GET", "/api/auth?action=me", Some("not.a.token"), None)
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = app
        .post_auth(None, json!({ "action": "update_profile", "bio": "hi" }))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn malformed_requests_are_validation_errors() {
    let app = spawn_app().await;

    let (status, body) = app.post_auth(None, json!({ "action": "drop_tables" })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);

    let (status, _) = app.request("GET", "/api/auth?action=whoami", Some("t"), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn profile_update_and_password_change() {
    let app = spawn_app().await;
    let session = app.register("aki@example.com", TEST_PASSWORD).await;
    let token = session["token"].as_str().unwrap();

    let (status, body) = app
        .post_auth(
            Some(token),
            json!({ "action": "update_profile", "username": "Akira", "bio": "Watching everything" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["username"], "Akira");
    assert_eq!(body["data"]["bio"], "Watching everything");

    let (status, _) = app
        .post_auth(
            Some(token),
            json!({ "action": "change_password", "current_password": "wrong one", "new_password": "fresh password" }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app
        .post_auth(
            Some(token),
            json!({ "action": "change_password", "current_password": TEST_PASSWORD, "new_password": "fresh password" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = app.login("aki@example.com", "fresh password").await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn health_reports_database() {
    let app = spawn_app().await;
    let (status, body) = app.request("GET", "/api/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["database"], true);
}
