//! Admin user-management integration tests.
//!
//! These run against a live Postgres with the migrations applied and are
//! ignored by default; set DATABASE_URL and run with `cargo test -- --ignored`.

use actix_cors::Cors;
use actix_web::middleware::Logger;
use actix_web::{test, web, App};
use dotenv::dotenv;
use serde_json::json;
use sqlx::PgPool;
use uuid::Uuid;

use taskboard::auth::{AuthResponse, TokenAuthority, TokenBlocklist};
use taskboard::config::Config;
use taskboard::models::Role;
use taskboard::routes;
use taskboard::routes::health;
use taskboard::routes::users::delete_user_cascade;

const TEST_PASSWORD: &str = "Password123!";

macro_rules! build_app {
    ($pool:expr, $authority:expr, $config:expr) => {
        test::init_service(
            App::new()
                .app_data(web::Data::new($pool.clone()))
                .app_data($authority.clone())
                .app_data($config.clone())
                .wrap(
                    Cors::default()
                        .allow_any_origin()
                        .allow_any_method()
                        .allow_any_header()
                        .max_age(3600),
                )
                .wrap(Logger::default())
                .service(health::health)
                .service(
                    web::scope("/api")
                        .wrap(taskboard::auth::AuthMiddleware)
                        .configure(routes::config),
                ),
        )
    };
}

// Resolves middleware short-circuits and handler errors to one status.
macro_rules! call_status {
    ($app:expr, $req:expr) => {
        match test::try_call_service($app, $req).await {
            Ok(resp) => resp.status(),
            Err(err) => err.error_response().status(),
        }
    };
}

async fn connect() -> PgPool {
    dotenv().ok();
    let database_url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set for tests");
    PgPool::connect(&database_url)
        .await
        .expect("Failed to connect to test DB")
}

fn test_config() -> web::Data<Config> {
    let upload_dir = std::env::temp_dir().join("taskboard-it-uploads");
    std::fs::create_dir_all(&upload_dir).expect("Failed to create test upload dir");
    web::Data::new(Config {
        database_url: String::new(),
        server_host: "127.0.0.1".to_string(),
        server_port: 8080,
        jwt_secret: "integration-test-secret".to_string(),
        token_ttl_secs: 3600,
        upload_dir,
        max_file_uploads: 3,
        allowed_extensions: ["pdf".to_string()].into_iter().collect(),
        default_page_size: 10,
    })
}

fn test_authority() -> web::Data<TokenAuthority> {
    web::Data::new(TokenAuthority::new(
        "integration-test-secret",
        3600,
        TokenBlocklist::new(),
    ))
}

async fn seed_user(pool: &PgPool, email: &str, role: Role) -> i32 {
    let password_hash = taskboard::auth::hash_password(TEST_PASSWORD).unwrap();
    sqlx::query_scalar::<_, i32>(
        "INSERT INTO users (email, password_hash, role) VALUES ($1, $2, $3) RETURNING id",
    )
    .bind(email)
    .bind(password_hash)
    .bind(role)
    .fetch_one(pool)
    .await
    .expect("Failed to seed user")
}

async fn seed_task(pool: &PgPool, title: &str, creator: i32, assignee: Option<i32>) -> Uuid {
    let id = Uuid::new_v4();
    sqlx::query("INSERT INTO tasks (id, title, user_id, assigned_to) VALUES ($1, $2, $3, $4)")
        .bind(id)
        .bind(title)
        .bind(creator)
        .bind(assignee)
        .execute(pool)
        .await
        .expect("Failed to seed task");
    id
}

async fn cleanup_users(pool: &PgPool, emails: &[&str]) {
    for email in emails {
        let id = sqlx::query_scalar::<_, i32>("SELECT id FROM users WHERE email = $1")
            .bind(email)
            .fetch_optional(pool)
            .await
            .unwrap();
        if let Some(id) = id {
            let _ = delete_user_cascade(pool, id).await;
        }
    }
}

async fn login(
    app: &impl actix_web::dev::Service<
        actix_http::Request,
        Response = actix_web::dev::ServiceResponse<impl actix_web::body::MessageBody>,
        Error = actix_web::Error,
    >,
    email: &str,
    password: &str,
) -> String {
    let req = test::TestRequest::post()
        .uri("/api/auth/login")
        .set_json(json!({ "email": email, "password": password }))
        .to_request();
    let resp = test::call_service(app, req).await;
    assert!(resp.status().is_success(), "Login failed for {}", email);
    let auth: AuthResponse = test::read_body_json(resp).await;
    format!("Bearer {}", auth.token)
}

// Requires a running Postgres; run with `cargo test -- --ignored`.
#[ignore]
#[actix_rt::test]
async fn test_user_endpoints_require_authentication() {
    let pool = connect().await;
    let (authority, config) = (test_authority(), test_config());
    let app = build_app!(pool, authority, config).await;

    let req = test::TestRequest::get().uri("/api/users").to_request();
    assert_eq!(call_status!(&app, req), 401);
}

// Requires a running Postgres; run with `cargo test -- --ignored`.
#[ignore]
#[actix_rt::test]
async fn test_user_list_non_admin_denied() {
    let pool = connect().await;
    let (authority, config) = (test_authority(), test_config());
    let app = build_app!(pool, authority, config).await;

    let email = "users_it_plain@example.com";
    cleanup_users(&pool, &[email]).await;
    seed_user(&pool, email, Role::User).await;
    let token = login(&app, email, TEST_PASSWORD).await;

    let req = test::TestRequest::get()
        .uri("/api/users")
        .append_header(("Authorization", token))
        .to_request();
    assert_eq!(call_status!(&app, req), 403);

    cleanup_users(&pool, &[email]).await;
}

// Requires a running Postgres; run with `cargo test -- --ignored`.
#[ignore]
#[actix_rt::test]
async fn test_user_list_admin_success_excludes_password() {
    let pool = connect().await;
    let (authority, config) = (test_authority(), test_config());
    let app = build_app!(pool, authority, config).await;

    let emails = [
        "users_it_admin@example.com",
        "users_it_one@example.com",
        "users_it_two@example.com",
    ];
    cleanup_users(&pool, &emails).await;
    seed_user(&pool, emails[0], Role::Admin).await;
    seed_user(&pool, emails[1], Role::User).await;
    seed_user(&pool, emails[2], Role::User).await;

    let token = login(&app, emails[0], TEST_PASSWORD).await;
    let req = test::TestRequest::get()
        .uri("/api/users")
        .append_header(("Authorization", token))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 200);

    let users: Vec<serde_json::Value> = test::read_body_json(resp).await;
    assert!(users.len() >= 3);
    for user in &users {
        assert!(user.get("email").is_some());
        assert!(user.get("role").is_some());
        assert!(user.get("password").is_none());
        assert!(user.get("password_hash").is_none());
    }

    cleanup_users(&pool, &emails).await;
}

// Requires a running Postgres; run with `cargo test -- --ignored`.
#[ignore]
#[actix_rt::test]
async fn test_user_get_update_and_password_round_trip() {
    let pool = connect().await;
    let (authority, config) = (test_authority(), test_config());
    let app = build_app!(pool, authority, config).await;

    let admin_email = "users_it_update_admin@example.com";
    let target_email = "users_it_update_target@example.com";
    cleanup_users(&pool, &[admin_email, target_email]).await;
    seed_user(&pool, admin_email, Role::Admin).await;
    let target_id = seed_user(&pool, target_email, Role::User).await;

    let token = login(&app, admin_email, TEST_PASSWORD).await;

    // Fetch one user
    let req = test::TestRequest::get()
        .uri(&format!("/api/users/{}", target_id))
        .append_header(("Authorization", token.clone()))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 200);
    let body: serde_json::Value = test::read_body_json(resp).await;
    assert_eq!(body["email"], target_email);

    // Malformed id is a 400, not a 404
    let req = test::TestRequest::get()
        .uri("/api/users/not-a-number")
        .append_header(("Authorization", token.clone()))
        .to_request();
    assert_eq!(call_status!(&app, req), 400);

    // Empty update body is a 400
    let req = test::TestRequest::put()
        .uri(&format!("/api/users/{}", target_id))
        .append_header(("Authorization", token.clone()))
        .set_json(json!({}))
        .to_request();
    assert_eq!(call_status!(&app, req), 400);

    // A role outside {user, admin} is rejected
    let req = test::TestRequest::put()
        .uri(&format!("/api/users/{}", target_id))
        .append_header(("Authorization", token.clone()))
        .set_json(json!({ "role": "root" }))
        .to_request();
    assert_eq!(call_status!(&app, req), 400);

    // Promote the user and rotate the password
    let req = test::TestRequest::put()
        .uri(&format!("/api/users/{}", target_id))
        .append_header(("Authorization", token.clone()))
        .set_json(json!({ "role": "admin", "password": "NewPassword456!" }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 200);

    // The new password verifies, the old one no longer does
    let _ = login(&app, target_email, "NewPassword456!").await;
    let req = test::TestRequest::post()
        .uri("/api/auth/login")
        .set_json(json!({ "email": target_email, "password": TEST_PASSWORD }))
        .to_request();
    assert_eq!(call_status!(&app, req), 401);

    // A no-op update (same values again) still succeeds
    let req = test::TestRequest::put()
        .uri(&format!("/api/users/{}", target_id))
        .append_header(("Authorization", token.clone()))
        .set_json(json!({ "role": "admin" }))
        .to_request();
    assert_eq!(call_status!(&app, req), 200);

    // Well-formed reference to a deleted user is a 404
    cleanup_users(&pool, &[target_email]).await;
    let req = test::TestRequest::get()
        .uri(&format!("/api/users/{}", target_id))
        .append_header(("Authorization", token))
        .to_request();
    assert_eq!(call_status!(&app, req), 404);

    cleanup_users(&pool, &[admin_email]).await;
}

// Requires a running Postgres; run with `cargo test -- --ignored`.
#[ignore]
#[actix_rt::test]
async fn test_delete_user_cascades_to_tasks() {
    let pool = connect().await;
    let (authority, config) = (test_authority(), test_config());
    let app = build_app!(pool, authority, config).await;

    let admin_email = "users_it_cascade_admin@example.com";
    let alice_email = "users_it_cascade_alice@example.com";
    let bob_email = "users_it_cascade_bob@example.com";
    cleanup_users(&pool, &[admin_email, alice_email, bob_email]).await;

    seed_user(&pool, admin_email, Role::Admin).await;
    let alice = seed_user(&pool, alice_email, Role::User).await;
    let bob = seed_user(&pool, bob_email, Role::User).await;

    // Alice authored two tasks and is assigned a third authored by Bob.
    seed_task(&pool, "alice-1", alice, None).await;
    seed_task(&pool, "alice-2", alice, None).await;
    seed_task(&pool, "bob-for-alice", bob, Some(alice)).await;
    let unrelated = seed_task(&pool, "bob-own", bob, None).await;

    let tasks_removed = delete_user_cascade(&pool, alice).await.unwrap();
    assert_eq!(tasks_removed, 3);

    // The unrelated task survives; Alice's account is gone.
    let survivors =
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM tasks WHERE user_id = $1")
            .bind(bob)
            .fetch_one(&pool)
            .await
            .unwrap();
    assert_eq!(survivors, 1);
    let alice_row = sqlx::query_scalar::<_, i32>("SELECT id FROM users WHERE id = $1")
        .bind(alice)
        .fetch_optional(&pool)
        .await
        .unwrap();
    assert!(alice_row.is_none());

    // Deleting an already-deleted user is a not-found, not a crash.
    assert!(delete_user_cascade(&pool, alice).await.is_err());

    // Same behavior over HTTP: Bob's deletion removes his remaining task.
    let token = login(&app, admin_email, TEST_PASSWORD).await;
    let req = test::TestRequest::delete()
        .uri(&format!("/api/users/{}", bob))
        .append_header(("Authorization", token))
        .to_request();
    assert_eq!(call_status!(&app, req), 204);

    let gone = sqlx::query_scalar::<_, i32>("SELECT 1 FROM tasks WHERE id = $1")
        .bind(unrelated)
        .fetch_optional(&pool)
        .await
        .unwrap();
    assert!(gone.is_none());

    cleanup_users(&pool, &[admin_email]).await;
}

// Requires a running Postgres; run with `cargo test -- --ignored`.
#[ignore]
#[actix_rt::test]
async fn test_delete_nonexistent_user_removes_nothing() {
    let pool = connect().await;
    let (authority, config) = (test_authority(), test_config());
    let app = build_app!(pool, authority, config).await;

    let admin_email = "users_it_404_admin@example.com";
    let victim_email = "users_it_404_victim@example.com";
    cleanup_users(&pool, &[admin_email, victim_email]).await;
    seed_user(&pool, admin_email, Role::Admin).await;

    // A well-formed id that no longer resolves to anything.
    let freed_id = seed_user(&pool, victim_email, Role::User).await;
    cleanup_users(&pool, &[victim_email]).await;

    let tasks_before = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM tasks")
        .fetch_one(&pool)
        .await
        .unwrap();

    let token = login(&app, admin_email, TEST_PASSWORD).await;
    let req = test::TestRequest::delete()
        .uri(&format!("/api/users/{}", freed_id))
        .append_header(("Authorization", token))
        .to_request();
    assert_eq!(call_status!(&app, req), 404);

    let tasks_after = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM tasks")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(tasks_before, tasks_after);

    cleanup_users(&pool, &[admin_email]).await;
}
