use actix_cors::Cors;
use actix_web::middleware::Logger;
use actix_web::{web, App, HttpServer};
use sqlx::PgPool;

use taskboard::auth::{AuthMiddleware, TokenAuthority, TokenBlocklist};
use taskboard::config::Config;
use taskboard::routes;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenv::dotenv().ok();
    env_logger::init();

    let config = Config::from_env();

    // Make sure the uploads folder exists before the first request.
    std::fs::create_dir_all(&config.upload_dir)?;

    let pool = PgPool::connect(&config.database_url)
        .await
        .expect("Failed to connect to database");

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("Failed to run database migrations");

    let blocklist = TokenBlocklist::new();
    let authority = TokenAuthority::new(&config.jwt_secret, config.token_ttl_secs, blocklist);

    let bind_addr = (config.server_host.clone(), config.server_port);
    log::info!("Starting taskboard server at {}", config.server_url());

    let config_data = web::Data::new(config);
    let authority_data = web::Data::new(authority);

    HttpServer::new(move || {
        App::new()
            .app_data(web::Data::new(pool.clone()))
            .app_data(config_data.clone())
            .app_data(authority_data.clone())
            .wrap(
                Cors::default()
                    .allow_any_origin()
                    .allow_any_method()
                    .allow_any_header()
                    .max_age(3600),
            )
            .wrap(Logger::default())
            .service(routes::health::health)
            .service(
                web::scope("/api")
                    .wrap(AuthMiddleware)
                    .configure(routes::config),
            )
    })
    .bind(bind_addr)?
    .run()
    .await
}
