pub mod auth;
pub mod health;
pub mod tasks;
pub mod users;

use actix_web::web;

use crate::auth::RequireRole;

pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/auth")
            .service(auth::register)
            .service(auth::login)
            .service(auth::logout),
    )
    .service(
        web::scope("/users")
            .wrap(RequireRole::admin())
            .service(users::list_users)
            .service(users::get_user)
            .service(users::update_user)
            .service(users::delete_user),
    )
    .service(
        web::scope("/tasks")
            .service(tasks::list_tasks)
            .service(tasks::create_task)
            .service(tasks::download_document)
            .service(tasks::get_task)
            .service(tasks::update_task)
            .service(tasks::delete_task),
    );
}
