// Route exports
pub mod runs;

pub use runs::AppState;

use actix_web::web;

pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api/v1")
            .configure(runs::configure),
    );
}
