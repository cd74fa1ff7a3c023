pub mod auditoria;
pub mod facturas;
pub mod planes;
pub mod suscripciones;
pub mod usuarios;

use axum::Router;

use crate::adapters::http::app_state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .nest("/usuarios", usuarios::router())
        .nest("/planes", planes::router())
        .nest("/suscripciones", suscripciones::router())
        .nest("/facturas", facturas::router())
        .nest("/auditoria", auditoria::router())
}
