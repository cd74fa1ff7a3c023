use std::fs::File;
use std::sync::Arc;

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use crate::{
    adapters::{http::app_state::AppState, persistence::PostgresPersistence},
    application::use_cases::{
        auditoria::{AuditoriaRepo, AuditoriaUseCases},
        facturacion::{FacturaRepo, FacturacionUseCases},
        planes::{PlanRepo, PlanUseCases},
        suscripciones::{SuscripcionRepo, SuscripcionUseCases},
        usuarios::{UsuarioRepo, UsuarioUseCases},
    },
    infra::{config::AppConfig, db::init_db},
};

pub async fn init_app_state() -> anyhow::Result<AppState> {
    let config = AppConfig::from_env();

    let pool = init_db(&config.database_url).await?;
    let postgres = Arc::new(PostgresPersistence::new(pool));

    let usuarios_repo = postgres.clone() as Arc<dyn UsuarioRepo>;
    let planes_repo = postgres.clone() as Arc<dyn PlanRepo>;
    let suscripciones_repo = postgres.clone() as Arc<dyn SuscripcionRepo>;
    let facturas_repo = postgres.clone() as Arc<dyn FacturaRepo>;
    let auditoria_repo = postgres as Arc<dyn AuditoriaRepo>;

    let usuarios = UsuarioUseCases::new(
        usuarios_repo.clone(),
        suscripciones_repo.clone(),
        config.jwt_secret.clone(),
        config.access_token_ttl,
        config.politica.max_reintentos_conflicto,
    );
    let planes = PlanUseCases::new(
        planes_repo.clone(),
        suscripciones_repo.clone(),
        config.politica.max_reintentos_conflicto,
    );
    let suscripciones = SuscripcionUseCases::new(
        suscripciones_repo.clone(),
        planes_repo.clone(),
        usuarios_repo.clone(),
        facturas_repo.clone(),
        config.politica.clone(),
    );
    let facturacion = FacturacionUseCases::new(
        facturas_repo,
        suscripciones_repo,
        planes_repo,
        usuarios_repo,
        config.politica.clone(),
    );
    let auditoria = AuditoriaUseCases::new(auditoria_repo);

    Ok(AppState {
        config: Arc::new(config),
        usuarios: Arc::new(usuarios),
        planes: Arc::new(planes),
        suscripciones: Arc::new(suscripciones),
        facturacion: Arc::new(facturacion),
        auditoria: Arc::new(auditoria),
    })
}

pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "suscripciones_api=debug,tower_http=debug".into());

    // Console (pretty logs)
    let console_layer = fmt::layer().with_target(false).with_level(true).pretty();

    // File (structured JSON logs)
    let file = File::create("app.log").expect("cannot create log file");
    let json_layer = fmt::layer()
        .json()
        .with_writer(file)
        .with_current_span(true)
        .with_span_list(true);

    tracing_subscriber::registry()
        .with(filter)
        .with(console_layer)
        .with(json_layer)
        .try_init()
        .ok();
}
