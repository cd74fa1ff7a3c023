use std::sync::Arc;

use crate::{
    application::use_cases::{
        auditoria::AuditoriaUseCases, facturacion::FacturacionUseCases, planes::PlanUseCases,
        suscripciones::SuscripcionUseCases, usuarios::UsuarioUseCases,
    },
    infra::config::AppConfig,
};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub usuarios: Arc<UsuarioUseCases>,
    pub planes: Arc<PlanUseCases>,
    pub suscripciones: Arc<SuscripcionUseCases>,
    pub facturacion: Arc<FacturacionUseCases>,
    pub auditoria: Arc<AuditoriaUseCases>,
}
