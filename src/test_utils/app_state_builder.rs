//! Test app state builder for HTTP-level integration testing, backed by a
//! single shared [`InMemoryLedger`].

use std::net::SocketAddr;
use std::sync::Arc;

use axum::http::HeaderValue;
use secrecy::SecretString;
use time::Duration;

use crate::{
    adapters::http::app_state::AppState,
    application::use_cases::{
        PoliticaCiclo,
        auditoria::{AuditoriaRepo, AuditoriaUseCases},
        facturacion::{FacturaRepo, FacturacionUseCases},
        planes::{PlanRepo, PlanUseCases},
        suscripciones::{SuscripcionRepo, SuscripcionUseCases},
        usuarios::{UsuarioRepo, UsuarioUseCases},
    },
    domain::entities::{factura::Factura, plan::Plan, suscripcion::Suscripcion, usuario::Usuario},
    infra::config::AppConfig,
    test_utils::InMemoryLedger,
};

pub struct TestAppStateBuilder {
    usuarios: Vec<Usuario>,
    planes: Vec<Plan>,
    suscripciones: Vec<Suscripcion>,
    facturas: Vec<Factura>,
    politica: PoliticaCiclo,
}

impl TestAppStateBuilder {
    pub fn new() -> Self {
        Self {
            usuarios: vec![],
            planes: vec![],
            suscripciones: vec![],
            facturas: vec![],
            politica: PoliticaCiclo::default(),
        }
    }

    pub fn with_usuario(mut self, usuario: Usuario) -> Self {
        self.usuarios.push(usuario);
        self
    }

    pub fn with_plan(mut self, plan: Plan) -> Self {
        self.planes.push(plan);
        self
    }

    pub fn with_suscripcion(mut self, suscripcion: Suscripcion) -> Self {
        self.suscripciones.push(suscripcion);
        self
    }

    pub fn with_factura(mut self, factura: Factura) -> Self {
        self.facturas.push(factura);
        self
    }

    pub fn with_politica(mut self, politica: PoliticaCiclo) -> Self {
        self.politica = politica;
        self
    }

    pub fn build(self) -> AppState {
        self.build_with_ledger().0
    }

    /// Builds the state and also returns the ledger so tests can assert on
    /// stored rows and the revision log directly.
    pub fn build_with_ledger(self) -> (AppState, Arc<InMemoryLedger>) {
        let ledger = Arc::new(InMemoryLedger::seed(
            self.usuarios,
            self.planes,
            self.suscripciones,
            self.facturas,
        ));

        let usuarios_repo = ledger.clone() as Arc<dyn UsuarioRepo>;
        let planes_repo = ledger.clone() as Arc<dyn PlanRepo>;
        let suscripciones_repo = ledger.clone() as Arc<dyn SuscripcionRepo>;
        let facturas_repo = ledger.clone() as Arc<dyn FacturaRepo>;
        let auditoria_repo = ledger.clone() as Arc<dyn AuditoriaRepo>;

        let config = Arc::new(AppConfig {
            database_url: String::new(),
            bind_addr: "127.0.0.1:3001".parse::<SocketAddr>().unwrap(),
            jwt_secret: SecretString::new("test_jwt_secret".into()),
            access_token_ttl: Duration::hours(24),
            cors_origin: HeaderValue::from_static("http://localhost:3000"),
            intervalo_ciclo_segundos: 86_400,
            politica: self.politica.clone(),
        });

        let usuarios = UsuarioUseCases::new(
            usuarios_repo.clone(),
            suscripciones_repo.clone(),
            config.jwt_secret.clone(),
            config.access_token_ttl,
            self.politica.max_reintentos_conflicto,
        );
        let planes = PlanUseCases::new(
            planes_repo.clone(),
            suscripciones_repo.clone(),
            self.politica.max_reintentos_conflicto,
        );
        let suscripciones = SuscripcionUseCases::new(
            suscripciones_repo.clone(),
            planes_repo.clone(),
            usuarios_repo.clone(),
            facturas_repo.clone(),
            self.politica.clone(),
        );
        let facturacion = FacturacionUseCases::new(
            facturas_repo,
            suscripciones_repo,
            planes_repo,
            usuarios_repo,
            self.politica,
        );
        let auditoria = AuditoriaUseCases::new(auditoria_repo);

        let app_state = AppState {
            config,
            usuarios: Arc::new(usuarios),
            planes: Arc::new(planes),
            suscripciones: Arc::new(suscripciones),
            facturacion: Arc::new(facturacion),
            auditoria: Arc::new(auditoria),
        };
        (app_state, ledger)
    }
}

impl Default for TestAppStateBuilder {
    fn default() -> Self {
        Self::new()
    }
}
