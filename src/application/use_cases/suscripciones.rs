use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Duration, Utc};
use serde::Serialize;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::{
    app_error::{AppError, AppResult},
    domain::entities::factura::{EstadoFactura, Factura},
    domain::entities::suscripcion::{EstadoSuscripcion, Suscripcion, transicion_permitida},
    domain::money::{self, Centimos},
};

use super::{
    PoliticaCiclo,
    facturacion::{FacturaRepo, formatear_numero},
    planes::PlanRepo,
    usuarios::UsuarioRepo,
};

/// Store contract for the subscription aggregate. Mutations are audited
/// dual-writes; `update` is compare-and-swap on the version stamp.
#[async_trait]
pub trait SuscripcionRepo: Send + Sync {
    async fn insert(&self, suscripcion: &Suscripcion) -> AppResult<Suscripcion>;
    async fn update(
        &self,
        suscripcion: &Suscripcion,
        version_esperada: i64,
    ) -> AppResult<Suscripcion>;
    async fn get_by_id(&self, id: Uuid) -> AppResult<Option<Suscripcion>>;
    async fn list_all(&self) -> AppResult<Vec<Suscripcion>>;
    async fn list_by_usuario(&self, usuario_id: Uuid) -> AppResult<Vec<Suscripcion>>;
    /// The at-most-one subscription not in a terminal state.
    async fn find_no_terminal_by_usuario(&self, usuario_id: Uuid)
    -> AppResult<Option<Suscripcion>>;
    async fn exists_by_plan(&self, plan_id: Uuid) -> AppResult<bool>;
    async fn exists_viva_by_plan(&self, plan_id: Uuid) -> AppResult<bool>;
    async fn exists_by_usuario(&self, usuario_id: Uuid) -> AppResult<bool>;
    /// TRIAL/ACTIVA/MOROSA subscriptions whose billing date has arrived.
    async fn list_para_facturar(
        &self,
        hasta: chrono::NaiveDate,
    ) -> AppResult<Vec<Suscripcion>>;
    async fn count_por_estado(&self) -> AppResult<Vec<(EstadoSuscripcion, i64)>>;
}

/// Result of a plan change: the updated subscription plus the prorated amount
/// (negative values were banked as credit, positive ones invoiced).
#[derive(Debug, Clone, Serialize)]
pub struct CambioPlan {
    #[serde(skip)]
    pub suscripcion: Suscripcion,
    pub cargo_prorrateo: Centimos,
    #[serde(skip)]
    pub factura_prorrateo: Option<Factura>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EstadisticasCicloVida {
    pub trial: i64,
    pub activas: i64,
    pub morosas: i64,
    pub suspendidas: i64,
    pub canceladas: i64,
    pub expiradas: i64,
    pub facturas_pendientes: i64,
}

#[derive(Clone)]
pub struct SuscripcionUseCases {
    suscripciones: Arc<dyn SuscripcionRepo>,
    planes: Arc<dyn PlanRepo>,
    usuarios: Arc<dyn UsuarioRepo>,
    facturas: Arc<dyn FacturaRepo>,
    politica: PoliticaCiclo,
}

impl SuscripcionUseCases {
    pub fn new(
        suscripciones: Arc<dyn SuscripcionRepo>,
        planes: Arc<dyn PlanRepo>,
        usuarios: Arc<dyn UsuarioRepo>,
        facturas: Arc<dyn FacturaRepo>,
        politica: PoliticaCiclo,
    ) -> Self {
        Self {
            suscripciones,
            planes,
            usuarios,
            facturas,
            politica,
        }
    }

    pub async fn get(&self, id: Uuid) -> AppResult<Suscripcion> {
        self.suscripciones
            .get_by_id(id)
            .await?
            .ok_or(AppError::NotFound)
    }

    pub async fn list(&self) -> AppResult<Vec<Suscripcion>> {
        self.suscripciones.list_all().await
    }

    pub async fn list_by_usuario(&self, usuario_id: Uuid) -> AppResult<Vec<Suscripcion>> {
        self.suscripciones.list_by_usuario(usuario_id).await
    }

    /// New subscriptions start in TRIAL when the plan offers one, ACTIVA
    /// otherwise, with the first billing date derived accordingly.
    #[instrument(skip(self))]
    pub async fn create(&self, usuario_id: Uuid, plan_id: Uuid) -> AppResult<Suscripcion> {
        let usuario = self
            .usuarios
            .get_by_id(usuario_id)
            .await?
            .ok_or(AppError::NotFound)?;
        if !usuario.activo {
            return Err(AppError::Validation("el usuario está inactivo".into()));
        }
        let plan = self
            .planes
            .get_by_id(plan_id)
            .await?
            .ok_or(AppError::NotFound)?;
        if !plan.activo {
            return Err(AppError::Validation("el plan no está activo".into()));
        }
        if self
            .suscripciones
            .find_no_terminal_by_usuario(usuario_id)
            .await?
            .is_some()
        {
            return Err(AppError::Validation(
                "el usuario ya tiene una suscripción vigente".into(),
            ));
        }

        let hoy = Utc::now().date_naive();
        let (estado, proximo_cobro) = if plan.ofrece_prueba() {
            (
                EstadoSuscripcion::Trial,
                hoy + Duration::days(plan.dias_prueba as i64),
            )
        } else {
            (
                EstadoSuscripcion::Activa,
                hoy + Duration::days(self.politica.dias_intervalo_facturacion),
            )
        };

        let suscripcion = Suscripcion {
            id: Uuid::new_v4(),
            usuario_id,
            plan_id,
            estado,
            fecha_inicio: hoy,
            fecha_proximo_cobro: proximo_cobro,
            renovacion_automatica: true,
            precio_actual: plan.precio_mensual,
            credito_prorrateo: 0,
            motivo_cancelacion: None,
            fecha_cancelacion: None,
            fecha_creacion: Utc::now(),
            version: 1,
        };
        self.suscripciones.insert(&suscripcion).await
    }

    /// Plan change with proration. Upgrades issue a `PRO-` invoice in the
    /// same atomic unit as the subscription write; downgrades bank a credit
    /// the next cycle's invoice consumes. Billing cadence is untouched,
    /// except a TRIAL subscription moving to a plan without trial converts to
    /// ACTIVA and becomes billable at once.
    #[instrument(skip(self))]
    pub async fn cambiar_plan(&self, id: Uuid, nuevo_plan_id: Uuid) -> AppResult<CambioPlan> {
        let mut intento = 0;
        loop {
            match self.intentar_cambiar_plan(id, nuevo_plan_id).await {
                Err(AppError::Conflict) if intento < self.politica.max_reintentos_conflicto => {
                    intento += 1
                }
                resultado => return resultado,
            }
        }
    }

    async fn intentar_cambiar_plan(&self, id: Uuid, nuevo_plan_id: Uuid) -> AppResult<CambioPlan> {
        let suscripcion = self.get(id).await?;
        if suscripcion.estado.es_terminal() {
            return Err(AppError::transicion(
                suscripcion.estado.as_str(),
                suscripcion.estado.as_str(),
            ));
        }
        if suscripcion.plan_id == nuevo_plan_id {
            return Err(AppError::NoOpChange);
        }

        let plan_actual = self
            .planes
            .get_by_id(suscripcion.plan_id)
            .await?
            .ok_or(AppError::NotFound)?;
        let nuevo_plan = self
            .planes
            .get_by_id(nuevo_plan_id)
            .await?
            .ok_or(AppError::NotFound)?;
        if !nuevo_plan.activo {
            return Err(AppError::Validation("el plan no está activo".into()));
        }

        let hoy = Utc::now().date_naive();
        let dias_restantes = (suscripcion.fecha_proximo_cobro - hoy).num_days();
        let cargo = money::prorratear(
            nuevo_plan.precio_mensual - plan_actual.precio_mensual,
            dias_restantes,
            self.politica.dias_intervalo_facturacion,
        );

        let version = suscripcion.version;
        let mut nueva = suscripcion;
        nueva.plan_id = nuevo_plan_id;
        nueva.precio_actual = nuevo_plan.precio_mensual;
        if nueva.estado == EstadoSuscripcion::Trial && !nuevo_plan.ofrece_prueba() {
            // The trial ends here: billing starts with the next cycle run.
            nueva.estado = EstadoSuscripcion::Activa;
            nueva.fecha_proximo_cobro = hoy;
        }

        if cargo > 0 {
            let numero = formatear_numero("PRO", self.facturas.siguiente_numero().await?);
            let factura = Factura::nueva(
                numero,
                nueva.id,
                nueva.usuario_id,
                format!(
                    "Prorrateo cambio de plan: {} → {}",
                    plan_actual.nombre, nuevo_plan.nombre
                ),
                hoy,
                cargo,
                self.tasa_para_usuario(nueva.usuario_id).await?,
                hoy + Duration::days(self.politica.dias_vencimiento_prorrateo),
                true,
            );
            let (factura, suscripcion) = self.facturas.emitir(&factura, &nueva, version).await?;
            info!(numero = %factura.numero, cargo, "factura de prorrateo emitida");
            return Ok(CambioPlan {
                suscripcion,
                cargo_prorrateo: cargo,
                factura_prorrateo: Some(factura),
            });
        }

        if cargo < 0 {
            nueva.credito_prorrateo += -cargo;
        }
        let suscripcion = self.suscripciones.update(&nueva, version).await?;
        Ok(CambioPlan {
            suscripcion,
            cargo_prorrateo: cargo,
            factura_prorrateo: None,
        })
    }

    /// Direct state change, validated against the transition table. The
    /// cancellation and reactivation stamps apply here as well.
    #[instrument(skip(self))]
    pub async fn cambiar_estado(
        &self,
        id: Uuid,
        hacia: EstadoSuscripcion,
        motivo: Option<String>,
    ) -> AppResult<Suscripcion> {
        let mut intento = 0;
        loop {
            match self.intentar_cambiar_estado(id, hacia, motivo.clone()).await {
                Err(AppError::Conflict) if intento < self.politica.max_reintentos_conflicto => {
                    intento += 1
                }
                resultado => return resultado,
            }
        }
    }

    async fn intentar_cambiar_estado(
        &self,
        id: Uuid,
        hacia: EstadoSuscripcion,
        motivo: Option<String>,
    ) -> AppResult<Suscripcion> {
        let suscripcion = self.get(id).await?;
        let desde = suscripcion.estado;
        if !transicion_permitida(desde, hacia) {
            return Err(AppError::transicion(desde.as_str(), hacia.as_str()));
        }

        let version = suscripcion.version;
        let mut nueva = suscripcion;
        nueva.estado = hacia;
        match hacia {
            EstadoSuscripcion::Cancelada => {
                nueva.motivo_cancelacion =
                    Some(motivo.unwrap_or_else(|| "Sin motivo especificado".into()));
                nueva.fecha_cancelacion = Some(Utc::now());
                nueva.renovacion_automatica = false;
            }
            EstadoSuscripcion::Activa if desde == EstadoSuscripcion::Cancelada => {
                self.exigir_ventana_reactivacion(&nueva)?;
                nueva.motivo_cancelacion = None;
                nueva.fecha_cancelacion = None;
                nueva.fecha_proximo_cobro = Utc::now().date_naive()
                    + Duration::days(self.politica.dias_intervalo_facturacion);
            }
            _ => {}
        }
        self.suscripciones.update(&nueva, version).await
    }

    #[instrument(skip(self))]
    pub async fn cancelar(&self, id: Uuid, motivo: Option<String>) -> AppResult<Suscripcion> {
        self.cambiar_estado(id, EstadoSuscripcion::Cancelada, motivo)
            .await
    }

    /// Brings a cancelled (inside the grace window) or suspended (once clear
    /// of unpaid invoices) subscription back to ACTIVA.
    #[instrument(skip(self))]
    pub async fn reactivar(&self, id: Uuid) -> AppResult<Suscripcion> {
        let mut intento = 0;
        loop {
            match self.intentar_reactivar(id).await {
                Err(AppError::Conflict) if intento < self.politica.max_reintentos_conflicto => {
                    intento += 1
                }
                resultado => return resultado,
            }
        }
    }

    async fn intentar_reactivar(&self, id: Uuid) -> AppResult<Suscripcion> {
        let suscripcion = self.get(id).await?;
        let desde = suscripcion.estado;
        if !transicion_permitida(desde, EstadoSuscripcion::Activa) {
            return Err(AppError::transicion(
                desde.as_str(),
                EstadoSuscripcion::Activa.as_str(),
            ));
        }

        match desde {
            EstadoSuscripcion::Cancelada => self.exigir_ventana_reactivacion(&suscripcion)?,
            EstadoSuscripcion::Morosa | EstadoSuscripcion::Suspendida => {
                let sin_pagar = self
                    .facturas
                    .list_by_suscripcion(id)
                    .await?
                    .into_iter()
                    .any(|f| f.estado.sin_pagar());
                if sin_pagar {
                    return Err(AppError::Validation(
                        "debe pagar las facturas pendientes antes de reactivar".into(),
                    ));
                }
            }
            _ => {}
        }

        let version = suscripcion.version;
        let mut nueva = suscripcion;
        nueva.estado = EstadoSuscripcion::Activa;
        if desde == EstadoSuscripcion::Cancelada {
            // cancelar forced auto-renewal off; undo that, but leave an
            // explicit opt-out from other states alone
            nueva.motivo_cancelacion = None;
            nueva.fecha_cancelacion = None;
            nueva.renovacion_automatica = true;
        }
        let hoy = Utc::now().date_naive();
        if nueva.fecha_proximo_cobro < hoy {
            nueva.fecha_proximo_cobro =
                hoy + Duration::days(self.politica.dias_intervalo_facturacion);
        }
        self.suscripciones.update(&nueva, version).await
    }

    #[instrument(skip(self))]
    pub async fn toggle_renovacion(&self, id: Uuid, renovacion: bool) -> AppResult<Suscripcion> {
        let mut intento = 0;
        loop {
            match self.intentar_toggle(id, renovacion).await {
                Err(AppError::Conflict) if intento < self.politica.max_reintentos_conflicto => {
                    intento += 1
                }
                resultado => return resultado,
            }
        }
    }

    async fn intentar_toggle(&self, id: Uuid, renovacion: bool) -> AppResult<Suscripcion> {
        let suscripcion = self.get(id).await?;
        if suscripcion.estado.es_terminal() {
            return Err(AppError::transicion(
                suscripcion.estado.as_str(),
                suscripcion.estado.as_str(),
            ));
        }
        let version = suscripcion.version;
        let mut nueva = suscripcion;
        nueva.renovacion_automatica = renovacion;
        self.suscripciones.update(&nueva, version).await
    }

    pub async fn estadisticas(&self) -> AppResult<EstadisticasCicloVida> {
        let mut stats = EstadisticasCicloVida {
            trial: 0,
            activas: 0,
            morosas: 0,
            suspendidas: 0,
            canceladas: 0,
            expiradas: 0,
            facturas_pendientes: 0,
        };
        for (estado, cantidad) in self.suscripciones.count_por_estado().await? {
            match estado {
                EstadoSuscripcion::Trial => stats.trial = cantidad,
                EstadoSuscripcion::Activa => stats.activas = cantidad,
                EstadoSuscripcion::Morosa => stats.morosas = cantidad,
                EstadoSuscripcion::Suspendida => stats.suspendidas = cantidad,
                EstadoSuscripcion::Cancelada => stats.canceladas = cantidad,
                EstadoSuscripcion::Expirada => stats.expiradas = cantidad,
            }
        }
        for resumen in self.facturas.resumen_por_estado().await? {
            if resumen.estado == EstadoFactura::Pendiente {
                stats.facturas_pendientes = resumen.cantidad;
            }
        }
        Ok(stats)
    }

    fn exigir_ventana_reactivacion(&self, suscripcion: &Suscripcion) -> AppResult<()> {
        let Some(cancelada_en) = suscripcion.fecha_cancelacion else {
            return Ok(());
        };
        let limite = cancelada_en + Duration::days(self.politica.ventana_reactivacion_dias);
        if Utc::now() > limite {
            return Err(AppError::transicion(
                EstadoSuscripcion::Cancelada.as_str(),
                EstadoSuscripcion::Activa.as_str(),
            ));
        }
        Ok(())
    }

    async fn tasa_para_usuario(&self, usuario_id: Uuid) -> AppResult<f64> {
        let usuario = self.usuarios.get_by_id(usuario_id).await?;
        let pais = usuario.as_ref().and_then(|u| u.pais.as_deref());
        Ok(match pais {
            Some(p) => money::tasa_para_pais(Some(p)),
            None => self.politica.tasa_impuesto_default,
        })
    }
}
