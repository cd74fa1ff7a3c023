use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Duration, NaiveDate, Utc};
use serde::Serialize;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::{
    app_error::{AppError, AppResult},
    domain::entities::factura::{EstadoFactura, Factura, transicion_factura_permitida},
    domain::entities::suscripcion::{EstadoSuscripcion, Suscripcion, transicion_permitida},
    domain::money::{self, Centimos},
};

use super::{PoliticaCiclo, planes::PlanRepo, suscripciones::SuscripcionRepo, usuarios::UsuarioRepo};

/// `FAC-000123` / `PRO-000124`. Both series draw from the same sequence so
/// numbers stay globally unique.
pub fn formatear_numero(prefijo: &str, secuencia: i64) -> String {
    format!("{prefijo}-{secuencia:06}")
}

#[derive(Debug, Clone, Default)]
pub struct FiltrosFactura {
    pub usuario_id: Option<Uuid>,
    pub suscripcion_id: Option<Uuid>,
    pub estado: Option<EstadoFactura>,
    pub desde: Option<NaiveDate>,
    pub hasta: Option<NaiveDate>,
    /// Range over `total`, inclusive on both ends.
    pub monto_minimo: Option<Centimos>,
    pub monto_maximo: Option<Centimos>,
    pub solo_prorrateo: Option<bool>,
}

/// Per-state rollup backing both the summary endpoint and the lifecycle
/// statistics.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResumenEstado {
    #[serde(serialize_with = "serializar_estado")]
    pub estado: EstadoFactura,
    pub cantidad: i64,
    #[serde(serialize_with = "serializar_centimos")]
    pub monto_total: Centimos,
}

fn serializar_estado<S: serde::Serializer>(
    estado: &EstadoFactura,
    s: S,
) -> Result<S::Ok, S::Error> {
    s.serialize_str(estado.as_str())
}

fn serializar_centimos<S: serde::Serializer>(monto: &Centimos, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_f64(money::a_decimal(*monto))
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EstadisticasFacturacion {
    pub cantidad_total: i64,
    pub pagadas: i64,
    pub pendientes: i64,
    pub vencidas: i64,
    pub canceladas: i64,
    #[serde(serialize_with = "serializar_centimos")]
    pub total_cobrado: Centimos,
    #[serde(serialize_with = "serializar_centimos")]
    pub pendiente_de_cobro: Centimos,
}

/// What a cycle run did, returned to the caller and logged.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResumenCiclo {
    pub fecha: NaiveDate,
    pub facturas_emitidas: i64,
    #[serde(serialize_with = "serializar_centimos")]
    pub monto_facturado: Centimos,
    pub facturas_vencidas: i64,
    pub suscripciones_morosas: i64,
    pub suscripciones_suspendidas: i64,
    pub suscripciones_expiradas: i64,
    pub errores: i64,
}

/// Store contract for invoices. `emitir` and `update_con_suscripcion` persist
/// the invoice together with the subscription (and both audit revisions) in
/// one atomic unit; subscription writes are compare-and-swap on the version.
#[async_trait]
pub trait FacturaRepo: Send + Sync {
    /// Next value of the shared invoice-number sequence.
    async fn siguiente_numero(&self) -> AppResult<i64>;
    /// Inserts the invoice and applies the subscription update atomically.
    async fn emitir(
        &self,
        factura: &Factura,
        suscripcion: &Suscripcion,
        version_suscripcion: i64,
    ) -> AppResult<(Factura, Suscripcion)>;
    async fn update(&self, factura: &Factura, version_esperada: i64) -> AppResult<Factura>;
    /// Invoice update plus subscription update in one atomic unit, for the
    /// payment path that clears delinquency.
    async fn update_con_suscripcion(
        &self,
        factura: &Factura,
        version_factura: i64,
        suscripcion: &Suscripcion,
        version_suscripcion: i64,
    ) -> AppResult<(Factura, Suscripcion)>;
    /// Marks the invoice CANCELADA, recorded as ELIMINACION.
    async fn anular(&self, factura: &Factura, version_esperada: i64) -> AppResult<Factura>;
    async fn get_by_id(&self, id: Uuid) -> AppResult<Option<Factura>>;
    async fn list_all(&self) -> AppResult<Vec<Factura>>;
    async fn list_by_suscripcion(&self, suscripcion_id: Uuid) -> AppResult<Vec<Factura>>;
    async fn list_by_usuario(&self, usuario_id: Uuid) -> AppResult<Vec<Factura>>;
    /// PENDIENTE invoices whose due date is strictly before `fecha`.
    async fn list_pendientes_vencidas(&self, fecha: NaiveDate) -> AppResult<Vec<Factura>>;
    async fn list_vencidas(&self) -> AppResult<Vec<Factura>>;
    async fn filtrar(&self, filtros: &FiltrosFactura) -> AppResult<Vec<Factura>>;
    /// One page of filter matches, newest first, plus the total match count.
    async fn buscar(
        &self,
        filtros: &FiltrosFactura,
        offset: i64,
        limite: i64,
    ) -> AppResult<(Vec<Factura>, i64)>;
    async fn resumen_por_estado(&self) -> AppResult<Vec<ResumenEstado>>;
}

#[derive(Clone)]
pub struct FacturacionUseCases {
    facturas: Arc<dyn FacturaRepo>,
    suscripciones: Arc<dyn SuscripcionRepo>,
    planes: Arc<dyn PlanRepo>,
    usuarios: Arc<dyn UsuarioRepo>,
    politica: PoliticaCiclo,
}

impl FacturacionUseCases {
    pub fn new(
        facturas: Arc<dyn FacturaRepo>,
        suscripciones: Arc<dyn SuscripcionRepo>,
        planes: Arc<dyn PlanRepo>,
        usuarios: Arc<dyn UsuarioRepo>,
        politica: PoliticaCiclo,
    ) -> Self {
        Self {
            facturas,
            suscripciones,
            planes,
            usuarios,
            politica,
        }
    }

    pub async fn get(&self, id: Uuid) -> AppResult<Factura> {
        self.facturas.get_by_id(id).await?.ok_or(AppError::NotFound)
    }

    pub async fn list(&self) -> AppResult<Vec<Factura>> {
        self.facturas.list_all().await
    }

    pub async fn list_by_suscripcion(&self, suscripcion_id: Uuid) -> AppResult<Vec<Factura>> {
        self.facturas.list_by_suscripcion(suscripcion_id).await
    }

    pub async fn list_by_usuario(&self, usuario_id: Uuid) -> AppResult<Vec<Factura>> {
        self.facturas.list_by_usuario(usuario_id).await
    }

    pub async fn list_pendientes(&self) -> AppResult<Vec<Factura>> {
        self.facturas
            .filtrar(&FiltrosFactura {
                estado: Some(EstadoFactura::Pendiente),
                ..Default::default()
            })
            .await
    }

    pub async fn list_vencidas(&self) -> AppResult<Vec<Factura>> {
        self.facturas
            .filtrar(&FiltrosFactura {
                estado: Some(EstadoFactura::Vencida),
                ..Default::default()
            })
            .await
    }

    pub async fn filtrar(&self, filtros: FiltrosFactura) -> AppResult<Vec<Factura>> {
        self.facturas.filtrar(&filtros).await
    }

    pub async fn buscar(
        &self,
        filtros: FiltrosFactura,
        pagina: i64,
        tamano: i64,
    ) -> AppResult<(Vec<Factura>, i64)> {
        let tamano = tamano.clamp(1, 100);
        let offset = pagina.max(0) * tamano;
        self.facturas.buscar(&filtros, offset, tamano).await
    }

    pub async fn resumen_por_estado(&self) -> AppResult<Vec<ResumenEstado>> {
        self.facturas.resumen_por_estado().await
    }

    pub async fn estadisticas(&self) -> AppResult<EstadisticasFacturacion> {
        let mut stats = EstadisticasFacturacion {
            cantidad_total: 0,
            pagadas: 0,
            pendientes: 0,
            vencidas: 0,
            canceladas: 0,
            total_cobrado: 0,
            pendiente_de_cobro: 0,
        };
        for resumen in self.facturas.resumen_por_estado().await? {
            stats.cantidad_total += resumen.cantidad;
            match resumen.estado {
                EstadoFactura::Pagada => {
                    stats.pagadas = resumen.cantidad;
                    stats.total_cobrado = resumen.monto_total;
                }
                EstadoFactura::Pendiente => {
                    stats.pendientes = resumen.cantidad;
                    stats.pendiente_de_cobro += resumen.monto_total;
                }
                EstadoFactura::Vencida => {
                    stats.vencidas = resumen.cantidad;
                    stats.pendiente_de_cobro += resumen.monto_total;
                }
                EstadoFactura::Cancelada => stats.canceladas = resumen.cantidad,
            }
        }
        Ok(stats)
    }

    /// Marks the invoice paid. When the owner was MOROSA and this was the last
    /// unpaid invoice, the subscription returns to ACTIVA in the same unit.
    #[instrument(skip(self))]
    pub async fn pagar(&self, id: Uuid) -> AppResult<Factura> {
        let mut intento = 0;
        loop {
            match self.intentar_pagar(id).await {
                Err(AppError::Conflict) if intento < self.politica.max_reintentos_conflicto => {
                    intento += 1
                }
                resultado => return resultado,
            }
        }
    }

    async fn intentar_pagar(&self, id: Uuid) -> AppResult<Factura> {
        let factura = self.get(id).await?;
        if !transicion_factura_permitida(factura.estado, EstadoFactura::Pagada) {
            return Err(AppError::transicion(
                factura.estado.as_str(),
                EstadoFactura::Pagada.as_str(),
            ));
        }
        let version = factura.version;
        let mut pagada = factura;
        pagada.estado = EstadoFactura::Pagada;

        let suscripcion = self
            .suscripciones
            .get_by_id(pagada.suscripcion_id)
            .await?
            .filter(|s| s.estado == EstadoSuscripcion::Morosa);
        if let Some(suscripcion) = suscripcion {
            let quedan_sin_pagar = self
                .facturas
                .list_by_suscripcion(suscripcion.id)
                .await?
                .into_iter()
                .any(|f| f.id != pagada.id && f.estado.sin_pagar());
            if !quedan_sin_pagar {
                let version_s = suscripcion.version;
                let mut activa = suscripcion;
                activa.estado = EstadoSuscripcion::Activa;
                let (factura, _) = self
                    .facturas
                    .update_con_suscripcion(&pagada, version, &activa, version_s)
                    .await?;
                info!(numero = %factura.numero, "pago recibido, suscripción reactivada");
                return Ok(factura);
            }
        }

        self.facturas.update(&pagada, version).await
    }

    /// Removal endpoint: unpaid invoices are voided (CANCELADA), never erased;
    /// paid ones are immutable.
    #[instrument(skip(self))]
    pub async fn anular(&self, id: Uuid) -> AppResult<Factura> {
        let factura = self.get(id).await?;
        if !transicion_factura_permitida(factura.estado, EstadoFactura::Cancelada) {
            return Err(AppError::transicion(
                factura.estado.as_str(),
                EstadoFactura::Cancelada.as_str(),
            ));
        }
        let version = factura.version;
        let mut anulada = factura;
        anulada.estado = EstadoFactura::Cancelada;
        self.facturas.anular(&anulada, version).await
    }

    /// One billing-cycle run: renewals, overdue marking, and delinquency
    /// escalation. Each subscription is processed independently so one
    /// failure never stops the batch. `fecha` overrides the run date (the
    /// scheduler passes `None` for today); re-running with the same date is
    /// a no-op because every issuance pushes `fecha_proximo_cobro` a full
    /// interval forward.
    #[instrument(skip(self))]
    pub async fn ejecutar_ciclo(&self, fecha: Option<NaiveDate>) -> AppResult<ResumenCiclo> {
        let hoy = fecha.unwrap_or_else(|| Utc::now().date_naive());
        let mut resumen = ResumenCiclo {
            fecha: hoy,
            facturas_emitidas: 0,
            monto_facturado: 0,
            facturas_vencidas: 0,
            suscripciones_morosas: 0,
            suscripciones_suspendidas: 0,
            suscripciones_expiradas: 0,
            errores: 0,
        };

        for suscripcion in self.suscripciones.list_para_facturar(hoy).await? {
            match self.renovar(suscripcion, hoy).await {
                Ok(Some(factura)) => {
                    resumen.facturas_emitidas += 1;
                    resumen.monto_facturado += factura.total;
                }
                Ok(None) => resumen.suscripciones_expiradas += 1,
                Err(e) => {
                    warn!(error = %e, "fallo al renovar una suscripción");
                    resumen.errores += 1;
                }
            }
        }

        for factura in self.facturas.list_pendientes_vencidas(hoy).await? {
            match self.marcar_vencida(factura).await {
                Ok(paso_a_morosa) => {
                    resumen.facturas_vencidas += 1;
                    if paso_a_morosa {
                        resumen.suscripciones_morosas += 1;
                    }
                }
                Err(e) => {
                    warn!(error = %e, "fallo al marcar una factura vencida");
                    resumen.errores += 1;
                }
            }
        }

        let (suspendidas, expiradas, errores) = self.escalar_morosidad(hoy).await?;
        resumen.suscripciones_suspendidas = suspendidas;
        resumen.suscripciones_expiradas += expiradas;
        resumen.errores += errores;

        info!(
            emitidas = resumen.facturas_emitidas,
            vencidas = resumen.facturas_vencidas,
            morosas = resumen.suscripciones_morosas,
            suspendidas = resumen.suscripciones_suspendidas,
            expiradas = resumen.suscripciones_expiradas,
            errores = resumen.errores,
            "ciclo de facturación completado"
        );
        Ok(resumen)
    }

    /// Issues the renewal invoice for one due subscription. TRIAL exits to
    /// ACTIVA with its first invoice; auto-renewal off means the period ends
    /// in EXPIRADA instead (returns `None`). Banked proration credit is
    /// consumed before taxing.
    async fn renovar(
        &self,
        suscripcion: Suscripcion,
        hoy: NaiveDate,
    ) -> AppResult<Option<Factura>> {
        if !suscripcion.renovacion_automatica {
            let version = suscripcion.version;
            let mut expirada = suscripcion;
            if !transicion_permitida(expirada.estado, EstadoSuscripcion::Expirada) {
                return Err(AppError::transicion(
                    expirada.estado.as_str(),
                    EstadoSuscripcion::Expirada.as_str(),
                ));
            }
            expirada.estado = EstadoSuscripcion::Expirada;
            self.suscripciones.update(&expirada, version).await?;
            return Ok(None);
        }

        let plan = self
            .planes
            .get_by_id(suscripcion.plan_id)
            .await?
            .ok_or(AppError::NotFound)?;
        let usuario = self
            .usuarios
            .get_by_id(suscripcion.usuario_id)
            .await?
            .ok_or(AppError::NotFound)?;

        let version = suscripcion.version;
        let mut renovada = suscripcion;
        if renovada.estado == EstadoSuscripcion::Trial {
            renovada.estado = EstadoSuscripcion::Activa;
        }

        let descuento = renovada.credito_prorrateo.min(renovada.precio_actual);
        let subtotal = renovada.precio_actual - descuento;
        renovada.credito_prorrateo -= descuento;
        renovada.fecha_proximo_cobro =
            hoy + Duration::days(self.politica.dias_intervalo_facturacion);

        let concepto = if descuento > 0 {
            format!(
                "Suscripción mensual - {} (crédito aplicado: {:.2})",
                plan.nombre,
                money::a_decimal(descuento)
            )
        } else {
            format!("Suscripción mensual - {}", plan.nombre)
        };
        let factura = Factura::nueva(
            formatear_numero("FAC", self.facturas.siguiente_numero().await?),
            renovada.id,
            renovada.usuario_id,
            concepto,
            hoy,
            subtotal,
            match usuario.pais.as_deref() {
                Some(pais) => money::tasa_para_pais(Some(pais)),
                None => self.politica.tasa_impuesto_default,
            },
            hoy + Duration::days(self.politica.dias_vencimiento_factura),
            false,
        );
        let (factura, _) = self.facturas.emitir(&factura, &renovada, version).await?;
        Ok(Some(factura))
    }

    /// PENDIENTE past due becomes VENCIDA; an ACTIVA owner becomes MOROSA in
    /// the same unit. Returns whether the subscription transitioned.
    async fn marcar_vencida(&self, factura: Factura) -> AppResult<bool> {
        let version = factura.version;
        let mut vencida = factura;
        vencida.estado = EstadoFactura::Vencida;

        let suscripcion = self
            .suscripciones
            .get_by_id(vencida.suscripcion_id)
            .await?
            .filter(|s| s.estado == EstadoSuscripcion::Activa);
        if let Some(suscripcion) = suscripcion {
            let version_s = suscripcion.version;
            let mut morosa = suscripcion;
            morosa.estado = EstadoSuscripcion::Morosa;
            self.facturas
                .update_con_suscripcion(&vencida, version, &morosa, version_s)
                .await?;
            return Ok(true);
        }
        self.facturas.update(&vencida, version).await?;
        Ok(false)
    }

    /// Grace-period escalation, keyed on the oldest overdue invoice per
    /// subscription: MOROSA past the suspension threshold becomes SUSPENDIDA,
    /// SUSPENDIDA past the expiry threshold becomes EXPIRADA.
    async fn escalar_morosidad(&self, hoy: NaiveDate) -> AppResult<(i64, i64, i64)> {
        let mut mas_antigua: HashMap<Uuid, NaiveDate> = HashMap::new();
        for factura in self.facturas.list_vencidas().await? {
            mas_antigua
                .entry(factura.suscripcion_id)
                .and_modify(|fecha| *fecha = (*fecha).min(factura.fecha_vencimiento))
                .or_insert(factura.fecha_vencimiento);
        }

        let (mut suspendidas, mut expiradas, mut errores) = (0, 0, 0);
        for (suscripcion_id, vencimiento) in mas_antigua {
            let dias_en_mora = (hoy - vencimiento).num_days();
            let Some(suscripcion) = self.suscripciones.get_by_id(suscripcion_id).await? else {
                continue;
            };
            let hacia = match suscripcion.estado {
                EstadoSuscripcion::Morosa if dias_en_mora >= self.politica.dias_para_suspension => {
                    EstadoSuscripcion::Suspendida
                }
                EstadoSuscripcion::Suspendida
                    if dias_en_mora >= self.politica.dias_para_expiracion =>
                {
                    EstadoSuscripcion::Expirada
                }
                _ => continue,
            };
            let version = suscripcion.version;
            let mut escalada = suscripcion;
            escalada.estado = hacia;
            match self.suscripciones.update(&escalada, version).await {
                Ok(_) if hacia == EstadoSuscripcion::Suspendida => suspendidas += 1,
                Ok(_) => expiradas += 1,
                Err(e) => {
                    warn!(error = %e, "fallo al escalar una suscripción en mora");
                    errores += 1;
                }
            }
        }
        Ok((suspendidas, expiradas, errores))
    }
}
