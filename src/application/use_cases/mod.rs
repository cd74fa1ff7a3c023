pub mod auditoria;
pub mod facturacion;
pub mod planes;
pub mod suscripciones;
pub mod usuarios;

/// Billing-policy knobs the engine reads instead of hard-coding. Defaults
/// mirror the values the finance side has been operating with.
#[derive(Debug, Clone)]
pub struct PoliticaCiclo {
    /// Applied when the subscription owner has no country on file.
    pub tasa_impuesto_default: f64,
    /// Cycle length; also the proration day-count basis.
    pub dias_intervalo_facturacion: i64,
    /// Days between invoice issuance and its due date.
    pub dias_vencimiento_factura: i64,
    /// Proration invoices come due faster than monthly ones.
    pub dias_vencimiento_prorrateo: i64,
    /// Days past due before a delinquent subscription is suspended.
    pub dias_para_suspension: i64,
    /// Days past due before a suspended subscription expires.
    pub dias_para_expiracion: i64,
    /// Window after cancellation during which reactivation is allowed.
    pub ventana_reactivacion_dias: i64,
    /// Optimistic-concurrency retries before surfacing CONFLICT.
    pub max_reintentos_conflicto: u32,
}

impl Default for PoliticaCiclo {
    fn default() -> Self {
        Self {
            tasa_impuesto_default: crate::domain::money::TASA_IMPUESTO_DEFAULT,
            dias_intervalo_facturacion: 30,
            dias_vencimiento_factura: 15,
            dias_vencimiento_prorrateo: 7,
            dias_para_suspension: 30,
            dias_para_expiracion: 60,
            ventana_reactivacion_dias: 30,
            max_reintentos_conflicto: 3,
        }
    }
}
