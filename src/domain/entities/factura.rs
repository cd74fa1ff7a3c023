use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

use crate::domain::money::{self, Centimos};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EstadoFactura {
    Pendiente,
    Pagada,
    Cancelada,
    Vencida,
}

impl EstadoFactura {
    pub const TODOS: [EstadoFactura; 4] = [
        EstadoFactura::Pendiente,
        EstadoFactura::Pagada,
        EstadoFactura::Cancelada,
        EstadoFactura::Vencida,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EstadoFactura::Pendiente => "PENDIENTE",
            EstadoFactura::Pagada => "PAGADA",
            EstadoFactura::Cancelada => "CANCELADA",
            EstadoFactura::Vencida => "VENCIDA",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_uppercase().as_str() {
            "PENDIENTE" => Some(EstadoFactura::Pendiente),
            "PAGADA" => Some(EstadoFactura::Pagada),
            "CANCELADA" => Some(EstadoFactura::Cancelada),
            "VENCIDA" => Some(EstadoFactura::Vencida),
            _ => None,
        }
    }

    pub fn sin_pagar(&self) -> bool {
        matches!(self, EstadoFactura::Pendiente | EstadoFactura::Vencida)
    }
}

/// Invoice state changes all leave PENDIENTE, plus the pay-after-due path
/// VENCIDA -> PAGADA that clears delinquency.
pub fn transicion_factura_permitida(desde: EstadoFactura, hacia: EstadoFactura) -> bool {
    use EstadoFactura::*;
    matches!(
        (desde, hacia),
        (Pendiente, Pagada) | (Pendiente, Cancelada) | (Pendiente, Vencida) | (Vencida, Pagada)
    )
}

#[derive(Debug, Clone)]
pub struct Factura {
    pub id: Uuid,
    /// Human-readable sequential number, `FAC-000123` or `PRO-000124`.
    pub numero: String,
    pub suscripcion_id: Uuid,
    /// Denormalized for querying without joining through the subscription.
    pub usuario_id: Uuid,
    pub concepto: String,
    pub fecha_emision: NaiveDate,
    pub subtotal: Centimos,
    /// Percentage, e.g. 21.0.
    pub tasa_impuesto: f64,
    pub monto_impuestos: Centimos,
    pub total: Centimos,
    pub estado: EstadoFactura,
    pub fecha_vencimiento: NaiveDate,
    pub es_prorrateo: bool,
    pub version: i64,
}

impl Factura {
    /// Issues an invoice with the tax breakdown derived from the subtotal and
    /// rate, so the total invariant holds by construction.
    #[allow(clippy::too_many_arguments)]
    pub fn nueva(
        numero: String,
        suscripcion_id: Uuid,
        usuario_id: Uuid,
        concepto: String,
        fecha_emision: NaiveDate,
        subtotal: Centimos,
        tasa_impuesto: f64,
        fecha_vencimiento: NaiveDate,
        es_prorrateo: bool,
    ) -> Self {
        let monto_impuestos = money::calcular_impuesto(subtotal, tasa_impuesto);
        Factura {
            id: Uuid::new_v4(),
            numero,
            suscripcion_id,
            usuario_id,
            concepto,
            fecha_emision,
            subtotal,
            tasa_impuesto,
            monto_impuestos,
            total: subtotal + monto_impuestos,
            estado: EstadoFactura::Pendiente,
            fecha_vencimiento,
            es_prorrateo,
            version: 1,
        }
    }

    /// `total == subtotal + round(subtotal × tasa / 100)`, the issuance
    /// invariant every stored invoice satisfies.
    pub fn cumple_invariante(&self) -> bool {
        self.monto_impuestos == money::calcular_impuesto(self.subtotal, self.tasa_impuesto)
            && self.total == self.subtotal + self.monto_impuestos
    }

    pub fn snapshot(&self) -> serde_json::Value {
        json!({
            "numero": self.numero,
            "suscripcionId": self.suscripcion_id,
            "usuarioId": self.usuario_id,
            "concepto": self.concepto,
            "fechaEmision": self.fecha_emision,
            "subtotal": money::a_decimal(self.subtotal),
            "tasaImpuesto": self.tasa_impuesto,
            "montoImpuestos": money::a_decimal(self.monto_impuestos),
            "total": money::a_decimal(self.total),
            "estado": self.estado.as_str(),
            "fechaVencimiento": self.fecha_vencimiento,
            "esProrrateo": self.es_prorrateo,
        })
    }
}
