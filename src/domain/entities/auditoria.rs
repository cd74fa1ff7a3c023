use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Closed set of auditable aggregates. The audit log dispatches on this tag
/// instead of reflecting over arbitrary shapes, so the snapshot format stays
/// stable and inspectable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TipoEntidad {
    Usuario,
    Plan,
    Suscripcion,
    Factura,
}

impl TipoEntidad {
    pub const TODOS: [TipoEntidad; 4] = [
        TipoEntidad::Usuario,
        TipoEntidad::Plan,
        TipoEntidad::Suscripcion,
        TipoEntidad::Factura,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TipoEntidad::Usuario => "USUARIO",
            TipoEntidad::Plan => "PLAN",
            TipoEntidad::Suscripcion => "SUSCRIPCION",
            TipoEntidad::Factura => "FACTURA",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_uppercase().as_str() {
            "USUARIO" => Some(TipoEntidad::Usuario),
            "PLAN" => Some(TipoEntidad::Plan),
            "SUSCRIPCION" | "SUSCRIPCIÓN" => Some(TipoEntidad::Suscripcion),
            "FACTURA" => Some(TipoEntidad::Factura),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OperacionAuditoria {
    Creacion,
    Modificacion,
    Eliminacion,
}

impl OperacionAuditoria {
    pub const TODAS: [OperacionAuditoria; 3] = [
        OperacionAuditoria::Creacion,
        OperacionAuditoria::Modificacion,
        OperacionAuditoria::Eliminacion,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            OperacionAuditoria::Creacion => "CREACION",
            OperacionAuditoria::Modificacion => "MODIFICACION",
            OperacionAuditoria::Eliminacion => "ELIMINACION",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_uppercase().as_str() {
            "CREACION" => Some(OperacionAuditoria::Creacion),
            "MODIFICACION" => Some(OperacionAuditoria::Modificacion),
            "ELIMINACION" => Some(OperacionAuditoria::Eliminacion),
            _ => None,
        }
    }
}

/// One immutable record in the append-only revision log. The snapshot holds
/// the complete post-operation field set, or the pre-deletion set for
/// ELIMINACION.
#[derive(Debug, Clone, Serialize)]
pub struct RevisionAuditoria {
    /// Globally strictly-increasing across all entity types.
    pub revision: i64,
    pub tipo: TipoEntidad,
    pub entidad_id: Uuid,
    pub operacion: OperacionAuditoria,
    pub fecha: DateTime<Utc>,
    pub snapshot: serde_json::Value,
}
