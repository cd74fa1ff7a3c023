use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

use crate::domain::money::Centimos;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EstadoSuscripcion {
    Trial,
    Activa,
    Morosa,
    Suspendida,
    Cancelada,
    Expirada,
}

impl EstadoSuscripcion {
    pub const TODOS: [EstadoSuscripcion; 6] = [
        EstadoSuscripcion::Trial,
        EstadoSuscripcion::Activa,
        EstadoSuscripcion::Morosa,
        EstadoSuscripcion::Suspendida,
        EstadoSuscripcion::Cancelada,
        EstadoSuscripcion::Expirada,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EstadoSuscripcion::Trial => "TRIAL",
            EstadoSuscripcion::Activa => "ACTIVA",
            EstadoSuscripcion::Morosa => "MOROSA",
            EstadoSuscripcion::Suspendida => "SUSPENDIDA",
            EstadoSuscripcion::Cancelada => "CANCELADA",
            EstadoSuscripcion::Expirada => "EXPIRADA",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_uppercase().as_str() {
            "TRIAL" => Some(EstadoSuscripcion::Trial),
            "ACTIVA" => Some(EstadoSuscripcion::Activa),
            "MOROSA" => Some(EstadoSuscripcion::Morosa),
            "SUSPENDIDA" => Some(EstadoSuscripcion::Suspendida),
            "CANCELADA" => Some(EstadoSuscripcion::Cancelada),
            "EXPIRADA" => Some(EstadoSuscripcion::Expirada),
            _ => None,
        }
    }

    /// Terminal states admit no further transition.
    pub fn es_terminal(&self) -> bool {
        matches!(
            self,
            EstadoSuscripcion::Cancelada | EstadoSuscripcion::Expirada
        )
    }

    /// The client treats these as "the user still has access".
    pub fn tiene_acceso(&self) -> bool {
        matches!(
            self,
            EstadoSuscripcion::Trial | EstadoSuscripcion::Activa | EstadoSuscripcion::Morosa
        )
    }
}

/// Single source of truth for lifecycle legality: every legal (from, to) pair
/// is listed here and nowhere else, so the whole table is enumerable in tests.
pub fn transicion_permitida(desde: EstadoSuscripcion, hacia: EstadoSuscripcion) -> bool {
    use EstadoSuscripcion::*;
    matches!(
        (desde, hacia),
        // trial conversion and cancellation
        (Trial, Activa) | (Trial, Cancelada)
        // delinquency cycle
        | (Activa, Morosa) | (Morosa, Activa) | (Morosa, Suspendida) | (Suspendida, Activa)
        // explicit cancellation from any non-terminal state
        | (Activa, Cancelada) | (Morosa, Cancelada) | (Suspendida, Cancelada)
        // reactivation inside the grace window (window enforced by the caller)
        | (Cancelada, Activa)
        // expiry of any non-terminal state
        | (Trial, Expirada) | (Activa, Expirada) | (Morosa, Expirada) | (Suspendida, Expirada)
    )
}

#[derive(Debug, Clone)]
pub struct Suscripcion {
    pub id: Uuid,
    pub usuario_id: Uuid,
    pub plan_id: Uuid,
    pub estado: EstadoSuscripcion,
    pub fecha_inicio: NaiveDate,
    pub fecha_proximo_cobro: NaiveDate,
    pub renovacion_automatica: bool,
    /// Effective price; may diverge from the plan price after changes.
    pub precio_actual: Centimos,
    /// Pending downgrade credit, consumed by the next invoice. Never negative.
    pub credito_prorrateo: Centimos,
    pub motivo_cancelacion: Option<String>,
    pub fecha_cancelacion: Option<DateTime<Utc>>,
    pub fecha_creacion: DateTime<Utc>,
    pub version: i64,
}

impl Suscripcion {
    pub fn snapshot(&self) -> serde_json::Value {
        json!({
            "usuarioId": self.usuario_id,
            "planId": self.plan_id,
            "estado": self.estado.as_str(),
            "fechaInicio": self.fecha_inicio,
            "fechaProximoCobro": self.fecha_proximo_cobro,
            "renovacionAutomatica": self.renovacion_automatica,
            "precioActual": crate::domain::money::a_decimal(self.precio_actual),
            "creditoProrrateo": crate::domain::money::a_decimal(self.credito_prorrateo),
            "motivoCancelacion": self.motivo_cancelacion,
            "fechaCancelacion": self.fecha_cancelacion,
            "fechaCreacion": self.fecha_creacion,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::EstadoSuscripcion::*;
    use super::*;

    #[test]
    fn pares_legales_completos() {
        let legales = [
            (Trial, Activa),
            (Trial, Cancelada),
            (Trial, Expirada),
            (Activa, Morosa),
            (Activa, Cancelada),
            (Activa, Expirada),
            (Morosa, Activa),
            (Morosa, Suspendida),
            (Morosa, Cancelada),
            (Morosa, Expirada),
            (Suspendida, Activa),
            (Suspendida, Cancelada),
            (Suspendida, Expirada),
            (Cancelada, Activa),
        ];
        for desde in EstadoSuscripcion::TODOS {
            for hacia in EstadoSuscripcion::TODOS {
                let esperado = legales.contains(&(desde, hacia));
                assert_eq!(
                    transicion_permitida(desde, hacia),
                    esperado,
                    "{} -> {}",
                    desde.as_str(),
                    hacia.as_str()
                );
            }
        }
    }

    #[test]
    fn estados_terminales_sin_salida() {
        for hacia in EstadoSuscripcion::TODOS {
            assert!(!transicion_permitida(Expirada, hacia));
            if hacia != Activa {
                assert!(!transicion_permitida(Cancelada, hacia));
            }
        }
    }
}
