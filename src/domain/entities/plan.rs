use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

use crate::domain::money::Centimos;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NivelPlan {
    Basic,
    Premium,
    Enterprise,
}

impl NivelPlan {
    pub fn as_str(&self) -> &'static str {
        match self {
            NivelPlan::Basic => "BASIC",
            NivelPlan::Premium => "PREMIUM",
            NivelPlan::Enterprise => "ENTERPRISE",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s.to_uppercase().as_str() {
            "PREMIUM" => NivelPlan::Premium,
            "ENTERPRISE" => NivelPlan::Enterprise,
            _ => NivelPlan::Basic,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Plan {
    pub id: Uuid,
    pub nombre: String,
    pub nivel: NivelPlan,
    /// Monthly price in céntimos, never negative.
    pub precio_mensual: Centimos,
    pub descripcion: Option<String>,
    pub max_usuarios: Option<i32>,
    pub almacenamiento_gb: Option<i32>,
    pub soporte_prioritario: bool,
    /// 0 means the plan has no trial period.
    pub dias_prueba: i32,
    pub activo: bool,
    pub fecha_creacion: DateTime<Utc>,
    pub version: i64,
}

impl Plan {
    pub fn ofrece_prueba(&self) -> bool {
        self.dias_prueba > 0
    }

    pub fn snapshot(&self) -> serde_json::Value {
        json!({
            "nombre": self.nombre,
            "nivel": self.nivel.as_str(),
            "precioMensual": crate::domain::money::a_decimal(self.precio_mensual),
            "descripcion": self.descripcion,
            "maxUsuarios": self.max_usuarios,
            "almacenamientoGb": self.almacenamiento_gb,
            "soportePrioritario": self.soporte_prioritario,
            "diasPrueba": self.dias_prueba,
            "activo": self.activo,
            "fechaCreacion": self.fecha_creacion,
        })
    }
}
