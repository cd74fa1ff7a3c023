use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RolUsuario {
    User,
    Admin,
}

impl RolUsuario {
    pub fn as_str(&self) -> &'static str {
        match self {
            RolUsuario::User => "USER",
            RolUsuario::Admin => "ADMIN",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s.to_uppercase().as_str() {
            "ADMIN" => RolUsuario::Admin,
            _ => RolUsuario::User,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Usuario {
    pub id: Uuid,
    pub nombre: String,
    pub apellido: String,
    /// Stored lower-cased; uniqueness is case-insensitive.
    pub email: String,
    pub password_hash: String,
    pub rol: RolUsuario,
    /// ISO code or country name, drives the invoice tax rate.
    pub pais: Option<String>,
    pub activo: bool,
    pub fecha_registro: DateTime<Utc>,
    pub version: i64,
}

impl Usuario {
    /// Field snapshot recorded with every audit revision.
    pub fn snapshot(&self) -> serde_json::Value {
        json!({
            "nombre": self.nombre,
            "apellido": self.apellido,
            "email": self.email,
            "passwordHash": self.password_hash,
            "rol": self.rol.as_str(),
            "pais": self.pais,
            "activo": self.activo,
            "fechaRegistro": self.fecha_registro,
        })
    }
}
