use sqlx::PgPool;
use uuid::Uuid;

use crate::{
    app_error::{AppError, AppResult},
    domain::entities::auditoria::{OperacionAuditoria, TipoEntidad},
};

pub mod auditoria;
pub mod factura;
pub mod plan;
pub mod suscripcion;
pub mod usuario;

#[derive(Clone)]
pub struct PostgresPersistence {
    pool: PgPool,
}

impl PostgresPersistence {
    pub fn new(pool: PgPool) -> Self {
        PostgresPersistence { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

/// Appends one revision inside the caller's transaction so the entity write
/// and its audit record commit or roll back together. The revision number
/// comes from the table's sequence, global across entity types.
pub(crate) async fn registrar_revision(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    tipo: TipoEntidad,
    entidad_id: Uuid,
    operacion: OperacionAuditoria,
    snapshot: &serde_json::Value,
) -> AppResult<()> {
    sqlx::query(
        r#"
        INSERT INTO revisiones_auditoria (tipo, entidad_id, operacion, fecha, snapshot)
        VALUES ($1, $2, $3, CURRENT_TIMESTAMP, $4)
        "#,
    )
    .bind(tipo.as_str())
    .bind(entidad_id)
    .bind(operacion.as_str())
    .bind(snapshot)
    .execute(&mut **tx)
    .await
    .map_err(AppError::from)?;
    Ok(())
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::RowNotFound => AppError::NotFound,
            sqlx::Error::Database(db_err) => {
                let msg = db_err.message();
                if msg.contains("duplicate key") || msg.contains("unique constraint") {
                    AppError::Validation("ya existe un registro con ese valor".into())
                } else if msg.contains("foreign key") {
                    AppError::Validation("el registro referenciado no existe".into())
                } else if msg.contains("null value") && msg.contains("violates not-null") {
                    AppError::Validation("falta un campo obligatorio".into())
                } else {
                    tracing::error!(error = ?err, "error de base de datos");
                    AppError::Database("la operación de base de datos falló".into())
                }
            }
            _ => {
                tracing::error!(error = ?err, "error de base de datos");
                AppError::Database("la operación de base de datos falló".into())
            }
        }
    }
}
