use async_trait::async_trait;
use sqlx::Row;
use uuid::Uuid;

use crate::{
    adapters::persistence::PostgresPersistence,
    app_error::{AppError, AppResult},
    application::use_cases::auditoria::AuditoriaRepo,
    domain::entities::auditoria::{OperacionAuditoria, RevisionAuditoria, TipoEntidad},
};

const SELECT_COLS: &str = "revision, tipo, entidad_id, operacion, fecha, snapshot";

fn row_to_revision(row: &sqlx::postgres::PgRow) -> AppResult<RevisionAuditoria> {
    let tipo: String = row.get("tipo");
    let operacion: String = row.get("operacion");
    Ok(RevisionAuditoria {
        revision: row.get("revision"),
        tipo: TipoEntidad::parse(&tipo)
            .ok_or_else(|| AppError::Internal(format!("tipo desconocido: {tipo}")))?,
        entidad_id: row.get("entidad_id"),
        operacion: OperacionAuditoria::parse(&operacion)
            .ok_or_else(|| AppError::Internal(format!("operación desconocida: {operacion}")))?,
        fecha: row.get("fecha"),
        snapshot: row.get("snapshot"),
    })
}

#[async_trait]
impl AuditoriaRepo for PostgresPersistence {
    async fn list_recientes(&self, limite: i64) -> AppResult<Vec<RevisionAuditoria>> {
        let rows = sqlx::query(&format!(
            "SELECT {SELECT_COLS} FROM revisiones_auditoria ORDER BY revision DESC LIMIT $1"
        ))
        .bind(limite)
        .fetch_all(self.pool())
        .await
        .map_err(AppError::from)?;
        rows.iter().map(row_to_revision).collect()
    }

    async fn list_by_tipo(
        &self,
        tipo: TipoEntidad,
        limite: i64,
    ) -> AppResult<Vec<RevisionAuditoria>> {
        let rows = sqlx::query(&format!(
            "SELECT {SELECT_COLS} FROM revisiones_auditoria WHERE tipo = $1 ORDER BY revision DESC LIMIT $2"
        ))
        .bind(tipo.as_str())
        .bind(limite)
        .fetch_all(self.pool())
        .await
        .map_err(AppError::from)?;
        rows.iter().map(row_to_revision).collect()
    }

    async fn list_by_entidad(
        &self,
        tipo: TipoEntidad,
        entidad_id: Uuid,
    ) -> AppResult<Vec<RevisionAuditoria>> {
        let rows = sqlx::query(&format!(
            "SELECT {SELECT_COLS} FROM revisiones_auditoria WHERE tipo = $1 AND entidad_id = $2 ORDER BY revision ASC"
        ))
        .bind(tipo.as_str())
        .bind(entidad_id)
        .fetch_all(self.pool())
        .await
        .map_err(AppError::from)?;
        rows.iter().map(row_to_revision).collect()
    }

    async fn get_revision(
        &self,
        tipo: TipoEntidad,
        entidad_id: Uuid,
        revision: i64,
    ) -> AppResult<Option<RevisionAuditoria>> {
        let row = sqlx::query(&format!(
            "SELECT {SELECT_COLS} FROM revisiones_auditoria WHERE tipo = $1 AND entidad_id = $2 AND revision = $3"
        ))
        .bind(tipo.as_str())
        .bind(entidad_id)
        .bind(revision)
        .fetch_optional(self.pool())
        .await
        .map_err(AppError::from)?;
        row.as_ref().map(row_to_revision).transpose()
    }

    async fn count_por_tipo(&self) -> AppResult<Vec<(TipoEntidad, i64)>> {
        let rows = sqlx::query(
            "SELECT tipo, COUNT(*) AS cantidad FROM revisiones_auditoria GROUP BY tipo",
        )
        .fetch_all(self.pool())
        .await
        .map_err(AppError::from)?;
        rows.iter()
            .map(|row| {
                let tipo: String = row.get("tipo");
                let tipo = TipoEntidad::parse(&tipo)
                    .ok_or_else(|| AppError::Internal(format!("tipo desconocido: {tipo}")))?;
                Ok((tipo, row.get("cantidad")))
            })
            .collect()
    }

    async fn count_por_operacion(&self) -> AppResult<Vec<(OperacionAuditoria, i64)>> {
        let rows = sqlx::query(
            "SELECT operacion, COUNT(*) AS cantidad FROM revisiones_auditoria GROUP BY operacion",
        )
        .fetch_all(self.pool())
        .await
        .map_err(AppError::from)?;
        rows.iter()
            .map(|row| {
                let operacion: String = row.get("operacion");
                let operacion = OperacionAuditoria::parse(&operacion).ok_or_else(|| {
                    AppError::Internal(format!("operación desconocida: {operacion}"))
                })?;
                Ok((operacion, row.get("cantidad")))
            })
            .collect()
    }
}
