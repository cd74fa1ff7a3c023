use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::Row;
use uuid::Uuid;

use crate::{
    adapters::persistence::{PostgresPersistence, registrar_revision},
    app_error::{AppError, AppResult},
    application::use_cases::suscripciones::SuscripcionRepo,
    domain::entities::auditoria::{OperacionAuditoria, TipoEntidad},
    domain::entities::suscripcion::{EstadoSuscripcion, Suscripcion},
};

const SELECT_COLS: &str = r#"
    id, usuario_id, plan_id, estado, fecha_inicio, fecha_proximo_cobro,
    renovacion_automatica, precio_actual, credito_prorrateo,
    motivo_cancelacion, fecha_cancelacion, fecha_creacion, version
"#;

const ESTADOS_TERMINALES: &str = "('CANCELADA', 'EXPIRADA')";

pub(crate) fn row_to_suscripcion(row: &sqlx::postgres::PgRow) -> AppResult<Suscripcion> {
    let estado: String = row.get("estado");
    Ok(Suscripcion {
        id: row.get("id"),
        usuario_id: row.get("usuario_id"),
        plan_id: row.get("plan_id"),
        estado: EstadoSuscripcion::parse(&estado)
            .ok_or_else(|| AppError::Internal(format!("estado desconocido: {estado}")))?,
        fecha_inicio: row.get("fecha_inicio"),
        fecha_proximo_cobro: row.get("fecha_proximo_cobro"),
        renovacion_automatica: row.get("renovacion_automatica"),
        precio_actual: row.get("precio_actual"),
        credito_prorrateo: row.get("credito_prorrateo"),
        motivo_cancelacion: row.get("motivo_cancelacion"),
        fecha_cancelacion: row.get("fecha_cancelacion"),
        fecha_creacion: row.get("fecha_creacion"),
        version: row.get("version"),
    })
}

/// CAS update plus its MODIFICACION revision, inside the caller's
/// transaction. Shared with the invoice adapter so issuance commits the
/// invoice and the subscription advance as one unit.
pub(crate) async fn actualizar_tx(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    suscripcion: &Suscripcion,
    version_esperada: i64,
) -> AppResult<Suscripcion> {
    let row = sqlx::query(&format!(
        r#"
        UPDATE suscripciones SET
            plan_id = $3, estado = $4, fecha_proximo_cobro = $5,
            renovacion_automatica = $6, precio_actual = $7,
            credito_prorrateo = $8, motivo_cancelacion = $9,
            fecha_cancelacion = $10, version = version + 1
        WHERE id = $1 AND version = $2
        RETURNING {SELECT_COLS}
        "#
    ))
    .bind(suscripcion.id)
    .bind(version_esperada)
    .bind(suscripcion.plan_id)
    .bind(suscripcion.estado.as_str())
    .bind(suscripcion.fecha_proximo_cobro)
    .bind(suscripcion.renovacion_automatica)
    .bind(suscripcion.precio_actual)
    .bind(suscripcion.credito_prorrateo)
    .bind(&suscripcion.motivo_cancelacion)
    .bind(suscripcion.fecha_cancelacion)
    .fetch_optional(&mut **tx)
    .await
    .map_err(AppError::from)?;
    let guardada = match row {
        Some(row) => row_to_suscripcion(&row)?,
        None => return Err(AppError::Conflict),
    };
    registrar_revision(
        tx,
        TipoEntidad::Suscripcion,
        guardada.id,
        OperacionAuditoria::Modificacion,
        &guardada.snapshot(),
    )
    .await?;
    Ok(guardada)
}

#[async_trait]
impl SuscripcionRepo for PostgresPersistence {
    async fn insert(&self, suscripcion: &Suscripcion) -> AppResult<Suscripcion> {
        let mut tx = self.pool().begin().await.map_err(AppError::from)?;
        let row = sqlx::query(&format!(
            r#"
            INSERT INTO suscripciones
                (id, usuario_id, plan_id, estado, fecha_inicio,
                 fecha_proximo_cobro, renovacion_automatica, precio_actual,
                 credito_prorrateo, motivo_cancelacion, fecha_cancelacion,
                 fecha_creacion, version)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            RETURNING {SELECT_COLS}
            "#
        ))
        .bind(suscripcion.id)
        .bind(suscripcion.usuario_id)
        .bind(suscripcion.plan_id)
        .bind(suscripcion.estado.as_str())
        .bind(suscripcion.fecha_inicio)
        .bind(suscripcion.fecha_proximo_cobro)
        .bind(suscripcion.renovacion_automatica)
        .bind(suscripcion.precio_actual)
        .bind(suscripcion.credito_prorrateo)
        .bind(&suscripcion.motivo_cancelacion)
        .bind(suscripcion.fecha_cancelacion)
        .bind(suscripcion.fecha_creacion)
        .bind(suscripcion.version)
        .fetch_one(&mut *tx)
        .await
        .map_err(AppError::from)?;
        let guardada = row_to_suscripcion(&row)?;
        registrar_revision(
            &mut tx,
            TipoEntidad::Suscripcion,
            guardada.id,
            OperacionAuditoria::Creacion,
            &guardada.snapshot(),
        )
        .await?;
        tx.commit().await.map_err(AppError::from)?;
        Ok(guardada)
    }

    async fn update(
        &self,
        suscripcion: &Suscripcion,
        version_esperada: i64,
    ) -> AppResult<Suscripcion> {
        let mut tx = self.pool().begin().await.map_err(AppError::from)?;
        let guardada = actualizar_tx(&mut tx, suscripcion, version_esperada).await?;
        tx.commit().await.map_err(AppError::from)?;
        Ok(guardada)
    }

    async fn get_by_id(&self, id: Uuid) -> AppResult<Option<Suscripcion>> {
        let row = sqlx::query(&format!(
            "SELECT {SELECT_COLS} FROM suscripciones WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(self.pool())
        .await
        .map_err(AppError::from)?;
        row.as_ref().map(row_to_suscripcion).transpose()
    }

    async fn list_all(&self) -> AppResult<Vec<Suscripcion>> {
        let rows = sqlx::query(&format!(
            "SELECT {SELECT_COLS} FROM suscripciones ORDER BY fecha_creacion DESC"
        ))
        .fetch_all(self.pool())
        .await
        .map_err(AppError::from)?;
        rows.iter().map(row_to_suscripcion).collect()
    }

    async fn list_by_usuario(&self, usuario_id: Uuid) -> AppResult<Vec<Suscripcion>> {
        let rows = sqlx::query(&format!(
            "SELECT {SELECT_COLS} FROM suscripciones WHERE usuario_id = $1 ORDER BY fecha_creacion DESC"
        ))
        .bind(usuario_id)
        .fetch_all(self.pool())
        .await
        .map_err(AppError::from)?;
        rows.iter().map(row_to_suscripcion).collect()
    }

    async fn find_no_terminal_by_usuario(
        &self,
        usuario_id: Uuid,
    ) -> AppResult<Option<Suscripcion>> {
        let row = sqlx::query(&format!(
            "SELECT {SELECT_COLS} FROM suscripciones WHERE usuario_id = $1 AND estado NOT IN {ESTADOS_TERMINALES} LIMIT 1"
        ))
        .bind(usuario_id)
        .fetch_optional(self.pool())
        .await
        .map_err(AppError::from)?;
        row.as_ref().map(row_to_suscripcion).transpose()
    }

    async fn exists_by_plan(&self, plan_id: Uuid) -> AppResult<bool> {
        let existe: bool =
            sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM suscripciones WHERE plan_id = $1)")
                .bind(plan_id)
                .fetch_one(self.pool())
                .await
                .map_err(AppError::from)?;
        Ok(existe)
    }

    async fn exists_viva_by_plan(&self, plan_id: Uuid) -> AppResult<bool> {
        let existe: bool = sqlx::query_scalar(&format!(
            "SELECT EXISTS (SELECT 1 FROM suscripciones WHERE plan_id = $1 AND estado NOT IN {ESTADOS_TERMINALES})"
        ))
        .bind(plan_id)
        .fetch_one(self.pool())
        .await
        .map_err(AppError::from)?;
        Ok(existe)
    }

    async fn exists_by_usuario(&self, usuario_id: Uuid) -> AppResult<bool> {
        let existe: bool =
            sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM suscripciones WHERE usuario_id = $1)")
                .bind(usuario_id)
                .fetch_one(self.pool())
                .await
                .map_err(AppError::from)?;
        Ok(existe)
    }

    async fn list_para_facturar(&self, hasta: NaiveDate) -> AppResult<Vec<Suscripcion>> {
        let rows = sqlx::query(&format!(
            r#"
            SELECT {SELECT_COLS} FROM suscripciones
            WHERE estado IN ('TRIAL', 'ACTIVA', 'MOROSA') AND fecha_proximo_cobro <= $1
            ORDER BY fecha_proximo_cobro ASC
            "#
        ))
        .bind(hasta)
        .fetch_all(self.pool())
        .await
        .map_err(AppError::from)?;
        rows.iter().map(row_to_suscripcion).collect()
    }

    async fn count_por_estado(&self) -> AppResult<Vec<(EstadoSuscripcion, i64)>> {
        let rows = sqlx::query("SELECT estado, COUNT(*) AS cantidad FROM suscripciones GROUP BY estado")
            .fetch_all(self.pool())
            .await
            .map_err(AppError::from)?;
        rows.iter()
            .map(|row| {
                let estado: String = row.get("estado");
                let estado = EstadoSuscripcion::parse(&estado)
                    .ok_or_else(|| AppError::Internal(format!("estado desconocido: {estado}")))?;
                Ok((estado, row.get("cantidad")))
            })
            .collect()
    }
}
