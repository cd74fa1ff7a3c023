use async_trait::async_trait;
use sqlx::Row;
use uuid::Uuid;

use crate::{
    adapters::persistence::{PostgresPersistence, registrar_revision},
    app_error::{AppError, AppResult},
    application::use_cases::planes::PlanRepo,
    domain::entities::auditoria::{OperacionAuditoria, TipoEntidad},
    domain::entities::plan::{NivelPlan, Plan},
};

const SELECT_COLS: &str = r#"
    id, nombre, nivel, precio_mensual, descripcion, max_usuarios,
    almacenamiento_gb, soporte_prioritario, dias_prueba, activo,
    fecha_creacion, version
"#;

fn row_to_plan(row: &sqlx::postgres::PgRow) -> Plan {
    let nivel: String = row.get("nivel");
    Plan {
        id: row.get("id"),
        nombre: row.get("nombre"),
        nivel: NivelPlan::parse(&nivel),
        precio_mensual: row.get("precio_mensual"),
        descripcion: row.get("descripcion"),
        max_usuarios: row.get("max_usuarios"),
        almacenamiento_gb: row.get("almacenamiento_gb"),
        soporte_prioritario: row.get("soporte_prioritario"),
        dias_prueba: row.get("dias_prueba"),
        activo: row.get("activo"),
        fecha_creacion: row.get("fecha_creacion"),
        version: row.get("version"),
    }
}

async fn actualizar_tx(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    plan: &Plan,
    version_esperada: i64,
) -> AppResult<Plan> {
    let row = sqlx::query(&format!(
        r#"
        UPDATE planes SET
            nombre = $3, nivel = $4, precio_mensual = $5, descripcion = $6,
            max_usuarios = $7, almacenamiento_gb = $8, soporte_prioritario = $9,
            dias_prueba = $10, activo = $11, version = version + 1
        WHERE id = $1 AND version = $2
        RETURNING {SELECT_COLS}
        "#
    ))
    .bind(plan.id)
    .bind(version_esperada)
    .bind(&plan.nombre)
    .bind(plan.nivel.as_str())
    .bind(plan.precio_mensual)
    .bind(&plan.descripcion)
    .bind(plan.max_usuarios)
    .bind(plan.almacenamiento_gb)
    .bind(plan.soporte_prioritario)
    .bind(plan.dias_prueba)
    .bind(plan.activo)
    .fetch_optional(&mut **tx)
    .await
    .map_err(AppError::from)?;
    row.as_ref().map(row_to_plan).ok_or(AppError::Conflict)
}

#[async_trait]
impl PlanRepo for PostgresPersistence {
    async fn insert(&self, plan: &Plan) -> AppResult<Plan> {
        let mut tx = self.pool().begin().await.map_err(AppError::from)?;
        let row = sqlx::query(&format!(
            r#"
            INSERT INTO planes
                (id, nombre, nivel, precio_mensual, descripcion, max_usuarios,
                 almacenamiento_gb, soporte_prioritario, dias_prueba, activo,
                 fecha_creacion, version)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            RETURNING {SELECT_COLS}
            "#
        ))
        .bind(plan.id)
        .bind(&plan.nombre)
        .bind(plan.nivel.as_str())
        .bind(plan.precio_mensual)
        .bind(&plan.descripcion)
        .bind(plan.max_usuarios)
        .bind(plan.almacenamiento_gb)
        .bind(plan.soporte_prioritario)
        .bind(plan.dias_prueba)
        .bind(plan.activo)
        .bind(plan.fecha_creacion)
        .bind(plan.version)
        .fetch_one(&mut *tx)
        .await
        .map_err(AppError::from)?;
        let guardado = row_to_plan(&row);
        registrar_revision(
            &mut tx,
            TipoEntidad::Plan,
            guardado.id,
            OperacionAuditoria::Creacion,
            &guardado.snapshot(),
        )
        .await?;
        tx.commit().await.map_err(AppError::from)?;
        Ok(guardado)
    }

    async fn update(&self, plan: &Plan, version_esperada: i64) -> AppResult<Plan> {
        let mut tx = self.pool().begin().await.map_err(AppError::from)?;
        let guardado = actualizar_tx(&mut tx, plan, version_esperada).await?;
        registrar_revision(
            &mut tx,
            TipoEntidad::Plan,
            guardado.id,
            OperacionAuditoria::Modificacion,
            &guardado.snapshot(),
        )
        .await?;
        tx.commit().await.map_err(AppError::from)?;
        Ok(guardado)
    }

    async fn soft_delete(&self, plan: &Plan, version_esperada: i64) -> AppResult<Plan> {
        let mut tx = self.pool().begin().await.map_err(AppError::from)?;
        let guardado = actualizar_tx(&mut tx, plan, version_esperada).await?;
        registrar_revision(
            &mut tx,
            TipoEntidad::Plan,
            guardado.id,
            OperacionAuditoria::Eliminacion,
            &guardado.snapshot(),
        )
        .await?;
        tx.commit().await.map_err(AppError::from)?;
        Ok(guardado)
    }

    async fn delete(&self, id: Uuid) -> AppResult<()> {
        let mut tx = self.pool().begin().await.map_err(AppError::from)?;
        let row = sqlx::query(&format!("SELECT {SELECT_COLS} FROM planes WHERE id = $1"))
            .bind(id)
            .fetch_optional(&mut *tx)
            .await
            .map_err(AppError::from)?;
        let Some(row) = row else {
            return Err(AppError::NotFound);
        };
        let plan = row_to_plan(&row);
        sqlx::query("DELETE FROM planes WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(AppError::from)?;
        registrar_revision(
            &mut tx,
            TipoEntidad::Plan,
            id,
            OperacionAuditoria::Eliminacion,
            &plan.snapshot(),
        )
        .await?;
        tx.commit().await.map_err(AppError::from)?;
        Ok(())
    }

    async fn get_by_id(&self, id: Uuid) -> AppResult<Option<Plan>> {
        let row = sqlx::query(&format!("SELECT {SELECT_COLS} FROM planes WHERE id = $1"))
            .bind(id)
            .fetch_optional(self.pool())
            .await
            .map_err(AppError::from)?;
        Ok(row.as_ref().map(row_to_plan))
    }

    async fn list_all(&self) -> AppResult<Vec<Plan>> {
        let rows = sqlx::query(&format!(
            "SELECT {SELECT_COLS} FROM planes ORDER BY precio_mensual ASC"
        ))
        .fetch_all(self.pool())
        .await
        .map_err(AppError::from)?;
        Ok(rows.iter().map(row_to_plan).collect())
    }

    async fn list_activos(&self) -> AppResult<Vec<Plan>> {
        let rows = sqlx::query(&format!(
            "SELECT {SELECT_COLS} FROM planes WHERE activo ORDER BY precio_mensual ASC"
        ))
        .fetch_all(self.pool())
        .await
        .map_err(AppError::from)?;
        Ok(rows.iter().map(row_to_plan).collect())
    }
}
