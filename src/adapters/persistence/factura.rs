use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::Row;
use uuid::Uuid;

use crate::{
    adapters::persistence::{PostgresPersistence, registrar_revision, suscripcion},
    app_error::{AppError, AppResult},
    application::use_cases::facturacion::{FacturaRepo, FiltrosFactura, ResumenEstado},
    domain::entities::auditoria::{OperacionAuditoria, TipoEntidad},
    domain::entities::factura::{EstadoFactura, Factura},
    domain::entities::suscripcion::Suscripcion,
};

const SELECT_COLS: &str = r#"
    id, numero, suscripcion_id, usuario_id, concepto, fecha_emision, subtotal,
    tasa_impuesto, monto_impuestos, total, estado, fecha_vencimiento,
    es_prorrateo, version
"#;

// Every filter is optional; a NULL bind disables its clause.
const FILTROS_WHERE: &str = r#"
    ($1::uuid IS NULL OR usuario_id = $1)
    AND ($2::uuid IS NULL OR suscripcion_id = $2)
    AND ($3::text IS NULL OR estado = $3)
    AND ($4::date IS NULL OR fecha_emision >= $4)
    AND ($5::date IS NULL OR fecha_emision <= $5)
    AND ($6::bigint IS NULL OR total >= $6)
    AND ($7::bigint IS NULL OR total <= $7)
    AND ($8::boolean IS NULL OR es_prorrateo = $8)
"#;

fn row_to_factura(row: &sqlx::postgres::PgRow) -> AppResult<Factura> {
    let estado: String = row.get("estado");
    Ok(Factura {
        id: row.get("id"),
        numero: row.get("numero"),
        suscripcion_id: row.get("suscripcion_id"),
        usuario_id: row.get("usuario_id"),
        concepto: row.get("concepto"),
        fecha_emision: row.get("fecha_emision"),
        subtotal: row.get("subtotal"),
        tasa_impuesto: row.get("tasa_impuesto"),
        monto_impuestos: row.get("monto_impuestos"),
        total: row.get("total"),
        estado: EstadoFactura::parse(&estado)
            .ok_or_else(|| AppError::Internal(format!("estado desconocido: {estado}")))?,
        fecha_vencimiento: row.get("fecha_vencimiento"),
        es_prorrateo: row.get("es_prorrateo"),
        version: row.get("version"),
    })
}

async fn insertar_tx(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    factura: &Factura,
) -> AppResult<Factura> {
    let row = sqlx::query(&format!(
        r#"
        INSERT INTO facturas
            (id, numero, suscripcion_id, usuario_id, concepto, fecha_emision,
             subtotal, tasa_impuesto, monto_impuestos, total, estado,
             fecha_vencimiento, es_prorrateo, version)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
        RETURNING {SELECT_COLS}
        "#
    ))
    .bind(factura.id)
    .bind(&factura.numero)
    .bind(factura.suscripcion_id)
    .bind(factura.usuario_id)
    .bind(&factura.concepto)
    .bind(factura.fecha_emision)
    .bind(factura.subtotal)
    .bind(factura.tasa_impuesto)
    .bind(factura.monto_impuestos)
    .bind(factura.total)
    .bind(factura.estado.as_str())
    .bind(factura.fecha_vencimiento)
    .bind(factura.es_prorrateo)
    .bind(factura.version)
    .fetch_one(&mut **tx)
    .await
    .map_err(AppError::from)?;
    let guardada = row_to_factura(&row)?;
    registrar_revision(
        tx,
        TipoEntidad::Factura,
        guardada.id,
        OperacionAuditoria::Creacion,
        &guardada.snapshot(),
    )
    .await?;
    Ok(guardada)
}

async fn actualizar_tx(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    factura: &Factura,
    version_esperada: i64,
    operacion: OperacionAuditoria,
) -> AppResult<Factura> {
    let row = sqlx::query(&format!(
        r#"
        UPDATE facturas SET estado = $3, version = version + 1
        WHERE id = $1 AND version = $2
        RETURNING {SELECT_COLS}
        "#
    ))
    .bind(factura.id)
    .bind(version_esperada)
    .bind(factura.estado.as_str())
    .fetch_optional(&mut **tx)
    .await
    .map_err(AppError::from)?;
    let guardada = match row {
        Some(row) => row_to_factura(&row)?,
        None => return Err(AppError::Conflict),
    };
    registrar_revision(
        tx,
        TipoEntidad::Factura,
        guardada.id,
        operacion,
        &guardada.snapshot(),
    )
    .await?;
    Ok(guardada)
}

#[async_trait]
impl FacturaRepo for PostgresPersistence {
    async fn siguiente_numero(&self) -> AppResult<i64> {
        let numero: i64 = sqlx::query_scalar("SELECT nextval('numeracion_facturas')")
            .fetch_one(self.pool())
            .await
            .map_err(AppError::from)?;
        Ok(numero)
    }

    async fn emitir(
        &self,
        factura: &Factura,
        suscripcion: &Suscripcion,
        version_suscripcion: i64,
    ) -> AppResult<(Factura, Suscripcion)> {
        let mut tx = self.pool().begin().await.map_err(AppError::from)?;
        let guardada = insertar_tx(&mut tx, factura).await?;
        let suscripcion =
            suscripcion::actualizar_tx(&mut tx, suscripcion, version_suscripcion).await?;
        tx.commit().await.map_err(AppError::from)?;
        Ok((guardada, suscripcion))
    }

    async fn update(&self, factura: &Factura, version_esperada: i64) -> AppResult<Factura> {
        let mut tx = self.pool().begin().await.map_err(AppError::from)?;
        let guardada = actualizar_tx(
            &mut tx,
            factura,
            version_esperada,
            OperacionAuditoria::Modificacion,
        )
        .await?;
        tx.commit().await.map_err(AppError::from)?;
        Ok(guardada)
    }

    async fn update_con_suscripcion(
        &self,
        factura: &Factura,
        version_factura: i64,
        suscripcion: &Suscripcion,
        version_suscripcion: i64,
    ) -> AppResult<(Factura, Suscripcion)> {
        let mut tx = self.pool().begin().await.map_err(AppError::from)?;
        let guardada = actualizar_tx(
            &mut tx,
            factura,
            version_factura,
            OperacionAuditoria::Modificacion,
        )
        .await?;
        let suscripcion =
            suscripcion::actualizar_tx(&mut tx, suscripcion, version_suscripcion).await?;
        tx.commit().await.map_err(AppError::from)?;
        Ok((guardada, suscripcion))
    }

    async fn anular(&self, factura: &Factura, version_esperada: i64) -> AppResult<Factura> {
        let mut tx = self.pool().begin().await.map_err(AppError::from)?;
        let guardada = actualizar_tx(
            &mut tx,
            factura,
            version_esperada,
            OperacionAuditoria::Eliminacion,
        )
        .await?;
        tx.commit().await.map_err(AppError::from)?;
        Ok(guardada)
    }

    async fn get_by_id(&self, id: Uuid) -> AppResult<Option<Factura>> {
        let row = sqlx::query(&format!("SELECT {SELECT_COLS} FROM facturas WHERE id = $1"))
            .bind(id)
            .fetch_optional(self.pool())
            .await
            .map_err(AppError::from)?;
        row.as_ref().map(row_to_factura).transpose()
    }

    async fn list_all(&self) -> AppResult<Vec<Factura>> {
        let rows = sqlx::query(&format!(
            "SELECT {SELECT_COLS} FROM facturas ORDER BY fecha_emision DESC, numero DESC"
        ))
        .fetch_all(self.pool())
        .await
        .map_err(AppError::from)?;
        rows.iter().map(row_to_factura).collect()
    }

    async fn list_by_suscripcion(&self, suscripcion_id: Uuid) -> AppResult<Vec<Factura>> {
        let rows = sqlx::query(&format!(
            "SELECT {SELECT_COLS} FROM facturas WHERE suscripcion_id = $1 ORDER BY fecha_emision DESC, numero DESC"
        ))
        .bind(suscripcion_id)
        .fetch_all(self.pool())
        .await
        .map_err(AppError::from)?;
        rows.iter().map(row_to_factura).collect()
    }

    async fn list_by_usuario(&self, usuario_id: Uuid) -> AppResult<Vec<Factura>> {
        let rows = sqlx::query(&format!(
            "SELECT {SELECT_COLS} FROM facturas WHERE usuario_id = $1 ORDER BY fecha_emision DESC, numero DESC"
        ))
        .bind(usuario_id)
        .fetch_all(self.pool())
        .await
        .map_err(AppError::from)?;
        rows.iter().map(row_to_factura).collect()
    }

    async fn list_pendientes_vencidas(&self, fecha: NaiveDate) -> AppResult<Vec<Factura>> {
        let rows = sqlx::query(&format!(
            "SELECT {SELECT_COLS} FROM facturas WHERE estado = 'PENDIENTE' AND fecha_vencimiento < $1"
        ))
        .bind(fecha)
        .fetch_all(self.pool())
        .await
        .map_err(AppError::from)?;
        rows.iter().map(row_to_factura).collect()
    }

    async fn list_vencidas(&self) -> AppResult<Vec<Factura>> {
        let rows = sqlx::query(&format!(
            "SELECT {SELECT_COLS} FROM facturas WHERE estado = 'VENCIDA'"
        ))
        .fetch_all(self.pool())
        .await
        .map_err(AppError::from)?;
        rows.iter().map(row_to_factura).collect()
    }

    async fn filtrar(&self, filtros: &FiltrosFactura) -> AppResult<Vec<Factura>> {
        let rows = sqlx::query(&format!(
            r#"
            SELECT {SELECT_COLS} FROM facturas
            WHERE {FILTROS_WHERE}
            ORDER BY fecha_emision DESC, numero DESC
            "#
        ))
        .bind(filtros.usuario_id)
        .bind(filtros.suscripcion_id)
        .bind(filtros.estado.map(|e| e.as_str()))
        .bind(filtros.desde)
        .bind(filtros.hasta)
        .bind(filtros.monto_minimo)
        .bind(filtros.monto_maximo)
        .bind(filtros.solo_prorrateo)
        .fetch_all(self.pool())
        .await
        .map_err(AppError::from)?;
        rows.iter().map(row_to_factura).collect()
    }

    async fn buscar(
        &self,
        filtros: &FiltrosFactura,
        offset: i64,
        limite: i64,
    ) -> AppResult<(Vec<Factura>, i64)> {
        let total: i64 =
            sqlx::query_scalar(&format!("SELECT COUNT(*) FROM facturas WHERE {FILTROS_WHERE}"))
                .bind(filtros.usuario_id)
                .bind(filtros.suscripcion_id)
                .bind(filtros.estado.map(|e| e.as_str()))
                .bind(filtros.desde)
                .bind(filtros.hasta)
                .bind(filtros.monto_minimo)
                .bind(filtros.monto_maximo)
                .bind(filtros.solo_prorrateo)
                .fetch_one(self.pool())
                .await
                .map_err(AppError::from)?;
        let rows = sqlx::query(&format!(
            r#"
            SELECT {SELECT_COLS} FROM facturas
            WHERE {FILTROS_WHERE}
            ORDER BY fecha_emision DESC, numero DESC
            LIMIT $9 OFFSET $10
            "#
        ))
        .bind(filtros.usuario_id)
        .bind(filtros.suscripcion_id)
        .bind(filtros.estado.map(|e| e.as_str()))
        .bind(filtros.desde)
        .bind(filtros.hasta)
        .bind(filtros.monto_minimo)
        .bind(filtros.monto_maximo)
        .bind(filtros.solo_prorrateo)
        .bind(limite)
        .bind(offset)
        .fetch_all(self.pool())
        .await
        .map_err(AppError::from)?;
        let facturas: AppResult<Vec<Factura>> = rows.iter().map(row_to_factura).collect();
        Ok((facturas?, total))
    }

    async fn resumen_por_estado(&self) -> AppResult<Vec<ResumenEstado>> {
        let rows = sqlx::query(
            r#"
            SELECT estado, COUNT(*) AS cantidad, COALESCE(SUM(total), 0) AS monto_total
            FROM facturas GROUP BY estado
            "#,
        )
        .fetch_all(self.pool())
        .await
        .map_err(AppError::from)?;
        rows.iter()
            .map(|row| {
                let estado: String = row.get("estado");
                let estado = EstadoFactura::parse(&estado)
                    .ok_or_else(|| AppError::Internal(format!("estado desconocido: {estado}")))?;
                Ok(ResumenEstado {
                    estado,
                    cantidad: row.get("cantidad"),
                    monto_total: row.get("monto_total"),
                })
            })
            .collect()
    }
}
