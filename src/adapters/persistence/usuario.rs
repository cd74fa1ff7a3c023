use async_trait::async_trait;
use sqlx::Row;
use uuid::Uuid;

use crate::{
    adapters::persistence::{PostgresPersistence, registrar_revision},
    app_error::{AppError, AppResult},
    application::use_cases::usuarios::UsuarioRepo,
    domain::entities::auditoria::{OperacionAuditoria, TipoEntidad},
    domain::entities::usuario::{RolUsuario, Usuario},
};

const SELECT_COLS: &str = r#"
    id, nombre, apellido, email, password_hash, rol, pais, activo,
    fecha_registro, version
"#;

fn row_to_usuario(row: &sqlx::postgres::PgRow) -> Usuario {
    let rol: String = row.get("rol");
    Usuario {
        id: row.get("id"),
        nombre: row.get("nombre"),
        apellido: row.get("apellido"),
        email: row.get("email"),
        password_hash: row.get("password_hash"),
        rol: RolUsuario::parse(&rol),
        pais: row.get("pais"),
        activo: row.get("activo"),
        fecha_registro: row.get("fecha_registro"),
        version: row.get("version"),
    }
}

/// Compare-and-swap update inside the caller's transaction. A missing row
/// means the version moved underneath us.
async fn actualizar_tx(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    usuario: &Usuario,
    version_esperada: i64,
) -> AppResult<Usuario> {
    let row = sqlx::query(&format!(
        r#"
        UPDATE usuarios SET
            nombre = $3, apellido = $4, email = $5, password_hash = $6,
            rol = $7, pais = $8, activo = $9, version = version + 1
        WHERE id = $1 AND version = $2
        RETURNING {SELECT_COLS}
        "#
    ))
    .bind(usuario.id)
    .bind(version_esperada)
    .bind(&usuario.nombre)
    .bind(&usuario.apellido)
    .bind(&usuario.email)
    .bind(&usuario.password_hash)
    .bind(usuario.rol.as_str())
    .bind(&usuario.pais)
    .bind(usuario.activo)
    .fetch_optional(&mut **tx)
    .await
    .map_err(AppError::from)?;
    row.as_ref().map(row_to_usuario).ok_or(AppError::Conflict)
}

#[async_trait]
impl UsuarioRepo for PostgresPersistence {
    async fn insert(&self, usuario: &Usuario) -> AppResult<Usuario> {
        let mut tx = self.pool().begin().await.map_err(AppError::from)?;
        let row = sqlx::query(&format!(
            r#"
            INSERT INTO usuarios
                (id, nombre, apellido, email, password_hash, rol, pais, activo,
                 fecha_registro, version)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING {SELECT_COLS}
            "#
        ))
        .bind(usuario.id)
        .bind(&usuario.nombre)
        .bind(&usuario.apellido)
        .bind(&usuario.email)
        .bind(&usuario.password_hash)
        .bind(usuario.rol.as_str())
        .bind(&usuario.pais)
        .bind(usuario.activo)
        .bind(usuario.fecha_registro)
        .bind(usuario.version)
        .fetch_one(&mut *tx)
        .await
        .map_err(AppError::from)?;
        let guardado = row_to_usuario(&row);
        registrar_revision(
            &mut tx,
            TipoEntidad::Usuario,
            guardado.id,
            OperacionAuditoria::Creacion,
            &guardado.snapshot(),
        )
        .await?;
        tx.commit().await.map_err(AppError::from)?;
        Ok(guardado)
    }

    async fn update(&self, usuario: &Usuario, version_esperada: i64) -> AppResult<Usuario> {
        let mut tx = self.pool().begin().await.map_err(AppError::from)?;
        let guardado = actualizar_tx(&mut tx, usuario, version_esperada).await?;
        registrar_revision(
            &mut tx,
            TipoEntidad::Usuario,
            guardado.id,
            OperacionAuditoria::Modificacion,
            &guardado.snapshot(),
        )
        .await?;
        tx.commit().await.map_err(AppError::from)?;
        Ok(guardado)
    }

    async fn soft_delete(&self, usuario: &Usuario, version_esperada: i64) -> AppResult<Usuario> {
        let mut tx = self.pool().begin().await.map_err(AppError::from)?;
        let guardado = actualizar_tx(&mut tx, usuario, version_esperada).await?;
        registrar_revision(
            &mut tx,
            TipoEntidad::Usuario,
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
        let row = sqlx::query(&format!("SELECT {SELECT_COLS} FROM usuarios WHERE id = $1"))
            .bind(id)
            .fetch_optional(&mut *tx)
            .await
            .map_err(AppError::from)?;
        let Some(row) = row else {
            return Err(AppError::NotFound);
        };
        let usuario = row_to_usuario(&row);
        sqlx::query("DELETE FROM usuarios WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(AppError::from)?;
        registrar_revision(
            &mut tx,
            TipoEntidad::Usuario,
            id,
            OperacionAuditoria::Eliminacion,
            &usuario.snapshot(),
        )
        .await?;
        tx.commit().await.map_err(AppError::from)?;
        Ok(())
    }

    async fn get_by_id(&self, id: Uuid) -> AppResult<Option<Usuario>> {
        let row = sqlx::query(&format!("SELECT {SELECT_COLS} FROM usuarios WHERE id = $1"))
            .bind(id)
            .fetch_optional(self.pool())
            .await
            .map_err(AppError::from)?;
        Ok(row.as_ref().map(row_to_usuario))
    }

    async fn get_by_email(&self, email: &str) -> AppResult<Option<Usuario>> {
        let row = sqlx::query(&format!(
            "SELECT {SELECT_COLS} FROM usuarios WHERE LOWER(email) = LOWER($1)"
        ))
        .bind(email)
        .fetch_optional(self.pool())
        .await
        .map_err(AppError::from)?;
        Ok(row.as_ref().map(row_to_usuario))
    }

    async fn list_all(&self) -> AppResult<Vec<Usuario>> {
        let rows = sqlx::query(&format!(
            "SELECT {SELECT_COLS} FROM usuarios ORDER BY fecha_registro DESC"
        ))
        .fetch_all(self.pool())
        .await
        .map_err(AppError::from)?;
        Ok(rows.iter().map(row_to_usuario).collect())
    }
}
