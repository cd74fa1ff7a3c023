use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use secrecy::SecretString;
use sha2::{Digest, Sha256};
use tracing::instrument;
use uuid::Uuid;

use crate::{
    app_error::{AppError, AppResult},
    application::jwt,
    domain::entities::usuario::{RolUsuario, Usuario},
};

use super::suscripciones::SuscripcionRepo;

/// Store contract for the user aggregate. Every mutating method persists the
/// entity together with its audit revision in one atomic unit; `update` and
/// `soft_delete` are compare-and-swap on the entity version and fail with
/// `Conflict` on a stale read.
#[async_trait]
pub trait UsuarioRepo: Send + Sync {
    async fn insert(&self, usuario: &Usuario) -> AppResult<Usuario>;
    async fn update(&self, usuario: &Usuario, version_esperada: i64) -> AppResult<Usuario>;
    /// Marks inactive, recorded as ELIMINACION (the soft-delete path).
    async fn soft_delete(&self, usuario: &Usuario, version_esperada: i64) -> AppResult<Usuario>;
    /// Physical removal, recorded as ELIMINACION with the pre-deletion snapshot.
    async fn delete(&self, id: Uuid) -> AppResult<()>;
    async fn get_by_id(&self, id: Uuid) -> AppResult<Option<Usuario>>;
    /// Lookup is case-insensitive on email.
    async fn get_by_email(&self, email: &str) -> AppResult<Option<Usuario>>;
    async fn list_all(&self) -> AppResult<Vec<Usuario>>;
}

#[derive(Debug, Clone)]
pub struct CreateUsuarioInput {
    pub nombre: String,
    pub apellido: String,
    pub email: String,
    pub password: String,
    pub rol: Option<RolUsuario>,
    pub pais: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct UpdateUsuarioInput {
    pub nombre: Option<String>,
    pub apellido: Option<String>,
    pub email: Option<String>,
    pub pais: Option<String>,
    pub rol: Option<RolUsuario>,
    pub activo: Option<bool>,
}

#[derive(Clone)]
pub struct UsuarioUseCases {
    usuarios: Arc<dyn UsuarioRepo>,
    suscripciones: Arc<dyn SuscripcionRepo>,
    jwt_secret: SecretString,
    access_token_ttl: time::Duration,
    max_reintentos: u32,
}

impl UsuarioUseCases {
    pub fn new(
        usuarios: Arc<dyn UsuarioRepo>,
        suscripciones: Arc<dyn SuscripcionRepo>,
        jwt_secret: SecretString,
        access_token_ttl: time::Duration,
        max_reintentos: u32,
    ) -> Self {
        Self {
            usuarios,
            suscripciones,
            jwt_secret,
            access_token_ttl,
            max_reintentos,
        }
    }

    #[instrument(skip(self, input), fields(email = %input.email))]
    pub async fn create(&self, input: CreateUsuarioInput) -> AppResult<Usuario> {
        let email = input.email.trim().to_lowercase();
        if self.usuarios.get_by_email(&email).await?.is_some() {
            return Err(AppError::Validation(format!(
                "ya existe un usuario con el email {email}"
            )));
        }

        let usuario = Usuario {
            id: Uuid::new_v4(),
            nombre: input.nombre,
            apellido: input.apellido,
            email,
            password_hash: hash_password(&input.password),
            rol: input.rol.unwrap_or(RolUsuario::User),
            pais: input.pais,
            activo: true,
            fecha_registro: Utc::now(),
            version: 1,
        };
        self.usuarios.insert(&usuario).await
    }

    /// Verifies credentials and issues the session token the client stores.
    #[instrument(skip(self, password))]
    pub async fn login(&self, email: &str, password: &str) -> AppResult<(String, Usuario)> {
        let email = email.trim().to_lowercase();
        let usuario = self
            .usuarios
            .get_by_email(&email)
            .await?
            .ok_or(AppError::InvalidCredentials)?;
        if !usuario.activo || !verificar_password(password, &usuario.password_hash) {
            return Err(AppError::InvalidCredentials);
        }
        let token = jwt::issue(
            usuario.id,
            usuario.rol.as_str(),
            &self.jwt_secret,
            self.access_token_ttl,
        )?;
        Ok((token, usuario))
    }

    pub async fn get(&self, id: Uuid) -> AppResult<Usuario> {
        self.usuarios.get_by_id(id).await?.ok_or(AppError::NotFound)
    }

    pub async fn list(&self) -> AppResult<Vec<Usuario>> {
        self.usuarios.list_all().await
    }

    #[instrument(skip(self, input))]
    pub async fn update(&self, id: Uuid, input: UpdateUsuarioInput) -> AppResult<Usuario> {
        let mut intento = 0;
        loop {
            match self.intentar_update(id, &input).await {
                Err(AppError::Conflict) if intento < self.max_reintentos => intento += 1,
                resultado => return resultado,
            }
        }
    }

    async fn intentar_update(&self, id: Uuid, input: &UpdateUsuarioInput) -> AppResult<Usuario> {
        let mut usuario = self.get(id).await?;
        let version = usuario.version;

        if let Some(email) = &input.email {
            let email = email.trim().to_lowercase();
            if let Some(existente) = self.usuarios.get_by_email(&email).await?
                && existente.id != id
            {
                return Err(AppError::Validation(format!(
                    "ya existe un usuario con el email {email}"
                )));
            }
            usuario.email = email;
        }
        if let Some(nombre) = &input.nombre {
            usuario.nombre = nombre.clone();
        }
        if let Some(apellido) = &input.apellido {
            usuario.apellido = apellido.clone();
        }
        if let Some(pais) = &input.pais {
            usuario.pais = Some(pais.clone());
        }
        if let Some(rol) = input.rol {
            usuario.rol = rol;
        }
        if let Some(activo) = input.activo {
            usuario.activo = activo;
        }

        self.usuarios.update(&usuario, version).await
    }

    /// Physical delete only when nothing ever referenced the user; soft delete
    /// when historical subscriptions exist; refused while a live subscription
    /// still points at them.
    #[instrument(skip(self))]
    pub async fn delete(&self, id: Uuid) -> AppResult<()> {
        let usuario = self.get(id).await?;

        if self
            .suscripciones
            .find_no_terminal_by_usuario(id)
            .await?
            .is_some()
        {
            return Err(AppError::DependencyInUse(
                "el usuario tiene una suscripción activa".into(),
            ));
        }

        if self.suscripciones.exists_by_usuario(id).await? {
            let version = usuario.version;
            let mut inactivo = usuario;
            inactivo.activo = false;
            self.usuarios.soft_delete(&inactivo, version).await?;
            return Ok(());
        }

        self.usuarios.delete(id).await
    }
}

const SALT_LEN: usize = 16;

/// `hex(salt) $ hex(sha256(salt ‖ password))`.
pub fn hash_password(password: &str) -> String {
    use rand::RngCore;
    let mut salt = [0u8; SALT_LEN];
    rand::rngs::OsRng.fill_bytes(&mut salt);
    let digest = hash_con_salt(&salt, password);
    format!("{}${}", hex::encode(salt), digest)
}

pub fn verificar_password(password: &str, almacenado: &str) -> bool {
    let Some((salt_hex, esperado)) = almacenado.split_once('$') else {
        return false;
    };
    let Ok(salt) = hex::decode(salt_hex) else {
        return false;
    };
    hash_con_salt(&salt, password) == esperado
}

fn hash_con_salt(salt: &[u8], password: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(salt);
    hasher.update(password.as_bytes());
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_y_verificacion() {
        let hash = hash_password("secreta123");
        assert!(verificar_password("secreta123", &hash));
        assert!(!verificar_password("otra", &hash));
    }

    #[test]
    fn hashes_distintos_por_salt() {
        assert_ne!(hash_password("secreta123"), hash_password("secreta123"));
    }

    #[test]
    fn verificacion_rechaza_formato_corrupto() {
        assert!(!verificar_password("x", "sin-separador"));
        assert!(!verificar_password("x", "zz$deadbeef"));
    }
}
