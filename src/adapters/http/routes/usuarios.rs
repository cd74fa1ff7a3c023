use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::{
    adapters::http::app_state::AppState,
    app_error::AppResult,
    application::validators::validar,
    application::use_cases::usuarios::{CreateUsuarioInput, UpdateUsuarioInput},
    domain::entities::usuario::{RolUsuario, Usuario},
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(crear).get(listar))
        .route("/login", post(login))
        .route("/{id}", get(obtener).put(actualizar).delete(eliminar))
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct UsuarioDto {
    id: Uuid,
    nombre: String,
    apellido: String,
    email: String,
    rol: RolUsuario,
    pais: Option<String>,
    activo: bool,
    fecha_registro: chrono::DateTime<chrono::Utc>,
}

pub(crate) fn usuario_a_dto(usuario: Usuario) -> UsuarioDto {
    UsuarioDto {
        id: usuario.id,
        nombre: usuario.nombre,
        apellido: usuario.apellido,
        email: usuario.email,
        rol: usuario.rol,
        pais: usuario.pais,
        activo: usuario.activo,
        fecha_registro: usuario.fecha_registro,
    }
}

#[derive(Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
struct RegistroRequest {
    #[validate(length(min = 1, max = 100))]
    nombre: String,
    #[validate(length(min = 1, max = 100))]
    apellido: String,
    #[validate(email)]
    email: String,
    #[validate(length(min = 8, max = 128))]
    password: String,
    rol: Option<RolUsuario>,
    pais: Option<String>,
}

async fn crear(
    State(app_state): State<AppState>,
    Json(payload): Json<RegistroRequest>,
) -> AppResult<impl IntoResponse> {
    validar(&payload)?;
    let usuario = app_state
        .usuarios
        .create(CreateUsuarioInput {
            nombre: payload.nombre,
            apellido: payload.apellido,
            email: payload.email,
            password: payload.password,
            rol: payload.rol,
            pais: payload.pais,
        })
        .await?;
    Ok((StatusCode::CREATED, Json(usuario_a_dto(usuario))))
}

#[derive(Deserialize, Validate)]
struct LoginRequest {
    #[validate(email)]
    email: String,
    #[validate(length(min = 1))]
    password: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct LoginResponse {
    token: String,
    usuario: UsuarioDto,
}

async fn login(
    State(app_state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> AppResult<impl IntoResponse> {
    validar(&payload)?;
    let (token, usuario) = app_state
        .usuarios
        .login(&payload.email, &payload.password)
        .await?;
    Ok(Json(LoginResponse {
        token,
        usuario: usuario_a_dto(usuario),
    }))
}

async fn listar(State(app_state): State<AppState>) -> AppResult<impl IntoResponse> {
    let usuarios = app_state.usuarios.list().await?;
    Ok(Json(
        usuarios.into_iter().map(usuario_a_dto).collect::<Vec<_>>(),
    ))
}

async fn obtener(
    State(app_state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<impl IntoResponse> {
    let usuario = app_state.usuarios.get(id).await?;
    Ok(Json(usuario_a_dto(usuario)))
}

#[derive(Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
struct UpdateRequest {
    #[validate(length(min = 1, max = 100))]
    nombre: Option<String>,
    #[validate(length(min = 1, max = 100))]
    apellido: Option<String>,
    #[validate(email)]
    email: Option<String>,
    pais: Option<String>,
    rol: Option<RolUsuario>,
    activo: Option<bool>,
}

async fn actualizar(
    State(app_state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateRequest>,
) -> AppResult<impl IntoResponse> {
    validar(&payload)?;
    let usuario = app_state
        .usuarios
        .update(
            id,
            UpdateUsuarioInput {
                nombre: payload.nombre,
                apellido: payload.apellido,
                email: payload.email,
                pais: payload.pais,
                rol: payload.rol,
                activo: payload.activo,
            },
        )
        .await?;
    Ok(Json(usuario_a_dto(usuario)))
}

async fn eliminar(
    State(app_state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<StatusCode> {
    app_state.usuarios.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;
    use axum_test::TestServer;
    use serde_json::json;

    use crate::test_utils::{TestAppStateBuilder, create_test_suscripcion, create_test_usuario};

    use super::*;

    fn build_test_router(app_state: AppState) -> axum::Router {
        router().with_state(app_state)
    }

    #[tokio::test]
    async fn registro_y_login() {
        let server = TestServer::new(build_test_router(TestAppStateBuilder::new().build())).unwrap();

        let response = server
            .post("/")
            .json(&json!({
                "nombre": "Ana",
                "apellido": "García",
                "email": "Ana@Example.com",
                "password": "secreta123",
                "pais": "ES"
            }))
            .await;
        response.assert_status(StatusCode::CREATED);
        let creado: serde_json::Value = response.json();
        // email stored lower-cased, hash never leaks
        assert_eq!(creado["email"], "ana@example.com");
        assert!(creado.get("passwordHash").is_none());

        let login = server
            .post("/login")
            .json(&json!({"email": "ana@example.com", "password": "secreta123"}))
            .await;
        login.assert_status_ok();
        let cuerpo: serde_json::Value = login.json();
        assert!(!cuerpo["token"].as_str().unwrap().is_empty());
    }

    #[tokio::test]
    async fn registro_rechaza_email_duplicado() {
        let usuario = create_test_usuario(|u| u.email = "ana@example.com".into());
        let app_state = TestAppStateBuilder::new().with_usuario(usuario).build();
        let server = TestServer::new(build_test_router(app_state)).unwrap();

        let response = server
            .post("/")
            .json(&json!({
                "nombre": "Otra",
                "apellido": "Ana",
                "email": "ANA@example.com",
                "password": "secreta123"
            }))
            .await;
        response.assert_status(StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn login_rechaza_password_incorrecta() {
        let usuario = create_test_usuario(|u| u.email = "ana@example.com".into());
        let app_state = TestAppStateBuilder::new().with_usuario(usuario).build();
        let server = TestServer::new(build_test_router(app_state)).unwrap();

        let response = server
            .post("/login")
            .json(&json!({"email": "ana@example.com", "password": "equivocada"}))
            .await;
        response.assert_status(StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn login_rechaza_usuario_inactivo() {
        let usuario = create_test_usuario(|u| {
            u.email = "ana@example.com".into();
            u.activo = false;
        });
        let app_state = TestAppStateBuilder::new().with_usuario(usuario).build();
        let server = TestServer::new(build_test_router(app_state)).unwrap();

        let response = server
            .post("/login")
            .json(&json!({"email": "ana@example.com", "password": "secreta123"}))
            .await;
        response.assert_status(StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn eliminar_con_suscripcion_viva_devuelve_conflicto() {
        let usuario = create_test_usuario(|_| {});
        let suscripcion = create_test_suscripcion(usuario.id, Uuid::new_v4(), |_| {});
        let app_state = TestAppStateBuilder::new()
            .with_usuario(usuario.clone())
            .with_suscripcion(suscripcion)
            .build();
        let server = TestServer::new(build_test_router(app_state)).unwrap();

        let response = server.delete(&format!("/{}", usuario.id)).await;
        response.assert_status(StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn eliminar_sin_referencias_borra_fisicamente() {
        let usuario = create_test_usuario(|_| {});
        let app_state = TestAppStateBuilder::new().with_usuario(usuario.clone()).build();
        let server = TestServer::new(build_test_router(app_state)).unwrap();

        let response = server.delete(&format!("/{}", usuario.id)).await;
        response.assert_status(StatusCode::NO_CONTENT);

        let obtencion = server.get(&format!("/{}", usuario.id)).await;
        obtencion.assert_status(StatusCode::NOT_FOUND);
    }
}
