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
    application::use_cases::planes::{CreatePlanInput, UpdatePlanInput},
    domain::entities::plan::{NivelPlan, Plan},
    domain::money,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(crear).get(listar))
        .route("/activos", get(listar_activos))
        .route("/{id}", get(obtener).put(actualizar).delete(eliminar))
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct PlanDto {
    id: Uuid,
    nombre: String,
    nivel: NivelPlan,
    precio_mensual: f64,
    descripcion: Option<String>,
    max_usuarios: Option<i32>,
    almacenamiento_gb: Option<i32>,
    soporte_prioritario: bool,
    dias_prueba: i32,
    activo: bool,
    fecha_creacion: chrono::DateTime<chrono::Utc>,
}

pub(crate) fn plan_a_dto(plan: Plan) -> PlanDto {
    PlanDto {
        id: plan.id,
        nombre: plan.nombre,
        nivel: plan.nivel,
        precio_mensual: money::a_decimal(plan.precio_mensual),
        descripcion: plan.descripcion,
        max_usuarios: plan.max_usuarios,
        almacenamiento_gb: plan.almacenamiento_gb,
        soporte_prioritario: plan.soporte_prioritario,
        dias_prueba: plan.dias_prueba,
        activo: plan.activo,
        fecha_creacion: plan.fecha_creacion,
    }
}

#[derive(Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
struct CreateRequest {
    #[validate(length(min = 1, max = 100))]
    nombre: String,
    nivel: NivelPlan,
    #[validate(range(min = 0.0))]
    precio_mensual: f64,
    descripcion: Option<String>,
    max_usuarios: Option<i32>,
    almacenamiento_gb: Option<i32>,
    #[serde(default)]
    soporte_prioritario: bool,
    #[serde(default)]
    #[validate(range(min = 0))]
    dias_prueba: i32,
}

async fn crear(
    State(app_state): State<AppState>,
    Json(payload): Json<CreateRequest>,
) -> AppResult<impl IntoResponse> {
    validar(&payload)?;
    let plan = app_state
        .planes
        .create(CreatePlanInput {
            nombre: payload.nombre,
            nivel: payload.nivel,
            precio_mensual: money::de_decimal(payload.precio_mensual),
            descripcion: payload.descripcion,
            max_usuarios: payload.max_usuarios,
            almacenamiento_gb: payload.almacenamiento_gb,
            soporte_prioritario: payload.soporte_prioritario,
            dias_prueba: payload.dias_prueba,
        })
        .await?;
    Ok((StatusCode::CREATED, Json(plan_a_dto(plan))))
}

async fn listar(State(app_state): State<AppState>) -> AppResult<impl IntoResponse> {
    let planes = app_state.planes.list().await?;
    Ok(Json(planes.into_iter().map(plan_a_dto).collect::<Vec<_>>()))
}

async fn listar_activos(State(app_state): State<AppState>) -> AppResult<impl IntoResponse> {
    let planes = app_state.planes.list_activos().await?;
    Ok(Json(planes.into_iter().map(plan_a_dto).collect::<Vec<_>>()))
}

async fn obtener(
    State(app_state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<impl IntoResponse> {
    let plan = app_state.planes.get(id).await?;
    Ok(Json(plan_a_dto(plan)))
}

#[derive(Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
struct UpdateRequest {
    #[validate(length(min = 1, max = 100))]
    nombre: Option<String>,
    nivel: Option<NivelPlan>,
    #[validate(range(min = 0.0))]
    precio_mensual: Option<f64>,
    descripcion: Option<String>,
    max_usuarios: Option<i32>,
    almacenamiento_gb: Option<i32>,
    soporte_prioritario: Option<bool>,
    #[validate(range(min = 0))]
    dias_prueba: Option<i32>,
    activo: Option<bool>,
}

async fn actualizar(
    State(app_state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateRequest>,
) -> AppResult<impl IntoResponse> {
    validar(&payload)?;
    let plan = app_state
        .planes
        .update(
            id,
            UpdatePlanInput {
                nombre: payload.nombre,
                nivel: payload.nivel,
                precio_mensual: payload.precio_mensual.map(money::de_decimal),
                descripcion: payload.descripcion,
                max_usuarios: payload.max_usuarios,
                almacenamiento_gb: payload.almacenamiento_gb,
                soporte_prioritario: payload.soporte_prioritario,
                dias_prueba: payload.dias_prueba,
                activo: payload.activo,
            },
        )
        .await?;
    Ok(Json(plan_a_dto(plan)))
}

async fn eliminar(
    State(app_state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<StatusCode> {
    app_state.planes.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;
    use axum_test::TestServer;
    use serde_json::json;

    use crate::{
        domain::entities::suscripcion::EstadoSuscripcion,
        test_utils::{
            TestAppStateBuilder, create_test_plan, create_test_suscripcion, create_test_usuario,
        },
    };

    use super::*;

    fn build_test_router(app_state: AppState) -> axum::Router {
        router().with_state(app_state)
    }

    #[tokio::test]
    async fn crear_plan_convierte_el_precio_a_centimos() {
        let (app_state, ledger) = TestAppStateBuilder::new().build_with_ledger();
        let server = TestServer::new(build_test_router(app_state)).unwrap();

        let response = server
            .post("/")
            .json(&json!({
                "nombre": "Premium",
                "nivel": "PREMIUM",
                "precioMensual": 19.99,
                "diasPrueba": 14
            }))
            .await;
        response.assert_status(StatusCode::CREATED);
        let cuerpo: serde_json::Value = response.json();
        assert_eq!(cuerpo["precioMensual"], 19.99);

        // one CREACION revision per command
        assert_eq!(ledger.revisiones().len(), 1);
    }

    #[tokio::test]
    async fn crear_plan_rechaza_precio_negativo() {
        let server = TestServer::new(build_test_router(TestAppStateBuilder::new().build())).unwrap();

        let response = server
            .post("/")
            .json(&json!({
                "nombre": "Raro",
                "nivel": "BASIC",
                "precioMensual": -1.0
            }))
            .await;
        response.assert_status(StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn listar_activos_excluye_desactivados() {
        let activo = create_test_plan(|p| p.nombre = "Vigente".into());
        let inactivo = create_test_plan(|p| {
            p.nombre = "Retirado".into();
            p.activo = false;
        });
        let app_state = TestAppStateBuilder::new()
            .with_plan(activo)
            .with_plan(inactivo)
            .build();
        let server = TestServer::new(build_test_router(app_state)).unwrap();

        let todos: Vec<serde_json::Value> = server.get("/").await.json();
        assert_eq!(todos.len(), 2);

        let activos: Vec<serde_json::Value> = server.get("/activos").await.json();
        assert_eq!(activos.len(), 1);
        assert_eq!(activos[0]["nombre"], "Vigente");
    }

    #[tokio::test]
    async fn eliminar_con_suscripcion_viva_devuelve_conflicto() {
        let usuario = create_test_usuario(|_| {});
        let plan = create_test_plan(|_| {});
        let suscripcion = create_test_suscripcion(usuario.id, plan.id, |_| {});
        let app_state = TestAppStateBuilder::new()
            .with_usuario(usuario)
            .with_plan(plan.clone())
            .with_suscripcion(suscripcion)
            .build();
        let server = TestServer::new(build_test_router(app_state)).unwrap();

        let response = server.delete(&format!("/{}", plan.id)).await;
        response.assert_status(StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn eliminar_con_referencia_historica_lo_desactiva() {
        let usuario = create_test_usuario(|_| {});
        let plan = create_test_plan(|_| {});
        let suscripcion = create_test_suscripcion(usuario.id, plan.id, |s| {
            s.estado = EstadoSuscripcion::Cancelada;
        });
        let app_state = TestAppStateBuilder::new()
            .with_usuario(usuario)
            .with_plan(plan.clone())
            .with_suscripcion(suscripcion)
            .build();
        let server = TestServer::new(build_test_router(app_state)).unwrap();

        let response = server.delete(&format!("/{}", plan.id)).await;
        response.assert_status(StatusCode::NO_CONTENT);

        // still readable, now inactive
        let cuerpo: serde_json::Value = server.get(&format!("/{}", plan.id)).await.json();
        assert_eq!(cuerpo["activo"], false);
    }
}
