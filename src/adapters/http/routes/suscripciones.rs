use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, patch, post},
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    adapters::http::app_state::AppState,
    app_error::AppResult,
    domain::entities::suscripcion::{EstadoSuscripcion, Suscripcion},
    domain::money,
};

use super::facturas::{FacturaDto, factura_a_dto};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(crear).get(listar))
        .route("/usuario/{usuario_id}", get(listar_por_usuario))
        .route("/{id}", get(obtener))
        .route("/{id}/cambiar-plan", post(cambiar_plan))
        .route("/{id}/estado", patch(cambiar_estado))
        .route("/ciclo-vida/estadisticas", get(estadisticas))
        .route("/ciclo-vida/{id}/cancelar", post(cancelar))
        .route("/ciclo-vida/{id}/reactivar", post(reactivar))
        .route(
            "/ciclo-vida/{id}/toggle-renovacion",
            post(toggle_renovacion),
        )
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct SuscripcionDto {
    id: Uuid,
    usuario_id: Uuid,
    plan_id: Uuid,
    estado: EstadoSuscripcion,
    tiene_acceso: bool,
    fecha_inicio: chrono::NaiveDate,
    fecha_proximo_cobro: chrono::NaiveDate,
    renovacion_automatica: bool,
    precio_actual: f64,
    credito_prorrateo: f64,
    motivo_cancelacion: Option<String>,
    fecha_cancelacion: Option<chrono::DateTime<chrono::Utc>>,
    fecha_creacion: chrono::DateTime<chrono::Utc>,
}

pub(crate) fn suscripcion_a_dto(suscripcion: Suscripcion) -> SuscripcionDto {
    SuscripcionDto {
        id: suscripcion.id,
        usuario_id: suscripcion.usuario_id,
        plan_id: suscripcion.plan_id,
        estado: suscripcion.estado,
        tiene_acceso: suscripcion.estado.tiene_acceso(),
        fecha_inicio: suscripcion.fecha_inicio,
        fecha_proximo_cobro: suscripcion.fecha_proximo_cobro,
        renovacion_automatica: suscripcion.renovacion_automatica,
        precio_actual: money::a_decimal(suscripcion.precio_actual),
        credito_prorrateo: money::a_decimal(suscripcion.credito_prorrateo),
        motivo_cancelacion: suscripcion.motivo_cancelacion,
        fecha_cancelacion: suscripcion.fecha_cancelacion,
        fecha_creacion: suscripcion.fecha_creacion,
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CrearRequest {
    usuario_id: Uuid,
    plan_id: Uuid,
}

async fn crear(
    State(app_state): State<AppState>,
    Json(payload): Json<CrearRequest>,
) -> AppResult<impl IntoResponse> {
    let suscripcion = app_state
        .suscripciones
        .create(payload.usuario_id, payload.plan_id)
        .await?;
    Ok((StatusCode::CREATED, Json(suscripcion_a_dto(suscripcion))))
}

async fn listar(State(app_state): State<AppState>) -> AppResult<impl IntoResponse> {
    let suscripciones = app_state.suscripciones.list().await?;
    Ok(Json(
        suscripciones
            .into_iter()
            .map(suscripcion_a_dto)
            .collect::<Vec<_>>(),
    ))
}

async fn listar_por_usuario(
    State(app_state): State<AppState>,
    Path(usuario_id): Path<Uuid>,
) -> AppResult<impl IntoResponse> {
    let suscripciones = app_state.suscripciones.list_by_usuario(usuario_id).await?;
    Ok(Json(
        suscripciones
            .into_iter()
            .map(suscripcion_a_dto)
            .collect::<Vec<_>>(),
    ))
}

async fn obtener(
    State(app_state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<impl IntoResponse> {
    let suscripcion = app_state.suscripciones.get(id).await?;
    Ok(Json(suscripcion_a_dto(suscripcion)))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CambiarPlanRequest {
    plan_id: Uuid,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CambioPlanResponse {
    suscripcion: SuscripcionDto,
    cargo_prorrateo: f64,
    factura_prorrateo: Option<FacturaDto>,
}

async fn cambiar_plan(
    State(app_state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<CambiarPlanRequest>,
) -> AppResult<impl IntoResponse> {
    let cambio = app_state
        .suscripciones
        .cambiar_plan(id, payload.plan_id)
        .await?;
    Ok(Json(CambioPlanResponse {
        suscripcion: suscripcion_a_dto(cambio.suscripcion),
        cargo_prorrateo: money::a_decimal(cambio.cargo_prorrateo),
        factura_prorrateo: cambio.factura_prorrateo.map(factura_a_dto),
    }))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CambiarEstadoRequest {
    estado: EstadoSuscripcion,
    motivo: Option<String>,
}

async fn cambiar_estado(
    State(app_state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<CambiarEstadoRequest>,
) -> AppResult<impl IntoResponse> {
    let suscripcion = app_state
        .suscripciones
        .cambiar_estado(id, payload.estado, payload.motivo)
        .await?;
    Ok(Json(suscripcion_a_dto(suscripcion)))
}

#[derive(Deserialize)]
struct CancelarParams {
    motivo: Option<String>,
}

async fn cancelar(
    State(app_state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(params): Query<CancelarParams>,
) -> AppResult<impl IntoResponse> {
    let suscripcion = app_state.suscripciones.cancelar(id, params.motivo).await?;
    Ok(Json(suscripcion_a_dto(suscripcion)))
}

async fn reactivar(
    State(app_state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<impl IntoResponse> {
    let suscripcion = app_state.suscripciones.reactivar(id).await?;
    Ok(Json(suscripcion_a_dto(suscripcion)))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RenovacionParams {
    renovacion_automatica: bool,
}

async fn toggle_renovacion(
    State(app_state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(params): Query<RenovacionParams>,
) -> AppResult<impl IntoResponse> {
    let suscripcion = app_state
        .suscripciones
        .toggle_renovacion(id, params.renovacion_automatica)
        .await?;
    Ok(Json(suscripcion_a_dto(suscripcion)))
}

async fn estadisticas(State(app_state): State<AppState>) -> AppResult<impl IntoResponse> {
    Ok(Json(app_state.suscripciones.estadisticas().await?))
}
