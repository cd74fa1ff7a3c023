use axum::{
    Json, Router,
    extract::{Path, Query, State},
    response::IntoResponse,
    routing::get,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    adapters::http::app_state::AppState,
    app_error::{AppError, AppResult},
    domain::entities::auditoria::{OperacionAuditoria, RevisionAuditoria, TipoEntidad},
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/recientes", get(recientes))
        .route("/estadisticas", get(estadisticas))
        .route("/usuarios", get(|s, q| por_tipo(s, q, TipoEntidad::Usuario)))
        .route("/planes", get(|s, q| por_tipo(s, q, TipoEntidad::Plan)))
        .route(
            "/suscripciones",
            get(|s, q| por_tipo(s, q, TipoEntidad::Suscripcion)),
        )
        .route("/facturas", get(|s, q| por_tipo(s, q, TipoEntidad::Factura)))
        .route("/comparar", get(comparar))
        .route("/entidad/{tipo}/{entidad_id}", get(historial))
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RevisionDto {
    revision: i64,
    tipo: TipoEntidad,
    entidad_id: Uuid,
    operacion: OperacionAuditoria,
    fecha: chrono::DateTime<chrono::Utc>,
    snapshot: serde_json::Value,
}

fn revision_a_dto(revision: RevisionAuditoria) -> RevisionDto {
    RevisionDto {
        revision: revision.revision,
        tipo: revision.tipo,
        entidad_id: revision.entidad_id,
        operacion: revision.operacion,
        fecha: revision.fecha,
        snapshot: revision.snapshot,
    }
}

fn a_dtos(revisiones: Vec<RevisionAuditoria>) -> Vec<RevisionDto> {
    revisiones.into_iter().map(revision_a_dto).collect()
}

fn parse_tipo(tipo: &str) -> AppResult<TipoEntidad> {
    TipoEntidad::parse(tipo)
        .ok_or_else(|| AppError::Validation(format!("tipo de entidad desconocido: {tipo}")))
}

#[derive(Deserialize)]
struct LimiteParams {
    limite: Option<i64>,
}

async fn recientes(
    State(app_state): State<AppState>,
    Query(params): Query<LimiteParams>,
) -> AppResult<impl IntoResponse> {
    let revisiones = app_state.auditoria.recientes(params.limite).await?;
    Ok(Json(a_dtos(revisiones)))
}

async fn por_tipo(
    State(app_state): State<AppState>,
    Query(params): Query<LimiteParams>,
    tipo: TipoEntidad,
) -> AppResult<impl IntoResponse> {
    let revisiones = app_state.auditoria.por_tipo(tipo, params.limite).await?;
    Ok(Json(a_dtos(revisiones)))
}

async fn historial(
    State(app_state): State<AppState>,
    Path((tipo, entidad_id)): Path<(String, Uuid)>,
) -> AppResult<impl IntoResponse> {
    let tipo = parse_tipo(&tipo)?;
    let revisiones = app_state.auditoria.historial(tipo, entidad_id).await?;
    Ok(Json(a_dtos(revisiones)))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CompararParams {
    tipo: String,
    entidad_id: Uuid,
    revision_anterior: i64,
    revision_actual: i64,
}

async fn comparar(
    State(app_state): State<AppState>,
    Query(params): Query<CompararParams>,
) -> AppResult<impl IntoResponse> {
    let tipo = parse_tipo(&params.tipo)?;
    let comparacion = app_state
        .auditoria
        .comparar(
            tipo,
            params.entidad_id,
            params.revision_anterior,
            params.revision_actual,
        )
        .await?;
    Ok(Json(comparacion))
}

async fn estadisticas(State(app_state): State<AppState>) -> AppResult<impl IntoResponse> {
    Ok(Json(app_state.auditoria.estadisticas().await?))
}
