use axum::{
    Json, Router,
    extract::{Path, Query, State},
    response::IntoResponse,
    routing::{get, post},
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    adapters::http::app_state::AppState,
    app_error::AppResult,
    application::use_cases::facturacion::FiltrosFactura,
    domain::entities::factura::{EstadoFactura, Factura},
    domain::money,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(listar))
        .route("/pendientes", get(listar_pendientes))
        .route("/vencidas", get(listar_vencidas))
        .route("/filtrar/fecha", get(filtrar_por_fecha))
        .route("/filtrar/monto", get(filtrar_por_monto))
        .route("/buscar", get(buscar))
        .route("/estadisticas", get(estadisticas))
        .route("/resumen-estado", get(resumen_estado))
        .route("/ejecutar-facturacion", post(ejecutar_facturacion))
        .route("/suscripcion/{suscripcion_id}", get(listar_por_suscripcion))
        .route("/usuario/{usuario_id}", get(listar_por_usuario))
        .route("/{id}", get(obtener).delete(anular))
        .route("/{id}/pagar", post(pagar))
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct FacturaDto {
    id: Uuid,
    numero: String,
    suscripcion_id: Uuid,
    usuario_id: Uuid,
    concepto: String,
    fecha_emision: NaiveDate,
    subtotal: f64,
    tasa_impuesto: f64,
    monto_impuestos: f64,
    total: f64,
    estado: EstadoFactura,
    fecha_vencimiento: NaiveDate,
    es_prorrateo: bool,
}

pub(crate) fn factura_a_dto(factura: Factura) -> FacturaDto {
    FacturaDto {
        id: factura.id,
        numero: factura.numero,
        suscripcion_id: factura.suscripcion_id,
        usuario_id: factura.usuario_id,
        concepto: factura.concepto,
        fecha_emision: factura.fecha_emision,
        subtotal: money::a_decimal(factura.subtotal),
        tasa_impuesto: factura.tasa_impuesto,
        monto_impuestos: money::a_decimal(factura.monto_impuestos),
        total: money::a_decimal(factura.total),
        estado: factura.estado,
        fecha_vencimiento: factura.fecha_vencimiento,
        es_prorrateo: factura.es_prorrateo,
    }
}

fn a_dtos(facturas: Vec<Factura>) -> Vec<FacturaDto> {
    facturas.into_iter().map(factura_a_dto).collect()
}

async fn listar(State(app_state): State<AppState>) -> AppResult<impl IntoResponse> {
    Ok(Json(a_dtos(app_state.facturacion.list().await?)))
}

async fn listar_pendientes(State(app_state): State<AppState>) -> AppResult<impl IntoResponse> {
    Ok(Json(a_dtos(app_state.facturacion.list_pendientes().await?)))
}

async fn listar_vencidas(State(app_state): State<AppState>) -> AppResult<impl IntoResponse> {
    Ok(Json(a_dtos(app_state.facturacion.list_vencidas().await?)))
}

#[derive(Deserialize)]
struct FiltroFechaParams {
    inicio: NaiveDate,
    fin: NaiveDate,
    estado: Option<EstadoFactura>,
}

async fn filtrar_por_fecha(
    State(app_state): State<AppState>,
    Query(params): Query<FiltroFechaParams>,
) -> AppResult<impl IntoResponse> {
    let facturas = app_state
        .facturacion
        .filtrar(FiltrosFactura {
            desde: Some(params.inicio),
            hasta: Some(params.fin),
            estado: params.estado,
            ..Default::default()
        })
        .await?;
    Ok(Json(a_dtos(facturas)))
}

#[derive(Deserialize)]
struct FiltroMontoParams {
    minimo: f64,
    maximo: f64,
    estado: Option<EstadoFactura>,
}

async fn filtrar_por_monto(
    State(app_state): State<AppState>,
    Query(params): Query<FiltroMontoParams>,
) -> AppResult<impl IntoResponse> {
    let facturas = app_state
        .facturacion
        .filtrar(FiltrosFactura {
            monto_minimo: Some(money::de_decimal(params.minimo)),
            monto_maximo: Some(money::de_decimal(params.maximo)),
            estado: params.estado,
            ..Default::default()
        })
        .await?;
    Ok(Json(a_dtos(facturas)))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct BuscarParams {
    fecha_inicio: Option<NaiveDate>,
    fecha_fin: Option<NaiveDate>,
    monto_minimo: Option<f64>,
    monto_maximo: Option<f64>,
    estado: Option<EstadoFactura>,
    usuario_id: Option<Uuid>,
    es_prorrateo: Option<bool>,
    #[serde(default)]
    page: i64,
    #[serde(default = "size_default")]
    size: i64,
}

fn size_default() -> i64 {
    10
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PaginaFacturas {
    content: Vec<FacturaDto>,
    total_elements: i64,
    total_pages: i64,
}

async fn buscar(
    State(app_state): State<AppState>,
    Query(params): Query<BuscarParams>,
) -> AppResult<impl IntoResponse> {
    let size = params.size.clamp(1, 100);
    let (facturas, total) = app_state
        .facturacion
        .buscar(
            FiltrosFactura {
                usuario_id: params.usuario_id,
                estado: params.estado,
                desde: params.fecha_inicio,
                hasta: params.fecha_fin,
                monto_minimo: params.monto_minimo.map(money::de_decimal),
                monto_maximo: params.monto_maximo.map(money::de_decimal),
                solo_prorrateo: params.es_prorrateo,
                ..Default::default()
            },
            params.page,
            size,
        )
        .await?;
    Ok(Json(PaginaFacturas {
        content: a_dtos(facturas),
        total_elements: total,
        total_pages: (total as u64).div_ceil(size as u64) as i64,
    }))
}

async fn estadisticas(State(app_state): State<AppState>) -> AppResult<impl IntoResponse> {
    Ok(Json(app_state.facturacion.estadisticas().await?))
}

async fn resumen_estado(State(app_state): State<AppState>) -> AppResult<impl IntoResponse> {
    Ok(Json(app_state.facturacion.resumen_por_estado().await?))
}

async fn listar_por_suscripcion(
    State(app_state): State<AppState>,
    Path(suscripcion_id): Path<Uuid>,
) -> AppResult<impl IntoResponse> {
    let facturas = app_state
        .facturacion
        .list_by_suscripcion(suscripcion_id)
        .await?;
    Ok(Json(a_dtos(facturas)))
}

async fn listar_por_usuario(
    State(app_state): State<AppState>,
    Path(usuario_id): Path<Uuid>,
) -> AppResult<impl IntoResponse> {
    let facturas = app_state.facturacion.list_by_usuario(usuario_id).await?;
    Ok(Json(a_dtos(facturas)))
}

async fn obtener(
    State(app_state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<impl IntoResponse> {
    Ok(Json(factura_a_dto(app_state.facturacion.get(id).await?)))
}

async fn pagar(
    State(app_state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<impl IntoResponse> {
    Ok(Json(factura_a_dto(app_state.facturacion.pagar(id).await?)))
}

async fn anular(
    State(app_state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<impl IntoResponse> {
    Ok(Json(factura_a_dto(app_state.facturacion.anular(id).await?)))
}

#[derive(Deserialize)]
struct CicloParams {
    /// Run date override; omitted means today.
    fecha: Option<NaiveDate>,
}

async fn ejecutar_facturacion(
    State(app_state): State<AppState>,
    Query(params): Query<CicloParams>,
) -> AppResult<impl IntoResponse> {
    Ok(Json(app_state.facturacion.ejecutar_ciclo(params.fecha).await?))
}
