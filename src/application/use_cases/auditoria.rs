use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use uuid::Uuid;

use crate::{
    app_error::{AppError, AppResult},
    domain::entities::auditoria::{OperacionAuditoria, RevisionAuditoria, TipoEntidad},
};

/// Read side of the revision log. Writes never come through here: repositories
/// append revisions inside the same atomic unit as the entity mutation, so a
/// standalone "record revision" call cannot exist.
#[async_trait]
pub trait AuditoriaRepo: Send + Sync {
    /// Newest first.
    async fn list_recientes(&self, limite: i64) -> AppResult<Vec<RevisionAuditoria>>;
    async fn list_by_tipo(
        &self,
        tipo: TipoEntidad,
        limite: i64,
    ) -> AppResult<Vec<RevisionAuditoria>>;
    /// Full history of one entity, oldest first.
    async fn list_by_entidad(
        &self,
        tipo: TipoEntidad,
        entidad_id: Uuid,
    ) -> AppResult<Vec<RevisionAuditoria>>;
    async fn get_revision(
        &self,
        tipo: TipoEntidad,
        entidad_id: Uuid,
        revision: i64,
    ) -> AppResult<Option<RevisionAuditoria>>;
    async fn count_por_tipo(&self) -> AppResult<Vec<(TipoEntidad, i64)>>;
    async fn count_por_operacion(&self) -> AppResult<Vec<(OperacionAuditoria, i64)>>;
}

/// One field that differs between two snapshots of the same entity.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CampoModificado {
    pub campo: String,
    pub antes: Value,
    pub despues: Value,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ComparacionRevisiones {
    pub tipo: TipoEntidad,
    pub entidad_id: Uuid,
    pub revision_base: i64,
    pub revision_comparada: i64,
    pub cambios: Vec<CampoModificado>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EstadisticasAuditoria {
    pub total_revisiones: i64,
    pub por_tipo: Vec<ConteoTipo>,
    pub por_operacion: Vec<ConteoOperacion>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConteoTipo {
    pub tipo: TipoEntidad,
    pub cantidad: i64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConteoOperacion {
    pub operacion: OperacionAuditoria,
    pub cantidad: i64,
}

const LIMITE_DEFAULT: i64 = 50;
const LIMITE_MAX: i64 = 500;

#[derive(Clone)]
pub struct AuditoriaUseCases {
    auditoria: Arc<dyn AuditoriaRepo>,
}

impl AuditoriaUseCases {
    pub fn new(auditoria: Arc<dyn AuditoriaRepo>) -> Self {
        Self { auditoria }
    }

    pub async fn recientes(&self, limite: Option<i64>) -> AppResult<Vec<RevisionAuditoria>> {
        self.auditoria.list_recientes(acotar(limite)).await
    }

    pub async fn por_tipo(
        &self,
        tipo: TipoEntidad,
        limite: Option<i64>,
    ) -> AppResult<Vec<RevisionAuditoria>> {
        self.auditoria.list_by_tipo(tipo, acotar(limite)).await
    }

    pub async fn historial(
        &self,
        tipo: TipoEntidad,
        entidad_id: Uuid,
    ) -> AppResult<Vec<RevisionAuditoria>> {
        let revisiones = self.auditoria.list_by_entidad(tipo, entidad_id).await?;
        if revisiones.is_empty() {
            return Err(AppError::NotFound);
        }
        Ok(revisiones)
    }

    /// Field-level diff between two revisions of one entity. Keys present in
    /// only one snapshot show up with `null` on the other side.
    pub async fn comparar(
        &self,
        tipo: TipoEntidad,
        entidad_id: Uuid,
        revision_base: i64,
        revision_comparada: i64,
    ) -> AppResult<ComparacionRevisiones> {
        let base = self
            .auditoria
            .get_revision(tipo, entidad_id, revision_base)
            .await?
            .ok_or(AppError::NotFound)?;
        let comparada = self
            .auditoria
            .get_revision(tipo, entidad_id, revision_comparada)
            .await?
            .ok_or(AppError::NotFound)?;
        Ok(ComparacionRevisiones {
            tipo,
            entidad_id,
            revision_base,
            revision_comparada,
            cambios: diff_snapshots(&base.snapshot, &comparada.snapshot),
        })
    }

    pub async fn estadisticas(&self) -> AppResult<EstadisticasAuditoria> {
        let por_tipo: Vec<ConteoTipo> = self
            .auditoria
            .count_por_tipo()
            .await?
            .into_iter()
            .map(|(tipo, cantidad)| ConteoTipo { tipo, cantidad })
            .collect();
        let por_operacion: Vec<ConteoOperacion> = self
            .auditoria
            .count_por_operacion()
            .await?
            .into_iter()
            .map(|(operacion, cantidad)| ConteoOperacion {
                operacion,
                cantidad,
            })
            .collect();
        let total_revisiones = por_tipo.iter().map(|c| c.cantidad).sum();
        Ok(EstadisticasAuditoria {
            total_revisiones,
            por_tipo,
            por_operacion,
        })
    }
}

fn acotar(limite: Option<i64>) -> i64 {
    limite.unwrap_or(LIMITE_DEFAULT).clamp(1, LIMITE_MAX)
}

fn diff_snapshots(antes: &Value, despues: &Value) -> Vec<CampoModificado> {
    let vacio = serde_json::Map::new();
    let mapa_antes = antes.as_object().unwrap_or(&vacio);
    let mapa_despues = despues.as_object().unwrap_or(&vacio);

    let mut campos: Vec<&String> = mapa_antes.keys().chain(mapa_despues.keys()).collect();
    campos.sort();
    campos.dedup();

    campos
        .into_iter()
        .filter_map(|campo| {
            let a = mapa_antes.get(campo).cloned().unwrap_or(Value::Null);
            let d = mapa_despues.get(campo).cloned().unwrap_or(Value::Null);
            (a != d).then(|| CampoModificado {
                campo: campo.clone(),
                antes: a,
                despues: d,
            })
        })
        .collect()
}
