use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tracing::instrument;
use uuid::Uuid;

use crate::{
    app_error::{AppError, AppResult},
    domain::entities::plan::{NivelPlan, Plan},
    domain::money::Centimos,
};

use super::suscripciones::SuscripcionRepo;

#[async_trait]
pub trait PlanRepo: Send + Sync {
    async fn insert(&self, plan: &Plan) -> AppResult<Plan>;
    async fn update(&self, plan: &Plan, version_esperada: i64) -> AppResult<Plan>;
    /// Deactivation recorded as ELIMINACION; the removal path for plans that
    /// historical subscriptions still reference.
    async fn soft_delete(&self, plan: &Plan, version_esperada: i64) -> AppResult<Plan>;
    async fn delete(&self, id: Uuid) -> AppResult<()>;
    async fn get_by_id(&self, id: Uuid) -> AppResult<Option<Plan>>;
    async fn list_all(&self) -> AppResult<Vec<Plan>>;
    async fn list_activos(&self) -> AppResult<Vec<Plan>>;
}

#[derive(Debug, Clone)]
pub struct CreatePlanInput {
    pub nombre: String,
    pub nivel: NivelPlan,
    pub precio_mensual: Centimos,
    pub descripcion: Option<String>,
    pub max_usuarios: Option<i32>,
    pub almacenamiento_gb: Option<i32>,
    pub soporte_prioritario: bool,
    pub dias_prueba: i32,
}

#[derive(Debug, Clone, Default)]
pub struct UpdatePlanInput {
    pub nombre: Option<String>,
    pub nivel: Option<NivelPlan>,
    pub precio_mensual: Option<Centimos>,
    pub descripcion: Option<String>,
    pub max_usuarios: Option<i32>,
    pub almacenamiento_gb: Option<i32>,
    pub soporte_prioritario: Option<bool>,
    pub dias_prueba: Option<i32>,
    pub activo: Option<bool>,
}

#[derive(Clone)]
pub struct PlanUseCases {
    planes: Arc<dyn PlanRepo>,
    suscripciones: Arc<dyn SuscripcionRepo>,
    max_reintentos: u32,
}

impl PlanUseCases {
    pub fn new(
        planes: Arc<dyn PlanRepo>,
        suscripciones: Arc<dyn SuscripcionRepo>,
        max_reintentos: u32,
    ) -> Self {
        Self {
            planes,
            suscripciones,
            max_reintentos,
        }
    }

    #[instrument(skip(self, input), fields(nombre = %input.nombre))]
    pub async fn create(&self, input: CreatePlanInput) -> AppResult<Plan> {
        if input.precio_mensual < 0 {
            return Err(AppError::Validation(
                "el precio mensual no puede ser negativo".into(),
            ));
        }
        if input.dias_prueba < 0 {
            return Err(AppError::Validation(
                "los días de prueba no pueden ser negativos".into(),
            ));
        }
        let plan = Plan {
            id: Uuid::new_v4(),
            nombre: input.nombre,
            nivel: input.nivel,
            precio_mensual: input.precio_mensual,
            descripcion: input.descripcion,
            max_usuarios: input.max_usuarios,
            almacenamiento_gb: input.almacenamiento_gb,
            soporte_prioritario: input.soporte_prioritario,
            dias_prueba: input.dias_prueba,
            activo: true,
            fecha_creacion: Utc::now(),
            version: 1,
        };
        self.planes.insert(&plan).await
    }

    pub async fn get(&self, id: Uuid) -> AppResult<Plan> {
        self.planes.get_by_id(id).await?.ok_or(AppError::NotFound)
    }

    pub async fn list(&self) -> AppResult<Vec<Plan>> {
        self.planes.list_all().await
    }

    pub async fn list_activos(&self) -> AppResult<Vec<Plan>> {
        self.planes.list_activos().await
    }

    #[instrument(skip(self, input))]
    pub async fn update(&self, id: Uuid, input: UpdatePlanInput) -> AppResult<Plan> {
        let mut intento = 0;
        loop {
            match self.intentar_update(id, &input).await {
                Err(AppError::Conflict) if intento < self.max_reintentos => intento += 1,
                resultado => return resultado,
            }
        }
    }

    async fn intentar_update(&self, id: Uuid, input: &UpdatePlanInput) -> AppResult<Plan> {
        let mut plan = self.get(id).await?;
        let version = plan.version;

        if let Some(precio) = input.precio_mensual {
            if precio < 0 {
                return Err(AppError::Validation(
                    "el precio mensual no puede ser negativo".into(),
                ));
            }
            plan.precio_mensual = precio;
        }
        if let Some(nombre) = &input.nombre {
            plan.nombre = nombre.clone();
        }
        if let Some(nivel) = input.nivel {
            plan.nivel = nivel;
        }
        if let Some(descripcion) = &input.descripcion {
            plan.descripcion = Some(descripcion.clone());
        }
        if let Some(max) = input.max_usuarios {
            plan.max_usuarios = Some(max);
        }
        if let Some(gb) = input.almacenamiento_gb {
            plan.almacenamiento_gb = Some(gb);
        }
        if let Some(soporte) = input.soporte_prioritario {
            plan.soporte_prioritario = soporte;
        }
        if let Some(dias) = input.dias_prueba {
            plan.dias_prueba = dias;
        }
        if let Some(activo) = input.activo {
            plan.activo = activo;
        }

        self.planes.update(&plan, version).await
    }

    /// Referenced by a live subscription: refused. Referenced only
    /// historically: deactivated. Never referenced: removed outright.
    #[instrument(skip(self))]
    pub async fn delete(&self, id: Uuid) -> AppResult<()> {
        let plan = self.get(id).await?;

        if self.suscripciones.exists_viva_by_plan(id).await? {
            return Err(AppError::DependencyInUse(
                "el plan tiene suscripciones activas".into(),
            ));
        }

        if self.suscripciones.exists_by_plan(id).await? {
            let version = plan.version;
            let mut inactivo = plan;
            inactivo.activo = false;
            self.planes.soft_delete(&inactivo, version).await?;
            return Ok(());
        }

        self.planes.delete(id).await
    }
}
