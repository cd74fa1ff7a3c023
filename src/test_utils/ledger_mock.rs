//! In-memory implementation of every repository trait, sharing one mutex so
//! each mutating call is an atomic unit exactly like a database transaction:
//! the entity write, its audit revision, and any paired subscription write
//! land together or not at all.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use uuid::Uuid;

use crate::{
    app_error::{AppError, AppResult},
    application::use_cases::{
        auditoria::AuditoriaRepo,
        facturacion::{FacturaRepo, FiltrosFactura, ResumenEstado},
        planes::PlanRepo,
        suscripciones::SuscripcionRepo,
        usuarios::UsuarioRepo,
    },
    domain::entities::{
        auditoria::{OperacionAuditoria, RevisionAuditoria, TipoEntidad},
        factura::{EstadoFactura, Factura},
        plan::Plan,
        suscripcion::{EstadoSuscripcion, Suscripcion},
        usuario::Usuario,
    },
};

#[derive(Default)]
struct Estado {
    usuarios: HashMap<Uuid, Usuario>,
    planes: HashMap<Uuid, Plan>,
    suscripciones: HashMap<Uuid, Suscripcion>,
    facturas: HashMap<Uuid, Factura>,
    revisiones: Vec<RevisionAuditoria>,
    proximo_numero: i64,
}

impl Estado {
    fn registrar(
        &mut self,
        tipo: TipoEntidad,
        entidad_id: Uuid,
        operacion: OperacionAuditoria,
        snapshot: serde_json::Value,
    ) {
        let revision = self.revisiones.len() as i64 + 1;
        self.revisiones.push(RevisionAuditoria {
            revision,
            tipo,
            entidad_id,
            operacion,
            fecha: Utc::now(),
            snapshot,
        });
    }
}

#[derive(Default)]
pub struct InMemoryLedger {
    estado: Mutex<Estado>,
}

impl InMemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds entities directly, without audit revisions, the way rows restored
    /// from a dump would appear.
    pub fn seed(
        usuarios: Vec<Usuario>,
        planes: Vec<Plan>,
        suscripciones: Vec<Suscripcion>,
        facturas: Vec<Factura>,
    ) -> Self {
        let estado = Estado {
            usuarios: usuarios.into_iter().map(|u| (u.id, u)).collect(),
            planes: planes.into_iter().map(|p| (p.id, p)).collect(),
            suscripciones: suscripciones.into_iter().map(|s| (s.id, s)).collect(),
            facturas: facturas.into_iter().map(|f| (f.id, f)).collect(),
            revisiones: vec![],
            proximo_numero: 0,
        };
        Self {
            estado: Mutex::new(estado),
        }
    }

    pub fn revisiones(&self) -> Vec<RevisionAuditoria> {
        self.estado.lock().unwrap().revisiones.clone()
    }

    pub fn factura_guardada(&self, id: Uuid) -> Option<Factura> {
        self.estado.lock().unwrap().facturas.get(&id).cloned()
    }

    pub fn suscripcion_guardada(&self, id: Uuid) -> Option<Suscripcion> {
        self.estado.lock().unwrap().suscripciones.get(&id).cloned()
    }
}

#[async_trait]
impl UsuarioRepo for InMemoryLedger {
    async fn insert(&self, usuario: &Usuario) -> AppResult<Usuario> {
        let mut estado = self.estado.lock().unwrap();
        estado.usuarios.insert(usuario.id, usuario.clone());
        estado.registrar(
            TipoEntidad::Usuario,
            usuario.id,
            OperacionAuditoria::Creacion,
            usuario.snapshot(),
        );
        Ok(usuario.clone())
    }

    async fn update(&self, usuario: &Usuario, version_esperada: i64) -> AppResult<Usuario> {
        let mut estado = self.estado.lock().unwrap();
        let actual = estado.usuarios.get(&usuario.id).ok_or(AppError::Conflict)?;
        if actual.version != version_esperada {
            return Err(AppError::Conflict);
        }
        let mut guardado = usuario.clone();
        guardado.version = version_esperada + 1;
        estado.usuarios.insert(guardado.id, guardado.clone());
        estado.registrar(
            TipoEntidad::Usuario,
            guardado.id,
            OperacionAuditoria::Modificacion,
            guardado.snapshot(),
        );
        Ok(guardado)
    }

    async fn soft_delete(&self, usuario: &Usuario, version_esperada: i64) -> AppResult<Usuario> {
        let mut estado = self.estado.lock().unwrap();
        let actual = estado.usuarios.get(&usuario.id).ok_or(AppError::Conflict)?;
        if actual.version != version_esperada {
            return Err(AppError::Conflict);
        }
        let mut guardado = usuario.clone();
        guardado.version = version_esperada + 1;
        estado.usuarios.insert(guardado.id, guardado.clone());
        estado.registrar(
            TipoEntidad::Usuario,
            guardado.id,
            OperacionAuditoria::Eliminacion,
            guardado.snapshot(),
        );
        Ok(guardado)
    }

    async fn delete(&self, id: Uuid) -> AppResult<()> {
        let mut estado = self.estado.lock().unwrap();
        let usuario = estado.usuarios.remove(&id).ok_or(AppError::NotFound)?;
        estado.registrar(
            TipoEntidad::Usuario,
            id,
            OperacionAuditoria::Eliminacion,
            usuario.snapshot(),
        );
        Ok(())
    }

    async fn get_by_id(&self, id: Uuid) -> AppResult<Option<Usuario>> {
        Ok(self.estado.lock().unwrap().usuarios.get(&id).cloned())
    }

    async fn get_by_email(&self, email: &str) -> AppResult<Option<Usuario>> {
        Ok(self
            .estado
            .lock()
            .unwrap()
            .usuarios
            .values()
            .find(|u| u.email.eq_ignore_ascii_case(email))
            .cloned())
    }

    async fn list_all(&self) -> AppResult<Vec<Usuario>> {
        let mut usuarios: Vec<Usuario> =
            self.estado.lock().unwrap().usuarios.values().cloned().collect();
        usuarios.sort_by(|a, b| b.fecha_registro.cmp(&a.fecha_registro));
        Ok(usuarios)
    }
}

#[async_trait]
impl PlanRepo for InMemoryLedger {
    async fn insert(&self, plan: &Plan) -> AppResult<Plan> {
        let mut estado = self.estado.lock().unwrap();
        estado.planes.insert(plan.id, plan.clone());
        estado.registrar(
            TipoEntidad::Plan,
            plan.id,
            OperacionAuditoria::Creacion,
            plan.snapshot(),
        );
        Ok(plan.clone())
    }

    async fn update(&self, plan: &Plan, version_esperada: i64) -> AppResult<Plan> {
        let mut estado = self.estado.lock().unwrap();
        let actual = estado.planes.get(&plan.id).ok_or(AppError::Conflict)?;
        if actual.version != version_esperada {
            return Err(AppError::Conflict);
        }
        let mut guardado = plan.clone();
        guardado.version = version_esperada + 1;
        estado.planes.insert(guardado.id, guardado.clone());
        estado.registrar(
            TipoEntidad::Plan,
            guardado.id,
            OperacionAuditoria::Modificacion,
            guardado.snapshot(),
        );
        Ok(guardado)
    }

    async fn soft_delete(&self, plan: &Plan, version_esperada: i64) -> AppResult<Plan> {
        let mut estado = self.estado.lock().unwrap();
        let actual = estado.planes.get(&plan.id).ok_or(AppError::Conflict)?;
        if actual.version != version_esperada {
            return Err(AppError::Conflict);
        }
        let mut guardado = plan.clone();
        guardado.version = version_esperada + 1;
        estado.planes.insert(guardado.id, guardado.clone());
        estado.registrar(
            TipoEntidad::Plan,
            guardado.id,
            OperacionAuditoria::Eliminacion,
            guardado.snapshot(),
        );
        Ok(guardado)
    }

    async fn delete(&self, id: Uuid) -> AppResult<()> {
        let mut estado = self.estado.lock().unwrap();
        let plan = estado.planes.remove(&id).ok_or(AppError::NotFound)?;
        estado.registrar(
            TipoEntidad::Plan,
            id,
            OperacionAuditoria::Eliminacion,
            plan.snapshot(),
        );
        Ok(())
    }

    async fn get_by_id(&self, id: Uuid) -> AppResult<Option<Plan>> {
        Ok(self.estado.lock().unwrap().planes.get(&id).cloned())
    }

    async fn list_all(&self) -> AppResult<Vec<Plan>> {
        let mut planes: Vec<Plan> =
            self.estado.lock().unwrap().planes.values().cloned().collect();
        planes.sort_by_key(|p| p.precio_mensual);
        Ok(planes)
    }

    async fn list_activos(&self) -> AppResult<Vec<Plan>> {
        let mut planes: Vec<Plan> = self
            .estado
            .lock()
            .unwrap()
            .planes
            .values()
            .filter(|p| p.activo)
            .cloned()
            .collect();
        planes.sort_by_key(|p| p.precio_mensual);
        Ok(planes)
    }
}

fn actualizar_suscripcion(
    estado: &mut Estado,
    suscripcion: &Suscripcion,
    version_esperada: i64,
) -> AppResult<Suscripcion> {
    let actual = estado
        .suscripciones
        .get(&suscripcion.id)
        .ok_or(AppError::Conflict)?;
    if actual.version != version_esperada {
        return Err(AppError::Conflict);
    }
    let mut guardada = suscripcion.clone();
    guardada.version = version_esperada + 1;
    estado.suscripciones.insert(guardada.id, guardada.clone());
    estado.registrar(
        TipoEntidad::Suscripcion,
        guardada.id,
        OperacionAuditoria::Modificacion,
        guardada.snapshot(),
    );
    Ok(guardada)
}

#[async_trait]
impl SuscripcionRepo for InMemoryLedger {
    async fn insert(&self, suscripcion: &Suscripcion) -> AppResult<Suscripcion> {
        let mut estado = self.estado.lock().unwrap();
        estado.suscripciones.insert(suscripcion.id, suscripcion.clone());
        estado.registrar(
            TipoEntidad::Suscripcion,
            suscripcion.id,
            OperacionAuditoria::Creacion,
            suscripcion.snapshot(),
        );
        Ok(suscripcion.clone())
    }

    async fn update(
        &self,
        suscripcion: &Suscripcion,
        version_esperada: i64,
    ) -> AppResult<Suscripcion> {
        let mut estado = self.estado.lock().unwrap();
        actualizar_suscripcion(&mut estado, suscripcion, version_esperada)
    }

    async fn get_by_id(&self, id: Uuid) -> AppResult<Option<Suscripcion>> {
        Ok(self.estado.lock().unwrap().suscripciones.get(&id).cloned())
    }

    async fn list_all(&self) -> AppResult<Vec<Suscripcion>> {
        let mut lista: Vec<Suscripcion> = self
            .estado
            .lock()
            .unwrap()
            .suscripciones
            .values()
            .cloned()
            .collect();
        lista.sort_by(|a, b| b.fecha_creacion.cmp(&a.fecha_creacion));
        Ok(lista)
    }

    async fn list_by_usuario(&self, usuario_id: Uuid) -> AppResult<Vec<Suscripcion>> {
        let mut lista: Vec<Suscripcion> = self
            .estado
            .lock()
            .unwrap()
            .suscripciones
            .values()
            .filter(|s| s.usuario_id == usuario_id)
            .cloned()
            .collect();
        lista.sort_by(|a, b| b.fecha_creacion.cmp(&a.fecha_creacion));
        Ok(lista)
    }

    async fn find_no_terminal_by_usuario(
        &self,
        usuario_id: Uuid,
    ) -> AppResult<Option<Suscripcion>> {
        Ok(self
            .estado
            .lock()
            .unwrap()
            .suscripciones
            .values()
            .find(|s| s.usuario_id == usuario_id && !s.estado.es_terminal())
            .cloned())
    }

    async fn exists_by_plan(&self, plan_id: Uuid) -> AppResult<bool> {
        Ok(self
            .estado
            .lock()
            .unwrap()
            .suscripciones
            .values()
            .any(|s| s.plan_id == plan_id))
    }

    async fn exists_viva_by_plan(&self, plan_id: Uuid) -> AppResult<bool> {
        Ok(self
            .estado
            .lock()
            .unwrap()
            .suscripciones
            .values()
            .any(|s| s.plan_id == plan_id && !s.estado.es_terminal()))
    }

    async fn exists_by_usuario(&self, usuario_id: Uuid) -> AppResult<bool> {
        Ok(self
            .estado
            .lock()
            .unwrap()
            .suscripciones
            .values()
            .any(|s| s.usuario_id == usuario_id))
    }

    async fn list_para_facturar(&self, hasta: NaiveDate) -> AppResult<Vec<Suscripcion>> {
        let mut lista: Vec<Suscripcion> = self
            .estado
            .lock()
            .unwrap()
            .suscripciones
            .values()
            .filter(|s| {
                matches!(
                    s.estado,
                    EstadoSuscripcion::Trial
                        | EstadoSuscripcion::Activa
                        | EstadoSuscripcion::Morosa
                ) && s.fecha_proximo_cobro <= hasta
            })
            .cloned()
            .collect();
        lista.sort_by_key(|s| s.fecha_proximo_cobro);
        Ok(lista)
    }

    async fn count_por_estado(&self) -> AppResult<Vec<(EstadoSuscripcion, i64)>> {
        let estado = self.estado.lock().unwrap();
        let mut conteos: HashMap<EstadoSuscripcion, i64> = HashMap::new();
        for s in estado.suscripciones.values() {
            *conteos.entry(s.estado).or_default() += 1;
        }
        Ok(conteos.into_iter().collect())
    }
}

fn actualizar_factura(
    estado: &mut Estado,
    factura: &Factura,
    version_esperada: i64,
    operacion: OperacionAuditoria,
) -> AppResult<Factura> {
    let actual = estado.facturas.get(&factura.id).ok_or(AppError::Conflict)?;
    if actual.version != version_esperada {
        return Err(AppError::Conflict);
    }
    let mut guardada = factura.clone();
    guardada.version = version_esperada + 1;
    estado.facturas.insert(guardada.id, guardada.clone());
    estado.registrar(
        TipoEntidad::Factura,
        guardada.id,
        operacion,
        guardada.snapshot(),
    );
    Ok(guardada)
}

fn cumple_filtros(f: &Factura, filtros: &FiltrosFactura) -> bool {
    filtros.usuario_id.is_none_or(|id| f.usuario_id == id)
        && filtros.suscripcion_id.is_none_or(|id| f.suscripcion_id == id)
        && filtros.estado.is_none_or(|e| f.estado == e)
        && filtros.desde.is_none_or(|d| f.fecha_emision >= d)
        && filtros.hasta.is_none_or(|h| f.fecha_emision <= h)
        && filtros.monto_minimo.is_none_or(|m| f.total >= m)
        && filtros.monto_maximo.is_none_or(|m| f.total <= m)
        && filtros.solo_prorrateo.is_none_or(|p| f.es_prorrateo == p)
}

fn ordenar_facturas(mut lista: Vec<Factura>) -> Vec<Factura> {
    lista.sort_by(|a, b| {
        b.fecha_emision
            .cmp(&a.fecha_emision)
            .then_with(|| b.numero.cmp(&a.numero))
    });
    lista
}

#[async_trait]
impl FacturaRepo for InMemoryLedger {
    async fn siguiente_numero(&self) -> AppResult<i64> {
        let mut estado = self.estado.lock().unwrap();
        estado.proximo_numero += 1;
        Ok(estado.proximo_numero)
    }

    async fn emitir(
        &self,
        factura: &Factura,
        suscripcion: &Suscripcion,
        version_suscripcion: i64,
    ) -> AppResult<(Factura, Suscripcion)> {
        let mut estado = self.estado.lock().unwrap();
        let guardada = actualizar_suscripcion(&mut estado, suscripcion, version_suscripcion)?;
        estado.facturas.insert(factura.id, factura.clone());
        estado.registrar(
            TipoEntidad::Factura,
            factura.id,
            OperacionAuditoria::Creacion,
            factura.snapshot(),
        );
        Ok((factura.clone(), guardada))
    }

    async fn update(&self, factura: &Factura, version_esperada: i64) -> AppResult<Factura> {
        let mut estado = self.estado.lock().unwrap();
        actualizar_factura(
            &mut estado,
            factura,
            version_esperada,
            OperacionAuditoria::Modificacion,
        )
    }

    async fn update_con_suscripcion(
        &self,
        factura: &Factura,
        version_factura: i64,
        suscripcion: &Suscripcion,
        version_suscripcion: i64,
    ) -> AppResult<(Factura, Suscripcion)> {
        let mut estado = self.estado.lock().unwrap();
        let actual = estado.facturas.get(&factura.id).ok_or(AppError::Conflict)?;
        if actual.version != version_factura {
            return Err(AppError::Conflict);
        }
        let suscripcion = actualizar_suscripcion(&mut estado, suscripcion, version_suscripcion)?;
        let guardada = actualizar_factura(
            &mut estado,
            factura,
            version_factura,
            OperacionAuditoria::Modificacion,
        )?;
        Ok((guardada, suscripcion))
    }

    async fn anular(&self, factura: &Factura, version_esperada: i64) -> AppResult<Factura> {
        let mut estado = self.estado.lock().unwrap();
        actualizar_factura(
            &mut estado,
            factura,
            version_esperada,
            OperacionAuditoria::Eliminacion,
        )
    }

    async fn get_by_id(&self, id: Uuid) -> AppResult<Option<Factura>> {
        Ok(self.estado.lock().unwrap().facturas.get(&id).cloned())
    }

    async fn list_all(&self) -> AppResult<Vec<Factura>> {
        Ok(ordenar_facturas(
            self.estado.lock().unwrap().facturas.values().cloned().collect(),
        ))
    }

    async fn list_by_suscripcion(&self, suscripcion_id: Uuid) -> AppResult<Vec<Factura>> {
        Ok(ordenar_facturas(
            self.estado
                .lock()
                .unwrap()
                .facturas
                .values()
                .filter(|f| f.suscripcion_id == suscripcion_id)
                .cloned()
                .collect(),
        ))
    }

    async fn list_by_usuario(&self, usuario_id: Uuid) -> AppResult<Vec<Factura>> {
        Ok(ordenar_facturas(
            self.estado
                .lock()
                .unwrap()
                .facturas
                .values()
                .filter(|f| f.usuario_id == usuario_id)
                .cloned()
                .collect(),
        ))
    }

    async fn list_pendientes_vencidas(&self, fecha: NaiveDate) -> AppResult<Vec<Factura>> {
        Ok(self
            .estado
            .lock()
            .unwrap()
            .facturas
            .values()
            .filter(|f| f.estado == EstadoFactura::Pendiente && f.fecha_vencimiento < fecha)
            .cloned()
            .collect())
    }

    async fn list_vencidas(&self) -> AppResult<Vec<Factura>> {
        Ok(self
            .estado
            .lock()
            .unwrap()
            .facturas
            .values()
            .filter(|f| f.estado == EstadoFactura::Vencida)
            .cloned()
            .collect())
    }

    async fn filtrar(&self, filtros: &FiltrosFactura) -> AppResult<Vec<Factura>> {
        Ok(ordenar_facturas(
            self.estado
                .lock()
                .unwrap()
                .facturas
                .values()
                .filter(|f| cumple_filtros(f, filtros))
                .cloned()
                .collect(),
        ))
    }

    async fn buscar(
        &self,
        filtros: &FiltrosFactura,
        offset: i64,
        limite: i64,
    ) -> AppResult<(Vec<Factura>, i64)> {
        let coincidentes = ordenar_facturas(
            self.estado
                .lock()
                .unwrap()
                .facturas
                .values()
                .filter(|f| cumple_filtros(f, filtros))
                .cloned()
                .collect(),
        );
        let total = coincidentes.len() as i64;
        let pagina = coincidentes
            .into_iter()
            .skip(offset.max(0) as usize)
            .take(limite.max(0) as usize)
            .collect();
        Ok((pagina, total))
    }

    async fn resumen_por_estado(&self) -> AppResult<Vec<ResumenEstado>> {
        let estado = self.estado.lock().unwrap();
        let mut acumulado: HashMap<EstadoFactura, (i64, i64)> = HashMap::new();
        for f in estado.facturas.values() {
            let entrada = acumulado.entry(f.estado).or_default();
            entrada.0 += 1;
            entrada.1 += f.total;
        }
        Ok(acumulado
            .into_iter()
            .map(|(estado, (cantidad, monto_total))| ResumenEstado {
                estado,
                cantidad,
                monto_total,
            })
            .collect())
    }
}

#[async_trait]
impl AuditoriaRepo for InMemoryLedger {
    async fn list_recientes(&self, limite: i64) -> AppResult<Vec<RevisionAuditoria>> {
        let estado = self.estado.lock().unwrap();
        Ok(estado
            .revisiones
            .iter()
            .rev()
            .take(limite.max(0) as usize)
            .cloned()
            .collect())
    }

    async fn list_by_tipo(
        &self,
        tipo: TipoEntidad,
        limite: i64,
    ) -> AppResult<Vec<RevisionAuditoria>> {
        let estado = self.estado.lock().unwrap();
        Ok(estado
            .revisiones
            .iter()
            .rev()
            .filter(|r| r.tipo == tipo)
            .take(limite.max(0) as usize)
            .cloned()
            .collect())
    }

    async fn list_by_entidad(
        &self,
        tipo: TipoEntidad,
        entidad_id: Uuid,
    ) -> AppResult<Vec<RevisionAuditoria>> {
        let estado = self.estado.lock().unwrap();
        Ok(estado
            .revisiones
            .iter()
            .filter(|r| r.tipo == tipo && r.entidad_id == entidad_id)
            .cloned()
            .collect())
    }

    async fn get_revision(
        &self,
        tipo: TipoEntidad,
        entidad_id: Uuid,
        revision: i64,
    ) -> AppResult<Option<RevisionAuditoria>> {
        let estado = self.estado.lock().unwrap();
        Ok(estado
            .revisiones
            .iter()
            .find(|r| r.tipo == tipo && r.entidad_id == entidad_id && r.revision == revision)
            .cloned())
    }

    async fn count_por_tipo(&self) -> AppResult<Vec<(TipoEntidad, i64)>> {
        let estado = self.estado.lock().unwrap();
        let mut conteos: HashMap<TipoEntidad, i64> = HashMap::new();
        for r in &estado.revisiones {
            *conteos.entry(r.tipo).or_default() += 1;
        }
        Ok(conteos.into_iter().collect())
    }

    async fn count_por_operacion(&self) -> AppResult<Vec<(OperacionAuditoria, i64)>> {
        let estado = self.estado.lock().unwrap();
        let mut conteos: HashMap<OperacionAuditoria, i64> = HashMap::new();
        for r in &estado.revisiones {
            *conteos.entry(r.operacion).or_default() += 1;
        }
        Ok(conteos.into_iter().collect())
    }
}
