//! Test data factories. Each one builds a complete valid entity with sensible
//! defaults; use the closure parameter to override specific fields.

use chrono::{Duration, Utc};
use uuid::Uuid;

use crate::{
    application::use_cases::usuarios::hash_password,
    domain::entities::{
        factura::{EstadoFactura, Factura},
        plan::{NivelPlan, Plan},
        suscripcion::{EstadoSuscripcion, Suscripcion},
        usuario::{RolUsuario, Usuario},
    },
    domain::money,
};

pub fn create_test_usuario(overrides: impl FnOnce(&mut Usuario)) -> Usuario {
    let mut usuario = Usuario {
        id: Uuid::new_v4(),
        nombre: "Ana".to_string(),
        apellido: "García".to_string(),
        email: format!("ana.{}@example.com", Uuid::new_v4().simple()),
        password_hash: hash_password("secreta123"),
        rol: RolUsuario::User,
        pais: Some("ES".to_string()),
        activo: true,
        fecha_registro: Utc::now(),
        version: 1,
    };
    overrides(&mut usuario);
    usuario
}

pub fn create_test_plan(overrides: impl FnOnce(&mut Plan)) -> Plan {
    let mut plan = Plan {
        id: Uuid::new_v4(),
        nombre: "Básico".to_string(),
        nivel: NivelPlan::Basic,
        precio_mensual: 999,
        descripcion: Some("Plan de entrada".to_string()),
        max_usuarios: Some(1),
        almacenamiento_gb: Some(5),
        soporte_prioritario: false,
        dias_prueba: 0,
        activo: true,
        fecha_creacion: Utc::now(),
        version: 1,
    };
    overrides(&mut plan);
    plan
}

pub fn create_test_suscripcion(
    usuario_id: Uuid,
    plan_id: Uuid,
    overrides: impl FnOnce(&mut Suscripcion),
) -> Suscripcion {
    let hoy = Utc::now().date_naive();
    let mut suscripcion = Suscripcion {
        id: Uuid::new_v4(),
        usuario_id,
        plan_id,
        estado: EstadoSuscripcion::Activa,
        fecha_inicio: hoy,
        fecha_proximo_cobro: hoy + Duration::days(30),
        renovacion_automatica: true,
        precio_actual: 999,
        credito_prorrateo: 0,
        motivo_cancelacion: None,
        fecha_cancelacion: None,
        fecha_creacion: Utc::now(),
        version: 1,
    };
    overrides(&mut suscripcion);
    suscripcion
}

pub fn create_test_factura(
    suscripcion_id: Uuid,
    usuario_id: Uuid,
    overrides: impl FnOnce(&mut Factura),
) -> Factura {
    let hoy = Utc::now().date_naive();
    let subtotal = 999;
    let tasa = 21.0;
    let impuestos = money::calcular_impuesto(subtotal, tasa);
    let mut factura = Factura {
        id: Uuid::new_v4(),
        numero: "FAC-000001".to_string(),
        suscripcion_id,
        usuario_id,
        concepto: "Suscripción mensual - Básico".to_string(),
        fecha_emision: hoy,
        subtotal,
        tasa_impuesto: tasa,
        monto_impuestos: impuestos,
        total: subtotal + impuestos,
        estado: EstadoFactura::Pendiente,
        fecha_vencimiento: hoy + Duration::days(15),
        es_prorrateo: false,
        version: 1,
    };
    overrides(&mut factura);
    factura
}
