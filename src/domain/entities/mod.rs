pub mod auditoria;
pub mod factura;
pub mod plan;
pub mod suscripcion;
pub mod usuario;
