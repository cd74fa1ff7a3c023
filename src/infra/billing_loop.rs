use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::interval;
use tracing::{error, info};

use crate::application::use_cases::facturacion::FacturacionUseCases;

/// Runs the billing cycle on a fixed interval until the shutdown signal
/// flips. The first tick fires immediately, so a restart catches up on
/// anything due while the service was down.
pub async fn run_billing_loop(
    facturacion: Arc<FacturacionUseCases>,
    intervalo_segundos: u64,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut ticker = interval(Duration::from_secs(intervalo_segundos));
    info!(intervalo_segundos, "billing loop started");

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                match facturacion.ejecutar_ciclo(None).await {
                    Ok(resumen) => info!(
                        emitidas = resumen.facturas_emitidas,
                        vencidas = resumen.facturas_vencidas,
                        errores = resumen.errores,
                        "scheduled billing cycle finished"
                    ),
                    Err(e) => error!(error = %e, "scheduled billing cycle failed"),
                }
            }
            _ = shutdown.changed() => {
                if *shutdown.borrow() {
                    info!("billing loop stopping");
                    return;
                }
            }
        }
    }
}
