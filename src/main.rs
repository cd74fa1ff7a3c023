use std::net::SocketAddr;

use dotenvy::dotenv;
use tokio::sync::watch;
use tracing::info;

use suscripciones_api::infra::{
    app::create_app, billing_loop::run_billing_loop, setup::init_app_state,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();

    let app_state = init_app_state().await?;

    let bind_addr = app_state.config.bind_addr;
    let intervalo = app_state.config.intervalo_ciclo_segundos;

    let app = create_app(app_state.clone());

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let facturacion = app_state.facturacion.clone();
    let billing = tokio::spawn(async move {
        run_billing_loop(facturacion, intervalo, shutdown_rx).await;
    });

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    info!("Backend listening at {}", &listener.local_addr()?);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(async {
        tokio::signal::ctrl_c().await.ok();
    })
    .await?;

    shutdown_tx.send(true).ok();
    billing.await.ok();

    Ok(())
}
