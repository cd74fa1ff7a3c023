use std::net::SocketAddr;
use std::str::FromStr;

use axum::http::HeaderValue;
use secrecy::SecretString;
use time::Duration;

use crate::application::use_cases::PoliticaCiclo;

pub struct AppConfig {
    pub database_url: String,
    pub bind_addr: SocketAddr,
    pub jwt_secret: SecretString,
    pub access_token_ttl: Duration,
    pub cors_origin: HeaderValue,
    /// Seconds between automatic billing-cycle runs.
    pub intervalo_ciclo_segundos: u64,
    pub politica: PoliticaCiclo,
}

fn get_env(name: &str) -> String {
    std::env::var(name).unwrap_or_else(|_| panic!("{name} must be set"))
}

fn get_env_default<T: FromStr>(name: &str, default: T) -> T {
    std::env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

impl AppConfig {
    pub fn from_env() -> Self {
        let jwt_secret = SecretString::new(get_env("JWT_SECRET").into());
        let access_token_ttl_secs: i64 = get_env_default("ACCESS_TOKEN_TTL_SECS", 86_400);
        let cors_origin: HeaderValue =
            get_env_default("CORS_ORIGIN", String::from("http://localhost:3000"))
                .parse()
                .expect("CORS_ORIGIN must be a valid header value");
        let bind_addr: SocketAddr = get_env_default("BIND_ADDR", "127.0.0.1:3001".parse().unwrap());
        let database_url = get_env("DATABASE_URL");
        let intervalo_ciclo_segundos: u64 = get_env_default("INTERVALO_CICLO_SEGUNDOS", 86_400);

        let defaults = PoliticaCiclo::default();
        let politica = PoliticaCiclo {
            tasa_impuesto_default: get_env_default(
                "TASA_IMPUESTO_DEFAULT",
                defaults.tasa_impuesto_default,
            ),
            dias_intervalo_facturacion: get_env_default(
                "DIAS_INTERVALO_FACTURACION",
                defaults.dias_intervalo_facturacion,
            ),
            dias_vencimiento_factura: get_env_default(
                "DIAS_VENCIMIENTO_FACTURA",
                defaults.dias_vencimiento_factura,
            ),
            dias_vencimiento_prorrateo: get_env_default(
                "DIAS_VENCIMIENTO_PRORRATEO",
                defaults.dias_vencimiento_prorrateo,
            ),
            dias_para_suspension: get_env_default(
                "DIAS_PARA_SUSPENSION",
                defaults.dias_para_suspension,
            ),
            dias_para_expiracion: get_env_default(
                "DIAS_PARA_EXPIRACION",
                defaults.dias_para_expiracion,
            ),
            ventana_reactivacion_dias: get_env_default(
                "VENTANA_REACTIVACION_DIAS",
                defaults.ventana_reactivacion_dias,
            ),
            max_reintentos_conflicto: get_env_default(
                "MAX_REINTENTOS_CONFLICTO",
                defaults.max_reintentos_conflicto,
            ),
        };

        Self {
            database_url,
            bind_addr,
            jwt_secret,
            access_token_ttl: Duration::seconds(access_token_ttl_secs),
            cors_origin,
            intervalo_ciclo_segundos,
            politica,
        }
    }
}
