//! Fixed-point monetary arithmetic.
//!
//! All amounts are céntimos (minor units) of the service's single currency,
//! stored as `i64`. The HTTP surface exchanges them as two-decimal numbers,
//! converted at the DTO boundary.

/// Amount in minor currency units.
pub type Centimos = i64;

/// Fallback tax rate when the user's country is unknown.
pub const TASA_IMPUESTO_DEFAULT: f64 = 21.0;

/// Rounds to the nearest céntimo, halves away from zero.
///
/// For positive amounts this is round-half-up; negatives keep the same
/// magnitude as their positive mirror, which is what keeps upgrade charges
/// and downgrade credits symmetric.
pub fn redondear(valor: f64) -> Centimos {
    valor.round() as Centimos
}

/// Tax amount for a subtotal at a percentage rate.
pub fn calcular_impuesto(subtotal: Centimos, tasa: f64) -> Centimos {
    redondear(subtotal as f64 * tasa / 100.0)
}

/// Prorated charge (or credit, when negative) for a price difference with
/// `dias_restantes` of a `dias_ciclo`-day cycle left.
pub fn prorratear(diferencia: Centimos, dias_restantes: i64, dias_ciclo: i64) -> Centimos {
    debug_assert!(dias_ciclo > 0, "dias_ciclo must be positive");
    let dias_restantes = dias_restantes.max(0);
    redondear(diferencia as f64 * dias_restantes as f64 / dias_ciclo as f64)
}

/// Céntimos to the decimal representation used on the wire.
pub fn a_decimal(centimos: Centimos) -> f64 {
    centimos as f64 / 100.0
}

/// Decimal wire amount to céntimos.
pub fn de_decimal(decimal: f64) -> Centimos {
    (decimal * 100.0).round() as Centimos
}

/// IVA/VAT rate by country, matching the rates the billing department keeps
/// for the markets the service sells in. Accepts ISO codes or common
/// Spanish/English country names, case-insensitively.
pub fn tasa_para_pais(pais: Option<&str>) -> f64 {
    let Some(pais) = pais else {
        return TASA_IMPUESTO_DEFAULT;
    };
    match pais.trim().to_uppercase().as_str() {
        "" => TASA_IMPUESTO_DEFAULT,
        "ES" | "ESPAÑA" | "SPAIN" => 21.0,
        "DE" | "ALEMANIA" | "GERMANY" => 19.0,
        "FR" | "FRANCIA" | "FRANCE" => 20.0,
        "IT" | "ITALIA" | "ITALY" => 22.0,
        "PT" | "PORTUGAL" => 23.0,
        "GB" | "UK" | "REINO UNIDO" | "UNITED KINGDOM" => 20.0,
        "NL" | "HOLANDA" | "NETHERLANDS" => 21.0,
        "BE" | "BÉLGICA" | "BELGIUM" => 21.0,
        "AT" | "AUSTRIA" => 20.0,
        "SE" | "SUECIA" | "SWEDEN" => 25.0,
        "DK" | "DINAMARCA" | "DENMARK" => 25.0,
        "PL" | "POLONIA" | "POLAND" => 23.0,
        "IE" | "IRLANDA" | "IRELAND" => 23.0,
        "CH" | "SUIZA" | "SWITZERLAND" => 7.7,
        "MX" | "MÉXICO" | "MEXICO" => 16.0,
        "AR" | "ARGENTINA" => 21.0,
        "CL" | "CHILE" => 19.0,
        "CO" | "COLOMBIA" => 19.0,
        "PE" | "PERÚ" | "PERU" => 18.0,
        "BR" | "BRASIL" | "BRAZIL" => 17.0,
        "US" | "USA" | "ESTADOS UNIDOS" | "UNITED STATES" => 0.0,
        "CA" | "CANADÁ" | "CANADA" => 5.0,
        _ => TASA_IMPUESTO_DEFAULT,
    }
}
