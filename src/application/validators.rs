use validator::Validate;

use crate::app_error::{AppError, AppResult};

/// Runs a DTO's declared validations and folds failures into one
/// `VALIDATION_ERROR` response before any state is touched.
pub fn validar<T: Validate>(payload: &T) -> AppResult<()> {
    payload.validate().map_err(|errors| {
        let detalle = errors
            .field_errors()
            .iter()
            .map(|(campo, errs)| {
                let msgs: Vec<String> = errs
                    .iter()
                    .map(|e| {
                        e.message
                            .as_ref()
                            .map(|m| m.to_string())
                            .unwrap_or_else(|| e.code.to_string())
                    })
                    .collect();
                format!("{}: {}", campo, msgs.join(", "))
            })
            .collect::<Vec<_>>()
            .join("; ");
        AppError::Validation(detalle)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Deserialize, Validate)]
    struct Dto {
        #[validate(email(message = "debe ser un email válido"))]
        email: String,
        #[validate(length(min = 1, message = "es obligatorio"))]
        nombre: String,
    }

    #[test]
    fn acepta_payload_valido() {
        let dto = Dto {
            email: "ana@example.com".into(),
            nombre: "Ana".into(),
        };
        assert!(validar(&dto).is_ok());
    }

    #[test]
    fn rechaza_con_detalle_de_campos() {
        let dto = Dto {
            email: "no-es-email".into(),
            nombre: String::new(),
        };
        let err = validar(&dto).unwrap_err();
        match err {
            AppError::Validation(msg) => {
                assert!(msg.contains("email"));
                assert!(msg.contains("nombre"));
            }
            otro => panic!("expected Validation, got {otro:?}"),
        }
    }
}
