//! Record shapes served by the mock reporting backend.
//!
//! Output structs serialize with the same field names as the production
//! serializers, including the read-only display fields (`organismo_nombre`,
//! `medida_nombre`, ...). Foreign keys are write-only on the wire, so they are
//! skipped on output and only appear in the `Create*` payloads.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Sector agency codes accepted by the backend, with their display names.
pub const TIPOS_ORGANISMO: &[(&str, &str)] = &[
    ("SEA", "Servicio de Evaluación Ambiental"),
    ("SEC", "Superintendencia de Electricidad y Combustible"),
    ("IRV", "Intendencia Regional de Valparaíso"),
    (
        "DGTM",
        "Dirección General del Territorio Marítimo y de Marina Mercante",
    ),
    ("CONAF", "Corporación Nacional Forestal"),
    ("SAG", "Servicio Agrícola y Ganadero"),
];

/// Progress states for a `MedidaAvance`.
pub const ESTADOS: &[(&str, &str)] = &[
    ("P", "Pendiente"),
    ("E", "En progreso"),
    ("C", "Completado"),
    ("R", "Retrasado"),
];

pub fn organismo_display(code: &str) -> String {
    TIPOS_ORGANISMO
        .iter()
        .find(|(c, _)| *c == code)
        .map(|(_, name)| name.to_string())
        .unwrap_or_else(|| code.to_string())
}

/// Accept either a calendar date or an RFC 3339 timestamp and keep the date.
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d").ok().or_else(|| {
        DateTime::parse_from_rfc3339(raw)
            .ok()
            .map(|dt| dt.with_timezone(&Utc).date_naive())
    })
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Organismo {
    pub id: u64,
    pub nombre: String,
    pub contacto: Option<String>,
    pub telefono: Option<String>,
}

#[derive(Deserialize)]
pub struct CreateOrganismo {
    pub nombre: String,
    #[serde(default)]
    pub contacto: Option<String>,
    #[serde(default)]
    pub telefono: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Ppda {
    pub id: u64,
    pub nombre: String,
    pub descripcion: String,
    pub fecha_inicio: NaiveDate,
    pub fecha_termino: NaiveDate,
    pub organismo_nombre: Option<String>,
    pub fecha_creacion: DateTime<Utc>,
    #[serde(skip)]
    pub organismo_id: Option<u64>,
}

#[derive(Deserialize)]
pub struct CreatePpda {
    pub nombre: String,
    #[serde(default)]
    pub descripcion: String,
    pub fecha_inicio: String,
    pub fecha_termino: String,
    #[serde(default)]
    pub organismo: Option<u64>,
}

/// Catalog entry a `MedidaAvance` reports progress on. Not exposed directly.
#[derive(Clone, Debug)]
pub struct Medida {
    pub id: u64,
    pub nombre: String,
    pub regulatoria: bool,
    pub ppda_id: Option<u64>,
}

impl Medida {
    pub fn tipo_display(&self) -> &'static str {
        if self.regulatoria {
            "Regulatoria"
        } else {
            "No Regulatoria"
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct MedidaAvance {
    pub id: u64,
    pub medida_nombre: String,
    pub medida_tipo: String,
    pub descripcion: String,
    pub fecha_limite: NaiveDate,
    pub avance: u8,
    pub estado: String,
    pub observaciones: String,
    pub fecha_actualizacion: DateTime<Utc>,
    #[serde(skip)]
    pub medida_id: u64,
}

fn default_estado() -> String {
    "P".to_string()
}

#[derive(Deserialize)]
pub struct CreateMedidaAvance {
    pub medida: u64,
    pub descripcion: String,
    pub fecha_limite: String,
    #[serde(default)]
    pub avance: i64,
    #[serde(default = "default_estado")]
    pub estado: String,
    #[serde(default)]
    pub observaciones: String,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ReporteAnual {
    pub id: u64,
    pub organismo_nombre: String,
    pub periodo: NaiveDate,
    pub medida_nombre: String,
    pub cumplimiento: f64,
    pub observaciones: Option<String>,
    #[serde(skip)]
    pub organismo_id: u64,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ResumenAnual {
    pub periodo: NaiveDate,
    pub promedio_cumplimiento: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_date_accepts_plain_dates_and_timestamps() {
        let expected = NaiveDate::from_ymd_opt(2030, 3, 1).unwrap();
        assert_eq!(parse_date("2030-03-01"), Some(expected));
        assert_eq!(parse_date("2030-03-01T00:00:00.000Z"), Some(expected));
        assert_eq!(parse_date("01/03/2030"), None);
    }

    #[test]
    fn organismo_display_falls_back_to_code() {
        assert_eq!(organismo_display("CONAF"), "Corporación Nacional Forestal");
        assert_eq!(organismo_display("XYZ"), "XYZ");
    }

    #[test]
    fn ppda_hides_foreign_key_on_output() {
        let ppda = Ppda {
            id: 1,
            nombre: "PPDA Concón".to_string(),
            descripcion: String::new(),
            fecha_inicio: NaiveDate::from_ymd_opt(2030, 1, 1).unwrap(),
            fecha_termino: NaiveDate::from_ymd_opt(2031, 1, 1).unwrap(),
            organismo_nombre: Some("Corporación Nacional Forestal".to_string()),
            fecha_creacion: Utc::now(),
            organismo_id: Some(5),
        };
        let json = serde_json::to_value(&ppda).unwrap();
        assert_eq!(json["fecha_inicio"], "2030-01-01");
        assert!(json.get("organismo_id").is_none());
    }

    #[test]
    fn create_medida_avance_defaults() {
        let input: CreateMedidaAvance = serde_json::from_str(
            r#"{"medida":1,"descripcion":"Recambio","fecha_limite":"2030-06-30"}"#,
        )
        .unwrap();
        assert_eq!(input.avance, 0);
        assert_eq!(input.estado, "P");
        assert!(input.observaciones.is_empty());
    }

    #[test]
    fn create_ppda_rejects_missing_dates() {
        let result: Result<CreatePpda, _> = serde_json::from_str(r#"{"nombre":"Sin fechas"}"#);
        assert!(result.is_err());
    }
}
