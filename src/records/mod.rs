//! Clinical record store collaborator.
//!
//! Lives in a separate practice database; only the narrow read contract the
//! record-extraction tool and treatment-plan generator need is exposed here.
//! Column naming inside that database is the collaborator's concern.

use async_trait::async_trait;
use sqlx::PgPool;

use crate::types::AppResult;

#[derive(Debug, Clone, Default, serde::Serialize, sqlx::FromRow)]
pub struct Patient {
    pub id: String,
    pub name: Option<String>,
    pub date_of_birth: Option<chrono::NaiveDate>,
    pub gender: Option<String>,
}

#[derive(Debug, Clone, serde::Serialize, sqlx::FromRow)]
pub struct Encounter {
    pub occurred_at: Option<chrono::DateTime<chrono::Utc>>,
    pub reason: Option<String>,
    pub diagnosis: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, serde::Serialize, sqlx::FromRow)]
pub struct Allergy {
    pub substance: Option<String>,
    pub reaction: Option<String>,
    pub severity: Option<String>,
}

#[derive(Debug, Clone, serde::Serialize, sqlx::FromRow)]
pub struct VitalSigns {
    pub recorded_at: Option<chrono::DateTime<chrono::Utc>>,
    pub blood_pressure: Option<String>,
    pub heart_rate: Option<i32>,
    pub temperature_c: Option<f64>,
    pub weight_kg: Option<f64>,
}

#[derive(Debug, Clone, serde::Serialize, sqlx::FromRow)]
pub struct Medication {
    pub name: Option<String>,
    pub dosage: Option<String>,
    pub frequency: Option<String>,
    pub started_at: Option<chrono::NaiveDate>,
}

/// Everything the extraction tool and the treatment plan need for one
/// patient.
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct PatientChart {
    pub patient: Patient,
    pub encounters: Vec<Encounter>,
    pub allergies: Vec<Allergy>,
    pub vitals: Vec<VitalSigns>,
    pub medications: Vec<Medication>,
}

#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Fetch the full chart for exactly one patient. Implementations must
    /// scope every query to `patient_id`.
    async fn fetch_chart(&self, patient_id: &str) -> AppResult<PatientChart>;
}

pub struct PgRecordStore {
    pool: PgPool,
}

impl PgRecordStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RecordStore for PgRecordStore {
    async fn fetch_chart(&self, patient_id: &str) -> AppResult<PatientChart> {
        let patient = sqlx::query_as::<_, Patient>(
            "SELECT id::text, name, date_of_birth, gender FROM patients WHERE id::text = $1",
        )
        .bind(patient_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| {
            crate::types::AppError::NotFound(format!("no patient with id {patient_id}"))
        })?;

        let encounters = sqlx::query_as::<_, Encounter>(
            r#"
            SELECT occurred_at, reason, diagnosis, notes
            FROM encounters WHERE patient_id::text = $1
            ORDER BY occurred_at DESC LIMIT 20
            "#,
        )
        .bind(patient_id)
        .fetch_all(&self.pool)
        .await?;

        let allergies = sqlx::query_as::<_, Allergy>(
            "SELECT substance, reaction, severity FROM allergies WHERE patient_id::text = $1",
        )
        .bind(patient_id)
        .fetch_all(&self.pool)
        .await?;

        let vitals = sqlx::query_as::<_, VitalSigns>(
            r#"
            SELECT recorded_at, blood_pressure, heart_rate, temperature_c, weight_kg
            FROM vitals WHERE patient_id::text = $1
            ORDER BY recorded_at DESC LIMIT 10
            "#,
        )
        .bind(patient_id)
        .fetch_all(&self.pool)
        .await?;

        let medications = sqlx::query_as::<_, Medication>(
            r#"
            SELECT name, dosage, frequency, started_at
            FROM medications WHERE patient_id::text = $1 AND active = true
            "#,
        )
        .bind(patient_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(PatientChart { patient, encounters, allergies, vitals, medications })
    }
}
