//! Treatment plan documents.
//!
//! A plan is assembled from the patient's chart plus the requesting
//! clinician's details, then rendered into a downloadable LaTeX document.
//! Rendering sits behind a trait; compiling LaTeX to PDF happens outside
//! this service.

pub mod latex;

pub use latex::LatexRenderer;

use std::sync::Arc;

use crate::models::TreatmentPlanRequest;
use crate::records::{PatientChart, RecordStore};
use crate::types::AppResult;

#[derive(Debug, Clone)]
pub struct TreatmentPlan {
    pub chart: PatientChart,
    pub doctor_name: String,
    pub doctor_id: String,
    pub organization_id: String,
    pub reference_number: String,
    pub language: String,
}

/// A rendered plan ready to be sent as an attachment.
#[derive(Debug, Clone)]
pub struct RenderedPlan {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

pub trait PlanRenderer: Send + Sync {
    fn render(&self, plan: &TreatmentPlan) -> AppResult<RenderedPlan>;
}

/// Fetch the chart and assemble the plan for one request.
pub async fn build_plan(
    records: &Arc<dyn RecordStore>,
    request: &TreatmentPlanRequest,
) -> AppResult<TreatmentPlan> {
    let chart = records.fetch_chart(&request.patient_id).await?;
    Ok(TreatmentPlan {
        chart,
        doctor_name: request.doctor_name.clone(),
        doctor_id: request.doctor_id.clone(),
        organization_id: request.organization_id.clone(),
        reference_number: request.reference_number.clone(),
        language: request
            .language
            .clone()
            .filter(|l| !l.is_empty())
            .unwrap_or_else(|| "en".to_string()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::patient_records::test_support::{sample_chart, MapRecordStore};
    use crate::types::AppError;

    fn request(patient_id: &str) -> TreatmentPlanRequest {
        TreatmentPlanRequest {
            patient_id: patient_id.to_string(),
            doctor_name: "Dr. Osei".to_string(),
            doctor_id: "d-9".to_string(),
            organization_id: "org-1".to_string(),
            reference_number: "TP-2024-001".to_string(),
            language: None,
        }
    }

    #[tokio::test]
    async fn plan_carries_chart_and_clinician_details() {
        let mut store = MapRecordStore::default();
        store
            .charts
            .insert("p1".into(), sample_chart("p1", "Ada", "lisinopril"));
        let records: Arc<dyn RecordStore> = Arc::new(store);

        let plan = build_plan(&records, &request("p1")).await.unwrap();
        assert_eq!(plan.chart.patient.name.as_deref(), Some("Ada"));
        assert_eq!(plan.doctor_name, "Dr. Osei");
        assert_eq!(plan.language, "en");
    }

    #[tokio::test]
    async fn unknown_patient_fails_plan_assembly() {
        let records: Arc<dyn RecordStore> = Arc::new(MapRecordStore::default());
        let err = build_plan(&records, &request("ghost")).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }
}
