//! Clinical record extraction tool.
//!
//! The patient in scope is fixed when the tool is built for a request; the
//! model cannot steer the lookup to another patient through arguments.

use std::sync::Arc;

use async_trait::async_trait;

use crate::records::{PatientChart, RecordStore};
use crate::tools::Tool;
use crate::types::AppResult;

pub struct PatientRecordsTool {
    records: Arc<dyn RecordStore>,
    patient_id: String,
}

impl PatientRecordsTool {
    pub fn new(records: Arc<dyn RecordStore>, patient_id: &str) -> Self {
        Self { records, patient_id: patient_id.to_string() }
    }
}

pub fn render_chart(chart: &PatientChart) -> String {
    let mut out = String::new();
    let patient = &chart.patient;
    out.push_str("PATIENT\n");
    if let Some(name) = &patient.name {
        out.push_str(&format!("Name: {name}\n"));
    }
    if let Some(dob) = &patient.date_of_birth {
        out.push_str(&format!("Date of birth: {dob}\n"));
    }
    if let Some(gender) = &patient.gender {
        out.push_str(&format!("Gender: {gender}\n"));
    }

    out.push_str("\nENCOUNTERS\n");
    if chart.encounters.is_empty() {
        out.push_str("None on record.\n");
    }
    for e in &chart.encounters {
        let when = e
            .occurred_at
            .map(|t| t.format("%Y-%m-%d").to_string())
            .unwrap_or_else(|| "unknown date".to_string());
        out.push_str(&format!(
            "- {when}: {} | diagnosis: {} | {}\n",
            e.reason.as_deref().unwrap_or("unspecified"),
            e.diagnosis.as_deref().unwrap_or("none recorded"),
            e.notes.as_deref().unwrap_or(""),
        ));
    }

    out.push_str("\nALLERGIES\n");
    if chart.allergies.is_empty() {
        out.push_str("No known allergies.\n");
    }
    for a in &chart.allergies {
        out.push_str(&format!(
            "- {} (reaction: {}, severity: {})\n",
            a.substance.as_deref().unwrap_or("unknown substance"),
            a.reaction.as_deref().unwrap_or("unknown"),
            a.severity.as_deref().unwrap_or("unknown"),
        ));
    }

    out.push_str("\nVITALS\n");
    for v in &chart.vitals {
        let when = v
            .recorded_at
            .map(|t| t.format("%Y-%m-%d").to_string())
            .unwrap_or_else(|| "unknown date".to_string());
        out.push_str(&format!("- {when}:"));
        if let Some(bp) = &v.blood_pressure {
            out.push_str(&format!(" BP {bp}"));
        }
        if let Some(hr) = v.heart_rate {
            out.push_str(&format!(" HR {hr}"));
        }
        if let Some(t) = v.temperature_c {
            out.push_str(&format!(" Temp {t}C"));
        }
        if let Some(w) = v.weight_kg {
            out.push_str(&format!(" Weight {w}kg"));
        }
        out.push('\n');
    }

    out.push_str("\nACTIVE MEDICATIONS\n");
    if chart.medications.is_empty() {
        out.push_str("None on record.\n");
    }
    for m in &chart.medications {
        out.push_str(&format!(
            "- {} {} {}\n",
            m.name.as_deref().unwrap_or("unknown"),
            m.dosage.as_deref().unwrap_or(""),
            m.frequency.as_deref().unwrap_or(""),
        ));
    }
    out
}

#[async_trait]
impl Tool for PatientRecordsTool {
    fn name(&self) -> &str {
        "patient_records"
    }

    fn description(&self) -> &str {
        "Returns the current patient's chart: encounters, allergies, vitals and active medications."
    }

    fn parameters(&self) -> serde_json::Value {
        serde_json::json!({ "type": "object", "properties": {} })
    }

    async fn call(&self, _arguments: &str) -> AppResult<String> {
        let chart = self.records.fetch_chart(&self.patient_id).await?;
        Ok(render_chart(&chart))
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::{sample_chart, MapRecordStore};
    use super::*;

    #[tokio::test]
    async fn chart_lookup_is_pinned_to_the_bound_patient() {
        let mut store = MapRecordStore::default();
        store
            .charts
            .insert("p1".into(), sample_chart("p1", "Ada", "lisinopril"));
        store
            .charts
            .insert("p2".into(), sample_chart("p2", "Grace", "metformin"));

        let tool = PatientRecordsTool::new(Arc::new(store), "p1");
        // Arguments naming another patient are ignored.
        let out = tool.call(r#"{"patient_id":"p2"}"#).await.unwrap();
        assert!(out.contains("Ada"));
        assert!(out.contains("lisinopril"));
        assert!(!out.contains("Grace"));
        assert!(!out.contains("metformin"));
    }

    #[tokio::test]
    async fn unknown_patient_is_a_not_found_error() {
        let tool = PatientRecordsTool::new(Arc::new(MapRecordStore::default()), "ghost");
        let err = tool.call("{}").await.unwrap_err();
        assert!(matches!(err, crate::types::AppError::NotFound(_)));
    }

    #[test]
    fn rendering_covers_every_section() {
        let text = render_chart(&sample_chart("p1", "Ada", "lisinopril"));
        for heading in ["PATIENT", "ENCOUNTERS", "ALLERGIES", "VITALS", "ACTIVE MEDICATIONS"] {
            assert!(text.contains(heading), "missing section {heading}");
        }
        assert!(text.contains("penicillin"));
    }
}
