// LaTeX renderer for treatment plans.

use crate::treatment::{PlanRenderer, RenderedPlan, TreatmentPlan};
use crate::types::AppResult;

pub struct LatexRenderer;

/// Escape the characters LaTeX treats specially in running text.
pub fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '\\' => out.push_str(r"\textbackslash{}"),
            '&' | '%' | '$' | '#' | '_' | '{' | '}' => {
                out.push('\\');
                out.push(c);
            }
            '~' => out.push_str(r"\textasciitilde{}"),
            '^' => out.push_str(r"\textasciicircum{}"),
            _ => out.push(c),
        }
    }
    out
}

fn itemize(items: Vec<String>) -> String {
    if items.is_empty() {
        return "None on record.\n".to_string();
    }
    let mut out = String::from("\\begin{itemize}\n");
    for item in items {
        out.push_str(&format!("  \\item {}\n", escape(&item)));
    }
    out.push_str("\\end{itemize}\n");
    out
}

impl PlanRenderer for LatexRenderer {
    fn render(&self, plan: &TreatmentPlan) -> AppResult<RenderedPlan> {
        let chart = &plan.chart;
        let patient_name = chart.patient.name.as_deref().unwrap_or("Unknown patient");

        let encounters = chart
            .encounters
            .iter()
            .map(|e| {
                format!(
                    "{}: {}",
                    e.occurred_at
                        .map(|t| t.format("%Y-%m-%d").to_string())
                        .unwrap_or_else(|| "unknown date".to_string()),
                    e.diagnosis
                        .as_deref()
                        .or(e.reason.as_deref())
                        .unwrap_or("unspecified"),
                )
            })
            .collect();
        let allergies = chart
            .allergies
            .iter()
            .map(|a| {
                format!(
                    "{} ({})",
                    a.substance.as_deref().unwrap_or("unknown substance"),
                    a.severity.as_deref().unwrap_or("unknown severity"),
                )
            })
            .collect();
        let medications = chart
            .medications
            .iter()
            .map(|m| {
                format!(
                    "{} {} {}",
                    m.name.as_deref().unwrap_or("unknown"),
                    m.dosage.as_deref().unwrap_or(""),
                    m.frequency.as_deref().unwrap_or(""),
                )
            })
            .collect();

        let body = format!(
            "\\documentclass{{article}}\n\
             \\usepackage[utf8]{{inputenc}}\n\
             \\title{{Treatment Plan {reference}}}\n\
             \\author{{{doctor} ({doctor_id}), organization {organization}}}\n\
             \\begin{{document}}\n\
             \\maketitle\n\
             \\section*{{Patient}}\n{patient}\n\n\
             \\section*{{Recent encounters}}\n{encounters}\n\
             \\section*{{Allergies}}\n{allergies}\n\
             \\section*{{Current medications}}\n{medications}\n\
             \\section*{{Plan}}\n\
             To be completed by {doctor}. Document language: {language}.\n\
             \\end{{document}}\n",
            reference = escape(&plan.reference_number),
            doctor = escape(&plan.doctor_name),
            doctor_id = escape(&plan.doctor_id),
            organization = escape(&plan.organization_id),
            patient = escape(patient_name),
            encounters = itemize(encounters),
            allergies = itemize(allergies),
            medications = itemize(medications),
            language = escape(&plan.language),
        );

        Ok(RenderedPlan {
            file_name: format!("treatment-plan-{}.tex", plan.reference_number),
            content_type: "application/x-tex".to_string(),
            bytes: body.into_bytes(),
        })
    }
}
