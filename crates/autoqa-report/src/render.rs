//! Renders a single `ReportData` into html, pdf, or json, in the shape of
//! `riptide-streaming`'s `ReportGenerator`: one `Handlebars` registry built
//! once, reused across renders. Chart generation is dropped entirely (no
//! chart crate in this workspace); pdf output is a minimal single-page
//! document built directly with `lopdf` rather than through a templating
//! layer.

use crate::data::ReportData;
use handlebars::Handlebars;
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, Stream};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportFormat {
    Html,
    Pdf,
    Json,
}

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("template error: {0}")]
    Template(#[from] handlebars::RenderError),
    #[error("json serialization error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("pdf assembly error: {0}")]
    Pdf(String),
}

const MAIN_TEMPLATE: &str = r#"
<!doctype html>
<html>
<head><title>Execution {{execution_id}}</title></head>
<body>
  <h1>Execution {{execution_id}}</h1>
  <p>Status: {{execution_summary.status}}</p>
  <p>Steps: {{execution_summary.completed_steps}}/{{execution_summary.total_steps}}</p>
  <h2>Timeline</h2>
  <ul>
    {{#each timeline}}
    <li>{{this.timestamp}} - {{this.label}}</li>
    {{/each}}
  </ul>
  <h2>Artifacts</h2>
  <ul>
    {{#each artifacts}}
    <li>{{this.kind}}: {{this.blob_key}}</li>
    {{/each}}
  </ul>
</body>
</html>
"#;

pub struct ReportRenderer {
    handlebars: Handlebars<'static>,
}

impl ReportRenderer {
    pub fn new() -> Self {
        let mut handlebars = Handlebars::new();
        handlebars
            .register_template_string("main", MAIN_TEMPLATE)
            .expect("built-in report template is malformed");
        Self { handlebars }
    }

    pub fn render(&self, data: &ReportData, format: ReportFormat) -> Result<Vec<u8>, RenderError> {
        match format {
            ReportFormat::Html => self.render_html(data),
            ReportFormat::Json => self.render_json(data),
            ReportFormat::Pdf => self.render_pdf(data),
        }
    }

    fn render_html(&self, data: &ReportData) -> Result<Vec<u8>, RenderError> {
        let html = self.handlebars.render("main", data)?;
        Ok(html.into_bytes())
    }

    fn render_json(&self, data: &ReportData) -> Result<Vec<u8>, RenderError> {
        Ok(serde_json::to_vec_pretty(data)?)
    }

    fn render_pdf(&self, data: &ReportData) -> Result<Vec<u8>, RenderError> {
        let mut lines = vec![
            format!("Execution {}", data.execution_id),
            format!("Status: {:?}", data.execution_summary.status),
            format!(
                "Steps: {}/{}",
                data.execution_summary.completed_steps, data.execution_summary.total_steps
            ),
            "Timeline:".to_string(),
        ];
        for event in &data.timeline {
            lines.push(format!("  {} - {}", event.timestamp, event.label));
        }
        lines.push("Artifacts:".to_string());
        for artifact in &data.artifacts {
            lines.push(format!("  {:?}: {}", artifact.kind, artifact.blob_key));
        }

        build_single_page_pdf(&lines).map_err(RenderError::Pdf)
    }
}

impl Default for ReportRenderer {
    fn default() -> Self {
        Self::new()
    }
}

fn build_single_page_pdf(lines: &[String]) -> Result<Vec<u8>, String> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();

    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! { "F1" => font_id },
    });

    let mut operations = vec![
        Operation::new("BT", vec![]),
        Operation::new("Tf", vec!["F1".into(), 12.into()]),
        Operation::new("Td", vec![72.into(), 760.into()]),
    ];
    for line in lines {
        let sanitized = line.replace(['(', ')', '\\'], "");
        operations.push(Operation::new("Tj", vec![Object::string_literal(sanitized)]));
        operations.push(Operation::new("Td", vec![0.into(), (-16).into()]));
    }
    operations.push(Operation::new("ET", vec![]));

    let content = Content { operations };
    let content_bytes = content.encode().map_err(|e| e.to_string())?;
    let content_id = doc.add_object(Stream::new(dictionary! {}, content_bytes));

    let page_id = doc.add_object(dictionary! {
        "Type" => "Page",
        "Parent" => pages_id,
        "Contents" => content_id,
        "Resources" => resources_id,
    });
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => vec![page_id.into()],
            "Count" => 1,
            "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut bytes = Vec::new();
    doc.save_to(&mut bytes).map_err(|e| e.to_string())?;
    Ok(bytes)
}
