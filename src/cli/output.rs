use serde::Serialize;

use crate::models::{IngestReport, OutputFormat};

pub trait Formatter {
    fn format_report(&self, report: &IngestReport) -> String;
    fn format_status(&self, status: &StatusInfo) -> String;
    fn format_message(&self, message: &str) -> String;
    fn format_error(&self, error: &str) -> String;
}

#[derive(Debug, Clone, Serialize)]
pub struct StatusInfo {
    pub embedding_url: String,
    pub embedding_connected: bool,
    /// Models the endpoint reports serving.
    pub embedding_models: Vec<String>,
    pub vector_store_url: String,
    pub vector_store_connected: bool,
    pub collection: String,
    /// `None` when the collection does not exist yet.
    pub collection_points: Option<u64>,
}

fn connected(flag: bool) -> &'static str {
    if flag { "[CONNECTED]" } else { "[DISCONNECTED]" }
}

pub struct TextFormatter;

impl Formatter for TextFormatter {
    fn format_report(&self, report: &IngestReport) -> String {
        let secs = report.duration_ms as f64 / 1000.0;
        let rate = |count: u64| if secs > 0.0 { count as f64 / secs } else { 0.0 };

        let mut lines = vec![
            if report.interrupted {
                "Ingestion Interrupted".to_string()
            } else {
                "Ingestion Complete".to_string()
            },
            "------------------".to_string(),
            format!(
                "Files:         {} processed, {} failed",
                report.files_processed, report.files_failed
            ),
            format!(
                "Documents:     {} ({} skipped)",
                report.documents, report.documents_skipped
            ),
            format!("Characters:    {}", report.chars),
            format!("Chunks:        {}", report.chunks),
        ];
        if report.oversize_chunks > 0 {
            lines.push(format!("  Oversize:    {}", report.oversize_chunks));
        }
        lines.push(format!(
            "Batches:       {} ({} dropped)",
            report.batches, report.batches_dropped
        ));
        lines.push(format!(
            "Points:        {} upserted, {} dropped",
            report.points_upserted, report.points_dropped
        ));
        lines.push(format!(
            "Duration:      {:.1}s ({:.1} records/s, {:.0} chars/s)",
            secs,
            rate(report.documents),
            rate(report.chars)
        ));

        let mut output = lines.join("\n");
        output.push('\n');
        output
    }

    fn format_status(&self, status: &StatusInfo) -> String {
        let mut lines = vec![
            "Status".to_string(),
            "------".to_string(),
            format!(
                "Embedding:     {} {}",
                status.embedding_url,
                connected(status.embedding_connected)
            ),
        ];
        if !status.embedding_models.is_empty() {
            lines.push(format!("  Models:      {}", status.embedding_models.join(", ")));
        }
        lines.push(format!(
            "Vector Store:  {} {}",
            status.vector_store_url,
            connected(status.vector_store_connected)
        ));
        if status.vector_store_connected {
            lines.push(format!("  Collection:  {}", status.collection));
            lines.push(match status.collection_points {
                Some(points) => format!("  Points:      {}", points),
                None => "  Points:      (collection missing)".to_string(),
            });
        }

        let mut output = lines.join("\n");
        output.push('\n');
        output
    }

    fn format_message(&self, message: &str) -> String {
        message.to_string()
    }

    fn format_error(&self, error: &str) -> String {
        format!("Error: {}", error)
    }
}

pub struct JsonFormatter {
    pub pretty: bool,
}

impl JsonFormatter {
    pub fn new(pretty: bool) -> Self {
        Self { pretty }
    }

    fn render<T: Serialize>(&self, value: &T) -> String {
        let rendered = if self.pretty {
            serde_json::to_string_pretty(value)
        } else {
            serde_json::to_string(value)
        };
        rendered.unwrap_or_else(|e| serde_json::json!({ "error": e.to_string() }).to_string())
    }
}

impl Formatter for JsonFormatter {
    fn format_report(&self, report: &IngestReport) -> String {
        format!("{}\n", self.render(report))
    }

    fn format_status(&self, status: &StatusInfo) -> String {
        format!("{}\n", self.render(status))
    }

    fn format_message(&self, message: &str) -> String {
        serde_json::json!({ "message": message }).to_string()
    }

    fn format_error(&self, error: &str) -> String {
        serde_json::json!({ "error": error }).to_string()
    }
}

pub fn get_formatter(format: OutputFormat) -> Box<dyn Formatter> {
    match format {
        OutputFormat::Text => Box::new(TextFormatter),
        OutputFormat::Json => Box::new(JsonFormatter::new(true)),
    }
}

/// Render a command failure, including its context chain.
pub fn render_error(format: OutputFormat, error: &anyhow::Error) -> String {
    get_formatter(format).format_error(&format!("{error:#}"))
}
