use crate::core::layout::layout_ticket;
use crate::core::parser::parse_bytes;
use crate::core::renderer::render_pdf;
use crate::core::{ConfigProvider, Pipeline, RenderedDocument, SourceTicket, Storage};
use crate::utils::error::{Result, TicketError};
use std::path::Path;

/// Keeps characters that are safe in a file name.
fn sanitize(value: &str) -> String {
    value
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') { c } else { '_' })
        .collect()
}

/// Expands `{stem}` and `{number}` in the output file name template.
pub fn output_file_name(template: &str, stem: &str, number: Option<&str>) -> String {
    let stem = sanitize(stem);
    let number = number
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .map(sanitize)
        .unwrap_or_else(|| stem.clone());
    template.replace("{stem}", &stem).replace("{number}", &number)
}

fn json_name(file_name: &str) -> String {
    Path::new(file_name)
        .with_extension("json")
        .to_string_lossy()
        .into_owned()
}

pub struct TicketPipeline<S: Storage, C: ConfigProvider> {
    storage: S,
    config: C,
}

impl<S: Storage, C: ConfigProvider> TicketPipeline<S, C> {
    pub fn new(storage: S, config: C) -> Self {
        Self { storage, config }
    }
}

#[async_trait::async_trait]
impl<S: Storage, C: ConfigProvider> Pipeline for TicketPipeline<S, C> {
    async fn extract(&self, source: &str) -> Result<SourceTicket> {
        tracing::debug!("Reading ticket: {}", source);
        let bytes = self.storage.read_file(source).await?;
        let record = parse_bytes(&bytes, self.config.delimiter())?;

        // output names fall back to the input's stem
        let stem = Path::new(source)
            .file_stem()
            .and_then(|s| s.to_str())
            .filter(|s| !s.is_empty())
            .unwrap_or("ticket")
            .to_string();

        Ok(SourceTicket {
            source: source.to_string(),
            stem,
            record,
        })
    }

    async fn transform(&self, ticket: SourceTicket) -> Result<RenderedDocument> {
        let options = self.config.render_options().clone();
        // name the output before the record moves into the render task
        let file_name = output_file_name(
            self.config.filename_template(),
            &ticket.stem,
            ticket.record.ticket_number(&options.number_field),
        );

        // layout and serialization are CPU-bound
        let (record, pdf, page_count) = tokio::task::spawn_blocking(move || {
            let layout = layout_ticket(&ticket.record, &options);
            let created = ticket.record.date(&options.date_field);
            let pdf = render_pdf(&layout, &options, created)?;
            Ok::<_, TicketError>((ticket.record, pdf, layout.pages.len()))
        })
        .await
        .map_err(|e| TicketError::TaskError {
            message: e.to_string(),
        })??;

        tracing::debug!("Rendered {} into {} page(s)", file_name, page_count);
        Ok(RenderedDocument {
            source: ticket.source,
            file_name,
            pdf,
            page_count,
            record,
        })
    }

    async fn load(&self, document: RenderedDocument) -> Result<String> {
        // parsed ticket as JSON, next to the PDF
        if self.config.dump_json() {
            let json = serde_json::to_vec_pretty(&document.record)?;
            let path = self
                .storage
                .write_file(&json_name(&document.file_name), &json)
                .await?;
            tracing::debug!("Wrote parsed ticket to {}", path);
        }

        // PDF
        tracing::debug!(
            "Writing {} ({} bytes) to storage",
            document.file_name,
            document.pdf.len()
        );
        self.storage.write_file(&document.file_name, &document.pdf).await
    }
}
