use crate::core::{ConversionReport, Pipeline, RenderedDocument};
use crate::utils::error::Result;

pub struct ConversionEngine<P: Pipeline> {
    pipeline: P,
}

impl<P: Pipeline> ConversionEngine<P> {
    pub fn new(pipeline: P) -> Self {
        Self { pipeline }
    }

    pub fn pipeline(&self) -> &P {
        &self.pipeline
    }

    /// Extract and transform: everything short of writing output.
    pub async fn prepare(&self, source: &str) -> Result<RenderedDocument> {
        tracing::info!("Converting {}", source);
        let ticket = self.pipeline.extract(source).await?;
        tracing::debug!(
            "Extracted {} field group(s), {} item row(s), {} note line(s)",
            ticket.record.groups.len(),
            ticket.record.items.as_ref().map_or(0, |t| t.rows.len()),
            ticket.record.notes.len()
        );

        self.pipeline.transform(ticket).await
    }

    pub async fn store(&self, document: RenderedDocument) -> Result<ConversionReport> {
        let source = document.source.clone();
        let page_count = document.page_count;
        let bytes = document.pdf.len();

        let output_path = self.pipeline.load(document).await?;
        tracing::info!("Saved {} ({} page(s))", output_path, page_count);

        Ok(ConversionReport {
            source,
            output_path,
            page_count,
            bytes,
        })
    }

    pub async fn run(&self, source: &str) -> Result<ConversionReport> {
        let document = self.prepare(source).await?;
        self.store(document).await
    }
}
