use crate::config::RenderOptions;
use crate::domain::model::{RenderedDocument, SourceTicket};
use crate::utils::error::Result;
use async_trait::async_trait;

pub trait Storage: Send + Sync {
    fn read_file(&self, path: &str) -> impl std::future::Future<Output = Result<Vec<u8>>> + Send;
    /// Writes `name` under the storage root and returns the full path.
    fn write_file(
        &self,
        name: &str,
        data: &[u8],
    ) -> impl std::future::Future<Output = Result<String>> + Send;
}

pub trait ConfigProvider: Send + Sync {
    fn output_dir(&self) -> &str;
    fn filename_template(&self) -> &str;
    fn delimiter(&self) -> u8;
    fn render_options(&self) -> &RenderOptions;
    fn concurrency(&self) -> usize;
    fn archive(&self) -> Option<&str>;
    fn dump_json(&self) -> bool;
}

#[async_trait]
pub trait Pipeline: Send + Sync {
    async fn extract(&self, source: &str) -> Result<SourceTicket>;
    async fn transform(&self, ticket: SourceTicket) -> Result<RenderedDocument>;
    async fn load(&self, document: RenderedDocument) -> Result<String>;
}
