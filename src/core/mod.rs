pub mod batch;
pub mod engine;
pub mod layout;
pub mod parser;
pub mod pipeline;
pub mod renderer;

pub use crate::domain::model::{
    ConversionReport, RenderedDocument, SourceTicket, TicketRecord,
};
pub use crate::domain::ports::{ConfigProvider, Pipeline, Storage};
pub use crate::utils::error::Result;
