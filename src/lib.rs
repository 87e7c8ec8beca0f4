//! Converts RHPro ticket files into PDF documents.
//!
//! A ticket is read by [`core::parser`] into a [`TicketRecord`], placed on
//! pages by [`core::layout`] and written out by [`core::renderer`].
//! [`TicketPipeline`] ties the three together over a [`core::Storage`], and
//! [`BatchRunner`] converts many tickets at once.

pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

pub use config::{cli::LocalStorage, PageSize, RenderOptions, Settings};

#[cfg(feature = "cli")]
pub use config::CliConfig;

pub use crate::core::{
    batch::{BatchOutcome, BatchRunner},
    engine::ConversionEngine,
    parser::parse_ticket,
    pipeline::TicketPipeline,
};
pub use domain::model::{ConversionReport, TicketRecord};
pub use utils::error::{Result, TicketError};
