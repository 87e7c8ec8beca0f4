pub mod cli;
pub mod toml_config;

use crate::core::ConfigProvider;
use crate::utils::error::Result;
use crate::utils::validation::{self, Validate};
use serde::{Deserialize, Serialize};

pub const POINTS_PER_MM: f32 = 72.0 / 25.4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[cfg_attr(feature = "cli", derive(clap::ValueEnum))]
pub enum PageSize {
    #[default]
    A4,
    Letter,
}

impl PageSize {
    /// Width and height in points.
    pub fn dimensions(self) -> (f32, f32) {
        match self {
            PageSize::A4 => (595.28, 841.89),
            PageSize::Letter => (612.0, 792.0),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RenderOptions {
    pub page_size: PageSize,
    pub margin_mm: f32,
    /// Title template; `{number}` is replaced by the ticket number.
    pub title: String,
    pub title_size: f32,
    pub body_size: f32,
    pub footer_text: Option<String>,
    pub number_field: String,
    pub date_field: String,
    pub compress: bool,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            page_size: PageSize::A4,
            margin_mm: 15.0,
            title: "Ticket {number}".to_string(),
            title_size: 16.0,
            body_size: 10.0,
            footer_text: None,
            number_field: "number".to_string(),
            date_field: "date".to_string(),
            compress: true,
        }
    }
}

impl RenderOptions {
    pub fn margin_pt(&self) -> f32 {
        self.margin_mm * POINTS_PER_MM
    }
}

/// Resolved settings: defaults, then the TOML file, then command-line flags.
#[derive(Debug, Clone)]
pub struct Settings {
    pub output_dir: String,
    /// Output name template; `{stem}` is the input file stem, `{number}` the ticket number.
    pub filename: String,
    pub delimiter: u8,
    pub render: RenderOptions,
    pub concurrency: usize,
    pub archive: Option<String>,
    pub dump_json: bool,
    pub log_level: Option<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            output_dir: ".".to_string(),
            filename: "{stem}.pdf".to_string(),
            delimiter: b',',
            render: RenderOptions::default(),
            concurrency: 4,
            archive: None,
            dump_json: false,
            log_level: None,
        }
    }
}

impl Settings {
    /// Creates the output directory when it is missing.
    pub fn ensure_output_dir(&self) -> Result<()> {
        std::fs::create_dir_all(&self.output_dir)?;
        Ok(())
    }
}

impl Validate for Settings {
    fn validate(&self) -> Result<()> {
        validation::validate_path("output.dir", &self.output_dir)?;
        validation::validate_positive_number("output.concurrency", self.concurrency, 1)?;
        validation::validate_extension("output.filename", &self.filename, "pdf")?;
        if let Some(archive) = &self.archive {
            validation::validate_extension("output.archive", archive, "zip")?;
        }

        let render = &self.render;
        validation::validate_non_empty_string("text.title", &render.title)?;
        validation::validate_non_empty_string("fields.number", &render.number_field)?;
        validation::validate_non_empty_string("fields.date", &render.date_field)?;
        validation::validate_range("page.margin_mm", render.margin_mm, 0.0, 50.0)?;
        validation::validate_range("text.body_size", render.body_size, 6.0, 36.0)?;
        validation::validate_range("text.title_size", render.title_size, 6.0, 36.0)?;

        let (width, height) = render.page_size.dimensions();
        let margin = render.margin_pt() * 2.0;
        let min_line = render.body_size * 0.6 * 40.0;
        if width - margin < min_line || height - margin < render.body_size * 20.0 {
            return Err(crate::utils::error::TicketError::InvalidConfigValueError {
                field: "page.margin_mm".to_string(),
                value: render.margin_mm.to_string(),
                reason: "Margins leave too little room for text at this font size".to_string(),
            });
        }
        Ok(())
    }
}

impl ConfigProvider for Settings {
    fn output_dir(&self) -> &str {
        &self.output_dir
    }

    fn filename_template(&self) -> &str {
        &self.filename
    }

    fn delimiter(&self) -> u8 {
        self.delimiter
    }

    fn render_options(&self) -> &RenderOptions {
        &self.render
    }

    fn concurrency(&self) -> usize {
        self.concurrency
    }

    fn archive(&self) -> Option<&str> {
        self.archive.as_deref()
    }

    fn dump_json(&self) -> bool {
        self.dump_json
    }
}

#[cfg(feature = "cli")]
pub use cli_args::CliConfig;

#[cfg(feature = "cli")]
mod cli_args {
    use super::{PageSize, Settings};
    use crate::config::toml_config::TomlConfig;
    use crate::utils::error::Result;
    use crate::utils::validation;
    use clap::Parser;

    #[derive(Debug, Clone, Parser)]
    #[command(name = "ticket-to-pdf", version)]
    #[command(about = "Produces a pdf of an RHPro ticket file")]
    pub struct CliConfig {
        /// Ticket files to convert
        #[arg(required = true)]
        pub inputs: Vec<String>,

        /// Directory the PDFs are written to
        #[arg(short, long)]
        pub output_dir: Option<String>,

        /// TOML configuration file
        #[arg(short, long)]
        pub config: Option<String>,

        #[arg(long, value_enum)]
        pub page_size: Option<PageSize>,

        /// Item table delimiter: comma, semicolon, pipe or tab
        #[arg(long)]
        pub delimiter: Option<String>,

        /// Also pack the PDFs into this zip archive in the output directory
        #[arg(long)]
        pub archive: Option<String>,

        /// Tickets converted at the same time
        #[arg(short = 'j', long)]
        pub concurrency: Option<usize>,

        /// Write the parsed ticket next to the PDF as JSON
        #[arg(long)]
        pub dump_json: bool,

        #[arg(long, help = "Store page content uncompressed")]
        pub no_compress: bool,

        #[arg(long, help = "Log as JSON lines")]
        pub json_logs: bool,

        #[arg(short, long, help = "Enable verbose output")]
        pub verbose: bool,
    }

    impl CliConfig {
        pub fn settings(&self) -> Result<Settings> {
            let mut settings = Settings::default();
            if let Some(path) = &self.config {
                TomlConfig::from_file(path)?.apply_to(&mut settings)?;
            }

            if let Some(dir) = &self.output_dir {
                settings.output_dir = dir.clone();
            }
            if let Some(size) = self.page_size {
                settings.render.page_size = size;
            }
            if let Some(delimiter) = &self.delimiter {
                settings.delimiter = validation::validate_delimiter("--delimiter", delimiter)?;
            }
            if let Some(archive) = &self.archive {
                settings.archive = Some(archive.clone());
            }
            if let Some(concurrency) = self.concurrency {
                settings.concurrency = concurrency;
            }
            settings.dump_json |= self.dump_json;
            if self.no_compress {
                settings.render.compress = false;
            }
            Ok(settings)
        }
    }
}
