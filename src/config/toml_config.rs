use crate::config::{PageSize, Settings};
use crate::utils::error::{Result, TicketError};
use crate::utils::validation;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::OnceLock;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TomlConfig {
    pub page: Option<PageConfig>,
    pub text: Option<TextConfig>,
    pub fields: Option<FieldsConfig>,
    pub parser: Option<ParserConfig>,
    pub output: Option<OutputConfig>,
    pub logging: Option<LoggingConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageConfig {
    pub size: Option<PageSize>,
    pub margin_mm: Option<f32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TextConfig {
    pub title: Option<String>,
    pub title_size: Option<f32>,
    pub body_size: Option<f32>,
    pub footer_text: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldsConfig {
    pub number: Option<String>,
    pub date: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParserConfig {
    pub delimiter: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    pub dir: Option<String>,
    pub filename: Option<String>,
    pub compress: Option<bool>,
    pub archive: Option<String>,
    pub concurrency: Option<usize>,
    pub dump_json: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: Option<String>,
}

impl TomlConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path).map_err(|e| TicketError::ConfigError {
            message: format!("cannot read {}: {}", path.as_ref().display(), e),
        })?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed = Self::substitute_env_vars(content);
        Ok(toml::from_str(&processed)?)
    }

    /// Replaces `${VAR}` with the environment value; unknown variables stay as written.
    fn substitute_env_vars(content: &str) -> String {
        static VAR: OnceLock<Regex> = OnceLock::new();
        let re = VAR.get_or_init(|| Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)\}").expect("valid regex"));

        re.replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
        })
        .into_owned()
    }

    /// Overlays every value present in the file onto `settings`.
    pub fn apply_to(self, settings: &mut Settings) -> Result<()> {
        if let Some(page) = self.page {
            if let Some(size) = page.size {
                settings.render.page_size = size;
            }
            if let Some(margin) = page.margin_mm {
                settings.render.margin_mm = margin;
            }
        }
        if let Some(text) = self.text {
            if let Some(title) = text.title {
                settings.render.title = title;
            }
            if let Some(size) = text.title_size {
                settings.render.title_size = size;
            }
            if let Some(size) = text.body_size {
                settings.render.body_size = size;
            }
            if text.footer_text.is_some() {
                settings.render.footer_text = text.footer_text;
            }
        }
        if let Some(fields) = self.fields {
            if let Some(number) = fields.number {
                settings.render.number_field = number;
            }
            if let Some(date) = fields.date {
                settings.render.date_field = date;
            }
        }
        if let Some(delimiter) = self.parser.and_then(|p| p.delimiter) {
            settings.delimiter = validation::validate_delimiter("parser.delimiter", &delimiter)?;
        }
        if let Some(output) = self.output {
            if let Some(dir) = output.dir {
                settings.output_dir = dir;
            }
            if let Some(filename) = output.filename {
                settings.filename = filename;
            }
            if let Some(compress) = output.compress {
                settings.render.compress = compress;
            }
            if output.archive.is_some() {
                settings.archive = output.archive;
            }
            if let Some(concurrency) = output.concurrency {
                settings.concurrency = concurrency;
            }
            if let Some(dump_json) = output.dump_json {
                settings.dump_json = dump_json;
            }
        }
        if let Some(level) = self.logging.and_then(|l| l.level) {
            settings.log_level = Some(level);
        }
        Ok(())
    }
}
