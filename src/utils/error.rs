use thiserror::Error;

#[derive(Error, Debug)]
pub enum TicketError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("PDF error: {0}")]
    PdfError(#[from] lopdf::Error),

    #[error("Line item table error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("Zip operation failed: {0}")]
    ZipError(#[from] zip::result::ZipError),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("Parse error on line {line}: {message}")]
    ParseError { line: usize, message: String },

    #[error("Ticket contains no fields, line items or notes")]
    EmptyTicket,

    #[error("Invalid amount '{value}': {reason}")]
    InvalidMoney { value: String, reason: String },

    #[error("Invalid value '{value}' for {field}: {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Render error: {message}")]
    RenderError { message: String },

    #[error("Background task failed: {message}")]
    TaskError { message: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Input,
    Configuration,
    Output,
    System,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl TicketError {
    pub fn parse(line: usize, message: impl Into<String>) -> Self {
        TicketError::ParseError {
            line,
            message: message.into(),
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            TicketError::ParseError { .. }
            | TicketError::EmptyTicket
            | TicketError::InvalidMoney { .. }
            | TicketError::CsvError(_) => ErrorCategory::Input,
            TicketError::InvalidConfigValueError { .. }
            | TicketError::ConfigError { .. }
            | TicketError::TomlError(_) => ErrorCategory::Configuration,
            TicketError::PdfError(_)
            | TicketError::ZipError(_)
            | TicketError::SerializationError(_)
            | TicketError::RenderError { .. } => ErrorCategory::Output,
            TicketError::IoError(_) | TicketError::TaskError { .. } => ErrorCategory::System,
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self.category() {
            ErrorCategory::Input | ErrorCategory::Configuration => ErrorSeverity::High,
            ErrorCategory::Output => ErrorSeverity::High,
            ErrorCategory::System => ErrorSeverity::Critical,
        }
    }

    /// Process exit code for a run that ended with this error.
    pub fn exit_code(&self) -> i32 {
        match self.category() {
            ErrorCategory::Configuration => 4,
            ErrorCategory::System => 3,
            ErrorCategory::Input | ErrorCategory::Output => 1,
        }
    }

    pub fn recovery_suggestion(&self) -> &'static str {
        match self {
            TicketError::IoError(_) => "Check that the input exists and the output directory is writable",
            TicketError::ParseError { .. } => {
                "Fix the reported line; fields are 'key: value' and sections are '[name]'"
            }
            TicketError::CsvError(_) => {
                "Check the [items] table delimiter and that every row matches the header"
            }
            TicketError::EmptyTicket => "Make sure the file is an RHPro ticket and not empty",
            TicketError::InvalidMoney { .. } => "Use plain amounts such as 14.50 or 1,204.00",
            TicketError::InvalidConfigValueError { .. }
            | TicketError::ConfigError { .. }
            | TicketError::TomlError(_) => "Review the configuration file and command-line flags",
            TicketError::PdfError(_) | TicketError::RenderError { .. } => {
                "Re-run with --verbose and report the ticket that triggered this"
            }
            TicketError::ZipError(_) => "Check free disk space and the --archive name",
            TicketError::SerializationError(_) => "Re-run without --dump-json",
            TicketError::TaskError { .. } => "Re-run with a lower --concurrency",
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self {
            TicketError::IoError(e) => format!("Could not read or write a file: {}", e),
            TicketError::ParseError { line, message } => {
                format!("The ticket could not be read (line {}): {}", line, message)
            }
            TicketError::EmptyTicket => "The ticket file has nothing to print".to_string(),
            TicketError::InvalidConfigValueError { field, reason, .. } => {
                format!("Setting '{}' is invalid: {}", field, reason)
            }
            other => other.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, TicketError>;
