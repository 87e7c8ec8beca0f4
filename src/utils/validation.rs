use crate::utils::error::{Result, TicketError};

pub trait Validate {
    fn validate(&self) -> Result<()>;
}

pub fn validate_path(field_name: &str, path: &str) -> Result<()> {
    if path.is_empty() {
        return Err(TicketError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: path.to_string(),
            reason: "Path cannot be empty".to_string(),
        });
    }

    if path.contains('\0') {
        return Err(TicketError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: path.to_string(),
            reason: "Path contains null bytes".to_string(),
        });
    }

    Ok(())
}

pub fn validate_positive_number(field_name: &str, value: usize, min_value: usize) -> Result<()> {
    if value < min_value {
        return Err(TicketError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: value.to_string(),
            reason: format!("Value must be at least {}", min_value),
        });
    }
    Ok(())
}

pub fn validate_extension(field_name: &str, name: &str, extension: &str) -> Result<()> {
    let matches = std::path::Path::new(name)
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case(extension));

    if !matches {
        return Err(TicketError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: name.to_string(),
            reason: format!("File name must end in .{}", extension),
        });
    }
    Ok(())
}

/// Accepts the delimiter names understood by the `[items]` table reader.
pub fn validate_delimiter(field_name: &str, value: &str) -> Result<u8> {
    match value {
        "," | "comma" => Ok(b','),
        ";" | "semicolon" => Ok(b';'),
        "|" | "pipe" => Ok(b'|'),
        "\t" | "tab" => Ok(b'\t'),
        other => Err(TicketError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: other.to_string(),
            reason: "Delimiter must be one of: comma, semicolon, pipe, tab".to_string(),
        }),
    }
}

pub fn validate_non_empty_string(field_name: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(TicketError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: value.to_string(),
            reason: "Value cannot be empty or whitespace-only".to_string(),
        });
    }
    Ok(())
}

pub fn validate_range<T: PartialOrd + std::fmt::Display + Copy>(
    field_name: &str,
    value: T,
    min: T,
    max: T,
) -> Result<()> {
    if value < min || value > max {
        return Err(TicketError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: value.to_string(),
            reason: format!("Value must be between {} and {}", min, max),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_positive_number() {
        assert!(validate_positive_number("concurrency", 4, 1).is_ok());
        assert!(validate_positive_number("concurrency", 0, 1).is_err());
    }

    #[test]
    fn test_validate_extension() {
        assert!(validate_extension("archive", "tickets.zip", "zip").is_ok());
        assert!(validate_extension("archive", "TICKETS.ZIP", "zip").is_ok());
        assert!(validate_extension("archive", "tickets.tar", "zip").is_err());
        assert!(validate_extension("archive", "tickets", "zip").is_err());
    }

    #[test]
    fn test_validate_delimiter() {
        assert_eq!(validate_delimiter("delimiter", "tab").unwrap(), b'\t');
        assert_eq!(validate_delimiter("delimiter", "|").unwrap(), b'|');
        assert!(validate_delimiter("delimiter", ":").is_err());
    }

    #[test]
    fn test_validate_range() {
        assert!(validate_range("margin_mm", 15.0, 0.0, 50.0).is_ok());
        assert!(validate_range("margin_mm", 60.0, 0.0, 50.0).is_err());
    }
}
