//! Reader for the plain-text RHPro ticket format.
//!
//! ```text
//! [ticket]
//! Number: 10452
//! Date = 2021-03-04 14:22
//!
//! [items]
//! code,description,quantity,unit_price
//! A100,Developer replenisher,2,14.50
//!
//! [notes]
//! Deliver before noon.
//! ```
//!
//! Fields before the first section header land in the `ticket` group.

use crate::domain::model::{Field, LineItems, TicketRecord, DEFAULT_GROUP};
use crate::utils::error::{Result, TicketError};

enum Section {
    Fields(String),
    Items,
    Notes,
}

fn section_for(name: &str) -> Section {
    match name.trim().to_lowercase().as_str() {
        "items" | "lines" | "line items" | "lineitems" => Section::Items,
        "notes" | "comments" => Section::Notes,
        _ => Section::Fields(name.trim().to_string()),
    }
}

fn is_comment(line: &str) -> bool {
    line.starts_with('#') || line.starts_with(';')
}

fn split_field(line: &str) -> Option<(&str, &str)> {
    let at = line.find([':', '='])?;
    Some((line[..at].trim(), line[at + 1..].trim()))
}

/// Decodes raw file bytes, reporting the line of the first invalid UTF-8 sequence.
pub fn parse_bytes(bytes: &[u8], delimiter: u8) -> Result<TicketRecord> {
    match std::str::from_utf8(bytes) {
        Ok(text) => parse_ticket(text, delimiter),
        Err(e) => {
            let line = bytes[..e.valid_up_to()].iter().filter(|b| **b == b'\n').count() + 1;
            Err(TicketError::parse(line, "file is not valid UTF-8"))
        }
    }
}

pub fn parse_ticket(input: &str, delimiter: u8) -> Result<TicketRecord> {
    let input = input.strip_prefix('\u{feff}').unwrap_or(input);

    let mut record = TicketRecord::default();
    let mut section = Section::Fields(DEFAULT_GROUP.to_string());
    let mut item_lines: Vec<(usize, &str)> = Vec::new();
    let mut seen_items = false;

    for (index, raw) in input.lines().enumerate() {
        let line_no = index + 1;
        let line = raw.trim();

        if line.starts_with('[') && line.ends_with(']') && line.len() >= 2 {
            let name = &line[1..line.len() - 1];
            if name.trim().is_empty() {
                return Err(TicketError::parse(line_no, "section name is empty"));
            }
            section = section_for(name);
            match &section {
                Section::Items if seen_items => {
                    return Err(TicketError::parse(line_no, "second [items] section"));
                }
                Section::Items => seen_items = true,
                Section::Fields(group) => {
                    record.group_mut(group);
                }
                Section::Notes => {}
            }
            continue;
        }

        if is_comment(line) {
            continue;
        }

        match &section {
            Section::Notes => record.notes.push(raw.trim_end().to_string()),
            _ if line.is_empty() => {}
            Section::Items => item_lines.push((line_no, line)),
            Section::Fields(group) => {
                let (name, value) = split_field(line).ok_or_else(|| {
                    TicketError::parse(line_no, "expected 'key: value' or 'key = value'")
                })?;
                if name.is_empty() {
                    return Err(TicketError::parse(line_no, "field name is empty"));
                }
                record.group_mut(group).fields.push(Field {
                    name: name.to_string(),
                    value: value.to_string(),
                });
            }
        }
    }

    trim_blank_edges(&mut record.notes);
    record.groups.retain(|g| !g.fields.is_empty());
    record.items = parse_items(&item_lines, delimiter)?;

    if record.is_empty() {
        return Err(TicketError::EmptyTicket);
    }

    tracing::debug!(
        groups = record.groups.len(),
        items = record.items.as_ref().map_or(0, |t| t.rows.len()),
        notes = record.notes.len(),
        "Parsed ticket"
    );
    Ok(record)
}

fn trim_blank_edges(lines: &mut Vec<String>) {
    while lines.last().is_some_and(|l| l.trim().is_empty()) {
        lines.pop();
    }
    let leading = lines.iter().take_while(|l| l.trim().is_empty()).count();
    lines.drain(..leading);
}

fn parse_items(lines: &[(usize, &str)], delimiter: u8) -> Result<Option<LineItems>> {
    if lines.is_empty() {
        return Ok(None);
    }

    let joined = lines.iter().map(|(_, l)| *l).collect::<Vec<_>>().join("\n");
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(false)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(joined.as_bytes());

    let mut columns: Option<Vec<String>> = None;
    let mut rows = Vec::new();

    for (index, result) in reader.records().enumerate() {
        let row = result?;
        let source_line = row
            .position()
            .and_then(|p| lines.get(p.line() as usize - 1))
            .or_else(|| lines.get(index))
            .map_or(0, |(n, _)| *n);
        let cells: Vec<String> = row.iter().map(str::to_string).collect();

        match &columns {
            None => {
                if cells.iter().any(|c| c.is_empty()) {
                    return Err(TicketError::parse(source_line, "item table header has an empty column name"));
                }
                columns = Some(cells);
            }
            Some(header) if header.len() != cells.len() => {
                return Err(TicketError::parse(
                    source_line,
                    format!("item row has {} cells, header has {}", cells.len(), header.len()),
                ));
            }
            Some(_) => rows.push(cells),
        }
    }

    Ok(columns.map(|columns| LineItems { columns, rows }))
}
