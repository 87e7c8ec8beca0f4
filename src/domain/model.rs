use crate::domain::money::{parse_quantity, Money};
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

/// Name of the group that holds fields appearing before any section header.
pub const DEFAULT_GROUP: &str = "ticket";

const AMOUNT_COLUMNS: &[&str] = &["amount", "total", "linetotal", "extended"];
const QUANTITY_COLUMNS: &[&str] = &["quantity", "qty"];
const PRICE_COLUMNS: &[&str] = &["unitprice", "price", "rate"];

const DATE_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M:%S",
    "%m/%d/%Y %H:%M",
];
const DATE_ONLY_FORMATS: &[&str] = &["%Y-%m-%d", "%m/%d/%Y"];

/// Lowercases and drops `_`, `-` and spaces so `Unit Price` matches `unit_price`.
pub fn normalize_key(name: &str) -> String {
    name.chars()
        .filter(|c| !matches!(c, '_' | '-' | ' '))
        .flat_map(char::to_lowercase)
        .collect()
}

pub fn parse_ticket_date(value: &str) -> Option<NaiveDateTime> {
    let value = value.trim();
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(value, fmt).ok())
        .or_else(|| {
            DATE_ONLY_FORMATS
                .iter()
                .find_map(|fmt| NaiveDate::parse_from_str(value, fmt).ok())
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Field {
    pub name: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldGroup {
    pub name: String,
    pub fields: Vec<Field>,
}

impl FieldGroup {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fields: Vec::new(),
        }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        let key = normalize_key(name);
        self.fields
            .iter()
            .find(|f| normalize_key(&f.name) == key)
            .map(|f| f.value.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineItems {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl LineItems {
    pub fn column_index(&self, aliases: &[&str]) -> Option<usize> {
        self.columns
            .iter()
            .position(|c| aliases.contains(&normalize_key(c).as_str()))
    }

    /// A column is numeric when every non-empty cell parses as an amount.
    pub fn is_numeric_column(&self, index: usize) -> bool {
        let mut seen = false;
        for row in &self.rows {
            let cell = row[index].trim();
            if cell.is_empty() {
                continue;
            }
            if Money::parse(cell).is_err() && parse_quantity(cell).is_none() {
                return false;
            }
            seen = true;
        }
        seen
    }

    /// Amount of one row: an explicit amount column, else quantity × unit price.
    pub fn line_amount(&self, row: usize) -> Option<Money> {
        let cells = self.rows.get(row)?;
        if let Some(i) = self.column_index(AMOUNT_COLUMNS) {
            return Money::parse(&cells[i]).ok();
        }
        let qty = parse_quantity(&cells[self.column_index(QUANTITY_COLUMNS)?])?;
        let price = Money::parse(&cells[self.column_index(PRICE_COLUMNS)?]).ok()?;
        price.times(qty)
    }

    /// Sum of line amounts, only when every row has one and the sum fits.
    pub fn total(&self) -> Option<Money> {
        if self.rows.is_empty() {
            return None;
        }
        (0..self.rows.len()).try_fold(Money(0), |sum, i| sum.checked_add(self.line_amount(i)?))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TicketRecord {
    pub groups: Vec<FieldGroup>,
    pub items: Option<LineItems>,
    pub notes: Vec<String>,
}

impl TicketRecord {
    pub fn is_empty(&self) -> bool {
        self.groups.iter().all(|g| g.fields.is_empty())
            && self.items.is_none()
            && self.notes.is_empty()
    }

    /// First field with this name across all groups, in file order.
    pub fn field(&self, name: &str) -> Option<&str> {
        self.groups.iter().find_map(|g| g.get(name))
    }

    pub fn group(&self, name: &str) -> Option<&FieldGroup> {
        let key = normalize_key(name);
        self.groups.iter().find(|g| normalize_key(&g.name) == key)
    }

    pub fn group_mut(&mut self, name: &str) -> &mut FieldGroup {
        let key = normalize_key(name);
        match self.groups.iter().position(|g| normalize_key(&g.name) == key) {
            Some(i) => &mut self.groups[i],
            None => {
                self.groups.push(FieldGroup::new(name));
                let last = self.groups.len() - 1;
                &mut self.groups[last]
            }
        }
    }

    /// Value of the ticket-number field, when present and not blank.
    pub fn ticket_number(&self, field: &str) -> Option<&str> {
        self.field(field).map(str::trim).filter(|n| !n.is_empty())
    }

    pub fn date(&self, field: &str) -> Option<NaiveDateTime> {
        self.field(field).and_then(parse_ticket_date)
    }

    pub fn total(&self) -> Option<Money> {
        self.items.as_ref().and_then(LineItems::total)
    }
}

/// PDF bytes ready to be stored, with the record they were rendered from.
#[derive(Debug, Clone)]
pub struct RenderedDocument {
    pub source: String,
    pub file_name: String,
    pub pdf: Vec<u8>,
    pub page_count: usize,
    pub record: TicketRecord,
}

/// A parsed ticket together with where it came from.
#[derive(Debug, Clone)]
pub struct SourceTicket {
    pub source: String,
    pub stem: String,
    pub record: TicketRecord,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConversionReport {
    pub source: String,
    pub output_path: String,
    pub page_count: usize,
    pub bytes: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn items(columns: &[&str], rows: &[&[&str]]) -> LineItems {
        LineItems {
            columns: columns.iter().map(|c| c.to_string()).collect(),
            rows: rows
                .iter()
                .map(|r| r.iter().map(|c| c.to_string()).collect())
                .collect(),
        }
    }

    #[test]
    fn test_field_lookup_ignores_case_and_separators() {
        let mut record = TicketRecord::default();
        record.group_mut("Ticket").fields.push(Field {
            name: "Ticket Number".to_string(),
            value: "10452".to_string(),
        });
        assert_eq!(record.field("ticket_number"), Some("10452"));
        assert_eq!(record.field("TICKET-NUMBER"), Some("10452"));
        assert_eq!(record.field("number"), None);
        assert!(record.group("ticket").is_some());
    }

    #[test]
    fn test_group_mut_reuses_existing_group() {
        let mut record = TicketRecord::default();
        record.group_mut("customer");
        record.group_mut("Customer");
        assert_eq!(record.groups.len(), 1);
    }

    #[test]
    fn test_total_from_quantity_and_price() {
        let table = items(
            &["Code", "Qty", "Unit Price"],
            &[&["A1", "2", "14.50"], &["B2", "1.5", "3.33"]],
        );
        assert_eq!(table.line_amount(1), Some(Money(500)));
        assert_eq!(table.total(), Some(Money(3400)));
    }

    #[test]
    fn test_total_prefers_amount_column() {
        let table = items(&["qty", "price", "amount"], &[&["2", "1.00", "5.00"]]);
        assert_eq!(table.total(), Some(Money(500)));
    }

    #[test]
    fn test_total_missing_when_any_row_lacks_amount() {
        let table = items(&["qty", "price"], &[&["2", "1.00"], &["", "1.00"]]);
        assert_eq!(table.total(), None);
        let no_price = items(&["code", "description"], &[&["A1", "thing"]]);
        assert_eq!(no_price.total(), None);
    }

    #[test]
    fn test_total_uses_exact_quantity_arithmetic() {
        let table = items(&["qty", "price"], &[&["0.145", "1.00"], &["1.005", "1.00"]]);
        assert_eq!(table.line_amount(0), Some(Money(15)));
        assert_eq!(table.line_amount(1), Some(Money(101)));
        assert_eq!(table.total(), Some(Money(116)));
    }

    #[test]
    fn test_total_missing_on_overflow() {
        let huge = items(
            &["amount"],
            &[&["90000000000000000"], &["90000000000000000"]],
        );
        assert!(huge.line_amount(0).is_some());
        assert_eq!(huge.total(), None);

        let product = items(&["qty", "price"], &[&["1000000", "90000000000000"]]);
        assert_eq!(product.line_amount(0), None);
        assert_eq!(product.total(), None);
    }

    #[test]
    fn test_ticket_number_skips_blank_values() {
        let mut record = TicketRecord::default();
        record.group_mut("ticket").fields.push(Field {
            name: "Number".to_string(),
            value: " 10452 ".to_string(),
        });
        assert_eq!(record.ticket_number("number"), Some("10452"));
        assert_eq!(record.ticket_number("ticket_no"), None);

        record.group_mut("ticket").fields[0].value = "   ".to_string();
        assert_eq!(record.ticket_number("number"), None);
    }

    #[test]
    fn test_numeric_column_detection() {
        let table = items(&["code", "qty"], &[&["A1", "2"], &["B2", ""]]);
        assert!(!table.is_numeric_column(0));
        assert!(table.is_numeric_column(1));
    }

    #[test]
    fn test_parse_ticket_date_formats() {
        let dt = parse_ticket_date("2021-03-04 14:22").unwrap();
        assert_eq!(dt.to_string(), "2021-03-04 14:22:00");
        let midnight = parse_ticket_date("03/04/2021").unwrap();
        assert_eq!(midnight.to_string(), "2021-03-04 00:00:00");
        assert!(parse_ticket_date("next tuesday").is_none());
    }
}
