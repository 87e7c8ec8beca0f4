//! Places a [`TicketRecord`] onto fixed-size pages.
//!
//! All text is set in Courier, so a line of `n` glyphs at size `s` is exactly
//! `n * 0.6 * s` points wide and wrapping can be done by character count.

use crate::config::RenderOptions;
use crate::domain::model::{FieldGroup, LineItems, TicketRecord};

pub const CHAR_WIDTH_EM: f32 = 0.6;
const LEADING: f32 = 1.3;
const COLUMN_GAP: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FontFace {
    Regular,
    Bold,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Element {
    Text {
        x: f32,
        y: f32,
        size: f32,
        face: FontFace,
        text: String,
    },
    Rule {
        x1: f32,
        y1: f32,
        x2: f32,
        y2: f32,
        width: f32,
    },
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Page {
    pub elements: Vec<Element>,
}

impl Page {
    pub fn texts(&self) -> impl Iterator<Item = &str> {
        self.elements.iter().filter_map(|e| match e {
            Element::Text { text, .. } => Some(text.as_str()),
            Element::Rule { .. } => None,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Layout {
    pub title: String,
    pub width: f32,
    pub height: f32,
    pub pages: Vec<Page>,
}

pub fn text_width(text: &str, size: f32) -> f32 {
    text.chars().count() as f32 * CHAR_WIDTH_EM * size
}

/// Greedy word wrap; words longer than a line are split.
pub fn wrap(text: &str, max_chars: usize) -> Vec<String> {
    let max_chars = max_chars.max(1);
    let mut lines = Vec::new();
    let mut current = String::new();
    let mut current_len = 0;

    for word in text.split_whitespace() {
        let mut word: Vec<char> = word.chars().collect();
        while word.len() > max_chars {
            if current_len > 0 {
                lines.push(std::mem::take(&mut current));
                current_len = 0;
            }
            let rest = word.split_off(max_chars);
            lines.push(word.into_iter().collect());
            word = rest;
        }
        if word.is_empty() {
            continue;
        }

        let needed = if current_len == 0 { word.len() } else { current_len + 1 + word.len() };
        if needed > max_chars {
            lines.push(std::mem::take(&mut current));
            current_len = 0;
        }
        if current_len > 0 {
            current.push(' ');
            current_len += 1;
        }
        current.extend(word.iter());
        current_len += word.len();
    }

    if current_len > 0 || lines.is_empty() {
        lines.push(current);
    }
    lines
}

/// Shortens `text` to `width` characters, marking the cut with `~`.
fn fit(text: &str, width: usize) -> String {
    let len = text.chars().count();
    if len <= width {
        return text.to_string();
    }
    let mut out: String = text.chars().take(width.saturating_sub(1)).collect();
    out.push('~');
    out
}

pub fn title_for(record: &TicketRecord, options: &RenderOptions) -> String {
    match record.ticket_number(&options.number_field) {
        Some(number) => options.title.replace("{number}", number),
        None => options.title.replace("{number}", "").trim().to_string(),
    }
}

/// Column widths in characters that fit `available`. Columns beyond
/// `available` (one character each) are left out.
pub fn column_widths(items: &LineItems, available: usize) -> Vec<usize> {
    let shown = items.columns.len().min(available);
    let natural: Vec<usize> = (0..shown)
        .map(|i| {
            items
                .rows
                .iter()
                .map(|r| r[i].chars().count())
                .chain(std::iter::once(items.columns[i].chars().count()))
                .max()
                .unwrap_or(1)
                .max(1)
        })
        .collect();

    let total: usize = natural.iter().sum();
    if total <= available {
        return natural;
    }

    let minimum: Vec<usize> = items
        .columns
        .iter()
        .take(shown)
        .zip(&natural)
        .map(|(c, n)| c.chars().count().min(*n).max(1))
        .collect();
    let min_total: usize = minimum.iter().sum();

    if min_total >= available {
        // one character each, the rest shared by natural width
        let spare = available - shown;
        let excess = total - shown;
        return natural.iter().map(|n| 1 + (n - 1) * spare / excess).collect();
    }

    let extra = available - min_total;
    let slack: usize = natural.iter().zip(&minimum).map(|(n, m)| n - m).sum();
    natural
        .iter()
        .zip(&minimum)
        .map(|(n, m)| m + (n - m) * extra / slack)
        .collect()
}

struct Cursor<'a> {
    options: &'a RenderOptions,
    width: f32,
    height: f32,
    margin: f32,
    y: f32,
    pages: Vec<Page>,
}

impl<'a> Cursor<'a> {
    fn new(options: &'a RenderOptions) -> Self {
        let (width, height) = options.page_size.dimensions();
        let margin = options.margin_pt();
        Self {
            options,
            width,
            height,
            margin,
            y: height - margin,
            pages: vec![Page::default()],
        }
    }

    fn left(&self) -> f32 {
        self.margin
    }

    fn right(&self) -> f32 {
        self.width - self.margin
    }

    fn bottom(&self) -> f32 {
        // room for the footer line
        self.margin + self.options.body_size * 2.0
    }

    fn chars_per_line(&self, size: f32) -> usize {
        ((self.right() - self.left()) / (CHAR_WIDTH_EM * size)).floor() as usize
    }

    fn page(&mut self) -> &mut Page {
        let last = self.pages.len() - 1;
        &mut self.pages[last]
    }

    fn new_page(&mut self) {
        self.pages.push(Page::default());
        self.y = self.height - self.margin;
    }

    /// Starts a new page when `needed` points do not fit; returns whether it did.
    fn ensure(&mut self, needed: f32) -> bool {
        let on_fresh_page = self.y >= self.height - self.margin;
        if self.y - needed < self.bottom() && !on_fresh_page {
            self.new_page();
            return true;
        }
        false
    }

    /// Reserves one line of `size` and returns its baseline.
    fn line(&mut self, size: f32) -> f32 {
        let line_height = size * LEADING;
        self.ensure(line_height);
        self.y -= line_height;
        self.y + size * (LEADING - 1.0)
    }

    fn gap(&mut self, points: f32) {
        self.y -= points;
    }

    fn text(&mut self, x: f32, baseline: f32, size: f32, face: FontFace, text: impl Into<String>) {
        let text = text.into();
        if text.is_empty() {
            return;
        }
        self.page().elements.push(Element::Text {
            x,
            y: baseline,
            size,
            face,
            text,
        });
    }

    fn rule(&mut self, thickness: f32) {
        let (x1, x2, y) = (self.left(), self.right(), self.y - thickness);
        self.page().elements.push(Element::Rule {
            x1,
            y1: y,
            x2,
            y2: y,
            width: thickness,
        });
        self.y -= thickness * 2.0;
    }
}

pub fn layout_ticket(record: &TicketRecord, options: &RenderOptions) -> Layout {
    let mut cursor = Cursor::new(options);
    let title = title_for(record, options);

    let title_chars = cursor.chars_per_line(options.title_size);
    for line in wrap(&title, title_chars) {
        let baseline = cursor.line(options.title_size);
        let x = cursor.left();
        cursor.text(x, baseline, options.title_size, FontFace::Bold, line);
    }
    cursor.gap(options.body_size * 0.3);
    cursor.rule(1.0);

    for group in &record.groups {
        layout_group(&mut cursor, group);
    }
    if let Some(items) = &record.items {
        layout_items(&mut cursor, items, record);
    }
    if !record.notes.is_empty() {
        layout_notes(&mut cursor, &record.notes);
    }

    add_footers(&mut cursor);

    Layout {
        title,
        width: cursor.width,
        height: cursor.height,
        pages: cursor.pages,
    }
}

fn heading(cursor: &mut Cursor<'_>, text: &str) {
    let size = cursor.options.body_size;
    cursor.gap(size * 0.6);
    // keep a heading together with at least one line below it
    cursor.ensure(size * LEADING * 2.0);
    let baseline = cursor.line(size);
    let x = cursor.left();
    let mut label: Vec<char> = text.chars().collect();
    if let Some(first) = label.first_mut() {
        *first = first.to_ascii_uppercase();
    }
    cursor.text(x, baseline, size, FontFace::Bold, label.into_iter().collect::<String>());
    cursor.rule(0.5);
}

fn layout_group(cursor: &mut Cursor<'_>, group: &FieldGroup) {
    let size = cursor.options.body_size;
    let char_w = CHAR_WIDTH_EM * size;
    let line_chars = cursor.chars_per_line(size);

    heading(cursor, &group.name);

    let longest = group.fields.iter().map(|f| f.name.chars().count() + 1).max().unwrap_or(0);
    let label_chars = longest.min(line_chars * 2 / 5).max(1);
    let value_chars = line_chars.saturating_sub(label_chars + COLUMN_GAP).max(1);
    let value_x = cursor.left() + (label_chars + COLUMN_GAP) as f32 * char_w;

    for field in &group.fields {
        let label = fit(&format!("{}:", field.name), label_chars);
        for (i, line) in wrap(&field.value, value_chars).into_iter().enumerate() {
            let baseline = cursor.line(size);
            if i == 0 {
                let x = cursor.left();
                cursor.text(x, baseline, size, FontFace::Bold, label.clone());
            }
            cursor.text(value_x, baseline, size, FontFace::Regular, line);
        }
    }
}

struct TableGeometry {
    /// One entry per column that fits on the line.
    widths: Vec<usize>,
    offsets: Vec<usize>,
    numeric: Vec<bool>,
    size: f32,
}

impl TableGeometry {
    fn new(items: &LineItems, line_chars: usize, size: f32) -> Self {
        let columns = items.columns.len();
        let shown = columns.min(line_chars);
        if shown < columns {
            tracing::warn!(
                "Item table has {} columns, only the first {} fit on a line",
                columns,
                shown
            );
        }

        // narrow the gap before squeezing columns below one character
        let gaps = shown.saturating_sub(1);
        let gap = [COLUMN_GAP, 1]
            .into_iter()
            .find(|g| shown + g * gaps <= line_chars)
            .unwrap_or(0);
        let widths = column_widths(items, line_chars - gap * gaps);

        let mut offsets = Vec::with_capacity(widths.len());
        let mut offset = 0;
        for w in &widths {
            offsets.push(offset);
            offset += w + gap;
        }

        Self {
            numeric: (0..widths.len()).map(|i| items.is_numeric_column(i)).collect(),
            widths,
            offsets,
            size,
        }
    }

    fn place(&self, cursor: &mut Cursor<'_>, cells: &[String], face: FontFace) {
        let baseline = cursor.line(self.size);
        let char_w = CHAR_WIDTH_EM * self.size;
        for (i, cell) in cells.iter().take(self.widths.len()).enumerate() {
            let text = fit(cell, self.widths[i]);
            // numbers line up on the right edge of their column
            let pad = if self.numeric[i] {
                self.widths[i] - text.chars().count()
            } else {
                0
            };
            let x = cursor.left() + (self.offsets[i] + pad) as f32 * char_w;
            cursor.text(x, baseline, self.size, face, text);
        }
    }
}

fn layout_items(cursor: &mut Cursor<'_>, items: &LineItems, record: &TicketRecord) {
    let size = cursor.options.body_size;
    let table = TableGeometry::new(items, cursor.chars_per_line(size), size);

    heading(cursor, "Items");
    table.place(cursor, &items.columns, FontFace::Bold);
    cursor.rule(0.5);

    for row in &items.rows {
        if cursor.ensure(size * LEADING) {
            table.place(cursor, &items.columns, FontFace::Bold);
            cursor.rule(0.5);
        }
        table.place(cursor, row, FontFace::Regular);
    }

    if let Some(total) = record.total() {
        cursor.ensure(size * LEADING + 2.0);
        cursor.rule(0.5);
        let text = format!("Total: {}", total);
        let baseline = cursor.line(size);
        let x = cursor.right() - text_width(&text, size);
        cursor.text(x, baseline, size, FontFace::Bold, text);
    }
}

fn layout_notes(cursor: &mut Cursor<'_>, notes: &[String]) {
    let size = cursor.options.body_size;
    let line_chars = cursor.chars_per_line(size);

    heading(cursor, "Notes");
    for note in notes {
        for line in wrap(note, line_chars) {
            let baseline = cursor.line(size);
            let x = cursor.left();
            cursor.text(x, baseline, size, FontFace::Regular, line);
        }
    }
}

fn add_footers(cursor: &mut Cursor<'_>) {
    let size = cursor.options.body_size * 0.8;
    let baseline = cursor.margin + size * 0.5;
    let left = cursor.left();
    let right = cursor.right();
    let footer_text = cursor.options.footer_text.clone();
    let count = cursor.pages.len();

    for (index, page) in cursor.pages.iter_mut().enumerate() {
        let label = format!("Page {} of {}", index + 1, count);
        if let Some(text) = &footer_text {
            page.elements.push(Element::Text {
                x: left,
                y: baseline,
                size,
                face: FontFace::Regular,
                text: text.clone(),
            });
        }
        page.elements.push(Element::Text {
            x: right - text_width(&label, size),
            y: baseline,
            size,
            face: FontFace::Regular,
            text: label,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::parser::parse_ticket;

    #[test]
    fn test_wrap_breaks_on_words_and_splits_long_words() {
        assert_eq!(wrap("the quick brown fox", 9), vec!["the quick", "brown fox"]);
        assert_eq!(wrap("abcdefghij", 4), vec!["abcd", "efgh", "ij"]);
        assert_eq!(wrap("ab abcdefgh", 4), vec!["ab", "abcd", "efgh"]);
        assert_eq!(wrap("", 10), vec![""]);
    }

    #[test]
    fn test_fit_marks_truncation() {
        assert_eq!(fit("Developer", 5), "Deve~");
        assert_eq!(fit("Dev", 5), "Dev");
    }

    #[test]
    fn test_column_widths_shrink_to_available() {
        let items = LineItems {
            columns: vec!["code".into(), "description".into()],
            rows: vec![vec!["A1".into(), "x".repeat(100)]],
        };
        assert_eq!(column_widths(&items, 200), vec![4, 100]);
        let widths = column_widths(&items, 50);
        assert!(widths.iter().sum::<usize>() <= 50);
        assert_eq!(widths[0], 4);
    }

    #[test]
    fn test_column_widths_never_exceed_available() {
        let items = LineItems {
            columns: (0..30).map(|i| format!("column{}", i)).collect(),
            rows: vec![(0..30).map(|i| "v".repeat(i + 1)).collect()],
        };
        let widths = column_widths(&items, 40);
        assert_eq!(widths.len(), 30);
        assert!(widths.iter().all(|w| *w >= 1));
        assert!(widths.iter().sum::<usize>() <= 40);

        let clipped = column_widths(&items, 12);
        assert_eq!(clipped, vec![1; 12]);
    }

    fn wide_table(columns: usize) -> TicketRecord {
        let header: Vec<String> = (0..columns).map(|i| format!("c{}", i)).collect();
        let row: Vec<String> = (0..columns).map(|i| format!("value{}", i)).collect();
        let input = format!("Number: 9\n[items]\n{}\n{}\n", header.join(","), row.join(","));
        parse_ticket(&input, b',').unwrap()
    }

    #[test]
    fn test_wide_tables_stay_inside_margins() {
        let options = RenderOptions::default();
        let right = options.page_size.dimensions().0 - options.margin_pt();
        for columns in [12, 40, 100, 200] {
            let layout = layout_ticket(&wide_table(columns), &options);
            for element in &layout.pages[0].elements {
                if let Element::Text { x, size, text, .. } = element {
                    assert!(
                        x + text_width(text, *size) <= right + 0.01,
                        "{text} overflows with {columns} columns"
                    );
                }
            }
        }
    }

    #[test]
    fn test_too_many_columns_keeps_leading_ones() {
        let options = RenderOptions::default();
        let layout = layout_ticket(&wide_table(200), &options);
        // every cell is cut to a single `~`, header row plus one data row
        let cells = layout.pages[0].texts().filter(|t| *t == "~").count();
        assert!(cells > 0);
        assert!(cells < 2 * 200);
        assert_eq!(cells % 2, 0);
    }

    #[test]
    fn test_title_uses_number_field() {
        let options = RenderOptions::default();
        let record = parse_ticket("Number: 42\n", b',').unwrap();
        assert_eq!(title_for(&record, &options), "Ticket 42");
        let record = parse_ticket("Other: 1\n", b',').unwrap();
        assert_eq!(title_for(&record, &options), "Ticket");
    }

    #[test]
    fn test_long_table_paginates_with_repeated_header() {
        let mut input = String::from("Number: 1\n[items]\ncode,qty,price\n");
        for i in 0..200 {
            input.push_str(&format!("C{},1,2.00\n", i));
        }
        let record = parse_ticket(&input, b',').unwrap();
        let layout = layout_ticket(&record, &RenderOptions::default());

        assert!(layout.pages.len() >= 3);
        for page in &layout.pages {
            assert_eq!(page.texts().filter(|t| *t == "code").count(), 1);
        }
        let last = layout.pages.last().unwrap();
        assert!(last.texts().any(|t| t == "Total: 400.00"));
    }

    #[test]
    fn test_footer_numbers_every_page() {
        let mut input = String::from("[notes]\n");
        for i in 0..150 {
            input.push_str(&format!("note line {}\n", i));
        }
        let record = parse_ticket(&input, b',').unwrap();
        let mut options = RenderOptions::default();
        options.footer_text = Some("CPAC".to_string());
        let layout = layout_ticket(&record, &options);
        let count = layout.pages.len();

        assert!(count >= 2);
        for (i, page) in layout.pages.iter().enumerate() {
            let expected = format!("Page {} of {}", i + 1, count);
            assert!(page.texts().any(|t| t == expected));
            assert!(page.texts().any(|t| t == "CPAC"));
        }
    }

    #[test]
    fn test_text_stays_inside_margins() {
        let record = parse_ticket(
            "Description: a very long value that keeps going well past the right edge of the page so it must wrap onto several lines\n",
            b',',
        )
        .unwrap();
        let options = RenderOptions::default();
        let layout = layout_ticket(&record, &options);
        let right = layout.width - options.margin_pt();
        for element in &layout.pages[0].elements {
            if let Element::Text { x, size, text, y, .. } = element {
                assert!(x + text_width(text, *size) <= right + 0.01, "{text} overflows");
                assert!(*y >= options.margin_pt());
            }
        }
    }

    #[test]
    fn test_layout_is_deterministic() {
        let record = parse_ticket("Number: 5\n[items]\na,b\n1,2\n", b',').unwrap();
        let options = RenderOptions::default();
        assert_eq!(layout_ticket(&record, &options), layout_ticket(&record, &options));
    }
}
