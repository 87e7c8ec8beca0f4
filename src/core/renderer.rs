use crate::config::RenderOptions;
use crate::core::layout::{Element, FontFace, Layout, Page};
use crate::utils::error::{Result, TicketError};
use chrono::NaiveDateTime;
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, StringFormat};

const PRODUCER: &str = concat!("ticket-to-pdf ", env!("CARGO_PKG_VERSION"));

/// Maps a character to its WinAnsiEncoding byte; anything else prints as `?`.
pub fn win_ansi_byte(c: char) -> u8 {
    match c {
        ' '..='~' => c as u8,
        '\t' => b' ',
        '\u{a0}'..='\u{ff}' => c as u32 as u8,
        '€' => 0x80,
        '‚' => 0x82,
        '…' => 0x85,
        '‘' => 0x91,
        '’' => 0x92,
        '“' => 0x93,
        '”' => 0x94,
        '•' => 0x95,
        '–' => 0x96,
        '—' => 0x97,
        '™' => 0x99,
        _ => b'?',
    }
}

fn encode_text(text: &str) -> Object {
    Object::String(text.chars().map(win_ansi_byte).collect(), StringFormat::Hexadecimal)
}

fn font_name(face: FontFace) -> Object {
    match face {
        FontFace::Regular => "F1".into(),
        FontFace::Bold => "F2".into(),
    }
}

fn page_operations(page: &Page) -> Vec<Operation> {
    let mut ops = Vec::new();
    for element in &page.elements {
        match element {
            Element::Text {
                x,
                y,
                size,
                face,
                text,
            } => {
                ops.push(Operation::new("BT", vec![]));
                ops.push(Operation::new("Tf", vec![font_name(*face), (*size).into()]));
                ops.push(Operation::new("Td", vec![(*x).into(), (*y).into()]));
                ops.push(Operation::new("Tj", vec![encode_text(text)]));
                ops.push(Operation::new("ET", vec![]));
            }
            Element::Rule {
                x1,
                y1,
                x2,
                y2,
                width,
            } => {
                ops.push(Operation::new("w", vec![(*width).into()]));
                ops.push(Operation::new("m", vec![(*x1).into(), (*y1).into()]));
                ops.push(Operation::new("l", vec![(*x2).into(), (*y2).into()]));
                ops.push(Operation::new("S", vec![]));
            }
        }
    }
    ops
}

/// Serializes `layout` into PDF bytes.
///
/// Nothing time-dependent is written: the creation date comes from the ticket,
/// so the same layout and options always give the same bytes.
pub fn render_pdf(
    layout: &Layout,
    options: &RenderOptions,
    created: Option<NaiveDateTime>,
) -> Result<Vec<u8>> {
    if layout.pages.is_empty() {
        return Err(TicketError::RenderError {
            message: "layout produced no pages".to_string(),
        });
    }

    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();

    let regular_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Courier",
        "Encoding" => "WinAnsiEncoding",
    });
    let bold_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Courier-Bold",
        "Encoding" => "WinAnsiEncoding",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! {
            "F1" => regular_id,
            "F2" => bold_id,
        },
    });

    let mut kids: Vec<Object> = Vec::with_capacity(layout.pages.len());
    for page in &layout.pages {
        let content = Content {
            operations: page_operations(page),
        };
        let content_id = doc.add_object(lopdf::Stream::new(dictionary! {}, content.encode()?));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
        });
        kids.push(page_id.into());
    }

    let pages = dictionary! {
        "Type" => "Pages",
        "Kids" => kids,
        "Count" => layout.pages.len() as i64,
        "Resources" => resources_id,
        "MediaBox" => vec![0.into(), 0.into(), layout.width.into(), layout.height.into()],
    };
    doc.objects.insert(pages_id, Object::Dictionary(pages));

    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut info = dictionary! {
        "Title" => encode_text(&layout.title),
        "Producer" => encode_text(PRODUCER),
    };
    if let Some(created) = created {
        info.set(
            "CreationDate",
            Object::string_literal(created.format("D:%Y%m%d%H%M%S").to_string()),
        );
    }
    let info_id = doc.add_object(info);
    doc.trailer.set("Info", info_id);

    if options.compress {
        doc.compress();
    }

    let mut buffer = Vec::new();
    doc.save_to(&mut buffer)?;
    tracing::debug!(
        pages = layout.pages.len(),
        bytes = buffer.len(),
        compressed = options.compress,
        "Rendered PDF"
    );
    Ok(buffer)
}

/// Text runs per page of a PDF written by [`render_pdf`], for checking output.
pub fn read_text_runs(pdf: &[u8]) -> Result<Vec<Vec<String>>> {
    let mut doc = Document::load_mem(pdf)?;
    doc.decompress();

    let mut pages = Vec::new();
    for (_, page_id) in doc.get_pages() {
        let content = Content::decode(&doc.get_page_content(page_id)?)?;
        let runs = content
            .operations
            .iter()
            .filter(|op| op.operator == "Tj")
            .filter_map(|op| match op.operands.first() {
                Some(Object::String(bytes, _)) => Some(bytes.iter().map(|b| *b as char).collect()),
                _ => None,
            })
            .collect();
        pages.push(runs);
    }
    Ok(pages)
}
