use std::path::Path;
use tempfile::TempDir;
use ticket_to_pdf::core::renderer::read_text_runs;
use ticket_to_pdf::{
    BatchRunner, ConversionEngine, LocalStorage, Settings, TicketError, TicketPipeline,
};

const FIXTURE: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/tests/fixtures/sample.tkt");

fn settings_for(dir: &TempDir) -> Settings {
    Settings {
        output_dir: dir.path().to_str().unwrap().to_string(),
        ..Settings::default()
    }
}

fn engine_for(settings: Settings) -> ConversionEngine<TicketPipeline<LocalStorage, Settings>> {
    let storage = LocalStorage::new(settings.output_dir.clone());
    ConversionEngine::new(TicketPipeline::new(storage, settings))
}

fn write_ticket(dir: &Path, name: &str, body: &str) -> String {
    let path = dir.join(name);
    std::fs::write(&path, body).unwrap();
    path.to_str().unwrap().to_string()
}

#[tokio::test]
async fn test_end_to_end_single_ticket() {
    let temp_dir = TempDir::new().unwrap();
    let engine = engine_for(settings_for(&temp_dir));

    let report = engine.run(FIXTURE).await.unwrap();
    assert_eq!(report.page_count, 1);
    assert!(report.output_path.ends_with("sample.pdf"));

    let pdf = std::fs::read(temp_dir.path().join("sample.pdf")).unwrap();
    assert_eq!(pdf.len(), report.bytes);

    let runs = read_text_runs(&pdf).unwrap();
    let page = &runs[0];
    for expected in [
        "Ticket 10452",
        "Northside Photo Lab",
        "Fixer, rapid",
        "Total: 51.70",
        "Call ahead: 555-0100",
        "Page 1 of 1",
    ] {
        assert!(page.iter().any(|t| t == expected), "missing {expected:?} in {page:?}");
    }
}

#[tokio::test]
async fn test_same_ticket_renders_byte_identical() {
    let first = TempDir::new().unwrap();
    let second = TempDir::new().unwrap();

    engine_for(settings_for(&first)).run(FIXTURE).await.unwrap();
    engine_for(settings_for(&second)).run(FIXTURE).await.unwrap();

    let a = std::fs::read(first.path().join("sample.pdf")).unwrap();
    let b = std::fs::read(second.path().join("sample.pdf")).unwrap();
    assert_eq!(a, b);
}

#[tokio::test]
async fn test_number_template_and_json_dump() {
    let temp_dir = TempDir::new().unwrap();
    let settings = Settings {
        filename: "ticket-{number}.pdf".to_string(),
        dump_json: true,
        ..settings_for(&temp_dir)
    };

    engine_for(settings).run(FIXTURE).await.unwrap();

    assert!(temp_dir.path().join("ticket-10452.pdf").exists());
    let json = std::fs::read_to_string(temp_dir.path().join("ticket-10452.json")).unwrap();
    let value: serde_json::Value = serde_json::from_str(&json).unwrap();
    assert_eq!(value["items"]["rows"].as_array().unwrap().len(), 3);
}

#[tokio::test]
async fn test_parse_error_surfaces_line_number() {
    let temp_dir = TempDir::new().unwrap();
    let input = write_ticket(temp_dir.path(), "broken.tkt", "[ticket]\nNumber: 1\nnot a field\n");

    let result = engine_for(settings_for(&temp_dir)).run(&input).await;
    match result {
        Err(TicketError::ParseError { line, .. }) => assert_eq!(line, 3),
        other => panic!("unexpected result: {other:?}"),
    }
    assert!(!temp_dir.path().join("broken.pdf").exists());
}

#[tokio::test]
async fn test_batch_isolates_failures_and_keeps_input_order() {
    let inputs_dir = TempDir::new().unwrap();
    let output_dir = TempDir::new().unwrap();
    let sources = vec![
        write_ticket(inputs_dir.path(), "a.tkt", "Number: 1\n"),
        write_ticket(inputs_dir.path(), "empty.tkt", "# nothing\n"),
        write_ticket(inputs_dir.path(), "c.tkt", "Number: 3\n[notes]\nthird\n"),
        inputs_dir.path().join("missing.tkt").to_str().unwrap().to_string(),
    ];

    let settings = settings_for(&output_dir);
    let storage = LocalStorage::new(settings.output_dir.clone());
    let runner = BatchRunner::new(engine_for(settings), storage, 2);
    let outcome = runner.run(&sources).await;

    assert!(!outcome.is_success());
    let converted: Vec<_> = outcome.reports.iter().map(|r| r.source.as_str()).collect();
    assert_eq!(converted, vec![sources[0].as_str(), sources[2].as_str()]);

    assert_eq!(outcome.failures.len(), 2);
    assert!(matches!(outcome.failures[0].1, TicketError::EmptyTicket));
    assert!(matches!(outcome.failures[1].1, TicketError::IoError(_)));

    assert!(output_dir.path().join("a.pdf").exists());
    assert!(output_dir.path().join("c.pdf").exists());
}

#[tokio::test]
async fn test_batch_resolves_name_collisions_and_archives() {
    let output_dir = TempDir::new().unwrap();
    let first_dir = TempDir::new().unwrap();
    let second_dir = TempDir::new().unwrap();
    let sources = vec![
        write_ticket(first_dir.path(), "same.tkt", "Number: 1\n"),
        write_ticket(second_dir.path(), "same.tkt", "Number: 2\n"),
    ];

    let settings = settings_for(&output_dir);
    let storage = LocalStorage::new(settings.output_dir.clone());
    let runner = BatchRunner::new(engine_for(settings), storage, 4)
        .with_archive(Some("tickets.zip".to_string()));
    let outcome = runner.run(&sources).await;

    assert!(outcome.is_success());
    let first = std::fs::read(output_dir.path().join("same.pdf")).unwrap();
    let second = std::fs::read(output_dir.path().join("same-2.pdf")).unwrap();
    assert!(read_text_runs(&first).unwrap()[0].iter().any(|t| t == "Ticket 1"));
    assert!(read_text_runs(&second).unwrap()[0].iter().any(|t| t == "Ticket 2"));

    let archive_path = outcome.archive.unwrap();
    assert!(archive_path.ends_with("tickets.zip"));
    let zip_data = std::fs::read(&archive_path).unwrap();
    let mut archive = zip::ZipArchive::new(std::io::Cursor::new(zip_data)).unwrap();
    let names: Vec<String> = (0..archive.len())
        .map(|i| archive.by_index(i).unwrap().name().to_string())
        .collect();
    assert_eq!(names, vec!["same.pdf", "same-2.pdf"]);
}

#[tokio::test]
async fn test_many_items_span_pages() {
    let temp_dir = TempDir::new().unwrap();
    let mut body = String::from("[ticket]\nNumber: 77\n[items]\ncode;description;qty;price\n");
    for i in 0..120 {
        body.push_str(&format!("P{i};Paper roll {i};1;1.00\n"));
    }
    let input = write_ticket(temp_dir.path(), "long.tkt", &body);

    let settings = Settings {
        delimiter: b';',
        ..settings_for(&temp_dir)
    };
    let report = engine_for(settings).run(&input).await.unwrap();
    assert!(report.page_count >= 2);

    let pdf = std::fs::read(&report.output_path).unwrap();
    let runs = read_text_runs(&pdf).unwrap();
    assert_eq!(runs.len(), report.page_count);
    for page in &runs {
        assert!(page.iter().any(|t| t == "description"));
    }
    assert!(runs.last().unwrap().iter().any(|t| t == "Total: 120.00"));
}

#[tokio::test]
async fn test_half_cent_line_amounts_round_exactly() -> anyhow::Result<()> {
    let temp_dir = TempDir::new()?;
    let input = write_ticket(
        temp_dir.path(),
        "half.tkt",
        "Number: 5\n[items]\nqty,price\n0.145,1.00\n1.005,1.00\n",
    );

    let report = engine_for(settings_for(&temp_dir)).run(&input).await?;
    let runs = read_text_runs(&std::fs::read(&report.output_path)?)?;
    assert!(runs[0].iter().any(|t| t == "Total: 1.16"), "{:?}", runs[0]);
    Ok(())
}

#[tokio::test]
async fn test_wide_item_table_renders() -> anyhow::Result<()> {
    let temp_dir = TempDir::new()?;
    let header: Vec<String> = (0..60).map(|i| format!("col{i}")).collect();
    let row: Vec<String> = (0..60).map(|i| i.to_string()).collect();
    let body = format!("Number: 8\n[items]\n{}\n{}\n", header.join(","), row.join(","));
    let input = write_ticket(temp_dir.path(), "wide.tkt", &body);

    let report = engine_for(settings_for(&temp_dir)).run(&input).await?;
    assert_eq!(report.page_count, 1);
    Ok(())
}

#[test]
fn test_unwritable_output_dir_maps_to_system_exit_code() -> anyhow::Result<()> {
    let blocker = tempfile::NamedTempFile::new()?;
    let settings = Settings {
        output_dir: blocker.path().join("out").to_str().unwrap().to_string(),
        ..Settings::default()
    };

    let err = settings.ensure_output_dir().unwrap_err();
    assert!(matches!(err, TicketError::IoError(_)));
    assert_eq!(err.exit_code(), 3);
    Ok(())
}
