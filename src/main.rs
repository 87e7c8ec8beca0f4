use clap::Parser;
use ticket_to_pdf::utils::{logger, validation::Validate};
use ticket_to_pdf::{
    BatchRunner, CliConfig, ConversionEngine, LocalStorage, TicketError, TicketPipeline,
};

const EXIT_PARTIAL_FAILURE: i32 = 2;

fn fail(e: &TicketError) -> ! {
    tracing::error!(
        "❌ {} (Category: {:?}, Severity: {:?})",
        e,
        e.category(),
        e.severity()
    );
    eprintln!("❌ {}", e.user_friendly_message());
    eprintln!("💡 {}", e.recovery_suggestion());
    std::process::exit(e.exit_code());
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = CliConfig::parse();

    // defaults, then the config file, then flags
    let settings = match cli.settings() {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("❌ {}", e.user_friendly_message());
            eprintln!("💡 {}", e.recovery_suggestion());
            std::process::exit(e.exit_code());
        }
    };

    // logging
    if cli.json_logs {
        logger::init_json_logger(settings.log_level.as_deref());
    } else {
        logger::init_cli_logger(cli.verbose, settings.log_level.as_deref());
    }

    tracing::info!("Starting ticket-to-pdf {}", env!("CARGO_PKG_VERSION"));
    tracing::debug!("Settings: {:?}", settings);

    // validate settings
    if let Err(e) = settings.validate() {
        fail(&e);
    }
    if let Err(e) = settings.ensure_output_dir() {
        fail(&e);
    }

    // storage and pipeline
    let storage = LocalStorage::new(settings.output_dir.clone());
    let concurrency = settings.concurrency;
    let archive = settings.archive.clone();
    let engine = ConversionEngine::new(TicketPipeline::new(storage.clone(), settings));

    // a lone ticket without an archive skips the batch machinery
    if cli.inputs.len() == 1 && archive.is_none() {
        match engine.run(&cli.inputs[0]).await {
            Ok(report) => println!("✅ {} -> {}", report.source, report.output_path),
            Err(e) => fail(&e),
        }
        return Ok(());
    }

    // batch
    let runner = BatchRunner::new(engine, storage, concurrency).with_archive(archive);
    let outcome = runner.run(&cli.inputs).await;

    for report in &outcome.reports {
        println!("✅ {} -> {}", report.source, report.output_path);
    }
    if let Some(path) = &outcome.archive {
        println!("📦 {}", path);
    }
    for (source, e) in &outcome.failures {
        eprintln!("❌ {}: {}", source, e.user_friendly_message());
    }

    // 2 when some tickets converted, otherwise the worst failure's code
    if !outcome.is_success() {
        let code = if outcome.reports.is_empty() {
            outcome.failures.iter().map(|(_, e)| e.exit_code()).max().unwrap_or(1)
        } else {
            EXIT_PARTIAL_FAILURE
        };
        std::process::exit(code);
    }

    Ok(())
}
