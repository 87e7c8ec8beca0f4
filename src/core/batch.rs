use crate::core::engine::ConversionEngine;
use crate::core::{ConversionReport, Pipeline, RenderedDocument, Storage};
use crate::utils::error::{Result, TicketError};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::io::{Cursor, Write};
use std::path::Path;
use std::sync::Arc;
use tokio::task::{self, JoinSet};
use zip::write::{FileOptions, ZipWriter};

#[derive(Debug, Default)]
pub struct BatchOutcome {
    pub reports: Vec<ConversionReport>,
    pub failures: Vec<(String, TicketError)>,
    pub archive: Option<String>,
}

impl BatchOutcome {
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Gives each name a `-2`, `-3`, ... suffix when an earlier one already took it.
fn unique_name(name: &str, taken: &mut HashSet<String>) -> String {
    if taken.insert(name.to_lowercase()) {
        return name.to_string();
    }
    let path = Path::new(name);
    let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or(name);
    let ext = path.extension().and_then(|e| e.to_str());
    let parent = path.parent().filter(|p| !p.as_os_str().is_empty());

    (2..)
        .map(|n| {
            let file = match ext {
                Some(ext) => format!("{}-{}.{}", stem, n, ext),
                None => format!("{}-{}", stem, n),
            };
            match parent {
                Some(dir) => dir.join(file).to_string_lossy().into_owned(),
                None => file,
            }
        })
        .find(|candidate| taken.insert(candidate.to_lowercase()))
        .unwrap_or_else(|| name.to_string())
}

fn add_to_archive(zip: &mut ZipWriter<Cursor<Vec<u8>>>, name: &str, pdf: &[u8]) -> Result<()> {
    zip.start_file::<_, ()>(name, FileOptions::default())?;
    zip.write_all(pdf)?;
    Ok(())
}

pub struct BatchRunner<P: Pipeline + 'static, S: Storage> {
    engine: Arc<ConversionEngine<P>>,
    storage: S,
    concurrency: usize,
    archive: Option<String>,
}

impl<P: Pipeline + 'static, S: Storage> BatchRunner<P, S> {
    pub fn new(engine: ConversionEngine<P>, storage: S, concurrency: usize) -> Self {
        Self {
            engine: Arc::new(engine),
            storage,
            concurrency: concurrency.max(1),
            archive: None,
        }
    }

    pub fn with_archive(mut self, archive: Option<String>) -> Self {
        self.archive = archive;
        self
    }

    /// Converts every source. A failing ticket is recorded and the rest carry on.
    ///
    /// Up to `concurrency` tickets are prepared at once. Each finished document
    /// waits only until every earlier source has been handled, then it is named
    /// and written, so collisions and the archive follow input order.
    pub async fn run(&self, sources: &[String]) -> BatchOutcome {
        let mut outcome = BatchOutcome::default();
        let mut taken = HashSet::new();
        let mut archive = self
            .archive
            .as_ref()
            .map(|_| ZipWriter::new(Cursor::new(Vec::new())));

        let mut tasks = JoinSet::new();
        let mut in_flight: HashMap<task::Id, usize> = HashMap::new();
        let mut ready: BTreeMap<usize, Result<RenderedDocument>> = BTreeMap::new();
        let mut next_spawn = 0;
        let mut next_store = 0;

        loop {
            // window: prepared but unwritten documents never exceed `concurrency`
            while next_spawn < sources.len() && next_spawn < next_store + self.concurrency {
                let engine = Arc::clone(&self.engine);
                let source = sources[next_spawn].clone();
                let handle = tasks.spawn(async move { engine.prepare(&source).await });
                in_flight.insert(handle.id(), next_spawn);
                next_spawn += 1;
            }

            while let Some(result) = ready.remove(&next_store) {
                let source = &sources[next_store];
                self.store_in_order(source, result, &mut taken, &mut archive, &mut outcome)
                    .await;
                next_store += 1;
            }
            if next_store == sources.len() {
                break;
            }

            match tasks.join_next_with_id().await {
                Some(Ok((id, result))) => {
                    if let Some(index) = in_flight.remove(&id) {
                        ready.insert(index, result);
                    }
                }
                Some(Err(e)) => {
                    tracing::error!("Conversion task failed: {}", e);
                    if let Some(index) = in_flight.remove(&e.id()) {
                        let failure = TicketError::TaskError {
                            message: e.to_string(),
                        };
                        ready.insert(index, Err(failure));
                    }
                }
                None => {
                    for source in &sources[next_store..] {
                        outcome.failures.push((
                            source.clone(),
                            TicketError::TaskError {
                                message: "conversion task did not complete".to_string(),
                            },
                        ));
                    }
                    break;
                }
            }
        }

        if let (Some(name), Some(zip)) = (&self.archive, archive) {
            if !outcome.reports.is_empty() {
                match self.write_archive(name, zip).await {
                    Ok(path) => outcome.archive = Some(path),
                    Err(e) => outcome.failures.push((name.clone(), e)),
                }
            }
        }

        tracing::info!(
            "Batch finished: {} converted, {} failed",
            outcome.reports.len(),
            outcome.failures.len()
        );
        outcome
    }

    async fn store_in_order(
        &self,
        source: &str,
        result: Result<RenderedDocument>,
        taken: &mut HashSet<String>,
        archive: &mut Option<ZipWriter<Cursor<Vec<u8>>>>,
        outcome: &mut BatchOutcome,
    ) {
        let mut document = match result {
            Ok(document) => document,
            Err(e) => {
                tracing::error!("❌ {}: {}", source, e);
                outcome.failures.push((source.to_string(), e));
                return;
            }
        };

        let name = unique_name(&document.file_name, taken);
        if name != document.file_name {
            tracing::warn!("{} already used, writing {} instead", document.file_name, name);
            document.file_name = name;
        }

        // kept only when an archive was asked for
        let entry = archive
            .as_ref()
            .map(|_| (document.file_name.clone(), document.pdf.clone()));
        match self.engine.store(document).await {
            Ok(report) => outcome.reports.push(report),
            Err(e) => {
                tracing::error!("❌ {}: {}", source, e);
                outcome.failures.push((source.to_string(), e));
                return;
            }
        }

        let Some((name, pdf)) = entry else {
            return;
        };
        let added = match archive.as_mut() {
            Some(zip) => add_to_archive(zip, &name, &pdf),
            None => return,
        };
        if let Err(e) = added {
            tracing::error!("Could not add {} to the archive: {}", name, e);
            outcome.failures.push((source.to_string(), e));
            *archive = None;
        }
    }

    async fn write_archive(&self, name: &str, zip: ZipWriter<Cursor<Vec<u8>>>) -> Result<String> {
        let data = zip.finish()?.into_inner();
        tracing::debug!("Writing ZIP archive ({} bytes)", data.len());
        let path = self.storage.write_file(name, &data).await?;
        tracing::info!("📦 Archive saved to {}", path);
        Ok(path)
    }
}
