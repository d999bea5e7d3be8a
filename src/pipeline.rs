//! Document processing and batch import coordination.
//!
//! Clustering and binding are pure per-document computations; the only
//! blocking operations are invoking the external detection engine and
//! writing to the database. Interactive use runs detection on a worker
//! thread and delivers results back over a channel, guarded by a generation
//! counter so a late result for a document the user already navigated away
//! from is discarded instead of mutating the active editing session. Batch
//! import parallelizes the per-document work with rayon and serializes the
//! final writes on one connection so primary-key uniqueness and provenance
//! mapping hold without cross-document races.

use crate::binding::{extract_single, extract_table};
use crate::core::{ClusterPolicy, ExtractError, ExtractResult};
use crate::domain::{fragments_from_regions, Binding, FieldSchema, Fragment, RawRegion, Record};
use crate::processors::{cluster_blocks, sort_reading_order, TextBlock};
use crate::store::{ImportSummary, RecordStore};
use crossbeam_channel::{unbounded, Receiver, Sender};
use rayon::prelude::*;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Everything the detection engine reports for one document image.
#[derive(Debug, Clone)]
pub struct DetectionOutput {
    /// Recognized regions in the engine's wire format.
    pub regions: Vec<RawRegion>,
    /// Pixel dimensions of the source image.
    pub image_size: (u32, u32),
}

/// External detection/recognition collaborator.
///
/// Returning `Ok(None)` signals unrecoverable failure for that one
/// document; the pipeline maps it to [`ExtractError::DetectionFailed`]
/// without aborting sibling documents.
pub trait DetectionEngine: Send + Sync {
    /// Runs detection and recognition on one document image.
    fn detect(&self, document: &Path) -> ExtractResult<Option<DetectionOutput>>;
}

/// A document's fragments after clustering, ready for editing or binding.
#[derive(Debug, Clone)]
pub struct ProcessedDocument {
    /// Fragments in reading order.
    pub fragments: Vec<Fragment>,
    /// Visual blocks over the same fragments.
    pub blocks: Vec<TextBlock>,
    /// Pixel dimensions of the source image.
    pub image_size: (u32, u32),
}

/// Pure per-document processing: regions in, ordered fragments and blocks
/// out.
#[derive(Debug, Clone, Default)]
pub struct DocumentProcessor {
    policy: ClusterPolicy,
}

impl DocumentProcessor {
    /// Creates a processor with default clustering thresholds.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a processor with custom clustering thresholds.
    pub fn with_policy(policy: ClusterPolicy) -> Self {
        Self { policy }
    }

    /// The active clustering thresholds.
    pub fn policy(&self) -> &ClusterPolicy {
        &self.policy
    }

    /// Converts detection output into sorted fragments and visual blocks.
    pub fn process(&self, output: &DetectionOutput) -> ProcessedDocument {
        let fragments = fragments_from_regions(&output.regions, output.image_size);
        let fragments = sort_reading_order(&fragments, &self.policy);
        let blocks = cluster_blocks(&fragments, &self.policy);
        ProcessedDocument {
            fragments,
            blocks,
            image_size: output.image_size,
        }
    }
}

/// Result of one background detection job.
#[derive(Debug)]
pub struct OcrOutcome {
    /// The document that was processed.
    pub document: PathBuf,
    /// Generation the job was submitted under.
    pub generation: u64,
    /// The processed document, or the per-document failure.
    pub result: ExtractResult<ProcessedDocument>,
}

struct OcrJob {
    document: PathBuf,
    generation: u64,
}

/// Runs detection on a worker thread for the interactive editing context.
///
/// Submitting a document bumps the active generation; results arriving for
/// an older generation are discarded on receipt. Cancellation of the
/// engine call itself is best-effort only, the engine contract does not
/// guarantee prompt interruption.
pub struct OcrDispatcher {
    jobs: Option<Sender<OcrJob>>,
    results: Receiver<OcrOutcome>,
    generation: Arc<AtomicU64>,
    worker: Option<JoinHandle<()>>,
}

impl OcrDispatcher {
    /// Spawns the worker thread.
    pub fn spawn(engine: Arc<dyn DetectionEngine>, processor: DocumentProcessor) -> Self {
        let (jobs_tx, jobs_rx) = unbounded::<OcrJob>();
        let (results_tx, results_rx) = unbounded::<OcrOutcome>();
        let generation = Arc::new(AtomicU64::new(0));

        let active = Arc::clone(&generation);
        let worker = std::thread::spawn(move || {
            for job in jobs_rx {
                // Best-effort cancellation: skip superseded jobs before the
                // expensive engine call.
                if job.generation != active.load(Ordering::SeqCst) {
                    debug!(document = %job.document.display(), "skipping superseded job");
                    continue;
                }
                let result = run_detection(engine.as_ref(), &processor, &job.document);
                let outcome = OcrOutcome {
                    document: job.document,
                    generation: job.generation,
                    result,
                };
                if results_tx.send(outcome).is_err() {
                    break;
                }
            }
        });

        Self {
            jobs: Some(jobs_tx),
            results: results_rx,
            generation,
            worker: Some(worker),
        }
    }

    /// Queues a document for detection and makes it the active generation.
    ///
    /// Returns the generation number assigned to the job.
    pub fn submit(&self, document: PathBuf) -> u64 {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        if let Some(jobs) = &self.jobs {
            let _ = jobs.send(OcrJob {
                document,
                generation,
            });
        }
        generation
    }

    /// Waits up to `timeout` for a result belonging to the active
    /// generation, discarding stale results as they arrive.
    pub fn recv_current(&self, timeout: Duration) -> Option<OcrOutcome> {
        let deadline = Instant::now() + timeout;
        loop {
            let remaining = deadline.checked_duration_since(Instant::now())?;
            match self.results.recv_timeout(remaining) {
                Ok(outcome) if outcome.generation == self.generation.load(Ordering::SeqCst) => {
                    return Some(outcome)
                }
                Ok(stale) => {
                    debug!(
                        document = %stale.document.display(),
                        generation = stale.generation,
                        "discarding result for superseded document"
                    );
                }
                Err(_) => return None,
            }
        }
    }
}

impl Drop for OcrDispatcher {
    fn drop(&mut self) {
        // Closing the job channel ends the worker loop.
        self.jobs.take();
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}

fn run_detection(
    engine: &dyn DetectionEngine,
    processor: &DocumentProcessor,
    document: &Path,
) -> ExtractResult<ProcessedDocument> {
    match engine.detect(document)? {
        Some(output) => Ok(processor.process(&output)),
        None => Err(ExtractError::detection_failed(
            document.display().to_string(),
        )),
    }
}

/// Tracks which files a batch has already handled.
///
/// Keyed by canonicalized parent directory, scoped to one batch-import
/// operation; passed explicitly to whoever needs the lookup rather than
/// living in process-wide state.
#[derive(Debug, Default)]
pub struct ProcessedRegistry {
    by_dir: HashMap<PathBuf, HashSet<PathBuf>>,
}

impl ProcessedRegistry {
    /// Creates an empty registry for one batch.
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the file was already marked in this batch.
    pub fn is_processed(&self, file: &Path) -> bool {
        let (dir, name) = Self::split(file);
        self.by_dir
            .get(&dir)
            .is_some_and(|names| names.contains(&name))
    }

    /// Marks the file as handled.
    pub fn mark(&mut self, file: &Path) {
        let (dir, name) = Self::split(file);
        self.by_dir.entry(dir).or_default().insert(name);
    }

    fn split(file: &Path) -> (PathBuf, PathBuf) {
        let parent = file.parent().unwrap_or_else(|| Path::new(""));
        let dir = parent.canonicalize().unwrap_or_else(|_| parent.to_path_buf());
        let name = file.file_name().map(PathBuf::from).unwrap_or_default();
        (dir, name)
    }
}

/// How extracted fragments map onto records during an import session.
#[derive(Debug, Clone)]
pub enum ImportMode {
    /// One record per document, filled from explicit bindings.
    Single {
        /// The field bindings to apply to every document.
        bindings: Vec<Binding>,
    },
    /// Many records per document by positional chunking.
    Table,
}

/// Aggregated outcome of a whole batch run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchSummary {
    /// Documents whose records reached the import step.
    pub documents_processed: usize,
    /// Documents that failed detection or processing.
    pub documents_failed: usize,
    /// Record-level import counts.
    pub records: ImportSummary,
}

impl fmt::Display for BatchSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} documents processed, {} failed; records: {}",
            self.documents_processed, self.documents_failed, self.records
        )
    }
}

/// Runs detection, clustering, and binding across many documents, then
/// writes all resulting records.
pub struct BatchImporter<'a> {
    engine: &'a dyn DetectionEngine,
    processor: DocumentProcessor,
    fields: Vec<FieldSchema>,
}

impl<'a> BatchImporter<'a> {
    /// Creates an importer over an applied (validated, coerced) schema.
    pub fn new(
        engine: &'a dyn DetectionEngine,
        processor: DocumentProcessor,
        fields: Vec<FieldSchema>,
    ) -> Self {
        Self {
            engine,
            processor,
            fields,
        }
    }

    /// Imports a batch of documents into `table`.
    ///
    /// Per-document OCR, clustering, and binding run in parallel; they are
    /// pure computations. Writes happen once, sequentially, inside a single
    /// transaction. A document that fails detection is logged and counted,
    /// and its siblings continue.
    pub fn run(
        &self,
        documents: &[PathBuf],
        mode: &ImportMode,
        store: &mut RecordStore,
        table: &str,
        registry: &mut ProcessedRegistry,
    ) -> ExtractResult<BatchSummary> {
        let pending: Vec<&PathBuf> = documents
            .iter()
            .filter(|doc| {
                let seen = registry.is_processed(doc);
                if seen {
                    debug!(document = %doc.display(), "already processed, skipping");
                }
                !seen
            })
            .collect();

        let results: Vec<(
            &PathBuf,
            ExtractResult<Vec<Record>>,
        )> = pending
            .par_iter()
            .map(|doc| (*doc, self.extract_document(doc, mode)))
            .collect();

        let mut summary = BatchSummary::default();
        let mut records = Vec::new();
        for (doc, result) in results {
            match result {
                Ok(doc_records) => {
                    summary.documents_processed += 1;
                    records.extend(doc_records);
                    registry.mark(doc);
                }
                Err(e) => {
                    warn!(document = %doc.display(), error = %e, "document failed, continuing batch");
                    summary.documents_failed += 1;
                }
            }
        }

        summary.records = store.import_records(table, &self.fields, &records)?;
        info!(%summary, "batch finished");
        Ok(summary)
    }

    fn extract_document(&self, document: &Path, mode: &ImportMode) -> ExtractResult<Vec<Record>> {
        let processed = run_detection(self.engine, &self.processor, document)?;
        let source = document
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| document.display().to_string());

        let records = match mode {
            ImportMode::Single { bindings } => vec![extract_single(
                &self.fields,
                bindings,
                &processed.fragments,
                processed.image_size,
                &source,
            )],
            ImportMode::Table => extract_table(&self.fields, &processed.fragments, &source),
        };
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binding::apply_schema;
    use crate::domain::FieldSchema;

    /// Engine stub serving canned regions per file name; `fail.png`
    /// signals unrecoverable failure.
    struct StubEngine {
        outputs: HashMap<String, Vec<RawRegion>>,
    }

    impl StubEngine {
        fn with_documents(entries: &[(&str, &str)]) -> Self {
            // One region per (filename, json-array-of-regions) entry.
            let outputs = entries
                .iter()
                .map(|(name, body)| (name.to_string(), serde_json::from_str(body).unwrap()))
                .collect();
            Self { outputs }
        }
    }

    impl DetectionEngine for StubEngine {
        fn detect(&self, document: &Path) -> ExtractResult<Option<DetectionOutput>> {
            let name = document.file_name().unwrap().to_string_lossy();
            if name == "fail.png" {
                return Ok(None);
            }
            let regions = self
                .outputs
                .get(name.as_ref())
                .cloned()
                .unwrap_or_default();
            Ok(Some(DetectionOutput {
                regions,
                image_size: (800, 600),
            }))
        }
    }

    fn two_field_schema() -> Vec<FieldSchema> {
        let fields = vec![
            FieldSchema::text("name", "姓名"),
            FieldSchema::text("id_card", "身份证号").primary_key(),
        ];
        apply_schema(fields).unwrap().0
    }

    const DOC_A: &str = r#"[
        {"box": [10, 10, 100, 30], "text": "张三", "confidence": 0.99},
        {"box": [110, 10, 250, 30], "text": "110101199001011234", "confidence": 0.98}
    ]"#;
    const DOC_B: &str = r#"[
        {"box": [10, 10, 100, 30], "text": "李四", "confidence": 0.99},
        {"box": [110, 10, 250, 30], "text": "11010119900101123X", "confidence": 0.98}
    ]"#;

    #[test]
    fn test_processor_orders_and_clusters() {
        let engine = StubEngine::with_documents(&[("a.png", DOC_A)]);
        let output = engine.detect(Path::new("a.png")).unwrap().unwrap();
        let processed = DocumentProcessor::new().process(&output);
        assert_eq!(processed.fragments[0].text, "张三");
        assert_eq!(processed.fragments[1].text, "110101199001011234");
        assert!(!processed.blocks.is_empty());
    }

    #[test]
    fn test_batch_import_table_mode() {
        let engine = StubEngine::with_documents(&[("a.png", DOC_A), ("b.png", DOC_B)]);
        let fields = two_field_schema();
        let mut store = RecordStore::open_in_memory().unwrap();
        store.create_table("certs", &fields).unwrap();

        let importer = BatchImporter::new(&engine, DocumentProcessor::new(), fields);
        let docs = vec![PathBuf::from("a.png"), PathBuf::from("b.png")];
        let mut registry = ProcessedRegistry::new();
        let summary = importer
            .run(&docs, &ImportMode::Table, &mut store, "certs", &mut registry)
            .unwrap();

        assert_eq!(summary.documents_processed, 2);
        assert_eq!(summary.documents_failed, 0);
        assert_eq!(summary.records.imported, 2);
        assert_eq!(store.row_count("certs").unwrap(), 2);
        assert_eq!(store.sources("certs").unwrap().len(), 2);
    }

    #[test]
    fn test_batch_import_single_mode_with_bindings() {
        let engine = StubEngine::with_documents(&[("a.png", DOC_A)]);
        let fields = two_field_schema();
        let mut store = RecordStore::open_in_memory().unwrap();
        store.create_table("certs", &fields).unwrap();

        let mode = ImportMode::Single {
            bindings: vec![
                Binding::by_indices("name", vec![0]),
                Binding::by_indices("id_card", vec![1]),
            ],
        };
        let importer = BatchImporter::new(&engine, DocumentProcessor::new(), fields);
        let mut registry = ProcessedRegistry::new();
        let summary = importer
            .run(
                &[PathBuf::from("a.png")],
                &mode,
                &mut store,
                "certs",
                &mut registry,
            )
            .unwrap();
        assert_eq!(summary.records.imported, 1);
    }

    #[test]
    fn test_detection_failure_does_not_abort_siblings() {
        let engine = StubEngine::with_documents(&[("a.png", DOC_A)]);
        let fields = two_field_schema();
        let mut store = RecordStore::open_in_memory().unwrap();
        store.create_table("certs", &fields).unwrap();

        let importer = BatchImporter::new(&engine, DocumentProcessor::new(), fields);
        let docs = vec![PathBuf::from("fail.png"), PathBuf::from("a.png")];
        let mut registry = ProcessedRegistry::new();
        let summary = importer
            .run(&docs, &ImportMode::Table, &mut store, "certs", &mut registry)
            .unwrap();
        assert_eq!(summary.documents_failed, 1);
        assert_eq!(summary.documents_processed, 1);
        assert_eq!(summary.records.imported, 1);
    }

    #[test]
    fn test_registry_dedups_within_batch() {
        let engine = StubEngine::with_documents(&[("a.png", DOC_A)]);
        let fields = two_field_schema();
        let mut store = RecordStore::open_in_memory().unwrap();
        store.create_table("certs", &fields).unwrap();

        let importer = BatchImporter::new(&engine, DocumentProcessor::new(), fields);
        let mut registry = ProcessedRegistry::new();
        let docs = vec![PathBuf::from("a.png")];
        importer
            .run(&docs, &ImportMode::Table, &mut store, "certs", &mut registry)
            .unwrap();
        let second = importer
            .run(&docs, &ImportMode::Table, &mut store, "certs", &mut registry)
            .unwrap();
        assert_eq!(second.documents_processed, 0);
        assert_eq!(second.records.imported, 0);
    }

    #[test]
    fn test_dispatcher_discards_superseded_results() {
        let engine: Arc<dyn DetectionEngine> = Arc::new(StubEngine::with_documents(&[
            ("a.png", DOC_A),
            ("b.png", DOC_B),
        ]));
        let dispatcher = OcrDispatcher::spawn(engine, DocumentProcessor::new());

        dispatcher.submit(PathBuf::from("a.png"));
        dispatcher.submit(PathBuf::from("b.png"));

        let outcome = dispatcher
            .recv_current(Duration::from_secs(5))
            .expect("active-generation result");
        assert_eq!(outcome.document, PathBuf::from("b.png"));
        let processed = outcome.result.unwrap();
        assert_eq!(processed.fragments[0].text, "李四");
    }

    #[test]
    fn test_dispatcher_reports_detection_failure() {
        let engine: Arc<dyn DetectionEngine> =
            Arc::new(StubEngine::with_documents(&[("a.png", DOC_A)]));
        let dispatcher = OcrDispatcher::spawn(engine, DocumentProcessor::new());
        dispatcher.submit(PathBuf::from("fail.png"));

        let outcome = dispatcher
            .recv_current(Duration::from_secs(5))
            .expect("result");
        assert!(matches!(
            outcome.result,
            Err(ExtractError::DetectionFailed { .. })
        ));
    }
}
