//! Integration tests for folder conversion.

mod common;

use std::fs;
use std::path::Path;
use std::sync::{Arc, Mutex};

use common::{pdf_of_size, FakeRich, FakeTextReader, PlainBuilder, RecordingMonitor, MB};
use pdfdocx::{
    BatchConverter, BatchMode, BatchOptions, BatchReport, Checkpoint, Converter, Error,
    MemoryBudget, MemoryMonitor, TextOnlyConverter,
};

fn converter(rich: FakeRich, monitor: Arc<RecordingMonitor>) -> Converter {
    Converter::new(MemoryBudget::new().with_limit_mb(400.0))
        .with_rich_converter(Arc::new(rich))
        .with_monitor(monitor)
        .with_fallback(TextOnlyConverter::new(
            Arc::new(FakeTextReader::new(&["page"])),
            Arc::new(PlainBuilder),
        ))
}

fn three_files(dir: &Path) {
    pdf_of_size(dir, "a.pdf", MB);
    pdf_of_size(dir, "b.pdf", MB);
    pdf_of_size(dir, "c.pdf", MB);
}

#[test]
fn test_failing_item_does_not_stop_batch() {
    let dir = tempfile::tempdir().unwrap();
    three_files(dir.path());
    let monitor = Arc::new(RecordingMonitor::default());
    let rich = FakeRich::writing(2048).failing_on("b.pdf", "invalid page tree");
    let batch = BatchConverter::new(converter(rich.clone(), monitor.clone()), BatchOptions::new());

    let report = batch.convert_batch(dir.path(), None).unwrap();

    assert_eq!(report.succeeded, 2);
    assert_eq!(report.failed, 1);
    assert_eq!(report.total(), 3);
    assert!(report.errors["b.pdf"].contains("invalid page tree"));
    assert!(dir.path().join("a.docx").exists());
    assert!(!dir.path().join("b.docx").exists());
    assert!(dir.path().join("c.docx").exists());
    assert_eq!(rich.renders(), 3);
    assert_eq!(monitor.count(Checkpoint::BetweenItems), 3);
    assert_eq!(monitor.count(Checkpoint::Exit), 3);
}

#[test]
fn test_sequential_mode_processes_in_order() {
    let dir = tempfile::tempdir().unwrap();
    three_files(dir.path());
    let monitor = Arc::new(RecordingMonitor::default());
    let seen = Arc::new(Mutex::new(Vec::new()));
    let seen_by_observer = seen.clone();

    let batch = BatchConverter::new(
        converter(FakeRich::writing(2048), monitor),
        BatchOptions::new(),
    )
    .with_observer(move |item| {
        seen_by_observer
            .lock()
            .unwrap()
            .push((item.index, item.total, item.name.to_string()));
    });
    let report = batch.convert_batch(dir.path(), None).unwrap();

    assert_eq!(report.succeeded, 3);
    assert_eq!(
        *seen.lock().unwrap(),
        vec![
            (1, 3, "a.pdf".to_string()),
            (2, 3, "b.pdf".to_string()),
            (3, 3, "c.pdf".to_string()),
        ]
    );
    let outputs: Vec<_> = report
        .outputs
        .iter()
        .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
        .collect();
    assert_eq!(outputs, vec!["a.docx", "b.docx", "c.docx"]);
}

#[test]
fn test_panicking_item_is_isolated() {
    let dir = tempfile::tempdir().unwrap();
    three_files(dir.path());
    let monitor = Arc::new(RecordingMonitor::default());
    let rich = FakeRich::writing(2048).panicking_on("b.pdf");
    let batch = BatchConverter::new(converter(rich, monitor.clone()), BatchOptions::new());

    let report = batch.convert_batch(dir.path(), None).unwrap();

    assert_eq!(report.succeeded, 2);
    assert_eq!(report.failed, 1);
    assert!(report.errors["b.pdf"].contains("panicked"));
    assert_eq!(monitor.count(Checkpoint::BetweenItems), 3);
    // the exit guard still runs while unwinding
    assert_eq!(monitor.count(Checkpoint::Exit), 3);
}

fn summary(report: &BatchReport) -> (usize, usize, Vec<String>, Vec<String>) {
    let mut outputs: Vec<String> = report
        .outputs
        .iter()
        .map(|p| p.display().to_string())
        .collect();
    outputs.sort();
    let errors = report
        .errors
        .iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect();
    (report.succeeded, report.failed, outputs, errors)
}

#[test]
fn test_parallel_matches_sequential() {
    let dir = tempfile::tempdir().unwrap();
    for i in 0..8 {
        pdf_of_size(dir.path(), &format!("doc{}.pdf", i), MB);
    }
    pdf_of_size(dir.path(), "huge.pdf", 50 * MB);
    let rich = || FakeRich::writing(2048).failing_on("doc3", "broken stream");

    let sequential_out = dir.path().join("seq");
    let sequential = BatchConverter::new(
        converter(rich(), Arc::new(RecordingMonitor::default())),
        BatchOptions::new(),
    )
    .convert_batch(dir.path(), Some(&sequential_out))
    .unwrap();

    let parallel_out = dir.path().join("par");
    let monitor = Arc::new(RecordingMonitor::default());
    let parallel = BatchConverter::new(
        converter(rich(), monitor.clone()),
        BatchOptions::new().parallel(3),
    )
    .convert_batch(dir.path(), Some(&parallel_out))
    .unwrap();

    let (s_ok, s_failed, s_outputs, s_errors) = summary(&sequential);
    let (p_ok, p_failed, p_outputs, p_errors) = summary(&parallel);
    assert_eq!((s_ok, s_failed), (8, 1));
    assert_eq!((p_ok, p_failed), (s_ok, s_failed));
    assert_eq!(p_errors, s_errors);
    assert_eq!(sequential.text_only, 1);
    assert_eq!(parallel.text_only, 1);

    let strip = |outputs: Vec<String>, root: &Path| -> Vec<String> {
        let root = root.display().to_string();
        outputs.into_iter().map(|o| o.replace(&root, "")).collect()
    };
    assert_eq!(
        strip(p_outputs, &parallel_out),
        strip(s_outputs, &sequential_out)
    );
    assert_eq!(monitor.count(Checkpoint::BetweenItems), 9);
    assert_eq!(monitor.count(Checkpoint::Exit), 9);
}

#[test]
fn test_recursive_mirrors_tree_into_output_dir() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("in");
    fs::create_dir_all(input.join("2024/q1")).unwrap();
    pdf_of_size(&input, "top.pdf", MB);
    pdf_of_size(&input.join("2024/q1"), "deep.PDF", MB);
    let output = dir.path().join("out");

    let batch = BatchConverter::new(
        converter(FakeRich::writing(2048), Arc::new(RecordingMonitor::default())),
        BatchOptions::new().recursive(true),
    );
    let report = batch.convert_batch(&input, Some(&output)).unwrap();

    assert_eq!(report.succeeded, 2);
    assert!(output.join("top.docx").exists());
    assert!(output.join("2024/q1/deep.docx").exists());
    assert_eq!(batch.options().mode, BatchMode::MemoryConstrained);
}

#[test]
fn test_missing_folder_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let batch = BatchConverter::new(
        converter(FakeRich::writing(2048), Arc::new(RecordingMonitor::default())),
        BatchOptions::new(),
    );
    let result = batch.convert_batch(&dir.path().join("nope"), None);
    assert!(matches!(result, Err(Error::NotFound(_))));
}

#[test]
fn test_report_serializes_to_json() {
    let dir = tempfile::tempdir().unwrap();
    three_files(dir.path());
    let rich = FakeRich::writing(2048).failing_on("c.pdf", "bad font");
    let batch = BatchConverter::new(
        converter(rich, Arc::new(RecordingMonitor::default())),
        BatchOptions::new(),
    );
    let report = batch.convert_batch(dir.path(), None).unwrap();

    let json = serde_json::to_value(&report).unwrap();
    assert_eq!(json["succeeded"], 2);
    assert_eq!(json["failed"], 1);
    assert!(json["errors"]["c.pdf"]
        .as_str()
        .unwrap()
        .contains("bad font"));
}

#[test]
fn test_case_variants_do_not_share_output() {
    let dir = tempfile::tempdir().unwrap();
    pdf_of_size(dir.path(), "a.pdf", MB);
    pdf_of_size(dir.path(), "a.PDF", MB);
    let rich = FakeRich::writing(2048);

    let batch = BatchConverter::new(
        converter(rich.clone(), Arc::new(RecordingMonitor::default())),
        BatchOptions::new().parallel(2),
    );
    let report = batch.convert_batch(dir.path(), None).unwrap();

    assert_eq!(report.succeeded, 1);
    assert_eq!(report.failed, 1);
    assert_eq!(report.outputs, vec![dir.path().join("a.docx")]);
    // discovery is sorted, so the upper-case name claims the path first
    assert!(report.errors["a.pdf"].contains("collides with a.PDF"));
    assert_eq!(rich.opens(), 1);

    let docx: Vec<_> = fs::read_dir(dir.path())
        .unwrap()
        .filter_map(|e| e.ok())
        .filter(|e| e.path().extension().map_or(false, |x| x == "docx"))
        .collect();
    assert_eq!(docx.len(), 1);
}

/// Panics whenever a batch moves on to the next item.
struct PanicBetweenItems;

impl MemoryMonitor for PanicBetweenItems {
    fn current_memory_mb(&self) -> f64 {
        0.0
    }

    fn reclaim(&self, checkpoint: Checkpoint) {
        if checkpoint == Checkpoint::BetweenItems {
            panic!("collector hook failed");
        }
    }
}

#[test]
fn test_panicking_reclaim_hook_does_not_abort_batch() {
    let dir = tempfile::tempdir().unwrap();
    three_files(dir.path());

    for options in [BatchOptions::new(), BatchOptions::new().parallel(2)] {
        let converter = Converter::new(MemoryBudget::new().with_limit_mb(400.0))
            .with_rich_converter(Arc::new(FakeRich::writing(2048)))
            .with_monitor(Arc::new(PanicBetweenItems));
        let report = BatchConverter::new(converter, options)
            .convert_batch(dir.path(), None)
            .unwrap();

        assert_eq!(report.succeeded, 3);
        assert_eq!(report.failed, 0);
    }
}
