/*!
 * Integration tests for submission processing
 *
 * A submission is claimed against an in-memory conditional-write store and
 * deposited through a recording transport on an inline executor, so every
 * deposit task has finished when `process` returns.
 */

use pass_deposit::model::{AggregatedDepositStatus, Deposit, DepositStatus, File, Repository, Submission};
use pass_deposit::package::format::NihmsNativeFormat;
use pass_deposit::package::{Assembler, AssemblyOptions, Cataloger, PackageStream};
use pass_deposit::service::{
    InlineExecutor, Packager, PackagerRegistry, ProcessingError, ProcessingOutcome,
    StoreSubmissionBuilder, SubmissionProcessor,
};
use pass_deposit::status::{AuthRealm, DepositStatusProcessor, DepositStatusResolver, StatusMapping, StatusResult};
use pass_deposit::transport::{
    DepositReceipt, Transport, TransportError, TransportHints, TransportResponse, TransportResult,
    TransportSession,
};
use pass_deposit_core_critical::{DocumentStore, MemoryStore, ResourceStore};
use std::io::Read;
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

const ARCHIVED: &str = "http://dspace.org/state/archived";

/// Packages received by a [`RecordingTransport`], by package name
type Sent = Arc<Mutex<Vec<(String, Vec<u8>)>>>;

struct RecordingTransport {
    sent: Sent,
    reject: bool,
}

struct RecordingSession {
    sent: Sent,
    reject: bool,
    closed: bool,
}

impl Transport for RecordingTransport {
    fn protocol(&self) -> &'static str {
        "recording"
    }

    fn open(&self, _hints: &TransportHints) -> TransportResult<Box<dyn TransportSession>> {
        Ok(Box::new(RecordingSession {
            sent: Arc::clone(&self.sent),
            reject: self.reject,
            closed: false,
        }))
    }
}

impl TransportSession for RecordingSession {
    fn send(&mut self, package: &dyn PackageStream, _hints: &TransportHints) -> TransportResponse {
        let mut bytes = Vec::new();
        let mut reader = match package.open() {
            Ok(reader) => reader,
            Err(e) => return TransportResponse::Failed(e.into()),
        };
        if let Err(e) = reader.read_to_end(&mut bytes) {
            return TransportResponse::Failed(e.into());
        }
        let name = package.metadata().name().to_string();
        self.sent.lock().unwrap().push((name.clone(), bytes));

        if self.reject {
            return TransportResponse::Failed(TransportError::Rejected {
                status: 400,
                error_uri: None,
                message: "refused".to_string(),
            });
        }
        TransportResponse::Delivered {
            receipt: Some(DepositReceipt {
                status: 201,
                location: Some(format!("https://repo/edit/{name}")),
                edit_iri: Some(format!("https://repo/edit/{name}")),
                statement_ref: Some(format!("https://repo/statement/{name}")),
            }),
        }
    }

    fn close(&mut self) -> TransportResult<()> {
        self.closed = true;
        Ok(())
    }

    fn closed(&self) -> bool {
        self.closed
    }
}

struct ArchivedResolver;

impl DepositStatusResolver for ArchivedResolver {
    fn resolve(&self, _status_ref: &str, _realm: Option<&AuthRealm>) -> StatusResult<Option<String>> {
        Ok(Some(ARCHIVED.to_string()))
    }
}

struct Fixture {
    _dir: TempDir,
    store: Arc<MemoryStore>,
    registry: Arc<PackagerRegistry>,
    sent: Sent,
}

impl Fixture {
    fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(MemoryStore::new());

        let path = dir.path().join("manuscript.pdf");
        std::fs::write(&path, b"%PDF-1.4 manuscript").unwrap();
        store
            .persist(&File::new("file-1", "manuscript.pdf", format!("file:{}", path.display())))
            .unwrap();

        Self {
            _dir: dir,
            store,
            registry: Arc::new(PackagerRegistry::new()),
            sent: Arc::new(Mutex::new(Vec::new())),
        }
    }

    fn repository(&self, id: &str, name: &str) {
        self.store.persist(&Repository::new(id, name)).unwrap();
    }

    fn packager(&self, name: &str, reject: bool) -> Packager {
        let assembler = Assembler::new(
            Arc::new(NihmsNativeFormat),
            Arc::new(Cataloger::default()),
            AssemblyOptions::default(),
        );
        let transport = Arc::new(RecordingTransport {
            sent: Arc::clone(&self.sent),
            reject,
        });
        Packager::new(name, assembler, transport, TransportHints::new())
    }

    fn submission(&self, id: &str, repositories: &[&str], files: &[&str]) {
        let mut submission = Submission::new(id);
        submission.submitted = true;
        submission.repositories = repositories.iter().map(|r| r.to_string()).collect();
        submission.files = files.iter().map(|f| f.to_string()).collect();
        submission.metadata.manuscript.title = Some("A Study of Deposits".to_string());
        self.store.persist(&submission).unwrap();
    }

    fn processor(&self) -> SubmissionProcessor {
        let store: Arc<dyn DocumentStore> = self.store.clone();
        SubmissionProcessor::new(
            Arc::clone(&store),
            Arc::new(StoreSubmissionBuilder::new(store)),
            Arc::clone(&self.registry),
            Arc::new(DepositStatusProcessor::new(Arc::new(ArchivedResolver))),
            Arc::new(InlineExecutor),
        )
    }

    fn deposits(&self) -> Vec<Deposit> {
        self.store
            .list("deposit")
            .unwrap()
            .iter()
            .map(|id| self.store.fetch::<Deposit>(id).unwrap())
            .collect()
    }

    fn deposit_for(&self, repository: &str) -> Deposit {
        self.deposits()
            .into_iter()
            .find(|d| d.repository == repository)
            .unwrap()
    }

    fn submission_status(&self, id: &str) -> AggregatedDepositStatus {
        self.store
            .fetch::<Submission>(id)
            .unwrap()
            .aggregated_deposit_status
    }
}

#[test]
fn test_deposits_into_every_repository() {
    let fixture = Fixture::new();
    fixture.repository("repo-1", "PMC");
    fixture.repository("repo-2", "JScholarship");
    fixture.registry.register(fixture.packager("PMC", false));
    fixture.registry.register(fixture.packager("JScholarship", false));
    fixture.submission("sub-1", &["repo-1", "repo-2"], &["file-1"]);

    let outcome = fixture.processor().process("sub-1").unwrap();

    let ProcessingOutcome::Dispatched(summary) = outcome else {
        panic!("expected dispatch, got {:?}", outcome);
    };
    assert_eq!(summary.dispatched.len(), 2);
    assert!(summary.failed.is_empty());
    assert_eq!(fixture.submission_status("sub-1"), AggregatedDepositStatus::InProgress);

    for repository in ["repo-1", "repo-2"] {
        let deposit = fixture.deposit_for(repository);
        assert_eq!(deposit.submission, "sub-1");
        assert_eq!(deposit.deposit_status, Some(DepositStatus::Submitted));
        assert_eq!(
            deposit.deposit_status_ref.as_deref(),
            Some("https://repo/statement/AStudyofDeposits.tar.gz")
        );
    }

    let sent = fixture.sent.lock().unwrap();
    assert_eq!(sent.len(), 2);
    assert!(sent.iter().all(|(name, bytes)| name == "AStudyofDeposits.tar.gz" && !bytes.is_empty()));
}

#[test]
fn test_submission_without_files_keeps_its_status() {
    let fixture = Fixture::new();
    fixture.repository("repo-1", "PMC");
    fixture.registry.register(fixture.packager("PMC", false));
    fixture.submission("sub-1", &["repo-1"], &[]);

    let err = fixture.processor().process("sub-1").unwrap_err();

    match &err {
        ProcessingError::Postcondition { reason, .. } => {
            assert!(reason.contains("no files attached"), "{}", reason)
        }
        other => panic!("expected a postcondition failure, got {:?}", other),
    }
    assert_eq!(fixture.submission_status("sub-1"), AggregatedDepositStatus::NotStarted);
    assert!(fixture.deposits().is_empty());
    assert!(fixture.sent.lock().unwrap().is_empty());
}

#[test]
fn test_missing_packager_fails_only_that_repository() {
    let fixture = Fixture::new();
    fixture.repository("repo-1", "PMC");
    fixture.repository("repo-2", "Unconfigured");
    fixture.registry.register(fixture.packager("PMC", false));
    fixture.submission("sub-1", &["repo-1", "repo-2"], &["file-1"]);

    let outcome = fixture.processor().process("sub-1").unwrap();

    let ProcessingOutcome::Dispatched(summary) = outcome else {
        panic!("expected dispatch, got {:?}", outcome);
    };
    assert_eq!(summary.dispatched.len(), 1);
    assert_eq!(summary.failed.len(), 1);
    assert_eq!(summary.failed[0].0, "repo-2");
    assert!(summary.failed[0].1.contains("Unconfigured"));

    assert_eq!(
        fixture.deposit_for("repo-1").deposit_status,
        Some(DepositStatus::Submitted)
    );
    assert_eq!(
        fixture.deposit_for("repo-2").deposit_status,
        Some(DepositStatus::Failed)
    );
    assert_eq!(fixture.sent.lock().unwrap().len(), 1);
}

#[test]
fn test_ineligible_submission_is_skipped() {
    let fixture = Fixture::new();
    fixture.repository("repo-1", "PMC");
    fixture.registry.register(fixture.packager("PMC", false));

    let mut draft = Submission::new("draft");
    draft.repositories = vec!["repo-1".to_string()];
    draft.files = vec!["file-1".to_string()];
    fixture.store.persist(&draft).unwrap();

    let outcome = fixture.processor().process("draft").unwrap();

    assert!(matches!(outcome, ProcessingOutcome::Skipped { .. }));
    assert_eq!(fixture.submission_status("draft"), AggregatedDepositStatus::NotStarted);
    assert!(fixture.deposits().is_empty());
}

#[test]
fn test_redelivered_event_deposits_once() {
    let fixture = Fixture::new();
    fixture.repository("repo-1", "PMC");
    fixture.registry.register(fixture.packager("PMC", false));
    fixture.submission("sub-1", &["repo-1"], &["file-1"]);

    let processor = fixture.processor();
    assert!(matches!(
        processor.process("sub-1").unwrap(),
        ProcessingOutcome::Dispatched(_)
    ));
    assert!(matches!(
        processor.process("sub-1").unwrap(),
        ProcessingOutcome::Skipped { .. }
    ));

    assert_eq!(fixture.deposits().len(), 1);
    assert_eq!(fixture.sent.lock().unwrap().len(), 1);
}

#[test]
fn test_rejected_deposit_is_marked_failed() {
    let fixture = Fixture::new();
    fixture.repository("repo-1", "PMC");
    fixture.repository("repo-2", "JScholarship");
    fixture.registry.register(fixture.packager("PMC", true));
    fixture.registry.register(fixture.packager("JScholarship", false));
    fixture.submission("sub-1", &["repo-1", "repo-2"], &["file-1"]);

    fixture.processor().process("sub-1").unwrap();

    let rejected = fixture.deposit_for("repo-1");
    assert_eq!(rejected.deposit_status, Some(DepositStatus::Failed));
    assert!(rejected.deposit_status_ref.is_none());
    assert_eq!(
        fixture.deposit_for("repo-2").deposit_status,
        Some(DepositStatus::Submitted)
    );
}

#[test]
fn test_status_resolved_right_after_send() {
    let fixture = Fixture::new();
    fixture.repository("repo-1", "JScholarship");
    fixture.registry.register(
        fixture
            .packager("JScholarship", false)
            .with_status_mapping(StatusMapping::new(Some("submitted")).with(ARCHIVED, "accepted"))
            .with_resolve_status(true),
    );
    fixture.submission("sub-1", &["repo-1"], &["file-1"]);

    fixture.processor().process("sub-1").unwrap();

    assert_eq!(
        fixture.deposit_for("repo-1").deposit_status,
        Some(DepositStatus::Accepted)
    );
}

#[test]
fn test_unknown_submission_is_an_error() {
    let fixture = Fixture::new();
    let err = fixture.processor().process("nope").unwrap_err();
    assert!(err.to_string().contains("nope"), "{}", err);
}
