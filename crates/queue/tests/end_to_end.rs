//! Drives the queue against a snapshot-backed workspace context, the way a
//! language-server frontend would.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use bytes::Bytes;
use scribe_queue::{Error, LifecycleManager, RequestQueue};
use scribe_snapshot::{ChecksumAlgorithm, Snapshot, SourceText, StorageError, StorageLocator, TextEncoding, TextStorage};
use tokio_util::sync::CancellationToken;

/// Process-local stand-in for the shared storage service.
#[derive(Default)]
struct StubStorage {
	regions: Mutex<HashMap<String, Bytes>>,
}

#[async_trait]
impl TextStorage for StubStorage {
	async fn allocate(&self, size: u64) -> Result<StorageLocator, StorageError> {
		let name = format!("region-{}", self.regions.lock().unwrap().len());
		self.regions.lock().unwrap().insert(name.clone(), Bytes::new());
		Ok(StorageLocator::new(name, 0, size))
	}

	async fn write(&self, locator: &StorageLocator, bytes: &[u8]) -> Result<(), StorageError> {
		self.regions.lock().unwrap().insert(locator.name.clone(), Bytes::copy_from_slice(bytes));
		Ok(())
	}

	async fn read(&self, locator: &StorageLocator) -> Result<Bytes, StorageError> {
		self.regions.lock().unwrap().get(&locator.name).cloned().ok_or_else(|| StorageError::Unavailable {
			name: locator.name.clone(),
			reason: "not allocated".into(),
		})
	}

	async fn release(&self, locator: &StorageLocator) -> Result<(), StorageError> {
		self.regions.lock().unwrap().remove(&locator.name);
		Ok(())
	}
}

/// The shared solution state handlers observe. Mutating items replace
/// snapshots; read items only resolve text through them.
#[derive(Clone)]
struct Workspace {
	storage: Arc<StubStorage>,
	documents: Arc<Mutex<HashMap<String, Arc<Snapshot>>>>,
}

impl Workspace {
	fn new() -> Self {
		Self {
			storage: Arc::new(StubStorage::default()),
			documents: Arc::new(Mutex::new(HashMap::new())),
		}
	}

	fn document(&self, uri: &str) -> Option<Arc<Snapshot>> {
		self.documents.lock().unwrap().get(uri).cloned()
	}
}

fn token() -> CancellationToken {
	CancellationToken::new()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn open_query_change_query_exit() {
	let workspace = Workspace::new();
	let queue: RequestQueue<Workspace, String> = RequestQueue::start(workspace.clone());
	let lifecycle = LifecycleManager::new(queue.clone());
	lifecycle.initialize();

	// The host syncs the document into shared storage; opening only records
	// a locator-backed snapshot, reading no content.
	let original = "fn main() {\n    println!(\"hi\");\n}\n";
	let opened = queue
		.enqueue("textDocument/didOpen", true, token(), move |ws: Workspace, _| async move {
			let locator = ws.storage.allocate(original.len() as u64).await?;
			ws.storage.write(&locator, original.as_bytes()).await?;
			let checksum = SourceText::new(original).checksum(ChecksumAlgorithm::Sha256);
			let snapshot = Snapshot::from_storage(locator, checksum, ChecksumAlgorithm::Sha256, TextEncoding::Utf8);
			ws.documents.lock().unwrap().insert("file:///main.rs".into(), Arc::new(snapshot));
			Ok("opened".into())
		})
		.unwrap();
	assert_eq!(opened.await.unwrap(), "opened");

	// Reads materialize the text on demand through the storage collaborator.
	let first_line = |ws: Workspace, _: CancellationToken| async move {
		let snapshot = ws.document("file:///main.rs").ok_or("document not open")?;
		let text = snapshot.text(ws.storage.as_ref()).await?;
		Ok(text.as_str().lines().next().unwrap_or_default().to_string())
	};
	let info = queue.enqueue("textDocument/quickInfo", false, token(), first_line.clone()).unwrap();
	assert_eq!(info.await.unwrap(), "fn main() {");

	// A change produces a new immutable snapshot; it never edits in place.
	let changed = "fn main() {}\n";
	let old_checksum = workspace.document("file:///main.rs").unwrap().checksum();
	let edit = queue
		.enqueue("textDocument/didChange", true, token(), move |ws: Workspace, _| async move {
			let snapshot = Snapshot::from_text(SourceText::new(changed));
			ws.documents.lock().unwrap().insert("file:///main.rs".into(), Arc::new(snapshot));
			Ok("applied".into())
		})
		.unwrap();
	assert_eq!(edit.await.unwrap(), "applied");

	let info = queue.enqueue("textDocument/quickInfo", false, token(), first_line).unwrap();
	assert_eq!(info.await.unwrap(), "fn main() {}");
	assert_ne!(workspace.document("file:///main.rs").unwrap().checksum(), old_checksum);

	lifecycle.exit().await.unwrap();
	let err = queue
		.enqueue("textDocument/didChange", true, token(), |_, _| async { Ok("too late".into()) })
		.unwrap_err();
	assert!(matches!(err, Error::AdmissionRejected { .. }));
}
