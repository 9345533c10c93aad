//! One sync round from start to finish

use crate::collision::separate_path_collisions;
use crate::consolidate::{consolidate_initial, consolidate_with_metadata};
use crate::content::read_contents;
use crate::item::{FileClientStore, FileStore, FileSyncRequest, FileSyncResponse};
use crate::metadata::load_metadata;
use crate::persist::{save_client_store, TreeSwap};
use crate::report::SyncReport;
use crate::transport::SyncTransport;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tidesync_merge::{make_sync_request, merge_sync_response_from_server};
use tidesync_types::{Error, FileFilter, ItemId, Result, ServerIdentity};
use tracing::{debug, info, warn};

/// Upper bound on extra requests spent settling items that share a path
const MAX_FOLLOW_UP_REQUESTS: usize = 3;

/// Where a client keeps its files and its metadata
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncSettings {
    /// Directory whose files are synchronized
    pub contents_dir: PathBuf,
    /// File recording the last successful sync
    pub metadata_file: PathBuf,
    /// Which paths take part
    pub filter: FileFilter,
}

impl SyncSettings {
    /// Settings with the default filter
    pub fn new<P: Into<PathBuf>, Q: Into<PathBuf>>(contents_dir: P, metadata_file: Q) -> Self {
        Self {
            contents_dir: contents_dir.into(),
            metadata_file: metadata_file.into(),
            filter: FileFilter::default(),
        }
    }

    /// Set the file filter
    #[must_use]
    pub fn with_filter(mut self, filter: FileFilter) -> Self {
        self.filter = filter;
        self
    }
}

/// Drives sync rounds for one contents directory
#[derive(Debug)]
pub struct SyncClient<T> {
    settings: SyncSettings,
    transport: T,
}

impl<T: SyncTransport> SyncClient<T> {
    /// Create a client
    pub fn new(settings: SyncSettings, transport: T) -> Self {
        Self {
            settings,
            transport,
        }
    }

    /// The client's settings
    pub fn settings(&self) -> &SyncSettings {
        &self.settings
    }

    /// The transport requests go through
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Mutable access to the transport
    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// Give back the transport
    pub fn into_transport(self) -> T {
        self.transport
    }

    /// Run one complete round
    ///
    /// Reads the metadata and the contents directory, exchanges one request
    /// with the server (two on the very first round), and writes the result
    /// back. When the server turns out to hold several items at one path, up
    /// to three further requests settle them first.
    /// Nothing is written unless the whole exchange succeeds, and nothing is
    /// sent while an interrupted write is still unrecovered. A server whose
    /// identity differs from the recorded one fails the round with
    /// [`Error::ServerReset`].
    pub async fn run_round(&mut self) -> Result<SyncReport> {
        let started = Instant::now();
        info!(
            "Syncing '{}' with metadata '{}'",
            self.settings.contents_dir.display(),
            self.settings.metadata_file.display()
        );

        TreeSwap::new(&self.settings.contents_dir)?
            .ensure_no_retired_tree()
            .await?;

        let metadata = load_metadata(&self.settings.metadata_file).await?;
        debug!("Metadata: {:?}", metadata);

        let mut report = SyncReport::new(metadata.is_none());
        let client_store = match metadata {
            None => self.initial_store(&mut report).await?,
            Some(metadata) => {
                let files = read_contents(&self.settings.contents_dir, self.settings.filter).await?;
                FileClientStore {
                    server_identity: metadata.server_identity,
                    store: consolidate_with_metadata(&metadata.items, files)?,
                }
            }
        };
        debug!("Store before sync: {:?}", client_store);

        let server_identity = client_store.server_identity;
        let mut store = self.exchange_and_merge(client_store, &mut report).await?;

        for _ in 0..MAX_FOLLOW_UP_REQUESTS {
            store = separate_path_collisions(store);
            if !store.has_pending_changes() {
                break;
            }
            info!("Sending a follow-up request for items that share a path");
            store = self
                .exchange_and_merge(
                    FileClientStore {
                        server_identity,
                        store,
                    },
                    &mut report,
                )
                .await?;
        }

        let synced = FileClientStore {
            server_identity,
            store,
        };
        debug!("Store after sync: {:?}", synced);

        let metadata = save_client_store(&self.settings, &synced).await?;
        report.files_tracked = metadata.items.len();
        report.duration = started.elapsed();

        info!(
            "Sync complete: {} uploaded, {} changed, {} deleted, {} received, {} removed, {} conflicts",
            report.uploaded,
            report.changes_pushed,
            report.deletions_pushed,
            report.received,
            report.removed_by_server,
            report.conflicts
        );
        Ok(report)
    }

    // The first request carries nothing, so there is no identity to check yet.
    async fn initial_store(&mut self, report: &mut SyncReport) -> Result<FileClientStore> {
        info!("No metadata found, downloading the server's items first");

        let response = self.exchange(FileSyncRequest::empty()).await?;
        report.record(&response.items);

        let store = merge_sync_response_from_server(FileStore::empty(), response.items);
        let files = read_contents(&self.settings.contents_dir, self.settings.filter).await?;

        Ok(FileClientStore {
            server_identity: response.server_identity,
            store: consolidate_initial(store, files)?,
        })
    }

    async fn exchange_and_merge(
        &mut self,
        client_store: FileClientStore,
        report: &mut SyncReport,
    ) -> Result<FileStore> {
        let request = make_sync_request(&client_store.store);
        let response = self.exchange(request).await?;
        ensure_same_server(client_store.server_identity, &response)?;

        log_server_decisions(&client_store.store, &response);
        report.record(&response.items);

        Ok(merge_sync_response_from_server(
            client_store.store,
            response.items,
        ))
    }

    async fn exchange(&mut self, request: FileSyncRequest) -> Result<FileSyncResponse> {
        debug!("Sync request: {:?}", request);
        let response = self.transport.sync(request).await?;
        debug!("Sync response: {:?}", response);
        Ok(response)
    }
}

fn ensure_same_server(expected: ServerIdentity, response: &FileSyncResponse) -> Result<()> {
    if response.server_identity != expected {
        return Err(Error::ServerReset {
            expected,
            actual: response.server_identity,
        });
    }
    Ok(())
}

fn log_server_decisions(store: &FileStore, response: &FileSyncResponse) {
    let items = &response.items;

    for (id, timed) in &items.conflicts {
        warn!(
            "Conflict on '{}': both sides changed it, keeping the server version",
            timed.value.path.display()
        );
        debug!("Conflicting item: {}", id);
    }
    for timed in items.conflicts_client_deleted.values() {
        warn!(
            "Conflict on '{}': deleted locally but changed on the server, restoring it",
            timed.value.path.display()
        );
    }
    for id in &items.conflicts_server_deleted {
        warn!(
            "Conflict on '{}': changed locally but deleted on the server, dropping the change",
            path_of(store, id).display()
        );
    }
    for id in &items.server_deleted {
        warn!("'{}' was deleted on the server", path_of(store, id).display());
    }
}

fn path_of<'a>(store: &'a FileStore, id: &ItemId) -> &'a Path {
    store
        .synced()
        .get(id)
        .or_else(|| store.synced_but_changed().get(id))
        .map_or_else(|| Path::new("<unknown>"), |timed| timed.value.path.as_path())
}
