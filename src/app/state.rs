// StockScan - app/state.rs
//
// Application state: the composition root a GUI shell drives. Owns the
// working sets, the scan buffer, the background workers, and the pending
// movement-confirmation flow. All record mutation happens here, on the
// composing thread; workers only ever report through their channels.
//
// The original application did all of this inside one window class; the
// shell's only remaining job against this type is widget wiring.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Local};

use crate::app::debounce::ScanBuffer;
use crate::app::lookup::{LookupManager, LookupProgress};
use crate::app::session::SessionData;
use crate::app::update::{UpdateFeed, UpdateManager, Version};
use crate::core::filter::{search_indices, SearchScope};
use crate::core::model::{
    creation_stamp, IncomingRecord, MovementKind, MovementRecord, RecordId, RecordKind,
    StockRecord,
};
use crate::core::parser::{self, MovementDraft};
use crate::core::resolve::{ClientDirectory, ResolvedClient};
use crate::core::sheet;
use crate::core::store::{MergePolicy, RecordStore, ScanOutcome};
use crate::platform::config::AppConfig;
use crate::util::constants;
use crate::util::error::{Result, StockScanError};

// =============================================================================
// Workflow feedback
// =============================================================================

/// What the workflow wants the operator to know after a scan, a lookup
/// progress drain, or a confirmation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanFeedback {
    /// An incoming record entered the working set.
    IncomingAdded { id: RecordId, reference: String },
    /// A movement record entered the working set.
    MovementAdded { id: RecordId, chassis: String },
    /// The key already existed and quantities were merged (policy A).
    Merged { id: RecordId, quantite: u32 },
    /// The key already existed and the scan was refused (policy B).
    Duplicate { key: String },
    /// The working set is at capacity.
    StoreFull { max: usize },
    /// No key could be extracted from the payload; nothing was created.
    NoRecord,
    /// Movement payload without a chassis number; nothing was created.
    NoChassis { reference: String },
    /// Client resolution is running in the background.
    LookupStarted { chassis: String },
    /// The chassis has no attached client; nothing was created.
    NotReserved { chassis: String },
    /// Client resolution failed (network/service); nothing was created.
    LookupFailed { chassis: String, message: String },
    /// Resolution succeeded; the operator must accept or override the
    /// client before the record is finalised.
    AwaitingConfirmation { chassis: String },
}

/// Movement scan in flight: first resolving, then waiting on the operator.
#[derive(Debug)]
enum PendingMovement {
    Resolving { draft: MovementDraft },
    AwaitingConfirmation {
        draft: MovementDraft,
        client: ResolvedClient,
    },
}

// =============================================================================
// AppState
// =============================================================================

/// Top-level application state.
pub struct AppState {
    /// Active working mode.
    kind: RecordKind,

    /// Incoming working set (active when `kind` is `Incoming`).
    pub incoming: RecordStore<IncomingRecord>,

    /// Movement working set (active when `kind` is `Outgoing`/`Return`).
    pub movements: RecordStore<MovementRecord>,

    /// Scanner keystroke buffer with idle-fire debounce.
    pub scan_buffer: ScanBuffer,

    /// Background client resolution.
    lookup: LookupManager,

    /// Background update check/download.
    pub update: UpdateManager,

    /// The client directory implementation resolutions run against.
    directory: Arc<dyn ClientDirectory>,

    /// Movement scan awaiting resolution or operator confirmation.
    pending: Option<PendingMovement>,

    /// Workbook the active working set is bound to.
    pub workbook_path: Option<PathBuf>,

    /// Search query and scope for the table projection.
    pub search: String,
    pub search_scope: SearchScope,

    /// Indices of records matching the current search (into the active store).
    pub filtered_indices: Vec<usize>,

    /// Status line for the shell.
    pub status_message: String,
}

impl AppState {
    /// Create initial state from validated configuration and a client
    /// directory implementation (the HTTP adapter in production, a fake in
    /// tests).
    pub fn new(config: &AppConfig, directory: Arc<dyn ClientDirectory>) -> Self {
        let mut state = Self {
            kind: RecordKind::default(),
            incoming: RecordStore::new(config.merge_policy),
            movements: RecordStore::new(config.merge_policy),
            scan_buffer: ScanBuffer::new(std::time::Duration::from_millis(config.scan_idle_ms)),
            lookup: LookupManager::new(),
            update: UpdateManager::new(),
            directory,
            pending: None,
            workbook_path: None,
            search: String::new(),
            search_scope: SearchScope::All,
            filtered_indices: Vec::new(),
            status_message: "Ready to scan.".to_string(),
        };
        state.apply_search();
        state
    }

    pub fn kind(&self) -> RecordKind {
        self.kind
    }

    /// Switch the working mode. The working sets, any in-flight lookup, and
    /// the workbook binding belong to the previous mode and are dropped.
    pub fn set_kind(&mut self, kind: RecordKind) {
        if self.kind == kind {
            return;
        }
        tracing::info!(from = %self.kind, to = %kind, "Working mode switched");
        self.kind = kind;
        self.incoming.clear();
        self.movements.clear();
        self.pending = None;
        self.workbook_path = None;
        self.scan_buffer.clear();
        self.apply_search();
        self.status_message = format!("Mode {kind}. Ready to scan.");
    }

    // -------------------------------------------------------------------------
    // Scan input
    // -------------------------------------------------------------------------

    /// Feed scanner keystrokes into the debounce buffer.
    pub fn handle_input(&mut self, text: &str, now: Instant) {
        self.scan_buffer.push_input(text, now);
    }

    /// Drive the workflow: fire the debounce if idle, drain worker
    /// progress. Called from the shell's tick. Returns everything that
    /// happened, in order.
    pub fn tick(&mut self, now: Instant) -> Vec<ScanFeedback> {
        let mut feedback = Vec::new();
        if let Some(payload) = self.scan_buffer.poll(now) {
            feedback.push(self.process_payload(&payload));
        }
        feedback.extend(self.poll_lookups());
        feedback
    }

    /// Parse one complete payload and run it through the workflow.
    pub fn process_payload(&mut self, raw: &str) -> ScanFeedback {
        let feedback = match self.kind {
            RecordKind::Incoming => self.process_incoming_payload(raw),
            RecordKind::Outgoing | RecordKind::Return => self.process_movement_payload(raw),
        };
        self.apply_search();
        self.status_message = status_line(&feedback);
        feedback
    }

    fn process_incoming_payload(&mut self, raw: &str) -> ScanFeedback {
        let Some(record) = parser::parse_incoming(raw) else {
            return ScanFeedback::NoRecord;
        };
        let reference = record.reference.clone();
        match self.incoming.insert(record) {
            ScanOutcome::Added { id } => ScanFeedback::IncomingAdded { id, reference },
            ScanOutcome::Merged { id, quantite } => ScanFeedback::Merged { id, quantite },
            ScanOutcome::Duplicate { key, .. } => ScanFeedback::Duplicate { key },
            ScanOutcome::Full { max } => ScanFeedback::StoreFull { max },
        }
    }

    fn process_movement_payload(&mut self, raw: &str) -> ScanFeedback {
        let Some(draft) = parser::parse_movement(raw) else {
            return ScanFeedback::NoRecord;
        };
        if !draft.has_chassis() {
            return ScanFeedback::NoChassis {
                reference: draft.reference,
            };
        }

        // Reconcile against the working set before spending a lookup.
        let policy = self.movements.policy();
        if let Some(existing) = self.movements.find_by_key_mut(&draft.chassis) {
            return match policy {
                MergePolicy::IncrementQuantity => {
                    existing.add_quantite(1);
                    ScanFeedback::Merged {
                        id: existing.record_id(),
                        quantite: existing.quantite(),
                    }
                }
                MergePolicy::RejectDuplicate => ScanFeedback::Duplicate {
                    key: draft.chassis,
                },
            };
        }

        let chassis = draft.chassis.clone();
        self.pending = Some(PendingMovement::Resolving { draft });
        self.lookup
            .start_resolve(Arc::clone(&self.directory), chassis.clone());
        ScanFeedback::LookupStarted { chassis }
    }

    // -------------------------------------------------------------------------
    // Lookup progress and confirmation
    // -------------------------------------------------------------------------

    /// Drain resolution progress into workflow feedback. A result for a
    /// chassis that is no longer pending is stale (superseded scan, mode
    /// switch) and is dropped.
    pub fn poll_lookups(&mut self) -> Vec<ScanFeedback> {
        let mut feedback = Vec::new();
        for progress in self.lookup.poll_progress() {
            let pending_chassis = match &self.pending {
                Some(PendingMovement::Resolving { draft }) => draft.chassis.clone(),
                _ => continue,
            };

            match progress {
                LookupProgress::Resolved { chassis, client } if chassis == pending_chassis => {
                    let Some(PendingMovement::Resolving { draft }) = self.pending.take() else {
                        continue;
                    };
                    self.pending = Some(PendingMovement::AwaitingConfirmation { draft, client });
                    feedback.push(ScanFeedback::AwaitingConfirmation { chassis });
                }
                LookupProgress::NotReserved { chassis } if chassis == pending_chassis => {
                    self.pending = None;
                    feedback.push(ScanFeedback::NotReserved { chassis });
                }
                LookupProgress::Failed { chassis, message } if chassis == pending_chassis => {
                    self.pending = None;
                    feedback.push(ScanFeedback::LookupFailed { chassis, message });
                }
                stale => {
                    tracing::debug!(?stale, "Dropping stale lookup result");
                }
            }
        }
        if let Some(last) = feedback.last() {
            self.status_message = status_line(last);
        }
        feedback
    }

    /// The resolved client waiting for the operator, if any.
    pub fn pending_confirmation(&self) -> Option<(&MovementDraft, &ResolvedClient)> {
        match &self.pending {
            Some(PendingMovement::AwaitingConfirmation { draft, client }) => {
                Some((draft, client))
            }
            _ => None,
        }
    }

    /// Accept the resolved client and finalise the movement record,
    /// stamping the creation date and time.
    pub fn confirm_pending(&mut self, now: DateTime<Local>) -> Option<ScanFeedback> {
        let Some(PendingMovement::AwaitingConfirmation { draft, client }) = self.pending.take()
        else {
            return None;
        };
        let Some(kind) = self.movement_kind() else {
            // Mode switched away while the dialog was open; nothing to finalise.
            return None;
        };

        let (date, heure) = creation_stamp(now);
        let designation = if draft.designation.is_empty() {
            constants::MOVEMENT_DEFAULT_DESIGNATION.to_string()
        } else {
            draft.designation
        };

        let chassis = draft.chassis.clone();
        let record = MovementRecord {
            id: RecordId::UNASSIGNED,
            kind,
            date,
            heure,
            designation,
            chassis: draft.chassis,
            client_id: client.client_id,
            client_name: client.client_name,
            wilaya: client.wilaya,
            quantite: 1,
        };

        let feedback = match self.movements.insert(record) {
            ScanOutcome::Added { id } => ScanFeedback::MovementAdded { id, chassis },
            ScanOutcome::Merged { id, quantite } => ScanFeedback::Merged { id, quantite },
            ScanOutcome::Duplicate { key, .. } => ScanFeedback::Duplicate { key },
            ScanOutcome::Full { max } => ScanFeedback::StoreFull { max },
        };
        self.apply_search();
        self.status_message = status_line(&feedback);
        Some(feedback)
    }

    /// Swap the resolved client for one the operator picked via manual
    /// search, keeping the confirmation open.
    pub fn override_pending(&mut self, client: ResolvedClient) {
        if let Some(PendingMovement::AwaitingConfirmation { client: slot, .. }) = &mut self.pending
        {
            *slot = client;
        }
    }

    /// Abandon the pending movement without creating a record.
    pub fn cancel_pending(&mut self) {
        self.pending = None;
    }

    // -------------------------------------------------------------------------
    // Manual entry
    // -------------------------------------------------------------------------

    /// Add an incoming record typed into the manual form. Reconciled
    /// against the working set exactly like a scan.
    pub fn add_manual_incoming(&mut self, record: IncomingRecord) -> ScanFeedback {
        let reference = record.reference.clone();
        let feedback = match self.incoming.insert(record) {
            ScanOutcome::Added { id } => ScanFeedback::IncomingAdded { id, reference },
            ScanOutcome::Merged { id, quantite } => ScanFeedback::Merged { id, quantite },
            ScanOutcome::Duplicate { key, .. } => ScanFeedback::Duplicate { key },
            ScanOutcome::Full { max } => ScanFeedback::StoreFull { max },
        };
        self.apply_search();
        self.status_message = status_line(&feedback);
        feedback
    }

    /// Add a movement typed into the manual form, with a client the
    /// operator picked via search. Skips chassis resolution — the operator
    /// chose the client — but not reconciliation or stamping.
    pub fn add_manual_movement(
        &mut self,
        designation: String,
        chassis: String,
        client: ResolvedClient,
        now: DateTime<Local>,
    ) -> Option<ScanFeedback> {
        let kind = self.movement_kind()?;
        let (date, heure) = creation_stamp(now);
        let designation = if designation.is_empty() {
            constants::MOVEMENT_DEFAULT_DESIGNATION.to_string()
        } else {
            designation
        };

        let record = MovementRecord {
            id: RecordId::UNASSIGNED,
            kind,
            date,
            heure,
            designation,
            chassis: chassis.clone(),
            client_id: client.client_id,
            client_name: client.client_name,
            wilaya: client.wilaya,
            quantite: 1,
        };

        let feedback = match self.movements.insert(record) {
            ScanOutcome::Added { id } => ScanFeedback::MovementAdded { id, chassis },
            ScanOutcome::Merged { id, quantite } => ScanFeedback::Merged { id, quantite },
            ScanOutcome::Duplicate { key, .. } => ScanFeedback::Duplicate { key },
            ScanOutcome::Full { max } => ScanFeedback::StoreFull { max },
        };
        self.apply_search();
        self.status_message = status_line(&feedback);
        Some(feedback)
    }

    // -------------------------------------------------------------------------
    // Edits
    // -------------------------------------------------------------------------

    /// Edit the mutable details of a movement record. Client identity is
    /// read-only here; only `change_client` may touch it.
    pub fn edit_movement_details(
        &mut self,
        id: RecordId,
        designation: String,
        quantite: u32,
    ) -> bool {
        let applied = self.movements.update(id, |record| {
            record.designation = designation;
            record.quantite = quantite.max(1);
        });
        self.apply_search();
        applied
    }

    /// Re-bind a movement record to a different client (the explicit
    /// change-client action, fed by a fresh resolution or manual search).
    pub fn change_client(&mut self, id: RecordId, client: ResolvedClient) -> bool {
        let applied = self.movements.update(id, |record| {
            record.client_id = client.client_id;
            record.client_name = client.client_name;
            record.wilaya = client.wilaya;
        });
        self.apply_search();
        applied
    }

    // -------------------------------------------------------------------------
    // Search projection
    // -------------------------------------------------------------------------

    /// Update the search query/scope and recompute the projection.
    pub fn set_search(&mut self, query: String, scope: SearchScope) {
        self.search = query;
        self.search_scope = scope;
        self.apply_search();
    }

    /// Recompute filtered indices from the active store and search state.
    pub fn apply_search(&mut self) {
        self.filtered_indices = match self.kind {
            RecordKind::Incoming => {
                search_indices(self.incoming.records(), &self.search, &self.search_scope)
            }
            RecordKind::Outgoing | RecordKind::Return => {
                search_indices(self.movements.records(), &self.search, &self.search_scope)
            }
        };
    }

    // -------------------------------------------------------------------------
    // Workbook I/O
    // -------------------------------------------------------------------------

    /// Export the active working set to `path` and bind the session to it.
    pub fn save_workbook(&mut self, path: &Path) -> Result<usize> {
        let file = std::fs::File::create(path).map_err(|e| StockScanError::Io {
            path: path.to_path_buf(),
            operation: "create workbook",
            source: e,
        })?;

        let count = match self.kind {
            RecordKind::Incoming => sheet::export_incoming(self.incoming.records(), file, path)?,
            RecordKind::Outgoing | RecordKind::Return => {
                sheet::export_movement(self.movements.records(), file, path)?
            }
        };

        self.workbook_path = Some(path.to_path_buf());
        self.status_message = format!("Saved {count} record(s) to {}.", path.display());
        Ok(count)
    }

    /// Replace the active working set with the contents of `path`.
    pub fn load_workbook(&mut self, path: &Path) -> Result<usize> {
        let file = std::fs::File::open(path).map_err(|e| StockScanError::Io {
            path: path.to_path_buf(),
            operation: "open workbook",
            source: e,
        })?;

        let count = match self.kind {
            RecordKind::Incoming => {
                let records = sheet::import_incoming(file, path)?;
                let count = records.len();
                self.incoming.load(records);
                count
            }
            RecordKind::Outgoing | RecordKind::Return => {
                let kind = if self.kind == RecordKind::Return {
                    MovementKind::Return
                } else {
                    MovementKind::Outgoing
                };
                let records = sheet::import_movement(file, path, kind)?;
                let count = records.len();
                self.movements.load(records);
                count
            }
        };

        self.workbook_path = Some(path.to_path_buf());
        self.apply_search();
        self.status_message = format!("Loaded {count} record(s) from {}.", path.display());
        Ok(count)
    }

    /// Drop the whole working set and the workbook binding.
    pub fn clear_all(&mut self) {
        self.incoming.clear();
        self.movements.clear();
        self.pending = None;
        self.workbook_path = None;
        self.scan_buffer.clear();
        self.apply_search();
        self.status_message = "All records cleared.".to_string();
    }

    // -------------------------------------------------------------------------
    // Update workers
    // -------------------------------------------------------------------------

    /// Kick off a background version check, if a feed is configured.
    pub fn start_update_check(&mut self, config: &AppConfig) {
        let Some(feed) = update_feed(config) else {
            tracing::debug!("No update feed configured; check skipped");
            return;
        };
        self.update.start_check(feed, Version::current());
    }

    /// Kick off a background package download into `data_dir`.
    pub fn start_update_download(&mut self, config: &AppConfig, data_dir: PathBuf) {
        let Some(feed) = update_feed(config) else {
            return;
        };
        self.update.start_download(feed, data_dir);
    }

    // -------------------------------------------------------------------------
    // Session
    // -------------------------------------------------------------------------

    /// Snapshot the restorable parts of this state.
    pub fn to_session(&self) -> SessionData {
        SessionData {
            kind: self.kind,
            workbook_path: self.workbook_path.clone(),
            search: self.search.clone(),
            search_column: match &self.search_scope {
                SearchScope::All => None,
                SearchScope::Column(name) => Some(name.clone()),
            },
            ..SessionData::default()
        }
    }

    /// Restore a previous session snapshot (fresh working sets; workbooks
    /// are re-imported on demand).
    pub fn restore_session(&mut self, session: &SessionData) {
        self.kind = session.kind;
        self.workbook_path = session.workbook_path.clone();
        self.search = session.search.clone();
        self.search_scope = match &session.search_column {
            Some(name) => SearchScope::Column(name.clone()),
            None => SearchScope::All,
        };
        self.apply_search();
    }

    fn movement_kind(&self) -> Option<MovementKind> {
        match self.kind {
            RecordKind::Incoming => None,
            RecordKind::Outgoing => Some(MovementKind::Outgoing),
            RecordKind::Return => Some(MovementKind::Return),
        }
    }
}

fn update_feed(config: &AppConfig) -> Option<UpdateFeed> {
    if config.update_version_url.is_empty() {
        return None;
    }
    Some(UpdateFeed {
        version_url: config.update_version_url.clone(),
        package_url: config.update_package_url.clone(),
        timeout: std::time::Duration::from_secs(config.http_timeout_secs),
    })
}

/// One status line per feedback variant, for the shell's status bar.
fn status_line(feedback: &ScanFeedback) -> String {
    match feedback {
        ScanFeedback::IncomingAdded { reference, .. } => {
            format!("Added record {reference}.")
        }
        ScanFeedback::MovementAdded { chassis, .. } => {
            format!("Added movement for chassis {chassis}.")
        }
        ScanFeedback::Merged { quantite, .. } => {
            format!("Quantity updated to {quantite}.")
        }
        ScanFeedback::Duplicate { key } => format!("Duplicate: {key} is already recorded."),
        ScanFeedback::StoreFull { max } => {
            format!("Working set is full ({max} records).")
        }
        ScanFeedback::NoRecord => "Scan could not be read; no record created.".to_string(),
        ScanFeedback::NoChassis { reference } => {
            format!("No chassis number on label {reference}; no record created.")
        }
        ScanFeedback::LookupStarted { chassis } => {
            format!("Looking up client for chassis {chassis}…")
        }
        ScanFeedback::NotReserved { chassis } => {
            format!("Chassis {chassis} is not reserved to any client.")
        }
        ScanFeedback::LookupFailed { message, .. } => {
            format!("Client lookup failed: {message}")
        }
        ScanFeedback::AwaitingConfirmation { chassis } => {
            format!("Client found for chassis {chassis}; confirm to add.")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::resolve::{
        ClientDetails, ClientPage, ClientQuery, VehicleClient,
    };
    use crate::util::error::ResolveError;
    use chrono::TimeZone;
    use std::time::Duration;

    /// Canned directory: `CH-OK` resolves, `CH-FREE` is not reserved,
    /// anything else is a network fault.
    struct FakeDirectory;

    impl ClientDirectory for FakeDirectory {
        fn vehicle_client(&self, chassis: &str) -> std::result::Result<VehicleClient, ResolveError> {
            match chassis {
                "CH-OK" => Ok(VehicleClient {
                    client_id: "42".to_string(),
                }),
                "CH-FREE" => Err(ResolveError::NotReserved {
                    chassis: chassis.to_string(),
                }),
                other => Err(ResolveError::Transport {
                    message: format!("no route to host for {other}"),
                }),
            }
        }

        fn client_details(
            &self,
            _client_id: &str,
        ) -> std::result::Result<ClientDetails, ResolveError> {
            Ok(ClientDetails {
                nom: "BENALI".to_string(),
                prenom: "Karim".to_string(),
                wilaya: "Béjaïa".to_string(),
            })
        }

        fn search_clients(
            &self,
            _query: &ClientQuery,
            _page: usize,
        ) -> std::result::Result<ClientPage, ResolveError> {
            Ok(ClientPage::default())
        }
    }

    fn state() -> AppState {
        AppState::new(&AppConfig::default(), Arc::new(FakeDirectory))
    }

    fn state_with_policy(policy: MergePolicy) -> AppState {
        let config = AppConfig {
            merge_policy: policy,
            ..AppConfig::default()
        };
        AppState::new(&config, Arc::new(FakeDirectory))
    }

    fn fixed_now() -> DateTime<Local> {
        Local.with_ymd_and_hms(2025, 6, 1, 8, 30, 0).unwrap()
    }

    /// Poll until the in-flight lookup lands, with a deadline.
    fn drain_lookup(state: &mut AppState) -> ScanFeedback {
        let deadline = Instant::now() + Duration::from_secs(5);
        loop {
            if let Some(feedback) = state.poll_lookups().into_iter().next() {
                return feedback;
            }
            assert!(Instant::now() < deadline, "no lookup result within 5s");
            std::thread::sleep(Duration::from_millis(5));
        }
    }

    const LEGACY_PAYLOAD: &str = "*VMSDZ06CUKI191698*\n\
        MOTOCYCLE CUKI -I-\n\
        CUKI\n\
        bleu nuit/ blanc\n\
        Unité Oued-Ghir\n\
        CUKI I 06/2025";

    // -------------------------------------------------------------------------
    // Incoming flow
    // -------------------------------------------------------------------------

    #[test]
    fn test_incoming_scan_creates_record() {
        let mut state = state();
        let feedback = state.process_payload(LEGACY_PAYLOAD);
        assert!(matches!(feedback, ScanFeedback::IncomingAdded { .. }));
        assert_eq!(state.incoming.len(), 1);
        assert_eq!(state.filtered_indices, vec![0]);
        assert_eq!(
            state.incoming.records()[0].reference,
            "VMSDZ06CUKI191698"
        );
    }

    #[test]
    fn test_incoming_duplicate_rejected_by_default() {
        let mut state = state();
        state.process_payload(LEGACY_PAYLOAD);
        let feedback = state.process_payload(LEGACY_PAYLOAD);
        assert!(matches!(feedback, ScanFeedback::Duplicate { .. }));
        assert_eq!(state.incoming.len(), 1);
        assert_eq!(state.incoming.records()[0].quantite, 1);
    }

    #[test]
    fn test_incoming_duplicate_merges_under_increment_policy() {
        let mut state = state_with_policy(MergePolicy::IncrementQuantity);
        state.process_payload(LEGACY_PAYLOAD);
        let feedback = state.process_payload(LEGACY_PAYLOAD);
        assert!(matches!(feedback, ScanFeedback::Merged { quantite: 2, .. }));
        assert_eq!(state.incoming.len(), 1);
    }

    #[test]
    fn test_unreadable_payload_creates_nothing() {
        let mut state = state();
        assert_eq!(state.process_payload("  \n "), ScanFeedback::NoRecord);
        assert!(state.incoming.is_empty());
    }

    // -------------------------------------------------------------------------
    // Movement flow
    // -------------------------------------------------------------------------

    fn movement_payload(chassis: &str) -> String {
        format!("REF-1\nSUPPLIER\nMOTO X\n{chassis}")
    }

    #[test]
    fn test_movement_without_chassis_is_blocked() {
        let mut state = state();
        state.set_kind(RecordKind::Outgoing);
        let feedback = state.process_payload("*REF-1* MOTOCYCLE");
        assert_eq!(
            feedback,
            ScanFeedback::NoChassis {
                reference: "REF-1".to_string()
            }
        );
        assert!(state.movements.is_empty());
    }

    #[test]
    fn test_movement_resolve_confirm_creates_stamped_record() {
        let mut state = state();
        state.set_kind(RecordKind::Outgoing);

        let feedback = state.process_payload(&movement_payload("CH-OK"));
        assert_eq!(
            feedback,
            ScanFeedback::LookupStarted {
                chassis: "CH-OK".to_string()
            }
        );
        assert!(state.movements.is_empty(), "nothing created before confirm");

        let feedback = drain_lookup(&mut state);
        assert_eq!(
            feedback,
            ScanFeedback::AwaitingConfirmation {
                chassis: "CH-OK".to_string()
            }
        );
        let (draft, client) = state.pending_confirmation().expect("pending confirmation");
        assert_eq!(draft.chassis, "CH-OK");
        assert_eq!(client.client_name, "BENALI Karim");

        let feedback = state.confirm_pending(fixed_now()).unwrap();
        assert!(matches!(feedback, ScanFeedback::MovementAdded { .. }));

        let record = &state.movements.records()[0];
        assert_eq!(record.kind, MovementKind::Outgoing);
        assert_eq!(record.date, "01/06/2025");
        assert_eq!(record.heure, "08:30:00");
        assert_eq!(record.designation, "MOTO X");
        assert_eq!(record.client_id, "42");
        assert_eq!(record.wilaya, "Béjaïa");
        assert!(state.pending_confirmation().is_none());
    }

    /// A draft that carries no designation gets the default one at
    /// finalisation.
    #[test]
    fn test_movement_designation_defaults() {
        let mut state = state();
        state.set_kind(RecordKind::Outgoing);
        state.pending = Some(PendingMovement::AwaitingConfirmation {
            draft: MovementDraft {
                reference: "REF-1".to_string(),
                designation: String::new(),
                chassis: "CH-OK".to_string(),
            },
            client: ResolvedClient {
                client_id: "42".to_string(),
                client_name: "BENALI Karim".to_string(),
                wilaya: "Béjaïa".to_string(),
            },
        });

        state.confirm_pending(fixed_now()).unwrap();
        let record = state.movements.records().last().unwrap();
        assert_eq!(record.designation, constants::MOVEMENT_DEFAULT_DESIGNATION);
    }

    /// "Not reserved" blocks creation and leaves no partial record behind.
    #[test]
    fn test_movement_not_reserved_blocks_creation() {
        let mut state = state();
        state.set_kind(RecordKind::Outgoing);
        state.process_payload(&movement_payload("CH-FREE"));

        let feedback = drain_lookup(&mut state);
        assert_eq!(
            feedback,
            ScanFeedback::NotReserved {
                chassis: "CH-FREE".to_string()
            }
        );
        assert!(state.movements.is_empty());
        assert!(state.pending_confirmation().is_none());
    }

    /// Generic failures block creation too, but as their own category.
    #[test]
    fn test_movement_lookup_failure_is_generic() {
        let mut state = state();
        state.set_kind(RecordKind::Outgoing);
        state.process_payload(&movement_payload("CH-DOWN"));

        match drain_lookup(&mut state) {
            ScanFeedback::LookupFailed { chassis, message } => {
                assert_eq!(chassis, "CH-DOWN");
                assert!(message.contains("no route to host"));
            }
            other => panic!("expected LookupFailed, got {other:?}"),
        }
        assert!(state.movements.is_empty());
    }

    /// A chassis already in the working set is reconciled without a lookup.
    #[test]
    fn test_movement_duplicate_skips_lookup() {
        let mut state = state();
        state.set_kind(RecordKind::Outgoing);
        state.process_payload(&movement_payload("CH-OK"));
        drain_lookup(&mut state);
        state.confirm_pending(fixed_now()).unwrap();

        let feedback = state.process_payload(&movement_payload("CH-OK"));
        assert_eq!(
            feedback,
            ScanFeedback::Duplicate {
                key: "CH-OK".to_string()
            }
        );
        assert_eq!(state.movements.len(), 1);
    }

    /// The operator can swap the client before confirming.
    #[test]
    fn test_override_pending_client() {
        let mut state = state();
        state.set_kind(RecordKind::Outgoing);
        state.process_payload(&movement_payload("CH-OK"));
        drain_lookup(&mut state);

        state.override_pending(ResolvedClient {
            client_id: "99".to_string(),
            client_name: "AMRANI Lina".to_string(),
            wilaya: "Alger".to_string(),
        });
        state.confirm_pending(fixed_now()).unwrap();

        let record = &state.movements.records()[0];
        assert_eq!(record.client_id, "99");
        assert_eq!(record.client_name, "AMRANI Lina");
    }

    /// Post-creation edits cannot touch client identity.
    #[test]
    fn test_edit_movement_keeps_client_identity() {
        let mut state = state();
        state.set_kind(RecordKind::Outgoing);
        state.process_payload(&movement_payload("CH-OK"));
        drain_lookup(&mut state);
        state.confirm_pending(fixed_now()).unwrap();
        let id = state.movements.records()[0].id;

        assert!(state.edit_movement_details(id, "SCOOTER".to_string(), 2));
        let record = state.movements.get(id).unwrap();
        assert_eq!(record.designation, "SCOOTER");
        assert_eq!(record.quantite, 2);
        assert_eq!(record.client_id, "42", "client identity untouched");

        assert!(state.change_client(
            id,
            ResolvedClient {
                client_id: "7".to_string(),
                client_name: "X Y".to_string(),
                wilaya: "Oran".to_string(),
            }
        ));
        assert_eq!(state.movements.get(id).unwrap().client_id, "7");
    }

    // -------------------------------------------------------------------------
    // Manual entry
    // -------------------------------------------------------------------------

    #[test]
    fn test_manual_incoming_reconciles_like_a_scan() {
        let mut state = state();
        state.process_payload(LEGACY_PAYLOAD);

        let mut manual = IncomingRecord::new();
        manual.reference = "VMSDZ06CUKI191698".to_string();
        let feedback = state.add_manual_incoming(manual);
        assert!(matches!(feedback, ScanFeedback::Duplicate { .. }));
        assert_eq!(state.incoming.len(), 1);
    }

    #[test]
    fn test_manual_movement_skips_resolution() {
        let mut state = state();
        state.set_kind(RecordKind::Outgoing);

        let feedback = state
            .add_manual_movement(
                String::new(),
                "CH-MANUAL".to_string(),
                ResolvedClient {
                    client_id: "15".to_string(),
                    client_name: "SAID Omar".to_string(),
                    wilaya: "Oran".to_string(),
                },
                fixed_now(),
            )
            .unwrap();
        assert!(matches!(feedback, ScanFeedback::MovementAdded { .. }));

        let record = &state.movements.records()[0];
        assert_eq!(record.designation, constants::MOVEMENT_DEFAULT_DESIGNATION);
        assert_eq!(record.date, "01/06/2025");
        assert_eq!(record.client_id, "15");
    }

    /// Manual movement entry is refused in incoming mode.
    #[test]
    fn test_manual_movement_requires_movement_mode() {
        let mut state = state();
        let feedback = state.add_manual_movement(
            "MOTOS".to_string(),
            "CH-X".to_string(),
            ResolvedClient {
                client_id: "1".to_string(),
                client_name: "A B".to_string(),
                wilaya: "Alger".to_string(),
            },
            fixed_now(),
        );
        assert!(feedback.is_none());
        assert!(state.movements.is_empty());
    }

    // -------------------------------------------------------------------------
    // Search, session, workbook
    // -------------------------------------------------------------------------

    #[test]
    fn test_search_projection_follows_store() {
        let mut state = state();
        state.process_payload("REF-A\nCUKI");
        state.process_payload("REF-B\nYAMAHA");
        state.set_search("cuki".to_string(), SearchScope::All);
        assert_eq!(state.filtered_indices, vec![0]);
        state.set_search(String::new(), SearchScope::All);
        assert_eq!(state.filtered_indices, vec![0, 1]);
    }

    #[test]
    fn test_session_round_trip_through_state() {
        let mut state = state();
        state.set_kind(RecordKind::Return);
        state.workbook_path = Some(PathBuf::from("/tmp/retours.csv"));
        state.set_search("ch".to_string(), SearchScope::Column("N_CHASSIS".into()));

        let session = state.to_session();
        let mut restored = self::state();
        restored.restore_session(&session);

        assert_eq!(restored.kind(), RecordKind::Return);
        assert_eq!(
            restored.workbook_path,
            Some(PathBuf::from("/tmp/retours.csv"))
        );
        assert_eq!(restored.search, "ch");
        assert_eq!(
            restored.search_scope,
            SearchScope::Column("N_CHASSIS".to_string())
        );
    }

    #[test]
    fn test_workbook_save_and_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("entrees.csv");

        let mut state = state();
        state.process_payload(LEGACY_PAYLOAD);
        state.process_payload("REF-B\nYAMAHA\nMOTO Y");
        let written = state.save_workbook(&path).unwrap();
        assert_eq!(written, 2);

        let mut reloaded = self::state();
        let read = reloaded.load_workbook(&path).unwrap();
        assert_eq!(read, 2);
        assert_eq!(reloaded.incoming.len(), 2);
        assert_eq!(
            reloaded.incoming.records()[0].reference,
            "VMSDZ06CUKI191698"
        );
        assert_eq!(reloaded.incoming.records()[1].fournisseur, "YAMAHA");
        assert_eq!(reloaded.workbook_path, Some(path));
    }

    #[test]
    fn test_mode_switch_drops_working_state() {
        let mut state = state();
        state.process_payload(LEGACY_PAYLOAD);
        state.workbook_path = Some(PathBuf::from("/tmp/x.csv"));
        state.set_kind(RecordKind::Outgoing);
        assert!(state.incoming.is_empty());
        assert!(state.workbook_path.is_none());
        assert!(state.filtered_indices.is_empty());
    }

    #[test]
    fn test_tick_debounce_drives_scan() {
        let mut state = state();
        let t0 = Instant::now();
        state.handle_input("REF-T\nCUKI", t0);

        assert!(state.tick(t0).is_empty(), "debounce still open");
        let feedback = state.tick(t0 + Duration::from_millis(constants::DEFAULT_SCAN_IDLE_MS));
        assert!(matches!(
            feedback.as_slice(),
            [ScanFeedback::IncomingAdded { .. }]
        ));
        assert_eq!(state.incoming.len(), 1);
    }
}
