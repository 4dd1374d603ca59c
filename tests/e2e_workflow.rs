// StockScan - tests/e2e_workflow.rs
//
// End-to-end tests for the scan → reconcile → resolve → persist workflow.
//
// These tests exercise the real parser, the real stores, real workbook
// files on disk, and the real background lookup worker (against an
// in-process directory implementation) — the full path from a raw scanned
// payload to rows in a workbook and back.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::TimeZone;

use stockscan::app::state::{AppState, ScanFeedback};
use stockscan::core::model::RecordKind;
use stockscan::core::resolve::{
    ClientDetails, ClientDirectory, ClientPage, ClientQuery, VehicleClient,
};
use stockscan::platform::config::AppConfig;
use stockscan::util::error::ResolveError;

// =============================================================================
// Helpers
// =============================================================================

/// Directory with two reserved chassis and everything else free.
struct CannedDirectory;

impl ClientDirectory for CannedDirectory {
    fn vehicle_client(&self, chassis: &str) -> Result<VehicleClient, ResolveError> {
        match chassis {
            "CUKI I 06/2025" => Ok(VehicleClient {
                client_id: "42".to_string(),
            }),
            "CH-200" => Ok(VehicleClient {
                client_id: "77".to_string(),
            }),
            other => Err(ResolveError::NotReserved {
                chassis: other.to_string(),
            }),
        }
    }

    fn client_details(&self, client_id: &str) -> Result<ClientDetails, ResolveError> {
        match client_id {
            "42" => Ok(ClientDetails {
                nom: "BENALI".to_string(),
                prenom: "Karim".to_string(),
                wilaya: "Béjaïa".to_string(),
            }),
            _ => Ok(ClientDetails {
                nom: "AMRANI".to_string(),
                prenom: "Lina".to_string(),
                wilaya: "Alger".to_string(),
            }),
        }
    }

    fn search_clients(
        &self,
        _query: &ClientQuery,
        _page: usize,
    ) -> Result<ClientPage, ResolveError> {
        Ok(ClientPage::default())
    }
}

fn fresh_state() -> AppState {
    AppState::new(&AppConfig::default(), Arc::new(CannedDirectory))
}

fn fixed_now() -> chrono::DateTime<chrono::Local> {
    chrono::Local.with_ymd_and_hms(2025, 6, 1, 8, 30, 0).unwrap()
}

/// Poll the state until the in-flight lookup lands, with a deadline.
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

const LEGACY_LABEL: &str = "*VMSDZ06CUKI191698*\n\
    MOTOCYCLE CUKI -I-\n\
    CUKI\n\
    bleu nuit/ blanc\n\
    Unité Oued-Ghir\n\
    CUKI I 06/2025";

// =============================================================================
// Incoming E2E
// =============================================================================

/// Scan two labels, persist the working set, re-import it into a fresh
/// session, and verify nothing was lost or reshaped on the way.
#[test]
fn e2e_incoming_scan_to_workbook_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("entrees.csv");

    let mut state = fresh_state();
    assert!(matches!(
        state.process_payload(LEGACY_LABEL),
        ScanFeedback::IncomingAdded { .. }
    ));
    assert!(matches!(
        state.process_payload("REF-B\nYAMAHA\nMOTO Y\nCH-B\nnoir"),
        ScanFeedback::IncomingAdded { .. }
    ));
    assert_eq!(state.save_workbook(&path).unwrap(), 2);

    let mut restored = fresh_state();
    assert_eq!(restored.load_workbook(&path).unwrap(), 2);

    let first = &restored.incoming.records()[0];
    assert_eq!(first.reference, "VMSDZ06CUKI191698");
    assert_eq!(first.fournisseur, "VMS"); // brand override survives persistence
    assert_eq!(first.designation, "MOTOCYCLE CUKI -I-");
    assert_eq!(first.couleur, "bleu nuit/ blanc");
    assert_eq!(first.magasin, "Unité Oued-Ghir");
    assert_eq!(first.chassis, "CUKI I 06/2025");
    assert_eq!(first.lot, "");

    let second = &restored.incoming.records()[1];
    assert_eq!(second.fournisseur, "YAMAHA");
    assert_eq!(second.couleur, "noir");

    // The restored working set reconciles duplicates against imported rows.
    assert!(matches!(
        restored.process_payload(LEGACY_LABEL),
        ScanFeedback::Duplicate { .. }
    ));
    assert_eq!(restored.incoming.len(), 2);
}

// =============================================================================
// Movement E2E
// =============================================================================

/// Full movement path: scan → background resolution → confirm → persist →
/// re-import.
#[test]
fn e2e_movement_resolution_to_workbook() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("sorties.csv");

    let mut state = fresh_state();
    state.set_kind(RecordKind::Outgoing);

    assert!(matches!(
        state.process_payload(LEGACY_LABEL),
        ScanFeedback::LookupStarted { .. }
    ));
    assert!(matches!(
        drain_lookup(&mut state),
        ScanFeedback::AwaitingConfirmation { .. }
    ));
    assert!(matches!(
        state.confirm_pending(fixed_now()),
        Some(ScanFeedback::MovementAdded { .. })
    ));

    assert_eq!(state.save_workbook(&path).unwrap(), 1);

    let mut restored = fresh_state();
    restored.set_kind(RecordKind::Outgoing);
    assert_eq!(restored.load_workbook(&path).unwrap(), 1);

    let record = &restored.movements.records()[0];
    assert_eq!(record.date, "01/06/2025");
    assert_eq!(record.heure, "08:30:00");
    assert_eq!(record.designation, "MOTOCYCLE CUKI -I-");
    assert_eq!(record.chassis, "CUKI I 06/2025");
    assert_eq!(record.client_id, "42");
    assert_eq!(record.client_name, "BENALI Karim");
    assert_eq!(record.wilaya, "Béjaïa");
}

/// An unreserved chassis blocks creation end to end; the store stays empty
/// through the whole flow.
#[test]
fn e2e_unreserved_chassis_creates_nothing() {
    let mut state = fresh_state();
    state.set_kind(RecordKind::Outgoing);

    state.process_payload("REF-X\nSUP\nMOTO\nCH-UNKNOWN");
    assert!(matches!(
        drain_lookup(&mut state),
        ScanFeedback::NotReserved { .. }
    ));
    assert!(state.movements.is_empty());
    assert!(state.pending_confirmation().is_none());
    assert!(state.confirm_pending(fixed_now()).is_none());
}

/// Loading a movement workbook written by hand (title row before the real
/// header) still lands the rows.
#[test]
fn e2e_movement_workbook_with_title_row() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("sorties.csv");
    std::fs::write(
        &path,
        "Sorties Juin 2025,,,,,,,\n\
         Date,Heure,DESIGNATION,N_CHASSIS,ID_CLIENT,NOM_PRENOM,WILAYA,Qte\n\
         01/06/2025,09:00:00,MOTOS,CH-200,77,AMRANI Lina,Alger,1\n",
    )
    .unwrap();

    let mut state = fresh_state();
    state.set_kind(RecordKind::Outgoing);
    assert_eq!(state.load_workbook(&path).unwrap(), 1);
    assert_eq!(state.movements.records()[0].client_name, "AMRANI Lina");

    // The imported chassis participates in duplicate detection.
    assert!(matches!(
        state.process_payload("REF\nSUP\nMOTO\nCH-200"),
        ScanFeedback::Duplicate { .. }
    ));
}

// =============================================================================
// Session E2E
// =============================================================================

/// Session snapshot survives a restart through the real session file.
#[test]
fn e2e_session_survives_restart() {
    use stockscan::app::session;
    use stockscan::core::filter::SearchScope;

    let dir = tempfile::tempdir().unwrap();
    let path = session::session_path(dir.path());

    let mut state = fresh_state();
    state.set_kind(RecordKind::Return);
    state.workbook_path = Some(PathBuf::from("/depot/retours.csv"));
    state.set_search("cuki".to_string(), SearchScope::Column("N_CHASSIS".into()));
    session::save(&state.to_session(), &path).unwrap();

    let mut restored = fresh_state();
    let loaded = session::load(&path).expect("session should load");
    restored.restore_session(&loaded);

    assert_eq!(restored.kind(), RecordKind::Return);
    assert_eq!(
        restored.workbook_path,
        Some(PathBuf::from("/depot/retours.csv"))
    );
    assert_eq!(restored.search, "cuki");
}
