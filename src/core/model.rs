// StockScan - core/model.rs
//
// Core data model types. Pure data definitions with no I/O and no UI.
// These types are the shared vocabulary across all layers.

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

use crate::util::constants;

// =============================================================================
// Record identity
// =============================================================================

/// Stable synthetic identifier assigned by the record store at insertion.
///
/// Every row binding, edit, and delete goes through this id. The original
/// workflow matched table rows back to records by comparing displayed field
/// values, which silently mis-targets records that share those values; the
/// sequence id removes that failure mode.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default,
)]
pub struct RecordId(pub u64);

impl RecordId {
    /// Placeholder carried by records that have not been inserted yet.
    pub const UNASSIGNED: RecordId = RecordId(0);
}

impl std::fmt::Display for RecordId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

// =============================================================================
// Record kinds
// =============================================================================

/// The active working mode: which record shape scans produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum RecordKind {
    /// Incoming stock ("Entrée").
    #[default]
    Incoming,
    /// Outgoing delivery ("Sortie").
    Outgoing,
    /// Return of a delivered vehicle ("Retour").
    Return,
}

impl RecordKind {
    /// Returns all variants in display order.
    pub fn all() -> &'static [RecordKind] {
        &[RecordKind::Incoming, RecordKind::Outgoing, RecordKind::Return]
    }

    /// Human-readable label as it appears on labels and sheet names.
    pub fn label(&self) -> &'static str {
        match self {
            RecordKind::Incoming => "Entrée",
            RecordKind::Outgoing => "Sortie",
            RecordKind::Return => "Retour",
        }
    }

    /// Movement kinds carry client identity and require chassis resolution.
    pub fn is_movement(&self) -> bool {
        !matches!(self, RecordKind::Incoming)
    }
}

impl std::fmt::Display for RecordKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Direction tag on a movement record. "Retour" shares the Sortie shape and
/// is semantically its reversal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MovementKind {
    Outgoing,
    Return,
}

impl MovementKind {
    pub fn label(&self) -> &'static str {
        match self {
            MovementKind::Outgoing => "Sortie",
            MovementKind::Return => "Retour",
        }
    }
}

// =============================================================================
// Store/search seam
// =============================================================================

/// Shared behaviour every record shape offers the store and the search
/// projection: stable identity, the dedup key, quantity merging, and named
/// field access for display and filtering.
pub trait StockRecord {
    fn record_id(&self) -> RecordId;

    fn set_record_id(&mut self, id: RecordId);

    /// The field duplicate detection keys on (exact string equality).
    fn dedup_key(&self) -> &str;

    fn quantite(&self) -> u32;

    /// Merge another scan of the same key into this record.
    fn add_quantite(&mut self, added: u32);

    /// Display column names, in fixed sheet order.
    fn columns() -> &'static [&'static str]
    where
        Self: Sized;

    /// (column name, rendered value) pairs in the same order as `columns()`.
    fn fields(&self) -> Vec<(&'static str, String)>;
}

// =============================================================================
// Incoming stock ("Entrée")
// =============================================================================

/// One incoming-stock record. `reference` is the dedup key.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct IncomingRecord {
    pub id: RecordId,
    pub reference: String,
    pub fournisseur: String,
    pub designation: String,
    pub chassis: String,
    pub couleur: String,
    pub lot: String,
    pub magasin: String,
    pub relation: String,
    pub quantite: u32,
}

impl IncomingRecord {
    /// Fixed workbook column order. The sheet codec and the search
    /// projection both key on these names.
    pub const COLUMNS: [&'static str; 9] = [
        "Reference",
        "Fournisseur",
        "Designation",
        "Num_Chasse",
        "Couleur",
        "Lot",
        "Magasin",
        "Relation",
        "Qte",
    ];

    /// Empty record with quantity 1 (a scan always represents one unit).
    pub fn new() -> Self {
        Self {
            quantite: 1,
            ..Default::default()
        }
    }
}

impl StockRecord for IncomingRecord {
    fn record_id(&self) -> RecordId {
        self.id
    }

    fn set_record_id(&mut self, id: RecordId) {
        self.id = id;
    }

    fn dedup_key(&self) -> &str {
        &self.reference
    }

    fn quantite(&self) -> u32 {
        self.quantite
    }

    fn add_quantite(&mut self, added: u32) {
        self.quantite = self.quantite.saturating_add(added);
    }

    fn columns() -> &'static [&'static str] {
        &Self::COLUMNS
    }

    fn fields(&self) -> Vec<(&'static str, String)> {
        vec![
            ("Reference", self.reference.clone()),
            ("Fournisseur", self.fournisseur.clone()),
            ("Designation", self.designation.clone()),
            ("Num_Chasse", self.chassis.clone()),
            ("Couleur", self.couleur.clone()),
            ("Lot", self.lot.clone()),
            ("Magasin", self.magasin.clone()),
            ("Relation", self.relation.clone()),
            ("Qte", self.quantite.to_string()),
        ]
    }
}

// =============================================================================
// Movement ("Sortie" / "Retour")
// =============================================================================

/// One outgoing-delivery or return record. `chassis` is the dedup key;
/// client identity fields are read-only after creation and change only
/// through the explicit change-client operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MovementRecord {
    pub id: RecordId,
    pub kind: MovementKind,
    pub date: String,
    pub heure: String,
    pub designation: String,
    pub chassis: String,
    pub client_id: String,
    pub client_name: String,
    pub wilaya: String,
    pub quantite: u32,
}

impl MovementRecord {
    /// Fixed workbook column order. The first seven names are the expected
    /// set used when locating a displaced header row on import.
    pub const COLUMNS: [&'static str; 8] = [
        "Date",
        "Heure",
        "DESIGNATION",
        "N_CHASSIS",
        "ID_CLIENT",
        "NOM_PRENOM",
        "WILAYA",
        "Qte",
    ];

    /// The column names a candidate header row is matched against.
    pub const EXPECTED_HEADER: [&'static str; 7] = [
        "Date",
        "Heure",
        "DESIGNATION",
        "N_CHASSIS",
        "ID_CLIENT",
        "NOM_PRENOM",
        "WILAYA",
    ];
}

impl StockRecord for MovementRecord {
    fn record_id(&self) -> RecordId {
        self.id
    }

    fn set_record_id(&mut self, id: RecordId) {
        self.id = id;
    }

    fn dedup_key(&self) -> &str {
        &self.chassis
    }

    fn quantite(&self) -> u32 {
        self.quantite
    }

    fn add_quantite(&mut self, added: u32) {
        self.quantite = self.quantite.saturating_add(added);
    }

    fn columns() -> &'static [&'static str] {
        &Self::COLUMNS
    }

    fn fields(&self) -> Vec<(&'static str, String)> {
        vec![
            ("Date", self.date.clone()),
            ("Heure", self.heure.clone()),
            ("DESIGNATION", self.designation.clone()),
            ("N_CHASSIS", self.chassis.clone()),
            ("ID_CLIENT", self.client_id.clone()),
            ("NOM_PRENOM", self.client_name.clone()),
            ("WILAYA", self.wilaya.clone()),
            ("Qte", self.quantite.to_string()),
        ]
    }
}

/// Render the date/time pair stamped onto a movement record at creation.
pub fn creation_stamp(now: DateTime<Local>) -> (String, String) {
    (
        now.format(constants::DATE_FORMAT).to_string(),
        now.format(constants::TIME_FORMAT).to_string(),
    )
}
