// StockScan - core/sheet.rs
//
// Workbook codec: whole-working-set export and import over any Read/Write
// trait object, in the fixed per-type column order. Import tolerates the
// column-name variants the older application generations wrote, and the
// movement sheets' displaced header (a title row before the real header).
// File opening belongs to the app layer; paths here are error context only.

use std::io::{Read, Write};
use std::path::Path;

use crate::core::model::{IncomingRecord, MovementKind, MovementRecord, StockRecord};
use crate::util::constants;
use crate::util::error::SheetError;

// =============================================================================
// Column-name variants
// =============================================================================

/// Recognised spellings per incoming field, canonical name first. Matching
/// is trimmed and case-insensitive; the first header cell that matches any
/// variant claims the field.
const INCOMING_VARIANTS: [(&str, &[&str]); 9] = [
    ("Reference", &["Reference", "Référence", "ID_Produit"]),
    ("Fournisseur", &["Fournisseur", "Marque"]),
    (
        "Designation",
        &["Designation", "Désignation", "Designation/Reference"],
    ),
    (
        "Num_Chasse",
        &["Num_Chasse", "N_CHASSIS", "Serial_Number", "Serial Number"],
    ),
    ("Couleur", &["Couleur"]),
    ("Lot", &["Lot"]),
    ("Magasin", &["Magasin"]),
    ("Relation", &["Relation"]),
    ("Qte", &["Qte", "QTE", "Quantite", "Quantité"]),
];

/// Recognised spellings per movement field.
const MOVEMENT_VARIANTS: [(&str, &[&str]); 8] = [
    ("Date", &["Date", "DATE"]),
    ("Heure", &["Heure", "HEURE"]),
    ("DESIGNATION", &["DESIGNATION", "Designation"]),
    ("N_CHASSIS", &["N_CHASSIS", "Num_Chasse", "CHASSIS"]),
    ("ID_CLIENT", &["ID_CLIENT", "ID"]),
    ("NOM_PRENOM", &["NOM_PRENOM", "CLIENT"]),
    ("WILAYA", &["WILAYA", "Wilaya"]),
    ("Qte", &["Qte", "QTE"]),
];

fn header_matches(cell: &str, variants: &[&str]) -> bool {
    let cell = cell.trim();
    variants.iter().any(|v| cell.eq_ignore_ascii_case(v))
}

/// Map canonical field names to column indices for one header row.
/// Unclaimed fields are absent from the result and default on import.
fn column_indices(
    header: &csv::StringRecord,
    variants: &[(&'static str, &[&str])],
) -> Vec<(&'static str, usize)> {
    let mut indices = Vec::new();
    for (canonical, spellings) in variants {
        if let Some(idx) = header
            .iter()
            .position(|cell| header_matches(cell, spellings))
        {
            indices.push((*canonical, idx));
        }
    }
    indices
}

fn cell(row: &csv::StringRecord, indices: &[(&str, usize)], field: &str) -> String {
    indices
        .iter()
        .find(|(name, _)| *name == field)
        .and_then(|(_, idx)| row.get(*idx))
        .map(|v| v.trim().to_string())
        .unwrap_or_default()
}

fn cell_quantity(row: &csv::StringRecord, indices: &[(&str, usize)]) -> u32 {
    cell(row, indices, "Qte").parse().unwrap_or(1)
}

// =============================================================================
// Incoming sheets
// =============================================================================

/// Export the incoming working set: canonical header plus one row per
/// record, in store order. Returns the number of data rows written.
pub fn export_incoming<W: Write>(
    records: &[IncomingRecord],
    writer: W,
    path: &Path,
) -> Result<usize, SheetError> {
    write_rows(writer, path, IncomingRecord::columns(), records)
}

/// Import an incoming sheet.
///
/// The first row is the header. Recognised column-name variants map onto
/// current fields; missing cells default to empty (quantity to 1). The
/// reference column is required — without the dedup key the rows cannot
/// enter a working set — and its absence aborts the import.
pub fn import_incoming<R: Read>(
    reader: R,
    path: &Path,
) -> Result<Vec<IncomingRecord>, SheetError> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_reader(reader);

    let header = csv_reader
        .headers()
        .map_err(|e| SheetError::Csv {
            path: path.to_path_buf(),
            source: e,
        })?
        .clone();

    let indices = column_indices(&header, &INCOMING_VARIANTS);
    if !indices.iter().any(|(name, _)| *name == "Reference") {
        return Err(SheetError::MissingColumn {
            path: path.to_path_buf(),
            column: "Reference",
        });
    }

    let mut records = Vec::new();
    for row in csv_reader.records() {
        let row = row.map_err(|e| SheetError::Csv {
            path: path.to_path_buf(),
            source: e,
        })?;
        records.push(IncomingRecord {
            reference: cell(&row, &indices, "Reference"),
            fournisseur: cell(&row, &indices, "Fournisseur"),
            designation: cell(&row, &indices, "Designation"),
            chassis: cell(&row, &indices, "Num_Chasse"),
            couleur: cell(&row, &indices, "Couleur"),
            lot: cell(&row, &indices, "Lot"),
            magasin: cell(&row, &indices, "Magasin"),
            relation: cell(&row, &indices, "Relation"),
            quantite: cell_quantity(&row, &indices),
            ..IncomingRecord::new()
        });
    }

    tracing::info!(path = %path.display(), rows = records.len(), "Incoming sheet imported");
    Ok(records)
}

// =============================================================================
// Movement sheets
// =============================================================================

/// Export a movement working set. Same canonical-header shape as incoming.
pub fn export_movement<W: Write>(
    records: &[MovementRecord],
    writer: W,
    path: &Path,
) -> Result<usize, SheetError> {
    write_rows(writer, path, MovementRecord::columns(), records)
}

/// Import a movement sheet, tolerating a displaced header.
///
/// Handwritten Sortie workbooks often carry a title row (and sometimes
/// blank rows) before the real header. The first rows are scanned for a
/// best-effort header match — at least `HEADER_MIN_MATCHES` of the expected
/// column names — and data rows are read from there. When no row qualifies
/// the sheet is treated as fresh and an empty set is returned.
pub fn import_movement<R: Read>(
    reader: R,
    path: &Path,
    kind: MovementKind,
) -> Result<Vec<MovementRecord>, SheetError> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(reader);

    let mut rows = Vec::new();
    for row in csv_reader.records() {
        rows.push(row.map_err(|e| SheetError::Csv {
            path: path.to_path_buf(),
            source: e,
        })?);
    }

    let Some(header_idx) = locate_header(&rows) else {
        tracing::warn!(
            path = %path.display(),
            "No header row recognised; treating movement sheet as fresh"
        );
        return Ok(Vec::new());
    };

    let indices = column_indices(&rows[header_idx], &MOVEMENT_VARIANTS);

    let mut records = Vec::new();
    for row in &rows[header_idx + 1..] {
        let chassis = cell(row, &indices, "N_CHASSIS");
        let client_id = cell(row, &indices, "ID_CLIENT");
        // A row with neither key nor client is decoration (totals, blanks).
        if chassis.is_empty() && client_id.is_empty() {
            continue;
        }
        records.push(MovementRecord {
            id: crate::core::model::RecordId::UNASSIGNED,
            kind,
            date: cell(row, &indices, "Date"),
            heure: cell(row, &indices, "Heure"),
            designation: cell(row, &indices, "DESIGNATION"),
            chassis,
            client_id,
            client_name: cell(row, &indices, "NOM_PRENOM"),
            wilaya: cell(row, &indices, "WILAYA"),
            quantite: cell_quantity(row, &indices),
        });
    }

    tracing::info!(
        path = %path.display(),
        header_row = header_idx,
        rows = records.len(),
        "Movement sheet imported"
    );
    Ok(records)
}

/// Scan the leading rows for the one that looks like the header.
fn locate_header(rows: &[csv::StringRecord]) -> Option<usize> {
    rows.iter()
        .take(constants::HEADER_SCAN_ROWS)
        .position(|row| {
            let matched = MovementRecord::EXPECTED_HEADER
                .iter()
                .filter(|expected| {
                    row.iter()
                        .any(|c| c.trim().eq_ignore_ascii_case(expected))
                })
                .count();
            matched >= constants::HEADER_MIN_MATCHES
        })
}

// =============================================================================
// Shared writer
// =============================================================================

fn write_rows<W: Write, R: StockRecord>(
    writer: W,
    path: &Path,
    columns: &[&str],
    records: &[R],
) -> Result<usize, SheetError> {
    let mut csv_writer = csv::Writer::from_writer(writer);

    csv_writer
        .write_record(columns)
        .map_err(|e| SheetError::Csv {
            path: path.to_path_buf(),
            source: e,
        })?;

    let mut count = 0;
    for record in records {
        let values: Vec<String> = record.fields().into_iter().map(|(_, v)| v).collect();
        csv_writer
            .write_record(&values)
            .map_err(|e| SheetError::Csv {
                path: path.to_path_buf(),
                source: e,
            })?;
        count += 1;
    }

    csv_writer.flush().map_err(|e| SheetError::Io {
        path: path.to_path_buf(),
        source: e,
    })?;

    Ok(count)
}
