// StockScan - core/parser.rs
//
// QR payload parsing. A raw scanned string (the scanner terminates input by
// keystroke pause, not by an explicit delimiter) is mapped to one typed
// draft by structural sniffing, with graceful degradation: whatever the
// detected format does not provide stays empty, and parsing never fails
// past "no key could be extracted".
//
// Four structural variants are accepted:
//   - legacy block:     first line wrapped in asterisks, fixed trailing order
//   - structured block: one field per line in a fixed per-type order
//   - inline asterisk:  single line, key inside the first *...* span
//   - bare key:         anything else, the whole string is the key

use regex::Regex;
use std::sync::OnceLock;

use crate::core::model::IncomingRecord;
use crate::util::constants;

/// First `*...*` span on a single-line payload.
fn asterisk_span() -> &'static Regex {
    static ASTERISK_SPAN: OnceLock<Regex> = OnceLock::new();
    ASTERISK_SPAN.get_or_init(|| Regex::new(r"\*([^*]+)\*").expect("asterisk_span: invalid regex"))
}

// =============================================================================
// Structural sniffing
// =============================================================================

/// Detected payload shape, decided before any field mapping is applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadFormat {
    /// Multi-line, first line wrapped in `*...*` (older label generator).
    LegacyBlock,
    /// Multi-line, one field per line in fixed order (newer generator).
    StructuredBlock,
    /// Single line carrying a `*...*` span plus optional trailing text.
    InlineAsterisk,
    /// Single line with no recognisable structure; the whole string is the key.
    BareKey,
}

/// Split a raw payload into trimmed, non-empty lines (any newline convention).
fn payload_lines(raw: &str) -> Vec<&str> {
    raw.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect()
}

/// `*...*` wrapping check for a whole line.
fn wrapped_in_asterisks(line: &str) -> bool {
    line.len() >= 2 && line.starts_with('*') && line.ends_with('*')
}

/// Decide which parse strategy a payload gets.
pub fn detect_format(raw: &str) -> PayloadFormat {
    let lines = payload_lines(raw);
    match lines.as_slice() {
        [] => PayloadFormat::BareKey,
        [single] => {
            if single.contains('*') {
                PayloadFormat::InlineAsterisk
            } else {
                PayloadFormat::BareKey
            }
        }
        [first, ..] => {
            if wrapped_in_asterisks(first) {
                PayloadFormat::LegacyBlock
            } else {
                PayloadFormat::StructuredBlock
            }
        }
    }
}

// =============================================================================
// Incoming ("Entrée") parsing
// =============================================================================

/// Settable fields of an incoming record, used by the positional mapping
/// tables. Replaces the original's attribute-name-string dispatch with an
/// order the compiler checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum IncomingField {
    Reference,
    Fournisseur,
    Designation,
    Chassis,
    Couleur,
    Lot,
    Magasin,
    Relation,
}

impl IncomingField {
    fn set(self, record: &mut IncomingRecord, value: &str) {
        let slot = match self {
            IncomingField::Reference => &mut record.reference,
            IncomingField::Fournisseur => &mut record.fournisseur,
            IncomingField::Designation => &mut record.designation,
            IncomingField::Chassis => &mut record.chassis,
            IncomingField::Couleur => &mut record.couleur,
            IncomingField::Lot => &mut record.lot,
            IncomingField::Magasin => &mut record.magasin,
            IncomingField::Relation => &mut record.relation,
        };
        *slot = value.to_string();
    }
}

/// Legacy block: field order of the lines after the asterisk-wrapped key.
/// The lot field does not exist in this format and stays empty.
const LEGACY_INCOMING_FIELDS: [IncomingField; 5] = [
    IncomingField::Designation,
    IncomingField::Fournisseur,
    IncomingField::Couleur,
    IncomingField::Magasin,
    IncomingField::Chassis,
];

/// Structured block: one field per line, first line included.
const STRUCTURED_INCOMING_FIELDS: [IncomingField; 8] = [
    IncomingField::Reference,
    IncomingField::Fournisseur,
    IncomingField::Designation,
    IncomingField::Chassis,
    IncomingField::Couleur,
    IncomingField::Lot,
    IncomingField::Magasin,
    IncomingField::Relation,
];

/// Apply a field-order table to a run of lines. Shorter payloads leave the
/// trailing fields empty; extra lines are ignored.
fn apply_mapping(record: &mut IncomingRecord, fields: &[IncomingField], lines: &[&str]) {
    for (field, line) in fields.iter().zip(lines) {
        field.set(record, line);
    }
}

/// Parse a raw payload into an incoming-stock record.
///
/// Returns `None` only when no primary key can be extracted (empty or
/// whitespace-only payload). The record id is unassigned; the store assigns
/// one at insertion.
pub fn parse_incoming(raw: &str) -> Option<IncomingRecord> {
    let lines = payload_lines(raw);
    if lines.is_empty() {
        return None;
    }

    let mut record = IncomingRecord::new();

    if lines.len() > 1 {
        if wrapped_in_asterisks(lines[0]) {
            record.reference = lines[0][1..lines[0].len() - 1].to_string();
            apply_mapping(&mut record, &LEGACY_INCOMING_FIELDS, &lines[1..]);
        } else {
            apply_mapping(&mut record, &STRUCTURED_INCOMING_FIELDS, &lines);
        }
    } else {
        parse_inline_incoming(lines[0], &mut record);
    }

    if record.reference.is_empty() {
        return None;
    }

    // A reference carrying the house-brand prefix pins the supplier to the
    // canonical brand name regardless of what the positional mapping put there.
    if record.reference.starts_with(constants::VMS_REFERENCE_PREFIX) {
        record.fournisseur = constants::VMS_SUPPLIER_NAME.to_string();
    }

    tracing::debug!(
        reference = %record.reference,
        format = ?detect_format(raw),
        "Incoming payload parsed"
    );
    Some(record)
}

/// Single-line handling: extract the first `*...*` span as the key; trailing
/// text becomes the designation, split at the first `" -"` into designation
/// and fournisseur when present. Without an asterisk the whole line is the key.
fn parse_inline_incoming(line: &str, record: &mut IncomingRecord) {
    if let Some(caps) = asterisk_span().captures(line) {
        record.reference = caps[1].to_string();
        let span_end = caps.get(0).map_or(line.len(), |m| m.end());
        let rest = line[span_end..].trim();
        if !rest.is_empty() {
            match rest.split_once(" -") {
                Some((designation, fournisseur)) => {
                    record.designation = designation.trim().to_string();
                    record.fournisseur =
                        fournisseur.trim_start_matches('-').trim().to_string();
                }
                None => record.designation = rest.to_string(),
            }
        }
    } else {
        record.reference = line.to_string();
    }
}

// =============================================================================
// Movement ("Sortie" / "Retour") parsing
// =============================================================================

/// The fields a movement payload itself provides. Client identity is filled
/// in by resolution afterwards; date/time are stamped at creation.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MovementDraft {
    /// Label reference, kept for operator messages only.
    pub reference: String,
    pub designation: String,
    /// Resolution key. Empty means the payload had none and no record may
    /// be created from this draft.
    pub chassis: String,
}

impl MovementDraft {
    /// True when the draft can be taken through client resolution.
    pub fn has_chassis(&self) -> bool {
        !self.chassis.is_empty()
    }
}

/// Line positions of the movement fields within each block format. In the
/// legacy block the chassis sits on the last label line; in the structured
/// block the fields occupy the same positions they hold in the incoming
/// order.
const LEGACY_MOVEMENT_DESIGNATION_LINE: usize = 1;
const LEGACY_MOVEMENT_CHASSIS_LINE: usize = 5;
const STRUCTURED_MOVEMENT_DESIGNATION_LINE: usize = 2;
const STRUCTURED_MOVEMENT_CHASSIS_LINE: usize = 3;

/// Parse a raw payload into a movement draft.
///
/// Returns `None` only when no reference can be extracted. Single-line
/// payloads never carry a chassis, so the resulting draft cannot produce a
/// record (the caller surfaces that as its own condition).
pub fn parse_movement(raw: &str) -> Option<MovementDraft> {
    let lines = payload_lines(raw);
    if lines.is_empty() {
        return None;
    }

    let mut draft = MovementDraft::default();

    if lines.len() > 1 {
        if wrapped_in_asterisks(lines[0]) {
            draft.reference = lines[0][1..lines[0].len() - 1].to_string();
            draft.designation = line_at(&lines, LEGACY_MOVEMENT_DESIGNATION_LINE);
            draft.chassis = line_at(&lines, LEGACY_MOVEMENT_CHASSIS_LINE);
        } else {
            draft.reference = lines[0].to_string();
            draft.designation = line_at(&lines, STRUCTURED_MOVEMENT_DESIGNATION_LINE);
            draft.chassis = line_at(&lines, STRUCTURED_MOVEMENT_CHASSIS_LINE);
        }
    } else {
        let line = lines[0];
        if let Some(caps) = asterisk_span().captures(line) {
            draft.reference = caps[1].to_string();
            let span_end = caps.get(0).map_or(line.len(), |m| m.end());
            draft.designation = line[span_end..].trim().to_string();
        } else {
            draft.reference = line.to_string();
        }
    }

    if draft.reference.is_empty() {
        return None;
    }

    tracing::debug!(
        reference = %draft.reference,
        chassis = %draft.chassis,
        "Movement payload parsed"
    );
    Some(draft)
}

fn line_at(lines: &[&str], index: usize) -> String {
    lines.get(index).map(|s| s.to_string()).unwrap_or_default()
}

// =============================================================================
// Label generation
// =============================================================================

/// Render an incoming record as a structured label payload: one field per
/// line, in the positional order the structured parser reads back.
///
/// The format is positional and scanners drop blank lines, so a record with
/// an empty field followed by a populated one cannot be represented;
/// trailing empty fields are omitted rather than emitted as blank lines.
pub fn generate_incoming(record: &IncomingRecord) -> String {
    let mut lines = vec![
        record.reference.as_str(),
        record.fournisseur.as_str(),
        record.designation.as_str(),
        record.chassis.as_str(),
        record.couleur.as_str(),
        record.lot.as_str(),
        record.magasin.as_str(),
        record.relation.as_str(),
    ];
    while lines.len() > 1 && lines.last().is_some_and(|line| line.is_empty()) {
        lines.pop();
    }
    lines.join("\n")
}
