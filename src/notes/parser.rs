//! # Heading-Anchored Response Parser
//!
//! Deterministic parse of the model's free-text response into the structured
//! draft. The strategy is a small scanner, not a regex: precompute where
//! each known heading anchors at the start of a line, then slice the text
//! between successive anchors. Minor formatting drift (case, trailing
//! colons, content on the heading line) is tolerated; anything the scanner
//! cannot place is simply left out of the structure, never an error.

use serde::{Deserialize, Serialize};

/// The nine section headings, in the order the model is told to emit them.
pub const SECTION_HEADINGS: [&str; 9] = [
    "Chief Complaints",
    "Clinical Findings",
    "Internal Notes",
    "Diagnosis",
    "Procedures Conducted",
    "Prescription",
    "Investigations",
    "Advice Given",
    "Follow-Up Date",
];

/// Index of the Prescription section within [`SECTION_HEADINGS`].
const PRESCRIPTION_INDEX: usize = 5;

/// Absence sentinels the model writes for sections with nothing to report.
/// Matched as case-insensitive prefixes and normalized to empty strings.
const ABSENCE_SENTINELS: [&str; 2] = ["none mentioned", "n/a"];

/// One prescription line: `Medicine Name | Dosage | Duration/Total`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrescriptionItem {
    pub medicine: String,
    pub dosage: String,
    pub duration: String,
}

/// Structured consultation draft, editable by the doctor before saving.
///
/// Every field defaults to empty; the parser never invents content. A field
/// is empty when the model omitted the section, wrote an absence sentinel,
/// or produced something the scanner could not anchor.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsultationDraft {
    pub chief_complaints: String,
    pub clinical_findings: String,
    pub internal_notes: String,
    pub diagnosis: String,
    pub procedures_conducted: String,
    pub prescription_details: Vec<PrescriptionItem>,
    pub investigations: String,
    pub advice_given: String,
    pub follow_up_date: String,
}

/// A heading anchored at the start of a line.
struct Anchor {
    /// Which of the nine headings matched
    heading: usize,

    /// Absolute offset where the line starts
    line_start: usize,

    /// Absolute offset where section content starts (after the heading
    /// label and optional colon, possibly on the same line)
    content_start: usize,
}

/// Check whether a line begins with one of the known headings.
///
/// The heading may carry leading whitespace and must be followed by a colon
/// or the end of the line; a longer word sequence ("Prescription Details")
/// is not a match for the shorter heading.
fn heading_at(line: &str) -> Option<(usize, usize)> {
    let trimmed = line.trim_start();
    let indent = line.len() - trimmed.len();

    for (index, heading) in SECTION_HEADINGS.iter().enumerate() {
        // get() rather than slicing: the line may end or hit a multi-byte
        // character inside the would-be heading range.
        let Some(prefix) = trimmed.get(..heading.len()) else {
            continue;
        };
        if !prefix.eq_ignore_ascii_case(heading) {
            continue;
        }

        let rest = &trimmed[heading.len()..];
        if rest.is_empty() {
            return Some((index, indent + heading.len()));
        }
        if rest.starts_with(':') {
            return Some((index, indent + heading.len() + 1));
        }
    }

    None
}

/// Locate every known-heading anchor in the text, in document order.
fn find_anchors(text: &str) -> Vec<Anchor> {
    let mut anchors = Vec::new();
    let mut offset = 0;

    for line in text.split_inclusive('\n') {
        let content = line.trim_end_matches(['\n', '\r']);
        if let Some((heading, content_offset)) = heading_at(content) {
            anchors.push(Anchor {
                heading,
                line_start: offset,
                content_start: offset + content_offset,
            });
        }
        offset += line.len();
    }

    anchors
}

/// Normalize one captured section: trim, collapse absence sentinels to the
/// empty string.
fn normalize_section(raw: &str) -> String {
    let trimmed = raw.trim();
    let lowered = trimmed.to_ascii_lowercase();

    for sentinel in ABSENCE_SENTINELS {
        if lowered.starts_with(sentinel) {
            return String::new();
        }
    }

    trimmed.to_string()
}

/// Whether a prescription line is an absence sentinel rather than a medicine.
fn is_sentinel_line(line: &str) -> bool {
    let lowered = line.to_ascii_lowercase();
    ABSENCE_SENTINELS
        .iter()
        .any(|sentinel| lowered.starts_with(sentinel))
}

/// Parse the Prescription section into individual items.
///
/// A line with exactly three pipe-delimited fields maps positionally onto
/// {medicine, dosage, duration}. Any other non-empty, non-sentinel line is
/// kept whole as the medicine field — a garbled line is still a real
/// prescription the doctor must see. Entries without a medicine are never
/// added.
fn parse_prescription(section: &str) -> Vec<PrescriptionItem> {
    let mut items = Vec::new();

    for line in section.lines() {
        let line = line.trim();
        if line.is_empty() || is_sentinel_line(line) {
            continue;
        }

        let fields: Vec<&str> = line.split('|').map(str::trim).collect();
        let item = if fields.len() == 3 {
            PrescriptionItem {
                medicine: fields[0].to_string(),
                dosage: fields[1].to_string(),
                duration: fields[2].to_string(),
            }
        } else {
            PrescriptionItem {
                medicine: line.to_string(),
                dosage: String::new(),
                duration: String::new(),
            }
        };

        if !item.medicine.is_empty() {
            items.push(item);
        }
    }

    items
}

/// Parse a full model response into the structured draft.
///
/// Sections are sliced between successive heading anchors; a heading that
/// appears more than once keeps its first occurrence. Headings the model
/// omitted stay at their defaults.
pub fn parse_draft(text: &str) -> ConsultationDraft {
    let anchors = find_anchors(text);
    let mut sections: [Option<String>; 9] = Default::default();

    for (position, anchor) in anchors.iter().enumerate() {
        if sections[anchor.heading].is_some() {
            continue;
        }

        let end = anchors
            .get(position + 1)
            .map(|next| next.line_start)
            .unwrap_or(text.len());

        sections[anchor.heading] = Some(text[anchor.content_start..end].to_string());
    }

    let prescription_details = sections[PRESCRIPTION_INDEX]
        .as_deref()
        .map(parse_prescription)
        .unwrap_or_default();

    let mut section = |index: usize| {
        sections[index]
            .take()
            .map(|raw| normalize_section(&raw))
            .unwrap_or_default()
    };

    ConsultationDraft {
        chief_complaints: section(0),
        clinical_findings: section(1),
        internal_notes: section(2),
        diagnosis: section(3),
        procedures_conducted: section(4),
        prescription_details,
        investigations: section(6),
        advice_given: section(7),
        follow_up_date: section(8),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const WELL_FORMED: &str = "\
Chief Complaints: Fever and headache for 3 days
Clinical Findings:
Temperature 101F, throat congestion
Internal Notes: None mentioned
Diagnosis: Viral pharyngitis
Procedures Conducted: N/A
Prescription:
Tab Paracetamol | 500mg | twice daily for 5 days
Syrup Benadryl | 10ml | thrice daily for 3 days
Investigations: CBC if fever persists
Advice Given: Plenty of fluids, rest
Follow-Up Date: After 1 week
";

    #[test]
    fn test_all_sections_captured_without_heading_lines() {
        let draft = parse_draft(WELL_FORMED);

        assert_eq!(draft.chief_complaints, "Fever and headache for 3 days");
        assert_eq!(draft.clinical_findings, "Temperature 101F, throat congestion");
        assert_eq!(draft.diagnosis, "Viral pharyngitis");
        assert_eq!(draft.investigations, "CBC if fever persists");
        assert_eq!(draft.advice_given, "Plenty of fluids, rest");
        assert_eq!(draft.follow_up_date, "After 1 week");

        // Captured content never contains a heading line.
        assert!(!draft.chief_complaints.contains("Clinical Findings"));
        assert!(!draft.advice_given.contains("Follow-Up Date"));
    }

    #[test]
    fn test_absence_sentinels_normalize_to_empty() {
        let draft = parse_draft(WELL_FORMED);
        assert_eq!(draft.internal_notes, "");
        assert_eq!(draft.procedures_conducted, "");

        let mixed_case = "Diagnosis:\nNONE MENTIONED\nAdvice Given: n/a\n";
        let draft = parse_draft(mixed_case);
        assert_eq!(draft.diagnosis, "");
        assert_eq!(draft.advice_given, "");
    }

    #[test]
    fn test_prescription_three_field_line() {
        let section = "Tab Metformin | 500mg | 1 tab twice daily for 30 days";
        let items = parse_prescription(section);
        assert_eq!(
            items,
            vec![PrescriptionItem {
                medicine: "Tab Metformin".to_string(),
                dosage: "500mg".to_string(),
                duration: "1 tab twice daily for 30 days".to_string(),
            }]
        );
    }

    #[test]
    fn test_prescription_malformed_line_kept_whole() {
        let items = parse_prescription("Tab Metformin 500mg twice daily");
        assert_eq!(
            items,
            vec![PrescriptionItem {
                medicine: "Tab Metformin 500mg twice daily".to_string(),
                dosage: String::new(),
                duration: String::new(),
            }]
        );
    }

    #[test]
    fn test_prescription_wrong_field_count_kept_whole() {
        let items = parse_prescription("Tab A | 500mg");
        assert_eq!(items[0].medicine, "Tab A | 500mg");
        assert_eq!(items[0].dosage, "");

        let items = parse_prescription("Tab A | 500mg | daily | extra");
        assert_eq!(items[0].medicine, "Tab A | 500mg | daily | extra");
    }

    #[test]
    fn test_prescription_skips_blank_and_sentinel_lines() {
        let section = "\n\nNone mentioned\nn/a\nTab A | 1mg | daily\n\n";
        let items = parse_prescription(section);
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].medicine, "Tab A");
    }

    #[test]
    fn test_prescription_requires_primary_token() {
        // Three well-delimited fields but no medicine: not an entry.
        assert!(parse_prescription("| 500mg | daily").is_empty());
    }

    #[test]
    fn test_heading_case_insensitive_and_colon_optional() {
        let text = "chief complaints: cough\nDIAGNOSIS\nBronchitis\n";
        let draft = parse_draft(text);
        assert_eq!(draft.chief_complaints, "cough");
        assert_eq!(draft.diagnosis, "Bronchitis");
    }

    #[test]
    fn test_longer_word_sequence_is_not_an_anchor() {
        // "Prescription Details:" must not anchor the Prescription section.
        let text = "Prescription Details: Tab A | 1mg | daily\n";
        let draft = parse_draft(text);
        assert!(draft.prescription_details.is_empty());
    }

    #[test]
    fn test_missing_headings_leave_defaults() {
        let draft = parse_draft("Diagnosis: Migraine\n");
        assert_eq!(draft.diagnosis, "Migraine");
        assert_eq!(draft.chief_complaints, "");
        assert!(draft.prescription_details.is_empty());
        assert_eq!(draft.follow_up_date, "");
    }

    #[test]
    fn test_duplicate_heading_keeps_first_occurrence() {
        let text = "Diagnosis: Migraine\nDiagnosis: Tension headache\n";
        let draft = parse_draft(text);
        assert_eq!(draft.diagnosis, "Migraine");
    }

    #[test]
    fn test_empty_input_parses_to_default() {
        assert_eq!(parse_draft(""), ConsultationDraft::default());
    }

    #[test]
    fn test_multiline_section_content_preserved() {
        let text = "Advice Given:\nPlenty of fluids.\nRest for two days.\nFollow-Up Date: None mentioned\n";
        let draft = parse_draft(text);
        assert_eq!(draft.advice_given, "Plenty of fluids.\nRest for two days.");
        assert_eq!(draft.follow_up_date, "");
    }
}
