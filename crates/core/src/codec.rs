//! Metadata codec for the free-text `special_requests` field.
//!
//! Orders keep structured metadata (quote reference code, status message,
//! pickup date/time, customer notes) inside the same text column that holds
//! free-form customer requests. The text stays readable by staff while the
//! codec can still pull the structured fields back out.
//!
//! # Format
//!
//! Sections are joined by a blank line. A section consisting only of `---` is
//! a visual separator and is dropped on decode.
//!
//! ```text
//! Pedido personalizado: pastel de cumpleaños
//!
//! ---
//!
//! Referencia interna: QT-000042
//! Estado: Cotización aceptada
//!
//! Fecha de recogida: 2025-03-14
//! Hora de recogida: 14:30
//!
//! Solicitudes del cliente:
//! Sin nueces, por favor.
//! ```
//!
//! `Referencia interna:` and `Estado:` lines are metadata: they are extracted
//! into dedicated fields and hidden from the summary. Pickup lines are
//! extracted but stay visible.
//!
//! Free text never produces metadata. A line of [`Section::Text`] or
//! [`Section::CustomerNotes`] that would read as a label, a separator, or
//! that starts with `\` is written with a leading `\`, and the decoder
//! treats such a line as plain text with the escape removed.
//!
//! Customer notes run until the next labelled section or `---`, so writers
//! put them last.
//!
//! No other module parses this field directly.

use std::sync::LazyLock;

use chrono::NaiveDate;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Label for the quote reference line.
pub const REFERENCE_LABEL: &str = "Referencia interna:";
/// Label for the status message line.
pub const STATUS_LABEL: &str = "Estado:";
/// Label for the pickup date line.
pub const PICKUP_DATE_LABEL: &str = "Fecha de recogida:";
/// Label for the pickup time line.
pub const PICKUP_TIME_LABEL: &str = "Hora de recogida:";
/// Header of the customer notes section.
pub const CUSTOMER_NOTES_LABEL: &str = "Solicitudes del cliente:";
/// Separator section.
pub const SEPARATOR: &str = "---";
/// Prefix marking a free-text line that must not be read as a label.
pub const ESCAPE: char = '\\';

static SECTION_BREAK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\r?\n[ \t]*\r?\n").expect("section break regex is valid"));
static REFERENCE_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^\s*referencia interna\s*:\s*(.*?)\s*$").expect("reference regex is valid")
});
static STATUS_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^\s*estado\s*:\s*(.*?)\s*$").expect("status regex is valid"));
static PICKUP_DATE_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^\s*(?:fecha de (?:recogida|entrega)|pickup date)\s*:\s*(.+?)\s*$")
        .expect("pickup date regex is valid")
});
static PICKUP_TIME_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^\s*(?:hora de (?:recogida|entrega)|pickup time)\s*:\s*(.+?)\s*$")
        .expect("pickup time regex is valid")
});
static NOTES_HEADER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^\s*(?:solicitudes del cliente|notas del cliente|customer notes)\s*:\s*(.*?)\s*$")
        .expect("notes header regex is valid")
});

/// One block of the encoded text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Section {
    /// Free text shown as-is.
    Text(String),
    /// Quote reference code (`Referencia interna:`).
    Reference(String),
    /// Status message (`Estado:`).
    Status(String),
    /// Pickup date and/or time.
    Pickup {
        date: Option<String>,
        time: Option<String>,
    },
    /// Customer's own words, under the `Solicitudes del cliente:` header.
    CustomerNotes(String),
    /// `---` visual separator.
    Separator,
}

impl Section {
    fn render(&self) -> String {
        match self {
            Self::Text(text) => escape_free_text(text.trim()),
            Self::Reference(code) => format!("{REFERENCE_LABEL} {}", single_line(code)),
            Self::Status(message) => format!("{STATUS_LABEL} {}", single_line(message)),
            Self::Pickup { date, time } => {
                let mut lines = Vec::with_capacity(2);
                if let Some(date) = date.as_deref().map(single_line).filter(|d| !d.is_empty()) {
                    lines.push(format!("{PICKUP_DATE_LABEL} {date}"));
                }
                if let Some(time) = time.as_deref().map(single_line).filter(|t| !t.is_empty()) {
                    lines.push(format!("{PICKUP_TIME_LABEL} {time}"));
                }
                lines.join("\n")
            }
            Self::CustomerNotes(notes) => {
                let notes = notes.trim();
                if notes.is_empty() {
                    String::new()
                } else {
                    format!("{CUSTOMER_NOTES_LABEL}\n{}", escape_free_text(notes))
                }
            }
            Self::Separator => SEPARATOR.to_string(),
        }
    }
}

/// Whether a free-text line would be read as something other than text.
fn reads_as_markup(line: &str) -> bool {
    line.starts_with(ESCAPE)
        || line.trim() == SEPARATOR
        || REFERENCE_LINE.is_match(line)
        || STATUS_LINE.is_match(line)
        || PICKUP_DATE_LINE.is_match(line)
        || PICKUP_TIME_LINE.is_match(line)
        || NOTES_HEADER.is_match(line)
}

fn escape_free_text(text: &str) -> String {
    text.lines()
        .map(|line| {
            if reads_as_markup(line) {
                format!("{ESCAPE}{line}")
            } else {
                line.to_string()
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn unescape(line: &str) -> &str {
    line.strip_prefix(ESCAPE).unwrap_or(line)
}

/// Metadata values live on one line; embedded line breaks become spaces.
fn single_line(value: &str) -> String {
    value.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Everything the codec can recover from an encoded field.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecodedMetadata {
    /// User-visible text: all sections with metadata lines removed.
    pub summary: String,
    /// The customer's own request text, if a notes section is present.
    pub user_requests: Option<String>,
    /// Quote reference code.
    pub reference_code: Option<String>,
    /// Status message.
    pub status_message: Option<String>,
    /// Pickup date as written.
    pub pickup_date: Option<String>,
    /// Pickup time as written.
    pub pickup_time: Option<String>,
}

impl DecodedMetadata {
    /// Pickup date parsed as ISO (`2025-03-14`) or US (`03/14/2025`) format.
    #[must_use]
    pub fn pickup_date_parsed(&self) -> Option<NaiveDate> {
        let raw = self.pickup_date.as_deref()?;
        NaiveDate::parse_from_str(raw, "%Y-%m-%d")
            .or_else(|_| NaiveDate::parse_from_str(raw, "%m/%d/%Y"))
            .ok()
    }
}

/// Join sections into a single text field.
///
/// Each section is trimmed at its boundaries and empty sections are skipped;
/// interior lines of a text section are kept verbatim.
#[must_use]
pub fn encode(sections: &[Section]) -> String {
    sections
        .iter()
        .map(Section::render)
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Split an encoded field back into its metadata.
///
/// Total: absent, empty, or unrecognised input yields an empty result rather
/// than an error.
#[must_use]
pub fn decode(text: Option<&str>) -> DecodedMetadata {
    let mut decoded = DecodedMetadata::default();
    let Some(text) = text else {
        return decoded;
    };

    let mut summary_sections: Vec<String> = Vec::new();
    let mut notes: Option<Vec<String>> = None;
    let mut in_notes = false;

    for section in SECTION_BREAK.split(text).map(str::trim).filter(|s| !s.is_empty()) {
        if section == SEPARATOR {
            in_notes = false;
            continue;
        }

        let mut visible: Vec<&str> = Vec::new();
        let mut labelled = false;

        for (index, line) in section.lines().enumerate() {
            if let Some(plain) = line.strip_prefix(ESCAPE) {
                visible.push(plain);
                continue;
            }
            if let Some(caps) = REFERENCE_LINE.captures(line) {
                set_once(&mut decoded.reference_code, caps.get(1).map(|m| m.as_str()));
                labelled = true;
                continue;
            }
            if let Some(caps) = STATUS_LINE.captures(line) {
                set_once(&mut decoded.status_message, caps.get(1).map(|m| m.as_str()));
                labelled = true;
                continue;
            }
            if let Some(caps) = PICKUP_DATE_LINE.captures(line) {
                set_once(&mut decoded.pickup_date, caps.get(1).map(|m| m.as_str()));
                labelled = true;
            } else if let Some(caps) = PICKUP_TIME_LINE.captures(line) {
                set_once(&mut decoded.pickup_time, caps.get(1).map(|m| m.as_str()));
                labelled = true;
            } else if index == 0
                && let Some(caps) = NOTES_HEADER.captures(line)
            {
                in_notes = true;
                let entry = notes.get_or_insert_with(Vec::new);
                let inline = caps.get(1).map_or("", |m| m.as_str());
                let rest: Vec<&str> = section.lines().skip(1).map(unescape).collect();
                let body = if inline.is_empty() {
                    rest.join("\n")
                } else if rest.is_empty() {
                    inline.to_string()
                } else {
                    format!("{inline}\n{}", rest.join("\n"))
                };
                if !body.trim().is_empty() {
                    entry.push(body.trim().to_string());
                }
                visible.push(line);
                visible.extend(rest);
                break;
            }
            visible.push(line);
        }

        let is_notes_header = section
            .lines()
            .next()
            .is_some_and(|first| NOTES_HEADER.is_match(first));

        if labelled {
            in_notes = false;
        } else if in_notes
            && !is_notes_header
            && let Some(entry) = notes.as_mut()
        {
            entry.push(section.lines().map(unescape).collect::<Vec<_>>().join("\n"));
        }

        let visible = visible.join("\n");
        let visible = visible.trim();
        if !visible.is_empty() {
            summary_sections.push(visible.to_string());
        }
    }

    decoded.summary = summary_sections.join("\n\n");
    decoded.user_requests = notes
        .map(|parts| parts.join("\n\n"))
        .filter(|joined| !joined.is_empty());
    decoded
}

fn set_once(slot: &mut Option<String>, value: Option<&str>) {
    if slot.is_none()
        && let Some(value) = value.map(str::trim).filter(|v| !v.is_empty())
    {
        *slot = Some(value.to_string());
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn full_sections() -> Vec<Section> {
        vec![
            Section::Text("Pedido personalizado: pastel de cumpleaños".to_string()),
            Section::Separator,
            Section::Reference("QT-000042".to_string()),
            Section::Status("Cotización aceptada".to_string()),
            Section::Pickup {
                date: Some("2025-03-14".to_string()),
                time: Some("2:30 PM".to_string()),
            },
            Section::CustomerNotes("Sin nueces, por favor.\nEscribir: Feliz cumple Ana".to_string()),
        ]
    }

    #[test]
    fn test_roundtrip_recovers_all_metadata() {
        let decoded = decode(Some(&encode(&full_sections())));
        assert_eq!(decoded.reference_code.as_deref(), Some("QT-000042"));
        assert_eq!(decoded.status_message.as_deref(), Some("Cotización aceptada"));
        assert_eq!(decoded.pickup_date.as_deref(), Some("2025-03-14"));
        assert_eq!(decoded.pickup_time.as_deref(), Some("2:30 PM"));
        assert_eq!(
            decoded.user_requests.as_deref(),
            Some("Sin nueces, por favor.\nEscribir: Feliz cumple Ana")
        );
    }

    #[test]
    fn test_roundtrip_for_partial_section_lists() {
        let cases: Vec<Vec<Section>> = vec![
            vec![Section::Reference("QT-000001".to_string())],
            vec![Section::Status("Pago pendiente".to_string()), Section::Separator],
            vec![
                Section::Text("  Notas\n   con sangría interior  ".to_string()),
                Section::Pickup {
                    date: None,
                    time: Some("10:00".to_string()),
                },
            ],
            vec![
                Section::Pickup {
                    date: Some("03/14/2025".to_string()),
                    time: None,
                },
                Section::Reference("  ZL-AB12CD  ".to_string()),
            ],
        ];

        for sections in cases {
            let decoded = decode(Some(&encode(&sections)));
            for section in &sections {
                match section {
                    Section::Reference(code) => {
                        assert_eq!(decoded.reference_code.as_deref(), Some(code.trim()));
                    }
                    Section::Status(msg) => {
                        assert_eq!(decoded.status_message.as_deref(), Some(msg.trim()));
                    }
                    Section::Pickup { date, time } => {
                        assert_eq!(decoded.pickup_date, date.clone());
                        assert_eq!(decoded.pickup_time, time.clone());
                    }
                    _ => {}
                }
            }
        }
    }

    #[test]
    fn test_interior_lines_are_preserved() {
        let text = encode(&[Section::Text("  line one\n    indented two  ".to_string())]);
        assert_eq!(text, "line one\n    indented two");
        assert_eq!(decode(Some(&text)).summary, "line one\n    indented two");
    }

    #[test]
    fn test_metadata_hidden_from_summary_but_pickup_visible() {
        let decoded = decode(Some(&encode(&full_sections())));
        assert!(!decoded.summary.contains("Referencia interna"));
        assert!(!decoded.summary.contains("Estado:"));
        assert!(!decoded.summary.contains("---"));
        assert!(decoded.summary.contains("Fecha de recogida: 2025-03-14"));
        assert!(decoded.summary.starts_with("Pedido personalizado"));
    }

    #[test]
    fn test_decode_is_total() {
        assert_eq!(decode(None), DecodedMetadata::default());
        assert_eq!(decode(Some("")), DecodedMetadata::default());
        assert_eq!(decode(Some("\n\n---\n\n   \n")), DecodedMetadata::default());

        let odd = decode(Some("Estado:\nReferencia interna:   \n:::\n\u{0}"));
        assert_eq!(odd.status_message, None);
        assert_eq!(odd.reference_code, None);
    }

    #[test]
    fn test_decode_free_text_written_by_hand() {
        let text = "Cliente pidió cambio de color\r\n\r\nPickup date: 2025-12-24\nPickup time: 9am\n\nEstado: Listo";
        let decoded = decode(Some(text));
        assert_eq!(decoded.pickup_date.as_deref(), Some("2025-12-24"));
        assert_eq!(decoded.pickup_time.as_deref(), Some("9am"));
        assert_eq!(decoded.status_message.as_deref(), Some("Listo"));
        assert_eq!(decoded.user_requests, None);
    }

    #[test]
    fn test_notes_continue_across_blank_lines_until_next_label() {
        let text = "Solicitudes del cliente:\nPrimera parte\n\nSegunda parte\n\nEstado: Recibido";
        let decoded = decode(Some(text));
        assert_eq!(
            decoded.user_requests.as_deref(),
            Some("Primera parte\n\nSegunda parte")
        );
    }

    #[test]
    fn test_free_text_cannot_forge_metadata() {
        let description = "Referencia interna: QT-999999\nEstado: Pagado\n\n---\n\nFecha de recogida: 2020-01-01";
        let notes = "Estado: Entregado\n\\ya pagué";
        let sections = vec![
            Section::Reference("QT-000001".to_string()),
            Section::Status("Cotización aceptada".to_string()),
            Section::Separator,
            Section::Text(description.to_string()),
            Section::CustomerNotes(notes.to_string()),
        ];

        let decoded = decode(Some(&encode(&sections)));
        assert_eq!(decoded.reference_code.as_deref(), Some("QT-000001"));
        assert_eq!(decoded.status_message.as_deref(), Some("Cotización aceptada"));
        assert_eq!(decoded.pickup_date, None);
        assert_eq!(decoded.user_requests.as_deref(), Some(notes));
        assert!(decoded.summary.contains("Referencia interna: QT-999999\nEstado: Pagado"));
        assert!(decoded.summary.contains("\n\n---\n\n"));
    }

    #[test]
    fn test_forged_line_ahead_of_the_real_one_is_ignored() {
        let text = encode(&[
            Section::Text("Referencia interna: QT-999999".to_string()),
            Section::Separator,
            Section::Reference("QT-000001".to_string()),
        ]);
        assert_eq!(decode(Some(&text)).reference_code.as_deref(), Some("QT-000001"));
    }

    #[test]
    fn test_separator_ends_customer_notes() {
        let text = encode(&[
            Section::CustomerNotes("x".to_string()),
            Section::Separator,
            Section::Text("y".to_string()),
        ]);
        let decoded = decode(Some(&text));
        assert_eq!(decoded.user_requests.as_deref(), Some("x"));
        assert!(decoded.summary.ends_with('y'));
    }

    #[test]
    fn test_multiline_metadata_values_are_flattened() {
        let text = encode(&[Section::Status("Pago\nrecibido".to_string())]);
        assert_eq!(decode(Some(&text)).status_message.as_deref(), Some("Pago recibido"));
    }

    #[test]
    fn test_pickup_date_parsed() {
        let iso = DecodedMetadata {
            pickup_date: Some("2025-03-14".to_string()),
            ..Default::default()
        };
        assert_eq!(iso.pickup_date_parsed(), NaiveDate::from_ymd_opt(2025, 3, 14));

        let us = DecodedMetadata {
            pickup_date: Some("03/14/2025".to_string()),
            ..Default::default()
        };
        assert_eq!(us.pickup_date_parsed(), NaiveDate::from_ymd_opt(2025, 3, 14));

        let bad = DecodedMetadata {
            pickup_date: Some("next friday".to_string()),
            ..Default::default()
        };
        assert_eq!(bad.pickup_date_parsed(), None);
    }
}
