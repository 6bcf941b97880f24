//! Manifest builder: the cross-product of annotation labels and recording
//! names.
//!
//! Row order is a contract consumed by the downstream review step: labels
//! form the outer loop and recording names the inner loop, so every label
//! gets one contiguous block of rows. The builder never filters or
//! deduplicates: an empty side yields an empty manifest, duplicate labels
//! yield duplicate blocks.

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use probemap_core::error::{Error, Result};

/// Manifest column order consumed by the external review step.
pub const COLUMNS: [&str; 7] = [
    "mouseid",
    "probe_id",
    "probe_name",
    "sorted_recording",
    "probe_file",
    "surface_finding",
    "annotation_format",
];

/// One manifest row.
///
/// Field order matches [`COLUMNS`]; rows are immutable once built (the
/// human review edit happens outside this system).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestRecord {
    /// Subject (mouse) identifier.
    pub mouseid: String,
    /// Annotation label naming the probe; cannot be found automatically.
    pub probe_id: String,
    /// Probe name, left blank for the human reviewer.
    pub probe_name: String,
    /// Name of the sorted recording artifact this row pairs with.
    pub sorted_recording: String,
    /// Stem of the annotation document the label came from.
    pub probe_file: String,
    /// Placeholder, not currently used.
    pub surface_finding: Option<u32>,
    /// Format of the annotation document.
    pub annotation_format: String,
}

impl ManifestRecord {
    /// Creates a row with reviewer-facing fields blanked.
    #[must_use]
    pub fn new(
        mouseid: impl Into<String>,
        probe_id: impl Into<String>,
        sorted_recording: impl Into<String>,
        probe_file: impl Into<String>,
    ) -> Self {
        Self {
            mouseid: mouseid.into(),
            probe_id: probe_id.into(),
            probe_name: String::new(),
            sorted_recording: sorted_recording.into(),
            probe_file: probe_file.into(),
            surface_finding: None,
            annotation_format: "json".to_string(),
        }
    }
}

/// Builds the manifest rows for every `(label, recording)` pair.
///
/// Labels are the outer loop, recordings the inner loop; the result has
/// exactly `labels.len() * recording_names.len()` rows.
#[must_use]
pub fn build_rows(
    labels: &[String],
    recording_names: &[String],
    subject_id: &str,
    annotation_file_stem: &str,
) -> Vec<ManifestRecord> {
    let mut rows = Vec::with_capacity(labels.len() * recording_names.len());
    for label in labels {
        for recording_name in recording_names {
            rows.push(ManifestRecord::new(
                subject_id,
                label,
                recording_name,
                annotation_file_stem,
            ));
        }
    }
    rows
}

/// Serializes rows to CSV with the contractual header, even when empty.
///
/// # Errors
///
/// Returns [`Error::Serialization`] when a row fails to encode.
pub fn to_csv(rows: &[ManifestRecord]) -> Result<Bytes> {
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(Vec::new());
    writer
        .write_record(COLUMNS)
        .map_err(|e| Error::Serialization {
            message: format!("failed to write manifest header: {e}"),
        })?;
    for row in rows {
        writer.serialize(row).map_err(|e| Error::Serialization {
            message: format!("failed to write manifest row: {e}"),
        })?;
    }
    let buffer = writer
        .into_inner()
        .map_err(|e| Error::Serialization {
            message: format!("failed to flush manifest: {e}"),
        })?;
    Ok(Bytes::from(buffer))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(ToString::to_string).collect()
    }

    #[test]
    fn cross_product_is_label_major() {
        let rows = build_rows(
            &strings(&["probeA", "probeB"]),
            &strings(&["rec1", "rec2"]),
            "123456",
            "state",
        );

        let pairs: Vec<(&str, &str)> = rows
            .iter()
            .map(|row| (row.probe_id.as_str(), row.sorted_recording.as_str()))
            .collect();
        assert_eq!(
            pairs,
            vec![
                ("probeA", "rec1"),
                ("probeA", "rec2"),
                ("probeB", "rec1"),
                ("probeB", "rec2"),
            ]
        );
        assert!(rows.iter().all(|row| row.mouseid == "123456"));
        assert!(rows.iter().all(|row| row.probe_file == "state"));
        assert!(rows.iter().all(|row| row.probe_name.is_empty()));
        assert!(rows.iter().all(|row| row.annotation_format == "json"));
    }

    #[test]
    fn row_count_is_m_times_n() {
        let labels = strings(&["a", "b", "c"]);
        let recordings = strings(&["r1", "r2", "r3", "r4"]);
        let rows = build_rows(&labels, &recordings, "s", "f");
        assert_eq!(rows.len(), 12);
    }

    #[test]
    fn empty_side_yields_empty_manifest() {
        assert!(build_rows(&strings(&["a"]), &[], "s", "f").is_empty());
        assert!(build_rows(&[], &strings(&["r"]), "s", "f").is_empty());
        assert!(build_rows(&[], &[], "s", "f").is_empty());
    }

    #[test]
    fn duplicate_labels_yield_duplicate_blocks() {
        let rows = build_rows(
            &strings(&["probeA", "probeA"]),
            &strings(&["rec1"]),
            "s",
            "f",
        );
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0], rows[1]);
    }

    #[test]
    fn csv_header_matches_contract() {
        let csv = to_csv(&[]).expect("serialize");
        let text = std::str::from_utf8(&csv).expect("utf8");
        assert_eq!(
            text.trim_end(),
            "mouseid,probe_id,probe_name,sorted_recording,probe_file,surface_finding,annotation_format"
        );
    }

    #[test]
    fn csv_rows_follow_header() {
        let rows = build_rows(
            &strings(&["probeA"]),
            &strings(&["rec1"]),
            "123456",
            "state_file",
        );
        let csv = to_csv(&rows).expect("serialize");
        let text = std::str::from_utf8(&csv).expect("utf8");
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[1], "123456,probeA,,rec1,state_file,,json");
    }
}
