//! Corpus loader: raw sources in, normalized fragments out.
//!
//! Each source is processed independently. A source that fails (unknown
//! media type, bad encoding, no text) is reported in the [`LoadReport`] and
//! the rest of the batch carries on.

use chrono::Utc;
use parley_core::error::IngestionError;
use parley_core::knowledge::{Fragment, SourceType};
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Media types the loader accepts for uploaded documents.
pub const SUPPORTED_MEDIA_TYPES: &[&str] = &["text/plain", "text/markdown"];

/// One raw input to the loader.
#[derive(Debug, Clone, PartialEq)]
pub enum Source {
    /// A byte stream with a declared media type (e.g. an uploaded file).
    Document {
        id: String,
        media_type: String,
        bytes: Vec<u8>,
    },
    /// A curated knowledge entry that is already prose.
    Fact { id: String, text: String },
    /// Key/value case data, serialized to prose with fields in sorted order.
    Record {
        id: String,
        fields: BTreeMap<String, String>,
    },
}

impl Source {
    pub fn document(id: impl Into<String>, media_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        Source::Document {
            id: id.into(),
            media_type: media_type.into(),
            bytes,
        }
    }

    pub fn fact(id: impl Into<String>, text: impl Into<String>) -> Self {
        Source::Fact { id: id.into(), text: text.into() }
    }

    pub fn id(&self) -> &str {
        match self {
            Source::Document { id, .. } | Source::Fact { id, .. } | Source::Record { id, .. } => id,
        }
    }

    /// Read a file, inferring its media type from the extension.
    ///
    /// The source id is the file name. Unknown extensions are declared as
    /// `application/octet-stream` and rejected later by [`CorpusLoader::load`].
    pub fn from_path(path: &Path) -> Result<Self, IngestionError> {
        let id = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        let bytes = std::fs::read(path).map_err(|e| IngestionError::Unreadable {
            source_id: id.clone(),
            reason: e.to_string(),
        })?;
        Ok(Source::Document {
            media_type: media_type_for(path).to_string(),
            id,
            bytes,
        })
    }
}

/// Media type for a file name, by extension.
pub fn media_type_for(path: &Path) -> &'static str {
    match path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .as_deref()
    {
        Some("txt" | "text") => "text/plain",
        Some("md" | "markdown") => "text/markdown",
        _ => "application/octet-stream",
    }
}

/// Expand directories (one level) into the files they contain, sorted by name.
pub fn expand_paths(paths: &[PathBuf]) -> Vec<PathBuf> {
    let mut out = Vec::new();
    for path in paths {
        if path.is_dir() {
            match std::fs::read_dir(path) {
                Ok(entries) => {
                    let mut files: Vec<PathBuf> = entries
                        .filter_map(|e| e.ok().map(|e| e.path()))
                        .filter(|p| p.is_file())
                        .collect();
                    files.sort();
                    out.extend(files);
                }
                Err(e) => warn!(path = %path.display(), error = %e, "cannot read directory"),
            }
        } else {
            out.push(path.clone());
        }
    }
    out
}

/// Result of loading a batch of sources.
#[derive(Debug, Default)]
pub struct LoadReport {
    pub fragments: Vec<Fragment>,
    pub errors: Vec<IngestionError>,
}

impl LoadReport {
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Turns sources into fragments. Stateless; no network or disk writes.
#[derive(Debug, Clone, Default)]
pub struct CorpusLoader;

impl CorpusLoader {
    pub fn new() -> Self {
        Self
    }

    /// Load a batch. Duplicate fragments (same source and text) are kept once.
    pub fn load(&self, sources: impl IntoIterator<Item = Source>) -> LoadReport {
        let mut report = LoadReport::default();
        let mut seen = HashSet::new();

        for source in sources {
            match self.load_one(source) {
                Ok(fragment) => {
                    if seen.insert(fragment.id.clone()) {
                        report.fragments.push(fragment);
                    } else {
                        debug!(source = %fragment.source_id, "duplicate fragment skipped");
                    }
                }
                Err(e) => {
                    warn!(error = %e, "source rejected");
                    report.errors.push(e);
                }
            }
        }

        info!(
            fragments = report.fragments.len(),
            rejected = report.errors.len(),
            "corpus loaded"
        );
        report
    }

    fn load_one(&self, source: Source) -> Result<Fragment, IngestionError> {
        let (id, text, source_type) = match source {
            Source::Document { id, media_type, bytes } => {
                let essence = media_essence(&media_type);
                if !SUPPORTED_MEDIA_TYPES.contains(&essence.as_str()) {
                    return Err(IngestionError::UnsupportedFormat {
                        source_id: id,
                        media_type,
                    });
                }
                let text = String::from_utf8(bytes)
                    .map_err(|_| IngestionError::InvalidEncoding(id.clone()))?;
                (id, text, SourceType::UploadedDocument)
            }
            Source::Fact { id, text } => (id, text, SourceType::CuratedFact),
            Source::Record { id, fields } => {
                let text = serialize_record(&fields);
                (id, text, SourceType::StructuredRecord)
            }
        };

        let text = normalize_text(&text);
        if text.is_empty() {
            return Err(IngestionError::Empty(id));
        }

        Ok(Fragment {
            id: fragment_id(&id, &text),
            text,
            source_id: id,
            source_type,
            created_at: Utc::now(),
        })
    }
}

/// `"Text/Plain; charset=UTF-8"` → `"text/plain"`.
fn media_essence(media_type: &str) -> String {
    media_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase()
}

/// Strip a byte-order mark, unify line endings, trim.
fn normalize_text(text: &str) -> String {
    text.trim_start_matches('\u{feff}')
        .replace("\r\n", "\n")
        .trim()
        .to_string()
}

/// Serialize record fields as `Label: value.` sentences in key order.
///
/// Keys are sorted by the map, so re-serializing the same record is idempotent.
pub fn serialize_record(fields: &BTreeMap<String, String>) -> String {
    fields
        .iter()
        .filter(|(_, v)| !v.trim().is_empty())
        .map(|(k, v)| {
            let v = v.trim();
            let v = v.strip_suffix('.').unwrap_or(v);
            format!("{}: {}.", humanize_key(k), v)
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// `"pending_step"` → `"Pending step"`.
fn humanize_key(key: &str) -> String {
    let spaced = key.replace(['_', '-'], " ");
    let mut chars = spaced.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Content-derived id: the same source and text always produce the same id.
fn fragment_id(source_id: &str, text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(source_id.as_bytes());
    hasher.update([0u8]);
    hasher.update(text.as_bytes());
    let digest = hasher.finalize();
    let hex: String = digest[..8].iter().map(|b| format!("{b:02x}")).collect();
    format!("frag-{hex}")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(pairs: &[(&str, &str)]) -> Source {
        Source::Record {
            id: "case-1".into(),
            fields: pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        }
    }

    #[test]
    fn plain_text_document_becomes_fragment() {
        let report = CorpusLoader::new().load([Source::document(
            "notes.txt",
            "text/plain",
            b"  Funding clears in two days.\r\n".to_vec(),
        )]);
        assert!(report.is_clean());
        let fragment = &report.fragments[0];
        assert_eq!(fragment.text, "Funding clears in two days.");
        assert_eq!(fragment.source_type, SourceType::UploadedDocument);
        assert!(fragment.id.starts_with("frag-"));
    }

    #[test]
    fn charset_parameter_is_accepted() {
        let report = CorpusLoader::new().load([Source::document(
            "a.txt",
            "Text/Plain; charset=UTF-8",
            b"hello".to_vec(),
        )]);
        assert_eq!(report.fragments.len(), 1);
    }

    #[test]
    fn unsupported_format_does_not_abort_batch() {
        let report = CorpusLoader::new().load([
            Source::document("deck.pdf", "application/pdf", vec![0x25, 0x50]),
            Source::fact("faq-1", "Q: What is KYC? A: Know your customer."),
        ]);
        assert_eq!(report.fragments.len(), 1);
        assert_eq!(
            report.errors,
            vec![IngestionError::UnsupportedFormat {
                source_id: "deck.pdf".into(),
                media_type: "application/pdf".into(),
            }]
        );
    }

    #[test]
    fn invalid_utf8_and_empty_sources_are_reported() {
        let report = CorpusLoader::new().load([
            Source::document("bad.txt", "text/plain", vec![0xff, 0xfe, 0xfd]),
            Source::document("blank.txt", "text/plain", b"   \n ".to_vec()),
        ]);
        assert!(report.fragments.is_empty());
        assert_eq!(
            report.errors,
            vec![
                IngestionError::InvalidEncoding("bad.txt".into()),
                IngestionError::Empty("blank.txt".into()),
            ]
        );
    }

    #[test]
    fn record_serialization_is_sorted_and_idempotent() {
        let a = record(&[("status", "Funding"), ("client", "Michael Brown"), ("sla_hours", "72")]);
        let b = record(&[("sla_hours", "72"), ("status", "Funding"), ("client", "Michael Brown")]);
        let report = CorpusLoader::new().load([a, b]);

        // Same fields in any insertion order collapse to a single fragment.
        assert_eq!(report.fragments.len(), 1);
        assert_eq!(
            report.fragments[0].text,
            "Client: Michael Brown. Sla hours: 72. Status: Funding."
        );
        assert_eq!(report.fragments[0].source_type, SourceType::StructuredRecord);
    }

    #[test]
    fn fragment_ids_are_content_derived() {
        let loader = CorpusLoader::new();
        let first = loader.load([Source::fact("f", "same text")]);
        let second = loader.load([Source::fact("f", "same text")]);
        let other = loader.load([Source::fact("g", "same text")]);
        assert_eq!(first.fragments[0].id, second.fragments[0].id);
        assert_ne!(first.fragments[0].id, other.fragments[0].id);
    }

    #[test]
    fn from_path_infers_media_type() {
        let dir = tempfile::tempdir().unwrap();
        let md = dir.path().join("policy.md");
        std::fs::write(&md, "# Escalation\nOperations first.").unwrap();
        let bin = dir.path().join("scan.png");
        std::fs::write(&bin, [0u8, 1, 2]).unwrap();

        let sources: Vec<Source> = expand_paths(&[dir.path().to_path_buf()])
            .iter()
            .map(|p| Source::from_path(p).unwrap())
            .collect();
        let report = CorpusLoader::new().load(sources);

        assert_eq!(report.fragments.len(), 1);
        assert_eq!(report.fragments[0].source_id, "policy.md");
        assert!(matches!(
            report.errors[0],
            IngestionError::UnsupportedFormat { ref media_type, .. } if media_type == "application/octet-stream"
        ));
    }

    #[test]
    fn missing_file_is_unreadable() {
        let err = Source::from_path(Path::new("/nonexistent/faq.txt")).unwrap_err();
        assert!(matches!(err, IngestionError::Unreadable { .. }));
    }
}
