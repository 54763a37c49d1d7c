//! Client onboarding cases: the live operational dataset.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::loader::Source;

/// Cases pending longer than this are considered stalled.
pub const STALLED_AFTER_HOURS: u32 = 24;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaseRecord {
    pub client: String,
    pub advisor: String,
    pub status: String,
    pub pending_step: String,
    pub responsible: String,
    pub sla_hours: u32,
    pub notes: String,
}

impl CaseRecord {
    /// Field map fed to the corpus loader.
    pub fn fields(&self) -> BTreeMap<String, String> {
        BTreeMap::from([
            ("client".to_string(), self.client.clone()),
            ("advisor".to_string(), self.advisor.clone()),
            ("status".to_string(), self.status.clone()),
            ("pending_step".to_string(), self.pending_step.clone()),
            ("responsible".to_string(), self.responsible.clone()),
            ("sla_hours".to_string(), self.sla_hours.to_string()),
            ("notes".to_string(), self.notes.clone()),
        ])
    }

    pub fn is_stalled(&self) -> bool {
        self.sla_hours > STALLED_AFTER_HOURS
    }

    /// Stable source id, e.g. `case:john-kim`.
    pub fn source_id(&self) -> String {
        let slug: String = self
            .client
            .to_lowercase()
            .split_whitespace()
            .collect::<Vec<_>>()
            .join("-");
        format!("case:{slug}")
    }

    pub fn to_source(&self) -> Source {
        Source::Record {
            id: self.source_id(),
            fields: self.fields(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CaseBook {
    cases: Vec<CaseRecord>,
}

impl CaseBook {
    pub fn new(cases: Vec<CaseRecord>) -> Self {
        Self { cases }
    }

    pub fn all(&self) -> &[CaseRecord] {
        &self.cases
    }

    /// Cases whose client name contains `name`, ignoring case.
    pub fn find(&self, name: &str) -> Vec<&CaseRecord> {
        let needle = name.trim().to_lowercase();
        if needle.is_empty() {
            return Vec::new();
        }
        self.cases
            .iter()
            .filter(|c| c.client.to_lowercase().contains(&needle))
            .collect()
    }

    /// Cases past the stall threshold, longest-waiting first.
    pub fn stalled(&self) -> Vec<&CaseRecord> {
        let mut stalled: Vec<&CaseRecord> = self.cases.iter().filter(|c| c.is_stalled()).collect();
        stalled.sort_by(|a, b| b.sla_hours.cmp(&a.sla_hours));
        stalled
    }

    pub fn to_sources(&self) -> Vec<Source> {
        self.cases.iter().map(CaseRecord::to_source).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builtin;
    use crate::loader::CorpusLoader;

    #[test]
    fn find_is_case_insensitive_substring() {
        let book = builtin::case_book();
        let hits = book.find("kim");
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].client, "John Kim");
        assert!(book.find("   ").is_empty());
        assert!(book.find("nobody").is_empty());
    }

    #[test]
    fn stalled_excludes_cases_at_threshold() {
        let book = builtin::case_book();
        let stalled = book.stalled();
        assert_eq!(stalled.len(), 4);
        assert!(stalled.iter().all(|c| c.sla_hours > 24));
        assert!(!stalled.iter().any(|c| c.client == "James Wong"));
        assert_eq!(stalled[0].sla_hours, 72);
    }

    #[test]
    fn records_load_as_prose() {
        let book = builtin::case_book();
        let report = CorpusLoader::new().load(book.to_sources());
        assert_eq!(report.fragments.len(), book.all().len());
        let john = report
            .fragments
            .iter()
            .find(|f| f.source_id == "case:john-kim")
            .unwrap();
        assert!(john.text.starts_with("Advisor: James Lee."));
        assert!(john.text.contains("Pending step: Attestation."));
        assert!(john.text.contains("Sla hours: 48."));
    }
}
