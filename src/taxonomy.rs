//! Tag taxonomy: grouped tag names sourced from external storage.
//!
//! The taxonomy file is a JSON array of groups:
//!
//! ```json
//! [
//!   { "name": "Finance", "tags": ["Finance", "Budgets", "Reserve Fund Study"] },
//!   { "name": "Legal",   "tags": ["Legal", "Contract Review"] }
//! ]
//! ```
//!
//! Loading validates the schema up front; a malformed file is a fatal
//! startup error for whoever loads it. During processing the flattened
//! [`TagLibrary`] is read-only.

use crate::error::DocTagError;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use tracing::{debug, info};

/// One named group of tags.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TagGroup {
    pub name: String,
    pub tags: Vec<String>,
}

/// Ordered-by-group sequence of tag names offered to the model.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagLibrary {
    tags: Vec<String>,
}

/// Where a returned tag landed in the taxonomy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "name", rename_all = "snake_case")]
pub enum TagMatch {
    /// Matches a library entry; carries the library's spelling.
    Existing(String),
    /// Not in the library; carries the trimmed name as returned.
    New(String),
}

impl TagMatch {
    pub fn name(&self) -> &str {
        match self {
            TagMatch::Existing(n) | TagMatch::New(n) => n,
        }
    }

    pub fn is_new(&self) -> bool {
        matches!(self, TagMatch::New(_))
    }
}

impl TagLibrary {
    /// Build a library from a flat list, keeping first occurrences.
    pub fn from_tags<I, S>(tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut seen = HashSet::new();
        let tags = tags
            .into_iter()
            .map(Into::into)
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty() && seen.insert(t.to_lowercase()))
            .collect();
        Self { tags }
    }

    /// Flatten validated groups in group order.
    ///
    /// A tag listed in more than one group appears once, at its first
    /// position.
    pub fn from_groups(groups: &[TagGroup]) -> Result<Self, DocTagError> {
        validate_groups(groups)?;
        Ok(Self::from_tags(groups.iter().flat_map(|g| g.tags.iter().cloned())))
    }

    /// Parse and validate a tag-groups JSON document.
    pub fn from_json_str(json: &str) -> Result<Self, DocTagError> {
        let groups: Vec<TagGroup> = serde_json::from_str(json)
            .map_err(|e| DocTagError::InvalidTaxonomy(e.to_string()))?;
        Self::from_groups(&groups)
    }

    /// Load a tag-groups file from disk.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, DocTagError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| DocTagError::TaxonomyLoadFailed {
            path: path.to_path_buf(),
            detail: e.to_string(),
        })?;
        let groups: Vec<TagGroup> =
            serde_json::from_str(&raw).map_err(|e| DocTagError::TaxonomyLoadFailed {
                path: path.to_path_buf(),
                detail: e.to_string(),
            })?;
        let library = Self::from_groups(&groups)?;
        info!(
            "Loaded {} tags in {} groups from {}",
            library.len(),
            groups.len(),
            path.display()
        );
        Ok(library)
    }

    /// The built-in property-management taxonomy.
    pub fn default_library() -> Self {
        Self::from_tags(DEFAULT_TAGS.iter().copied())
    }

    pub fn tags(&self) -> &[String] {
        &self.tags
    }

    pub fn len(&self) -> usize {
        self.tags.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }

    pub fn joined(&self, sep: &str) -> String {
        self.tags.join(sep)
    }

    /// Case-insensitive lookup returning the library's spelling.
    pub fn find(&self, name: &str) -> Option<&str> {
        let needle = name.trim().to_lowercase();
        self.tags
            .iter()
            .find(|t| t.to_lowercase() == needle)
            .map(String::as_str)
    }

    /// Map returned tag strings onto the library.
    ///
    /// Blank entries are skipped; order and duplicates are preserved.
    pub fn reconcile(&self, returned: &[String]) -> Vec<TagMatch> {
        returned
            .iter()
            .map(|t| t.trim())
            .filter(|t| !t.is_empty())
            .map(|t| match self.find(t) {
                Some(canonical) => TagMatch::Existing(canonical.to_string()),
                None => {
                    debug!("Tag '{}' is not in the library", t);
                    TagMatch::New(t.to_string())
                }
            })
            .collect()
    }
}

fn validate_groups(groups: &[TagGroup]) -> Result<(), DocTagError> {
    for (i, group) in groups.iter().enumerate() {
        if group.name.trim().is_empty() {
            return Err(DocTagError::InvalidTaxonomy(format!(
                "group #{} has an empty name",
                i + 1
            )));
        }
        if let Some(pos) = group.tags.iter().position(|t| t.trim().is_empty()) {
            return Err(DocTagError::InvalidTaxonomy(format!(
                "group '{}' has an empty tag at position {}",
                group.name,
                pos + 1
            )));
        }
    }
    Ok(())
}

const DEFAULT_TAGS: &[&str] = &[
    // Governance
    "Governance",
    "Covenants",
    "Conditions",
    "Restrictions",
    "Constitution",
    "Declaration",
    "Bylaws",
    "Rules",
    "Policies",
    "Code of Conduct",
    // Meetings
    "Meetings",
    "Minutes",
    "AGM",
    // Communications
    "Communications",
    "Newsletters",
    "Marketing",
    "Social Media",
    "Website",
    // Finance
    "Finance",
    "Budgets",
    "Operating",
    "Annual",
    "Condo Specific",
    "Reserve Fund Study",
    // Owners
    "Owner Issues",
    // Property
    "Property Management",
    "Maintenance",
    "Repairs",
    "Construction",
    "Inspections",
    "Landscaping",
    "Snow Removal",
    // Board
    "Board Members Orientation & Onboarding",
    // Legal
    "Legal",
    "Lawsuits",
    "Contract Review",
    "Insurance",
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flattens_groups_in_order() {
        let lib = TagLibrary::from_json_str(
            r#"[{"name":"Finance","tags":["Finance","Budgets"]},
                {"name":"Legal","tags":["Legal","Budgets"]}]"#,
        )
        .unwrap();
        assert_eq!(lib.tags(), ["Finance", "Budgets", "Legal"]);
    }

    #[test]
    fn rejects_empty_group_name() {
        let err = TagLibrary::from_json_str(r#"[{"name":"  ","tags":["A"]}]"#).unwrap_err();
        assert!(matches!(err, DocTagError::InvalidTaxonomy(_)));
    }

    #[test]
    fn rejects_blank_tag() {
        let err =
            TagLibrary::from_json_str(r#"[{"name":"Finance","tags":["Budgets",""]}]"#).unwrap_err();
        assert!(err.to_string().contains("position 2"), "got: {err}");
    }

    #[test]
    fn rejects_wrong_shape() {
        assert!(TagLibrary::from_json_str(r#"{"Finance":["Budgets"]}"#).is_err());
        assert!(TagLibrary::from_json_str(r#"[{"name":"Finance","tags":"Budgets"}]"#).is_err());
        assert!(TagLibrary::from_json_str(r#"[{"name":"F","tags":[],"extra":1}]"#).is_err());
    }

    #[test]
    fn load_reports_missing_file() {
        let err = TagLibrary::load("/definitely/not/here.json").unwrap_err();
        assert!(matches!(err, DocTagError::TaxonomyLoadFailed { .. }));
    }

    #[test]
    fn load_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tag_groups.json");
        std::fs::write(&path, r#"[{"name":"Meetings","tags":["Minutes","AGM"]}]"#).unwrap();
        let lib = TagLibrary::load(&path).unwrap();
        assert_eq!(lib.tags(), ["Minutes", "AGM"]);
    }

    #[test]
    fn reconcile_prefers_library_spelling() {
        let lib = TagLibrary::from_tags(["Finance", "Reserve Fund Study"]);
        let got = lib.reconcile(&[
            " finance ".to_string(),
            "reserve fund study".to_string(),
            "Pool Rules".to_string(),
            "".to_string(),
        ]);
        assert_eq!(
            got,
            vec![
                TagMatch::Existing("Finance".into()),
                TagMatch::Existing("Reserve Fund Study".into()),
                TagMatch::New("Pool Rules".into()),
            ]
        );
        assert!(got[2].is_new());
        assert_eq!(got[1].name(), "Reserve Fund Study");
    }

    #[test]
    fn default_library_is_populated() {
        let lib = TagLibrary::default_library();
        assert!(lib.len() > 30);
        assert_eq!(lib.tags()[0], "Governance");
        assert!(lib.find("insurance").is_some());
    }
}
