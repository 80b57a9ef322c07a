//! Saved-query document model and archiving rules
//!
//! A query document is an append-only, 1-indexed log of text revisions plus
//! a document-level archived flag. The archiving transitions are
//! deliberately asymmetric:
//!
//! | operation             | document flag | revision flags |
//! |-----------------------|---------------|----------------|
//! | archive query         | true          | all true       |
//! | unarchive query       | false         | unchanged      |
//! | archive revision i    | unchanged     | i = true       |
//! | unarchive revision i  | false         | i = false      |
//!
//! Mutations here are pure; the store applies them inside a single storage
//! transaction so readers never observe a half-applied cascade.

use serde::{Deserialize, Serialize};

/// One stored revision of a query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevisionRecord {
    pub text: String,
    #[serde(default)]
    pub archived: bool,
}

/// Stored shape of a query document. Namespace and name live in the row
/// key, not in the document body.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryDocument {
    /// Number of revisions ever appended. Revision ordinals are dense and
    /// 1-based: the Nth appended revision is addressable as ordinal N
    /// forever.
    #[serde(default)]
    pub size: u64,

    /// Document-level archived flag, the "default state of all revisions"
    /// for listing purposes.
    #[serde(default)]
    pub archived: bool,

    #[serde(default)]
    pub revisions: Vec<RevisionRecord>,
}

impl QueryDocument {
    /// Parse a stored document body. Failures are a distinct condition from
    /// "row absent" and surface as a decode error at the call site.
    ///
    /// A document whose `size` disagrees with its revision count does not
    /// conform to the expected shape: ordinal addressing trusts `size`, so
    /// such a document is rejected here rather than trusted downstream.
    pub fn decode(raw: &str) -> Result<Self, serde_json::Error> {
        let doc: Self = serde_json::from_str(raw)?;
        if doc.size != doc.revisions.len() as u64 {
            return Err(serde::de::Error::custom(format!(
                "size {} does not match revision count {}",
                doc.size,
                doc.revisions.len()
            )));
        }
        Ok(doc)
    }

    pub fn encode(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Map a 1-based ordinal to a vector index. `0` and anything past the
    /// current size are out of range.
    pub fn revision_index(&self, ordinal: u64) -> Option<usize> {
        if ordinal == 0 || ordinal > self.size {
            None
        } else {
            Some((ordinal - 1) as usize)
        }
    }

    pub fn revision(&self, ordinal: u64) -> Option<&RevisionRecord> {
        self.revision_index(ordinal).map(|i| &self.revisions[i])
    }

    /// Append a new revision. New revisions are never pre-archived, and
    /// this is the only mutation that grows `size`.
    pub fn append_revision(&mut self, text: String) {
        self.revisions.push(RevisionRecord {
            text,
            archived: false,
        });
        self.size += 1;
    }

    /// Set the document-level archived flag. Archiving cascades to every
    /// revision; unarchiving leaves individually archived revisions alone.
    pub fn set_document_archived(&mut self, archived: bool) {
        self.archived = archived;
        if archived {
            for revision in &mut self.revisions {
                revision.archived = true;
            }
        }
    }

    /// Set one revision's archived flag. Unarchiving a revision also clears
    /// the document flag, since the query is no longer fully archived;
    /// archiving one revision never touches the document flag. Returns
    /// false when the ordinal is out of range.
    pub fn set_revision_archived(&mut self, ordinal: u64, archived: bool) -> bool {
        let Some(index) = self.revision_index(ordinal) else {
            return false;
        };
        self.revisions[index].archived = archived;
        if !archived {
            self.archived = false;
        }
        true
    }

    /// Listing selection rule: the document flag acting as the default, or
    /// any revision as an exception to it.
    pub fn matches_archived(&self, archived: bool) -> bool {
        self.archived == archived || self.revisions.iter().any(|r| r.archived == archived)
    }

    /// Revisions whose flag equals `archived`, with their ordinals. Non-
    /// matching revisions are omitted entirely, never blanked.
    pub fn filtered_revisions(&self, archived: bool) -> Vec<SavedQueryRevision> {
        self.revisions
            .iter()
            .enumerate()
            .filter(|(_, r)| r.archived == archived)
            .map(|(i, r)| SavedQueryRevision {
                ordinal: (i + 1) as u64,
                text: r.text.clone(),
                archived: r.archived,
            })
            .collect()
    }

    /// Contract-facing summary with revisions filtered by `archived`.
    pub fn to_saved_query(&self, namespace: &str, name: &str, archived: bool) -> SavedQuery {
        SavedQuery {
            namespace: namespace.to_string(),
            name: name.to_string(),
            archived: self.archived,
            size: self.size,
            revisions: self.filtered_revisions(archived),
        }
    }
}

/// One revision as returned to the gateway.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SavedQueryRevision {
    /// 1-based position in the query's revision log
    pub ordinal: u64,
    pub text: String,
    pub archived: bool,
}

/// A query summary as returned to the gateway, with revisions filtered to
/// the requested archiving state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SavedQuery {
    pub namespace: String,
    pub name: String,
    pub archived: bool,
    pub size: u64,
    pub revisions: Vec<SavedQueryRevision>,
}
