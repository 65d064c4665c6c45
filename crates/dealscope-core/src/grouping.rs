//! Bundling of related uploads into financing packages.
//!
//! A term sheet and the definitive SHA describe the same round, so they are
//! analysed together. Bundles are computed once, before Phase 1.

use serde::{Deserialize, Serialize};

use crate::classifier::classify;
use crate::document::{DocumentCategory, DocumentSubtype};

/// Documents that belong in a priced-equity bundle once an SPA or SHA is present.
const PRICED_EQUITY: &[DocumentSubtype] = &[
    DocumentSubtype::Spa,
    DocumentSubtype::Sha,
    DocumentSubtype::Ira,
    DocumentSubtype::VotingAgreement,
    DocumentSubtype::ArticlesCharter,
    DocumentSubtype::DisclosureSchedule,
    DocumentSubtype::TermSheet,
];
const PRICED_PRIMARY: &[DocumentSubtype] = &[
    DocumentSubtype::Spa,
    DocumentSubtype::Sha,
    DocumentSubtype::TermSheet,
];

const CONVERTIBLE_ANCHORS: &[DocumentSubtype] = &[
    DocumentSubtype::Safe,
    DocumentSubtype::ConvertibleNote,
    DocumentSubtype::Cla,
];
const CONVERTIBLE_PRIMARY: &[DocumentSubtype] = CONVERTIBLE_ANCHORS;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GroupKind {
    PricedEquityBundle,
    ConvertibleBundle,
    Standalone,
    /// Caller-assembled bundle of unrelated instruments.
    Mixed,
}

impl GroupKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PricedEquityBundle => "priced_equity_bundle",
            Self::ConvertibleBundle => "convertible_bundle",
            Self::Standalone => "standalone",
            Self::Mixed => "mixed",
        }
    }
}

/// A classified upload, identified by its position in the request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentInfo {
    pub index: usize,
    pub filename: String,
    pub subtype: DocumentSubtype,
    pub category: DocumentCategory,
}

impl DocumentInfo {
    pub fn classify(index: usize, filename: &str, text: Option<&str>) -> Self {
        let c = classify(filename, text);
        Self {
            index,
            filename: filename.to_string(),
            subtype: c.subtype,
            category: c.category,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentGroup {
    pub id: String,
    pub kind: GroupKind,
    pub members: Vec<DocumentInfo>,
    /// Position of the primary document within `members`.
    pub primary: usize,
}

impl DocumentGroup {
    pub fn new(id: impl Into<String>, kind: GroupKind, members: Vec<DocumentInfo>, primary: usize) -> Self {
        let primary = primary.min(members.len().saturating_sub(1));
        Self {
            id: id.into(),
            kind,
            members,
            primary,
        }
    }

    pub fn primary(&self) -> Option<&DocumentInfo> {
        self.members.get(self.primary)
    }

    /// Whether members are analysed jointly in one service call.
    pub fn is_bundle(&self) -> bool {
        self.members.len() > 1
    }

    pub fn filenames(&self) -> Vec<&str> {
        self.members.iter().map(|m| m.filename.as_str()).collect()
    }
}

/// Cluster classified documents into bundles.
///
/// Groups come out as: the priced-equity bundle (if any), the convertible
/// bundle (if any), then one standalone group per leftover document in input
/// order.
pub fn group_documents(documents: &[DocumentInfo]) -> Vec<DocumentGroup> {
    let mut groups = Vec::new();
    if documents.is_empty() {
        return groups;
    }
    if documents.len() == 1 {
        groups.push(standalone(&documents[0]));
        return groups;
    }

    let mut grouped = vec![false; documents.len()];

    let has_definitive = documents
        .iter()
        .any(|d| matches!(d.subtype, DocumentSubtype::Spa | DocumentSubtype::Sha));
    if has_definitive {
        let members = take(documents, &mut grouped, |d| PRICED_EQUITY.contains(&d.subtype));
        let primary = pick_primary(&members, PRICED_PRIMARY);
        groups.push(DocumentGroup::new(
            format!("group-{}", groups.len() + 1),
            GroupKind::PricedEquityBundle,
            members,
            primary,
        ));
    }

    let has_convertible = documents
        .iter()
        .zip(&grouped)
        .any(|(d, done)| !done && CONVERTIBLE_ANCHORS.contains(&d.subtype));
    if has_convertible {
        let members = take(documents, &mut grouped, |d| {
            CONVERTIBLE_ANCHORS.contains(&d.subtype) || d.subtype == DocumentSubtype::SideLetter
        });
        let primary = pick_primary(&members, CONVERTIBLE_PRIMARY);
        groups.push(DocumentGroup::new(
            format!("group-{}", groups.len() + 1),
            GroupKind::ConvertibleBundle,
            members,
            primary,
        ));
    }

    for (doc, done) in documents.iter().zip(&grouped) {
        if !done {
            let mut group = standalone(doc);
            group.id = format!("group-{}", groups.len() + 1);
            groups.push(group);
        }
    }
    groups
}

fn standalone(doc: &DocumentInfo) -> DocumentGroup {
    DocumentGroup::new("group-1", GroupKind::Standalone, vec![doc.clone()], 0)
}

/// Move every not-yet-grouped document matching `pred` into a new member list.
fn take<F>(documents: &[DocumentInfo], grouped: &mut [bool], pred: F) -> Vec<DocumentInfo>
where
    F: Fn(&DocumentInfo) -> bool,
{
    let mut members = Vec::new();
    for (doc, done) in documents.iter().zip(grouped.iter_mut()) {
        if !*done && pred(doc) {
            *done = true;
            members.push(doc.clone());
        }
    }
    members
}

fn pick_primary(members: &[DocumentInfo], priority: &[DocumentSubtype]) -> usize {
    priority
        .iter()
        .find_map(|wanted| members.iter().position(|m| m.subtype == *wanted))
        .unwrap_or(0)
}
