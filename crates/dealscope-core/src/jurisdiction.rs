//! Governing-law inference and instrument typing.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::document::DocumentSubtype;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Jurisdiction {
    #[serde(rename = "US")]
    Us,
    #[serde(rename = "UK")]
    Uk,
    #[serde(rename = "Continental Europe")]
    ContinentalEurope,
    #[default]
    Unknown,
}

impl Jurisdiction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Us => "US",
            Self::Uk => "UK",
            Self::ContinentalEurope => "Continental Europe",
            Self::Unknown => "Unknown",
        }
    }

    pub fn parse(label: &str) -> Self {
        let key = label.trim().to_ascii_lowercase();
        match key.as_str() {
            "us" | "usa" | "united states" | "delaware" => Self::Us,
            "uk" | "united kingdom" | "england" | "england and wales" | "gb" => Self::Uk,
            "continental europe" | "eu" | "europe" | "continental_europe" => {
                Self::ContinentalEurope
            }
            _ => Self::Unknown,
        }
    }

    /// Scan document text for governing-law signals.
    ///
    /// Returns `Unknown` when no signal wins outright.
    pub fn detect(text: &str) -> Self {
        const US: &[&str] = &[
            "delaware",
            "state of new york",
            "laws of the state of",
            "securities act of 1933",
            "stockholder",
            "$",
        ];
        const UK: &[&str] = &[
            "england and wales",
            "companies act 2006",
            "bvca",
            "hm revenue",
            "seis",
            "£",
        ];
        const EU: &[&str] = &[
            "gmbh",
            "notarial",
            "notary",
            "société",
            "b.v.",
            "aktiengesellschaft",
            "€",
        ];

        let lower = text.to_lowercase();
        let score = |signals: &[&str]| signals.iter().filter(|s| lower.contains(*s)).count();
        let scores = [
            (Self::Us, score(US)),
            (Self::Uk, score(UK)),
            (Self::ContinentalEurope, score(EU)),
        ];

        let best = scores.iter().map(|(_, s)| *s).max().unwrap_or(0);
        let mut winners = scores.iter().filter(|(_, s)| *s == best && best > 0);
        match (winners.next(), winners.next()) {
            (Some((j, _)), None) => *j,
            _ => Self::Unknown,
        }
    }
}

impl fmt::Display for Jurisdiction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Mode of the non-`Unknown` jurisdictions; ties go to the first encountered.
pub fn majority_jurisdiction<I>(jurisdictions: I) -> Jurisdiction
where
    I: IntoIterator<Item = Jurisdiction>,
{
    // (jurisdiction, count) in first-seen order.
    let mut tally: Vec<(Jurisdiction, usize)> = Vec::new();
    for j in jurisdictions {
        if j == Jurisdiction::Unknown {
            continue;
        }
        match tally.iter_mut().find(|(seen, _)| *seen == j) {
            Some((_, count)) => *count += 1,
            None => tally.push((j, 1)),
        }
    }

    let mut best: Option<(Jurisdiction, usize)> = None;
    for (j, count) in tally {
        // Strictly greater keeps the earliest entry on ties.
        if best.is_none_or(|(_, c)| count > c) {
            best = Some((j, count));
        }
    }
    best.map(|(j, _)| j).unwrap_or_default()
}

/// Legal and economic structure of the financing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InstrumentType {
    UsPricedEquity,
    UkBvcaEquity,
    EuropeanPricedEquity,
    Safe,
    ConvertibleNote,
    ConvertibleLoan,
    #[default]
    Unknown,
}

impl InstrumentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::UsPricedEquity => "us_priced_equity",
            Self::UkBvcaEquity => "uk_bvca_equity",
            Self::EuropeanPricedEquity => "european_priced_equity",
            Self::Safe => "safe",
            Self::ConvertibleNote => "convertible_note",
            Self::ConvertibleLoan => "convertible_loan",
            Self::Unknown => "unknown",
        }
    }

    pub fn parse(label: &str) -> Option<Self> {
        let key: String = label
            .trim()
            .to_ascii_lowercase()
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
            .collect();
        let found = match key.trim_matches('_') {
            "us_priced_equity" | "priced_equity" | "us_equity" => Self::UsPricedEquity,
            "uk_bvca_equity" | "uk_equity" | "bvca" => Self::UkBvcaEquity,
            "european_priced_equity" | "european_equity" | "eu_equity" => {
                Self::EuropeanPricedEquity
            }
            "safe" => Self::Safe,
            "convertible_note" | "note" => Self::ConvertibleNote,
            "convertible_loan" | "cla" | "convertible_loan_agreement" => Self::ConvertibleLoan,
            "unknown" => Self::Unknown,
            _ => return None,
        };
        Some(found)
    }

    fn priced_equity(jurisdiction: Jurisdiction) -> Self {
        match jurisdiction {
            Jurisdiction::Uk => Self::UkBvcaEquity,
            Jurisdiction::ContinentalEurope => Self::EuropeanPricedEquity,
            Jurisdiction::Us | Jurisdiction::Unknown => Self::UsPricedEquity,
        }
    }
}

impl fmt::Display for InstrumentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Derive the instrument type from the document mix.
///
/// A definitive SPA or SHA means a priced round even when convertibles are
/// converting into it; otherwise the convertible instrument wins.
pub fn derive_instrument_type(subtypes: &[DocumentSubtype], jurisdiction: Jurisdiction) -> InstrumentType {
    let has = |s: DocumentSubtype| subtypes.contains(&s);

    if has(DocumentSubtype::Spa) || has(DocumentSubtype::Sha) {
        return InstrumentType::priced_equity(jurisdiction);
    }
    if has(DocumentSubtype::Safe) {
        return InstrumentType::Safe;
    }
    if has(DocumentSubtype::Cla) {
        return InstrumentType::ConvertibleLoan;
    }
    if has(DocumentSubtype::ConvertibleNote) {
        return InstrumentType::ConvertibleNote;
    }
    let priced_adjacent = [
        DocumentSubtype::TermSheet,
        DocumentSubtype::Ira,
        DocumentSubtype::VotingAgreement,
        DocumentSubtype::ArticlesCharter,
    ];
    if priced_adjacent.iter().any(|s| has(*s)) {
        return InstrumentType::priced_equity(jurisdiction);
    }
    InstrumentType::Unknown
}
