//! Keyword classification of legal instruments.
//!
//! Rules are checked in a fixed order and the first hit wins, so more specific
//! instruments must come before the ones whose keywords they contain
//! (`"convertible loan"` is a CLA, never a bare `"convertible"` note).
//!
//! Each rule carries two keyword kinds:
//!
//! - phrases, matched against the compacted text (lowercase, apostrophes
//!   dropped, every non-alphanumeric run removed), so `"TermSheet.pdf"` and
//!   `"Term_Sheet v2.pdf"` both contain `termsheet`
//! - abbreviations (`sha`, `spa`, `note`), matched as whole tokens and only
//!   against filenames, where they are meaningful

use serde::{Deserialize, Serialize};

use crate::document::{DocumentCategory, DocumentSubtype};

/// Characters of extracted text considered when the filename is inconclusive.
pub const TEXT_CLASSIFICATION_WINDOW: usize = 3_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Classification {
    pub subtype: DocumentSubtype,
    pub category: DocumentCategory,
}

impl From<DocumentSubtype> for Classification {
    fn from(subtype: DocumentSubtype) -> Self {
        Self {
            subtype,
            category: subtype.category(),
        }
    }
}

struct Rule {
    subtype: DocumentSubtype,
    phrases: &'static [&'static str],
    abbreviations: &'static [&'static str],
}

const RULES: &[Rule] = &[
    Rule {
        subtype: DocumentSubtype::TermSheet,
        phrases: &["term sheet", "heads of terms", "summary of terms"],
        abbreviations: &[],
    },
    Rule {
        subtype: DocumentSubtype::Safe,
        phrases: &["simple agreement for future equity"],
        abbreviations: &["safe"],
    },
    Rule {
        subtype: DocumentSubtype::ConvertibleNote,
        phrases: &[
            "convertible note",
            "convertible promissory",
            "promissory note",
            "note purchase",
        ],
        abbreviations: &["note", "notes"],
    },
    Rule {
        subtype: DocumentSubtype::Cla,
        phrases: &["convertible loan", "loan agreement"],
        abbreviations: &["cla"],
    },
    Rule {
        subtype: DocumentSubtype::Spa,
        phrases: &[
            "share purchase",
            "stock purchase",
            "share subscription",
            "subscription agreement",
            "investment agreement",
        ],
        abbreviations: &["spa", "ssa"],
    },
    Rule {
        subtype: DocumentSubtype::Sha,
        phrases: &[
            "shareholders agreement",
            "shareholder agreement",
            "stockholders agreement",
            "stockholder agreement",
        ],
        abbreviations: &["sha"],
    },
    Rule {
        subtype: DocumentSubtype::Ira,
        phrases: &["investors rights", "investor rights"],
        abbreviations: &["ira"],
    },
    Rule {
        subtype: DocumentSubtype::VotingAgreement,
        phrases: &["voting agreement", "voting"],
        abbreviations: &[],
    },
    Rule {
        subtype: DocumentSubtype::ArticlesCharter,
        phrases: &[
            "articles of association",
            "certificate of incorporation",
            "memorandum of association",
            "articles",
            "charter",
            "bylaws",
        ],
        abbreviations: &["coi"],
    },
    Rule {
        subtype: DocumentSubtype::SideLetter,
        phrases: &["side letter"],
        abbreviations: &[],
    },
    Rule {
        subtype: DocumentSubtype::Indemnification,
        phrases: &["indemnification", "indemnity"],
        abbreviations: &[],
    },
    Rule {
        subtype: DocumentSubtype::DisclosureSchedule,
        phrases: &["disclosure schedule", "disclosure letter", "disclosure"],
        abbreviations: &[],
    },
    Rule {
        subtype: DocumentSubtype::ManagementRights,
        phrases: &["management rights"],
        abbreviations: &["mrl"],
    },
    Rule {
        subtype: DocumentSubtype::RofrCosale,
        phrases: &["right of first refusal", "co sale", "cosale"],
        abbreviations: &["rofr"],
    },
];

/// Classify a document from its filename, consulting the head of its text
/// when the filename alone is inconclusive.
pub fn classify(filename: &str, text: Option<&str>) -> Classification {
    let stem = strip_extension(filename);
    let subtype = match_rules(stem, true);
    if subtype != DocumentSubtype::Other {
        return subtype.into();
    }
    match text {
        Some(text) => {
            let head: String = text.chars().take(TEXT_CLASSIFICATION_WINDOW).collect();
            match_rules(&head, false).into()
        }
        None => subtype.into(),
    }
}

fn match_rules(input: &str, allow_abbreviations: bool) -> DocumentSubtype {
    let tokens = tokenize(input);
    let compact: String = tokens.concat();

    for rule in RULES {
        let phrase_hit = rule
            .phrases
            .iter()
            .any(|phrase| compact.contains(&compact_phrase(phrase)));
        let abbreviation_hit = allow_abbreviations
            && rule
                .abbreviations
                .iter()
                .any(|abbr| tokens.iter().any(|t| t == abbr));
        if phrase_hit || abbreviation_hit {
            return rule.subtype;
        }
    }
    DocumentSubtype::Other
}

fn tokenize(input: &str) -> Vec<String> {
    input
        .to_lowercase()
        .replace(['\'', '\u{2019}'], "")
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

fn compact_phrase(phrase: &str) -> String {
    phrase.chars().filter(|c| c.is_alphanumeric()).collect()
}

fn strip_extension(filename: &str) -> &str {
    match filename.rsplit_once('.') {
        Some((stem, ext))
            if !stem.is_empty()
                && (1..=5).contains(&ext.len())
                && ext.chars().all(|c| c.is_ascii_alphanumeric()) =>
        {
            stem
        }
        _ => filename,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn subtype(filename: &str) -> DocumentSubtype {
        classify(filename, None).subtype
    }

    #[test]
    fn single_keyword_filenames() {
        let cases = [
            ("Term Sheet.pdf", DocumentSubtype::TermSheet),
            ("TermSheet.pdf", DocumentSubtype::TermSheet),
            ("YC_SAFE_post_money.pdf", DocumentSubtype::Safe),
            ("Convertible_Note.docx", DocumentSubtype::ConvertibleNote),
            ("Convertible Loan Agreement.docx", DocumentSubtype::Cla),
            ("Series A Stock Purchase Agreement.pdf", DocumentSubtype::Spa),
            ("SHA.docx", DocumentSubtype::Sha),
            ("Shareholders' Agreement (final).docx", DocumentSubtype::Sha),
            ("Investors Rights Agreement.pdf", DocumentSubtype::Ira),
            ("Voting Agreement.pdf", DocumentSubtype::VotingAgreement),
            ("Articles of Association.pdf", DocumentSubtype::ArticlesCharter),
            ("Restated Certificate of Incorporation.pdf", DocumentSubtype::ArticlesCharter),
            ("SideLetter.docx", DocumentSubtype::SideLetter),
            ("Indemnification Agreement.pdf", DocumentSubtype::Indemnification),
            ("Disclosure Schedule.pdf", DocumentSubtype::DisclosureSchedule),
            ("Management Rights Letter.pdf", DocumentSubtype::ManagementRights),
            ("ROFR and Co-Sale Agreement.pdf", DocumentSubtype::RofrCosale),
            ("board minutes.pdf", DocumentSubtype::Other),
        ];
        for (filename, expected) in cases {
            assert_eq!(subtype(filename), expected, "{filename}");
        }
    }

    #[test]
    fn priority_order_resolves_overlaps() {
        // A bare "note" token outranks the CLA phrase because notes come first.
        assert_eq!(
            subtype("Convertible Loan Agreement - note.pdf"),
            DocumentSubtype::ConvertibleNote
        );
        // Term sheets outrank everything they mention.
        assert_eq!(subtype("SHA term sheet.pdf"), DocumentSubtype::TermSheet);
        // Side letters to an SHA are still SHA-family by order.
        assert_eq!(subtype("SHA side letter.pdf"), DocumentSubtype::Sha);
        // "Convertible loan" is never mistaken for a note.
        assert_eq!(subtype("convertible-loan.pdf"), DocumentSubtype::Cla);
    }

    #[test]
    fn classification_is_deterministic() {
        for _ in 0..3 {
            assert_eq!(subtype("SPA.pdf"), DocumentSubtype::Spa);
        }
    }

    #[test]
    fn category_follows_subtype() {
        let c = classify("SHA.docx", None);
        assert_eq!(c.category, DocumentCategory::Governance);
        let c = classify("SideLetter.docx", None);
        assert_eq!(c.category, DocumentCategory::Standalone);
        let c = classify("unknown.pdf", None);
        assert_eq!(c.category, DocumentCategory::Standalone);
    }

    #[test]
    fn text_is_consulted_when_filename_is_inconclusive() {
        let text = "THIS SHAREHOLDERS' AGREEMENT is made on 1 March 2024 between...";
        assert_eq!(classify("scan_0042.pdf", Some(text)).subtype, DocumentSubtype::Sha);
    }

    #[test]
    fn abbreviations_are_ignored_in_text() {
        let text = "Please note the attached schedule.";
        assert_eq!(
            classify("scan_0042.pdf", Some(text)).subtype,
            DocumentSubtype::Other
        );
    }

    #[test]
    fn filename_wins_over_text() {
        let text = "SIMPLE AGREEMENT FOR FUTURE EQUITY";
        assert_eq!(classify("SHA.docx", Some(text)).subtype, DocumentSubtype::Sha);
    }
}
