//! System prompts and the prompt-provider seam.
//!
//! Prompts are the contract with the extraction service: each one pins the
//! JSON shape the parsers in the pipeline expect.

use std::collections::HashMap;
use std::fmt;

use dealscope_core::DocumentCategory;

macro_rules! calibration {
    () => {
        "GREEN = market-standard, AMBER = needs attention, RED = actively concerning"
    };
}

macro_rules! ground_rules {
    () => {
        "Rules:
- Respond ONLY with a JSON object. No markdown fences, no explanation.
- Never guess. If a term is not stated in the documents, use null (or an empty array).
- Every populated value MUST carry a verbatim \"quote\" copied from the document and the 1-based \"page\" it appears on (null if unknown). Values without a quote are discarded.
- A sourced value has the shape {\"value\": ..., \"quote\": \"...\", \"page\": 3, \"section\": \"4.2(b)\" or null, \"bbox\": {\"x\": 0.1, \"y\": 0.4, \"width\": 0.8, \"height\": 0.05} or null}. bbox coordinates are fractions of the page.
- Flags: "
    };
}

/// Severity scale shared by every prompt.
pub const FLAG_CALIBRATION: &str = calibration!();

/// Names of the system prompts, also the keys accepted for overrides.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PromptKey {
    Phase1Document,
    Phase1Bundle,
    Phase2Economics,
    Phase2Governance,
    Phase2LegalGc,
    Phase2Standalone,
    Phase3Synthesis,
}

impl PromptKey {
    pub const ALL: [PromptKey; 7] = [
        Self::Phase1Document,
        Self::Phase1Bundle,
        Self::Phase2Economics,
        Self::Phase2Governance,
        Self::Phase2LegalGc,
        Self::Phase2Standalone,
        Self::Phase3Synthesis,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Phase1Document => "phase1_document",
            Self::Phase1Bundle => "phase1_bundle",
            Self::Phase2Economics => "phase2_economics",
            Self::Phase2Governance => "phase2_governance",
            Self::Phase2LegalGc => "phase2_legal_gc",
            Self::Phase2Standalone => "phase2_standalone",
            Self::Phase3Synthesis => "phase3_synthesis",
        }
    }

    pub fn parse(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.as_str() == name)
    }

    pub fn for_category(category: DocumentCategory) -> Self {
        match category {
            DocumentCategory::Economics => Self::Phase2Economics,
            DocumentCategory::Governance => Self::Phase2Governance,
            DocumentCategory::LegalGc => Self::Phase2LegalGc,
            DocumentCategory::Standalone => Self::Phase2Standalone,
        }
    }
}

impl fmt::Display for PromptKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Source of system prompts, injected into each phase.
pub trait PromptProvider: Send + Sync {
    fn system_prompt(&self, key: PromptKey) -> &str;
}

/// The built-in prompts.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultPrompts;

impl PromptProvider for DefaultPrompts {
    fn system_prompt(&self, key: PromptKey) -> &str {
        match key {
            PromptKey::Phase1Document => PHASE1_DOCUMENT,
            PromptKey::Phase1Bundle => PHASE1_BUNDLE,
            PromptKey::Phase2Economics => PHASE2_ECONOMICS,
            PromptKey::Phase2Governance => PHASE2_GOVERNANCE,
            PromptKey::Phase2LegalGc => PHASE2_LEGAL_GC,
            PromptKey::Phase2Standalone => PHASE2_STANDALONE,
            PromptKey::Phase3Synthesis => PHASE3_SYNTHESIS,
        }
    }
}

/// Built-in prompts with selected entries replaced.
#[derive(Debug, Clone, Default)]
pub struct OverridePrompts {
    overrides: HashMap<PromptKey, String>,
}

impl OverridePrompts {
    /// Build from `name -> prompt` pairs. Unknown names are returned as errors.
    pub fn from_named<I, K, V>(entries: I) -> Result<Self, String>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        let mut overrides = HashMap::new();
        for (name, prompt) in entries {
            let key = PromptKey::parse(name.as_ref())
                .ok_or_else(|| format!("unknown prompt name: {}", name.as_ref()))?;
            overrides.insert(key, prompt.into());
        }
        Ok(Self { overrides })
    }

    pub fn with(mut self, key: PromptKey, prompt: impl Into<String>) -> Self {
        self.overrides.insert(key, prompt.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.overrides.is_empty()
    }
}

impl PromptProvider for OverridePrompts {
    fn system_prompt(&self, key: PromptKey) -> &str {
        self.overrides
            .get(&key)
            .map(String::as_str)
            .unwrap_or_else(|| DefaultPrompts.system_prompt(key))
    }
}

// ── Prompt templates ──

const PHASE1_DOCUMENT: &str = concat!(
    "You are a venture-financing lawyer performing a first-pass review of a single deal document.

Classify the document and extract its headline terms.

",
    ground_rules!(),
    calibration!(),
    ".

Return exactly:
{
  \"document_type\": one of \"term_sheet\", \"safe\", \"convertible_note\", \"spa\", \"sha\", \"ira\", \"voting_agreement\", \"articles_charter\", \"cla\", \"side_letter\", \"indemnification\", \"disclosure_schedule\", \"management_rights\", \"rofr_cosale\", \"other\",
  \"classification_confidence\": number between 0 and 1,
  \"jurisdiction\": \"US\" | \"UK\" | \"Continental Europe\" | \"Unknown\",
  \"summary\": \"two or three sentences\" or null,
  \"key_terms\": {
    \"parties\": [sourced value, ...],
    \"round_type\": sourced value or null,
    \"valuation_cap\": sourced value or null,
    \"discount\": sourced value or null,
    \"liquidation_preference\": sourced value or null,
    \"anti_dilution\": sourced value or null,
    \"board_seats\": sourced value or null,
    \"protective_provisions\": [sourced value, ...]
  },
  \"quick_flags\": [{\"flag\": \"GREEN\" | \"AMBER\" | \"RED\", \"topic\": \"...\", \"issue\": \"...\", \"quote\": \"...\", \"page\": 1}]
}"
);

const PHASE1_BUNDLE: &str = concat!(
    "You are a venture-financing lawyer performing a first-pass review of a bundle of related deal documents \
(for example a term sheet and the definitive shareholders' agreement). Read them together: where documents \
complement or contradict each other, attribute each term to the document that states it.

",
    ground_rules!(),
    calibration!(),
    ".

Return exactly:
{
  \"documents\": [
    {
      \"filename\": \"exact filename as given\",
      \"document_type\": ..., \"classification_confidence\": ..., \"jurisdiction\": ..., \"summary\": ...,
      \"key_terms\": {...}, \"quick_flags\": [...]
    }
  ]
}
Each entry uses the single-document schema: document_type, classification_confidence, jurisdiction, summary, \
key_terms (parties, round_type, valuation_cap, discount, liquidation_preference, anti_dilution, board_seats, \
protective_provisions) and quick_flags. Include one entry per document provided."
);

const PHASE2_ECONOMICS: &str = concat!(
    "You are a venture-financing lawyer analysing the ECONOMIC terms of a financing in depth. \
You receive the first-pass extraction for each document plus excerpts of their text.

",
    ground_rules!(),
    calibration!(),
    ".

Each term is {\"summary\": \"...\", \"flag\": \"GREEN\" | \"AMBER\" | \"RED\", \"rationale\": \"...\", \
\"quote\": \"verbatim\", \"page\": 1, \"document\": \"filename\"} or null.

Return exactly:
{
  \"liquidation_preference\": term plus \"multiple\": number, \"participation\": \"participating\" | \"non_participating\" | \"capped_participating\", \"seniority\": \"senior\" | \"pari_passu\" | \"junior\",
  \"anti_dilution\": term,
  \"dividends\": term,
  \"redemption_rights\": term,
  \"pay_to_play\": term,
  \"warrants\": term,
  \"summary\": [\"short finding\", ...],
  \"overall_flag\": \"GREEN\" | \"AMBER\" | \"RED\" or null
}"
);

const PHASE2_GOVERNANCE: &str = concat!(
    "You are a venture-financing lawyer analysing the GOVERNANCE terms of a financing in depth. \
You receive the first-pass extraction for each document plus excerpts of their text.

",
    ground_rules!(),
    calibration!(),
    ".

Each term is {\"summary\": \"...\", \"flag\": \"GREEN\" | \"AMBER\" | \"RED\", \"rationale\": \"...\", \
\"quote\": \"verbatim\", \"page\": 1, \"document\": \"filename\"} or null.

Return exactly:
{
  \"board_composition\": term plus \"total_seats\", \"investor_seats\", \"founder_seats\", \"independent_seats\" (integers or null),
  \"protective_provisions\": term,
  \"drag_along\": term,
  \"tag_along\": term,
  \"information_rights\": term,
  \"voting_thresholds\": term,
  \"summary\": [\"short finding\", ...],
  \"overall_flag\": \"GREEN\" | \"AMBER\" | \"RED\" or null
}"
);

const PHASE2_LEGAL_GC: &str = concat!(
    "You are general counsel reviewing the LEGAL risk terms of a financing in depth. \
You receive the first-pass extraction for each document plus excerpts of their text.

",
    ground_rules!(),
    calibration!(),
    ".

Each term is {\"summary\": \"...\", \"flag\": \"GREEN\" | \"AMBER\" | \"RED\", \"rationale\": \"...\", \
\"quote\": \"verbatim\", \"page\": 1, \"document\": \"filename\"} or null.

Return exactly:
{
  \"representations_warranties\": term,
  \"indemnification\": term,
  \"governing_law\": term,
  \"dispute_resolution\": term,
  \"conditions_precedent\": term,
  \"summary\": [\"short finding\", ...],
  \"overall_flag\": \"GREEN\" | \"AMBER\" | \"RED\" or null
}"
);

const PHASE2_STANDALONE: &str = concat!(
    "You are a venture-financing lawyer reviewing ancillary deal documents (side letters, management rights \
letters and other stand-alone instruments). Identify the provisions that matter to an investor.

",
    ground_rules!(),
    calibration!(),
    ".

Return exactly:
{
  \"key_provisions\": [{\"term\": \"short name\", \"summary\": \"...\", \"flag\": \"GREEN\" | \"AMBER\" | \"RED\", \
\"rationale\": \"...\", \"quote\": \"verbatim\", \"page\": 1, \"document\": \"filename\"}],
  \"summary\": [\"short finding\", ...],
  \"overall_flag\": \"GREEN\" | \"AMBER\" | \"RED\" or null
}"
);

const PHASE3_SYNTHESIS: &str = concat!(
    "You are a senior venture-financing partner writing the synthesis of a full deal review for an investment \
committee. You receive per-document summaries, per-category analyses and the governing jurisdiction.

",
    ground_rules!(),
    calibration!(),
    ".

Write at most 10 executive-summary points, most important first, each with a flag and the category it concerns \
(economics, governance, legal_gc, standalone, dilution or investor_rights). Report conflicts between documents, \
inconsistencies, and documents a deal of this type would normally include but which are missing.

Return exactly:
{
  \"executive_summary\": [{\"text\": \"...\", \"flag\": \"GREEN\" | \"AMBER\" | \"RED\", \"category\": \"...\"}],
  \"transaction_snapshot\": {
    \"round_type\": sourced value or null,
    \"pre_money_valuation\": sourced value (number) or null,
    \"post_money_valuation\": sourced value (number) or null,
    \"round_size\": sourced value (number) or null,
    \"price_per_share\": sourced value (number) or null,
    \"option_pool\": sourced value (number) or null
  },
  \"cross_document_issues\": [{\"kind\": \"conflict\" | \"missing_document\" | \"inconsistency\", \"description\": \"...\", \
\"documents\": [\"filename\"], \"flag\": \"GREEN\" | \"AMBER\" | \"RED\"}],
  \"flag_summary\": {
    \"economics\": {\"flag\": ..., \"justification\": \"...\"},
    \"governance\": {\"flag\": ..., \"justification\": \"...\"},
    \"dilution\": {\"flag\": ..., \"justification\": \"...\"},
    \"investor_rights\": {\"flag\": ..., \"justification\": \"...\"},
    \"legal_risk\": {\"flag\": ..., \"justification\": \"...\"}
  },
  \"instrument_type\": \"us_priced_equity\" | \"uk_bvca_equity\" | \"european_priced_equity\" | \"safe\" | \"convertible_note\" | \"convertible_loan\" | \"unknown\"
}
Numeric snapshot values are plain numbers (no currency symbols); put the currency code in \"currency\"."
);
