//! Terminal rendering for classifications, groups and analysis reports.

use std::sync::Mutex;

use dealscope_core::{
    CategoryAnalysis, Classification, DocumentGroup, PipelineState, PipelineStatus, SourceLocation,
    SourcedNumber, SourcedText,
};
use dealscope_pipeline::PipelineObserver;

const MAX_QUOTE_CHARS: usize = 90;

// ── classify / group ──

pub fn print_classifications(rows: &[(String, Classification)]) {
    println!("=== Classification ===");
    for (filename, c) in rows {
        println!("  {:<40} {:<20} {}", filename, c.subtype, c.category);
    }
}

pub fn print_groups(groups: &[DocumentGroup]) {
    for group in groups {
        println!("=== {} ({}) ===", group.id, group.kind.as_str());
        for (i, member) in group.members.iter().enumerate() {
            let marker = if i == group.primary && group.is_bundle() { "*" } else { " " };
            println!(" {marker}{:<40} {}", member.filename, member.subtype);
        }
        println!();
    }
}

// ── analyze ──

/// Print a finished run as a grouped report.
pub fn print_report(state: &PipelineState) {
    println!("=== {} ===", state.company_label());
    println!("  {:<26} {}", "run_id", state.run_id);
    println!("  {:<26} {}", "status", state.status);
    if let Some(err) = &state.error {
        println!("  {:<26} {}", "error", err);
    }
    println!();

    println!("Documents");
    for doc in &state.phase1_results {
        let detail = match &doc.error {
            Some(err) => format!("ERROR: {err}"),
            None => format!("{} / {} / {}", doc.subtype, doc.category, doc.jurisdiction),
        };
        println!("  {:<26} {}", doc.filename, detail);
        for (key, term) in doc.key_terms.entries() {
            println!("    {:<24} {}{}", key, term.value, cite(&term.source));
        }
        for flag in &doc.quick_flags {
            println!("    [{}] {}: {}", flag.flag, flag.topic, flag.issue);
        }
    }
    println!();

    if !state.phase2_results.is_empty() {
        println!("Category Analysis");
        for category in &state.phase2_results {
            let flag = category.flag.map_or("-", |f| f.as_str());
            println!("  {:<26} {} ({})", category.category, flag, category.status.as_str());
            if let Some(err) = &category.error {
                println!("    error: {err}");
            }
            for line in &category.summary {
                println!("    - {line}");
            }
            if let Some(analysis) = &category.analysis {
                print_terms(analysis);
            }
        }
        println!();
    }

    let Some(synthesis) = &state.phase3_result else {
        return;
    };
    println!("Synthesis");
    println!("  {:<26} {}", "jurisdiction", synthesis.jurisdiction);
    println!("  {:<26} {}", "instrument_type", synthesis.instrument_type);
    if let Some(err) = &synthesis.error {
        println!("  {:<26} {}", "error", err);
    }
    for point in &synthesis.executive_summary {
        println!("  [{}] {} ({})", point.flag, point.text, point.category);
    }
    println!();

    let snap = &synthesis.transaction_snapshot;
    let texts = [("round_type", snap.round_type.as_ref())];
    let numbers = [
        ("pre_money_valuation", snap.pre_money_valuation.as_ref()),
        ("post_money_valuation", snap.post_money_valuation.as_ref()),
        ("round_size", snap.round_size.as_ref()),
        ("price_per_share", snap.price_per_share.as_ref()),
        ("option_pool", snap.option_pool.as_ref()),
    ];
    println!("Transaction Snapshot");
    for (name, value) in texts {
        println!("  {:<26} {}", name, text_or_dash(value));
    }
    for (name, value) in numbers {
        println!("  {:<26} {}", name, number_or_dash(value));
    }
    println!();

    let dimensions: Vec<_> = synthesis
        .flag_summary
        .dimensions()
        .into_iter()
        .filter_map(|(name, d)| d.map(|d| (name, d)))
        .collect();
    if !dimensions.is_empty() {
        println!("Flag Summary");
        for (name, d) in dimensions {
            println!("  {:<26} {} {}", name, d.flag, d.justification);
        }
        println!();
    }

    if !synthesis.cross_document_issues.is_empty() {
        println!("Cross-Document Issues");
        for issue in &synthesis.cross_document_issues {
            let flag = issue.flag.map_or("-", |f| f.as_str());
            println!("  [{}] {}: {}", flag, issue.kind.as_str(), issue.description);
            if !issue.documents.is_empty() {
                println!("    {}", issue.documents.join(", "));
            }
        }
        println!();
    }
}

fn print_terms(analysis: &CategoryAnalysis) {
    for (key, flag, source) in analysis.terms() {
        let flag = flag.map_or("-", |f| f.as_str());
        println!("    {:<24} {:<6}{}", key, flag, cite(source));
    }
}

fn text_or_dash(v: Option<&SourcedText>) -> String {
    v.map_or_else(|| "-".into(), |t| format!("{}{}", t.value, cite(&t.source)))
}

fn number_or_dash(v: Option<&SourcedNumber>) -> String {
    v.map_or_else(
        || "-".into(),
        |n| match &n.currency {
            Some(currency) => format!("{currency} {}{}", n.value, cite(&n.source)),
            None => format!("{}{}", n.value, cite(&n.source)),
        },
    )
}

/// ` (p. 3) "quoted text…"`
fn cite(source: &SourceLocation) -> String {
    let page = source.page.map(|p| format!(" (p. {p})")).unwrap_or_default();
    let mut quote: String = source.quote.chars().take(MAX_QUOTE_CHARS).collect();
    if source.quote.chars().count() > MAX_QUOTE_CHARS {
        quote.push('…');
    }
    format!("{page} \"{quote}\"")
}

// ── Progress ──

/// Single-line progress on stderr, one line per phase.
#[derive(Default)]
pub struct ProgressPrinter {
    last_phase: Mutex<Option<PipelineStatus>>,
}

impl ProgressPrinter {
    fn phase_changed(&self, status: PipelineStatus) {
        let Ok(mut last) = self.last_phase.lock() else {
            return;
        };
        if *last != Some(status) {
            if last.is_some() {
                eprintln!();
            }
            *last = Some(status);
        }
    }
}

impl PipelineObserver for ProgressPrinter {
    fn on_phase1_progress(&self, state: &PipelineState) {
        self.phase_changed(state.status);
        let p = &state.progress.phase1;
        eprint!(
            "\r  Phase 1: extracted {}/{} {:<40}",
            p.completed,
            p.total,
            p.current.as_deref().unwrap_or("")
        );
    }

    fn on_phase2_progress(&self, state: &PipelineState) {
        self.phase_changed(state.status);
        let p = &state.progress.phase2;
        eprint!(
            "\r  Phase 2: analysed {}/{} categories {:<20}",
            p.completed,
            p.total,
            p.current.as_deref().unwrap_or("")
        );
    }

    fn on_phase3_progress(&self, state: &PipelineState) {
        self.phase_changed(state.status);
        let done = state.progress.phase3.completed > 0;
        eprint!("\r  Phase 3: {}", if done { "synthesised" } else { "synthesising..." });
    }

    fn on_complete(&self, _state: &PipelineState) {
        eprintln!();
    }

    fn on_error(&self, state: &PipelineState) {
        eprintln!();
        eprintln!("  Run failed: {}", state.error.as_deref().unwrap_or("unknown error"));
    }
}
