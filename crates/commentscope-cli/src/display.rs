//! Terminal rendering for comments, entities, themes and store statistics.

use commentscope_core::{Entity, NormalizedComment, Theme};
use commentscope_store::{CommentPage, EntitySource, StoreStats};

const PREVIEW_CHARS: usize = 72;
const MAX_KEY_POINTS: usize = 10;

/// Print a single comment as a vertical card grouped by section.
pub fn print_comment_card(comment: &NormalizedComment) {
    println!("=== {} ===", comment.id);
    println!();

    print_section(
        "Submission",
        &[
            ("submitter", comment.submitter_name.as_str()),
            ("organization", comment.organization_name.as_str()),
            ("submission_date", comment.submission_date.as_str()),
            ("comment_url", comment.comment_url.as_str()),
        ],
    );
    print_section(
        "Analysis",
        &[
            ("status", comment.status.as_str()),
            ("created_at", comment.created_at.as_str()),
            ("category", comment.category.as_str()),
        ],
    );

    if !comment.key_points.is_empty() {
        println!("Key Points");
        for point in comment.key_points.iter().take(MAX_KEY_POINTS) {
            println!("  - {point}");
        }
        if comment.key_points.len() > MAX_KEY_POINTS {
            println!("  ... {} more", comment.key_points.len() - MAX_KEY_POINTS);
        }
        println!();
    }

    print_block("Original Text", &comment.original_text);
    print_block("Detailed Content", &comment.detailed_content);
}

/// Print one page of comments as a compact table.
pub fn print_comment_table(page: &CommentPage) {
    let p = &page.pagination;
    println!(
        "page {}/{} ({} total, {} per page)",
        p.page,
        p.total_pages.max(1),
        p.total,
        p.limit
    );
    println!();
    println!("  {:<24} {:<10} {:<20} {}", "id", "status", "category", "text");
    for c in &page.comments {
        println!(
            "  {:<24} {:<10} {:<20} {}",
            c.id,
            c.status,
            truncate(&c.category, 20),
            truncate(&c.original_text, PREVIEW_CHARS)
        );
    }
}

pub fn print_entity_table(entities: &[Entity], source: EntitySource) {
    let label = match source {
        EntitySource::Precomputed => "precomputed taxonomy",
        EntitySource::Fallback => "mined from analyses",
    };
    println!("{} entities ({label})", entities.len());
    println!();
    println!("  {:>6}  {:<13} {}", "count", "type", "name");
    for e in entities {
        println!("  {:>6}  {:<13} {}", e.count, e.entity_type, e.name);
    }
}

pub fn print_theme_table(themes: &[Theme]) {
    if themes.is_empty() {
        println!("no themes (theme tables absent or empty)");
        return;
    }
    println!("  {:>6}  {:<12} {:<28} {}", "count", "id", "name", "description");
    for t in themes {
        println!(
            "  {:>6}  {:<12} {:<28} {}",
            t.count,
            t.id,
            truncate(&t.name, 28),
            truncate(&t.description, PREVIEW_CHARS)
        );
    }
}

pub fn print_stats(stats: &StoreStats) {
    println!("  {:<26} {}", "raw_submissions", stats.raw_submissions);
    println!("  {:<26} {}", "analyses", stats.analyses);
    println!("  {:<26} {}", "  pending", stats.pending);
    println!("  {:<26} {}", "  completed", stats.completed);
    println!("  {:<26} {}", "  failed", stats.failed);
}

// ── Section rendering ──

fn print_section(header: &str, fields: &[(&str, &str)]) {
    if fields.iter().all(|(_, v)| v.is_empty()) {
        return;
    }
    println!("{header}");
    for (name, value) in fields.iter().filter(|(_, v)| !v.is_empty()) {
        println!("  {:<26} {}", name, value);
    }
    println!();
}

fn print_block(header: &str, text: &str) {
    if text.trim().is_empty() {
        return;
    }
    println!("{header}");
    for line in text.lines() {
        println!("  {line}");
    }
    println!();
}

/// Cut `s` to at most `max` characters, marking the cut with an ellipsis.
fn truncate(s: &str, max: usize) -> String {
    let flat = s.replace(['\n', '\r'], " ");
    if flat.chars().count() <= max {
        return flat;
    }
    let cut: String = flat.chars().take(max.saturating_sub(1)).collect();
    format!("{cut}…")
}
