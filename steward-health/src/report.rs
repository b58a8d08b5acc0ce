//! Health report rendering.
//!
//! Structured text for terminals plus the serde `Serialize` impl on
//! [`HealthReport`] for `--json` output. Line format is stable enough for
//! machine parsing: one `category: earned/possible` row per category.

use std::fmt::Write as _;

use crate::evaluate::HealthReport;

/// Render a report as structured text.
pub fn render_text(report: &HealthReport) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "schema: {} v{}",
        report.schema_name, report.schema_version
    );
    let _ = writeln!(out, "repository_type: {}", report.repository_type);
    let _ = writeln!(out, "overall_score: {:.1}", report.overall_score);
    let _ = writeln!(out, "level: {}", report.level);

    let _ = writeln!(out, "categories:");
    for (name, score) in &report.categories {
        let _ = writeln!(out, "  {name}: {}/{}", score.earned, score.possible);
    }

    if !report.recommendations.is_empty() {
        let _ = writeln!(out, "recommendations:");
        for rec in &report.recommendations {
            let _ = writeln!(out, "  - {rec}");
        }
    }
    out
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
