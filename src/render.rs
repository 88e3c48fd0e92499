//! Colored terminal rendering for mirror and follow results.

use calmirror_core::{ApplyReport, ChangeSet, DiffKind};
use owo_colors::OwoColorize;

pub trait Render {
    fn render(&self) -> String;
}

impl Render for DiffKind {
    fn render(&self) -> String {
        let symbol = self.to_string();
        match self {
            DiffKind::Create => symbol.green().to_string(),
            DiffKind::Update => symbol.yellow().to_string(),
            DiffKind::Delete => symbol.red().to_string(),
        }
    }
}

impl Render for ChangeSet {
    fn render(&self) -> String {
        let mut lines = Vec::new();

        for desired in &self.upserts {
            let kind = if desired.target_event_id.is_some() {
                DiffKind::Update
            } else {
                DiffKind::Create
            };
            lines.push(format!(
                "   {} {} {}",
                kind.render(),
                desired.summary,
                desired.start.to_string().dimmed()
            ));
        }

        for target in &self.deletes {
            lines.push(format!("   {} {}", DiffKind::Delete.render(), target.summary));
        }

        if lines.is_empty() {
            lines.push(format!("   {}", "No changes".dimmed()));
        }

        lines.push(format!(
            "   {}",
            format!("{} unchanged", self.unchanged.len()).dimmed()
        ));

        lines.join("\n")
    }
}

pub fn render_scope(kind: &str, id: &str) -> String {
    format!("{} {}", kind.dimmed(), id.bold())
}

pub fn render_counts(report: &ApplyReport, unchanged: Option<usize>) -> String {
    let mut line = format!(
        "   {} created, {} updated, {} deleted",
        report.created, report.updated, report.deleted
    );
    if let Some(unchanged) = unchanged {
        line.push_str(&format!(", {unchanged} unchanged"));
    }
    line
}

pub fn render_error(error: &dyn std::fmt::Display) -> String {
    error
        .to_string()
        .lines()
        .map(|line| format!("   {}", line.red()))
        .collect::<Vec<_>>()
        .join("\n")
}
