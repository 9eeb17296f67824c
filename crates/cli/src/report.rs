use anyhow::Result;
use chrono::{DateTime, Utc};
use geotag_core::models::{FileReport, FixSource, SkipReason};
use geotag_core::tagger::TagRun;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt::Write;

#[derive(Debug, Serialize)]
pub struct RunView<'a> {
    pub status: &'static str,
    pub source: FixSource,
    pub provider: &'a str,
    pub latitude: f64,
    pub longitude: f64,
    pub acquired_at: DateTime<Utc>,
    pub tag: &'a str,
    pub dry_run: bool,
    pub renamed: usize,
    pub skipped: usize,
    pub errors: usize,
    pub skipped_by_reason: &'a BTreeMap<SkipReason, usize>,
    pub files: &'a [FileReport],
}

impl<'a> RunView<'a> {
    pub fn new(run: &'a TagRun) -> Self {
        Self {
            status: "ok",
            source: run.fix.source(),
            provider: run.fix.provider(),
            latitude: run.fix.latitude(),
            longitude: run.fix.longitude(),
            acquired_at: run.fix.acquired_at(),
            tag: run.suffix.as_str(),
            dry_run: run.summary.dry_run,
            renamed: run.summary.renamed,
            skipped: run.summary.skipped,
            errors: run.summary.errors,
            skipped_by_reason: &run.summary.skipped_by_reason,
            files: &run.summary.files,
        }
    }
}

pub fn render_json(run: &TagRun) -> Result<String> {
    Ok(serde_json::to_string_pretty(&RunView::new(run))?)
}

pub fn render_text(run: &TagRun) -> String {
    let s = &run.summary;
    let mut out = String::new();
    let _ = writeln!(out, "{}", "-".repeat(40));
    let _ = writeln!(out, "Location tag: {}", run.suffix);
    if s.dry_run {
        let _ = writeln!(out, "Would rename: {}", s.renamed);
    } else {
        let _ = writeln!(out, "Renamed: {}", s.renamed);
    }
    if s.skipped_by_reason.is_empty() {
        let _ = writeln!(out, "Skipped: {}", s.skipped);
    } else {
        let reasons: Vec<String> = s
            .skipped_by_reason
            .iter()
            .map(|(reason, n)| format!("{reason}: {n}"))
            .collect();
        let _ = writeln!(out, "Skipped: {} ({})", s.skipped, reasons.join(", "));
    }
    if s.errors > 0 {
        let _ = writeln!(out, "Errors: {}", s.errors);
    }
    out
}

pub fn print(run: &TagRun, json: bool) -> Result<()> {
    if json {
        println!("{}", render_json(run)?);
    } else {
        print!("{}", render_text(run));
    }
    Ok(())
}
