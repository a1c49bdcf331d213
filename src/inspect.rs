//! Checks how Anki actually renders a note type, to debug template problems.

use std::fmt;

use regex::Regex;

use crate::{
    anki::{
        note_query,
        Anki,
        Transport,
    },
    core::SyncError,
};

const PREVIEW_CHARS: usize = 500;

/// Markers the Cloze-Modern templates rely on, as (label, needle) pairs.
pub const EXPECTED_MARKERS: [(&str, &str); 6] = [
    ("hidden raw-content container", r#"id="raw-content""#),
    ("rendered-content container", r#"id="rendered-content""#),
    ("marked.js reference", "_marked.min.js"),
    ("katex.js reference", "_katex.min.js"),
    ("highlight.js reference", "_highlight.min.js"),
    ("katex.css reference", "_katex.min.css"),
];

#[derive(Debug)]
pub struct InspectReport {
    pub note_type: String,
    pub card_id: u64,
    pub checks: Vec<(String, bool)>,
    pub raw_preview: Option<String>,
    pub scripts: Vec<String>,
    pub stylesheets: Vec<String>,
}

impl InspectReport {
    pub fn all_present(&self) -> bool {
        self.checks.iter().all(|(_, ok)| *ok)
    }
}

impl fmt::Display for InspectReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Template check for '{}' (card {})", self.note_type, self.card_id)?;
        for (label, ok) in &self.checks {
            writeln!(f, "  {} {}", if *ok { "ok     " } else { "MISSING" }, label)?;
        }
        if let Some(preview) = &self.raw_preview {
            writeln!(f, "raw-content (first {} chars):", PREVIEW_CHARS)?;
            writeln!(f, "{}", preview)?;
        }
        for script in &self.scripts {
            writeln!(f, "  script: {}", script)?;
        }
        for sheet in &self.stylesheets {
            writeln!(f, "  style:  {}", sheet)?;
        }
        Ok(())
    }
}

/// Renders the first card of `note_type` and reports what its question HTML contains.
///
/// Returns `Ok(None)` when the note type has no cards yet.
pub async fn inspect<T: Transport>(
    anki: &Anki<T>,
    note_type: &str,
) -> Result<Option<InspectReport>, SyncError> {
    let card_ids = anki.find_cards(&note_query(note_type)).await?;
    let Some(&first) = card_ids.first() else {
        return Ok(None);
    };

    let cards = anki.cards_info(&[first]).await?;
    let Some(card) = cards.into_iter().next() else {
        return Ok(None);
    };

    let mut report = analyze_question(&card.question)?;
    report.note_type = note_type.to_string();
    report.card_id = card.card_id;
    Ok(Some(report))
}

pub fn analyze_question(question: &str) -> Result<InspectReport, SyncError> {
    let checks = EXPECTED_MARKERS
        .iter()
        .map(|(label, needle)| (label.to_string(), question.contains(needle)))
        .collect();

    let raw = Regex::new(r#"(?s)id="raw-content"[^>]*>(.*?)</div>"#)?;
    let raw_preview = raw
        .captures(question)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().chars().take(PREVIEW_CHARS).collect());

    let script = Regex::new(r#"<script[^>]*src="([^"]+)""#)?;
    let link = Regex::new(r#"<link[^>]*href="([^"]+)""#)?;

    Ok(InspectReport {
        note_type: String::new(),
        card_id: 0,
        checks,
        raw_preview,
        scripts: script.captures_iter(question).map(|c| c[1].to_string()).collect(),
        stylesheets: link.captures_iter(question).map(|c| c[1].to_string()).collect(),
    })
}
