use crate::pipeline::types::{Chapter, LabeledSample};

/// Chapter consolidator: drops empty labels and keeps only the first of
/// consecutive transitions sharing the last retained title. Expects the
/// transitions sorted by position.
pub fn consolidate(transitions: &[LabeledSample]) -> Vec<Chapter> {
    let mut chapters: Vec<Chapter> = Vec::new();

    for sample in transitions {
        if sample.label.is_empty() {
            continue;
        }
        if chapters.last().map(|c| c.title == sample.label).unwrap_or(false) {
            continue;
        }
        chapters.push(Chapter {
            timestamp: sample.timestamp,
            title: sample.label.clone(),
        });
    }

    chapters
}

/// `HH:MM:SS.mmm`
pub fn format_timestamp(seconds: f64) -> String {
    let total_ms = (seconds.max(0.0) * 1000.0).round() as u64;
    let ms = total_ms % 1000;
    let secs = total_ms / 1000;
    format!(
        "{:02}:{:02}:{:02}.{:03}",
        secs / 3600,
        (secs / 60) % 60,
        secs % 60,
        ms
    )
}

/// One `HH:MM:SS.mmm  title` line per chapter
pub fn chapter_listing(chapters: &[Chapter]) -> String {
    chapters
        .iter()
        .map(|c| format!("{}  {}", format_timestamp(c.timestamp), c.title))
        .collect::<Vec<_>>()
        .join("\n")
}
