use std::collections::HashMap;

use crate::models::{ChapterId, ChapterSummary, PersonalEntry, PersonalUpdate, ReadingStatus};

/// Status filters offered on the personal list, in tab order.
pub const FILTERS: [Option<ReadingStatus>; 6] = [
    None,
    Some(ReadingStatus::Reading),
    Some(ReadingStatus::Completed),
    Some(ReadingStatus::Favorite),
    Some(ReadingStatus::Pending),
    Some(ReadingStatus::Dropped),
];

/// Entries matching `filter` (all when `None`), highest personal score first.
pub fn filtered_by_score(entries: &[PersonalEntry], filter: Option<ReadingStatus>) -> Vec<&PersonalEntry> {
    let mut out: Vec<&PersonalEntry> = entries
        .iter()
        .filter(|e| filter.is_none() || e.status == filter)
        .collect();
    out.sort_by(|a, b| b.score.unwrap_or(0.0).total_cmp(&a.score.unwrap_or(0.0)));
    out
}

pub fn status_counts(entries: &[PersonalEntry]) -> HashMap<ReadingStatus, usize> {
    let mut counts = HashMap::new();
    for status in entries.iter().filter_map(|e| e.status) {
        *counts.entry(status).or_insert(0) += 1;
    }
    counts
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Progress {
    pub read: usize,
    pub percent: u8,
}

/// Chapters up to the last one read, against the manga's declared total.
pub fn reading_progress(
    chapters: &[ChapterSummary],
    last_read: Option<ChapterId>,
    total: Option<u32>,
) -> Option<Progress> {
    let last_read = last_read?;
    let total = total.filter(|t| *t > 0)?;
    let read = chapters.iter().filter(|c| c.id <= last_read).count();
    let percent = ((read as f64 / f64::from(total)) * 100.0).round().min(100.0) as u8;
    Some(Progress { read, percent })
}

/// Update sent when a chapter is opened.
pub fn chapter_opened(chapter_id: ChapterId, number: f64) -> PersonalUpdate {
    PersonalUpdate {
        last_read_chapter: Some(chapter_id),
        status: Some(if number > 0.0 {
            ReadingStatus::Reading
        } else {
            ReadingStatus::Pending
        }),
        score: None,
    }
}
