use tracing::warn;

use crate::records::MatchedTurn;
use crate::write::{
    MemoryClassifier, MemoryDigest, MemorySummarizer, MemoryWriteRecord, MemoryWriter,
};

/// Collapse duplicated output and dangling labels before summarizing. One
/// engine family is known to occasionally duplicate its final message, so
/// repeated paragraphs and back-to-back repeated sentences are folded away.
pub fn normalize_assistant_text(text: &str) -> String {
    let mut seen_paragraphs: Vec<String> = Vec::new();
    let mut kept: Vec<String> = Vec::new();

    for paragraph in text.split("\n\n") {
        let trimmed = paragraph.trim();
        if trimmed.is_empty() {
            continue;
        }
        let key = comparable_fold(trimmed);
        if seen_paragraphs.contains(&key) {
            continue;
        }
        seen_paragraphs.push(key);
        kept.push(collapse_repeated_sentences(trimmed));
    }

    let mut normalized = kept.join("\n\n");
    if let Some(stripped) = strip_trailing_label(&normalized) {
        normalized = stripped;
    }
    normalized
}

/// The portion of the normalized assistant text not already covered by the
/// digest. Coverage is a sentence-level containment check over a folded
/// form (case, whitespace, and CJK-punctuation insensitive); sentences
/// shorter than twelve comparable characters never count as overlap.
pub fn novel_content(normalized: &str, digest: &str) -> String {
    const MIN_OVERLAP_CHARS: usize = 12;
    let digest_fold = comparable_fold(digest);

    let mut novel: Vec<String> = Vec::new();
    for sentence in split_sentences(normalized) {
        let fold = comparable_fold(&sentence);
        if fold.is_empty() {
            continue;
        }
        let covered = fold.chars().count() >= MIN_OVERLAP_CHARS && digest_fold.contains(&fold);
        if !covered {
            novel.push(sentence);
        }
    }
    novel.join(" ")
}

/// Merge a matched turn and write it, best-effort. Every failure is logged
/// and swallowed; nothing propagates back into the event pipeline.
pub async fn merge_and_write(
    matched: MatchedTurn,
    summarizer: &dyn MemorySummarizer,
    classifier: &dyn MemoryClassifier,
    writer: &dyn MemoryWriter,
) {
    let normalized = normalize_assistant_text(&matched.assistant_text);
    let digest = match summarizer.digest(&normalized).await {
        Ok(digest) => digest,
        Err(error) => {
            warn!(
                thread_id = matched.thread_id.as_str(),
                error = %error,
                "memory summarizer failed; falling back to a truncated digest"
            );
            fallback_digest(&normalized)
        }
    };
    let novel = novel_content(&normalized, &digest.summary);

    let mut detail = matched.input_text.trim().to_owned();
    if !digest.summary.is_empty() {
        detail.push_str("\n\n");
        detail.push_str(digest.summary.as_str());
    }
    if !novel.is_empty() {
        detail.push_str("\n\n");
        detail.push_str(novel.as_str());
    }

    let classification = match classifier.classify(&detail).await {
        Ok(classification) => classification,
        Err(error) => {
            warn!(
                thread_id = matched.thread_id.as_str(),
                error = %error,
                "memory classifier failed; using the default classification"
            );
            Default::default()
        }
    };

    let record = MemoryWriteRecord {
        workspace_id: matched.workspace_id.as_str().to_owned(),
        thread_id: matched.thread_id.as_str().to_owned(),
        title: digest.title,
        detail,
        kind: classification.kind,
        importance: classification.importance,
    };

    match matched.prior_memory_id {
        Some(memory_id) => {
            if let Err(error) = writer.update(&memory_id, &record).await {
                warn!(
                    thread_id = matched.thread_id.as_str(),
                    memory_id = memory_id.as_str(),
                    error = %error,
                    "memory update failed; falling back to create"
                );
                if let Err(error) = writer.create(&record).await {
                    warn!(
                        thread_id = matched.thread_id.as_str(),
                        error = %error,
                        "memory create failed"
                    );
                }
            }
        }
        None => {
            if let Err(error) = writer.create(&record).await {
                warn!(
                    thread_id = matched.thread_id.as_str(),
                    error = %error,
                    "memory create failed"
                );
            }
        }
    }
}

fn collapse_repeated_sentences(paragraph: &str) -> String {
    let mut previous_fold: Option<String> = None;
    let mut kept: Vec<String> = Vec::new();
    for sentence in split_sentences(paragraph) {
        let fold = comparable_fold(&sentence);
        if previous_fold.as_deref() == Some(fold.as_str()) {
            continue;
        }
        previous_fold = Some(fold);
        kept.push(sentence);
    }
    kept.join(" ")
}

/// Drop a dangling label-like last line ("Summary:" with nothing after).
fn strip_trailing_label(text: &str) -> Option<String> {
    const MAX_LABEL_CHARS: usize = 24;
    let last_line = text.lines().rev().find(|line| !line.trim().is_empty())?;
    let trimmed = last_line.trim();
    let label = trimmed.strip_suffix(':').or_else(|| trimmed.strip_suffix('：'))?;
    if label.is_empty()
        || label.chars().count() > MAX_LABEL_CHARS
        || label.chars().any(|c| matches!(c, '.' | '!' | '?' | '。' | '！' | '？'))
    {
        return None;
    }
    let without = text
        .trim_end()
        .strip_suffix(trimmed)
        .unwrap_or(text)
        .trim_end()
        .to_owned();
    Some(without)
}

fn split_sentences(text: &str) -> Vec<String> {
    let mut sentences = Vec::new();
    let mut current = String::new();
    for c in text.chars() {
        match c {
            '.' | '!' | '?' | '。' | '！' | '？' => {
                current.push(c);
                let trimmed = current.trim();
                if !trimmed.is_empty() {
                    sentences.push(trimmed.to_owned());
                }
                current.clear();
            }
            '\n' => {
                let trimmed = current.trim();
                if !trimmed.is_empty() {
                    sentences.push(trimmed.to_owned());
                }
                current.clear();
            }
            _ => current.push(c),
        }
    }
    let trimmed = current.trim();
    if !trimmed.is_empty() {
        sentences.push(trimmed.to_owned());
    }
    sentences
}

/// Case, whitespace, and CJK-punctuation insensitive comparison form.
fn comparable_fold(text: &str) -> String {
    text.chars()
        .filter(|c| !c.is_whitespace())
        .map(|c| match c {
            '。' => '.',
            '，' | '、' => ',',
            '：' => ':',
            '；' => ';',
            '！' => '!',
            '？' => '?',
            '（' => '(',
            '）' => ')',
            other => other,
        })
        .flat_map(char::to_lowercase)
        .collect()
}

fn fallback_digest(normalized: &str) -> MemoryDigest {
    const TITLE_LIMIT: usize = 80;
    let first_sentence = split_sentences(normalized)
        .into_iter()
        .next()
        .unwrap_or_default();
    let title = if first_sentence.chars().count() > TITLE_LIMIT {
        first_sentence
            .chars()
            .take(TITLE_LIMIT)
            .collect::<String>()
    } else {
        first_sentence
    };
    MemoryDigest {
        title,
        summary: String::new(),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;
    use turnbridge_protocol::{ThreadId, WorkspaceId};

    use super::{merge_and_write, normalize_assistant_text, novel_content};
    use crate::records::{MatchedTurn, MemoryRecordId};
    use crate::write::{
        MemoryClassification, MemoryClassifier, MemoryDigest, MemoryError, MemoryImportance,
        MemoryKind, MemorySummarizer, MemoryWriteRecord, MemoryWriter,
    };

    #[test]
    fn repeated_paragraphs_collapse_to_one() {
        let text = "Fixed the bug.\n\nFixed the bug.";
        assert_eq!(normalize_assistant_text(text), "Fixed the bug.");
    }

    #[test]
    fn back_to_back_repeated_sentences_collapse() {
        let text = "Done. Done. The cache was stale.";
        assert_eq!(
            normalize_assistant_text(text),
            "Done. The cache was stale."
        );
    }

    #[test]
    fn dangling_trailing_label_is_stripped() {
        let text = "Renamed the helper and fixed the test.\n\nSummary:";
        assert_eq!(
            normalize_assistant_text(text),
            "Renamed the helper and fixed the test."
        );
    }

    #[test]
    fn trailing_label_with_content_is_kept() {
        let text = "All checks pass.\n\nNote: rerun CI after merging.";
        assert_eq!(normalize_assistant_text(text), text);
    }

    #[test]
    fn sentences_covered_by_the_digest_are_dropped() {
        let normalized = "The parser now accepts empty blocks. Added a regression test.";
        let digest = "The parser now accepts empty blocks.";
        assert_eq!(
            novel_content(normalized, digest),
            "Added a regression test."
        );
    }

    #[test]
    fn short_fragments_never_count_as_overlap() {
        // "Done." folds to five characters, below the overlap threshold.
        let normalized = "Done. The retry loop now backs off.";
        let digest = "Done.";
        assert_eq!(novel_content(normalized, digest), normalized);
    }

    #[test]
    fn overlap_comparison_ignores_case_whitespace_and_cjk_punctuation() {
        let normalized = "修复了缓存失效的问题，并补充了测试。";
        let digest = "修复了缓存失效的问题,并补充了测试.";
        assert_eq!(novel_content(normalized, digest), "");
    }

    #[derive(Default)]
    struct MockSummarizer {
        fail: bool,
    }

    #[async_trait]
    impl MemorySummarizer for MockSummarizer {
        async fn digest(&self, _text: &str) -> Result<MemoryDigest, MemoryError> {
            if self.fail {
                return Err(MemoryError::Summarizer("offline".to_owned()));
            }
            Ok(MemoryDigest {
                title: "Fix".to_owned(),
                summary: "Fixed null check at line 42.".to_owned(),
            })
        }
    }

    #[derive(Default)]
    struct MockClassifier;

    #[async_trait]
    impl MemoryClassifier for MockClassifier {
        async fn classify(&self, _detail: &str) -> Result<MemoryClassification, MemoryError> {
            Ok(MemoryClassification {
                kind: MemoryKind::Task,
                importance: MemoryImportance::High,
            })
        }
    }

    #[derive(Default)]
    struct RecordingWriter {
        fail_update: bool,
        creates: Mutex<Vec<MemoryWriteRecord>>,
        updates: Mutex<Vec<(MemoryRecordId, MemoryWriteRecord)>>,
    }

    #[async_trait]
    impl MemoryWriter for RecordingWriter {
        async fn create(&self, record: &MemoryWriteRecord) -> Result<MemoryRecordId, MemoryError> {
            self.creates
                .lock()
                .expect("creates lock")
                .push(record.clone());
            Ok(MemoryRecordId::new("mem-1"))
        }

        async fn update(
            &self,
            id: &MemoryRecordId,
            record: &MemoryWriteRecord,
        ) -> Result<(), MemoryError> {
            if self.fail_update {
                return Err(MemoryError::Store("update rejected".to_owned()));
            }
            self.updates
                .lock()
                .expect("updates lock")
                .push((id.clone(), record.clone()));
            Ok(())
        }
    }

    fn matched_turn(prior_memory_id: Option<MemoryRecordId>) -> MatchedTurn {
        MatchedTurn {
            workspace_id: WorkspaceId::new("ws-1"),
            thread_id: ThreadId::new("thr_1"),
            turn_id: None,
            input_text: "fix the bug".to_owned(),
            assistant_text: "Fixed null check at line 42.".to_owned(),
            prior_memory_id,
        }
    }

    #[tokio::test]
    async fn merge_produces_exactly_one_create_with_input_and_digest() {
        let writer = RecordingWriter::default();
        merge_and_write(
            matched_turn(None),
            &MockSummarizer::default(),
            &MockClassifier,
            &writer,
        )
        .await;

        let creates = writer.creates.lock().expect("creates lock");
        assert_eq!(creates.len(), 1);
        let record = &creates[0];
        assert!(record.detail.contains("fix the bug"));
        assert!(record.detail.contains("Fixed null check at line 42."));
        assert_eq!(record.kind, MemoryKind::Task);
        assert_eq!(record.importance, MemoryImportance::High);
        assert!(writer.updates.lock().expect("updates lock").is_empty());
    }

    #[tokio::test]
    async fn prior_memory_id_routes_through_update() {
        let writer = RecordingWriter::default();
        merge_and_write(
            matched_turn(Some(MemoryRecordId::new("mem-9"))),
            &MockSummarizer::default(),
            &MockClassifier,
            &writer,
        )
        .await;

        let updates = writer.updates.lock().expect("updates lock");
        assert_eq!(updates.len(), 1);
        assert_eq!(updates[0].0, MemoryRecordId::new("mem-9"));
        assert!(writer.creates.lock().expect("creates lock").is_empty());
    }

    #[tokio::test]
    async fn failed_update_falls_back_to_create() {
        let writer = RecordingWriter {
            fail_update: true,
            ..RecordingWriter::default()
        };
        merge_and_write(
            matched_turn(Some(MemoryRecordId::new("mem-9"))),
            &MockSummarizer::default(),
            &MockClassifier,
            &writer,
        )
        .await;

        assert_eq!(writer.creates.lock().expect("creates lock").len(), 1);
    }

    #[tokio::test]
    async fn summarizer_failure_still_writes_with_fallback_digest() {
        let writer = RecordingWriter::default();
        merge_and_write(
            matched_turn(None),
            &MockSummarizer { fail: true },
            &MockClassifier,
            &writer,
        )
        .await;

        let creates = writer.creates.lock().expect("creates lock");
        assert_eq!(creates.len(), 1);
        assert!(creates[0].detail.contains("fix the bug"));
        assert_eq!(creates[0].title, "Fixed null check at line 42.");
    }
}
