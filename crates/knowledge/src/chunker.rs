//! Text chunking with configurable size and overlap.

use ragdex_core::{AppError, AppResult};
use regex::Regex;
use std::sync::OnceLock;

fn blank_runs() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\n{3,}").expect("static regex"))
}

/// Collapse runs of three or more newlines to a single blank line and trim.
pub fn clean_text(text: &str) -> String {
    blank_runs().replace_all(text, "\n\n").trim().to_string()
}

/// Chunk text into overlapping windows of `chunk_size` characters.
///
/// Windows advance by `chunk_size - overlap` characters and never split a
/// code point. The last window may be shorter; text no longer than
/// `chunk_size` yields exactly one chunk and empty text yields none.
/// `overlap >= chunk_size` would never advance and is rejected.
pub fn chunk_text(text: &str, chunk_size: usize, overlap: usize) -> AppResult<Vec<String>> {
    if chunk_size == 0 || overlap >= chunk_size {
        return Err(AppError::Config(format!(
            "invalid chunking parameters: size {}, overlap {}",
            chunk_size, overlap
        )));
    }

    let cleaned = clean_text(text);
    if cleaned.is_empty() {
        return Ok(Vec::new());
    }

    // Byte offset of every char plus the end of the string.
    let bounds: Vec<usize> = cleaned
        .char_indices()
        .map(|(i, _)| i)
        .chain(std::iter::once(cleaned.len()))
        .collect();
    let char_len = bounds.len() - 1;

    let mut chunks = Vec::new();
    let mut start = 0;
    loop {
        let end = (start + chunk_size).min(char_len);
        chunks.push(cleaned[bounds[start]..bounds[end]].to_string());
        if end >= char_len {
            break;
        }
        start = end - overlap;
    }

    tracing::debug!(
        "Chunked text into {} chunks (size: {}, overlap: {})",
        chunks.len(),
        chunk_size,
        overlap
    );

    Ok(chunks)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn expected_count(len: usize, size: usize, overlap: usize) -> usize {
        if len <= size {
            1
        } else {
            (len - overlap).div_ceil(size - overlap)
        }
    }

    /// Stitch chunks back together by dropping each overlap prefix.
    fn stitch(chunks: &[String], overlap: usize) -> String {
        let mut out = String::new();
        for (i, chunk) in chunks.iter().enumerate() {
            if i == 0 {
                out.push_str(chunk);
            } else {
                out.extend(chunk.chars().skip(overlap));
            }
        }
        out
    }

    #[test]
    fn test_chunk_text_basic() {
        let text = "a".repeat(1000);
        let chunks = chunk_text(&text, 200, 50).unwrap();

        assert_eq!(chunks.len(), expected_count(1000, 200, 50));
        assert_eq!(chunks[0].len(), 200);
    }

    #[test]
    fn test_short_text_is_one_chunk() {
        let chunks = chunk_text("임산부 의료비 지원", 1000, 200).unwrap();
        assert_eq!(chunks, vec!["임산부 의료비 지원".to_string()]);
    }

    #[test]
    fn test_chunk_text_empty() {
        assert!(chunk_text("", 100, 10).unwrap().is_empty());
        assert!(chunk_text("\n\n\n   \n", 100, 10).unwrap().is_empty());
    }

    #[test]
    fn test_overlap_not_smaller_than_size_rejected() {
        assert!(matches!(
            chunk_text("abc", 10, 10),
            Err(AppError::Config(_))
        ));
        assert!(chunk_text("abc", 10, 25).is_err());
        assert!(chunk_text("abc", 0, 0).is_err());
    }

    #[test]
    fn test_chunk_count_and_coverage() {
        let text: String = "abcdefghijklmnopqrstuvwxyz".repeat(37);
        for (size, overlap) in [(50, 10), (100, 1), (7, 3), (1000, 200), (26, 25)] {
            let chunks = chunk_text(&text, size, overlap).unwrap();
            assert_eq!(
                chunks.len(),
                expected_count(text.chars().count(), size, overlap),
                "size {} overlap {}",
                size,
                overlap
            );
            assert_eq!(stitch(&chunks, overlap), text);
        }
    }

    #[test]
    fn test_consecutive_chunks_share_overlap() {
        let text: String = "0123456789".repeat(10);
        let chunks = chunk_text(&text, 30, 10).unwrap();

        for pair in chunks.windows(2) {
            let tail: String = pair[0].chars().skip(20).collect();
            let head: String = pair[1].chars().take(10).collect();
            assert_eq!(tail, head);
        }
    }

    #[test]
    fn test_multibyte_boundaries() {
        let text = "다자녀가정은 셋째 자녀부터 지원합니다".repeat(20);
        let chunks = chunk_text(&text, 17, 5).unwrap();

        assert!(chunks.iter().all(|c| c.chars().count() <= 17));
        assert_eq!(stitch(&chunks, 5), text);
    }

    #[test]
    fn test_newline_runs_collapsed() {
        let cleaned = clean_text("  first\n\n\n\n\nsecond\n\nthird\n\n\n");
        assert_eq!(cleaned, "first\n\nsecond\n\nthird");
    }

    #[test]
    fn test_chunking_is_deterministic() {
        let text = "The quick brown fox\n\n\n\njumps over the lazy dog. ".repeat(40);
        let first = chunk_text(&text, 120, 30).unwrap();
        let second = chunk_text(&text, 120, 30).unwrap();
        assert_eq!(first, second);
    }
}
