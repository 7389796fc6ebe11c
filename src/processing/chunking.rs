//! Word-aligned chunking by approximate character length.
//!
//! Summarization models accept a bounded input, so documents are split into word-aligned chunks
//! before they are summarized. The running length counts each word's characters plus one
//! separator, and the bound is checked after a word is appended, so a chunk may exceed
//! `max_chunk_size` by up to one word. A single word longer than the bound becomes its own chunk.

/// Split `text` into ordered, word-aligned chunks of roughly `max_chunk_size` characters.
///
/// Words are separated by Unicode whitespace and re-joined with single spaces, so rejoining the
/// returned chunks with spaces reproduces the original word sequence. Returns an empty vector for
/// empty or whitespace-only input; never returns an empty chunk.
pub fn chunk_text(text: &str, max_chunk_size: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current: Vec<&str> = Vec::new();
    let mut current_length = 0usize;

    for word in text.split_whitespace() {
        current.push(word);
        current_length += word.chars().count() + 1;
        if current_length >= max_chunk_size {
            chunks.push(current.join(" "));
            current.clear();
            current_length = 0;
        }
    }

    if !current.is_empty() {
        chunks.push(current.join(" "));
    }

    chunks
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_text_yields_no_chunks() {
        assert!(chunk_text("", 1024).is_empty());
        assert!(chunk_text("", 1).is_empty());
        assert!(chunk_text(" \n\t  ", 16).is_empty());
    }

    #[test]
    fn short_text_stays_in_one_chunk() {
        let chunks = chunk_text("hello   world\nagain", 1024);
        assert_eq!(chunks, vec!["hello world again"]);
    }

    #[test]
    fn boundary_check_happens_after_appending() {
        // "one" -> 4, "two" -> 8 (>= 8 closes the chunk), "three" -> 6, "four" -> 11.
        let chunks = chunk_text("one two three four five", 8);
        assert_eq!(chunks, vec!["one two", "three four", "five"]);
    }

    #[test]
    fn chunk_may_exceed_limit_by_one_word() {
        let chunks = chunk_text("aaaa bbbbbbbbbb cc", 6);
        assert_eq!(chunks, vec!["aaaa bbbbbbbbbb", "cc"]);
        assert!(chunks[0].chars().count() > 6);
    }

    #[test]
    fn over_long_word_is_not_split() {
        let word = "a".repeat(2000);
        let chunks = chunk_text(&word, 1024);
        assert_eq!(chunks, vec![word]);
    }

    #[test]
    fn length_counts_characters_not_bytes() {
        // Each word is 2 chars (+1 separator) but 4 bytes in UTF-8.
        let chunks = chunk_text("éé üü öö", 6);
        assert_eq!(chunks, vec!["éé üü", "öö"]);
    }

    #[test]
    fn zero_limit_emits_one_word_per_chunk() {
        let chunks = chunk_text("a b c", 0);
        assert_eq!(chunks, vec!["a", "b", "c"]);
    }

    #[test]
    fn rejoined_chunks_reproduce_word_sequence() {
        let text = "The quick brown fox\njumps over\tthe lazy dog. ".repeat(40);
        for size in [1, 5, 17, 64, 1024] {
            let chunks = chunk_text(&text, size);
            assert!(chunks.iter().all(|chunk| !chunk.is_empty()));
            let rejoined = chunks.join(" ");
            let original: Vec<&str> = text.split_whitespace().collect();
            let roundtrip: Vec<&str> = rejoined.split_whitespace().collect();
            assert_eq!(roundtrip, original, "chunk size {size}");
        }
    }
}
