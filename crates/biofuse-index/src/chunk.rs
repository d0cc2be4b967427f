//! Word-window chunker for record text.

/// Configuration for the chunker.
#[derive(Debug, Clone)]
pub struct ChunkerConfig {
    /// Maximum words per chunk.
    pub chunk_size: usize,
    /// Word overlap between consecutive chunks.
    pub overlap: usize,
}

impl Default for ChunkerConfig {
    fn default() -> Self {
        Self { chunk_size: 500, overlap: 50 }
    }
}

/// Split text into overlapping word windows for embedding.
pub fn chunk_text(text: &str, config: &ChunkerConfig) -> Vec<String> {
    let words: Vec<&str> = text.split_whitespace().collect();
    if words.is_empty() {
        return Vec::new();
    }

    let step = config.chunk_size.saturating_sub(config.overlap).max(1);
    let mut chunks = Vec::new();
    let mut start = 0;
    while start < words.len() {
        let end = (start + config.chunk_size).min(words.len());
        chunks.push(words[start..end].join(" "));
        if end == words.len() {
            break;
        }
        start += step;
    }
    chunks
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_text_single_chunk() {
        let chunks = chunk_text("BRCA1 variant pathogenic", &ChunkerConfig::default());
        assert_eq!(chunks, vec!["BRCA1 variant pathogenic".to_string()]);
    }

    #[test]
    fn test_empty_text_no_chunks() {
        assert!(chunk_text("   ", &ChunkerConfig::default()).is_empty());
    }

    #[test]
    fn test_long_text_overlapping_windows() {
        let words: Vec<String> = (0..120).map(|i| format!("w{i}")).collect();
        let text = words.join(" ");
        let config = ChunkerConfig { chunk_size: 50, overlap: 10 };
        let chunks = chunk_text(&text, &config);

        assert_eq!(chunks.len(), 3);
        // Consecutive chunks share the overlap region.
        assert!(chunks[0].ends_with("w49"));
        assert!(chunks[1].starts_with("w40"));
        // No words lost at the tail.
        assert!(chunks.last().unwrap().ends_with("w119"));
    }
}
