// Dictionary-backed engine used when no native transliteration engine is linked.

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::sync::Arc;

use anyhow::{anyhow, Result};
use parking_lot::RwLock;
use tracing::debug;

use super::traits::{EngineHandle, EngineProvider, LearnStatus};

/// Suggestions returned per transliteration.
const MAX_SUGGESTIONS: usize = 10;

/// Opens one [`Lexicon`] per language.
///
/// The lexicon performs no script conversion: it remembers learned words
/// with a confidence and suggests the strongest ones sharing the input as a
/// prefix. It keeps the daemon usable end to end without a native engine.
#[derive(Debug, Default)]
pub struct LexiconEngine;

impl EngineProvider for LexiconEngine {
    fn open(&self, language: &str) -> Result<Arc<dyn EngineHandle>> {
        debug!("opening in-memory lexicon for {}", language);
        Ok(Arc::new(Lexicon::default()))
    }
}

#[derive(Debug, Default)]
pub struct Lexicon {
    words: RwLock<HashMap<String, u64>>,
}

impl Lexicon {
    fn add(&self, word: &str, confidence: u64) {
        let mut words = self.words.write();
        let entry = words.entry(word.to_string()).or_insert(0);
        *entry = (*entry).max(confidence);
    }

    pub fn confidence(&self, word: &str) -> Option<u64> {
        self.words.read().get(word).copied()
    }

    pub fn len(&self) -> usize {
        self.words.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Split a transfer line into word and confidence. Negative confidences count as zero.
fn parse_line(line: &str) -> Option<(&str, u64)> {
    let (word, confidence) = line.trim_end().rsplit_once(' ')?;
    let word = word.trim();
    if word.is_empty() {
        return None;
    }
    let confidence: i64 = confidence.parse().ok()?;
    Some((word, confidence.max(0).unsigned_abs()))
}

impl EngineHandle for Lexicon {
    fn transliterate(&self, input: &str) -> Result<Vec<String>> {
        if input.trim().is_empty() {
            return Err(anyhow!("nothing to transliterate"));
        }
        let words = self.words.read();
        let mut matches: Vec<(&String, &u64)> = words
            .iter()
            .filter(|(word, _)| word.starts_with(input))
            .collect();
        if matches.is_empty() {
            return Ok(vec![input.to_string()]);
        }
        matches.sort_by(|a, b| b.1.cmp(a.1).then_with(|| a.0.cmp(b.0)));
        Ok(matches
            .into_iter()
            .take(MAX_SUGGESTIONS)
            .map(|(word, _)| word.clone())
            .collect())
    }

    fn reverse_transliterate(&self, input: &str) -> Result<String> {
        if input.trim().is_empty() {
            return Err(anyhow!("nothing to reverse transliterate"));
        }
        Ok(input.to_string())
    }

    fn learn(&self, word: &str) -> Result<()> {
        let word = word.trim();
        if word.is_empty() {
            return Err(anyhow!("cannot learn an empty word"));
        }
        let next = self.confidence(word).unwrap_or(0) + 1;
        self.add(word, next);
        Ok(())
    }

    fn learn_from_file(&self, path: &Path) -> Result<LearnStatus> {
        let reader = BufReader::new(File::open(path)?);
        let mut status = LearnStatus::default();
        for line in reader.lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            status.total_words += 1;
            match parse_line(&line) {
                Some((word, confidence)) => self.add(word, confidence),
                None => status.failed += 1,
            }
        }
        Ok(status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_learn_bumps_confidence() {
        let lexicon = Lexicon::default();
        lexicon.learn("മലയാളം").unwrap();
        lexicon.learn("മലയാളം").unwrap();
        assert_eq!(lexicon.confidence("മലയാളം"), Some(2));
        assert!(lexicon.learn("  ").is_err());
    }

    #[test]
    fn test_transliterate_ranks_by_confidence() {
        let lexicon = Lexicon::default();
        lexicon.add("nama", 3);
        lexicon.add("namaste", 9);
        lexicon.add("other", 50);

        assert_eq!(lexicon.transliterate("nam").unwrap(), vec!["namaste", "nama"]);
        assert_eq!(lexicon.transliterate("xyz").unwrap(), vec!["xyz"]);
        assert!(lexicon.transliterate("").is_err());
    }

    #[test]
    fn test_learn_from_file_counts_failures() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "മലയാളം 10").unwrap();
        writeln!(file, "broken-line").unwrap();
        writeln!(file, "കേരളം 12").unwrap();
        writeln!(file, "bad notanumber").unwrap();
        file.flush().unwrap();

        let lexicon = Lexicon::default();
        let status = lexicon.learn_from_file(file.path()).unwrap();
        assert_eq!(status, LearnStatus { total_words: 4, failed: 2 });
        assert_eq!(status.learned(), 2);
        assert_eq!(lexicon.confidence("കേരളം"), Some(12));
        assert_eq!(lexicon.len(), 2);
    }

    #[test]
    fn test_parse_line() {
        assert_eq!(parse_line("word 5\n"), Some(("word", 5)));
        assert_eq!(parse_line(" 5"), None);
        assert_eq!(parse_line("word"), None);
        assert_eq!(parse_line("word -1"), Some(("word", 0)));
    }
}
