// Transfer files: a downloaded page rendered as "<text> <confidence>" lines for bulk learning.

use std::fs;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use tracing::{debug, warn};

use crate::upstream::Page;

/// Writes pages into uniquely named files under one staging directory.
#[derive(Debug, Clone)]
pub struct PageTransformer {
    dir: PathBuf,
}

impl PageTransformer {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Persist `page` for `language`.
    ///
    /// The file is named `<language>.<offset>.<random>`, so runs for other
    /// languages (or a second run for the same one) never collide. It is
    /// removed when the returned [`TransferFile`] is dropped.
    pub fn persist(&self, language: &str, page: &Page) -> io::Result<TransferFile> {
        fs::create_dir_all(&self.dir)?;
        let file = tempfile::Builder::new()
            .prefix(&format!("{}.{}.", language, page.offset))
            .tempfile_in(&self.dir)?;

        let mut skipped = 0;
        {
            let mut writer = BufWriter::new(file.as_file());
            for word in &page.words {
                // One word per line; a line break inside a word would split it.
                if word.text.contains(['\n', '\r']) {
                    skipped += 1;
                    continue;
                }
                writeln!(writer, "{} {}", word.text, word.confidence)?;
            }
            writer.flush()?;
        }

        if skipped > 0 {
            warn!(
                "skipped {} words with line breaks for {} at offset {}",
                skipped, language, page.offset
            );
        }
        debug!(
            "persisted {} words for {} at offset {} to {}",
            page.len() - skipped,
            language,
            page.offset,
            file.path().display()
        );
        Ok(TransferFile { file, skipped })
    }
}

/// A persisted page. Deleted from disk when dropped, whatever the learn outcome.
#[derive(Debug)]
pub struct TransferFile {
    file: NamedTempFile,
    skipped: usize,
}

impl TransferFile {
    pub fn path(&self) -> &Path {
        self.file.path()
    }

    /// Words of the page that could not be written.
    pub fn skipped(&self) -> usize {
        self.skipped
    }

    /// Delete now and report failures, instead of the silent removal on drop.
    pub fn remove(self) -> io::Result<()> {
        self.file.close()
    }
}
