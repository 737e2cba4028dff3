//! Writes received notes to disk as PNG files.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use pictonote_core::{ComposeError, UserContent, data_uri_bytes};
use thiserror::Error;

/// PNG sink errors.
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Bad image payload: {0}")]
    Payload(#[from] ComposeError),
}

/// Directory of received notes, numbered in arrival order.
pub struct PngSink {
    base_path: PathBuf,
    saved: u64,
}

impl PngSink {
    /// Create a sink writing into `base_path`.
    ///
    /// Creates the directory if it doesn't exist. Numbering continues after
    /// the highest note already there.
    pub fn new(base_path: PathBuf) -> Result<Self, SinkError> {
        if !base_path.exists() {
            fs::create_dir_all(&base_path)?;
        }
        let mut saved = 0;
        for entry in fs::read_dir(&base_path)? {
            let name = entry?.file_name();
            if let Some(number) = name.to_str().and_then(note_number) {
                saved = saved.max(number);
            }
        }
        Ok(Self { base_path, saved })
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    /// Write one note and return where it went.
    pub fn save(&mut self, content: &UserContent) -> Result<PathBuf, SinkError> {
        let bytes = data_uri_bytes(&content.img)?;
        self.saved += 1;
        let path = self.note_path(&content.author);
        // Never overwrite a note written by another run.
        let mut file = OpenOptions::new().write(true).create_new(true).open(&path)?;
        file.write_all(&bytes)?;
        log::debug!("saved note from {} to {}", content.author, path.display());
        Ok(path)
    }

    fn note_path(&self, author: &str) -> PathBuf {
        // Sanitize the author to be safe for filenames
        let safe_author: String = author
            .chars()
            .map(|c| if c.is_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
            .collect();
        self.base_path
            .join(format!("{:05}-{}.png", self.saved, safe_author))
    }
}

/// The sequence number of a `NNNNN-author.png` file name.
fn note_number(name: &str) -> Option<u64> {
    let (number, rest) = name.split_once('-')?;
    if number.len() < 5 || !rest.ends_with(".png") {
        return None;
    }
    number.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pictonote_core::Swatch;

    // 1x1 transparent PNG.
    const TINY_PNG: &str = "data:image/png;base64,iVBORw0KGgoAAAANSUhEUgAAAAEAAAABCAYAAAAfFcSJAAAADUlEQVR42mNkYPhfDwAChwGA60e6kgAAAABJRU5ErkJggg==";

    fn note(author: &str, img: &str) -> UserContent {
        UserContent {
            author: author.to_string(),
            color: Swatch::Red,
            img: img.to_string(),
            height: 1,
        }
    }

    #[test]
    fn test_creates_directory_and_numbers_files() {
        let dir = tempfile::tempdir().unwrap();
        let mut sink = PngSink::new(dir.path().join("received")).unwrap();

        let first = sink.save(&note("Brooke", TINY_PNG)).unwrap();
        let second = sink.save(&note("a/b", TINY_PNG)).unwrap();

        assert_eq!(first.file_name().unwrap(), "00001-Brooke.png");
        assert_eq!(second.file_name().unwrap(), "00002-a_b.png");
        let bytes = fs::read(&first).unwrap();
        assert_eq!(&bytes[1..4], b"PNG");
    }

    #[test]
    fn test_rejects_non_png_payload() {
        let dir = tempfile::tempdir().unwrap();
        let mut sink = PngSink::new(dir.path().to_path_buf()).unwrap();

        let result = sink.save(&note("Brooke", "data:text/plain,hi"));
        assert!(matches!(result, Err(SinkError::Payload(_))));
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_numbering_continues_across_runs() {
        let dir = tempfile::tempdir().unwrap();
        {
            let mut first_run = PngSink::new(dir.path().to_path_buf()).unwrap();
            first_run.save(&note("Brooke", TINY_PNG)).unwrap();
            first_run.save(&note("Brooke", TINY_PNG)).unwrap();
        }
        fs::write(dir.path().join("notes.txt"), "unrelated").unwrap();

        let mut second_run = PngSink::new(dir.path().to_path_buf()).unwrap();
        let path = second_run.save(&note("Brooke", TINY_PNG)).unwrap();

        assert_eq!(path.file_name().unwrap(), "00003-Brooke.png");
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 4);
    }

    #[test]
    fn test_note_number() {
        assert_eq!(note_number("00042-Brooke.png"), Some(42));
        assert_eq!(note_number("00042-a-b.png"), Some(42));
        assert_eq!(note_number("42-Brooke.png"), None);
        assert_eq!(note_number("00042-Brooke.txt"), None);
    }
}
