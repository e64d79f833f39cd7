use std::cmp::Ordering;
use std::fs::{self, File};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::vec;

use glob::glob_with;
use serde::Serialize;

use crate::prelude::*;

#[derive(Debug, PartialEq, Eq, PartialOrd, Ord)]
enum Chunk {
    Number(u64),
    Text(String),
}

/// Splits a file name into text and number chunks, so that `2.ndjson`
/// sorts before `10.ndjson`.
fn natural_key(path: &Path) -> Vec<Chunk> {
    let name = path
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or_default();

    let mut chunks = vec![];
    let mut rest = name;

    while let Some(c) = rest.chars().next() {
        let is_digit = c.is_ascii_digit();
        let end = rest
            .find(|c: char| c.is_ascii_digit() != is_digit)
            .unwrap_or(rest.len());
        let (chunk, tail) = rest.split_at(end);

        chunks.push(match chunk.parse::<u64>() {
            Ok(n) if is_digit => Chunk::Number(n),
            _ => Chunk::Text(chunk.to_lowercase()),
        });
        rest = tail;
    }

    chunks
}

fn natural_cmp(a: &Path, b: &Path) -> Ordering {
    natural_key(a).cmp(&natural_key(b))
}

/// Returns all files with the given extension of a directory in
/// natural order. If `path` is a file, only this file is returned.
pub(crate) fn list_files(
    path: &Path,
    extension: &str,
) -> SindexResult<Vec<PathBuf>> {
    if path.is_file() {
        return Ok(vec![path.to_path_buf()]);
    }

    if !path.is_dir() {
        bail!("directory not found: {}", path.display());
    }

    let pattern = format!("{}/*.{extension}", path.display());
    let mut files: Vec<PathBuf> = glob_with(&pattern, Default::default())
        .map_err(SindexError::other)?
        .filter_map(Result::ok)
        .collect();

    files.sort_by(|a, b| natural_cmp(a, b));
    Ok(files)
}

/// Removes and re-creates an output directory.
pub(crate) fn reset_dir(path: &Path) -> SindexResult<()> {
    if path.exists() {
        fs::remove_dir_all(path)?;
    }

    fs::create_dir_all(path)?;
    Ok(())
}

/// Iterates over the non-empty lines of a sequence of files. Lines
/// that aren't valid UTF-8 are skipped and counted.
pub(crate) struct LineReader {
    files: vec::IntoIter<PathBuf>,
    reader: Option<BufReader<File>>,
    buf: Vec<u8>,
    skipped: usize,
}

impl LineReader {
    pub(crate) fn new(files: Vec<PathBuf>) -> Self {
        Self {
            files: files.into_iter(),
            reader: None,
            buf: Vec::new(),
            skipped: 0,
        }
    }

    /// Returns the number of lines skipped so far.
    pub(crate) fn skipped(&self) -> usize {
        self.skipped
    }
}

impl Iterator for LineReader {
    type Item = SindexResult<String>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(ref mut reader) = self.reader {
                self.buf.clear();
                match reader.read_until(b'\n', &mut self.buf) {
                    Ok(0) => self.reader = None,
                    Ok(_) => {
                        let line = match std::str::from_utf8(&self.buf) {
                            Ok(line) => line,
                            Err(e) => {
                                log::debug!("skip line: {e}");
                                self.skipped += 1;
                                continue;
                            }
                        };

                        let line = line.trim_end_matches(['\n', '\r']);
                        if line.trim().is_empty() {
                            continue;
                        }

                        return Some(Ok(line.to_string()));
                    }
                    Err(e) => return Some(Err(e.into())),
                }

                continue;
            }

            let path = self.files.next()?;
            log::debug!("reading {}", path.display());

            match File::open(&path) {
                Ok(file) => self.reader = Some(BufReader::new(file)),
                Err(e) => return Some(Err(e.into())),
            }
        }
    }
}

/// Writes NDJSON rows into numbered files, starting a new file after
/// `rows_per_file` rows.
pub(crate) struct RotatingWriter {
    dir: PathBuf,
    prefix: Option<String>,
    rows_per_file: usize,
    file_number: usize,
    rows_in_file: usize,
    total: usize,
    writer: Option<BufWriter<File>>,
}

impl RotatingWriter {
    pub(crate) fn new<P: AsRef<Path>>(
        dir: P,
        prefix: Option<&str>,
        rows_per_file: usize,
    ) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
            prefix: prefix.map(str::to_string),
            rows_per_file: rows_per_file.max(1),
            file_number: 0,
            rows_in_file: 0,
            total: 0,
            writer: None,
        }
    }

    fn file_name(&self) -> String {
        match self.prefix {
            Some(ref prefix) => {
                format!("{prefix}-{}.ndjson", self.file_number)
            }
            None => format!("{}.ndjson", self.file_number),
        }
    }

    /// Closes the current file; the next row starts a new file.
    pub(crate) fn rotate(&mut self) -> SindexResult<()> {
        if let Some(mut writer) = self.writer.take() {
            writer.flush()?;
        }

        Ok(())
    }

    pub(crate) fn write<T: Serialize>(
        &mut self,
        row: &T,
    ) -> SindexResult<()> {
        if self.rows_in_file >= self.rows_per_file {
            self.rotate()?;
        }

        let writer = match self.writer {
            Some(ref mut writer) => writer,
            None => {
                self.file_number += 1;
                self.rows_in_file = 0;
                let path = self.dir.join(self.file_name());
                self.writer.insert(BufWriter::new(File::create(path)?))
            }
        };

        serde_json::to_writer(&mut *writer, row)?;
        writer.write_all(b"\n")?;

        self.rows_in_file += 1;
        self.total += 1;
        Ok(())
    }

    /// Flushes the last file and returns the number of rows written.
    pub(crate) fn finish(mut self) -> SindexResult<usize> {
        self.rotate()?;
        Ok(self.total)
    }
}
