//! Input opening and line reading.
//!
//! [`Input`] wraps a file (transparently gunzipped when the name ends in
//! `.gz`), stdin, or any reader. [`LineSource`] turns it into a stream of
//! lines with line endings stripped and the skip rules applied.

use crate::error::Result;
use flate2::read::MultiGzDecoder;
use std::fs::{self, File};
use std::io::{self, BufRead, BufReader, Read};
use std::path::{Path, PathBuf};

const READ_BUFFER_SIZE: usize = 256 * 1024;

/// An opened input stream
pub struct Input {
    reader: Box<dyn BufRead + Send>,
    path: Option<PathBuf>,
    total_bytes: u64,
}

impl std::fmt::Debug for Input {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Input")
            .field("path", &self.path)
            .field("total_bytes", &self.total_bytes)
            .finish_non_exhaustive()
    }
}

impl Input {
    /// Open a file. Directories are rejected; `.gz` files are decompressed.
    pub fn open(path: &Path) -> Result<Self> {
        let metadata = fs::metadata(path)?;
        if metadata.is_dir() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("{} is a directory", path.display()),
            )
            .into());
        }

        let file = File::open(path)?;
        let (reader, total_bytes): (Box<dyn BufRead + Send>, u64) = if is_gzip(path) {
            // decompressed size is unknown up front
            (
                Box::new(BufReader::with_capacity(READ_BUFFER_SIZE, MultiGzDecoder::new(file))),
                0,
            )
        } else {
            (
                Box::new(BufReader::with_capacity(READ_BUFFER_SIZE, file)),
                metadata.len(),
            )
        };

        Ok(Self {
            reader,
            path: Some(path.to_path_buf()),
            total_bytes,
        })
    }

    pub fn stdin() -> Self {
        Self::from_reader(io::stdin())
    }

    /// Wrap an arbitrary reader; its size is unknown
    pub fn from_reader<R: Read + Send + 'static>(reader: R) -> Self {
        Self {
            reader: Box::new(BufReader::with_capacity(READ_BUFFER_SIZE, reader)),
            path: None,
            total_bytes: 0,
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Size on disk, or 0 when unknown (pipes, compressed files)
    pub fn total_bytes(&self) -> u64 {
        self.total_bytes
    }
}

fn is_gzip(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("gz"))
}

/// One line handed on for parsing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawLine {
    pub text: String,
    /// Input bytes consumed since the previous returned line, skipped lines included
    pub bytes: u64,
}

/// Reads lines, dropping blank lines, the first `skip_lines` lines, and
/// lines starting with any of `skip_prefixes`
pub struct LineSource {
    reader: Box<dyn BufRead + Send>,
    skip_lines: usize,
    skip_prefixes: Vec<String>,
    buf: Vec<u8>,
}

impl LineSource {
    pub fn new(input: Input, skip_lines: usize, skip_prefixes: Vec<String>) -> Self {
        Self {
            reader: input.reader,
            skip_lines,
            skip_prefixes,
            buf: Vec::with_capacity(1024),
        }
    }

    /// Next kept line, or `None` at end of input
    pub fn next_line(&mut self) -> Result<Option<RawLine>> {
        let mut consumed = 0u64;
        loop {
            self.buf.clear();
            let n = self.reader.read_until(b'\n', &mut self.buf)?;
            if n == 0 {
                return Ok(None);
            }
            consumed += n as u64;

            let text = trim_line_ending(&self.buf);
            if text.is_empty() {
                continue;
            }
            if self.skip_lines > 0 {
                self.skip_lines -= 1;
                continue;
            }

            let text = String::from_utf8_lossy(text);
            if self.skip_prefixes.iter().any(|p| text.starts_with(p.as_str())) {
                continue;
            }

            return Ok(Some(RawLine {
                text: text.into_owned(),
                bytes: consumed,
            }));
        }
    }

    /// Read up to `n` kept lines
    pub fn take_lines(&mut self, n: usize) -> Result<Vec<RawLine>> {
        let mut lines = Vec::with_capacity(n);
        while lines.len() < n {
            match self.next_line()? {
                Some(line) => lines.push(line),
                None => break,
            }
        }
        Ok(lines)
    }
}

impl Iterator for LineSource {
    type Item = Result<RawLine>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_line().transpose()
    }
}

fn trim_line_ending(line: &[u8]) -> &[u8] {
    let line = line.strip_suffix(b"\n").unwrap_or(line);
    line.strip_suffix(b"\r").unwrap_or(line)
}
