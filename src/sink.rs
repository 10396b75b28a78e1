//! Output sink abstraction and multi-file splitting.
//!
//! A folder's unpacked bytes usually span several destination files. The
//! decoder itself only produces a running byte stream; [`SplitSink`]
//! routes that stream across an [`OutputSink`] using the file-size table
//! that archive metadata (out of scope here) declares for the folder.
//!
//! The contract is exact: the sink sees one `open_next_file` /
//! `write`* / `close_current_file` cycle per declared file, with exactly
//! the declared byte count each, in file order, no matter how the decoder
//! chunks its output. On failure the splitter closes a partially-open
//! file so the collaborator is never left with a dangling handle.

use std::fs::File;
use std::io::Write;
use std::path::PathBuf;

use crate::{Error, Result};

/// Receiver for decoded bytes split across the folder's logical files.
///
/// Supplied by the collaborator that owns file-system semantics; the
/// decoder only drives the calls.
pub trait OutputSink {
    /// Opens the next logical file in folder order.
    fn open_next_file(&mut self) -> Result<()>;

    /// Appends bytes to the currently open file.
    fn write(&mut self, data: &[u8]) -> Result<()>;

    /// Closes the currently open file.
    fn close_current_file(&mut self) -> Result<()>;
}

/// Splits a running byte stream across an [`OutputSink`] at the declared
/// file boundaries.
#[derive(Debug)]
pub struct SplitSink<'a, K: OutputSink + ?Sized> {
    sink: &'a mut K,
    file_sizes: &'a [u64],
    current: usize,
    written_in_current: u64,
    file_open: bool,
    total_written: u64,
}

impl<'a, K: OutputSink + ?Sized> SplitSink<'a, K> {
    /// Creates a splitter over `sink` for the given per-file byte counts
    /// (non-directory files mapped to the folder, in file order).
    pub fn new(sink: &'a mut K, file_sizes: &'a [u64]) -> Self {
        Self {
            sink,
            file_sizes,
            current: 0,
            written_in_current: 0,
            file_open: false,
            total_written: 0,
        }
    }

    /// Total bytes routed so far.
    pub fn total_written(&self) -> u64 {
        self.total_written
    }

    /// Routes one chunk of decoded bytes, opening and closing files as
    /// boundaries are crossed.
    pub fn write_all(&mut self, mut data: &[u8]) -> Result<()> {
        while !data.is_empty() {
            if !self.file_open {
                if self.current >= self.file_sizes.len() {
                    return Err(Error::data(
                        "folder produced more bytes than the file-size table declares",
                    ));
                }
                self.sink.open_next_file()?;
                self.file_open = true;
                self.written_in_current = 0;
            }

            let size = self.file_sizes[self.current];
            let room = size - self.written_in_current;
            let take = data.len().min(room.min(usize::MAX as u64) as usize);
            if take > 0 {
                self.sink.write(&data[..take])?;
                self.written_in_current += take as u64;
                self.total_written += take as u64;
                data = &data[take..];
            }

            if self.written_in_current == size {
                self.sink.close_current_file()?;
                self.file_open = false;
                self.current += 1;
            }
        }
        Ok(())
    }

    /// Completes the split: emits any trailing zero-size files and checks
    /// that exactly the declared total was routed.
    pub fn finish(&mut self) -> Result<()> {
        // Zero-size files carry no bytes, so the write path never reaches
        // them; they still get their open/close cycle.
        while self.current < self.file_sizes.len() && self.file_sizes[self.current] == 0 {
            if !self.file_open {
                self.sink.open_next_file()?;
            }
            self.sink.close_current_file()?;
            self.file_open = false;
            self.current += 1;
        }
        if self.file_open || self.current < self.file_sizes.len() {
            return Err(Error::data(
                "folder produced fewer bytes than the file-size table declares",
            ));
        }
        Ok(())
    }

    /// Abandons the split after a failure, closing a partially-written
    /// file. Close errors are ignored; the original failure wins.
    pub fn abort(&mut self) {
        if self.file_open {
            let _ = self.sink.close_current_file();
            self.file_open = false;
        }
    }
}

/// Sink that collects every logical file into its own in-memory buffer.
#[derive(Debug, Default)]
pub struct VecSink {
    /// One buffer per opened file, in open order.
    pub files: Vec<Vec<u8>>,
    open: bool,
}

impl VecSink {
    /// Creates an empty sink.
    pub fn new() -> Self {
        Self::default()
    }
}

impl OutputSink for VecSink {
    fn open_next_file(&mut self) -> Result<()> {
        if self.open {
            return Err(Error::data("previous file still open"));
        }
        self.files.push(Vec::new());
        self.open = true;
        Ok(())
    }

    fn write(&mut self, data: &[u8]) -> Result<()> {
        if !self.open {
            return Err(Error::data("write without an open file"));
        }
        self.files.last_mut().unwrap().extend_from_slice(data);
        Ok(())
    }

    fn close_current_file(&mut self) -> Result<()> {
        if !self.open {
            return Err(Error::data("close without an open file"));
        }
        self.open = false;
        Ok(())
    }
}

/// Sink that writes each logical file to a pre-assigned path.
#[derive(Debug)]
pub struct FileSink {
    paths: Vec<PathBuf>,
    next: usize,
    current: Option<File>,
}

impl FileSink {
    /// Creates a sink over the destination paths, in folder file order.
    pub fn new(paths: Vec<PathBuf>) -> Self {
        Self {
            paths,
            next: 0,
            current: None,
        }
    }
}

impl OutputSink for FileSink {
    fn open_next_file(&mut self) -> Result<()> {
        let path = self
            .paths
            .get(self.next)
            .ok_or_else(|| Error::data("more folder files than destination paths"))?;
        self.current = Some(File::create(path)?);
        self.next += 1;
        Ok(())
    }

    fn write(&mut self, data: &[u8]) -> Result<()> {
        let file = self
            .current
            .as_mut()
            .ok_or_else(|| Error::data("write without an open file"))?;
        file.write_all(data)?;
        Ok(())
    }

    fn close_current_file(&mut self) -> Result<()> {
        match self.current.take() {
            Some(mut file) => {
                file.flush()?;
                Ok(())
            }
            None => Err(Error::data("close without an open file")),
        }
    }
}
