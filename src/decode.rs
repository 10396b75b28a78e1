//! Folder decode orchestration.
//!
//! [`FolderDecoder`] walks a validated folder's coders in declared order,
//! seeks the byte source to each coder's packed-stream start, dispatches
//! the right primitive decoder or filter, and threads intermediate
//! buffers between stages. Two entry points produce byte-identical
//! output: [`decode_to_vec`](FolderDecoder::decode_to_vec) materializes
//! the folder in memory, [`decode_to_sink`](FolderDecoder::decode_to_sink)
//! streams bounded output chunks into a multi-file sink for folders too
//! large to hold resident.
//!
//! For the BCJ2 shape the three feeder coders are always decoded fully
//! into temporary buffers before recombination starts: BCJ2 interleaves
//! across them unpredictably, so no feeder can be decoded lazily. The
//! temporaries live in an explicit three-slot arena owned by the decode
//! call and are released on every exit path, success or failure.

use log::{debug, trace};

use crate::codec::bcj2::Bcj2Decoder;
use crate::codec::branch::{self, BranchState};
use crate::codec::{self, alloc_chunk};
use crate::folder::{Folder, pack_offset};
use crate::sink::{OutputSink, SplitSink};
use crate::source::ByteSource;
use crate::topology::FolderKind;
use crate::{Error, Result};

/// Pack-stream slot read by each BCJ2 feeder coder (coders 0, 1, 2).
const BCJ2_FEEDER_PACK: [usize; 3] = [3, 2, 0];
/// Pack-stream slot holding BCJ2's raw control stream.
const BCJ2_CONTROL_PACK: usize = 1;

/// Decodes one folder from a positioned byte source.
///
/// The decoder borrows its source exclusively for the duration of the
/// call; independent folders can be decoded in parallel as long as each
/// invocation gets its own source cursor.
pub struct FolderDecoder<'a, S: ByteSource + ?Sized> {
    folder: &'a Folder,
    pack_sizes: &'a [u64],
    source: &'a mut S,
    start_pos: u64,
}

impl<'a, S: ByteSource + ?Sized> FolderDecoder<'a, S> {
    /// Creates a decoder for `folder`, whose packed streams start at
    /// absolute offset `start_pos` in `source` and have the given sizes.
    pub fn new(
        folder: &'a Folder,
        pack_sizes: &'a [u64],
        source: &'a mut S,
        start_pos: u64,
    ) -> Result<Self> {
        if pack_sizes.len() != folder.packed_streams.len() {
            return Err(Error::data(
                "pack size table does not match the folder's pack stream count",
            ));
        }
        Ok(Self {
            folder,
            pack_sizes,
            source,
            start_pos,
        })
    }

    fn seek_to_pack(&mut self, si: usize) -> Result<()> {
        self.source
            .seek_to(self.start_pos + pack_offset(self.pack_sizes, si))
    }

    /// Decodes the whole folder into a single buffer.
    ///
    /// Appropriate when the declared unpacked size is small enough to
    /// hold resident; use [`decode_to_sink`](Self::decode_to_sink)
    /// otherwise.
    pub fn decode_to_vec(&mut self) -> Result<Vec<u8>> {
        let kind = FolderKind::classify(self.folder)?;
        let out_size = self.folder.final_unpack_size()?;
        let out_len = usize::try_from(out_size).map_err(|_| Error::Memory)?;
        debug!("decoding folder in memory: {kind:?}, {out_size} bytes unpacked");

        let out = match kind {
            FolderKind::Single => {
                self.seek_to_pack(0)?;
                codec::decode_main_coder_to_vec(
                    &self.folder.coders[0],
                    self.pack_sizes[0],
                    self.source,
                    out_size,
                )?
            }

            FolderKind::Filtered(bk) => {
                if self.folder.coder_unpack_size(0)? != out_size {
                    return Err(Error::data(
                        "branch filter must preserve its input size",
                    ));
                }
                self.seek_to_pack(0)?;
                let mut buf = codec::decode_main_coder_to_vec(
                    &self.folder.coders[0],
                    self.pack_sizes[0],
                    self.source,
                    out_size,
                )?;
                branch::apply_in_place(bk, &mut buf);
                buf
            }

            FolderKind::Bcj2 => {
                let (main, temp) = self.decode_bcj2_feeders()?;
                let call = temp[0].as_deref().unwrap_or(&[]);
                let jump = temp[1].as_deref().unwrap_or(&[]);
                let control = temp[2].as_deref().unwrap_or(&[]);

                let mut out = codec::alloc_buf(out_len)?;
                let mut dec = Bcj2Decoder::new(&main, call, jump, control)?;
                let n = dec.decode_into(&mut out)?;
                if n != out_len {
                    return Err(Error::data(
                        "BCJ2 produced fewer bytes than the folder declares",
                    ));
                }
                if dec.main_consumed() < main.len() {
                    debug!(
                        "BCJ2 left {} main-stream bytes unconsumed",
                        main.len() - dec.main_consumed()
                    );
                }
                out
            }
        };

        if let Some(expected) = self.folder.unpack_crc {
            let actual = crc32fast::hash(&out);
            if actual != expected {
                return Err(Error::CrcMismatch { expected, actual });
            }
        }
        Ok(out)
    }

    /// Decodes the whole folder into `sink`, split at the declared file
    /// boundaries.
    ///
    /// `file_sizes` lists the byte counts of the non-directory files
    /// mapped to this folder, in file order; the sink receives exactly
    /// one open/write/close cycle per file regardless of internal chunk
    /// sizes. On any failure the partially-open file is closed before the
    /// error propagates.
    pub fn decode_to_sink<K: OutputSink + ?Sized>(
        &mut self,
        sink: &mut K,
        file_sizes: &[u64],
    ) -> Result<()> {
        let mut split = SplitSink::new(sink, file_sizes);
        match self.stream_folder(&mut split) {
            Ok(()) => split.finish(),
            Err(e) => {
                split.abort();
                Err(e)
            }
        }
    }

    fn stream_folder<K: OutputSink + ?Sized>(
        &mut self,
        split: &mut SplitSink<'_, K>,
    ) -> Result<()> {
        let kind = FolderKind::classify(self.folder)?;
        let out_size = self.folder.final_unpack_size()?;
        debug!("decoding folder to sink: {kind:?}, {out_size} bytes unpacked");

        let mut hasher = self.folder.unpack_crc.map(|_| crc32fast::Hasher::new());

        match kind {
            FolderKind::Single => {
                self.seek_to_pack(0)?;
                codec::decode_main_coder(
                    &self.folder.coders[0],
                    self.pack_sizes[0],
                    self.source,
                    out_size,
                    &mut |chunk| {
                        if let Some(h) = hasher.as_mut() {
                            h.update(chunk);
                        }
                        split.write_all(chunk)
                    },
                )?;
            }

            FolderKind::Filtered(bk) => {
                if self.folder.coder_unpack_size(0)? != out_size {
                    return Err(Error::data(
                        "branch filter must preserve its input size",
                    ));
                }
                self.seek_to_pack(0)?;
                let mut filter = BranchState::new(bk);
                let mut filtered = Vec::new();
                codec::decode_main_coder(
                    &self.folder.coders[0],
                    self.pack_sizes[0],
                    self.source,
                    out_size,
                    &mut |chunk| {
                        filtered.clear();
                        filter.filter_chunk(chunk, &mut filtered)?;
                        if let Some(h) = hasher.as_mut() {
                            h.update(&filtered);
                        }
                        split.write_all(&filtered)
                    },
                )?;
                filtered.clear();
                filter.finish(&mut filtered);
                if let Some(h) = hasher.as_mut() {
                    h.update(&filtered);
                }
                split.write_all(&filtered)?;
            }

            FolderKind::Bcj2 => {
                let (main, temp) = self.decode_bcj2_feeders()?;
                let call = temp[0].as_deref().unwrap_or(&[]);
                let jump = temp[1].as_deref().unwrap_or(&[]);
                let control = temp[2].as_deref().unwrap_or(&[]);

                let mut dec = Bcj2Decoder::new(&main, call, jump, control)?;
                let mut chunk = alloc_chunk(out_size)?;
                let mut produced = 0u64;
                while produced < out_size {
                    let want = chunk.len().min((out_size - produced) as usize);
                    let n = dec.decode_into(&mut chunk[..want])?;
                    if n == 0 {
                        return Err(Error::data(
                            "BCJ2 produced fewer bytes than the folder declares",
                        ));
                    }
                    if let Some(h) = hasher.as_mut() {
                        h.update(&chunk[..n]);
                    }
                    split.write_all(&chunk[..n])?;
                    produced += n as u64;
                }
            }
        }

        if let Some(h) = hasher {
            let expected = self.folder.unpack_crc.unwrap();
            let actual = h.finalize();
            if actual != expected {
                return Err(Error::CrcMismatch { expected, actual });
            }
        }
        Ok(())
    }

    /// Decodes the three BCJ2 feeder coders and reads the raw control
    /// stream.
    ///
    /// Returns the main stream plus the arena `[call, jump, control]`.
    /// Coders run in declared order: coder 0 produces the jump stream,
    /// coder 1 the call stream, coder 2 the main stream, each from its
    /// fixed pack-stream slot.
    fn decode_bcj2_feeders(&mut self) -> Result<(Vec<u8>, [Option<Vec<u8>>; 3])> {
        let mut temp: [Option<Vec<u8>>; 3] = [None, None, None];
        let mut main = Vec::new();

        for ci in 0..3 {
            let unpack = self.folder.coder_unpack_size(ci)?;
            let si = BCJ2_FEEDER_PACK[ci];
            trace!("BCJ2 feeder {ci}: pack slot {si}, {unpack} bytes unpacked");
            self.seek_to_pack(si)?;
            let buf = codec::decode_main_coder_to_vec(
                &self.folder.coders[ci],
                self.pack_sizes[si],
                self.source,
                unpack,
            )?;
            match ci {
                0 => temp[1] = Some(buf),
                1 => temp[0] = Some(buf),
                _ => main = buf,
            }
        }

        // The control stream is stored raw in its pack slot.
        let si = BCJ2_CONTROL_PACK;
        let size = self.pack_sizes[si];
        trace!("BCJ2 control: pack slot {si}, {size} bytes raw");
        self.seek_to_pack(si)?;
        let len = usize::try_from(size).map_err(|_| Error::Memory)?;
        let mut control = Vec::new();
        control.try_reserve_exact(len).map_err(|_| Error::Memory)?;
        codec::copy::decode(size, self.source, size, &mut |chunk| {
            control.extend_from_slice(chunk);
            Ok(())
        })?;
        temp[2] = Some(control);

        Ok((main, temp))
    }
}
