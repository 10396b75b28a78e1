//! Folder topology validation.
//!
//! The decoder supports a fixed catalogue of folder shapes; everything
//! else is rejected before the byte source is touched. The catalogue and
//! the exact index requirements come from the 7z format's standard folder
//! layouts:
//!
//! 1. a single main coder fed by one pack stream;
//! 2. a main coder whose output feeds a single-stream branch filter
//!    (x86 BCJ or ARM);
//! 3. the four-coder BCJ2 arrangement, with its fixed pack-stream
//!    assignment `[2, 6, 1, 0]` and bind pairs `(5,0) (4,1) (3,2)`.

use crate::codec::branch::BranchKind;
use crate::folder::{BindPair, Folder, method};
use crate::{Error, Result};

/// The supported folder shapes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FolderKind {
    /// One main coder (Copy/LZMA/LZMA2/PPMd), one pack stream, no bind
    /// pairs.
    Single,
    /// Main coder 0 feeding branch filter coder 1.
    Filtered(BranchKind),
    /// Coders 0..2 are main coders feeding BCJ2 coder 3 alongside one raw
    /// pack stream.
    Bcj2,
}

/// True for the methods a main (non-filter) coder slot may carry.
///
/// PPMd counts as a main method even when compiled out; the feature check
/// happens after shape recognition so that a PPMd folder in a valid shape
/// reports `UnsupportedCoder` rather than `UnsupportedTopology`.
fn is_main_method(id: u64) -> bool {
    matches!(id, method::COPY | method::LZMA | method::LZMA2 | method::PPMD)
}

fn is_supported_main(c: &crate::folder::Coder) -> bool {
    c.num_in_streams == 1 && c.num_out_streams == 1 && is_main_method(c.method_id)
}

/// Checks that a shape-valid main coder is actually available in this
/// build.
fn check_main_available(c: &crate::folder::Coder) -> Result<()> {
    let available = match c.method_id {
        method::COPY => true,
        method::LZMA | method::LZMA2 => cfg!(feature = "lzma"),
        method::PPMD => cfg!(feature = "ppmd"),
        _ => false,
    };
    if available {
        Ok(())
    } else {
        Err(Error::UnsupportedCoder {
            method_id: c.method_id,
        })
    }
}

impl FolderKind {
    /// Classifies a folder against the supported catalogue.
    ///
    /// Performs no I/O. Returns [`Error::UnsupportedTopology`] for a
    /// coder-graph shape outside the catalogue and
    /// [`Error::UnsupportedCoder`] for a recognized shape carrying a
    /// method this build cannot decode.
    pub fn classify(folder: &Folder) -> Result<Self> {
        match folder.coders.len() {
            1 => {
                let c = &folder.coders[0];
                if !is_supported_main(c) {
                    return classify_failure(c);
                }
                if folder.packed_streams != [0] || !folder.bind_pairs.is_empty() {
                    return Err(Error::UnsupportedTopology(
                        "single-coder folder must have exactly one pack stream and no bind pairs",
                    ));
                }
                check_main_available(c)?;
                Ok(Self::Single)
            }

            2 => {
                let main = &folder.coders[0];
                let filter = &folder.coders[1];
                if !is_supported_main(main) {
                    return classify_failure(main);
                }
                if filter.num_in_streams != 1
                    || filter.num_out_streams != 1
                    || folder.packed_streams != [0]
                    || folder.bind_pairs != [BindPair { in_index: 1, out_index: 0 }]
                {
                    return Err(Error::UnsupportedTopology(
                        "two-coder folder must bind coder 0's output to coder 1's input \
                         and feed coder 0 from the only pack stream",
                    ));
                }
                let kind = match filter.method_id {
                    method::BCJ_X86 => BranchKind::X86,
                    method::BCJ_ARM => BranchKind::Arm,
                    method::BCJ_PPC | method::BCJ_ARM_THUMB | method::BCJ_SPARC | method::BCJ2 => {
                        return Err(Error::UnsupportedCoder {
                            method_id: filter.method_id,
                        });
                    }
                    _ => {
                        return Err(Error::UnsupportedTopology(
                            "second coder of a two-coder folder is not a branch filter",
                        ));
                    }
                };
                check_main_available(main)?;
                Ok(Self::Filtered(kind))
            }

            4 => {
                let bcj2 = &folder.coders[3];
                for c in &folder.coders[..3] {
                    if !is_supported_main(c) {
                        return classify_failure(c);
                    }
                }
                if bcj2.num_in_streams != 4 || bcj2.num_out_streams != 1 {
                    return Err(Error::UnsupportedTopology(
                        "fourth coder must consume 4 streams and produce 1",
                    ));
                }
                if bcj2.method_id != method::BCJ2 {
                    return Err(Error::UnsupportedCoder {
                        method_id: bcj2.method_id,
                    });
                }
                // The format fixes the wiring of a BCJ2 folder completely:
                // pack streams feed inputs 2, 6, 1, 0 (in pack order) and
                // the three main-coder outputs bind to BCJ2's first three
                // inputs in reverse coder order.
                if folder.packed_streams != [2, 6, 1, 0]
                    || folder.bind_pairs
                        != [
                            BindPair { in_index: 5, out_index: 0 },
                            BindPair { in_index: 4, out_index: 1 },
                            BindPair { in_index: 3, out_index: 2 },
                        ]
                {
                    return Err(Error::UnsupportedTopology(
                        "BCJ2 folder wiring differs from the fixed format layout",
                    ));
                }
                for c in &folder.coders[..3] {
                    check_main_available(c)?;
                }
                Ok(Self::Bcj2)
            }

            _ => Err(Error::UnsupportedTopology(
                "folder must contain 1, 2 or 4 coders",
            )),
        }
    }
}

/// Distinguishes "known method in the wrong slot" from "stream shape is
/// wrong" for a coder that failed the main-slot check.
fn classify_failure(c: &crate::folder::Coder) -> Result<FolderKind> {
    if c.num_in_streams != 1 || c.num_out_streams != 1 {
        Err(Error::UnsupportedTopology(
            "main coder slot requires a 1-in/1-out coder",
        ))
    } else {
        Err(Error::UnsupportedCoder {
            method_id: c.method_id,
        })
    }
}
