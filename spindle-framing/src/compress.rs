//! Persistent zlib contexts for header block compression.
//!
//! SPDY compresses header blocks across the entire session: both peers keep
//! one long-lived zlib stream per direction and never reset it between
//! frames, so earlier frames seed the window for later ones. Each block is
//! terminated with a SYNC flush so the receiver can decode frame by frame.
//!
//! Both contexts are primed with the SPDY/2 compression dictionary. The
//! compressor installs it up front; the decompressor installs it when zlib
//! first asks for it.

use flate2::{Compress, Compression, Decompress, FlushCompress, FlushDecompress};

use crate::error::FramingError;

// The SPDY/2 header compression dictionary. The trailing NUL is part of
// the dictionary; peers prime with the full NUL-terminated text.
const DICTIONARY_TEXT: &str = concat!(
    "optionsgetheadpostputdeletetraceacceptaccept-charsetaccept-encodingaccept-",
    "languageauthorizationexpectfromhostif-modified-sinceif-matchif-none-matchi",
    "f-rangeif-unmodifiedsincemax-forwardsproxy-authorizationrangerefererteuser",
    "-agent10010120020120220320420520630030130230330430530630740040140240340440",
    "5406407408409410411412413414415416417500501502503504505accept-rangesageeta",
    "glocationproxy-authenticatepublicretry-afterservervarywarningwww-authentic",
    "atewwwwarningallowcontent-basecontent-encodingcache-controlconnectiondatet",
    "railertransfer-encodingupgradeviawarningcontent-languagecontent-lengthcont",
    "ent-locationcontent-md5content-rangecontent-typeetagexpireslast-modifiedse",
    "t-cookieMondayTuesdayWednesdayThursdayFridaySaturdaySundayJanFebMarAprMayJ",
    "unJulAugSepOctNovDecchunkedtext/htmlimage/pngimage/jpgimage/gifapplication",
    "/xmlapplication/xhtmltext/plainpublicmax-agecharset=iso-8859-1utf-8gzipdef",
    "latehttps\0",
);

pub(crate) const DICTIONARY: &[u8] = DICTIONARY_TEXT.as_bytes();

/// Session-scoped header block compressor (one zlib stream, never reset).
pub(crate) struct HeaderCompressor {
    ctx: Compress,
}

impl HeaderCompressor {
    pub(crate) fn new() -> Result<Self, FramingError> {
        let mut ctx = Compress::new(Compression::default(), true);
        ctx.set_dictionary(DICTIONARY)
            .map_err(|_| FramingError::CompressorInit)?;
        Ok(Self { ctx })
    }

    /// Compress one header block, ending with a SYNC flush so the output is
    /// a self-delimiting unit while the window persists for later frames.
    pub(crate) fn compress(&mut self, input: &[u8]) -> Result<Vec<u8>, FramingError> {
        let mut out = Vec::with_capacity(input.len() / 2 + 64);
        let mut offset = 0;
        loop {
            if out.len() == out.capacity() {
                out.reserve(out.capacity().max(64));
            }
            let before_in = self.ctx.total_in();
            self.ctx
                .compress_vec(&input[offset..], &mut out, FlushCompress::Sync)
                .map_err(|_| FramingError::Compress)?;
            offset += (self.ctx.total_in() - before_in) as usize;
            // Spare output space after the call means the flush completed.
            if offset >= input.len() && out.len() < out.capacity() {
                return Ok(out);
            }
        }
    }
}

/// Session-scoped header block decompressor (one zlib stream, never reset).
pub(crate) struct HeaderDecompressor {
    ctx: Decompress,
    dictionary_set: bool,
}

impl HeaderDecompressor {
    pub(crate) fn new() -> Result<Self, FramingError> {
        Ok(Self {
            ctx: Decompress::new(true),
            dictionary_set: false,
        })
    }

    /// Decompress one header block.
    pub(crate) fn decompress(&mut self, input: &[u8]) -> Result<Vec<u8>, FramingError> {
        let mut out = Vec::with_capacity(input.len() * 4 + 64);
        let mut offset = 0;
        loop {
            if out.len() == out.capacity() {
                out.reserve(out.capacity().max(64));
            }
            let before_in = self.ctx.total_in();
            let before_out = out.len();
            let result = self
                .ctx
                .decompress_vec(&input[offset..], &mut out, FlushDecompress::Sync);
            offset += (self.ctx.total_in() - before_in) as usize;
            match result {
                Ok(_) => {
                    if offset >= input.len() && out.len() < out.capacity() {
                        return Ok(out);
                    }
                    // A full pass with no progress means the input is
                    // truncated or corrupt.
                    if offset < input.len()
                        && self.ctx.total_in() == before_in
                        && out.len() == before_out
                        && out.len() < out.capacity()
                    {
                        return Err(FramingError::Decompress);
                    }
                }
                Err(e) => {
                    if e.needs_dictionary().is_some() && !self.dictionary_set {
                        self.ctx
                            .set_dictionary(DICTIONARY)
                            .map_err(|_| FramingError::Decompress)?;
                        self.dictionary_set = true;
                    } else {
                        return Err(FramingError::Decompress);
                    }
                }
            }
        }
    }
}
