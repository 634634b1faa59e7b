//! Charset lookup and incremental text encoding.
//!
//! Names are resolved against the [WHATWG Encoding Standard] label table as
//! implemented by `encoding_rs`. Labels the standard redirects to a different
//! charset are not taken at face value: `US-ASCII` and `ISO-8859-1` and
//! their aliases get their own encoders instead of windows-1252, and the
//! UTF-16 labels, whose WHATWG encoder emits UTF-8, are rejected.
//!
//! Encoding never fails: characters the target charset cannot represent,
//! and unpaired surrogates, are replaced with `?`.
//!
//! [WHATWG Encoding Standard]: https://encoding.spec.whatwg.org/#names-and-labels

use std::fmt;
use std::str::FromStr;

use encoding_rs::{Encoder, EncoderResult, Encoding};

use crate::{Error, Result};

/// Scratch space used by [`Charset::encode`].
const SCRATCH_SIZE: usize = 1024;

/// Bytes substituted for anything the charset cannot encode.
const REPLACEMENT: &[u8] = b"?";

const REPLACEMENT_CHARACTER: u16 = 0xFFFD;

const US_ASCII: Repr = Repr::Identity {
    name: "US-ASCII",
    max: 0x7F,
};

const ISO_8859_1: Repr = Repr::Identity {
    name: "ISO-8859-1",
    max: 0xFF,
};

const US_ASCII_LABELS: &[&str] = &[
    "646",
    "ansi_x3.4-1968",
    "ascii",
    "cp367",
    "csascii",
    "ibm367",
    "iso-ir-6",
    "iso646-us",
    "iso_646.irv:1991",
    "us",
    "us-ascii",
];

const ISO_8859_1_LABELS: &[&str] = &[
    "cp819",
    "csisolatin1",
    "ibm819",
    "iso-8859-1",
    "iso-ir-100",
    "iso8859-1",
    "iso88591",
    "iso_8859-1",
    "iso_8859-1:1987",
    "l1",
    "latin1",
];

pub(crate) fn is_high_surrogate(unit: u16) -> bool {
    (0xD800..=0xDBFF).contains(&unit)
}

pub(crate) fn is_low_surrogate(unit: u16) -> bool {
    (0xDC00..=0xDFFF).contains(&unit)
}

/// Length of the longest prefix of `units` without unpaired surrogates.
fn well_formed_prefix(units: &[u16]) -> usize {
    let mut i = 0;
    while let Some(&unit) = units.get(i) {
        if is_high_surrogate(unit) {
            match units.get(i + 1) {
                Some(&low) if is_low_surrogate(low) => i += 2,
                _ => return i,
            }
        } else if is_low_surrogate(unit) {
            return i;
        } else {
            i += 1;
        }
    }
    i
}

/// A validated, registered charset.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Charset {
    repr: Repr,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Repr {
    Whatwg(&'static Encoding),
    /// Code points up to `max` are written as the byte of the same value.
    Identity { name: &'static str, max: u16 },
}

impl Charset {
    /// Look up a charset by name or alias, e.g. `"utf-8"` or `"latin1"`.
    pub fn for_name(name: &str) -> Result<Self> {
        let label = name
            .trim_matches(|c: char| matches!(c, '\t' | '\n' | '\x0C' | '\r' | ' '))
            .to_ascii_lowercase();
        if US_ASCII_LABELS.contains(&label.as_str()) {
            return Ok(Charset { repr: US_ASCII });
        }
        if ISO_8859_1_LABELS.contains(&label.as_str()) {
            return Ok(Charset { repr: ISO_8859_1 });
        }
        match Encoding::for_label_no_replacement(label.as_bytes()) {
            Some(encoding) if encoding.output_encoding() == encoding => Ok(Charset {
                repr: Repr::Whatwg(encoding),
            }),
            Some(encoding) => {
                log::debug!(
                    "{} would be encoded as {}",
                    encoding.name(),
                    encoding.output_encoding().name()
                );
                Err(Error::UnsupportedCharset(name.to_owned()))
            }
            None => Err(Error::UnsupportedCharset(name.to_owned())),
        }
    }

    /// The UTF-8 charset.
    pub fn utf_8() -> Self {
        Charset {
            repr: Repr::Whatwg(encoding_rs::UTF_8),
        }
    }

    /// The canonical name of this charset.
    pub fn name(&self) -> &'static str {
        match self.repr {
            Repr::Whatwg(encoding) => encoding.name(),
            Repr::Identity { name, .. } => name,
        }
    }

    /// Create a fresh stateful encoder for this charset.
    pub fn new_encoder(&self) -> CharsetEncoder {
        let inner = match self.repr {
            Repr::Whatwg(encoding) => Inner::Whatwg(encoding.new_encoder()),
            Repr::Identity { name, max } => Inner::Identity { name, max },
        };
        CharsetEncoder {
            inner,
            replacement_pending: false,
        }
    }

    /// Encode a complete string in one go.
    pub fn encode(&self, text: &str) -> Vec<u8> {
        let units: Vec<u16> = text.encode_utf16().collect();
        let mut encoder = self.new_encoder();
        let mut out = Vec::with_capacity(text.len());
        let mut scratch = [0u8; SCRATCH_SIZE];
        let mut src = &units[..];
        loop {
            let (result, read, written) = encoder.encode(src, &mut scratch, true);
            out.extend_from_slice(&scratch[..written]);
            src = &src[read..];
            if result == CoderResult::Underflow {
                return out;
            }
        }
    }
}

impl FromStr for Charset {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Charset::for_name(s)
    }
}

impl fmt::Display for Charset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Outcome of a single [`CharsetEncoder::encode`] step.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CoderResult {
    /// All input was consumed.
    Underflow,
    /// The output buffer filled up before all input was consumed.
    Overflow,
}

/// A stateful UTF-16 to bytes converter with a replacing error policy.
pub struct CharsetEncoder {
    inner: Inner,
    /// A replacement that did not fit into the previous output buffer.
    replacement_pending: bool,
}

enum Inner {
    Whatwg(Encoder),
    Identity { name: &'static str, max: u16 },
}

impl CharsetEncoder {
    /// Encode as much of `src` into `dst` as fits.
    ///
    /// Returns the result along with the number of code units read and
    /// bytes written. `last` signals end of input, letting stateful charsets
    /// emit their closing sequence. A surrogate pair must not be split
    /// across two calls; a lone surrogate is replaced like an unmappable
    /// character.
    pub fn encode(
        &mut self,
        src: &[u16],
        dst: &mut [u8],
        last: bool,
    ) -> (CoderResult, usize, usize) {
        match &mut self.inner {
            Inner::Whatwg(encoder) => {
                encode_whatwg(encoder, &mut self.replacement_pending, src, dst, last)
            }
            Inner::Identity { max, .. } => encode_identity(*max, src, dst),
        }
    }
}

fn encode_whatwg(
    encoder: &mut Encoder,
    replacement_pending: &mut bool,
    src: &[u16],
    dst: &mut [u8],
    last: bool,
) -> (CoderResult, usize, usize) {
    let mut read = 0;
    let mut written = 0;
    loop {
        if *replacement_pending {
            let end = written + REPLACEMENT.len();
            if end > dst.len() {
                return (CoderResult::Overflow, read, written);
            }
            dst[written..end].copy_from_slice(REPLACEMENT);
            written = end;
            *replacement_pending = false;
        }

        let rest = &src[read..];
        let clean = well_formed_prefix(rest);
        let (result, r, w) = encoder.encode_from_utf16_without_replacement(
            &rest[..clean],
            &mut dst[written..],
            last && clean == rest.len(),
        );
        read += r;
        written += w;

        match result {
            EncoderResult::InputEmpty if clean == rest.len() => {
                return (CoderResult::Underflow, read, written)
            }
            EncoderResult::InputEmpty => {
                log::trace!("lone surrogate {:#06x}", rest[clean]);
                if encoder.encoding() == encoding_rs::ISO_2022_JP {
                    // U+FFFD is unmappable there; reporting it switches the
                    // encoder back to ASCII before the replacement is written.
                    let (result, _, w) = encoder.encode_from_utf16_without_replacement(
                        &[REPLACEMENT_CHARACTER],
                        &mut dst[written..],
                        false,
                    );
                    written += w;
                    if let EncoderResult::OutputFull = result {
                        return (CoderResult::Overflow, read, written);
                    }
                }
                read += 1;
                *replacement_pending = true;
            }
            EncoderResult::OutputFull => return (CoderResult::Overflow, read, written),
            EncoderResult::Unmappable(c) => {
                log::trace!("unmappable {:?} in {}", c, encoder.encoding().name());
                *replacement_pending = true;
            }
        }
    }
}

fn encode_identity(max: u16, src: &[u16], dst: &mut [u8]) -> (CoderResult, usize, usize) {
    let mut read = 0;
    let mut written = 0;
    while let Some(&unit) = src.get(read) {
        if written == dst.len() {
            return (CoderResult::Overflow, read, written);
        }
        read += 1;
        dst[written] = if unit <= max {
            unit as u8
        } else {
            let paired = src.get(read).map_or(false, |&next| is_low_surrogate(next));
            if is_high_surrogate(unit) && paired {
                read += 1;
            }
            REPLACEMENT[0]
        };
        written += 1;
    }
    (CoderResult::Underflow, read, written)
}

impl fmt::Debug for CharsetEncoder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match &self.inner {
            Inner::Whatwg(encoder) => encoder.encoding().name(),
            Inner::Identity { name, .. } => *name,
        };
        f.debug_struct("CharsetEncoder")
            .field("encoding", &name)
            .field("replacement_pending", &self.replacement_pending)
            .finish()
    }
}
