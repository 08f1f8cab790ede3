//! Line extraction helpers shared by replay and live tailing.
//!
//! - [`offset_lines`] / [`offset_lines_before`] return the trailing lines of a
//!   file by scanning backwards in fixed-size chunks, so replaying the last few
//!   lines of a large log never reads the whole file.
//! - [`LineBuffer`] turns forward byte-range reads into complete lines while
//!   carrying an unterminated tail over to the next read.
//!
//! Neither helper touches a watcher's read position.

mod line_buffer;
pub use line_buffer::*;


use std::io::Read;
use std::io::Seek;
use std::io::SeekFrom;

use crate::constants::REPLAY_CHUNK_SIZE;

/// Returns the last `n` lines of `file`, or every line when it has fewer.
///
/// A single trailing line terminator does not produce an empty last line.
/// An empty file yields an empty vector.
pub fn offset_lines<R: Read + Seek>(
    file: &mut R,
    n: usize,
) -> std::io::Result<Vec<String>> {
    let end = file.seek(SeekFrom::End(0))?;
    offset_lines_before(file, n, end)
}

/// Same as [`offset_lines`] but only considers the bytes in `[0, end)`.
pub fn offset_lines_before<R: Read + Seek>(
    file: &mut R,
    n: usize,
    end: u64,
) -> std::io::Result<Vec<String>> {
    if n == 0 || end == 0 {
        return Ok(Vec::new());
    }

    let mut chunks: Vec<Vec<u8>> = Vec::new();
    let mut pos = end;
    let mut breaks = 0usize;

    while pos > 0 {
        let len = REPLAY_CHUNK_SIZE.min(pos);
        pos -= len;

        file.seek(SeekFrom::Start(pos))?;
        let mut chunk = vec![0u8; len as usize];
        file.read_exact(&mut chunk)?;

        breaks += chunk.iter().filter(|b| **b == b'\n').count();
        // the terminator of the last line does not open another one
        if chunks.is_empty() && chunk.last() == Some(&b'\n') {
            breaks -= 1;
        }
        chunks.push(chunk);

        // n breaks guarantee the last n lines are complete in the window
        if breaks >= n {
            break;
        }
    }

    chunks.reverse();
    let window = chunks.concat();

    let content = match window.split_last() {
        Some((&b'\n', rest)) => rest,
        _ => &window[..],
    };

    let segments: Vec<&[u8]> = content.split(|b| *b == b'\n').collect();
    let skip = segments.len().saturating_sub(n);

    Ok(segments[skip..].iter().map(|line| decode_line(line)).collect())
}

/// Lossy UTF-8 decode, dropping a `\r` left by CRLF terminators.
pub(crate) fn decode_line(bytes: &[u8]) -> String {
    let bytes = bytes.strip_suffix(b"\r").unwrap_or(bytes);
    String::from_utf8_lossy(bytes).into_owned()
}
