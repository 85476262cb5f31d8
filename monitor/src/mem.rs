//! Byte-range memory primitives.
//!
//! Slice-level copies used by the monitor itself. The C symbols the
//! compiler emits calls to (`memcpy`, `memmove`, `memset`, `memcmp`) are
//! provided by `rlibc` on the target.

use core::ops::Range;

/// A range or destination fell outside the buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutOfBounds;

/// Copy as many bytes as both slices hold; returns the count.
pub fn copy(dst: &mut [u8], src: &[u8]) -> usize {
    let count = dst.len().min(src.len());
    dst[..count].copy_from_slice(&src[..count]);
    count
}

/// `memcmp` over the common prefix: difference of the first unequal bytes,
/// or zero.
pub fn compare(a: &[u8], b: &[u8]) -> i32 {
    a.iter()
        .zip(b)
        .find(|(x, y)| x != y)
        .map_or(0, |(x, y)| i32::from(*x) - i32::from(*y))
}

pub fn fill(dst: &mut [u8], value: u8) {
    dst.fill(value);
}

/// Move `src` to start at `dest` inside `buf`. Overlapping ranges are
/// handled in either direction.
pub fn move_within(buf: &mut [u8], src: Range<usize>, dest: usize) -> Result<(), OutOfBounds> {
    if src.start > src.end || src.end > buf.len() {
        return Err(OutOfBounds);
    }
    let count = src.end - src.start;
    if dest > buf.len() - count {
        return Err(OutOfBounds);
    }
    buf.copy_within(src, dest);
    Ok(())
}
