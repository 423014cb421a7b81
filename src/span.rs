//! String spans and byte-slice scanning helpers.
//!
//! Nodes never own string data. Every scalar, tag and anchor is a [`StrSpan`]:
//! a `(buffer, offset, length)` triple resolved against either the original
//! source text or the tree's arena. Storing offsets instead of pointers keeps
//! spans valid across arena growth, and makes deep-copying a tree a plain
//! memberwise copy.

/// Which buffer a [`StrSpan`] points into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SpanKind {
    /// No string present. Distinct from a present zero-length span:
    /// `key:` stores a `Missing` value, `key: ''` stores a present
    /// empty one.
    #[default]
    Missing,
    /// Offset into the source buffer the tree was parsed from.
    Source,
    /// Offset into the tree's arena.
    Arena,
}

/// A non-owning view over string data held by a tree.
///
/// Spans are resolved to bytes with [`crate::Tree::span_bytes`]. A span must
/// only ever be resolved against the tree that issued it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StrSpan {
    pub kind: SpanKind,
    pub off: u32,
    pub len: u32,
}

impl StrSpan {
    /// The absent span.
    pub const MISSING: StrSpan = StrSpan {
        kind: SpanKind::Missing,
        off: 0,
        len: 0,
    };

    /// A span into the source buffer.
    #[inline]
    pub fn source(off: usize, len: usize) -> Self {
        debug_assert!(off <= u32::MAX as usize && len <= u32::MAX as usize);
        StrSpan {
            kind: SpanKind::Source,
            off: off as u32,
            len: len as u32,
        }
    }

    /// A span into the arena.
    #[inline]
    pub fn arena(off: usize, len: usize) -> Self {
        debug_assert!(off <= u32::MAX as usize && len <= u32::MAX as usize);
        StrSpan {
            kind: SpanKind::Arena,
            off: off as u32,
            len: len as u32,
        }
    }

    /// True when no string is present at all.
    #[inline]
    pub fn is_missing(&self) -> bool {
        self.kind == SpanKind::Missing
    }

    /// True when a string is present (possibly zero-length).
    #[inline]
    pub fn is_present(&self) -> bool {
        self.kind != SpanKind::Missing
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len as usize
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

// ============================================================================
// Byte scanning helpers
// ============================================================================
//
// The scanner and the emitter work on `&[u8]` throughout. These helpers cover
// the handful of operations std slices lack; everything returns indices or
// sub-slices of the same memory, never an allocation.

/// Index of the first byte not contained in `set`, or `None` if every byte is.
pub fn first_not_of(s: &[u8], set: &[u8]) -> Option<usize> {
    s.iter().position(|b| !set.contains(b))
}

/// Index of the last byte not contained in `set`, or `None` if every byte is.
pub fn last_not_of(s: &[u8], set: &[u8]) -> Option<usize> {
    s.iter().rposition(|b| !set.contains(b))
}

/// Strip leading bytes contained in `set`.
pub fn triml<'a>(s: &'a [u8], set: &[u8]) -> &'a [u8] {
    match first_not_of(s, set) {
        Some(i) => &s[i..],
        None => &s[s.len()..],
    }
}

/// Strip trailing bytes contained in `set`.
pub fn trimr<'a>(s: &'a [u8], set: &[u8]) -> &'a [u8] {
    match last_not_of(s, set) {
        Some(i) => &s[..=i],
        None => &s[..0],
    }
}

/// Strip leading and trailing bytes contained in `set`.
pub fn trim<'a>(s: &'a [u8], set: &[u8]) -> &'a [u8] {
    trimr(triml(s, set), set)
}

/// Length of the longest prefix of `s` that matches a numeric literal:
/// decimal/hex/octal/binary integer or decimal float (with optional
/// exponent). Returns 0 when `s` does not start with a number.
///
/// This is the lexical test behind tag-less scalar classification; it makes
/// no claim about the value fitting any machine type.
pub fn scan_number(s: &[u8]) -> usize {
    let mut i = 0;
    if i < s.len() && (s[i] == b'-' || s[i] == b'+') {
        i += 1;
    }
    let digits_start = i;
    // radix prefixes
    if i + 1 < s.len() && s[i] == b'0' {
        let (radix_digits, skip): (&[u8], usize) = match s[i + 1] {
            b'x' | b'X' => (b"0123456789abcdefABCDEF", 2),
            b'o' | b'O' => (b"01234567", 2),
            b'b' | b'B' => (b"01", 2),
            _ => (b"", 0),
        };
        if skip > 0 {
            let mut j = i + skip;
            while j < s.len() && radix_digits.contains(&s[j]) {
                j += 1;
            }
            return if j > i + skip { j } else { 0 };
        }
    }
    while i < s.len() && s[i].is_ascii_digit() {
        i += 1;
    }
    if i == digits_start {
        return 0;
    }
    // fractional part
    if i < s.len() && s[i] == b'.' {
        let mut j = i + 1;
        while j < s.len() && s[j].is_ascii_digit() {
            j += 1;
        }
        if j > i + 1 {
            i = j;
        }
    }
    // exponent
    if i < s.len() && (s[i] == b'e' || s[i] == b'E') {
        let mut j = i + 1;
        if j < s.len() && (s[j] == b'-' || s[j] == b'+') {
            j += 1;
        }
        let exp_start = j;
        while j < s.len() && s[j].is_ascii_digit() {
            j += 1;
        }
        if j > exp_start {
            i = j;
        }
    }
    i
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_vs_empty() {
        let missing = StrSpan::MISSING;
        let empty = StrSpan::arena(0, 0);
        assert!(missing.is_missing());
        assert!(missing.is_empty());
        assert!(empty.is_present());
        assert!(empty.is_empty());
        assert_ne!(missing, empty);
    }

    #[test]
    fn test_trim() {
        assert_eq!(trim(b"  a b  ", b" "), b"a b");
        assert_eq!(triml(b"\n\nx", b"\n"), b"x");
        assert_eq!(trimr(b"x\r\n", b"\r\n"), b"x");
        assert_eq!(trim(b"   ", b" "), b"");
    }

    #[test]
    fn test_first_last_not_of() {
        assert_eq!(first_not_of(b"  ab", b" "), Some(2));
        assert_eq!(last_not_of(b"ab\n\n", b"\n"), Some(1));
        assert_eq!(first_not_of(b"   ", b" "), None);
    }

    #[test]
    fn test_scan_number_integers() {
        assert_eq!(scan_number(b"123"), 3);
        assert_eq!(scan_number(b"-42,"), 3);
        assert_eq!(scan_number(b"0x1f"), 4);
        assert_eq!(scan_number(b"0b1010"), 6);
        assert_eq!(scan_number(b"0o755"), 5);
        assert_eq!(scan_number(b"abc"), 0);
        assert_eq!(scan_number(b""), 0);
    }

    #[test]
    fn test_scan_number_floats() {
        assert_eq!(scan_number(b"1.5"), 3);
        assert_eq!(scan_number(b"-0.25e-3"), 8);
        assert_eq!(scan_number(b"1e9"), 3);
        // a lone dot is not a fraction
        assert_eq!(scan_number(b"1."), 1);
        assert_eq!(scan_number(b".5"), 0);
    }
}
