//! Append-only character arena.
//!
//! The arena holds every piece of string data that must differ from the
//! source text: de-escaped quoted scalars, folded block content, strings
//! copied in from another tree. It only ever grows; [`Arena::clear`] resets
//! the used length but keeps the allocation, which is what makes the
//! parse/clear/parse reuse pattern allocation-free in steady state.
//!
//! Consumers hold [`StrSpan`] offsets, never pointers, so growth never
//! invalidates previously issued spans.

use crate::span::StrSpan;

#[derive(Debug, Clone, Default)]
pub struct Arena {
    buf: Vec<u8>,
}

impl Arena {
    pub fn new() -> Self {
        Arena { buf: Vec::new() }
    }

    pub fn with_capacity(cap: usize) -> Self {
        Arena {
            buf: Vec::with_capacity(cap),
        }
    }

    /// Used length.
    #[inline]
    pub fn pos(&self) -> usize {
        self.buf.len()
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.buf.capacity()
    }

    #[inline]
    pub fn slack(&self) -> usize {
        self.buf.capacity() - self.buf.len()
    }

    /// Grow the backing buffer to at least `cap` bytes total. Never shrinks.
    pub fn reserve(&mut self, cap: usize) {
        if cap > self.buf.capacity() {
            self.buf.reserve(cap - self.buf.len());
        }
    }

    /// Reset the used length to zero. Previously issued spans are
    /// semantically dead after this; the allocation is kept.
    #[inline]
    pub fn clear(&mut self) {
        self.buf.clear();
    }

    #[inline]
    pub fn push(&mut self, b: u8) {
        self.buf.push(b);
    }

    #[inline]
    pub fn extend(&mut self, s: &[u8]) {
        self.buf.extend_from_slice(s);
    }

    /// Copy `s` into the arena, returning a span covering exactly the copy.
    pub fn copy_in(&mut self, s: &[u8]) -> StrSpan {
        let start = self.buf.len();
        self.buf.extend_from_slice(s);
        StrSpan::arena(start, s.len())
    }

    /// Span covering everything appended since `start` (a prior [`pos`]).
    ///
    /// [`pos`]: Arena::pos
    #[inline]
    pub fn span_from(&self, start: usize) -> StrSpan {
        debug_assert!(start <= self.buf.len());
        StrSpan::arena(start, self.buf.len() - start)
    }

    /// Resolve an arena span to its bytes.
    #[inline]
    pub fn get(&self, span: StrSpan) -> &[u8] {
        debug_assert!(span.kind == crate::span::SpanKind::Arena);
        &self.buf[span.off as usize..span.off as usize + span.len as usize]
    }

    #[inline]
    pub fn as_slice(&self) -> &[u8] {
        &self.buf
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_copy_in_round_trip() {
        let mut a = Arena::new();
        let s1 = a.copy_in(b"hello");
        let s2 = a.copy_in(b"world");
        assert_eq!(a.get(s1), b"hello");
        assert_eq!(a.get(s2), b"world");
        assert_eq!(a.pos(), 10);
    }

    #[test]
    fn test_spans_survive_growth() {
        let mut a = Arena::with_capacity(4);
        let s1 = a.copy_in(b"abcd");
        // force several reallocations
        for _ in 0..64 {
            a.copy_in(b"0123456789abcdef");
        }
        assert_eq!(a.get(s1), b"abcd");
    }

    #[test]
    fn test_clear_keeps_capacity() {
        let mut a = Arena::new();
        a.copy_in(b"some content here");
        let cap = a.capacity();
        a.clear();
        assert_eq!(a.pos(), 0);
        assert_eq!(a.capacity(), cap);
    }

    #[test]
    fn test_span_from() {
        let mut a = Arena::new();
        a.extend(b"xy");
        let start = a.pos();
        a.push(b'a');
        a.extend(b"bc");
        let span = a.span_from(start);
        assert_eq!(a.get(span), b"abc");
    }

    #[test]
    fn test_reserve_never_shrinks() {
        let mut a = Arena::new();
        a.reserve(256);
        let cap = a.capacity();
        assert!(cap >= 256);
        a.reserve(16);
        assert!(a.capacity() >= cap);
    }
}
