//! YAML parser.
//!
//! # Structure
//!
//! Parsing is a recursive descent over indentation. Each block structure
//! (map, seq, scalar) is handled by a dedicated method on the engine, and
//! flow collections (`{..}`, `[..]`) recurse independently of indentation.
//! The engine appends nodes to a [`Tree`] as it goes; it never builds an
//! intermediate representation.
//!
//! # Zero copy
//!
//! Scalars that appear verbatim in the input (the overwhelmingly common
//! case) become spans pointing into the source buffer. Scalars that need
//! transformation — escape sequences, folded line breaks, block scalar
//! chomping — are filtered into the tree's arena. With
//! [`Parser::parse_in_place`] the filtered bytes are instead written back
//! over the source buffer (filtering only ever shrinks), so even
//! transformed scalars stay zero-copy.
//!
//! # Reuse
//!
//! A [`Parser`] holds reusable scratch buffers, and [`Parser::parse_into`]
//! reuses a tree's node and arena storage across documents. A parse loop
//! that recycles both reaches a steady state with no allocation at all.

use log::trace;

use crate::error::{Error, Result};
use crate::span::{StrSpan, trim};
use crate::tree::{NodeId, NodeType, Tree, NONE};

/// Parse a YAML document (or stream of documents) into a new tree.
///
/// Scalars reference `src` where possible; see the module docs.
pub fn parse(src: &str) -> Result<Tree<'_>> {
    Parser::new().parse(src)
}

/// Parse, writing filtered scalars back into `src` so that every scalar is
/// a span into the buffer. The buffer is modified only where scalars
/// required filtering, and filtered text is never longer than its source.
pub fn parse_in_place(src: &mut [u8]) -> Result<Tree<'_>> {
    Parser::new().parse_in_place(src)
}

/// A reusable parser. Holds scratch buffers that survive across calls.
#[derive(Debug, Default)]
pub struct Parser {
    scratch: Vec<u8>,
    filter_buf: Vec<u8>,
}

impl Parser {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn parse<'s>(&mut self, src: &'s str) -> Result<Tree<'s>> {
        let mut tree = Tree::new();
        self.parse_into(src, &mut tree)?;
        Ok(tree)
    }

    /// Parse into an existing tree, reusing its node and arena capacity.
    /// The tree is cleared first.
    pub fn parse_into<'s>(&mut self, src: &'s str, tree: &mut Tree<'s>) -> Result<()> {
        tree.clear();
        tree.clear_arena();
        self.scratch.clear();
        self.filter_buf.clear();
        {
            let mut eng = Engine {
                src: src.as_bytes(),
                pos: 0,
                line: 1,
                line_start: 0,
                tree,
                rewrites: None,
                scratch: &mut self.scratch,
                filter_buf: &mut self.filter_buf,
            };
            eng.run()?;
        }
        tree.source = src.as_bytes();
        Ok(())
    }

    pub fn parse_in_place<'s>(&mut self, src: &'s mut [u8]) -> Result<Tree<'s>> {
        if let Err(e) = std::str::from_utf8(src) {
            return Err(Error::InvalidUtf8 {
                offset: e.valid_up_to(),
            });
        }
        let mut tree: Tree<'s> = Tree::new();
        let mut rewrites: Vec<Rewrite> = Vec::new();
        self.scratch.clear();
        self.filter_buf.clear();
        {
            let mut eng = Engine {
                src: &*src,
                pos: 0,
                line: 1,
                line_start: 0,
                tree: &mut tree,
                rewrites: Some(&mut rewrites),
                scratch: &mut self.scratch,
                filter_buf: &mut self.filter_buf,
            };
            eng.run()?;
        }
        for rw in &rewrites {
            let out = &self.scratch[rw.scratch.clone()];
            src[rw.dst..rw.dst + out.len()].copy_from_slice(out);
        }
        tree.source = src;
        Ok(tree)
    }
}

/// A deferred write-back of filtered scalar bytes (in-place mode only).
#[derive(Debug)]
struct Rewrite {
    dst: usize,
    scratch: std::ops::Range<usize>,
}

/// Key-side state carried from a scanned key to the node it ends up on.
#[derive(Debug, Clone, Copy, Default)]
struct PendingKey {
    present: bool,
    key: StrSpan,
    tag: StrSpan,
    anchor: StrSpan,
    is_ref: bool,
}

/// A scanned scalar token. Quoted scalars commit immediately (they cannot
/// continue past their closing quote); plain scalars stay raw so value
/// positions can extend them across lines before committing.
#[derive(Debug, Clone, Copy)]
enum Tok {
    Plain { s: usize, e: usize },
    Committed(StrSpan),
}

#[derive(Debug, Clone, Copy)]
struct Mark {
    pos: usize,
    line: usize,
    line_start: usize,
}

#[inline]
fn is_ws(b: Option<u8>) -> bool {
    matches!(b, None | Some(b' ' | b'\t' | b'\n' | b'\r'))
}

fn is_null_text(s: &[u8]) -> bool {
    matches!(s, b"" | b"~" | b"null" | b"Null" | b"NULL")
}

struct Engine<'e, 's> {
    src: &'e [u8],
    pos: usize,
    line: usize,
    line_start: usize,
    tree: &'e mut Tree<'s>,
    rewrites: Option<&'e mut Vec<Rewrite>>,
    scratch: &'e mut Vec<u8>,
    filter_buf: &'e mut Vec<u8>,
}

impl<'e, 's> Engine<'e, 's> {
    // ------------------------------------------------------------------
    // cursor primitives
    // ------------------------------------------------------------------

    #[inline]
    fn at_end(&self) -> bool {
        self.pos >= self.src.len()
    }

    #[inline]
    fn peek(&self) -> Option<u8> {
        self.src.get(self.pos).copied()
    }

    #[inline]
    fn peek_at(&self, i: usize) -> Option<u8> {
        self.src.get(self.pos + i).copied()
    }

    #[inline]
    fn col(&self) -> usize {
        self.pos - self.line_start
    }

    fn bump(&mut self) {
        if self.peek() == Some(b'\n') {
            self.pos += 1;
            self.line += 1;
            self.line_start = self.pos;
        } else {
            self.pos += 1;
        }
    }

    #[inline]
    fn at_eol(&self) -> bool {
        matches!(self.peek(), None | Some(b'\n' | b'\r'))
    }

    #[inline]
    fn at_comment(&self) -> bool {
        self.peek() == Some(b'#')
    }

    fn skip_ws_inline(&mut self) {
        while matches!(self.peek(), Some(b' ' | b'\t')) {
            self.pos += 1;
        }
    }

    fn skip_to_eol(&mut self) {
        while !self.at_eol() {
            self.pos += 1;
        }
    }

    fn consume_newline(&mut self) {
        if self.peek() == Some(b'\r') {
            self.pos += 1;
        }
        if self.peek() == Some(b'\n') {
            self.pos += 1;
            self.line += 1;
            self.line_start = self.pos;
        }
    }

    fn consume_line(&mut self) {
        self.skip_to_eol();
        self.consume_newline();
    }

    fn checkpoint(&self) -> Mark {
        Mark {
            pos: self.pos,
            line: self.line,
            line_start: self.line_start,
        }
    }

    fn restore(&mut self, m: Mark) {
        self.pos = m.pos;
        self.line = m.line;
        self.line_start = m.line_start;
    }

    /// Advance to the next content token, skipping blank and comment
    /// lines. Rejects tabs used as indentation. Idempotent when already
    /// at content.
    fn next_content(&mut self) -> Result<Option<usize>> {
        loop {
            let fresh = self.pos == self.line_start;
            loop {
                match self.peek() {
                    Some(b' ') => self.pos += 1,
                    Some(b'\t') => {
                        if fresh {
                            return Err(Error::TabIndentation {
                                line: self.line,
                                offset: self.pos,
                            });
                        }
                        self.pos += 1;
                    }
                    _ => break,
                }
            }
            if self.at_end() {
                return Ok(None);
            }
            if self.at_eol() {
                self.consume_newline();
                continue;
            }
            if self.at_comment() {
                self.consume_line();
                continue;
            }
            return Ok(Some(self.col()));
        }
    }

    fn at_doc_marker(&self) -> bool {
        if self.col() != 0 {
            return false;
        }
        let rest = &self.src[self.pos..];
        (rest.starts_with(b"---") || rest.starts_with(b"..."))
            && matches!(rest.get(3), None | Some(b' ' | b'\t' | b'\n' | b'\r'))
    }

    // ------------------------------------------------------------------
    // scalar commit
    // ------------------------------------------------------------------

    /// Store the contents of `filter_buf` as a scalar: into the arena, or
    /// (in in-place mode) queued for write-back over the raw bytes it was
    /// filtered from.
    fn commit_filter_buf(&mut self, raw_off: usize, raw_len: usize) -> StrSpan {
        let n = self.filter_buf.len();
        if let Some(rewrites) = self.rewrites.as_deref_mut() {
            debug_assert!(n <= raw_len, "filtering must not grow a scalar");
            let s0 = self.scratch.len();
            self.scratch.extend_from_slice(self.filter_buf.as_slice());
            rewrites.push(Rewrite {
                dst: raw_off,
                scratch: s0..s0 + n,
            });
            StrSpan::source(raw_off, n)
        } else {
            self.tree.arena_copy(self.filter_buf.as_slice())
        }
    }

    // ------------------------------------------------------------------
    // token scanning
    // ------------------------------------------------------------------

    /// Scan one line's worth of a plain scalar. Returns the token range
    /// with trailing whitespace trimmed; the cursor stops at the
    /// terminator.
    fn scan_plain_line(&mut self, flow: bool) -> (usize, usize) {
        let start = self.pos;
        let mut last = self.pos;
        loop {
            let Some(b) = self.peek() else { break };
            match b {
                b'\n' | b'\r' => break,
                b'#' if self.pos > start && matches!(self.src[self.pos - 1], b' ' | b'\t') => break,
                b':' if is_ws(self.peek_at(1))
                    || (flow && matches!(self.peek_at(1), Some(b',' | b']' | b'}'))) =>
                {
                    break
                }
                b',' | b'[' | b']' | b'{' | b'}' if flow => break,
                _ => {
                    self.pos += 1;
                    if b != b' ' && b != b'\t' {
                        last = self.pos;
                    }
                }
            }
        }
        (start, last)
    }

    fn scan_scalar_token(&mut self, flow: bool) -> Result<Tok> {
        match self.peek() {
            Some(b'\'') => Ok(Tok::Committed(self.scan_squot()?)),
            Some(b'"') => Ok(Tok::Committed(self.scan_dquot()?)),
            _ => {
                let (s, e) = self.scan_plain_line(flow);
                Ok(Tok::Plain { s, e })
            }
        }
    }

    fn tok_span(&self, tok: Tok) -> StrSpan {
        match tok {
            Tok::Plain { s, e } => StrSpan::source(s, e - s),
            Tok::Committed(sp) => sp,
        }
    }

    /// Commit a token in value position: null-normalize plain scalars and
    /// fold plain continuation lines. `indent` is the minimum column a
    /// continuation line must sit at.
    fn commit_tok_val(&mut self, tok: Tok, indent: usize) -> Result<StrSpan> {
        let Tok::Plain { s, e } = tok else {
            return Ok(self.tok_span(tok));
        };
        let mut lines: Vec<(usize, usize)> = vec![(s, e)];
        let mut blanks_before: Vec<usize> = vec![0];
        loop {
            if !self.at_eol() {
                break;
            }
            let cp = self.checkpoint();
            self.consume_newline();
            let mut blanks = 0usize;
            loop {
                while self.peek() == Some(b' ') {
                    self.pos += 1;
                }
                if self.at_end() {
                    break;
                }
                if self.at_eol() {
                    blanks += 1;
                    self.consume_newline();
                    continue;
                }
                break;
            }
            if self.at_end() {
                self.restore(cp);
                break;
            }
            let col = self.col();
            if col < indent || self.at_comment() || self.at_doc_marker() {
                self.restore(cp);
                break;
            }
            if self.peek() == Some(b'-') && is_ws(self.peek_at(1)) {
                // a sequence indicator cannot continue a plain scalar
                return Err(Error::BadIndentation { line: self.line, col });
            }
            let (ls, le) = self.scan_plain_line(false);
            if self.peek() == Some(b':') && is_ws(self.peek_at(1)) {
                // the "continuation" was really the next key
                self.restore(cp);
                break;
            }
            lines.push((ls, le));
            blanks_before.push(blanks);
        }
        if lines.len() == 1 {
            let bytes = &self.src[s..e];
            if is_null_text(bytes) {
                return Ok(StrSpan::MISSING);
            }
            return Ok(StrSpan::source(s, e - s));
        }
        // fold: a line break becomes a space, n blank lines become n breaks
        self.filter_buf.clear();
        for (i, &(ls, le)) in lines.iter().enumerate() {
            if i > 0 {
                let b = blanks_before[i];
                if b == 0 {
                    self.filter_buf.push(b' ');
                } else {
                    for _ in 0..b {
                        self.filter_buf.push(b'\n');
                    }
                }
            }
            let line = self.src;
            self.filter_buf.extend_from_slice(&line[ls..le]);
        }
        let raw_len = lines[lines.len() - 1].1 - s;
        Ok(self.commit_filter_buf(s, raw_len))
    }

    fn scan_squot(&mut self) -> Result<StrSpan> {
        let start = self.pos;
        self.pos += 1;
        let cs = self.pos;
        let mut needs_filter = false;
        loop {
            match self.peek() {
                None => {
                    return Err(Error::UnclosedQuote {
                        start_offset: start,
                        quote: '\'',
                    })
                }
                Some(b'\'') => {
                    if self.peek_at(1) == Some(b'\'') {
                        needs_filter = true;
                        self.pos += 2;
                    } else {
                        break;
                    }
                }
                Some(b'\n') => {
                    needs_filter = true;
                    self.bump();
                }
                _ => self.pos += 1,
            }
        }
        let ce = self.pos;
        self.pos += 1;
        if !needs_filter {
            return Ok(StrSpan::source(cs, ce - cs));
        }
        self.filter_buf.clear();
        let src = self.src;
        filter_squot(&src[cs..ce], self.filter_buf);
        Ok(self.commit_filter_buf(cs, ce - cs))
    }

    fn scan_dquot(&mut self) -> Result<StrSpan> {
        let start = self.pos;
        self.pos += 1;
        let cs = self.pos;
        let mut needs_filter = false;
        loop {
            match self.peek() {
                None => {
                    return Err(Error::UnclosedQuote {
                        start_offset: start,
                        quote: '"',
                    })
                }
                Some(b'\\') => {
                    needs_filter = true;
                    if self.peek_at(1).is_none() {
                        return Err(Error::UnclosedQuote {
                            start_offset: start,
                            quote: '"',
                        });
                    }
                    self.pos += 1;
                    self.bump();
                }
                Some(b'"') => break,
                Some(b'\n') => {
                    needs_filter = true;
                    self.bump();
                }
                _ => self.pos += 1,
            }
        }
        let ce = self.pos;
        self.pos += 1;
        if !needs_filter {
            return Ok(StrSpan::source(cs, ce - cs));
        }
        self.filter_buf.clear();
        let src = self.src;
        filter_dquot(&src[cs..ce], self.filter_buf, cs)?;
        Ok(self.commit_filter_buf(cs, ce - cs))
    }

    fn scan_anchor(&mut self) -> Result<StrSpan> {
        debug_assert_eq!(self.peek(), Some(b'&'));
        self.pos += 1;
        let ns = self.pos;
        self.scan_name_tail();
        if self.pos == ns {
            return Err(Error::UnexpectedCharacter {
                offset: ns.saturating_sub(1),
                found: '&',
                context: "anchor name",
            });
        }
        Ok(StrSpan::source(ns, self.pos - ns))
    }

    /// Returns (full token span, name span) for `*name`.
    fn scan_alias(&mut self) -> Result<(StrSpan, StrSpan)> {
        debug_assert_eq!(self.peek(), Some(b'*'));
        let start = self.pos;
        self.pos += 1;
        let ns = self.pos;
        self.scan_name_tail();
        if self.pos == ns {
            return Err(Error::UnexpectedCharacter {
                offset: start,
                found: '*',
                context: "alias name",
            });
        }
        Ok((
            StrSpan::source(start, self.pos - start),
            StrSpan::source(ns, self.pos - ns),
        ))
    }

    fn scan_name_tail(&mut self) {
        while let Some(b) = self.peek() {
            if matches!(b, b' ' | b'\t' | b'\n' | b'\r' | b',' | b'[' | b']' | b'{' | b'}') {
                break;
            }
            if b == b':' && is_ws(self.peek_at(1)) {
                break;
            }
            self.pos += 1;
        }
    }

    fn scan_tag(&mut self) -> StrSpan {
        debug_assert_eq!(self.peek(), Some(b'!'));
        let start = self.pos;
        self.pos += 1;
        while let Some(b) = self.peek() {
            if matches!(b, b' ' | b'\t' | b'\n' | b'\r' | b',' | b'[' | b']' | b'{' | b'}') {
                break;
            }
            self.pos += 1;
        }
        StrSpan::source(start, self.pos - start)
    }

    /// Scan `&anchor` / `!tag` properties, in either order.
    fn scan_props(&mut self, flow: bool) -> Result<(StrSpan, StrSpan)> {
        let mut anchor = StrSpan::MISSING;
        let mut tag = StrSpan::MISSING;
        loop {
            if flow {
                self.skip_flow_ws();
            } else {
                self.skip_ws_inline();
            }
            match self.peek() {
                Some(b'&') if anchor.is_missing() => anchor = self.scan_anchor()?,
                Some(b'!') if tag.is_missing() => tag = self.scan_tag(),
                _ => break,
            }
        }
        Ok((anchor, tag))
    }

    fn skip_flow_ws(&mut self) {
        loop {
            match self.peek() {
                Some(b' ' | b'\t' | b'\r') => self.pos += 1,
                Some(b'\n') => self.bump(),
                Some(b'#') => self.skip_to_eol(),
                _ => break,
            }
        }
    }

    // ------------------------------------------------------------------
    // block structure
    // ------------------------------------------------------------------

    fn run(&mut self) -> Result<()> {
        if self.src.starts_with(b"\xef\xbb\xbf") {
            self.pos = 3;
            self.line_start = 3;
        }
        let root = self.tree.root_id();
        let mut docs = 0usize;
        let mut markers = false;
        'docs: loop {
            loop {
                match self.next_content()? {
                    None => break 'docs,
                    Some(col) => {
                        if col == 0 && self.peek() == Some(b'%') {
                            // %YAML / %TAG directives are skipped
                            self.consume_line();
                            continue;
                        }
                        break;
                    }
                }
            }
            if self.at_doc_marker() {
                let ending = self.src[self.pos..].starts_with(b"...");
                markers = true;
                self.pos += 3;
                self.skip_ws_inline();
                if ending {
                    self.consume_line();
                    continue 'docs;
                }
                docs += 1;
                let doc = self.tree.append_child(root);
                trace!("document {} at line {}", docs, self.line);
                if self.at_eol() || self.at_comment() {
                    let cp = self.checkpoint();
                    match self.next_content()? {
                        Some(_)
                            if !self.at_doc_marker()
                                && !(self.col() == 0 && self.peek() == Some(b'%')) =>
                        {
                            let col = self.col();
                            self.parse_node(doc, col, PendingKey::default())?;
                        }
                        _ => {
                            self.restore(cp);
                            self.tree.to_val(doc, StrSpan::MISSING);
                        }
                    }
                } else {
                    let col = self.col();
                    self.parse_node(doc, col, PendingKey::default())?;
                }
                self.tree.to_doc(doc);
            } else {
                if docs > 0 {
                    return Err(Error::UnexpectedCharacter {
                        offset: self.pos,
                        found: self.peek().map(|b| b as char).unwrap_or('\0'),
                        context: "expected document start",
                    });
                }
                docs += 1;
                let doc = self.tree.append_child(root);
                let col = self.col();
                self.parse_node(doc, col, PendingKey::default())?;
                self.tree.to_doc(doc);
            }
        }
        if docs == 0 {
            return Ok(());
        }
        if markers || docs > 1 {
            self.tree.to_stream(root);
        } else {
            self.hoist_single_doc();
        }
        Ok(())
    }

    /// A single implicit document: lift its content into the root node.
    fn hoist_single_doc(&mut self) {
        let root = self.tree.root_id();
        let d = self.tree.first_child(root);
        loop {
            let c = self.tree.first_child(d);
            if c == NONE {
                break;
            }
            let last = self.tree.last_child(root);
            self.tree.move_to(c, root, last);
        }
        let dd = *self.tree.node(d);
        self.tree.remove(d);
        let r = self.tree.node_mut(root);
        r.ty = NodeType(dd.ty.0 & !NodeType::DOC.0);
        r.val = dd.val;
        r.val_tag = dd.val_tag;
        r.val_anchor = dd.val_anchor;
    }

    /// Parse the node whose content starts at the cursor. `indent` is the
    /// minimum column for any following line that still belongs to this
    /// node. The node's key side, if any, arrives in `key` and is applied
    /// once the shape is known.
    fn parse_node(&mut self, node: NodeId, indent: usize, key: PendingKey) -> Result<()> {
        let props_line = self.line;
        let (mut vanchor, mut vtag) = self.scan_props(false)?;
        self.skip_ws_inline();
        if self.at_eol() || self.at_comment() {
            // content continues on a later line, or there is none
            let cp = self.checkpoint();
            match self.next_content()? {
                Some(col) if col >= indent && !self.at_doc_marker() => {}
                _ => {
                    self.restore(cp);
                    self.null_val(node, key, vanchor, vtag);
                    return Ok(());
                }
            }
        }
        let inline_props =
            self.line == props_line && (vanchor.is_present() || vtag.is_present());
        let c = match self.peek() {
            Some(c) => c,
            None => {
                self.null_val(node, key, vanchor, vtag);
                return Ok(());
            }
        };
        match c {
            b'{' => self.parse_flow_map(node)?,
            b'[' => self.parse_flow_seq(node)?,
            b'|' | b'>' => {
                let v = self.scan_block_scalar(indent)?;
                self.tree.to_val(node, v);
            }
            b'-' if is_ws(self.peek_at(1)) => {
                let col = self.col();
                self.parse_block_seq(node, col)?;
            }
            b'?' if is_ws(self.peek_at(1)) => {
                let col = self.col();
                let mut first = self.parse_key()?;
                if inline_props {
                    if first.anchor.is_missing() {
                        first.anchor = vanchor;
                    }
                    if first.tag.is_missing() {
                        first.tag = vtag;
                    }
                    vanchor = StrSpan::MISSING;
                    vtag = StrSpan::MISSING;
                }
                self.parse_block_map(node, col, first)?;
            }
            b'*' => {
                let col = self.col();
                let (tok, name) = self.scan_alias()?;
                self.skip_ws_inline();
                if self.peek() == Some(b':') && is_ws(self.peek_at(1)) {
                    self.pos += 1;
                    let first = PendingKey {
                        present: true,
                        key: tok,
                        tag: StrSpan::MISSING,
                        anchor: name,
                        is_ref: true,
                    };
                    self.parse_block_map(node, col, first)?;
                } else {
                    self.tree.to_val(node, tok);
                    self.tree.set_val_ref(node, name);
                }
            }
            _ => {
                let col = self.col();
                let tok = self.scan_scalar_token(false)?;
                self.skip_ws_inline();
                if self.peek() == Some(b':') && is_ws(self.peek_at(1)) {
                    self.pos += 1;
                    let mut first = PendingKey {
                        present: true,
                        key: self.tok_span(tok),
                        tag: StrSpan::MISSING,
                        anchor: StrSpan::MISSING,
                        is_ref: false,
                    };
                    if inline_props {
                        first.anchor = vanchor;
                        first.tag = vtag;
                        vanchor = StrSpan::MISSING;
                        vtag = StrSpan::MISSING;
                    }
                    self.parse_block_map(node, col, first)?;
                } else {
                    let v = self.commit_tok_val(tok, indent)?;
                    self.tree.to_val(node, v);
                }
            }
        }
        if vtag.is_present() {
            self.tree.set_val_tag(node, vtag);
        }
        if vanchor.is_present() && !self.tree.is_val_ref(node) {
            self.tree.set_val_anchor(node, vanchor);
        }
        self.apply_key(node, key);
        Ok(())
    }

    fn null_val(&mut self, node: NodeId, key: PendingKey, vanchor: StrSpan, vtag: StrSpan) {
        self.tree.to_val(node, StrSpan::MISSING);
        if vtag.is_present() {
            self.tree.set_val_tag(node, vtag);
        }
        if vanchor.is_present() {
            self.tree.set_val_anchor(node, vanchor);
        }
        self.apply_key(node, key);
    }

    fn apply_key(&mut self, node: NodeId, key: PendingKey) {
        if !key.present {
            return;
        }
        self.tree.set_key(node, key.key);
        if key.is_ref {
            self.tree.set_key_ref(node, key.anchor);
        } else {
            if key.anchor.is_present() {
                self.tree.set_key_anchor(node, key.anchor);
            }
            if key.tag.is_present() {
                self.tree.set_key_tag(node, key.tag);
            }
        }
    }

    /// Parse a block map. The cursor sits just after the first key's `:`;
    /// `indent` is the keys' column.
    fn parse_block_map(&mut self, node: NodeId, indent: usize, first: PendingKey) -> Result<()> {
        trace!("block map open at line {}, indent {}", self.line, indent);
        self.tree.to_map(node);
        let mut key = first;
        loop {
            let child = self.tree.append_child(node);
            self.parse_map_value(child, indent, key)?;
            match self.next_content()? {
                Some(col) if col == indent && !self.at_doc_marker() => {
                    key = self.parse_key()?;
                }
                Some(col) if col > indent => {
                    return Err(Error::BadIndentation {
                        line: self.line,
                        col,
                    });
                }
                _ => break,
            }
        }
        Ok(())
    }

    fn parse_map_value(&mut self, child: NodeId, indent: usize, key: PendingKey) -> Result<()> {
        self.skip_ws_inline();
        if !(self.at_eol() || self.at_comment()) {
            return self.parse_node(child, indent + 1, key);
        }
        let cp = self.checkpoint();
        match self.next_content()? {
            Some(col)
                if !self.at_doc_marker()
                    && (col > indent
                        || (col == indent
                            && self.peek() == Some(b'-')
                            && is_ws(self.peek_at(1)))) =>
            {
                self.parse_node(child, col, key)
            }
            _ => {
                self.restore(cp);
                self.null_val(child, key, StrSpan::MISSING, StrSpan::MISSING);
                Ok(())
            }
        }
    }

    /// Scan a map key up to and including its `:`.
    fn parse_key(&mut self) -> Result<PendingKey> {
        let (anchor, tag) = self.scan_props(false)?;
        self.skip_ws_inline();
        match self.peek() {
            Some(b'-') if is_ws(self.peek_at(1)) => Err(Error::UnexpectedCharacter {
                offset: self.pos,
                found: '-',
                context: "map key",
            }),
            Some(b'?') if is_ws(self.peek_at(1)) => {
                self.pos += 1;
                self.skip_ws_inline();
                let (ka, kt) = self.scan_props(false)?;
                let anchor = if ka.is_present() { ka } else { anchor };
                let tag = if kt.is_present() { kt } else { tag };
                let tok = self.scan_scalar_token(false)?;
                let kspan = self.tok_span(tok);
                self.skip_ws_inline();
                if self.peek() == Some(b':') && is_ws(self.peek_at(1)) {
                    self.pos += 1;
                } else {
                    match self.next_content()? {
                        Some(_) if self.peek() == Some(b':') && is_ws(self.peek_at(1)) => {
                            self.pos += 1;
                        }
                        _ => {
                            return Err(Error::UnexpectedCharacter {
                                offset: self.pos,
                                found: self.peek().map(|b| b as char).unwrap_or('\0'),
                                context: "expected ':' after explicit key",
                            })
                        }
                    }
                }
                Ok(PendingKey {
                    present: true,
                    key: kspan,
                    tag,
                    anchor,
                    is_ref: false,
                })
            }
            Some(b'*') => {
                let (tok, name) = self.scan_alias()?;
                self.skip_ws_inline();
                self.expect_colon()?;
                Ok(PendingKey {
                    present: true,
                    key: tok,
                    tag: StrSpan::MISSING,
                    anchor: name,
                    is_ref: true,
                })
            }
            _ => {
                let tok = self.scan_scalar_token(false)?;
                let kspan = self.tok_span(tok);
                self.skip_ws_inline();
                self.expect_colon()?;
                Ok(PendingKey {
                    present: true,
                    key: kspan,
                    tag,
                    anchor,
                    is_ref: false,
                })
            }
        }
    }

    fn expect_colon(&mut self) -> Result<()> {
        if self.peek() == Some(b':') && is_ws(self.peek_at(1)) {
            self.pos += 1;
            Ok(())
        } else {
            Err(Error::UnexpectedCharacter {
                offset: self.pos,
                found: self.peek().map(|b| b as char).unwrap_or('\0'),
                context: "expected ':' after map key",
            })
        }
    }

    /// Parse a block seq whose `-` markers sit at column `indent`. The
    /// cursor is at the first `-`.
    fn parse_block_seq(&mut self, node: NodeId, indent: usize) -> Result<()> {
        trace!("block seq open at line {}, indent {}", self.line, indent);
        self.tree.to_seq(node);
        loop {
            debug_assert_eq!(self.peek(), Some(b'-'));
            self.pos += 1;
            let child = self.tree.append_child(node);
            self.skip_ws_inline();
            if self.at_eol() || self.at_comment() {
                let cp = self.checkpoint();
                match self.next_content()? {
                    Some(col) if col > indent && !self.at_doc_marker() => {
                        self.parse_node(child, col, PendingKey::default())?;
                    }
                    _ => {
                        self.restore(cp);
                        self.null_val(child, PendingKey::default(), StrSpan::MISSING, StrSpan::MISSING);
                    }
                }
            } else {
                let col = self.col();
                self.parse_node(child, col, PendingKey::default())?;
            }
            match self.next_content()? {
                Some(col)
                    if col == indent
                        && !self.at_doc_marker()
                        && self.peek() == Some(b'-')
                        && is_ws(self.peek_at(1)) => {}
                Some(col) if col > indent => {
                    return Err(Error::BadIndentation {
                        line: self.line,
                        col,
                    });
                }
                _ => break,
            }
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // flow structure
    // ------------------------------------------------------------------

    fn parse_flow_map(&mut self, node: NodeId) -> Result<()> {
        trace!("flow map open at line {}", self.line);
        debug_assert_eq!(self.peek(), Some(b'{'));
        self.pos += 1;
        self.tree.to_map(node);
        loop {
            self.skip_flow_ws();
            match self.peek() {
                None => return Err(Error::UnexpectedEof { context: "flow map" }),
                Some(b'}') => {
                    self.pos += 1;
                    return Ok(());
                }
                _ => {}
            }
            let (kanchor, ktag) = self.scan_props(true)?;
            self.skip_flow_ws();
            let key = match self.peek() {
                Some(b'*') => {
                    let (tok, name) = self.scan_alias()?;
                    PendingKey {
                        present: true,
                        key: tok,
                        tag: StrSpan::MISSING,
                        anchor: name,
                        is_ref: true,
                    }
                }
                _ => {
                    let tok = self.scan_scalar_token(true)?;
                    PendingKey {
                        present: true,
                        key: self.tok_span(tok),
                        tag: ktag,
                        anchor: kanchor,
                        is_ref: false,
                    }
                }
            };
            self.skip_flow_ws();
            let child = self.tree.append_child(node);
            if self.peek() == Some(b':') {
                self.pos += 1;
                self.parse_flow_val(child, key, false)?;
            } else {
                self.tree.to_val(child, StrSpan::MISSING);
                self.apply_key(child, key);
            }
            self.skip_flow_ws();
            match self.peek() {
                Some(b',') => self.pos += 1,
                Some(b'}') => {}
                None => return Err(Error::UnexpectedEof { context: "flow map" }),
                Some(c) => {
                    return Err(Error::UnexpectedCharacter {
                        offset: self.pos,
                        found: c as char,
                        context: "flow map",
                    })
                }
            }
        }
    }

    fn parse_flow_seq(&mut self, node: NodeId) -> Result<()> {
        trace!("flow seq open at line {}", self.line);
        debug_assert_eq!(self.peek(), Some(b'['));
        self.pos += 1;
        self.tree.to_seq(node);
        loop {
            self.skip_flow_ws();
            match self.peek() {
                None => return Err(Error::UnexpectedEof { context: "flow seq" }),
                Some(b']') => {
                    self.pos += 1;
                    return Ok(());
                }
                _ => {}
            }
            let child = self.tree.append_child(node);
            self.parse_flow_val(child, PendingKey::default(), true)?;
            self.skip_flow_ws();
            match self.peek() {
                Some(b',') => self.pos += 1,
                Some(b']') => {}
                None => return Err(Error::UnexpectedEof { context: "flow seq" }),
                Some(c) => {
                    return Err(Error::UnexpectedCharacter {
                        offset: self.pos,
                        found: c as char,
                        context: "flow seq",
                    })
                }
            }
        }
    }

    /// One value inside a flow collection. With `allow_pair`, a scalar
    /// followed by `:` becomes a single-pair map (`[a: b]`).
    fn parse_flow_val(&mut self, node: NodeId, key: PendingKey, allow_pair: bool) -> Result<()> {
        self.skip_flow_ws();
        let (vanchor, vtag) = self.scan_props(true)?;
        self.skip_flow_ws();
        match self.peek() {
            None => return Err(Error::UnexpectedEof { context: "flow value" }),
            Some(b'{') => self.parse_flow_map(node)?,
            Some(b'[') => self.parse_flow_seq(node)?,
            Some(b'*') => {
                let (tok, name) = self.scan_alias()?;
                self.tree.to_val(node, tok);
                self.tree.set_val_ref(node, name);
            }
            Some(b',' | b'}' | b']') => {
                self.tree.to_val(node, StrSpan::MISSING);
            }
            _ => {
                let tok = self.scan_scalar_token(true)?;
                if allow_pair {
                    self.skip_ws_inline();
                    if self.peek() == Some(b':') && is_ws(self.peek_at(1)) {
                        self.pos += 1;
                        let pair_key = PendingKey {
                            present: true,
                            key: self.tok_span(tok),
                            tag: vtag,
                            anchor: vanchor,
                            is_ref: false,
                        };
                        self.tree.to_map(node);
                        let grand = self.tree.append_child(node);
                        self.parse_flow_val(grand, pair_key, false)?;
                        self.apply_key(node, key);
                        return Ok(());
                    }
                }
                let span = match tok {
                    Tok::Plain { s, e } if is_null_text(&self.src[s..e]) => StrSpan::MISSING,
                    _ => self.tok_span(tok),
                };
                self.tree.to_val(node, span);
            }
        }
        if vtag.is_present() {
            self.tree.set_val_tag(node, vtag);
        }
        if vanchor.is_present() && !self.tree.is_val_ref(node) {
            self.tree.set_val_anchor(node, vanchor);
        }
        self.apply_key(node, key);
        Ok(())
    }

    // ------------------------------------------------------------------
    // block scalars
    // ------------------------------------------------------------------

    /// Scan a `|` or `>` scalar. `min_col` is the minimum column for
    /// content lines; an explicit indentation digit is relative to the
    /// parent's column (`min_col - 1`).
    fn scan_block_scalar(&mut self, min_col: usize) -> Result<StrSpan> {
        let folded = self.peek() == Some(b'>');
        trace!(
            "{} block scalar at line {}",
            if folded { "folded" } else { "literal" },
            self.line
        );
        self.pos += 1;
        let mut chomp: i8 = 0;
        let mut explicit: Option<usize> = None;
        loop {
            match self.peek() {
                Some(b'+') => {
                    chomp = 1;
                    self.pos += 1;
                }
                Some(b'-') => {
                    chomp = -1;
                    self.pos += 1;
                }
                Some(d @ b'1'..=b'9') => {
                    explicit = Some((d - b'0') as usize);
                    self.pos += 1;
                }
                _ => break,
            }
        }
        self.skip_ws_inline();
        if self.at_comment() {
            self.skip_to_eol();
        }
        if !self.at_eol() {
            return Err(Error::UnexpectedCharacter {
                offset: self.pos,
                found: self.peek().map(|b| b as char).unwrap_or('\0'),
                context: "block scalar header",
            });
        }
        self.consume_newline();

        struct BLine {
            start: usize,
            end: usize,
            extra: bool,
            blank: bool,
        }
        let raw_start = self.pos;
        let mut blines: Vec<BLine> = Vec::new();
        let mut ci = explicit.map(|d| min_col.saturating_sub(1) + d);
        let mut final_break = true;
        loop {
            if self.at_end() {
                break;
            }
            let ls = self.pos;
            let mut ind = 0usize;
            while self.peek() == Some(b' ') {
                self.pos += 1;
                ind += 1;
            }
            if self.at_eol() {
                blines.push(BLine {
                    start: self.pos,
                    end: self.pos,
                    extra: false,
                    blank: true,
                });
                if self.at_end() {
                    final_break = false;
                    break;
                }
                self.consume_newline();
                continue;
            }
            if ind == 0 && self.at_doc_marker() {
                self.pos = ls;
                break;
            }
            let c = match ci {
                Some(c) => c,
                None => {
                    if ind < min_col {
                        self.pos = ls;
                        break;
                    }
                    ci = Some(ind);
                    ind
                }
            };
            if ind < c {
                self.pos = ls;
                break;
            }
            let cstart = ls + c;
            self.skip_to_eol();
            blines.push(BLine {
                start: cstart,
                end: self.pos,
                extra: ind > c,
                blank: false,
            });
            if self.at_end() {
                final_break = false;
                break;
            }
            self.consume_newline();
        }

        self.filter_buf.clear();
        let src = self.src;
        if folded {
            let mut prev_content = false;
            let mut prev_extra = false;
            let mut blanks = 0usize;
            for bl in &blines {
                if bl.blank {
                    blanks += 1;
                    continue;
                }
                if prev_content {
                    if blanks > 0 {
                        for _ in 0..blanks {
                            self.filter_buf.push(b'\n');
                        }
                    } else if bl.extra || prev_extra {
                        self.filter_buf.push(b'\n');
                    } else {
                        self.filter_buf.push(b' ');
                    }
                } else {
                    for _ in 0..blanks {
                        self.filter_buf.push(b'\n');
                    }
                }
                blanks = 0;
                self.filter_buf.extend_from_slice(&src[bl.start..bl.end]);
                prev_content = true;
                prev_extra = bl.extra;
            }
            if !self.filter_buf.is_empty() {
                self.filter_buf.push(b'\n');
            }
            for _ in 0..blanks {
                self.filter_buf.push(b'\n');
            }
        } else {
            for bl in &blines {
                self.filter_buf.extend_from_slice(&src[bl.start..bl.end]);
                self.filter_buf.push(b'\n');
            }
        }
        if !final_break && self.filter_buf.last() == Some(&b'\n') {
            // the source had no final line break, so neither does the text
            self.filter_buf.pop();
        }
        match chomp {
            -1 => {
                while self.filter_buf.last() == Some(&b'\n') {
                    self.filter_buf.pop();
                }
            }
            0 => {
                let had_break = final_break || self.filter_buf.last() == Some(&b'\n');
                while self.filter_buf.last() == Some(&b'\n') {
                    self.filter_buf.pop();
                }
                if !self.filter_buf.is_empty() && had_break {
                    self.filter_buf.push(b'\n');
                }
            }
            _ => {}
        }
        let raw_len = self.pos - raw_start;
        Ok(self.commit_filter_buf(raw_start, raw_len))
    }
}

// ============================================================================
// scalar filters
// ============================================================================

/// Single-quoted filter: `''` collapses to `'`, line breaks fold.
fn filter_squot(raw: &[u8], out: &mut Vec<u8>) {
    let mut pending_blanks = 0usize;
    let mut first = true;
    for line in raw.split(|&b| b == b'\n') {
        let line = trim(line, b" \t\r");
        if line.is_empty() {
            if first {
                first = false;
            } else {
                pending_blanks += 1;
            }
            continue;
        }
        if !first {
            if pending_blanks > 0 {
                for _ in 0..pending_blanks {
                    out.push(b'\n');
                }
                pending_blanks = 0;
            } else {
                out.push(b' ');
            }
        }
        let mut i = 0;
        while i < line.len() {
            if line[i] == b'\'' && i + 1 < line.len() && line[i + 1] == b'\'' {
                out.push(b'\'');
                i += 2;
            } else {
                out.push(line[i]);
                i += 1;
            }
        }
        first = false;
    }
}

fn hex_val(b: u8) -> Option<u32> {
    match b {
        b'0'..=b'9' => Some((b - b'0') as u32),
        b'a'..=b'f' => Some((b - b'a' + 10) as u32),
        b'A'..=b'F' => Some((b - b'A' + 10) as u32),
        _ => None,
    }
}

fn push_codepoint(cp: u32, out: &mut Vec<u8>, off: usize) -> Result<()> {
    let ch = char::from_u32(cp).ok_or(Error::InvalidEscape {
        offset: off,
        sequence: format!("\\u{:04x}", cp),
    })?;
    let mut buf = [0u8; 4];
    out.extend_from_slice(ch.encode_utf8(&mut buf).as_bytes());
    Ok(())
}

fn scan_hex(raw: &[u8], i: usize, n: usize, off: usize) -> Result<u32> {
    let mut cp = 0u32;
    for k in 0..n {
        let d = raw
            .get(i + k)
            .copied()
            .and_then(hex_val)
            .ok_or_else(|| Error::InvalidEscape {
                offset: off,
                sequence: String::from_utf8_lossy(&raw[i.saturating_sub(2)..raw.len().min(i + n)])
                    .into_owned(),
            })?;
        cp = cp << 4 | d;
    }
    Ok(cp)
}

/// Double-quoted filter: escape sequences, `\`-continuation, folding.
/// `base_off` is the content's offset in the source, for error reporting.
fn filter_dquot(raw: &[u8], out: &mut Vec<u8>, base_off: usize) -> Result<()> {
    let mut i = 0usize;
    while i < raw.len() {
        let b = raw[i];
        if b == b'\\' {
            let Some(&e) = raw.get(i + 1) else {
                return Err(Error::InvalidEscape {
                    offset: base_off + i,
                    sequence: "\\".to_string(),
                });
            };
            let esc_off = base_off + i;
            i += 2;
            match e {
                b'\\' => out.push(b'\\'),
                b'"' => out.push(b'"'),
                b'/' => out.push(b'/'),
                b'\'' => out.push(b'\''),
                b' ' => out.push(b' '),
                b'n' => out.push(b'\n'),
                b't' => out.push(b'\t'),
                b'r' => out.push(b'\r'),
                b'0' => out.push(0),
                b'a' => out.push(0x07),
                b'b' => out.push(0x08),
                b'f' => out.push(0x0c),
                b'v' => out.push(0x0b),
                b'e' => out.push(0x1b),
                b'x' => {
                    let cp = scan_hex(raw, i, 2, esc_off)?;
                    i += 2;
                    push_codepoint(cp, out, esc_off)?;
                }
                b'u' => {
                    let cp = scan_hex(raw, i, 4, esc_off)?;
                    i += 4;
                    push_codepoint(cp, out, esc_off)?;
                }
                b'U' => {
                    let cp = scan_hex(raw, i, 8, esc_off)?;
                    i += 8;
                    push_codepoint(cp, out, esc_off)?;
                }
                b'\n' | b'\r' => {
                    // escaped line break: join without a space
                    if e == b'\r' && raw.get(i) == Some(&b'\n') {
                        i += 1;
                    }
                    while matches!(raw.get(i), Some(b' ' | b'\t')) {
                        i += 1;
                    }
                }
                other => {
                    return Err(Error::InvalidEscape {
                        offset: esc_off,
                        sequence: format!("\\{}", other as char),
                    })
                }
            }
        } else if b == b'\n' {
            while matches!(out.last(), Some(b' ' | b'\t')) {
                out.pop();
            }
            let mut breaks = 1usize;
            i += 1;
            loop {
                while matches!(raw.get(i), Some(b' ' | b'\t' | b'\r')) {
                    i += 1;
                }
                if raw.get(i) == Some(&b'\n') {
                    breaks += 1;
                    i += 1;
                } else {
                    break;
                }
            }
            if breaks == 1 {
                out.push(b' ');
            } else {
                for _ in 0..breaks - 1 {
                    out.push(b'\n');
                }
            }
        } else if b == b'\r' {
            i += 1;
        } else {
            out.push(b);
            i += 1;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_simple_map() {
        let t = parse("a: 1\nb: 2").unwrap();
        let root = t.root_id();
        assert!(t.is_map(root));
        assert_eq!(t.num_children(root), 2);
        assert_eq!(t.val(t.find_child(root, "a")), "1");
        assert_eq!(t.val(t.find_child(root, "b")), "2");
    }

    #[test]
    fn test_parse_nested_map() {
        let t = parse("outer:\n  inner: x\n  other: y").unwrap();
        let outer = t.find_child(t.root_id(), "outer");
        assert!(t.is_map(outer));
        assert_eq!(t.num_children(outer), 2);
        assert_eq!(t.val(t.find_child(outer, "inner")), "x");
    }

    #[test]
    fn test_parse_block_seq() {
        let t = parse("- a\n- b\n- c").unwrap();
        let root = t.root_id();
        assert!(t.is_seq(root));
        let vals: Vec<&str> = t.children(root).map(|c| t.val(c)).collect();
        assert_eq!(vals, ["a", "b", "c"]);
    }

    #[test]
    fn test_parse_seq_of_maps() {
        let t = parse("- name: a\n  age: 1\n- name: b\n  age: 2").unwrap();
        let root = t.root_id();
        assert_eq!(t.num_children(root), 2);
        let first = t.first_child(root);
        assert!(t.is_map(first));
        assert_eq!(t.val(t.find_child(first, "name")), "a");
        assert_eq!(t.val(t.find_child(first, "age")), "1");
    }

    #[test]
    fn test_parse_seq_at_key_indent() {
        let t = parse("items:\n- x\n- y\nafter: z").unwrap();
        let items = t.find_child(t.root_id(), "items");
        assert!(t.is_seq(items));
        assert_eq!(t.num_children(items), 2);
        assert_eq!(t.val(t.find_child(t.root_id(), "after")), "z");
    }

    #[test]
    fn test_parse_flow() {
        let t = parse("a: [1, 2, {b: c}]").unwrap();
        let a = t.find_child(t.root_id(), "a");
        assert!(t.is_seq(a));
        assert_eq!(t.num_children(a), 3);
        assert_eq!(t.val(t.child(a, 0)), "1");
        let m = t.child(a, 2);
        assert!(t.is_map(m));
        assert_eq!(t.val(t.find_child(m, "b")), "c");
    }

    #[test]
    fn test_parse_empty_flow_containers() {
        let t = parse("m: {}\ns: []").unwrap();
        let m = t.find_child(t.root_id(), "m");
        let s = t.find_child(t.root_id(), "s");
        assert!(t.is_map(m) && !t.has_children(m));
        assert!(t.is_seq(s) && !t.has_children(s));
    }

    #[test]
    fn test_parse_double_quoted_escapes() {
        let t = parse("a: \"one\\ttwo\\nthree \\u263a\"").unwrap();
        let a = t.find_child(t.root_id(), "a");
        assert_eq!(t.val(a), "one\ttwo\nthree \u{263a}");
    }

    #[test]
    fn test_parse_single_quoted() {
        let t = parse("a: 'it''s here'\nb: 'plain'").unwrap();
        assert_eq!(t.val(t.find_child(t.root_id(), "a")), "it's here");
        assert_eq!(t.val(t.find_child(t.root_id(), "b")), "plain");
    }

    #[test]
    fn test_null_vs_empty() {
        let t = parse("a:\nb: ''\nc: ~\nd: null\ne: \"\"").unwrap();
        let root = t.root_id();
        assert!(t.val_is_null(t.find_child(root, "a")));
        assert!(!t.val_is_null(t.find_child(root, "b")));
        assert!(t.val_is_null(t.find_child(root, "c")));
        assert!(t.val_is_null(t.find_child(root, "d")));
        assert!(!t.val_is_null(t.find_child(root, "e")));
        assert_eq!(t.val(t.find_child(root, "b")), "");
    }

    #[test]
    fn test_quoted_null_is_text() {
        let t = parse("a: 'null'\nb: \"~\"").unwrap();
        assert!(!t.val_is_null(t.find_child(t.root_id(), "a")));
        assert_eq!(t.val(t.find_child(t.root_id(), "a")), "null");
        assert_eq!(t.val(t.find_child(t.root_id(), "b")), "~");
    }

    #[test]
    fn test_block_literal() {
        let t = parse("text: |\n  line1\n  line2\n").unwrap();
        let x = t.find_child(t.root_id(), "text");
        assert_eq!(t.val(x), "line1\nline2\n");
    }

    #[test]
    fn test_block_literal_keeps_inner_indent() {
        let t = parse("text: |\n  a\n    b\n  c\n").unwrap();
        let x = t.find_child(t.root_id(), "text");
        assert_eq!(t.val(x), "a\n  b\nc\n");
    }

    #[test]
    fn test_block_folded_strip() {
        let t = parse("text: >-\n  one\n  two\n").unwrap();
        let x = t.find_child(t.root_id(), "text");
        assert_eq!(t.val(x), "one two");
    }

    #[test]
    fn test_block_folded_blank_line() {
        let t = parse("text: >\n  one\n\n  two\n").unwrap();
        let x = t.find_child(t.root_id(), "text");
        assert_eq!(t.val(x), "one\ntwo\n");
    }

    #[test]
    fn test_block_scalar_keep() {
        let t = parse("text: |+\n  a\n\n\nnext: 1").unwrap();
        let x = t.find_child(t.root_id(), "text");
        assert_eq!(t.val(x), "a\n\n\n");
        assert_eq!(t.val(t.find_child(t.root_id(), "next")), "1");
    }

    #[test]
    fn test_multiline_plain_folds() {
        let t = parse("a: one\n   two\nb: 3").unwrap();
        assert_eq!(t.val(t.find_child(t.root_id(), "a")), "one two");
        assert_eq!(t.val(t.find_child(t.root_id(), "b")), "3");
    }

    #[test]
    fn test_comments_ignored() {
        let t = parse("# header\na: 1 # trailing\n# middle\nb: 2").unwrap();
        assert_eq!(t.num_children(t.root_id()), 2);
        assert_eq!(t.val(t.find_child(t.root_id(), "a")), "1");
    }

    #[test]
    fn test_anchor_alias_resolve() {
        let mut t = parse("base: &b\n  x: 1\ncopy: *b").unwrap();
        t.resolve().unwrap();
        let copy = t.find_child(t.root_id(), "copy");
        assert!(t.is_map(copy));
        assert_eq!(t.val(t.find_child(copy, "x")), "1");
        assert!(!t.has_val_anchor(t.find_child(t.root_id(), "base")));
    }

    #[test]
    fn test_scalar_anchor_alias() {
        let mut t = parse("a: &v hello\nb: *v").unwrap();
        t.resolve().unwrap();
        assert_eq!(t.val(t.find_child(t.root_id(), "b")), "hello");
    }

    #[test]
    fn test_merge_key_explicit_wins() {
        let src = "defaults: &d\n  a: 1\n  b: 2\nitem:\n  <<: *d\n  b: 3";
        let mut t = parse(src).unwrap();
        t.resolve().unwrap();
        t.reorder();
        let item = t.find_child(t.root_id(), "item");
        assert_eq!(t.num_children(item), 2);
        // explicit keys first, merged keys after
        assert_eq!(t.key(t.first_child(item)), "b");
        assert_eq!(t.val(t.find_child(item, "b")), "3");
        assert_eq!(t.val(t.find_child(item, "a")), "1");
    }

    #[test]
    fn test_merge_key_seq_last_source_wins() {
        let src = "\
one: &o\n  x: 1\ntwo: &t\n  x: 2\n  y: 2\nitem:\n  <<: [*o, *t]\n";
        let mut t = parse(src).unwrap();
        t.resolve().unwrap();
        t.reorder();
        let item = t.find_child(t.root_id(), "item");
        assert_eq!(t.val(t.find_child(item, "x")), "2");
        assert_eq!(t.val(t.find_child(item, "y")), "2");
    }

    #[test]
    fn test_multi_document_stream() {
        let t = parse("---\na: 1\n---\nb: 2\n").unwrap();
        let root = t.root_id();
        assert!(t.is_stream(root));
        assert_eq!(t.num_children(root), 2);
        let d1 = t.first_child(root);
        assert!(t.is_doc(d1) && t.is_map(d1));
        assert_eq!(t.val(t.find_child(d1, "a")), "1");
    }

    #[test]
    fn test_doc_content_on_marker_line() {
        let t = parse("--- 42\n").unwrap();
        let root = t.root_id();
        assert!(t.is_stream(root));
        let d = t.first_child(root);
        assert!(t.is_doc(d));
        assert_eq!(t.val(d), "42");
    }

    #[test]
    fn test_single_doc_has_plain_root() {
        let t = parse("a: 1").unwrap();
        assert!(!t.is_stream(t.root_id()));
        assert!(!t.is_doc(t.root_id()));
        assert!(t.is_map(t.root_id()));
    }

    #[test]
    fn test_explicit_key() {
        let t = parse("? foo\n: bar").unwrap();
        let root = t.root_id();
        assert!(t.is_map(root));
        assert_eq!(t.val(t.find_child(root, "foo")), "bar");
    }

    #[test]
    fn test_tags() {
        let t = parse("a: !!str 1\nb: !custom x").unwrap();
        let a = t.find_child(t.root_id(), "a");
        assert!(t.has_val_tag(a));
        assert_eq!(t.val_tag(a), "!!str");
        assert_eq!(t.val(a), "1");
        let b = t.find_child(t.root_id(), "b");
        assert_eq!(t.val_tag(b), "!custom");
    }

    #[test]
    fn test_error_tab_indentation() {
        match parse("\ta: 1") {
            Err(Error::TabIndentation { line, .. }) => assert_eq!(line, 1),
            other => panic!("expected TabIndentation, got {:?}", other),
        }
    }

    #[test]
    fn test_error_unclosed_quote() {
        match parse("a: 'oops") {
            Err(Error::UnclosedQuote { quote, .. }) => assert_eq!(quote, '\''),
            other => panic!("expected UnclosedQuote, got {:?}", other),
        }
    }

    #[test]
    fn test_error_invalid_escape() {
        match parse("a: \"bad \\q\"") {
            Err(Error::InvalidEscape { sequence, .. }) => assert_eq!(sequence, "\\q"),
            other => panic!("expected InvalidEscape, got {:?}", other),
        }
    }

    #[test]
    fn test_error_bad_indentation() {
        match parse("a: 1\n  b: 2") {
            Err(Error::BadIndentation { line, col }) => {
                assert_eq!(line, 2);
                assert_eq!(col, 2);
            }
            other => panic!("expected BadIndentation, got {:?}", other),
        }
    }

    #[test]
    fn test_error_seq_dash_cannot_continue_scalar() {
        // a deeper seq indicator after a same-line scalar is not a
        // plain continuation
        match parse("- a\n  - b") {
            Err(Error::BadIndentation { line, col }) => {
                assert_eq!(line, 2);
                assert_eq!(col, 2);
            }
            other => panic!("expected BadIndentation, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_in_place_matches_borrowed() {
        let src = "a: 'it''s'\nb: \"x\\ty\"\nc: plain\n";
        let borrowed = parse(src).unwrap();
        let mut buf = src.as_bytes().to_vec();
        let in_place = parse_in_place(&mut buf).unwrap();
        assert_eq!(borrowed, in_place);
        assert_eq!(in_place.val(in_place.find_child(0, "a")), "it's");
        assert_eq!(in_place.val(in_place.find_child(0, "b")), "x\ty");
    }

    #[test]
    fn test_parser_reuse_keeps_capacity() {
        let mut parser = Parser::new();
        let big: String = (0..100).map(|i| format!("k{}: {}\n", i, i)).collect();
        let mut tree = parser.parse(&big).unwrap();
        let cap = tree.capacity();
        parser.parse_into("a: 1", &mut tree).unwrap();
        assert_eq!(tree.capacity(), cap);
        assert_eq!(tree.num_children(tree.root_id()), 1);
        assert_eq!(tree.val(tree.find_child(tree.root_id(), "a")), "1");
    }

    #[test]
    fn test_empty_input() {
        let t = parse("").unwrap();
        assert!(!t.has_children(t.root_id()));
        let t = parse("ched: ok").unwrap();
        assert_eq!(t.val(t.find_child(t.root_id(), "ched")), "ok");
    }

    #[test]
    fn test_directive_skipped() {
        let t = parse("%YAML 1.2\n---\na: 1\n").unwrap();
        let d = t.first_child(t.root_id());
        assert_eq!(t.val(t.find_child(d, "a")), "1");
    }

    #[test]
    fn test_filter_squot_fold() {
        let mut out = Vec::new();
        filter_squot(b"one\n  two", &mut out);
        assert_eq!(out, b"one two");
        out.clear();
        filter_squot(b"it''s", &mut out);
        assert_eq!(out, b"it's");
    }

    #[test]
    fn test_filter_dquot_escapes() {
        let mut out = Vec::new();
        filter_dquot(b"a\\x41b", &mut out, 0).unwrap();
        assert_eq!(out, b"aAb");
        out.clear();
        filter_dquot(b"line\\\n  joined", &mut out, 0).unwrap();
        assert_eq!(out, b"linejoined");
    }
}
