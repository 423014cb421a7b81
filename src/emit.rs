//! YAML and JSON emitters.
//!
//! Both emitters walk the tree recursively and write through
//! [`std::fmt::Write`], so output can go to a `String` or anything else
//! that accepts text. The YAML emitter produces block style (flow only for
//! empty containers); the JSON emitter produces compact single-line output
//! and quotes scalars unless they are lexically numbers or booleans.
//!
//! Emitted YAML parses back into a structurally equal tree: null values
//! come out as nothing after the `:` (or a bare `-`), empty strings as
//! `''`, and scalars that would be misread as structure are quoted.

use std::fmt::{self, Write};

use crate::span::scan_number;
use crate::tree::{NodeId, Tree, NONE};

/// Emit a tree as block-style YAML.
pub fn emit_yaml(tree: &Tree<'_>) -> String {
    let mut out = String::new();
    // writing to a String cannot fail
    write_yaml(tree, &mut out).unwrap();
    out
}

/// Emit a tree as compact JSON.
pub fn emit_json(tree: &Tree<'_>) -> String {
    let mut out = String::new();
    write_json(tree, &mut out).unwrap();
    out
}

/// Emit block-style YAML into a writer.
pub fn write_yaml<W: Write>(tree: &Tree<'_>, w: &mut W) -> fmt::Result {
    let mut em = YamlEmitter { tree, w };
    em.emit()
}

/// Emit compact JSON into a writer. Documents of a stream are emitted as
/// the elements of a top-level array.
pub fn write_json<W: Write>(tree: &Tree<'_>, w: &mut W) -> fmt::Result {
    let root = tree.root_id();
    if tree.is_stream(root) {
        w.write_char('[')?;
        let mut first = true;
        for doc in tree.children(root) {
            if !first {
                w.write_char(',')?;
            }
            first = false;
            json_node(tree, doc, w)?;
        }
        w.write_char(']')
    } else {
        json_node(tree, root, w)
    }
}

// ============================================================================
// YAML
// ============================================================================

struct YamlEmitter<'a, 'w, W> {
    tree: &'a Tree<'a>,
    w: &'w mut W,
}

impl<W: Write> YamlEmitter<'_, '_, W> {
    fn emit(&mut self) -> fmt::Result {
        let root = self.tree.root_id();
        if self.tree.is_stream(root) {
            for doc in self.tree.children(root) {
                self.w.write_str("---")?;
                // a document can be a scalar itself, so check its value
                // before its container shape
                if self.tree.has_val(doc) || self.tree.is_val_ref(doc) {
                    if self.tree.is_val_ref(doc) || !self.tree.val_is_null(doc) {
                        self.w.write_char(' ')?;
                        self.val_scalar(doc)?;
                    }
                    self.w.write_char('\n')?;
                } else if self.tree.has_children(doc) {
                    self.w.write_char('\n')?;
                    self.container_body(doc, 0)?;
                } else if self.tree.is_map(doc) || self.tree.is_seq(doc) {
                    self.w.write_char(' ')?;
                    self.empty_container(doc)?;
                    self.w.write_char('\n')?;
                } else {
                    self.w.write_char('\n')?;
                }
            }
            Ok(())
        } else if self.tree.is_map(root) || self.tree.is_seq(root) {
            if self.tree.has_children(root) {
                self.container_body(root, 0)
            } else {
                self.empty_container(root)?;
                self.w.write_char('\n')
            }
        } else if self.tree.is_val_ref(root)
            || (self.tree.has_val(root) && !self.tree.val_is_null(root))
        {
            self.val_scalar(root)?;
            self.w.write_char('\n')
        } else if self.tree.has_val(root) {
            self.w.write_char('\n')
        } else {
            // empty input parses to a bare root: nothing to write
            Ok(())
        }
    }

    fn indent(&mut self, level: usize) -> fmt::Result {
        for _ in 0..level {
            self.w.write_str("  ")?;
        }
        Ok(())
    }

    fn empty_container(&mut self, node: NodeId) -> fmt::Result {
        self.val_props(node)?;
        if self.tree.is_map(node) {
            self.w.write_str("{}")
        } else {
            self.w.write_str("[]")
        }
    }

    /// `&anchor` and `!tag` of the value side, each followed by a space.
    fn val_props(&mut self, node: NodeId) -> fmt::Result {
        if self.tree.has_val_anchor(node) && !self.tree.is_val_ref(node) {
            write!(self.w, "&{} ", self.tree.val_anchor(node))?;
        }
        if self.tree.has_val_tag(node) {
            write!(self.w, "{} ", self.tree.val_tag(node))?;
        }
        Ok(())
    }

    fn key_props(&mut self, node: NodeId) -> fmt::Result {
        if self.tree.has_key_anchor(node) && !self.tree.is_key_ref(node) {
            write!(self.w, "&{} ", self.tree.key_anchor(node))?;
        }
        if self.tree.has_key_tag(node) {
            write!(self.w, "{} ", self.tree.key_tag(node))?;
        }
        Ok(())
    }

    fn val_scalar(&mut self, node: NodeId) -> fmt::Result {
        if self.tree.is_val_ref(node) {
            return write!(self.w, "*{}", self.tree.val_anchor(node));
        }
        self.val_props(node)?;
        write_scalar(self.tree.val(node), self.w)
    }

    /// Children of a container, one per line at `level`.
    fn container_body(&mut self, node: NodeId, level: usize) -> fmt::Result {
        if self.tree.is_map(node) {
            for c in self.tree.children(node) {
                self.indent(level)?;
                self.map_entry(c, level)?;
            }
        } else {
            for c in self.tree.children(node) {
                self.indent(level)?;
                self.w.write_char('-')?;
                // a map item starts inline after the dash ("- key: val");
                // "- " counts as one indent unit, so its entries sit at
                // level + 1
                if self.tree.is_map(c)
                    && self.tree.has_children(c)
                    && !self.tree.has_val_anchor(c)
                    && !self.tree.has_val_tag(c)
                {
                    self.w.write_char(' ')?;
                    let mut first = true;
                    for e in self.tree.children(c) {
                        if !first {
                            self.indent(level + 1)?;
                        }
                        first = false;
                        self.map_entry(e, level + 1)?;
                    }
                } else {
                    self.entry_value(c, level)?;
                }
            }
        }
        Ok(())
    }

    /// One map entry: `key:` plus its value, no leading indent.
    fn map_entry(&mut self, c: NodeId, level: usize) -> fmt::Result {
        if self.tree.is_key_ref(c) {
            write!(self.w, "*{}:", self.tree.key_anchor(c))?;
        } else {
            self.key_props(c)?;
            write_scalar(self.tree.key(c), self.w)?;
            self.w.write_char(':')?;
        }
        self.entry_value(c, level)
    }

    /// The value part of a map entry or seq item. The cursor sits right
    /// after `:` or `-`; this writes the rest of the line (and any nested
    /// block below it).
    fn entry_value(&mut self, node: NodeId, level: usize) -> fmt::Result {
        if self.tree.is_container(node) {
            if self.tree.has_children(node) {
                if self.tree.has_val_anchor(node) && !self.tree.is_val_ref(node) {
                    write!(self.w, " &{}", self.tree.val_anchor(node))?;
                }
                if self.tree.has_val_tag(node) {
                    write!(self.w, " {}", self.tree.val_tag(node))?;
                }
                self.w.write_char('\n')?;
                self.container_body(node, level + 1)
            } else {
                self.w.write_char(' ')?;
                self.empty_container(node)?;
                self.w.write_char('\n')
            }
        } else if self.tree.val_is_null(node)
            && !self.tree.is_val_ref(node)
            && !self.tree.has_val_anchor(node)
            && !self.tree.has_val_tag(node)
        {
            self.w.write_char('\n')
        } else {
            self.w.write_char(' ')?;
            self.val_scalar(node)?;
            self.w.write_char('\n')
        }
    }
}

/// Whether a scalar can be written as-is in block context.
fn plain_ok(s: &str) -> bool {
    let b = s.as_bytes();
    if b.is_empty() {
        return false;
    }
    if matches!(s, "~" | "null" | "Null" | "NULL") {
        return false;
    }
    match b[0] {
        b' ' | b'\t' | b'#' | b'&' | b'*' | b'!' | b'|' | b'>' | b'\'' | b'"' | b'%' | b'@'
        | b'`' | b'[' | b']' | b'{' | b'}' | b',' => return false,
        b'-' | b'?' | b':' if b.len() == 1 || b[1] == b' ' || b[1] == b'\t' => return false,
        _ => {}
    }
    if b[b.len() - 1] == b' ' || b[b.len() - 1] == b'\t' {
        return false;
    }
    // at the start of a document these would read as markers
    if (b.starts_with(b"---") || b.starts_with(b"...")) && matches!(b.get(3), None | Some(b' ' | b'\t'))
    {
        return false;
    }
    let mut prev = 0u8;
    for (i, &c) in b.iter().enumerate() {
        match c {
            b'\n' | b'\r' => return false,
            b'#' if prev == b' ' || prev == b'\t' => return false,
            b':' if matches!(b.get(i + 1), None | Some(b' ' | b'\t')) => return false,
            _ => {}
        }
        prev = c;
    }
    true
}

/// Write a scalar, quoting when plain form would be misread.
fn write_scalar<W: Write>(s: &str, w: &mut W) -> fmt::Result {
    if plain_ok(s) {
        return w.write_str(s);
    }
    if s.is_empty() {
        return w.write_str("''");
    }
    if !s.bytes().any(|b| b == b'\'' || b == b'\n' || b == b'\r' || b < 0x20) {
        // single quotes need no escaping machinery
        return write!(w, "'{}'", s);
    }
    w.write_char('"')?;
    for ch in s.chars() {
        match ch {
            '\\' => w.write_str("\\\\")?,
            '"' => w.write_str("\\\"")?,
            '\n' => w.write_str("\\n")?,
            '\t' => w.write_str("\\t")?,
            '\r' => w.write_str("\\r")?,
            '\0' => w.write_str("\\0")?,
            c if (c as u32) < 0x20 => write!(w, "\\x{:02x}", c as u32)?,
            c => w.write_char(c)?,
        }
    }
    w.write_char('"')
}

// ============================================================================
// JSON
// ============================================================================

fn json_node<W: Write>(tree: &Tree<'_>, node: NodeId, w: &mut W) -> fmt::Result {
    if tree.is_map(node) {
        w.write_char('{')?;
        let mut c = tree.first_child(node);
        while c != NONE {
            json_string(tree.key(c), w)?;
            w.write_char(':')?;
            json_node(tree, c, w)?;
            c = tree.next_sibling(c);
            if c != NONE {
                w.write_char(',')?;
            }
        }
        w.write_char('}')
    } else if tree.is_seq(node) {
        w.write_char('[')?;
        let mut c = tree.first_child(node);
        while c != NONE {
            json_node(tree, c, w)?;
            c = tree.next_sibling(c);
            if c != NONE {
                w.write_char(',')?;
            }
        }
        w.write_char(']')
    } else {
        json_scalar(tree, node, w)
    }
}

fn json_scalar<W: Write>(tree: &Tree<'_>, node: NodeId, w: &mut W) -> fmt::Result {
    if !tree.has_val(node) || tree.val_is_null(node) {
        return w.write_str("null");
    }
    let s = tree.val(node);
    if matches!(s, "true" | "false") {
        return w.write_str(s);
    }
    let b = s.as_bytes();
    if !b.is_empty() && scan_number(b) == b.len() && !b.starts_with(b"0x") && !b.starts_with(b"0o")
        && !b.starts_with(b"0b")
    {
        return w.write_str(s);
    }
    json_string(s, w)
}

fn json_string<W: Write>(s: &str, w: &mut W) -> fmt::Result {
    w.write_char('"')?;
    for ch in s.chars() {
        match ch {
            '\\' => w.write_str("\\\\")?,
            '"' => w.write_str("\\\"")?,
            '\n' => w.write_str("\\n")?,
            '\t' => w.write_str("\\t")?,
            '\r' => w.write_str("\\r")?,
            c if (c as u32) < 0x20 => write!(w, "\\u{:04x}", c as u32)?,
            c => w.write_char(c)?,
        }
    }
    w.write_char('"')
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse::parse;

    #[test]
    fn test_emit_map() {
        let t = parse("a: 1\nb: two").unwrap();
        insta::assert_snapshot!(emit_yaml(&t), @r###"
        a: 1
        b: two
        "###);
    }

    #[test]
    fn test_emit_nested() {
        let t = parse("outer:\n  inner: x\nlist:\n  - 1\n  - sub: y").unwrap();
        insta::assert_snapshot!(emit_yaml(&t), @r###"
        outer:
          inner: x
        list:
          - 1
          - sub: y
        "###);
    }

    #[test]
    fn test_emit_null_and_empty() {
        let t = parse("a:\nb: ''\nc: ~").unwrap();
        insta::assert_snapshot!(emit_yaml(&t), @r###"
        a:
        b: ''
        c:
        "###);
    }

    #[test]
    fn test_emit_quoting() {
        let t = parse("a: 'has: colon'\nb: '#not comment'\nc: \"line\\nbreak\"").unwrap();
        insta::assert_snapshot!(emit_yaml(&t), @r###"
        a: 'has: colon'
        b: '#not comment'
        c: "line\nbreak"
        "###);
    }

    #[test]
    fn test_emit_null_word_stays_null_word() {
        // the scalar text "null" must be quoted or it round-trips to null
        let t = parse("a: 'null'").unwrap();
        insta::assert_snapshot!(emit_yaml(&t), @r###"
        a: 'null'
        "###);
    }

    #[test]
    fn test_emit_empty_containers() {
        let t = parse("m: {}\ns: []").unwrap();
        insta::assert_snapshot!(emit_yaml(&t), @r###"
        m: {}
        s: []
        "###);
    }

    #[test]
    fn test_emit_anchors_and_refs() {
        let t = parse("base: &b\n  x: 1\ncopy: *b").unwrap();
        insta::assert_snapshot!(emit_yaml(&t), @r###"
        base: &b
          x: 1
        copy: *b
        "###);
    }

    #[test]
    fn test_emit_tags() {
        let t = parse("a: !!str 1").unwrap();
        insta::assert_snapshot!(emit_yaml(&t), @r###"
        a: !!str 1
        "###);
    }

    #[test]
    fn test_emit_stream() {
        let t = parse("---\na: 1\n---\n- x\n--- 42\n").unwrap();
        insta::assert_snapshot!(emit_yaml(&t), @r###"
        ---
        a: 1
        ---
        - x
        --- 42
        "###);
    }

    #[test]
    fn test_emit_seq_root() {
        let t = parse("- a\n- b:\n    c: 1").unwrap();
        insta::assert_snapshot!(emit_yaml(&t), @r###"
        - a
        - b:
            c: 1
        "###);
    }

    #[test]
    fn test_emit_empty_parse_result() {
        let t = parse("").unwrap();
        assert_eq!(emit_yaml(&t), "");
        assert_eq!(emit_json(&t), "null");
    }

    #[test]
    fn test_marker_like_scalar_round_trips() {
        let mut t = Tree::new();
        let root = t.root_id();
        let v = t.to_arena("--- x");
        t.to_val(root, v);
        let emitted = emit_yaml(&t);
        assert_eq!(emitted, "'--- x'\n");
        let back = parse(&emitted).unwrap();
        assert_eq!(t, back);
    }

    #[test]
    fn test_yaml_round_trip() {
        let src = "a: 1\nnested:\n  x: 'it''s'\n  y:\nitems:\n  - one\n  - two: 2\n";
        let t = parse(src).unwrap();
        let emitted = emit_yaml(&t);
        let back = parse(&emitted).unwrap();
        assert_eq!(t, back);
    }

    #[test]
    fn test_json_map() {
        let t = parse("a: 1\nb: text\nc: true\nd:\ne: ''").unwrap();
        assert_eq!(
            emit_json(&t),
            r#"{"a":1,"b":"text","c":true,"d":null,"e":""}"#
        );
    }

    #[test]
    fn test_json_nested() {
        let t = parse("xs: [1, 2.5, -3]\nm: {k: v}").unwrap();
        assert_eq!(emit_json(&t), r#"{"xs":[1,2.5,-3],"m":{"k":"v"}}"#);
    }

    #[test]
    fn test_json_string_escapes() {
        let t = parse("a: \"tab\\there\"").unwrap();
        assert_eq!(emit_json(&t), r#"{"a":"tab\there"}"#);
    }

    #[test]
    fn test_json_hex_stays_string() {
        // hex literals are numbers to the classifier but not valid JSON
        let t = parse("a: 0x1f").unwrap();
        assert_eq!(emit_json(&t), r#"{"a":"0x1f"}"#);
    }

    #[test]
    fn test_json_stream_becomes_array() {
        let t = parse("---\na: 1\n---\nb: 2\n").unwrap();
        assert_eq!(emit_json(&t), r#"[{"a":1},{"b":2}]"#);
    }

    #[test]
    fn test_plain_ok() {
        assert!(plain_ok("hello"));
        assert!(plain_ok("1.5"));
        assert!(plain_ok("a-b_c"));
        assert!(!plain_ok(""));
        assert!(!plain_ok("null"));
        assert!(!plain_ok("~"));
        assert!(!plain_ok("has: colon"));
        assert!(!plain_ok("trailing "));
        assert!(!plain_ok(" leading"));
        assert!(!plain_ok("- item"));
        assert!(!plain_ok("#comment"));
        assert!(!plain_ok("a #b"));
        assert!(plain_ok("a#b"));
        assert!(!plain_ok("multi\nline"));
        assert!(!plain_ok("--- x"));
        assert!(!plain_ok("---"));
        assert!(!plain_ok("... x"));
        assert!(plain_ok("---x"));
        assert!(plain_ok("...x"));
    }
}
