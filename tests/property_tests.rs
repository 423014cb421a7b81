//! Property tests: emitted documents parse back into equal trees.

use proptest::prelude::*;

use yamltree::{emit_yaml, parse, Tree};

/// Scalar content drawn from printable ASCII plus tab, newline, and a few
/// non-ASCII characters, which together exercise every quoting path of the
/// emitter.
fn scalar() -> impl Strategy<Value = String> {
    proptest::string::string_regex("[ -~\t\néß☃]{0,24}").unwrap()
}

fn build_map(scalars: &[String]) -> Tree<'static> {
    let mut t: Tree = Tree::new();
    let root = t.root_id();
    t.to_map(root);
    for (i, s) in scalars.iter().enumerate() {
        let c = t.append_child(root);
        let k = t.to_arena(&format!("k{}", i));
        let v = t.to_arena(s);
        t.to_keyval(c, k, v);
    }
    t
}

proptest! {
    #[test]
    fn round_trip_scalar_values(scalars in prop::collection::vec(scalar(), 0..12)) {
        let t = build_map(&scalars);
        let emitted = emit_yaml(&t);
        let back = parse(&emitted).unwrap();
        prop_assert_eq!(&t, &back);
        for (i, s) in scalars.iter().enumerate() {
            let c = back.find_child(back.root_id(), &format!("k{}", i));
            prop_assert_eq!(back.val(c), s.as_str());
        }
    }

    #[test]
    fn round_trip_nested_seq(scalars in prop::collection::vec(scalar(), 1..8)) {
        let mut t: Tree = Tree::new();
        let root = t.root_id();
        t.to_seq(root);
        for s in &scalars {
            let c = t.append_child(root);
            let v = t.to_arena(s);
            t.to_val(c, v);
        }
        let emitted = emit_yaml(&t);
        let back = parse(&emitted).unwrap();
        prop_assert_eq!(&t, &back);
    }

    #[test]
    fn capacity_invariant_under_churn(ops in prop::collection::vec(0usize..3, 1..64)) {
        let mut t: Tree = Tree::new();
        let root = t.root_id();
        t.to_seq(root);
        for (i, op) in ops.iter().enumerate() {
            match op {
                0 | 1 => {
                    let c = t.append_child(root);
                    let v = t.to_arena(&i.to_string());
                    t.to_val(c, v);
                }
                _ => {
                    if t.has_children(root) {
                        t.remove(t.first_child(root));
                    }
                }
            }
            prop_assert_eq!(t.size() + t.slack(), t.capacity());
        }
    }

    #[test]
    fn parse_never_panics_on_plainish_input(src in "[ -~\n]{0,200}") {
        // errors are fine, panics are not
        let _ = parse(&src);
    }
}
