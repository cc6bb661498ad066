//! Model-based property tests: random insert/erase interleavings checked
//! against a sorted-Vec multiset model, with the full invariant audit after
//! every mutation.

use std::sync::Once;

use proptest::prelude::*;
use redblack::RbTree;

fn init_logging() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        use simplelog::*;
        let _ = TermLogger::init(
            LevelFilter::Debug,
            Config::default(),
            TerminalMode::Mixed,
            ColorChoice::Auto,
        );
    });
}

#[derive(Debug, Clone, Copy)]
enum Op {
    Insert(i8),
    Erase(i8),
}

fn op() -> impl Strategy<Value = Op> {
    // i8 keys keep the domain small enough that erases hit live keys and
    // duplicates show up often
    prop_oneof![
        any::<i8>().prop_map(Op::Insert),
        any::<i8>().prop_map(Op::Erase),
    ]
}

fn export(tree: &RbTree<i8>) -> Vec<i8> {
    let mut buf = vec![0i8; tree.len()];
    let n = tree.export_ordered(&mut buf);
    assert_eq!(n, tree.len());
    buf
}

proptest! {
    #[test]
    fn random_interleavings_match_multiset_model(
        ops in proptest::collection::vec(op(), 1..200),
    ) {
        init_logging();
        let mut tree = RbTree::new().unwrap();
        let mut model: Vec<i8> = Vec::new();

        for op in ops {
            match op {
                Op::Insert(k) => {
                    let id = tree.insert(k).unwrap();
                    prop_assert_eq!(tree.key(id), Some(&k));
                    model.push(k);
                }
                Op::Erase(k) => match tree.find(&k) {
                    Some(id) => {
                        prop_assert_eq!(tree.erase(id), k);
                        let pos = model.iter().position(|&m| m == k).unwrap();
                        model.remove(pos);
                    }
                    None => prop_assert!(!model.contains(&k)),
                },
            }
            prop_assert!(tree.check_invariants());
            prop_assert_eq!(tree.len(), model.len());
        }

        model.sort_unstable();
        prop_assert_eq!(export(&tree), model.clone());

        match (tree.minimum(), tree.maximum()) {
            (Some(min), Some(max)) => {
                prop_assert_eq!(tree.key(min), model.first());
                prop_assert_eq!(tree.key(max), model.last());
            }
            (None, None) => prop_assert!(model.is_empty()),
            _ => prop_assert!(false, "minimum/maximum disagree about emptiness"),
        }
    }

    #[test]
    fn insert_then_drain_returns_to_empty(
        keys in proptest::collection::vec(any::<i32>(), 1..100),
    ) {
        init_logging();
        let mut tree = RbTree::with_capacity(keys.len()).unwrap();
        for &k in &keys {
            tree.insert(k).unwrap();
        }
        prop_assert!(tree.check_invariants());
        prop_assert_eq!(tree.len(), keys.len());

        // erasing always at the minimum exercises the one-child and
        // leaf paths; erasing at the root exercises successor promotion
        let mut at_root = true;
        while let Some(root) = tree.root() {
            let victim = if at_root { root } else { tree.minimum().unwrap() };
            at_root = !at_root;
            tree.erase(victim);
            prop_assert!(tree.check_invariants());
        }
        prop_assert!(tree.is_empty());
        prop_assert_eq!(tree.len(), 0);
    }

    #[test]
    fn successor_chain_agrees_with_export(
        keys in proptest::collection::vec(any::<i16>(), 0..80),
    ) {
        init_logging();
        let mut tree = RbTree::new().unwrap();
        for &k in &keys {
            tree.insert(k).unwrap();
        }

        let mut walked = Vec::with_capacity(keys.len());
        let mut cursor = tree.minimum();
        while let Some(id) = cursor {
            walked.push(*tree.key(id).unwrap());
            cursor = tree.successor(id);
        }

        let mut sorted = keys.clone();
        sorted.sort_unstable();
        prop_assert_eq!(walked, sorted);
    }

    #[test]
    fn find_never_invents_keys(
        present in proptest::collection::vec(0i32..500, 1..60),
        probes in proptest::collection::vec(0i32..1000, 1..60),
    ) {
        init_logging();
        let mut tree = RbTree::new().unwrap();
        for &k in &present {
            tree.insert(k).unwrap();
        }
        for &k in &probes {
            match tree.find(&k) {
                Some(id) => {
                    prop_assert!(present.contains(&k));
                    prop_assert_eq!(tree.key(id), Some(&k));
                }
                None => prop_assert!(!present.contains(&k)),
            }
        }
    }
}
