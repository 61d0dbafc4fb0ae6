//! Property tests: random operation sequences checked against a plain model.

use proptest::prelude::*;
use std::collections::{BTreeMap, BTreeSet};
use strata_core::{ComponentId, EntityId, Store, StoreError};

const COMPONENTS: usize = 4;
const SIZES: [usize; COMPONENTS] = [4, 8, 0, 12];

#[derive(Clone, Debug)]
enum Op {
    Create,
    Destroy(usize),
    Add(usize, usize),
    Remove(usize, usize),
    Set(usize, usize, u8),
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        1 => Just(Op::Create),
        1 => any::<usize>().prop_map(Op::Destroy),
        3 => (any::<usize>(), 0..COMPONENTS).prop_map(|(e, c)| Op::Add(e, c)),
        2 => (any::<usize>(), 0..COMPONENTS).prop_map(|(e, c)| Op::Remove(e, c)),
        3 => (any::<usize>(), 0..COMPONENTS, any::<u8>()).prop_map(|(e, c, b)| Op::Set(e, c, b)),
    ]
}

/// Expected component values per live entity.
type Model = BTreeMap<EntityId, BTreeMap<usize, Vec<u8>>>;

fn setup() -> (Store, Vec<ComponentId>) {
    let mut store = Store::new().unwrap();
    let ids = SIZES
        .iter()
        .enumerate()
        .map(|(i, &size)| store.register_component(&format!("C{i}"), size).unwrap())
        .collect();
    (store, ids)
}

fn pick(model: &Model, n: usize) -> Option<EntityId> {
    if model.is_empty() {
        None
    } else {
        model.keys().nth(n % model.len()).copied()
    }
}

proptest! {
    #[test]
    fn store_matches_model(ops in prop::collection::vec(op(), 1..200)) {
        let (mut store, ids) = setup();
        let mut model = Model::new();
        let mut dead = Vec::new();

        for op in ops {
            match op {
                Op::Create => {
                    let e = store.create_entity().unwrap();
                    prop_assert!(!model.contains_key(&e));
                    model.insert(e, BTreeMap::new());
                }
                Op::Destroy(n) => {
                    if let Some(e) = pick(&model, n) {
                        store.destroy_entity(e).unwrap();
                        model.remove(&e);
                        dead.push(e);
                    }
                }
                Op::Add(n, c) => {
                    if let Some(e) = pick(&model, n) {
                        store.add_component(e, ids[c]).unwrap();
                        model
                            .get_mut(&e)
                            .unwrap()
                            .entry(c)
                            .or_insert_with(|| vec![0; SIZES[c]]);
                    }
                }
                Op::Remove(n, c) => {
                    if let Some(e) = pick(&model, n) {
                        let present = model.get_mut(&e).unwrap().remove(&c).is_some();
                        let result = store.remove_component(e, ids[c]);
                        if present {
                            prop_assert!(result.is_ok());
                        } else {
                            let is_not_found = matches!(result, Err(StoreError::ComponentNotFound { .. }));
                            prop_assert!(is_not_found);
                        }
                    }
                }
                Op::Set(n, c, byte) => {
                    if let Some(e) = pick(&model, n) {
                        let value = vec![byte; SIZES[c]];
                        let result = store.set_component(e, ids[c], &value);
                        match model.get_mut(&e).unwrap().get_mut(&c) {
                            Some(slot) => {
                                prop_assert!(result.is_ok());
                                *slot = value;
                            }
                            None => prop_assert!(result.is_err()),
                        }
                    }
                }
            }
        }

        for (&e, components) in &model {
            for (c, &id) in ids.iter().enumerate() {
                match components.get(&c) {
                    Some(expected) => prop_assert_eq!(store.get_component(e, id).unwrap(), expected.as_slice()),
                    None => prop_assert!(!store.has_component(e, id).unwrap()),
                }
            }
        }
        for e in dead {
            prop_assert!(!store.is_alive(e));
            let is_not_found = matches!(store.get_component(e, ids[0]), Err(StoreError::EntityNotFound { .. }));
            prop_assert!(is_not_found);
        }
    }

    #[test]
    fn archetype_depends_only_on_the_component_set(
        first in Just((0..COMPONENTS).collect::<Vec<_>>()).prop_shuffle(),
        second in Just((0..COMPONENTS).collect::<Vec<_>>()).prop_shuffle(),
        keep in 1..=COMPONENTS,
    ) {
        let (mut store, ids) = setup();
        let wanted: BTreeSet<usize> = first[..keep].iter().copied().collect();

        let a = store.create_entity().unwrap();
        for &c in &first[..keep] {
            store.add_component(a, ids[c]).unwrap();
        }

        // Reach the same set by a different path, with a detour.
        let b = store.create_entity().unwrap();
        for &c in &second {
            store.add_component(b, ids[c]).unwrap();
        }
        for &c in &second {
            if !wanted.contains(&c) {
                store.remove_component(b, ids[c]).unwrap();
            }
        }

        prop_assert_eq!(store.archetype_of(a).unwrap(), store.archetype_of(b).unwrap());
        let table = store.archetype(store.archetype_of(a).unwrap()).unwrap();
        let mut expected: Vec<ComponentId> = wanted.iter().map(|&c| ids[c]).collect();
        expected.sort();
        prop_assert_eq!(table.components(), expected.as_slice());
    }
}
