//! Conformance checks every `StoreAdapter` implementation should pass.
//!
//! Each function takes a fresh, empty store and panics on the first
//! violation. Implementations call them from their own test modules.

use crate::{address, Error, NodeAddress, StoreAdapter, TypeTag, TypedValue};

pub fn ensure_node_creates_intermediates(store: &mut impl StoreAdapter) {
    let deep = address!("User:/a/b/c");
    let node = store.ensure_node(&deep).unwrap();
    assert_eq!(node.address(), &deep);
    assert!(store.node_exists(&address!("User:/a")).unwrap());
    assert!(store.node_exists(&address!("User:/a/b")).unwrap());

    // idempotent
    let again = store.ensure_node(&deep).unwrap();
    assert_eq!(again, node);

    let root = store.get_node(&address!("User:/")).unwrap();
    assert_eq!(store.list_children(&root).unwrap(), vec!["a".to_string()]);
}

pub fn get_node_reports_missing(store: &mut impl StoreAdapter) {
    assert!(matches!(
        store.get_node(&address!("User:/nope")),
        Err(Error::NotFound { .. })
    ));
    assert!(!store.node_exists(&address!("User:/nope")).unwrap());
    // scope roots always exist
    assert!(store.node_exists(&address!("User:/")).unwrap());
    assert!(store.node_exists(&address!("System:/")).unwrap());
}

pub fn scopes_are_disjoint(store: &mut impl StoreAdapter) {
    let user = store.ensure_node(&address!("User:/shared")).unwrap();
    store.put_value(&user, "k", "user".into()).unwrap();

    assert!(!store.node_exists(&address!("System:/shared")).unwrap());
    let system = store.ensure_node(&address!("System:/shared")).unwrap();
    assert_eq!(store.get_raw(&system, "k").unwrap(), None);
    assert_eq!(store.get_raw(&user, "k").unwrap(), Some("user".to_string()));
}

pub fn children_are_sorted_by_name(store: &mut impl StoreAdapter) {
    for name in ["zeta", "alpha", "mid"] {
        store
            .ensure_node(&address!("System:/p").child(name).unwrap())
            .unwrap();
    }
    let parent = store.get_node(&address!("System:/p")).unwrap();
    assert_eq!(
        store.list_children(&parent).unwrap(),
        vec!["alpha".to_string(), "mid".to_string(), "zeta".to_string()]
    );
}

pub fn values_round_trip_as_text(store: &mut impl StoreAdapter) {
    let node = store.ensure_node(&address!("User:/values")).unwrap();
    store.put_value(&node, "flag", TypedValue::Boolean(true)).unwrap();
    store.put_value(&node, "count", TypedValue::Int32(42)).unwrap();
    store.put_value(&node, "big", TypedValue::Int64(1 << 40)).unwrap();
    store.put_value(&node, "ratio", TypedValue::Float(0.5)).unwrap();
    store.put_value(&node, "name", "hello".into()).unwrap();

    assert_eq!(
        store.list_keys(&node).unwrap(),
        vec!["big", "count", "flag", "name", "ratio"]
    );
    assert_eq!(store.get_raw(&node, "count").unwrap(), Some("42".to_string()));
    assert_eq!(
        store.get_value(&node, "big", TypeTag::Int64).unwrap(),
        TypedValue::Int64(1 << 40)
    );
    assert_eq!(store.guess_type(&node, "flag").unwrap(), TypeTag::Boolean);
    assert_eq!(store.guess_type(&node, "count").unwrap(), TypeTag::Int32);
    assert_eq!(store.guess_type(&node, "ratio").unwrap(), TypeTag::Float);
    assert_eq!(store.guess_type(&node, "name").unwrap(), TypeTag::Text);
    assert_eq!(store.get_bytes(&node, "name").unwrap(), None);
}

pub fn bytes_live_in_their_own_slot(store: &mut impl StoreAdapter) {
    let node = store.ensure_node(&address!("User:/bytes")).unwrap();
    store
        .put_value(&node, "blob", TypedValue::ByteSequence(vec![0, 1, 2]))
        .unwrap();
    assert_eq!(store.get_bytes(&node, "blob").unwrap(), Some(vec![0, 1, 2]));
    assert_eq!(store.get_raw(&node, "blob").unwrap(), Some("AAEC".to_string()));
    assert_eq!(store.guess_type(&node, "blob").unwrap(), TypeTag::ByteSequence);

    // overwriting with text clears the byte slot
    store.put_value(&node, "blob", "AAEC".into()).unwrap();
    assert_eq!(store.get_bytes(&node, "blob").unwrap(), None);
    assert_eq!(store.guess_type(&node, "blob").unwrap(), TypeTag::Text);
}

pub fn remove_key_is_idempotent(store: &mut impl StoreAdapter) {
    let node = store.ensure_node(&address!("User:/rk")).unwrap();
    store.put_value(&node, "k", "v".into()).unwrap();
    store.remove_key(&node, "k").unwrap();
    assert_eq!(store.get_raw(&node, "k").unwrap(), None);
    store.remove_key(&node, "k").unwrap();
    assert!(store.list_keys(&node).unwrap().is_empty());
}

pub fn remove_node_is_recursive(store: &mut impl StoreAdapter) {
    let leaf = store.ensure_node(&address!("User:/r/s/t")).unwrap();
    store.put_value(&leaf, "k", "v".into()).unwrap();
    let r = store.get_node(&address!("User:/r")).unwrap();
    store.remove_node(&r).unwrap();

    assert!(!store.node_exists(&address!("User:/r")).unwrap());
    assert!(!store.node_exists(&address!("User:/r/s/t")).unwrap());
    // stale handles fail
    assert!(matches!(
        store.get_raw(&leaf, "k"),
        Err(Error::NotFound { .. })
    ));
    assert!(matches!(
        store.put_value(&leaf, "k", "v".into()),
        Err(Error::NotFound { .. })
    ));
    assert!(matches!(store.remove_node(&r), Err(Error::NotFound { .. })));
}

pub fn scope_roots_cannot_be_removed(store: &mut impl StoreAdapter) {
    let root = store.get_node(&NodeAddress::root(crate::Scope::System)).unwrap();
    assert!(matches!(
        store.remove_node(&root),
        Err(Error::Validation { .. })
    ));
}

pub fn limits_are_enforced(store: &mut impl StoreAdapter) {
    let node = store.ensure_node(&address!("User:/limits")).unwrap();
    assert!(matches!(
        store.put_value(&node, &"k".repeat(81), "v".into()),
        Err(Error::Validation { .. })
    ));
    assert!(matches!(
        store.put_value(&node, "k", "v".repeat(8193).into()),
        Err(Error::Validation { .. })
    ));
    assert!(matches!(
        store.ensure_node(&address!("User:/").child(&"n".repeat(81)).unwrap()),
        Err(Error::Validation { .. })
    ));
    assert!(store.list_keys(&node).unwrap().is_empty());
}

pub fn sync_and_flush_succeed(store: &mut impl StoreAdapter) {
    let node = store.ensure_node(&address!("User:/sf")).unwrap();
    store.put_value(&node, "k", "v".into()).unwrap();
    store.flush(&node).unwrap();
    store.sync(&node).unwrap();
    assert_eq!(store.get_raw(&node, "k").unwrap(), Some("v".to_string()));
}

/// Run every check, each against a fresh store from `new_store`.
pub fn run_all<S: StoreAdapter>(mut new_store: impl FnMut() -> S) {
    ensure_node_creates_intermediates(&mut new_store());
    get_node_reports_missing(&mut new_store());
    scopes_are_disjoint(&mut new_store());
    children_are_sorted_by_name(&mut new_store());
    values_round_trip_as_text(&mut new_store());
    bytes_live_in_their_own_slot(&mut new_store());
    remove_key_is_idempotent(&mut new_store());
    remove_node_is_recursive(&mut new_store());
    scope_roots_cannot_be_removed(&mut new_store());
    limits_are_enforced(&mut new_store());
    sync_and_flush_succeed(&mut new_store());
}
