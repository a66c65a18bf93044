//! Recursive subtree copy.
//!
//! Values are copied through their raw text, so every copied key arrives
//! as `Text` (byte sequences arrive as their base64 text). The copy is not
//! atomic: the first store failure aborts it and whatever was already
//! written stays in the destination.

use preftree_core_store::{Error, NodeAddress, Result, StoreAdapter, StoreNode, TypedValue};

/// Copy every key and every descendant of `source` into `destination`.
///
/// Each node's child list is read once, before its children are visited, so
/// nodes created during the copy are not themselves copied.
pub fn copy<S: StoreAdapter + ?Sized>(
    store: &mut S,
    source: &StoreNode,
    destination: &StoreNode,
) -> Result<()> {
    log::debug!("Copying {} into {}", source, destination);

    for key in store.list_keys(source)? {
        let raw = store.get_raw(source, &key)?.unwrap_or_default();
        store.put_value(destination, &key, TypedValue::Text(raw))?;
    }

    let children = store.list_children(source)?;
    for name in children {
        let child_source = store.get_node(&source.address().child(&name)?)?;
        let child_destination = store.ensure_node(&destination.address().child(&name)?)?;
        copy(store, &child_source, &child_destination)?;
    }
    Ok(())
}

/// Refuse a copy or move whose destination lies inside the source subtree.
pub fn check_not_within(source: &NodeAddress, destination: &NodeAddress) -> Result<()> {
    if destination.is_within(source) {
        return Err(Error::validation(format!(
            "{} lies inside {}",
            destination, source
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use preftree_core_store::{address, TypeTag};
    use preftree_json_store::InMemoryStore;

    fn populated() -> InMemoryStore {
        let mut store = InMemoryStore::new();
        let a = store.ensure_node(&address!("User:/a")).unwrap();
        store.put_value(&a, "n", TypedValue::Int32(5)).unwrap();
        store.put_value(&a, "flag", TypedValue::Boolean(false)).unwrap();
        store
            .put_value(&a, "blob", TypedValue::ByteSequence(vec![0xff, 0x00]))
            .unwrap();
        let c = store.ensure_node(&address!("User:/a/b/c")).unwrap();
        store.put_value(&c, "deep", "yes".into()).unwrap();
        store
    }

    #[test]
    fn copies_keys_and_descendants() {
        let mut store = populated();
        let source = store.get_node(&address!("User:/a")).unwrap();
        let destination = store.ensure_node(&address!("System:/copy")).unwrap();
        copy(&mut store, &source, &destination).unwrap();

        assert_eq!(store.list_keys(&destination).unwrap(), vec!["blob", "flag", "n"]);
        assert_eq!(store.get_raw(&destination, "n").unwrap(), Some("5".to_string()));
        let c = store.get_node(&address!("System:/copy/b/c")).unwrap();
        assert_eq!(store.get_raw(&c, "deep").unwrap(), Some("yes".to_string()));

        // source untouched
        assert!(store.node_exists(&address!("User:/a/b/c")).unwrap());
    }

    #[test]
    fn copied_values_become_text() {
        let mut store = populated();
        let source = store.get_node(&address!("User:/a")).unwrap();
        let destination = store.ensure_node(&address!("User:/z")).unwrap();
        copy(&mut store, &source, &destination).unwrap();

        // numbers still infer the same way from their text
        assert_eq!(store.guess_type(&destination, "n").unwrap(), TypeTag::Int32);
        // bytes do not: they lose the byte slot and read as base64 text
        assert_eq!(store.get_bytes(&destination, "blob").unwrap(), None);
        assert_eq!(store.get_raw(&destination, "blob").unwrap(), Some("/wA=".to_string()));
        assert_eq!(store.guess_type(&destination, "blob").unwrap(), TypeTag::Text);
    }

    #[test]
    fn merges_into_existing_destination() {
        let mut store = populated();
        let destination = store.ensure_node(&address!("User:/m")).unwrap();
        store.put_value(&destination, "keep", "me".into()).unwrap();
        store.put_value(&destination, "n", "old".into()).unwrap();

        let source = store.get_node(&address!("User:/a")).unwrap();
        copy(&mut store, &source, &destination).unwrap();
        assert_eq!(store.get_raw(&destination, "keep").unwrap(), Some("me".to_string()));
        assert_eq!(store.get_raw(&destination, "n").unwrap(), Some("5".to_string()));
    }

    #[test]
    fn stale_source_fails() {
        let mut store = populated();
        let source = store.get_node(&address!("User:/a/b")).unwrap();
        let destination = store.ensure_node(&address!("User:/d")).unwrap();
        store.remove_node(&source).unwrap();
        assert!(matches!(
            copy(&mut store, &source, &destination),
            Err(Error::NotFound { .. })
        ));
    }

    #[test]
    fn nesting_check() {
        assert!(check_not_within(&address!("User:/a"), &address!("User:/a/b")).is_err());
        assert!(check_not_within(&address!("User:/a"), &address!("User:/a")).is_err());
        assert!(check_not_within(&address!("User:/a"), &address!("User:/ab")).is_ok());
        assert!(check_not_within(&address!("User:/a"), &address!("System:/a/b")).is_ok());
    }
}
