use calltime_probe::resolver::split_identifier;
use calltime_probe::{
    CatalogEntry, ResolveError, StaticCatalog, SymbolIndex, TargetId, TrackRequest,
    compose_identifiers,
};
use proptest::prelude::*;

fn ident() -> impl Strategy<Value = String> {
    "[A-Za-z_][A-Za-z0-9_]{0,8}"
}

proptest! {
    #[test]
    fn qualified_unique_type_resolves_to_one(
        ns in prop::collection::vec(ident(), 1..4),
        ty in ident(),
        method in ident(),
    ) {
        let namespace = ns.join(".");
        prop_assume!(namespace != "Other" || ty != "Noise");
        let catalog = StaticCatalog::builder()
            .function(&namespace, &ty, &method, &[] as &[&str])
            .function("Other", "Noise", "run", &[] as &[&str])
            .build();
        let index = SymbolIndex::new(catalog);

        let identifier = format!("{namespace}.{ty}.{method}");
        let found = index.resolve(&identifier, &[] as &[&str]).unwrap();
        prop_assert_eq!(found.len(), 1);
        prop_assert_eq!(&found[0].name, &method);
    }

    #[test]
    fn identifiers_without_separator_are_malformed(name in "[^.:]{0,20}") {
        let catalog = StaticCatalog::builder()
            .function("", "A", "b", &[] as &[&str])
            .build();
        let index = SymbolIndex::new(catalog);
        prop_assert!(matches!(
            index.resolve(&name, &[] as &[&str]),
            Err(ResolveError::MalformedIdentifier(_))
        ));
    }

    #[test]
    fn simple_name_picks_first_declaring_type(
        nss in prop::collection::hash_set(ident(), 2..5),
        ty in ident(),
    ) {
        let nss: Vec<String> = nss.into_iter().collect();
        let mut builder = StaticCatalog::builder();
        for ns in &nss {
            builder = builder.function(ns, &ty, "run", &[] as &[&str]);
        }
        let index = SymbolIndex::new(builder.build());

        let found = index.resolve(&format!("{ty}.run"), &[] as &[&str]).unwrap();
        prop_assert_eq!(found.len(), 1);
        prop_assert_eq!(&found[0].qualified_type, &format!("{}.{}", nss[0], ty));
    }

    #[test]
    fn fallback_order_decides_between_namespaces(
        nss in prop::collection::hash_set(ident(), 2..5),
        rotate in 0usize..5,
    ) {
        let mut nss: Vec<String> = nss.into_iter().collect();
        let mut builder = StaticCatalog::builder();
        for ns in &nss {
            builder = builder.function(&format!("{ns}.Objects"), "Chip", "Tick", &[] as &[&str]);
        }
        let index = SymbolIndex::new(builder.build());

        let shift = rotate % nss.len();
        nss.rotate_left(shift);
        for _ in 0..2 {
            let found = index.resolve("Objects.Chip.Tick", nss.as_slice()).unwrap();
            prop_assert_eq!(found.len(), 1);
            prop_assert_eq!(&found[0].qualified_type, &format!("{}.Objects.Chip", nss[0]));
        }
    }

    #[test]
    fn composed_identifiers_are_unique(names in prop::collection::vec("[A-C]{1,2}", 0..12)) {
        let request = TrackRequest::new("T.", "", names.join(","));
        let idents = compose_identifiers(&[request.clone(), request]);
        let mut sorted = idents.clone();
        sorted.sort();
        sorted.dedup();
        prop_assert_eq!(sorted.len(), idents.len());
    }
}

#[test]
fn split_examples() {
    assert!(matches!(split_identifier("Foo"), Err(ResolveError::MalformedIdentifier(_))));
    assert!(matches!(split_identifier("Foo."), Err(ResolveError::MalformedIdentifier(_))));
    assert!(matches!(split_identifier(".Foo"), Err(ResolveError::MalformedIdentifier(_))));
}

#[test]
fn fallback_not_consulted_when_type_found_directly() {
    let catalog = StaticCatalog::new(vec![
        CatalogEntry::new(TargetId(1), "Chip", "Tick"),
        CatalogEntry::new(TargetId(2), "ns.Chip", "Tick"),
    ]);
    let index = SymbolIndex::new(catalog);
    let found = index.resolve("Chip.Tick", &["ns"]).unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].target, TargetId(1));
}
