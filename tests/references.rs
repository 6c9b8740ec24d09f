use concise_builder::{
    build_from_events, Error, Event, FieldDescriptor, FloatWidth, IntWidth, Map, TypeDescriptor, UintWidth, Value,
};

fn list(items: Vec<Value>) -> Value {
    Value::List(items)
}

fn map(entries: Vec<(&str, Value)>) -> Value {
    Value::Map(
        entries
            .into_iter()
            .map(|(k, v)| (Value::from(k), v))
            .collect::<Map>(),
    )
}

#[test]
fn backward_reference_copies_the_marked_value() {
    let events = [
        Event::List,
        Event::marker("a"),
        Event::string("x"),
        Event::reference("a"),
        Event::End,
    ];
    assert_eq!(
        build_from_events(&TypeDescriptor::any(), &events).unwrap(),
        list(vec![Value::from("x"), Value::from("x")])
    );
}

#[test]
fn forward_reference_is_filled_when_the_marker_appears() {
    let events = [
        Event::List,
        Event::reference("a"),
        Event::marker("a"),
        Event::List,
        Event::int(1),
        Event::End,
        Event::End,
    ];
    let inner = list(vec![Value::Int(1)]);
    assert_eq!(
        build_from_events(&TypeDescriptor::any(), &events).unwrap(),
        list(vec![inner.clone(), inner])
    );
}

#[test]
fn unresolved_references_are_listed_sorted() {
    let events = [
        Event::List,
        Event::reference("b"),
        Event::reference("a"),
        Event::reference("b"),
        Event::End,
    ];
    let err = build_from_events(&TypeDescriptor::any(), &events).unwrap_err();
    match err {
        Error::UnresolvedReferences { ids } => assert_eq!(ids, vec!["a", "b"]),
        other => panic!("unexpected error {other:?}"),
    }
}

#[test]
fn duplicate_marker_is_rejected() {
    let events = [
        Event::List,
        Event::marker("a"),
        Event::int(1),
        Event::marker("a"),
        Event::int(2),
        Event::End,
    ];
    let err = build_from_events(&TypeDescriptor::any(), &events).unwrap_err();
    assert!(matches!(err.without_path(), Error::DuplicateMarker { id } if id == "a"));
}

#[test]
fn reference_to_an_enclosing_container_is_recursive() {
    let events = [
        Event::marker("self"),
        Event::List,
        Event::int(1),
        Event::reference("self"),
        Event::End,
    ];
    assert_eq!(
        build_from_events(&TypeDescriptor::any(), &events).unwrap(),
        list(vec![Value::Int(1), Value::Recursive("self".into())])
    );
}

fn pair(first: TypeDescriptor, second: TypeDescriptor) -> TypeDescriptor {
    TypeDescriptor::record_with_fields(
        "Pair",
        vec![
            FieldDescriptor::new("first", first),
            FieldDescriptor::new("second", second),
        ],
    )
    .unwrap()
}

#[test]
fn referenced_value_must_fit_the_slot() {
    let ty = pair(TypeDescriptor::string(), TypeDescriptor::int(IntWidth::I32));
    let events = [
        Event::Map,
        Event::string("first"),
        Event::marker("a"),
        Event::string("text"),
        Event::string("second"),
        Event::reference("a"),
        Event::End,
    ];
    let err = build_from_events(&ty, &events).unwrap_err();
    match err.without_path() {
        Error::ReferenceMismatch { id, target, found } => {
            assert_eq!(id, "a");
            assert_eq!(target, "i32");
            assert_eq!(*found, "string");
        }
        other => panic!("unexpected error {other:?}"),
    }
    assert_eq!(err.path().unwrap().to_string(), "$.second");
}

#[test]
fn present_optional_payload_must_fit_the_slot_too() {
    let ty = pair(
        TypeDescriptor::optional(TypeDescriptor::string()),
        TypeDescriptor::optional(TypeDescriptor::int(IntWidth::I32)),
    );
    let events = [
        Event::Map,
        Event::string("first"),
        Event::marker("a"),
        Event::string("hi"),
        Event::string("second"),
        Event::reference("a"),
        Event::End,
    ];
    let err = build_from_events(&ty, &events).unwrap_err();
    assert!(matches!(
        err.without_path(),
        Error::ReferenceMismatch { target, found: "string", .. } if target == "i32"
    ));
    assert_eq!(err.path().unwrap().to_string(), "$.second");
}

#[test]
fn present_optional_payload_is_converted() {
    let ty = pair(
        TypeDescriptor::optional(TypeDescriptor::int(IntWidth::I64)),
        TypeDescriptor::optional(TypeDescriptor::float(FloatWidth::F64)),
    );
    for events in [
        vec![
            Event::Map,
            Event::string("first"),
            Event::marker("n"),
            Event::int(3),
            Event::string("second"),
            Event::reference("n"),
            Event::End,
        ],
        vec![
            Event::Map,
            Event::string("second"),
            Event::reference("n"),
            Event::string("first"),
            Event::marker("n"),
            Event::int(3),
            Event::End,
        ],
    ] {
        let v = build_from_events(&ty, &events).unwrap();
        let record = v.as_record().unwrap();
        assert_eq!(
            record.get("first"),
            Some(&Value::Optional(Some(Box::new(Value::Int(3)))))
        );
        assert_eq!(
            record.get("second"),
            Some(&Value::Optional(Some(Box::new(Value::Float(3.0)))))
        );
    }
}

#[test]
fn referenced_numbers_are_converted() {
    let ty = pair(TypeDescriptor::int(IntWidth::I64), TypeDescriptor::uint(UintWidth::U8));
    let events = [
        Event::Map,
        Event::string("first"),
        Event::marker("n"),
        Event::int(5),
        Event::string("second"),
        Event::reference("n"),
        Event::End,
    ];
    let v = build_from_events(&ty, &events).unwrap();
    let record = v.as_record().unwrap();
    assert_eq!(record.get("first"), Some(&Value::Int(5)));
    assert_eq!(record.get("second"), Some(&Value::Uint(5)));

    let events = [
        Event::Map,
        Event::string("first"),
        Event::marker("n"),
        Event::int(-5),
        Event::string("second"),
        Event::reference("n"),
        Event::End,
    ];
    let err = build_from_events(&ty, &events).unwrap_err();
    assert!(matches!(err.without_path(), Error::Conversion(_)));
}

#[test]
fn forward_reference_into_a_typed_field() {
    let ty = pair(TypeDescriptor::int(IntWidth::I32), TypeDescriptor::int(IntWidth::I32));
    let events = [
        Event::Map,
        Event::string("first"),
        Event::reference("x"),
        Event::string("second"),
        Event::marker("x"),
        Event::int(9),
        Event::End,
    ];
    let v = build_from_events(&ty, &events).unwrap();
    let record = v.as_record().unwrap();
    assert_eq!(record.get("first"), Some(&Value::Int(9)));
    assert_eq!(record.get("second"), Some(&Value::Int(9)));
}

#[test]
fn optional_layers_are_added_and_removed() {
    let ty = pair(
        TypeDescriptor::optional(TypeDescriptor::int(IntWidth::I32)),
        TypeDescriptor::int(IntWidth::I32),
    );
    let events = [
        Event::Map,
        Event::string("first"),
        Event::marker("o"),
        Event::int(4),
        Event::string("second"),
        Event::reference("o"),
        Event::End,
    ];
    let v = build_from_events(&ty, &events).unwrap();
    let record = v.as_record().unwrap();
    assert_eq!(
        record.get("first"),
        Some(&Value::Optional(Some(Box::new(Value::Int(4)))))
    );
    assert_eq!(record.get("second"), Some(&Value::Int(4)));

    let ty = TypeDescriptor::list(TypeDescriptor::optional(TypeDescriptor::string()));
    let events = [
        Event::List,
        Event::reference("s"),
        Event::marker("s"),
        Event::string("v"),
        Event::End,
    ];
    let some = Value::Optional(Some(Box::new(Value::from("v"))));
    assert_eq!(build_from_events(&ty, &events).unwrap(), list(vec![some.clone(), some]));
}

#[test]
fn copies_of_unfinished_values_are_completed_too() {
    let events = [
        Event::List,
        Event::marker("a"),
        Event::List,
        Event::reference("b"),
        Event::End,
        Event::reference("a"),
        Event::marker("b"),
        Event::string("z"),
        Event::End,
    ];
    let z = Value::from("z");
    assert_eq!(
        build_from_events(&TypeDescriptor::any(), &events).unwrap(),
        list(vec![list(vec![z.clone()]), list(vec![z.clone()]), z])
    );
}

#[test]
fn markers_inside_skipped_fields_stay_usable() {
    let ty = TypeDescriptor::record_with_fields(
        "Holder",
        vec![FieldDescriptor::new("items", TypeDescriptor::any())],
    )
    .unwrap();

    let events = [
        Event::Map,
        Event::string("junk"),
        Event::marker("a"),
        Event::List,
        Event::int(1),
        Event::End,
        Event::string("items"),
        Event::reference("a"),
        Event::End,
    ];
    let v = build_from_events(&ty, &events).unwrap();
    assert_eq!(
        v.as_record().unwrap().get("items"),
        Some(&list(vec![Value::Int(1)]))
    );

    let events = [
        Event::Map,
        Event::string("items"),
        Event::reference("later"),
        Event::string("junk"),
        Event::marker("later"),
        Event::int(3),
        Event::End,
    ];
    let v = build_from_events(&ty, &events).unwrap();
    assert_eq!(v.as_record().unwrap().get("items"), Some(&Value::Int(3)));
}

#[test]
fn forward_reference_cannot_name_a_field() {
    let ty = pair(TypeDescriptor::bool(), TypeDescriptor::bool());
    let events = [Event::Map, Event::reference("name"), Event::Bool(true), Event::End];
    let err = build_from_events(&ty, &events).unwrap_err();
    assert!(matches!(err.without_path(), Error::Structure { .. }));
}

#[test]
fn marker_needs_a_value() {
    let events = [Event::List, Event::marker("a"), Event::End];
    assert!(build_from_events(&TypeDescriptor::any(), &events).is_err());

    let events = [Event::List, Event::marker("a"), Event::marker("b"), Event::Null, Event::End];
    assert!(build_from_events(&TypeDescriptor::any(), &events).is_err());
}

#[test]
fn reference_inside_an_overwritten_map_value_stays_pending() {
    let events = [
        Event::List,
        Event::Map,
        Event::string("k"),
        Event::List,
        Event::reference("z"),
        Event::End,
        Event::string("k"),
        Event::int(1),
        Event::End,
        Event::marker("z"),
        Event::int(5),
        Event::End,
    ];
    assert_eq!(
        build_from_events(&TypeDescriptor::any(), &events).unwrap(),
        list(vec![map(vec![("k", Value::Int(1))]), Value::Int(5)])
    );

    // The dropped reference still has to be resolved somewhere in the document.
    let mut unmarked = events[..9].to_vec();
    unmarked.push(Event::End);
    let err = build_from_events(&TypeDescriptor::any(), &unmarked).unwrap_err();
    assert!(matches!(err, Error::UnresolvedReferences { ref ids } if ids == &["z"]));
}

#[test]
fn marker_inside_an_overwritten_map_value_keeps_its_value() {
    let events = [
        Event::List,
        Event::Map,
        Event::string("k"),
        Event::marker("m"),
        Event::int(7),
        Event::string("k"),
        Event::int(1),
        Event::End,
        Event::reference("m"),
        Event::End,
    ];
    assert_eq!(
        build_from_events(&TypeDescriptor::any(), &events).unwrap(),
        list(vec![map(vec![("k", Value::Int(1))]), Value::Int(7)])
    );
}

#[test]
fn forward_reference_as_map_key_merges_with_an_equal_key() {
    let ty = TypeDescriptor::list(TypeDescriptor::map(
        TypeDescriptor::string(),
        TypeDescriptor::int(IntWidth::I32),
    ));
    let events = [
        Event::List,
        Event::Map,
        Event::reference("x"),
        Event::int(1),
        Event::string("k"),
        Event::int(2),
        Event::End,
        Event::Map,
        Event::marker("x"),
        Event::string("k"),
        Event::int(3),
        Event::End,
        Event::End,
    ];
    assert_eq!(
        build_from_events(&ty, &events).unwrap(),
        list(vec![
            map(vec![("k", Value::Int(2))]),
            map(vec![("k", Value::Int(3))]),
        ])
    );
}

#[test]
fn backward_reference_as_map_key_merges_with_an_equal_key() {
    let ty = TypeDescriptor::list(TypeDescriptor::map(
        TypeDescriptor::string(),
        TypeDescriptor::int(IntWidth::I32),
    ));
    let events = [
        Event::List,
        Event::Map,
        Event::marker("x"),
        Event::string("k"),
        Event::int(3),
        Event::End,
        Event::Map,
        Event::string("k"),
        Event::int(1),
        Event::reference("x"),
        Event::int(2),
        Event::End,
        Event::End,
    ];
    assert_eq!(
        build_from_events(&ty, &events).unwrap(),
        list(vec![
            map(vec![("k", Value::Int(3))]),
            map(vec![("k", Value::Int(2))]),
        ])
    );
}

#[test]
fn key_resolved_inside_its_own_open_map_is_merged() {
    // `x` is marked on a later key of the same map while that key still waits for its value.
    let events = [
        Event::Map,
        Event::reference("x"),
        Event::int(1),
        Event::string("k"),
        Event::int(2),
        Event::marker("x"),
        Event::string("k"),
        Event::int(3),
        Event::End,
    ];
    assert_eq!(
        build_from_events(&TypeDescriptor::any(), &events).unwrap(),
        map(vec![("k", Value::Int(3))])
    );

    // Here the key is resolved inside the value of the key it repeats.
    let events = [
        Event::Map,
        Event::reference("x"),
        Event::int(1),
        Event::string("k"),
        Event::List,
        Event::marker("x"),
        Event::string("k"),
        Event::End,
        Event::End,
    ];
    assert_eq!(
        build_from_events(&TypeDescriptor::any(), &events).unwrap(),
        map(vec![("k", list(vec![Value::from("k")]))])
    );
}

#[test]
fn many_markers_followed_by_many_containers() {
    let mut events = vec![Event::List];
    for i in 0..20_000 {
        events.push(Event::marker(&format!("m{i}")));
        events.push(Event::int(i));
    }
    for _ in 0..20_000 {
        events.push(Event::List);
        events.push(Event::End);
    }
    events.push(Event::reference("m19999"));
    events.push(Event::End);

    let value = build_from_events(&TypeDescriptor::any(), &events).unwrap();
    let items = value.as_list().unwrap();
    assert_eq!(items.len(), 40_001);
    assert_eq!(items[20_000], list(Vec::new()));
    assert_eq!(items[40_000], Value::Int(19_999));
}
