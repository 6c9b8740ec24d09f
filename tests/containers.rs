use concise_builder::{
    build_from_events, ArrayKind, Error, Event, IntWidth, Map, TypeDescriptor, UintWidth, Value,
};

fn u16_list() -> TypeDescriptor {
    TypeDescriptor::list(TypeDescriptor::uint(UintWidth::U16))
}

#[test]
fn list_of_scalars() {
    let events = [Event::List, Event::PositiveInt(1), Event::PositiveInt(2), Event::End];
    assert_eq!(
        build_from_events(&u16_list(), &events).unwrap(),
        Value::List(vec![Value::Uint(1), Value::Uint(2)])
    );
}

#[test]
fn typed_array_into_list() {
    let data: Vec<u8> = [10u16, 20, 30].iter().flat_map(|v| v.to_le_bytes()).collect();
    let events = [Event::Array {
        kind: ArrayKind::Uint16,
        element_count: 3,
        data,
    }];
    assert_eq!(
        build_from_events(&u16_list(), &events).unwrap(),
        Value::List(vec![Value::Uint(10), Value::Uint(20), Value::Uint(30)])
    );
}

#[test]
fn typed_array_elements_are_converted() {
    let ty = TypeDescriptor::list(TypeDescriptor::int(IntWidth::I8));
    let data: Vec<u8> = [1i32, 200].iter().flat_map(|v| v.to_le_bytes()).collect();
    let events = [Event::Array {
        kind: ArrayKind::Int32,
        element_count: 2,
        data,
    }];
    assert!(matches!(
        build_from_events(&ty, &events).unwrap_err(),
        Error::Conversion(_)
    ));
}

#[test]
fn fixed_array_keeps_zero_tail() {
    let ty = TypeDescriptor::array(TypeDescriptor::int(IntWidth::I32), 3);
    let events = [Event::List, Event::int(-1), Event::End];
    assert_eq!(
        build_from_events(&ty, &events).unwrap(),
        Value::List(vec![Value::Int(-1), Value::Int(0), Value::Int(0)])
    );
}

#[test]
fn fixed_array_overflow_is_terminal() {
    let ty = TypeDescriptor::array(TypeDescriptor::int(IntWidth::I32), 2);
    let events = [
        Event::List,
        Event::int(1),
        Event::int(2),
        Event::int(3),
        Event::End,
    ];
    let err = build_from_events(&ty, &events).unwrap_err();
    assert!(matches!(err.without_path(), Error::ArrayLength { len: 2, .. }));
}

#[test]
fn map_with_typed_keys_and_values() {
    let ty = TypeDescriptor::map(TypeDescriptor::string(), TypeDescriptor::int(IntWidth::I64));
    let events = [
        Event::Map,
        Event::string("a"),
        Event::int(1),
        Event::string("b"),
        Event::int(-2),
        Event::End,
    ];
    let v = build_from_events(&ty, &events).unwrap();
    let map = v.as_map().unwrap();
    assert_eq!(map.len(), 2);
    assert_eq!(map.get_str("b"), Some(&Value::Int(-2)));
    assert_eq!(map.keys().next(), Some(&Value::from("a")));
}

#[test]
fn duplicate_key_last_value_wins() {
    let ty = TypeDescriptor::map(TypeDescriptor::string(), TypeDescriptor::any());
    let events = [
        Event::Map,
        Event::string("k"),
        Event::int(1),
        Event::string("other"),
        Event::Bool(true),
        Event::string("k"),
        Event::int(2),
        Event::End,
    ];
    let v = build_from_events(&ty, &events).unwrap();
    let expected: Map = [
        (Value::from("k"), Value::Int(2)),
        (Value::from("other"), Value::Bool(true)),
    ]
    .into_iter()
    .collect();
    assert_eq!(v, Value::Map(expected));
}

#[test]
fn map_key_type_is_enforced() {
    let ty = TypeDescriptor::map(TypeDescriptor::int(IntWidth::I32), TypeDescriptor::bool());
    let events = [Event::Map, Event::string("x"), Event::Bool(true), Event::End];
    let err = build_from_events(&ty, &events).unwrap_err();
    assert!(matches!(err.without_path(), Error::InvalidEvent { .. }));
}

#[test]
fn map_value_error_reports_key() {
    let ty = TypeDescriptor::map(TypeDescriptor::string(), u16_list());
    let events = [
        Event::Map,
        Event::string("ports"),
        Event::List,
        Event::PositiveInt(80),
        Event::int(-1),
    ];
    let err = build_from_events(&ty, &events).unwrap_err();
    assert_eq!(err.path().unwrap().to_string(), "$.ports[1]");
}

#[test]
fn nested_lists_of_optionals() {
    let ty = TypeDescriptor::list(TypeDescriptor::optional(u16_list()));
    let events = [
        Event::List,
        Event::List,
        Event::PositiveInt(5),
        Event::End,
        Event::Null,
        Event::End,
    ];
    assert_eq!(
        build_from_events(&ty, &events).unwrap(),
        Value::List(vec![
            Value::Optional(Some(Box::new(Value::List(vec![Value::Uint(5)])))),
            Value::Optional(None),
        ])
    );
}

#[test]
fn unbalanced_end_is_rejected() {
    let err = build_from_events(&TypeDescriptor::any(), &[Event::End]).unwrap_err();
    assert!(matches!(err, Error::Structure { .. }));

    let err = build_from_events(&TypeDescriptor::any(), &[Event::List]).unwrap_err();
    assert!(err.to_string().contains("still open"));
}

#[test]
fn map_cannot_end_on_a_key() {
    let events = [Event::Map, Event::string("dangling"), Event::End];
    let err = build_from_events(&TypeDescriptor::any(), &events).unwrap_err();
    assert!(matches!(err.without_path(), Error::Structure { .. }));
}
