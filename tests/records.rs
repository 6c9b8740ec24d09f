use concise_builder::{
    build_from_events, build_from_events_with_options, Error, Event, FieldDescriptor, IntWidth,
    Record, RecordField, TypeDescriptor, UintWidth, Value,
};

fn person() -> TypeDescriptor {
    TypeDescriptor::record_with_fields(
        "Person",
        vec![
            FieldDescriptor::new("name", TypeDescriptor::string()),
            FieldDescriptor::new("age", TypeDescriptor::uint(UintWidth::U8)),
            FieldDescriptor::new("tags", TypeDescriptor::list(TypeDescriptor::string())),
        ],
    )
    .unwrap()
}

fn field(name: &str, value: Value) -> RecordField {
    RecordField {
        name: name.into(),
        value,
        embedded: false,
    }
}

#[test]
fn fields_by_name_in_any_order() {
    let events = [
        Event::Map,
        Event::string("age"),
        Event::PositiveInt(30),
        Event::string("name"),
        Event::string("Ann"),
        Event::End,
    ];
    let v = build_from_events(&person(), &events).unwrap();
    assert_eq!(
        v,
        Value::Record(Record {
            type_name: "Person".into(),
            fields: vec![
                field("name", Value::from("Ann")),
                field("age", Value::Uint(30)),
                field("tags", Value::List(Vec::new())),
            ],
        })
    );
}

#[test]
fn unknown_fields_are_skipped_with_their_contents() {
    let events = [
        Event::Map,
        Event::string("extra"),
        Event::List,
        Event::int(1),
        Event::Map,
        Event::string("name"),
        Event::Bool(true),
        Event::End,
        Event::End,
        Event::string("name"),
        Event::string("Bob"),
        Event::End,
    ];
    let v = build_from_events(&person(), &events).unwrap();
    let record = v.as_record().unwrap();
    assert_eq!(record.get("name"), Some(&Value::from("Bob")));
    assert_eq!(record.fields.len(), 3);
}

#[test]
fn unknown_fields_can_be_rejected() {
    let options = concise_builder::options! { reject_unknown_fields: true };
    let events = [Event::Map, Event::string("extra"), Event::Null, Event::End];
    let err = build_from_events_with_options(&person(), &events, options).unwrap_err();
    match err.without_path() {
        Error::UnknownField { field, target } => {
            assert_eq!(field, "extra");
            assert_eq!(target, "record Person");
        }
        other => panic!("unexpected error {other:?}"),
    }
}

#[test]
fn case_insensitive_names_are_opt_in() {
    let events = [Event::Map, Event::string("NAME"), Event::string("Cy"), Event::End];

    let v = build_from_events(&person(), &events).unwrap();
    assert_eq!(v.as_record().unwrap().get("name"), Some(&Value::from("")));

    let options = concise_builder::options! { case_insensitive_struct_field_names: true };
    let v = build_from_events_with_options(&person(), &events, options).unwrap();
    assert_eq!(v.as_record().unwrap().get("name"), Some(&Value::from("Cy")));
}

#[test]
fn field_errors_name_the_field() {
    let events = [
        Event::Map,
        Event::string("age"),
        Event::PositiveInt(300),
        Event::End,
    ];
    let err = build_from_events(&person(), &events).unwrap_err();
    assert_eq!(err.path().unwrap().to_string(), "$.age");
}

#[test]
fn embedded_record_fields_are_addressed_by_their_own_names() {
    let base = TypeDescriptor::record_with_fields(
        "Base",
        vec![
            FieldDescriptor::new("id", TypeDescriptor::uint(UintWidth::U64)),
            FieldDescriptor::new("kind", TypeDescriptor::string()),
        ],
    )
    .unwrap();
    let derived = TypeDescriptor::record_with_fields(
        "Derived",
        vec![
            FieldDescriptor::embedded("base", base),
            FieldDescriptor::new("kind", TypeDescriptor::int(IntWidth::I32)),
        ],
    )
    .unwrap();
    let events = [
        Event::Map,
        Event::string("id"),
        Event::PositiveInt(7),
        Event::string("kind"),
        Event::int(-3),
        Event::End,
    ];
    let v = build_from_events(&derived, &events).unwrap();
    let record = v.as_record().unwrap();
    assert_eq!(record.get("id"), Some(&Value::Uint(7)));
    // The outer `kind` shadows the embedded one.
    assert_eq!(record.get("kind"), Some(&Value::Int(-3)));
    let Value::Record(inner) = &record.fields[0].value else {
        panic!("embedded field is not a record");
    };
    assert_eq!(inner.get("kind"), Some(&Value::from("")));

    // The embedded record itself is a field too.
    let events = [
        Event::Map,
        Event::string("base"),
        Event::Map,
        Event::string("id"),
        Event::PositiveInt(9),
        Event::string("kind"),
        Event::string("leaf"),
        Event::End,
        Event::string("kind"),
        Event::int(4),
        Event::End,
    ];
    let v = build_from_events(&derived, &events).unwrap();
    let record = v.as_record().unwrap();
    assert_eq!(record.get("id"), Some(&Value::Uint(9)));
    assert_eq!(record.get("kind"), Some(&Value::Int(4)));
    let Value::Record(inner) = &record.fields[0].value else {
        panic!("embedded field is not a record");
    };
    assert_eq!(inner.get("kind"), Some(&Value::from("leaf")));
}

#[test]
fn self_referential_record_through_optional() {
    let tree = TypeDescriptor::record("Tree");
    tree.define_fields(vec![
        FieldDescriptor::new("value", TypeDescriptor::int(IntWidth::I32)),
        FieldDescriptor::new("next", TypeDescriptor::optional(tree.clone())),
    ])
    .unwrap();

    let events = [
        Event::Map,
        Event::string("value"),
        Event::int(1),
        Event::string("next"),
        Event::Map,
        Event::string("value"),
        Event::int(2),
        Event::End,
        Event::End,
    ];
    let v = build_from_events(&tree, &events).unwrap();
    let leaf = Value::Record(Record {
        type_name: "Tree".into(),
        fields: vec![
            field("value", Value::Int(2)),
            field("next", Value::Optional(None)),
        ],
    });
    assert_eq!(
        v,
        Value::Record(Record {
            type_name: "Tree".into(),
            fields: vec![
                field("value", Value::Int(1)),
                field("next", Value::Optional(Some(Box::new(leaf)))),
            ],
        })
    );
}

#[test]
fn field_names_must_be_strings() {
    let events = [Event::Map, Event::int(1), Event::Null, Event::End];
    assert!(build_from_events(&person(), &events).is_err());
}

#[test]
fn record_cannot_end_before_field_value() {
    let events = [Event::Map, Event::string("name"), Event::End];
    let err = build_from_events(&person(), &events).unwrap_err();
    assert!(matches!(err.without_path(), Error::Structure { .. }));
}

#[test]
fn record_only_accepts_maps() {
    let err = build_from_events(&person(), &[Event::List, Event::End]).unwrap_err();
    assert_eq!(
        err.to_string(),
        "record builder for record Person cannot accept a list"
    );
}

#[test]
fn redefining_fields_fails() {
    let ty = person();
    assert!(matches!(
        ty.define_fields(Vec::new()),
        Err(Error::InvalidDescriptor { .. })
    ));
    assert!(TypeDescriptor::record_with_fields(
        "Twice",
        vec![
            FieldDescriptor::new("a", TypeDescriptor::bool()),
            FieldDescriptor::new("a", TypeDescriptor::bool()),
        ],
    )
    .is_err());
}
