use std::sync::Arc;
use std::thread;

use concise_builder::{
    replay, Builder, BuilderOptions, CustomHooks, Event, FieldDescriptor, IntWidth, Session,
    TypeDescriptor, Value,
};

fn point() -> TypeDescriptor {
    TypeDescriptor::record_with_fields(
        "Point",
        vec![
            FieldDescriptor::new("x", TypeDescriptor::int(IntWidth::I64)),
            FieldDescriptor::new("y", TypeDescriptor::int(IntWidth::I64)),
        ],
    )
    .unwrap()
}

fn point_events(x: i64, y: i64) -> Vec<Event> {
    vec![
        Event::Map,
        Event::string("x"),
        Event::int(x),
        Event::string("y"),
        Event::int(y),
        Event::End,
    ]
}

#[test]
fn concurrent_builds_share_one_session() {
    let session = Session::new();
    let point = point();
    let ty = TypeDescriptor::list(point.clone());

    let handles: Vec<_> = (0..8i64)
        .map(|n| {
            let session = session.clone();
            let ty = ty.clone();
            thread::spawn(move || {
                let mut events = vec![Event::List];
                for i in 0..50 {
                    events.extend(point_events(n, i));
                }
                events.push(Event::End);
                let mut ctx = session.new_build(&ty, BuilderOptions::default());
                replay(&events, &mut ctx).unwrap();
                ctx.into_built_object().unwrap()
            })
        })
        .collect();

    for (n, handle) in handles.into_iter().enumerate() {
        let value = handle.join().unwrap();
        let points = value.as_list().unwrap();
        assert_eq!(points.len(), 50);
        let last = points[49].as_record().unwrap();
        assert_eq!(last.get("x"), Some(&Value::Int(n as i64)));
        assert_eq!(last.get("y"), Some(&Value::Int(49)));
    }
    assert!(session.contains(&ty));
    // Records compare by identity, so only this descriptor is cached.
    assert!(session.contains(&point));
    assert!(!session.contains(&self::point()));
}

#[test]
fn registered_generator_replaces_the_default_builder() {
    let session = Session::empty();
    let shout = TypeDescriptor::custom("shout");
    let hooks = CustomHooks::new().with_text(|text, _| {
        Ok(Value::String(std::str::from_utf8(text)?.to_uppercase()))
    });
    session.register_generator_for_type(&shout, {
        let shout = shout.clone();
        move || Builder::custom(&shout, hooks.clone())
    });

    let ty = TypeDescriptor::list(shout.clone());
    let events = [
        Event::List,
        Event::Array {
            kind: concise_builder::ArrayKind::CustomText,
            element_count: 2,
            data: b"hi".to_vec(),
        },
        Event::End,
    ];
    let mut ctx = session.new_build(&ty, BuilderOptions::default());
    replay(&events, &mut ctx).unwrap();
    assert_eq!(
        ctx.into_built_object().unwrap(),
        Value::List(vec![Value::from("HI")])
    );

    // A session that never saw the registration falls back to the options.
    let mut ctx = Session::empty().new_build(&ty, BuilderOptions::default());
    assert!(replay(&events, &mut ctx).is_err());
}

#[test]
fn generator_runs_per_lookup() {
    let session = Session::empty();
    let ty = TypeDescriptor::custom("counted");
    let calls = Arc::new(std::sync::atomic::AtomicUsize::new(0));
    session.register_generator_for_type(&ty, {
        let ty = ty.clone();
        let calls = Arc::clone(&calls);
        move || {
            calls.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            Builder::for_type(&ty)
        }
    });
    let builder = session.builder_for_type(&ty);
    assert_eq!(builder.target(), &ty);
    session.builder_for_type(&ty);
    assert_eq!(calls.load(std::sync::atomic::Ordering::SeqCst), 2);
}

#[test]
fn build_context_reports_progress() {
    let session = Session::new();
    let mut ctx = session.new_build(&TypeDescriptor::any(), BuilderOptions::default());
    replay(&[Event::List, Event::marker("m"), Event::List], &mut ctx).unwrap();
    assert_eq!(ctx.depth(), 2);
    assert!(ctx.markers().is_open("m"));
    replay(&[Event::End], &mut ctx).unwrap();
    assert!(ctx.markers().is_bound("m"));
    replay(&[Event::reference("later"), Event::End], &mut ctx).unwrap();
    assert_eq!(ctx.markers().pending_count(), 1);
    assert!(ctx.get_built_object().is_err());
}
