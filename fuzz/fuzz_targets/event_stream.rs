#![no_main]

use concise_builder::{
    ArrayKind, BuilderOptions, DataEventReceiver, FieldDescriptor, IntWidth, Session,
    TypeDescriptor, UintWidth,
};
use libfuzzer_sys::fuzz_target;

const KINDS: [ArrayKind; 6] = [
    ArrayKind::String,
    ArrayKind::Uint8,
    ArrayKind::Bit,
    ArrayKind::Int32,
    ArrayKind::Float16,
    ArrayKind::CustomBinary,
];

fn targets() -> Vec<TypeDescriptor> {
    let node = TypeDescriptor::record("Node");
    node.define_fields(vec![
        FieldDescriptor::new("id", TypeDescriptor::uint(UintWidth::U32)),
        FieldDescriptor::new("tags", TypeDescriptor::list(TypeDescriptor::string())),
        FieldDescriptor::new("next", TypeDescriptor::optional(node.clone())),
    ])
    .ok();
    vec![
        TypeDescriptor::any(),
        node,
        TypeDescriptor::map(TypeDescriptor::string(), TypeDescriptor::int(IntWidth::I16)),
        TypeDescriptor::array(TypeDescriptor::optional(TypeDescriptor::bool()), 3),
    ]
}

// Each input byte selects one data event; following bytes supply its operands. The build
// must fail cleanly or succeed, never panic, whatever order the events come in.
fuzz_target!(|data: &[u8]| {
    if data.len() > 4096 || data.is_empty() {
        return;
    }
    let targets = targets();
    let ty = &targets[data[0] as usize % targets.len()];
    let options = concise_builder::options! {
        budget: Some(concise_builder::budget! { max_depth: 64, max_array_bytes: 1024 }),
    };
    let mut ctx = Session::new().new_build(ty, options);
    let mut bytes = data[1..].iter().copied();
    let ids = ["a", "b", "c"];
    while let Some(op) = bytes.next() {
        let arg = bytes.next().unwrap_or(0);
        let result = match op % 20 {
            0 => ctx.on_null(),
            1 => ctx.on_bool(arg & 1 == 1),
            2 => ctx.on_positive_int(u64::from(arg) << (arg % 57)),
            3 => ctx.on_negative_int(u64::from(arg)),
            4 => ctx.on_float(f64::from(arg) / 7.0),
            5 => ctx.on_big_int(num_bigint::BigInt::from(arg) << 70),
            6 => ctx.on_nan(arg & 1 == 1),
            7 => ctx.on_array(ArrayKind::String, 1, &[arg]),
            8 => {
                let len = usize::from(arg % 8);
                ctx.on_array(ArrayKind::Uint8, len as u64, &vec![arg; len])
            }
            9 => ctx.on_array_begin(KINDS[usize::from(arg) % KINDS.len()]),
            10 => ctx.on_array_chunk(u64::from(arg % 9), arg & 0x80 != 0),
            11 => ctx.on_array_data(&[arg, arg]),
            12 => ctx.on_list(),
            13 => ctx.on_map(),
            14 => ctx.on_markup("m"),
            15 => ctx.on_edge(),
            16 => ctx.on_node(),
            17 => ctx.on_end(),
            18 => ctx.on_marker(ids[usize::from(arg) % ids.len()]),
            _ => ctx.on_reference(ids[usize::from(arg) % ids.len()]),
        };
        if result.is_err() {
            // A failed build stays failed.
            assert!(ctx.on_null().is_err());
            return;
        }
    }
    let _ = ctx.into_built_object();
});
