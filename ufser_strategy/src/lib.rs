use proptest::{prelude::*, strategy::Union};
use ufser::{any::Any, encoding::encode_full, error_value::ErrorValue};

/// arbitrary ErrorValue for use with proptest
pub fn arb_error() -> impl Strategy<Value = ErrorValue> {
    ("[a-z_]{1,12}", ".{0,20}", prop::option::of(any::<i32>())).prop_map(|(kind, msg, v)| {
        let e = ErrorValue::new(kind, msg);
        match v {
            Some(v) => e.with_value(Any::new(&v)),
            None => e,
        }
    })
}

fn arb_scalar() -> impl Strategy<Value = Any> {
    prop_oneof![
        any::<bool>().prop_map(|b| Any::new(&b)),
        any::<u8>().prop_map(|c| Any::new(&c)),
        any::<i32>().prop_map(|i| Any::new(&i)),
        any::<i64>().prop_map(|i| Any::new(&i)),
        any::<f64>().prop_map(|d| Any::new(&d)),
        ".{0,16}".prop_map(|s| Any::new(&s)),
        arb_error().prop_map(|e| Any::new(&e)),
    ]
}

/// arbitrary non-void Any holding a primitive, for use with proptest
pub fn arb_leaf() -> impl Strategy<Value = Any> {
    prop_oneof![arb_scalar(), Just(Any::new(&Ok::<(), ErrorValue>(())))]
}

fn concat(tys: &[&str], values: &[&[u8]]) -> (String, Vec<u8>) {
    (tys.concat(), values.concat())
}

fn arb_tree(leaf: BoxedStrategy<Any>, with_optionals: bool) -> impl Strategy<Value = Any> {
    leaf.prop_recursive(
        4,  // max depth
        32, // max nodes
        6,  // max items per collection
        move |inner| {
            let mut arms = vec![
                // tuples
                prop::collection::vec(inner.clone(), 2..5)
                    .prop_map(|members| {
                        let tys: Vec<&str> = members.iter().map(Any::typestring).collect();
                        let values: Vec<&[u8]> = members.iter().map(Any::value).collect();
                        let (ty, v) = concat(&tys, &values);
                        Any::from_type_value_unchecked(&format!("t{}{}", members.len(), ty), &v)
                    })
                    .boxed(),
                // lists of one repeated item
                (inner.clone(), 0..4u32)
                    .prop_map(|(item, n)| {
                        let mut v = n.to_be_bytes().to_vec();
                        for _ in 0..n {
                            v.extend_from_slice(item.value());
                        }
                        Any::from_type_value_unchecked(&format!("l{}", item.typestring()), &v)
                    })
                    .boxed(),
                // maps from strings
                (prop::collection::btree_set("[a-z]{0,4}", 0..4), inner.clone())
                    .prop_map(|(keys, mapped)| {
                        let mut v = (keys.len() as u32).to_be_bytes().to_vec();
                        for k in &keys {
                            v.extend_from_slice(&encode_full(k));
                            v.extend_from_slice(mapped.value());
                        }
                        Any::from_type_value_unchecked(&format!("ms{}", mapped.typestring()), &v)
                    })
                    .boxed(),
                // expecteds
                (inner.clone(), prop::option::of(arb_error()))
                    .prop_map(|(a, err)| {
                        let ty = format!("x{}", a.typestring());
                        match err {
                            None => Any::from_type_value_unchecked(&ty, &[&[1u8][..], a.value()].concat()),
                            Some(e) => Any::from_type_value_unchecked(
                                &ty,
                                &[&[0u8][..], &encode_full(&e)[..]].concat(),
                            ),
                        }
                    })
                    .boxed(),
                // nested anys
                inner.clone().prop_map(|a| a.wrap()).boxed(),
            ];
            if with_optionals {
                arms.push(
                    (inner, any::<bool>())
                        .prop_map(|(a, present)| {
                            let ty = format!("o{}", a.typestring());
                            if present {
                                Any::from_type_value_unchecked(&ty, &[&[1u8][..], a.value()].concat())
                            } else {
                                Any::from_type_value_unchecked(&ty, &[0])
                            }
                        })
                        .boxed(),
                );
            }
            Union::new(arms)
        },
    )
}

/// arbitrary typed value for use with proptest
///
/// Every generated `Any` is well formed: its payload matches its typestring.
pub fn arb_any() -> impl Strategy<Value = Any> { arb_tree(arb_leaf().boxed(), true) }

/// arbitrary typed value whose text form parses back, for use with proptest
///
/// Leaves out optionals and `X`, which may print as nothing.
pub fn arb_printable_any() -> impl Strategy<Value = Any> { arb_tree(arb_scalar().boxed(), false) }

/// arbitrary well-formed typestring for use with proptest
pub fn arb_typestring() -> impl Strategy<Value = String> {
    arb_any().prop_map(|a| a.typestring().to_string())
}
