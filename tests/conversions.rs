use proptest::prelude::*;
use std::{borrow::Cow, collections::BTreeMap};
use ufser::prelude::*;
use ufser_strategy::*;

proptest! {
    #![proptest_config(ProptestConfig { cases: 500, ..ProptestConfig::default() })]

    #[test]
    fn identity_borrows(a in arb_any()) {
        let c = convert(a.typestring(), a.typestring(), SerPolicy::NONE, a.value()).unwrap();
        prop_assert!(matches!(c, Cow::Borrowed(_)));
        prop_assert!(cant_convert(a.typestring(), a.typestring(), SerPolicy::NONE, None).is_none());
    }

    #[test]
    fn into_and_out_of_any(a in arb_any()) {
        let wrapped = convert(a.typestring(), "a", SerPolicy::ANY, a.value()).unwrap();
        if a.typestring() == "a" {
            prop_assert_eq!(&*wrapped, a.value());
        } else {
            prop_assert_eq!(&*wrapped, &encode_full(&a)[..]);
            let back = convert("a", a.typestring(), SerPolicy::ANY, &wrapped).unwrap();
            prop_assert_eq!(&*back, a.value());
        }
    }

    #[test]
    fn defaults_are_well_formed(ty in arb_typestring()) {
        let v = default_value(&ty).unwrap();
        prop_assert!(scan(ty.as_bytes(), &v, false, true).is_ok());
        let a = Any::from_typestring(&ty).unwrap();
        prop_assert_eq!(a.value(), &v[..]);
    }

    #[test]
    fn widening_keeps_values(v in prop::collection::vec(any::<i32>(), 0..10)) {
        let a = Any::new(&v);
        let wide: Vec<i64> = a.get(SerPolicy::INTS).unwrap();
        prop_assert_eq!(wide.len(), v.len());
        for (w, n) in wide.iter().zip(&v) {
            prop_assert_eq!(*w, i64::from(*n));
        }
        let wide_bytes = encode_full(&wide);
        let back = convert("lI", "li", SerPolicy::INTS_NARROWING, &wide_bytes).unwrap();
        prop_assert_eq!(decode_full::<Vec<i32>>(&back).unwrap(), v);
    }

    #[test]
    fn tuples_become_lists(t in any::<(i32, i32, i32)>()) {
        let v = encode_full(&t);
        let l = convert("t3iii", "li", SerPolicy::TUPLE_LIST, &v).unwrap();
        prop_assert_eq!(decode_full::<Vec<i32>>(&l).unwrap(), vec![t.0, t.1, t.2]);
        let back = convert("li", "t3iii", SerPolicy::TUPLE_LIST, &l).unwrap();
        prop_assert_eq!(&*back, &v[..]);
    }
}

#[test]
fn policy_flags_gate_conversions() {
    let v = encode_full(&5i32);
    for (to, flag) in &[
        ("I", SerPolicy::INTS),
        ("c", SerPolicy::INTS_NARROWING),
        ("b", SerPolicy::BOOL),
        ("d", SerPolicy::DOUBLE),
        ("xi", SerPolicy::EXPECTED),
        ("a", SerPolicy::ANY),
    ] {
        assert!(convert("i", to, *flag, &v).is_ok(), "{}", to);
        let e = convert("i", to, SerPolicy::ALL - *flag, &v).unwrap_err();
        assert_eq!(e.kind(), ErrorKind::TypeMismatch, "{}", to);
        assert!(
            e.message().ends_with(&format!("(missing flag: {})", SerPolicy::flag_name(*flag))),
            "{}",
            e.message()
        );
    }
}

#[test]
fn structured_records() {
    let mut scores = BTreeMap::new();
    scores.insert("ann".to_string(), (1i32, Some(2.5f64)));
    scores.insert("bob".to_string(), (3i32, None));
    let a = Any::new(&scores);
    assert_eq!(a.typestring(), "mst2iod");

    let wide: BTreeMap<String, (i64, Option<f64>)> = a.get(SerPolicy::INTS).unwrap();
    assert_eq!(wide["ann"], (1, Some(2.5)));
    assert_eq!(wide["bob"], (3, None));

    let e = a.get::<BTreeMap<String, (i32, f64)>>(SerPolicy::ALL).unwrap_err();
    assert_eq!(e.kind(), ErrorKind::TypeMismatch);
    assert!(e.message().starts_with("Empty optional <"), "{}", e.message());
}

#[test]
fn expected_errors_surface() {
    let items: Vec<Expected<i32>> = vec![Ok(1), Err(ErrorValue::new("io", "disk gone")), Ok(3)];
    let a = Any::new(&items);
    assert_eq!(a.typestring(), "lxi");

    let conv = convert_collect("lxi", "li", SerPolicy::EXPECTED, a.value()).unwrap();
    assert_eq!(conv.errors, vec![ErrorValue::new("io", "disk gone")]);

    let e = a.get::<Vec<i32>>(SerPolicy::EXPECTED).unwrap_err();
    assert_eq!(e.kind(), ErrorKind::ExpectedWithError);
    assert_eq!(e.errors(), &[ErrorValue::new("io", "disk gone")][..]);

    let kept: Vec<Expected<i64>> = a.get(SerPolicy::INTS).unwrap();
    assert_eq!(kept[1].as_ref().unwrap_err().message(), "disk gone");
}

#[test]
fn any_contents() {
    let a = Any::new(&(1i32, "two".to_string(), vec![3u8, 4]));
    let parts = a.get_content(None).unwrap();
    assert_eq!(parts.len(), 3);
    assert_eq!(parts[1].typestring(), "s");
    assert_eq!(parts[1].get::<String>(SerPolicy::NONE).unwrap(), "two");
    assert_eq!(parts[2].get_content_size(), 2);
    assert_eq!(a.get_content(Some(1)).unwrap().len(), 1);
}

#[test]
fn each_flag_is_needed() {
    let int = encode_full(&5i32);
    let ok = encode_full(&Expected::<i32>::Ok(5));
    let any = encode_full(&Any::new(&5i32));
    let table: Vec<(&str, &str, Vec<u8>, SerPolicy)> = vec![
        ("c", "i", vec![7], SerPolicy::INTS),
        ("i", "I", int.clone(), SerPolicy::INTS),
        ("I", "i", encode_full(&5i64), SerPolicy::INTS_NARROWING),
        ("i", "c", int.clone(), SerPolicy::INTS_NARROWING),
        ("b", "i", vec![1], SerPolicy::BOOL),
        ("i", "b", int.clone(), SerPolicy::BOOL),
        ("i", "d", int.clone(), SerPolicy::DOUBLE),
        ("d", "I", encode_full(&2.0f64), SerPolicy::DOUBLE),
        ("i", "xi", int.clone(), SerPolicy::EXPECTED),
        ("xi", "i", ok, SerPolicy::EXPECTED),
        ("i", "a", int.clone(), SerPolicy::ANY),
        ("a", "i", any, SerPolicy::ANY),
        ("s", "lc", encode_full("hi"), SerPolicy::AUX),
        ("", "oi", vec![], SerPolicy::AUX),
        ("li", "t2ii", encode_full(&vec![1i32, 2]), SerPolicy::TUPLE_LIST),
    ];
    for (from, to, v, flag) in &table {
        assert!(convert(from, to, *flag, v).is_ok(), "<{}> to <{}>", from, to);
        assert!(cant_convert(from, to, *flag, None).is_none(), "<{}> to <{}>", from, to);
        let e = convert(from, to, SerPolicy::ALL - *flag, v).unwrap_err();
        assert_eq!(e.kind(), ErrorKind::TypeMismatch, "<{}> to <{}>", from, to);
        assert!(
            e.message().ends_with(&format!("(missing flag: {})", SerPolicy::flag_name(*flag))),
            "{}",
            e.message()
        );
    }

    // widening alone does not narrow
    assert!(convert("I", "i", SerPolicy::INTS, &encode_full(&5i64)).is_err());
    // these fail without naming the flag, nothing else fits either
    let chars = encode_full(&vec![b'h']);
    assert!(convert("lc", "s", SerPolicy::AUX, &chars).is_ok());
    assert!(convert("lc", "s", SerPolicy::ALL - SerPolicy::AUX, &chars).is_err());
    let pair = encode_full(&(1i32, 2i32));
    assert!(convert("t2ii", "li", SerPolicy::TUPLE_LIST, &pair).is_ok());
    assert!(convert("t2ii", "li", SerPolicy::ALL - SerPolicy::TUPLE_LIST, &pair).is_err());
}

#[test]
fn void_members_collapse() {
    let v = [1, 0, 0, 0, 5];
    assert_eq!(&*convert("t2Xi", "i", SerPolicy::EXPECTED, &v).unwrap(), &v[1..]);
    assert!(convert("t2Xi", "i", SerPolicy::NONE, &v).is_err());

    let v = [&[0u8; 8][..], &encode_full(&5i32)].concat();
    assert_eq!(&*convert("t2ai", "i", SerPolicy::ANY, &v).unwrap(), &v[8..]);

    assert_eq!(&*convert("", "a", SerPolicy::ANY, &[]).unwrap(), &[0; 8]);
    assert!(convert("lX", "", SerPolicy::EXPECTED, &[0, 0, 0, 2, 1, 1]).unwrap().is_empty());

    // vanishing members are not list elements
    let c = convert("t3XiX", "lI", SerPolicy::ALL, &[1, 0, 0, 0, 5, 1]).unwrap();
    assert_eq!(decode_full::<Vec<i64>>(&c).unwrap(), vec![5]);
}

#[test]
fn wrapper_contents() {
    let ok = Any::new(&Expected::<i32>::Ok(5));
    let parts = ok.get_content(None).unwrap();
    assert_eq!((parts.len(), ok.get_content_size()), (1, 1));
    assert_eq!(parts[0].get::<i32>(SerPolicy::NONE).unwrap(), 5);

    let done = Any::new(&Expected::<()>::Ok(()));
    assert_eq!(done.typestring(), "X");
    let parts = done.get_content(None).unwrap();
    assert_eq!((parts.len(), done.get_content_size()), (1, 1));
    assert!(parts[0].is_void());

    let failed = Any::new(&Expected::<()>::Err(ErrorValue::new("io", "gone")));
    let parts = failed.get_content(None).unwrap();
    assert_eq!(parts[0].typestring(), "e");
    assert_eq!(parts[0].get::<ErrorValue>(SerPolicy::NONE).unwrap().kind(), "io");

    let err = Any::new(&ErrorValue::new("io", "gone").with_value(Any::new(&1i32)));
    let parts = err.get_content(None).unwrap();
    assert_eq!((parts.len(), err.get_content_size()), (3, 3));
    assert_eq!(parts[1].get::<String>(SerPolicy::NONE).unwrap(), "gone");
    assert_eq!(parts[2].get::<Any>(SerPolicy::NONE).unwrap(), Any::new(&1i32));

    let wrapped = Any::new(&1i32).wrap();
    let parts = wrapped.get_content(None).unwrap();
    assert_eq!((parts.len(), wrapped.get_content_size()), (1, 1));
    assert_eq!(parts[0].typestring(), "i");
}
