use proptest::prelude::*;
use serde_json::{json, Value};
use std::collections::BTreeMap;
use ufser::prelude::*;
use ufser_strategy::*;

proptest! {
    #![proptest_config(ProptestConfig { cases: 500, ..ProptestConfig::default() })]

    #[test]
    fn well_formed_values_print(a in arb_any()) {
        let text = a.print().unwrap();
        let ty_prefix = format!("<{}>", a.typestring());
        prop_assert!(text.starts_with(&ty_prefix), "{}", text);
        prop_assert!(a.print_json().is_ok());
    }

    #[test]
    fn truncated_printing(a in arb_any(), max in 0usize..40) {
        let full = a.print().unwrap();
        let short = a.print_with(&PrintOptions::default().with_max_len(max)).unwrap();
        if full.len() <= max {
            prop_assert_eq!(short, full);
        } else {
            prop_assert_eq!(short.len(), max + 3);
            prop_assert!(short.ends_with("..."));
            prop_assert_eq!(&short[..max], &full[..max]);
        }
    }

    #[test]
    fn print_then_parse(
        v in prop::collection::vec(any::<i32>(), 1..6),
        s in "[a-zA-Z0-9 ]{0,12}",
        n in any::<i64>(),
    ) {
        let a = Any::new(&(n, s.clone(), v.clone()));
        let text = a.print().unwrap();
        let back = parse(&text, ParseMode::Normal).unwrap();
        prop_assert_eq!(back.unwrap().unwrap(), a);
    }

    #[test]
    fn printed_text_parses_back(a in arb_printable_any()) {
        let text = a.print().unwrap();
        // the parser hands back `<type>value` wrapped into an `a`
        let back = parse(&text, ParseMode::Liberal).unwrap().unwrap().unwrap();
        prop_assert_eq!(back.typestring(), a.typestring());
        prop_assert_eq!(back.print().unwrap(), text);
    }

    #[test]
    fn json_output_is_json(
        m in prop::collection::btree_map("[a-z]{1,6}", prop::collection::vec(any::<i32>(), 0..4), 0..4),
        flag in any::<bool>(),
        word in "[a-z \"\\\\]{0,8}",
    ) {
        let a = Any::new(&(m.clone(), flag, word.clone()));
        let parsed: Value = serde_json::from_str(&a.print_json().unwrap()).unwrap();
        prop_assert_eq!(parsed, json!([m, flag, word]));
    }
}

#[test]
fn mixed_lists_wrap_into_any() {
    let a = Any::from_text("[1, \"two\", 3.5]").unwrap();
    assert_eq!(a.typestring(), "la");
    assert_eq!(a.print().unwrap(), "<la>[<i>1,<s>\"two\",<d>3.5]");
    let items = a.get_content(None).unwrap();
    assert_eq!(items[0].get::<Any>(SerPolicy::NONE).unwrap(), Any::new(&1i32));

    let e = parse("[1, \"two\"]", ParseMode::Normal).unwrap_err();
    assert_eq!(e.message, "Mismatching types in list: <i> and <s>.");
}

#[test]
fn typed_text_converts() {
    let a = Any::from_text("<lI>[1, 2]").unwrap().unwrap().unwrap();
    assert_eq!(a.typestring(), "lI");
    assert_eq!(a.get::<Vec<i64>>(SerPolicy::NONE).unwrap(), vec![1, 2]);

    let e = Any::from_text("<t2ii>[1, 2, 3]").unwrap_err();
    assert!(e.message.starts_with("Size mismatch"), "{}", e.message);
}

#[test]
fn maps_and_json() {
    let mut m = BTreeMap::new();
    m.insert("ok".to_string(), Expected::<i32>::Ok(1));
    m.insert("bad".to_string(), Err(ErrorValue::new("io", "gone")));
    let a = Any::new(&m);
    assert_eq!(a.print().unwrap(), "<msxi>{\"bad\":err(\"io\",\"gone\",<>),\"ok\":1}");
    let parsed: Value = serde_json::from_str(&a.print_json().unwrap()).unwrap();
    assert_eq!(
        parsed,
        json!({"bad": {"type": "io", "message": "gone", "value": null}, "ok": 1})
    );
}

#[test]
fn escaping_options() {
    let a = Any::new("a<b");
    assert_eq!(a.print().unwrap(), "<s>\"a<b\"");
    let opts = PrintOptions::default().with_extra_escape(b"<");
    assert_eq!(a.print_with(&opts).unwrap(), "<s>\"a%3cb\"");
    let opts = opts.with_escape_char(b'#');
    assert_eq!(a.print_with(&opts).unwrap(), "<s>\"a#3cb\"");
}
