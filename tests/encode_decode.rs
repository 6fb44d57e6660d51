use proptest::prelude::*;
use std::collections::BTreeMap;
use ufser::{any::Any, encoding::*, scan::scan};
use ufser_strategy::*;

proptest! {
    #![proptest_config(ProptestConfig { cases: 1_000, ..ProptestConfig::default() })]

    #[test]
    fn generated_values_scan(a in arb_any()) {
        let s = scan(a.typestring().as_bytes(), a.value(), false, true);
        prop_assert!(s.is_ok(), "{}: {:?}", a.typestring(), s.err());
        let s = s.unwrap();
        prop_assert_eq!(s.type_len, a.typestring().len());
        prop_assert_eq!(s.value_len, a.value().len());
    }

    #[test]
    fn any_wire_form(a in arb_any()) {
        let raw = a.serialize();
        prop_assert_eq!(raw.len(), 8 + a.typestring().len() + a.value().len());
        prop_assert_eq!(Any::from_raw(&raw, true).unwrap(), a.clone());
        prop_assert_eq!(decode_full::<Any>(&raw).unwrap(), a);
    }

    #[test]
    fn nested_anys_unwrap(a in arb_any()) {
        let wrapped = a.wrap().wrap();
        prop_assert_eq!(wrapped.typestring(), "a");
        let once = wrapped.unwrap().unwrap();
        prop_assert_eq!(once.unwrap().unwrap(), a.clone());
        prop_assert!(a.typestring() == "a" || a.unwrap().is_err());
    }

    #[test]
    fn truncated_payloads_fail(a in arb_any(), cut in any::<prop::sample::Index>()) {
        let cut = 1 + cut.index(a.value().len());
        let short = &a.value()[..a.value().len() - cut];
        prop_assert!(scan(a.typestring().as_bytes(), short, false, true).is_err());
    }

    #[test]
    fn native_values(
        t in (any::<i32>(), ".{0,8}", prop::collection::vec(any::<i64>(), 0..6)),
        m in prop::collection::btree_map("[a-z]{0,4}", any::<Option<bool>>(), 0..6),
    ) {
        let enc = encode_full(&t);
        let dec: (i32, String, Vec<i64>) = decode_full(&enc).unwrap();
        prop_assert_eq!(dec, t);

        let enc = encode_full(&m);
        let dec: BTreeMap<String, Option<bool>> = decode_full(&enc).unwrap();
        prop_assert_eq!(dec, m);
    }
}
