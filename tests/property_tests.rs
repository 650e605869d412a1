//! Property tests for the inline argument parser and guard evaluation.

use std::collections::BTreeMap;

use proptest::prelude::*;
use serde_json::Value;

use xconfig::executor::condition::{evaluate_expression, evaluate_when};
use xconfig::parser::args::parse_module_args;
use xconfig::parser::When;
use xconfig::vars::Vars;

fn key() -> impl Strategy<Value = String> {
    "[a-z_][a-z0-9_]{0,8}"
}

fn spaced_value() -> impl Strategy<Value = String> {
    "[a-zA-Z0-9./-]{1,6}( [a-zA-Z0-9./-]{1,6}){0,2}"
}

fn binding() -> impl Strategy<Value = Value> {
    prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::Bool),
        any::<i32>().prop_map(Value::from),
        prop_oneof![
            Just(String::new()),
            Just("false".to_string()),
            Just("0".to_string()),
            Just("no".to_string()),
            "[a-z]{1,5}",
        ]
        .prop_map(Value::String),
    ]
}

proptest! {
    #[test]
    fn quoted_values_survive_parsing(
        args in prop::collection::btree_map(key(), spaced_value(), 1..5),
        single in any::<bool>(),
    ) {
        let quote = if single { '\'' } else { '"' };
        let line = args
            .iter()
            .map(|(k, v)| format!("{}={}{}{}", k, quote, v, quote))
            .collect::<Vec<_>>()
            .join(" ");

        let parsed = parse_module_args(&line).expect("well-formed line");
        let parsed: BTreeMap<_, _> = parsed.into_iter().collect();
        prop_assert_eq!(parsed, args);
    }

    #[test]
    fn trailing_bare_key_is_rejected(
        args in prop::collection::btree_map(key(), "[a-z0-9]{1,5}", 0..4),
        bare in key(),
    ) {
        let mut line: Vec<String> = args.iter().map(|(k, v)| format!("{}={}", k, v)).collect();
        line.push(bare);
        prop_assert!(parse_module_args(&line.join(" ")).is_none());
    }

    #[test]
    fn guard_is_pure_and_conjunctive(
        bindings in prop::collection::btree_map(key(), binding(), 0..6),
        exprs in prop::collection::vec(prop_oneof![key(), Just("true".to_string()), Just(String::new())], 0..4),
    ) {
        let vars: Vars = bindings.into_iter().collect();
        let snapshot = vars.clone();
        let when = When::new(exprs.clone());

        let first = evaluate_when(&when, &vars);
        let second = evaluate_when(&when, &vars);

        prop_assert_eq!(first, second);
        prop_assert_eq!(&vars, &snapshot);
        prop_assert_eq!(first, exprs.iter().all(|e| evaluate_expression(e, &vars)));
    }
}
