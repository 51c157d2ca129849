use super::*;
use crate::tokenizer::{tokenize, TokenKind};
use proptest::prelude::*;

fn map(pairs: &[(&str, &str)]) -> RenameMap {
    pairs
        .iter()
        .map(|(from, to)| (from.to_string(), to.to_string()))
        .collect()
}

#[test]
fn test_empty_map_is_identity() {
    let formula = "=LET(a, 1, LAMBDA(x, x + a)(2))";
    assert_eq!(refactor(formula, &RenameMap::new()), formula);
}

#[test]
fn test_renames_call_names_and_references() {
    let m = map(&[("MYFN", "STATS_MYFN")]);
    assert_eq!(
        refactor("=MYFN(1) + MYFN (2) * MYFN", &m),
        "=STATS_MYFN(1) + STATS_MYFN (2) * STATS_MYFN"
    );
}

#[test]
fn test_strings_and_numbers_untouched() {
    let m = map(&[("MYFN", "OTHER")]);
    assert_eq!(
        refactor(r#"="MYFN" & MYFN() & 1e3"#, &m),
        r#"="MYFN" & OTHER() & 1e3"#
    );
}

#[test]
fn test_lambda_parameter_shadows_rename() {
    let m = map(&[("x", "z")]);
    assert_eq!(refactor("LAMBDA(x, x+y)", &m), "LAMBDA(x, x+y)");
    // A free x outside the lambda is renamed
    assert_eq!(
        refactor("=x+LAMBDA(x, x+1)(x)", &m),
        "=z+LAMBDA(x, x+1)(z)"
    );
}

#[test]
fn test_let_earlier_names_visible_to_later_values() {
    let m = map(&[("a", "A")]);
    assert_eq!(refactor("LET(a,1,b,a+1,b)", &m), "LET(a,1,b,a+1,b)");
}

#[test]
fn test_let_value_does_not_see_own_name() {
    let m = map(&[("a", "A")]);
    assert_eq!(refactor("=LET(a, a, a)", &m), "=LET(a, A, a)");
}

#[test]
fn test_let_scope_boundary_per_position() {
    let m = map(&[("x", "X"), ("y", "Y"), ("z", "Z")]);
    // value1 sees nothing, value2 sees x, expr sees x and y
    assert_eq!(
        refactor("LET(x, x+y, y, x+y+z, x+y+z)", &m),
        "LET(x, X+Y, y, x+Y+Z, x+y+Z)"
    );
}

#[test]
fn test_declaration_tokens_never_renamed() {
    let m = map(&[("a", "A"), ("p", "P")]);
    assert_eq!(refactor("LET(a, 1, a)", &m), "LET(a, 1, a)");
    assert_eq!(refactor("LAMBDA(p, q, p*q)", &m), "LAMBDA(p, q, p*q)");
}

#[test]
fn test_scope_does_not_leak_to_siblings() {
    let m = map(&[("a", "A")]);
    assert_eq!(refactor("F(LET(a,1,a), a)", &m), "F(LET(a,1,a), A)");
    assert_eq!(
        refactor("F(LAMBDA(a, a)(1), a + 1)", &m),
        "F(LAMBDA(a, a)(1), A + 1)"
    );
}

#[test]
fn test_nested_binding_forms() {
    let m = map(&[("f", "G"), ("x", "X"), ("n", "N")]);
    assert_eq!(
        refactor("=LET(f, LAMBDA(x, x*n), f(x))", &m),
        "=LET(f, LAMBDA(x, x*N), f(X))"
    );
}

#[test]
fn test_binding_keywords_case_insensitive_and_never_renamed() {
    let m = map(&[("LET", "NOPE"), ("lambda", "NOPE"), ("v", "W")]);
    assert_eq!(refactor("=let(v, 1, v)", &m), "=let(v, 1, v)");
    assert_eq!(refactor("=Lambda(v, v)(v)", &m), "=Lambda(v, v)(W)");
    assert_eq!(refactor("=LET(v, 1, v)", &m), "=LET(v, 1, v)");
}

#[test]
fn test_malformed_input_is_best_effort() {
    let m = map(&[("A", "B")]);
    assert_eq!(refactor("=SUM(A, \"open", &m), "=SUM(B, \"open");
    // A lone LET argument is the body expression
    assert_eq!(refactor("=LET(A", &m), "=LET(B");
    assert_eq!(refactor(")(,A", &m), ")(,B");
    assert_eq!(refactor("LAMBDA()", &m), "LAMBDA()");
}

#[test]
fn test_semicolon_separators() {
    let m = map(&[("a", "A"), ("k", "K")]);
    assert_eq!(refactor("LET(a; 1; a + k)", &m), "LET(a; 1; a + K)");
}

#[test]
fn test_scope_values() {
    let outer = Scope::new().with("a");
    let inner = outer.with("b");
    assert!(outer.contains("a"));
    assert!(!outer.contains("b"));
    assert!(inner.contains("a") && inner.contains("b"));
    assert_eq!(inner.len(), 2);
    assert!(Scope::new().is_empty());
}

fn formula() -> impl Strategy<Value = String> {
    let leaf = prop_oneof![
        "[A-Z][A-Z0-9_]{0,4}",
        "[0-9]{1,3}",
        Just("\"s\"".to_string()),
    ];
    leaf.prop_recursive(4, 48, 4, |inner| {
        prop_oneof![
            (inner.clone(), "[+*&-]", inner.clone()).prop_map(|(a, op, b)| format!("{}{}{}", a, op, b)),
            ("[A-Z]{1,5}", prop::collection::vec(inner.clone(), 0..4))
                .prop_map(|(name, args)| format!("{}({})", name, args.join(", "))),
            ("[A-Z]{1,2}", inner.clone(), inner.clone())
                .prop_map(|(name, value, body)| format!("LET({}, {}, {})", name, value, body)),
            ("[A-Z]{1,2}", inner.clone())
                .prop_map(|(param, body)| format!("LAMBDA({}, {})", param, body)),
        ]
    })
}

fn separator_count(text: &str) -> usize {
    tokenize(text)
        .iter()
        .filter(|t| matches!(t.kind, TokenKind::Comma | TokenKind::Semicolon))
        .count()
}

proptest! {
    #[test]
    fn empty_map_is_identity(input in any::<String>()) {
        prop_assert_eq!(refactor(&input, &RenameMap::new()), input);
    }

    #[test]
    fn renaming_round_trips_with_inverse(input in formula(), names in prop::collection::vec("[A-Z]{1,2}", 1..4)) {
        let forward: RenameMap = names.iter().map(|n| (n.clone(), format!("pkg_{}", n))).collect();
        let backward: RenameMap = forward.iter().map(|(k, v)| (v.clone(), k.clone())).collect();

        let renamed = refactor(&input, &forward);
        prop_assert_eq!(separator_count(&renamed), separator_count(&input));
        prop_assert_eq!(refactor(&renamed, &backward), input);
    }
}
