use super::*;

const BUDGET: usize = 10_000;

fn ch(c: char) -> Expr {
    Expr::Chars(CharSet::from_char(c as u32))
}

fn range(lo: char, hi: char) -> Expr {
    Expr::Chars(CharSet::from_range(lo as u32, hi as u32))
}

fn word(s: &str) -> Vec<u32> {
    s.chars().map(|c| c as u32).collect()
}

fn lit(s: &str) -> Expr {
    Expr::word(&word(s))
}

fn dfa(e: &Expr) -> Dfa {
    Dfa::from_expr(e, MAX_CHAR_UTF16, BUDGET).unwrap()
}

#[test]
fn test_nfa_accepts_literal() {
    let nfa = Nfa::from_expr(&lit("cat"), MAX_CHAR_UTF16, BUDGET).unwrap();
    assert!(nfa.accepts(&word("cat")));
    assert!(!nfa.accepts(&word("ca")));
    assert!(!nfa.accepts(&word("cats")));
    assert!(!nfa.is_empty());
}

#[test]
fn test_nfa_repeat_bounds() {
    // a{2,3}
    let e = Expr::repeat(ch('a'), 2, Some(3));
    let nfa = Nfa::from_expr(&e, MAX_CHAR_UTF16, BUDGET).unwrap();
    assert!(!nfa.accepts(&word("a")));
    assert!(nfa.accepts(&word("aa")));
    assert!(nfa.accepts(&word("aaa")));
    assert!(!nfa.accepts(&word("aaaa")));

    // (?:ab)*
    let e = Expr::repeat(lit("ab"), 0, None);
    let nfa = Nfa::from_expr(&e, MAX_CHAR_UTF16, BUDGET).unwrap();
    assert!(nfa.accepts(&[]));
    assert!(nfa.accepts(&word("ababab")));
    assert!(!nfa.accepts(&word("aba")));
}

#[test]
fn test_nfa_alternation_shares_endpoints() {
    // (?:a|b*)c
    let e = Expr::concat(vec![
        Expr::alt(vec![ch('a'), Expr::repeat(ch('b'), 0, None)]),
        ch('c'),
    ]);
    let nfa = Nfa::from_expr(&e, MAX_CHAR_UTF16, BUDGET).unwrap();
    for ok in ["ac", "c", "bc", "bbbc"] {
        assert!(nfa.accepts(&word(ok)), "{ok} should match");
    }
    for bad in ["abc", "a", "cc"] {
        assert!(!nfa.accepts(&word(bad)), "{bad} should not match");
    }
}

#[test]
fn test_nfa_union_and_append() {
    let mut nfa = Nfa::from_expr(&lit("a"), MAX_CHAR_UTF16, BUDGET).unwrap();
    let other = Nfa::from_expr(&lit("bc"), MAX_CHAR_UTF16, BUDGET).unwrap();
    nfa.union(&other, BUDGET).unwrap();
    assert!(nfa.accepts(&word("a")));
    assert!(nfa.accepts(&word("bc")));

    nfa.append(&Nfa::all_strings(MAX_CHAR_UTF16), BUDGET).unwrap();
    assert!(nfa.accepts(&word("axyz")));
    assert!(nfa.accepts(&word("bc")));
    assert!(!nfa.accepts(&word("b")));
}

#[test]
fn test_nfa_budget_exceeded() {
    let e = Expr::repeat(Expr::repeat(ch('a'), 100, Some(100)), 100, Some(100));
    let err = Nfa::from_expr(&e, MAX_CHAR_UTF16, 500).unwrap_err();
    assert!(matches!(err, crate::AuditError::TooManyNodes { limit: 500 }));
}

#[test]
fn test_empty_language() {
    assert!(Nfa::empty(MAX_CHAR_UTF16).is_empty());
    let nothing = Nfa::from_expr(&Expr::nothing(), MAX_CHAR_UTF16, BUDGET).unwrap();
    assert!(nothing.is_empty());
    assert!(dfa(&Expr::nothing()).is_empty());
    assert!(!dfa(&Expr::empty_word()).is_empty());
}

#[test]
fn test_dfa_minimize_equal_languages() {
    // a*a* and a* are the same language
    let a = dfa(&Expr::concat(vec![
        Expr::repeat(ch('a'), 0, None),
        Expr::repeat(ch('a'), 0, None),
    ]));
    let b = dfa(&Expr::repeat(ch('a'), 0, None));
    assert_eq!(a.len(), 1);
    assert!(Dfa::structurally_equal(&a, &b));

    // [ab] and a|b, split differently across intervals
    let c = dfa(&range('a', 'b'));
    let d = dfa(&Expr::Alt(vec![ch('a'), ch('b')]));
    assert!(Dfa::structurally_equal(&c, &d));
    assert!(!Dfa::structurally_equal(&a, &c));
}

#[test]
fn test_dfa_accepts() {
    let d = dfa(&Expr::concat(vec![range('a', 'z'), Expr::repeat(range('0', '9'), 1, None)]));
    assert!(d.accepts(&word("x1")));
    assert!(d.accepts(&word("q123")));
    assert!(!d.accepts(&word("q")));
    assert!(!d.accepts(&word("1q")));
}

#[test]
fn test_intersect() {
    let words = dfa(&Expr::repeat(range('a', 'z'), 1, None));
    let cat = dfa(&Expr::alt(vec![lit("cat"), lit("c4t")]));
    let both = Dfa::intersect(&words, &cat, BUDGET).unwrap().minimize();
    assert!(both.accepts(&word("cat")));
    assert!(!both.accepts(&word("c4t")));
}

#[test]
fn test_set_relation() {
    let az = dfa(&range('a', 'z'));
    let a = dfa(&ch('a'));
    let digits = dfa(&range('0', '9'));
    let ad = dfa(&range('a', 'd'));
    let cz = dfa(&range('c', 'z'));

    assert_eq!(set_relation(&az, &az, BUDGET).unwrap(), SetRelation::Equal);
    assert_eq!(set_relation(&a, &az, BUDGET).unwrap(), SetRelation::LeftSubset);
    assert_eq!(set_relation(&az, &a, BUDGET).unwrap(), SetRelation::LeftSuperset);
    assert_eq!(set_relation(&az, &digits, BUDGET).unwrap(), SetRelation::Disjoint);
    assert_eq!(set_relation(&ad, &cz, BUDGET).unwrap(), SetRelation::Overlapping);
    assert_eq!(SetRelation::LeftSubset.flip(), SetRelation::LeftSuperset);
}

#[test]
fn test_to_expr_round_trips_language() {
    let cases = [
        Expr::repeat(Expr::repeat(ch('a'), 1, None), 1, None),
        Expr::concat(vec![Expr::repeat(ch('a'), 0, None), Expr::repeat(ch('a'), 0, None)]),
        Expr::alt(vec![lit("ab"), lit("ac"), ch('d')]),
        Expr::repeat(lit("ab"), 0, None),
    ];
    for e in &cases {
        let d = dfa(e);
        let back = dfa(&d.to_expr());
        assert!(Dfa::structurally_equal(&d, &back), "{e} -> {}", d.to_expr());
    }
}

#[test]
fn test_to_expr_simplifies_nested_plus() {
    let d = dfa(&Expr::repeat(Expr::repeat(ch('a'), 1, None), 1, None));
    assert_eq!(d.to_expr().to_string(), "a+");
    let d = dfa(&Expr::concat(vec![
        Expr::repeat(ch('a'), 0, None),
        Expr::repeat(ch('a'), 0, None),
    ]));
    assert_eq!(d.to_expr().to_string(), "a*");
}
