use super::{Mode, Node, Pattern, WildcardKind};
use crate::{Scope, Value, VariableScopes, Variables};
use proptest::prelude::*;

fn table(pairs: &[(&str, &str)]) -> Variables {
    pairs.iter().map(|(k, v)| (k.to_string(), Value::from(*v))).collect()
}

fn score(raw: &str) -> i32 {
    Pattern::parse(raw).unwrap().score()
}

#[test]
fn rejects_malformed_patterns() {
    let cases = [
        "", "$", "!", "foo *(x)", "foo @_a", "foo #[x!", "(x)#", "*%b", "la*la", "_", "_abc", "*_", " _ ", "_%x:foo",
        "_|", "_ *", "foo(", "foo@", "foo[", "foo^", "%u:foo(bar)", "          ", "%x:", "%xyzzy", "%", "  %:",
        "%x:foo", "%x:(ysy)", "%(:", "%a", "%a:_zzz", "%b:123", "%u:*", "%u:[yyy]", "]", "foo]", "*]", "(foo])", ")))",
        "()", "(()))", "[[[]]", "|", "a|b", "a | b", "(a|)", "[|]", "(foo)(bar)", "(foo", "[a|(b]",
    ];
    for raw in cases {
        assert!(Pattern::parse(raw).is_err(), "expected a syntax error for {raw:?}");
    }
}

#[test]
fn simple_mode_rejects_wildcards_memos_and_variables() {
    for raw in ["*", "u%foo", "_(hello|goodbye)", "%u:name"] {
        assert!(Pattern::with_mode(raw, Mode::Simple).is_err(), "expected a syntax error for {raw:?}");
    }
    assert!(Pattern::with_mode("(red|light yellow) [car]", Mode::Simple).is_ok());
}

#[test]
fn syntax_errors_carry_offsets() {
    let err = Pattern::parse("hello (world").unwrap_err();
    assert_eq!(err.to_string(), "missing closing ) at offset 12 in \"hello (world\"");

    let err = Pattern::parse("hello $").unwrap_err();
    assert_eq!(err.to_string(), "unexpected character $ at offset 6 in \"hello $\"");
}

#[test]
fn format_of_parse_equals_canonical_input() {
    let cases = [
        "* hello world # @ @6~ @3~5 #~4 *7 %u:hello_world %b:x %a:foo",
        "(hello world|%u:zzz|lalala|_[97]) [*|#~22]",
        "(hello world|[foobarbaz|(%u:u|%a:a|foo)]|xyzzy)",
    ];
    for raw in cases {
        assert_eq!(Pattern::parse(raw).unwrap().canonical(), raw);
    }
}

#[test]
fn canonical_form_normalizes_spelling() {
    let cases = [
        ("  Hello   World  ", "hello world"),
        ("( a |b )", "(a|b)"),
        ("*1~1 *~ *0~ #3~1", "*1 * * #3"),
        ("i feel _( good | fine | ok)", "i feel _(good|fine|ok)"),
    ];
    for (raw, canonical) in cases {
        assert_eq!(Pattern::parse(raw).unwrap().canonical(), canonical, "raw {raw:?}");
    }
}

#[test]
fn adjacent_words_collapse_into_one_literal() {
    let pattern = Pattern::parse("hello big world *").unwrap();
    assert_eq!(
        pattern.tree(),
        &[
            Node::Literal("hello big world".to_string()),
            Node::Space,
            Node::Wildcard { kind: WildcardKind::Any, min: 1, max: None },
        ]
    );
}

#[test]
fn memo_wraps_the_following_item() {
    let pattern = Pattern::parse("_%u:name").unwrap();
    assert_eq!(
        pattern.tree(),
        &[Node::Memo(Box::new(Node::Variable { scope: Scope::User, name: "name".to_string() }))]
    );
}

#[test]
fn scoring_prefers_specific_patterns() {
    assert!(score("hello mom") > score("hello"));
    assert!(score("hello *") < score("hello"));
    assert_eq!(score("hello"), score("(hello|goodbye)"));
    assert_eq!(score("hello world"), score("hello %u:foo"));
    assert_eq!(score("[a|b c|d]"), score("b c"));
    assert_eq!(score("(a|[b] c d|e)"), score("b c d"));
    assert!(score("@") > score("*"));
    assert!(score("#") > score("*"));
    assert_eq!(score("_*"), score("*"));
    assert_eq!(super::EMPTY_SCORE, score("*"));
}

#[test]
fn literal_beats_wildcard_in_same_position() {
    let pairs = [("my cat is here", "my * is here"), ("my cat is here", "my @ is here"), ("call 911", "call #")];
    for (literal, wild) in pairs {
        assert!(score(literal) > score(wild), "{literal:?} vs {wild:?}");
    }
}

#[test]
fn matching() {
    let user = table(&[("name", "Fred"), ("city", "bedrock")]);
    let alternates = table(&[("colors", "(red|blue|light yellow)")]);
    let bot = table(&[("mood", "good"), ("under_score", "yes")]);
    let vars = VariableScopes { user: Some(&user), bot: Some(&bot), alternates: Some(&alternates) };

    let cases: Vec<(&str, Vec<&str>, Vec<&str>)> = vec![
        ("hello", vec!["hello"], vec!["goodbye", "hello there"]),
        ("i feel (good|fine|ok)", vec!["i feel good", "i feel fine", "i feel ok"], vec!["i feel bad", "i feel"]),
        ("i feel _( good | fine | ok)", vec!["i feel good", "i feel fine", "i feel ok"], vec!["i feel bad", "i feel "]),
        ("how [are] you", vec!["how are you", "how you"], vec!["how", "you"]),
        ("my name is %u:name", vec!["my name is fred"], vec!["my name is"]),
        ("call me [%u:name]", vec!["call me fred", "call me"], vec![]),
        (
            "%b:mood to meet ([mr|mrs] %u:name|you)",
            vec!["good to meet you", "good to meet fred", "good to meet mrs fred"],
            vec!["good to meet", "good to meet mr"],
        ),
        ("voilà", vec!["voilà"], vec!["voila"]),
        (
            "my car is %a:colors",
            vec!["my car is red", "my car is blue", "my car is light yellow"],
            vec!["my car is ", "my car is"],
        ),
        ("the answer is %b:under_score", vec!["the answer is yes"], vec![]),
        (
            "my @1 car is my favorite",
            vec!["my green car is my favorite"],
            vec!["my car is my favorite", "my 2nd car is my favorite", "my light green car is my favorite"],
        ),
        (
            "my [*1] car is my favorite",
            vec!["my car is my favorite", "my green car is my favorite"],
            vec!["my light green car is my favorite"],
        ),
        (
            "the numbers are #~3",
            vec!["the numbers are 1", "the numbers are 1 2", "the numbers are 1 2 3"],
            vec!["the numbers are 1 2 3 4", "the numbers are a b c"],
        ),
        ("*5~ is the word", vec!["x y z z y is the word", "x y z z y 6 is the word"], vec!["x y z z is the word"]),
        (
            "my (red|blue|[*1] green) car",
            vec!["my red car", "my green car", "my light green car"],
            vec!["my light red car", "my car", "my foobar car"],
        ),
        ("* or something", vec!["lunch or something", "5 dollars or something"], vec!["or something", "that or something else"]),
        (
            "[*] the machine [*]",
            vec!["what about the machine", "the machine is broken", "why dont you tell me about the machine", "the machine"],
            vec!["the washing machine"],
        ),
    ];

    for (raw, good, bad) in cases {
        let pattern = Pattern::parse(raw).unwrap();
        let re = pattern.matcher(&vars).unwrap().expect("all variables are defined");
        for text in good {
            assert!(re.is_match(text), "{raw:?} should match {text:?} (regex {})", re.as_str());
        }
        for text in bad {
            assert!(!re.is_match(text), "{raw:?} should not match {text:?} (regex {})", re.as_str());
        }
    }
}

#[test]
fn memorization_captures_in_declaration_order() {
    let cases: Vec<(&str, &str, Vec<&str>)> = vec![
        ("my _(car|truck) is _*", "my car is fast", vec!["car", "fast"]),
        ("my _[red|blue] car", "my red car", vec!["red"]),
        ("my _[red|blue] car", "my car", vec![""]),
        ("my _@~2 car", "my very fast car", vec!["very fast"]),
    ];
    for (raw, text, expected) in cases {
        let pattern = Pattern::parse(raw).unwrap();
        let caps = pattern.captures(text, &VariableScopes::default()).unwrap().expect("pattern matches");
        let got: Vec<&str> =
            (0..expected.len()).map(|i| caps.name(&format!("match{i}")).map_or("", |m| m.as_str())).collect();
        assert_eq!(got, expected, "{raw:?} against {text:?}");
        assert!(caps.name(&format!("match{}", expected.len())).is_none());
    }
}

#[test]
fn unresolved_variable_defers_the_matcher() {
    let pattern = Pattern::parse("hi %u:name").unwrap();
    assert!(pattern.matcher(&VariableScopes::default()).unwrap().is_none());
    assert!(!pattern.is_compiled());

    let user = table(&[("name", "Ann")]);
    let vars = VariableScopes { user: Some(&user), ..Default::default() };
    assert!(pattern.matcher(&vars).unwrap().is_some());
    assert!(pattern.is_compiled());

    // Cached: a later value change doesn't rebuild the matcher.
    let user = table(&[("name", "Bob")]);
    let vars = VariableScopes { user: Some(&user), ..Default::default() };
    let re = pattern.matcher(&vars).unwrap().unwrap();
    assert!(re.is_match("hi ann"));
    assert!(!re.is_match("hi bob"));
}

#[test]
fn non_text_variable_is_a_value_error() {
    let mut bot = Variables::new();
    bot.insert("count".to_string(), Value::Integer(3));
    let vars = VariableScopes { bot: Some(&bot), ..Default::default() };
    let err = Pattern::parse("count %b:count").unwrap().matcher(&vars).unwrap_err();
    assert!(matches!(err, crate::PatternError::VariableValue { kind: "integer", .. }));
}

#[test]
fn malformed_variable_value_is_reported_with_the_variable() {
    let user = table(&[("name", "*bad*")]);
    let vars = VariableScopes { user: Some(&user), ..Default::default() };
    let err = Pattern::parse("hi %u:name").unwrap().matcher(&vars).unwrap_err();
    assert!(matches!(err, crate::PatternError::InVariable { scope: Scope::User, .. }));
    assert!(err.to_string().ends_with("in variable %u:name"));
}

#[test]
fn regex_source_uses_lazy_bounded_repetition() {
    let pattern = Pattern::parse("#2~4").unwrap();
    assert_eq!(pattern.regex_source(&VariableScopes::default()).unwrap(), r"(?:\d+\s){1,3}?\d+\b");
    let pattern = Pattern::parse("@1").unwrap();
    assert_eq!(pattern.regex_source(&VariableScopes::default()).unwrap(), r"[^_\d\W]+\b");
}

// --- Round-trip property ----------------------------------------------------

fn wildcard() -> impl Strategy<Value = String> {
    (prop::sample::select(vec!['*', '#', '@']), prop::option::of(0u32..5), any::<bool>(), prop::option::of(0u32..5))
        .prop_map(|(sigil, low, tilde, high)| {
            let mut s = sigil.to_string();
            if let Some(low) = low {
                s.push_str(&low.to_string());
            }
            if tilde {
                s.push('~');
                if let Some(high) = high {
                    s.push_str(&high.to_string());
                }
            }
            s
        })
}

fn item() -> impl Strategy<Value = String> {
    let leaf = prop_oneof![
        "[a-zA-Z][a-z0-9]{0,5}",
        wildcard(),
        ("[uba]", "[a-z][a-z0-9_]{0,5}").prop_map(|(scope, name)| format!("%{scope}:{name}")),
        wildcard().prop_map(|w| format!("_{w}")),
    ];
    leaf.prop_recursive(3, 24, 4, |inner| {
        let alternatives = prop::collection::vec(prop::collection::vec(inner, 1..3).prop_map(|v| v.join(" ")), 1..4);
        (alternatives, 0..4u8).prop_map(|(alts, shape)| {
            let body = alts.join(" | ");
            match shape {
                0 => format!("({body})"),
                1 => format!("[{body}]"),
                2 => format!("_({body})"),
                _ => format!("_[ {body} ]"),
            }
        })
    })
}

proptest! {
    #[test]
    fn canonical_form_round_trips(items in prop::collection::vec(item(), 1..5)) {
        let raw = items.join("  ");
        let first = Pattern::parse(&raw).unwrap();
        let second = Pattern::parse(first.canonical()).unwrap();
        prop_assert_eq!(first.tree(), second.tree());
        prop_assert_eq!(first.canonical(), second.canonical());
        prop_assert_eq!(first.score(), second.score());
    }
}
