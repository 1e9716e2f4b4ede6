#[macro_export]
macro_rules! regex {
    ($pat:literal) => {{
        static RE: once_cell::sync::Lazy<regex::Regex> =
            once_cell::sync::Lazy::new(|| regex::Regex::new($pat).unwrap());
        &*RE
    }};
}

/// Build a [`RuleSpec`](crate::RuleSpec) declaratively.
///
/// ```
/// use rejoinder::{Reply, rule};
///
/// let spec = rule! {
///     name: "greet",
///     pattern: "hello [there]",
///     weight: 2,
///     reply: |_turn| { Ok(Reply::from("hi!")) },
/// };
/// assert_eq!(spec.name(), "greet");
/// ```
#[macro_export]
macro_rules! rule {
    (
        name: $name:expr,
        pattern: $pattern:expr
        $(, previous: $previous:expr)?
        $(, weight: $weight:expr)?
        , reply: |$turn:ident| $body:block
        $(,)?
    ) => {{
        $crate::RuleSpec::new($name, $pattern, move |$turn: &mut $crate::Turn<'_>| $body)
            $(.previous($previous))?
            $(.weight($weight))?
    }};
}
