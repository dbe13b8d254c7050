//! Filter compiler
//!
//! Walks a filter body, dispatches each configured filter to its strategy and
//! joins the fragments with the enclosing combinator. The bind table is an
//! explicit value threaded through the descent, so [`FilterCompiler::compile`]
//! is re-entrant; [`FilterCompiler::generate`] stores the table of the last
//! pass for [`FilterCompiler::params`].

use serde_json::{Map, Value};

use super::body::FilterBody;
use super::error::FilterError;
use super::params::{DEFAULT_PLACEHOLDER_PREFIX, SqlParams};
use super::strategies::generate_simple_clause;
use super::types::{BindValue, Combinator, FilterSet, Predicate};

/// Maximum nesting of combinators in one body
pub const MAX_BODY_DEPTH: usize = 32;

/// Compiles filter bodies against a fixed filter configuration
#[derive(Debug, Clone)]
pub struct FilterCompiler {
    filters: FilterSet,
    params: SqlParams,
}

impl FilterCompiler {
    pub fn new(filters: FilterSet) -> Self {
        Self {
            filters,
            params: SqlParams::with_prefix(DEFAULT_PLACEHOLDER_PREFIX),
        }
    }

    /// Use another prefix for minted placeholder names (`:f1`, `:f2`, ...)
    pub fn with_placeholder_prefix(mut self, prefix: &str) -> Self {
        self.params = SqlParams::with_prefix(prefix);
        self
    }

    pub fn filters(&self) -> &FilterSet {
        &self.filters
    }

    /// True when `candidate` is a key-value mapping or a request-parameter container
    pub fn acceptable_body<B: FilterBody + ?Sized>(candidate: &B) -> bool {
        candidate.as_body().is_some()
    }

    /// Compile `body`, keeping the bind table for [`Self::params`]
    ///
    /// The table is reset first, so placeholder numbering restarts at 1 on
    /// every call.
    pub fn generate<B: FilterBody + ?Sized>(
        &mut self,
        body: &B,
        default: Combinator,
    ) -> Result<Predicate, FilterError> {
        self.reset();
        let Self { filters, params } = self;
        compile_into(filters, body, default, params)
    }

    /// Compile `body` into a fresh bind table without touching this instance
    pub fn compile<B: FilterBody + ?Sized>(
        &self,
        body: &B,
        default: Combinator,
    ) -> Result<(Predicate, SqlParams), FilterError> {
        let mut params = SqlParams::with_prefix(self.params.prefix());
        let predicate = compile_into(&self.filters, body, default, &mut params)?;
        Ok((predicate, params))
    }

    /// Bind a value in the stored table and return its name
    pub fn allocate_parameter(&mut self, value: impl Into<BindValue>) -> String {
        self.params.allocate(value)
    }

    /// Clear the stored bind table and restart numbering
    pub fn reset(&mut self) {
        self.params.reset();
    }

    /// Bind table of the last [`Self::generate`] pass
    pub fn params(&self) -> &SqlParams {
        &self.params
    }
}

fn compile_into<B: FilterBody + ?Sized>(
    filters: &FilterSet,
    body: &B,
    default: Combinator,
    params: &mut SqlParams,
) -> Result<Predicate, FilterError> {
    let body = body
        .as_body()
        .ok_or_else(|| FilterError::InvalidBody("expected a key-value mapping".to_string()))?;
    let map = body
        .as_object()
        .ok_or_else(|| FilterError::InvalidBody("expected a key-value mapping".to_string()))?;

    tracing::debug!(keys = map.len(), default = %default, "Compiling filter body");

    // A lone combinator key replaces the default instead of nesting under it
    let predicate = match lone_combinator(map) {
        Some((key, combinator, inner)) => compile_group(filters, key, inner, combinator, params, 1)?,
        None => compile_map(filters, map, default, params, 1)?,
    };

    tracing::debug!(
        binds = params.len(),
        no_match = predicate.is_no_match(),
        empty = predicate.is_empty(),
        "Compiled filter body"
    );
    Ok(predicate)
}

fn lone_combinator(map: &Map<String, Value>) -> Option<(&str, Combinator, &Value)> {
    if map.len() != 1 {
        return None;
    }
    let (key, value) = map.iter().next()?;
    Combinator::from_key(key).map(|combinator| (key.as_str(), combinator, value))
}

/// Mapping held by a combinator key
pub(super) fn combinator_map<'a>(
    key: &str,
    value: &'a Value,
    depth: usize,
) -> Result<&'a Map<String, Value>, FilterError> {
    if depth > MAX_BODY_DEPTH {
        return Err(FilterError::InvalidBody(format!(
            "combinators nested deeper than {}",
            MAX_BODY_DEPTH
        )));
    }
    value
        .as_object()
        .ok_or_else(|| FilterError::InvalidBody(format!("'{}' must hold a mapping", key)))
}

fn compile_group(
    filters: &FilterSet,
    key: &str,
    value: &Value,
    combinator: Combinator,
    params: &mut SqlParams,
    depth: usize,
) -> Result<Predicate, FilterError> {
    let map = combinator_map(key, value, depth)?;
    compile_map(filters, map, combinator, params, depth)
}

fn compile_map(
    filters: &FilterSet,
    map: &Map<String, Value>,
    combinator: Combinator,
    params: &mut SqlParams,
    depth: usize,
) -> Result<Predicate, FilterError> {
    let mut fragments = Vec::with_capacity(map.len());

    for (key, value) in map {
        let predicate = if let Some(nested) = Combinator::from_key(key) {
            compile_group(filters, key, value, nested, params, depth + 1)?
        } else if let Some(descriptor) = filters.get(key) {
            generate_simple_clause(params, key, descriptor, value)?
        } else {
            tracing::trace!(filter = %key, "Skipping unconfigured filter");
            continue;
        };

        match predicate {
            Predicate::Sql(sql) => fragments.push(sql),
            Predicate::Empty => {}
            Predicate::NoMatch => {
                tracing::debug!(filter = %key, "Filter cannot match any row");
                return Ok(Predicate::NoMatch);
            }
        }
    }

    if fragments.is_empty() {
        return Ok(Predicate::Empty);
    }
    let separator = format!(" {} ", combinator.sql());
    Ok(Predicate::Sql(format!("({})", fragments.join(&separator))))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filters::body::RequestParams;
    use crate::filters::types::{Convert, FilterDescriptor};
    use regex::Regex;
    use serde_json::json;

    fn filters() -> FilterSet {
        FilterSet::new()
            .with(
                "author",
                FilterDescriptor::reference("posts.author_id").with_class_name("User"),
            )
            .with(
                "state",
                FilterDescriptor::mapped_list("posts.state").with_convert(Convert::Downcase),
            )
            .with("tag", FilterDescriptor::mapped_list("posts.tag"))
            .with("created", FilterDescriptor::timestamp_range("posts.created_at"))
            .with(
                "score",
                FilterDescriptor::custom("posts.score", |params, name, descriptor, value| {
                    let min = value
                        .get("min")
                        .and_then(Value::as_i64)
                        .ok_or_else(|| FilterError::custom(format!("{} requires 'min'", name)))?;
                    Ok(format!("({} >= {})", descriptor.field, params.placeholder(min)))
                }),
            )
            .with("order", FilterDescriptor::passthrough())
    }

    fn compiler() -> FilterCompiler {
        FilterCompiler::new(filters())
    }

    #[test]
    fn top_level_filters_default_to_and() {
        let mut compiler = compiler();
        let body = json!({"author": {"only": [1]}, "tag": {"only": ["rust"]}});
        let predicate = compiler.generate(&body, Combinator::All).unwrap();
        assert_eq!(
            predicate,
            Predicate::Sql("((posts.author_id IN (:p1)) AND (posts.tag IN (:p2)))".into())
        );
        assert_eq!(compiler.params().len(), 2);
    }

    #[test]
    fn default_combinator_argument() {
        let mut compiler = compiler();
        let body = json!({"author": {"only": [1]}, "tag": {"only": ["rust"]}});
        let predicate = compiler.generate(&body, Combinator::Any).unwrap();
        assert_eq!(
            predicate,
            Predicate::Sql("((posts.author_id IN (:p1)) OR (posts.tag IN (:p2)))".into())
        );
    }

    #[test]
    fn nested_combinators() {
        let mut compiler = compiler();
        let body = json!({
            "any": {
                "author": {"only": [1]},
                "all": {"tag": {"only": ["rust"]}, "state": {"except": ["Draft"]}}
            }
        });
        let predicate = compiler.generate(&body, Combinator::All).unwrap();
        assert_eq!(
            predicate,
            Predicate::Sql(
                "((posts.author_id IN (:p1)) OR ((posts.tag IN (:p2)) AND (posts.state NOT IN (:p3))))"
                    .into()
            )
        );
    }

    #[test]
    fn lone_combinator_overrides_default() {
        let mut compiler = compiler();
        let body = json!({"all": {"author": {"only": [1]}, "tag": {"only": ["a"]}}});
        let predicate = compiler.generate(&body, Combinator::Any).unwrap();
        assert_eq!(
            predicate,
            Predicate::Sql("((posts.author_id IN (:p1)) AND (posts.tag IN (:p2)))".into())
        );
    }

    #[test]
    fn unknown_filters_are_skipped() {
        let mut compiler = compiler();
        let body = json!({"page": 2, "author": {"only": [7]}, "sort": "desc"});
        let predicate = compiler.generate(&body, Combinator::All).unwrap();
        assert_eq!(predicate, Predicate::Sql("((posts.author_id IN (:p1)))".into()));
    }

    #[test]
    fn empty_bodies_compile_to_nothing() {
        let mut compiler = compiler();
        assert_eq!(compiler.generate(&json!({}), Combinator::All).unwrap(), Predicate::Empty);
        assert_eq!(
            compiler
                .generate(&json!({"any": {}, "order": "created"}), Combinator::All)
                .unwrap(),
            Predicate::Empty
        );
        assert!(compiler.params().is_empty());
    }

    #[test]
    fn no_match_aborts_the_pass() {
        let mut compiler = compiler();
        let body = json!({
            "any": {
                "tag": {"only": ["rust"]},
                "author": {"only": [1], "except": [1]}
            }
        });
        assert_eq!(
            compiler.generate(&body, Combinator::All).unwrap(),
            Predicate::NoMatch
        );
    }

    #[test]
    fn custom_errors_propagate() {
        let mut compiler = compiler();
        let err = compiler
            .generate(&json!({"score": {"max": 3}}), Combinator::All)
            .unwrap_err();
        assert_eq!(err, FilterError::Custom("score requires 'min'".into()));
    }

    #[test]
    fn unknown_comparison_propagates() {
        let mut compiler = compiler();
        let err = compiler
            .generate(&json!({"created": {"during": "2024"}}), Combinator::All)
            .unwrap_err();
        assert!(matches!(err, FilterError::UnknownComparison { .. }));
    }

    #[test]
    fn rejects_non_mapping_bodies() {
        let mut compiler = compiler();
        for body in [json!(1), json!("author"), json!([{"author": 1}])] {
            assert!(!FilterCompiler::acceptable_body(&body));
            assert!(matches!(
                compiler.generate(&body, Combinator::All),
                Err(FilterError::InvalidBody(_))
            ));
        }
        assert!(FilterCompiler::acceptable_body(&json!({})));
        assert!(FilterCompiler::acceptable_body(&RequestParams::new()));
    }

    #[test]
    fn combinator_must_hold_a_mapping() {
        let mut compiler = compiler();
        let err = compiler
            .generate(&json!({"any": [1, 2]}), Combinator::All)
            .unwrap_err();
        assert_eq!(err, FilterError::InvalidBody("'any' must hold a mapping".into()));
    }

    #[test]
    fn deep_nesting_is_rejected() {
        let mut body = json!({"tag": {"only": ["x"]}});
        for _ in 0..=MAX_BODY_DEPTH {
            body = json!({"all": body, "any": {}});
        }
        let err = compiler().generate(&body, Combinator::All).unwrap_err();
        assert!(matches!(err, FilterError::InvalidBody(_)));
    }

    #[test]
    fn every_placeholder_is_bound_once() {
        let mut compiler = compiler();
        let body = json!({
            "author": {"only": [1, 2]},
            "any": {
                "created": {"between": ["2024-02-01", "2024-01-01"], "after": "2023-06-01"},
                "all": {"tag": {"except": ["x"]}, "score": {"min": 4}}
            }
        });
        let sql = match compiler.generate(&body, Combinator::All).unwrap() {
            Predicate::Sql(sql) => sql,
            other => panic!("expected SQL, got {:?}", other),
        };

        let placeholders: Vec<String> = Regex::new(r":(p\d+)")
            .unwrap()
            .captures_iter(&sql)
            .map(|c| c[1].to_string())
            .collect();
        assert_eq!(placeholders.len(), compiler.params().len());
        for name in &placeholders {
            assert!(compiler.params().get(name).is_some(), "{} is unbound", name);
        }
        let mut unique = placeholders.clone();
        unique.sort();
        unique.dedup();
        assert_eq!(unique.len(), placeholders.len());

        let depth = sql.chars().try_fold(0i32, |depth, c| match c {
            '(' => Some(depth + 1),
            ')' if depth > 0 => Some(depth - 1),
            ')' => None,
            _ => Some(depth),
        });
        assert_eq!(depth, Some(0));
    }

    #[test]
    fn generate_resets_numbering() {
        let mut compiler = compiler();
        let body = json!({"author": {"only": [1]}});
        compiler.generate(&body, Combinator::All).unwrap();
        compiler.generate(&body, Combinator::All).unwrap();
        let names: Vec<_> = compiler.params().iter().map(|(n, _)| n.to_string()).collect();
        assert_eq!(names, vec!["p1"]);
    }

    #[test]
    fn allocate_parameter_and_reset() {
        let mut compiler = compiler();
        assert_eq!(compiler.allocate_parameter(5_i64), "p1");
        assert_eq!(compiler.allocate_parameter("x"), "p2");
        compiler.reset();
        assert!(compiler.params().is_empty());
    }

    #[test]
    fn compile_is_reentrant() {
        let compiler = compiler().with_placeholder_prefix("f");
        let body = json!({"tag": {"only": ["a"]}});
        let (predicate, params) = compiler.compile(&body, Combinator::All).unwrap();
        assert_eq!(predicate, Predicate::Sql("((posts.tag IN (:f1)))".into()));
        assert_eq!(params.len(), 1);
        assert!(compiler.params().is_empty());
    }

    #[test]
    fn compiles_request_params() {
        let mut compiler = compiler();
        let body: RequestParams = [
            ("author[only][]", "User/1"),
            ("author[only][]", "User/2"),
            ("author[except][]", "User/1"),
            ("created[at_or_after]", "2024-01-01"),
        ]
        .into_iter()
        .collect();
        let predicate = compiler.generate(&body, Combinator::All).unwrap();
        assert_eq!(
            predicate,
            Predicate::Sql(
                "((posts.author_id IN (:p1)) AND (posts.created_at >= :p2))".into()
            )
        );
        assert_eq!(
            compiler.params().get("p1"),
            Some(&BindValue::from(vec![2_i64]))
        );
    }

    #[test]
    fn nameless_request_params_do_not_break_body() {
        let mut compiler = compiler();
        let body: RequestParams = [("author[only][]", "User/1"), ("[]", "junk"), ("", "x")]
            .into_iter()
            .collect();
        assert!(FilterCompiler::acceptable_body(&body));
        let predicate = compiler.generate(&body, Combinator::All).unwrap();
        assert_eq!(predicate, Predicate::Sql("((posts.author_id IN (:p1)))".into()));
    }
}
