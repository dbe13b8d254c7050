//! Tree rewriter
//!
//! Walks a body the same way the compiler does, but hands every leaf to a
//! transform instead of compiling it. Used to narrow or sanitize caller
//! criteria (e.g. enforce server-side restrictions) before compilation.

use serde_json::{Map, Value};

use super::body::FilterBody;
use super::compiler::{FilterCompiler, combinator_map};
use super::error::FilterError;
use super::types::Combinator;

impl FilterCompiler {
    /// Rebuild `body` with every leaf replaced by `transform(compiler, name, value)`
    ///
    /// Combinator keys are recursed into; every other key is a leaf, whether or
    /// not it names a configured filter. Key order is preserved.
    pub fn adjust<B, F>(&self, body: &B, mut transform: F) -> Result<Value, FilterError>
    where
        B: FilterBody + ?Sized,
        F: FnMut(&FilterCompiler, &str, &Value) -> Value,
    {
        self.try_adjust(body, |compiler, name, value| {
            Ok(transform(compiler, name, value))
        })
    }

    /// Like [`Self::adjust`], but the transform may reject a leaf
    pub fn try_adjust<B, F>(&self, body: &B, mut transform: F) -> Result<Value, FilterError>
    where
        B: FilterBody + ?Sized,
        F: FnMut(&FilterCompiler, &str, &Value) -> Result<Value, FilterError>,
    {
        let body = body
            .as_body()
            .ok_or_else(|| FilterError::InvalidBody("expected a key-value mapping".to_string()))?;
        let map = body
            .as_object()
            .ok_or_else(|| FilterError::InvalidBody("expected a key-value mapping".to_string()))?;

        let rewritten = self.rewrite(map, &mut transform, 1)?;
        Ok(Value::Object(rewritten))
    }

    fn rewrite<F>(
        &self,
        map: &Map<String, Value>,
        transform: &mut F,
        depth: usize,
    ) -> Result<Map<String, Value>, FilterError>
    where
        F: FnMut(&FilterCompiler, &str, &Value) -> Result<Value, FilterError>,
    {
        let mut out = Map::with_capacity(map.len());
        for (key, value) in map {
            let rewritten = if Combinator::from_key(key).is_some() {
                let nested = combinator_map(key, value, depth + 1)?;
                Value::Object(self.rewrite(nested, transform, depth + 1)?)
            } else {
                transform(self, key, value)?
            };
            out.insert(key.clone(), rewritten);
        }
        Ok(out)
    }
}
