//! Expression engine with optional caching support
//!
//! This module provides the main ExpressionEngine that parses and evaluates
//! expressions, with optional caching of parsed ASTs and templates for
//! improved performance under the `cache` feature.

use crate::builtins::BuiltinRegistry;
use crate::context::EvaluationContext;
use crate::core::ast::Expr;
use crate::core::error::ExpressionResult;
use crate::eval::Evaluator;
use crate::lexer::Lexer;
use crate::parser::Parser;
use serde_json::Value;
use std::sync::Arc;
use tracing::trace;

#[cfg(feature = "cache")]
type ExprCache = moka::sync::Cache<Arc<str>, Arc<Expr>>;
#[cfg(feature = "cache")]
type TemplateCache = moka::sync::Cache<Arc<str>, Arc<crate::Template>>;

/// Expression engine with parsing and evaluation capabilities.
pub struct ExpressionEngine {
    #[cfg(feature = "cache")]
    expr_cache: Option<ExprCache>,
    #[cfg(feature = "cache")]
    template_cache: Option<TemplateCache>,
    builtins: Arc<BuiltinRegistry>,
    evaluator: Evaluator,
}

impl ExpressionEngine {
    /// Create a new expression engine with no caching.
    pub fn new() -> Self {
        let builtins = Arc::new(BuiltinRegistry::new());
        let evaluator = Evaluator::new(Arc::clone(&builtins));

        Self {
            #[cfg(feature = "cache")]
            expr_cache: None,
            #[cfg(feature = "cache")]
            template_cache: None,
            builtins,
            evaluator,
        }
    }

    /// Create a new expression engine with the same cache capacity for
    /// expressions and templates.
    #[cfg(feature = "cache")]
    #[must_use]
    pub fn with_cache_size(size: u64) -> Self {
        Self::with_cache_sizes(size, size)
    }

    /// Create a new expression engine with separate cache capacities for
    /// expressions and templates.
    #[cfg(feature = "cache")]
    #[must_use]
    pub fn with_cache_sizes(expr_cache_size: u64, template_cache_size: u64) -> Self {
        let builtins = Arc::new(BuiltinRegistry::new());
        let evaluator = Evaluator::new(Arc::clone(&builtins));

        Self {
            expr_cache: Some(moka::sync::Cache::new(expr_cache_size)),
            template_cache: Some(moka::sync::Cache::new(template_cache_size)),
            builtins,
            evaluator,
        }
    }

    /// Register a custom builtin function.
    pub fn register_function(&mut self, name: &str, func: crate::builtins::BuiltinFunction) {
        Arc::get_mut(&mut self.builtins)
            .expect("cannot register function after builtins have been shared")
            .register(name, func);
    }

    /// Evaluate an expression string in the given context.
    pub fn evaluate(&self, expression: &str, context: &EvaluationContext) -> ExpressionResult<Value> {
        trace!(expression, "evaluating expression");

        let ast = self.parse_cached(expression)?;
        let result = self.evaluator.eval(&ast, context)?;

        trace!(result = ?result, "expression evaluation completed");
        Ok(result)
    }

    #[cfg(feature = "cache")]
    fn parse_cached(&self, expression: &str) -> ExpressionResult<Arc<Expr>> {
        if let Some(cache) = &self.expr_cache {
            if let Some(hit) = cache.get(expression) {
                return Ok(hit);
            }
            let parsed = Arc::new(self.parse_expression(expression)?);
            cache.insert(Arc::from(expression), Arc::clone(&parsed));
            Ok(parsed)
        } else {
            Ok(Arc::new(self.parse_expression(expression)?))
        }
    }

    #[cfg(not(feature = "cache"))]
    fn parse_cached(&self, expression: &str) -> ExpressionResult<Arc<Expr>> {
        Ok(Arc::new(self.parse_expression(expression)?))
    }

    /// Parse a template from a string, using the template cache if enabled.
    pub fn parse_template(&self, source: impl Into<String>) -> ExpressionResult<Arc<crate::Template>> {
        let source_str = source.into();
        #[cfg(feature = "cache")]
        {
            if let Some(cache) = &self.template_cache {
                if let Some(hit) = cache.get(source_str.as_str()) {
                    return Ok(hit);
                }
                let template = Arc::new(crate::Template::new(&source_str)?);
                cache.insert(Arc::from(source_str.as_str()), Arc::clone(&template));
                return Ok(template);
            }
        }
        Ok(Arc::new(crate::Template::new(source_str)?))
    }

    /// Alias for [`Self::parse_template`].
    pub fn get_template(&self, source: impl Into<String>) -> ExpressionResult<Arc<crate::Template>> {
        self.parse_template(source)
    }

    /// Render a parsed template with the given context.
    pub fn render_template(&self, template: &crate::Template, context: &EvaluationContext) -> ExpressionResult<String> {
        template.render(self, context)
    }

    fn parse_expression(&self, expression: &str) -> ExpressionResult<Expr> {
        let expr_content = expression.trim();
        let expr_content = if expr_content.starts_with("{{") && expr_content.ends_with("}}") {
            expr_content[2..expr_content.len() - 2].trim()
        } else {
            expr_content
        };

        let mut lexer = Lexer::new(expr_content);
        let tokens = lexer.tokenize()?;

        let mut parser = Parser::new(tokens);
        parser.parse()
    }

    /// Clear all caches.
    #[cfg(feature = "cache")]
    pub fn clear_cache(&self) {
        if let Some(cache) = &self.expr_cache {
            cache.invalidate_all();
        }
        if let Some(cache) = &self.template_cache {
            cache.invalidate_all();
        }
    }
}

impl Default for ExpressionEngine {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn evaluate_literal() {
        let engine = ExpressionEngine::new();
        let context = EvaluationContext::new();
        let result = engine.evaluate("42", &context).unwrap();
        assert_eq!(result.as_i64(), Some(42));
    }

    #[test]
    fn evaluate_arithmetic() {
        let engine = ExpressionEngine::new();
        let context = EvaluationContext::new();
        let result = engine.evaluate("2 + 3 * 4", &context).unwrap();
        assert_eq!(result.as_i64(), Some(14));
    }

    #[test]
    fn evaluate_string_function() {
        let engine = ExpressionEngine::new();
        let context = EvaluationContext::new();
        let result = engine.evaluate("uppercase('hello')", &context).unwrap();
        assert_eq!(result.as_str(), Some("HELLO"));
    }

    #[test]
    fn evaluate_single_template() {
        let engine = ExpressionEngine::new();
        let context = EvaluationContext::new();
        let result = engine.evaluate("{{ 2 + 3 }}", &context).unwrap();
        assert_eq!(result.as_i64(), Some(5));
    }

    #[test]
    fn parse_template() {
        let engine = ExpressionEngine::new();
        let template = engine.parse_template("Hello {{ $input }}!").unwrap();
        assert_eq!(template.expression_count(), 1);
    }

    #[test]
    fn render_template_simple() {
        let engine = ExpressionEngine::new();
        let mut context = EvaluationContext::new();
        context.set_input(Value::String("World".into()));

        let template = engine.parse_template("Hello {{ $input }}!").unwrap();
        let result = engine.render_template(&template, &context).unwrap();
        assert_eq!(result, "Hello World!");
    }

    #[test]
    fn evaluate_variable() {
        let engine = ExpressionEngine::new();
        let mut context = EvaluationContext::new();
        context.set_execution_var("id", Value::String("test-123".into()));

        let result = engine.evaluate("$execution.id", &context).unwrap();
        assert_eq!(result.as_str(), Some("test-123"));
    }

    #[test]
    fn conditional() {
        let engine = ExpressionEngine::new();
        let context = EvaluationContext::new();

        let result = engine.evaluate("if true then 1 else 2", &context).unwrap();
        assert_eq!(result.as_i64(), Some(1));
        let result = engine.evaluate("if false then 1 else 2", &context).unwrap();
        assert_eq!(result.as_i64(), Some(2));
    }

    #[test]
    fn pipeline() {
        let engine = ExpressionEngine::new();
        let context = EvaluationContext::new();
        let result = engine.evaluate("{{ \"hello\" | uppercase() }}", &context).unwrap();
        assert_eq!(result.as_str(), Some("HELLO"));
    }

    #[cfg(feature = "cache")]
    #[test]
    fn repeated_evaluation_hits_cache() {
        let engine = ExpressionEngine::with_cache_size(100);
        let context = EvaluationContext::new();

        let first = engine.evaluate("2 + 3", &context).unwrap();
        let second = engine.evaluate("2 + 3", &context).unwrap();
        assert_eq!(first.as_i64(), Some(5));
        assert_eq!(second.as_i64(), Some(5));
    }

    #[cfg(feature = "cache")]
    #[test]
    fn template_reuse_across_contexts() {
        let engine = ExpressionEngine::with_cache_size(100);
        let template = engine.parse_template("Hello {{ $input }}!").unwrap();

        let mut context = EvaluationContext::new();
        context.set_input(Value::String("Alice".into()));
        assert_eq!(engine.render_template(&template, &context).unwrap(), "Hello Alice!");

        context.set_input(Value::String("Bob".into()));
        assert_eq!(engine.render_template(&template, &context).unwrap(), "Hello Bob!");
    }
}
