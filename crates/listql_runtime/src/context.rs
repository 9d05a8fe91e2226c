//! Request-scoped context.
//!
//! A [`Context`] is created per request and passed by reference to every
//! list operation, hook and resolver. It carries the session, the access
//! evaluator, a sudo flag that bypasses access control, and typed extension
//! data for application services.

use crate::access::{
    AccessDecision, AccessEvaluator, AccessRule, FieldAccessArgs, FieldAccessRule, ListAccessArgs,
    RuleEvaluator,
};
use rustc_hash::FxHashMap;
use serde_json::Value;
use std::any::{Any, TypeId};
use std::fmt;
use std::sync::Arc;

/// Type-keyed extension data.
///
/// # Example
///
/// ```
/// use listql_runtime::Extensions;
///
/// #[derive(Clone)]
/// struct Mailer(&'static str);
///
/// let mut ext = Extensions::new();
/// ext.insert(Mailer("smtp://localhost"));
/// assert_eq!(ext.get::<Mailer>().unwrap().0, "smtp://localhost");
/// assert!(ext.get::<String>().is_none());
/// ```
#[derive(Clone, Default)]
pub struct Extensions {
    data: FxHashMap<TypeId, Arc<dyn Any + Send + Sync>>,
}

impl Extensions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a value, replacing any value of the same type.
    pub fn insert<T: Send + Sync + 'static>(&mut self, value: T) {
        self.data.insert(TypeId::of::<T>(), Arc::new(value));
    }

    pub fn get<T: 'static>(&self) -> Option<&T> {
        self.data
            .get(&TypeId::of::<T>())
            .and_then(|value| value.downcast_ref())
    }

    pub fn contains<T: 'static>(&self) -> bool {
        self.data.contains_key(&TypeId::of::<T>())
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

impl fmt::Debug for Extensions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Extensions")
            .field("data_count", &self.data.len())
            .finish()
    }
}

/// Request context.
#[derive(Clone)]
pub struct Context {
    session: Option<Value>,
    sudo: bool,
    evaluator: Arc<dyn AccessEvaluator>,
    extensions: Extensions,
}

impl Context {
    /// Creates an anonymous context that evaluates rules as configured.
    pub fn new() -> Self {
        Self {
            session: None,
            sudo: false,
            evaluator: Arc::new(RuleEvaluator),
            extensions: Extensions::new(),
        }
    }

    /// Sets the session.
    #[must_use]
    pub fn with_session(mut self, session: Value) -> Self {
        self.session = Some(session);
        self
    }

    /// Replaces the access evaluator.
    #[must_use]
    pub fn with_evaluator(mut self, evaluator: impl AccessEvaluator + 'static) -> Self {
        self.evaluator = Arc::new(evaluator);
        self
    }

    /// Adds extension data.
    #[must_use]
    pub fn with_extension<T: Send + Sync + 'static>(mut self, value: T) -> Self {
        self.extensions.insert(value);
        self
    }

    /// Returns a copy of this context that bypasses all access control.
    #[must_use]
    pub fn sudo(&self) -> Self {
        Self {
            sudo: true,
            ..self.clone()
        }
    }

    pub fn session(&self) -> Option<&Value> {
        self.session.as_ref()
    }

    pub fn is_sudo(&self) -> bool {
        self.sudo
    }

    pub fn extensions(&self) -> &Extensions {
        &self.extensions
    }

    /// Shorthand for `extensions().get()`.
    pub fn get<T: 'static>(&self) -> Option<&T> {
        self.extensions.get()
    }

    /// Evaluates a list access rule.
    pub fn list_access(&self, rule: &AccessRule, args: &ListAccessArgs<'_>) -> AccessDecision {
        if self.sudo {
            return AccessDecision::Granted;
        }
        self.evaluator.list_access(rule, args)
    }

    /// Evaluates a field access rule.
    pub fn field_access(&self, rule: &FieldAccessRule, args: &FieldAccessArgs<'_>) -> bool {
        self.sudo || self.evaluator.field_access(rule, args)
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("session", &self.session)
            .field("sudo", &self.sudo)
            .field("extensions", &self.extensions)
            .finish_non_exhaustive()
    }
}
