//! Access control rules and their evaluation.
//!
//! A list carries one rule per operation. A rule is either a static boolean,
//! a declarative where-filter, or a function of the request. Evaluating a
//! rule yields an [`AccessDecision`], which the list turns into an
//! [`AccessScope`] or a generic access-denied error.
//!
//! Fields carry boolean rules for `create`, `read` and `update` only.

use crate::context::Context;
use crate::Item;
use listql_core::RestrictionKind;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

/// The operation an access rule is evaluated for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    Create,
    Read,
    Update,
    Delete,
    Auth,
}

impl Operation {
    /// Returns the lowercase name of the operation.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Read => "read",
            Self::Update => "update",
            Self::Delete => "delete",
            Self::Auth => "auth",
        }
    }

    /// How a field restriction on this operation is reported to clients.
    pub const fn restriction_kind(&self) -> RestrictionKind {
        match self {
            Self::Read => RestrictionKind::Query,
            _ => RestrictionKind::Mutation,
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Arguments handed to a list-level access function.
#[derive(Debug, Clone, Copy)]
pub struct ListAccessArgs<'a> {
    pub context: &'a Context,
    pub list_key: &'a str,
    pub operation: Operation,
    pub original_input: &'a Item,
    pub gql_name: &'a str,
    pub item_id: Option<&'a Value>,
    pub item_ids: Option<&'a [Value]>,
}

impl ListAccessArgs<'_> {
    /// The authenticated session, if any.
    pub fn session(&self) -> Option<&Value> {
        self.context.session()
    }
}

/// Arguments handed to a field-level access function.
#[derive(Debug, Clone, Copy)]
pub struct FieldAccessArgs<'a> {
    pub context: &'a Context,
    pub list_key: &'a str,
    pub field_path: &'a str,
    pub operation: Operation,
    pub original_input: &'a Item,
    pub existing_item: Option<&'a Item>,
}

impl FieldAccessArgs<'_> {
    /// The authenticated session, if any.
    pub fn session(&self) -> Option<&Value> {
        self.context.session()
    }
}

/// Outcome of evaluating a list access rule.
#[derive(Debug, Clone, PartialEq)]
pub enum AccessDecision {
    Denied,
    Granted,
    /// Access limited to items matching the where-filter.
    Filtered(Item),
}

impl From<bool> for AccessDecision {
    fn from(allowed: bool) -> Self {
        if allowed {
            Self::Granted
        } else {
            Self::Denied
        }
    }
}

/// The set of items an allowed operation may touch.
#[derive(Debug, Clone, PartialEq)]
pub enum AccessScope {
    All,
    Matching(Item),
}

impl AccessScope {
    /// The where-filter of the scope, empty for unrestricted access.
    pub fn filter(&self) -> Option<&Item> {
        match self {
            Self::All => None,
            Self::Matching(filter) => Some(filter),
        }
    }
}

/// A list access function.
pub type ListAccessFn = Arc<dyn Fn(&ListAccessArgs<'_>) -> AccessDecision + Send + Sync>;

/// A field access function.
pub type FieldAccessFn = Arc<dyn Fn(&FieldAccessArgs<'_>) -> bool + Send + Sync>;

/// A list access rule for one operation.
#[derive(Clone)]
pub enum AccessRule {
    Static(bool),
    Filter(Item),
    Dynamic(ListAccessFn),
}

impl AccessRule {
    /// Creates a rule from an access function.
    pub fn dynamic<F>(f: F) -> Self
    where
        F: Fn(&ListAccessArgs<'_>) -> AccessDecision + Send + Sync + 'static,
    {
        Self::Dynamic(Arc::new(f))
    }

    /// Returns false only for a static `false`.
    ///
    /// Schema synthesis uses this: anything that might allow access at
    /// request time keeps its GraphQL surface.
    pub fn may_allow(&self) -> bool {
        !matches!(self, Self::Static(false))
    }

    /// Evaluates the rule.
    pub fn evaluate(&self, args: &ListAccessArgs<'_>) -> AccessDecision {
        match self {
            Self::Static(allowed) => AccessDecision::from(*allowed),
            Self::Filter(filter) => AccessDecision::Filtered(filter.clone()),
            Self::Dynamic(f) => f(args),
        }
    }
}

impl Default for AccessRule {
    fn default() -> Self {
        Self::Static(true)
    }
}

impl fmt::Debug for AccessRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Static(allowed) => f.debug_tuple("Static").field(allowed).finish(),
            Self::Filter(filter) => f.debug_tuple("Filter").field(filter).finish(),
            Self::Dynamic(_) => f.write_str("Dynamic(..)"),
        }
    }
}

impl<'de> Deserialize<'de> for AccessRule {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        match Value::deserialize(deserializer)? {
            Value::Bool(allowed) => Ok(Self::Static(allowed)),
            Value::Object(filter) => Ok(Self::Filter(filter)),
            other => Err(serde::de::Error::custom(format!(
                "access rule must be a boolean or a where-filter, got {other}"
            ))),
        }
    }
}

/// The effective list access rules, one per operation.
#[derive(Debug, Clone, Default)]
pub struct ListAccess {
    pub create: AccessRule,
    pub read: AccessRule,
    pub update: AccessRule,
    pub delete: AccessRule,
    pub auth: AccessRule,
}

impl ListAccess {
    /// Uses the same rule for every operation.
    pub fn all(rule: AccessRule) -> Self {
        Self {
            create: rule.clone(),
            read: rule.clone(),
            update: rule.clone(),
            delete: rule.clone(),
            auth: rule,
        }
    }

    /// Uses one access function for every operation.
    ///
    /// The function receives the operation in its arguments.
    pub fn dynamic<F>(f: F) -> Self
    where
        F: Fn(&ListAccessArgs<'_>) -> AccessDecision + Send + Sync + 'static,
    {
        Self::all(AccessRule::dynamic(f))
    }

    /// Sets the rule for one operation.
    #[must_use]
    pub fn with(mut self, operation: Operation, rule: AccessRule) -> Self {
        *self.rule_mut(operation) = rule;
        self
    }

    pub fn rule(&self, operation: Operation) -> &AccessRule {
        match operation {
            Operation::Create => &self.create,
            Operation::Read => &self.read,
            Operation::Update => &self.update,
            Operation::Delete => &self.delete,
            Operation::Auth => &self.auth,
        }
    }

    fn rule_mut(&mut self, operation: Operation) -> &mut AccessRule {
        match operation {
            Operation::Create => &mut self.create,
            Operation::Read => &mut self.read,
            Operation::Update => &mut self.update,
            Operation::Delete => &mut self.delete,
            Operation::Auth => &mut self.auth,
        }
    }

    /// Returns true unless the operation is statically denied.
    pub fn may_allow(&self, operation: Operation) -> bool {
        self.rule(operation).may_allow()
    }

    /// Returns true if any CRUD operation might be allowed.
    pub fn may_allow_any(&self) -> bool {
        [
            Operation::Create,
            Operation::Read,
            Operation::Update,
            Operation::Delete,
        ]
        .into_iter()
        .any(|op| self.may_allow(op))
    }
}

impl<'de> Deserialize<'de> for ListAccess {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(deny_unknown_fields)]
        struct PerOperation {
            create: Option<AccessRule>,
            read: Option<AccessRule>,
            update: Option<AccessRule>,
            delete: Option<AccessRule>,
            auth: Option<AccessRule>,
        }

        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Repr {
            All(bool),
            PerOperation(PerOperation),
        }

        Ok(match Repr::deserialize(deserializer)? {
            Repr::All(allowed) => Self::all(AccessRule::Static(allowed)),
            Repr::PerOperation(ops) if matches!(ops.create, Some(AccessRule::Filter(_))) => {
                return Err(serde::de::Error::custom(
                    "create access must be a boolean, got a where-filter",
                ));
            }
            Repr::PerOperation(ops) => Self {
                create: ops.create.unwrap_or_default(),
                read: ops.read.unwrap_or_default(),
                update: ops.update.unwrap_or_default(),
                delete: ops.delete.unwrap_or_default(),
                auth: ops.auth.unwrap_or_default(),
            },
        })
    }
}

/// A field access rule for one operation.
#[derive(Clone)]
pub enum FieldAccessRule {
    Static(bool),
    Dynamic(FieldAccessFn),
}

impl FieldAccessRule {
    /// Creates a rule from an access function.
    pub fn dynamic<F>(f: F) -> Self
    where
        F: Fn(&FieldAccessArgs<'_>) -> bool + Send + Sync + 'static,
    {
        Self::Dynamic(Arc::new(f))
    }

    pub fn may_allow(&self) -> bool {
        !matches!(self, Self::Static(false))
    }

    pub fn evaluate(&self, args: &FieldAccessArgs<'_>) -> bool {
        match self {
            Self::Static(allowed) => *allowed,
            Self::Dynamic(f) => f(args),
        }
    }
}

impl Default for FieldAccessRule {
    fn default() -> Self {
        Self::Static(true)
    }
}

impl fmt::Debug for FieldAccessRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Static(allowed) => f.debug_tuple("Static").field(allowed).finish(),
            Self::Dynamic(_) => f.write_str("Dynamic(..)"),
        }
    }
}

/// The effective field access rules.
#[derive(Debug, Clone, Default)]
pub struct FieldAccess {
    pub create: FieldAccessRule,
    pub read: FieldAccessRule,
    pub update: FieldAccessRule,
}

impl FieldAccess {
    pub fn all(rule: FieldAccessRule) -> Self {
        Self {
            create: rule.clone(),
            read: rule.clone(),
            update: rule,
        }
    }

    #[must_use]
    pub fn with(mut self, operation: Operation, rule: FieldAccessRule) -> Self {
        match operation {
            Operation::Create => self.create = rule,
            Operation::Read => self.read = rule,
            Operation::Update => self.update = rule,
            Operation::Delete | Operation::Auth => {}
        }
        self
    }

    /// The rule for `operation`. Fields have no delete or auth rules.
    pub fn rule(&self, operation: Operation) -> Option<&FieldAccessRule> {
        match operation {
            Operation::Create => Some(&self.create),
            Operation::Read => Some(&self.read),
            Operation::Update => Some(&self.update),
            Operation::Delete | Operation::Auth => None,
        }
    }
}

impl<'de> Deserialize<'de> for FieldAccess {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        // Unknown keys such as `delete` are accepted and ignored.
        #[derive(Deserialize)]
        struct PerOperation {
            create: Option<bool>,
            read: Option<bool>,
            update: Option<bool>,
        }

        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Repr {
            All(bool),
            PerOperation(PerOperation),
        }

        let rule = |allowed: Option<bool>| FieldAccessRule::Static(allowed.unwrap_or(true));
        Ok(match Repr::deserialize(deserializer)? {
            Repr::All(allowed) => Self::all(FieldAccessRule::Static(allowed)),
            Repr::PerOperation(ops) => Self {
                create: rule(ops.create),
                read: rule(ops.read),
                update: rule(ops.update),
            },
        })
    }
}

/// Evaluates access rules for a request.
///
/// The default methods evaluate the rule itself. Custom evaluators can
/// intercept evaluation, e.g. to consult an external policy service.
pub trait AccessEvaluator: Send + Sync {
    fn list_access(&self, rule: &AccessRule, args: &ListAccessArgs<'_>) -> AccessDecision {
        rule.evaluate(args)
    }

    fn field_access(&self, rule: &FieldAccessRule, args: &FieldAccessArgs<'_>) -> bool {
        rule.evaluate(args)
    }
}

/// Evaluates rules as configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct RuleEvaluator;

impl AccessEvaluator for RuleEvaluator {}
