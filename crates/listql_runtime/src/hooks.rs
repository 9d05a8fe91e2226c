//! Lifecycle hooks.
//!
//! Every mutation runs an ordered list of [`HookStage`]s. At each stage the
//! hooks of every affected field run first, in field order, followed by the
//! list's own hooks. Every hook receives the same [`HookArgs`] bag, whatever
//! the stage; fields that are meaningless for a stage are simply `None` or
//! empty.

use crate::access::Operation;
use crate::context::Context;
use crate::registry::ListLookup;
use crate::Item;
use async_trait::async_trait;
use listql_core::{ListResult, ValidationErrors};
use serde_json::Value;
use std::fmt;

/// A pipeline stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HookStage {
    ResolveInput,
    ValidateInput,
    BeforeChange,
    /// The storage write itself.
    Persist,
    AfterChange,
    ValidateDelete,
    BeforeDelete,
    AfterDelete,
}

impl HookStage {
    /// Stages of a create or update.
    pub const CHANGE: [HookStage; 5] = [
        Self::ResolveInput,
        Self::ValidateInput,
        Self::BeforeChange,
        Self::Persist,
        Self::AfterChange,
    ];

    /// Stages of a delete.
    pub const DELETE: [HookStage; 4] = [
        Self::ValidateDelete,
        Self::BeforeDelete,
        Self::Persist,
        Self::AfterDelete,
    ];

    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::ResolveInput => "resolveInput",
            Self::ValidateInput => "validateInput",
            Self::BeforeChange => "beforeChange",
            Self::Persist => "persist",
            Self::AfterChange => "afterChange",
            Self::ValidateDelete => "validateDelete",
            Self::BeforeDelete => "beforeDelete",
            Self::AfterDelete => "afterDelete",
        }
    }
}

impl fmt::Display for HookStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Arguments passed to every hook.
#[derive(Clone, Copy)]
pub struct HookArgs<'a> {
    pub list_key: &'a str,
    pub operation: Operation,
    /// The mutation input as the client sent it.
    pub original_input: &'a Item,
    /// The input after `resolveInput`; equal to `original_input` before it.
    pub resolved_data: &'a Item,
    /// The stored item for updates and deletes.
    pub existing_item: Option<&'a Item>,
    /// The stored item after the write, for `afterChange`.
    pub updated_item: Option<&'a Item>,
    pub context: &'a Context,
    pub lists: &'a dyn ListLookup,
}

impl fmt::Debug for HookArgs<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HookArgs")
            .field("list_key", &self.list_key)
            .field("operation", &self.operation)
            .field("original_input", &self.original_input)
            .field("resolved_data", &self.resolved_data)
            .field("existing_item", &self.existing_item)
            .field("updated_item", &self.updated_item)
            .finish_non_exhaustive()
    }
}

/// Arguments passed to field hooks.
#[derive(Debug, Clone, Copy)]
pub struct FieldHookArgs<'a> {
    pub args: &'a HookArgs<'a>,
    pub field_path: &'a str,
}

impl<'a> FieldHookArgs<'a> {
    /// The resolved value of this field, if present in the input.
    pub fn value(&self) -> Option<&'a Value> {
        self.args.resolved_data.get(self.field_path)
    }

    /// The stored value of this field, for updates and deletes.
    pub fn existing_value(&self) -> Option<&'a Value> {
        self.args
            .existing_item
            .and_then(|item| item.get(self.field_path))
    }
}

impl<'a> std::ops::Deref for FieldHookArgs<'a> {
    type Target = HookArgs<'a>;

    fn deref(&self) -> &Self::Target {
        self.args
    }
}

/// List-level hooks. Every method defaults to a no-op.
#[async_trait]
pub trait ListHooks: Send + Sync {
    /// Returns the data to store. Defaults to the data unchanged.
    async fn resolve_input(&self, args: &HookArgs<'_>) -> ListResult<Item> {
        Ok(args.resolved_data.clone())
    }

    async fn validate_input(
        &self,
        _args: &HookArgs<'_>,
        _errors: &mut ValidationErrors,
    ) -> ListResult<()> {
        Ok(())
    }

    async fn before_change(&self, _args: &HookArgs<'_>) -> ListResult<()> {
        Ok(())
    }

    async fn after_change(&self, _args: &HookArgs<'_>) -> ListResult<()> {
        Ok(())
    }

    async fn validate_delete(
        &self,
        _args: &HookArgs<'_>,
        _errors: &mut ValidationErrors,
    ) -> ListResult<()> {
        Ok(())
    }

    async fn before_delete(&self, _args: &HookArgs<'_>) -> ListResult<()> {
        Ok(())
    }

    async fn after_delete(&self, _args: &HookArgs<'_>) -> ListResult<()> {
        Ok(())
    }
}

/// Field-level hooks. Every method defaults to a no-op.
///
/// Field types implement these for their built-in behavior; a field's
/// configuration can add a second set that runs after the type's own.
#[async_trait]
pub trait FieldHooks: Send + Sync {
    /// Returns the value to store. Defaults to the value unchanged.
    async fn resolve_input(&self, args: &FieldHookArgs<'_>) -> ListResult<Value> {
        Ok(args.value().cloned().unwrap_or(Value::Null))
    }

    async fn validate_input(
        &self,
        _args: &FieldHookArgs<'_>,
        _errors: &mut ValidationErrors,
    ) -> ListResult<()> {
        Ok(())
    }

    async fn before_change(&self, _args: &FieldHookArgs<'_>) -> ListResult<()> {
        Ok(())
    }

    async fn after_change(&self, _args: &FieldHookArgs<'_>) -> ListResult<()> {
        Ok(())
    }

    async fn validate_delete(
        &self,
        _args: &FieldHookArgs<'_>,
        _errors: &mut ValidationErrors,
    ) -> ListResult<()> {
        Ok(())
    }

    async fn before_delete(&self, _args: &FieldHookArgs<'_>) -> ListResult<()> {
        Ok(())
    }

    async fn after_delete(&self, _args: &FieldHookArgs<'_>) -> ListResult<()> {
        Ok(())
    }
}
