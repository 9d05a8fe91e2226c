//! The mutation hook pipeline.
//!
//! A [`PipelineState`] is threaded through the stages of one item. Each
//! stage runs the hooks of the affected fields in field order and then the
//! list's hooks. The first error aborts the remaining stages.

use super::List;
use crate::access::Operation;
use crate::context::Context;
use crate::field::Field;
use crate::hooks::{FieldHookArgs, FieldHooks, HookArgs, HookStage, ListHooks};
use crate::Item;
use listql_core::{ListError, ListResult, ValidationErrors};
use serde_json::Value;
use tracing::debug;

/// The mutable record of one item passing through the pipeline.
#[derive(Debug, Clone)]
pub(crate) struct PipelineState {
    pub operation: Operation,
    pub original_input: Item,
    pub resolved_data: Item,
    pub existing_item: Option<Item>,
    pub updated_item: Option<Item>,
}

impl PipelineState {
    pub fn new(operation: Operation, original_input: Item, existing_item: Option<Item>) -> Self {
        Self {
            operation,
            resolved_data: original_input.clone(),
            original_input,
            existing_item,
            updated_item: None,
        }
    }

    fn hook_args<'a>(&'a self, list: &'a List, ctx: &'a Context) -> HookArgs<'a> {
        HookArgs {
            list_key: list.key(),
            operation: self.operation,
            original_input: &self.original_input,
            resolved_data: &self.resolved_data,
            existing_item: self.existing_item.as_ref(),
            updated_item: self.updated_item.as_ref(),
            context: ctx,
            lists: list.lists().as_ref(),
        }
    }

    fn existing_id(&self, list: &List) -> ListResult<Value> {
        self.existing_item
            .as_ref()
            .and_then(|item| item.get("id"))
            .cloned()
            .ok_or_else(|| {
                ListError::system(&[format!(
                    "{} {} without an existing item",
                    list.key(),
                    self.operation
                )])
            })
    }
}

impl List {
    /// Runs `stages` in order against `state`.
    pub(crate) async fn run_pipeline(
        &self,
        stages: &[HookStage],
        state: &mut PipelineState,
        ctx: &Context,
    ) -> ListResult<()> {
        for &stage in stages {
            debug!(list = %self.key(), operation = %state.operation, stage = %stage, "hook stage");
            match stage {
                HookStage::ResolveInput => self.resolve_input(state, ctx).await?,
                HookStage::ValidateInput | HookStage::ValidateDelete => {
                    self.validate(stage, state, ctx).await?;
                }
                HookStage::Persist => self.persist(state).await?,
                HookStage::BeforeChange
                | HookStage::AfterChange
                | HookStage::BeforeDelete
                | HookStage::AfterDelete => self.notify(stage, state, ctx).await?,
            }
        }
        Ok(())
    }

    /// Fields a stage runs hooks for: the changed fields of a create or
    /// update, every field of a delete.
    fn affected_fields<'a>(&'a self, state: &PipelineState) -> Vec<&'a Field> {
        match state.operation {
            Operation::Delete => self.fields().iter().collect(),
            _ => self
                .fields()
                .iter()
                .filter(|field| state.resolved_data.contains_key(field.path()))
                .collect(),
        }
    }

    async fn resolve_input(&self, state: &mut PipelineState, ctx: &Context) -> ListResult<()> {
        for field in self.affected_fields(state) {
            for hooks in field.hooks() {
                let value = {
                    let args = state.hook_args(self, ctx);
                    let field_args = FieldHookArgs {
                        args: &args,
                        field_path: field.path(),
                    };
                    hooks.resolve_input(&field_args).await?
                };
                state
                    .resolved_data
                    .insert(field.path().to_string(), value);
            }
        }
        if let Some(hooks) = self.hooks() {
            let resolved = hooks.resolve_input(&state.hook_args(self, ctx)).await?;
            state.resolved_data = resolved;
        }
        Ok(())
    }

    async fn validate(
        &self,
        stage: HookStage,
        state: &PipelineState,
        ctx: &Context,
    ) -> ListResult<()> {
        let args = state.hook_args(self, ctx);
        let mut errors = ValidationErrors::new();

        if stage == HookStage::ValidateInput {
            for field in self.fields() {
                let field_args = FieldHookArgs {
                    args: &args,
                    field_path: field.path(),
                };
                field.check_required(&field_args, &mut errors);
            }
        }
        for field in self.affected_fields(state) {
            let field_args = FieldHookArgs {
                args: &args,
                field_path: field.path(),
            };
            for hooks in field.hooks() {
                validate_field(hooks, stage, &field_args, &mut errors).await?;
            }
        }
        if let Some(hooks) = self.hooks() {
            match stage {
                HookStage::ValidateDelete => hooks.validate_delete(&args, &mut errors).await?,
                _ => hooks.validate_input(&args, &mut errors).await?,
            }
        }

        if errors.has_errors() {
            debug!(list = %self.key(), stage = %stage, errors = %errors, "validation failed");
        }
        errors.into_result(self.key())
    }

    async fn notify(&self, stage: HookStage, state: &PipelineState, ctx: &Context) -> ListResult<()> {
        let args = state.hook_args(self, ctx);
        for field in self.affected_fields(state) {
            let field_args = FieldHookArgs {
                args: &args,
                field_path: field.path(),
            };
            for hooks in field.hooks() {
                notify_field(hooks, stage, &field_args).await?;
            }
        }
        if let Some(hooks) = self.hooks() {
            notify_list(hooks, stage, &args).await?;
        }
        Ok(())
    }

    async fn persist(&self, state: &mut PipelineState) -> ListResult<()> {
        let adapter = self.adapter();
        match state.operation {
            Operation::Create => {
                let item = adapter.create(state.resolved_data.clone()).await?;
                state.updated_item = Some(item);
            }
            Operation::Update => {
                let id = state.existing_id(self)?;
                let item = adapter.update(&id, state.resolved_data.clone()).await?;
                state.updated_item = Some(item);
            }
            Operation::Delete => {
                let id = state.existing_id(self)?;
                adapter.delete(&id).await?;
            }
            Operation::Read | Operation::Auth => {
                return Err(ListError::system(&[format!(
                    "cannot persist a {} operation",
                    state.operation
                )]));
            }
        }
        debug!(list = %self.key(), operation = %state.operation, "persisted");
        Ok(())
    }
}

async fn validate_field(
    hooks: &dyn FieldHooks,
    stage: HookStage,
    args: &FieldHookArgs<'_>,
    errors: &mut ValidationErrors,
) -> ListResult<()> {
    match stage {
        HookStage::ValidateDelete => hooks.validate_delete(args, errors).await,
        _ => hooks.validate_input(args, errors).await,
    }
}

async fn notify_field(
    hooks: &dyn FieldHooks,
    stage: HookStage,
    args: &FieldHookArgs<'_>,
) -> ListResult<()> {
    match stage {
        HookStage::BeforeChange => hooks.before_change(args).await,
        HookStage::AfterChange => hooks.after_change(args).await,
        HookStage::BeforeDelete => hooks.before_delete(args).await,
        HookStage::AfterDelete => hooks.after_delete(args).await,
        _ => Ok(()),
    }
}

async fn notify_list(hooks: &dyn ListHooks, stage: HookStage, args: &HookArgs<'_>) -> ListResult<()> {
    match stage {
        HookStage::BeforeChange => hooks.before_change(args).await,
        HookStage::AfterChange => hooks.after_change(args).await,
        HookStage::BeforeDelete => hooks.before_delete(args).await,
        HookStage::AfterDelete => hooks.after_delete(args).await,
        _ => Ok(()),
    }
}
