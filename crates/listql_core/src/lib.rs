//! Core types for listql.
//!
//! This crate provides the foundational pieces shared by the runtime and the CLI:
//! - `error`: Stable error codes and the client-facing error shape
//! - `validation`: Message collection for validation hooks
//! - `naming`: Plural and GraphQL name derivation for lists
//! - `sdl`: SDL fragment printers

pub mod error;
pub mod naming;
pub mod sdl;
pub mod validation;

pub use error::{ErrorCode, ListError, ListResult, PathSegment, RestrictionKind, ResultExt};
pub use naming::{pluralize, GqlNames};
pub use validation::{ValidationError, ValidationErrorCode, ValidationErrors};
