//! Resource trait and related types
//!
//! This module defines the CRUD contract a managed resource implements and the
//! request/response values passed through it.

use crate::context::Context;
use crate::types::{Diagnostics, DynamicValue};
use async_trait::async_trait;

/// Base trait for resources - implement CRUD operations
/// Type name should be constant and match the key the provider registers
#[async_trait]
pub trait Resource: Send + Sync {
    /// Type name should be constant (e.g., "jamfpro_building")
    fn type_name(&self) -> &str;

    /// Called to create a new resource
    /// MUST populate all attributes in response.new_state (including computed)
    async fn create(&self, ctx: Context, request: CreateResourceRequest) -> CreateResourceResponse;

    /// Called to read current state - used for refresh and after create/update
    /// MUST return accurate current state or None if resource doesn't exist
    async fn read(&self, ctx: Context, request: ReadResourceRequest) -> ReadResourceResponse;

    /// Called to update an existing resource
    /// MUST apply all changes from planned_state to the resource
    async fn update(&self, ctx: Context, request: UpdateResourceRequest) -> UpdateResourceResponse;

    /// Called to delete a resource
    /// MUST remove the resource completely
    async fn delete(&self, ctx: Context, request: DeleteResourceRequest) -> DeleteResourceResponse;
}

pub struct CreateResourceRequest {
    pub type_name: String,
    pub planned_state: DynamicValue,
    pub config: DynamicValue,
}

pub struct CreateResourceResponse {
    pub new_state: DynamicValue,
    pub diagnostics: Diagnostics,
}

#[derive(Clone)]
pub struct ReadResourceRequest {
    pub type_name: String,
    pub current_state: DynamicValue,
    pub private: Vec<u8>,
}

impl ReadResourceRequest {
    pub fn new(type_name: impl Into<String>, current_state: DynamicValue) -> Self {
        Self {
            type_name: type_name.into(),
            current_state,
            private: vec![],
        }
    }
}

pub struct ReadResourceResponse {
    pub new_state: Option<DynamicValue>,
    pub diagnostics: Diagnostics,
    pub private: Vec<u8>,
}

impl ReadResourceResponse {
    /// Response carrying only diagnostics, leaving the state unset
    pub fn with_diagnostics(diagnostics: Diagnostics) -> Self {
        Self {
            new_state: None,
            diagnostics,
            private: vec![],
        }
    }

    pub fn with_state(state: DynamicValue) -> Self {
        Self {
            new_state: Some(state),
            diagnostics: Diagnostics::new(),
            private: vec![],
        }
    }
}

pub struct UpdateResourceRequest {
    pub type_name: String,
    pub prior_state: DynamicValue,
    pub planned_state: DynamicValue,
    pub config: DynamicValue,
}

pub struct UpdateResourceResponse {
    pub new_state: DynamicValue,
    pub diagnostics: Diagnostics,
}

pub struct DeleteResourceRequest {
    pub type_name: String,
    pub prior_state: DynamicValue,
}

pub struct DeleteResourceResponse {
    pub diagnostics: Diagnostics,
}
