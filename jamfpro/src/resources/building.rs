//! jamfpro_building resource

use async_trait::async_trait;
use std::time::Duration;
use tfplug::context::Context;
use tfplug::resource::{
    CreateResourceRequest, CreateResourceResponse, DeleteResourceRequest, DeleteResourceResponse,
    ReadResourceRequest, ReadResourceResponse, Resource, UpdateResourceRequest,
    UpdateResourceResponse,
};
use tfplug::types::{AttributePath, Diagnostic, Diagnostics, DynamicValue};

use crate::api::Building;
use crate::crud::errors::OperationKind;
use crate::crud::operations::{
    delete_with_retry, handle_resource_not_found_error, retry_api_call,
};
use crate::crud::read_with_retry::{read_with_retry, ReadWithRetryOptions};
use crate::crud::state::ResourceData;
use crate::crud::timeout::handle_timeout;
use crate::waitfor::resource_is_available;
use crate::JamfProProviderData;

pub const TYPE_NAME: &str = "jamfpro_building";

pub const CREATE_TIMEOUT: Duration = Duration::from_secs(70);
pub const READ_TIMEOUT: Duration = Duration::from_secs(70);
pub const UPDATE_TIMEOUT: Duration = Duration::from_secs(70);
pub const DELETE_TIMEOUT: Duration = Duration::from_secs(70);

/// Settle time after a new building first becomes readable
pub const PROPAGATION_DELAY: Duration = Duration::from_millis(500);

const ADDRESS_ATTRIBUTES: [&str; 6] = [
    "street_address1",
    "street_address2",
    "city",
    "state_province",
    "zip_postal_code",
    "country",
];

pub struct BuildingResource {
    provider_data: JamfProProviderData,
}

impl BuildingResource {
    pub fn new(provider_data: JamfProProviderData) -> Self {
        Self { provider_data }
    }

    /// One GET of the building, abandoned if `ctx` ends first. With `cleanup`,
    /// a 404/410 drops the resource from state; without it the error is
    /// reported so callers can retry.
    async fn read_building(
        &self,
        ctx: &Context,
        request: ReadResourceRequest,
        cleanup: bool,
    ) -> ReadResourceResponse {
        let mut state = request.current_state;
        let id = state.id();

        if id.is_empty() {
            return ReadResourceResponse::with_diagnostics(Diagnostics::new());
        }

        let buildings = self.provider_data.client.buildings();
        let result = tokio::select! {
            result = buildings.get(&id) => result,
            reason = ctx.done() => {
                return ReadResourceResponse {
                    new_state: Some(state),
                    diagnostics: Diagnostic::error(
                        "Error reading building",
                        format!("request for building {} interrupted: {}", id, reason),
                    )
                    .into(),
                    private: request.private,
                };
            }
        };

        match result {
            Ok(building) => match apply_building(&mut state, &building) {
                Ok(()) => ReadResourceResponse {
                    new_state: Some(state),
                    diagnostics: Diagnostics::new(),
                    private: request.private,
                },
                Err(e) => ReadResourceResponse::with_diagnostics(
                    Diagnostic::error("Failed to set building state", e.to_string()).into(),
                ),
            },
            Err(e) => {
                let diagnostics =
                    handle_resource_not_found_error(&e.to_string(), &mut state, cleanup);
                let new_state = if state.is_removed() { None } else { Some(state) };

                ReadResourceResponse {
                    new_state,
                    diagnostics,
                    private: request.private,
                }
            }
        }
    }
}

#[async_trait]
impl Resource for BuildingResource {
    fn type_name(&self) -> &str {
        TYPE_NAME
    }

    async fn create(&self, ctx: Context, request: CreateResourceRequest) -> CreateResourceResponse {
        let mut diagnostics = Diagnostics::new();

        let building = match building_from_state(&request.config) {
            Ok(building) => building,
            Err(diag) => {
                diagnostics.push(diag);
                return CreateResourceResponse {
                    new_state: request.planned_state,
                    diagnostics,
                };
            }
        };

        let Some(ctx) = handle_timeout(
            &ctx,
            configured_timeout(&request.config, "create").as_deref(),
            CREATE_TIMEOUT,
            &mut diagnostics,
        ) else {
            return CreateResourceResponse {
                new_state: request.planned_state,
                diagnostics,
            };
        };

        let timeout = ctx.remaining().unwrap_or(CREATE_TIMEOUT);
        let client = &self.provider_data.client;
        let payload = &building;
        let created = retry_api_call(&ctx, timeout, OperationKind::Write, move || async move {
            client.buildings().create(payload).await
        })
        .await;

        let created = match created {
            Ok(created) => created,
            Err(e) => {
                diagnostics.add_error(
                    "Failed to create building",
                    format!("Failed to create building '{}': {}", building.name, e),
                );
                return CreateResourceResponse {
                    new_state: request.planned_state,
                    diagnostics,
                };
            }
        };

        tracing::info!(resource_id = %created.id, "Created building");

        let mut new_state = request.planned_state;
        new_state.set_id(&created.id);

        let wait_timeout = ctx.remaining().unwrap_or(CREATE_TIMEOUT);
        let available = resource_is_available(
            &ctx,
            wait_timeout,
            &created.id,
            move |id| async move { client.buildings().get(&id).await },
            PROPAGATION_DELAY,
        )
        .await;

        if let Err(e) = available {
            diagnostics.add_error("Failed to confirm building creation", e.to_string());
            return CreateResourceResponse {
                new_state,
                diagnostics,
            };
        }

        let mut response = CreateResourceResponse {
            new_state: new_state.clone(),
            diagnostics,
        };

        let read_result = read_with_retry(
            &ctx,
            move |ctx, req, _attempt| async move { self.read_building(&ctx, req, false).await },
            ReadResourceRequest::new(TYPE_NAME, new_state),
            &mut response,
            ReadWithRetryOptions::for_operation("Create", TYPE_NAME),
        )
        .await;

        if let Err(e) = read_result {
            response.diagnostics.add_error(
                "Failed to read building after create",
                e.to_string(),
            );
        }

        response
    }

    async fn read(&self, ctx: Context, request: ReadResourceRequest) -> ReadResourceResponse {
        let mut diagnostics = Diagnostics::new();

        let Some(ctx) = handle_timeout(
            &ctx,
            configured_timeout(&request.current_state, "read").as_deref(),
            READ_TIMEOUT,
            &mut diagnostics,
        ) else {
            let mut response = ReadResourceResponse::with_state(request.current_state);
            response.diagnostics = diagnostics;
            return response;
        };

        let mut response = self.read_building(&ctx, request, true).await;
        diagnostics.extend(response.diagnostics);
        response.diagnostics = diagnostics;
        response
    }

    async fn update(&self, ctx: Context, request: UpdateResourceRequest) -> UpdateResourceResponse {
        let mut diagnostics = Diagnostics::new();
        let id = request.prior_state.id();

        let building = match building_from_state(&request.config) {
            Ok(building) => building,
            Err(diag) => {
                diagnostics.push(diag);
                return UpdateResourceResponse {
                    new_state: request.planned_state,
                    diagnostics,
                };
            }
        };

        let Some(ctx) = handle_timeout(
            &ctx,
            configured_timeout(&request.config, "update").as_deref(),
            UPDATE_TIMEOUT,
            &mut diagnostics,
        ) else {
            return UpdateResourceResponse {
                new_state: request.planned_state,
                diagnostics,
            };
        };

        let timeout = ctx.remaining().unwrap_or(UPDATE_TIMEOUT);
        let client = &self.provider_data.client;
        let (payload, building_id) = (&building, id.as_str());
        let updated = retry_api_call(&ctx, timeout, OperationKind::Write, move || async move {
            client.buildings().update(building_id, payload).await
        })
        .await;

        if let Err(e) = updated {
            diagnostics.add_error(
                "Failed to update building",
                format!("Failed to update building '{}' (ID: {}): {}", building.name, id, e),
            );
            return UpdateResourceResponse {
                new_state: request.prior_state,
                diagnostics,
            };
        }

        let mut new_state = request.planned_state;
        new_state.set_id(&id);

        let mut response = UpdateResourceResponse {
            new_state: new_state.clone(),
            diagnostics,
        };

        let read_result = read_with_retry(
            &ctx,
            move |ctx, req, _attempt| async move { self.read_building(&ctx, req, false).await },
            ReadResourceRequest::new(TYPE_NAME, new_state),
            &mut response,
            ReadWithRetryOptions::for_operation("Update", TYPE_NAME),
        )
        .await;

        if let Err(e) = read_result {
            response.diagnostics.add_error(
                "Failed to read building after update",
                e.to_string(),
            );
        }

        response
    }

    async fn delete(&self, ctx: Context, request: DeleteResourceRequest) -> DeleteResourceResponse {
        let mut diagnostics = Diagnostics::new();
        let mut state = request.prior_state;

        if state.id().is_empty() {
            return DeleteResourceResponse { diagnostics };
        }

        let Some(ctx) = handle_timeout(
            &ctx,
            configured_timeout(&state, "delete").as_deref(),
            DELETE_TIMEOUT,
            &mut diagnostics,
        ) else {
            return DeleteResourceResponse { diagnostics };
        };

        let timeout = ctx.remaining().unwrap_or(DELETE_TIMEOUT);
        let client = &self.provider_data.client;
        let result = delete_with_retry(&ctx, &mut state, timeout, move |id| async move {
            client.buildings().delete(&id).await
        })
        .await;

        diagnostics.extend(result);
        DeleteResourceResponse { diagnostics }
    }
}

/// `timeouts.<operation>` from config or state, when set
fn configured_timeout(value: &DynamicValue, operation: &str) -> Option<String> {
    value
        .get_optional_string(&AttributePath::new("timeouts").attribute(operation))
        .ok()
        .flatten()
}

fn building_from_state(config: &DynamicValue) -> Result<Building, Diagnostic> {
    let name = config
        .get_string(&AttributePath::new("name"))
        .map_err(|_| {
            Diagnostic::error("Missing name", "The 'name' attribute is required")
                .with_attribute(AttributePath::new("name"))
        })?;

    let optional = |attr: &str| {
        config
            .get_optional_string(&AttributePath::new(attr))
            .ok()
            .flatten()
    };

    Ok(Building {
        id: None,
        name,
        street_address1: optional("street_address1"),
        street_address2: optional("street_address2"),
        city: optional("city"),
        state_province: optional("state_province"),
        zip_postal_code: optional("zip_postal_code"),
        country: optional("country"),
    })
}

fn apply_building(state: &mut DynamicValue, building: &Building) -> tfplug::Result<()> {
    if let Some(id) = &building.id {
        state.set_string(&AttributePath::new("id"), id.clone())?;
    }
    state.set_string(&AttributePath::new("name"), building.name.clone())?;

    let values = [
        &building.street_address1,
        &building.street_address2,
        &building.city,
        &building.state_province,
        &building.zip_postal_code,
        &building.country,
    ];
    for (attr, value) in ADDRESS_ATTRIBUTES.iter().zip(values) {
        // the API returns "" for unset fields
        let value = value.clone().filter(|v| !v.is_empty());
        state.set_optional_string(&AttributePath::new(attr), value)?;
    }

    Ok(())
}
