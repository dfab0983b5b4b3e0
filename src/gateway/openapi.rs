//! OpenAPI / Swagger UI Documentation
//!
//! - Swagger UI: `http://localhost:8080/docs`
//! - OpenAPI JSON: `http://localhost:8080/api-docs/openapi.json`

use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};

use crate::gateway::handlers::{CreateAccountRequest, CreateTransferRequest, HealthResponse};
use crate::ledger::{Account, Currency, Entry, Transfer, TransferTxResult};
use crate::user_auth::{CreateUserRequest, LoginUserRequest, LoginUserResponse, UserResponse};

/// Bearer access token issued by `/api/v1/users/login`
struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .description(Some("Authorization: Bearer <access_token>"))
                        .build(),
                ),
            );
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Simple Bank API",
        version = "1.0.0",
        description = "Accounts, ledger entries and atomic money transfers.",
        license(
            name = "MIT"
        )
    ),
    servers(
        (url = "http://localhost:8080", description = "Development"),
    ),
    paths(
        crate::gateway::handlers::health::health_check,
        crate::user_auth::handlers::create_user,
        crate::user_auth::handlers::login_user,
        crate::gateway::handlers::account::create_account,
        crate::gateway::handlers::account::get_account,
        crate::gateway::handlers::account::list_accounts,
        crate::gateway::handlers::account::delete_account,
        crate::gateway::handlers::transfer::create_transfer,
    ),
    components(
        schemas(
            HealthResponse,
            Account,
            Entry,
            Transfer,
            TransferTxResult,
            Currency,
            CreateAccountRequest,
            CreateTransferRequest,
            CreateUserRequest,
            LoginUserRequest,
            LoginUserResponse,
            UserResponse,
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Users", description = "Registration and login"),
        (name = "Accounts", description = "Account management (auth required)"),
        (name = "Transfers", description = "Money transfers (auth required)"),
        (name = "System", description = "Health checks")
    )
)]
pub struct ApiDoc;
