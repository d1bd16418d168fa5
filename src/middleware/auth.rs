//! Middleware de autenticación JWT
//!
//! Verifica el token del proveedor de identidad y resuelve el `Actor`
//! que se inyecta en las extensions de la request.

use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::Response,
};

use crate::{
    models::{Actor, JwtClaims, UserRole},
    services::JwtService,
    state::AppState,
    utils::errors::AppError,
};

/// Extraer y validar el token `Bearer` del header Authorization
fn bearer_claims(state: &AppState, request: &Request) -> Result<JwtClaims, AppError> {
    let token = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|auth_str| auth_str.to_str().ok())
        .and_then(|auth_str| auth_str.strip_prefix("Bearer "))
        .ok_or_else(|| AppError::Unauthorized("Authorization token required".to_string()))?;

    state.jwt.validate_token(token.trim())
}

/// Resolver el actor de unos claims ya validados
async fn resolve_actor(state: &AppState, claims: &JwtClaims) -> Result<Actor, AppError> {
    let user_id = JwtService::subject(claims)?;

    match claims.role {
        UserRole::Admin => Ok(Actor::Admin { user_id }),
        UserRole::Driver => {
            let profile = state
                .store
                .find_driver_by_user(user_id)
                .await?
                .ok_or_else(|| AppError::Forbidden("No driver profile for this account".to_string()))?;
            Ok(Actor::Driver {
                user_id,
                driver_id: profile.id,
            })
        }
    }
}

async fn authorize(
    state: AppState,
    mut request: Request,
    next: Next,
    allowed: &[UserRole],
) -> Result<Response, AppError> {
    let claims = bearer_claims(&state, &request)?;

    if !allowed.contains(&claims.role) {
        return Err(AppError::Forbidden(format!(
            "Role '{}' cannot access this resource",
            claims.role.as_str()
        )));
    }

    let actor = resolve_actor(&state, &claims).await?;
    request.extensions_mut().insert(actor);

    Ok(next.run(request).await)
}

/// Solo administradores
pub async fn require_admin(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    authorize(state, request, next, &[UserRole::Admin]).await
}

/// Solo conductores con perfil
pub async fn require_driver(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    authorize(state, request, next, &[UserRole::Driver]).await
}

/// Administradores o conductores
pub async fn require_staff(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    authorize(state, request, next, &[UserRole::Admin, UserRole::Driver]).await
}
