use axum::extract::State;
use axum::{body::Body, extract::Request, http, http::Response, middleware::Next};

use crate::auth::authorizer::RequestContext;
use crate::core::error::Error;
use crate::core::state::AppState;

/// Request middleware: verify the bearer token (or take a cached allow),
/// enforce the decision's resource scope against the requested path, and
/// attach the caller's `IdentityContext` for the handlers.
pub(crate) async fn authorize(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response<Body>, Error> {
    let token = bearer_token(request.headers())?.to_owned();
    let path = request.uri().path().to_owned();

    let authorization = match state.decisions.get(&token).await {
        Some(authorization) => authorization,
        None => {
            let ctx = RequestContext {
                method: request.method(),
                path: &path,
            };

            let authorization = state.authorizer.authorize(&token, &ctx).await?;
            state.decisions.insert(&token, authorization.clone()).await;

            authorization
        }
    };

    // Coarse positional check; handlers re-check ownership per record.
    if !authorization.decision.scope.permits(&path) {
        return Err(Error::Forbidden);
    }

    request.extensions_mut().insert(authorization.identity);

    Ok(next.run(request).await)
}

fn bearer_token(headers: &http::HeaderMap) -> Result<&str, Error> {
    let header = headers
        .get(http::header::AUTHORIZATION)
        .ok_or(Error::MissingToken)?;

    let mut parts = header
        .to_str()
        .map_err(|_| Error::MalformedToken)?
        .split_whitespace();

    match (parts.next(), parts.next(), parts.next()) {
        (Some(scheme), Some(token), None) if scheme.eq_ignore_ascii_case("bearer") => Ok(token),
        _ => Err(Error::MalformedToken),
    }
}
