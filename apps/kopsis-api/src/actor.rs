//! Who is acting on a request.
//!
//! Authentication happens in front of this service; the gateway forwards the
//! authenticated user in two headers. Requests without them act as the
//! configured default actor.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;

use kopsis_core::validation::MAX_NAME_LEN;
use kopsis_core::Actor;

use crate::error::ApiError;
use crate::SharedState;

pub const ACTOR_ID_HEADER: &str = "x-actor-id";
pub const ACTOR_NAME_HEADER: &str = "x-actor-name";

/// Extractor yielding the [`Actor`] recorded in audit entries.
#[derive(Debug, Clone)]
pub struct CurrentActor(pub Actor);

impl FromRequestParts<SharedState> for CurrentActor {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &SharedState) -> Result<Self, Self::Rejection> {
        let header = |name: &str| -> Result<Option<String>, ApiError> {
            match parts.headers.get(name) {
                None => Ok(None),
                Some(value) => {
                    let value = value
                        .to_str()
                        .map_err(|_| ApiError::validation(format!("{} is not valid text", name)))?
                        .trim();
                    if value.len() > MAX_NAME_LEN {
                        return Err(ApiError::validation(format!("{} is too long", name)));
                    }
                    Ok((!value.is_empty()).then(|| value.to_string()))
                }
            }
        };

        let actor = match header(ACTOR_ID_HEADER)? {
            Some(id) => {
                let name = header(ACTOR_NAME_HEADER)?.unwrap_or_else(|| id.clone());
                Actor::new(id, name)
            }
            None => state.config.default_actor(),
        };

        Ok(CurrentActor(actor))
    }
}
