use http_client::{
    Request, Response,
    http_types::{StatusCode, mime},
};
use log::trace;

use crate::{
    api::auth::ApiCredentials,
    error::{ProgressError, RawProgressError},
};

pub mod auth;
pub mod shelves;
pub mod writer;

fn authenticated(mut request: Request, auth: &ApiCredentials) -> Request {
    request.set_content_type(mime::JSON);
    request.append_header("Authorization", format!("Bearer {}", auth.token));
    request.append_header("Accept", "application/json");
    request
}

/// Maps non-success responses to errors, consuming the body of rejected responses as diagnostic
/// text.
async fn check_ok(response: &mut Response) -> Result<(), ProgressError> {
    let code = response.status();
    if code.is_success() {
        return Ok(());
    }

    if code == StatusCode::Unauthorized {
        return Err(ProgressError::unauthenticated());
    }

    let body = match response.body_string().await {
        Ok(body) => body,
        Err(e) => {
            trace!("Could not read body of rejected response: {e}");
            String::new()
        }
    };
    Err(RawProgressError::Rejected { code, body }.into())
}
