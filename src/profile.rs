//! Interest-form (profile setup) endpoints.

use std::sync::Arc;

use http::StatusCode;
use tracing::debug;

use crate::error::{SessionError, SessionResult};
use crate::models::InterestForm;
use crate::pipeline::ApiClient;
use crate::transport::ApiRequest;

const CHECK_FIRST_LOGIN_PATH: &str = "/interest-form/check-first-login";
const SUBMIT_PATH: &str = "/interest-form/submit";
const GET_FORM_PATH: &str = "/interest-form/get-form";
const UPDATE_FORM_PATH: &str = "/interest-form/update-form";

/// Profile setup calls. All of them are authenticated and go through the
/// request pipeline.
pub struct ProfileService {
    client: Arc<ApiClient>,
}

impl ProfileService {
    pub fn new(client: Arc<ApiClient>) -> Self {
        ProfileService { client }
    }

    /// Whether the user has already submitted the setup form.
    ///
    /// A 404 or 403 from the backend means "not yet"; other failures are
    /// returned to the caller.
    pub async fn check_first_login(&self) -> SessionResult<bool> {
        match self.client.get_json::<bool>(CHECK_FIRST_LOGIN_PATH).await {
            Ok(complete) => Ok(complete),
            Err(SessionError::RequestFailed { status, .. })
                if status == StatusCode::NOT_FOUND || status == StatusCode::FORBIDDEN =>
            {
                debug!("First-login check answered {}; treating setup as incomplete", status);
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }

    /// Submits the one-time setup form. Returns the backend's stored record.
    pub async fn submit(&self, form: &InterestForm) -> SessionResult<serde_json::Value> {
        self.client.post_json(SUBMIT_PATH, form).await
    }

    /// Fetches the submitted form, `None` if there is none yet.
    pub async fn get_form(&self) -> SessionResult<Option<InterestForm>> {
        match self.client.execute(ApiRequest::get(GET_FORM_PATH)).await {
            Ok(response) => response.json().map(Some),
            Err(SessionError::RequestFailed { status, .. }) if status == StatusCode::NOT_FOUND => {
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    pub async fn update_form(&self, form: &InterestForm) -> SessionResult<serde_json::Value> {
        self.client.put_json(UPDATE_FORM_PATH, form).await
    }
}
