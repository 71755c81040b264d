use crate::{
    email_client::EmailClient,
    registration::{register_subscriber, RegisterError, RegistrationRequest},
    subscriber_store::PgSubscriberStore,
};

use {
    actix_web::{
        error::{InternalError, JsonPayloadError},
        http::StatusCode,
        web, HttpRequest, HttpResponse, ResponseError,
    },
    serde::Serialize,
};

#[derive(Serialize)]
struct Confirmation {
    message: &'static str,
}

#[derive(Serialize)]
struct ErrorDetail {
    detail: String,
}

impl ResponseError for RegisterError {
    fn status_code(&self) -> StatusCode {
        match self {
            // 404 for a missing field is kept for compatibility with existing clients
            RegisterError::MissingEmail => StatusCode::NOT_FOUND,
            RegisterError::InvalidEmail(_) => StatusCode::NOT_ACCEPTABLE,
            RegisterError::AlreadyRegistered => StatusCode::CONFLICT,
            RegisterError::Unexpected(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let detail = match self {
            RegisterError::Unexpected(_) => "Internal server error.".to_string(),
            other => other.to_string(),
        };
        HttpResponse::build(self.status_code()).json(ErrorDetail { detail })
    }
}

#[tracing::instrument(name = "Register endpoint", skip(body, store, email_client))]
pub async fn register(
    body: web::Json<RegistrationRequest>,
    store: web::Data<PgSubscriberStore>,
    email_client: web::Data<EmailClient>,
) -> Result<HttpResponse, RegisterError> {
    register_subscriber(body.into_inner(), store.get_ref(), email_client.get_ref()).await?;

    Ok(HttpResponse::Created().json(Confirmation {
        message: "Email registered successfully.",
    }))
}

/// Rejects bodies that are not a JSON object with 422, before the handler runs.
pub fn json_error_handler(err: JsonPayloadError, _request: &HttpRequest) -> actix_web::Error {
    tracing::warn!(error = %err, "Rejected a registration body");
    let detail = match &err {
        // Well-formed JSON of the wrong shape, e.g. an array or a bare string
        JsonPayloadError::Deserialize(e) if e.is_data() => "Request body must be a JSON object.",
        _ => "Request body is not valid JSON.",
    };
    let response = HttpResponse::build(StatusCode::UNPROCESSABLE_ENTITY).json(ErrorDetail {
        detail: detail.to_string(),
    });
    InternalError::from_response(err, response).into()
}
