use utoipa::openapi::security::{ApiKey, ApiKeyValue, HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};

use crate::cache::DateRange;
use crate::handlers::RegistrationResponse;
use crate::models::{MyClassEntry, SessionWithClass};
use crate::view_model::{ScheduleSnapshot, SessionView};

pub struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(HttpBuilder::new().scheme(HttpAuthScheme::Bearer).build()),
        );
        components.add_security_scheme(
            "query_token",
            SecurityScheme::ApiKey(ApiKey::Query(ApiKeyValue::new("token"))),
        );
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        crate::handlers::root,
        crate::handlers::healthz_live,
        crate::handlers::healthz_ready,
        crate::handlers::get_schedule,
        crate::handlers::refresh_schedule,
        crate::handlers::get_my_classes,
        crate::handlers::get_my_classes_ical,
        crate::handlers::join_session,
        crate::handlers::cancel_session,
        crate::handlers::clear_session_error,
        crate::handlers::logout
    ),
    components(schemas(
        ScheduleSnapshot,
        SessionView,
        SessionWithClass,
        MyClassEntry,
        DateRange,
        RegistrationResponse
    )),
    tags(
        (name = "schedule", description = "Class schedule and registrations")
    ),
    modifiers(&SecurityAddon),
)]
pub struct ApiDoc;
