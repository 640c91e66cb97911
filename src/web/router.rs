use axum::{
    Router,
    extract::DefaultBodyLimit,
    http::StatusCode,
    response::IntoResponse,
    routing::get,
};

use crate::web::{AppState, admin, auth, landing, storage};

pub fn build_router(state: AppState) -> Router {
    let upload_limit = state.config().max_upload_bytes;

    Router::new()
        .route("/", get(landing::index))
        .route("/healthz", get(healthz))
        .route("/cadastro", get(auth::registration_page).post(auth::process_registration))
        .route("/login", get(auth::login_page).post(auth::process_login))
        .route("/aluno/logout", get(auth::logout))
        .route("/aluno/dashboard", get(auth::student_dashboard))
        .route("/curso/:id", get(landing::course_detail))
        .route("/pesquisa", get(landing::search))
        .route("/uploads/*path", get(storage::serve_upload))
        .route("/admin", get(admin::login_page).post(admin::process_login))
        .route("/admin/logout", get(admin::logout))
        .route("/admin/dashboard", get(admin::dashboard))
        .route("/admin/cursos", get(admin::courses_page).post(admin::create_course))
        .route("/admin/focos", get(admin::focuses_page).post(admin::create_focus))
        .route(
            "/admin/upload",
            get(admin::upload_page)
                .post(admin::upload_material)
                .layer(DefaultBodyLimit::max(upload_limit)),
        )
        .with_state(state)
}

async fn healthz() -> impl IntoResponse {
    StatusCode::OK
}
