use std::borrow::Cow;

use axum::{
    extract::{Form, State},
    response::{Html, Response},
};
use axum_extra::extract::cookie::CookieJar;
use tracing::{info, warn};

use crate::web::{
    AppState,
    auth::{Access, AdminIdentity, Principal},
    responses::PortalError,
    session::{Flash, RequestSession},
    templates::{PageLayout, render_page},
};

use super::types::AdminLoginForm;

/// Loads the session and lets the request through only with an admin login.
pub async fn require_admin_user(
    state: &AppState,
    jar: CookieJar,
) -> Result<(RequestSession, AdminIdentity), Response> {
    let session = RequestSession::load(state.sessions(), jar).await;
    match Principal::from_session(session.data()).require_admin() {
        Access::Allowed(admin) => Ok((session, admin)),
        Access::DeniedRedirect { target, flash } => {
            Err(session.flash_redirect(flash, target).await)
        }
    }
}

pub async fn login_page(State(state): State<AppState>, jar: CookieJar) -> Response {
    let mut session = RequestSession::load(state.sessions(), jar).await;
    let flash = session.take_flash();
    let principal = Principal::from_session(session.data());

    let body = r#"<section class="panel">
    <h1>Login Admin</h1>
    <form method="post" action="/admin">
        <label for="email">Email</label>
        <input id="email" type="email" name="email" required>
        <label for="pin">PIN</label>
        <input id="pin" type="password" name="pin" required>
        <button type="submit">Entrar</button>
    </form>
</section>"#;

    let page = render_page(PageLayout {
        title: "Login Admin",
        principal: &principal,
        flash: flash.as_ref(),
        body_html: Cow::Borrowed(body),
    });
    session.respond(Html(page)).await
}

pub async fn process_login(
    State(state): State<AppState>,
    jar: CookieJar,
    Form(form): Form<AdminLoginForm>,
) -> Response {
    let mut session = RequestSession::load(state.sessions(), jar).await;
    let admin = &state.config().admin;

    if admin.matches(&form.email, &form.pin) {
        info!(email = %admin.email(), "admin logged in");
        session.login_admin(admin.email());
        return session
            .flash_redirect(
                Flash::success("Login de Admin realizado com sucesso!"),
                "/admin/dashboard",
            )
            .await;
    }

    warn!(email = %form.email.trim(), "admin login rejected");
    let err = PortalError::Auth("Email ou PIN incorretos.".to_string());
    session.flash_redirect(err.into(), "/admin").await
}

pub async fn logout(State(state): State<AppState>, jar: CookieJar) -> Response {
    let mut session = RequestSession::load(state.sessions(), jar).await;
    session.logout_admin();
    session
        .flash_redirect(
            Flash::info("Você saiu da sua conta de administrador."),
            "/",
        )
        .await
}
