use std::borrow::Cow;

use axum::{
    extract::{Form, State},
    response::{Html, Response},
};
use axum_extra::extract::cookie::CookieJar;
use tracing::{error, info};

use crate::web::{
    AppState,
    auth::Principal,
    data::{self, DataError},
    responses::PortalError,
    session::Flash,
    templates::{PageLayout, escape_html, render_page, server_error},
};

use super::{auth::require_admin_user, types::CatalogEntryForm};

/// The two name-only tables the admin maintains.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Catalog {
    Courses,
    Focuses,
}

impl Catalog {
    fn path(self) -> &'static str {
        match self {
            Catalog::Courses => "/admin/cursos",
            Catalog::Focuses => "/admin/focos",
        }
    }

    fn title(self) -> &'static str {
        match self {
            Catalog::Courses => "Gerenciar Cursos",
            Catalog::Focuses => "Gerenciar Focos",
        }
    }

    fn singular(self) -> &'static str {
        match self {
            Catalog::Courses => "Curso",
            Catalog::Focuses => "Foco",
        }
    }

    fn hint(self) -> &'static str {
        match self {
            Catalog::Courses => "Ex.: Matemática, Física, Química",
            Catalog::Focuses => "Ex.: Básico, Intermediário, Avançado",
        }
    }

    async fn names(self, state: &AppState) -> Result<Vec<String>, DataError> {
        let names = match self {
            Catalog::Courses => data::list_courses(state.pool_ref())
                .await?
                .into_iter()
                .map(|course| course.name)
                .collect(),
            Catalog::Focuses => data::list_focuses(state.pool_ref())
                .await?
                .into_iter()
                .map(|focus| focus.name)
                .collect(),
        };
        Ok(names)
    }

    async fn exists(self, state: &AppState, name: &str) -> Result<bool, DataError> {
        let found = match self {
            Catalog::Courses => data::find_course_by_name(state.pool_ref(), name)
                .await?
                .is_some(),
            Catalog::Focuses => data::find_focus_by_name(state.pool_ref(), name)
                .await?
                .is_some(),
        };
        Ok(found)
    }

    async fn create(self, state: &AppState, name: &str) -> Result<i64, DataError> {
        let id = match self {
            Catalog::Courses => data::create_course(state.pool_ref(), name).await?.id,
            Catalog::Focuses => data::create_focus(state.pool_ref(), name).await?.id,
        };
        Ok(id)
    }
}

pub async fn courses_page(State(state): State<AppState>, jar: CookieJar) -> Response {
    list_page(state, jar, Catalog::Courses).await
}

pub async fn create_course(
    State(state): State<AppState>,
    jar: CookieJar,
    Form(form): Form<CatalogEntryForm>,
) -> Response {
    create_entry(state, jar, form, Catalog::Courses).await
}

pub async fn focuses_page(State(state): State<AppState>, jar: CookieJar) -> Response {
    list_page(state, jar, Catalog::Focuses).await
}

pub async fn create_focus(
    State(state): State<AppState>,
    jar: CookieJar,
    Form(form): Form<CatalogEntryForm>,
) -> Response {
    create_entry(state, jar, form, Catalog::Focuses).await
}

async fn list_page(state: AppState, jar: CookieJar, catalog: Catalog) -> Response {
    let (mut session, _admin) = match require_admin_user(&state, jar).await {
        Ok(allowed) => allowed,
        Err(denied) => return denied,
    };

    let names = match catalog.names(&state).await {
        Ok(names) => names,
        Err(err) => {
            error!(?err, ?catalog, "failed to list catalog entries");
            return server_error();
        }
    };

    let rows = if names.is_empty() {
        r#"<tr><td>Nenhum registro ainda.</td></tr>"#.to_string()
    } else {
        names
            .iter()
            .map(|name| format!("<tr><td>{}</td></tr>", escape_html(name)))
            .collect()
    };

    let body = format!(
        r#"<section class="panel">
    <h1>{title}</h1>
    <form method="post" action="{path}">
        <label for="nome">Novo {singular}</label>
        <input id="nome" name="nome" placeholder="{hint}" required>
        <button type="submit">Adicionar</button>
    </form>
</section>
<section class="panel">
    <table>
        <thead><tr><th>{singular}</th></tr></thead>
        <tbody>{rows}</tbody>
    </table>
</section>"#,
        title = catalog.title(),
        path = catalog.path(),
        singular = catalog.singular(),
        hint = catalog.hint(),
    );

    let flash = session.take_flash();
    let principal = Principal::from_session(session.data());
    let page = render_page(PageLayout {
        title: catalog.title(),
        principal: &principal,
        flash: flash.as_ref(),
        body_html: Cow::Owned(body),
    });
    session.respond(Html(page)).await
}

async fn create_entry(
    state: AppState,
    jar: CookieJar,
    form: CatalogEntryForm,
    catalog: Catalog,
) -> Response {
    let (session, _admin) = match require_admin_user(&state, jar).await {
        Ok(allowed) => allowed,
        Err(denied) => return denied,
    };

    let name = form.nome.as_deref().map(str::trim).unwrap_or_default();
    if name.is_empty() {
        let err = PortalError::Validation(format!("Informe o nome do {}.", catalog.singular()));
        return session.flash_redirect(err.into(), catalog.path()).await;
    }

    let duplicate = || {
        PortalError::Validation(format!(
            r#"O {} "{}" já existe!"#,
            catalog.singular(),
            name
        ))
    };

    match catalog.exists(&state, name).await {
        Ok(true) => return session.flash_redirect(duplicate().into(), catalog.path()).await,
        Ok(false) => {}
        Err(err) => {
            error!(?err, ?catalog, "failed to check catalog entry");
            return server_error();
        }
    }

    match catalog.create(&state, name).await {
        Ok(id) => {
            info!(?catalog, id, name, "catalog entry created");
            let message = format!(
                r#"{} "{}" adicionado com sucesso!"#,
                catalog.singular(),
                name
            );
            session
                .flash_redirect(Flash::success(message), catalog.path())
                .await
        }
        Err(DataError::Duplicate { .. }) => {
            session
                .flash_redirect(duplicate().into(), catalog.path())
                .await
        }
        Err(err) => {
            error!(?err, ?catalog, "failed to create catalog entry");
            server_error()
        }
    }
}

#[cfg(test)]
mod tests {
    use axum::http::{StatusCode, header};
    use tempfile::tempdir;

    use super::*;
    use crate::web::{
        session::{FlashLevel, RequestSession, tests::jar_from_response},
        state::tests::{TEST_ADMIN_EMAIL, test_state},
    };

    async fn admin_jar(state: &AppState) -> CookieJar {
        let mut session = RequestSession::load(state.sessions(), CookieJar::new()).await;
        session.login_admin(TEST_ADMIN_EMAIL);
        session.commit().await
    }

    fn entry(name: &str) -> Form<CatalogEntryForm> {
        Form(CatalogEntryForm {
            nome: Some(name.to_string()),
        })
    }

    #[tokio::test]
    async fn duplicate_course_is_rejected_with_warning() {
        let dir = tempdir().expect("tempdir");
        let state = test_state(dir.path().to_path_buf()).await;
        let jar = admin_jar(&state).await;

        let response = create_course(State(state.clone()), jar.clone(), entry("Física")).await;
        assert_eq!(
            response.headers().get(header::LOCATION).expect("location"),
            "/admin/cursos"
        );
        let mut session = RequestSession::load(state.sessions(), jar.clone()).await;
        assert_eq!(
            session.take_flash().map(|flash| flash.level),
            Some(FlashLevel::Success)
        );
        session.commit().await;

        create_course(State(state.clone()), jar.clone(), entry("Física")).await;
        let mut session = RequestSession::load(state.sessions(), jar).await;
        let flash = session.take_flash().expect("flash");
        assert_eq!(flash.level, FlashLevel::Warning);
        assert!(flash.message.contains("já existe"));

        let courses = data::list_courses(state.pool_ref()).await.expect("list");
        assert_eq!(courses.len(), 1);
    }

    #[tokio::test]
    async fn blank_focus_name_is_not_created() {
        let dir = tempdir().expect("tempdir");
        let state = test_state(dir.path().to_path_buf()).await;
        let jar = admin_jar(&state).await;

        let response = create_focus(State(state.clone()), jar, entry("   ")).await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert!(data::list_focuses(state.pool_ref()).await.expect("list").is_empty());
    }

    #[tokio::test]
    async fn catalog_routes_require_admin() {
        let dir = tempdir().expect("tempdir");
        let state = test_state(dir.path().to_path_buf()).await;

        let response = create_focus(State(state.clone()), CookieJar::new(), entry("Básico")).await;
        assert_eq!(
            response.headers().get(header::LOCATION).expect("location"),
            "/admin"
        );
        assert!(data::list_focuses(state.pool_ref()).await.expect("list").is_empty());

        let response = courses_page(State(state.clone()), CookieJar::new()).await;
        let jar = jar_from_response(&response);
        let mut session = RequestSession::load(state.sessions(), jar).await;
        assert_eq!(
            session.take_flash().map(|flash| flash.level),
            Some(FlashLevel::Danger)
        );
    }

    #[tokio::test]
    async fn list_page_shows_entries_in_creation_order() {
        let dir = tempdir().expect("tempdir");
        let state = test_state(dir.path().to_path_buf()).await;
        data::create_focus(state.pool_ref(), "Básico").await.expect("focus");
        data::create_focus(state.pool_ref(), "Avançado").await.expect("focus");
        let jar = admin_jar(&state).await;

        let response = focuses_page(State(state), jar).await;
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body");
        let html = String::from_utf8(body.to_vec()).expect("utf8");
        let basic = html.find("<td>Básico</td>").expect("basic row");
        let advanced = html.find("<td>Avançado</td>").expect("advanced row");
        assert!(basic < advanced);
    }
}
