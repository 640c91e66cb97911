use std::borrow::Cow;

use axum::{
    extract::{Path as AxumPath, Query, State},
    response::{Html, Response},
};
use axum_extra::extract::cookie::CookieJar;
use serde::Deserialize;
use tracing::error;

use crate::web::{
    AppState,
    auth::{Principal, require_student},
    data::{self, DataError},
    models::{FocusRow, MaterialRow},
    session::RequestSession,
    templates::{PageLayout, escape_html, not_found_page, render_page, server_error},
};

/// Materials of one course that share a focus.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FocusGroup {
    pub focus_name: String,
    pub materials: Vec<MaterialRow>,
}

/// Buckets `materials` under their focus, keeping the order of `focuses` and dropping empty
/// buckets.
pub fn group_by_focus(focuses: &[FocusRow], materials: &[MaterialRow]) -> Vec<FocusGroup> {
    focuses
        .iter()
        .filter_map(|focus| {
            let grouped: Vec<MaterialRow> = materials
                .iter()
                .filter(|material| material.focus_id == focus.id)
                .cloned()
                .collect();
            (!grouped.is_empty()).then(|| FocusGroup {
                focus_name: focus.name.clone(),
                materials: grouped,
            })
        })
        .collect()
}

pub async fn index(State(state): State<AppState>, jar: CookieJar) -> Response {
    let mut session = RequestSession::load(state.sessions(), jar).await;

    let courses = data::list_courses(state.pool_ref()).await;
    let focuses = data::list_focuses(state.pool_ref()).await;
    let (courses, focuses) = match (courses, focuses) {
        (Ok(courses), Ok(focuses)) => (courses, focuses),
        (Err(err), _) | (_, Err(err)) => {
            error!(?err, "failed to load catalog for landing page");
            return server_error();
        }
    };

    let course_cards = if courses.is_empty() {
        r#"<p class="note">Nenhum curso cadastrado ainda.</p>"#.to_string()
    } else {
        let cards = courses
            .iter()
            .map(|course| {
                format!(
                    r#"<a class="card" href="/curso/{id}"><strong>{name}</strong><p class="note">Ver materiais →</p></a>"#,
                    id = course.id,
                    name = escape_html(&course.name),
                )
            })
            .collect::<String>();
        format!(r#"<div class="grid">{cards}</div>"#)
    };

    let focus_list = if focuses.is_empty() {
        r#"<p class="note">Nenhum foco cadastrado ainda.</p>"#.to_string()
    } else {
        let items = focuses
            .iter()
            .map(|focus| format!("<li>{}</li>", escape_html(&focus.name)))
            .collect::<String>();
        format!("<ul>{items}</ul>")
    };

    let body = format!(
        r#"<section class="panel">
    <h1>Cursos Disponíveis</h1>
    {course_cards}
</section>
<section class="panel">
    <h2>Focos de estudo</h2>
    {focus_list}
</section>"#
    );

    let flash = session.take_flash();
    let principal = Principal::from_session(session.data());
    let page = render_page(PageLayout {
        title: "Cursos Disponíveis",
        principal: &principal,
        flash: flash.as_ref(),
        body_html: Cow::Owned(body),
    });
    session.respond(Html(page)).await
}

pub async fn course_detail(
    State(state): State<AppState>,
    jar: CookieJar,
    AxumPath(raw_id): AxumPath<String>,
) -> Response {
    let (mut session, _student) = match require_student(&state, jar).await {
        Ok(allowed) => allowed,
        Err(denied) => return denied,
    };
    let principal = Principal::from_session(session.data());

    let Ok(course_id) = raw_id.parse::<i64>() else {
        return session.respond(not_found_page(&principal)).await;
    };

    let course = match data::get_course(state.pool_ref(), course_id).await {
        Ok(course) => course,
        Err(DataError::NotFound { .. }) => {
            return session.respond(not_found_page(&principal)).await;
        }
        Err(err) => {
            error!(?err, course_id, "failed to load course");
            return server_error();
        }
    };

    let materials = data::list_materials_for_course(state.pool_ref(), course.id).await;
    let focuses = data::list_focuses(state.pool_ref()).await;
    let (materials, focuses) = match (materials, focuses) {
        (Ok(materials), Ok(focuses)) => (materials, focuses),
        (Err(err), _) | (_, Err(err)) => {
            error!(?err, course_id, "failed to load course materials");
            return server_error();
        }
    };

    let groups = group_by_focus(&focuses, &materials);
    let groups_html = if groups.is_empty() {
        r#"<section class="panel"><p class="note">Este curso ainda não possui materiais.</p></section>"#
            .to_string()
    } else {
        groups
            .iter()
            .map(|group| {
                format!(
                    r#"<section class="panel"><h2>{name}</h2>{items}</section>"#,
                    name = escape_html(&group.focus_name),
                    items = render_material_list(&group.materials),
                )
            })
            .collect::<String>()
    };

    let body = format!(
        r#"<h1>{name}</h1>
{groups_html}"#,
        name = escape_html(&course.name),
    );

    let flash = session.take_flash();
    let page = render_page(PageLayout {
        title: &course.name,
        principal: &principal,
        flash: flash.as_ref(),
        body_html: Cow::Owned(body),
    });
    session.respond(Html(page)).await
}

#[derive(Default, Deserialize)]
pub struct SearchQuery {
    #[serde(default)]
    pub termo: Option<String>,
}

pub async fn search(
    State(state): State<AppState>,
    jar: CookieJar,
    Query(query): Query<SearchQuery>,
) -> Response {
    let (mut session, _student) = match require_student(&state, jar).await {
        Ok(allowed) => allowed,
        Err(denied) => return denied,
    };

    let term = query.termo.as_deref().unwrap_or_default().trim().to_string();
    let results = match data::search_materials(state.pool_ref(), &term).await {
        Ok(results) => results,
        Err(err) => {
            error!(?err, "material search failed");
            return server_error();
        }
    };

    let results_html = if term.is_empty() {
        r#"<p class="note">Digite um termo para pesquisar.</p>"#.to_string()
    } else if results.is_empty() {
        r#"<p class="note">Nenhum material encontrado.</p>"#.to_string()
    } else {
        render_material_list(&results)
    };

    let body = format!(
        r#"<section class="panel">
    <h1>Resultados para '{term}'</h1>
    <form method="get" action="/pesquisa">
        <label for="termo">Pesquisar materiais</label>
        <input id="termo" name="termo" value="{term}">
        <button type="submit">Pesquisar</button>
    </form>
</section>
<section class="panel">
    {results_html}
</section>"#,
        term = escape_html(&term),
    );

    let title = format!("Resultados para '{term}'");
    let flash = session.take_flash();
    let principal = Principal::from_session(session.data());
    let page = render_page(PageLayout {
        title: &title,
        principal: &principal,
        flash: flash.as_ref(),
        body_html: Cow::Owned(body),
    });
    session.respond(Html(page)).await
}

fn render_material_list(materials: &[MaterialRow]) -> String {
    materials
        .iter()
        .map(|material| {
            let description = material
                .description
                .as_deref()
                .filter(|text| !text.trim().is_empty())
                .map(|text| format!(r#"<p class="note">{}</p>"#, escape_html(text)))
                .unwrap_or_default();
            format!(
                r#"<div class="material"><span class="kind">{kind}</span><a href="/uploads/{href}">{title}</a>{description}</div>"#,
                kind = material.kind.label(),
                href = escape_html(&material.filename),
                title = escape_html(&material.title),
            )
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use axum::{
        body::to_bytes,
        http::{StatusCode, header},
    };
    use tempfile::tempdir;

    use super::*;
    use crate::web::{
        data::tests::new_material,
        models::MaterialKind,
        state::tests::test_state,
    };

    fn material(id: i64, focus_id: i64) -> MaterialRow {
        MaterialRow {
            id,
            title: format!("m{id}"),
            description: None,
            kind: MaterialKind::Livro,
            filename: format!("m{id}.pdf"),
            course_id: 1,
            focus_id,
        }
    }

    fn focus(id: i64, name: &str) -> FocusRow {
        FocusRow {
            id,
            name: name.to_string(),
        }
    }

    async fn student_jar(state: &AppState) -> CookieJar {
        let mut session = RequestSession::load(state.sessions(), CookieJar::new()).await;
        session.login_student(1, "Ana");
        session.commit().await
    }

    async fn body_text(response: Response) -> String {
        let bytes = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body");
        String::from_utf8(bytes.to_vec()).expect("utf8")
    }

    #[test]
    fn grouping_skips_empty_focuses_and_keeps_focus_order() {
        let focuses = vec![focus(1, "Básico"), focus(2, "Avançado"), focus(3, "Revisão")];
        let materials = vec![material(1, 3), material(2, 1), material(3, 1), material(4, 1)];

        let groups = group_by_focus(&focuses, &materials);
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].focus_name, "Básico");
        assert_eq!(groups[0].materials.len(), 3);
        assert_eq!(groups[1].focus_name, "Revisão");
        assert_eq!(groups[1].materials, vec![material(1, 3)]);
    }

    #[test]
    fn grouping_with_no_materials_is_empty() {
        assert!(group_by_focus(&[focus(1, "Básico")], &[]).is_empty());
    }

    #[tokio::test]
    async fn course_detail_shows_only_populated_focus() {
        let dir = tempdir().expect("tempdir");
        let state = test_state(dir.path().to_path_buf()).await;
        let pool = state.pool_ref();
        let course = data::create_course(pool, "Matemática").await.expect("course");
        let basic = data::create_focus(pool, "Básico").await.expect("focus");
        data::create_focus(pool, "Avançado").await.expect("focus");
        for title in ["Frações", "Porcentagem", "Equações"] {
            data::create_material(pool, &new_material(title, course.id, basic.id))
                .await
                .expect("material");
        }

        let jar = student_jar(&state).await;
        let response =
            course_detail(State(state.clone()), jar, AxumPath(course.id.to_string())).await;
        assert_eq!(response.status(), StatusCode::OK);
        let html = body_text(response).await;
        assert!(html.contains("<h2>Básico</h2>"));
        assert!(!html.contains("Avançado</h2>"));
        assert_eq!(html.matches(r#"class="material""#).count(), 3);
    }

    #[tokio::test]
    async fn unknown_course_is_not_found() {
        let dir = tempdir().expect("tempdir");
        let state = test_state(dir.path().to_path_buf()).await;
        let jar = student_jar(&state).await;

        let response =
            course_detail(State(state.clone()), jar.clone(), AxumPath("99".to_string())).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let response = course_detail(State(state), jar, AxumPath("abc".to_string())).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn course_detail_requires_student() {
        let dir = tempdir().expect("tempdir");
        let state = test_state(dir.path().to_path_buf()).await;
        let response =
            course_detail(State(state), CookieJar::new(), AxumPath("1".to_string())).await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(
            response.headers().get(header::LOCATION).expect("location"),
            "/login"
        );
    }

    #[tokio::test]
    async fn search_with_blank_term_lists_nothing() {
        let dir = tempdir().expect("tempdir");
        let state = test_state(dir.path().to_path_buf()).await;
        let pool = state.pool_ref();
        let course = data::create_course(pool, "Física").await.expect("course");
        let focus = data::create_focus(pool, "Básico").await.expect("focus");
        data::create_material(pool, &new_material("Óptica", course.id, focus.id))
            .await
            .expect("material");

        let jar = student_jar(&state).await;
        let response = search(
            State(state.clone()),
            jar.clone(),
            Query(SearchQuery {
                termo: Some("  ".to_string()),
            }),
        )
        .await;
        let html = body_text(response).await;
        assert!(!html.contains(r#"class="material""#));

        let response = search(
            State(state),
            jar,
            Query(SearchQuery {
                termo: Some("óPTICA".to_string()),
            }),
        )
        .await;
        let html = body_text(response).await;
        assert_eq!(html.matches(r#"class="material""#).count(), 1);
    }

    #[tokio::test]
    async fn index_is_public() {
        let dir = tempdir().expect("tempdir");
        let state = test_state(dir.path().to_path_buf()).await;
        data::create_course(state.pool_ref(), "Química")
            .await
            .expect("course");
        data::create_focus(state.pool_ref(), "Avançado")
            .await
            .expect("focus");

        let response = index(State(state), CookieJar::new()).await;
        assert_eq!(response.status(), StatusCode::OK);
        let html = body_text(response).await;
        assert!(html.contains("Química"));
        assert!(html.contains("<li>Avançado</li>"));
    }
}
