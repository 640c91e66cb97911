use std::borrow::Cow;

use axum::{
    extract::State,
    response::{Html, Response},
};
use axum_extra::extract::cookie::CookieJar;
use tracing::error;

use crate::web::{
    AppState,
    auth::Principal,
    data,
    models::{CatalogCounts, StudentRow},
    templates::{PageLayout, escape_html, render_page, server_error},
};

use super::auth::require_admin_user;

pub async fn dashboard(State(state): State<AppState>, jar: CookieJar) -> Response {
    let (mut session, admin) = match require_admin_user(&state, jar).await {
        Ok(allowed) => allowed,
        Err(denied) => return denied,
    };

    let counts = data::catalog_counts(state.pool_ref()).await;
    let students = data::list_students(state.pool_ref()).await;
    let (counts, students) = match (counts, students) {
        (Ok(counts), Ok(students)) => (counts, students),
        (Err(err), _) | (_, Err(err)) => {
            error!(?err, "failed to load dashboard data");
            return server_error();
        }
    };

    let body = render_dashboard(&admin.email, &counts, &students);
    let flash = session.take_flash();
    let principal = Principal::from_session(session.data());
    let page = render_page(PageLayout {
        title: "Painel de Controle",
        principal: &principal,
        flash: flash.as_ref(),
        body_html: Cow::Owned(body),
    });
    session.respond(Html(page)).await
}

fn render_dashboard(admin_email: &str, counts: &CatalogCounts, students: &[StudentRow]) -> String {
    let stats = [
        ("Cursos", counts.courses, "/admin/cursos"),
        ("Materiais", counts.materials, "/admin/upload"),
        ("Focos", counts.focuses, "/admin/focos"),
        ("Alunos", counts.students, "#alunos"),
    ]
    .iter()
    .map(|(label, value, href)| {
        format!(
            r#"<a class="card" href="{href}"><div class="stat">{value}</div><div>{label}</div></a>"#
        )
    })
    .collect::<String>();

    let student_rows = if students.is_empty() {
        r#"<tr><td colspan="2">Nenhum aluno cadastrado.</td></tr>"#.to_string()
    } else {
        students
            .iter()
            .map(|student| {
                format!(
                    "<tr><td>{name}</td><td>{email}</td></tr>",
                    name = escape_html(&student.name),
                    email = escape_html(&student.email),
                )
            })
            .collect()
    };

    format!(
        r#"<section class="panel">
    <h1>Painel de Controle</h1>
    <p class="note">Conectado como {admin}.</p>
    <div class="grid">{stats}</div>
</section>
<section class="panel">
    <h2>Gerenciar conteúdo</h2>
    <div class="grid">
        <a class="card" href="/admin/cursos">Gerenciar Cursos</a>
        <a class="card" href="/admin/focos">Gerenciar Focos</a>
        <a class="card" href="/admin/upload">Upload de Material</a>
    </div>
</section>
<section class="panel" id="alunos">
    <h2>Alunos cadastrados</h2>
    <table>
        <thead><tr><th>Nome</th><th>Email</th></tr></thead>
        <tbody>{student_rows}</tbody>
    </table>
</section>"#,
        admin = escape_html(admin_email),
    )
}
