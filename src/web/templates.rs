use std::borrow::Cow;

use axum::{
    http::StatusCode,
    response::{Html, IntoResponse, Response},
};
use chrono::{Datelike, Utc};

use crate::web::{auth::Principal, session::Flash};

const BASE_STYLES: &str = r#"
        :root { color-scheme: light; }
        body { font-family: "Helvetica Neue", Arial, sans-serif; margin: 0; background: #f8fafc; color: #0f172a; min-height: 100vh; display: flex; flex-direction: column; }
        header { background: #ffffff; padding: 1.25rem clamp(1.5rem, 6vw, 3rem); border-bottom: 1px solid #e2e8f0; display: flex; justify-content: space-between; align-items: center; flex-wrap: wrap; gap: 1rem; }
        header .brand { font-size: 1.35rem; font-weight: 700; color: #0f172a; text-decoration: none; }
        nav { display: flex; flex-wrap: wrap; gap: 0.6rem; align-items: center; }
        nav a { color: #1d4ed8; text-decoration: none; font-weight: 600; background: #e0f2fe; padding: 0.45rem 0.9rem; border-radius: 999px; border: 1px solid #bfdbfe; }
        nav a:hover { background: #bfdbfe; }
        nav a.admin { color: #0f172a; background: #fee2e2; border-color: #fecaca; }
        nav span { color: #475569; font-size: 0.95rem; }
        main { flex: 1; padding: 2rem clamp(1.5rem, 5vw, 3rem); max-width: 1000px; width: 100%; margin: 0 auto; box-sizing: border-box; }
        h1 { margin-top: 0; }
        .panel { background: #ffffff; border-radius: 12px; border: 1px solid #e2e8f0; padding: 1.5rem; box-shadow: 0 18px 40px rgba(15, 23, 42, 0.08); margin-bottom: 2rem; }
        .panel h2 { margin-top: 0; }
        label { display: block; margin-top: 1rem; font-weight: 600; }
        input, select, textarea { width: 100%; padding: 0.75rem; margin-top: 0.4rem; border-radius: 8px; border: 1px solid #cbd5f5; background: #f8fafc; color: #0f172a; box-sizing: border-box; font-size: 1rem; }
        button { margin-top: 1.25rem; padding: 0.8rem 1.2rem; border: none; border-radius: 8px; background: #2563eb; color: #ffffff; font-weight: 600; cursor: pointer; }
        button:hover { background: #1d4ed8; }
        table { width: 100%; border-collapse: collapse; background: #ffffff; }
        th, td { padding: 0.7rem 1rem; border-bottom: 1px solid #e2e8f0; text-align: left; }
        th { background: #f1f5f9; }
        .grid { display: grid; gap: 1.25rem; grid-template-columns: repeat(auto-fit, minmax(200px, 1fr)); }
        .card { display: block; background: #ffffff; padding: 1.25rem; border-radius: 12px; border: 1px solid #e2e8f0; text-decoration: none; color: inherit; }
        .card:hover { border-color: #bfdbfe; }
        .stat { font-size: 2rem; font-weight: 700; color: #2563eb; }
        .flash { padding: 1rem 1.25rem; border-radius: 10px; margin-bottom: 1.5rem; font-weight: 600; border: 1px solid transparent; }
        .flash.success { background: #ecfdf3; border-color: #bbf7d0; color: #166534; }
        .flash.warning { background: #fffbeb; border-color: #fde68a; color: #92400e; }
        .flash.danger { background: #fef2f2; border-color: #fecaca; color: #b91c1c; }
        .flash.info { background: #eff6ff; border-color: #bfdbfe; color: #1d4ed8; }
        .material { padding: 0.85rem 0; border-bottom: 1px solid #e2e8f0; }
        .material:last-child { border-bottom: none; }
        .material .kind { display: inline-block; font-size: 0.8rem; font-weight: 600; padding: 0.15rem 0.6rem; border-radius: 999px; background: #e0f2fe; color: #1d4ed8; margin-right: 0.5rem; }
        .note { color: #475569; font-size: 0.95rem; line-height: 1.6; }
        .app-footer { margin: 3rem 0 1.5rem; text-align: center; font-size: 0.85rem; color: #94a3b8; }
"#;

pub struct PageLayout<'a> {
    pub title: &'a str,
    pub principal: &'a Principal,
    pub flash: Option<&'a Flash>,
    pub body_html: Cow<'a, str>,
}

pub fn render_page(layout: PageLayout<'_>) -> String {
    let PageLayout {
        title,
        principal,
        flash,
        body_html,
    } = layout;

    let nav = render_nav(principal);
    let flash_html = render_flash(flash);
    let footer = render_footer();

    format!(
        r#"<!DOCTYPE html>
<html lang="pt-BR">
<head>
    <meta charset="UTF-8">
    <title>{title} · Estudo de Ciências</title>
    <meta name="viewport" content="width=device-width, initial-scale=1">
    <style>
{styles}
    </style>
</head>
<body>
    <header>
        <a class="brand" href="/">Estudo de Ciências</a>
        <nav>{nav}</nav>
    </header>
    <main>
        {flash_html}
        {body_html}
        {footer}
    </main>
</body>
</html>"#,
        title = escape_html(title),
        styles = BASE_STYLES,
        nav = nav,
        flash_html = flash_html,
        body_html = body_html,
        footer = footer,
    )
}

fn render_nav(principal: &Principal) -> String {
    let mut links = String::from(r#"<a href="/">Cursos</a>"#);

    match &principal.student {
        Some(student) => {
            links.push_str(&format!(
                r#"<span>Olá, <strong>{name}</strong></span><a href="/aluno/dashboard">Meu Painel</a><a href="/pesquisa">Pesquisar</a><a href="/aluno/logout">Sair</a>"#,
                name = escape_html(&student.name),
            ));
        }
        None => {
            links.push_str(r#"<a href="/login">Entrar</a><a href="/cadastro">Cadastre-se</a>"#);
        }
    }

    if principal.admin.is_some() {
        links.push_str(
            r#"<a class="admin" href="/admin/dashboard">Painel Admin</a><a class="admin" href="/admin/logout">Sair (Admin)</a>"#,
        );
    } else {
        links.push_str(r#"<a class="admin" href="/admin">Admin</a>"#);
    }

    links
}

pub fn render_flash(flash: Option<&Flash>) -> String {
    flash
        .map(|flash| {
            format!(
                r#"<div class="flash {class}">{message}</div>"#,
                class = flash.level.css_class(),
                message = escape_html(&flash.message),
            )
        })
        .unwrap_or_default()
}

pub fn render_footer() -> String {
    let current_year = Utc::now().year();
    format!(
        r#"<footer class="app-footer">© {year} Estudo de Ciências · material de uso exclusivo dos alunos</footer>"#,
        year = current_year
    )
}

pub fn escape_html(input: &str) -> String {
    input
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}

/// Generic 500 page for faults that cannot be turned into a notice.
pub fn server_error() -> Response {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Html(
            "<h1>Erro interno</h1><p>Ocorreu um erro inesperado. Tente novamente mais tarde.</p>"
                .to_string(),
        ),
    )
        .into_response()
}

pub fn not_found_page(principal: &Principal) -> Response {
    let body = r#"<section class="panel"><h1>Página não encontrada</h1><p class="note">O conteúdo solicitado não existe.</p><a href="/">Voltar para os cursos</a></section>"#;
    let page = render_page(PageLayout {
        title: "Não encontrado",
        principal,
        flash: None,
        body_html: Cow::Borrowed(body),
    });
    (StatusCode::NOT_FOUND, Html(page)).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::web::session::StudentIdentity;

    #[test]
    fn escape_html_covers_markup_characters() {
        assert_eq!(
            escape_html(r#"<a href="x">'&'</a>"#),
            "&lt;a href=&quot;x&quot;&gt;&#39;&amp;&#39;&lt;/a&gt;"
        );
    }

    #[test]
    fn flash_is_escaped_and_classed() {
        let html = render_flash(Some(&Flash::warning("<b>atenção</b>")));
        assert!(html.contains(r#"class="flash warning""#));
        assert!(html.contains("&lt;b&gt;atenção&lt;/b&gt;"));
        assert!(render_flash(None).is_empty());
    }

    #[test]
    fn nav_reflects_both_principals() {
        let anonymous = Principal::default();
        let nav = render_nav(&anonymous);
        assert!(nav.contains("/login"));
        assert!(nav.contains(r#"href="/admin""#));

        let both = Principal {
            admin: Some(crate::web::auth::AdminIdentity {
                email: "admin@escola.br".to_string(),
            }),
            student: Some(StudentIdentity {
                id: 1,
                name: "Ana".to_string(),
            }),
        };
        let nav = render_nav(&both);
        assert!(nav.contains("/aluno/logout"));
        assert!(nav.contains("/admin/logout"));
        assert!(!nav.contains(r#"href="/login""#));
    }
}
