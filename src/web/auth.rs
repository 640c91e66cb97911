use std::{borrow::Cow, fmt};

use argon2::Argon2;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use axum::{
    extract::{Form, State},
    response::{Html, Response},
};
use axum_extra::extract::cookie::CookieJar;
use rand_core::OsRng;
use serde::Deserialize;
use tracing::{error, info, warn};

use crate::web::{
    AppState,
    data::{self, DataError},
    responses::PortalError,
    session::{Flash, RequestSession, SessionData, StudentIdentity},
    templates::{PageLayout, escape_html, render_page, server_error},
};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PrincipalKind {
    Admin,
    Student,
}

impl fmt::Display for PrincipalKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PrincipalKind::Admin => f.write_str("admin"),
            PrincipalKind::Student => f.write_str("student"),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AdminIdentity {
    pub email: String,
}

/// Who is making the request. Both principals are independent and may be present together.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Principal {
    pub admin: Option<AdminIdentity>,
    pub student: Option<StudentIdentity>,
}

/// Outcome of a route gate.
#[derive(Debug, PartialEq, Eq)]
pub enum Access<T> {
    Allowed(T),
    DeniedRedirect { target: &'static str, flash: Flash },
}

impl Principal {
    pub fn from_session(data: &SessionData) -> Self {
        Self {
            admin: data.admin_email.as_ref().map(|email| AdminIdentity {
                email: email.clone(),
            }),
            student: data.student.clone(),
        }
    }

    pub fn require_admin(&self) -> Access<AdminIdentity> {
        match &self.admin {
            Some(admin) => Access::Allowed(admin.clone()),
            None => Access::DeniedRedirect {
                target: "/admin",
                flash: PortalError::Authorization(PrincipalKind::Admin).flash(),
            },
        }
    }

    pub fn require_student(&self) -> Access<StudentIdentity> {
        match &self.student {
            Some(student) => Access::Allowed(student.clone()),
            None => Access::DeniedRedirect {
                target: "/login",
                flash: PortalError::Authorization(PrincipalKind::Student).flash(),
            },
        }
    }
}

/// Loads the session and lets the request through only with a student login.
pub async fn require_student(
    state: &AppState,
    jar: CookieJar,
) -> Result<(RequestSession, StudentIdentity), Response> {
    let session = RequestSession::load(state.sessions(), jar).await;
    match Principal::from_session(session.data()).require_student() {
        Access::Allowed(student) => Ok((session, student)),
        Access::DeniedRedirect { target, flash } => {
            Err(session.flash_redirect(flash, target).await)
        }
    }
}

pub fn hash_password(password: &str) -> Result<String, argon2::password_hash::Error> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
}

pub fn verify_password(password: &str, password_hash: &str) -> bool {
    let parsed = PasswordHash::new(password_hash);
    match parsed {
        Ok(hash) => Argon2::default()
            .verify_password(password.as_bytes(), &hash)
            .is_ok(),
        Err(_) => false,
    }
}

#[derive(Default, Deserialize)]
pub struct RegistrationForm {
    #[serde(default)]
    pub nome: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub senha: String,
}

#[derive(Default, Deserialize)]
pub struct StudentLoginForm {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub senha: String,
}

pub async fn registration_page(State(state): State<AppState>, jar: CookieJar) -> Response {
    let mut session = RequestSession::load(state.sessions(), jar).await;
    let flash = session.take_flash();
    let principal = Principal::from_session(session.data());

    let body = r#"<section class="panel">
    <h1>Cadastre-se</h1>
    <p class="note">Crie sua conta para acessar os materiais dos cursos.</p>
    <form method="post" action="/cadastro">
        <label for="nome">Nome</label>
        <input id="nome" name="nome" required>
        <label for="email">Email</label>
        <input id="email" type="email" name="email" required>
        <label for="senha">Senha</label>
        <input id="senha" type="password" name="senha" required>
        <button type="submit">Cadastrar</button>
    </form>
    <p class="note">Já tem conta? <a href="/login">Faça login</a>.</p>
</section>"#;

    let page = render_page(PageLayout {
        title: "Cadastre-se",
        principal: &principal,
        flash: flash.as_ref(),
        body_html: Cow::Borrowed(body),
    });
    session.respond(Html(page)).await
}

pub async fn process_registration(
    State(state): State<AppState>,
    jar: CookieJar,
    Form(form): Form<RegistrationForm>,
) -> Response {
    let mut session = RequestSession::load(state.sessions(), jar).await;

    let name = form.nome.trim();
    let email = form.email.trim();
    if name.is_empty() || email.is_empty() || form.senha.is_empty() {
        let err = PortalError::Validation("Preencha nome, email e senha.".to_string());
        return session.flash_redirect(err.into(), "/cadastro").await;
    }

    let duplicate = || {
        PortalError::Validation("Este email já está cadastrado. Tente fazer login.".to_string())
    };

    match data::find_student_by_email(state.pool_ref(), email).await {
        Ok(Some(_)) => return session.flash_redirect(duplicate().into(), "/cadastro").await,
        Ok(None) => {}
        Err(err) => {
            error!(?err, "failed to check student email during registration");
            return server_error();
        }
    }

    let password_hash = match hash_password(&form.senha) {
        Ok(hash) => hash,
        Err(err) => {
            error!(?err, "failed to hash password during registration");
            return server_error();
        }
    };

    let student = match data::create_student(state.pool_ref(), name, email, &password_hash).await {
        Ok(student) => student,
        Err(DataError::Duplicate { .. }) => {
            return session.flash_redirect(duplicate().into(), "/cadastro").await;
        }
        Err(err) => {
            error!(?err, "failed to create student");
            return server_error();
        }
    };

    info!(student_id = student.id, "student registered");
    session.login_student(student.id, &student.name);
    session
        .flash_redirect(
            Flash::success("Cadastro realizado com sucesso! Bem-vindo(a) ao portal."),
            "/aluno/dashboard",
        )
        .await
}

pub async fn login_page(State(state): State<AppState>, jar: CookieJar) -> Response {
    let mut session = RequestSession::load(state.sessions(), jar).await;
    let flash = session.take_flash();
    let principal = Principal::from_session(session.data());

    let body = r#"<section class="panel">
    <h1>Login de Aluno</h1>
    <form method="post" action="/login">
        <label for="email">Email</label>
        <input id="email" type="email" name="email" required>
        <label for="senha">Senha</label>
        <input id="senha" type="password" name="senha" required>
        <button type="submit">Entrar</button>
    </form>
    <p class="note">Ainda não tem conta? <a href="/cadastro">Cadastre-se</a>.</p>
</section>"#;

    let page = render_page(PageLayout {
        title: "Login de Aluno",
        principal: &principal,
        flash: flash.as_ref(),
        body_html: Cow::Borrowed(body),
    });
    session.respond(Html(page)).await
}

pub async fn process_login(
    State(state): State<AppState>,
    jar: CookieJar,
    Form(form): Form<StudentLoginForm>,
) -> Response {
    let mut session = RequestSession::load(state.sessions(), jar).await;
    let email = form.email.trim();

    let student = match data::find_student_by_email(state.pool_ref(), email).await {
        Ok(student) => student,
        Err(err) => {
            error!(?err, "failed to fetch student during login");
            return server_error();
        }
    };

    match student {
        Some(student) if verify_password(&form.senha, &student.password_hash) => {
            info!(student_id = student.id, "student logged in");
            session.login_student(student.id, &student.name);
            let welcome = format!("Bem-vindo(a) de volta, {}!", student.name);
            session
                .flash_redirect(Flash::success(welcome), "/aluno/dashboard")
                .await
        }
        _ => {
            warn!(email = %email, "student login rejected");
            let err = PortalError::Auth("Email ou senha incorretos.".to_string());
            session.flash_redirect(err.into(), "/login").await
        }
    }
}

pub async fn logout(State(state): State<AppState>, jar: CookieJar) -> Response {
    let mut session = RequestSession::load(state.sessions(), jar).await;
    session.logout_student();
    session
        .flash_redirect(Flash::info("Você saiu da sua conta."), "/")
        .await
}

pub async fn student_dashboard(State(state): State<AppState>, jar: CookieJar) -> Response {
    let (mut session, student) = match require_student(&state, jar).await {
        Ok(allowed) => allowed,
        Err(denied) => return denied,
    };

    let student = match data::get_student(state.pool_ref(), student.id).await {
        Ok(row) => row,
        Err(DataError::NotFound { .. }) => {
            warn!(student_id = student.id, "session refers to a missing student");
            session.logout_student();
            let flash = PortalError::Authorization(PrincipalKind::Student).flash();
            return session.flash_redirect(flash, "/login").await;
        }
        Err(err) => {
            error!(?err, "failed to load student for dashboard");
            return server_error();
        }
    };

    let courses = match data::list_courses(state.pool_ref()).await {
        Ok(courses) => courses,
        Err(err) => {
            error!(?err, "failed to load courses for student dashboard");
            return server_error();
        }
    };

    let course_cards = if courses.is_empty() {
        r#"<p class="note">Nenhum curso disponível ainda.</p>"#.to_string()
    } else {
        let cards = courses
            .iter()
            .map(|course| {
                format!(
                    r#"<a class="card" href="/curso/{id}"><strong>{name}</strong></a>"#,
                    id = course.id,
                    name = escape_html(&course.name),
                )
            })
            .collect::<String>();
        format!(r#"<div class="grid">{cards}</div>"#)
    };

    let body = format!(
        r#"<section class="panel">
    <h1>Meu Painel</h1>
    <p class="note">Olá, {name}! Escolha um curso ou pesquise nos materiais.</p>
    <form method="get" action="/pesquisa">
        <label for="termo">Pesquisar materiais</label>
        <input id="termo" name="termo" placeholder="Ex.: álgebra">
        <button type="submit">Pesquisar</button>
    </form>
</section>
<section class="panel">
    <h2>Cursos</h2>
    {course_cards}
</section>"#,
        name = escape_html(&student.name),
        course_cards = course_cards,
    );

    let flash = session.take_flash();
    let principal = Principal::from_session(session.data());
    let page = render_page(PageLayout {
        title: "Meu Painel",
        principal: &principal,
        flash: flash.as_ref(),
        body_html: Cow::Owned(body),
    });
    session.respond(Html(page)).await
}
