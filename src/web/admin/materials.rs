use std::borrow::Cow;

use axum::{
    extract::{Multipart, State},
    response::{Html, Response},
};
use axum_extra::extract::cookie::CookieJar;
use tracing::{error, info, warn};

use crate::web::{
    AppState,
    auth::Principal,
    data::{self, DataError},
    models::{MaterialKind, NewMaterial},
    responses::PortalError,
    session::{Flash, RequestSession},
    templates::{PageLayout, escape_html, render_page, server_error},
    uploads::{self, ALLOWED_EXTENSIONS, StoredUpload, UploadOutcome},
};

use super::auth::require_admin_user;

const UPLOAD_PAGE: &str = "/admin/upload";

/// Metadata fields of the upload form, validated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MaterialInput {
    pub title: String,
    pub description: Option<String>,
    pub kind: MaterialKind,
    pub course_id: i64,
    pub focus_id: i64,
}

impl MaterialInput {
    pub fn from_outcome(outcome: &UploadOutcome) -> Result<Self, PortalError> {
        let text = |name: &str| outcome.first_text(name).map(str::trim).unwrap_or_default();

        let title = text("titulo");
        if title.is_empty() {
            return Err(PortalError::Validation(
                "Informe o título do material.".to_string(),
            ));
        }

        let kind = MaterialKind::parse(text("tipo")).ok_or_else(|| {
            PortalError::Validation("Selecione um tipo de material válido.".to_string())
        })?;

        let course_id = text("curso_id").parse::<i64>().map_err(|_| {
            PortalError::Validation("Selecione o curso do material.".to_string())
        })?;
        let focus_id = text("foco_id").parse::<i64>().map_err(|_| {
            PortalError::Validation("Selecione o foco do material.".to_string())
        })?;

        let description = Some(text("descricao"))
            .filter(|value| !value.is_empty())
            .map(str::to_string);

        Ok(Self {
            title: title.to_string(),
            description,
            kind,
            course_id,
            focus_id,
        })
    }

    fn into_new_material(self, filename: String) -> NewMaterial {
        NewMaterial {
            title: self.title,
            description: self.description,
            kind: self.kind,
            filename,
            course_id: self.course_id,
            focus_id: self.focus_id,
        }
    }
}

pub async fn upload_page(State(state): State<AppState>, jar: CookieJar) -> Response {
    let (mut session, _admin) = match require_admin_user(&state, jar).await {
        Ok(allowed) => allowed,
        Err(denied) => return denied,
    };

    let courses = data::list_courses(state.pool_ref()).await;
    let focuses = data::list_focuses(state.pool_ref()).await;
    let (courses, focuses) = match (courses, focuses) {
        (Ok(courses), Ok(focuses)) => (courses, focuses),
        (Err(err), _) | (_, Err(err)) => {
            error!(?err, "failed to load upload form options");
            return server_error();
        }
    };

    let course_options = courses
        .iter()
        .map(|course| {
            format!(
                r#"<option value="{}">{}</option>"#,
                course.id,
                escape_html(&course.name)
            )
        })
        .collect::<String>();
    let focus_options = focuses
        .iter()
        .map(|focus| {
            format!(
                r#"<option value="{}">{}</option>"#,
                focus.id,
                escape_html(&focus.name)
            )
        })
        .collect::<String>();
    let kind_options = MaterialKind::ALL
        .iter()
        .map(|kind| format!(r#"<option value="{}">{}</option>"#, kind.as_str(), kind.label()))
        .collect::<String>();
    let accept = ALLOWED_EXTENSIONS
        .iter()
        .map(|ext| format!(".{ext}"))
        .collect::<Vec<_>>()
        .join(",");

    let missing_note = if courses.is_empty() || focuses.is_empty() {
        r#"<p class="flash warning">Cadastre pelo menos um curso e um foco antes de enviar materiais.</p>"#
    } else {
        ""
    };

    let body = format!(
        r#"<section class="panel">
    <h1>Upload de Material</h1>
    {missing_note}
    <form method="post" action="{UPLOAD_PAGE}" enctype="multipart/form-data">
        <label for="titulo">Título</label>
        <input id="titulo" name="titulo" required>
        <label for="descricao">Descrição</label>
        <textarea id="descricao" name="descricao" rows="3"></textarea>
        <label for="tipo">Tipo</label>
        <select id="tipo" name="tipo" required>{kind_options}</select>
        <label for="curso_id">Curso</label>
        <select id="curso_id" name="curso_id" required>{course_options}</select>
        <label for="foco_id">Foco</label>
        <select id="foco_id" name="foco_id" required>{focus_options}</select>
        <label for="file">Arquivo ({extensions})</label>
        <input id="file" type="file" name="file" accept="{accept}" required>
        <button type="submit">Enviar</button>
    </form>
</section>"#,
        extensions = ALLOWED_EXTENSIONS.join(", "),
    );

    let flash = session.take_flash();
    let principal = Principal::from_session(session.data());
    let page = render_page(PageLayout {
        title: "Upload de Material",
        principal: &principal,
        flash: flash.as_ref(),
        body_html: Cow::Owned(body),
    });
    session.respond(Html(page)).await
}

pub async fn upload_material(
    State(state): State<AppState>,
    jar: CookieJar,
    multipart: Multipart,
) -> Response {
    let (session, _admin) = match require_admin_user(&state, jar).await {
        Ok(allowed) => allowed,
        Err(denied) => return denied,
    };

    let outcome = match uploads::process_upload_form(multipart, state.upload_dir()).await {
        Ok(outcome) => outcome,
        Err(err) => {
            if err.is_rejection() {
                warn!(%err, "material upload rejected");
            } else {
                error!(?err, "failed to process material upload");
            }
            let flash = PortalError::FileRejected(err.message()).flash();
            return session.flash_redirect(flash, UPLOAD_PAGE).await;
        }
    };

    let stored = match outcome.require_file() {
        Ok(stored) => stored,
        Err(err) => {
            warn!(%err, "material upload rejected");
            let flash = PortalError::FileRejected(err.message()).flash();
            return session.flash_redirect(flash, UPLOAD_PAGE).await;
        }
    };

    let input = match MaterialInput::from_outcome(&outcome) {
        Ok(input) => input,
        Err(err) => return reject_stored(session, stored, err).await,
    };

    match data::get_course(state.pool_ref(), input.course_id).await {
        Ok(_) => {}
        Err(DataError::NotFound { .. }) => {
            let err = PortalError::NotFound("O curso selecionado não existe.".to_string());
            return reject_stored(session, stored, err).await;
        }
        Err(err) => {
            error!(?err, "failed to verify course for upload");
            stored.discard().await;
            return server_error();
        }
    }
    match data::get_focus(state.pool_ref(), input.focus_id).await {
        Ok(_) => {}
        Err(DataError::NotFound { .. }) => {
            let err = PortalError::NotFound("O foco selecionado não existe.".to_string());
            return reject_stored(session, stored, err).await;
        }
        Err(err) => {
            error!(?err, "failed to verify focus for upload");
            stored.discard().await;
            return server_error();
        }
    }

    let title = input.title.clone();
    let new_material = input.into_new_material(stored.stored_name.clone());
    match data::create_material(state.pool_ref(), &new_material).await {
        Ok(material) => {
            info!(
                material_id = material.id,
                original = %stored.original_name,
                stored = %stored.stored_name,
                bytes = stored.file_size,
                "material uploaded"
            );
            session
                .flash_redirect(
                    Flash::success(format!(r#"Material "{title}" enviado com sucesso!"#)),
                    UPLOAD_PAGE,
                )
                .await
        }
        Err(DataError::MissingReference { .. }) => {
            let err = PortalError::NotFound("Curso ou foco selecionado não existe.".to_string());
            reject_stored(session, stored, err).await
        }
        Err(err) => {
            error!(?err, "failed to insert material");
            stored.discard().await;
            server_error()
        }
    }
}

async fn reject_stored(session: RequestSession, stored: &StoredUpload, err: PortalError) -> Response {
    warn!(%err, stored = %stored.stored_name, "discarding upload");
    stored.discard().await;
    session.flash_redirect(err.into(), UPLOAD_PAGE).await
}
