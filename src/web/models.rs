use std::fmt;

use sqlx::FromRow;

#[derive(Clone, Debug, FromRow)]
pub struct StudentRow {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub password_hash: String,
}

#[derive(Clone, Debug, PartialEq, Eq, FromRow)]
pub struct CourseRow {
    pub id: i64,
    pub name: String,
}

#[derive(Clone, Debug, PartialEq, Eq, FromRow)]
pub struct FocusRow {
    pub id: i64,
    pub name: String,
}

#[derive(Clone, Debug, PartialEq, Eq, FromRow)]
pub struct MaterialRow {
    pub id: i64,
    pub title: String,
    pub description: Option<String>,
    pub kind: MaterialKind,
    pub filename: String,
    pub course_id: i64,
    pub focus_id: i64,
}

/// Type tag stored on each material. The stored text matches the values the upload form posts.
#[derive(Clone, Copy, Debug, PartialEq, Eq, sqlx::Type)]
#[sqlx(rename_all = "lowercase")]
pub enum MaterialKind {
    Video,
    Foto,
    Livro,
}

impl MaterialKind {
    pub const ALL: [MaterialKind; 3] = [MaterialKind::Video, MaterialKind::Foto, MaterialKind::Livro];

    pub fn as_str(self) -> &'static str {
        match self {
            MaterialKind::Video => "video",
            MaterialKind::Foto => "foto",
            MaterialKind::Livro => "livro",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            MaterialKind::Video => "Vídeo",
            MaterialKind::Foto => "Foto",
            MaterialKind::Livro => "Livro / Documento",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "video" => Some(MaterialKind::Video),
            "foto" | "photo" => Some(MaterialKind::Foto),
            "livro" | "book" => Some(MaterialKind::Livro),
            _ => None,
        }
    }
}

impl fmt::Display for MaterialKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Input for inserting a material once its file has been stored.
#[derive(Clone, Debug)]
pub struct NewMaterial {
    pub title: String,
    pub description: Option<String>,
    pub kind: MaterialKind,
    pub filename: String,
    pub course_id: i64,
    pub focus_id: i64,
}

/// Row totals shown on the admin dashboard.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CatalogCounts {
    pub courses: i64,
    pub materials: i64,
    pub focuses: i64,
    pub students: i64,
}
