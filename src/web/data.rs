use std::fmt;

use sqlx::SqlitePool;

use super::models::{
    CatalogCounts, CourseRow, FocusRow, MaterialRow, NewMaterial, StudentRow,
};

const MATERIAL_COLUMNS: &str = "id, title, description, kind, filename, course_id, focus_id";

/// Failure of a single persistence call.
#[derive(Debug)]
pub enum DataError {
    NotFound { entity: &'static str, id: i64 },
    Duplicate { entity: &'static str, value: String },
    MissingReference { entity: &'static str },
    Database(sqlx::Error),
}

impl fmt::Display for DataError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataError::NotFound { entity, id } => write!(f, "{entity} {id} not found"),
            DataError::Duplicate { entity, value } => {
                write!(f, "{entity} `{value}` already exists")
            }
            DataError::MissingReference { entity } => {
                write!(f, "{entity} references a row that does not exist")
            }
            DataError::Database(err) => write!(f, "database error: {err}"),
        }
    }
}

impl std::error::Error for DataError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            DataError::Database(err) => Some(err),
            _ => None,
        }
    }
}

impl From<sqlx::Error> for DataError {
    fn from(err: sqlx::Error) -> Self {
        DataError::Database(err)
    }
}

pub type DataResult<T> = Result<T, DataError>;

fn classify_write_error(err: sqlx::Error, entity: &'static str, value: &str) -> DataError {
    match &err {
        sqlx::Error::Database(db_err) if db_err.is_unique_violation() => DataError::Duplicate {
            entity,
            value: value.to_string(),
        },
        sqlx::Error::Database(db_err) if db_err.is_foreign_key_violation() => {
            DataError::MissingReference { entity }
        }
        _ => DataError::Database(err),
    }
}

// Students

pub async fn create_student(
    pool: &SqlitePool,
    name: &str,
    email: &str,
    password_hash: &str,
) -> DataResult<StudentRow> {
    sqlx::query_as::<_, StudentRow>(
        "INSERT INTO students (name, email, password_hash) VALUES (?1, ?2, ?3)
         RETURNING id, name, email, password_hash",
    )
    .bind(name)
    .bind(email)
    .bind(password_hash)
    .fetch_one(pool)
    .await
    .map_err(|err| classify_write_error(err, "student", email))
}

pub async fn get_student(pool: &SqlitePool, id: i64) -> DataResult<StudentRow> {
    sqlx::query_as::<_, StudentRow>(
        "SELECT id, name, email, password_hash FROM students WHERE id = ?1",
    )
    .bind(id)
    .fetch_optional(pool)
    .await?
    .ok_or(DataError::NotFound {
        entity: "student",
        id,
    })
}

pub async fn find_student_by_email(
    pool: &SqlitePool,
    email: &str,
) -> DataResult<Option<StudentRow>> {
    let row = sqlx::query_as::<_, StudentRow>(
        "SELECT id, name, email, password_hash FROM students WHERE email = ?1",
    )
    .bind(email)
    .fetch_optional(pool)
    .await?;
    Ok(row)
}

pub async fn list_students(pool: &SqlitePool) -> DataResult<Vec<StudentRow>> {
    let rows = sqlx::query_as::<_, StudentRow>(
        "SELECT id, name, email, password_hash FROM students ORDER BY id",
    )
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

// Courses

pub async fn create_course(pool: &SqlitePool, name: &str) -> DataResult<CourseRow> {
    sqlx::query_as::<_, CourseRow>("INSERT INTO courses (name) VALUES (?1) RETURNING id, name")
        .bind(name)
        .fetch_one(pool)
        .await
        .map_err(|err| classify_write_error(err, "course", name))
}

pub async fn get_course(pool: &SqlitePool, id: i64) -> DataResult<CourseRow> {
    sqlx::query_as::<_, CourseRow>("SELECT id, name FROM courses WHERE id = ?1")
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or(DataError::NotFound {
            entity: "course",
            id,
        })
}

pub async fn find_course_by_name(pool: &SqlitePool, name: &str) -> DataResult<Option<CourseRow>> {
    let row = sqlx::query_as::<_, CourseRow>("SELECT id, name FROM courses WHERE name = ?1")
        .bind(name)
        .fetch_optional(pool)
        .await?;
    Ok(row)
}

pub async fn list_courses(pool: &SqlitePool) -> DataResult<Vec<CourseRow>> {
    let rows = sqlx::query_as::<_, CourseRow>("SELECT id, name FROM courses ORDER BY id")
        .fetch_all(pool)
        .await?;
    Ok(rows)
}

// Focuses

pub async fn create_focus(pool: &SqlitePool, name: &str) -> DataResult<FocusRow> {
    sqlx::query_as::<_, FocusRow>("INSERT INTO focuses (name) VALUES (?1) RETURNING id, name")
        .bind(name)
        .fetch_one(pool)
        .await
        .map_err(|err| classify_write_error(err, "focus", name))
}

pub async fn get_focus(pool: &SqlitePool, id: i64) -> DataResult<FocusRow> {
    sqlx::query_as::<_, FocusRow>("SELECT id, name FROM focuses WHERE id = ?1")
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or(DataError::NotFound { entity: "focus", id })
}

pub async fn find_focus_by_name(pool: &SqlitePool, name: &str) -> DataResult<Option<FocusRow>> {
    let row = sqlx::query_as::<_, FocusRow>("SELECT id, name FROM focuses WHERE name = ?1")
        .bind(name)
        .fetch_optional(pool)
        .await?;
    Ok(row)
}

pub async fn list_focuses(pool: &SqlitePool) -> DataResult<Vec<FocusRow>> {
    let rows = sqlx::query_as::<_, FocusRow>("SELECT id, name FROM focuses ORDER BY id")
        .fetch_all(pool)
        .await?;
    Ok(rows)
}

// Materials

pub async fn create_material(pool: &SqlitePool, material: &NewMaterial) -> DataResult<MaterialRow> {
    let sql = format!(
        "INSERT INTO materials (title, description, kind, filename, course_id, focus_id)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6) RETURNING {MATERIAL_COLUMNS}"
    );
    sqlx::query_as::<_, MaterialRow>(&sql)
        .bind(&material.title)
        .bind(material.description.as_deref())
        .bind(material.kind)
        .bind(&material.filename)
        .bind(material.course_id)
        .bind(material.focus_id)
        .fetch_one(pool)
        .await
        .map_err(|err| classify_write_error(err, "material", &material.filename))
}

#[cfg(test)]
pub async fn get_material(pool: &SqlitePool, id: i64) -> DataResult<MaterialRow> {
    let sql = format!("SELECT {MATERIAL_COLUMNS} FROM materials WHERE id = ?1");
    sqlx::query_as::<_, MaterialRow>(&sql)
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or(DataError::NotFound {
            entity: "material",
            id,
        })
}

pub async fn list_materials(pool: &SqlitePool) -> DataResult<Vec<MaterialRow>> {
    let sql = format!("SELECT {MATERIAL_COLUMNS} FROM materials ORDER BY id");
    let rows = sqlx::query_as::<_, MaterialRow>(&sql).fetch_all(pool).await?;
    Ok(rows)
}

pub async fn list_materials_for_course(
    pool: &SqlitePool,
    course_id: i64,
) -> DataResult<Vec<MaterialRow>> {
    let sql = format!("SELECT {MATERIAL_COLUMNS} FROM materials WHERE course_id = ?1 ORDER BY id");
    let rows = sqlx::query_as::<_, MaterialRow>(&sql)
        .bind(course_id)
        .fetch_all(pool)
        .await?;
    Ok(rows)
}

/// Materials whose title or description contains `term`, ignoring case.
///
/// SQLite only folds ASCII in `LIKE`, so the comparison runs here to cover accented titles.
/// A blank term matches nothing.
pub async fn search_materials(pool: &SqlitePool, term: &str) -> DataResult<Vec<MaterialRow>> {
    let needle = term.trim().to_lowercase();
    if needle.is_empty() {
        return Ok(Vec::new());
    }

    let rows = list_materials(pool).await?;
    Ok(rows
        .into_iter()
        .filter(|material| material_matches(material, &needle))
        .collect())
}

fn material_matches(material: &MaterialRow, needle: &str) -> bool {
    material.title.to_lowercase().contains(needle)
        || material
            .description
            .as_deref()
            .is_some_and(|description| description.to_lowercase().contains(needle))
}

pub async fn catalog_counts(pool: &SqlitePool) -> DataResult<CatalogCounts> {
    let (courses, materials, focuses, students): (i64, i64, i64, i64) = sqlx::query_as(
        "SELECT
            (SELECT COUNT(*) FROM courses),
            (SELECT COUNT(*) FROM materials),
            (SELECT COUNT(*) FROM focuses),
            (SELECT COUNT(*) FROM students)",
    )
    .fetch_one(pool)
    .await?;

    Ok(CatalogCounts {
        courses,
        materials,
        focuses,
        students,
    })
}
