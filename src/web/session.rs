use axum::response::{IntoResponse, Redirect, Response};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use cookie::time::Duration as CookieDuration;
use sqlx::{FromRow, SqlitePool};
use tracing::error;
use uuid::Uuid;

pub const SESSION_COOKIE: &str = "estudo_session";
pub const SESSION_TTL_DAYS: i64 = 7;
/// Lifetime of a session that carries nothing but a pending notice.
pub const FLASH_TTL_MINUTES: i64 = 10;

/// Severity attached to a one-shot notice.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FlashLevel {
    Success,
    Warning,
    Danger,
    Info,
}

impl FlashLevel {
    pub fn css_class(self) -> &'static str {
        match self {
            FlashLevel::Success => "success",
            FlashLevel::Warning => "warning",
            FlashLevel::Danger => "danger",
            FlashLevel::Info => "info",
        }
    }

    fn parse(raw: &str) -> Option<Self> {
        match raw {
            "success" => Some(FlashLevel::Success),
            "warning" => Some(FlashLevel::Warning),
            "danger" => Some(FlashLevel::Danger),
            "info" => Some(FlashLevel::Info),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Flash {
    pub level: FlashLevel,
    pub message: String,
}

impl Flash {
    pub fn new(level: FlashLevel, message: impl Into<String>) -> Self {
        Self {
            level,
            message: message.into(),
        }
    }

    pub fn success(message: impl Into<String>) -> Self {
        Self::new(FlashLevel::Success, message)
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self::new(FlashLevel::Warning, message)
    }

    pub fn danger(message: impl Into<String>) -> Self {
        Self::new(FlashLevel::Danger, message)
    }

    pub fn info(message: impl Into<String>) -> Self {
        Self::new(FlashLevel::Info, message)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StudentIdentity {
    pub id: i64,
    pub name: String,
}

#[derive(Clone, Debug, Default)]
pub struct SessionData {
    pub admin_email: Option<String>,
    pub student: Option<StudentIdentity>,
    pub flash: Option<Flash>,
}

impl SessionData {
    fn is_empty(&self) -> bool {
        self.admin_email.is_none() && self.student.is_none() && self.flash.is_none()
    }

    /// Logged-in sessions live for days, anonymous notices only for minutes.
    fn ttl(&self) -> ChronoDuration {
        if self.admin_email.is_some() || self.student.is_some() {
            ChronoDuration::days(SESSION_TTL_DAYS)
        } else {
            ChronoDuration::minutes(FLASH_TTL_MINUTES)
        }
    }
}

#[derive(FromRow)]
struct SessionRow {
    admin_email: Option<String>,
    student_id: Option<i64>,
    student_name: Option<String>,
    flash_level: Option<String>,
    flash_message: Option<String>,
}

impl From<SessionRow> for SessionData {
    fn from(row: SessionRow) -> Self {
        let student = match (row.student_id, row.student_name) {
            (Some(id), Some(name)) => Some(StudentIdentity { id, name }),
            _ => None,
        };
        let flash = match (row.flash_level.as_deref().and_then(FlashLevel::parse), row.flash_message) {
            (Some(level), Some(message)) => Some(Flash { level, message }),
            _ => None,
        };
        Self {
            admin_email: row.admin_email,
            student,
            flash,
        }
    }
}

/// Session rows in the `sessions` table, keyed by the token held in [`SESSION_COOKIE`].
///
/// Every save first deletes rows whose `expires_at` has passed.
#[derive(Clone)]
pub struct SessionStore {
    pool: SqlitePool,
}

impl SessionStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    async fn load(&self, token: Uuid) -> Option<SessionData> {
        let row = sqlx::query_as::<_, SessionRow>(
            "SELECT admin_email, student_id, student_name, flash_level, flash_message
             FROM sessions WHERE token = ?1 AND expires_at > ?2",
        )
        .bind(token.to_string())
        .bind(Utc::now().timestamp())
        .fetch_optional(&self.pool)
        .await;

        match row {
            Ok(row) => row.map(SessionData::from),
            Err(err) => {
                error!(?err, "failed to load session");
                None
            }
        }
    }

    async fn save(&self, token: Uuid, data: &SessionData) {
        let now = Utc::now();
        self.purge_expired(now).await;
        self.save_until(token, data, now + data.ttl()).await;
    }

    async fn save_until(&self, token: Uuid, data: &SessionData, expires_at: DateTime<Utc>) {
        let student = data.student.as_ref();
        let flash = data.flash.as_ref();
        let result = sqlx::query(
            "INSERT INTO sessions
                (token, admin_email, student_id, student_name, flash_level, flash_message, expires_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
             ON CONFLICT (token) DO UPDATE SET
                admin_email = excluded.admin_email,
                student_id = excluded.student_id,
                student_name = excluded.student_name,
                flash_level = excluded.flash_level,
                flash_message = excluded.flash_message,
                expires_at = excluded.expires_at",
        )
        .bind(token.to_string())
        .bind(data.admin_email.as_deref())
        .bind(student.map(|student| student.id))
        .bind(student.map(|student| student.name.as_str()))
        .bind(flash.map(|flash| flash.level.css_class()))
        .bind(flash.map(|flash| flash.message.as_str()))
        .bind(expires_at.timestamp())
        .execute(&self.pool)
        .await;

        if let Err(err) = result {
            error!(?err, "failed to store session");
        }
    }

    async fn remove(&self, token: Uuid) {
        if let Err(err) = sqlx::query("DELETE FROM sessions WHERE token = ?1")
            .bind(token.to_string())
            .execute(&self.pool)
            .await
        {
            error!(?err, "failed to remove session");
        }
    }

    async fn purge_expired(&self, now: DateTime<Utc>) {
        if let Err(err) = sqlx::query("DELETE FROM sessions WHERE expires_at <= ?1")
            .bind(now.timestamp())
            .execute(&self.pool)
            .await
        {
            error!(?err, "failed to purge expired sessions");
        }
    }

    #[cfg(test)]
    pub(crate) async fn len(&self) -> i64 {
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM sessions")
            .fetch_one(&self.pool)
            .await
            .expect("count sessions")
    }
}

/// Session state for the request being handled.
///
/// Loaded from the cookie at the top of a controller, mutated in place, and written back
/// when the response is produced through [`RequestSession::respond`] or
/// [`RequestSession::redirect`].
pub struct RequestSession {
    store: SessionStore,
    jar: CookieJar,
    token: Option<Uuid>,
    retired: Option<Uuid>,
    data: SessionData,
}

impl RequestSession {
    pub async fn load(store: &SessionStore, jar: CookieJar) -> Self {
        let token = jar
            .get(SESSION_COOKIE)
            .and_then(|cookie| Uuid::parse_str(cookie.value()).ok());

        let (token, data) = match token {
            Some(token) => match store.load(token).await {
                Some(data) => (Some(token), data),
                None => (None, SessionData::default()),
            },
            None => (None, SessionData::default()),
        };

        Self {
            store: store.clone(),
            jar,
            token,
            retired: None,
            data,
        }
    }

    pub fn data(&self) -> &SessionData {
        &self.data
    }

    pub fn set_flash(&mut self, flash: Flash) {
        self.data.flash = Some(flash);
    }

    pub fn take_flash(&mut self) -> Option<Flash> {
        self.data.flash.take()
    }

    /// Drops the current token; the next commit deletes it and issues a new one.
    pub fn rotate(&mut self) {
        if let Some(token) = self.token.take() {
            self.retired = Some(token);
        }
    }

    pub fn login_admin(&mut self, email: &str) {
        self.rotate();
        self.data.admin_email = Some(email.to_string());
    }

    pub fn logout_admin(&mut self) {
        self.data.admin_email = None;
    }

    pub fn login_student(&mut self, id: i64, name: &str) {
        self.rotate();
        self.data.student = Some(StudentIdentity {
            id,
            name: name.to_string(),
        });
    }

    pub fn logout_student(&mut self) {
        self.data.student = None;
    }

    /// Persists the session and returns the cookie jar to send back.
    pub async fn commit(self) -> CookieJar {
        let Self {
            store,
            jar,
            token,
            retired,
            data,
        } = self;

        if let Some(old) = retired {
            store.remove(old).await;
        }

        match token {
            Some(token) if data.is_empty() => {
                store.remove(token).await;
                jar.remove(session_cookie(String::new(), CookieDuration::seconds(0)))
            }
            Some(token) => {
                store.save(token, &data).await;
                jar
            }
            None if data.is_empty() && retired.is_some() => {
                jar.remove(session_cookie(String::new(), CookieDuration::seconds(0)))
            }
            None if data.is_empty() => jar,
            None => {
                let token = Uuid::new_v4();
                store.save(token, &data).await;
                let max_age = CookieDuration::seconds(data.ttl().num_seconds());
                jar.add(session_cookie(token.to_string(), max_age))
            }
        }
    }

    pub async fn respond<R: IntoResponse>(self, body: R) -> Response {
        let jar = self.commit().await;
        (jar, body).into_response()
    }

    pub async fn redirect(self, target: &str) -> Response {
        self.respond(Redirect::to(target)).await
    }

    pub async fn flash_redirect(mut self, flash: Flash, target: &str) -> Response {
        self.set_flash(flash);
        self.redirect(target).await
    }
}

fn session_cookie(value: String, max_age: CookieDuration) -> Cookie<'static> {
    let mut cookie = Cookie::new(SESSION_COOKIE, value);
    cookie.set_path("/");
    cookie.set_http_only(true);
    cookie.set_same_site(SameSite::Lax);
    cookie.set_max_age(max_age);
    cookie
}
