use serde::Deserialize;

#[derive(Default, Deserialize)]
pub struct AdminLoginForm {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub pin: String,
}

/// Create form shared by the course and focus pages.
#[derive(Default, Deserialize)]
pub struct CatalogEntryForm {
    #[serde(default)]
    pub nome: Option<String>,
}
