use std::fmt;

use crate::web::{auth::PrincipalKind, session::Flash};

/// Failures that controllers recover from by showing a notice and redirecting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PortalError {
    /// Missing or duplicate required field.
    Validation(String),
    /// Wrong credentials on a login form.
    Auth(String),
    /// A gated route was requested without the matching session.
    Authorization(PrincipalKind),
    NotFound(String),
    /// Upload refused before anything was written.
    FileRejected(String),
}

impl PortalError {
    pub fn flash(&self) -> Flash {
        match self {
            PortalError::Validation(message) => Flash::warning(message.clone()),
            PortalError::Auth(message) => Flash::danger(message.clone()),
            PortalError::Authorization(PrincipalKind::Admin) => {
                Flash::danger("Acesso negado. Por favor, faça login de administrador.")
            }
            PortalError::Authorization(PrincipalKind::Student) => {
                Flash::warning("Você precisa fazer login para acessar o conteúdo.")
            }
            PortalError::NotFound(message) => Flash::warning(message.clone()),
            PortalError::FileRejected(message) => Flash::danger(message.clone()),
        }
    }
}

impl fmt::Display for PortalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PortalError::Validation(message) => write!(f, "validation failed: {message}"),
            PortalError::Auth(message) => write!(f, "authentication failed: {message}"),
            PortalError::Authorization(kind) => write!(f, "{kind} session required"),
            PortalError::NotFound(message) => write!(f, "not found: {message}"),
            PortalError::FileRejected(message) => write!(f, "upload rejected: {message}"),
        }
    }
}

impl std::error::Error for PortalError {}

impl From<PortalError> for Flash {
    fn from(err: PortalError) -> Self {
        err.flash()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::web::session::FlashLevel;

    #[test]
    fn each_kind_maps_to_a_flash_level() {
        assert_eq!(
            PortalError::Validation("x".into()).flash().level,
            FlashLevel::Warning
        );
        assert_eq!(PortalError::Auth("x".into()).flash().level, FlashLevel::Danger);
        assert_eq!(
            PortalError::Authorization(PrincipalKind::Admin).flash().level,
            FlashLevel::Danger
        );
        assert_eq!(
            PortalError::Authorization(PrincipalKind::Student).flash().level,
            FlashLevel::Warning
        );
        assert_eq!(
            PortalError::FileRejected("x".into()).flash().level,
            FlashLevel::Danger
        );
    }
}
