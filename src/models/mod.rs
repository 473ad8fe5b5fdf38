// Re-export all model types from submodules
mod cards;
mod credits;
mod gamification;
mod readings;
mod subscription;
mod user;

pub use cards::*;
pub use credits::*;
pub use gamification::*;
pub use readings::*;
pub use subscription::*;
pub use user::*;

pub const SUPPORTED_LOCALES: &[&str] = &["es", "en"];
pub const DEFAULT_LOCALE: &str = "es";

pub fn validate_locale(locale: &str) -> Result<(), validator::ValidationError> {
    if SUPPORTED_LOCALES.contains(&locale) {
        Ok(())
    } else {
        Err(validator::ValidationError::new("unsupported_locale"))
    }
}
