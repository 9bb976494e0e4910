/// Account field validation
///
/// Each validator returns a `Validation` error naming the form field that
/// failed, so the first failure can be reported back as is.
use crate::{
    db::account::SkinModel,
    error::{YggError, YggResult},
};

/// Longest player name protocol clients accept
pub const MAX_PLAYER_NAME_LEN: usize = 16;

/// Language codes accepted as a preferred language
const PREFERRED_LANGUAGES: &[&str] = &[
    "ar", "be", "bg", "ca", "cs", "da", "de", "el", "en", "es", "et", "fi", "fr", "ga", "hi", "hr",
    "hu", "in", "is", "it", "iw", "ja", "ko", "lt", "lv", "mk", "ms", "mt", "nb", "nl", "nn", "no",
    "pl", "pt", "ro", "ru", "sk", "sl", "sq", "sr", "sv", "th", "tr", "uk", "vi", "zh",
];

/// Usernames must be present and usable as the initial player name
pub fn validate_username(username: &str) -> YggResult<()> {
    if username.trim().is_empty() {
        return Err(YggError::validation("username", "username can't be blank"));
    }
    if username.chars().count() > MAX_PLAYER_NAME_LEN {
        return Err(YggError::validation(
            "username",
            format!("username must be {} characters or less", MAX_PLAYER_NAME_LEN),
        ));
    }
    Ok(())
}

/// Player names are 1 to 16 characters
pub fn validate_player_name(player_name: &str) -> YggResult<()> {
    let len = player_name.chars().count();
    if len == 0 || len > MAX_PLAYER_NAME_LEN {
        return Err(YggError::validation(
            "playerName",
            format!(
                "player name must be between 1 and {} characters (inclusive)",
                MAX_PLAYER_NAME_LEN
            ),
        ));
    }
    Ok(())
}

pub fn validate_preferred_language(language: &str) -> YggResult<()> {
    if !PREFERRED_LANGUAGES.contains(&language) {
        return Err(YggError::validation(
            "preferredLanguage",
            format!("unsupported language {:?}", language),
        ));
    }
    Ok(())
}

pub fn parse_skin_model(value: &str) -> YggResult<SkinModel> {
    SkinModel::try_from(value.to_string())
        .map_err(|e| YggError::validation("skinModel", e.to_string()))
}

/// Parse a UUID in either dashed or bare-hex form, returning it dashed
pub fn parse_uuid(field: &str, value: &str) -> YggResult<String> {
    uuid::Uuid::parse_str(value.trim())
        .map(|u| u.hyphenated().to_string())
        .map_err(|_| YggError::validation(field, "not a valid UUID"))
}
