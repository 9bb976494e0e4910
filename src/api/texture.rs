/// Texture serving and challenge skins
use crate::{
    asset::AssetKind,
    context::AppContext,
    error::{YggError, YggResult},
    identity::challenge_skin,
    policy::MigrationRule,
    validation,
};
use axum::{
    extract::{Path, Query, State},
    http::header,
    response::{IntoResponse, Json, Response},
    routing::get,
    Router,
};
use serde::{Deserialize, Serialize};

pub fn routes() -> Router<AppContext> {
    Router::new()
        .route("/texture/:kind/:file", get(get_texture))
        .route("/challenge-skin", get(get_challenge_skin))
        .route("/migration", get(get_migration))
}

fn png(data: Vec<u8>, cache_control: &'static str) -> Response {
    (
        [
            (header::CONTENT_TYPE, "image/png"),
            (header::CACHE_CONTROL, cache_control),
        ],
        data,
    )
        .into_response()
}

/// GET /texture/{skin|cape}/{hash}.png
async fn get_texture(
    State(ctx): State<AppContext>,
    Path((kind, file)): Path<(String, String)>,
) -> YggResult<Response> {
    let not_found = || YggError::NotFound(format!("No such texture: {}/{}", kind, file));

    let kind_parsed = AssetKind::parse(&kind).ok_or_else(not_found)?;
    let hash = file.strip_suffix(".png").ok_or_else(not_found)?;

    let data = ctx
        .assets
        .get(kind_parsed, hash)
        .await?
        .ok_or_else(not_found)?;

    // Content addressed, so never changes
    Ok(png(data, "public, max-age=31536000, immutable"))
}

#[derive(Debug, Deserialize)]
struct ChallengeQuery {
    username: String,
}

/// GET /challenge-skin?username=
async fn get_challenge_skin(
    State(ctx): State<AppContext>,
    Query(query): Query<ChallengeQuery>,
) -> YggResult<Response> {
    validation::validate_username(&query.username)?;
    let data = challenge_skin(&ctx.signing_key, &query.username)?;
    Ok(png(data, "no-store"))
}

/// What a player migrating an upstream account has to do
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct MigrationInstructions {
    nickname: String,
    require_skin_verification: bool,
    /// Where the player sets the challenge skin on the upstream side
    set_skin_url: String,
    challenge_skin_url: String,
}

/// GET /migration?username=
async fn get_migration(
    State(ctx): State<AppContext>,
    Query(query): Query<ChallengeQuery>,
) -> YggResult<Json<MigrationInstructions>> {
    validation::validate_username(&query.username)?;

    let MigrationRule::Allowed {
        nickname,
        set_skin_url,
        require_skin_verification,
        ..
    } = ctx.account_manager.policy().can_migrate_existing()
    else {
        return Err(YggError::Forbidden(
            "Registration from an existing account is disabled.".to_string(),
        ));
    };

    Ok(Json(MigrationInstructions {
        nickname,
        require_skin_verification,
        set_skin_url,
        challenge_skin_url: format!(
            "{}/challenge-skin?username={}",
            ctx.config.base_url.trim_end_matches('/'),
            urlencoding::encode(&query.username)
        ),
    }))
}
