/// Account endpoints used by the web front end
use crate::{
    account::{LoginRequest, ProfileView, RegisterRequest, SessionOutcome, UpdateProfileRequest},
    asset::AssetSource,
    auth::{cleared_cookie, session_cookie, AuthContext},
    context::AppContext,
    error::{YggError, YggResult},
};
use axum::{
    extract::{Multipart, State},
    http::{header::SET_COOKIE, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Form, Router,
};

/// Build account routes
pub fn routes() -> Router<AppContext> {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/logout", post(logout))
        .route("/update", post(update))
        .route("/delete-account", post(delete_account))
        .route("/profile", get(profile))
}

fn session_response(ctx: &AppContext, status: StatusCode, outcome: SessionOutcome) -> Response {
    let cookie = session_cookie(&outcome.session.token, outcome.session.expires_at);
    let view = ProfileView::new(&outcome.account, &ctx.config.base_url);
    (status, [(SET_COOKIE, cookie)], Json(view)).into_response()
}

/// POST /register
async fn register(
    State(ctx): State<AppContext>,
    Form(req): Form<RegisterRequest>,
) -> YggResult<Response> {
    let outcome = ctx.account_manager.register(req).await?;
    Ok(session_response(&ctx, StatusCode::CREATED, outcome))
}

/// POST /login
async fn login(
    State(ctx): State<AppContext>,
    Form(req): Form<LoginRequest>,
) -> YggResult<Response> {
    let outcome = ctx.account_manager.login(req).await?;
    Ok(session_response(&ctx, StatusCode::OK, outcome))
}

/// POST /logout
async fn logout(State(ctx): State<AppContext>, auth: AuthContext) -> YggResult<Response> {
    let mut account = auth.account;
    ctx.account_manager.logout(&mut account).await?;
    Ok((StatusCode::NO_CONTENT, [(SET_COOKIE, cleared_cookie())]).into_response())
}

/// POST /update
///
/// Multipart form: `playerName`, `password`, `preferredLanguage`,
/// `skinModel`, and `skinFile`/`skinUrl`, `capeFile`/`capeUrl`. A file
/// wins over a URL for the same texture.
async fn update(
    State(ctx): State<AppContext>,
    auth: AuthContext,
    multipart: Multipart,
) -> YggResult<Json<ProfileView>> {
    let req = read_update_form(multipart).await?;
    let account = ctx.account_manager.update_profile(&auth.account, req).await?;
    Ok(Json(ProfileView::new(&account, &ctx.config.base_url)))
}

/// POST /delete-account
async fn delete_account(State(ctx): State<AppContext>, auth: AuthContext) -> YggResult<Response> {
    ctx.account_manager.delete_account(auth.account).await?;
    Ok((StatusCode::NO_CONTENT, [(SET_COOKIE, cleared_cookie())]).into_response())
}

/// GET /profile
async fn profile(State(ctx): State<AppContext>, auth: AuthContext) -> Json<ProfileView> {
    Json(ProfileView::new(&auth.account, &ctx.config.base_url))
}

async fn read_update_form(mut multipart: Multipart) -> YggResult<UpdateProfileRequest> {
    let bad_form = |e: axum::extract::multipart::MultipartError| {
        YggError::validation("form", format!("malformed form data: {}", e))
    };

    let mut req = UpdateProfileRequest::default();
    let (mut skin_file, mut skin_url) = (None, None);
    let (mut cape_file, mut cape_url) = (None, None);

    while let Some(field) = multipart.next_field().await.map_err(bad_form)? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "skinFile" | "capeFile" => {
                let data = field.bytes().await.map_err(bad_form)?;
                // Browsers send an empty part when no file was picked
                if !data.is_empty() {
                    let source = Some(AssetSource::Upload(data.to_vec()));
                    if name == "skinFile" {
                        skin_file = source;
                    } else {
                        cape_file = source;
                    }
                }
            }
            _ => {
                let value = field.text().await.map_err(bad_form)?;
                match name.as_str() {
                    "playerName" => req.player_name = Some(value),
                    "password" => req.password = Some(value),
                    "preferredLanguage" => req.preferred_language = Some(value),
                    "skinModel" => req.skin_model = Some(value),
                    "skinUrl" if !value.trim().is_empty() => skin_url = Some(AssetSource::Url(value)),
                    "capeUrl" if !value.trim().is_empty() => cape_url = Some(AssetSource::Url(value)),
                    _ => {}
                }
            }
        }
    }

    req.skin = skin_file.or(skin_url);
    req.cape = cape_file.or(cape_url);
    Ok(req)
}
