//! Profile page

use axum::{Router, middleware, response::Html, routing::get};
use html_escape::{encode_double_quoted_attribute, encode_text};

use crate::AppState;
use crate::auth::{CurrentUser, User, require_session};

/// Label shown when the provider returned neither a name nor a username
const FALLBACK_NAME: &str = "Usuário";

/// Create profile router
///
/// `/profile` sits behind the session guard; anonymous requests are
/// redirected to `/`.
pub fn profile_router(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/profile", get(profile))
        .route_layer(middleware::from_fn_with_state(state, require_session))
}

/// GET /profile
async fn profile(CurrentUser(user): CurrentUser) -> Html<String> {
    Html(render_profile(&user))
}

/// First photo URL usable as an `<img src>`
///
/// Only absolute http(s) URLs qualify; anything else (`javascript:`,
/// `data:`, relative paths) is dropped.
fn avatar_url(user: &User) -> Option<&str> {
    let value = user.profile.photos.first()?.value.as_str();
    let parsed = url::Url::parse(value).ok()?;
    matches!(parsed.scheme(), "http" | "https").then_some(value)
}

/// Render the profile page for a signed-in user
///
/// All interpolated values are HTML-escaped. The access token is never
/// part of the output.
pub fn render_profile(user: &User) -> String {
    let name = user
        .profile
        .display_name
        .as_deref()
        .or(user.profile.username.as_deref())
        .unwrap_or(FALLBACK_NAME);

    let avatar = avatar_url(user)
        .map(|src| {
            format!(
                r#"<img src="{}" alt="avatar" style="width:120px;height:120px;border-radius:50%;object-fit:cover;margin:12px 0">"#,
                encode_double_quoted_attribute(src)
            )
        })
        .unwrap_or_default();

    format!(
        r#"<!doctype html>
<html>
<head>
<meta charset="utf-8">
<meta name="viewport" content="width=device-width,initial-scale=1">
<title>Perfil</title>
<link rel="stylesheet" href="css/style.css">
</head>
<body>
<main style="display:flex;align-items:center;justify-content:center;height:100vh;color:#fff;background:#081222">
<div style="background:rgba(255,255,255,0.03);padding:28px;border-radius:12px;text-align:center">
<h2>{name}</h2>
{avatar}
<p>Logado com: {provider}</p>
<p><a href="/logout">Sair</a></p>
</div>
</main>
</body>
</html>
"#,
        name = encode_text(name),
        avatar = avatar,
        provider = encode_text(user.provider.as_str()),
    )
}
