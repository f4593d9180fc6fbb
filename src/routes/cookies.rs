/// Refresh Token Cookie
///
/// The refresh token travels only in an HttpOnly, SameSite=Strict cookie
/// scoped to the auth routes. Clearing it must repeat the attributes used
/// to set it, otherwise browsers keep the original cookie.

use actix_web::cookie::{time::Duration, Cookie, CookieBuilder, SameSite};

use crate::configuration::CookieSettings;

fn base(settings: &CookieSettings, value: String) -> CookieBuilder<'static> {
    let builder = Cookie::build(settings.name.clone(), value)
        .path(settings.path.clone())
        .http_only(true)
        .secure(settings.secure)
        .same_site(SameSite::Strict);

    match &settings.domain {
        Some(domain) => builder.domain(domain.clone()),
        None => builder,
    }
}

/// Cookie carrying a freshly issued refresh token
pub fn refresh_cookie(settings: &CookieSettings, token: String, max_age_seconds: i64) -> Cookie<'static> {
    base(settings, token)
        .max_age(Duration::seconds(max_age_seconds))
        .finish()
}

/// Cookie that clears the refresh token
pub fn removal_cookie(settings: &CookieSettings) -> Cookie<'static> {
    let mut cookie = base(settings, String::new()).finish();
    cookie.make_removal();
    cookie
}
