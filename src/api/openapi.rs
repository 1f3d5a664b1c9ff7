use super::handlers::{articles, auth, health, profiles, users};
use utoipa::openapi::{Contact, InfoBuilder, License, OpenApiBuilder, Tag};
use utoipa_axum::{router::OpenApiRouter, routes};

#[must_use]
pub fn openapi() -> utoipa::openapi::OpenApi {
    // Reuse the same router wiring and only return the generated OpenAPI spec.
    let (_router, openapi) = api_router().split_for_parts();
    openapi
}

/// Build the router that also drives the `OpenAPI` document.
///
/// Add new endpoints here via `.routes(routes!(...))` so they are both served
/// and included in the generated `OpenAPI` spec.
/// Routes added outside (like `/` or `OPTIONS /health`) are intentionally not documented.
pub(crate) fn api_router() -> OpenApiRouter {
    // `routes!` reads #[utoipa::path] to bind HTTP method + path and add the route to OpenAPI.
    let router = OpenApiRouter::with_openapi(cargo_openapi())
        .routes(routes!(health::health))
        .routes(routes!(auth::signup::signup))
        .routes(routes!(auth::verification::verify))
        .routes(routes!(auth::login::login))
        .routes(routes!(auth::password::forgot_password))
        .routes(routes!(auth::password::reset_password))
        .routes(routes!(auth::social::google_auth))
        .routes(routes!(auth::social::facebook_auth))
        .routes(routes!(auth::social::twitter_auth))
        .routes(routes!(profiles::get_my_profile, profiles::update_my_profile))
        .routes(routes!(profiles::get_user_profile))
        .routes(routes!(users::list_users))
        .routes(routes!(users::get_user))
        .routes(routes!(articles::create_article, articles::list_articles))
        .routes(routes!(articles::get_article, articles::patch_article));

    let mut auth_tag = Tag::new("auth");
    auth_tag.description = Some("Signup, login, verification, and social auth".to_string());

    let mut users_tag = Tag::new("users");
    users_tag.description = Some("Admin-only user directory".to_string());

    let mut profiles_tag = Tag::new("profiles");
    profiles_tag.description = Some("Own and public profile views".to_string());

    let mut articles_tag = Tag::new("articles");
    articles_tag.description = Some("Article publishing with tags and slugs".to_string());

    let tags_openapi = OpenApiBuilder::new()
        .tags(Some(vec![auth_tag, users_tag, profiles_tag, articles_tag]))
        .build();

    router.merge(OpenApiRouter::with_openapi(tags_openapi))
}

fn cargo_openapi() -> utoipa::openapi::OpenApi {
    // Use Cargo.toml metadata instead of the utoipa-axum crate info defaults.
    let mut info = InfoBuilder::new()
        .title(env!("CARGO_PKG_NAME"))
        .version(env!("CARGO_PKG_VERSION"))
        .description(optional_str(env!("CARGO_PKG_DESCRIPTION")))
        .build();

    info.contact = cargo_contact();
    info.license = cargo_license();

    OpenApiBuilder::new().info(info).build()
}

fn cargo_contact() -> Option<Contact> {
    // Cargo authors are `;` separated and may include "Name <email>".
    let authors = env!("CARGO_PKG_AUTHORS");
    let primary = authors.split(';').next().map(str::trim)?;
    if primary.is_empty() {
        return None;
    }

    let (name, email) = parse_author(primary);
    if name.is_none() && email.is_none() {
        return None;
    }

    let mut contact = Contact::new();
    contact.name = name.map(str::to_string);
    contact.email = email.map(str::to_string);
    Some(contact)
}

fn cargo_license() -> Option<License> {
    let identifier = optional_str(env!("CARGO_PKG_LICENSE"))?;
    let mut license = License::new(identifier);
    license.identifier = Some(identifier.to_string());
    Some(license)
}

fn optional_str(value: &'static str) -> Option<&'static str> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed)
    }
}

fn parse_author(author: &str) -> (Option<&str>, Option<&str>) {
    if let Some(start) = author.find('<') {
        let name = author[..start].trim();
        let email = author[start + 1..].trim_end_matches('>').trim();
        let name = if name.is_empty() { None } else { Some(name) };
        let email = if email.is_empty() { None } else { Some(email) };
        (name, email)
    } else {
        let name = author.trim();
        (if name.is_empty() { None } else { Some(name) }, None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn openapi_info_from_cargo() {
        let spec = openapi();
        assert_eq!(spec.info.title, env!("CARGO_PKG_NAME"));
        assert_eq!(spec.info.version, env!("CARGO_PKG_VERSION"));
        assert_eq!(
            spec.info.description.as_deref(),
            Some(env!("CARGO_PKG_DESCRIPTION"))
        );

        let contact = spec.info.contact;
        assert!(contact.is_some());
        if let Some(contact) = contact {
            assert_eq!(contact.name.as_deref(), Some("Authors Heaven Team"));
            assert_eq!(contact.email.as_deref(), Some("team@authorsheaven.dev"));
        }

        let license = spec.info.license;
        assert!(license.is_some());
        if let Some(license) = license {
            assert_eq!(license.name, "BSD-3-Clause");
            assert_eq!(license.identifier.as_deref(), Some("BSD-3-Clause"));
        }
    }

    #[test]
    fn openapi_tags_and_paths() {
        let spec = openapi();
        let tags = spec.tags.clone().unwrap_or_default();
        assert!(tags.iter().any(|tag| tag.name == "auth"));
        assert!(tags.iter().any(|tag| tag.name == "articles"));
        assert!(spec.paths.paths.contains_key("/v1/users/auth/signup"));
        assert!(spec.paths.paths.contains_key("/v1/users/auth/google"));
        assert!(spec.paths.paths.contains_key("/v1/articles/{slug}"));
        assert!(spec.paths.paths.contains_key("/v1/users/profile/me"));
    }

    #[test]
    fn parse_author_handles_both_shapes() {
        assert_eq!(
            parse_author("Authors Heaven Team <team@authorsheaven.dev>"),
            (Some("Authors Heaven Team"), Some("team@authorsheaven.dev"))
        );
        assert_eq!(parse_author("Solo Author"), (Some("Solo Author"), None));
    }
}
