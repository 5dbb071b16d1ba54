//! Twitter/X endpoints, selectors and URL classification.

use url::Url;

/// Site root, used to absolutize relative links.
pub const HOME_URL: &str = "https://x.com";

/// Login entry point for the interactive flow.
pub const LOGIN_URL: &str = "https://x.com/login";

/// Bookmarks timeline.
pub const BOOKMARKS_URL: &str = "https://x.com/i/bookmarks";

/// URL fragments that mean we are looking at a login or challenge wall.
pub const LOGIN_WALL_FRAGMENTS: [&str; 3] = ["x.com/login", "x.com/i/flow", "x.com/account/"];

/// Hosts that belong to the site itself.
pub const OWN_HOSTS: [&str; 2] = ["x.com", "twitter.com"];

/// Link shortener host.
pub const SHORTENER_HOST: &str = "t.co";

/// Media CDN prefix for full-size photos.
pub const MEDIA_PREFIX: &str = "pbs.twimg.com/media";

/// One rendered tweet in a timeline.
pub const FEED_ITEM_SELECTOR: &str = r#"article[data-testid="tweet"]"#;

/// Body of an X native Article.
pub const ARTICLE_BODY_SELECTOR: &str = r#"[data-testid="articleBody"]"#;

/// Structural fallback when the article testid is missing.
pub const ARTICLE_FALLBACK_SELECTOR: &str = "article";

/// Check if a URL is a login or challenge page.
pub fn is_login_wall(url: &str) -> bool {
    LOGIN_WALL_FRAGMENTS.iter().any(|fragment| url.contains(fragment))
}

/// Check if a location shows authenticated application content.
///
/// Blank tabs and internal browser pages never count.
pub fn is_authenticated_location(url: &str) -> bool {
    url.starts_with("http") && !is_login_wall(url)
}

fn host_of(url: &str) -> Option<String> {
    Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(str::to_ascii_lowercase))
}

/// Check if a URL lives on x.com / twitter.com.
pub fn is_own_domain(url: &str) -> bool {
    host_of(url).is_some_and(|host| {
        let host = host.strip_prefix("www.").unwrap_or(&host);
        OWN_HOSTS.contains(&host)
    })
}

/// Check if a URL is a t.co redirect.
pub fn is_short_link(url: &str) -> bool {
    host_of(url).is_some_and(|host| host == SHORTENER_HOST)
}

/// Check if a URL points to an X native Article.
pub fn is_article_url(url: &str) -> bool {
    let Ok(parsed) = Url::parse(url) else {
        return false;
    };
    let own_host = parsed.host_str().is_some_and(|host| {
        let host = host.to_ascii_lowercase();
        OWN_HOSTS.iter().any(|own| host.ends_with(own))
    });
    own_host && parsed.path().contains("/articles/")
}

/// Resolve an href found in the DOM against the site root.
///
/// Absolute hrefs are returned as written.
pub fn absolutize(href: &str) -> Option<String> {
    let href = href.trim();
    if href.is_empty() {
        return None;
    }
    match Url::parse(href) {
        Ok(_) => Some(href.to_string()),
        Err(url::ParseError::RelativeUrlWithoutBase) => Url::parse(HOME_URL)
            .and_then(|base| base.join(href))
            .ok()
            .map(|url| url.to_string()),
        Err(_) => None,
    }
}
