//! Browser-like request headers

use rand::seq::SliceRandom;

const DESKTOP_PLATFORMS: [&str; 4] = [
    "Windows NT 10.0; Win64; x64",
    "Macintosh; Intel Mac OS X 10_15_7",
    "Macintosh; Intel Mac OS X 14_2_1",
    "X11; Linux x86_64",
];

const CHROME_VERSIONS: [&str; 5] = [
    "120.0.0.0",
    "121.0.0.0",
    "122.0.0.0",
    "123.0.0.0",
    "124.0.0.0",
];

/// Generate a realistic desktop Chrome user agent.
///
/// Scraped providers (Bing, DuckDuckGo) serve a stripped page to unknown agents.
pub fn generate_user_agent() -> String {
    let mut rng = rand::thread_rng();
    let platform = DESKTOP_PLATFORMS
        .choose(&mut rng)
        .copied()
        .unwrap_or(DESKTOP_PLATFORMS[0]);
    let chrome = CHROME_VERSIONS
        .choose(&mut rng)
        .copied()
        .unwrap_or(CHROME_VERSIONS[0]);

    format!(
        "Mozilla/5.0 ({}) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/{} Safari/537.36",
        platform, chrome
    )
}

/// Standard accept headers for HTML requests
pub fn accept_html() -> &'static str {
    "text/html,application/xhtml+xml,application/xml;q=0.9,image/webp,*/*;q=0.8"
}

/// Standard accept headers for JSON requests
pub fn accept_json() -> &'static str {
    "application/json,text/javascript,*/*;q=0.01"
}

/// Accept-Language header preferring `lang`, falling back to English
pub fn accept_language(lang: &str) -> String {
    match lang {
        "" | "en" => "en-US,en;q=0.9".to_string(),
        "pt" => "pt-BR,pt;q=0.9,en;q=0.8".to_string(),
        other => format!("{},en-US;q=0.9,en;q=0.8", other),
    }
}
