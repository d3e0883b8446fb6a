//! User agent and accept header helpers
//!
//! Some image hosts refuse obvious bot traffic, so downloads present a
//! browser-like user agent picked once per client.

use rand::seq::SliceRandom;

const PLATFORMS: &[&str] = &[
    "Windows NT 10.0; Win64; x64",
    "Macintosh; Intel Mac OS X 10_15_7",
    "X11; Linux x86_64",
];

const CHROME_VERSIONS: &[&str] = &["122.0.0.0", "123.0.0.0", "124.0.0.0", "125.0.0.0"];

const FIREFOX_VERSIONS: &[&str] = &["123.0", "124.0", "125.0"];

/// Generate a browser-like user agent, optionally tagged with a suffix
pub fn generate_user_agent(suffix: Option<&str>) -> String {
    let mut rng = rand::thread_rng();
    let platform = PLATFORMS.choose(&mut rng).copied().unwrap_or(PLATFORMS[0]);

    let base = if rand::random::<bool>() {
        let chrome = CHROME_VERSIONS
            .choose(&mut rng)
            .copied()
            .unwrap_or(CHROME_VERSIONS[0]);
        format!(
            "Mozilla/5.0 ({}) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/{} Safari/537.36",
            platform, chrome
        )
    } else {
        let firefox = FIREFOX_VERSIONS
            .choose(&mut rng)
            .copied()
            .unwrap_or(FIREFOX_VERSIONS[0]);
        format!(
            "Mozilla/5.0 ({}; rv:{}) Gecko/20100101 Firefox/{}",
            platform, firefox, firefox
        )
    };

    match suffix {
        Some(suffix) if !suffix.is_empty() => format!("{} {}", base, suffix),
        _ => base,
    }
}

/// Accept header for image downloads
pub fn accept_image() -> &'static str {
    "image/avif,image/webp,image/apng,image/*,*/*;q=0.8"
}

/// Accept header for API calls
pub fn accept_json() -> &'static str {
    "application/json"
}
