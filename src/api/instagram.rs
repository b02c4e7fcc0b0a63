// Instagram link unfurling via mirror sites
// The mirrors serve embed-friendly previews for posts and reels

use std::time::Duration;

use futures::future::BoxFuture;
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

/// Mirrors tried in order
pub const MIRRORS: [&str; 2] = ["vxinstagram.com", "ddinstagram.com"];

const PROBE_TIMEOUT: Duration = Duration::from_secs(5);
const PROBE_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36";

static POST_URL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)https?://(www\.)?instagram\.com/(p|reel)/[A-Za-z0-9_-]+").unwrap()
});

/// Every post/reel URL in a message, in order of appearance
pub fn find_post_urls(content: &str) -> Vec<String> {
    POST_URL_RE
        .find_iter(content)
        .map(|m| m.as_str().to_string())
        .collect()
}

/// Whether `url` itself starts with a post/reel link
pub fn is_post_url(url: &str) -> bool {
    POST_URL_RE.find(url).is_some_and(|m| m.start() == 0)
}

/// Mirror URLs for a post link, with query and fragment stripped
pub fn mirror_urls(url: &str) -> Vec<String> {
    let clean = url.split(['?', '#']).next().unwrap_or(url);
    MIRRORS
        .iter()
        .map(|mirror| clean.replacen("instagram.com", mirror, 1))
        .collect()
}

/// HEAD-probe a URL; any network error or non-2xx counts as unreachable.
pub async fn is_reachable(client: &reqwest::Client, url: &str) -> bool {
    let response = client
        .head(url)
        .timeout(PROBE_TIMEOUT)
        .header(reqwest::header::USER_AGENT, PROBE_USER_AGENT)
        .send()
        .await;

    match response {
        Ok(resp) => resp.status().is_success(),
        Err(e) => {
            debug!("Probe of {} failed: {}", url, e);
            false
        }
    }
}

/// First candidate the probe accepts
pub async fn first_reachable<'a, F>(candidates: Vec<String>, probe: F) -> Option<String>
where
    F: Fn(String) -> BoxFuture<'a, bool>,
{
    for candidate in candidates {
        if probe(candidate.clone()).await {
            return Some(candidate);
        }
    }
    None
}

/// Best embeddable mirror for a post link, if any mirror is up
pub async fn embeddable_url(client: &reqwest::Client, url: &str) -> Option<String> {
    if !is_post_url(url) {
        return None;
    }
    first_reachable(mirror_urls(url), |candidate| {
        Box::pin(async move { is_reachable(client, &candidate).await })
    })
    .await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_find_post_urls() {
        let text = "look https://www.instagram.com/p/AbC_1-x/?igsh=1 and http://instagram.com/reel/xyz ok";
        assert_eq!(
            find_post_urls(text),
            vec![
                "https://www.instagram.com/p/AbC_1-x".to_string(),
                "http://instagram.com/reel/xyz".to_string(),
            ]
        );
        assert!(find_post_urls("https://instagram.com/someuser").is_empty());
    }

    #[test]
    fn test_is_post_url() {
        assert!(is_post_url("https://instagram.com/p/abc"));
        assert!(!is_post_url("see https://instagram.com/p/abc"));
        assert!(!is_post_url("https://example.com"));
    }

    #[test]
    fn test_mirror_urls() {
        assert_eq!(
            mirror_urls("https://www.instagram.com/p/abc?utm=1#frag"),
            vec![
                "https://www.vxinstagram.com/p/abc".to_string(),
                "https://www.ddinstagram.com/p/abc".to_string(),
            ]
        );
    }

    #[tokio::test]
    async fn test_first_reachable_falls_back() {
        let candidates = mirror_urls("https://instagram.com/p/abc");
        let picked = first_reachable(candidates.clone(), |c| {
            Box::pin(async move { c.contains("ddinstagram") })
        })
        .await;
        assert_eq!(picked.as_deref(), Some("https://ddinstagram.com/p/abc"));

        let none = first_reachable(candidates, |_| Box::pin(async { false })).await;
        assert_eq!(none, None);
    }
}
