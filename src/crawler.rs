use std::ffi::OsStr;
use std::time::Duration;

use anyhow::Result;
use headless_chrome::{Browser, LaunchOptions, Tab};
use once_cell::sync::Lazy;
use rand::seq::SliceRandom;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::error::AuditError;

/// Hard ceiling on reaching a settled page.
pub const NAVIGATION_TIMEOUT: Duration = Duration::from_secs(60);
/// Bounded window for the client-rendered feed to show up after navigation.
const FEED_WAIT: Duration = Duration::from_secs(20);
/// Iteration ceiling for the scroll loop.
const SCROLL_STEP_BUDGET: u32 = 60;
/// Lazy-load window granted after each scroll step.
const SCROLL_STEP_WAIT: Duration = Duration::from_secs(1);
/// One extra window after the loop for trailing lazy-loaded cards.
const SETTLE_WAIT: Duration = Duration::from_millis(1500);

const FEED_SELECTOR: &str = r#"div[role="feed"]"#;

static USER_AGENTS: Lazy<Vec<&'static str>> = Lazy::new(|| {
    vec![
        "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/123.0.0.0 Safari/537.36",
        "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/123.0.0.0 Safari/537.36",
        "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:124.0) Gecko/20100101 Firefox/124.0",
        "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.4 Safari/605.1.15",
        "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Edge/123.0.0.0 Safari/537.36",
    ]
});

// Scrolls the results feed to its bottom and reports the content height, or
// -1 when no feed container resolves. The aria-label fallback covers layouts
// where the feed role is absent.
const FEED_PROBE: &str = r#"
(() => {
    const feed = document.querySelector('div[role="feed"]')
        || document.querySelector('div[aria-label*="Results for"] > div > div[style*="overflow"]');
    if (!feed) return -1;
    feed.scrollTop = feed.scrollHeight;
    return feed.scrollHeight;
})()
"#;

pub fn maps_search_url(query: &str) -> String {
    format!(
        "https://www.google.com/maps/search/{}",
        urlencoding::encode(query)
    )
}

/// Renders the fully-expanded results page for `query` and returns its HTML.
///
/// The whole browser session lives inside this call: the `Browser` is scoped
/// to the function, so the Chrome process is released on drop no matter
/// which early-return path exits.
pub async fn render_listings_page(query: &str) -> Result<String, AuditError> {
    let url = maps_search_url(query);
    let user_agent = USER_AGENTS
        .choose(&mut rand::thread_rng())
        .copied()
        .unwrap_or(USER_AGENTS[0]);
    info!(%url, user_agent, "starting browser session");

    let browser = launch_browser(user_agent).map_err(AuditError::Unexpected)?;
    let tab = browser.new_tab().map_err(AuditError::Unexpected)?;
    tab.set_default_timeout(NAVIGATION_TIMEOUT);

    navigate(&tab, &url)?;

    let steps = expand_feed(&tab).await;
    info!(steps, "feed expansion finished");
    sleep(SETTLE_WAIT).await;

    let html = tab.get_content().map_err(AuditError::Unexpected)?;
    debug!(bytes = html.len(), "captured rendered page");
    Ok(html)
}

fn launch_browser(user_agent: &str) -> Result<Browser> {
    let ua_arg = format!("--user-agent={user_agent}");
    let args = vec![
        OsStr::new("--disable-blink-features=AutomationControlled"),
        OsStr::new("--no-sandbox"),
        OsStr::new("--disable-dev-shm-usage"),
        OsStr::new("--disable-infobars"),
        OsStr::new("--ignore-certificate-errors"),
        OsStr::new(&ua_arg),
    ];

    Browser::new(LaunchOptions {
        headless: true,
        window_size: Some((1920, 1080)),
        args,
        ..Default::default()
    })
}

fn navigate(tab: &Tab, url: &str) -> Result<(), AuditError> {
    if let Err(error) = tab
        .navigate_to(url)
        .and_then(|tab| tab.wait_until_navigated())
    {
        return Err(classify_navigation_error(error));
    }

    // The feed is rendered client-side after the document load; give it a
    // bounded window before handing the page to the expander. A missing feed
    // is a degraded page (single-place result, empty query), not a failure.
    if let Err(error) = tab.wait_for_element_with_custom_timeout(FEED_SELECTOR, FEED_WAIT) {
        warn!(%error, "results feed did not appear, continuing with whatever rendered");
    }
    Ok(())
}

fn classify_navigation_error(error: anyhow::Error) -> AuditError {
    let text = format!("{error:#}").to_lowercase();
    if text.contains("timeout") || text.contains("timed out") {
        AuditError::NavigationTimeout(NAVIGATION_TIMEOUT.as_secs())
    } else {
        AuditError::Unexpected(error)
    }
}

/// Scrolls the feed until its height stops growing or the step budget runs
/// out. Returns the number of steps taken. Never fails: probe errors and a
/// missing container both degrade to an early stop with partial results.
async fn expand_feed(tab: &Tab) -> u32 {
    poll_until_stable(SCROLL_STEP_BUDGET, SCROLL_STEP_WAIT, || {
        match tab.evaluate(FEED_PROBE, false) {
            Ok(result) => result
                .value
                .and_then(|value| value.as_i64())
                .filter(|height| *height >= 0),
            Err(error) => {
                warn!(%error, "scroll probe failed, stopping feed expansion");
                None
            }
        }
    })
    .await
}

/// Polls `observe` until two consecutive observations (separated by `wait`)
/// compare equal, `observe` opts out with `None`, or `budget` steps have
/// run. The content source gives no "loaded" signal, so convergence is
/// judged purely by the observed value going quiet.
async fn poll_until_stable<T, F>(budget: u32, wait: Duration, mut observe: F) -> u32
where
    T: PartialEq,
    F: FnMut() -> Option<T>,
{
    let mut previous: Option<T> = None;
    for step in 0..budget {
        let current = match observe() {
            Some(value) => value,
            None => return step,
        };
        if previous.as_ref() == Some(&current) {
            debug!(step, "content stable, stopping early");
            return step;
        }
        previous = Some(current);
        sleep(wait).await;
    }
    budget
}
