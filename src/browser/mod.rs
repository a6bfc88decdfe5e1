//! Browser collaborator: a shared headless-chrome session that renders the
//! book-detail and chapter pages and evaluates in-page script.
//!
//! The reader is a dynamic app: chapter text arrives through in-page state,
//! not the initial HTML, so a real browser context (with the operator's
//! login cookies in its user-data dir) is required. One session is shared
//! across the whole run; one page is open at a time and pages are closed
//! after use.

use crate::export::{BookSource, ExportError};
use crate::model::{ChapterMeta, ChapterPage};
use headless_chrome::{Browser, LaunchOptions};
use std::path::PathBuf;
use std::time::{Duration, Instant};

const BOOK_DETAIL_URL: &str = "https://book.qq.com/book-detail";
const BOOK_READ_URL: &str = "https://book.qq.com/book-read";
const CATALOG_API_URL: &str = "https://book.qq.com/api/book/detail/chapters";

/// Root element of the rendered chapter content.
const CONTENT_ROOT_SELECTOR: &str = ".reader_content_area";
/// Present while the operator is not logged in.
const LOGIN_LINK_SELECTOR: &str = r#"a[href*="login"]"#;

/// Bounded wait for the rendered content root after navigation.
const LOAD_WAIT: Duration = Duration::from_secs(10);
/// Fixed extra delay when the load signal never fires; slow rendering is
/// tolerated, not escalated.
const LOAD_FALLBACK_DELAY: Duration = Duration::from_secs(3);
/// How long the login link may take to appear before assuming a live session.
const LOGIN_PROBE_WAIT: Duration = Duration::from_secs(5);
/// How long the operator gets to complete an interactive login.
const LOGIN_WAIT: Duration = Duration::from_secs(180);
const LOGIN_POLL_INTERVAL: Duration = Duration::from_secs(2);

/// Explicit browser configuration; every field has a documented default.
#[derive(Debug, Clone)]
pub struct BrowserConfig {
    /// Browser executable. None lets headless_chrome locate one.
    pub executable: Option<PathBuf>,
    /// Profile directory carrying the login cookies between runs.
    /// Default `.qqbook_user_data` under the working directory.
    pub user_data_dir: PathBuf,
    /// Default false: login is interactive and needs a visible window.
    pub headless: bool,
    /// Viewport size. Default 1920x1080.
    pub window_size: (u32, u32),
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            executable: None,
            user_data_dir: PathBuf::from(".qqbook_user_data"),
            headless: false,
            window_size: (1920, 1080),
        }
    }
}

fn browser_err(e: anyhow::Error) -> ExportError {
    ExportError::Browser { source: e }
}

/// Shared browsing session implementing [BookSource].
pub struct ChromeSession {
    browser: Browser,
}

impl ChromeSession {
    /// Launch the browser with the given configuration.
    pub fn launch(config: &BrowserConfig) -> Result<Self, ExportError> {
        let options = LaunchOptions::default_builder()
            .path(config.executable.clone())
            .headless(config.headless)
            .user_data_dir(Some(config.user_data_dir.clone()))
            .window_size(Some(config.window_size))
            .idle_browser_timeout(Duration::from_secs(300))
            .build()
            .map_err(|e| browser_err(anyhow::anyhow!(e)))?;
        let browser = Browser::new(options).map_err(browser_err)?;
        Ok(Self { browser })
    }

    /// Open the book-detail page and check for a login link. When present,
    /// the operator is prompted to log in in the open window; the session
    /// waits (bounded) until the link disappears.
    pub fn ensure_logged_in(&self, book_id: u64) -> Result<(), ExportError> {
        let tab = self.browser.new_tab().map_err(browser_err)?;
        let url = format!("{}/{}", BOOK_DETAIL_URL, book_id);
        let result = (|| {
            tab.navigate_to(&url).map_err(browser_err)?;
            tab.wait_until_navigated().map_err(browser_err)?;

            if tab
                .wait_for_element_with_custom_timeout(LOGIN_LINK_SELECTOR, LOGIN_PROBE_WAIT)
                .is_err()
            {
                // No login link within the probe window: already logged in.
                return Ok(());
            }

            eprintln!("Not logged in. Complete the login in the browser window; the export continues automatically.");
            let deadline = Instant::now() + LOGIN_WAIT;
            let probe = format!(
                "document.querySelector('{}') === null",
                LOGIN_LINK_SELECTOR
            );
            while Instant::now() < deadline {
                let gone = tab
                    .evaluate(&probe, false)
                    .ok()
                    .and_then(|o| o.value)
                    .and_then(|v| v.as_bool())
                    .unwrap_or(false);
                if gone {
                    eprintln!("Login detected. Continuing.");
                    return Ok(());
                }
                std::thread::sleep(LOGIN_POLL_INTERVAL);
            }
            Err(ExportError::LoginTimeout {
                timeout_secs: LOGIN_WAIT.as_secs(),
            })
        })();
        tab.close(true).ok();
        result
    }

    fn fetch_catalog(&self, book_id: u64) -> Result<Vec<ChapterMeta>, ExportError> {
        let tab = self.browser.new_tab().map_err(browser_err)?;
        let url = format!("{}/{}", BOOK_DETAIL_URL, book_id);
        let result = (|| {
            tab.navigate_to(&url).map_err(browser_err)?;
            tab.wait_until_navigated().map_err(browser_err)?;

            // The catalog endpoint needs the page's session; fetch it in-page.
            let script = format!(
                r#"(async () => {{
                    try {{
                        const res = await fetch('{}?bid={}');
                        const data = await res.json();
                        return data && data.data ? JSON.stringify(data.data) : null;
                    }} catch (e) {{
                        return null;
                    }}
                }})()"#,
                CATALOG_API_URL, book_id
            );
            let outcome = tab.evaluate(&script, true).map_err(|e| {
                ExportError::Evaluate {
                    url: url.clone(),
                    reason: e.to_string(),
                }
            })?;
            let json = match outcome.value {
                Some(serde_json::Value::String(s)) => s,
                _ => {
                    return Err(ExportError::CatalogFetch {
                        book_id,
                        reason: "catalog request returned no data".to_string(),
                    })
                }
            };
            serde_json::from_str(&json).map_err(|e| ExportError::CatalogFetch {
                book_id,
                reason: format!("unexpected catalog shape: {}", e),
            })
        })();
        tab.close(true).ok();
        result
    }

    fn fetch_chapter_page(&self, book_id: u64, chapter_id: u64) -> Result<ChapterPage, ExportError> {
        let tab = self.browser.new_tab().map_err(browser_err)?;
        let url = format!("{}/{}/{}", BOOK_READ_URL, book_id, chapter_id);
        let result = (|| {
            tab.navigate_to(&url).map_err(browser_err)?;
            tab.wait_until_navigated().map_err(browser_err)?;

            // Bounded wait for the load-complete signal; on timeout fall back
            // to a fixed delay and proceed to extraction anyway.
            if tab
                .wait_for_element_with_custom_timeout(CONTENT_ROOT_SELECTOR, LOAD_WAIT)
                .is_err()
            {
                std::thread::sleep(LOAD_FALLBACK_DELAY);
            }

            // Prefer the app state; fall back to the content root's inner
            // HTML with script tags removed.
            let script = format!(
                r#"(() => {{
                    const nuxt = window.__NUXT__;
                    if (nuxt && nuxt.data && nuxt.data[0] && nuxt.data[0].currentContent
                        && nuxt.data[0].currentContent.content) {{
                        return nuxt.data[0].currentContent.content;
                    }}
                    const root = document.querySelector('{}');
                    if (root) {{
                        const clone = root.cloneNode(true);
                        clone.querySelectorAll('script').forEach(s => s.remove());
                        return clone.innerHTML;
                    }}
                    return null;
                }})()"#,
                CONTENT_ROOT_SELECTOR
            );
            let outcome = tab.evaluate(&script, false).map_err(|e| {
                ExportError::Evaluate {
                    url: url.clone(),
                    reason: e.to_string(),
                }
            })?;
            match outcome.value {
                Some(serde_json::Value::String(html)) => Ok(ChapterPage::Content(html)),
                // Content root missing entirely: hand over the whole page for
                // the degraded serialization path.
                _ => {
                    let full = tab.get_content().map_err(browser_err)?;
                    Ok(ChapterPage::Raw(full))
                }
            }
        })();
        tab.close(true).ok();
        result
    }
}

impl BookSource for ChromeSession {
    fn catalog(&mut self, book_id: u64) -> Result<Vec<ChapterMeta>, ExportError> {
        self.fetch_catalog(book_id)
    }

    fn chapter_page(&mut self, book_id: u64, chapter_id: u64) -> Result<ChapterPage, ExportError> {
        self.fetch_chapter_page(book_id, chapter_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_values() {
        let config = BrowserConfig::default();
        assert!(config.executable.is_none());
        assert_eq!(config.user_data_dir, PathBuf::from(".qqbook_user_data"));
        assert!(!config.headless);
        assert_eq!(config.window_size, (1920, 1080));
    }
}
