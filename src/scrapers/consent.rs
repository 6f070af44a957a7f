//! Cookie/privacy consent interstitial handling.
//!
//! The resolver never fails: a missing consent control simply means there is
//! nothing to dismiss, and a failed click is logged and left for the page
//! extractor to cope with.

use std::thread;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::ConsentConfig;
use crate::scrapers::traits::PageHandle;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ConsentState {
    Unknown,
    ConsentPresented,
    Dismissed,
    NotPresent,
}

/// Detect and dismiss the consent wall on a freshly loaded page.
///
/// Returns the terminal state reached: `Dismissed`, `NotPresent`, or
/// `ConsentPresented` when the control appeared but could not be clicked.
/// Blocks for the waits and the settle delay.
pub fn resolve_consent<P: PageHandle>(page: &P, config: &ConsentConfig) -> ConsentState {
    let mut state = ConsentState::Unknown;

    while let Some(next) = step(page, config, state) {
        debug!(from = ?state, to = ?next, "Consent transition");
        state = next;
    }

    state
}

fn step<P: PageHandle>(
    page: &P,
    config: &ConsentConfig,
    state: ConsentState,
) -> Option<ConsentState> {
    match state {
        ConsentState::Unknown => {
            match page.wait_for_selector(&config.accept_selector, config.detect_timeout) {
                Ok(()) => Some(ConsentState::ConsentPresented),
                Err(err) => {
                    debug!(error = %err, "No consent wall detected");
                    Some(ConsentState::NotPresent)
                }
            }
        }
        ConsentState::ConsentPresented => {
            if let Err(err) = page.click(&config.accept_selector) {
                warn!(error = %err, "Consent control found but could not be clicked");
                return None;
            }

            if let Err(err) = page.wait_for_navigation(config.navigation_timeout) {
                warn!(error = %err, "No navigation followed consent dismissal");
            }

            thread::sleep(config.settle_delay);
            info!("Consent wall dismissed");
            Some(ConsentState::Dismissed)
        }
        ConsentState::Dismissed | ConsentState::NotPresent => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakePage, PageScript};
    use std::time::Duration;

    fn quick_config() -> ConsentConfig {
        ConsentConfig {
            settle_delay: Duration::ZERO,
            ..ConsentConfig::default()
        }
    }

    #[test]
    fn absent_control_is_not_an_error() {
        let page = FakePage::new(PageScript::default());

        assert_eq!(resolve_consent(&page, &quick_config()), ConsentState::NotPresent);
        assert!(page.clicks().is_empty());
    }

    #[test]
    fn present_control_is_clicked_and_dismissed() {
        let config = quick_config();
        let page = FakePage::new(PageScript {
            consent_wall: true,
            ..PageScript::default()
        });

        assert_eq!(resolve_consent(&page, &config), ConsentState::Dismissed);
        assert_eq!(page.clicks(), vec![config.accept_selector.clone()]);
    }

    #[test]
    fn navigation_timeout_after_click_still_dismisses() {
        let page = FakePage::new(PageScript {
            consent_wall: true,
            navigation_after_click_fails: true,
            ..PageScript::default()
        });

        assert_eq!(resolve_consent(&page, &quick_config()), ConsentState::Dismissed);
    }

    #[test]
    fn failed_click_stops_in_presented_state() {
        let page = FakePage::new(PageScript {
            consent_wall: true,
            click_fails: true,
            ..PageScript::default()
        });

        assert_eq!(
            resolve_consent(&page, &quick_config()),
            ConsentState::ConsentPresented
        );
    }
}
