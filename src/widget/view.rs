//! Popup and panel visibility.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// The popup currently shown over the chat, if any.
///
/// Info and sources share one slot, so they can never be open together.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Popup {
    #[default]
    None,
    Info,
    Sources,
}

/// Visibility of the widget's popups and the history panel.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViewState {
    popup: Popup,
    history_open: bool,
}

impl ViewState {
    #[must_use]
    pub fn popup(&self) -> Popup {
        self.popup
    }

    #[must_use]
    pub fn is_info_open(&self) -> bool {
        self.popup == Popup::Info
    }

    #[must_use]
    pub fn is_sources_open(&self) -> bool {
        self.popup == Popup::Sources
    }

    #[must_use]
    pub fn history_open(&self) -> bool {
        self.history_open
    }

    /// The backdrop covers the chat whenever a popup is open.
    #[must_use]
    pub fn backdrop_visible(&self) -> bool {
        self.popup != Popup::None
    }

    pub fn toggle_info(&mut self) {
        self.toggle(Popup::Info);
    }

    pub fn toggle_sources(&mut self) {
        self.toggle(Popup::Sources);
    }

    fn toggle(&mut self, popup: Popup) {
        self.popup = if self.popup == popup { Popup::None } else { popup };
    }

    /// Clicking the backdrop closes whichever popup is open.
    pub fn click_backdrop(&mut self) {
        self.popup = Popup::None;
    }

    /// A click landed outside the info popup and its button.
    pub fn dismiss_info(&mut self) {
        if self.popup == Popup::Info {
            self.popup = Popup::None;
        }
    }

    pub fn toggle_history(&mut self) {
        self.history_open = !self.history_open;
    }

    pub fn close_history(&mut self) {
        self.history_open = false;
    }

    /// Apply a view action.
    pub fn apply(&mut self, action: ViewAction) {
        match action {
            ViewAction::ToggleInfo => self.toggle_info(),
            ViewAction::ToggleSources => self.toggle_sources(),
            ViewAction::ClickBackdrop => self.click_backdrop(),
            ViewAction::DismissInfo => self.dismiss_info(),
            ViewAction::ToggleHistory => self.toggle_history(),
            ViewAction::CloseHistory => self.close_history(),
        }
    }
}

/// User interactions that change [`ViewState`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewAction {
    ToggleInfo,
    ToggleSources,
    ClickBackdrop,
    DismissInfo,
    ToggleHistory,
    CloseHistory,
}

impl FromStr for ViewAction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "info" => Ok(Self::ToggleInfo),
            "sources" => Ok(Self::ToggleSources),
            "backdrop" => Ok(Self::ClickBackdrop),
            "dismiss-info" => Ok(Self::DismissInfo),
            "history" => Ok(Self::ToggleHistory),
            "close-history" => Ok(Self::CloseHistory),
            other => Err(format!("unknown view action: {other}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sources_then_info_leaves_only_info() {
        let mut view = ViewState::default();
        view.toggle_sources();
        view.toggle_info();
        assert!(view.is_info_open());
        assert!(!view.is_sources_open());
        assert!(view.backdrop_visible());
    }

    #[test]
    fn test_toggle_closes_same_popup() {
        let mut view = ViewState::default();
        view.toggle_info();
        view.toggle_info();
        assert_eq!(view.popup(), Popup::None);
        assert!(!view.backdrop_visible());
    }

    #[test]
    fn test_backdrop_closes_whichever_is_open() {
        let mut view = ViewState::default();
        view.toggle_sources();
        view.click_backdrop();
        assert_eq!(view.popup(), Popup::None);

        view.toggle_info();
        view.click_backdrop();
        assert_eq!(view.popup(), Popup::None);
    }

    #[test]
    fn test_dismiss_info_leaves_sources() {
        let mut view = ViewState::default();
        view.toggle_sources();
        view.dismiss_info();
        assert!(view.is_sources_open());

        view.toggle_info();
        view.dismiss_info();
        assert_eq!(view.popup(), Popup::None);
    }

    #[test]
    fn test_history_independent_of_backdrop() {
        let mut view = ViewState::default();
        view.toggle_history();
        view.toggle_info();
        view.click_backdrop();
        assert!(view.history_open());
        assert!(!view.backdrop_visible());

        view.close_history();
        assert!(!view.history_open());
    }

    #[test]
    fn test_action_parsing() {
        assert_eq!("sources".parse::<ViewAction>(), Ok(ViewAction::ToggleSources));
        assert_eq!("dismiss-info".parse::<ViewAction>(), Ok(ViewAction::DismissInfo));
        assert!("explode".parse::<ViewAction>().is_err());
    }
}
