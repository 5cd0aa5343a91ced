use ratatui::Frame;

use crate::{ui::notifications::render_notifications, App, AppState};

/// What gets drawn for each `AppState`. Keys are handled by `App::on_key`.
pub trait Screen {
    fn render(&self, app: &mut App, f: &mut Frame);
}

/// Exercise picker, sensors and live session, drawn by the App widget
pub struct SetupScreen;

impl Screen for SetupScreen {
    fn render(&self, app: &mut App, f: &mut Frame) {
        f.render_widget(&*app, f.area());
    }
}

/// Full notification list
pub struct NotificationsScreen;

impl Screen for NotificationsScreen {
    fn render(&self, app: &mut App, f: &mut Frame) {
        render_notifications(app, f);
    }
}

/// Helper to construct the appropriate screen for the current state
pub fn current_screen(state: &AppState) -> Box<dyn Screen> {
    match state {
        AppState::Setup => Box::new(SetupScreen),
        AppState::Notifications => Box::new(NotificationsScreen),
    }
}
