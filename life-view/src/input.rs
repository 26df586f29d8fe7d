//! Terminal input - keys, resize and the pointer used for panning

use crossterm::event::{
    Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers, MouseButton, MouseEvent, MouseEventKind,
};
use life_core::viewport::Viewport;

/// What the main loop should do after an event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputAction {
    Continue,
    Quit,
    Resize(u16, u16),
}

/// Last known pointer position (terminal cells) and left button state
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PointerState {
    pub column: u16,
    pub row: u16,
    pub pressed: bool,
}

impl PointerState {
    /// Fold one terminal event into the pointer state
    pub fn handle(&mut self, event: Event) -> InputAction {
        match event {
            Event::Key(key) => handle_key(key),
            Event::Mouse(mouse) => {
                self.handle_mouse(mouse);
                InputAction::Continue
            }
            Event::Resize(cols, rows) => InputAction::Resize(cols, rows),
            _ => InputAction::Continue,
        }
    }

    fn handle_mouse(&mut self, mouse: MouseEvent) {
        match mouse.kind {
            MouseEventKind::Down(MouseButton::Left) | MouseEventKind::Drag(MouseButton::Left) => {
                self.pressed = true;
            }
            MouseEventKind::Up(MouseButton::Left) => self.pressed = false,
            MouseEventKind::Moved => {}
            _ => return,
        }
        self.column = mouse.column;
        self.row = mouse.row;
    }

    /// Feed the current sample to the viewport. One terminal row holds two
    /// grid rows, so the vertical coordinate is doubled.
    pub fn apply(&self, viewport: &mut Viewport) {
        viewport.pan(self.column as i32, self.row as i32 * 2, self.pressed);
    }
}

fn handle_key(key: KeyEvent) -> InputAction {
    if key.kind != KeyEventKind::Press {
        return InputAction::Continue;
    }
    match key.code {
        KeyCode::Esc | KeyCode::Char('q') => InputAction::Quit,
        // Raw mode swallows SIGINT
        KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => InputAction::Quit,
        _ => InputAction::Continue,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mouse(kind: MouseEventKind, column: u16, row: u16) -> Event {
        Event::Mouse(MouseEvent {
            kind,
            column,
            row,
            modifiers: KeyModifiers::NONE,
        })
    }

    fn key(code: KeyCode) -> Event {
        Event::Key(KeyEvent::new(code, KeyModifiers::NONE))
    }

    #[test]
    fn test_quit_keys() {
        let mut pointer = PointerState::default();
        assert_eq!(pointer.handle(key(KeyCode::Char('q'))), InputAction::Quit);
        assert_eq!(pointer.handle(key(KeyCode::Esc)), InputAction::Quit);
        assert_eq!(pointer.handle(key(KeyCode::Char('x'))), InputAction::Continue);
        let ctrl_c = Event::Key(KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL));
        assert_eq!(pointer.handle(ctrl_c), InputAction::Quit);
    }

    #[test]
    fn test_resize() {
        let mut pointer = PointerState::default();
        assert_eq!(pointer.handle(Event::Resize(80, 24)), InputAction::Resize(80, 24));
    }

    #[test]
    fn test_left_drag_tracks_pointer() {
        let mut pointer = PointerState::default();
        pointer.handle(mouse(MouseEventKind::Down(MouseButton::Left), 10, 5));
        assert!(pointer.pressed);
        pointer.handle(mouse(MouseEventKind::Drag(MouseButton::Left), 4, 3));
        assert_eq!((pointer.column, pointer.row), (4, 3));
        pointer.handle(mouse(MouseEventKind::Up(MouseButton::Left), 4, 3));
        assert!(!pointer.pressed);
    }

    #[test]
    fn test_other_buttons_ignored() {
        let mut pointer = PointerState::default();
        pointer.handle(mouse(MouseEventKind::Down(MouseButton::Right), 10, 5));
        assert_eq!(pointer, PointerState::default());
    }

    #[test]
    fn test_drag_pans_viewport() {
        let mut viewport = Viewport::new(40, 40, 256, 128);
        let mut pointer = PointerState::default();

        pointer.handle(mouse(MouseEventKind::Down(MouseButton::Left), 30, 10));
        pointer.apply(&mut viewport);
        pointer.handle(mouse(MouseEventKind::Drag(MouseButton::Left), 20, 6));
        pointer.apply(&mut viewport);

        // rows count double
        assert_eq!(viewport.offset(), (10, 8));

        pointer.handle(mouse(MouseEventKind::Up(MouseButton::Left), 20, 6));
        pointer.apply(&mut viewport);
        assert!(!viewport.is_dragging());
    }
}
