use ratatui::Frame;
use ratatui::layout::Rect;

/// A piece of the screen.
///
/// Components receive their data as struct fields (props) and render into a
/// `Rect`. `render` takes `&mut self` so stateful components can refresh
/// their caches (layout heights, scroll offsets) during the render pass, the
/// same way ratatui's `StatefulWidget` does.
pub trait Component {
    fn render(&mut self, frame: &mut Frame, area: Rect);
}

/// A component that consumes terminal events.
pub trait EventHandler {
    /// The higher-level event this component emits.
    type Event;

    /// Handle a low-level `TuiEvent` and optionally return a higher-level event.
    fn handle_event(&mut self, event: &super::event::TuiEvent) -> Option<Self::Event>;
}
