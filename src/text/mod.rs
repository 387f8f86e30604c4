//! # Text Pipeline
//!
//! Everything between a committed item's raw text and the rows a renderer
//! paints. Pure functions only; nothing here knows about ratatui.
//!
//! ```text
//! raw line ─► format_line ─► segments ─► wrap_segments ─► render_panel
//!               │   └─ parse_styled_segments
//!               └─ apply_latex_transformations (non-code runs)
//! ```

pub mod format;
pub mod latex;
pub mod panel;
pub mod segment;
pub mod wrap;

pub use format::{FormattedLine, format_line, format_lines};
pub use latex::apply_latex_transformations;
pub use panel::{PanelCell, PanelKind, PanelRow, RowPart, display_width, render_panel, row_text};
pub use segment::{SegmentStyle, TextSegment, flatten, parse_styled_segments};
pub use wrap::wrap_segments;
