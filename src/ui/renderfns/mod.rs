mod footer;
mod header;
mod utils;

pub use footer::draw_footer;
pub use header::draw_header;
pub use utils::{centered_rect, hex_color, priority_color, progress_bar, truncate};
