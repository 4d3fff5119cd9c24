//! Terminal dashboard
//!
//! - `terminal`: raw mode, key handling, redraw on every published snapshot
//! - `layout`: widget placement for each view model
//! - `renderer`: formatting and scatter jitter (display only, views stay exact)

pub mod layout;
pub mod renderer;
pub mod terminal;

pub use terminal::run_ui;
