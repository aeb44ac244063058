//! UI rendering module for coindeck
//!
//! This module contains all the rendering logic for the terminal user
//! interface, using the ratatui library for TUI components.

pub mod coin_detail;
pub mod compare;
pub mod help_overlay;
pub mod market_table;
pub mod watchlist_view;
pub mod widgets;

pub use coin_detail::render as render_coin_detail;
pub use compare::render as render_compare;
pub use help_overlay::render as render_help_overlay;
pub use market_table::render as render_market_table;
pub use watchlist_view::render as render_watchlist;
