//! UI module for the presentation TUI

pub mod render;
pub mod theme;
