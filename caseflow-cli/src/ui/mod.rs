mod theme;

pub use theme::styles;
