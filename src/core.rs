pub mod display;
pub mod dump;
pub mod ranking;
pub mod templates;
pub mod values;
