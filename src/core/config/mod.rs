pub mod data;
pub mod defaults;
pub mod io;
pub mod printing;
pub mod settings;

pub use data::{path_display, AspectRatio, Config, ImageSize};
pub use io::ConfigError;
