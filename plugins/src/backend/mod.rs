pub mod replay;
pub mod webui;

pub use replay::ReplayBackend;
pub use webui::WebUiBackend;
