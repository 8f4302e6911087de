pub mod policy;
pub mod workwindow;
