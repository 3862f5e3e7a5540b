pub mod pages;
pub mod process;
pub mod static_assets;
