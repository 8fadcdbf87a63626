pub mod adf;
pub mod text;
