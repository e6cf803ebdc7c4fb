pub mod condition;
pub mod template;
pub mod value_path;
