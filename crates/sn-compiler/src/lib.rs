mod bundle;
mod condition;
mod script_compile;

pub use bundle::{
    compile_scripts_from_json_map, definitions_from_json_map, parse_definition_json,
    script_id_for_path,
};
pub use condition::parse_condition;
pub use script_compile::compile_script;
