pub mod clean_use_case;
pub mod ports;
