pub mod finding;
pub mod project;
pub mod scan;
pub mod source_file;
pub mod weakness;
