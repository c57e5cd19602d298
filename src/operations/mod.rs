#![deny(warnings)]

// Filesystem work behind GET directory listings, PUT/POST and DELETE

pub mod delete_file;
pub mod list_directory;
pub mod write_file;
