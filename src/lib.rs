pub mod amendments;
pub mod html;
pub mod index;
pub mod linkify;
pub mod persist;
pub mod plain_text;
pub mod references;
pub mod rewrite;
pub mod runtime;
pub mod sections;
pub mod types;
