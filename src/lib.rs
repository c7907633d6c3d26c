pub mod ast;
pub mod codegen;
pub mod errors;
pub mod formatter;
pub mod intern;
