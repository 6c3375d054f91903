//! A compiler for the Kaleidoscope language: lexer, parser, an SSA IR and
//! an incremental compilation
//! [Session](session::Session) that hands modules to an
//! [ExecutionBackend](backend::ExecutionBackend).
#![forbid(unsafe_code)]

pub mod ast;
pub mod backend;
pub mod basic_block;
pub mod codegen;
pub mod function;
pub mod inserter;
pub mod instruction;
pub mod irfmt;
pub mod lexer;
pub mod location;
pub mod module;
pub mod parser;
pub mod result;
pub mod session;
pub mod token;
pub mod value;
