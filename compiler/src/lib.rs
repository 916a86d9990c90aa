// tdmc — Time-domain multiplexing compiler
//
// Library root. Layout text flows lexer → parser → layout; programs are built
// in program/tdm, checked by validate against a device, lowered by compile
// and executed by engine.

pub mod compile;
pub mod device;
pub mod diag;
pub mod engine;
pub mod error;
pub mod layout;
pub mod lexer;
pub mod ops;
pub mod parser;
pub mod passive;
pub mod program;
pub mod reshape;
pub mod tdm;
pub mod validate;

pub use compile::{compile, CompiledCircuit, Compiler};
pub use device::DeviceSpec;
pub use engine::{Backend, Engine, RunResult, VacuumSampler};
pub use error::{Error, Result};
pub use ops::{Gate, Operation, Param};
pub use program::Program;
pub use tdm::{RunOptions, Shift, TdmProgram};
