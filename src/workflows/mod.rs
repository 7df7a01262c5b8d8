//! Workflows built on the nested cross-validation core

mod instruction;
mod ml_process;

pub use instruction::TrainMLModelInstruction;
pub use ml_process::MLProcess;
