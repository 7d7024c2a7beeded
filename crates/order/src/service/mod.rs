pub mod assembler;
pub mod order;
