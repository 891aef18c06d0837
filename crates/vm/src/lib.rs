pub mod instruction;
pub mod interp;
pub mod parser;
pub mod process;

pub use instruction::{Instruction, Operand, PrintPiece};
pub use interp::{clamp_u16, Outcome};
pub use parser::{parse_line, parse_program, ParseError};
pub use process::{Process, ProcessTable};
