pub mod error;
pub mod lexer;
pub mod parser;
pub mod printer;

pub use error::AsmError;
pub use printer::print;

use heurist_bytecode::{verify::verify_class, ClassFile};

/// Assemble `.hasm` source into a verified class file.
pub fn assemble(source: &str) -> Result<ClassFile, AsmError> {
    let tokens = lexer::lex(source)?;
    let class = parser::parse(tokens)?;
    verify_class(&class)?;
    Ok(class)
}
