use fxhash::FxHashMap;
use miette::SourceSpan;

use crate::catalog::{Decoded, Instruction, Operand};
use crate::error::{AsmErrorKind, AssemblyError};
use crate::runtime::MEMORY_MAX;

/// Placeholder address emitted for a label until it is backpatched.
pub const UNRESOLVED: u16 = 0xffff;

/// Assembly intermediate representation: the program origin, the statements
/// parsed so far and the labels they define.
pub struct Air {
    /// Address the first byte will be loaded at
    orig: u16,
    stmts: Vec<AirStmt>,
    /// Label name to byte offset from the start of the program
    labels: FxHashMap<String, usize>,
    /// Byte offset at the start of each source line
    source_map: Vec<usize>,
    /// Bytes emitted so far
    len: usize,
}

impl Air {
    pub fn new(orig: u16) -> Self {
        Air {
            orig,
            stmts: Vec::new(),
            labels: FxHashMap::default(),
            source_map: Vec::new(),
            len: 0,
        }
    }

    /// Record the current offset as the start of the next source line.
    pub fn mark_line(&mut self) {
        self.source_map.push(self.len);
    }

    /// Define `name` at the current offset. Error if defined twice.
    pub fn add_label(&mut self, name: &str) -> Result<(), AsmErrorKind> {
        if self.labels.contains_key(name) {
            return Err(AsmErrorKind::DuplicateLabel(name.to_string()));
        }
        self.labels.insert(name.to_string(), self.len);
        Ok(())
    }

    /// Place `stmt` at the current offset.
    pub fn add_stmt(&mut self, mut stmt: AirStmt) -> Result<(), AsmErrorKind> {
        let len = stmt.decoded().len();
        if self.orig as usize + self.len + len > MEMORY_MAX {
            return Err(AsmErrorKind::ProgramTooLarge);
        }
        stmt.offset = self.len;
        self.len += len;
        self.stmts.push(stmt);
        Ok(())
    }

    /// Resolve every label usage to its absolute address. Usages are checked
    /// in source order, so the first undefined label is the one reported.
    pub fn backpatch(&mut self) -> Result<(), AssemblyError> {
        for stmt in self.stmts.iter_mut() {
            let Some(label) = &stmt.target else {
                continue;
            };
            let Some(&offset) = self.labels.get(label) else {
                return Err(AssemblyError::new(
                    stmt.line,
                    stmt.span,
                    AsmErrorKind::UndefinedLabel(label.clone()),
                ));
            };
            stmt.operand = Operand::Word(self.orig.wrapping_add(offset as u16));
        }
        Ok(())
    }

    /// Flatten into the final byte image.
    pub fn emit(self) -> AssemblyResult {
        let mut bytes = Vec::with_capacity(self.len);
        for stmt in &self.stmts {
            debug_assert_eq!(bytes.len(), stmt.offset);
            bytes.extend(stmt.decoded().encode());
        }
        AssemblyResult {
            origin: self.orig,
            bytes,
            source_map: self.source_map,
        }
    }
}

/// Single 8085 statement.
#[derive(Clone, Debug)]
pub struct AirStmt {
    /// 0-based source line
    pub line: usize,
    pub span: SourceSpan,
    /// Byte offset of the opcode from the start of the program
    pub offset: usize,
    pub instruction: &'static Instruction,
    pub operand: Operand,
    /// Label whose address replaces the operand during backpatching
    pub target: Option<String>,
}

impl AirStmt {
    pub fn new(
        line: usize,
        span: SourceSpan,
        instruction: &'static Instruction,
        operand: Operand,
        target: Option<String>,
    ) -> Self {
        AirStmt {
            line,
            span,
            offset: 0,
            instruction,
            operand,
            target,
        }
    }

    pub fn decoded(&self) -> Decoded {
        Decoded {
            instruction: self.instruction,
            operand: self.operand,
        }
    }
}

/// Output of a successful assembly.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct AssemblyResult {
    /// Address label references were resolved against.
    pub origin: u16,
    pub bytes: Vec<u8>,
    /// Byte offset of each 0-based source line, indexed by line number.
    pub source_map: Vec<usize>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::catalog;

    fn stmt(mnemonic: &str, operand: Operand, target: Option<&str>) -> AirStmt {
        let instruction = catalog().by_mnemonic(mnemonic).unwrap();
        AirStmt::new(0, (0, 0).into(), instruction, operand, target.map(String::from))
    }

    #[test]
    fn backpatch_resolves_against_origin() {
        let mut air = Air::new(0x400);
        air.add_stmt(stmt("nop", Operand::None, None)).unwrap();
        air.add_label("here").unwrap();
        air.add_stmt(stmt("jmp", Operand::Word(UNRESOLVED), Some("here")))
            .unwrap();
        assert_eq!(air.stmts[1].offset, 1);
        air.backpatch().unwrap();
        assert_eq!(air.emit().bytes, vec![0x00, 0xc3, 0x01, 0x04]);
    }

    #[test]
    fn duplicate_label() {
        let mut air = Air::new(0);
        air.add_label("a").unwrap();
        assert_eq!(
            air.add_label("a"),
            Err(AsmErrorKind::DuplicateLabel("a".into()))
        );
    }

    #[test]
    fn program_too_large() {
        let mut air = Air::new(0xfffe);
        air.add_stmt(stmt("nop", Operand::None, None)).unwrap();
        assert_eq!(
            air.add_stmt(stmt("lda", Operand::Word(0), None)),
            Err(AsmErrorKind::ProgramTooLarge)
        );
        assert_eq!(air.stmts.len(), 1);
    }
}
