//! Two-pass assembler.
//!
//! Lines are parsed in order into [`Air`] statements, with label references
//! left as placeholders; once every line is read the placeholders are
//! backpatched with the label addresses.
//!
//! Source lines have the form `[label:] mnemonic[, operand]` where register
//! destinations belong to the mnemonic (`mvi a, 05h`, `lxi h, 3000h`), or
//! `[label:] mnemonic operand` when no comma is used (`add m`, `jnz loop`).
//! Everything from `;` onwards is a comment, and the text is case-insensitive.

use miette::SourceSpan;

use crate::air::{Air, AirStmt, AssemblyResult, UNRESOLVED};
use crate::catalog::{catalog, Operand, OperandKind};
use crate::error::{AsmErrorKind, AssemblyError};
use crate::literal;
use crate::symbol::{Pair, Register, Source};

/// Assembler configured with the address the program will be loaded at.
#[derive(Clone, Copy, Default, Debug)]
pub struct Assembler {
    origin: u16,
}

impl Assembler {
    /// Assembler for programs loaded at address 0.
    pub fn new() -> Self {
        Assembler { origin: 0 }
    }

    /// Assembler whose label addresses are relative to `origin`.
    pub fn with_origin(origin: u16) -> Self {
        Assembler { origin }
    }

    /// Assemble `src`, stopping at the first error.
    pub fn compile(&self, src: &str) -> Result<AssemblyResult, AssemblyError> {
        AsmParser::new(src, self.origin).parse()
    }
}

/// Assemble `src` for a program loaded at address 0.
pub fn compile(src: &str) -> Result<AssemblyResult, AssemblyError> {
    Assembler::new().compile(src)
}

/// Transforms source lines into AIR
struct AsmParser<'a> {
    /// Reference to the source file
    src: &'a str,
    air: Air,
}

impl<'a> AsmParser<'a> {
    fn new(src: &'a str, orig: u16) -> Self {
        AsmParser {
            src,
            air: Air::new(orig),
        }
    }

    fn parse(mut self) -> Result<AssemblyResult, AssemblyError> {
        let mut start = 0;
        for (line, raw) in self.src.split_inclusive('\n').enumerate() {
            let text = raw.trim_end_matches(|c: char| c == '\n' || c == '\r');
            let span = SourceSpan::from((start, text.len()));
            start += raw.len();

            self.air.mark_line();
            self.parse_line(text, line, span)
                .map_err(|kind| AssemblyError::new(line, span, kind))?;
        }
        self.air.backpatch()?;
        Ok(self.air.emit())
    }

    fn parse_line(&mut self, text: &str, line: usize, span: SourceSpan) -> Result<(), AsmErrorKind> {
        let lowered = text.to_lowercase();
        let code = match lowered.split_once(';') {
            Some((code, _comment)) => code,
            None => &lowered,
        };

        // A label is a single word ahead of the colon; any other colon is
        // left for the operand parsers to reject
        let code = match code.split_once(':') {
            Some((label, rest)) if !label.trim().contains(char::is_whitespace) => {
                let label = label.trim();
                if label.is_empty() {
                    return Err(AsmErrorKind::EmptyLabel);
                }
                self.air.add_label(label)?;
                rest
            }
            _ => code,
        };

        let (mnemonic, operands) = split_statement(code);
        if mnemonic.is_empty() && operands.is_empty() {
            return Ok(());
        }

        let instruction = catalog()
            .by_mnemonic(&mnemonic)
            .ok_or(AsmErrorKind::UnknownOpcode(mnemonic))?;
        let kind = instruction.kind();
        if operands.len() != kind.operand_count() {
            return Err(AsmErrorKind::OperandCountMismatch {
                expected: kind.operand_count(),
                actual: operands.len(),
            });
        }

        let text = operands.first().copied().unwrap_or_default();
        let mut target = None;
        let operand = match kind {
            OperandKind::None => Operand::None,
            OperandKind::Data8 => Operand::Byte(literal::parse8(text)?),
            OperandKind::Data16 => word(text)?,
            OperandKind::LabelAddress16 if literal::looks_numeric(text) => word(text)?,
            OperandKind::LabelAddress16 => {
                target = Some(text.to_string());
                Operand::Word(UNRESOLVED)
            }
            OperandKind::Register => Operand::Reg(register(text)?),
            OperandKind::RegisterOrMemory => Operand::Source(source(text)?),
            OperandKind::RegisterPairOrSP => {
                Operand::Pair(pair(text, &Pair::WITH_SP, "B, D, H or SP")?)
            }
            OperandKind::RegisterPairOrPSW => {
                Operand::Pair(pair(text, &Pair::WITH_PSW, "B, D, H or PSW")?)
            }
            OperandKind::RegisterPairBD => Operand::Pair(pair(text, &Pair::BD, "B or D")?),
            OperandKind::Index3Bit => Operand::Index(index(text)?),
        };

        self.air
            .add_stmt(AirStmt::new(line, span, instruction, operand, target))
    }
}

/// Split a comment-free line into its mnemonic and operands.
///
/// With a comma, everything before it is the mnemonic (whitespace collapsed,
/// so `mvi   a` reads as `mvi a`). Without one, the first word is.
fn split_statement(code: &str) -> (String, Vec<&str>) {
    match code.split_once(',') {
        Some((left, right)) => {
            let mnemonic = left.split_whitespace().collect::<Vec<_>>().join(" ");
            let operands = right
                .split(|c: char| c == ',' || c.is_whitespace())
                .filter(|s| !s.is_empty())
                .collect();
            (mnemonic, operands)
        }
        None => {
            let mut words = code.split_whitespace();
            let mnemonic = words.next().unwrap_or_default().to_string();
            (mnemonic, words.collect())
        }
    }
}

fn word(text: &str) -> Result<Operand, AsmErrorKind> {
    let (low, high) = literal::parse16(text)?;
    Ok(Operand::Word(u16::from_le_bytes([low, high])))
}

fn register(text: &str) -> Result<Register, AsmErrorKind> {
    text.parse().map_err(|_| AsmErrorKind::InvalidRegister {
        found: text.to_string(),
        allowed: "A, B, C, D, E, H or L",
    })
}

fn source(text: &str) -> Result<Source, AsmErrorKind> {
    text.parse().map_err(|_| AsmErrorKind::InvalidRegister {
        found: text.to_string(),
        allowed: "A, B, C, D, E, H, L or M",
    })
}

fn pair(text: &str, valid: &[Pair], allowed: &'static str) -> Result<Pair, AsmErrorKind> {
    text.parse()
        .ok()
        .filter(|pair| valid.contains(pair))
        .ok_or_else(|| AsmErrorKind::InvalidRegisterPair {
            found: text.to_string(),
            allowed,
        })
}

fn index(text: &str) -> Result<u8, AsmErrorKind> {
    text.parse::<u8>()
        .ok()
        .filter(|&index| index < 8)
        .ok_or_else(|| AsmErrorKind::IndexOutOfRange(text.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::LiteralError;

    fn bytes(src: &str) -> Vec<u8> {
        compile(src).unwrap().bytes
    }

    fn error(src: &str) -> AssemblyError {
        compile(src).unwrap_err()
    }

    #[test]
    fn add_two_numbers() {
        let src = "LXI H,3005h\nMOV A,M\nINX H\nADD M\nINX H\nMOV M,A\nHLT\n";
        assert_eq!(
            bytes(src),
            vec![0x21, 0x05, 0x30, 0x7e, 0x23, 0x86, 0x23, 0x77, 0x76]
        );
    }

    #[test]
    fn exchange_memory() {
        let src = "LDA 5000h\nMOV B,A\nLDA 6000h\nSTA 5000h\nMOV A,B\nSTA 6000h\nHLT";
        assert_eq!(
            bytes(src),
            vec![
                0x3a, 0x00, 0x50, 0x47, 0x3a, 0x00, 0x60, 0x32, 0x00, 0x50, 0x78, 0x32, 0x00,
                0x60, 0x76
            ]
        );
    }

    #[test]
    fn forward_and_backward_labels() {
        let src = "\
            jmp skip\n\
            back: nop\n\
            skip:\n\
            jmp back ; again\n\
            jnz skip\n";
        assert_eq!(
            bytes(src),
            vec![0xc3, 0x04, 0x00, 0x00, 0xc3, 0x03, 0x00, 0xc2, 0x04, 0x00]
        );
    }

    #[test]
    fn labels_resolve_against_origin() {
        let result = Assembler::with_origin(0x400)
            .compile("start: nop\njmp start")
            .unwrap();
        assert_eq!(result.origin, 0x400);
        assert_eq!(result.bytes, vec![0x00, 0xc3, 0x00, 0x04]);
    }

    #[test]
    fn numeric_jump_targets() {
        assert_eq!(bytes("jmp 0f000h"), vec![0xc3, 0x00, 0xf0]);
        assert_eq!(bytes("call 1024"), vec![0xcd, 0x00, 0x04]);
    }

    #[test]
    fn case_comments_and_spacing() {
        assert_eq!(bytes("  MVI   A ,  0FFh ; load"), vec![0x3e, 0xff]);
        assert_eq!(bytes("; only a comment\n\n   \n"), Vec::<u8>::new());
        assert_eq!(bytes("Lxi Sp, 0FFFFH"), vec![0x31, 0xff, 0xff]);
    }

    #[test]
    fn register_families() {
        assert_eq!(bytes("dcr m"), vec![0x35]);
        assert_eq!(bytes("inr a"), vec![0x3c]);
        assert_eq!(bytes("mov m, e"), vec![0x73]);
        assert_eq!(bytes("push psw"), vec![0xf5]);
        assert_eq!(bytes("pop h"), vec![0xe1]);
        assert_eq!(bytes("dad sp"), vec![0x39]);
        assert_eq!(bytes("stax d"), vec![0x12]);
        assert_eq!(bytes("rst 5"), vec![0xef]);
        assert_eq!(bytes("mvi m, -1"), vec![0x36, 0xff]);
    }

    #[test]
    fn source_map_tracks_line_offsets() {
        let result = compile("mvi b, 09\nstart:\nlxi h, 3000h\nhlt").unwrap();
        assert_eq!(result.source_map, vec![0, 2, 2, 5]);
    }

    #[test]
    fn compile_is_idempotent() {
        let src = "loop: dcr b\njnz loop\nhlt";
        assert_eq!(compile(src), compile(src));
    }

    #[test]
    fn unknown_opcode() {
        let err = error("nop\nmov a m");
        assert_eq!(err.line, 1);
        assert_eq!(err.kind, AsmErrorKind::UnknownOpcode("mov".into()));
        assert_eq!(err.span, SourceSpan::from((4, 7)));

        let err = error("mvi q, 5");
        assert_eq!(err.kind, AsmErrorKind::UnknownOpcode("mvi q".into()));
    }

    #[test]
    fn operand_count() {
        assert_eq!(
            error("hlt 5").kind,
            AsmErrorKind::OperandCountMismatch {
                expected: 0,
                actual: 1
            }
        );
        assert_eq!(
            error("mvi a,").kind,
            AsmErrorKind::OperandCountMismatch {
                expected: 1,
                actual: 0
            }
        );
        assert_eq!(
            error("add b c").kind,
            AsmErrorKind::OperandCountMismatch {
                expected: 1,
                actual: 2
            }
        );
    }

    #[test]
    fn invalid_registers() {
        assert!(matches!(
            error("mov m, m").kind,
            AsmErrorKind::InvalidRegister { found, .. } if found == "m"
        ));
        assert!(matches!(
            error("add x").kind,
            AsmErrorKind::InvalidRegister { found, .. } if found == "x"
        ));
        assert!(matches!(
            error("push sp").kind,
            AsmErrorKind::InvalidRegisterPair { found, .. } if found == "sp"
        ));
        assert!(matches!(
            error("ldax h").kind,
            AsmErrorKind::InvalidRegisterPair { allowed: "B or D", .. }
        ));
        assert!(matches!(
            error("inx psw").kind,
            AsmErrorKind::InvalidRegisterPair { .. }
        ));
    }

    #[test]
    fn literal_and_index_errors() {
        assert_eq!(
            error("mvi a, 1g").kind,
            AsmErrorKind::MalformedLiteral(LiteralError::Malformed { text: "1g".into() })
        );
        assert_eq!(error("rst 8").kind, AsmErrorKind::IndexOutOfRange("8".into()));
        assert_eq!(error("rst -1").kind, AsmErrorKind::IndexOutOfRange("-1".into()));
    }

    #[test]
    fn label_errors() {
        let err = error("nop\n: hlt");
        assert_eq!(err.line, 1);
        assert_eq!(err.kind, AsmErrorKind::EmptyLabel);

        let err = error("a: nop\nb: nop\na: hlt");
        assert_eq!(err.line, 2);
        assert_eq!(err.kind, AsmErrorKind::DuplicateLabel("a".into()));
    }

    #[test]
    fn colon_only_marks_a_leading_word() {
        assert_eq!(bytes("  start:\tnop\njmp start"), vec![0x00, 0xc3, 0x00, 0x00]);

        let err = error("my label: nop");
        assert_eq!(err.kind, AsmErrorKind::UnknownOpcode("my".into()));

        let err = error("nop\njmp x:y");
        assert_eq!(err.line, 1);
        assert_eq!(err.kind, AsmErrorKind::UndefinedLabel("x:y".into()));

        assert_eq!(
            error("mvi a, 3:").kind,
            AsmErrorKind::MalformedLiteral(LiteralError::Malformed { text: "3:".into() })
        );
    }

    #[test]
    fn undefined_label_reports_usage_line() {
        let err = error("nop\nnop\njmp nowhere\nhlt");
        assert_eq!(err.line, 2);
        assert_eq!(err.kind, AsmErrorKind::UndefinedLabel("nowhere".into()));
        assert_eq!(err.span, SourceSpan::from((8, 11)));
    }

    #[test]
    fn program_too_large() {
        let src = "lxi h, 0\n".repeat(0x10000 / 3 + 1);
        let err = error(&src);
        assert_eq!(err.kind, AsmErrorKind::ProgramTooLarge);
        assert_eq!(err.line, 0x10000 / 3);
    }
}
