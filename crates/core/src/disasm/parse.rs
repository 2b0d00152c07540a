//! Parser for objdump-style disassembly text.
//!
//! The grammar, matched line by line:
//!
//! ```text
//! Disassembly of section .text:        section header
//! 00001000 <main>:                     symbol header
//!     1000:\t13 05 a0 02\taddi a0,zero,42   instruction
//! /home/dev/main.c:12                  source-line marker
//!   return 42;                         source text for the marker
//! ```
//!
//! Malformed lines are skipped, never fatal: one bad line must not abort
//! the whole parse. The only fatal condition is a dump with no
//! instructions at all, which yields [`DisasmError::EmptyDump`] so callers
//! keep their previously loaded image.

use crate::disasm::{DisasmError, DisasmResult};
use crate::model::{BinaryImage, CodeLine, Instruction, Section, SectionFlags, SourceRef, Symbol};

/// Parse one complete dump into a [`BinaryImage`].
///
/// Sections, symbols, and instructions keep the order they appeared in the
/// output; nothing is re-sorted here (the instruction index is the
/// address-keyed view).
pub fn parse_dump(text: &str) -> DisasmResult<BinaryImage> {
    let mut image = BinaryImage::default();
    // Source marker waiting for its text line and/or first instruction.
    let mut pending_source: Option<SourceRef> = None;
    // True while instructions should keep appending to the open CodeLine.
    let mut line_open = false;

    for raw in text.lines() {
        let line = raw.trim_end();
        if line.is_empty() {
            continue;
        }

        if let Some(name) = parse_section_header(line) {
            // objdump only disassembles executable sections, so every
            // parsed section carries the exec flag.
            image.sections.push(Section {
                name: name.to_string(),
                flags: SectionFlags::executable(),
                symbols: Vec::new(),
            });
            pending_source = None;
            line_open = false;
            continue;
        }

        if let Some((address, name)) = parse_symbol_header(line) {
            let section = match image.sections.last_mut() {
                Some(section) => section,
                // Symbol before any section header: tolerate it with an
                // anonymous executable section rather than dropping code.
                None => {
                    image.sections.push(Section {
                        name: String::new(),
                        flags: SectionFlags::executable(),
                        symbols: Vec::new(),
                    });
                    image.sections.last_mut().unwrap()
                }
            };
            section.symbols.push(Symbol { name, address, lines: Vec::new() });
            pending_source = None;
            line_open = false;
            continue;
        }

        if let Some(instr) = parse_instruction_line(line) {
            let section = match image.sections.last_mut() {
                Some(section) => section,
                None => {
                    image.sections.push(Section {
                        name: String::new(),
                        flags: SectionFlags::executable(),
                        symbols: Vec::new(),
                    });
                    image.sections.last_mut().unwrap()
                }
            };
            if section.symbols.is_empty() {
                // Anonymous code block: instructions with no symbol header.
                section.symbols.push(Symbol { name: None, address: instr.address, lines: Vec::new() });
            }
            let symbol = section.symbols.last_mut().unwrap();

            if line_open {
                symbol.lines.last_mut().unwrap().instructions.push(instr);
            } else {
                let source = pending_source.take();
                // Instructions keep joining this line until the next
                // marker; unannotated instructions get one line each.
                line_open = source.is_some();
                symbol.lines.push(CodeLine { source, instructions: vec![instr] });
            }
            continue;
        }

        if let Some(marker) = parse_source_marker(line) {
            pending_source = Some(marker);
            line_open = false;
            continue;
        }

        // Raw source text directly after a marker fills the marker's text.
        if let Some(source) = pending_source.as_mut() {
            if source.text.is_empty() {
                source.text = line.trim_start().to_string();
                continue;
            }
        }

        // Anything else (file-format banner, ellipsis continuations,
        // genuinely malformed lines) is skipped.
    }

    if image.instruction_count() == 0 {
        return Err(DisasmError::EmptyDump);
    }
    Ok(image)
}

/// `Disassembly of section <name>:`
fn parse_section_header(line: &str) -> Option<&str> {
    let rest = line.strip_prefix("Disassembly of section ")?;
    let name = rest.strip_suffix(':')?.trim();
    if name.is_empty() {
        None
    } else {
        Some(name)
    }
}

/// `<hexaddr> <<name>>:` — an empty `<>` yields an anonymous symbol.
fn parse_symbol_header(line: &str) -> Option<(u64, Option<String>)> {
    let line = line.trim();
    let (addr_text, rest) = line.split_once(' ')?;
    let address = u64::from_str_radix(addr_text, 16).ok()?;
    let name = rest.trim().strip_prefix('<')?.strip_suffix(">:")?;
    let name = if name.trim().is_empty() { None } else { Some(name.trim().to_string()) };
    Some((address, name))
}

/// `<hexaddr>:\t<hex bytes>\t<mnemonic ...>`
///
/// The bytes field must be hex digits and spaces only; a line with no
/// mnemonic text (e.g. a long-encoding continuation) is not an
/// instruction.
fn parse_instruction_line(line: &str) -> Option<Instruction> {
    let (addr_text, rest) = line.split_once(':')?;
    let address = u64::from_str_radix(addr_text.trim(), 16).ok()?;

    let mut fields = rest.split('\t').map(str::trim).filter(|field| !field.is_empty());
    let encoding = fields.next()?;
    if encoding.is_empty()
        || !encoding.chars().all(|c| c.is_ascii_hexdigit() || c == ' ')
    {
        return None;
    }

    let mnemonic = fields.collect::<Vec<_>>().join(" ");
    if mnemonic.is_empty() {
        return None;
    }

    Some(Instruction {
        address,
        encoding: encoding.to_string(),
        mnemonic,
    })
}

/// `<file>:<line>` source marker, e.g. `/home/dev/main.c:12`.
///
/// The file part must not itself be a hex address so plain instruction
/// lines never masquerade as markers (instruction parsing runs first
/// regardless).
fn parse_source_marker(line: &str) -> Option<SourceRef> {
    let line = line.trim();
    let (file, line_no) = line.rsplit_once(':')?;
    let line_no: u32 = line_no.parse().ok()?;
    if file.is_empty() || u64::from_str_radix(file.trim(), 16).is_ok() {
        return None;
    }
    Some(SourceRef { text: String::new(), line: line_no, file: file.to_string() })
}

#[cfg(test)]
mod tests {
    use super::*;

    const SIMPLE_DUMP: &str = "\
prog.elf:     file format elf32-littleriscv\n\
\n\
Disassembly of section .text:\n\
\n\
00001000 <main>:\n\
    1000:\t93 08 00 00\tli\ts1,0\n\
    1004:\t13 05 a0 02\taddi\ta0,zero,42\n";

    #[test]
    fn parses_section_symbol_and_instructions() {
        let image = parse_dump(SIMPLE_DUMP).expect("parse");
        assert_eq!(image.sections.len(), 1);
        let section = &image.sections[0];
        assert_eq!(section.name, ".text");
        assert!(section.flags.is_executable());
        assert_eq!(section.symbols.len(), 1);
        let symbol = &section.symbols[0];
        assert_eq!(symbol.name.as_deref(), Some("main"));
        assert_eq!(symbol.address, 0x1000);
        let instrs: Vec<_> = symbol.instructions().collect();
        assert_eq!(instrs.len(), 2);
        assert_eq!(instrs[0].address, 0x1000);
        assert_eq!(instrs[0].encoding, "93 08 00 00");
        assert_eq!(instrs[1].mnemonic, "addi a0,zero,42");
    }

    #[test]
    fn source_marker_groups_following_instructions_into_one_code_line() {
        let dump = "\
Disassembly of section .text:\n\
00001000 <main>:\n\
/home/dev/main.c:3\n\
  return 42;\n\
    1000:\t13 05 a0 02\taddi\ta0,zero,42\n\
    1004:\t67 80 00 00\tret\n\
/home/dev/main.c:4\n\
    1008:\t13 00 00 00\tnop\n";
        let image = parse_dump(dump).expect("parse");
        let symbol = &image.sections[0].symbols[0];
        assert_eq!(symbol.lines.len(), 2);
        let first = &symbol.lines[0];
        let source = first.source.as_ref().expect("source ref");
        assert_eq!(source.file, "/home/dev/main.c");
        assert_eq!(source.line, 3);
        assert_eq!(source.text, "return 42;");
        assert_eq!(first.instructions.len(), 2);
        assert_eq!(symbol.lines[1].instructions.len(), 1);
    }

    #[test]
    fn malformed_lines_are_skipped_without_aborting() {
        let dump = "\
Disassembly of section .text:\n\
00001000 <main>:\n\
    1000:\t93 08 00 00\tli\ts1,0\n\
    garbage line that matches nothing\n\
    zz04:\tnot hex\tbad\n\
    1004:\t13 05 a0 02\taddi\ta0,zero,42\n";
        let image = parse_dump(dump).expect("parse");
        assert_eq!(image.instruction_count(), 2);
    }

    #[test]
    fn instructions_without_symbol_header_form_anonymous_block() {
        let dump = "\
Disassembly of section .init:\n\
    0200:\t73 00 10 00\tebreak\n";
        let image = parse_dump(dump).expect("parse");
        let symbol = &image.sections[0].symbols[0];
        assert_eq!(symbol.name, None);
        assert_eq!(symbol.address, 0x200);
    }

    #[test]
    fn dump_with_no_instructions_is_an_empty_dump_error() {
        let err = parse_dump("objdump: prog.elf: file format not recognized\n").unwrap_err();
        assert!(matches!(err, DisasmError::EmptyDump));
        assert!(matches!(parse_dump("").unwrap_err(), DisasmError::EmptyDump));
    }

    #[test]
    fn order_of_sections_and_symbols_is_preserved() {
        let dump = "\
Disassembly of section .init:\n\
00000100 <_start>:\n\
    0100:\t6f 00 00 01\tjal\tzero,1000\n\
Disassembly of section .text:\n\
00001000 <main>:\n\
    1000:\t13 00 00 00\tnop\n";
        let image = parse_dump(dump).expect("parse");
        assert_eq!(image.sections[0].name, ".init");
        assert_eq!(image.sections[1].name, ".text");
        assert_eq!(image.entry_pc(), Some(0x100));
    }
}
