//! x86 and x86-64 backends.
//!
//! Both emit GAS Intel syntax (`.intel_syntax noprefix`) and share the loop
//! scaffolding: zeroing via `xor`, `add`/`sub` by the step, `cmp` and a
//! signed conditional jump. They differ in register width, the callee-saved
//! set pushed by the prologue, and the pointer load (`movabs` on x86-64).

use super::{Arch, CodeLines, IsaBackend, LoopSpec, STREAM_POINTER_SENTINEL};

const X86_REGISTERS: &[&str] = &["eax", "ebx", "ecx", "edx", "esi", "edi"];

const X86_64_REGISTERS: &[&str] = &[
    "rax", "rbx", "rcx", "rdx", "rsi", "rdi", "r8", "r9", "r10", "r11", "r12", "r13", "r14",
    "r15",
];

const X86_SAVED: &[&str] = &["ebx", "esi", "edi"];

const X86_64_SAVED: &[&str] = &["rbx", "r12", "r13", "r14", "r15"];

fn intel_header(function: &str, stack: &str, base: &str, saved: &[&str]) -> CodeLines {
    let mut code = vec![
        ".intel_syntax noprefix".to_string(),
        ".text".to_string(),
        format!(".globl {function}"),
        format!(".type {function}, @function"),
        ".align 16".to_string(),
        format!("{function}:"),
        format!("push {base}"),
        format!("mov {base}, {stack}"),
    ];
    code.extend(saved.iter().map(|reg| format!("push {reg}")));
    code.push(STREAM_POINTER_SENTINEL.to_string());
    code
}

fn intel_footer(function: &str, stack: &str, base: &str, saved: &[&str]) -> CodeLines {
    let mut code: CodeLines = saved.iter().rev().map(|reg| format!("pop {reg}")).collect();
    code.push(format!("mov {stack}, {base}"));
    code.push(format!("pop {base}"));
    code.push("ret".to_string());
    code.push(format!(".size {function}, .-{function}"));
    code.push(".section .note.GNU-stack,\"\",@progbits".to_string());
    code
}

fn intel_loop_header(spec: &LoopSpec<'_>) -> CodeLines {
    let init = if spec.starts_at_zero() {
        format!("xor {0}, {0}", spec.loop_reg)
    } else {
        format!("mov {}, {}", spec.loop_reg, spec.start)
    };
    vec![
        init,
        format!("mov {}, {}", spec.cond_reg, spec.end),
        ".align 16".to_string(),
        format!("{}:", spec.label),
    ]
}

fn intel_loop_footer(spec: &LoopSpec<'_>) -> CodeLines {
    let step = if spec.direction.counts_down() { "sub" } else { "add" };
    vec![
        format!("{} {}, {}", step, spec.loop_reg, spec.step),
        format!("cmp {}, {}", spec.loop_reg, spec.cond_reg),
        format!("{} {}", spec.direction.x86_jump(), spec.label),
    ]
}

/// 32-bit x86 (System V i386).
#[derive(Debug)]
pub struct X86Backend {
    registers: &'static [&'static str],
}

impl X86Backend {
    pub const fn new() -> Self {
        Self {
            registers: X86_REGISTERS,
        }
    }
}

impl Default for X86Backend {
    fn default() -> Self {
        Self::new()
    }
}

impl IsaBackend for X86Backend {
    fn arch(&self) -> Arch {
        Arch::X86
    }

    fn registers(&self) -> &[&'static str] {
        self.registers
    }

    fn stack_register(&self) -> &'static str {
        "esp"
    }

    fn base_register(&self) -> &'static str {
        "ebp"
    }

    fn link_register(&self) -> Option<&'static str> {
        None
    }

    fn comment_prefix(&self) -> &'static str {
        "#"
    }

    fn compiler_flags(&self) -> &[&'static str] {
        &["-m32"]
    }

    fn header(&self, function: &str) -> CodeLines {
        intel_header(function, "esp", "ebp", X86_SAVED)
    }

    fn footer(&self, function: &str) -> CodeLines {
        intel_footer(function, "esp", "ebp", X86_SAVED)
    }

    fn loop_header(&self, spec: &LoopSpec<'_>) -> CodeLines {
        intel_loop_header(spec)
    }

    fn loop_footer(&self, spec: &LoopSpec<'_>) -> CodeLines {
        intel_loop_footer(spec)
    }

    fn stream_header(&self, register: &str, pointer: usize) -> CodeLines {
        vec![format!("mov {}, 0x{:x}", register, pointer)]
    }
}

/// x86-64 (System V AMD64).
#[derive(Debug)]
pub struct X86_64Backend {
    registers: &'static [&'static str],
}

impl X86_64Backend {
    pub const fn new() -> Self {
        Self {
            registers: X86_64_REGISTERS,
        }
    }
}

impl Default for X86_64Backend {
    fn default() -> Self {
        Self::new()
    }
}

impl IsaBackend for X86_64Backend {
    fn arch(&self) -> Arch {
        Arch::X86_64
    }

    fn registers(&self) -> &[&'static str] {
        self.registers
    }

    fn stack_register(&self) -> &'static str {
        "rsp"
    }

    fn base_register(&self) -> &'static str {
        "rbp"
    }

    fn link_register(&self) -> Option<&'static str> {
        None
    }

    fn comment_prefix(&self) -> &'static str {
        "#"
    }

    fn header(&self, function: &str) -> CodeLines {
        intel_header(function, "rsp", "rbp", X86_64_SAVED)
    }

    fn footer(&self, function: &str) -> CodeLines {
        intel_footer(function, "rsp", "rbp", X86_64_SAVED)
    }

    fn loop_header(&self, spec: &LoopSpec<'_>) -> CodeLines {
        intel_loop_header(spec)
    }

    fn loop_footer(&self, spec: &LoopSpec<'_>) -> CodeLines {
        intel_loop_footer(spec)
    }

    fn stream_header(&self, register: &str, pointer: usize) -> CodeLines {
        vec![format!("movabs {}, 0x{:x}", register, pointer)]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::isa::Direction;

    fn spec<'a>(start: &'a str, direction: Direction) -> LoopSpec<'a> {
        LoopSpec {
            label: "l",
            loop_reg: "rax",
            start,
            cond_reg: "rdi",
            end: "N",
            direction,
            step: "1",
        }
    }

    #[test]
    fn zero_start_uses_xor() {
        let code = X86_64Backend::new().loop_header(&spec("0", Direction::Less));
        assert_eq!(code, vec!["xor rax, rax", "mov rdi, N", ".align 16", "l:"]);
    }

    #[test]
    fn non_zero_start_uses_mov() {
        let code = X86_64Backend::new().loop_header(&spec("8", Direction::Less));
        assert_eq!(code[0], "mov rax, 8");
    }

    #[test]
    fn footer_branches_on_direction() {
        let b = X86_64Backend::new();
        assert_eq!(
            b.loop_footer(&spec("0", Direction::Less)),
            vec!["add rax, 1", "cmp rax, rdi", "jl l"]
        );
        assert_eq!(
            b.loop_footer(&spec("N", Direction::GreaterEqual)),
            vec!["sub rax, 1", "cmp rax, rdi", "jge l"]
        );
        assert_eq!(b.loop_footer(&spec("0", Direction::NotEqual))[2], "jne l");
    }

    #[test]
    fn prologue_and_epilogue_are_symmetric() {
        let b = X86Backend::new();
        let header = b.header("k");
        let footer = b.footer("k");
        let pushes: Vec<_> = header
            .iter()
            .filter_map(|l| l.strip_prefix("push "))
            .collect();
        let mut pops: Vec<_> = footer
            .iter()
            .filter_map(|l| l.strip_prefix("pop "))
            .collect();
        pops.reverse();
        assert_eq!(pushes, pops);
        assert_eq!(pushes, vec!["ebp", "ebx", "esi", "edi"]);
    }

    #[test]
    fn pointer_loads() {
        assert_eq!(
            X86_64Backend::new().stream_header("rsi", 0x7f00_1000),
            vec!["movabs rsi, 0x7f001000"]
        );
        assert_eq!(
            X86Backend::new().stream_header("esi", 0x1000),
            vec!["mov esi, 0x1000"]
        );
    }
}
