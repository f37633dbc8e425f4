//! 32-bit ARM (ARMv7-A, AAPCS) backend.

use super::{Arch, CodeLines, IsaBackend, LoopSpec, STREAM_POINTER_SENTINEL};

const REGISTERS: &[&str] = &[
    "r0", "r1", "r2", "r3", "r4", "r5", "r6", "r7", "r8", "r9", "r10", "r12",
];

#[derive(Debug)]
pub struct ArmV7Backend {
    registers: &'static [&'static str],
}

impl ArmV7Backend {
    pub const fn new() -> Self {
        Self {
            registers: REGISTERS,
        }
    }
}

impl Default for ArmV7Backend {
    fn default() -> Self {
        Self::new()
    }
}

impl IsaBackend for ArmV7Backend {
    fn arch(&self) -> Arch {
        Arch::ArmV7
    }

    fn registers(&self) -> &[&'static str] {
        self.registers
    }

    fn stack_register(&self) -> &'static str {
        "sp"
    }

    fn base_register(&self) -> &'static str {
        "r11"
    }

    fn link_register(&self) -> Option<&'static str> {
        Some("lr")
    }

    fn comment_prefix(&self) -> &'static str {
        "@"
    }

    fn header(&self, function: &str) -> CodeLines {
        vec![
            ".text".to_string(),
            ".arm".to_string(),
            ".align 2".to_string(),
            format!(".global {function}"),
            format!(".type {function}, %function"),
            format!("{function}:"),
            // r4-r11 are callee-saved; lr is popped straight into pc.
            "push {r4-r11, lr}".to_string(),
            STREAM_POINTER_SENTINEL.to_string(),
        ]
    }

    fn footer(&self, function: &str) -> CodeLines {
        vec![
            "pop {r4-r11, pc}".to_string(),
            format!(".size {function}, .-{function}"),
            ".section .note.GNU-stack,\"\",%progbits".to_string(),
        ]
    }

    fn loop_header(&self, spec: &LoopSpec<'_>) -> CodeLines {
        let init = if spec.starts_at_zero() {
            format!("eor {0}, {0}, {0}", spec.loop_reg)
        } else {
            format!("ldr {}, ={}", spec.loop_reg, spec.start)
        };
        vec![
            init,
            format!("ldr {}, ={}", spec.cond_reg, spec.end),
            ".align 2".to_string(),
            format!("{}:", spec.label),
        ]
    }

    fn loop_footer(&self, spec: &LoopSpec<'_>) -> CodeLines {
        let op = if spec.direction.counts_down() { "sub" } else { "add" };
        vec![
            format!("{0} {1}, {1}, #{2}", op, spec.loop_reg, spec.step),
            format!("cmp {}, {}", spec.loop_reg, spec.cond_reg),
            format!("b{} {}", spec.direction.arm_condition(), spec.label),
        ]
    }

    fn stream_header(&self, register: &str, pointer: usize) -> CodeLines {
        vec![format!("ldr {}, =0x{:x}", register, pointer)]
    }
}
