// This module implements the AArch64 backend in its two flavours. The plain flavour emits
// a classic counted loop: zero the loop register from xzr (or load the start value from
// the literal pool), load the end value, then add/sub, cmp and a conditional b.<cc>. The
// SVE flavour activates all lanes of p0 with ptrue and drives the loop with a
// while-less-than predicate (whilelo for `<`, whilels for `<=`) instead of a compare; the
// resulting loop predicate is copied into further predicate registers so unrolled body
// instructions do not all depend on the same predicate register, and the back edge is
// taken while the first lane is active (b.first). Directions SVE cannot express as a
// while-predicate fall back to the plain compare-and-branch form.

//! AArch64 backend with optional SVE loop predicates.

use super::{Arch, CodeLines, Direction, IsaBackend, LoopSpec, STREAM_POINTER_SENTINEL};

const REGISTERS: &[&str] = &[
    "x0", "x1", "x2", "x3", "x4", "x5", "x6", "x7", "x8", "x9", "x10", "x11", "x12", "x13",
    "x14", "x15", "x16", "x17",
];

/// Predicate register holding the loop predicate.
const LOOP_PREDICATE: &str = "p1";

/// Copies of the loop predicate kept for unrolled bodies.
const PREDICATE_COPIES: &[&str] = &["p2", "p3", "p4"];

#[derive(Debug)]
pub struct ArmV8Backend {
    registers: &'static [&'static str],
    sve: bool,
}

impl ArmV8Backend {
    pub const fn new(sve: bool) -> Self {
        Self {
            registers: REGISTERS,
            sve,
        }
    }

    pub const fn has_sve(&self) -> bool {
        self.sve
    }

    fn while_instruction(&self, direction: Direction) -> Option<&'static str> {
        if !self.sve {
            return None;
        }
        match direction {
            Direction::Less => Some("whilelo"),
            Direction::LessEqual => Some("whilels"),
            _ => None,
        }
    }

    fn predicate_update(&self, while_op: &str, spec: &LoopSpec<'_>) -> CodeLines {
        let mut code = vec![format!(
            "{} {}.d, {}, {}",
            while_op, LOOP_PREDICATE, spec.loop_reg, spec.cond_reg
        )];
        code.extend(
            PREDICATE_COPIES
                .iter()
                .map(|p| format!("mov {}.b, {}.b", p, LOOP_PREDICATE)),
        );
        code
    }
}

impl IsaBackend for ArmV8Backend {
    fn arch(&self) -> Arch {
        if self.sve {
            Arch::ArmV8Sve
        } else {
            Arch::ArmV8
        }
    }

    fn registers(&self) -> &[&'static str] {
        self.registers
    }

    fn stack_register(&self) -> &'static str {
        "sp"
    }

    fn base_register(&self) -> &'static str {
        "x29"
    }

    fn link_register(&self) -> Option<&'static str> {
        Some("x30")
    }

    fn comment_prefix(&self) -> &'static str {
        "//"
    }

    fn compiler_flags(&self) -> &[&'static str] {
        if self.sve {
            &["-march=armv8-a+sve"]
        } else {
            &[]
        }
    }

    fn header(&self, function: &str) -> CodeLines {
        vec![
            ".text".to_string(),
            ".align 4".to_string(),
            format!(".global {function}"),
            format!(".type {function}, %function"),
            format!("{function}:"),
            "stp x29, x30, [sp, -16]!".to_string(),
            "mov x29, sp".to_string(),
            STREAM_POINTER_SENTINEL.to_string(),
        ]
    }

    fn footer(&self, function: &str) -> CodeLines {
        vec![
            "ldp x29, x30, [sp], 16".to_string(),
            "ret".to_string(),
            format!(".size {function}, .-{function}"),
            ".section .note.GNU-stack,\"\",%progbits".to_string(),
        ]
    }

    fn loop_header(&self, spec: &LoopSpec<'_>) -> CodeLines {
        let mut code = vec![
            if spec.starts_at_zero() {
                format!("mov {}, xzr", spec.loop_reg)
            } else {
                format!("ldr {}, ={}", spec.loop_reg, spec.start)
            },
            format!("ldr {}, ={}", spec.cond_reg, spec.end),
        ];
        if let Some(while_op) = self.while_instruction(spec.direction) {
            code.push("ptrue p0.d".to_string());
            code.extend(self.predicate_update(while_op, spec));
        }
        code.push(".align 4".to_string());
        code.push(format!("{}:", spec.label));
        code
    }

    fn loop_footer(&self, spec: &LoopSpec<'_>) -> CodeLines {
        let op = if spec.direction.counts_down() { "sub" } else { "add" };
        let mut code = vec![format!(
            "{0} {1}, {1}, #{2}",
            op, spec.loop_reg, spec.step
        )];
        match self.while_instruction(spec.direction) {
            Some(while_op) => {
                code.extend(self.predicate_update(while_op, spec));
                code.push(format!("b.first {}", spec.label));
            }
            None => {
                code.push(format!("cmp {}, {}", spec.loop_reg, spec.cond_reg));
                code.push(format!("b.{} {}", spec.direction.arm_condition(), spec.label));
            }
        }
        code
    }

    fn stream_header(&self, register: &str, pointer: usize) -> CodeLines {
        vec![format!("ldr {}, =0x{:x}", register, pointer)]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec(direction: Direction) -> LoopSpec<'static> {
        LoopSpec {
            label: "l",
            loop_reg: "x0",
            start: "0",
            cond_reg: "x1",
            end: "N",
            direction,
            step: "2",
        }
    }

    #[test]
    fn plain_loop_compares() {
        let b = ArmV8Backend::new(false);
        assert_eq!(
            b.loop_header(&spec(Direction::Less)),
            vec!["mov x0, xzr", "ldr x1, =N", ".align 4", "l:"]
        );
        assert_eq!(
            b.loop_footer(&spec(Direction::Less)),
            vec!["add x0, x0, #2", "cmp x0, x1", "b.lt l"]
        );
    }

    #[test]
    fn sve_loop_uses_while_predicate() {
        let b = ArmV8Backend::new(true);
        let header = b.loop_header(&spec(Direction::Less));
        assert_eq!(
            header,
            vec![
                "mov x0, xzr",
                "ldr x1, =N",
                "ptrue p0.d",
                "whilelo p1.d, x0, x1",
                "mov p2.b, p1.b",
                "mov p3.b, p1.b",
                "mov p4.b, p1.b",
                ".align 4",
                "l:",
            ]
        );
        let footer = b.loop_footer(&spec(Direction::LessEqual));
        assert_eq!(footer[1], "whilels p1.d, x0, x1");
        assert_eq!(footer.last().unwrap(), "b.first l");
        assert!(!footer.iter().any(|l| l.starts_with("cmp")));
    }

    #[test]
    fn sve_falls_back_for_other_directions() {
        let b = ArmV8Backend::new(true);
        let footer = b.loop_footer(&spec(Direction::Greater));
        assert_eq!(footer, vec!["sub x0, x0, #2", "cmp x0, x1", "b.gt l"]);
        assert!(!b
            .loop_header(&spec(Direction::Greater))
            .iter()
            .any(|l| l.contains("ptrue")));
    }

    #[test]
    fn sve_requests_march_flag() {
        assert_eq!(ArmV8Backend::new(true).compiler_flags(), &["-march=armv8-a+sve"]);
        assert!(ArmV8Backend::new(false).compiler_flags().is_empty());
    }
}
