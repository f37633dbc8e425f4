//! POWER (ppc64, ELFv2) backend.
//!
//! Loops run on the hardware count register: the loop header computes the
//! iteration count into `r0` (`ceil((end - start) / step)`, plus one for `<=`
//! and `>=`), skips the loop when it is not positive, and moves it to CTR. The
//! footer only advances the loop register before `bdnz`. `==` and `!=` have no
//! count form and are rejected. Register names are symbolic (`r3`), which the
//! assembler accepts with `-mregnames`.

use super::{
    parse_literal, Arch, CodeLines, Direction, IsaBackend, LoopSpec, STREAM_POINTER_SENTINEL,
};

const REGISTERS: &[&str] = &[
    "r3", "r4", "r5", "r6", "r7", "r8", "r9", "r10", "r11", "r12",
];

/// Scratch register for the iteration count; never handed out.
const SCRATCH: &str = "r0";

#[derive(Debug)]
pub struct Ppc64Backend {
    registers: &'static [&'static str],
}

impl Ppc64Backend {
    pub const fn new() -> Self {
        Self {
            registers: REGISTERS,
        }
    }
}

impl Default for Ppc64Backend {
    fn default() -> Self {
        Self::new()
    }
}

/// Load an integer literal or symbolic token into `reg`.
///
/// Small literals take a single `li`; anything else is built from its four
/// 16-bit halves so tokens substituted later still assemble.
fn load_value(reg: &str, value: &str) -> CodeLines {
    match parse_literal(value) {
        Some(v) if (i16::MIN as i64..=i16::MAX as i64).contains(&v) => {
            vec![format!("li {reg}, {v}")]
        }
        _ => vec![
            format!("lis {reg}, {value}@highest"),
            format!("ori {reg}, {reg}, {value}@higher"),
            format!("rldicr {reg}, {reg}, 32, 31"),
            format!("oris {reg}, {reg}, {value}@h"),
            format!("ori {reg}, {reg}, {value}@l"),
        ],
    }
}

fn exit_label(label: &str) -> String {
    format!("{label}_exit")
}

impl IsaBackend for Ppc64Backend {
    fn arch(&self) -> Arch {
        Arch::Ppc64
    }

    fn registers(&self) -> &[&'static str] {
        self.registers
    }

    fn stack_register(&self) -> &'static str {
        "r1"
    }

    fn base_register(&self) -> &'static str {
        "r31"
    }

    fn link_register(&self) -> Option<&'static str> {
        Some("lr")
    }

    fn comment_prefix(&self) -> &'static str {
        "#"
    }

    fn compiler_flags(&self) -> &[&'static str] {
        &["-Wa,-mregnames"]
    }

    fn header(&self, function: &str) -> CodeLines {
        vec![
            ".abiversion 2".to_string(),
            ".text".to_string(),
            ".align 4".to_string(),
            format!(".globl {function}"),
            format!(".type {function}, @function"),
            format!("{function}:"),
            "std r31, -8(r1)".to_string(),
            "mr r31, r1".to_string(),
            STREAM_POINTER_SENTINEL.to_string(),
        ]
    }

    fn footer(&self, function: &str) -> CodeLines {
        vec![
            "ld r31, -8(r1)".to_string(),
            "blr".to_string(),
            format!(".size {function}, .-{function}"),
            ".section .note.GNU-stack,\"\",@progbits".to_string(),
        ]
    }

    fn supports_direction(&self, direction: Direction) -> bool {
        !matches!(direction, Direction::Equal | Direction::NotEqual)
    }

    fn loop_header(&self, spec: &LoopSpec<'_>) -> CodeLines {
        let mut code = load_value(spec.loop_reg, spec.start);
        code.extend(load_value(spec.cond_reg, spec.end));

        // r0 = distance to the bound in the loop's direction
        if spec.direction.counts_down() {
            code.push(format!("subf {}, {}, {}", SCRATCH, spec.cond_reg, spec.loop_reg));
        } else if spec.starts_at_zero() {
            code.push(format!("mr {}, {}", SCRATCH, spec.cond_reg));
        } else {
            code.push(format!("subf {}, {}, {}", SCRATCH, spec.loop_reg, spec.cond_reg));
        }

        // r0 = ceil(distance / step), one more for inclusive bounds. `addi` would
        // read r0 as zero, so the bias goes through `addic`.
        let inclusive = spec.direction.is_inclusive();
        match parse_literal(spec.step).filter(|s| (1..=i16::MAX as i64).contains(s)) {
            Some(step) => {
                let bias = if inclusive { step } else { step - 1 };
                if bias != 0 {
                    code.push(format!("addic {0}, {0}, {1}", SCRATCH, bias));
                }
                match step {
                    1 => {}
                    s if (s as u64).is_power_of_two() => {
                        code.push(format!(
                            "sradi {0}, {0}, {1}",
                            SCRATCH,
                            (s as u64).trailing_zeros()
                        ));
                    }
                    _ => {
                        code.extend(load_value(spec.cond_reg, spec.step));
                        code.push(format!("divd {0}, {0}, {1}", SCRATCH, spec.cond_reg));
                        code.extend(load_value(spec.cond_reg, spec.end));
                    }
                }
            }
            None => {
                // The end register is borrowed for the divisor and reloaded.
                code.extend(load_value(spec.cond_reg, spec.step));
                code.push(format!("add {0}, {0}, {1}", SCRATCH, spec.cond_reg));
                if !inclusive {
                    code.push(format!("addic {0}, {0}, -1", SCRATCH));
                }
                code.push(format!("divd {0}, {0}, {1}", SCRATCH, spec.cond_reg));
                code.extend(load_value(spec.cond_reg, spec.end));
            }
        }

        // CTR must not start at zero; bdnz would wrap it.
        code.push(format!("cmpdi {}, 0", SCRATCH));
        code.push(format!("ble {}", exit_label(spec.label)));
        code.push(format!("mtctr {}", SCRATCH));
        code.push(".align 4".to_string());
        code.push(format!("{}:", spec.label));
        code
    }

    fn loop_footer(&self, spec: &LoopSpec<'_>) -> CodeLines {
        let step = if spec.direction.counts_down() {
            format!("-{}", spec.step)
        } else {
            spec.step.to_string()
        };
        vec![
            format!("addi {0}, {0}, {1}", spec.loop_reg, step),
            format!("bdnz {}", spec.label),
            format!("{}:", exit_label(spec.label)),
        ]
    }

    fn stream_header(&self, register: &str, pointer: usize) -> CodeLines {
        load_value(register, &format!("0x{:x}", pointer))
    }
}
