// This module is the top-level driver of kernelgen. KernelGenerator takes a template and a
// configuration, expands the template body once with the block parser and the configured
// ISA backend, and keeps the result as a thread-independent skeleton of header, body and
// footer. For each worker thread it then builds that thread's replacement table and applies
// it to the body and to the stream-pointer sentinel in the header. Assembler comments,
// including the traced keyword markers, are copied unchanged, and so are the other header
// lines and the footer, which carry the concrete name. The sentinel is dropped when the
// template declares no streams, and the lines go to the toolchain driver to be written,
// compiled and loaded. Threads are built one after another on the calling thread before any
// worker starts, and each thread's failure is returned on its own so the caller decides
// whether to abort.

//! Skeleton construction and per-thread specialization.

use std::fs;

use crate::core::config::GeneratorConfig;
use crate::core::error::{KernelError, KernelResult, ToolchainError};
use crate::core::template::Template;
use crate::isa::{CodeLines, IsaBackend, STREAM_POINTER_SENTINEL};
use crate::parser;
use crate::replacement::ReplacementTable;
use crate::stream::ThreadBinding;
use crate::toolchain::{RuntimeTestArtifact, Toolchain};

/// Thread-independent routine: scaffolding plus the expanded body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KernelSkeleton {
    pub header: CodeLines,
    pub body: CodeLines,
    pub footer: CodeLines,
}

impl KernelSkeleton {
    fn lines_hint(&self) -> usize {
        self.header.len() + self.body.len() + self.footer.len()
    }

    pub fn lines(&self) -> CodeLines {
        let mut out = Vec::with_capacity(self.lines_hint());
        out.extend_from_slice(&self.header);
        out.extend_from_slice(&self.body);
        out.extend_from_slice(&self.footer);
        out
    }
}

/// Generates per-thread routines for one template.
#[derive(Debug)]
pub struct KernelGenerator<'t> {
    template: &'t Template,
    config: GeneratorConfig,
    backend: &'static dyn IsaBackend,
    skeleton: KernelSkeleton,
}

impl<'t> KernelGenerator<'t> {
    /// Expand the template body for the configured architecture.
    pub fn new(template: &'t Template, config: GeneratorConfig) -> KernelResult<Self> {
        let backend = config.arch.backend();
        log::debug!(
            "expanding `{}` ({} body lines) for {}",
            template.name,
            template.body.len(),
            config.arch
        );
        let body = parser::expand_body(template, backend)
            .map_err(|e| KernelError::grammar(&template.name, e))?;
        let skeleton = KernelSkeleton {
            header: backend.header(&template.name),
            body,
            footer: backend.footer(&template.name),
        };
        Ok(Self {
            template,
            config,
            backend,
            skeleton,
        })
    }

    pub fn template(&self) -> &Template {
        self.template
    }

    pub fn config(&self) -> &GeneratorConfig {
        &self.config
    }

    pub fn backend(&self) -> &'static dyn IsaBackend {
        self.backend
    }

    pub fn skeleton(&self) -> &KernelSkeleton {
        &self.skeleton
    }

    /// The concrete routine for one thread.
    pub fn specialize(&self, binding: &ThreadBinding) -> KernelResult<CodeLines> {
        let table = ReplacementTable::for_thread(
            self.template,
            self.backend,
            &self.skeleton.body,
            binding,
        )?;

        // Only the sentinel in the header is substituted; its other lines carry the
        // concrete name, which must match the footer and the loaded symbol.
        let mut lines = CodeLines::with_capacity(self.skeleton.lines_hint());
        for line in &self.skeleton.header {
            if line.trim() != STREAM_POINTER_SENTINEL {
                lines.push(line.clone());
            } else if !self.template.streams.is_empty() {
                lines.extend(table.apply(std::slice::from_ref(line)));
            }
        }
        let prefix = Some(self.backend.comment_prefix());
        lines.extend(table.apply_code(&self.skeleton.body, prefix));
        lines.extend_from_slice(&self.skeleton.footer);
        for line in &lines {
            log::trace!("[{}:{}] {}", self.template.name, binding.thread_id, line);
        }
        Ok(lines)
    }

    /// Specialize, write, compile and load one thread's routine.
    pub fn build_thread(&self, binding: &ThreadBinding) -> KernelResult<RuntimeTestArtifact> {
        let lines = self.specialize(binding)?;
        let toolchain = Toolchain::discover(&self.config)?;
        fs::create_dir_all(&self.config.temp_dir).map_err(|source| ToolchainError::Io {
            path: self.config.temp_dir.clone(),
            source,
        })?;
        let artifact = toolchain.build(
            self.backend,
            &lines,
            &self.template.name,
            binding.thread_id,
            &self.config.temp_dir,
        )?;
        Ok(artifact)
    }

    /// Build every thread in order; one result per binding.
    pub fn build_threads(
        &self,
        bindings: &[ThreadBinding],
    ) -> Vec<KernelResult<RuntimeTestArtifact>> {
        bindings
            .iter()
            .map(|binding| {
                let result = self.build_thread(binding);
                if let Err(err) = &result {
                    log::error!(
                        "thread {}: building `{}` failed: {}",
                        binding.thread_id,
                        self.template.name,
                        err
                    );
                }
                result
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::error::ConfigError;
    use crate::core::template::{DataType, StreamDecl};
    use crate::isa::Arch;
    use crate::stream::StreamBinding;

    fn copy_template() -> Template {
        Template::builder("copy")
            .body("LOOP(l, rax=0, <, rdi=N, 1)\nmov rdx, [STR0 + 8*rax]\nmov [STR1 + 8*rax], rdx\nLOOPEND(l)")
            .stream(StreamDecl::new("STR0", DataType::Double, &["N"]))
            .stream(StreamDecl::new("STR1", DataType::Double, &["N"]))
            .build()
    }

    #[test]
    fn skeleton_keeps_tokens() {
        let t = copy_template();
        let gen = KernelGenerator::new(&t, GeneratorConfig::new(Arch::X86_64)).unwrap();
        let lines = gen.skeleton().lines();
        assert!(lines.iter().any(|l| l == STREAM_POINTER_SENTINEL));
        assert!(lines.iter().any(|l| l == "mov rdi, N"));
        assert_eq!(lines.last().unwrap(), ".section .note.GNU-stack,\"\",@progbits");
    }

    #[test]
    fn specialization_binds_streams() {
        let t = copy_template();
        let gen = KernelGenerator::new(&t, GeneratorConfig::new(Arch::X86_64)).unwrap();
        let binding = ThreadBinding::new(
            0,
            vec![
                StreamBinding::new(0x10000, &[512]),
                StreamBinding::new(0x20000, &[512]),
            ],
        );
        let lines = gen.specialize(&binding).unwrap();
        assert!(lines.contains(&"movabs rbx, 0x10000".to_string()));
        assert!(lines.contains(&"movabs rcx, 0x20000".to_string()));
        assert!(lines.contains(&"mov rdi, 512".to_string()));
        assert!(lines.contains(&"mov rdx, [rbx + 8*rax]".to_string()));
        assert!(!lines.iter().any(|l| l.contains(STREAM_POINTER_SENTINEL)));
    }

    #[test]
    fn sentinel_removed_without_streams() {
        let t = Template::builder("spin")
            .body("LOOP(l, rax=0, <, rdi=ITERATIONS, 1)\nnop\nLOOPEND(l)")
            .build();
        let gen = KernelGenerator::new(&t, GeneratorConfig::new(Arch::X86_64)).unwrap();
        let lines = gen
            .specialize(&ThreadBinding::new(0, Vec::new()).with_iterations(1000))
            .unwrap();
        assert!(!lines.iter().any(|l| l.contains(STREAM_POINTER_SENTINEL)));
        assert!(lines.contains(&"mov rdi, 1000".to_string()));
        let after_prologue = lines.iter().position(|l| l == "push r15").unwrap() + 1;
        assert_eq!(lines[after_prologue], "# LOOP(l, rax=0, <, rdi=ITERATIONS, 1)");
    }

    #[test]
    fn symbol_names_survive_substitution() {
        let t = Template::builder("copy_N")
            .body("LOOP(l, rax=0, <, rdi=N, 1)\nmov rdx, [STR0 + 8*rax]\nLOOPEND(l)")
            .stream(StreamDecl::new("STR0", DataType::Double, &["N"]))
            .build();
        let gen = KernelGenerator::new(&t, GeneratorConfig::new(Arch::X86_64)).unwrap();
        let binding = ThreadBinding::new(0, vec![StreamBinding::new(0x10000, &[64])]);
        let lines = gen.specialize(&binding).unwrap();
        for expected in [
            ".globl copy_N",
            ".type copy_N, @function",
            "copy_N:",
            ".size copy_N, .-copy_N",
            "movabs rbx, 0x10000",
            "mov rdi, 64",
        ] {
            assert!(lines.contains(&expected.to_string()), "{expected}: {lines:?}");
        }
        assert!(!lines.iter().any(|l| l.contains("copy_64")), "{lines:?}");
    }

    #[test]
    fn grammar_errors_name_the_template() {
        let t = Template::builder("broken")
            .body("LOOP(a, rax=0, <, rdi=N, 1)\nnop\nLOOPEND(b)")
            .build();
        let err = KernelGenerator::new(&t, GeneratorConfig::new(Arch::X86_64)).unwrap_err();
        assert!(matches!(err, KernelError::Grammar { ref template, .. } if template == "broken"));
    }

    #[test]
    fn exhaustion_fails_before_compiling() {
        let mut builder = Template::builder("wide").body("nop");
        for i in 0..7 {
            builder = builder.stream(StreamDecl::new(format!("S{i}"), DataType::Int, &["N"]));
        }
        let t = builder.build();
        let dir = tempfile::tempdir().unwrap();
        let config = GeneratorConfig::new(Arch::X86)
            .with_temp_dir(dir.path())
            .with_search_path(Vec::new());
        let gen = KernelGenerator::new(&t, config).unwrap();
        let streams = (0..7).map(|i| StreamBinding::new(0x1000 * (i + 1), &[4])).collect();
        let results = gen.build_threads(&[ThreadBinding::new(0, streams)]);
        assert!(matches!(
            results[0],
            Err(KernelError::Config(ConfigError::RegistersExhausted { .. }))
        ));
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }
}
