//! kgen - expand, specialize and optionally compile a benchmark template.
//!
//! ```bash
//! kgen copy.body --stream STR0:double:N --stream STR1:double:N --size N=4096 --threads 2
//! kgen copy.body --stream STR0:double:N --size N=4096 --compile --run
//! ```

use std::error::Error;
use std::fs;
use std::path::PathBuf;

use clap::Parser;
use kernelgen::{
    Arch, DataType, GeneratorConfig, KernelGenerator, StreamBuffer, StreamDecl, Template,
    ThreadBinding,
};

#[derive(Parser, Debug)]
#[command(name = "kgen", version, about = "Micro-benchmark kernel compiler")]
struct Args {
    /// File holding the template body in the block-keyword language
    body: PathBuf,

    /// Benchmark (symbol) name; defaults to the body file's stem
    #[arg(long)]
    name: Option<String>,

    /// Target architecture; defaults to KGEN_ARCH or the build target
    #[arg(long)]
    arch: Option<Arch>,

    /// Stream declaration NAME:TYPE:TOKEN[,TOKEN...]
    #[arg(long = "stream", value_parser = parse_stream)]
    streams: Vec<StreamDecl>,

    /// Size token binding TOKEN=ELEMENTS
    #[arg(long = "size", value_parser = parse_pair)]
    sizes: Vec<(String, String)>,

    /// Constant KEY=VALUE
    #[arg(long = "const", value_parser = parse_pair)]
    constants: Vec<(String, String)>,

    /// Variable KEY=VALUE
    #[arg(long = "var", value_parser = parse_pair)]
    variables: Vec<(String, String)>,

    /// Number of threads to specialize for
    #[arg(long, default_value_t = 1)]
    threads: usize,

    /// Value bound to ITERATIONS
    #[arg(long, default_value_t = 1)]
    iterations: u64,

    /// Directory for the .s and .so files
    #[arg(long)]
    tmp: Option<PathBuf>,

    /// Compiler tried before the defaults (repeatable)
    #[arg(long = "compiler")]
    compilers: Vec<String>,

    /// Compile and load every thread's routine
    #[arg(long)]
    compile: bool,

    /// Call each loaded routine once (implies --compile)
    #[arg(long)]
    run: bool,

    /// Write the specialized assembly here instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,
}

fn parse_pair(s: &str) -> Result<(String, String), String> {
    match s.split_once('=') {
        Some((k, v)) if !k.trim().is_empty() => Ok((k.trim().to_string(), v.trim().to_string())),
        _ => Err(format!("expected KEY=VALUE, got `{}`", s)),
    }
}

fn parse_stream(s: &str) -> Result<StreamDecl, String> {
    let mut parts = s.splitn(3, ':');
    let (Some(name), Some(dtype), Some(dims)) = (parts.next(), parts.next(), parts.next()) else {
        return Err(format!("expected NAME:TYPE:TOKEN[,TOKEN...], got `{}`", s));
    };
    let dtype: DataType = dtype.parse().map_err(|e| format!("{}", e))?;
    let dims: Vec<&str> = dims.split(',').map(str::trim).filter(|d| !d.is_empty()).collect();
    if dims.is_empty() {
        return Err(format!("stream `{}` has no size tokens", name));
    }
    Ok(StreamDecl::new(name.trim(), dtype, &dims))
}

fn extent(sizes: &[(String, String)], token: &str) -> Result<u64, Box<dyn Error>> {
    let (_, value) = sizes
        .iter()
        .find(|(k, _)| k == token)
        .ok_or_else(|| format!("no --size given for token `{}`", token))?;
    Ok(value
        .parse()
        .map_err(|e| format!("size `{}={}`: {}", token, value, e))?)
}

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::init();
    let args = Args::parse();

    let text = fs::read_to_string(&args.body)?;
    let name = match &args.name {
        Some(name) => name.clone(),
        None => args
            .body
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .ok_or("cannot derive a benchmark name from the body path")?,
    };

    let mut builder = Template::builder(name).body(&text);
    for stream in &args.streams {
        builder = builder.stream(stream.clone());
    }
    for (k, v) in &args.constants {
        builder = builder.constant(k.as_str(), v.as_str());
    }
    for (k, v) in &args.variables {
        builder = builder.variable(k.as_str(), v.as_str());
    }
    let template = builder.build();

    let mut config = GeneratorConfig::from_env()?;
    if let Some(arch) = args.arch {
        config.arch = arch;
    }
    if let Some(tmp) = &args.tmp {
        config.temp_dir = tmp.clone();
    }
    let mut candidates = args.compilers.clone();
    candidates.append(&mut config.compiler_candidates);
    config.compiler_candidates = candidates;

    let generator = KernelGenerator::new(&template, config)?;

    // Buffers outlive every routine that was specialized against them.
    let mut buffers: Vec<Vec<StreamBuffer>> = Vec::with_capacity(args.threads);
    let mut bindings = Vec::with_capacity(args.threads);
    for thread in 0..args.threads {
        let mut thread_buffers = Vec::with_capacity(template.streams.len());
        let mut bytes = 0u64;
        for decl in &template.streams {
            let extents = decl
                .dims
                .iter()
                .map(|token| extent(&args.sizes, token))
                .collect::<Result<Vec<_>, _>>()?;
            let buffer = StreamBuffer::allocate(decl.dtype, &extents)?;
            bytes += (buffer.len() * decl.dtype.size()) as u64;
            thread_buffers.push(buffer);
        }
        let streams = thread_buffers.iter_mut().map(StreamBuffer::binding).collect();
        bindings.push(
            ThreadBinding::new(thread, streams)
                .with_group(0, args.threads)
                .with_iterations(args.iterations)
                .with_bytes_per_iteration(bytes),
        );
        buffers.push(thread_buffers);
    }

    if args.compile || args.run {
        let mut failed = 0;
        for result in generator.build_threads(&bindings) {
            match result {
                Ok(mut artifact) => {
                    println!(
                        "thread {}: {} -> {}",
                        artifact.thread_id,
                        artifact.asm_path.display(),
                        artifact.object_path.display()
                    );
                    if args.run {
                        // SAFETY: the routine only touches the buffers allocated above.
                        unsafe { artifact.call() };
                        println!("thread {}: ran `{}`", artifact.thread_id, artifact.symbol);
                    }
                    artifact.teardown();
                }
                Err(err) => {
                    eprintln!("error: {}", err);
                    failed += 1;
                }
            }
        }
        if failed > 0 {
            return Err(format!("{} of {} threads failed", failed, args.threads).into());
        }
        return Ok(());
    }

    let mut out = String::new();
    for binding in &bindings {
        let lines = generator.specialize(binding)?;
        if args.threads > 1 {
            out.push_str(&generator.backend().comment(&format!("thread {}", binding.thread_id)));
            out.push('\n');
        }
        for line in lines {
            out.push_str(&line);
            out.push('\n');
        }
    }
    match &args.output {
        Some(path) => fs::write(path, out)?,
        None => print!("{}", out),
    }
    drop(buffers);
    Ok(())
}
