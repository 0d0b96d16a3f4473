//! Minimal CLI: tags | schema
use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use clap::{Args, Parser, Subcommand};

use schema_ref::{samples, CycleMode, GeneratorOptions, SchemaRefGenerator, TypeInfoCache};

// ————————————————————————————————————————————————————————————————————————————
// TYPES
// ————————————————————————————————————————————————————————————————————————————

/// inspect constraint tags and generate schemas for the bundled sample models
#[derive(Parser, Debug)]
pub struct CommandLineInterface {
    #[command(subcommand)]
    cmd: Command,

    /// increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// parse a constraint tag and print its operator chain as JSON
    Tags(TagsOut),
    /// generate the schema and promoted components for a sample model
    Schema(SchemaOut),
}

#[derive(Args, Debug)]
struct TagsOut {
    /// e.g. 'required,dive,keys,min=1,endkeys,gte=0|eq=-1'
    tag: String,
}

#[derive(Args, Debug)]
struct SchemaOut {
    /// one of: user, node, inventory, article, employee
    #[arg(long)]
    sample: String,

    /// fail on cycles instead of breaking them with a reference
    #[arg(long, default_value_t = false)]
    strict: bool,

    /// generator options (.json)
    #[arg(long)]
    config: Option<PathBuf>,

    /// output .json file (stdout if omitted)
    #[arg(short, long)]
    out: Option<PathBuf>,
}

// ————————————————————————————————————————————————————————————————————————————
// IMPLEMENTATION
// ————————————————————————————————————————————————————————————————————————————

impl SchemaOut {
    fn options(&self) -> anyhow::Result<GeneratorOptions> {
        let mut options = match self.config.as_ref() {
            Some(path) => GeneratorOptions::from_path(path)
                .with_context(|| format!("failed to load generator options from {}", path.display()))?,
            None => GeneratorOptions::default(),
        };
        if self.strict {
            options.cycles = CycleMode::Strict;
        }
        Ok(options)
    }
}

impl CommandLineInterface {
    pub fn load() -> Self {
        Self::parse()
    }

    pub fn run(&self) -> anyhow::Result<()> {
        match &self.cmd {
            Command::Tags(target) => {
                let chain = schema_ref::tags::parse(&target.tag)
                    .with_context(|| format!("invalid tag `{}`", target.tag))?;
                println!("{}", serde_json::to_string_pretty(&chain.to_json())?);
                Ok(())
            }
            Command::Schema(target) => {
                let options = target.options()?;
                let cache = TypeInfoCache::new();
                let mut generator = SchemaRefGenerator::new(&cache).with_options(options);
                let Some(generated) = samples::generate(&mut generator, &target.sample) else {
                    bail!("unknown sample `{}` (expected one of: {})", target.sample, samples::NAMES.join(", "));
                };
                let generated = generated.with_context(|| format!("failed to generate schema for `{}`", target.sample))?;
                let src = serde_json::to_string_pretty(&generated.to_json())?;
                write_output(target.out.as_deref(), &src)
            }
        }
    }
}

// ————————————————————————————————————————————————————————————————————————————
// INTERNAL HELPERS
// ————————————————————————————————————————————————————————————————————————————

fn write_output(out: Option<&Path>, src: &str) -> anyhow::Result<()> {
    let Some(out) = out else {
        println!("{src}");
        return Ok(());
    };
    if let Some(parent) = out.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    std::fs::write(out, src).with_context(|| format!("failed to write {}", out.display()))
}
