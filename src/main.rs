mod artifacts;
mod commands;
mod core;
mod edits;
mod gate;
mod matrix;
mod template;
mod tools;

use crate::core::context::{Channel, ProductFilter, RunContext};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use tools::{CurlFetcher, GradleBuilder, MarketplaceUploader};

/// Build, test, and release an IDE plugin across a matrix of platform
/// versions and channels
#[derive(Parser)]
#[command(name = "plugin-forge")]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
#[command(styles = get_styles())]
struct ForgeCli {
  #[command(subcommand)]
  command: Commands,
}

#[derive(Args)]
struct MatrixOpts {
  /// Working-directory override (default: current directory)
  #[arg(long)]
  cwd: Option<PathBuf>,
  /// Release identifier (major.minor); enables release mode
  #[arg(short, long)]
  release: Option<String>,
  /// Distribution channel to run: stable or dev
  #[arg(long, default_value = "stable")]
  channel: String,
  /// Product selector: intellij, android-studio, or both
  #[arg(long, default_value = "both")]
  product: String,
  /// Build only this matrix version, ignoring all other rows
  #[arg(short, long)]
  only_version: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
  /// Build every matching matrix row via the external build tool
  Build {
    #[command(flatten)]
    opts: MatrixOpts,
    /// Force re-fetch of cached SDK artifacts
    #[arg(long)]
    rebuild_cache: bool,
    /// Provision artifacts only; skip the external build
    #[arg(long)]
    setup: bool,
    /// Unpack cached artifacts unconditionally after the run
    #[arg(short, long)]
    unpack: bool,
  },
  /// Run the external test tool for every matching matrix row
  Test {
    #[command(flatten)]
    opts: MatrixOpts,
    /// Force re-fetch of cached SDK artifacts
    #[arg(long)]
    rebuild_cache: bool,
  },
  /// Upload built artifacts to the distribution channel
  Deploy {
    #[command(flatten)]
    opts: MatrixOpts,
  },
  /// Regenerate manifests, CI config, and live templates from the matrix
  Generate {
    #[command(flatten)]
    opts: MatrixOpts,
  },
}

fn get_styles() -> clap::builder::Styles {
  clap::builder::Styles::styled()
    .usage(
      anstyle::Style::new()
        .bold()
        .underline()
        .fg_color(Some(anstyle::Color::Ansi(anstyle::AnsiColor::Yellow))),
    )
    .header(
      anstyle::Style::new()
        .bold()
        .underline()
        .fg_color(Some(anstyle::Color::Ansi(anstyle::AnsiColor::Yellow))),
    )
    .literal(anstyle::Style::new().fg_color(Some(anstyle::Color::Ansi(anstyle::AnsiColor::Green))))
    .error(
      anstyle::Style::new()
        .bold()
        .fg_color(Some(anstyle::Color::Ansi(anstyle::AnsiColor::Red))),
    )
}

fn context_for(opts: MatrixOpts, rebuild_cache: bool, setup: bool, unpack: bool) -> Result<RunContext, crate::core::error::ForgeError> {
  let channel = Channel::parse(&opts.channel)?;
  let product = ProductFilter::parse(&opts.product)?;
  RunContext::build(
    opts.cwd,
    opts.release,
    channel,
    product,
    opts.only_version,
    rebuild_cache,
    setup,
    unpack,
  )
}

fn run() -> Result<i32, crate::core::error::ForgeError> {
  let cli = ForgeCli::parse();

  match cli.command {
    Commands::Build {
      opts,
      rebuild_cache,
      setup,
      unpack,
    } => {
      let ctx = context_for(opts, rebuild_cache, setup, unpack)?;
      commands::run_build(&ctx, &CurlFetcher, &GradleBuilder)
    }
    Commands::Test { opts, rebuild_cache } => {
      let ctx = context_for(opts, rebuild_cache, false, false)?;
      commands::run_test(&ctx, &CurlFetcher, &GradleBuilder)
    }
    Commands::Deploy { opts } => {
      let ctx = context_for(opts, false, false, false)?;
      commands::run_deploy(&ctx, &MarketplaceUploader)
    }
    Commands::Generate { opts } => {
      let ctx = context_for(opts, false, false, false)?;
      commands::run_generate(&ctx)
    }
  }
}

fn main() -> ExitCode {
  match run() {
    Ok(0) => ExitCode::SUCCESS,
    Ok(status) => {
      eprintln!("run finished with status {}", status);
      ExitCode::from(status.clamp(1, 255) as u8)
    }
    Err(e) => {
      eprintln!("Error: {}", e);
      if let Some(help) = e.help_message() {
        eprintln!("  {}", help);
      }
      ExitCode::from(e.exit_code().as_i32() as u8)
    }
  }
}
