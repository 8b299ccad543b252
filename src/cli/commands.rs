use anyhow::{bail, Result};
use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use std::path::PathBuf;

use rust_bunpress::core::Engine;
use rust_bunpress::models::BuildStatus;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// 指定站点目录
    #[arg(short, long, default_value = ".")]
    pub path: PathBuf,

    /// 输出调试日志
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// 构建静态站点
    Build(BuildArgs),

    /// 列出可用主题
    Themes,
}

#[derive(Args)]
pub struct BuildArgs {
    /// 覆盖配置中的输出目录
    #[arg(short, long)]
    pub out_dir: Option<String>,

    /// 不生成 sitemap.xml
    #[arg(long)]
    pub no_sitemap: bool,
}

pub async fn execute(cli: Cli) -> Result<()> {
    let mut engine = Engine::new(cli.path.clone())?;

    match cli.command {
        Commands::Build(args) => {
            if let Some(out_dir) = args.out_dir {
                engine.config.out_dir = out_dir;
            }
            if args.no_sitemap {
                engine.config.build.sitemap = false;
            }

            let result = engine.build().await;
            for issue in &result.errors {
                println!("  {} {}", "!".yellow(), issue);
            }

            match result.status() {
                BuildStatus::Complete => println!(
                    "{} 生成 {} 个文件 -> {}",
                    "✔".bright_green(),
                    result.files_generated.len(),
                    result.output_dir.display()
                ),
                BuildStatus::Partial => println!(
                    "{} 生成 {} 个文件，{} 个文件失败 -> {}",
                    "⚠".yellow(),
                    result.files_generated.len(),
                    result.errors.len(),
                    result.output_dir.display()
                ),
                BuildStatus::Failed => bail!("构建失败"),
            }
        }
        Commands::Themes => {
            let resolver = engine.discover_themes();
            if resolver.is_empty() {
                println!("{}", "没有可用主题".yellow());
                return Ok(());
            }

            println!("可用主题:");
            for theme in resolver.themes() {
                let marker = if theme.name == engine.config.theme.name {
                    "*".bright_green().to_string()
                } else {
                    " ".to_string()
                };
                let layouts: Vec<&str> = theme.layouts.keys().map(|k| k.as_str()).collect();
                println!(
                    "{} {} {}",
                    marker,
                    theme.name.bright_cyan(),
                    format!("[{}]", layouts.join(", ")).dimmed()
                );
            }
        }
    }

    Ok(())
}
