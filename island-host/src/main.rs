//! island-host 命令行入口
//!
//! ```text
//! island-host [--config config.json] [--page pages/index.json] [--scenario s.json] [--log-level info]
//! ```

use std::path::PathBuf;
use std::process;

use anyhow::Context;
use clap::Parser;
use island_host::{App, HostConfig, Page, RunReport, Scenario, init_tracing};
use tokio::task::LocalSet;
use tracing::{error, info};

#[derive(Parser)]
#[command(name = "island-host")]
#[command(about = "加载页面、回放场景并输出 island 激活报告", long_about = None)]
#[command(version)]
struct Cli {
    /// 配置文件路径
    #[arg(short, long, default_value = "config.json")]
    config: PathBuf,

    /// 页面文件（覆盖配置中的 page_path）
    #[arg(short, long)]
    page: Option<PathBuf>,

    /// 场景文件（覆盖配置中的 scenario_path）
    #[arg(short, long)]
    scenario: Option<PathBuf>,

    /// 日志级别（覆盖配置中的 debug.log_level）
    #[arg(long)]
    log_level: Option<String>,

    /// 只输出最终标记
    #[arg(long)]
    markup_only: bool,
}

fn main() {
    let cli = Cli::parse();

    if let Err(e) = real_main(cli) {
        error!("{e:#}");
        eprintln!("❌ 运行失败: {e:#}");
        process::exit(1);
    }
}

fn real_main(cli: Cli) -> anyhow::Result<()> {
    let mut config = HostConfig::load(&cli.config);
    if let Some(page) = cli.page {
        config.page_path = page;
    }
    if let Some(scenario) = cli.scenario {
        config.scenario_path = Some(scenario);
    }
    if let Some(level) = cli.log_level {
        config.debug.log_level = level;
    }
    config.validate()?;

    let level: tracing::Level = config
        .debug
        .log_level
        .parse()
        .context("无效的日志级别")?;
    init_tracing(level);

    let page = Page::load(&config.page_path)?;
    let scenario = match &config.scenario_path {
        Some(path) => Scenario::load(path)?,
        None => Scenario::default(),
    };
    info!(page = ?config.page_path, steps = scenario.steps.len(), "开始运行");

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .build()
        .context("无法创建 tokio 运行时")?;
    let markup_only = cli.markup_only;
    let app = App::new(config);
    let report = LocalSet::new().block_on(&runtime, app.run(&page, &scenario))?;

    print_report(&report, markup_only)
}

fn print_report(report: &RunReport, markup_only: bool) -> anyhow::Result<()> {
    if markup_only {
        println!("{}", report.markup);
    } else {
        println!("{}", serde_json::to_string_pretty(report)?);
    }
    Ok(())
}
