//! # xtask - 开发辅助工具
//!
//! 提供本地质量门禁与页面检查命令。
//!
//! ## 命令
//!
//! - `check-all`: 依次运行 fmt、clippy、test
//! - `page-check`: 检查页面文件（island 标签解析、加载条件属性）

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::process::{Command, ExitCode};

use island_host::{HostConfig, Page};
use island_runtime::widgets::{ClickCountOptions, builtin_registry};
use island_runtime::{Fragment, Gate, IslandRegistry};
use walkdir::WalkDir;

/// 门禁步骤：cargo 子命令参数
const GATE_STEPS: &[&[&str]] = &[
    &["fmt", "--all", "--", "--check"],
    &["clippy", "--workspace", "--all-targets"],
    &["test", "--workspace"],
];

/// 子命令
#[derive(Debug, PartialEq)]
enum Task {
    CheckAll,
    PageCheck(Option<String>),
    Help,
}

impl Task {
    fn parse(mut args: impl Iterator<Item = String>) -> anyhow::Result<Self> {
        match args.next().as_deref() {
            None | Some("help" | "-h" | "--help") => Ok(Self::Help),
            Some("check-all") => Ok(Self::CheckAll),
            Some("page-check") => Ok(Self::PageCheck(args.next())),
            Some(other) => anyhow::bail!("unknown xtask subcommand: {other}"),
        }
    }

    fn execute(self) -> anyhow::Result<()> {
        match self {
            Self::CheckAll => GATE_STEPS.iter().try_for_each(|step| cargo(step)),
            Self::PageCheck(path) => page_check(path.as_deref()),
            Self::Help => {
                print_help();
                Ok(())
            }
        }
    }
}

/// 运行一条 cargo 命令，非零退出视为失败
fn cargo(args: &[&str]) -> anyhow::Result<()> {
    let line = format!("cargo {}", args.join(" "));
    eprintln!("\n==> {line}");
    let status = Command::new("cargo").args(args).status()?;
    anyhow::ensure!(status.success(), "{line} failed with {status}");
    Ok(())
}

fn main() -> ExitCode {
    match Task::parse(std::env::args().skip(1)).and_then(Task::execute) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("xtask error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn print_help() {
    eprintln!(
        r#"xtask - 开发辅助工具

USAGE:
  cargo xtask <command>

COMMANDS:
  check-all       运行 fmt、clippy、test 门禁检查
  page-check      检查页面文件

PAGE-CHECK:
  cargo xtask page-check [path]

  不带参数：检查 pages/ 下所有 .json 文件
  带路径参数：检查指定文件或目录

  检查内容：
    - 页面 JSON 是否能解析
    - 自定义元素标签能否解析到内置模块
    - client:media 的值是否为空（空值不构成加载条件）
    - client:* 属性是否写在自定义元素上
    - 元素 id 是否重复
"#
    );
}

//=============================================================================
// page-check 命令实现
//=============================================================================

/// 默认页面目录（相对于 workspace root）
const PAGES_DIR: &str = "pages";

/// 单个页面的检查结果
#[derive(Debug, Default, PartialEq)]
struct PageReport {
    /// 标签 → 命中的模块 ID
    resolved: BTreeMap<String, String>,
    /// 无法解析的自定义元素标签
    unresolved: BTreeSet<String>,
    /// 警告
    warnings: Vec<String>,
}

/// 执行页面检查
fn page_check(path: Option<&str>) -> anyhow::Result<()> {
    let files = match path {
        Some(p) => {
            let path = PathBuf::from(p);
            if path.is_file() {
                vec![path]
            } else if path.is_dir() {
                collect_page_files(&path)
            } else {
                anyhow::bail!("路径不存在: {}", p);
            }
        }
        None => {
            let dir = Path::new(PAGES_DIR);
            if !dir.exists() {
                anyhow::bail!(
                    "默认页面目录不存在: {}\n请在 workspace 根目录运行，或指定页面路径",
                    dir.display()
                );
            }
            collect_page_files(dir)
        }
    };

    if files.is_empty() {
        eprintln!("未找到页面文件（.json）");
        return Ok(());
    }

    eprintln!("==> 检查 {} 个页面文件...\n", files.len());

    let config = HostConfig::default();
    let registry = builtin_registry(&config.islands.modules, &ClickCountOptions::default());

    let mut parse_errors = 0;
    let mut warn_count = 0;
    for file in &files {
        let page_id = file.display().to_string();
        let page = match Page::load(file) {
            Ok(page) => page,
            Err(e) => {
                eprintln!("[ERROR] {}: {}", page_id, e);
                parse_errors += 1;
                continue;
            }
        };

        let report = check_page(&page, &registry);
        for (tag, module) in &report.resolved {
            eprintln!("[OK]   {}: <{}> → {}", page_id, tag, module);
        }
        for tag in &report.unresolved {
            eprintln!("[WARN] {}: <{}> 没有对应的模块", page_id, tag);
        }
        for warning in &report.warnings {
            eprintln!("[WARN] {}: {}", page_id, warning);
        }
        warn_count += report.unresolved.len() + report.warnings.len();
    }

    eprintln!("─────────────────────────────────────────────────────");
    eprintln!("检查完成: {} 个页面", files.len());
    if parse_errors > 0 {
        eprintln!("❌ {} 个错误, {} 个警告", parse_errors, warn_count);
        anyhow::bail!("页面检查发现错误");
    } else if warn_count > 0 {
        eprintln!("⚠️  0 个错误, {} 个警告", warn_count);
    } else {
        eprintln!("✅ 检查通过，无错误");
    }
    Ok(())
}

/// 收集目录下的所有页面文件
fn collect_page_files(dir: &Path) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = WalkDir::new(dir)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| entry.into_path())
        .filter(|path| path.extension().is_some_and(|ext| ext == "json"))
        .collect();
    files.sort();
    files
}

/// 检查单个页面
fn check_page(page: &Page, registry: &IslandRegistry) -> PageReport {
    let mut report = PageReport::default();
    let mut ids = BTreeSet::new();
    for fragment in &page.body {
        check_fragment(fragment, registry, &mut ids, &mut report);
    }
    report
}

fn check_fragment(
    fragment: &Fragment,
    registry: &IslandRegistry,
    ids: &mut BTreeSet<String>,
    report: &mut PageReport,
) {
    let Fragment::Element {
        tag,
        attrs,
        children,
    } = fragment
    else {
        return;
    };

    let is_custom = tag.contains('-');
    if is_custom {
        match registry.resolve(tag) {
            Some(resolved) => {
                report.resolved.insert(tag.clone(), resolved.id);
            }
            None => {
                report.unresolved.insert(tag.clone());
            }
        }
    }

    for (name, value) in attrs {
        if !name.starts_with("client:") {
            continue;
        }
        if ![Gate::VISIBLE, Gate::MEDIA, Gate::IDLE].contains(&name.as_str()) {
            report
                .warnings
                .push(format!("<{}> 上的未知加载条件 {}", tag, name));
        } else if !is_custom {
            report
                .warnings
                .push(format!("<{}> 不是自定义元素，{} 不会生效", tag, name));
        } else if name == Gate::MEDIA && value.trim().is_empty() {
            report
                .warnings
                .push(format!("<{}> 的 {} 为空，不构成加载条件", tag, name));
        }
    }

    if let Some(id) = attrs.get("id")
        && !ids.insert(id.clone())
    {
        report.warnings.push(format!("重复的元素 id: {}", id));
    }

    for child in children {
        check_fragment(child, registry, ids, report);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> IslandRegistry {
        builtin_registry(
            &HostConfig::default().islands.modules,
            &ClickCountOptions::default(),
        )
    }

    #[test]
    fn test_check_page_resolves_and_warns() {
        let page = Page::from_json(
            r#"{
                "body": [
                    { "tag": "click-count", "attrs": { "id": "a", "client:media": " " } },
                    { "tag": "section", "attrs": { "client:idle": "" }, "children": [
                        { "tag": "click-counter", "attrs": { "id": "a", "client:load": "" } },
                        { "tag": "fancy-widget" }
                    ] }
                ]
            }"#,
        )
        .unwrap();

        let report = check_page(&page, &registry());
        assert_eq!(
            report.resolved,
            BTreeMap::from([
                ("click-count".to_string(), "click-count/index".to_string()),
                ("click-counter".to_string(), "click-counter/index".to_string()),
            ])
        );
        assert_eq!(
            report.unresolved,
            BTreeSet::from(["fancy-widget".to_string()])
        );
        assert_eq!(
            report.warnings,
            vec![
                "<click-count> 的 client:media 为空，不构成加载条件",
                "<section> 不是自定义元素，client:idle 不会生效",
                "<click-counter> 上的未知加载条件 client:load",
                "重复的元素 id: a",
            ]
        );
    }

    #[test]
    fn test_clean_page_has_no_warnings() {
        let page = Page::from_json(
            r#"{ "body": [{ "tag": "click-count", "attrs": { "client:visible": "", "client:media": "(min-width: 768px)" } }] }"#,
        )
        .unwrap();
        let report = check_page(&page, &registry());
        assert!(report.warnings.is_empty());
        assert!(report.unresolved.is_empty());
        assert_eq!(report.resolved.len(), 1);
    }

    #[test]
    fn test_parse_tasks() {
        let parse = |args: &[&str]| Task::parse(args.iter().map(|a| a.to_string()));
        assert_eq!(parse(&[]).unwrap(), Task::Help);
        assert_eq!(parse(&["check-all"]).unwrap(), Task::CheckAll);
        assert_eq!(parse(&["page-check"]).unwrap(), Task::PageCheck(None));
        assert_eq!(
            parse(&["page-check", "pages/index.json"]).unwrap(),
            Task::PageCheck(Some("pages/index.json".to_string()))
        );
        assert!(parse(&["cov-runtime"]).is_err());
    }

    #[test]
    fn test_collect_page_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("nested")).unwrap();
        std::fs::write(dir.path().join("b.json"), "{}").unwrap();
        std::fs::write(dir.path().join("nested/a.json"), "{}").unwrap();
        std::fs::write(dir.path().join("notes.md"), "").unwrap();

        let files = collect_page_files(dir.path());
        assert_eq!(
            files,
            vec![dir.path().join("b.json"), dir.path().join("nested/a.json")]
        );
    }
}
