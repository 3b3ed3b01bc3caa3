//! # wipdbg 命令行入口
//!
//! 通过 Webkit Inspector Protocol 附加到浏览器标签页的 JavaScript 调试器。
//!
//! ## 主要功能
//! - 列出远程调试端点上可调试的标签页
//! - 附加到标签页，打印已加载的脚本
//! - 设置断点，在每次暂停时打印调用栈与顶层帧的作用域变量，然后自动恢复
//! - 收到 Ctrl+C 时断开会话
//!
//! ## 环境变量
//! - `WIPDBG_ENDPOINT`: 远程调试 HTTP 端点（默认: http://127.0.0.1:9222）
//! - `WIPDBG_PROFILE`: 后端协议配置（auto、dev 或 1.0）
//! - `RUST_LOG`: 日志级别，优先于配置文件中的 `log_level`

use anyhow::{anyhow, bail, Context};
use clap::{Parser, Subcommand};
use std::sync::Arc;
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;
use wipdbg::mirror::Variable;
use wipdbg::model::{BreakpointTarget, Suspension};
use wipdbg::protocol::domains::debugger::{PauseOnExceptionsState, ScopeType};
use wipdbg::session::{DebugEvent, DebugEventKind};
use wipdbg::wip::{Browser, TabInfo};
use wipdbg::{Config, DebugSession};

#[derive(Debug, Parser)]
#[command(name = "wipdbg", version, about = "JavaScript debugger over the Webkit Inspector Protocol")]
struct Cli {
    /// TOML configuration file
    #[arg(short, long)]
    config: Option<String>,

    /// Remote-inspection endpoint, overrides the configuration
    #[arg(short, long)]
    endpoint: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// List inspectable tabs
    Tabs,
    /// Attach to a tab by index or id
    Attach {
        tab: String,

        /// Breakpoint as `<url>:<line>`, 1-based line; repeatable
        #[arg(short, long = "break")]
        breakpoints: Vec<String>,

        /// Pause on exceptions: none, uncaught or all
        #[arg(long, default_value = "none")]
        exceptions: String,

        /// Detach after this many pauses
        #[arg(long)]
        max_pauses: Option<usize>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => Config::from_file(path)?,
        None => Config::from_env()?,
    };
    if let Some(endpoint) = &cli.endpoint {
        config.endpoint = endpoint.clone();
    }

    // RUST_LOG wins over the configured level
    let log_level = std::env::var("RUST_LOG")
        .ok()
        .and_then(|v| v.parse::<Level>().ok())
        .or_else(|| config.log_level.parse::<Level>().ok())
        .unwrap_or(Level::INFO);
    let subscriber = FmtSubscriber::builder().with_max_level(log_level).finish();
    tracing::subscriber::set_global_default(subscriber).context("setting default subscriber failed")?;

    info!("wipdbg v{}", wipdbg::VERSION);
    let browser = Browser::new(&config.endpoint);

    match cli.command {
        Command::Tabs => list_tabs(&browser).await,
        Command::Attach {
            tab,
            breakpoints,
            exceptions,
            max_pauses,
        } => {
            let tabs = browser.list_tabs().await?;
            let tab = select_tab(&tabs, &tab)?;
            let session = browser.attach(tab, &config).await?;
            let result = run(&session, &breakpoints, &exceptions, max_pauses).await;
            session.disconnect().await?;
            result
        }
    }
}

async fn list_tabs(browser: &Browser) -> anyhow::Result<()> {
    let tabs = browser.list_tabs().await?;
    if tabs.is_empty() {
        println!("No inspectable tabs at {}", browser.endpoint());
    }
    for (index, tab) in tabs.iter().enumerate() {
        let busy = if tab.web_socket_debugger_url.is_none() { " (attached elsewhere)" } else { "" };
        println!("[{}] {} {}{}", index, tab.title, tab.url, busy);
    }
    Ok(())
}

fn select_tab<'a>(tabs: &'a [TabInfo], selector: &str) -> anyhow::Result<&'a TabInfo> {
    if let Ok(index) = selector.parse::<usize>() {
        if let Some(tab) = tabs.get(index) {
            return Ok(tab);
        }
    }
    tabs.iter()
        .find(|tab| tab.id == selector)
        .ok_or_else(|| anyhow!("No tab matches {:?}", selector))
}

fn parse_breakpoint(arg: &str) -> anyhow::Result<BreakpointTarget> {
    let (url, line) = arg
        .rsplit_once(':')
        .ok_or_else(|| anyhow!("Breakpoint {:?} is not <url>:<line>", arg))?;
    let line: i64 = line.parse().with_context(|| format!("Bad line in breakpoint {:?}", arg))?;
    if line < 1 {
        bail!("Breakpoint lines start at 1: {:?}", arg);
    }
    Ok(BreakpointTarget::url(url, line - 1))
}

async fn run(
    session: &Arc<DebugSession>,
    breakpoints: &[String],
    exceptions: &str,
    max_pauses: Option<usize>,
) -> anyhow::Result<()> {
    println!("Attached to {}", session.url().unwrap_or_default());
    for script in session.list_scripts() {
        println!("  script {} {}", script.id(), script.url()?);
    }

    let state = PauseOnExceptionsState::from_wire(exceptions)
        .ok_or_else(|| anyhow!("Unknown exception mode {:?}", exceptions))?;
    session.set_pause_on_exceptions(state).await?;

    for arg in breakpoints {
        let bp = session.add_breakpoint(parse_breakpoint(arg)?, None).await?;
        match &bp.binding {
            Some(binding) => println!("Breakpoint {} at {} ({} locations)", bp.uid, arg, binding.locations.len()),
            None => println!("Breakpoint {} at {} (unresolved)", bp.uid, arg),
        }
    }

    let mut events = session.subscribe_filtered(vec![
        DebugEventKind::Suspended,
        DebugEventKind::Navigated,
        DebugEventKind::Closed,
    ]);
    let mut pauses = 0;
    loop {
        let event = tokio::select! {
            event = events.recv() => event?,
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted");
                return Ok(());
            }
        };

        match event {
            DebugEvent::Suspended(suspension) => {
                print_suspension(&suspension).await;
                pauses += 1;
                if max_pauses.is_some_and(|max| pauses >= max) {
                    return Ok(());
                }
                if let Err(e) = session.resume().await {
                    warn!("Resume failed: {}", e);
                }
            }
            DebugEvent::Navigated { url } => println!("Navigated to {}", url),
            DebugEvent::Closed => {
                println!("Connection closed");
                return Ok(());
            }
            _ => {}
        }
    }
}

async fn print_suspension(suspension: &Suspension) {
    println!("Paused ({})", suspension.reason());
    if let Some(exception) = suspension.exception() {
        println!("  threw {}", exception.text());
    }
    for (index, frame) in suspension.real_frames().enumerate() {
        let name = if frame.function_name().is_empty() { "<anonymous>" } else { frame.function_name() };
        let location = frame.location().map(ToString::to_string).unwrap_or_default();
        println!("  #{} {} at {}", index, name, location);
    }

    let Some(top) = suspension.top_frame() else {
        return;
    };
    for scope in top.scopes().iter().filter(|scope| scope.scope_type() != ScopeType::Global) {
        println!("  <{}>", scope.scope_type());
        match scope.variables().await {
            Ok(variables) => {
                for variable in variables {
                    println!("    {}", describe(&variable));
                }
            }
            Err(e) => println!("    ({})", e),
        }
    }
}

fn describe(variable: &Variable) -> String {
    match variable.value() {
        Ok(value) => format!("{} = {}", variable.name(), value.text()),
        Err(e) => format!("{} = ({})", variable.name(), e),
    }
}
