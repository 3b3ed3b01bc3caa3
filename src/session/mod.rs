//! # 调试会话层
//!
//! 位于命令处理器与界面之间的调试会话运行时。
//!
//! ## 主要功能
//! - **握手**: 按后端配置启用各协议域，读取框架树，然后进入运行状态
//! - **事件路由**: 脚本解析、暂停、恢复、断点解析、导航分别交给对应的模型
//! - **执行控制**: 暂停、恢复、单步，状态不对时返回 `SessionBusy`
//! - **求值**: 在调用帧或全局上下文中求值，结果以值镜像返回
//! - **事件订阅**: 通过 broadcast 通道或 Stream 向监听者发布会话事件
//!
//! ## 核心概念
//! - **DebugSession**: 一个标签页的一次调试连接
//! - **SessionState**: 会话生命周期状态
//! - **DebugEvent**: 发布给监听者的会话事件
//!
//! ## 模块结构
//! - `controller`: 会话控制器
//! - `state`: 会话状态机
//! - `events`: 事件分发器
//!
//! ## 使用示例
//! ```rust,no_run
//! use wipdbg::config::Config;
//! use wipdbg::wip::Browser;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = Config::default();
//! let browser = Browser::new(&config.endpoint);
//! let tabs = browser.list_tabs().await?;
//!
//! let session = browser.attach(&tabs[0], &config).await?;
//! for script in session.list_scripts() {
//!     println!("{}", script.url()?);
//! }
//! # Ok(())
//! # }
//! ```

pub mod controller;
pub mod events;
pub mod state;


pub use controller::{DebugSession, EvaluateResult};
pub use events::{DebugEvent, DebugEventKind, EventDispatcher, FilteredReceiver};
pub use state::SessionState;
