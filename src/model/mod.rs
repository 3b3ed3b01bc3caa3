//! # 调试对象模型
//!
//! 被调试页面在客户端的镜像：脚本、断点、暂停状态与页面框架。
//!
//! ## 主要功能
//! - **脚本注册表**: 以 `scriptId` 为键，源码按需获取并缓存，回收后访问报 `StaleScript`
//! - **断点管理**: 客户端断点集合为准，导航后按 uid 顺序重新提交
//! - **暂停快照**: 由 `Debugger.paused` 同步构建，异常暂停时前置合成异常帧
//! - **句柄组**: 每次暂停一个对象组，恢复执行时整体失效
//! - **框架管理**: 只跟踪顶层框架的 URL
//!
//! ## 模块结构
//! - `handle`: 句柄组与远程对象句柄
//! - `script`: 脚本注册表
//! - `breakpoint`: 断点管理器
//! - `suspension`: 暂停快照、调用帧与作用域
//! - `frame`: 框架管理器

pub mod breakpoint;
pub mod frame;
pub mod handle;
pub mod script;
pub mod suspension;

pub use breakpoint::{Binding, Breakpoint, BreakpointManager, BreakpointTarget};
pub use frame::FrameManager;
pub use handle::{HandleGroup, RemoteHandle};
pub use script::{Script, ScriptRange, ScriptRegistry, SourceLocation};
pub use suspension::{CallFrame, FrameKind, Scope, Suspension};
