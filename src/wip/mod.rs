//! # WIP 通信层
//!
//! 通过 WebSocket 与浏览器调试后端交换 Webkit Inspector Protocol 帧。
//!
//! ## 主要功能
//! - **传输抽象**: `Transport` trait，WebSocket 实现与内存 Mock 实现
//! - **命令处理**: 分配序号、关联响应、按到达顺序分发事件
//! - **关闭扇出**: 传输断开时按发送顺序以 `SessionClosed` 失败所有未完成命令
//! - **类型化客户端**: 按后端配置检查命令是否受支持
//! - **标签页发现**: 通过 `/json` 与 `/json/version` 列出可调试页面
//!
//! ## 模块结构
//! - `traits`: 传输 trait 与回调类型
//! - `types`: 请求、响应、事件信封
//! - `processor`: 命令处理器
//! - `client`: 类型化命令客户端
//! - `connection`: WebSocket 传输
//! - `browser`: 标签页发现与附加
//! - `mock`: 用于测试的 Mock 传输

pub mod browser;
pub mod client;
pub mod connection;
pub mod mock;
pub mod processor;
pub mod traits;
pub mod types;

#[cfg(test)]
pub mod tests;

pub use browser::{Browser, BrowserVersion, TabInfo};
pub use client::ProtocolClient;
pub use connection::WebSocketTransport;
pub use mock::MockTransport;
pub use processor::CommandProcessor;
pub use traits::{EventHandler, ResponseCallback, SyncCallback, Transport};
