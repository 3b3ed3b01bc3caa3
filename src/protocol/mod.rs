//! # 协议编解码层
//!
//! Webkit Inspector Protocol 的类型化视图与命令参数。
//!
//! ## 主要功能
//! - **读取视图**: 借用已解码的 JSON，按需读取字段，不做递归拷贝
//! - **命令参数**: serde 结构体，必填字段走构造函数，可选字段走 `with_*`
//! - **类型别名**: `ScriptId`、`NodeId` 等编码相同但类型不同
//! - **后端配置**: 不同协议版本支持的命令集合
//!
//! ## 模块结构
//! - `codec`: 视图宏、`FromJson`、`ProtocolCommand`、`Reply`
//! - `ids`: 协议标识符类型
//! - `domains`: `Debugger`、`Runtime`、`Page`、`DOM` 各域的视图和命令
//! - `profile`: 后端协议版本

pub mod codec;
pub mod domains;
pub mod ids;
pub mod profile;


pub use codec::{DecodeError, FromJson, JsonList, ProtocolCommand, Reply};
pub use profile::{BackendProfile, ProfileSelection};
