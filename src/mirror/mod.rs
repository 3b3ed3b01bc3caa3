//! # 值与变量镜像层
//!
//! 把任意深度的远程对象图以统一的惰性接口暴露给界面。
//!
//! ## 主要功能
//! - **值镜像**: 原始值、对象、数组、函数、异常五种变体
//! - **变量镜像**: 真实变量、作用域包装、异常持有者三种变体
//! - **惰性加载**: 属性首次访问时通过 `Runtime.getProperties` 获取并缓存
//! - **一次发布**: 变量的值只构建一次，并发首次访问得到同一实例
//! - **变量修改**: 后端支持时可通过 `Debugger.setVariableValue` 赋值
//!
//! ## 模块结构
//! - `properties`: 属性来源 trait、对象与作用域两种来源、求值上下文
//! - `value`: 值镜像
//! - `variable`: 变量镜像

pub mod properties;
pub mod value;
pub mod variable;

#[cfg(test)]
pub mod tests;

pub use properties::{EvalContext, PropertySet, PropertySource, ScopeRef};
pub use value::{ArrayValue, FunctionValue, JsType, ObjectValue, RemoteInfo, Value};
pub use variable::{Variable, VariableKind};
