//! 核心数据模型模块
//!
//! 定义 PID 记录的核心数据结构：Entry, Record, 以及线上和简单两种 JSON 形状。

pub mod entry;
pub mod record;
pub mod simple;
pub mod wire;

pub use entry::*;
pub use record::*;
pub use simple::*;
pub use wire::*;
