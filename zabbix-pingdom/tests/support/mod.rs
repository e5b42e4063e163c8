//! テスト支援ユーティリティ

pub mod http;
