//! エラー型定義

use thiserror::Error;

/// 共通エラー型
#[derive(Error, Debug)]
pub enum Error {
    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Base64 decode error: {0}")]
    Decode(#[from] base64::DecodeError),
}

/// Result型エイリアス
pub type Result<T> = std::result::Result<T, Error>;
