// Licensed under the Apache-2.0 license

#[derive(Debug, Clone, PartialEq)]
pub enum PldmError {
    InvalidMsgType,
    UnsupportedCmd,
    UnsupportedPldmType,
    InvalidCompletionCode,
    InvalidFileType,
}
