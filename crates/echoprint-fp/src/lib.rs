//! Echoprint codegen payload library
//!
//! Wire types for codegen requests and the codec that turns the compressed
//! `code` string into parallel code/time arrays.

pub mod codec;
pub mod format;

pub use codec::{decode, encode, inflate, unpack, DecodeError, HEX_DIGITS_PER_VALUE, MAX_VALUE};
pub use format::{parse_codegen, CodegenFp, IngestedCodegen, Metadata};
