// 图库 API 模块
//
// 对外只暴露两个窄接口（上传传输、去重校验），
// GalleryClient 是它们的 HTTP 实现

pub mod client;
pub mod types;

pub use client::GalleryClient;
pub use types::{
    DuplicateValidationRequest, DuplicateValidationResponse, DuplicateValidator, ErrorProtocol,
    UploadError, UploadMetadata, UploadTransport,
};
