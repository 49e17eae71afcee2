pub mod block;
pub mod bounds;
pub mod curves;
pub mod dimension;
pub mod dispatch;
pub mod hatch;
pub mod options;
pub mod pixmap;
pub mod recording;
pub mod renderer;
pub mod resources;
pub mod surface;
pub mod text;
pub mod transform;

pub mod errors {
    use std::path::PathBuf;

    use thiserror::Error;

    /// 渲染会话级错误：只有违反调用契约或输出失败才会冒泡到调用方。
    #[derive(Debug, Error)]
    pub enum RenderError {
        #[error("canvas size {width}x{height} is not drawable")]
        InvalidCanvas { width: u32, height: u32 },
        #[error("failed to write {path:?}")]
        Io {
            path: PathBuf,
            #[source]
            source: std::io::Error,
        },
        #[error("failed to encode png: {0}")]
        Encode(String),
        #[error("font file {path:?} is not a usable TrueType font")]
        InvalidFont { path: PathBuf },
    }

    /// 绘图表面上的单个图元失败，由调用方就地降级处理。
    #[derive(Debug, Error, Clone, PartialEq, Eq)]
    pub enum SurfaceError {
        #[error("path has no drawable figures")]
        EmptyPath,
        #[error("fill style is not supported by this surface")]
        UnsupportedFill,
        #[error("surface backend failure: {0}")]
        Backend(String),
    }
}

pub use dispatch::{DrawOutcome, SkipReason};
pub use errors::{RenderError, SurfaceError};
pub use options::RenderOptions;
pub use pixmap::PixmapSurface;
pub use recording::{DrawCommand, RecordingSurface};
pub use renderer::{RenderSummary, Renderer};
pub use surface::DrawingSurface;
