use crate::error::Result;
use crate::protocol::message::{EndpointId, Origin, ScopedMessage};

/// Where and how a new embedded context should be created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameSpec {
    /// The origin the frame's content is served from.
    pub origin: Origin,
    /// Full source URL of the frame.
    pub src: String,
}

/// The host document as seen by the gateway.
///
/// Implementations own the actual frames. Posting always names a concrete
/// target origin; there is no broadcast operation on the host
/// side.
///
/// 网关所见的宿主文档。实现方持有真实的框架。投递消息时必须指定具体的目标来源，
/// 宿主端没有广播操作。
pub trait EmbedSurface {
    /// Creates and mounts a frame, returning its endpoint handle.
    fn create_frame(&mut self, spec: &FrameSpec) -> Result<EndpointId>;

    fn show_loader(&mut self, frame: EndpointId);

    fn hide_loader(&mut self, frame: EndpointId);

    /// Unmounts the frame. Messages it sent earlier may still arrive.
    fn remove_frame(&mut self, frame: EndpointId);

    fn post(
        &mut self,
        frame: EndpointId,
        target_origin: &Origin,
        message: &ScopedMessage,
    ) -> Result<()>;
}
