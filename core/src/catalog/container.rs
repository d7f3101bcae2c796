//! Nested container (WIM) hooks.
//!
//! The container format itself lives outside this crate. The catalog only
//! needs two things from it: a patch hook for the container file, and the
//! ability to pull one inner file out as a readable source.

use super::patch::Patch;
use crate::config::BootConfig;
use crate::source::{IoError, ReadAt};
use alloc::rc::Rc;

pub trait Container {
    /// Hook applied to reads of a container file, if any.
    fn patcher(&self, file: &Rc<dyn ReadAt>, config: &BootConfig) -> Option<Rc<dyn Patch>>;

    /// Look up `path` in image `index` of the container. `Ok(None)` when the
    /// file is absent.
    fn extract(
        &self,
        file: &Rc<dyn ReadAt>,
        index: u32,
        path: &str,
    ) -> Result<Option<Rc<dyn ReadAt>>, IoError>;
}

/// Treats containers as opaque files.
pub struct NoContainer;

impl Container for NoContainer {
    fn patcher(&self, _file: &Rc<dyn ReadAt>, _config: &BootConfig) -> Option<Rc<dyn Patch>> {
        None
    }

    fn extract(
        &self,
        _file: &Rc<dyn ReadAt>,
        _index: u32,
        path: &str,
    ) -> Result<Option<Rc<dyn ReadAt>>, IoError> {
        crate::log_warn!("container support not built in, cannot extract {}", path);
        Ok(None)
    }
}
