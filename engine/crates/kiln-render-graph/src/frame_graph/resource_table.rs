use std::collections::HashMap;

use ash::vk;
use slotmap::SlotMap;

use crate::frame_graph::error::{FgError, FgResult};
use crate::frame_graph::handle::FgResourceHandle;
use crate::frame_graph::resource::{FgPhysicalResource, FgResourceDesc, FgResourceKind, FgResourceNode};
use crate::frame_graph::resource_state::FgResourceState;

/// 帧图的资源表
///
/// 持有所有具名虚拟资源、它们的描述以及当前的同步状态。
/// 资源状态只在 [`crate::frame_graph::FrameGraph::execute`] 中被修改。
#[derive(Default)]
pub struct FgResourceTable {
    resources: SlotMap<FgResourceHandle, FgResourceNode>,
    name_to_handle: HashMap<String, FgResourceHandle>,
}

// new & init
impl FgResourceTable {
    pub fn new() -> Self {
        Self::default()
    }
}

// 注册
impl FgResourceTable {
    /// 注册资源；同名资源会被原地替换，句柄保持不变，状态重置为 `initial_state`
    pub fn add(
        &mut self,
        name: impl Into<String>,
        desc: FgResourceDesc,
        physical: FgPhysicalResource,
        initial_state: FgResourceState,
    ) -> FgResourceHandle {
        let name = name.into();
        let node = FgResourceNode {
            name: name.clone(),
            desc,
            physical,
            state: initial_state,
        };

        if let Some(&handle) = self.name_to_handle.get(&name)
            && let Some(existing) = self.resources.get_mut(handle)
        {
            log::debug!("frame graph resource `{}` redeclared", name);
            *existing = node;
            return handle;
        }

        let handle = self.resources.insert(node);
        self.name_to_handle.insert(name, handle);
        handle
    }

    pub fn bind_image(&mut self, handle: FgResourceHandle, image: vk::Image) -> FgResult<()> {
        self.bind(handle, FgPhysicalResource::Image(image), FgResourceKind::Image)
    }

    pub fn bind_buffer(&mut self, handle: FgResourceHandle, buffer: vk::Buffer) -> FgResult<()> {
        self.bind(handle, FgPhysicalResource::Buffer(buffer), FgResourceKind::Buffer)
    }

    fn bind(&mut self, handle: FgResourceHandle, physical: FgPhysicalResource, kind: FgResourceKind) -> FgResult<()> {
        let node = self.resources.get_mut(handle).ok_or(FgError::InvalidHandle { handle })?;
        if node.kind() != kind {
            return Err(FgError::BindingMismatch {
                resource: node.name.clone(),
                kind: node.kind(),
                expected: kind,
            });
        }
        node.physical = physical;
        Ok(())
    }

    /// 只允许帧图在录制 barrier 之后调用
    #[inline]
    pub(crate) fn set_state(&mut self, handle: FgResourceHandle, state: FgResourceState) {
        if let Some(node) = self.resources.get_mut(handle) {
            node.state = state;
        }
    }

    /// 释放所有资源，之前的句柄全部失效
    pub fn clear(&mut self) {
        self.resources.clear();
        self.name_to_handle.clear();
    }
}

// getters
impl FgResourceTable {
    #[inline]
    pub fn get(&self, handle: FgResourceHandle) -> Option<&FgResourceNode> {
        self.resources.get(handle)
    }

    #[inline]
    pub fn handle(&self, name: &str) -> Option<FgResourceHandle> {
        self.name_to_handle.get(name).copied().filter(|handle| self.resources.contains_key(*handle))
    }

    #[inline]
    pub fn name(&self, handle: FgResourceHandle) -> &str {
        self.resources.get(handle).map(|r| r.name.as_str()).unwrap_or("<unknown>")
    }

    #[inline]
    pub fn state(&self, handle: FgResourceHandle) -> Option<FgResourceState> {
        self.resources.get(handle).map(|r| r.state)
    }

    #[inline]
    pub fn iter(&self) -> impl Iterator<Item = (FgResourceHandle, &FgResourceNode)> {
        self.resources.iter()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.resources.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use ash::vk::Handle;

    use super::*;
    use crate::frame_graph::resource::{FgBufferDesc, FgImageDesc};

    #[test]
    fn test_redeclare_replaces_in_place() {
        let mut table = FgResourceTable::new();
        let first = table.add(
            "hdr",
            FgImageDesc::default().into(),
            FgPhysicalResource::Unbound,
            FgResourceState::UNDEFINED,
        );
        table.set_state(first, FgResourceState::COLOR_ATTACHMENT_WRITE);

        let desc = FgImageDesc::new_2d(640, 480, vk::Format::R16G16B16A16_SFLOAT, vk::ImageUsageFlags::STORAGE);
        let second = table.add(
            "hdr",
            desc.clone().into(),
            FgPhysicalResource::Unbound,
            FgResourceState::UNDEFINED,
        );

        assert_eq!(first, second);
        assert_eq!(table.len(), 1);
        let node = table.get(second).unwrap();
        assert_eq!(node.desc(), &FgResourceDesc::Image(desc));
        assert_eq!(node.state(), FgResourceState::UNDEFINED);
    }

    #[test]
    fn test_bind_checks_kind() {
        let mut table = FgResourceTable::new();
        let buffer = table.add(
            "objects",
            FgBufferDesc::new(1024, vk::BufferUsageFlags::STORAGE_BUFFER).into(),
            FgPhysicalResource::Unbound,
            FgResourceState::UNDEFINED,
        );

        assert!(matches!(
            table.bind_image(buffer, vk::Image::from_raw(1)),
            Err(FgError::BindingMismatch { .. })
        ));
        table.bind_buffer(buffer, vk::Buffer::from_raw(2)).unwrap();
        assert_eq!(table.get(buffer).unwrap().buffer(), Some(vk::Buffer::from_raw(2)));
    }

    #[test]
    fn test_clear_invalidates_handles() {
        let mut table = FgResourceTable::new();
        let handle = table.add(
            "depth",
            FgImageDesc::default().into(),
            FgPhysicalResource::Unbound,
            FgResourceState::UNDEFINED,
        );
        table.clear();

        assert!(table.get(handle).is_none());
        assert!(table.handle("depth").is_none());
        assert!(matches!(table.bind_image(handle, vk::Image::from_raw(1)), Err(FgError::InvalidHandle { .. })));

        let again = table.add(
            "depth",
            FgImageDesc::default().into(),
            FgPhysicalResource::Unbound,
            FgResourceState::UNDEFINED,
        );
        assert_ne!(handle, again);
    }
}
